use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use assistant_relay::{
    ApiServer, ApiState, AssistantApi, Config, InstructionResolver, OpenAiAssistantClient, Relay,
    RunOrchestrator, SessionRegistry, VisionClient, WhatsAppChannel,
};

/// Assistant Relay - WhatsApp webhook bridge to hosted AI assistants
#[derive(Parser)]
#[command(name = "assistant-relay", version, about)]
struct Cli {
    /// Port to listen on
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Set up logging based on verbosity; RUST_LOG wins when set
    let filter = match cli.verbose {
        0 => "info,assistant_relay=info",
        1 => "info,assistant_relay=debug",
        2 => "debug",
        _ => "trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let port = cli.port.unwrap_or(config.port);
    tracing::debug!(?config, "loaded configuration");

    let http = reqwest::Client::new();
    let api: Arc<dyn AssistantApi> = Arc::new(OpenAiAssistantClient::with_client(
        http,
        config.openai.base_url.clone(),
        config.openai.api_key.clone(),
    ));

    let assistant = api.retrieve_assistant(&config.openai.assistant_id).await?;
    tracing::info!(
        assistant_id = %assistant.id,
        name = ?assistant.name,
        model = ?assistant.model,
        "assistant loaded"
    );

    let vision = VisionClient::new(config.openai.base_url.clone(), config.openai.api_key.clone())?
        .with_model(config.openai.vision_model.clone())
        .with_default_image_url(config.openai.default_image_url.clone());

    let shutdown = CancellationToken::new();
    let orchestrator = RunOrchestrator::new(Arc::clone(&api), assistant.id, config.poll)
        .with_cancellation(shutdown.clone());
    let sessions = SessionRegistry::new(Arc::clone(&api), config.session_scope);
    sessions.warm_up().await?;

    let channel = WhatsAppChannel::new(
        config.whatsapp.access_token.clone(),
        config.whatsapp.send_url.clone(),
    );

    let relay = Relay::new(
        InstructionResolver::new(Arc::new(vision)),
        sessions,
        orchestrator,
        Arc::new(channel),
    )
    .with_default_recipient(config.whatsapp.default_recipient.clone());

    let state = ApiState {
        relay: Arc::new(relay),
        verify_token: config.whatsapp.verify_token.clone(),
    };

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            signal.cancel();
        }
    });

    ApiServer::new(state, port).run(shutdown).await?;
    Ok(())
}
