//! Turns inbound message bodies into the single instruction sent to the assistant

use std::sync::Arc;

use crate::Result;
use crate::vision::VisionDescriber;

/// Extensions recognised as image references (case-sensitive)
const IMAGE_EXTENSIONS: [&str; 4] = [".jpeg", ".jpg", ".gif", ".png"];

/// Whether `candidate` references an image by file extension
///
/// The query string and fragment are ignored, so
/// `https://x.test/a.png?size=large` is an image reference.
#[must_use]
pub fn is_image_url(candidate: &str) -> bool {
    let path = candidate
        .split(['?', '#'])
        .next()
        .unwrap_or(candidate);
    IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Where an instruction came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionSource {
    /// The message text itself
    Text,
    /// A description of the referenced image
    Image { url: String },
}

/// Normalised text to post to the assistant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub text: String,
    pub source: InstructionSource,
}

/// Picks the instruction for an event
pub struct InstructionResolver {
    vision: Arc<dyn VisionDescriber>,
}

impl InstructionResolver {
    /// Create a resolver that describes images with `vision`
    #[must_use]
    pub fn new(vision: Arc<dyn VisionDescriber>) -> Self {
        Self { vision }
    }

    /// Resolve the instruction from the first body; later bodies are ignored
    ///
    /// Returns `Ok(None)` for an empty sequence.
    ///
    /// # Errors
    ///
    /// Returns error if the first body is an image reference and it cannot be
    /// described
    pub async fn resolve<S: AsRef<str> + Sync>(&self, bodies: &[S]) -> Result<Option<Instruction>> {
        let Some(first) = bodies.first().map(AsRef::as_ref) else {
            return Ok(None);
        };

        if bodies.len() > 1 {
            tracing::debug!(ignored = bodies.len() - 1, "using first message body only");
        }

        if is_image_url(first) {
            tracing::info!(url = first, "describing image message");
            let text = self.vision.describe(first).await?;
            return Ok(Some(Instruction {
                text,
                source: InstructionSource::Image {
                    url: first.to_string(),
                },
            }));
        }

        Ok(Some(Instruction {
            text: first.to_string(),
            source: InstructionSource::Text,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::Error;

    #[derive(Default)]
    struct RecordingVision {
        fail: bool,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl VisionDescriber for RecordingVision {
        async fn describe(&self, image_url: &str) -> Result<String> {
            self.seen.lock().unwrap().push(image_url.to_string());
            if self.fail {
                return Err(Error::Vision("API error 500".to_string()));
            }
            Ok(format!("description of {image_url}"))
        }
    }

    #[test]
    fn recognises_image_extensions() {
        assert!(is_image_url("https://x.test/photo.png"));
        assert!(is_image_url("https://x.test/photo.jpg"));
        assert!(is_image_url("https://x.test/photo.jpeg"));
        assert!(is_image_url("https://x.test/anim.gif"));
        assert!(is_image_url("photo.png"));
    }

    #[test]
    fn ignores_query_and_fragment() {
        assert!(is_image_url("https://x.test/photo.png?size=large"));
        assert!(is_image_url("https://x.test/photo.jpg#top"));
        assert!(!is_image_url("https://x.test/page?file=photo.txt"));
    }

    #[test]
    fn rejects_other_strings() {
        assert!(!is_image_url("hello"));
        assert!(!is_image_url(""));
        assert!(!is_image_url("https://x.test/photo"));
        assert!(!is_image_url("https://x.test/photo.webp"));
        assert!(!is_image_url("https://x.test/photo.png.txt"));
        assert!(!is_image_url("look at this png"));
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert!(!is_image_url("https://x.test/PHOTO.PNG"));
        assert!(!is_image_url("https://x.test/photo.Jpg"));
    }

    #[tokio::test]
    async fn empty_sequence_has_no_instruction() {
        let vision = Arc::new(RecordingVision::default());
        let resolver = InstructionResolver::new(vision.clone());

        let bodies: Vec<String> = Vec::new();
        assert_eq!(resolver.resolve(&bodies).await.unwrap(), None);
        assert!(vision.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn text_body_is_used_verbatim() {
        let vision = Arc::new(RecordingVision::default());
        let resolver = InstructionResolver::new(vision.clone());

        let instruction = resolver
            .resolve(&["hello", "ignored"])
            .await
            .unwrap()
            .unwrap();

        assert_eq!(instruction.text, "hello");
        assert_eq!(instruction.source, InstructionSource::Text);
        assert!(vision.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn image_body_is_replaced_by_description() {
        let vision = Arc::new(RecordingVision::default());
        let resolver = InstructionResolver::new(vision.clone());

        let instruction = resolver
            .resolve(&["https://x.test/photo.png"])
            .await
            .unwrap()
            .unwrap();

        assert_eq!(instruction.text, "description of https://x.test/photo.png");
        assert_eq!(
            instruction.source,
            InstructionSource::Image {
                url: "https://x.test/photo.png".to_string()
            }
        );
        assert_eq!(
            *vision.seen.lock().unwrap(),
            vec!["https://x.test/photo.png".to_string()]
        );
    }

    #[tokio::test]
    async fn only_first_body_is_classified() {
        let vision = Arc::new(RecordingVision::default());
        let resolver = InstructionResolver::new(vision.clone());

        let instruction = resolver
            .resolve(&["hi", "https://x.test/photo.png"])
            .await
            .unwrap()
            .unwrap();

        assert_eq!(instruction.text, "hi");
        assert!(vision.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn vision_failure_propagates() {
        let vision = Arc::new(RecordingVision {
            fail: true,
            ..RecordingVision::default()
        });
        let resolver = InstructionResolver::new(vision);

        let err = resolver
            .resolve(&["https://x.test/photo.gif"])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Vision(_)));
    }
}
