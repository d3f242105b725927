//! Wraps the one call to the image model.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use crate::catalog::{Catalog, CatalogError};
use crate::constants::{DOWNLOAD_PREFIX, GENERIC_GENERATION_ERROR};
use crate::photo::ImagePayload;
use crate::wizard::{Advance, Blocked, Step, Wizard};

/// Mime type assumed when the model leaves it out.
pub const DEFAULT_RESULT_MIME: &str = "image/png";

/// What the generator is asked to do.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GenerationRequest {
    /// The composed instruction
    pub prompt: String,
    /// The photo to edit
    pub image: ImagePayload,
}

/// An image returned by the model.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GeneratedImage {
    /// eg `image/png`
    pub mime_type: String,
    /// Base64 payload, as returned
    pub data: String,
}

impl GeneratedImage {
    /// `data:<mime>;base64,<payload>`
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Decoded image bytes.
    pub fn bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        general_purpose::STANDARD.decode(self.data.as_bytes())
    }

    /// Writes the image into `dir` under [`download_file_name`] and returns the path.
    pub fn write_to_dir(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let bytes = self.bytes().map_err(std::io::Error::other)?;
        let path = dir.join(download_file_name(Utc::now()));
        std::fs::write(&path, bytes)?;
        Ok(path)
    }
}

/// `hoho-studio-<unix millis>.png`
pub fn download_file_name(now: DateTime<Utc>) -> String {
    format!("{DOWNLOAD_PREFIX}-{}.png", now.timestamp_millis())
}

/// Why a generation failed. None of these are retried.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GenerationError {
    /// The response had no content parts
    NoContent,
    /// Content came back, but no part held image data
    NoImage,
    /// The call itself failed (network, auth, quota); carries the service's message when known
    Transport(Option<String>),
}

impl GenerationError {
    /// Text for the error banner.
    pub fn user_message(&self) -> String {
        match self {
            Self::NoContent => "No content generated.".to_string(),
            Self::NoImage => "The model did not return an image.".to_string(),
            Self::Transport(Some(message)) if !message.trim().is_empty() => message.clone(),
            Self::Transport(_) => GENERIC_GENERATION_ERROR.to_string(),
        }
    }
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user_message())
    }
}

impl std::error::Error for GenerationError {}

/// Inline image data from one content part.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct InlineImage {
    /// Mime type, if the model sent one
    pub mime_type: Option<String>,
    /// Base64 payload
    pub data: String,
}

/// One content part of a model response.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ResponsePart {
    /// Text, if any
    pub text: Option<String>,
    /// Inline image, if any
    pub image: Option<InlineImage>,
}

/// Picks the first part carrying image data. Any text the model sent instead is logged.
pub fn first_image(parts: Option<Vec<ResponsePart>>) -> Result<GeneratedImage, GenerationError> {
    let parts = match parts {
        Some(parts) if !parts.is_empty() => parts,
        _ => return Err(GenerationError::NoContent),
    };
    let mut remarks = Vec::new();
    for part in parts {
        if let Some(image) = part.image.filter(|image| !image.data.is_empty()) {
            return Ok(GeneratedImage {
                mime_type: image
                    .mime_type
                    .filter(|mime| !mime.is_empty())
                    .unwrap_or_else(|| DEFAULT_RESULT_MIME.to_string()),
                data: image.data,
            });
        }
        if let Some(text) = part.text {
            remarks.push(text);
        }
    }
    warn!("Model returned no image, only text: {:?}", remarks);
    Err(GenerationError::NoImage)
}

/// The external image-editing capability.
pub trait ImageGenerator: Send + Sync {
    /// Makes exactly one request. Implementations must not retry.
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<GeneratedImage, GenerationError>> + Send;
}

/// What [`Orchestrator::advance`] did.
#[derive(Debug)]
pub enum Outcome {
    /// Plain step change
    Moved(Step),
    /// The image came back; the wizard shows the result
    Generated,
    /// The generator failed; the wizard stays on the text step with the error
    Failed(GenerationError),
    /// The prompt could not be composed
    Aborted(CatalogError),
    /// Nothing happened
    Blocked(Blocked),
}

/// Drives a wizard forward, issuing the generator call when the last step is confirmed.
#[derive(Clone, Debug)]
pub struct Orchestrator<G> {
    generator: G,
}

impl<G: ImageGenerator> Orchestrator<G> {
    /// Wraps a generator.
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    /// The wrapped generator.
    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Advances the wizard. The lock is not held while the generator runs, so other
    /// requests see the busy flag instead of waiting.
    ///
    /// Dropping the returned future mid-call leaves the wizard busy; callers that can be
    /// cancelled use [`Orchestrator::advance_shared`].
    #[instrument(level = "debug", skip_all)]
    pub async fn advance(&self, wizard: &Mutex<Wizard>, catalog: &Catalog) -> Outcome {
        match start(wizard, catalog).await {
            Ok(request) => self.run(wizard, &request).await,
            Err(outcome) => outcome,
        }
    }

    async fn run(&self, wizard: &Mutex<Wizard>, request: &GenerationRequest) -> Outcome {
        info!(
            "Generating: prompt {} chars, image {} ({} bytes)",
            request.prompt.len(),
            request.image.mime_type,
            request.image.bytes.len()
        );
        let result = self.generator.generate(request).await;

        let outcome = match &result {
            Ok(image) => {
                info!("Generation succeeded ({})", image.mime_type);
                Outcome::Generated
            }
            Err(err) => {
                error!("Generation failed: {}", err.user_message());
                Outcome::Failed(err.clone())
            }
        };
        wizard.lock().await.finish_generation(result);
        outcome
    }
}

impl<G: ImageGenerator + 'static> Orchestrator<G> {
    /// Like [`Orchestrator::advance`], but the generator call runs on its own task. If the
    /// caller goes away mid-call the task still records the outcome and clears the busy flag.
    #[instrument(level = "debug", skip_all)]
    pub async fn advance_shared(
        self: &Arc<Self>,
        wizard: &Arc<Mutex<Wizard>>,
        catalog: &Catalog,
    ) -> Outcome {
        let request = match start(wizard, catalog).await {
            Ok(request) => request,
            Err(outcome) => return outcome,
        };

        let task = {
            let orchestrator = Arc::clone(self);
            let wizard = Arc::clone(wizard);
            tokio::spawn(async move { orchestrator.run(&wizard, &request).await })
        };
        match task.await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!("Generation task failed: {}", err);
                let failure = GenerationError::Transport(None);
                wizard.lock().await.finish_generation(Err(failure.clone()));
                Outcome::Failed(failure)
            }
        }
    }
}

/// Runs the wizard's own step logic; `Ok` carries the request when a generation was started.
async fn start(wizard: &Mutex<Wizard>, catalog: &Catalog) -> Result<GenerationRequest, Outcome> {
    match wizard.lock().await.advance(catalog) {
        Advance::Moved(step) => Err(Outcome::Moved(step)),
        Advance::Blocked(reason) => Err(Outcome::Blocked(reason)),
        Advance::Aborted(err) => Err(Outcome::Aborted(err)),
        Advance::Generate(request) => Ok(request),
    }
}
