//! [`ImageGenerator`] backed by the Generative Language `generateContent` endpoint.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{DEFAULT_API_BASE_URL, DEFAULT_MODEL};
use crate::generation::{
    GeneratedImage, GenerationError, GenerationRequest, ImageGenerator, InlineImage,
    ResponsePart, first_image,
};

/// Where and how to reach the model.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GeminiConfig {
    /// API key sent as `x-goog-api-key`
    pub api_key: String,
    /// Model name, eg `gemini-2.5-flash-image`
    pub model: String,
    /// API base, without a trailing slash
    pub base_url: String,
}

impl GeminiConfig {
    /// Config for the default model and endpoint.
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

// -----------------------------
// Wire types
// -----------------------------

#[derive(Serialize, Debug)]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Serialize, Debug)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize, Debug)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text {
        text: &'a str,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: RequestInline<'a>,
    },
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RequestInline<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Deserialize, Debug, Default)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Option<Vec<WirePart>>,
}

#[derive(Deserialize, Debug)]
struct WirePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, rename = "inlineData", alias = "inline_data")]
    inline_data: Option<WireInline>,
}

#[derive(Deserialize, Debug)]
struct WireInline {
    #[serde(default, rename = "mimeType", alias = "mime_type")]
    mime_type: Option<String>,
    #[serde(default)]
    data: String,
}

#[derive(Deserialize, Debug)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize, Debug)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

impl From<WirePart> for ResponsePart {
    fn from(part: WirePart) -> Self {
        ResponsePart {
            text: part.text,
            image: part.inline_data.map(|inline| InlineImage {
                mime_type: inline.mime_type,
                data: inline.data,
            }),
        }
    }
}

fn response_parts(response: GenerateContentResponse) -> Option<Vec<ResponsePart>> {
    let parts = response.candidates.into_iter().next()?.content?.parts?;
    Some(parts.into_iter().map(ResponsePart::from).collect())
}

/// Client for one model.
#[derive(Clone, Debug)]
pub struct GeminiClient {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    /// Builds a client with a fresh connection pool.
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// The model in use.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

impl ImageGenerator for GeminiClient {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedImage, GenerationError> {
        let body = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::Text {
                        text: &request.prompt,
                    },
                    RequestPart::Inline {
                        inline_data: RequestInline {
                            mime_type: &request.image.mime_type,
                            data: request.image.to_base64(),
                        },
                    },
                ],
            }],
        };

        let resp = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| GenerationError::Transport(Some(err.to_string())))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|err| GenerationError::Transport(Some(err.to_string())))?;
        debug!("generateContent returned {} ({} bytes)", status, bytes.len());

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorEnvelope>(&bytes)
                .ok()
                .and_then(|envelope| envelope.error.message)
                .unwrap_or_else(|| format!("Gemini API error {status}"));
            return Err(GenerationError::Transport(Some(message)));
        }

        let parsed: GenerateContentResponse = serde_json::from_slice(&bytes).map_err(|err| {
            GenerationError::Transport(Some(format!(
                "Failed to parse generateContent response: {err}"
            )))
        })?;
        first_image(response_parts(parsed))
    }
}
