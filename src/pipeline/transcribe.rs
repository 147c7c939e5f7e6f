//! Transcription client: build a vision request for one segment, send it
//! through a backend, and pull the LaTeX body out of the answer.
//!
//! ## Request layout
//!
//! 1. **System message** — the instruction for the [`PromptKind`]
//! 2. **Context message** *(fragment combination only)* — both fragment
//!    transcriptions, placed ahead of the preamble
//! 3. **Preamble message** — the LaTeX preamble of the page being built, so
//!    the model continues a document that is already open
//! 4. **Image** — the segment payload
//!
//! ## Two ways to fail
//!
//! A request can fail to deliver ([`Outcome::Failed`]: transport error,
//! non-success status, empty candidate list), or deliver text that lacks the
//! body markers ([`AttemptError::MarkersNotFound`]). Both are retryable, but
//! only the second means the service is up and answering.

use crate::config::{Credentials, RunConfig};
use crate::error::{AttemptError, Hw2TexError};
use crate::pipeline::segment::{ImagePayload, Segment};
use crate::prompts::{instruction, PromptKind, BODY_END_MARKER, BODY_START_MARKER};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Everything a backend needs to issue one request.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub system: String,
    pub context: Option<String>,
    pub preamble: String,
    pub image: ImagePayload,
}

/// A request/response oracle returning candidate completions.
///
/// An empty `Vec` means the service answered with no candidates.
#[async_trait]
pub trait VisionBackend: Send + Sync {
    /// Short name for log lines.
    fn name(&self) -> &str;

    async fn complete(&self, request: &VisionRequest) -> Result<Vec<String>, AttemptError>;
}

/// Result of one delivery round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The service returned at least one candidate; this is the first.
    Delivered(String),
    /// Nothing usable came back.
    Failed(AttemptError),
}

/// Send one segment to the model.
pub async fn transcribe(
    backend: &dyn VisionBackend,
    segment: &Segment,
    kind: PromptKind,
    context: Option<&str>,
    preamble: &str,
) -> Outcome {
    let request = VisionRequest {
        system: instruction(kind).to_string(),
        context: match kind {
            PromptKind::FragmentCombination => context.map(str::to_string),
            _ => None,
        },
        preamble: preamble.to_string(),
        image: segment.image.clone(),
    };

    debug!(
        "Sending {:?} request for {} segment via {} ({} bytes base64)",
        kind,
        segment.kind.label(),
        backend.name(),
        request.image.data.len()
    );

    match backend.complete(&request).await {
        Ok(candidates) => match candidates.into_iter().next() {
            Some(first) => Outcome::Delivered(first),
            None => Outcome::Failed(AttemptError::NoCandidates),
        },
        Err(e) => Outcome::Failed(e),
    }
}

/// Slice the body out of a delivered payload.
///
/// The body runs from the first [`BODY_START_MARKER`] through the first
/// [`BODY_END_MARKER`] that follows it, inclusive. Returns `None` when either
/// marker is missing.
pub fn extract_body(text: &str) -> Option<&str> {
    let start = text.find(BODY_START_MARKER)?;
    let end_rel = text[start..].find(BODY_END_MARKER)?;
    let end = start + end_rel + BODY_END_MARKER.len();
    Some(&text[start..end])
}

/// Turn an [`Outcome`] into an extracted body or the reason to retry.
pub fn validate(outcome: Outcome) -> Result<String, AttemptError> {
    match outcome {
        Outcome::Delivered(text) => extract_body(&text)
            .map(str::to_string)
            .ok_or(AttemptError::MarkersNotFound),
        Outcome::Failed(e) => Err(e),
    }
}

// ── Chat-completions backend ─────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: Vec<Content>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Content {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

fn text_message(role: &'static str, text: &str) -> Message {
    Message {
        role,
        content: vec![Content::Text {
            text: text.to_string(),
        }],
    }
}

/// Direct HTTPS client for an OpenAI-style `/chat/completions` endpoint,
/// authenticated with the credential from the params file.
pub struct ChatCompletionsBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: usize,
    temperature: f32,
}

impl ChatCompletionsBackend {
    pub fn new(config: &RunConfig, credentials: &Credentials) -> Result<Self, Hw2TexError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| Hw2TexError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: credentials.openai_api_key.clone(),
            model: credentials
                .model
                .clone()
                .unwrap_or_else(|| config.model.clone()),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    fn build_body(&self, request: &VisionRequest) -> ChatRequest<'_> {
        let mut messages = vec![text_message("system", &request.system)];
        if let Some(ref ctx) = request.context {
            messages.push(text_message("user", ctx));
        }
        messages.push(text_message("user", &request.preamble));
        messages.push(Message {
            role: "user",
            content: vec![Content::ImageUrl {
                image_url: ImageUrl {
                    url: request.image.data_url(),
                },
            }],
        });

        ChatRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl VisionBackend for ChatCompletionsBackend {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &VisionRequest) -> Result<Vec<String>, AttemptError> {
        info!("Posting image to {} ({})", self.endpoint, self.model);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.build_body(request))
            .send()
            .await
            .map_err(|e| AttemptError::ServiceUnavailable {
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!("Transcription service answered HTTP {}", status);
            return Err(AttemptError::ServiceUnavailable {
                detail: format!("HTTP {status}: {}", truncate(&detail, 200)),
            });
        }

        let parsed: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| AttemptError::ServiceUnavailable {
                    detail: format!("malformed response: {e}"),
                })?;

        Ok(parsed
            .choices
            .into_iter()
            .map(|c| c.message.content.unwrap_or_default())
            .collect())
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ── edgequake-llm provider backend ───────────────────────────────────────

/// Backend over any [`LLMProvider`], for users who configure providers
/// through environment variables instead of the params file.
pub struct ProviderBackend {
    provider: Arc<dyn LLMProvider>,
    label: String,
    options: CompletionOptions,
}

impl ProviderBackend {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>, config: &RunConfig) -> Self {
        Self {
            provider,
            label: label.into(),
            options: CompletionOptions {
                temperature: Some(config.temperature),
                max_tokens: Some(config.max_tokens),
                ..Default::default()
            },
        }
    }

    /// Resolve a named provider (`openai`, `anthropic`, `gemini`, `ollama`, …).
    ///
    /// The provider reads its own API key from the environment.
    pub fn from_name(name: &str, config: &RunConfig) -> Result<Self, Hw2TexError> {
        let provider = ProviderFactory::create_llm_provider(name, &config.model).map_err(|e| {
            Hw2TexError::ProviderNotConfigured {
                provider: name.to_string(),
                hint: format!("{e}"),
            }
        })?;
        Ok(Self::new(provider, format!("{}/{}", name, config.model), config))
    }

    /// Auto-detect a provider from the environment.
    ///
    /// `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` win when both are set;
    /// otherwise the factory scans the known API key variables.
    pub fn from_env(config: &RunConfig) -> Result<Self, Hw2TexError> {
        if let (Ok(prov), Ok(model)) = (
            std::env::var("EDGEQUAKE_LLM_PROVIDER"),
            std::env::var("EDGEQUAKE_MODEL"),
        ) {
            if !prov.is_empty() && !model.is_empty() {
                let provider = ProviderFactory::create_llm_provider(&prov, &model).map_err(|e| {
                    Hw2TexError::ProviderNotConfigured {
                        provider: prov.clone(),
                        hint: format!("{e}"),
                    }
                })?;
                return Ok(Self::new(provider, format!("{prov}/{model}"), config));
            }
        }

        let (provider, _embedding) =
            ProviderFactory::from_env().map_err(|e| Hw2TexError::ProviderNotConfigured {
                provider: "auto".to_string(),
                hint: format!(
                    "No LLM provider could be auto-detected from environment.\n\
                    Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or use --params.\n\
                    Error: {}",
                    e
                ),
            })?;
        Ok(Self::new(provider, "auto", config))
    }
}

#[async_trait]
impl VisionBackend for ProviderBackend {
    fn name(&self) -> &str {
        &self.label
    }

    async fn complete(&self, request: &VisionRequest) -> Result<Vec<String>, AttemptError> {
        let mut messages = vec![ChatMessage::system(request.system.as_str())];
        if let Some(ref ctx) = request.context {
            messages.push(ChatMessage::system(ctx.as_str()));
        }
        let image = ImageData::new(request.image.data.clone(), request.image.mime_type.as_str())
            .with_detail("high");
        messages.push(ChatMessage::user_with_images(
            request.preamble.as_str(),
            vec![image],
        ));

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| AttemptError::ServiceUnavailable {
                detail: format!("{e}"),
            })?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.label, response.prompt_tokens, response.completion_tokens
        );

        if response.content.trim().is_empty() {
            Ok(Vec::new())
        } else {
            Ok(vec![response.content])
        }
    }
}

// ── Offline backend ──────────────────────────────────────────────────────

/// Canned response served in dummy-data mode.
pub const DUMMY_RESPONSE: &str = "Here is the transcription:\n\n\
\\section*{Problem}\n\
Let $f(x) = x^2$. Then $f'(x) = 2x$ and\n\
\\[ \\int_0^1 f(x)\\,dx = \\hbox{$\\frac{1}{3}$} \\]\n\
\\end{document}\n";

/// Serves a fixed response without touching the network.
pub struct DummyBackend {
    response: String,
}

impl DummyBackend {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new(DUMMY_RESPONSE)
    }
}

#[async_trait]
impl VisionBackend for DummyBackend {
    fn name(&self) -> &str {
        "dummy"
    }

    async fn complete(&self, _request: &VisionRequest) -> Result<Vec<String>, AttemptError> {
        Ok(vec![self.response.clone()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::segment::SegmentKind;
    use std::sync::Mutex;

    fn segment() -> Segment {
        Segment {
            kind: SegmentKind::Whole,
            image: ImagePayload {
                mime_type: "image/jpeg".into(),
                data: "AAAA".into(),
            },
        }
    }

    /// Records the last request and answers with fixed candidates.
    struct Recording {
        answer: Result<Vec<String>, AttemptError>,
        seen: Mutex<Option<VisionRequest>>,
    }

    #[async_trait]
    impl VisionBackend for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, request: &VisionRequest) -> Result<Vec<String>, AttemptError> {
            *self.seen.lock().unwrap() = Some(request.clone());
            self.answer.clone()
        }
    }

    fn recording(answer: Result<Vec<String>, AttemptError>) -> Recording {
        Recording {
            answer,
            seen: Mutex::new(None),
        }
    }

    #[test]
    fn extract_body_inclusive_of_both_markers() {
        let text = "Sure!\n\\section{A}\nx\n\\end{document}\ntrailing";
        assert_eq!(extract_body(text), Some("\\section{A}\nx\n\\end{document}"));
    }

    #[test]
    fn extract_body_uses_first_occurrences() {
        let text = "\\section{1}\\end{document}\\section{2}\\end{document}";
        assert_eq!(extract_body(text), Some("\\section{1}\\end{document}"));
    }

    #[test]
    fn extract_body_missing_marker() {
        assert_eq!(extract_body("no markers here"), None);
        assert_eq!(extract_body("\\section{A} but no end"), None);
        assert_eq!(extract_body("only \\end{document}"), None);
        assert_eq!(extract_body("\\end{document} before \\section{A}"), None);
    }

    #[test]
    fn validate_distinguishes_failure_modes() {
        assert_eq!(
            validate(Outcome::Delivered("no markers here".into())),
            Err(AttemptError::MarkersNotFound)
        );
        assert_eq!(
            validate(Outcome::Failed(AttemptError::NoCandidates)),
            Err(AttemptError::NoCandidates)
        );
        assert_eq!(
            validate(Outcome::Delivered("\\section{A}\\end{document}".into())).unwrap(),
            "\\section{A}\\end{document}"
        );
    }

    #[test]
    fn first_candidate_wins() {
        let backend = recording(Ok(vec!["first".into(), "second".into()]));
        let out = tokio_test::block_on(transcribe(
            &backend,
            &segment(),
            PromptKind::SinglePage,
            None,
            "PRE",
        ));
        assert_eq!(out, Outcome::Delivered("first".into()));
    }

    #[test]
    fn zero_candidates_is_a_failure() {
        let backend = recording(Ok(vec![]));
        let out = tokio_test::block_on(transcribe(
            &backend,
            &segment(),
            PromptKind::SinglePage,
            None,
            "PRE",
        ));
        assert_eq!(out, Outcome::Failed(AttemptError::NoCandidates));
    }

    #[test]
    fn context_only_travels_with_combination_prompt() {
        let backend = recording(Ok(vec!["x".into()]));
        tokio_test::block_on(transcribe(
            &backend,
            &segment(),
            PromptKind::Fragment,
            Some("CTX"),
            "PRE",
        ));
        let seen = backend.seen.lock().unwrap().clone().unwrap();
        assert!(seen.context.is_none());
        assert_eq!(seen.system, instruction(PromptKind::Fragment));

        tokio_test::block_on(transcribe(
            &backend,
            &segment(),
            PromptKind::FragmentCombination,
            Some("CTX"),
            "PRE",
        ));
        let seen = backend.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.context.as_deref(), Some("CTX"));
        assert_eq!(seen.preamble, "PRE");
    }

    #[test]
    fn chat_body_places_context_before_preamble_and_image_last() {
        let config = RunConfig::default();
        let creds = Credentials {
            openai_api_key: "sk-test".into(),
            model: None,
        };
        let backend = ChatCompletionsBackend::new(&config, &creds).unwrap();
        let request = VisionRequest {
            system: "SYS".into(),
            context: Some("CTX".into()),
            preamble: "PRE".into(),
            image: segment().image,
        };
        let body = serde_json::to_value(backend.build_body(&request)).unwrap();

        assert_eq!(body["model"], "gpt-4-turbo");
        assert_eq!(body["max_tokens"], 1024);
        let msgs = body["messages"].as_array().unwrap();
        assert_eq!(msgs.len(), 4);
        assert_eq!(msgs[0]["role"], "system");
        assert_eq!(msgs[0]["content"][0]["text"], "SYS");
        assert_eq!(msgs[1]["content"][0]["text"], "CTX");
        assert_eq!(msgs[2]["content"][0]["text"], "PRE");
        assert_eq!(msgs[3]["content"][0]["type"], "image_url");
        assert_eq!(
            msgs[3]["content"][0]["image_url"]["url"],
            "data:image/jpeg;base64,AAAA"
        );
    }

    #[test]
    fn chat_response_tolerates_missing_choices() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"id": "x"}"#).unwrap();
        assert!(parsed.choices.is_empty());
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": null}}]}"#).unwrap();
        assert_eq!(parsed.choices.len(), 1);
    }

    #[test]
    fn dummy_response_extracts() {
        assert!(extract_body(DUMMY_RESPONSE).is_some());
    }
}
