use crate::error::ApiError;

/// Opaque text-in, text-out capability backed by an external language model.
///
/// Implementations classify failures so callers can tell a rate limit or a
/// dropped connection (worth retrying) from any other API failure.
pub trait ReasoningService: Send + Sync + 'static {
    fn ask(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String, ApiError>;
}

/// Stand-in used when no model backend is configured; every call fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unconfigured;

impl ReasoningService for Unconfigured {
    fn ask(&self, _prompt: &str, _max_tokens: u32, _temperature: f32) -> Result<String, ApiError> {
        Err(ApiError::NotConfigured)
    }
}

impl<F> ReasoningService for F
where
    F: Fn(&str, u32, f32) -> Result<String, ApiError> + Send + Sync + 'static,
{
    fn ask(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String, ApiError> {
        self(prompt, max_tokens, temperature)
    }
}
