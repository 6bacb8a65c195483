//! Provider catalog and model compatibility heuristics.
//!
//! Compatibility here is a fast naming-pattern check used to pick a sensible
//! default before the live model list arrives; the fetched list has the
//! final say (see [`crate::models`]). Unknown providers accept every model:
//! we trust the payload when we know nothing better.

/// Known inference providers.
///
/// Persisted as the id string (see [`Provider::id`]), not as an enum tag,
/// so profiles stay readable by other clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Groq,
    Anthropic,
    Mistral,
    OpenRouter,
    /// Anything we have no heuristics for; always compatible.
    Other(String),
}

impl Provider {
    /// Resolve a provider id string; never fails, unknown ids become
    /// [`Provider::Other`].
    pub fn from_id(id: &str) -> Self {
        match id.trim().to_ascii_lowercase().as_str() {
            "openai" => Self::OpenAI,
            "groq" => Self::Groq,
            "anthropic" => Self::Anthropic,
            "mistral" => Self::Mistral,
            "openrouter" | "open-router" => Self::OpenRouter,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::OpenAI => "openai",
            Self::Groq => "groq",
            Self::Anthropic => "anthropic",
            Self::Mistral => "mistral",
            Self::OpenRouter => "openrouter",
            Self::Other(id) => id,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Self::OpenAI => "OpenAI",
            Self::Groq => "Groq",
            Self::Anthropic => "Anthropic",
            Self::Mistral => "Mistral AI",
            Self::OpenRouter => "OpenRouter",
            Self::Other(id) => id,
        }
    }

    /// Default API endpoint, used when a payload names a provider but no
    /// base URL.
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Self::OpenAI => Some("https://api.openai.com/v1"),
            Self::Groq => Some("https://api.groq.com/openai/v1"),
            Self::Anthropic => Some("https://api.anthropic.com/v1"),
            Self::Mistral => Some("https://api.mistral.ai/v1"),
            Self::OpenRouter => Some("https://openrouter.ai/api/v1"),
            Self::Other(_) => None,
        }
    }

    /// Whether a model id plausibly belongs to this provider.
    ///
    /// Advisory only: the live model list overrides whatever this says.
    pub fn is_compatible(&self, model: &str) -> bool {
        let m = model.trim().to_ascii_lowercase();
        match self {
            Self::OpenAI => {
                m.starts_with("gpt-")
                    || m.starts_with("o1-")
                    || m.starts_with("chatgpt")
                    || m.contains("turbo")
                    || m.contains("davinci")
            }
            Self::Groq => ["llama", "mixtral", "qwen", "gemma"]
                .iter()
                .any(|p| m.contains(p)),
            Self::Anthropic => m.contains("claude"),
            Self::Mistral => ["mistral", "mixtral", "codestral", "ministral"]
                .iter()
                .any(|p| m.contains(p)),
            Self::OpenRouter | Self::Other(_) => true,
        }
    }

    /// Provider-appropriate substitute when the requested model does not
    /// fit. `None` for providers we know nothing about.
    pub fn suggest_fallback(&self) -> Option<&'static str> {
        match self {
            Self::OpenAI => Some("gpt-4o-mini"),
            Self::Groq => Some("llama-3.1-8b-instant"),
            Self::Anthropic => Some("claude-3-5-haiku-latest"),
            Self::Mistral => Some("mistral-small-latest"),
            Self::OpenRouter => Some("openrouter/auto"),
            Self::Other(_) => None,
        }
    }

    /// Static model list used when the live fetch fails.
    pub fn fallback_models(&self) -> &'static [&'static str] {
        match self {
            Self::OpenAI => &["gpt-4o", "gpt-4o-mini", "gpt-4-turbo", "o1-mini"],
            Self::Groq => &[
                "llama-3.3-70b-versatile",
                "llama-3.1-8b-instant",
                "mixtral-8x7b-32768",
                "gemma2-9b-it",
            ],
            Self::Anthropic => &[
                "claude-3-5-sonnet-latest",
                "claude-3-5-haiku-latest",
                "claude-3-opus-latest",
            ],
            Self::Mistral => &[
                "mistral-large-latest",
                "mistral-small-latest",
                "codestral-latest",
            ],
            Self::OpenRouter => &["openrouter/auto"],
            Self::Other(_) => &[],
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Resolve the model a payload asked for against its provider.
///
/// Absent provider information implies unconditional acceptance of the
/// requested model. Returns the model to use and whether it was replaced.
pub fn resolve_requested_model(
    requested: &str,
    provider: Option<&Provider>,
) -> (String, bool) {
    match provider {
        Some(p) if !p.is_compatible(requested) => match p.suggest_fallback() {
            Some(fallback) => (fallback.to_string(), true),
            None => (requested.to_string(), false),
        },
        _ => (requested.to_string(), false),
    }
}
