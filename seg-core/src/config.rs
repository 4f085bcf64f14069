//! Configuration for a SEG deployment.
//!
//! Maps directly to `seg.toml`. Every section and field has a default, so
//! an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

/// Top-level SEG configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SegConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Reply shaping defaults for new states.
    #[serde(default)]
    pub reply: ReplyConfig,
    /// Decay dynamics.
    #[serde(default)]
    pub decay: DecayConfig,
    /// Dream synthesis.
    #[serde(default)]
    pub dream: DreamConfig,
    /// External text generator.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Persona library storage.
    #[serde(default)]
    pub library: LibraryConfig,
}

impl SegConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `SegError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        toml::from_str(toml_str).map_err(|e| crate::SegError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory state exports are written to.
    #[serde(default = "default_export_dir")]
    pub export_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            export_dir: default_export_dir(),
        }
    }
}

/// Defaults for the per-state reply settings bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyConfig {
    /// How much the persona colours replies.
    #[serde(default = "default_0_7")]
    pub persona_opacity: f32,
    /// Tendency toward metaphorical language.
    #[serde(default = "default_0_6")]
    pub metaphor_bias: f32,
    /// Chance of inserting a core belief.
    #[serde(default = "default_0_2")]
    pub belief_interjection_prob: f32,
    /// Chance of a meta-awareness aside.
    #[serde(default = "default_0_1")]
    pub self_reference_prob: f32,
    /// Maximum characters of woven memory text in template replies.
    #[serde(default = "default_150")]
    pub max_weave_chars: usize,
    /// Narrate dreams back to the user.
    #[serde(default = "default_true")]
    pub narrate_dreams: bool,
    /// Fewer, more oblique memories per reply.
    #[serde(default = "default_true")]
    pub subtlety_mode: bool,
    /// Fraction of remaining headroom added to memories used in a reply.
    #[serde(default = "default_0_1")]
    pub reinforcement_headroom: f32,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            persona_opacity: 0.7,
            metaphor_bias: 0.6,
            belief_interjection_prob: 0.2,
            self_reference_prob: 0.1,
            max_weave_chars: 150,
            narrate_dreams: true,
            subtlety_mode: true,
            reinforcement_headroom: 0.1,
        }
    }
}

/// Decay dynamics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecayConfig {
    /// Per-day rate for ordinary memories.
    #[serde(default = "default_ordinary_rate")]
    pub ordinary_rate: f64,
    /// Per-day rate for core anchors.
    #[serde(default = "default_anchor_rate")]
    pub anchor_rate: f64,
    /// Constant added after decay so nothing becomes unreachable.
    #[serde(default = "default_0_15")]
    pub salience_floor: f32,
    /// Recency window used by the ranker, in days.
    #[serde(default = "default_30_f64")]
    pub recency_window_days: f64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            ordinary_rate: 0.02,
            anchor_rate: 0.001,
            salience_floor: 0.15,
            recency_window_days: 30.0,
        }
    }
}

/// Dream synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DreamConfig {
    /// Intensity used when the caller does not pass one.
    #[serde(default = "default_0_6")]
    pub default_intensity: f32,
    /// How many top-salience memories form the dream pool.
    #[serde(default = "default_5_usize")]
    pub pool_size: usize,
}

impl Default for DreamConfig {
    fn default() -> Self {
        Self {
            default_intensity: 0.6,
            pool_size: 5,
        }
    }
}

/// Which text-generation backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// No generator; replies always use templates.
    #[default]
    None,
    /// Ollama `/api/generate`.
    Ollama,
    /// LM Studio's OpenAI-compatible server.
    LmStudio,
    /// OpenAI chat completions.
    OpenAi,
    /// Google Gemini `generateContent`.
    Gemini,
}

impl ProviderKind {
    /// Base URL used when none is configured.
    #[must_use]
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Ollama => "http://localhost:11434",
            Self::LmStudio => "http://localhost:1234",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        }
    }

    /// Model used when none is configured.
    #[must_use]
    pub fn default_model(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Ollama => "llama2",
            Self::LmStudio => "local-model",
            Self::OpenAi => "gpt-3.5-turbo",
            Self::Gemini => "gemini-pro",
        }
    }
}

/// External text generator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider.
    #[serde(default)]
    pub provider: ProviderKind,
    /// Base URL; the provider default is used when absent.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Model name; the provider default is used when absent.
    #[serde(default)]
    pub model: Option<String>,
    /// API key (required by OpenAI and Gemini).
    #[serde(default)]
    pub api_key: Option<String>,
    /// Hard timeout for one request in milliseconds.
    #[serde(default = "default_30000")]
    pub request_timeout_ms: u64,
    /// Retries after the first failed attempt.
    #[serde(default = "default_1_u32")]
    pub max_retries: u32,
    /// Sampling temperature.
    #[serde(default = "default_0_7")]
    pub temperature: f32,
    /// Maximum tokens per reply.
    #[serde(default = "default_1000")]
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::None,
            base_url: None,
            model: None,
            api_key: None,
            request_timeout_ms: 30_000,
            max_retries: 1,
            temperature: 0.7,
            max_tokens: 1000,
        }
    }
}

impl LlmConfig {
    /// Configured base URL or the provider default.
    #[must_use]
    pub fn resolved_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.provider.default_base_url().to_string())
    }

    /// Configured model or the provider default.
    #[must_use]
    pub fn resolved_model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }
}

/// Where the persona library keeps its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryBackend {
    /// SQLite key/value table.
    #[default]
    Sqlite,
    /// In-process only; lost on exit.
    Memory,
}

/// Persona library settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Storage backend.
    #[serde(default)]
    pub backend: LibraryBackend,
    /// SQLite database path.
    #[serde(default = "default_library_path")]
    pub path: String,
    /// Entry count above which cleanup trims the library.
    #[serde(default = "default_50")]
    pub max_entries: usize,
    /// Rating below which entries are first to go during cleanup.
    #[serde(default = "default_2_u8")]
    pub min_rating: u8,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            backend: LibraryBackend::Sqlite,
            path: default_library_path(),
            max_entries: 50,
            min_rating: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_export_dir() -> String { ".".to_string() }
fn default_library_path() -> String { "seg_library.db".to_string() }
fn default_0_1() -> f32 { 0.1 }
fn default_0_15() -> f32 { 0.15 }
fn default_0_2() -> f32 { 0.2 }
fn default_0_6() -> f32 { 0.6 }
fn default_0_7() -> f32 { 0.7 }
fn default_ordinary_rate() -> f64 { 0.02 }
fn default_anchor_rate() -> f64 { 0.001 }
fn default_30_f64() -> f64 { 30.0 }
fn default_1_u32() -> u32 { 1 }
fn default_2_u8() -> u8 { 2 }
fn default_5_usize() -> usize { 5 }
fn default_50() -> usize { 50 }
fn default_150() -> usize { 150 }
fn default_1000() -> u32 { 1000 }
fn default_30000() -> u64 { 30_000 }
