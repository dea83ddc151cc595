//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// LanguageConfig
// ---------------------------------------------------------------------------

/// Source and target language codes passed through to the translation
/// service.
///
/// The pipeline does not validate or interpret these beyond forwarding them;
/// the service decides what codes it accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageConfig {
    /// Language the user speaks (e.g. `"en"`).
    pub source: String,
    /// Language to translate into (e.g. `"ar"`).
    pub target: String,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            source: "en".into(),
            target: "ar".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ServiceConfig
// ---------------------------------------------------------------------------

/// Connection settings for the hosted transcription and translation
/// endpoints.
///
/// Both endpoints live under the same `base_url`:
/// `{base_url}/transcribe` and `{base_url}/translate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the API gateway.
    pub base_url: String,
    /// API key — `None` when the gateway requires no authentication.
    pub api_key: Option<String>,
    /// Maximum seconds to wait for a response before timing out.
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8787".into(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingConfig
// ---------------------------------------------------------------------------

/// Thresholds and timings for the capture → popup pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Minimum hold duration in milliseconds; shorter recordings are
    /// rejected without an upload.
    pub min_duration_ms: u64,
    /// Minimum finalized payload size in bytes. Stacks with the duration
    /// guard — a long hold that produced almost no audio is still rejected.
    pub min_payload_bytes: usize,
    /// Upper bound between hotkey release and a visible result surface,
    /// in milliseconds.
    pub popup_deadline_ms: u64,
    /// How long the "hold longer" feedback stays up before auto-reset,
    /// in milliseconds.
    pub too_short_reset_ms: u64,
    /// Minimum interval between partial-translation emissions, in
    /// milliseconds.
    pub partial_emit_interval_ms: u64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            min_duration_ms: 500,
            min_payload_bytes: 5_000,
            popup_deadline_ms: 400,
            too_short_reset_ms: 1_500,
            partial_emit_interval_ms: 80,
        }
    }
}

// ---------------------------------------------------------------------------
// HotkeyConfig
// ---------------------------------------------------------------------------

/// Global hotkey bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotkeyConfig {
    /// Hold-to-speak key name (e.g. `"F9"`).
    pub hold_to_speak_key: String,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            hold_to_speak_key: "F9".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use voice_translate::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Language pair for translation requests.
    pub languages: LanguageConfig,
    /// Hosted service endpoints.
    pub service: ServiceConfig,
    /// Capture thresholds and pipeline timings.
    pub recording: RecordingConfig,
    /// Global hotkey bindings.
    pub hotkey: HotkeyConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
