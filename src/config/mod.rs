//! Application configuration — settings structs, defaults, TOML persistence
//! and platform paths.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{AppConfig, HotkeyConfig, LanguageConfig, RecordingConfig, ServiceConfig};
