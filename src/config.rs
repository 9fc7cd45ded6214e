use std::env;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Medara";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default Ollama endpoint and intake model.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "medgemma:latest";

/// Get the application data directory
/// ~/Medara/ on all platforms (user-visible)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Medara")
}

/// Default location of the consultation database.
pub fn database_path() -> PathBuf {
    app_data_dir().join("medara.db")
}

/// Default tracing filter when RUST_LOG is not set.
pub fn default_log_filter() -> &'static str {
    "medara=info"
}

/// LLM connection settings, read from MEDARA_* environment variables with
/// local defaults.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl LlmSettings {
    pub fn from_env() -> Self {
        Self {
            base_url: env::var("MEDARA_OLLAMA_URL").unwrap_or_else(|_| DEFAULT_OLLAMA_URL.into()),
            model: env::var("MEDARA_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into()),
            timeout_secs: env_u64("MEDARA_LLM_TIMEOUT_SECS", 120),
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.into(),
            model: DEFAULT_MODEL.into(),
            timeout_secs: 120,
        }
    }
}

/// Intake behavior settings. Extraction runs on every patient turn unless
/// a larger cadence is configured.
#[derive(Debug, Clone)]
pub struct IntakeSettings {
    pub extract_every_n_turns: u32,
}

impl IntakeSettings {
    pub fn from_env() -> Self {
        Self {
            extract_every_n_turns: (env_u64("MEDARA_EXTRACT_EVERY_N_TURNS", 1) as u32).max(1),
        }
    }
}

impl Default for IntakeSettings {
    fn default() -> Self {
        Self {
            extract_every_n_turns: 1,
        }
    }
}

/// Everything the CLI needs to come up.
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub llm: LlmSettings,
    pub intake: IntakeSettings,
    pub db_path: PathBuf,
}

impl AppSettings {
    pub fn from_env() -> Self {
        let db_path = env::var("MEDARA_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| database_path());
        Self {
            llm: LlmSettings::from_env(),
            intake: IntakeSettings::from_env(),
            db_path,
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
