use arc_swap::ArcSwap;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::db::Database;
use crate::error::{ServiceError, ServiceResult};

/// Environment variable prefix, e.g. `GIST__SERVER__PORT=9000`
const ENV_PREFIX: &str = "GIST";

// ==================== Static Configuration (startup-only) ====================

/// Static configuration that cannot be changed at runtime
/// These settings affect server binding or require restart to change
#[derive(Debug, Clone, Deserialize)]
pub struct StaticConfig {
    #[serde(default = "default_server")]
    pub server: ServerConfig,

    #[serde(default = "default_storage")]
    pub storage: StorageConfig,

    #[serde(default = "default_auth")]
    pub auth: AuthConfig,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            storage: default_storage(),
            auth: default_auth(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Holds the SQLite database and the `objects/` tree of stored files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("gist.db")
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.data_dir.join("objects")
    }
}

/// Account and session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_session_ttl_days")]
    pub session_ttl_days: i64,

    #[serde(default = "default_min_password_len")]
    pub min_password_len: usize,
}

// ==================== Dynamic Configuration (hot-reloadable) ====================

/// Dynamic configuration that can be updated at runtime via API
/// DB values override config file/env defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicConfig {
    #[serde(default = "default_llm")]
    pub llm: LlmConfig,

    #[serde(default = "default_transcription")]
    pub transcription: TranscriptionConfig,

    #[serde(default = "default_speech")]
    pub speech: SpeechConfig,

    #[serde(default = "default_extraction")]
    pub extraction: ExtractionConfig,

    #[serde(default = "default_video")]
    pub video: VideoConfig,
}

impl Default for DynamicConfig {
    fn default() -> Self {
        Self {
            llm: default_llm(),
            transcription: default_transcription(),
            speech: default_speech(),
            extraction: default_extraction(),
            video: default_video(),
        }
    }
}

/// Text-completion endpoint (Ollama chat API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Speech-to-text endpoint (OpenAI-compatible `/v1/audio/transcriptions`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    #[serde(default = "default_openai_url")]
    pub base_url: String,

    /// Empty means audio extraction is not configured
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_transcription_model")]
    pub model: String,
}

/// Text-to-speech endpoint (OpenAI-compatible `/v1/audio/speech`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    #[serde(default = "default_openai_url")]
    pub base_url: String,

    /// Empty means audio summaries are not configured
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_speech_model")]
    pub model: String,

    #[serde(default = "default_speech_voice")]
    pub voice: String,
}

/// Source fetching and extraction switches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Video transcript extraction is off unless an operator turns it on
    #[serde(default)]
    pub video_enabled: bool,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_max_source_bytes")]
    pub max_source_bytes: u64,
}

impl ExtractionConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Video transcript source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    #[serde(default = "default_transcript_base_url")]
    pub transcript_base_url: String,
}

// ==================== DynamicConfig Settings Keys ====================

/// All valid setting keys for DynamicConfig
pub const VALID_SETTING_KEYS: &[&str] = &[
    "llm.base_url",
    "llm.model",
    "llm.temperature",
    "llm.request_timeout_secs",
    "transcription.base_url",
    "transcription.api_key",
    "transcription.model",
    "speech.base_url",
    "speech.api_key",
    "speech.model",
    "speech.voice",
    "extraction.video_enabled",
    "extraction.fetch_timeout_secs",
    "extraction.max_source_bytes",
    "video.transcript_base_url",
];

/// Shown instead of API keys in settings responses
const MASKED_SECRET: &str = "********";

fn masked(secret: &str) -> serde_json::Value {
    if secret.is_empty() {
        serde_json::Value::String(String::new())
    } else {
        serde_json::Value::String(MASKED_SECRET.to_string())
    }
}

impl DynamicConfig {
    /// Get all valid setting keys
    pub fn valid_keys() -> HashSet<&'static str> {
        VALID_SETTING_KEYS.iter().copied().collect()
    }

    /// Convert config to key-value map for API response
    pub fn to_key_value_map(&self) -> HashMap<String, serde_json::Value> {
        let entries = [
            ("llm.base_url", serde_json::json!(self.llm.base_url)),
            ("llm.model", serde_json::json!(self.llm.model)),
            ("llm.temperature", serde_json::json!(self.llm.temperature)),
            (
                "llm.request_timeout_secs",
                serde_json::json!(self.llm.request_timeout_secs),
            ),
            (
                "transcription.base_url",
                serde_json::json!(self.transcription.base_url),
            ),
            ("transcription.api_key", masked(&self.transcription.api_key)),
            (
                "transcription.model",
                serde_json::json!(self.transcription.model),
            ),
            ("speech.base_url", serde_json::json!(self.speech.base_url)),
            ("speech.api_key", masked(&self.speech.api_key)),
            ("speech.model", serde_json::json!(self.speech.model)),
            ("speech.voice", serde_json::json!(self.speech.voice)),
            (
                "extraction.video_enabled",
                serde_json::json!(self.extraction.video_enabled),
            ),
            (
                "extraction.fetch_timeout_secs",
                serde_json::json!(self.extraction.fetch_timeout_secs),
            ),
            (
                "extraction.max_source_bytes",
                serde_json::json!(self.extraction.max_source_bytes),
            ),
            (
                "video.transcript_base_url",
                serde_json::json!(self.video.transcript_base_url),
            ),
        ];

        entries
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect()
    }

    /// Apply DB settings as overrides to this config
    pub fn merge_from_db(&mut self, db_settings: &HashMap<String, serde_json::Value>) {
        for (key, value) in db_settings {
            self.apply_setting(key, value);
        }
    }

    /// Apply a single setting value
    fn apply_setting(&mut self, key: &str, value: &serde_json::Value) {
        let as_string = || value.as_str().map(str::to_string);

        match key {
            // LLM settings
            "llm.base_url" => {
                if let Some(v) = as_string() {
                    self.llm.base_url = v;
                }
            }
            "llm.model" => {
                if let Some(v) = as_string() {
                    self.llm.model = v;
                }
            }
            "llm.temperature" => {
                if let Some(v) = value.as_f64() {
                    self.llm.temperature = v as f32;
                }
            }
            "llm.request_timeout_secs" => {
                if let Some(v) = value.as_u64() {
                    self.llm.request_timeout_secs = v;
                }
            }

            // Transcription settings
            "transcription.base_url" => {
                if let Some(v) = as_string() {
                    self.transcription.base_url = v;
                }
            }
            "transcription.api_key" => {
                if let Some(v) = as_string() {
                    self.transcription.api_key = v;
                }
            }
            "transcription.model" => {
                if let Some(v) = as_string() {
                    self.transcription.model = v;
                }
            }

            // Speech settings
            "speech.base_url" => {
                if let Some(v) = as_string() {
                    self.speech.base_url = v;
                }
            }
            "speech.api_key" => {
                if let Some(v) = as_string() {
                    self.speech.api_key = v;
                }
            }
            "speech.model" => {
                if let Some(v) = as_string() {
                    self.speech.model = v;
                }
            }
            "speech.voice" => {
                if let Some(v) = as_string() {
                    self.speech.voice = v;
                }
            }

            // Extraction settings
            "extraction.video_enabled" => {
                if let Some(v) = value.as_bool() {
                    self.extraction.video_enabled = v;
                }
            }
            "extraction.fetch_timeout_secs" => {
                if let Some(v) = value.as_u64() {
                    self.extraction.fetch_timeout_secs = v;
                }
            }
            "extraction.max_source_bytes" => {
                if let Some(v) = value.as_u64() {
                    self.extraction.max_source_bytes = v;
                }
            }

            "video.transcript_base_url" => {
                if let Some(v) = as_string() {
                    self.video.transcript_base_url = v;
                }
            }

            _ => {
                tracing::warn!(key = %key, "Unknown setting key in merge_from_db");
            }
        }
    }
}

// ==================== RuntimeConfig (combines static + dynamic) ====================

/// Runtime configuration manager
/// Combines static config (startup-only) with dynamic config (hot-reloadable via ArcSwap)
pub struct RuntimeConfig {
    /// Static configuration (never changes after startup)
    pub static_config: StaticConfig,
    /// Dynamic configuration (can be hot-reloaded)
    dynamic: ArcSwap<DynamicConfig>,
}

impl RuntimeConfig {
    pub fn new(static_config: StaticConfig, dynamic: DynamicConfig) -> Self {
        Self {
            static_config,
            dynamic: ArcSwap::from_pointee(dynamic),
        }
    }

    /// Get current dynamic config snapshot (lock-free read)
    pub fn dynamic(&self) -> arc_swap::Guard<Arc<DynamicConfig>> {
        self.dynamic.load()
    }

    /// Update dynamic config (atomic swap)
    pub fn update_dynamic(&self, new_config: DynamicConfig) {
        self.dynamic.store(Arc::new(new_config));
    }

    /// Load dynamic config from all sources with DB overrides
    pub fn load(static_config: StaticConfig, db: &Database) -> ServiceResult<Self> {
        let mut dynamic = load_dynamic_config()?;
        dynamic.merge_from_db(&db.get_all_settings()?);

        Ok(Self::new(static_config, dynamic))
    }

    /// Rebuild dynamic config from file/env defaults + DB and swap atomically
    pub fn reload_from_db(&self, db: &Database) -> ServiceResult<()> {
        let mut dynamic = load_dynamic_config()?;
        dynamic.merge_from_db(&db.get_all_settings()?);
        self.update_dynamic(dynamic);
        Ok(())
    }
}

// ==================== Config Loading Functions ====================

fn config_sources() -> ServiceResult<Config> {
    Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to build config: {}", e),
        })
}

/// Load static configuration from file and env vars
pub fn load_static_config() -> ServiceResult<StaticConfig> {
    config_sources()?
        .try_deserialize()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to deserialize static config: {}", e),
        })
}

/// Load dynamic configuration from file and env vars (without DB overrides)
fn load_dynamic_config() -> ServiceResult<DynamicConfig> {
    config_sources()?
        .try_deserialize()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to deserialize dynamic config: {}", e),
        })
}

// ==================== Default Value Functions ====================

fn default_server() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_storage() -> StorageConfig {
    StorageConfig {
        data_dir: default_data_dir(),
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_auth() -> AuthConfig {
    AuthConfig {
        session_ttl_days: default_session_ttl_days(),
        min_password_len: default_min_password_len(),
    }
}

fn default_session_ttl_days() -> i64 {
    30
}

fn default_min_password_len() -> usize {
    6
}

fn default_llm() -> LlmConfig {
    LlmConfig {
        base_url: default_llm_url(),
        model: default_model(),
        temperature: default_temperature(),
        request_timeout_secs: default_request_timeout_secs(),
    }
}

fn default_llm_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.2".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_openai_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_transcription() -> TranscriptionConfig {
    TranscriptionConfig {
        base_url: default_openai_url(),
        api_key: String::new(),
        model: default_transcription_model(),
    }
}

fn default_transcription_model() -> String {
    "whisper-1".to_string()
}

fn default_speech() -> SpeechConfig {
    SpeechConfig {
        base_url: default_openai_url(),
        api_key: String::new(),
        model: default_speech_model(),
        voice: default_speech_voice(),
    }
}

fn default_speech_model() -> String {
    "tts-1".to_string()
}

fn default_speech_voice() -> String {
    "alloy".to_string()
}

fn default_extraction() -> ExtractionConfig {
    ExtractionConfig {
        video_enabled: false,
        fetch_timeout_secs: default_fetch_timeout_secs(),
        max_source_bytes: default_max_source_bytes(),
    }
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_max_source_bytes() -> u64 {
    104_857_600 // 100MB
}

fn default_video() -> VideoConfig {
    VideoConfig {
        transcript_base_url: default_transcript_base_url(),
    }
}

fn default_transcript_base_url() -> String {
    "https://www.youtube.com".to_string()
}
