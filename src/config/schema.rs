use crate::error::ConfigError;
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Path to config.toml - computed, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub keys: ApiKeys,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub commands: CommandsConfig,

    #[serde(default)]
    pub prompts: PromptConfig,
}

// ── API keys ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiKeys {
    #[serde(default)]
    pub gemini: Option<String>,
    #[serde(default)]
    pub deepgram: Option<String>,
    #[serde(default)]
    pub google_search: Option<String>,
    #[serde(default)]
    pub google_cse_id: Option<String>,
    #[serde(default)]
    pub weather: Option<String>,
}

// ── Generation parameters ────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

fn default_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_temperature() -> f64 {
    0.3
}
fn default_top_k() -> u32 {
    20
}
fn default_top_p() -> f64 {
    0.4
}
fn default_max_output_tokens() -> u32 {
    800
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            top_k: default_top_k(),
            top_p: default_top_p(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

// ── Conversation memory ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// When disabled, turns are neither read nor recorded.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Retention cap: oldest turns are evicted past this bound.
    #[serde(default = "default_max_history_size")]
    pub max_history_size: usize,
    /// Prompt window: how many recent turns are sent to the model.
    #[serde(default = "default_memory_window")]
    pub window: usize,
}

fn default_true() -> bool {
    true
}
fn default_max_history_size() -> usize {
    50
}
fn default_memory_window() -> usize {
    10
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_history_size: default_max_history_size(),
            window: default_memory_window(),
        }
    }
}

// ── Transient media ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Where the transport saves inbound media files.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
    /// Images stay queryable this long (follow-up questions window).
    #[serde(default = "default_image_ttl_secs")]
    pub image_ttl_secs: u64,
    /// Voice notes are transcribed immediately, so reclaimed sooner.
    #[serde(default = "default_voice_ttl_secs")]
    pub voice_ttl_secs: u64,
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("./assets")
}
fn default_image_ttl_secs() -> u64 {
    300
}
fn default_voice_ttl_secs() -> u64 {
    60
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            image_ttl_secs: default_image_ttl_secs(),
            voice_ttl_secs: default_voice_ttl_secs(),
        }
    }
}

impl MediaConfig {
    pub fn image_ttl(&self) -> Duration {
        Duration::from_secs(self.image_ttl_secs)
    }

    pub fn voice_ttl(&self) -> Duration {
        Duration::from_secs(self.voice_ttl_secs)
    }
}

// ── Command table ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    #[serde(default = "default_reset")]
    pub reset: Vec<String>,
    #[serde(default = "default_system_prompt_cmd")]
    pub system_prompt: String,
    #[serde(default = "default_chat_off")]
    pub chat_off: String,
    #[serde(default = "default_chat_on")]
    pub chat_on: String,
    #[serde(default = "default_search")]
    pub search: String,
    #[serde(default = "default_news")]
    pub news: String,
    #[serde(default = "default_weather")]
    pub weather: String,
    #[serde(default = "default_image_prefix")]
    pub image_prefix: String,
    /// Phrases that mark a plain message as a question about the last image.
    #[serde(default = "default_image_references")]
    pub image_references: Vec<String>,
}

fn default_reset() -> Vec<String> {
    vec!["/reiniciar".into(), "/reset".into()]
}
fn default_system_prompt_cmd() -> String {
    "/prompt".into()
}
fn default_chat_off() -> String {
    "/chat-off".into()
}
fn default_chat_on() -> String {
    "/chat-on".into()
}
fn default_search() -> String {
    "busca en internet ".into()
}
fn default_news() -> String {
    "/noticias".into()
}
fn default_weather() -> String {
    "/clima".into()
}
fn default_image_prefix() -> String {
    "imagen ".into()
}
fn default_image_references() -> Vec<String> {
    vec![
        "en la imagen".into(),
        "en la foto".into(),
        "de la imagen".into(),
        "de la foto".into(),
    ]
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            reset: default_reset(),
            system_prompt: default_system_prompt_cmd(),
            chat_off: default_chat_off(),
            chat_on: default_chat_on(),
            search: default_search(),
            news: default_news(),
            weather: default_weather(),
            image_prefix: default_image_prefix(),
            image_references: default_image_references(),
        }
    }
}

// ── Prompts ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Global default persona; sessions without an override fall back here.
    #[serde(default = "default_assistant_prompt")]
    pub default_assistant: String,
    #[serde(default = "default_image_description_prompt")]
    pub image_description: String,
}

fn default_assistant_prompt() -> String {
    "Sos iAro, un asistente virtual amable y directo. Respondé en español, \
     de forma clara y natural, usando el historial de la conversación cuando ayude."
        .into()
}

fn default_image_description_prompt() -> String {
    "Por favor, describe esta imagen en español de manera detallada y natural.".into()
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            default_assistant: default_assistant_prompt(),
            image_description: default_image_description_prompt(),
        }
    }
}

// ── Load / save ──────────────────────────────────────────────────

impl Config {
    /// Load from `~/.iaro/config.toml`, creating it with defaults on first run.
    pub fn load_or_init() -> Result<Self, ConfigError> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .ok_or_else(|| ConfigError::Load("could not find home directory".into()))?;
        let iaro_dir = home.join(".iaro");
        Self::load_or_init_at(&iaro_dir.join("config.toml"))
    }

    /// Load from an explicit path, creating it with defaults if absent.
    pub fn load_or_init_at(config_path: &Path) -> Result<Self, ConfigError> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut config = if config_path.exists() {
            let contents = fs::read_to_string(config_path)?;
            toml::from_str::<Self>(&contents)?
        } else {
            let config = Self::default();
            fs::write(config_path, toml::to_string_pretty(&config).unwrap_or_default())?;
            config
        };

        config.config_path = config_path.to_path_buf();
        config.apply_env_overrides();
        Ok(config)
    }

    /// Environment variables win over the config file for API keys.
    pub fn apply_env_overrides(&mut self) {
        let overrides: [(&str, &mut Option<String>); 5] = [
            ("GEMINI_API_KEY", &mut self.keys.gemini),
            ("DEEPGRAM_API_KEY", &mut self.keys.deepgram),
            ("GOOGLE_API_KEY", &mut self.keys.google_search),
            ("GOOGLE_CSE_ID", &mut self.keys.google_cse_id),
            ("WEATHER_API_KEY", &mut self.keys.weather),
        ];
        for (var, slot) in overrides {
            if let Ok(value) = std::env::var(var)
                && !value.is_empty()
            {
                *slot = Some(value);
            }
        }
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let toml_str = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Load(format!("serialize failed: {e}")))?;
        fs::write(&self.config_path, toml_str)?;
        Ok(())
    }
}
