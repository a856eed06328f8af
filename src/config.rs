//! Configuration for the Neo assistant
//!
//! Loaded from TOML. Every field has a default so a missing file, a missing
//! section or a missing key all fall back to the built-in behavior.

use crate::command::ACTION_KEYWORDS;
use crate::{NeoError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Top-level configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NeoConfig {
    /// Persona name used in prompts and console output
    pub assistant_name: String,
    /// Spoken once at startup; `None` disables the greeting
    pub greeting: Option<String>,
    pub coordinator: CoordinatorConfig,
    pub models: ModelConfig,
    pub speech: SpeechConfig,
    pub recognizer: RecognizerConfig,
    pub hotkey: HotkeyConfig,
}

impl Default for NeoConfig {
    fn default() -> Self {
        Self {
            assistant_name: "Neo".to_string(),
            greeting: Some("Systems online. Welcome back, sir.".to_string()),
            coordinator: CoordinatorConfig::default(),
            models: ModelConfig::default(),
            speech: SpeechConfig::default(),
            recognizer: RecognizerConfig::default(),
            hotkey: HotkeyConfig::default(),
        }
    }
}

impl NeoConfig {
    /// Default config file location (`<config dir>/neo/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("neo").join("config.toml"))
    }

    /// Load a configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            NeoError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml(&content)
            .map_err(|e| NeoError::ConfigError(format!("{}: {}", path.display(), e)))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse a configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: NeoConfig =
            toml::from_str(content).map_err(|e| NeoError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, else the default file if it exists, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(default) if default.exists() => Self::load(default),
            _ => {
                debug!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Set the generation deadline
    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.coordinator.generation_timeout_ms = millis(timeout);
        self
    }

    /// Set the action cool-down
    pub fn with_action_cooldown(mut self, cooldown: Duration) -> Self {
        self.coordinator.action_cooldown_ms = millis(cooldown);
        self
    }

    /// Disable the startup greeting
    pub fn without_greeting(mut self) -> Self {
        self.greeting = None;
        self
    }

    /// Disable the speech recognizer (typed input only)
    pub fn without_voice_input(mut self) -> Self {
        self.recognizer.enabled = false;
        self
    }

    /// Disable the global hotkey
    pub fn without_hotkey(mut self) -> Self {
        self.hotkey.enabled = false;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.coordinator.generation_timeout_ms == 0 {
            return Err(NeoError::ConfigError(
                "generation_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.coordinator.action_keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(NeoError::ConfigError(
                "action_keywords must contain at least one keyword".to_string(),
            ));
        }
        if self.speech.backends.is_empty() {
            return Err(NeoError::ConfigError(
                "speech.backends must list at least one backend".to_string(),
            ));
        }
        if self.recognizer.sample_rate == 0 {
            return Err(NeoError::ConfigError(
                "recognizer.sample_rate must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Turn coordinator timing and classification
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Deadline for a generation request
    pub generation_timeout_ms: u64,
    /// Time spent in the executing state after an action returns
    pub action_cooldown_ms: u64,
    /// How long shutdown waits for worker threads
    pub shutdown_timeout_ms: u64,
    /// Any of these (case-insensitive substring) makes a command an action
    pub action_keywords: Vec<String>,
    /// Spoken instead of a reply that missed its deadline
    pub timeout_apology: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            generation_timeout_ms: 30_000,
            action_cooldown_ms: 2_000,
            shutdown_timeout_ms: 5_000,
            action_keywords: ACTION_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            timeout_apology: "My apologies, sir. That request took too long to process."
                .to_string(),
        }
    }
}

impl CoordinatorConfig {
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }

    pub fn action_cooldown(&self) -> Duration {
        Duration::from_millis(self.action_cooldown_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

/// Whole milliseconds in `d`, saturating at `u64::MAX`
fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Model files and generation parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Extra directories searched after the user cache directory
    pub search_dirs: Vec<PathBuf>,
    /// GGUF language model file name
    pub llm_file: String,
    /// Whisper model file name
    pub whisper_file: String,
    /// VITS model file name
    pub tts_model_file: String,
    /// VITS tokens file name
    pub tts_tokens_file: String,
    /// Maximum tokens per reply
    pub max_tokens: usize,
    /// Sampling temperature
    pub temperature: f64,
    /// Number of previous exchanges kept in the prompt
    pub history_turns: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            search_dirs: Vec::new(),
            llm_file: "Phi-3-mini-4k-instruct-q4.gguf".to_string(),
            whisper_file: "ggml-base.en.bin".to_string(),
            tts_model_file: "en_US-ryan-medium.onnx".to_string(),
            tts_tokens_file: "tokens.txt".to_string(),
            max_tokens: 100,
            temperature: 0.7,
            history_turns: 6,
        }
    }
}

impl ModelConfig {
    /// Locator over the standard search order plus `search_dirs`
    pub fn locator(&self) -> ModelLocator {
        ModelLocator::standard(&self.search_dirs)
    }
}

/// Finds model files by a fixed search order
#[derive(Clone, Debug)]
pub struct ModelLocator {
    dirs: Vec<PathBuf>,
}

impl ModelLocator {
    /// Search exactly the given directories, in order
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    /// User cache, then `extra`, then `./models`, then `<exe dir>/models`
    pub fn standard(extra: &[PathBuf]) -> Self {
        let mut dirs = Vec::new();
        if let Some(cache) = dirs::cache_dir() {
            dirs.push(cache.join("neo").join("models"));
        }
        dirs.extend(extra.iter().cloned());
        dirs.push(PathBuf::from("models"));
        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            dirs.push(exe_dir.join("models"));
        }
        Self { dirs }
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Resolve a model file name to the first existing path
    ///
    /// Absolute paths are returned as-is when they exist.
    pub fn resolve(&self, file: &str) -> Option<PathBuf> {
        let candidate = Path::new(file);
        if candidate.is_absolute() {
            return candidate.exists().then(|| candidate.to_path_buf());
        }
        let found = self
            .dirs
            .iter()
            .map(|dir| dir.join(file))
            .find(|path| path.exists());
        match &found {
            Some(path) => debug!("Resolved model {} -> {}", file, path.display()),
            None => debug!("Model {} not found in {} directories", file, self.dirs.len()),
        }
        found
    }
}

/// Voice backends in the TTS fallback chain
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TtsBackendKind {
    /// VITS neural voice (requires the `sherpa` feature)
    Sherpa,
    EspeakNg,
    Espeak,
    /// speech-dispatcher
    SpdSay,
    /// macOS `say`
    Say,
    /// Print to the terminal
    Console,
}

/// Text-to-speech settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Backends tried in order; the first available one is used
    pub backends: Vec<TtsBackendKind>,
    /// Speaking rate for command-line synthesizers (words per minute)
    pub rate_wpm: u32,
    /// Simulated speaking time per character for the console backend
    pub console_ms_per_char: u64,
    /// WAV player for synthesized audio; detected when unset
    pub player: Option<String>,
    /// Speaker id for multi-speaker VITS models
    pub speaker_id: i32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            backends: vec![
                TtsBackendKind::Sherpa,
                TtsBackendKind::EspeakNg,
                TtsBackendKind::Espeak,
                TtsBackendKind::SpdSay,
                TtsBackendKind::Say,
                TtsBackendKind::Console,
            ],
            rate_wpm: 150,
            console_ms_per_char: 50,
            player: None,
            speaker_id: 0,
        }
    }
}

/// Speech recognition settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    pub enabled: bool,
    /// Sample rate fed to the recognizer
    pub sample_rate: u32,
    /// RMS level above which a chunk counts as speech
    pub energy_threshold: f32,
    /// Silence that ends an utterance
    pub min_silence_ms: u32,
    /// Utterances shorter than this are discarded
    pub min_speech_ms: u32,
    /// Utterances are cut at this length
    pub max_segment_secs: f32,
    pub n_threads: i32,
    pub language: Option<String>,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_rate: 16_000,
            energy_threshold: 0.01,
            min_silence_ms: 600,
            min_speech_ms: 250,
            max_segment_secs: 15.0,
            n_threads: 4,
            language: Some("en".to_string()),
        }
    }
}

/// Global hotkey settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeyConfig {
    pub enabled: bool,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = NeoConfig::default();
        assert_eq!(config.coordinator.generation_timeout(), Duration::from_secs(30));
        assert_eq!(config.coordinator.action_cooldown(), Duration::from_secs(2));
        assert_eq!(config.coordinator.action_keywords.len(), ACTION_KEYWORDS.len());
        assert_eq!(config.speech.backends.last(), Some(&TtsBackendKind::Console));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = NeoConfig::from_toml(
            r#"
            assistant_name = "Jarvis"

            [coordinator]
            generation_timeout_ms = 5000

            [speech]
            backends = ["espeak-ng", "console"]
            "#,
        )
        .unwrap();

        assert_eq!(config.assistant_name, "Jarvis");
        assert_eq!(config.coordinator.generation_timeout_ms, 5000);
        assert_eq!(config.coordinator.action_cooldown_ms, 2000);
        assert_eq!(
            config.speech.backends,
            vec![TtsBackendKind::EspeakNg, TtsBackendKind::Console]
        );
        assert!(config.recognizer.enabled);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(NeoConfig::from_toml("[coordinator]\ngeneration_timeout_ms = 0").is_err());
        assert!(NeoConfig::from_toml("[coordinator]\naction_keywords = []").is_err());
        assert!(NeoConfig::from_toml("[speech]\nbackends = []").is_err());
        assert!(NeoConfig::from_toml("[speech]\nbackends = [\"festival\"]").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "greeting = \"Hello\"\n[hotkey]\nenabled = false").unwrap();

        let config = NeoConfig::load(file.path()).unwrap();
        assert_eq!(config.greeting.as_deref(), Some("Hello"));
        assert!(!config.hotkey.enabled);
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = NeoConfig::load("/nonexistent/neo/config.toml").unwrap_err();
        assert!(matches!(err, NeoError::ConfigError(_)));
    }

    #[test]
    fn test_builder_methods() {
        let config = NeoConfig::default()
            .with_generation_timeout(Duration::from_millis(250))
            .with_action_cooldown(Duration::ZERO)
            .without_greeting()
            .without_voice_input()
            .without_hotkey();

        assert_eq!(config.coordinator.generation_timeout_ms, 250);
        assert_eq!(config.coordinator.action_cooldown_ms, 0);
        assert!(config.greeting.is_none());
        assert!(!config.recognizer.enabled);
        assert!(!config.hotkey.enabled);
    }

    #[test]
    fn test_builder_saturates_huge_durations() {
        let config = NeoConfig::default()
            .with_generation_timeout(Duration::MAX)
            .with_action_cooldown(Duration::from_secs(u64::MAX));

        assert_eq!(config.coordinator.generation_timeout_ms, u64::MAX);
        assert_eq!(config.coordinator.action_cooldown_ms, u64::MAX);
        assert_eq!(
            config.coordinator.generation_timeout(),
            Duration::from_millis(u64::MAX)
        );
    }

    #[test]
    fn test_locator_search_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(second.path().join("model.gguf"), b"x").unwrap();

        let locator = ModelLocator::new(vec![
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ]);
        assert_eq!(
            locator.resolve("model.gguf"),
            Some(second.path().join("model.gguf"))
        );

        std::fs::write(first.path().join("model.gguf"), b"x").unwrap();
        assert_eq!(
            locator.resolve("model.gguf"),
            Some(first.path().join("model.gguf"))
        );
        assert_eq!(locator.resolve("other.gguf"), None);
    }

    #[test]
    fn test_locator_absolute_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abs.bin");
        std::fs::write(&path, b"x").unwrap();

        let locator = ModelLocator::new(Vec::new());
        assert_eq!(locator.resolve(path.to_str().unwrap()), Some(path.clone()));
        assert_eq!(
            locator.resolve(dir.path().join("missing.bin").to_str().unwrap()),
            None
        );
    }

    #[test]
    fn test_standard_locator_puts_extra_dirs_after_cache() {
        let extra = PathBuf::from("/opt/neo/models");
        let locator = ModelLocator::standard(std::slice::from_ref(&extra));
        let dirs = locator.search_dirs();
        let extra_pos = dirs.iter().position(|d| d == &extra).unwrap();
        let local_pos = dirs.iter().position(|d| d == Path::new("models")).unwrap();
        assert!(extra_pos < local_pos);
        if dirs::cache_dir().is_some() {
            assert_eq!(extra_pos, 1);
        }
    }
}
