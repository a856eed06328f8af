//! Wiring of concrete collaborators from configuration
//!
//! Every engine that fails to load is replaced by its fallback and logged;
//! building the collaborator set never fails.

use crate::actions::SystemActions;
use crate::collaborators::{Collaborators, HotkeyListener, LanguageModel, SpeechRecognizer};
use crate::config::NeoConfig;
use crate::hotkey::SignalHotkey;
use crate::llm::Brain;
use crate::speech::{SpeechOutput, UnavailableRecognizer};
use crate::ui::TerminalDisplay;
use std::sync::Arc;
use tracing::info;

/// Build the recognizer, speaker, model chain, executor, hotkey and display
pub fn build_collaborators(config: &NeoConfig) -> Collaborators {
    let speaker = SpeechOutput::from_config(config);
    match speaker.active_backend() {
        Some(name) => info!("Voice backend: {}", name),
        None => info!("No voice backend available"),
    }

    Collaborators {
        recognizer: build_recognizer(config),
        speaker: Box::new(speaker),
        model: Arc::new(build_brain(config)),
        executor: Arc::new(SystemActions::new()),
        hotkey: build_hotkey(config),
        display: Box::new(TerminalDisplay::stdout()),
    }
}

fn build_recognizer(config: &NeoConfig) -> Box<dyn SpeechRecognizer> {
    if !config.recognizer.enabled {
        return Box::new(UnavailableRecognizer::new("disabled"));
    }
    load_recognizer(config)
}

#[cfg(feature = "whisper")]
fn load_recognizer(config: &NeoConfig) -> Box<dyn SpeechRecognizer> {
    match crate::speech::WhisperRecognizer::load(config) {
        Ok(recognizer) => Box::new(recognizer),
        Err(e) => {
            tracing::warn!("Whisper recognizer not loaded: {}", e);
            Box::new(UnavailableRecognizer::new(e.to_string()))
        }
    }
}

#[cfg(not(feature = "whisper"))]
fn load_recognizer(_config: &NeoConfig) -> Box<dyn SpeechRecognizer> {
    Box::new(UnavailableRecognizer::new("built without whisper"))
}

/// Language models in fallback order, ending in canned replies
pub fn build_brain(config: &NeoConfig) -> Brain {
    #[allow(unused_mut)]
    let mut models: Vec<Arc<dyn LanguageModel>> = Vec::new();

    #[cfg(feature = "mistral")]
    match crate::llm::MistralModel::load(config) {
        Ok(model) => models.push(Arc::new(model)),
        Err(e) => tracing::warn!("Language model not loaded, using canned replies: {}", e),
    }

    #[cfg(not(feature = "mistral"))]
    let _ = config;

    Brain::new(models)
}

fn build_hotkey(config: &NeoConfig) -> Option<Box<dyn HotkeyListener>> {
    config
        .hotkey
        .enabled
        .then(|| Box::new(SignalHotkey::new()) as Box<dyn HotkeyListener>)
}
