//! Local GGUF language model served by mistral.rs
//!
//! The model lives on its own tokio runtime; `generate` is called from a
//! worker thread and blocks on it. Streaming lets a cancelled request stop
//! between chunks instead of running to `max_tokens`.

use crate::collaborators::LanguageModel;
use crate::config::NeoConfig;
use crate::llm::context::{persona_prompt, ConversationContext, Message, MessageRole};
use crate::{NeoError, Result};
use mistralrs::{GgufModelBuilder, RequestBuilder, Response, TextMessageRole};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct MistralModel {
    runtime: Runtime,
    model: Arc<mistralrs::Model>,
    context: Mutex<ConversationContext>,
    max_tokens: usize,
    temperature: f64,
    label: String,
}

impl MistralModel {
    /// Locate and load the configured GGUF file
    pub fn load(config: &NeoConfig) -> Result<Self> {
        let models = &config.models;
        let path = models.locator().resolve(&models.llm_file).ok_or_else(|| {
            NeoError::ModelLoadError(format!("{} not found", models.llm_file))
        })?;
        let dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        let file = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .ok_or_else(|| NeoError::ModelLoadError(format!("bad model path {}", path.display())))?;

        info!("Loading language model from {}", path.display());

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("neo-llm")
            .enable_all()
            .build()
            .map_err(|e| NeoError::ModelLoadError(format!("Failed to start runtime: {}", e)))?;

        let model = runtime
            .block_on(
                GgufModelBuilder::new(dir.to_string_lossy(), vec![file.clone()]).build(),
            )
            .map_err(|e| NeoError::ModelLoadError(format!("Failed to load {}: {}", file, e)))?;

        info!("Language model ready");

        Ok(Self {
            runtime,
            model: Arc::new(model),
            context: Mutex::new(ConversationContext::new(
                &persona_prompt(&config.assistant_name),
                models.history_turns,
            )),
            max_tokens: models.max_tokens,
            temperature: models.temperature,
            label: file,
        })
    }

    fn build_request(&self, messages: &[Message]) -> RequestBuilder {
        let mut request = RequestBuilder::new();
        for msg in messages {
            let role = match msg.role {
                MessageRole::System => TextMessageRole::System,
                MessageRole::User => TextMessageRole::User,
                MessageRole::Assistant => TextMessageRole::Assistant,
            };
            request = request.add_message(role, &msg.content);
        }
        request
            .set_sampler_max_len(self.max_tokens)
            .set_sampler_temperature(self.temperature)
    }

    async fn stream_reply(
        model: Arc<mistralrs::Model>,
        request: RequestBuilder,
        cancel: CancellationToken,
    ) -> Result<String> {
        let mut stream = model
            .stream_chat_request(request)
            .await
            .map_err(|e| NeoError::GenerationError(format!("Chat request failed: {}", e)))?;

        let mut reply = String::new();
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Generation cancelled after {} chars", reply.len());
                    return Err(NeoError::GenerationError("cancelled".to_string()));
                }
                next = stream.next() => next,
            };
            match next {
                Some(Response::Chunk(chunk)) => {
                    if let Some(choice) = chunk.choices.first() {
                        if let Some(content) = &choice.delta.content {
                            reply.push_str(content);
                        }
                    }
                }
                Some(Response::ModelError(msg, _)) => {
                    return Err(NeoError::GenerationError(msg));
                }
                Some(Response::InternalError(e)) => {
                    return Err(NeoError::GenerationError(e.to_string()));
                }
                Some(Response::ValidationError(e)) => {
                    return Err(NeoError::GenerationError(e.to_string()));
                }
                Some(_) => {}
                None => break,
            }
        }
        Ok(reply)
    }
}

impl LanguageModel for MistralModel {
    fn name(&self) -> &str {
        &self.label
    }

    fn is_available(&self) -> bool {
        true
    }

    fn generate(&self, prompt: &str, cancel: &CancellationToken) -> Result<String> {
        let messages = self.context.lock().with_prompt(prompt);
        let request = self.build_request(&messages);

        let result = self.runtime.block_on(Self::stream_reply(
            self.model.clone(),
            request,
            cancel.clone(),
        ));

        match result {
            Ok(reply) if !reply.trim().is_empty() => {
                let reply = reply.trim().to_string();
                if !cancel.is_cancelled() {
                    self.context.lock().record_exchange(prompt, &reply);
                }
                Ok(reply)
            }
            Ok(_) => Err(NeoError::GenerationError("empty reply".to_string())),
            Err(e) => {
                warn!("Language model request failed: {}", e);
                Err(e)
            }
        }
    }
}
