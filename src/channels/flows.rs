use super::traits::{ChannelTransport, InboundEvent, MediaKind, MediaRef};
use crate::commands::{Command, parse_command};
use crate::config::Config;
use crate::error::SearchError;
use crate::providers::ChatProvider;
use crate::search::SearchService;
use crate::sessions::SessionManager;
use crate::transcription::Transcriber;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, error, info};

const FALLBACK_CHAT: &str = "Lo siento, hubo un error al procesar tu mensaje.";
const FALLBACK_IMAGE: &str = "Lo siento, hubo un error al procesar la imagen.";
const FALLBACK_AUDIO: &str = "Ocurrió un error al procesar el audio.";
const FALLBACK_SEARCH: &str =
    "Hubo un error al buscar la información. Por favor, intenta más tarde.";
const NO_SEARCH_RESULTS: &str = "No encontré información relevante sobre tu búsqueda.";
const FALLBACK_NEWS: &str = "No pude obtener las noticias en este momento.";
const FALLBACK_WEATHER: &str = "No pude obtener la información del clima.";
const NO_RECENT_IMAGE: &str = "No hay una imagen reciente sobre la cual responder.";

/// Routes inbound events through the session core and out to the model,
/// transcription and search boundaries.
///
/// Session state is only touched synchronously; every await lands in an
/// external client or the transport.
pub struct FlowRouter {
    sessions: Arc<SessionManager>,
    provider: Arc<dyn ChatProvider>,
    transcriber: Arc<dyn Transcriber>,
    search: Arc<SearchService>,
    config: Arc<Config>,
}

impl FlowRouter {
    #[must_use]
    pub fn new(
        sessions: Arc<SessionManager>,
        provider: Arc<dyn ChatProvider>,
        transcriber: Arc<dyn Transcriber>,
        search: Arc<SearchService>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            sessions,
            provider,
            transcriber,
            search,
            config,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub async fn dispatch(
        &self,
        transport: &dyn ChannelTransport,
        event: InboundEvent,
    ) -> Result<()> {
        match event {
            InboundEvent::Text { user_id, text } => {
                self.handle_text(transport, &user_id, &text).await
            }
            InboundEvent::Media {
                user_id,
                media,
                caption,
            } => match media.kind {
                MediaKind::Image => {
                    self.handle_image(transport, &user_id, &media, caption.as_deref())
                        .await
                }
                MediaKind::Voice => self.handle_voice(transport, &user_id, &media).await,
            },
        }
    }

    // ── Text flow ────────────────────────────────────────────────

    pub async fn handle_text(
        &self,
        transport: &dyn ChannelTransport,
        user_id: &str,
        text: &str,
    ) -> Result<()> {
        if let Some(command) = parse_command(text, &self.config.commands) {
            return self.handle_command(transport, user_id, text, command).await;
        }

        // The cheap flag check gates all model work for muted users.
        if !self.sessions.is_chat_enabled(user_id) {
            debug!(user = user_id, "chat disabled, ignoring message");
            return Ok(());
        }

        self.chat_reply(transport, user_id, text).await
    }

    async fn handle_command(
        &self,
        transport: &dyn ChannelTransport,
        user_id: &str,
        raw_text: &str,
        command: Command,
    ) -> Result<()> {
        match command {
            Command::Usage(hint) => transport.reply(user_id, hint).await?,

            Command::Reset { target } => {
                let (subject, reply) = match target {
                    Some(number) => {
                        let reply = format!(
                            "Chat reiniciado para el número {number}. El prompt del sistema se mantiene."
                        );
                        (number, reply)
                    }
                    None => (
                        user_id.to_string(),
                        "Chat reiniciado. El prompt del sistema se mantiene. ¿En qué puedo ayudarte?"
                            .to_string(),
                    ),
                };
                self.sessions.reset_chat(&subject);
                info!(user = user_id, subject = %subject, "chat reset");
                transport.reply(user_id, &reply).await?;
            }

            Command::ChatOn { target } => {
                let subject = target.unwrap_or_else(|| user_id.to_string());
                self.sessions.set_chat_enabled(&subject, true);
                let reply = if subject == user_id {
                    "Chat activado. He vuelto a estar disponible.".to_string()
                } else {
                    format!("Chat activado para el número {subject}.")
                };
                transport.reply(user_id, &reply).await?;
            }

            Command::ChatOff { target } => {
                let subject = target.unwrap_or_else(|| user_id.to_string());
                self.sessions.set_chat_enabled(&subject, false);
                let reply = if subject == user_id {
                    "Chat desactivado. Ya no responderé a tus mensajes.".to_string()
                } else {
                    format!("Chat desactivado para el número {subject}.")
                };
                transport.reply(user_id, &reply).await?;
            }

            Command::SetSystemPrompt { target, prompt } => {
                let subject = target.unwrap_or_else(|| user_id.to_string());
                self.sessions.set_system_prompt(&subject, &prompt);
                let reply = if subject == user_id {
                    "Prompt del sistema actualizado.".to_string()
                } else {
                    format!("Prompt del sistema actualizado para el número {subject}.")
                };
                transport.reply(user_id, &reply).await?;
            }

            Command::Search(query) => {
                transport.reply(user_id, "🔍 Buscando información...").await?;
                match self.search.search(&query).await {
                    Ok(answer) => {
                        if self.config.memory.enabled {
                            self.sessions.record_turn(user_id, raw_text, &answer);
                        }
                        transport.reply(user_id, &answer).await?;
                    }
                    Err(SearchError::NoResults) => {
                        transport.reply(user_id, NO_SEARCH_RESULTS).await?;
                    }
                    Err(error) => {
                        error!(user = user_id, %error, "web search failed");
                        transport.reply(user_id, FALLBACK_SEARCH).await?;
                    }
                }
            }

            Command::News => match self.search.news().await {
                Ok(news) => transport.reply(user_id, &news).await?,
                Err(error) => {
                    error!(user = user_id, %error, "news fetch failed");
                    transport.reply(user_id, FALLBACK_NEWS).await?;
                }
            },

            Command::Weather(city) => match self.search.weather(&city).await {
                Ok(weather) => transport.reply(user_id, &weather).await?,
                Err(error) => {
                    error!(user = user_id, %error, "weather fetch failed");
                    transport.reply(user_id, FALLBACK_WEATHER).await?;
                }
            },

            Command::AskAboutImage(question) => {
                let Some(path) = self.sessions.last_image(user_id) else {
                    transport.reply(user_id, NO_RECENT_IMAGE).await?;
                    return Ok(());
                };
                match self.provider.describe_image(&question, &path).await {
                    Ok(answer) => transport.reply(user_id, &answer).await?,
                    Err(error) => {
                        error!(user = user_id, %error, "image follow-up failed");
                        transport.reply(user_id, FALLBACK_IMAGE).await?;
                    }
                }
            }
        }
        Ok(())
    }

    async fn chat_reply(
        &self,
        transport: &dyn ChannelTransport,
        user_id: &str,
        text: &str,
    ) -> Result<()> {
        let memory = &self.config.memory;
        let history = if memory.enabled {
            self.sessions.history(user_id, memory.window)
        } else {
            Vec::new()
        };
        let system_prompt = self
            .sessions
            .system_prompt(user_id)
            .unwrap_or_else(|| self.config.prompts.default_assistant.clone());

        match self.provider.chat(&system_prompt, &history, text).await {
            Ok(answer) => {
                if memory.enabled {
                    self.sessions.record_turn(user_id, text, &answer);
                }
                transport.reply(user_id, &answer).await?;
            }
            Err(error) => {
                error!(user = user_id, %error, "chat generation failed");
                transport.reply(user_id, FALLBACK_CHAT).await?;
            }
        }
        Ok(())
    }

    // ── Image flow ───────────────────────────────────────────────

    pub async fn handle_image(
        &self,
        transport: &dyn ChannelTransport,
        user_id: &str,
        media: &MediaRef,
        caption: Option<&str>,
    ) -> Result<()> {
        if !self.sessions.is_chat_enabled(user_id) {
            debug!(user = user_id, "chat disabled, ignoring image");
            return Ok(());
        }

        let path = transport.save_media(media).await?;
        let ttl = self.config.media.image_ttl();
        self.sessions.set_last_image(user_id, &path, ttl);

        let prompt = caption
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map_or_else(
                || self.config.prompts.image_description.clone(),
                ToString::to_string,
            );

        match self.provider.describe_image(&prompt, &path).await {
            Ok(answer) => {
                transport.reply(user_id, &answer).await?;
                let minutes = ttl.as_secs() / 60;
                transport
                    .reply(
                        user_id,
                        &format!(
                            "Puedes hacerme preguntas específicas sobre esta imagen durante los próximos {minutes} minutos."
                        ),
                    )
                    .await?;
            }
            Err(error) => {
                error!(user = user_id, %error, "image description failed");
                transport.reply(user_id, FALLBACK_IMAGE).await?;
            }
        }
        Ok(())
    }

    // ── Voice flow ───────────────────────────────────────────────

    pub async fn handle_voice(
        &self,
        transport: &dyn ChannelTransport,
        user_id: &str,
        media: &MediaRef,
    ) -> Result<()> {
        if !self.sessions.is_chat_enabled(user_id) {
            debug!(user = user_id, "chat disabled, ignoring voice note");
            return Ok(());
        }

        transport.reply(user_id, "🎧 Procesando el audio...").await?;

        let path = transport.save_media(media).await?;
        // Voice notes are never re-queried; reclaim on a short fuse.
        self.sessions
            .schedule_media_cleanup(&path, self.config.media.voice_ttl());

        let transcript = match self.transcriber.transcribe(&path).await {
            Ok(transcript) => transcript,
            Err(error) => {
                error!(user = user_id, %error, "transcription failed");
                transport.reply(user_id, FALLBACK_AUDIO).await?;
                return Ok(());
            }
        };

        // A spoken search command is honored; anything else is plain chat.
        let answer = match parse_command(&transcript, &self.config.commands) {
            Some(Command::Search(query)) => {
                transport.reply(user_id, "🔍 Buscando información...").await?;
                match self.search.search(&query).await {
                    Ok(answer) => answer,
                    Err(SearchError::NoResults) => NO_SEARCH_RESULTS.to_string(),
                    Err(error) => {
                        error!(user = user_id, %error, "voice search failed");
                        FALLBACK_SEARCH.to_string()
                    }
                }
            }
            Some(Command::Usage(hint)) => hint.to_string(),
            _ => {
                let memory = &self.config.memory;
                let history = if memory.enabled {
                    self.sessions.history(user_id, memory.window)
                } else {
                    Vec::new()
                };
                match self
                    .provider
                    .chat(&self.config.prompts.default_assistant, &history, &transcript)
                    .await
                {
                    Ok(answer) => {
                        if memory.enabled {
                            self.sessions.record_turn(user_id, &transcript, &answer);
                        }
                        answer
                    }
                    Err(error) => {
                        error!(user = user_id, %error, "voice chat failed");
                        FALLBACK_CHAT.to_string()
                    }
                }
            }
        };

        transport
            .reply(
                user_id,
                &format!("🗣️ *Transcripción:*\n{transcript}\n\n📝 *Respuesta:*\n{answer}"),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::traits::{ChannelTransport, MediaKind, MediaRef};
    use crate::config::Config;
    use crate::error::{ProviderError, TranscriptionError, TransportError};
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    struct MockTransport {
        dir: PathBuf,
        replies: Mutex<Vec<String>>,
        saved: Mutex<Vec<PathBuf>>,
    }

    impl MockTransport {
        fn new(dir: &TempDir) -> Self {
            Self {
                dir: dir.path().to_path_buf(),
                replies: Mutex::new(Vec::new()),
                saved: Mutex::new(Vec::new()),
            }
        }

        fn replies(&self) -> Vec<String> {
            self.replies.lock().unwrap().clone()
        }

        fn saved(&self) -> Vec<PathBuf> {
            self.saved.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChannelTransport for MockTransport {
        async fn reply(&self, _user_id: &str, message: &str) -> Result<(), TransportError> {
            self.replies.lock().unwrap().push(message.to_string());
            Ok(())
        }

        async fn save_media(&self, media: &MediaRef) -> Result<PathBuf, TransportError> {
            let path = self.dir.join(&media.id);
            std::fs::write(&path, b"media-bytes")
                .map_err(|e| TransportError::MediaSave(e.to_string()))?;
            self.saved.lock().unwrap().push(path.clone());
            Ok(path)
        }
    }

    struct StubProvider;

    #[async_trait]
    impl ChatProvider for StubProvider {
        async fn chat(
            &self,
            system_prompt: &str,
            history: &[crate::sessions::Turn],
            text: &str,
        ) -> Result<String, ProviderError> {
            Ok(format!(
                "[{}|h{}] respuesta a: {text}",
                system_prompt.chars().take(6).collect::<String>(),
                history.len()
            ))
        }

        async fn describe_image(
            &self,
            prompt: &str,
            _image_path: &Path,
        ) -> Result<String, ProviderError> {
            Ok(format!("descripción para: {prompt}"))
        }
    }

    struct StubTranscriber(&'static str);

    #[async_trait]
    impl Transcriber for StubTranscriber {
        async fn transcribe(&self, _audio_path: &Path) -> Result<String, TranscriptionError> {
            Ok(self.0.to_string())
        }
    }

    fn router_with(transcript: &'static str) -> FlowRouter {
        let config = Arc::new(Config::default());
        let provider: Arc<dyn ChatProvider> = Arc::new(StubProvider);
        let search = Arc::new(SearchService::new(provider.clone(), config.keys.clone()));
        router_with_search(transcript, search)
    }

    fn router_with_search(transcript: &'static str, search: Arc<SearchService>) -> FlowRouter {
        let config = Arc::new(Config::default());
        let sessions = Arc::new(SessionManager::new(config.memory.max_history_size));
        let provider: Arc<dyn ChatProvider> = Arc::new(StubProvider);
        FlowRouter::new(
            sessions,
            provider,
            Arc::new(StubTranscriber(transcript)),
            search,
            config,
        )
    }

    fn router() -> FlowRouter {
        router_with("hola desde el audio")
    }

    #[tokio::test]
    async fn plain_text_chats_and_records_turns() {
        let dir = TempDir::new().unwrap();
        let transport = MockTransport::new(&dir);
        let router = router();

        router.handle_text(&transport, "u1", "hola").await.unwrap();

        let replies = transport.replies();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("respuesta a: hola"));

        let history = router.sessions().history("u1", 10);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "hola");
    }

    #[tokio::test]
    async fn second_turn_sees_windowed_history() {
        let dir = TempDir::new().unwrap();
        let transport = MockTransport::new(&dir);
        let router = router();

        router.handle_text(&transport, "u1", "hola").await.unwrap();
        router.handle_text(&transport, "u1", "¿y ahora?").await.unwrap();

        // Second reply was generated with the first exchange in context.
        assert!(transport.replies()[1].contains("|h2]"));
    }

    #[tokio::test]
    async fn disabled_chat_is_silent_but_commands_still_work() {
        let dir = TempDir::new().unwrap();
        let transport = MockTransport::new(&dir);
        let router = router();

        router.handle_text(&transport, "u1", "/chat-off").await.unwrap();
        router.handle_text(&transport, "u1", "hola").await.unwrap();

        let replies = transport.replies();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("Chat desactivado"));
        assert!(router.sessions().history("u1", 10).is_empty());

        router.handle_text(&transport, "u1", "/chat-on").await.unwrap();
        router.handle_text(&transport, "u1", "hola").await.unwrap();
        assert_eq!(transport.replies().len(), 3);
    }

    #[tokio::test]
    async fn custom_prompt_survives_reset_via_commands() {
        let dir = TempDir::new().unwrap();
        let transport = MockTransport::new(&dir);
        let router = router();

        router
            .handle_text(&transport, "u1", "/prompt hablá como pirata")
            .await
            .unwrap();
        router.handle_text(&transport, "u1", "hola").await.unwrap();
        router.handle_text(&transport, "u1", "/reset").await.unwrap();

        assert!(router.sessions().history("u1", 10).is_empty());
        assert_eq!(
            router.sessions().system_prompt("u1").as_deref(),
            Some("hablá como pirata")
        );

        // Next chat still uses the custom prompt.
        router.handle_text(&transport, "u1", "hola").await.unwrap();
        assert!(transport.replies().last().unwrap().contains("[hablá "));
    }

    #[tokio::test]
    async fn targeted_chat_off_mutes_other_user() {
        let dir = TempDir::new().unwrap();
        let transport = MockTransport::new(&dir);
        let router = router();

        router
            .handle_text(&transport, "admin", "/chat-off 341555")
            .await
            .unwrap();
        assert!(transport.replies()[0].contains("341555"));

        router.handle_text(&transport, "341555", "hola").await.unwrap();
        assert_eq!(transport.replies().len(), 1);
    }

    #[tokio::test]
    async fn image_question_without_image_says_so() {
        let dir = TempDir::new().unwrap();
        let transport = MockTransport::new(&dir);
        let router = router();

        router
            .handle_text(&transport, "u1", "imagen ¿qué se ve?")
            .await
            .unwrap();

        assert_eq!(transport.replies(), vec![NO_RECENT_IMAGE.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn image_flow_registers_image_for_follow_ups() {
        let dir = TempDir::new().unwrap();
        let transport = MockTransport::new(&dir);
        let router = router();
        let media = MediaRef {
            id: "foto.jpg".into(),
            kind: MediaKind::Image,
        };

        router
            .handle_image(&transport, "u1", &media, Some("¿qué marca es?"))
            .await
            .unwrap();

        let replies = transport.replies();
        assert!(replies[0].contains("descripción para: ¿qué marca es?"));
        assert!(replies[1].contains("5 minutos"));
        assert_eq!(router.sessions().last_image("u1"), Some(transport.saved()[0].clone()));

        // Follow-up question reuses the saved file.
        router
            .handle_text(&transport, "u1", "imagen ¿de qué color?")
            .await
            .unwrap();
        assert!(transport.replies()[2].contains("descripción para: ¿de qué color?"));
    }

    #[tokio::test(start_paused = true)]
    async fn voice_flow_replies_transcript_and_schedules_cleanup() {
        let dir = TempDir::new().unwrap();
        let transport = MockTransport::new(&dir);
        let router = router();
        let media = MediaRef {
            id: "nota.ogg".into(),
            kind: MediaKind::Voice,
        };

        router.handle_voice(&transport, "u1", &media).await.unwrap();

        let replies = transport.replies();
        assert_eq!(replies[0], "🎧 Procesando el audio...");
        assert!(replies[1].contains("🗣️ *Transcripción:*\nhola desde el audio"));
        assert!(replies[1].contains("📝 *Respuesta:*"));

        // The transcript landed in history like any text exchange.
        let history = router.sessions().history("u1", 10);
        assert_eq!(history[0].content, "hola desde el audio");

        // The audio file is reclaimed after the voice TTL.
        let saved = transport.saved()[0].clone();
        assert!(saved.exists());
        tokio::time::sleep(std::time::Duration::from_secs(61)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!saved.exists());
    }

    #[tokio::test]
    async fn search_with_no_results_replies_not_found_message() {
        use crate::config::ApiKeys;
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let keys = ApiKeys {
            google_search: Some("g-key".into()),
            google_cse_id: Some("cse-id".into()),
            ..ApiKeys::default()
        };
        let search = Arc::new(
            SearchService::new(Arc::new(StubProvider), keys).with_search_base_url(server.uri()),
        );
        let router = router_with_search("hola desde el audio", search);

        let dir = TempDir::new().unwrap();
        let transport = MockTransport::new(&dir);
        router
            .handle_text(&transport, "u1", "busca en internet nada de nada")
            .await
            .unwrap();

        let replies = transport.replies();
        assert_eq!(replies[0], "🔍 Buscando información...");
        assert_eq!(
            replies[1],
            "No encontré información relevante sobre tu búsqueda."
        );
        // The miss is not recorded as a turn.
        assert!(router.sessions().history("u1", 10).is_empty());
    }

    #[tokio::test]
    async fn usage_hint_is_replied_for_malformed_command() {
        let dir = TempDir::new().unwrap();
        let transport = MockTransport::new(&dir);
        let router = router();

        router.handle_text(&transport, "u1", "/clima").await.unwrap();

        assert_eq!(transport.replies(), vec!["Uso: /clima <ciudad>".to_string()]);
    }
}
