use super::gemini_types::{
    Content, GeminiInlineData, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
    Part,
};
use super::traits::ChatProvider;
use crate::config::LlmConfig;
use crate::error::ProviderError;
use crate::sessions::types::Turn;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const PROVIDER_NAME: &str = "gemini";

const IMAGE_SYSTEM_PROMPT: &str = "Eres un asistente experto en describir imágenes. \
    Por favor, proporciona una descripción detallada y natural en español de la imagen \
    que te muestro. Céntrate en los elementos importantes y el contexto general.";

pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    generation: GenerationConfig,
}

impl GeminiProvider {
    #[must_use]
    pub fn new(api_key: impl Into<String>, llm: &LlmConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .connect_timeout(Duration::from_secs(10))
                .pool_max_idle_per_host(10)
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: llm.model.clone(),
            generation: GenerationConfig {
                temperature: llm.temperature,
                top_k: llm.top_k,
                top_p: llm.top_p,
                max_output_tokens: llm.max_output_tokens,
            },
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// The original bot embeds the rolling history directly in the prompt
    /// text rather than as structured contents; kept for parity.
    fn build_chat_prompt(system_prompt: &str, history: &[Turn], text: &str) -> String {
        let context: String = history
            .iter()
            .map(|turn| format!("{}: {}\n", turn.role.as_str(), turn.content))
            .collect();

        format!(
            "Sos un asistente virtual con memoria de conversaciones previas.\n\n\
             Historial de la conversación:\n{context}\n\
             {system_prompt}\n\n\
             El input del usuario es el siguiente: {text}"
        )
    }

    async fn generate(&self, request: &GenerateContentRequest) -> Result<String, ProviderError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(request)
            .send()
            .await
            .map_err(|e| ProviderError::Request {
                provider: PROVIDER_NAME.into(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                provider: PROVIDER_NAME.into(),
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse =
            response.json().await.map_err(|e| ProviderError::Request {
                provider: PROVIDER_NAME.into(),
                message: format!("invalid response body: {e}"),
            })?;

        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| {
                candidate
                    .content
                    .parts
                    .into_iter()
                    .find_map(|part| part.text)
            })
            .ok_or(ProviderError::EmptyResponse {
                provider: PROVIDER_NAME.into(),
            })
    }
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    async fn chat(
        &self,
        system_prompt: &str,
        history: &[Turn],
        text: &str,
    ) -> Result<String, ProviderError> {
        let prompt = Self::build_chat_prompt(system_prompt, history, text);
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".into()),
                parts: vec![Part::text(prompt)],
            }],
            system_instruction: None,
            generation_config: self.generation,
        };
        self.generate(&request).await
    }

    async fn describe_image(
        &self,
        prompt: &str,
        image_path: &Path,
    ) -> Result<String, ProviderError> {
        let bytes =
            tokio::fs::read(image_path)
                .await
                .map_err(|source| ProviderError::MediaRead {
                    path: image_path.display().to_string(),
                    source,
                })?;

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".into()),
                parts: vec![
                    Part::text(IMAGE_SYSTEM_PROMPT),
                    Part::text(prompt),
                    Part {
                        text: None,
                        inline_data: Some(GeminiInlineData {
                            mime_type: "image/jpeg".into(),
                            data: BASE64.encode(&bytes),
                        }),
                    },
                ],
            }],
            system_instruction: None,
            generation_config: GenerationConfig {
                // Vision answers read better a bit warmer than chat.
                temperature: 0.7,
                top_k: 40,
                top_p: 0.8,
                max_output_tokens: 1000,
            },
        };
        self.generate(&request).await
    }
}
