use crate::error::TranscriptionError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.deepgram.com";

/// Speech-to-text boundary. Voice notes are transcribed once, right after the
/// transport saves them; the transcript then flows through the normal text
/// routing.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> Result<String, TranscriptionError>;
}

pub struct DeepgramTranscriber {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ListenResponse {
    results: Option<ListenResults>,
}

#[derive(Debug, Deserialize)]
struct ListenResults {
    #[serde(default)]
    channels: Vec<ListenChannel>,
}

#[derive(Debug, Deserialize)]
struct ListenChannel {
    #[serde(default)]
    alternatives: Vec<ListenAlternative>,
}

#[derive(Debug, Deserialize)]
struct ListenAlternative {
    #[serde(default)]
    transcript: String,
}

impl DeepgramTranscriber {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Transcriber for DeepgramTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<String, TranscriptionError> {
        let audio = tokio::fs::read(audio_path).await.map_err(|source| {
            TranscriptionError::AudioRead {
                path: audio_path.display().to_string(),
                source,
            }
        })?;

        let response = self
            .client
            .post(format!("{}/v1/listen", self.base_url))
            .query(&[
                ("model", "nova-2"),
                ("language", "es"),
                ("smart_format", "true"),
                ("punctuate", "true"),
            ])
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", "application/octet-stream")
            .body(audio)
            .send()
            .await
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranscriptionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ListenResponse = response
            .json()
            .await
            .map_err(|e| TranscriptionError::Request(format!("invalid response body: {e}")))?;

        let transcript = parsed
            .results
            .and_then(|r| r.channels.into_iter().next())
            .and_then(|c| c.alternatives.into_iter().next())
            .map(|a| a.transcript)
            .unwrap_or_default();

        if transcript.is_empty() {
            return Err(TranscriptionError::EmptyTranscript);
        }
        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn audio_file(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("nota.ogg");
        std::fs::write(&path, b"oggbytes").unwrap();
        path
    }

    #[tokio::test]
    async fn transcribe_sends_expected_request_and_extracts_transcript() {
        let dir = tempfile::TempDir::new().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/listen"))
            .and(query_param("model", "nova-2"))
            .and(query_param("language", "es"))
            .and(query_param("smart_format", "true"))
            .and(header("Authorization", "Token dg-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": { "channels": [ { "alternatives": [
                    { "transcript": "hola, ¿cómo estás?" }
                ]}]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let transcriber = DeepgramTranscriber::new("dg-key").with_base_url(server.uri());
        let transcript = transcriber.transcribe(&audio_file(&dir)).await.unwrap();
        assert_eq!(transcript, "hola, ¿cómo estás?");
    }

    #[tokio::test]
    async fn empty_transcript_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": { "channels": [ { "alternatives": [ { "transcript": "" } ]}]}
            })))
            .mount(&server)
            .await;

        let transcriber = DeepgramTranscriber::new("dg-key").with_base_url(server.uri());
        let err = transcriber.transcribe(&audio_file(&dir)).await.unwrap_err();
        assert!(matches!(err, TranscriptionError::EmptyTranscript));
    }

    #[tokio::test]
    async fn missing_audio_file_is_read_error() {
        let server = MockServer::start().await;
        let transcriber = DeepgramTranscriber::new("dg-key").with_base_url(server.uri());
        let err = transcriber
            .transcribe(Path::new("/no/such/nota.ogg"))
            .await
            .unwrap_err();
        assert!(matches!(err, TranscriptionError::AudioRead { .. }));
    }

    #[tokio::test]
    async fn api_error_status_is_surfaced() {
        let dir = tempfile::TempDir::new().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let transcriber = DeepgramTranscriber::new("dg-key").with_base_url(server.uri());
        let err = transcriber.transcribe(&audio_file(&dir)).await.unwrap_err();
        assert!(matches!(err, TranscriptionError::Status { status: 401, .. }));
    }
}
