use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::AssemblyAiConfig;
use crate::error::{Result, ScribeError};
use crate::pipeline::ProgressSink;
use super::{TranscribeOptions, TranscriberTrait, Transcript, Word};

const PROGRESS_TOTAL: u64 = 3;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload_url: String,
}

#[derive(Debug, Serialize)]
struct TranscriptRequest {
    audio_url: String,
    speech_model: &'static str,
    speaker_labels: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    speakers_expected: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    language_code: Option<String>,
    language_detection: bool,
}

impl TranscriptRequest {
    fn new(audio_url: String, options: &TranscribeOptions) -> Self {
        Self {
            audio_url,
            speech_model: "best",
            speaker_labels: true,
            speakers_expected: options.speakers,
            language_code: options.language.clone(),
            language_detection: options.language.is_none(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TranscriptStatus {
    Queued,
    Processing,
    Completed,
    Error,
}

#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    id: String,
    status: TranscriptStatus,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    language_code: Option<String>,
    #[serde(default)]
    words: Option<Vec<ApiWord>>,
}

#[derive(Debug, Deserialize)]
struct ApiWord {
    text: String,
    start: u64,
    end: u64,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    speaker: Option<String>,
}

impl From<ApiWord> for Word {
    fn from(w: ApiWord) -> Self {
        Word {
            text: w.text,
            start: w.start,
            end: w.end,
            confidence: w.confidence,
            speaker: w.speaker,
        }
    }
}

impl TranscriptResponse {
    fn into_transcript(self) -> Transcript {
        Transcript {
            words: self.words.unwrap_or_default().into_iter().map(Word::from).collect(),
            language: self.language_code,
        }
    }
}

/// AssemblyAI REST client: upload, submit, poll
pub struct AssemblyAiTranscriber {
    client: Client,
    config: AssemblyAiConfig,
}

impl AssemblyAiTranscriber {
    pub fn new(config: AssemblyAiConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v2/{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ScribeError::Transcription(format!(
                "AssemblyAI {} failed ({}): {}",
                what, status, error_text
            )));
        }
        Ok(response)
    }

    async fn upload(&self, key: &str, audio_path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(audio_path).await?;
        debug!("Uploading {} bytes to AssemblyAI", bytes.len());

        let response = self
            .client
            .post(self.url("upload"))
            .header("authorization", key)
            .body(bytes)
            .send()
            .await?;
        let upload: UploadResponse = Self::check(response, "upload").await?.json().await?;
        Ok(upload.upload_url)
    }

    async fn submit(&self, key: &str, audio_url: String, options: &TranscribeOptions) -> Result<TranscriptResponse> {
        let response = self
            .client
            .post(self.url("transcript"))
            .header("authorization", key)
            .json(&TranscriptRequest::new(audio_url, options))
            .send()
            .await?;
        Ok(Self::check(response, "submit").await?.json().await?)
    }

    async fn fetch(&self, key: &str, id: &str) -> Result<TranscriptResponse> {
        let response = self
            .client
            .get(self.url(&format!("transcript/{}", id)))
            .header("authorization", key)
            .send()
            .await?;
        Ok(Self::check(response, "status").await?.json().await?)
    }
}

#[async_trait]
impl TranscriberTrait for AssemblyAiTranscriber {
    async fn transcribe(
        &self,
        audio_path: &Path,
        options: &TranscribeOptions,
        progress: Option<ProgressSink>,
    ) -> Result<Transcript> {
        let report = |done: u64| {
            if let Some(sink) = &progress {
                sink.report(done, PROGRESS_TOTAL);
            }
        };

        // Resolved here so a missing key only matters when this backend runs.
        let key = self.config.resolve_api_key()?;

        info!("Submitting {} to AssemblyAI", audio_path.display());
        let audio_url = self.upload(&key, audio_path).await?;
        let mut transcript = self.submit(&key, audio_url, options).await?;
        report(0);

        let deadline = Instant::now() + Duration::from_secs(self.config.timeout_secs);
        let interval = Duration::from_secs(self.config.poll_interval_secs.max(1));

        loop {
            match transcript.status {
                TranscriptStatus::Completed => break,
                TranscriptStatus::Error => {
                    return Err(ScribeError::Transcription(format!(
                        "AssemblyAI error: {}",
                        transcript.error.unwrap_or_else(|| "unknown".to_string())
                    )));
                }
                TranscriptStatus::Processing => report(1),
                TranscriptStatus::Queued => {}
            }

            if Instant::now() >= deadline {
                return Err(ScribeError::Transcription(format!(
                    "AssemblyAI transcript {} not ready after {}s",
                    transcript.id, self.config.timeout_secs
                )));
            }

            tokio::time::sleep(interval).await;
            transcript = self.fetch(&key, &transcript.id).await?;
            debug!("AssemblyAI transcript {} status: {:?}", transcript.id, transcript.status);
        }

        report(PROGRESS_TOTAL);
        let transcript = transcript.into_transcript();
        info!("AssemblyAI returned {} words", transcript.words.len());
        Ok(transcript)
    }

    fn name(&self) -> &'static str {
        "assemblyai"
    }
}
