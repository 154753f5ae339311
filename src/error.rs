use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScribeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Missing input for step: {0}")]
    MissingInput(String),

    #[error("Step '{step}' failed: {source}")]
    Step {
        step: String,
        #[source]
        source: Box<ScribeError>,
    },
}

impl ScribeError {
    /// Wrap a stage failure with the name of the step that raised it.
    pub fn in_step(self, step: &str) -> Self {
        match self {
            // Already attributed (a stage calling into another stage's helpers).
            ScribeError::Step { .. } => self,
            other => ScribeError::Step {
                step: step.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Name of the failing step, if this error came out of the orchestrator.
    pub fn step_name(&self) -> Option<&str> {
        match self {
            ScribeError::Step { step, .. } => Some(step),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScribeError>;
