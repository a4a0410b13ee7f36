use std::fmt;
use thiserror::Error;

/// Stage of a refresh run, used to tell failures apart in logs and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    Connecting,
    Archiving,
    Repopulating,
    Pruning,
}

impl fmt::Display for RefreshPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RefreshPhase::Connecting => "connecting",
            RefreshPhase::Archiving => "archiving",
            RefreshPhase::Repopulating => "repopulating",
            RefreshPhase::Pruning => "pruning",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Fetch failed: {message}")]
    Fetch { status: Option<u16>, message: String },

    #[error("The requested image {name:?} is not marked as published & is unavailable")]
    NotPublished { name: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Document {id} not found in {collection}")]
    DocumentNotFound { collection: String, id: String },

    #[error("Unhandled action: {0}")]
    UnhandledAction(String),

    #[error("Malformed {kind} action: {message}")]
    MalformedAction { kind: String, message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Refresh failed while {phase}: {source}")]
    Refresh {
        phase: RefreshPhase,
        #[source]
        source: Box<SyncError>,
    },
}

impl SyncError {
    pub fn storage(message: impl Into<String>) -> Self {
        SyncError::Storage {
            message: message.into(),
        }
    }

    pub fn refresh(phase: RefreshPhase, source: SyncError) -> Self {
        SyncError::Refresh {
            phase,
            source: Box::new(source),
        }
    }

    /// Short machine-readable name, used as the `kind` of API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Http(_) => "http",
            SyncError::Json(_) => "json",
            SyncError::Toml(_) => "toml",
            SyncError::Io(_) => "io",
            SyncError::Config(_) => "config",
            SyncError::Fetch { .. } => "fetch",
            SyncError::NotPublished { .. } => "not_published",
            SyncError::Validation(_) => "validation",
            SyncError::DocumentNotFound { .. } => "document_not_found",
            SyncError::UnhandledAction(_) => "unhandled_action",
            SyncError::MalformedAction { .. } => "malformed_action",
            SyncError::Storage { .. } => "storage",
            SyncError::Refresh { .. } => "refresh",
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
