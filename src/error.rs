use crate::hvo::Channel;
use std::path::PathBuf;

/// Errors raised while converting, validating, or persisting HVO data.
#[derive(Debug, thiserror::Error)]
pub enum HvoError {
    #[error("MIDI parse error: {0}")]
    MidiParse(String),

    /// Non-finite values in a converted sequence. Known to come out of some
    /// MIDI files as infinite offsets, so it gets its own variant.
    #[error("Invalid HVO sequence from {source_id}: non-finite values in the {channel} channel")]
    InvalidSequence { source_id: String, channel: Channel },

    #[error("Can't pad array to {target} time steps because it is already {steps} time steps long")]
    Padding { steps: usize, target: usize },

    #[error("Shape error: {0}")]
    Shape(String),

    #[error("Failed to convert {}: {source}", .path.display())]
    Conversion {
        path: PathBuf,
        #[source]
        source: Box<HvoError>,
    },

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Corrupt HVO pair container: {0}")]
    Format(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl HvoError {
    /// Wraps a per-file failure so the batch can count it and move on.
    pub fn conversion(path: impl Into<PathBuf>, source: HvoError) -> Self {
        HvoError::Conversion {
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// Fatal errors abort a whole batch. Everything else is a bad input item.
    pub fn is_fatal(&self) -> bool {
        match self {
            HvoError::InvariantViolation(_)
            | HvoError::Precondition(_)
            | HvoError::NotADirectory(_) => true,
            HvoError::Conversion { source, .. } => source.is_fatal(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, HvoError>;
