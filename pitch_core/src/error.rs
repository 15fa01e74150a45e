use thiserror::Error;

/// Errors produced by document loading, editing and rendering.
#[derive(Debug, Error)]
pub enum PitchError {
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Unknown contour: {0}")]
    UnknownContour(String),

    #[error("Invalid source contour: {0}")]
    InvalidSource(String),

    #[error("No document loaded")]
    NoDocument,

    /// A newer load was started after this one; its result must not be applied.
    #[error("Stale load (generation {ticket}, current {current})")]
    StaleLoad { ticket: u64, current: u64 },

    #[error("Image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, PitchError>;
