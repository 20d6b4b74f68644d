//! Error types for the diagram transform.

use thiserror::Error;

/// Failures surfaced by [`transform`](crate::transform).
///
/// No error is swallowed inside the transform: any failure aborts the whole
/// call before a single node is spliced, and the sandbox session is closed
/// on the way out.
#[derive(Debug, Error)]
pub enum TransformError {
    /// Translating [`Options`](crate::Options) into a renderer config
    /// failed to serialize. Indicates a caller contract violation (e.g. a
    /// non-JSON value smuggled into a passthrough bag).
    #[error("failed to translate options into a renderer config: {0}")]
    Config(#[from] serde_json::Error),

    /// The rendering engine rejected a diagram.
    #[error("mermaid could not render diagram: {message}\n--- diagram source ---\n{diagram}")]
    Render {
        /// The offending diagram source text.
        diagram: String,
        message: String,
    },

    /// The sandbox host could not be launched, crashed, or broke protocol.
    #[error("sandbox failure: {0}")]
    Sandbox(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
