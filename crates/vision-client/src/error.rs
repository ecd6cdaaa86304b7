//! Annotation client error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnnotatorError {
    #[error("annotation request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("annotation service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("annotation service returned no response for the image")]
    EmptyResponse,

    #[error("invalid annotation response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("annotation failed: {0}")]
    Other(String),
}
