//! Upload-triggered picture analysis.
//!
//! A storage upload notification arrives (CloudEvent over HTTP), the picture
//! is sent to the annotation service, and when it is judged safe its labels
//! and dominant color are merged into the `pictures` document collection.

pub mod analysis;
pub mod config;
pub mod handler;
pub mod server;
pub mod telemetry;

pub use handler::{AnalysisSettings, HandleOutcome, HandlerError, UploadEvent, UploadHandler};
