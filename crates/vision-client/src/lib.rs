//! Client for the remote image annotation service.
//!
//! The crate exposes the request/response schema of the `images:annotate`
//! endpoint, the [`ImageAnnotator`] seam the upload handler depends on, a
//! reqwest-backed implementation and a scripted fake for tests.

pub mod client;
pub mod error;
pub mod fake;
pub mod types;

pub use client::{HttpImageAnnotator, ImageAnnotator};
pub use error::AnnotatorError;
pub use fake::FakeImageAnnotator;
pub use types::{
    AnnotateImageRequest, AnnotationResult, Annotations, Color, ColorInfo, DominantColors,
    EntityAnnotation, Feature, FeatureType, Image, ImageProperties, ImageSource, Likelihood,
    SafeSearchAnnotation, Status,
};
