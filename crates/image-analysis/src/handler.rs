//! The upload handler: annotate a freshly uploaded picture and record its
//! metadata when it is safe to show.

use std::sync::Arc;

use picture_store::{DocumentStore, PictureCatalog, PictureRecord, StoreError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use vision_client::{
    AnnotateImageRequest, AnnotationResult, Annotations, AnnotatorError, ImageAnnotator,
};

use crate::analysis::{dominant_color, hex_color, safety_verdict, sorted_labels, SafetyPolicy};

/// Storage notification for a newly uploaded object. Only the bucket and the
/// object name are used; the rest of the object metadata is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UploadEvent {
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl UploadEvent {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bucket: Some(bucket.into()),
            name: Some(name.into()),
        }
    }

    fn validate(&self) -> Result<(&str, &str), HandlerError> {
        let bucket = required(&self.bucket, "bucket")?;
        let name = required(&self.name, "name")?;
        Ok((bucket, name))
    }
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, HandlerError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(HandlerError::MalformedEvent(field))
}

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("malformed upload event: missing '{0}'")]
    MalformedEvent(&'static str),

    #[error("annotation response contains no dominant color data")]
    MissingColorData,

    #[error("annotation call failed: {0}")]
    Transport(#[from] AnnotatorError),

    #[error("failed to store picture metadata: {0}")]
    Store(#[from] StoreError),
}

/// What an invocation ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub enum HandleOutcome {
    Stored(PictureRecord),
    SkippedUnsafe,
    ServiceError { code: i32, message: String },
}

/// Tunables applied to every invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisSettings {
    /// Scheme used to address the uploaded object, e.g. `gs`.
    pub storage_scheme: String,
    pub safety_policy: SafetyPolicy,
    /// Color stored when the service reports no dominant color. Without it
    /// such a response fails the invocation.
    pub fallback_color: Option<String>,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            storage_scheme: "gs".to_string(),
            safety_policy: SafetyPolicy::default(),
            fallback_color: None,
        }
    }
}

/// Long-lived handler; clients are created once and shared by every
/// invocation.
#[derive(Clone)]
pub struct UploadHandler {
    annotator: Arc<dyn ImageAnnotator>,
    pictures: PictureCatalog,
    settings: AnalysisSettings,
}

impl UploadHandler {
    pub fn new(
        annotator: Arc<dyn ImageAnnotator>,
        store: Arc<dyn DocumentStore>,
        settings: AnalysisSettings,
    ) -> Self {
        Self {
            annotator,
            pictures: PictureCatalog::new(store),
            settings,
        }
    }

    pub fn image_uri(&self, bucket: &str, name: &str) -> String {
        format!("{}://{}/{}", self.settings.storage_scheme, bucket, name)
    }

    #[tracing::instrument(skip_all, fields(bucket = ?event.bucket, name = ?event.name))]
    pub async fn handle(&self, event: &UploadEvent) -> Result<HandleOutcome, HandlerError> {
        info!(?event, "upload event received");
        let (bucket, name) = event.validate()?;
        info!(bucket, name, "new picture uploaded");

        let request = AnnotateImageRequest::for_uri(self.image_uri(bucket, name));
        let result = self.annotator.annotate(&request).await?;
        if let Ok(raw) = serde_json::to_string(&result) {
            debug!(name, %raw, "raw annotation output");
        }

        let annotations = match result {
            AnnotationResult::Success(annotations) => annotations,
            AnnotationResult::Error(status) => {
                warn!(
                    name,
                    code = status.code,
                    message = %status.message,
                    "annotation service reported an error"
                );
                return Ok(HandleOutcome::ServiceError {
                    code: status.code,
                    message: status.message,
                });
            }
        };

        let labels = sorted_labels(&annotations.label_annotations);
        info!(name, labels = %labels.join(", "), "labels found");

        let color = self.resolve_color(&annotations)?;
        info!(name, %color, "dominant color found");

        let verdict = safety_verdict(
            annotations.safe_search_annotation.as_ref(),
            self.settings.safety_policy,
        );
        info!(
            name,
            safe = verdict.safe,
            policy = %self.settings.safety_policy,
            categories = ?verdict.categories,
            "safety verdict"
        );
        if !verdict.safe {
            return Ok(HandleOutcome::SkippedUnsafe);
        }

        let record = PictureRecord::new(labels, color);
        self.pictures.save(name, &record).await?;
        info!(name, "stored picture metadata");

        Ok(HandleOutcome::Stored(record))
    }

    fn resolve_color(&self, annotations: &Annotations) -> Result<String, HandlerError> {
        match dominant_color(annotations.dominant_colors()) {
            Some(color) => Ok(hex_color(&color)),
            None => match &self.settings.fallback_color {
                Some(fallback) => {
                    warn!(%fallback, "no dominant color reported; using fallback");
                    Ok(fallback.clone())
                }
                None => Err(HandlerError::MissingColorData),
            },
        }
    }
}
