use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::client::ImageAnnotator;
use crate::error::AnnotatorError;
use crate::types::{AnnotateImageRequest, AnnotationResult};

/// `FakeImageAnnotator` answers every request with a scripted result and
/// records the requests it received. Useful for exercising the upload
/// pipeline without a network.
#[derive(Clone)]
pub struct FakeImageAnnotator {
    reply: Arc<Mutex<Result<AnnotationResult, String>>>,
    requests: Arc<Mutex<Vec<AnnotateImageRequest>>>,
}

impl FakeImageAnnotator {
    /// Fake that always returns `result`.
    pub fn returning(result: AnnotationResult) -> Self {
        Self {
            reply: Arc::new(Mutex::new(Ok(result))),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fake whose calls fail as if the transport broke.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            reply: Arc::new(Mutex::new(Err(message.into()))),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn requests(&self) -> Vec<AnnotateImageRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ImageAnnotator for FakeImageAnnotator {
    async fn annotate(
        &self,
        request: &AnnotateImageRequest,
    ) -> Result<AnnotationResult, AnnotatorError> {
        self.requests.lock().push(request.clone());
        self.reply.lock().clone().map_err(AnnotatorError::Other)
    }
}
