//! Echo engine for testing.
//!
//! This engine "recognizes" the file name of each image, with full
//! confidence. It lets us exercise the whole pipeline without `tesseract`.

use crate::{intake::UploadedFile, prelude::*};

use super::{ProgressCallback, Recognition, RecognitionProgress, Recognizer};

/// Echo engine for testing.
#[derive(Debug)]
pub struct EchoRecognizer;

#[async_trait]
impl Recognizer for EchoRecognizer {
    #[instrument(level = "debug", skip_all, fields(name = %image.name))]
    async fn recognize(
        &self,
        image: &UploadedFile,
        _language: &str,
        progress: &ProgressCallback<'_>,
    ) -> Result<Recognition> {
        progress(RecognitionProgress::recognizing(0.0));
        progress(RecognitionProgress::recognizing(0.5));
        progress(RecognitionProgress::recognizing(1.0));
        Ok(Recognition {
            text: image.name.clone(),
            confidence: 100.0,
        })
    }
}
