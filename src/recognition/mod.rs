//! OCR engine interface.
//!
//! The actual text recognition is done by an external engine. All we need
//! from it is text, a confidence score, and some progress reports along the
//! way.

use clap::ValueEnum;

use crate::{intake::UploadedFile, prelude::*};

pub mod echo;
pub mod tesseract;

/// The language hint we pass by default: Turkish plus English.
pub const DEFAULT_LANGUAGE: &str = "tur+eng";

/// The status reported while the engine is actually reading text. Only
/// progress reports with this status count towards batch progress.
pub const STATUS_RECOGNIZING: &str = "recognizing text";

/// A progress report from an engine.
#[derive(Clone, Debug, PartialEq)]
pub struct RecognitionProgress {
    /// What the engine is doing right now.
    pub status: String,

    /// How far along it is, from 0.0 to 1.0.
    pub progress: f64,
}

impl RecognitionProgress {
    /// Build a report with the [`STATUS_RECOGNIZING`] status.
    pub fn recognizing(progress: f64) -> Self {
        Self {
            status: STATUS_RECOGNIZING.to_owned(),
            progress,
        }
    }
}

/// Callback used by engines to report progress.
pub type ProgressCallback<'a> = dyn Fn(RecognitionProgress) + Send + Sync + 'a;

/// What an engine returns for a single image.
#[derive(Clone, Debug, PartialEq)]
pub struct Recognition {
    /// The recognized text.
    pub text: String,

    /// Estimated accuracy, from 0 to 100.
    pub confidence: f64,
}

/// Interface to an OCR engine.
#[async_trait]
pub trait Recognizer: Send + Sync + 'static {
    /// Recognize the text in a single image.
    async fn recognize(
        &self,
        image: &UploadedFile,
        language: &str,
        progress: &ProgressCallback<'_>,
    ) -> Result<Recognition>;
}

/// The engines we know how to run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Engine {
    /// The `tesseract` command-line tool.
    #[default]
    Tesseract,
    /// Returns each file's name as its text. For testing.
    Echo,
}

/// Get the recognizer for the specified engine.
pub fn recognizer_for_engine(engine: Engine) -> Arc<dyn Recognizer> {
    match engine {
        Engine::Tesseract => Arc::new(tesseract::TesseractRecognizer::new()),
        Engine::Echo => Arc::new(echo::EchoRecognizer),
    }
}
