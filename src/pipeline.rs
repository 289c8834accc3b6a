//! The recognition pipeline.
//!
//! Files are recognized strictly one after another. This costs throughput,
//! but it makes batch progress a simple function of "which file are we on,
//! and how far along is it", and it keeps results in submission order for
//! free.

use std::sync::{Mutex, MutexGuard, PoisonError};

use schemars::JsonSchema;

use crate::{
    intake::UploadedFile,
    notify::{Notification, Observer},
    prelude::*,
    recognition::{RecognitionProgress, Recognizer, STATUS_RECOGNIZING},
};

/// The recognized text of a single file.
#[derive(Clone, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct RecognitionResult {
    /// The name of the file the text came from.
    pub file_name: String,

    /// The recognized text.
    pub text: String,

    /// The engine's confidence in the text, from 0 to 100.
    pub confidence: f64,
}

/// Observable state of the pipeline.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineState {
    /// Is a run in progress?
    pub running: bool,

    /// Progress through the whole batch, from 0 to 100.
    pub progress: u8,

    /// The file currently being recognized.
    pub current_file: Option<String>,
}

/// Map progress within one file onto progress through the whole batch.
///
/// The batch is split into `total` equal segments, and `fraction` is
/// interpolated within segment `index`. This is always computed from scratch,
/// so rounding errors never pile up.
pub fn batch_progress(index: usize, total: usize, fraction: f64) -> u8 {
    if total == 0 {
        return 0;
    }
    let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
    let total = total as f64;
    let value = (index as f64 / total * 100.0 + fraction * 100.0 / total).round();
    value.clamp(0.0, 100.0) as u8
}

/// Runs batches of files through a [`Recognizer`].
pub struct RecognitionPipeline {
    recognizer: Arc<dyn Recognizer>,
    language: String,
    observer: Arc<dyn Observer>,
    state: Mutex<PipelineState>,
    results: Mutex<Vec<RecognitionResult>>,
}

impl RecognitionPipeline {
    /// Create a new pipeline.
    pub fn new(
        recognizer: Arc<dyn Recognizer>,
        language: impl Into<String>,
        observer: Arc<dyn Observer>,
    ) -> Self {
        Self {
            recognizer,
            language: language.into(),
            observer,
            state: Mutex::new(PipelineState::default()),
            results: Mutex::new(vec![]),
        }
    }

    /// A snapshot of the current state.
    pub fn state(&self) -> PipelineState {
        lock(&self.state).clone()
    }

    /// The results of the last successful run.
    pub fn results(&self) -> Vec<RecognitionResult> {
        lock(&self.results).clone()
    }

    /// Recognize every file in `files`, in order.
    ///
    /// Returns the number of files processed. An empty batch does nothing. If
    /// any file fails, the whole batch fails and no results are kept.
    #[instrument(level = "debug", skip_all, fields(file_count = files.len()))]
    pub async fn run(&self, files: &[UploadedFile]) -> Result<usize> {
        if files.is_empty() {
            debug!("No files to recognize");
            return Ok(0);
        }

        self.start(files.len())?;
        let outcome = self.recognize_all(files).await;
        let outcome = match outcome {
            Ok(results) => {
                let file_count = results.len();
                *lock(&self.results) = results;
                self.observer
                    .on_notification(&Notification::RecognitionSucceeded { file_count });
                Ok(file_count)
            }
            Err(err) => {
                self.observer
                    .on_notification(&Notification::RecognitionFailed {
                        error: format!("{:#}", err),
                    });
                Err(err)
            }
        };
        self.update_state(|state| *state = PipelineState::default());
        outcome
    }

    /// Enter the running state.
    fn start(&self, file_count: usize) -> Result<()> {
        {
            let mut state = lock(&self.state);
            if state.running {
                bail!("a recognition run is already in progress");
            }
            state.running = true;
            state.progress = 0;
        }
        lock(&self.results).clear();
        self.observer.on_state_change(&self.state());
        self.observer
            .on_notification(&Notification::RecognitionStarted { file_count });
        Ok(())
    }

    /// Recognize each file in turn, stopping at the first error.
    async fn recognize_all(&self, files: &[UploadedFile]) -> Result<Vec<RecognitionResult>> {
        let total = files.len();
        let mut results = Vec::with_capacity(total);
        for (index, file) in files.iter().enumerate() {
            self.update_state(|state| state.current_file = Some(file.name.clone()));

            let on_progress = |report: RecognitionProgress| {
                if report.status == STATUS_RECOGNIZING {
                    // 100 means "done", which only the completion below may say.
                    self.advance_progress(batch_progress(index, total, report.progress).min(99));
                }
            };
            let recognition = self
                .recognizer
                .recognize(file, &self.language, &on_progress)
                .await
                .with_context(|| format!("failed to recognize {:?}", file.name))?;
            let done = batch_progress(index, total, 1.0);
            if index + 1 == total {
                self.advance_progress(done);
            } else {
                // Rounding can reach 100 before the last file on big batches.
                self.advance_progress(done.min(99));
            }

            debug!(
                name = %file.name,
                confidence = recognition.confidence,
                "Recognized file"
            );
            results.push(RecognitionResult {
                file_name: file.name.clone(),
                text: recognition.text,
                confidence: recognition.confidence,
            });
        }
        Ok(results)
    }

    /// Raise progress to `value`. Progress never moves backwards during a run.
    fn advance_progress(&self, value: u8) {
        self.update_state(|state| state.progress = state.progress.max(value));
    }

    /// Apply `f` to our state and tell the observer about it.
    fn update_state(&self, f: impl FnOnce(&mut PipelineState)) {
        let snapshot = {
            let mut state = lock(&self.state);
            let before = state.clone();
            f(&mut state);
            if *state == before {
                return;
            }
            state.clone()
        };
        self.observer.on_state_change(&snapshot);
    }
}

/// Lock a mutex, ignoring poisoning. Our state is always left consistent.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
