//! Tesseract OCR engine.

use std::sync::LazyLock;

use regex::Regex;
use tokio::process::Command;

use crate::{async_utils::check_for_command_failure, intake::UploadedFile, prelude::*};

use super::{ProgressCallback, Recognition, RecognitionProgress, Recognizer};

/// Tesseract sometimes reports unreadable input on stderr while still exiting
/// successfully.
static TESSERACT_ERROR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^Error\b").expect("failed to compile regex")
});

/// OCR engine wrapping the `tesseract` CLI tool.
#[non_exhaustive]
pub struct TesseractRecognizer {}

impl TesseractRecognizer {
    /// Create a new `tesseract` engine.
    pub fn new() -> Self {
        Self {}
    }
}

#[async_trait]
impl Recognizer for TesseractRecognizer {
    #[instrument(level = "debug", skip_all, fields(name = %image.name, language = %language))]
    async fn recognize(
        &self,
        image: &UploadedFile,
        language: &str,
        progress: &ProgressCallback<'_>,
    ) -> Result<Recognition> {
        let extension = mime_guess::get_mime_extensions_str(&image.media_type)
            .and_then(|o| o.first())
            .ok_or_else(|| anyhow!("cannot determine extension for {}", image.media_type))?;

        // Write our input to a temporary file.
        let tmpdir = tempfile::TempDir::with_prefix("tesseract")?;
        let input_path = tmpdir.path().join(format!("input.{}", extension));
        let output_base = tmpdir.path().join("output");
        tokio::fs::write(&input_path, &image.data)
            .await
            .context("cannot write tesseract input file")?;

        progress(RecognitionProgress::recognizing(0.0));

        // Ask for both plain text and TSV, which carries per-word confidence.
        let output = Command::new("tesseract")
            .arg(&input_path)
            .arg(&output_base)
            .args(["-l", language])
            .args(["txt", "tsv"])
            .output()
            .await
            .context("cannot run tesseract")?;
        check_for_command_failure("tesseract", &output, Some(&TESSERACT_ERROR_REGEX))?;

        let text = tokio::fs::read_to_string(output_base.with_extension("txt"))
            .await
            .context("cannot read tesseract text output")?;
        let tsv = tokio::fs::read_to_string(output_base.with_extension("tsv"))
            .await
            .context("cannot read tesseract TSV output")?;
        let confidence = mean_word_confidence(&tsv)?;

        progress(RecognitionProgress::recognizing(1.0));
        Ok(Recognition { text, confidence })
    }
}

/// Average the confidence of every recognized word in tesseract's TSV output.
///
/// Word rows have `level == 5`. Rows with a negative confidence carry no word
/// and are skipped. An image with no words has confidence 0.
fn mean_word_confidence(tsv: &str) -> Result<f64> {
    let mut total = 0.0;
    let mut count = 0usize;
    // Skip the header row.
    for (line_idx, line) in tsv.lines().enumerate().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let columns = line.split('\t').collect::<Vec<_>>();
        if columns.len() < 11 {
            bail!("malformed tesseract TSV on line {}: {:?}", line_idx + 1, line);
        }
        if columns[0] != "5" {
            continue;
        }
        let conf = columns[10].trim().parse::<f64>().with_context(|| {
            format!("bad confidence in tesseract TSV line {}", line_idx + 1)
        })?;
        if conf >= 0.0 {
            total += conf;
            count += 1;
        }
    }
    Ok(if count == 0 { 0.0 } else { total / count as f64 })
}
