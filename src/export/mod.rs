//! Exporting recognition results.
//!
//! Every encoder is a pure function from a list of results to the bytes of a
//! file. Writing those bytes somewhere, and telling the user about it, is the
//! caller's job.

use clap::ValueEnum;

use crate::{
    async_utils::{io::write_bytes, spawn_blocking_propagating_panics},
    notify::{Notification, Observer},
    pipeline::RecognitionResult,
    prelude::*,
};

pub mod docx;
pub mod pdf;
pub mod xlsx;

/// Base name shared by all exported files.
const EXPORT_BASE_NAME: &str = "IŞIL_OCR_Sonuçları";

/// The formats we can export to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum)]
pub enum ExportFormat {
    /// Excel spreadsheet.
    Xlsx,
    /// PDF document.
    Pdf,
    /// Word document.
    Docx,
}

impl ExportFormat {
    /// Every format, in the order we offer them.
    pub const ALL: [ExportFormat; 3] =
        [ExportFormat::Xlsx, ExportFormat::Pdf, ExportFormat::Docx];

    /// The file extension for this format.
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Docx => "docx",
        }
    }

    /// The fixed name of the exported file.
    pub fn file_name(self) -> String {
        format!("{}.{}", EXPORT_BASE_NAME, self.extension())
    }

    /// The name users know this format by.
    pub fn display_name(self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "Excel",
            ExportFormat::Pdf => "PDF",
            ExportFormat::Docx => "Word",
        }
    }

    /// Encode `results` in this format.
    pub fn encode(self, results: &[RecognitionResult]) -> Result<Vec<u8>> {
        match self {
            ExportFormat::Xlsx => xlsx::encode(results),
            ExportFormat::Pdf => pdf::encode(results),
            ExportFormat::Docx => docx::encode(results),
        }
    }
}

/// Format a confidence score the way every export shows it: `92.3%`.
pub fn format_confidence(confidence: f64) -> String {
    format!("{:.1}%", confidence)
}

/// All the recognized text, without any per-file details, separated by blank
/// lines.
pub fn combined_text(results: &[RecognitionResult]) -> String {
    results
        .iter()
        .map(|result| result.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Encode `results` as `format` and write the file into `out_dir`.
///
/// The observer hears about success or failure. A failure here has no effect
/// on other formats.
#[instrument(level = "debug", skip_all, fields(format = ?format))]
pub async fn export_to_dir(
    format: ExportFormat,
    results: &[RecognitionResult],
    out_dir: &Path,
    observer: &dyn Observer,
) -> Result<PathBuf> {
    let path = out_dir.join(format.file_name());
    let owned = results.to_vec();
    let outcome = async {
        let bytes = spawn_blocking_propagating_panics(move || format.encode(&owned))
            .await
            .with_context(|| format!("failed to encode {}", format.display_name()))?;
        write_bytes(&path, &bytes).await?;
        Ok::<_, anyhow::Error>(())
    }
    .await;

    match outcome {
        Ok(()) => {
            observer.on_notification(&Notification::ExportSucceeded {
                format,
                path: path.clone(),
            });
            Ok(path)
        }
        Err(err) => {
            observer.on_notification(&Notification::ExportFailed {
                format,
                error: format!("{:#}", err),
            });
            Err(err)
        }
    }
}

#[cfg(test)]
pub mod testing {
    //! Shared fixtures and helpers for export tests.

    use std::io::{Cursor, Read as _};

    use super::*;

    /// The two-file example used throughout the export tests.
    pub fn sample_results() -> Vec<RecognitionResult> {
        vec![
            RecognitionResult {
                file_name: "a.png".to_owned(),
                text: "Merhaba".to_owned(),
                confidence: 92.3,
            },
            RecognitionResult {
                file_name: "b.png".to_owned(),
                text: "World".to_owned(),
                confidence: 81.0,
            },
        ]
    }

    /// Read a single entry out of a zip archive, as a string.
    pub fn read_zip_entry(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut entry = archive.by_name(name).unwrap();
        let mut contents = String::new();
        entry.read_to_string(&mut contents).unwrap();
        contents
    }
}

#[cfg(test)]
mod tests {
    use super::{testing::sample_results, *};
    use crate::notify::testing::RecordingObserver;

    #[test]
    fn test_file_names() {
        assert_eq!(ExportFormat::Xlsx.file_name(), "IŞIL_OCR_Sonuçları.xlsx");
        assert_eq!(ExportFormat::Pdf.file_name(), "IŞIL_OCR_Sonuçları.pdf");
        assert_eq!(ExportFormat::Docx.file_name(), "IŞIL_OCR_Sonuçları.docx");
    }

    #[test]
    fn test_format_confidence() {
        assert_eq!(format_confidence(92.3), "92.3%");
        assert_eq!(format_confidence(81.0), "81.0%");
        assert_eq!(format_confidence(0.0), "0.0%");
        assert_eq!(format_confidence(99.96), "100.0%");
    }

    #[test]
    fn test_combined_text() {
        assert_eq!(combined_text(&sample_results()), "Merhaba\n\nWorld");
        assert_eq!(combined_text(&[]), "");
    }

    #[test]
    fn test_encoders_are_deterministic() {
        let results = sample_results();
        for format in [ExportFormat::Xlsx, ExportFormat::Docx] {
            let first = format.encode(&results).unwrap();
            let second = format.encode(&results).unwrap();
            assert_eq!(
                testing::read_zip_entry(&first, content_part(format)),
                testing::read_zip_entry(&second, content_part(format)),
            );
        }
    }

    fn content_part(format: ExportFormat) -> &'static str {
        match format {
            ExportFormat::Xlsx => "xl/sharedStrings.xml",
            ExportFormat::Docx => "word/document.xml",
            ExportFormat::Pdf => unreachable!("PDF is not a zip archive"),
        }
    }

    #[tokio::test]
    async fn test_export_to_dir_writes_every_format() {
        let dir = tempfile::tempdir().unwrap();
        let observer = RecordingObserver::default();
        for format in ExportFormat::ALL {
            let path = export_to_dir(format, &sample_results(), dir.path(), &observer)
                .await
                .unwrap();
            assert_eq!(path, dir.path().join(format.file_name()));
            assert!(std::fs::metadata(&path).unwrap().len() > 0);
        }
        let notifications = observer.notifications();
        assert_eq!(notifications.len(), 3);
        assert!(notifications.iter().all(|n| !n.is_failure()));
    }

    #[tokio::test]
    async fn test_export_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does/not/exist");
        let observer = RecordingObserver::default();

        let result =
            export_to_dir(ExportFormat::Docx, &sample_results(), &missing, &observer).await;
        assert!(result.is_err());
        assert_eq!(
            observer.notifications(),
            vec![Notification::ExportFailed {
                format: ExportFormat::Docx,
                error: format!("{:#}", result.unwrap_err()),
            }]
        );
    }
}
