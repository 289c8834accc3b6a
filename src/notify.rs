//! User-facing notifications.
//!
//! The core never prints anything for the user directly. Instead it emits
//! [`Notification`]s, and the presentation layer decides how to show them.

use crate::{export::ExportFormat, pipeline::PipelineState, prelude::*};

/// Something the user should hear about.
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    /// A recognition run has started.
    RecognitionStarted { file_count: usize },
    /// Every file in the batch was recognized.
    RecognitionSucceeded { file_count: usize },
    /// The batch failed, and no results were kept.
    RecognitionFailed { error: String },
    /// An export file was written.
    ExportSucceeded { format: ExportFormat, path: PathBuf },
    /// An export file could not be produced.
    ExportFailed { format: ExportFormat, error: String },
    /// The combined text was copied to the clipboard.
    CopySucceeded,
    /// The clipboard could not be written.
    CopyFailed { error: String },
}

impl Notification {
    /// Is this a failure?
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Notification::RecognitionFailed { .. }
                | Notification::ExportFailed { .. }
                | Notification::CopyFailed { .. }
        )
    }

    /// The short title shown to the user.
    pub fn title(&self) -> &'static str {
        match self {
            Notification::RecognitionStarted { .. } => "OCR Başladı",
            Notification::RecognitionSucceeded { .. } => "OCR Tamamlandı",
            Notification::ExportSucceeded { format, .. } => match format {
                ExportFormat::Xlsx => "Excel Dosyası İndirildi",
                ExportFormat::Pdf => "PDF Dosyası İndirildi",
                ExportFormat::Docx => "Word Dosyası İndirildi",
            },
            Notification::CopySucceeded => "Kopyalandı",
            Notification::RecognitionFailed { .. }
            | Notification::ExportFailed { .. }
            | Notification::CopyFailed { .. } => "Hata",
        }
    }

    /// The longer description shown to the user.
    pub fn description(&self) -> String {
        match self {
            Notification::RecognitionStarted { file_count } => {
                format!("{} dosya işleniyor.", file_count)
            }
            Notification::RecognitionSucceeded { file_count } => {
                format!("{} dosya başarıyla işlendi.", file_count)
            }
            Notification::RecognitionFailed { .. } => {
                "OCR işlemi sırasında bir hata oluştu.".to_owned()
            }
            Notification::ExportSucceeded { format, .. } => format!(
                "OCR sonuçları {} formatında kaydedildi.",
                format.display_name()
            ),
            Notification::ExportFailed { format, .. } => {
                format!("{} dosyası oluşturulamadı.", format.display_name())
            }
            Notification::CopySucceeded => "Metin panoya kopyalandı.".to_owned(),
            Notification::CopyFailed { .. } => "Metin kopyalanamadı.".to_owned(),
        }
    }
}

/// Receives notifications and state changes from the core.
pub trait Observer: Send + Sync {
    /// Called once per notification.
    fn on_notification(&self, notification: &Notification);

    /// Called whenever the pipeline state changes.
    fn on_state_change(&self, _state: &PipelineState) {}
}

/// Write a notification to the log, at a level matching its severity.
pub fn log_notification(notification: &Notification) {
    match notification {
        Notification::RecognitionFailed { error }
        | Notification::ExportFailed { error, .. }
        | Notification::CopyFailed { error } => {
            error!(
                title = notification.title(),
                error = %error,
                "{}",
                notification.description()
            );
        }
        Notification::ExportSucceeded { path, .. } => {
            info!(
                title = notification.title(),
                path = %path.display(),
                "{}",
                notification.description()
            );
        }
        _ => {
            info!(title = notification.title(), "{}", notification.description());
        }
    }
}
