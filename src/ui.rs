//! Application UI. For now, this is mostly progress bars.
//!
//! This is adapted from `substudy` by Eric Kidd, which is licensed under
//! Apache-2.0 OR MIT. Used with permission.

use std::{
    borrow::Cow,
    io,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::{
    notify::{Notification, Observer, log_notification},
    pipeline::PipelineState,
};

/// Application UI state.
#[derive(Clone)]
pub struct Ui {
    /// Our progress bars. Shared with every [`SafeStderrWriter`] we hand out.
    multi_progress: Arc<MultiProgress>,
}

impl Ui {
    /// Create a new UI. This sets up logging and and progress bars.
    pub fn init() -> Ui {
        let multi_progress = Arc::new(MultiProgress::new());
        Ui { multi_progress }
    }

    /// Create a new UI for unit tests.
    #[cfg(test)]
    pub fn init_for_tests() -> Ui {
        let multi_progress =
            Arc::new(MultiProgress::with_draw_target(ProgressDrawTarget::hidden()));
        Ui { multi_progress }
    }

    /// Hide all our progress bars completely, for when we're writing actual
    /// output to `stdout`.
    pub fn hide_progress_bars(&self) {
        self.multi_progress
            .set_draw_target(ProgressDrawTarget::hidden());
    }

    /// Get a writer than can be used to write to stderr, for use with `tracing`
    /// and other output code.
    pub fn get_stderr_writer(&self) -> SafeStderrWriter {
        SafeStderrWriter { ui: self.clone() }
    }

    /// Get a reference to our progress bars.
    pub fn multi_progress(&self) -> &MultiProgress {
        &self.multi_progress
    }

    /// Create a new percentage bar, running from 0 to 100.
    pub fn new_percent_bar(&self, config: &ProgressConfig<'_>) -> ProgressBar {
        let pb = ProgressBar::new(100).with_style(percent_progress_style());
        let pb = self.multi_progress.add(pb);
        #[cfg(test)]
        pb.set_draw_target(ProgressDrawTarget::hidden());
        pb.set_prefix(config.emoji.to_owned());
        pb.set_message(config.msg.to_owned());
        pb.enable_steady_tick(Duration::from_millis(250));
        pb.with_finish(indicatif::ProgressFinish::WithMessage(Cow::Owned(
            config.done_msg.to_owned(),
        )))
    }
}

/// Configuration for a progress bar.
pub struct ProgressConfig<'a> {
    /// Emoji to display in the progress bar.
    pub emoji: &'a str,
    /// Message to display in a running progress bar.
    pub msg: &'a str,
    /// Message to display in a progress bar when it is done.
    pub done_msg: &'a str,
}

fn percent_progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  {prefix:3}{msg:25} {pos:>3}% {elapsed_precise} {wide_bar:.cyan/blue}")
        .expect("bad progress bar template")
}

/// Shows pipeline progress on a bar, and sends notifications to the log.
pub struct UiObserver {
    bar: ProgressBar,
    failures: AtomicUsize,
}

impl UiObserver {
    /// Create an observer with a fresh progress bar.
    pub fn new(ui: &Ui) -> Self {
        let bar = ui.new_percent_bar(&ProgressConfig {
            emoji: "🔍",
            msg: "Metin tanınıyor",
            done_msg: "Tamamlandı",
        });
        Self {
            bar,
            failures: AtomicUsize::new(0),
        }
    }

    /// How many failure notifications we've seen.
    pub fn failure_count(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }
}

impl Observer for UiObserver {
    fn on_notification(&self, notification: &Notification) {
        log_notification(notification);
        if notification.is_failure() {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        match notification {
            Notification::RecognitionSucceeded { .. } => self.bar.finish(),
            Notification::RecognitionFailed { .. } => self.bar.abandon(),
            _ => {}
        }
    }

    fn on_state_change(&self, state: &PipelineState) {
        if !state.running {
            return;
        }
        self.bar.set_position(u64::from(state.progress));
        if let Some(file) = &state.current_file {
            self.bar.set_message(file.clone());
        }
    }
}

/// A writer which can used to write to `stderr`. It will hide and show progress
/// bars as needed, so that they don't interfere with the output.
#[derive(Clone)]
pub struct SafeStderrWriter {
    ui: Ui,
}

// The `tracing-indicatif` crate suggests that we should implement the following
// methods.
impl io::Write for SafeStderrWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.ui.multi_progress().suspend(|| io::stderr().write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.ui.multi_progress().suspend(|| io::stderr().flush())
    }

    fn write_vectored(&mut self, bufs: &[io::IoSlice<'_>]) -> io::Result<usize> {
        self.ui
            .multi_progress()
            .suspend(|| io::stderr().write_vectored(bufs))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.ui
            .multi_progress()
            .suspend(|| io::stderr().write_all(buf))
    }

    fn write_fmt(&mut self, fmt: std::fmt::Arguments<'_>) -> io::Result<()> {
        self.ui
            .multi_progress()
            .suspend(|| io::stderr().write_fmt(fmt))
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SafeStderrWriter {
    type Writer = SafeStderrWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observer_tracks_pipeline_state() {
        let ui = Ui::init_for_tests();
        let observer = UiObserver::new(&ui);

        observer.on_state_change(&PipelineState {
            running: true,
            progress: 42,
            current_file: Some("fatura.png".to_owned()),
        });
        assert_eq!(observer.bar.position(), 42);
        assert_eq!(observer.bar.message(), "fatura.png");

        // The final reset doesn't rewind the bar.
        observer.on_state_change(&PipelineState::default());
        assert_eq!(observer.bar.position(), 42);

        observer.on_notification(&Notification::RecognitionSucceeded { file_count: 1 });
        assert!(observer.bar.is_finished());
        assert_eq!(observer.failure_count(), 0);

        observer.on_notification(&Notification::CopyFailed {
            error: "no clipboard".to_owned(),
        });
        assert_eq!(observer.failure_count(), 1);
    }
}
