//! The `ocr` subcommand.

use std::collections::HashSet;

use clap::Args;
use tokio::io::AsyncWriteExt as _;

use crate::{
    async_utils::io::{create_writer, write_jsonl},
    clipboard::copy_to_clipboard,
    export::{ExportFormat, combined_text, export_to_dir},
    intake::{FileIntake, UploadedFile, may_be_image},
    pipeline::RecognitionPipeline,
    prelude::*,
    recognition::{DEFAULT_LANGUAGE, Engine, recognizer_for_engine},
    ui::{Ui, UiObserver},
};

/// OCR command line arguments.
#[derive(Debug, Args)]
pub struct OcrOpts {
    /// Image files to recognize. Files that aren't images are skipped.
    #[clap(required = true, value_name = "IMAGE")]
    pub images: Vec<PathBuf>,

    /// Skip the image at this position (counting from 0) after filtering.
    /// May be repeated.
    #[clap(long = "exclude", value_name = "INDEX")]
    pub excluded: Vec<usize>,

    /// Recognition languages, as `tesseract` language codes joined by `+`.
    #[clap(long = "lang", env = "ISIL_OCR_LANG", default_value = DEFAULT_LANGUAGE)]
    pub language: String,

    /// The OCR engine to use.
    #[clap(long, value_enum, default_value_t = Engine::Tesseract)]
    pub engine: Engine,

    /// Export formats to write. May be repeated or comma-separated.
    #[clap(short = 'e', long = "export", value_enum, value_delimiter = ',')]
    pub exports: Vec<ExportFormat>,

    /// The directory to write export files to.
    #[clap(long, value_name = "DIR", default_value = ".")]
    pub out_dir: PathBuf,

    /// Copy the combined text to the clipboard.
    #[clap(long)]
    pub copy: bool,

    /// Print the combined text to standard output.
    #[clap(long)]
    pub text: bool,

    /// Write results as JSON Lines to this path, or `-` for standard output.
    #[clap(long = "json", value_name = "PATH")]
    pub json_path: Option<PathBuf>,
}

impl OcrOpts {
    /// Are we using stdout for output?
    pub fn using_stdout_for_output(&self) -> bool {
        self.text || self.json_path.as_deref() == Some(Path::new("-"))
    }
}

/// The `ocr` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_ocr(ui: Ui, opts: &OcrOpts) -> Result<()> {
    // Read our input files and keep the images. Paths that can't be images
    // are never read.
    let mut files = Vec::with_capacity(opts.images.len());
    for path in &opts.images {
        if may_be_image(path) {
            files.push(UploadedFile::from_path(path).await?);
        } else {
            debug!(path = %path.display(), "Not reading non-image file");
        }
    }
    let mut intake = FileIntake::new();
    let skipped = opts.images.len() - intake.add(files);
    if skipped > 0 {
        warn!("Skipped {} file(s) that are not images", skipped);
    }

    // Drop excluded positions, highest first so earlier indices stay valid.
    let mut excluded = opts.excluded.clone();
    excluded.sort_unstable();
    excluded.dedup();
    for &index in excluded.iter().rev() {
        if let Some(file) = intake.remove_at(index) {
            debug!(name = %file.name, "Excluded file");
        }
    }

    if intake.is_empty() {
        warn!("No images to recognize");
        return Ok(());
    }
    for file in intake.files() {
        info!(
            name = %file.name,
            size = %file.size_in_mb(),
            media_type = %file.media_type,
            "Queued image"
        );
    }

    // Recognize everything.
    let observer = Arc::new(UiObserver::new(&ui));
    let pipeline = RecognitionPipeline::new(
        recognizer_for_engine(opts.engine),
        opts.language.clone(),
        observer.clone(),
    );
    if let Err(err) = pipeline.run(intake.files()).await {
        if observer.failure_count() == 0 {
            return Err(err);
        }
        // The observer has already logged the details.
        bail!("recognition failed");
    }
    intake.clear();
    let results = pipeline.results();

    // Produce our outputs. A failure in one doesn't stop the others, and is
    // reported through the observer.
    if let Some(json_path) = &opts.json_path {
        write_jsonl(Some(json_path.as_path()), &results).await?;
    }

    let text = combined_text(&results);
    if opts.text {
        let mut wtr = create_writer(None).await?;
        wtr.write_all(text.as_bytes())
            .await
            .context("Failed to write text")?;
        wtr.write_all(b"\n").await.context("Failed to write text")?;
        wtr.flush().await.context("Failed to flush text")?;
    }

    if opts.copy {
        copy_to_clipboard(&text, &*observer).await.ok();
    }

    let mut seen = HashSet::new();
    let formats = opts
        .exports
        .iter()
        .copied()
        .filter(|format| seen.insert(*format))
        .collect::<Vec<_>>();
    if !formats.is_empty() {
        tokio::fs::create_dir_all(&opts.out_dir)
            .await
            .with_context(|| format!("Failed to create output directory {:?}", opts.out_dir))?;
    }
    for format in formats {
        export_to_dir(format, &results, &opts.out_dir, &*observer)
            .await
            .ok();
    }

    let failures = observer.failure_count();
    if failures > 0 {
        bail!("{} output(s) could not be written", failures);
    }
    Ok(())
}
