use std::str::FromStr;

use clap::{Parser, Subcommand};
use tracing_subscriber::{
    EnvFilter, Layer as _, filter::Directive, fmt::format::FmtSpan, layer::SubscriberExt,
    util::SubscriberInitExt as _,
};

use self::{prelude::*, ui::Ui};

mod async_utils;
mod clipboard;
mod cmd;
mod export;
mod intake;
mod notify;
mod offline_cache;
mod pipeline;
mod prelude;
mod recognition;
mod ui;

/// Convert photos of text into text, and export the results.
#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    after_help = r#"
Environment Variables:
  - ISIL_OCR_LANG (optional): Recognition languages, default "tur+eng".
  - ISIL_OCR_CACHE_DIR (optional): Where the offline cache lives.
  - ISIL_OCR_ORIGIN (optional): The origin the offline cache serves.
  - RUST_LOG (optional): Log filter, default "info".

  The `tesseract` engine needs the `tesseract` command and its language
  data installed.

  These variables may be set in a standard `.env` file.
"#
)]
struct Opts {
    #[clap(subcommand)]
    subcmd: Cmd,
}

/// The subcommands we support.
#[derive(Debug, Subcommand)]
enum Cmd {
    /// Recognize text in images, then print, copy or export it.
    Ocr(cmd::ocr::OcrOpts),
    /// Manage the offline asset cache.
    Cache(cmd::cache::CacheOpts),
    /// Print schemas for output formats.
    Schema(cmd::schema::SchemaOpts),
}

impl Cmd {
    /// Are we using stdout for output?
    fn using_stdout_for_output(&self) -> bool {
        match self {
            Cmd::Ocr(opts) => opts.using_stdout_for_output(),
            Cmd::Cache(opts) => opts.using_stdout_for_output(),
            Cmd::Schema(opts) => opts.output_path.is_none(),
        }
    }
}

/// Our entry point, which can return an error. [`anyhow::Result`] will
/// automatically print a nice error message with optional backtrace.
#[tokio::main]
async fn main() -> Result<()> {
    let ui = Ui::init();

    // Initialize tracing.
    let directive =
        Directive::from_str("info").expect("built-in directive should be valid");
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_writer(ui.get_stderr_writer())
        .with_filter(env_filter);

    // We can stack multiple layers here if we need to.
    tracing_subscriber::registry().with(subscriber).init();

    // Call our real `main` function now that logging is set up.
    real_main(ui).await
}

/// Our real entry point.
#[instrument(level = "debug", name = "main", skip_all)]
async fn real_main(ui: Ui) -> Result<()> {
    // Load environment variables from a `.env` file, if it exists.
    dotenvy::dotenv().ok();

    // Parse command-line arguments.
    let opts = Opts::parse();
    debug!("Parsed options: {:?}", opts);

    // Hide the progress bar if we're using stdout for output.
    if opts.subcmd.using_stdout_for_output() {
        ui.hide_progress_bars();
    }

    // Run the appropriate subcommand.
    match &opts.subcmd {
        Cmd::Ocr(ocr_opts) => {
            cmd::ocr::cmd_ocr(ui, ocr_opts).await?;
        }
        Cmd::Cache(cache_opts) => {
            cmd::cache::cmd_cache(cache_opts).await?;
        }
        Cmd::Schema(schema_opts) => {
            cmd::schema::cmd_schema(schema_opts).await?;
        }
    }
    Ok(())
}
