//! The `cache` subcommand.

use clap::{Args, Subcommand};
use tokio::io::AsyncWriteExt as _;
use url::Url;

use crate::{
    async_utils::io::create_writer,
    offline_cache::{
        CACHE_NAME, CacheStorage, FetchOutcome, Network as _, OfflineCache, ReqwestNetwork,
        Request,
    },
    prelude::*,
};

/// Offline cache command line arguments.
#[derive(Debug, Args)]
pub struct CacheOpts {
    /// Where to keep cached assets.
    #[clap(
        long,
        value_name = "DIR",
        env = "ISIL_OCR_CACHE_DIR",
        default_value = ".isil-ocr-cache"
    )]
    pub cache_dir: PathBuf,

    /// The origin whose assets we cache.
    #[clap(
        long,
        value_name = "URL",
        env = "ISIL_OCR_ORIGIN",
        default_value = "http://localhost:8080/"
    )]
    pub origin: Url,

    /// The name of the current cache bucket.
    #[clap(long, default_value = CACHE_NAME)]
    pub cache_name: String,

    #[clap(subcommand)]
    pub action: CacheAction,
}

impl CacheOpts {
    /// Are we using stdout for output?
    pub fn using_stdout_for_output(&self) -> bool {
        match &self.action {
            CacheAction::Fetch { output_path, .. } => {
                output_path.as_deref().is_none_or(|p| p == Path::new("-"))
            }
            CacheAction::List => true,
            _ => false,
        }
    }
}

/// Things we can do with the cache.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Fetch and store the app's core assets.
    Install,
    /// Delete caches left behind by older versions.
    Activate,
    /// Fetch a URL through the cache.
    Fetch {
        /// The URL to fetch, absolute or relative to the origin.
        url: String,

        /// Treat this as a page load, which may fall back to the cached root
        /// page when offline.
        #[clap(long)]
        document: bool,

        /// Where to write the response body.
        #[clap(short = 'o', long = "out")]
        output_path: Option<PathBuf>,
    },
    /// Fetch and store extra URLs.
    Add {
        /// URLs to cache, absolute or relative to the origin.
        #[clap(required = true)]
        urls: Vec<String>,
    },
    /// List the URLs in the current cache.
    List,
}

/// The `cache` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_cache(opts: &CacheOpts) -> Result<()> {
    let network = Arc::new(ReqwestNetwork::new(opts.origin.clone())?);
    let cache = OfflineCache::new(
        opts.cache_name.clone(),
        opts.origin.clone(),
        CacheStorage::new(&opts.cache_dir),
        network.clone(),
    );

    match &opts.action {
        CacheAction::Install => {
            let count = cache.install().await?;
            info!("Cached {} asset(s) in {}", count, cache.cache_name());
        }
        CacheAction::Activate => {
            let deleted = cache.activate().await?;
            info!("Deleted {} old cache(s)", deleted.len());
        }
        CacheAction::Add { urls } => {
            let count = cache.add_urls(urls.as_slice()).await?;
            info!("Cached {} URL(s) in {}", count, cache.cache_name());
        }
        CacheAction::List => {
            let mut wtr = create_writer(None).await?;
            for url in cache.open().await?.keys().await? {
                wtr.write_all(format!("{}\n", url).as_bytes())
                    .await
                    .context("Failed to write URL")?;
            }
            wtr.flush().await.context("Failed to flush output")?;
        }
        CacheAction::Fetch {
            url,
            document,
            output_path,
        } => {
            let url = opts
                .origin
                .join(url)
                .with_context(|| format!("Invalid URL {:?}", url))?;
            let request = if *document {
                Request::navigate(url)
            } else {
                Request::get(url)
            };

            let response = match cache.fetch(&request).await? {
                FetchOutcome::Passthrough => {
                    debug!("Request bypasses the cache");
                    network.fetch(&request).await?
                }
                FetchOutcome::Cached(response) => {
                    info!("Served from cache");
                    response
                }
                FetchOutcome::Network(response) => {
                    info!("Served from network");
                    response
                }
                FetchOutcome::Fallback(response) => {
                    warn!("Offline, served the cached root page");
                    response
                }
            };
            if response.status != 200 {
                warn!(status = response.status, "Unexpected HTTP status");
            }

            let mut wtr = create_writer(output_path.as_deref()).await?;
            wtr.write_all(&response.body)
                .await
                .context("Failed to write response body")?;
            wtr.flush().await.context("Failed to flush response body")?;
        }
    }
    Ok(())
}
