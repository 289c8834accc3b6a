//! Offline caching of the app's static assets.
//!
//! This follows the life cycle of a browser service worker:
//!
//! 1. [`OfflineCache::install`] fetches the precache list into the current
//!    bucket. Either every URL is cached or none are.
//! 2. [`OfflineCache::activate`] deletes buckets left over from older
//!    versions.
//! 3. [`OfflineCache::fetch`] answers same-origin `GET` requests from the
//!    cache when it can, and from the network otherwise.

use url::Url;

use crate::prelude::*;

mod network;
mod storage;

pub use network::{Network, ReqwestNetwork};
pub use storage::{Cache, CacheStorage};

/// The name of the current cache bucket. Bump the version to invalidate
/// everything cached by older releases.
pub const CACHE_NAME: &str = "isil-ocr-v1";

/// Paths cached on install, relative to the origin.
pub const PRECACHE_URLS: &[&str] = &[
    "/",
    "/index.html",
    "/src/main.tsx",
    "/src/index.css",
    "/manifest.json",
];

/// What kind of resource a request is for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Destination {
    /// A page navigation.
    Document,
    /// Anything else: scripts, styles, images, API calls.
    #[default]
    Other,
}

/// An outgoing request.
#[derive(Clone, Debug)]
pub struct Request {
    pub method: String,
    pub url: Url,
    pub destination: Destination,
}

impl Request {
    /// A `GET` request for a subresource.
    pub fn get(url: Url) -> Self {
        Self {
            method: "GET".to_owned(),
            url,
            destination: Destination::Other,
        }
    }

    /// A `GET` request for a page.
    pub fn navigate(url: Url) -> Self {
        Self {
            destination: Destination::Document,
            ..Self::get(url)
        }
    }
}

/// Where a response came from, from the point of view of our origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    /// Same-origin. Only these are ever cached.
    Basic,
    /// Cross-origin.
    Cors,
}

/// A response, from the network or the cache.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct Response {
    pub status: u16,
    pub response_type: ResponseType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(with = "base64_body")]
    pub body: Vec<u8>,
}

impl Response {
    /// Should this response be stored in the cache?
    fn is_cacheable(&self) -> bool {
        self.status == 200 && self.response_type == ResponseType::Basic
    }
}

/// How [`OfflineCache::fetch`] handled a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Not ours to handle. The caller should go to the network directly.
    Passthrough,
    /// Answered from the cache.
    Cached(Response),
    /// Answered from the network.
    Network(Response),
    /// The network failed, so we served the cached root page instead.
    Fallback(Response),
}

impl FetchOutcome {
    /// The response, if we produced one.
    pub fn response(&self) -> Option<&Response> {
        match self {
            FetchOutcome::Passthrough => None,
            FetchOutcome::Cached(response)
            | FetchOutcome::Network(response)
            | FetchOutcome::Fallback(response) => Some(response),
        }
    }
}

/// An offline cache for a single origin.
pub struct OfflineCache {
    cache_name: String,
    origin: Url,
    storage: CacheStorage,
    network: Arc<dyn Network>,
}

impl OfflineCache {
    /// Create a cache for `origin`, storing buckets in `storage`.
    pub fn new(
        cache_name: impl Into<String>,
        origin: Url,
        storage: CacheStorage,
        network: Arc<dyn Network>,
    ) -> Self {
        Self {
            cache_name: cache_name.into(),
            origin,
            storage,
            network,
        }
    }

    /// The name of the bucket we read and write.
    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    /// Open our bucket.
    pub async fn open(&self) -> Result<Cache> {
        self.storage.open(&self.cache_name).await
    }

    /// Precache [`PRECACHE_URLS`]. Returns the number of URLs cached.
    ///
    /// Running this twice simply refreshes the same entries.
    #[instrument(level = "info", skip_all, fields(cache = %self.cache_name))]
    pub async fn install(&self) -> Result<usize> {
        let count = self.add_urls(PRECACHE_URLS).await?;
        // There is only ever one of us running, so there is no older version
        // to wait for.
        debug!("Install complete, taking over immediately");
        Ok(count)
    }

    /// Delete every bucket except ours. Returns the deleted names.
    #[instrument(level = "info", skip_all, fields(cache = %self.cache_name))]
    pub async fn activate(&self) -> Result<Vec<String>> {
        let mut deleted = vec![];
        for name in self.storage.keys().await? {
            if name == self.cache_name {
                continue;
            }
            if self.storage.delete(&name).await? {
                info!(old_cache = %name, "Deleted old cache");
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    /// Fetch and cache `urls`, resolved against our origin.
    ///
    /// This is all-or-nothing: if any URL fails to fetch, or returns anything
    /// other than 200, nothing is written.
    #[instrument(level = "debug", skip_all, fields(count = urls.len()))]
    pub async fn add_urls<S: AsRef<str>>(&self, urls: &[S]) -> Result<usize> {
        let mut fetched = Vec::with_capacity(urls.len());
        for url in urls {
            let url = self
                .origin
                .join(url.as_ref())
                .with_context(|| format!("Invalid URL {:?}", url.as_ref()))?;
            let response = self.network.fetch(&Request::get(url.clone())).await?;
            if response.status != 200 {
                bail!("Failed to cache {}: HTTP status {}", url, response.status);
            }
            fetched.push((url, response));
        }

        let cache = self.open().await?;
        for (url, response) in &fetched {
            cache.put(url.as_str(), response).await?;
        }
        Ok(fetched.len())
    }

    /// Answer a request, from the cache if possible.
    ///
    /// Only same-origin `GET` requests are handled. Successful same-origin
    /// responses are added to the cache on the way through. If the network
    /// fails while loading a page, we serve the cached root page.
    #[instrument(level = "debug", skip_all, fields(method = %request.method, url = %request.url))]
    pub async fn fetch(&self, request: &Request) -> Result<FetchOutcome> {
        if request.method != "GET" || request.url.origin() != self.origin.origin() {
            trace!("Not handling request");
            return Ok(FetchOutcome::Passthrough);
        }

        // A broken cache must never stop us from reaching the network.
        let cache = match self.open().await {
            Ok(cache) => Some(cache),
            Err(err) => {
                warn!("Failed to open cache: {:#}", err);
                None
            }
        };
        if let Some(response) = lookup(cache.as_ref(), request.url.as_str()).await {
            debug!("Cache hit");
            return Ok(FetchOutcome::Cached(response));
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if let Some(cache) = cache.as_ref().filter(|_| response.is_cacheable()) {
                    if let Err(err) = cache.put(request.url.as_str(), &response).await {
                        warn!("Failed to cache response: {:#}", err);
                    }
                }
                Ok(FetchOutcome::Network(response))
            }
            Err(err) if request.destination == Destination::Document => {
                let root = self.origin.join("/")?;
                match lookup(cache.as_ref(), root.as_str()).await {
                    Some(response) => {
                        warn!("Network failed, serving cached root page: {:#}", err);
                        Ok(FetchOutcome::Fallback(response))
                    }
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }
}

/// Look up `url`, treating an unreadable entry as a miss.
async fn lookup(cache: Option<&Cache>, url: &str) -> Option<Response> {
    match cache?.match_url(url).await {
        Ok(response) => response,
        Err(err) => {
            warn!("Ignoring cache entry: {:#}", err);
            None
        }
    }
}

/// Store response bodies as base64 strings, which keeps cache entries
/// readable JSON.
mod base64_body {
    use base64::{Engine as _, prelude::BASE64_STANDARD};
    use serde::{Deserialize as _, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64_STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64_STANDARD.decode(encoded).map_err(D::Error::custom)
    }
}
