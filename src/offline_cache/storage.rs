//! On-disk cache buckets.
//!
//! Each named bucket is a directory under the storage root. Each entry is a
//! JSON file holding its URL and response, named after the SHA-256 digest of
//! the URL so that long URLs still fit in a file name. Entries are written
//! to a temporary file and renamed into place, so a reader sees either the
//! old entry or the new one, never half of each.

use base64::{Engine as _, prelude::BASE64_URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
use tokio::fs;

use crate::prelude::*;

use super::Response;

/// A cached response, as stored on disk.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
struct StoredEntry {
    url: String,
    response: Response,
}

/// The set of all cache buckets.
#[derive(Clone, Debug)]
pub struct CacheStorage {
    root: PathBuf,
}

impl CacheStorage {
    /// Use `root` to hold our buckets. It will be created when needed.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The names of every bucket, sorted.
    pub async fn keys(&self) -> Result<Vec<String>> {
        let mut names = vec![];
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("Failed to list cache directory: {:?}", self.root)
                });
            }
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .context("Failed to read cache directory entry")?
        {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let file_name = entry.file_name();
            match decode_name(&file_name.to_string_lossy()) {
                Some(name) => names.push(name),
                None => debug!(dir = ?file_name, "Ignoring unknown directory in cache"),
            }
        }
        names.sort();
        Ok(names)
    }

    /// Open a bucket, creating it if necessary.
    pub async fn open(&self, name: &str) -> Result<Cache> {
        let dir = self.bucket_dir(name);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create cache bucket {:?}", name))?;
        Ok(Cache { dir })
    }

    /// Delete a bucket. Returns false if it didn't exist.
    pub async fn delete(&self, name: &str) -> Result<bool> {
        match fs::remove_dir_all(self.bucket_dir(name)).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => {
                Err(err).with_context(|| format!("Failed to delete cache bucket {:?}", name))
            }
        }
    }

    fn bucket_dir(&self, name: &str) -> PathBuf {
        self.root.join(encode_name(name))
    }
}

/// A single cache bucket, mapping URLs to responses.
#[derive(Clone, Debug)]
pub struct Cache {
    dir: PathBuf,
}

impl Cache {
    /// Look up a cached response.
    pub async fn match_url(&self, url: &str) -> Result<Option<Response>> {
        let path = self.entry_path(url);
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to read cache entry for {}", url));
            }
        };
        let entry = serde_json::from_slice::<StoredEntry>(&data)
            .with_context(|| format!("Corrupt cache entry for {}", url))?;
        Ok(Some(entry.response))
    }

    /// Store a response, replacing any previous entry for `url`.
    pub async fn put(&self, url: &str, response: &Response) -> Result<()> {
        let entry = StoredEntry {
            url: url.to_owned(),
            response: response.clone(),
        };
        let json = serde_json::to_vec(&entry).context("Failed to serialize cache entry")?;
        let path = self.entry_path(url);
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, &json)
            .await
            .with_context(|| format!("Failed to write cache entry for {}", url))?;
        fs::rename(&tmp_path, &path)
            .await
            .with_context(|| format!("Failed to commit cache entry for {}", url))?;
        Ok(())
    }

    /// The URLs of every cached entry, sorted.
    pub async fn keys(&self) -> Result<Vec<String>> {
        let mut urls = vec![];
        let mut entries = fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("Failed to list cache bucket: {:?}", self.dir))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .context("Failed to read cache bucket entry")?
        {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let stored = match fs::read(&path).await {
                Ok(data) => serde_json::from_slice::<StoredEntry>(&data).ok(),
                Err(err) => {
                    debug!(path = ?path, "Failed to read cache entry: {}", err);
                    None
                }
            };
            match stored {
                Some(stored) => urls.push(stored.url),
                None => debug!(path = ?path, "Ignoring unreadable cache entry"),
            }
        }
        urls.sort();
        Ok(urls)
    }

    fn entry_path(&self, url: &str) -> PathBuf {
        self.dir.join(format!("{}.json", url_digest(url)))
    }
}

/// A fixed-length, file-name-safe digest of a URL.
fn url_digest(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Turn an arbitrary string into something safe to use as a file name.
fn encode_name(name: &str) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(name.as_bytes())
}

fn decode_name(encoded: &str) -> Option<String> {
    let bytes = BASE64_URL_SAFE_NO_PAD.decode(encoded).ok()?;
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline_cache::ResponseType;

    fn response(body: &str) -> Response {
        Response {
            status: 200,
            response_type: ResponseType::Basic,
            content_type: Some("text/html".to_owned()),
            body: body.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CacheStorage::new(dir.path());
        let cache = storage.open("isil-ocr-v1").await.unwrap();

        let url = "http://localhost:8080/index.html";
        assert!(cache.match_url(url).await.unwrap().is_none());

        cache.put(url, &response("<h1>v1</h1>")).await.unwrap();
        assert_eq!(cache.match_url(url).await.unwrap(), Some(response("<h1>v1</h1>")));

        // Putting again overwrites.
        cache.put(url, &response("<h1>v2</h1>")).await.unwrap();
        assert_eq!(cache.match_url(url).await.unwrap(), Some(response("<h1>v2</h1>")));
        assert_eq!(cache.keys().await.unwrap(), vec![url.to_owned()]);
    }

    #[tokio::test]
    async fn test_bucket_keys_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CacheStorage::new(dir.path().join("not-yet-created"));
        assert!(storage.keys().await.unwrap().is_empty());

        storage.open("isil-ocr-v2").await.unwrap();
        storage.open("isil-ocr-v1").await.unwrap();
        storage.open("other/app").await.unwrap();
        assert_eq!(
            storage.keys().await.unwrap(),
            vec!["isil-ocr-v1", "isil-ocr-v2", "other/app"]
        );

        assert!(storage.delete("isil-ocr-v1").await.unwrap());
        assert!(!storage.delete("isil-ocr-v1").await.unwrap());
        assert_eq!(storage.keys().await.unwrap(), vec!["isil-ocr-v2", "other/app"]);
    }

    #[test]
    fn test_name_encoding() {
        let name = "http://localhost/a b?c=ş";
        let encoded = encode_name(name);
        assert!(!encoded.contains('/'));
        assert_eq!(decode_name(&encoded).as_deref(), Some(name));
        assert_eq!(decode_name("not base64!"), None);
    }

    #[tokio::test]
    async fn test_long_urls_fit_in_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStorage::new(dir.path()).open("isil-ocr-v1").await.unwrap();

        let url = format!("http://localhost:8080/assets/app.js?v={}", "a".repeat(400));
        cache.put(&url, &response("console.log(1)")).await.unwrap();
        assert_eq!(cache.match_url(&url).await.unwrap(), Some(response("console.log(1)")));
        assert_eq!(cache.keys().await.unwrap(), vec![url.clone()]);
        assert_eq!(cache.entry_path(&url).file_name().unwrap().len(), 64 + ".json".len());
    }

    #[tokio::test]
    async fn test_keys_skip_corrupt_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStorage::new(dir.path()).open("isil-ocr-v1").await.unwrap();

        let good = "http://localhost:8080/";
        let bad = "http://localhost:8080/broken.css";
        cache.put(good, &response("ok")).await.unwrap();
        std::fs::write(cache.entry_path(bad), b"{not json").unwrap();

        assert_eq!(cache.keys().await.unwrap(), vec![good.to_owned()]);
        assert!(cache.match_url(bad).await.is_err());
    }
}
