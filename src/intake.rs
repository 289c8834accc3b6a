//! File intake: the ordered list of images waiting to be recognized.

use crate::prelude::*;

/// An image file handed to us by the user.
///
/// Never mutated after creation. The data is shared, so cloning is cheap.
#[derive(Clone, Debug)]
pub struct UploadedFile {
    /// The display name of the file, usually the final path component.
    pub name: String,

    /// The size of the file in bytes.
    pub size: u64,

    /// The media type, such as `image/png`.
    pub media_type: String,

    /// The raw file contents.
    pub data: Arc<[u8]>,
}

impl UploadedFile {
    /// Create a new file from in-memory data, detecting the media type.
    pub fn new(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        let name = name.into();
        let data = data.into();
        let media_type = detect_media_type(&name, &data);
        Self {
            name,
            size: data.len() as u64,
            media_type,
            data,
        }
    }

    /// Read a file from disk.
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub async fn from_path(path: &Path) -> Result<Self> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read image at path: {:?}", path))?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("path has no file name: {:?}", path))?;
        Ok(Self::new(name, data))
    }

    /// Does our media type indicate an image?
    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }

    /// The size in megabytes, formatted for display.
    pub fn size_in_mb(&self) -> String {
        format!("{:.2} MB", self.size as f64 / 1024.0 / 1024.0)
    }
}

/// Could the file at `path` be an image? Extensions win over content when
/// we detect media types, so a non-image extension rules a file out before
/// we read it. Files with no known extension have to be sniffed.
pub fn may_be_image(path: &Path) -> bool {
    mime_guess::from_path(path)
        .first()
        .is_none_or(|mime| mime.type_() == mime_guess::mime::IMAGE)
}

/// Guess a media type the way a browser would: from the extension first, and
/// then by sniffing the content.
fn detect_media_type(name: &str, data: &[u8]) -> String {
    if let Some(mime) = mime_guess::from_path(name).first() {
        return mime.essence_str().to_owned();
    }
    infer::get(data)
        .map(|kind| kind.mime_type().to_owned())
        .unwrap_or_else(|| "application/octet-stream".to_owned())
}

/// The ordered list of files selected for recognition.
#[derive(Debug, Default)]
pub struct FileIntake {
    files: Vec<UploadedFile>,
}

impl FileIntake {
    /// Create an empty intake list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append every image in `files`, preserving order. Anything that isn't
    /// an image is dropped without complaint.
    ///
    /// Returns the number of files kept.
    pub fn add(&mut self, files: impl IntoIterator<Item = UploadedFile>) -> usize {
        let before = self.files.len();
        for file in files {
            if file.is_image() {
                self.files.push(file);
            } else {
                debug!(
                    name = %file.name,
                    media_type = %file.media_type,
                    "Ignoring non-image file"
                );
            }
        }
        self.files.len() - before
    }

    /// Remove the file at `index`. Out of range indices do nothing.
    pub fn remove_at(&mut self, index: usize) -> Option<UploadedFile> {
        if index < self.files.len() {
            Some(self.files.remove(index))
        } else {
            None
        }
    }

    /// Remove every file.
    pub fn clear(&mut self) {
        self.files.clear();
    }

    /// The files, in submission order.
    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
