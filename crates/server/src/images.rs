//! Car image storage on the local disk.

use std::path::{Path, PathBuf};

/// Image formats accepted for upload, detected from the file's magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageKind {
    /// Sniff the format from the leading bytes.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [0xFF, 0xD8, 0xFF, ..] => Some(Self::Jpeg),
            [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some(Self::Png),
            [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some(Self::Gif),
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some(Self::Webp),
            _ => None,
        }
    }

    /// Guess from a stored key's extension.
    pub fn from_key(key: &str) -> Option<Self> {
        match Path::new(key).extension()?.to_str()? {
            "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Webp => "webp",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("invalid image key: {0}")]
    InvalidKey(String),
    #[error("image I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Directory-backed store for car images. Keys are bare file names.
#[derive(Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, ImageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(ImageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(key))
    }

    /// Write image bytes for a car, returning the new storage key.
    pub async fn put(&self, car_id: &str, kind: ImageKind, bytes: &[u8]) -> Result<String, ImageError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let key = format!("{car_id}-{}.{}", uuid::Uuid::new_v4().simple(), kind.extension());
        tokio::fs::write(self.path_for(&key)?, bytes).await?;
        Ok(key)
    }

    /// Read a stored image. `Ok(None)` when the file is gone.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ImageError> {
        match tokio::fs::read(self.path_for(key)?).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a stored image; a missing file is not an error.
    pub async fn delete(&self, key: &str) -> Result<(), ImageError> {
        match tokio::fs::remove_file(self.path_for(key)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort removal used after the owning row is already gone.
    pub async fn discard(&self, key: Option<String>) {
        if let Some(key) = key {
            if let Err(e) = self.delete(&key).await {
                tracing::warn!("failed to remove image {key}: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];

    #[test]
    fn detects_supported_formats() {
        assert_eq!(ImageKind::detect(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::detect(PNG_HEADER), Some(ImageKind::Png));
        assert_eq!(ImageKind::detect(b"GIF89a...."), Some(ImageKind::Gif));
        assert_eq!(ImageKind::detect(b"RIFF\0\0\0\0WEBPVP8 "), Some(ImageKind::Webp));
        assert_eq!(ImageKind::detect(b"%PDF-1.7"), None);
        assert_eq!(ImageKind::detect(b""), None);
    }

    #[test]
    fn key_extension_maps_back_to_kind() {
        for kind in [ImageKind::Jpeg, ImageKind::Png, ImageKind::Gif, ImageKind::Webp] {
            let key = format!("car-abc.{}", kind.extension());
            assert_eq!(ImageKind::from_key(&key), Some(kind));
        }
        assert_eq!(ImageKind::from_key("car-abc.exe"), None);
    }

    #[tokio::test]
    async fn put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path().join("car-images"));
        let key = store.put("car1", ImageKind::Png, PNG_HEADER).await.unwrap();
        assert!(key.starts_with("car1-") && key.ends_with(".png"));
        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some(PNG_HEADER));
        store.delete(&key).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), None);
        store.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_path_traversal_keys() {
        let store = ImageStore::new("/tmp/garage-images");
        assert!(matches!(
            store.get("../etc/passwd").await,
            Err(ImageError::InvalidKey(_))
        ));
    }
}
