//! File discovery for building batches from local paths.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::ProcessingConfig;
use crate::types::RawAsset;

/// Mime type used when the extension is not recognized.
pub const UNKNOWN_MIME: &str = "application/octet-stream";

/// Finds files to ingest.
pub struct FileDiscovery {
    config: ProcessingConfig,
}

/// Information about a discovered file.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    /// Full path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Mime type guessed from the extension
    pub mime_type: String,
}

impl DiscoveredFile {
    /// File name as it will be submitted.
    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }

    /// Read the file into a [`RawAsset`].
    pub async fn load(&self) -> std::io::Result<RawAsset> {
        let bytes = tokio::fs::read(&self.path).await?;
        Ok(RawAsset::new(self.filename(), self.mime_type.clone(), bytes))
    }
}

impl FileDiscovery {
    pub fn new(config: ProcessingConfig) -> Self {
        Self { config }
    }

    /// Discover files at a path.
    ///
    /// A file named directly is always returned, even with an unsupported
    /// type, so the pipeline can report it. Directories are walked
    /// recursively and only files with a supported type are kept.
    pub fn discover(&self, path: &Path) -> Vec<DiscoveredFile> {
        if path.is_file() {
            return std::fs::metadata(path)
                .map(|meta| {
                    vec![DiscoveredFile {
                        path: path.to_path_buf(),
                        size: meta.len(),
                        mime_type: mime_for_path(path).unwrap_or(UNKNOWN_MIME).to_string(),
                    }]
                })
                .unwrap_or_default();
        }

        let mut files = Vec::new();

        for entry in WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let entry_path = entry.path();
            if !entry_path.is_file() {
                continue;
            }
            let Some(mime_type) = mime_for_path(entry_path) else {
                continue;
            };
            if !self.config.supports(mime_type) {
                continue;
            }
            if let Ok(meta) = entry.metadata() {
                files.push(DiscoveredFile {
                    path: entry_path.to_path_buf(),
                    size: meta.len(),
                    mime_type: mime_type.to_string(),
                });
            }
        }

        // Sort by path for deterministic ordering
        files.sort_by(|a, b| a.path.cmp(&b.path));
        files
    }

    /// Discover files across several paths, keeping the order the paths were given in.
    pub fn discover_all(&self, paths: &[PathBuf]) -> Vec<DiscoveredFile> {
        paths.iter().flat_map(|p| self.discover(p)).collect()
    }

    /// Get total size of all discovered files.
    pub fn total_size(files: &[DiscoveredFile]) -> u64 {
        files.iter().map(|f| f.size).sum()
    }
}

/// Guess a mime type from the file extension.
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        "gif" => Some("image/gif"),
        "tif" | "tiff" => Some("image/tiff"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path(Path::new("a.JPG")), Some("image/jpeg"));
        assert_eq!(mime_for_path(Path::new("a.jpeg")), Some("image/jpeg"));
        assert_eq!(mime_for_path(Path::new("IMG_1.HEIC")), Some("image/heic"));
        assert_eq!(mime_for_path(Path::new("notes.txt")), None);
        assert_eq!(mime_for_path(Path::new("README")), None);
    }

    #[test]
    fn test_directory_walk_keeps_supported_types() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("b.png"), b"x").unwrap();
        std::fs::write(dir.path().join("sub/a.jpg"), b"xy").unwrap();
        std::fs::write(dir.path().join("anim.gif"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let discovery = FileDiscovery::new(ProcessingConfig::default());
        let files = discovery.discover(dir.path());
        let names: Vec<String> = files.iter().map(|f| f.filename()).collect();
        assert_eq!(names, vec!["b.png", "a.jpg"]);
        assert_eq!(FileDiscovery::total_size(&files), 3);
    }

    #[test]
    fn test_explicit_file_is_kept_even_if_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anim.gif");
        std::fs::write(&path, b"GIF89a").unwrap();
        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, b"hi").unwrap();

        let discovery = FileDiscovery::new(ProcessingConfig::default());
        let files = discovery.discover_all(&[path, notes]);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].mime_type, "image/gif");
        assert_eq!(files[1].mime_type, UNKNOWN_MIME);
    }

    #[tokio::test]
    async fn test_load_reads_raw_asset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cat.webp");
        std::fs::write(&path, b"RIFF0000WEBP").unwrap();

        let files = FileDiscovery::new(ProcessingConfig::default()).discover(&path);
        let asset = files[0].load().await.unwrap();
        assert_eq!(asset.filename, "cat.webp");
        assert_eq!(asset.mime_type, "image/webp");
        assert_eq!(asset.size(), 12);
    }
}
