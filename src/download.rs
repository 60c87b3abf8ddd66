//! Saving generated images to disk.

use crate::error::{PicturaError, Result};
use crate::image::ImageFormat;
use std::path::{Path, PathBuf};

/// Number of prompt characters kept in a download filename.
pub const FILENAME_PROMPT_CHARS: usize = 30;

/// Derives a filename stem from a prompt.
///
/// Keeps the first [`FILENAME_PROMPT_CHARS`] characters and replaces every
/// character that is not an ASCII letter or digit with `-`.
pub fn sanitize_filename(prompt: &str) -> String {
    prompt
        .chars()
        .take(FILENAME_PROMPT_CHARS)
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

/// Decodes a base64 `data:` URL payload.
fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    use base64::Engine;

    let Some(pos) = url.find(";base64,") else {
        return Err(PicturaError::Decode("data URL is not base64 encoded".into()));
    };
    let cleaned: String = url[pos + 8..]
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    base64::engine::general_purpose::STANDARD
        .decode(&cleaned)
        .or_else(|_| base64::engine::general_purpose::STANDARD_NO_PAD.decode(&cleaned))
        .map_err(|e| PicturaError::Decode(e.to_string()))
}

/// Fetches generated images and saves them to disk.
#[derive(Debug, Clone, Default)]
pub struct Downloader {
    client: reqwest::Client,
}

impl Downloader {
    /// Creates a downloader with a fresh HTTP client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetches the bytes behind `url`.
    ///
    /// `http(s)` URLs go over the network; `data:` URLs are decoded in place.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if url.starts_with("data:") {
            return decode_data_url(url);
        }
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(PicturaError::InvalidRequest(format!(
                "unsupported URL scheme: {url}"
            )));
        }

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(PicturaError::Api {
                status: response.status().as_u16(),
                message: "Failed to download image from URL".into(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Downloads `url` into `dir`, naming the file after `prompt`.
    ///
    /// The target name is claimed up front, so concurrent saves of the same
    /// prompt get distinct files. Bytes go to a `.part` file next to it and
    /// are renamed into place; a failed download leaves nothing behind.
    pub async fn save(&self, url: &str, prompt: &str, dir: &Path) -> Result<PathBuf> {
        let data = self.fetch(url).await?;
        let format = ImageFormat::from_magic_bytes(&data).unwrap_or_default();

        tokio::fs::create_dir_all(dir).await?;
        let target = claim_path(dir, &sanitize_filename(prompt), format.extension()).await?;
        let temp = target.with_extension(format!("{}.part", format.extension()));

        let written = match tokio::fs::write(&temp, &data).await {
            Ok(()) => tokio::fs::rename(&temp, &target).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&temp).await;
            let _ = tokio::fs::remove_file(&target).await;
            return Err(e.into());
        }

        tracing::debug!(path = %target.display(), bytes = data.len(), "image saved");
        Ok(target)
    }
}

/// Creates `stem.ext`, or `stem-1.ext`, `stem-2.ext`, ... if taken, and
/// returns the path. Creation is exclusive, so no two callers get the same one.
async fn claim_path(dir: &Path, stem: &str, ext: &str) -> Result<PathBuf> {
    let stem = if stem.is_empty() { "image" } else { stem };
    let mut candidate = dir.join(format!("{stem}.{ext}"));
    let mut n = 1;
    loop {
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                candidate = dir.join(format!("{stem}-{n}.{ext}"));
                n += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    const PNG: [u8; 16] = [
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, 0x49, 0x48, 0x44, 0x52,
    ];

    fn data_url(bytes: &[u8]) -> String {
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(bytes)
        )
    }

    #[test]
    fn test_sanitize_truncates_long_prompt() {
        let prompt = "A majestic red fox, standing in the snow at dawn";
        let name = sanitize_filename(prompt);
        assert_eq!(name, "A-majestic-red-fox--standing-i");
        assert_eq!(name.chars().count(), FILENAME_PROMPT_CHARS);
    }

    #[test]
    fn test_sanitize_short_prompt() {
        assert_eq!(sanitize_filename("a red fox"), "a-red-fox");
        assert_eq!(sanitize_filename("café/été"), "caf---t-");
    }

    #[test]
    fn test_decode_data_url() {
        assert_eq!(decode_data_url(&data_url(&PNG)).unwrap(), PNG.to_vec());
        assert!(decode_data_url("data:text/plain,hello").is_err());
    }

    #[tokio::test]
    async fn test_fetch_rejects_unknown_scheme() {
        let err = Downloader::new().fetch("ftp://example.com/a.png").await;
        assert!(matches!(err, Err(PicturaError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_save_writes_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = Downloader::new();

        let path = downloader
            .save(&data_url(&PNG), "A majestic red fox, standing in the snow", dir.path())
            .await
            .unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "A-majestic-red-fox--standing-i.png"
        );
        assert_eq!(std::fs::read(&path).unwrap(), PNG.to_vec());
    }

    #[tokio::test]
    async fn test_save_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = Downloader::new();
        let url = data_url(&PNG);

        let first = downloader.save(&url, "fox", dir.path()).await.unwrap();
        let second = downloader.save(&url, "fox", dir.path()).await.unwrap();

        assert_eq!(first.file_name().unwrap(), "fox.png");
        assert_eq!(second.file_name().unwrap(), "fox-1.png");
    }

    #[tokio::test]
    async fn test_concurrent_saves_get_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = Downloader::new();
        let url = data_url(&PNG);

        let (a, b) = tokio::join!(
            downloader.save(&url, "fox", dir.path()),
            downloader.save(&url, "fox", dir.path()),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a, b);
        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, ["fox-1.png", "fox.png"]);
        assert_eq!(std::fs::read(&a).unwrap(), PNG.to_vec());
        assert_eq!(std::fs::read(&b).unwrap(), PNG.to_vec());
    }

    #[tokio::test]
    async fn test_save_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fox.png"), b"mine").unwrap();

        let path = Downloader::new()
            .save(&data_url(&PNG), "fox", dir.path())
            .await
            .unwrap();

        assert_eq!(path.file_name().unwrap(), "fox-1.png");
        assert_eq!(std::fs::read(dir.path().join("fox.png")).unwrap(), b"mine");
    }

    #[tokio::test]
    async fn test_save_failure_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let result = Downloader::new()
            .save("data:image/png;base64,@@@", "fox", dir.path())
            .await;

        assert!(result.is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
