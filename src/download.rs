//! Torrent file downloads.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::feed::{fetch_bytes, FetchError, FetchPolicy};
use crate::util::{sanitize_file_name, validate_url, UrlValidationError};
use crate::watcher::{DeliveryItem, FeedItem};

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Item has no download link")]
    MissingLink,
    #[error("Invalid download link: {0}")]
    InvalidLink(#[from] UrlValidationError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// The body is not a bencoded dictionary (usually an HTML error page)
    #[error("Response is not a torrent file")]
    NotTorrent,
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Saves `.torrent` files for delivered items into one directory.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: reqwest::Client,
    dir: PathBuf,
    policy: FetchPolicy,
}

impl Downloader {
    pub fn new(client: reqwest::Client, dir: impl Into<PathBuf>, policy: FetchPolicy) -> Self {
        Self {
            client,
            dir: dir.into(),
            policy,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/<sanitized title>.torrent`
    pub fn target_path(&self, item: &FeedItem) -> PathBuf {
        self.dir
            .join(format!("{}.torrent", sanitize_file_name(&item.title)))
    }

    /// Fetch the item's link and write it to [`target_path`](Self::target_path).
    ///
    /// The file is written under a `.part` name and renamed into place, so a
    /// failed download never leaves a truncated `.torrent` behind. An existing
    /// file with the same name is replaced.
    pub async fn download(&self, delivery: &DeliveryItem) -> Result<PathBuf, DownloadError> {
        let item = &delivery.item;
        if item.link.trim().is_empty() {
            return Err(DownloadError::MissingLink);
        }
        let url = validate_url(&item.link)?;

        let bytes = fetch_bytes(&self.client, url.as_str(), &self.policy).await?;
        if bytes.first() != Some(&b'd') {
            return Err(DownloadError::NotTorrent);
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| DownloadError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let path = self.target_path(item);
        let partial = path.with_extension("torrent.part");
        tokio::fs::write(&partial, &bytes)
            .await
            .map_err(|source| DownloadError::Io {
                path: partial.clone(),
                source,
            })?;
        tokio::fs::rename(&partial, &path)
            .await
            .map_err(|source| DownloadError::Io {
                path: path.clone(),
                source,
            })?;

        tracing::info!(
            owner = %delivery.owner,
            title = %item.title,
            path = %path.display(),
            bytes = bytes.len(),
            "Downloaded torrent"
        );
        Ok(path)
    }
}
