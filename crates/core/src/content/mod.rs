use std::path::PathBuf;

use async_trait::async_trait;

use crate::{CarouselError, Result};

/// Fixed fragment installed when a content fetch fails.
pub const CONTENT_ERROR_PLACEHOLDER: &str = "<p>Error loading content.</p>";

/// Fetches HTML content fragments by reference. Transport details are up to
/// the implementation; the controller only cares about text or failure.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Fetcher that resolves content references as files under a root
/// directory, matching how the carousel serves its static fragments.
#[derive(Debug, Clone)]
pub struct FsContentFetcher {
    root: PathBuf,
}

impl FsContentFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ContentFetcher for FsContentFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let path = self.root.join(url);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|err| CarouselError::content_fetch(url, err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_fragments_relative_to_the_root() {
        let root = std::env::temp_dir().join(format!("carousel-content-{}", std::process::id()));
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("about.html"), "<p>hello</p>").unwrap();

        let fetcher = FsContentFetcher::new(&root);
        let body = fetcher.fetch("about.html").await.unwrap();
        assert_eq!(body, "<p>hello</p>");

        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn missing_fragments_surface_as_content_fetch_errors() {
        let fetcher = FsContentFetcher::new("/nonexistent-root");
        let err = fetcher.fetch("missing.html").await.unwrap_err();
        assert!(matches!(err, CarouselError::ContentFetch { .. }));
    }
}
