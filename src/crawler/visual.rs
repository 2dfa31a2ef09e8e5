//! Visual resolver
//!
//! Downloads a record's media, hashes it, and settles it against the crawl's
//! dedup index. Bit-identical media is stored once; later records point at the
//! canonical owner's file.

use crate::crawler::Fetcher;
use crate::state::{CanonicalVisual, DedupIndex, HashClaim};
use crate::storage::{VisualKind, VisualRef};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Longest file extension taken from a source URL
const MAX_EXTENSION_LEN: usize = 5;

/// A classified visual found in an article, not yet downloaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisualCandidate {
    pub kind: VisualKind,
    pub source_url: String,
}

impl VisualCandidate {
    /// File extension from the source URL's last path segment
    ///
    /// Falls back to the kind's default when the URL has no usable extension.
    pub fn extension(&self) -> String {
        url::Url::parse(&self.source_url)
            .ok()
            .and_then(|url| {
                url.path_segments()
                    .and_then(|mut segments| segments.next_back().map(str::to_string))
            })
            .and_then(|name| {
                name.rsplit_once('.')
                    .map(|(_, ext)| ext.trim().to_ascii_lowercase())
            })
            .filter(|ext| {
                !ext.is_empty()
                    && ext.len() <= MAX_EXTENSION_LEN
                    && ext.chars().all(|c| c.is_ascii_alphanumeric())
            })
            .unwrap_or_else(|| self.kind.default_extension().to_string())
    }
}

/// SHA-256 hex digest of downloaded media
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Resolves visual candidates into stored, deduplicated `VisualRef`s
#[derive(Debug, Clone)]
pub struct VisualResolver {
    fetcher: Fetcher,
    index: Arc<DedupIndex>,
    visuals_dir: PathBuf,
}

impl VisualResolver {
    /// Creates a resolver writing canonical files into `visuals_dir`
    pub fn new(fetcher: Fetcher, index: Arc<DedupIndex>, visuals_dir: PathBuf) -> Self {
        Self {
            fetcher,
            index,
            visuals_dir,
        }
    }

    pub fn visuals_dir(&self) -> &Path {
        &self.visuals_dir
    }

    /// Downloads, hashes, and deduplicates one visual
    ///
    /// Never fails the record: any problem is logged and yields `None`, leaving
    /// the record's text intact.
    pub async fn resolve(
        &self,
        candidate: &VisualCandidate,
        owner_id: &str,
        record_id: &str,
    ) -> Option<VisualRef> {
        let bytes = match self.fetcher.fetch_bytes(&candidate.source_url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(
                    owner = %owner_id,
                    record = %record_id,
                    "Failed to download visual: {}",
                    e
                );
                return None;
            }
        };

        let hash = content_hash(&bytes);
        let extension = candidate.extension();
        let path = self
            .visuals_dir
            .join(format!("{}.{}", record_id, extension));

        // The hash is claimed only once the file is on disk
        if let Err(e) = write_visual(&path, &bytes).await {
            tracing::warn!(
                owner = %owner_id,
                record = %record_id,
                "Failed to write visual to {}: {}",
                path.display(),
                e
            );
            return None;
        }

        let claim = self.index.claim_hash(CanonicalVisual {
            record_id: record_id.to_string(),
            visual_id: record_id.to_string(),
            extension: extension.clone(),
            content_hash: hash.clone(),
        });

        match claim {
            HashClaim::Canonical => {
                tracing::debug!(record = %record_id, "Stored visual {}", path.display());
                Some(VisualRef {
                    kind: candidate.kind,
                    visual_id: record_id.to_string(),
                    source_url: candidate.source_url.clone(),
                    extension,
                    content_hash: hash,
                })
            }
            HashClaim::Duplicate(canonical) => {
                tracing::debug!(
                    record = %record_id,
                    "Visual duplicates record {}",
                    canonical.record_id
                );
                if canonical.visual_id != record_id {
                    if let Err(e) = tokio::fs::remove_file(&path).await {
                        tracing::warn!(
                            owner = %owner_id,
                            record = %record_id,
                            "Failed to remove duplicate visual {}: {}",
                            path.display(),
                            e
                        );
                    }
                }
                Some(VisualRef {
                    kind: candidate.kind,
                    visual_id: canonical.visual_id,
                    source_url: candidate.source_url.clone(),
                    extension: canonical.extension,
                    content_hash: canonical.content_hash,
                })
            }
        }
    }
}

/// Writes through a `.part` sibling so the final name only ever holds a complete file
async fn write_visual(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    let result = match tokio::fs::write(&partial, bytes).await {
        Ok(()) => tokio::fs::rename(&partial, path).await,
        Err(e) => Err(e),
    };
    if result.is_err() {
        let _ = tokio::fs::remove_file(&partial).await;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CrawlerConfig;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn candidate(kind: VisualKind, url: &str) -> VisualCandidate {
        VisualCandidate {
            kind,
            source_url: url.to_string(),
        }
    }

    fn resolver(index: Arc<DedupIndex>, dir: &TempDir) -> VisualResolver {
        let fetcher = Fetcher::new(&CrawlerConfig::default()).unwrap();
        VisualResolver::new(fetcher, index, dir.path().join("visuals_alice"))
    }

    #[test]
    fn test_extension_from_url() {
        assert_eq!(
            candidate(VisualKind::Image, "https://cdn.test/a/b.PNG?x=1").extension(),
            "png"
        );
        assert_eq!(
            candidate(VisualKind::Video, "https://cdn.test/stream").extension(),
            "mp4"
        );
        assert_eq!(
            candidate(VisualKind::Gif, "https://cdn.test/weird.name.toolong").extension(),
            "gif"
        );
    }

    #[test]
    fn test_content_hash_is_stable() {
        let a = content_hash(b"same bytes");
        let b = content_hash(b"same bytes");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, content_hash(b"other bytes"));
    }

    #[tokio::test]
    async fn test_canonical_then_duplicate() {
        let server = MockServer::start().await;
        for p in ["/one.jpg", "/two.jpg"] {
            Mock::given(method("GET"))
                .and(path(p))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(b"pixels".to_vec()))
                .mount(&server)
                .await;
        }

        let dir = TempDir::new().unwrap();
        let index = Arc::new(DedupIndex::new());
        let resolver = resolver(Arc::clone(&index), &dir);

        let first = resolver
            .resolve(
                &candidate(VisualKind::Image, &format!("{}/one.jpg", server.uri())),
                "alice",
                "10",
            )
            .await
            .unwrap();
        let second = resolver
            .resolve(
                &candidate(VisualKind::Image, &format!("{}/two.jpg", server.uri())),
                "alice",
                "11",
            )
            .await
            .unwrap();

        assert_eq!(first.visual_id, "10");
        assert_eq!(second.visual_id, "10");
        assert_eq!(second.extension, first.extension);
        assert_eq!(second.content_hash, first.content_hash);
        assert!(second.source_url.ends_with("/two.jpg"));

        assert!(resolver.visuals_dir().join("10.jpg").exists());
        assert!(!resolver.visuals_dir().join("11.jpg").exists());
    }

    #[tokio::test]
    async fn test_download_failure_yields_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let index = Arc::new(DedupIndex::new());
        let resolver = resolver(Arc::clone(&index), &dir);

        let result = resolver
            .resolve(
                &candidate(VisualKind::Image, &format!("{}/gone.jpg", server.uri())),
                "alice",
                "10",
            )
            .await;

        assert!(result.is_none());
        assert_eq!(index.hash_count(), 0);
    }

    #[tokio::test]
    async fn test_persisted_owner_is_reused() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"old pixels".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let index = Arc::new(DedupIndex::new());
        index.claim_hash(CanonicalVisual {
            record_id: "1".to_string(),
            visual_id: "1".to_string(),
            extension: "png".to_string(),
            content_hash: content_hash(b"old pixels"),
        });
        let resolver = resolver(Arc::clone(&index), &dir);

        let visual = resolver
            .resolve(
                &candidate(VisualKind::Image, &format!("{}/re-upload.jpg", server.uri())),
                "alice",
                "50",
            )
            .await
            .unwrap();

        assert_eq!(visual.visual_id, "1");
        assert_eq!(visual.extension, "png");
        assert!(!resolver.visuals_dir().join("50.jpg").exists());
        assert_eq!(std::fs::read_dir(resolver.visuals_dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_hash_unclaimed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"shared".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let index = Arc::new(DedupIndex::new());

        // A regular file where the visuals directory should go makes every write fail
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let fetcher = Fetcher::new(&CrawlerConfig::default()).unwrap();
        let broken = VisualResolver::new(fetcher, Arc::clone(&index), blocker.join("visuals_alice"));

        let lost = broken
            .resolve(
                &candidate(VisualKind::Image, &format!("{}/a.jpg", server.uri())),
                "alice",
                "10",
            )
            .await;
        assert!(lost.is_none());
        assert_eq!(index.hash_count(), 0);

        // The same bytes on a later record become canonical with their own file
        let resolver = resolver(Arc::clone(&index), &dir);
        let kept = resolver
            .resolve(
                &candidate(VisualKind::Image, &format!("{}/b.jpg", server.uri())),
                "alice",
                "11",
            )
            .await
            .unwrap();

        assert_eq!(kept.visual_id, "11");
        assert!(resolver.visuals_dir().join("11.jpg").exists());
        assert_eq!(index.duplicate_of(&kept.content_hash).unwrap().record_id, "11");
    }

    #[tokio::test]
    async fn test_concurrent_identical_visuals_share_one_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"twin".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let index = Arc::new(DedupIndex::new());
        let resolver = resolver(Arc::clone(&index), &dir);
        let first = candidate(VisualKind::Image, &format!("{}/x.jpg", server.uri()));
        let second = candidate(VisualKind::Image, &format!("{}/y.jpg", server.uri()));

        let (a, b) = tokio::join!(
            resolver.resolve(&first, "alice", "20"),
            resolver.resolve(&second, "alice", "21"),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.visual_id, b.visual_id);
        let files: Vec<String> = std::fs::read_dir(resolver.visuals_dir())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(files, vec![format!("{}.jpg", a.visual_id)]);
    }
}
