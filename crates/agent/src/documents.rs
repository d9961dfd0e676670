//! Grounding documents: where they come from and how they are cached.
//!
//! Each document has its own write-once slot. A lookup that finds the slot
//! empty fetches and parses without holding any lock, so concurrent first
//! lookups may both fetch; whichever stores first wins and later results are
//! dropped. Failures and empty parses leave the slot empty so the next lookup
//! retries.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{info, warn};

use folio_core::config::{DocumentSourceKind, DocumentsConfig};
use folio_core::domain::document::{DocumentKind, GroundingDocument};

const HTTP_FETCH_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document `{object}` was not found")]
    NotFound { object: String },
    #[error("fetching document `{object}` failed: {message}")]
    Fetch { object: String, message: String },
    #[error("parsing document `{object}` failed: {message}")]
    Parse { object: String, message: String },
}

/// Raw object store holding the grounding documents.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch(&self, object: &str) -> Result<Vec<u8>, DocumentError>;
}

/// Objects served over HTTP(S) at `{base_url}/{object}`, for example a public
/// storage bucket.
pub struct HttpDocumentSource {
    http: Client,
    base_url: String,
}

impl HttpDocumentSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self, DocumentError> {
        let base_url = base_url.into();
        let http =
            Client::builder().timeout(Duration::from_secs(HTTP_FETCH_TIMEOUT_SECS)).build().map_err(
                |e| DocumentError::Fetch { object: base_url.clone(), message: e.to_string() },
            )?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string() })
    }
}

#[async_trait]
impl DocumentSource for HttpDocumentSource {
    async fn fetch(&self, object: &str) -> Result<Vec<u8>, DocumentError> {
        let url = format!("{}/{}", self.base_url, object.trim_start_matches('/'));
        let fetch_error =
            |message: String| DocumentError::Fetch { object: object.to_string(), message };

        let response = self.http.get(&url).send().await.map_err(|e| fetch_error(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(DocumentError::NotFound { object: object.to_string() });
        }
        if !status.is_success() {
            return Err(fetch_error(format!("{url} returned {status}")));
        }

        let bytes = response.bytes().await.map_err(|e| fetch_error(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Objects read from a local directory.
pub struct FsDocumentSource {
    root: PathBuf,
}

impl FsDocumentSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl DocumentSource for FsDocumentSource {
    async fn fetch(&self, object: &str) -> Result<Vec<u8>, DocumentError> {
        let path = self.root.join(object);
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => DocumentError::NotFound { object: object.to_string() },
            _ => DocumentError::Fetch {
                object: object.to_string(),
                message: format!("{}: {e}", path.display()),
            },
        })
    }
}

pub fn source_from_config(
    config: &DocumentsConfig,
) -> Result<Arc<dyn DocumentSource>, DocumentError> {
    Ok(match config.source {
        DocumentSourceKind::Http => Arc::new(HttpDocumentSource::new(config.location.clone())?),
        DocumentSourceKind::Filesystem => Arc::new(FsDocumentSource::new(&config.location)),
    })
}

pub struct DocumentCache {
    source: Arc<dyn DocumentSource>,
    resume_object: String,
    background_object: String,
    resume: OnceLock<GroundingDocument>,
    background: OnceLock<GroundingDocument>,
}

impl DocumentCache {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        resume_object: impl Into<String>,
        background_object: impl Into<String>,
    ) -> Self {
        Self {
            source,
            resume_object: resume_object.into(),
            background_object: background_object.into(),
            resume: OnceLock::new(),
            background: OnceLock::new(),
        }
    }

    pub fn from_config(source: Arc<dyn DocumentSource>, config: &DocumentsConfig) -> Self {
        Self::new(source, config.resume_object.clone(), config.background_object.clone())
    }

    /// Text of the document, or `""` when it cannot be produced right now.
    pub async fn get(&self, kind: DocumentKind) -> String {
        if let Some(document) = self.slot(kind).get() {
            return document.text.clone();
        }

        let object = self.object(kind);
        match self.load(kind).await {
            Ok(document) if document.text.is_empty() => {
                warn!(
                    event_name = "documents.empty",
                    document = kind.as_str(),
                    object,
                    byte_len = document.byte_len,
                    "grounding document parsed to empty text; not caching"
                );
                String::new()
            }
            Ok(document) => {
                let byte_len = document.byte_len;
                let stored = self.slot(kind).get_or_init(|| document);
                info!(
                    event_name = "documents.cached",
                    document = kind.as_str(),
                    object,
                    byte_len,
                    chars = stored.text.chars().count(),
                    "grounding document cached"
                );
                stored.text.clone()
            }
            Err(error) => {
                warn!(
                    event_name = "documents.unavailable",
                    document = kind.as_str(),
                    object,
                    error = %error,
                    "grounding document unavailable; continuing without it"
                );
                String::new()
            }
        }
    }

    pub fn cached(&self, kind: DocumentKind) -> Option<&GroundingDocument> {
        self.slot(kind).get()
    }

    pub fn cached_kinds(&self) -> Vec<DocumentKind> {
        DocumentKind::ALL.into_iter().filter(|kind| self.cached(*kind).is_some()).collect()
    }

    fn slot(&self, kind: DocumentKind) -> &OnceLock<GroundingDocument> {
        match kind {
            DocumentKind::Resume => &self.resume,
            DocumentKind::Background => &self.background,
        }
    }

    fn object(&self, kind: DocumentKind) -> &str {
        match kind {
            DocumentKind::Resume => &self.resume_object,
            DocumentKind::Background => &self.background_object,
        }
    }

    async fn load(&self, kind: DocumentKind) -> Result<GroundingDocument, DocumentError> {
        let object = self.object(kind);
        let bytes = self.source.fetch(object).await?;
        let byte_len = bytes.len();
        let text = parse(kind, object, bytes).await?;
        Ok(GroundingDocument { kind, byte_len, text: text.trim().to_string() })
    }
}

async fn parse(kind: DocumentKind, object: &str, bytes: Vec<u8>) -> Result<String, DocumentError> {
    match kind {
        DocumentKind::Resume => {
            let parse_error =
                |message: String| DocumentError::Parse { object: object.to_string(), message };
            tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
                .await
                .map_err(|e| parse_error(e.to_string()))?
                .map_err(|e| parse_error(e.to_string()))
        }
        DocumentKind::Background => Ok(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;

    use folio_core::domain::document::DocumentKind;

    use super::{DocumentCache, DocumentError, DocumentSource, FsDocumentSource, HttpDocumentSource};
    use crate::test_http::serve_once;

    /// Serves queued responses per object and counts fetches.
    #[derive(Default)]
    struct ScriptedSource {
        responses: Mutex<HashMap<String, Vec<Result<Vec<u8>, String>>>>,
        fetches: AtomicUsize,
        delay: Option<Duration>,
    }

    impl ScriptedSource {
        fn push(&self, object: &str, response: Result<&[u8], &str>) {
            let response = response.map(<[u8]>::to_vec).map_err(str::to_string);
            self.responses
                .lock()
                .expect("responses lock")
                .entry(object.to_string())
                .or_default()
                .push(response);
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DocumentSource for ScriptedSource {
        async fn fetch(&self, object: &str) -> Result<Vec<u8>, DocumentError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let next = {
                let mut responses = self.responses.lock().expect("responses lock");
                let queue = responses.entry(object.to_string()).or_default();
                if queue.len() > 1 {
                    Some(queue.remove(0))
                } else {
                    queue.first().cloned()
                }
            };

            match next {
                Some(Ok(bytes)) => Ok(bytes),
                Some(Err(message)) => {
                    Err(DocumentError::Fetch { object: object.to_string(), message })
                }
                None => Err(DocumentError::NotFound { object: object.to_string() }),
            }
        }
    }

    fn cache(source: &Arc<ScriptedSource>) -> DocumentCache {
        DocumentCache::new(source.clone(), "resume.pdf", "background.txt")
    }

    #[tokio::test]
    async fn successful_fetch_is_memoized() {
        let source = Arc::new(ScriptedSource::default());
        source.push("background.txt", Ok(b"  Grew up by the sea.\n"));
        let cache = cache(&source);

        assert_eq!(cache.get(DocumentKind::Background).await, "Grew up by the sea.");
        assert_eq!(cache.get(DocumentKind::Background).await, "Grew up by the sea.");
        assert_eq!(source.fetches(), 1);

        let cached = cache.cached(DocumentKind::Background).expect("cached document");
        assert_eq!(cached.byte_len, 22);
        assert_eq!(cache.cached_kinds(), vec![DocumentKind::Background]);
    }

    #[tokio::test]
    async fn fetch_failure_returns_empty_and_retries() {
        let source = Arc::new(ScriptedSource::default());
        source.push("background.txt", Err("connection refused"));
        source.push("background.txt", Ok(b"Second attempt works."));
        let cache = cache(&source);

        assert_eq!(cache.get(DocumentKind::Background).await, "");
        assert!(cache.cached(DocumentKind::Background).is_none());

        assert_eq!(cache.get(DocumentKind::Background).await, "Second attempt works.");
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn empty_text_is_not_cached() {
        let source = Arc::new(ScriptedSource::default());
        source.push("background.txt", Ok(b"   \n\t"));
        let cache = cache(&source);

        assert_eq!(cache.get(DocumentKind::Background).await, "");
        assert_eq!(cache.get(DocumentKind::Background).await, "");
        assert_eq!(source.fetches(), 2);
        assert!(cache.cached_kinds().is_empty());
    }

    #[tokio::test]
    async fn missing_object_is_degraded_not_fatal() {
        let source = Arc::new(ScriptedSource::default());
        let cache = cache(&source);

        assert_eq!(cache.get(DocumentKind::Resume).await, "");
        assert_eq!(cache.get(DocumentKind::Background).await, "");
    }

    #[tokio::test]
    async fn unparseable_pdf_returns_empty_and_is_not_cached() {
        let source = Arc::new(ScriptedSource::default());
        source.push("resume.pdf", Ok(b"definitely not a pdf"));
        let cache = cache(&source);

        assert_eq!(cache.get(DocumentKind::Resume).await, "");
        assert!(cache.cached(DocumentKind::Resume).is_none());
    }

    #[tokio::test]
    async fn invalid_utf8_background_is_decoded_lossily() {
        let source = Arc::new(ScriptedSource::default());
        source.push("background.txt", Ok(b"caf\xe9 owner"));
        let cache = cache(&source);

        let text = cache.get(DocumentKind::Background).await;
        assert!(text.starts_with("caf"));
        assert!(text.ends_with("owner"));
    }

    #[tokio::test]
    async fn concurrent_first_lookups_agree_on_one_value() {
        let source = Arc::new(ScriptedSource {
            delay: Some(Duration::from_millis(20)),
            ..ScriptedSource::default()
        });
        source.push("background.txt", Ok(b"first"));
        source.push("background.txt", Ok(b"second"));
        let cache = Arc::new(cache(&source));

        let (a, b) = tokio::join!(
            cache.get(DocumentKind::Background),
            cache.get(DocumentKind::Background)
        );

        let cached = cache.cached(DocumentKind::Background).expect("cached").text.clone();
        assert!(cached == "first" || cached == "second");
        assert_eq!(a, cached);
        assert_eq!(b, cached);
        assert_eq!(cache.get(DocumentKind::Background).await, cached);
        assert!(source.fetches() <= 2);
    }

    #[tokio::test]
    async fn filesystem_source_reads_objects_from_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("background.txt"), "From disk.").expect("write fixture");
        let source = FsDocumentSource::new(dir.path());

        assert_eq!(source.fetch("background.txt").await.expect("fetch"), b"From disk.".to_vec());
        assert!(matches!(
            source.fetch("resume.pdf").await,
            Err(DocumentError::NotFound { ref object }) if object == "resume.pdf"
        ));
    }

    #[tokio::test]
    async fn http_source_returns_body_on_success() {
        let (base_url, server) = serve_once("200 OK", "Sails on weekends.".to_string()).await;
        let source = HttpDocumentSource::new(format!("{base_url}/")).expect("source");

        let bytes = source.fetch("background.txt").await.expect("fetch");

        assert_eq!(bytes, b"Sails on weekends.".to_vec());
        let raw_request = server.await.expect("server task");
        assert!(raw_request.starts_with("GET /background.txt HTTP/1.1"));
    }

    #[tokio::test]
    async fn http_source_maps_404_to_not_found() {
        let (base_url, _server) = serve_once("404 Not Found", String::new()).await;
        let source = HttpDocumentSource::new(base_url).expect("source");

        assert!(matches!(
            source.fetch("resume.pdf").await,
            Err(DocumentError::NotFound { ref object }) if object == "resume.pdf"
        ));
    }

    #[tokio::test]
    async fn http_source_maps_other_statuses_to_fetch_error() {
        let (base_url, _server) =
            serve_once("500 Internal Server Error", "boom".to_string()).await;
        let source = HttpDocumentSource::new(base_url).expect("source");

        match source.fetch("background.txt").await {
            Err(DocumentError::Fetch { object, message }) => {
                assert_eq!(object, "background.txt");
                assert!(message.contains("500"), "{message}");
            }
            other => panic!("expected fetch error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cache_over_http_leaves_missing_document_uncached() {
        let (base_url, _server) = serve_once("404 Not Found", String::new()).await;
        let source = Arc::new(HttpDocumentSource::new(base_url).expect("source"));
        let cache = DocumentCache::new(source, "resume.pdf", "background.txt");

        assert_eq!(cache.get(DocumentKind::Background).await, "");
        assert!(cache.cached(DocumentKind::Background).is_none());
        assert!(cache.cached_kinds().is_empty());
    }
}
