//! Where layer files come from.
//!
//! A [`FeatureSource`] turns one dataset file name into parsed features.
//! Failures are per file: the registry skips a failed file and keeps the
//! rest of the layer.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};

use formats::error::FormatError;
use formats::geojson::FeatureCollection;
use formats::payload::decode_payload;
use parking_lot::Mutex;

/// Error type for feature source operations.
#[derive(Debug)]
pub struct SourceError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {source}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl SourceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Type alias for a boxed future that can be sent between threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Provider of dataset files.
///
/// Implementations must be `Send + Sync`; methods return boxed futures so
/// the trait stays dyn-compatible.
pub trait FeatureSource: Send + Sync {
    fn fetch<'a>(&'a self, file: &'a str) -> BoxFuture<'a, Result<FeatureCollection, SourceError>>;
}

/// Reads dataset files from a local directory, inflating `.gz` files.
#[derive(Debug, Clone)]
pub struct FilesystemSource {
    root: PathBuf,
}

impl FilesystemSource {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FeatureSource for FilesystemSource {
    fn fetch<'a>(&'a self, file: &'a str) -> BoxFuture<'a, Result<FeatureCollection, SourceError>> {
        let path = self.root.join(file);
        Box::pin(async move {
            let bytes = tokio::fs::read(&path).await.map_err(|e| {
                SourceError::with_source(format!("failed to read {}", path.display()), e)
            })?;
            decode_payload(file, &bytes)
                .map_err(|e| SourceError::with_source(format!("failed to decode {file}"), e))
        })
    }
}

/// In-memory files, for tests and embedding. Counts every fetch.
#[derive(Debug, Default)]
pub struct MemorySource {
    files: BTreeMap<String, Result<FeatureCollection, String>>,
    fetches: AtomicUsize,
    per_file: Mutex<BTreeMap<String, usize>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(mut self, file: &str, collection: FeatureCollection) -> Self {
        self.files.insert(file.to_string(), Ok(collection));
        self
    }

    /// Adds a file from GeoJSON text.
    pub fn with_geojson(self, file: &str, geojson: &str) -> Result<Self, FormatError> {
        let collection = FeatureCollection::from_geojson_str(geojson)?;
        Ok(self.with_collection(file, collection))
    }

    /// Makes every fetch of `file` fail with `message`.
    pub fn with_failure(mut self, file: &str, message: &str) -> Self {
        self.files.insert(file.to_string(), Err(message.to_string()));
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn fetches_of(&self, file: &str) -> usize {
        self.per_file.lock().get(file).copied().unwrap_or(0)
    }
}

impl FeatureSource for MemorySource {
    fn fetch<'a>(&'a self, file: &'a str) -> BoxFuture<'a, Result<FeatureCollection, SourceError>> {
        Box::pin(async move {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            *self.per_file.lock().entry(file.to_string()).or_default() += 1;
            // Give concurrent loaders a chance to interleave.
            tokio::task::yield_now().await;
            match self.files.get(file) {
                Some(Ok(collection)) => Ok(collection.clone()),
                Some(Err(message)) => Err(SourceError::new(message.clone())),
                None => Err(SourceError::new(format!("no such file: {file}"))),
            }
        })
    }
}
