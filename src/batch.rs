use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use scene_types::{Character, CHARACTERS_MENTIONED, CHARACTERS_PRESENT};
use serde_json::Value;
use thiserror::Error;

use crate::error::{ExtractError, SceneError};
use crate::extract::{scene_registry, NameListExtractor, SpanExtractor};
use crate::registry::CharacterRegistry;
use crate::scene::Scene;

/// Why one file's task did not succeed.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// The scene was extracted but could not be written back.
    #[error("failed to save extracted scene: {0}")]
    Save(SceneError),

    #[error("task aborted: {0}")]
    Aborted(String),
}

/// Result of one file: `Ok(Some(_))` done, `Ok(None)` deliberately skipped.
pub type FileResult<T> = Result<Option<T>, TaskError>;

/// Counts over a finished batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    /// Already processed, or not a usable scene
    pub skipped: usize,
    /// Backend errors, failed writes, aborted tasks
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_results<T>(results: &[(PathBuf, FileResult<T>)]) -> Self {
        let mut summary = BatchSummary {
            total: results.len(),
            ..Default::default()
        };
        for (_, result) in results {
            match result {
                Ok(Some(_)) => summary.succeeded += 1,
                Ok(None) | Err(TaskError::Scene(_)) => summary.skipped += 1,
                Err(_) => summary.failed += 1,
            }
        }
        summary
    }
}

/// Run `task` for every file concurrently and wait for all of them.
///
/// Every task runs to completion; one failure never cancels the others.
/// Results come back in the order of `files`.
pub async fn run_all<T, F, Fut>(files: &[PathBuf], task: F) -> Vec<(PathBuf, FileResult<T>)>
where
    F: Fn(PathBuf) -> Fut,
    Fut: Future<Output = FileResult<T>> + Send + 'static,
    T: Send + 'static,
{
    let handles: Vec<_> = files.iter().map(|p| tokio::spawn(task(p.clone()))).collect();
    let joined = join_all(handles).await;

    files
        .iter()
        .cloned()
        .zip(joined)
        .map(|(path, joined)| {
            let result = joined.unwrap_or_else(|e| Err(TaskError::Aborted(e.to_string())));
            log_result(&path, &result);
            (path, result)
        })
        .collect()
}

fn log_result<T>(path: &Path, result: &FileResult<T>) {
    match result {
        Ok(Some(_)) => tracing::info!(path = %path.display(), "processed"),
        Ok(None) => tracing::info!(path = %path.display(), "skipped"),
        Err(TaskError::Scene(e)) => tracing::warn!("{e}, skipping"),
        Err(e) => tracing::error!(path = %path.display(), error = %e, "failed"),
    }
}

// ── process: scenes → one registry ───────────────────────────────────────

/// Build a registry from every scene.
///
/// Each task owns a private registry; they are merged here in file order,
/// so the result equals observing every span sequentially.
pub async fn process_scenes(
    files: &[PathBuf],
    extractor: Arc<dyn SpanExtractor>,
    context_radius: usize,
) -> (CharacterRegistry, BatchSummary) {
    let results = run_all(files, |path| {
        let extractor = Arc::clone(&extractor);
        async move {
            let scene = Scene::load(&path)?;
            let spans = extractor.extract_spans(scene.text()).await?;
            tracing::debug!(path = %path.display(), spans = spans.len(), backend = extractor.backend_id(), "extracted");
            Ok(Some(scene_registry(scene.text(), &spans, context_radius)))
        }
    })
    .await;

    let summary = BatchSummary::from_results(&results);
    let mut registry = CharacterRegistry::new();
    for (_, result) in results {
        if let Ok(Some(scene_registry)) = result {
            registry.merge(scene_registry);
        }
    }
    (registry, summary)
}

// ── extract: annotate scene files in place ───────────────────────────────

/// The two extraction strategies and the scene field each one fills.
#[derive(Clone)]
pub enum ExtractBackend {
    Names(Arc<dyn NameListExtractor>),
    Spans(Arc<dyn SpanExtractor>),
}

impl ExtractBackend {
    pub fn backend_id(&self) -> &str {
        match self {
            ExtractBackend::Names(extractor) => extractor.backend_id(),
            ExtractBackend::Spans(extractor) => extractor.backend_id(),
        }
    }

    pub fn target_field(&self) -> &'static str {
        match self {
            ExtractBackend::Names(_) => CHARACTERS_MENTIONED,
            ExtractBackend::Spans(_) => CHARACTERS_PRESENT,
        }
    }

    async fn annotate(&self, text: &str, context_radius: usize) -> Result<Value, ExtractError> {
        match self {
            ExtractBackend::Names(extractor) => {
                let names = extractor.extract_names(text).await?;
                tracing::info!(characters = ?names, "extracted names");
                Ok(Value::from(names))
            }
            ExtractBackend::Spans(extractor) => {
                let spans = extractor.extract_spans(text).await?;
                let registry = scene_registry(text, &spans, context_radius);
                let present: Vec<&Character> = registry.characters().values().collect();
                serde_json::to_value(present).map_err(|e| ExtractError::Parse(e.to_string()))
            }
        }
    }
}

/// Run `backend` over each scene and write its field back into the file.
///
/// Scenes that already carry the field are left alone unless `overwrite`.
pub async fn extract_scenes(
    files: &[PathBuf],
    backend: ExtractBackend,
    overwrite: bool,
    context_radius: usize,
) -> BatchSummary {
    let results = run_all(files, |path| {
        let backend = backend.clone();
        async move {
            let mut scene = Scene::load(&path)?;
            let field = backend.target_field();
            if scene.has_field(field) && !overwrite {
                tracing::warn!(path = %scene.path().display(), field, "already extracted, pass --overwrite to replace");
                return Ok(None);
            }

            let value = backend.annotate(scene.text(), context_radius).await?;
            scene.set_field(field, value);
            scene.save().map_err(TaskError::Save)?;
            Ok(Some(()))
        }
    })
    .await;

    BatchSummary::from_results(&results)
}
