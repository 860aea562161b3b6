//! Batch glue: input specs, per-document pipeline runs, and the collection
//! directory scan.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::{build_query, PipelineConfig};
use crate::embedding::Embedder;
use crate::error::{EmbeddingError, PipelineError, Result};
use crate::extract_sections;
use crate::logging::BATCH;
use crate::rank::rank_sections;
use crate::report::{assemble_document, write_report, CollectionReport, RankedResult, ReportMetadata};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Persona {
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobToBeDone {
    pub task: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DocumentRef {
    pub filename: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// The per-collection input file. Unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InputSpec {
    pub persona: Persona,
    pub job_to_be_done: JobToBeDone,
    pub documents: Vec<DocumentRef>,
}

impl InputSpec {
    pub fn query(&self) -> String {
        build_query(&self.persona.role, &self.job_to_be_done.task)
    }

    pub fn document_names(&self) -> Vec<String> {
        self.documents.iter().map(|d| d.filename.clone()).collect()
    }
}

pub fn load_input_spec(path: &Path) -> Result<InputSpec> {
    if !path.is_file() {
        return Err(PipelineError::MissingInputSpec(path.to_path_buf()));
    }
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|e| PipelineError::MalformedInputSpec {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Outcome of a whole batch, by collection directory name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub processed: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

fn join_failure(path: &Path, e: JoinError) -> PipelineError {
    if e.is_panic() {
        PipelineError::DocumentParse {
            path: path.to_path_buf(),
            reason: "parser panicked".to_string(),
        }
    } else {
        PipelineError::Task(e.to_string())
    }
}

/// Runs extraction and ranking for one document of a collection.
///
/// Parsing runs on the blocking pool; ranking runs there too, bounded by
/// `config.embed_timeout_secs`. A document with no detectable headings
/// yields no results and never reaches the embedder.
pub async fn process_document(
    dir: &Path,
    file_name: &str,
    query: Arc<str>,
    config: Arc<PipelineConfig>,
    embedder: Arc<dyn Embedder>,
) -> Result<Vec<RankedResult>> {
    let path = dir.join(file_name);
    if !path.is_file() {
        return Err(PipelineError::MissingDocumentFile(path));
    }

    let sections = {
        let doc_path = path.clone();
        let config = Arc::clone(&config);
        tokio::task::spawn_blocking(move || extract_sections(&doc_path, &config))
            .await
            .map_err(|e| join_failure(&path, e))??
    };
    if sections.is_empty() {
        info!(target: BATCH, "no headings detected");
        return Ok(Vec::new());
    }

    let top_k = config.top_k;
    let rank_task = tokio::task::spawn_blocking(move || {
        let ranked = rank_sections(&sections, &query, top_k, embedder.as_ref());
        (sections, ranked)
    });
    let secs = config.embed_timeout_secs;
    let (sections, ranked) = match tokio::time::timeout(Duration::from_secs(secs), rank_task).await
    {
        Err(_elapsed) => {
            return Err(PipelineError::EmbeddingTimeout {
                document: file_name.to_string(),
                secs,
            })
        }
        Ok(joined) => joined.map_err(|e| PipelineError::Task(e.to_string()))?,
    };
    let ranked = ranked?;

    Ok(assemble_document(
        file_name,
        &sections,
        &ranked,
        config.title_max_chars,
    ))
}

/// Processes every document listed in `dir`'s input spec and writes the
/// report next to it.
///
/// Documents run concurrently; results are put back into input-spec order
/// before assembly. Document-level failures drop that document only.
pub async fn process_collection(
    dir: &Path,
    config: Arc<PipelineConfig>,
    embedder: Arc<dyn Embedder>,
) -> Result<CollectionReport> {
    let spec = load_input_spec(&dir.join(&config.input_file_name))?;
    let query: Arc<str> = Arc::from(spec.query());
    let names = spec.document_names();
    info!(target: BATCH, documents = names.len(), "loaded input spec");

    let mut tasks = JoinSet::new();
    for (idx, name) in names.iter().cloned().enumerate() {
        let dir = dir.to_path_buf();
        let query = Arc::clone(&query);
        let config = Arc::clone(&config);
        let embedder = Arc::clone(&embedder);
        let span = info_span!(target: BATCH, "document", name = %name);
        tasks.spawn(
            async move {
                let outcome = process_document(&dir, &name, query, config, embedder).await;
                (idx, name, outcome)
            }
            .instrument(span),
        );
    }

    let mut finished = Vec::with_capacity(names.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(done) => finished.push(done),
            Err(e) => error!(target: BATCH, "document task failed: {}", e),
        }
    }
    finished.sort_by_key(|(idx, _, _)| *idx);

    let mut results = Vec::new();
    for (_, name, outcome) in finished {
        match outcome {
            Ok(doc_results) => {
                info!(target: BATCH, document = %name, kept = doc_results.len(), "document ranked");
                results.extend(doc_results);
            }
            Err(e) if e.is_document_scoped() => {
                warn!(target: BATCH, document = %name, "skipping document: {}", e);
            }
            Err(e) => return Err(e),
        }
    }

    let metadata = ReportMetadata::new(
        names,
        spec.persona.role.clone(),
        spec.job_to_be_done.task.clone(),
        Utc::now(),
    );
    let report = CollectionReport::new(metadata, &results);
    write_report(dir, &config.output_file_name, &report)?;
    Ok(report)
}

fn collection_dirs(base_dir: &Path, prefix: &str) -> Result<Vec<(String, PathBuf)>> {
    let prefix = prefix.to_lowercase();
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(base_dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(target: BATCH, "unreadable entry in {}: {}", base_dir.display(), e);
                continue;
            }
        };
        // follows symlinks
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.to_lowercase().starts_with(&prefix) {
            dirs.push((name, path));
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Processes every collection directory directly under `base_dir`.
///
/// A collection without an input spec is skipped; any other collection
/// failure is logged and the batch moves on.
pub async fn run_batch(
    base_dir: &Path,
    config: &PipelineConfig,
    embedder: Arc<dyn Embedder>,
) -> Result<BatchSummary> {
    config.validate()?;
    let config = Arc::new(config.clone());
    let mut summary = BatchSummary::default();

    for (name, dir) in collection_dirs(base_dir, &config.collection_prefix)? {
        let span = info_span!(target: BATCH, "collection", name = %name);
        let outcome = process_collection(&dir, Arc::clone(&config), Arc::clone(&embedder))
            .instrument(span)
            .await;

        match outcome {
            Ok(report) => {
                info!(
                    target: BATCH,
                    sections = report.extracted_sections.len(),
                    "Processed {}", name
                );
                summary.processed.push(name);
            }
            Err(PipelineError::MissingInputSpec(path)) => {
                info!(target: BATCH, "No input spec at {}, skipping", path.display());
                summary.skipped.push(name);
            }
            Err(e) => {
                error!(target: BATCH, collection = %name, "Collection failed: {}", e);
                summary.failed.push(name);
            }
        }
    }

    Ok(summary)
}

/// Validates `config`, loads the embedder once and runs the batch.
///
/// A loader failure is fatal and surfaces as
/// [`PipelineError::EmbeddingUnavailable`] before any collection is scanned.
pub async fn run<F>(base_dir: &Path, config: &PipelineConfig, load: F) -> Result<BatchSummary>
where
    F: FnOnce() -> std::result::Result<Arc<dyn Embedder>, EmbeddingError> + Send + 'static,
{
    config.validate()?;
    let embedder = tokio::task::spawn_blocking(load)
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))?
        .map_err(|e| PipelineError::EmbeddingUnavailable(e.to_string()))?;
    info!(target: BATCH, model = embedder.model_id(), "embedder ready");
    run_batch(base_dir, config, embedder).await
}
