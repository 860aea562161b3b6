pub mod setup;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use persona_rank::collection::process_collection;
use persona_rank::{
    run, run_batch, CollectionReport, Embedder, EmbeddingError, HashEmbedder, PipelineConfig,
    PipelineError,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use setup::{menu_guide, plain_notes, write_pdf};

const QUERY_ROLE: &str = "Chef";
const QUERY_TASK: &str = "Plan a vegetarian buffet menu for a corporate event";

fn write_input_spec(dir: &Path, documents: &[&str]) {
    let spec = json!({
        "challenge_info": {"challenge_id": "round_1b_001"},
        "persona": {"role": QUERY_ROLE},
        "job_to_be_done": {"task": QUERY_TASK},
        "documents": documents
            .iter()
            .map(|name| json!({"filename": name, "title": name}))
            .collect::<Vec<_>>(),
    });
    std::fs::write(
        dir.join("challenge1b_input.json"),
        serde_json::to_string_pretty(&spec).unwrap(),
    )
    .unwrap();
}

fn read_report(dir: &Path) -> CollectionReport {
    let raw = std::fs::read_to_string(dir.join("challenge1b_output.json")).unwrap();
    serde_json::from_str(&raw).unwrap()
}

fn embedder() -> Arc<dyn Embedder> {
    Arc::new(HashEmbedder::new(4096))
}

/// Sleeps before delegating, to exercise the ranking timeout.
struct SlowEmbedder {
    delay: Duration,
    inner: HashEmbedder,
}

impl Embedder for SlowEmbedder {
    fn model_id(&self) -> &str {
        "slow"
    }
    fn embedding_dim(&self) -> usize {
        self.inner.embedding_dim()
    }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        std::thread::sleep(self.delay);
        self.inner.embed_batch(texts)
    }
}

#[tokio::test]
async fn test_collection_report_ranks_sections_per_document() {
    let dir = tempfile::tempdir().unwrap();
    write_pdf(&dir.path().join("guide.pdf"), &menu_guide()).unwrap();
    write_input_spec(dir.path(), &["guide.pdf"]);

    let report = process_collection(dir.path(), Arc::new(PipelineConfig::default()), embedder())
        .await
        .unwrap();

    assert_eq!(report.metadata.persona, QUERY_ROLE);
    assert_eq!(report.metadata.job_to_be_done, QUERY_TASK);
    assert_eq!(report.metadata.input_documents, vec!["guide.pdf".to_string()]);
    assert!(report.metadata.processing_timestamp.ends_with('Z'));

    let ranks: Vec<usize> = report
        .extracted_sections
        .iter()
        .map(|s| s.importance_rank)
        .collect();
    assert_eq!(ranks, vec![1, 2, 3]);
    assert_eq!(report.subsection_analysis.len(), 3);

    // parking shares no words with the query beyond stop words
    assert_eq!(report.extracted_sections[2].section_title, "Venue Parking");
    assert_eq!(report.extracted_sections[2].page_number, 1);

    assert_eq!(read_report(dir.path()), report);
}

#[tokio::test]
async fn test_missing_document_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write_pdf(&dir.path().join("guide.pdf"), &menu_guide()).unwrap();
    write_input_spec(dir.path(), &["absent.pdf", "guide.pdf"]);

    let report = process_collection(dir.path(), Arc::new(PipelineConfig::default()), embedder())
        .await
        .unwrap();

    assert_eq!(
        report.metadata.input_documents,
        vec!["absent.pdf".to_string(), "guide.pdf".to_string()]
    );
    assert_eq!(report.extracted_sections.len(), 3);
    assert!(report
        .extracted_sections
        .iter()
        .all(|s| s.document == "guide.pdf"));
}

#[tokio::test]
async fn test_documents_keep_input_order_and_top_k() {
    let dir = tempfile::tempdir().unwrap();
    write_pdf(&dir.path().join("a.pdf"), &menu_guide()).unwrap();
    write_pdf(&dir.path().join("notes.pdf"), &plain_notes()).unwrap();
    write_pdf(&dir.path().join("b.pdf"), &menu_guide()).unwrap();
    std::fs::write(dir.path().join("broken.pdf"), b"not a pdf at all").unwrap();
    write_input_spec(dir.path(), &["b.pdf", "notes.pdf", "broken.pdf", "a.pdf"]);

    let config = PipelineConfig {
        top_k: 2,
        ..Default::default()
    };
    let report = process_collection(dir.path(), Arc::new(config), embedder())
        .await
        .unwrap();

    let summary: Vec<(&str, usize)> = report
        .extracted_sections
        .iter()
        .map(|s| (s.document.as_str(), s.importance_rank))
        .collect();
    assert_eq!(summary, vec![("b.pdf", 1), ("b.pdf", 2), ("a.pdf", 1), ("a.pdf", 2)]);
}

#[tokio::test]
async fn test_report_body_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    write_pdf(&dir.path().join("a.pdf"), &menu_guide()).unwrap();
    write_pdf(&dir.path().join("b.pdf"), &menu_guide()).unwrap();
    write_input_spec(dir.path(), &["a.pdf", "b.pdf"]);

    let config = Arc::new(PipelineConfig::default());
    let first = process_collection(dir.path(), Arc::clone(&config), embedder())
        .await
        .unwrap();
    let second = process_collection(dir.path(), config, embedder())
        .await
        .unwrap();

    assert_eq!(first.extracted_sections, second.extracted_sections);
    assert_eq!(first.subsection_analysis, second.subsection_analysis);
}

#[tokio::test]
async fn test_ranking_timeout_drops_document() {
    let dir = tempfile::tempdir().unwrap();
    write_pdf(&dir.path().join("guide.pdf"), &menu_guide()).unwrap();
    write_input_spec(dir.path(), &["guide.pdf"]);

    let config = PipelineConfig {
        embed_timeout_secs: 1,
        ..Default::default()
    };
    let slow: Arc<dyn Embedder> = Arc::new(SlowEmbedder {
        delay: Duration::from_millis(2500),
        inner: HashEmbedder::default(),
    });
    let report = process_collection(dir.path(), Arc::new(config), slow)
        .await
        .unwrap();

    assert!(report.extracted_sections.is_empty());
    assert_eq!(report.metadata.input_documents, vec!["guide.pdf".to_string()]);
}

#[tokio::test]
async fn test_batch_skips_collections_without_input() {
    let base = tempfile::tempdir().unwrap();

    let valid = base.path().join("Collection 1");
    std::fs::create_dir(&valid).unwrap();
    write_pdf(&valid.join("guide.pdf"), &menu_guide()).unwrap();
    write_input_spec(&valid, &["guide.pdf"]);

    let empty = base.path().join("Collection 2");
    std::fs::create_dir(&empty).unwrap();

    let malformed = base.path().join("collection 3");
    std::fs::create_dir(&malformed).unwrap();
    std::fs::write(malformed.join("challenge1b_input.json"), "{\"persona\": 1}").unwrap();

    let ignored = base.path().join("misc");
    std::fs::create_dir(&ignored).unwrap();
    write_input_spec(&ignored, &[]);

    let summary = run_batch(base.path(), &PipelineConfig::default(), embedder())
        .await
        .unwrap();

    assert_eq!(summary.processed, vec!["Collection 1".to_string()]);
    assert_eq!(summary.skipped, vec!["Collection 2".to_string()]);
    assert_eq!(summary.failed, vec!["collection 3".to_string()]);

    assert_eq!(read_report(&valid).extracted_sections.len(), 3);
    assert!(!empty.join("challenge1b_output.json").exists());
    assert!(!malformed.join("challenge1b_output.json").exists());
    assert!(!ignored.join("challenge1b_output.json").exists());
}

#[tokio::test]
async fn test_batch_rejects_invalid_config() {
    let base = tempfile::tempdir().unwrap();
    let config = PipelineConfig {
        top_k: 0,
        ..Default::default()
    };
    assert!(run_batch(base.path(), &config, embedder()).await.is_err());
}

#[tokio::test]
async fn test_embedder_load_failure_stops_before_any_collection() {
    let base = tempfile::tempdir().unwrap();
    let valid = base.path().join("Collection 1");
    std::fs::create_dir(&valid).unwrap();
    write_pdf(&valid.join("guide.pdf"), &menu_guide()).unwrap();
    write_input_spec(&valid, &["guide.pdf"]);

    let outcome = run(base.path(), &PipelineConfig::default(), || {
        Err(EmbeddingError::ModelLoad("weights not found".to_string()))
    })
    .await;

    match outcome {
        Err(PipelineError::EmbeddingUnavailable(reason)) => {
            assert!(reason.contains("weights not found"), "{reason}");
        }
        other => panic!("expected EmbeddingUnavailable, got {:?}", other),
    }
    assert!(!valid.join("challenge1b_output.json").exists());
}

#[tokio::test]
async fn test_run_loads_embedder_then_processes_batch() {
    let base = tempfile::tempdir().unwrap();
    let valid = base.path().join("Collection 1");
    std::fs::create_dir(&valid).unwrap();
    write_pdf(&valid.join("guide.pdf"), &menu_guide()).unwrap();
    write_input_spec(&valid, &["guide.pdf"]);

    let summary = run(base.path(), &PipelineConfig::default(), || Ok(embedder()))
        .await
        .unwrap();

    assert_eq!(summary.processed, vec!["Collection 1".to_string()]);
    assert_eq!(read_report(&valid).extracted_sections.len(), 3);
}
