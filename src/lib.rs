pub mod collection;
pub mod config;
pub mod embedding;
pub mod error;
pub mod fonts;
pub mod headings;
pub mod layout;
pub mod logging;
pub mod parse;
pub mod rank;
pub mod report;
pub mod sections;

use std::path::Path;

use lopdf::Document;
use tracing::debug;

pub use crate::collection::{process_collection, run, run_batch, BatchSummary, InputSpec};
pub use crate::config::PipelineConfig;
pub use crate::embedding::{BertEmbedder, Embedder, HashEmbedder};
pub use crate::error::{EmbeddingError, PipelineError, Result};
pub use crate::headings::{detect_headings, HeadingRules};
pub use crate::layout::Line;
pub use crate::rank::rank_sections;
pub use crate::report::{assemble_document, CollectionReport, RankedResult};
pub use crate::sections::{build_sections, Section};

use crate::layout::group_text_into_lines;
use crate::logging::PDF_PARSING;
use crate::parse::get_pdf_text;

/// Styled lines of an already-loaded document, in reading order.
pub fn document_lines(doc: &Document, line_join_threshold: f32) -> Result<Vec<Line>, lopdf::Error> {
    let pages_map = get_pdf_text(doc)?;
    Ok(group_text_into_lines(&pages_map, line_join_threshold))
}

/// Loads the PDF at `path` and returns its styled lines.
///
/// Any load or content-stream failure is reported as
/// [`PipelineError::DocumentParse`]; no partial lines are returned.
pub fn extract_lines(path: &Path, line_join_threshold: f32) -> Result<Vec<Line>> {
    let parse_err = |e: lopdf::Error| PipelineError::DocumentParse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };
    let doc = parse::load_pdf(path).map_err(parse_err)?;
    document_lines(&doc, line_join_threshold).map_err(parse_err)
}

/// Lines → headings → sections for one PDF.
pub fn extract_sections(path: &Path, config: &PipelineConfig) -> Result<Vec<Section>> {
    let lines = extract_lines(path, config.line_join_threshold)?;
    let headings = detect_headings(&lines, &config.heading);
    let sections = build_sections(&lines, &headings, config.context_lines);
    debug!(
        target: PDF_PARSING,
        path = %path.display(),
        lines = lines.len(),
        sections = sections.len(),
        "segmented document"
    );
    Ok(sections)
}
