use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::logging::BATCH;
use crate::sections::Section;

pub const DEFAULT_TITLE_MAX_CHARS: usize = 150;

/// One ranked section of one document.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedResult {
    pub document: String,
    pub section_title: String,
    /// 1-based position within this document's top-k.
    pub importance_rank: usize,
    pub page_number: u32,
    pub refined_text: String,
    pub score: f32,
}

/// Turns one document's ranking into results numbered 1..=N in rank order.
pub fn assemble_document(
    document: &str,
    sections: &[Section],
    ranked: &[(usize, f32)],
    title_max_chars: usize,
) -> Vec<RankedResult> {
    ranked
        .iter()
        .filter_map(|&(idx, score)| sections.get(idx).map(|s| (s, score)))
        .enumerate()
        .map(|(pos, (section, score))| RankedResult {
            document: document.to_string(),
            section_title: truncate_chars(&section.heading.text, title_max_chars),
            importance_rank: pos + 1,
            page_number: section.page(),
            refined_text: section.as_text(),
            score,
        })
        .collect()
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub input_documents: Vec<String>,
    pub persona: String,
    pub job_to_be_done: String,
    pub processing_timestamp: String,
}

impl ReportMetadata {
    pub fn new(
        input_documents: Vec<String>,
        persona: impl Into<String>,
        job_to_be_done: impl Into<String>,
        processed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            input_documents,
            persona: persona.into(),
            job_to_be_done: job_to_be_done.into(),
            processing_timestamp: processed_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedSection {
    pub document: String,
    pub section_title: String,
    pub importance_rank: usize,
    pub page_number: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubsectionAnalysis {
    pub document: String,
    pub refined_text: String,
    pub page_number: u32,
}

/// The per-collection output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionReport {
    pub metadata: ReportMetadata,
    pub extracted_sections: Vec<ExtractedSection>,
    pub subsection_analysis: Vec<SubsectionAnalysis>,
}

impl CollectionReport {
    /// Splits results into the summary and detail projections, both in the
    /// order given.
    pub fn new(metadata: ReportMetadata, results: &[RankedResult]) -> Self {
        let extracted_sections = results
            .iter()
            .map(|r| ExtractedSection {
                document: r.document.clone(),
                section_title: r.section_title.clone(),
                importance_rank: r.importance_rank,
                page_number: r.page_number,
            })
            .collect();
        let subsection_analysis = results
            .iter()
            .map(|r| SubsectionAnalysis {
                document: r.document.clone(),
                refined_text: r.refined_text.clone(),
                page_number: r.page_number,
            })
            .collect();
        Self {
            metadata,
            extracted_sections,
            subsection_analysis,
        }
    }
}

/// Writes `report` as pretty JSON to `dir/file_name`.
///
/// The file is written to a temporary sibling first and renamed into place,
/// so readers never observe a half-written report.
pub fn write_report(dir: &Path, file_name: &str, report: &CollectionReport) -> Result<PathBuf> {
    let out_path = dir.join(file_name);
    let tmp_path = dir.join(format!(".{file_name}.tmp"));

    let json = serde_json::to_string_pretty(report)?;
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
    }
    if let Err(e) = fs::rename(&tmp_path, &out_path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    info!(
        target: BATCH,
        path = %out_path.display(),
        sections = report.extracted_sections.len(),
        "Report written"
    );
    Ok(out_path)
}
