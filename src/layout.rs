use std::cmp::Ordering;
use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::parse::TextElement;

/// One visually contiguous run of text on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub text: String,
    /// 1-based page number.
    pub page: u32,
    /// Largest font size of any run on the line.
    pub font_size: f32,
    /// True if any run on the line is bold.
    pub bold: bool,
    pub y0: f32,
    pub y1: f32,
}

impl Line {
    /// Builds a line from runs already sorted left to right.
    ///
    /// Returns `None` when the runs carry no visible text.
    pub fn from_elements(page: u32, items: &[TextElement]) -> Option<Self> {
        let mut raw = String::new();
        let mut prev_x1: Option<(f32, f32)> = None;

        for it in items {
            if let Some((x1, size)) = prev_x1 {
                let gap = it.bbox.0 - x1;
                if gap > size * 0.15 && !raw.ends_with(' ') && !it.text.starts_with(' ') {
                    raw.push(' ');
                }
            }
            raw.push_str(&it.text);
            prev_x1 = Some((it.bbox.2, it.font_size));
        }

        let text = normalize_text(&raw);
        if text.is_empty() {
            return None;
        }

        let (font_size, bold, y0, y1) = items.iter().fold(
            (0.0f32, false, f32::MAX, f32::MIN),
            |(size, bold, y0, y1), it| {
                (
                    size.max(it.font_size),
                    bold || it.bold,
                    y0.min(it.bbox.1),
                    y1.max(it.bbox.3),
                )
            },
        );

        Some(Line {
            text,
            page,
            font_size,
            bold,
            y0,
            y1: y1.max(y0),
        })
    }
}

/// NFKC-normalizes (splitting ligatures such as "ﬁ") and collapses whitespace.
pub fn normalize_text(raw: &str) -> String {
    raw.nfkc()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Groups positioned runs into lines in reading order: page ascending, then
/// top to bottom, then left to right.
///
/// Two runs share a line when their baselines differ by less than
/// `line_join_threshold` points.
pub fn group_text_into_lines(
    pages_map: &BTreeMap<u32, Vec<TextElement>>,
    line_join_threshold: f32,
) -> Vec<Line> {
    let per_page: Vec<Vec<Line>> = pages_map
        .par_iter()
        .map(|(page_number, elements)| {
            group_page_into_lines(*page_number, elements, line_join_threshold)
        })
        .collect();

    // par_iter over a BTreeMap preserves key order on collect.
    per_page.into_iter().flatten().collect()
}

fn group_page_into_lines(
    page_number: u32,
    elements: &[TextElement],
    line_join_threshold: f32,
) -> Vec<Line> {
    let mut elements = elements.to_vec();
    elements.sort_by(|a, b| {
        a.baseline
            .partial_cmp(&b.baseline)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.bbox.0.partial_cmp(&b.bbox.0).unwrap_or(Ordering::Equal))
    });

    let mut lines = Vec::new();
    let mut current: Vec<TextElement> = Vec::new();
    let mut last_baseline = f32::MIN;

    for elem in elements {
        if !current.is_empty() && (elem.baseline - last_baseline).abs() >= line_join_threshold {
            flush_line(page_number, &mut current, &mut lines);
        }
        if current.is_empty() {
            last_baseline = elem.baseline;
        }
        current.push(elem);
    }
    flush_line(page_number, &mut current, &mut lines);

    lines
}

fn flush_line(page_number: u32, current: &mut Vec<TextElement>, lines: &mut Vec<Line>) {
    if current.is_empty() {
        return;
    }
    current.sort_by(|a, b| a.bbox.0.partial_cmp(&b.bbox.0).unwrap_or(Ordering::Equal));
    if let Some(line) = Line::from_elements(page_number, current) {
        lines.push(line);
    }
    current.clear();
}
