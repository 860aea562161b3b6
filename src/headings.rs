//! Heading detection over styled lines.
//!
//! A line is a heading candidate when any of four independent signals fires
//! (numbered prefix, all-caps, large font, bold) and its length passes a gate
//! that filters stray labels and body paragraphs.

use once_cell::sync::Lazy;
use ordered_float::OrderedFloat;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::layout::Line;
use crate::logging::HEADINGS;

static NUMBERED_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(\.\d+)*\s").expect("static regex"));

/// Thresholds for the heading predicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadingRules {
    /// A line is "large" when its size exceeds `median * large_font_ratio`.
    pub large_font_ratio: f32,
    /// All-caps lines longer than this are treated as shouting body text.
    pub upper_max_chars: usize,
    /// Exclusive lower bound on heading length, in characters.
    pub min_chars: usize,
    /// Exclusive upper bound on heading length, in characters.
    pub max_chars: usize,
}

impl Default for HeadingRules {
    fn default() -> Self {
        Self {
            large_font_ratio: 1.15,
            upper_max_chars: 80,
            min_chars: 4,
            max_chars: 120,
        }
    }
}

/// Which predicates fired for one line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadingSignals {
    pub numbered: bool,
    pub upper: bool,
    pub large_font: bool,
    pub bold: bool,
}

impl HeadingSignals {
    pub fn any(&self) -> bool {
        self.numbered || self.upper || self.large_font || self.bold
    }
}

/// `"1 "`, `"1.2 "`, `"1.2.3 "` style outline prefix.
pub fn is_numbered(text: &str) -> bool {
    NUMBERED_PREFIX.is_match(text)
}

/// Fully upper-case (at least one cased letter, none lower- or title-case)
/// and short.
pub fn is_upper(text: &str, rules: &HeadingRules) -> bool {
    let mut has_cased = false;
    for c in text.chars() {
        if c.is_lowercase() {
            return false;
        }
        // titlecase letters such as 'ǅ' are neither upper nor lower
        if !c.is_uppercase() && c.to_uppercase().ne(std::iter::once(c)) {
            return false;
        }
        has_cased |= c.is_uppercase();
    }
    has_cased && text.chars().count() <= rules.upper_max_chars
}

pub fn is_large_font(font_size: f32, median: f32, rules: &HeadingRules) -> bool {
    font_size > median * rules.large_font_ratio
}

pub fn passes_length_gate(text: &str, rules: &HeadingRules) -> bool {
    let len = text.chars().count();
    rules.min_chars < len && len < rules.max_chars
}

pub fn signals(line: &Line, median: f32, rules: &HeadingRules) -> HeadingSignals {
    HeadingSignals {
        numbered: is_numbered(&line.text),
        upper: is_upper(&line.text, rules),
        large_font: is_large_font(line.font_size, median, rules),
        bold: line.bold,
    }
}

/// Median font size; the mean of the two middle values for even counts.
pub fn median_font_size(lines: &[Line]) -> Option<f32> {
    if lines.is_empty() {
        return None;
    }
    let mut sizes: Vec<OrderedFloat<f32>> = lines.iter().map(|l| OrderedFloat(l.font_size)).collect();
    sizes.sort_unstable();
    let mid = sizes.len() / 2;
    Some(if sizes.len() % 2 == 0 {
        (sizes[mid - 1].0 + sizes[mid].0) / 2.0
    } else {
        sizes[mid].0
    })
}

/// Returns the indices of heading candidates, strictly increasing.
pub fn detect_headings(lines: &[Line], rules: &HeadingRules) -> Vec<usize> {
    let Some(median) = median_font_size(lines) else {
        return Vec::new();
    };

    let headings: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| {
            signals(line, median, rules).any() && passes_length_gate(&line.text, rules)
        })
        .map(|(idx, _)| idx)
        .collect();

    debug!(
        target: HEADINGS,
        lines = lines.len(),
        median,
        headings = headings.len(),
        "detected headings"
    );
    headings
}
