use crate::layout::Line;

/// Number of lines following a heading kept as its context.
pub const DEFAULT_CONTEXT_LINES: usize = 4;

/// A heading plus a bounded run of the lines that follow it.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub heading: Line,
    pub body: Vec<Line>,
}

impl Section {
    /// Heading text followed by the body texts, space-joined.
    pub fn as_text(&self) -> String {
        std::iter::once(self.heading.text.as_str())
            .chain(self.body.iter().map(|l| l.text.as_str()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn page(&self) -> u32 {
        self.heading.page
    }
}

/// Builds one section per heading index, in order.
///
/// The body of heading `h` is `lines[h+1 .. min(next_heading, h+1+context_lines)]`.
/// Lines before the first heading, and lines past a section's bound, belong
/// to no section.
pub fn build_sections(lines: &[Line], headings: &[usize], context_lines: usize) -> Vec<Section> {
    headings
        .iter()
        .enumerate()
        .filter_map(|(i, &h)| {
            let heading = lines.get(h)?;
            let start = h + 1;
            let next = headings.get(i + 1).copied().unwrap_or(lines.len());
            let end = next.min(start.saturating_add(context_lines)).min(lines.len());
            let body = if start < end {
                lines[start..end].to_vec()
            } else {
                Vec::new()
            };
            Some(Section {
                heading: heading.clone(),
                body,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lines(texts: &[&str]) -> Vec<Line> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Line {
                text: t.to_string(),
                page: 1 + (i / 10) as u32,
                font_size: 10.0,
                bold: false,
                y0: i as f32 * 12.0,
                y1: i as f32 * 12.0 + 10.0,
            })
            .collect()
    }

    fn body_texts(section: &Section) -> Vec<&str> {
        section.body.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn body_is_bounded_by_context() {
        let ls = lines(&["H1", "a", "b", "c", "d", "e", "f"]);
        let sections = build_sections(&ls, &[0], DEFAULT_CONTEXT_LINES);
        assert_eq!(sections.len(), 1);
        assert_eq!(body_texts(&sections[0]), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn body_stops_at_next_heading() {
        let ls = lines(&["H1", "a", "H2", "b", "c"]);
        let sections = build_sections(&ls, &[0, 2], DEFAULT_CONTEXT_LINES);
        assert_eq!(body_texts(&sections[0]), vec!["a"]);
        assert_eq!(body_texts(&sections[1]), vec!["b", "c"]);
    }

    #[test]
    fn adjacent_headings_have_empty_bodies() {
        let ls = lines(&["H1", "H2", "H3"]);
        let sections = build_sections(&ls, &[0, 1, 2], DEFAULT_CONTEXT_LINES);
        assert!(sections.iter().all(|s| s.body.is_empty()));
        assert_eq!(sections[2].as_text(), "H3");
    }

    #[test]
    fn leading_lines_are_not_covered() {
        let ls = lines(&["preface", "H1", "a"]);
        let sections = build_sections(&ls, &[1], DEFAULT_CONTEXT_LINES);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].heading.text, "H1");
        assert_eq!(body_texts(&sections[0]), vec!["a"]);
    }

    #[test]
    fn no_headings_no_sections() {
        let ls = lines(&["a", "b"]);
        assert!(build_sections(&ls, &[], DEFAULT_CONTEXT_LINES).is_empty());
    }

    #[test]
    fn as_text_joins_heading_and_body() {
        let ls = lines(&["1 Introduction", "This covers scope.", "And goals."]);
        let sections = build_sections(&ls, &[0], DEFAULT_CONTEXT_LINES);
        assert_eq!(
            sections[0].as_text(),
            "1 Introduction This covers scope. And goals."
        );
    }

    #[test]
    fn sections_are_disjoint_and_one_per_heading() {
        let texts: Vec<String> = (0..40).map(|i| format!("line {i}")).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let ls = lines(&refs);
        let headings = vec![0, 3, 4, 11, 25, 39];
        let sections = build_sections(&ls, &headings, DEFAULT_CONTEXT_LINES);
        assert_eq!(sections.len(), headings.len());

        let mut covered = std::collections::HashSet::new();
        for (i, section) in sections.iter().enumerate() {
            assert!(section.body.len() <= DEFAULT_CONTEXT_LINES);
            let h = headings[i];
            assert!(covered.insert(h));
            for k in 0..section.body.len() {
                let idx = h + 1 + k;
                assert!(headings.get(i + 1).map_or(true, |&next| idx < next));
                assert!(covered.insert(idx));
            }
        }
    }
}
