//! Font name handling for style detection.

/// Normalizes a PDF `/BaseFont` name.
///
/// Drops the six-letter subset tag (`ABCDEF+Garamond-BoldPS` -> `Garamond-Bold`)
/// and the PostScript `MT`/`PS`/`PSMT` suffixes, and maps the common
/// TrueType names onto their Base-14 equivalents.
pub fn sanitize_font_name(raw_name: &str) -> &str {
    let without_subset = match raw_name.split_once('+') {
        Some((tag, rest)) if tag.len() == 6 && tag.chars().all(|c| c.is_ascii_uppercase()) => rest,
        _ => raw_name,
    };

    let cleaned = ["PSMT", "MT", "PS"]
        .iter()
        .find_map(|suffix| without_subset.strip_suffix(suffix))
        .unwrap_or(without_subset);

    match cleaned {
        "TimesNewRoman" | "TimesNewRoman,Regular" => "Times-Roman",
        "TimesNewRoman-Bold" | "TimesNewRoman,Bold" => "Times-Bold",
        "TimesNewRoman-Italic" | "TimesNewRoman,Italic" => "Times-Italic",
        "TimesNewRoman-BoldItalic" | "TimesNewRoman,BoldItalic" => "Times-BoldItalic",
        "Arial" => "Helvetica",
        "Arial-Bold" | "Arial,Bold" => "Helvetica-Bold",
        "CourierNew" => "Courier",
        "CourierNew-Bold" => "Courier-Bold",
        _ => cleaned,
    }
}

/// Style keywords that PDF producers put in the face name of heavy weights.
const BOLD_MARKERS: &[&str] = &["bold", "black", "heavy", "semibold", "demi", "extrabold"];

/// True when a (sanitized) font name names a bold face.
pub fn is_bold_font_name(name: &str) -> bool {
    // Only the style part after the family separator is considered, so a
    // family such as "Blackadder" is not mistaken for a weight.
    let style = name
        .rsplit_once(['-', ','])
        .map(|(_, style)| style)
        .unwrap_or(name)
        .to_ascii_lowercase();
    BOLD_MARKERS.iter().any(|marker| style.contains(marker))
        || name.to_ascii_lowercase().ends_with("bold")
}
