#![allow(dead_code)]

use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::dictionary;
use lopdf::{Document, Object, Stream};

/// One line of text as it should appear in a generated PDF.
#[derive(Debug, Clone)]
pub struct StyledLine {
    pub text: String,
    pub font_size: f32,
    pub bold: bool,
}

pub fn heading(text: &str, font_size: f32) -> StyledLine {
    StyledLine {
        text: text.to_string(),
        font_size,
        bold: true,
    }
}

pub fn body(text: &str) -> StyledLine {
    StyledLine {
        text: text.to_string(),
        font_size: 10.0,
        bold: false,
    }
}

/// Writes a PDF with one page per entry of `pages`, lines laid out top to
/// bottom. Regular text uses Helvetica (`F1`), bold text Helvetica-Bold (`F2`).
pub fn write_pdf(path: &Path, pages: &[Vec<StyledLine>]) -> Result<(), Box<dyn std::error::Error>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for lines in pages {
        let mut operations = Vec::new();
        let mut y_position = 780.0f32;
        for line in lines {
            let font = if line.bold { "F2" } else { "F1" };
            operations.extend(vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![font.into(), line.font_size.into()]),
                Operation::new("Td", vec![72.into(), y_position.into()]),
                Operation::new("Tj", vec![Object::string_literal(line.text.as_str())]),
                Operation::new("ET", vec![]),
            ]);
            y_position -= line.font_size + 8.0;
        }

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    doc.save(path)?;
    Ok(())
}

/// A two-page guide with outline-style headings about menus and logistics.
pub fn menu_guide() -> Vec<Vec<StyledLine>> {
    vec![
        vec![
            heading("Vegetarian Buffet Menus", 16.0),
            body("Plan a vegetarian buffet with seasonal mains."),
            body("Offer lentil stew, roasted vegetables and salads."),
            body("Label every dish for guests with allergies."),
            heading("Venue Parking", 16.0),
            body("The car park opens at seven in the morning."),
            body("Overflow parking is available on the east side."),
        ],
        vec![
            heading("Corporate Event Catering", 16.0),
            body("Corporate events need a buffet that serves quickly."),
            body("Vegetarian menu options keep every guest fed."),
            body("Confirm headcounts one week before the event."),
        ],
    ]
}

/// Uniform, lowercase, unnumbered text: nothing looks like a heading.
pub fn plain_notes() -> Vec<Vec<StyledLine>> {
    vec![vec![
        body("some plain notes about nothing in particular"),
        body("more notes written in the same small font"),
        body("and a final line of the same kind"),
    ]]
}

#[test]
fn generated_pdf_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("guide.pdf");
    write_pdf(&path, &menu_guide()).unwrap();

    let doc = Document::load(&path).unwrap();
    assert_eq!(doc.get_pages().len(), 2);
}
