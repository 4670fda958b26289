//! HTML reader built on `scrape-core`.
//!
//! Block elements are selected with one selector list so they come back in document order.
//! Headings, paragraphs, list items, preformatted blocks, tables, images and figure captions are
//! kept. Web pages have no pages, so elements carry no provenance.

use crate::converter::{ConversionError, InputFormat};
use crate::document::{ConvertedDocument, DocumentElement, ElementLabel, TableGrid};
use scrape_core::Soup;

const BLOCK_SELECTOR: &str = "h1, h2, h3, h4, h5, h6, p, li, pre, table, img, figcaption";

/// Parse an HTML page into document elements.
pub(super) fn parse_html(source: &str) -> Result<ConvertedDocument, ConversionError> {
    let soup = Soup::parse(source);
    let tags = soup.find_all(BLOCK_SELECTOR).map_err(parse_error)?;

    let mut elements = Vec::new();
    // Inner HTML of the last list item or table, used to skip blocks nested inside it.
    let mut container: Option<String> = None;

    for tag in tags {
        let name = tag.name().map(str::to_ascii_lowercase).unwrap_or_default();
        let inner = tag.inner_html();
        let nested = container
            .as_deref()
            .is_some_and(|outer| !inner.trim().is_empty() && outer.contains(inner.trim()));
        if nested {
            continue;
        }

        match name.as_str() {
            "h1" => push_text(&mut elements, ElementLabel::Title, &tag.text()),
            "h2" | "h3" | "h4" | "h5" | "h6" => {
                push_text(&mut elements, ElementLabel::SectionHeader, &tag.text())
            }
            "p" => push_text(&mut elements, ElementLabel::Paragraph, &tag.text()),
            "figcaption" => push_text(&mut elements, ElementLabel::Caption, &tag.text()),
            "li" => {
                push_text(&mut elements, ElementLabel::ListItem, &tag.text());
                container = Some(inner);
                continue;
            }
            "pre" => {
                let code = tag.text();
                let code = code.trim_matches('\n').trim_end();
                if !code.is_empty() {
                    elements.push(DocumentElement::new(ElementLabel::Code, code));
                }
            }
            "table" => {
                let grid = table_grid(&inner)?;
                if !grid.is_empty() {
                    elements.push(
                        DocumentElement::new(ElementLabel::Table, String::new())
                            .with_structure(grid),
                    );
                }
                container = Some(inner);
                continue;
            }
            "img" => {
                let alt = tag.get("alt").unwrap_or_default();
                elements.push(DocumentElement::new(
                    ElementLabel::Picture,
                    collapse_whitespace(alt),
                ));
            }
            _ => {}
        }
        container = None;
    }

    Ok(ConvertedDocument::new(elements, 0))
}

/// Rows of `th`/`td` cells. Fragments are wrapped in `<table>` so the parser keeps row tags.
fn table_grid(inner_html: &str) -> Result<TableGrid, ConversionError> {
    let table = Soup::parse(&format!("<table>{inner_html}</table>"));
    let mut grid = TableGrid::new();
    for row in table.find_all("tr").map_err(parse_error)? {
        let row_soup = Soup::parse(&format!("<table><tr>{}</tr></table>", row.inner_html()));
        let cells: Vec<String> = row_soup
            .find_all("th, td")
            .map_err(parse_error)?
            .into_iter()
            .map(|cell| collapse_whitespace(&cell.text()))
            .collect();
        if cells.iter().any(|cell| !cell.is_empty()) {
            grid.push(cells);
        }
    }
    Ok(grid)
}

fn push_text(elements: &mut Vec<DocumentElement>, label: ElementLabel, text: &str) {
    let text = collapse_whitespace(text);
    if !text.is_empty() {
        elements.push(DocumentElement::new(label, text));
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_error(error: impl ToString) -> ConversionError {
    ConversionError::Parse {
        format: InputFormat::Html,
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head><title>Release notes</title><style>p { color: red; }</style></head>
  <body>
    <h1>Release   notes</h1>
    <p>Version 2 ships a new
       parser.</p>
    <h2>Changes</h2>
    <ul>
      <li>faster startup</li>
      <li><p>smaller binary</p></li>
    </ul>
    <table>
      <tr><th>flag</th><th>effect</th></tr>
      <tr><td>-q</td><td><p>quiet</p></td></tr>
    </table>
    <figure><img src="chart.png" alt="startup chart"><figcaption>Startup time</figcaption></figure>
    <pre>cargo install tool</pre>
  </body>
</html>"#;

    #[test]
    fn blocks_come_back_in_document_order() {
        let document = parse_html(PAGE).expect("html parses");
        let labels: Vec<ElementLabel> = document
            .elements
            .iter()
            .map(|element| element.label.clone())
            .collect();

        assert_eq!(
            labels,
            vec![
                ElementLabel::Title,
                ElementLabel::Paragraph,
                ElementLabel::SectionHeader,
                ElementLabel::ListItem,
                ElementLabel::ListItem,
                ElementLabel::Table,
                ElementLabel::Picture,
                ElementLabel::Caption,
                ElementLabel::Code,
            ]
        );
        assert_eq!(document.elements[0].text, "Release notes");
        assert_eq!(document.elements[1].text, "Version 2 ships a new parser.");
        assert_eq!(document.elements[4].text, "smaller binary");
        assert_eq!(document.elements[6].text, "startup chart");
        assert_eq!(document.elements[8].text, "cargo install tool");
        assert_eq!(document.page_count, 0);
    }

    #[test]
    fn tables_keep_their_cell_grid() {
        let document = parse_html(PAGE).expect("html parses");
        let table = document
            .elements
            .iter()
            .find(|element| element.label == ElementLabel::Table)
            .expect("table element");

        assert_eq!(
            table.structure,
            Some(vec![
                vec!["flag".to_string(), "effect".to_string()],
                vec!["-q".to_string(), "quiet".to_string()],
            ])
        );
        assert!(table.text.contains("quiet"));
    }

    #[test]
    fn empty_page_has_no_elements() {
        let document = parse_html("<html><body></body></html>").expect("html parses");
        assert!(document.elements.is_empty());
    }
}
