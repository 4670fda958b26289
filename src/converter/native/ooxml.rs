//! Office Open XML readers (DOCX and PPTX).
//!
//! Both formats are zip packages of XML parts; the relevant parts are read with `zip` and walked
//! with `roxmltree`. Namespaces are ignored and nodes are matched on local names.

use crate::converter::{ConversionError, InputFormat};
use crate::document::{
    BoundingBox, ConvertedDocument, DocumentElement, ElementLabel, Provenance, TableGrid,
};
use roxmltree::{Document, Node};
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read};
use zip::ZipArchive;

/// English Metric Units per typographic point.
const EMU_PER_POINT: f64 = 12_700.0;

const PRESENTATION_PART: &str = "ppt/presentation.xml";
const PRESENTATION_RELS_PART: &str = "ppt/_rels/presentation.xml.rels";

type Archive<'a> = ZipArchive<Cursor<&'a [u8]>>;

/// Parse `word/document.xml` of a Word package.
pub(super) fn parse_docx(bytes: &[u8]) -> Result<ConvertedDocument, ConversionError> {
    let format = InputFormat::Docx;
    let mut archive = open_archive(bytes, format)?;
    let xml = read_part(&mut archive, "word/document.xml", format)?;
    let document = Document::parse(&xml).map_err(|error| parse_error(format, error))?;

    let mut elements = Vec::new();
    if let Some(body) = document
        .descendants()
        .find(|node| node.is_element() && node.tag_name().name() == "body")
    {
        walk_docx_blocks(body, &mut elements);
    }
    Ok(ConvertedDocument::new(elements, 0))
}

fn walk_docx_blocks(parent: Node<'_, '_>, elements: &mut Vec<DocumentElement>) {
    for node in parent.children().filter(Node::is_element) {
        match node.tag_name().name() {
            "p" => elements.extend(docx_paragraph(node)),
            "tbl" => {
                let grid = table_grid(node);
                if !grid.is_empty() {
                    elements.push(
                        DocumentElement::new(ElementLabel::Table, String::new())
                            .with_structure(grid),
                    );
                }
            }
            "sdt" | "sdtContent" | "customXml" => walk_docx_blocks(node, elements),
            _ => {}
        }
    }
}

fn docx_paragraph(paragraph: Node<'_, '_>) -> Vec<DocumentElement> {
    let mut out = Vec::new();

    for drawing in paragraph
        .descendants()
        .filter(|node| node.is_element() && node.tag_name().name() == "docPr")
    {
        let caption = local_attribute(drawing, "descr").unwrap_or_default();
        out.push(DocumentElement::new(ElementLabel::Picture, caption.trim()));
    }

    let text = paragraph_text(paragraph);
    if text.trim().is_empty() {
        return out;
    }

    let properties = child(paragraph, "pPr");
    let style = properties
        .and_then(|props| child(props, "pStyle"))
        .and_then(|style| local_attribute(style, "val"))
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let numbered = properties.and_then(|props| child(props, "numPr")).is_some();

    let label = match style.as_str() {
        "title" => ElementLabel::Title,
        "subtitle" => ElementLabel::SectionHeader,
        "caption" => ElementLabel::Caption,
        "footnotetext" => ElementLabel::Footnote,
        "header" => ElementLabel::PageHeader,
        "footer" => ElementLabel::PageFooter,
        s if s.starts_with("heading") => ElementLabel::SectionHeader,
        s if s.starts_with("list") || numbered => ElementLabel::ListItem,
        _ => ElementLabel::Paragraph,
    };
    out.insert(0, DocumentElement::new(label, text.trim()));
    out
}

fn paragraph_text(paragraph: Node<'_, '_>) -> String {
    let mut buffer = String::new();
    for node in paragraph.descendants().filter(Node::is_element) {
        match node.tag_name().name() {
            "t" => {
                if let Some(text) = node.text() {
                    buffer.push_str(text);
                }
            }
            "tab" => buffer.push('\t'),
            "br" | "cr" => buffer.push('\n'),
            _ => {}
        }
    }
    buffer
}

/// Collect `tr`/`tc` cell text for a table node (`w:tbl` or `a:tbl`).
fn table_grid(table: Node<'_, '_>) -> TableGrid {
    table
        .children()
        .filter(|node| node.is_element() && node.tag_name().name() == "tr")
        .map(|row| {
            row.children()
                .filter(|node| node.is_element() && node.tag_name().name() == "tc")
                .map(|cell| {
                    cell.descendants()
                        .filter(|node| node.is_element() && node.tag_name().name() == "p")
                        .map(|p| paragraph_text(p).trim().to_string())
                        .filter(|text| !text.is_empty())
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .collect::<Vec<_>>()
        })
        .filter(|row: &Vec<String>| !row.is_empty())
        .collect()
}

/// Parse every slide of a PowerPoint package; the Nth slide of the deck becomes page N.
pub(super) fn parse_pptx(bytes: &[u8]) -> Result<ConvertedDocument, ConversionError> {
    let format = InputFormat::Pptx;
    let mut archive = open_archive(bytes, format)?;
    let slides = slide_order(&mut archive, format)?;

    let mut elements = Vec::new();
    for (index, name) in slides.iter().enumerate() {
        let page = u32::try_from(index + 1).unwrap_or(u32::MAX);
        let xml = read_part(&mut archive, name, format)?;
        let document = Document::parse(&xml).map_err(|error| parse_error(format, error))?;
        if let Some(tree) = document
            .descendants()
            .find(|node| node.is_element() && node.tag_name().name() == "spTree")
        {
            walk_shapes(tree, page, &mut elements);
        }
    }

    Ok(ConvertedDocument::new(elements, slides.len()))
}

/// Slide part names in deck order.
///
/// The deck order is the `sldIdLst` of `ppt/presentation.xml`, resolved through its
/// relationships. Packages without that list fall back to the number in the part name.
fn slide_order(
    archive: &mut Archive<'_>,
    format: InputFormat,
) -> Result<Vec<String>, ConversionError> {
    let parts: HashSet<String> = archive.file_names().map(str::to_string).collect();

    if parts.contains(PRESENTATION_PART) && parts.contains(PRESENTATION_RELS_PART) {
        let presentation = read_part(archive, PRESENTATION_PART, format)?;
        let relationships = read_part(archive, PRESENTATION_RELS_PART, format)?;
        let listed = listed_slides(&presentation, &relationships, format)?;
        let ordered: Vec<String> = listed
            .into_iter()
            .filter(|name| parts.contains(name))
            .collect();
        if !ordered.is_empty() {
            return Ok(ordered);
        }
    }

    let mut numbered: Vec<(u32, String)> = parts
        .iter()
        .filter_map(|name| {
            let number = name
                .strip_prefix("ppt/slides/slide")?
                .strip_suffix(".xml")?
                .parse::<u32>()
                .ok()?;
            Some((number, name.clone()))
        })
        .collect();
    numbered.sort_by_key(|(number, _)| *number);
    Ok(numbered.into_iter().map(|(_, name)| name).collect())
}

fn listed_slides(
    presentation: &str,
    relationships: &str,
    format: InputFormat,
) -> Result<Vec<String>, ConversionError> {
    let relationships =
        Document::parse(relationships).map_err(|error| parse_error(format, error))?;
    let targets: HashMap<&str, &str> = relationships
        .descendants()
        .filter(|node| node.is_element() && node.tag_name().name() == "Relationship")
        .filter_map(|node| Some((node.attribute("Id")?, node.attribute("Target")?)))
        .collect();

    let presentation =
        Document::parse(presentation).map_err(|error| parse_error(format, error))?;
    let Some(list) = presentation
        .descendants()
        .find(|node| node.is_element() && node.tag_name().name() == "sldIdLst")
    else {
        return Ok(Vec::new());
    };

    Ok(list
        .children()
        .filter(|node| node.is_element() && node.tag_name().name() == "sldId")
        .filter_map(|node| {
            // `r:id`; the unqualified `id` is the numeric slide id.
            let relationship = node
                .attributes()
                .find(|attribute| attribute.name() == "id" && attribute.namespace().is_some())?
                .value();
            let target = targets.get(relationship)?;
            Some(match target.strip_prefix('/') {
                Some(absolute) => absolute.to_string(),
                None => format!("ppt/{target}"),
            })
        })
        .collect())
}

fn walk_shapes(tree: Node<'_, '_>, page: u32, elements: &mut Vec<DocumentElement>) {
    for shape in tree.children().filter(Node::is_element) {
        let provenance = Provenance {
            page,
            bbox: shape_bbox(shape),
        };
        match shape.tag_name().name() {
            "sp" => slide_text_shape(shape, provenance, elements),
            "graphicFrame" => {
                if let Some(table) = descendant(shape, "tbl") {
                    let grid = table_grid(table);
                    if !grid.is_empty() {
                        elements.push(
                            DocumentElement::new(ElementLabel::Table, String::new())
                                .with_structure(grid)
                                .with_provenance(provenance),
                        );
                    }
                }
            }
            "pic" => {
                let caption = descendant(shape, "cNvPr")
                    .and_then(|props| local_attribute(props, "descr"))
                    .unwrap_or_default();
                elements.push(
                    DocumentElement::new(ElementLabel::Picture, caption.trim())
                        .with_provenance(provenance),
                );
            }
            "grpSp" => walk_shapes(shape, page, elements),
            _ => {}
        }
    }
}

fn slide_text_shape(
    shape: Node<'_, '_>,
    provenance: Provenance,
    elements: &mut Vec<DocumentElement>,
) {
    let Some(body) = descendant(shape, "txBody") else {
        return;
    };
    let placeholder =
        descendant(shape, "ph").map(|ph| local_attribute(ph, "type").unwrap_or("body"));

    let paragraphs: Vec<Node<'_, '_>> = body
        .children()
        .filter(|node| node.is_element() && node.tag_name().name() == "p")
        .collect();

    let title_label = match placeholder {
        Some("ctrTitle") => Some(ElementLabel::Title),
        Some("title") => Some(ElementLabel::SectionHeader),
        Some("subTitle") => Some(ElementLabel::SectionHeader),
        _ => None,
    };
    if let Some(label) = title_label {
        let text = paragraphs
            .iter()
            .map(|p| paragraph_text(*p).trim().to_string())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !text.is_empty() {
            elements.push(DocumentElement::new(label, text).with_provenance(provenance));
        }
        return;
    }

    for paragraph in paragraphs {
        let text = paragraph_text(paragraph);
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        let bulleted = child(paragraph, "pPr").is_some_and(|props| {
            child(props, "buChar").is_some() || child(props, "buAutoNum").is_some()
        });
        let label = if bulleted {
            ElementLabel::ListItem
        } else {
            ElementLabel::Paragraph
        };
        elements.push(DocumentElement::new(label, text).with_provenance(provenance.clone()));
    }
}

fn shape_bbox(shape: Node<'_, '_>) -> Option<BoundingBox> {
    let transform = descendant(shape, "xfrm")?;
    let offset = child(transform, "off")?;
    let extent = child(transform, "ext")?;
    let x = emu_attribute(offset, "x")?;
    let y = emu_attribute(offset, "y")?;
    let width = emu_attribute(extent, "cx")?;
    let height = emu_attribute(extent, "cy")?;
    Some(BoundingBox {
        left: x,
        top: y,
        right: x + width,
        bottom: y + height,
    })
}

fn emu_attribute(node: Node<'_, '_>, name: &str) -> Option<f64> {
    local_attribute(node, name)?
        .parse::<f64>()
        .ok()
        .map(|emu| emu / EMU_PER_POINT)
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|candidate| candidate.is_element() && candidate.tag_name().name() == name)
}

fn descendant<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.descendants()
        .find(|candidate| candidate.is_element() && candidate.tag_name().name() == name)
}

fn local_attribute<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attributes()
        .find(|attribute| attribute.name() == name)
        .map(|attribute| attribute.value())
}

fn open_archive(bytes: &[u8], format: InputFormat) -> Result<Archive<'_>, ConversionError> {
    ZipArchive::new(Cursor::new(bytes)).map_err(|error| parse_error(format, error))
}

fn read_part(
    archive: &mut Archive<'_>,
    name: &str,
    format: InputFormat,
) -> Result<String, ConversionError> {
    let mut part = archive
        .by_name(name)
        .map_err(|error| parse_error(format, format!("{name}: {error}")))?;
    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .map_err(|error| parse_error(format, format!("{name}: {error}")))?;
    Ok(xml)
}

fn parse_error(format: InputFormat, error: impl ToString) -> ConversionError {
    ConversionError::Parse {
        format,
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn package(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::<u8>::new()));
        for (name, body) in parts {
            zip.start_file(*name, SimpleFileOptions::default())
                .expect("start file");
            zip.write_all(body.as_bytes()).expect("write part");
        }
        zip.finish().expect("finish zip").into_inner()
    }

    const DOCX_BODY: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"
            xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing">
  <w:body>
    <w:p><w:pPr><w:pStyle w:val="Title"/></w:pPr><w:r><w:t>Quarterly Report</w:t></w:r></w:p>
    <w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Summary</w:t></w:r></w:p>
    <w:p><w:r><w:t xml:space="preserve">Revenue grew </w:t></w:r><w:r><w:t>steadily.</w:t></w:r></w:p>
    <w:p><w:pPr><w:numPr><w:ilvl w:val="0"/></w:numPr></w:pPr><w:r><w:t>North region</w:t></w:r></w:p>
    <w:p></w:p>
    <w:tbl>
      <w:tr><w:tc><w:p><w:r><w:t>Region</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>Sales</w:t></w:r></w:p></w:tc></w:tr>
      <w:tr><w:tc><w:p><w:r><w:t>North</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>10</w:t></w:r></w:p></w:tc></w:tr>
    </w:tbl>
    <w:p><w:r><w:drawing><wp:inline><wp:docPr id="1" name="Picture 1" descr="Sales chart"/></wp:inline></w:drawing></w:r></w:p>
  </w:body>
</w:document>"#;

    #[test]
    fn docx_paragraph_styles_tables_and_drawings() {
        let bytes = package(&[("word/document.xml", DOCX_BODY)]);
        let document = parse_docx(&bytes).expect("docx parses");

        let labels: Vec<ElementLabel> = document
            .elements
            .iter()
            .map(|element| element.label.clone())
            .collect();
        assert_eq!(
            labels,
            vec![
                ElementLabel::Title,
                ElementLabel::SectionHeader,
                ElementLabel::Paragraph,
                ElementLabel::ListItem,
                ElementLabel::Table,
                ElementLabel::Picture,
            ]
        );
        assert_eq!(document.elements[2].text, "Revenue grew steadily.");
        assert_eq!(document.elements[4].text, "Region | Sales\nNorth | 10");
        assert_eq!(document.elements[5].text, "Sales chart");
        assert_eq!(document.page_count, 0);
        assert!(document.elements.iter().all(|e| e.provenance.is_empty()));
    }

    #[test]
    fn docx_without_document_part_is_a_parse_error() {
        let bytes = package(&[("word/styles.xml", "<styles/>")]);
        let error = parse_docx(&bytes).unwrap_err();
        assert!(matches!(
            error,
            ConversionError::Parse {
                format: InputFormat::Docx,
                ..
            }
        ));
    }

    fn slide(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<p:sld xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"
       xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">
  <p:cSld><p:spTree>{body}</p:spTree></p:cSld>
</p:sld>"#
        )
    }

    #[test]
    fn pptx_slides_map_to_pages_in_numeric_order() {
        let title = slide(
            r#"<p:sp>
                 <p:nvSpPr><p:cNvPr id="2" name="Title"/><p:nvPr><p:ph type="ctrTitle"/></p:nvPr></p:nvSpPr>
                 <p:spPr><a:xfrm><a:off x="12700" y="25400"/><a:ext cx="127000" cy="12700"/></a:xfrm></p:spPr>
                 <p:txBody><a:p><a:r><a:t>Launch Plan</a:t></a:r></a:p></p:txBody>
               </p:sp>"#,
        );
        let body = slide(
            r#"<p:sp>
                 <p:nvSpPr><p:cNvPr id="3" name="Body"/><p:nvPr><p:ph idx="1"/></p:nvPr></p:nvSpPr>
                 <p:txBody>
                   <a:p><a:pPr><a:buChar char="•"/></a:pPr><a:r><a:t>Hire team</a:t></a:r></a:p>
                   <a:p><a:r><a:t>Plain note</a:t></a:r></a:p>
                 </p:txBody>
               </p:sp>
               <p:graphicFrame>
                 <p:xfrm><a:off x="0" y="0"/><a:ext cx="254000" cy="127000"/></p:xfrm>
                 <a:graphic><a:graphicData><a:tbl>
                   <a:tr><a:tc><a:txBody><a:p><a:r><a:t>Q1</a:t></a:r></a:p></a:txBody></a:tc><a:tc><a:txBody><a:p><a:r><a:t>Q2</a:t></a:r></a:p></a:txBody></a:tc></a:tr>
                 </a:tbl></a:graphicData></a:graphic>
               </p:graphicFrame>
               <p:pic><p:nvPicPr><p:cNvPr id="4" name="Picture" descr="Team photo"/></p:nvPicPr></p:pic>"#,
        );
        let bytes = package(&[
            ("ppt/slides/slide10.xml", body.as_str()),
            ("ppt/slides/slide2.xml", title.as_str()),
            ("ppt/slides/_rels/slide2.xml.rels", "<Relationships/>"),
        ]);

        let document = parse_pptx(&bytes).expect("pptx parses");
        assert_eq!(document.page_count, 2);

        let title = &document.elements[0];
        assert_eq!(title.label, ElementLabel::Title);
        assert_eq!(title.text, "Launch Plan");
        assert_eq!(title.first_page(), Some(1));
        assert_eq!(
            title.first_bbox(),
            Some(BoundingBox {
                left: 1.0,
                top: 2.0,
                right: 11.0,
                bottom: 3.0,
            })
        );

        let rest: Vec<(ElementLabel, &str, Option<u32>)> = document.elements[1..]
            .iter()
            .map(|e| (e.label.clone(), e.text.as_str(), e.first_page()))
            .collect();
        assert_eq!(
            rest,
            vec![
                (ElementLabel::ListItem, "Hire team", Some(2)),
                (ElementLabel::Paragraph, "Plain note", Some(2)),
                (ElementLabel::Table, "Q1 | Q2", Some(2)),
                (ElementLabel::Picture, "Team photo", Some(2)),
            ]
        );
    }

    #[test]
    fn pptx_deck_order_comes_from_the_presentation_part() {
        let first_file = slide(
            r#"<p:sp><p:txBody><a:p><a:r><a:t>Closing remarks</a:t></a:r></a:p></p:txBody></p:sp>"#,
        );
        let second_file = slide(
            r#"<p:sp><p:txBody><a:p><a:r><a:t>Opening slide</a:t></a:r></a:p></p:txBody></p:sp>"#,
        );
        let presentation = r#"<?xml version="1.0" encoding="UTF-8"?>
<p:presentation xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"
                xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <p:sldIdLst>
    <p:sldId id="256" r:id="rId7"/>
    <p:sldId id="257" r:id="rId3"/>
  </p:sldIdLst>
</p:presentation>"#;
        let relationships = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide1.xml"/>
  <Relationship Id="rId7" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="/ppt/slides/slide2.xml"/>
</Relationships>"#;
        let bytes = package(&[
            ("ppt/presentation.xml", presentation),
            ("ppt/_rels/presentation.xml.rels", relationships),
            ("ppt/slides/slide1.xml", first_file.as_str()),
            ("ppt/slides/slide2.xml", second_file.as_str()),
        ]);

        let document = parse_pptx(&bytes).expect("pptx parses");
        let pages: Vec<(&str, Option<u32>)> = document
            .elements
            .iter()
            .map(|e| (e.text.as_str(), e.first_page()))
            .collect();
        assert_eq!(
            pages,
            vec![("Opening slide", Some(1)), ("Closing remarks", Some(2))]
        );
        assert_eq!(document.page_count, 2);
    }
}
