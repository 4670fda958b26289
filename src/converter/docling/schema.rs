//! Subset of the docling-serve response and DoclingDocument JSON consumed by the service.

use crate::document::{
    BoundingBox, ConvertedDocument, DocumentElement, ElementLabel, Provenance, TableGrid,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Body of `POST /v1/convert/file`.
#[derive(Debug, Deserialize)]
pub(super) struct ConvertResponse {
    pub(super) document: ExportedDocument,
    #[serde(default)]
    pub(super) status: Option<String>,
    #[serde(default)]
    pub(super) errors: Vec<Value>,
}

/// Requested export formats for one converted file.
#[derive(Debug, Deserialize)]
pub(super) struct ExportedDocument {
    #[serde(default)]
    pub(super) json_content: Option<DoclingDocument>,
}

/// Lossless DoclingDocument export.
#[derive(Debug, Default, Deserialize)]
pub(super) struct DoclingDocument {
    #[serde(default)]
    body: NodeItem,
    #[serde(default)]
    groups: Vec<NodeItem>,
    #[serde(default)]
    texts: Vec<TextItem>,
    #[serde(default)]
    tables: Vec<TableItem>,
    #[serde(default)]
    pictures: Vec<PictureItem>,
    #[serde(default)]
    pages: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RefItem {
    #[serde(rename = "$ref")]
    reference: String,
}

#[derive(Debug, Default, Deserialize)]
struct NodeItem {
    #[serde(default)]
    children: Vec<RefItem>,
}

#[derive(Debug, Deserialize)]
struct TextItem {
    label: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    prov: Vec<ProvenanceItem>,
    #[serde(default)]
    children: Vec<RefItem>,
}

#[derive(Debug, Deserialize)]
struct TableItem {
    #[serde(default = "table_label")]
    label: String,
    #[serde(default)]
    prov: Vec<ProvenanceItem>,
    #[serde(default)]
    children: Vec<RefItem>,
    #[serde(default)]
    data: TableData,
}

#[derive(Debug, Default, Deserialize)]
struct TableData {
    #[serde(default)]
    grid: Vec<Vec<TableCell>>,
}

#[derive(Debug, Deserialize)]
struct TableCell {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct PictureItem {
    #[serde(default = "picture_label")]
    label: String,
    #[serde(default)]
    prov: Vec<ProvenanceItem>,
    #[serde(default)]
    children: Vec<RefItem>,
    #[serde(default)]
    captions: Vec<RefItem>,
}

#[derive(Debug, Deserialize)]
struct ProvenanceItem {
    page_no: u32,
    #[serde(default)]
    bbox: Option<DoclingBox>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct DoclingBox {
    l: f64,
    t: f64,
    r: f64,
    b: f64,
}

fn table_label() -> String {
    "table".into()
}

fn picture_label() -> String {
    "picture".into()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum NodeRef {
    Text(usize),
    Group(usize),
    Table(usize),
    Picture(usize),
}

impl NodeRef {
    fn parse(reference: &str) -> Option<Self> {
        let mut parts = reference.strip_prefix("#/")?.splitn(2, '/');
        let collection = parts.next()?;
        let index = parts.next()?.parse().ok()?;
        match collection {
            "texts" => Some(Self::Text(index)),
            "groups" => Some(Self::Group(index)),
            "tables" => Some(Self::Table(index)),
            "pictures" => Some(Self::Picture(index)),
            _ => None,
        }
    }
}

impl DoclingDocument {
    /// Flatten the body tree into reading-ordered elements.
    ///
    /// Groups are structural and only contribute their children. Items reachable twice are
    /// emitted once.
    pub(super) fn into_converted(self) -> ConvertedDocument {
        let mut walker = Walker {
            document: &self,
            visited: HashSet::new(),
            elements: Vec::new(),
        };
        walker.walk(&self.body.children);
        let elements = walker.elements;
        ConvertedDocument::new(elements, self.pages.len())
    }

    fn text_of(&self, reference: &RefItem) -> Option<&str> {
        match NodeRef::parse(&reference.reference)? {
            NodeRef::Text(index) => self.texts.get(index).map(|item| item.text.trim()),
            _ => None,
        }
    }
}

struct Walker<'a> {
    document: &'a DoclingDocument,
    visited: HashSet<NodeRef>,
    elements: Vec<DocumentElement>,
}

impl Walker<'_> {
    fn walk(&mut self, children: &[RefItem]) {
        for child in children {
            let Some(node) = NodeRef::parse(&child.reference) else {
                tracing::trace!(reference = %child.reference, "Skipping unsupported docling ref");
                continue;
            };
            if !self.visited.insert(node) {
                continue;
            }
            self.visit(node);
        }
    }

    fn visit(&mut self, node: NodeRef) {
        let document = self.document;
        match node {
            NodeRef::Group(index) => {
                if let Some(group) = document.groups.get(index) {
                    self.walk(&group.children);
                }
            }
            NodeRef::Text(index) => {
                if let Some(item) = document.texts.get(index) {
                    self.push(
                        DocumentElement::new(ElementLabel::parse(&item.label), item.text.trim()),
                        &item.prov,
                    );
                    self.walk(&item.children);
                }
            }
            NodeRef::Table(index) => {
                if let Some(item) = document.tables.get(index) {
                    let grid: TableGrid = item
                        .data
                        .grid
                        .iter()
                        .map(|row| row.iter().map(|cell| cell.text.trim().to_string()).collect())
                        .collect();
                    let element = DocumentElement::new(ElementLabel::parse(&item.label), "")
                        .with_structure(grid);
                    self.push(element, &item.prov);
                    self.walk(&item.children);
                }
            }
            NodeRef::Picture(index) => {
                if let Some(item) = document.pictures.get(index) {
                    let caption = item
                        .captions
                        .iter()
                        .filter_map(|reference| document.text_of(reference))
                        .filter(|text| !text.is_empty())
                        .collect::<Vec<_>>()
                        .join(" ");
                    self.push(
                        DocumentElement::new(ElementLabel::parse(&item.label), caption),
                        &item.prov,
                    );
                    self.walk(&item.children);
                }
            }
        }
    }

    fn push(&mut self, mut element: DocumentElement, provenance: &[ProvenanceItem]) {
        element.provenance = provenance
            .iter()
            .map(|prov| Provenance {
                page: prov.page_no,
                bbox: prov.bbox.map(|bbox| BoundingBox {
                    left: bbox.l,
                    top: bbox.t,
                    right: bbox.r,
                    bottom: bbox.b,
                }),
            })
            .collect();
        self.elements.push(element);
    }
}
