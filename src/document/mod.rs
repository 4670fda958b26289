//! Structured document model produced by converters.
//!
//! A [`ConvertedDocument`] is a flat, reading-ordered list of [`DocumentElement`]s plus the page
//! count reported by the converter. Everything here is request-scoped and immutable once built.

mod label;

pub use label::{ElementCategory, ElementLabel};

use serde::Serialize;

/// Axis-aligned rectangle locating an element on its page.
///
/// Serialized with the `x0`/`y0`/`x1`/`y1` keys clients already consume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    /// Left edge.
    #[serde(rename = "x0")]
    pub left: f64,
    /// Top edge.
    #[serde(rename = "y0")]
    pub top: f64,
    /// Right edge.
    #[serde(rename = "x1")]
    pub right: f64,
    /// Bottom edge.
    #[serde(rename = "y1")]
    pub bottom: f64,
}

/// Location of an element within the source document.
#[derive(Debug, Clone, PartialEq)]
pub struct Provenance {
    /// 1-based page number.
    pub page: u32,
    /// Optional bounding box on that page.
    pub bbox: Option<BoundingBox>,
}

impl Provenance {
    /// Provenance pointing at a page without position information.
    pub fn page(page: u32) -> Self {
        Self { page, bbox: None }
    }
}

/// Cell texts of a table laid out row by row.
pub type TableGrid = Vec<Vec<String>>;

/// Labeled unit of document content.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentElement {
    /// Text content (serialized table text for tables, caption for pictures).
    pub text: String,
    /// Converter label.
    pub label: ElementLabel,
    /// Provenance entries; the first one is authoritative.
    pub provenance: Vec<Provenance>,
    /// Cell grid for table elements when the converter recovered one.
    pub structure: Option<TableGrid>,
}

impl DocumentElement {
    /// Build an element without provenance.
    pub fn new(label: ElementLabel, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            label,
            provenance: Vec::new(),
            structure: None,
        }
    }

    /// Attach a provenance entry.
    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance.push(provenance);
        self
    }

    /// Attach a table grid, deriving the element text from it when the text is empty.
    pub fn with_structure(mut self, grid: TableGrid) -> Self {
        if self.text.is_empty() {
            self.text = grid_to_text(&grid);
        }
        self.structure = Some(grid);
        self
    }

    /// Category of this element's label.
    pub fn category(&self) -> ElementCategory {
        self.label.category()
    }

    /// Page of the first provenance entry.
    pub fn first_page(&self) -> Option<u32> {
        self.provenance.first().map(|prov| prov.page)
    }

    /// Bounding box of the first provenance entry.
    pub fn first_bbox(&self) -> Option<BoundingBox> {
        self.provenance.first().and_then(|prov| prov.bbox)
    }
}

/// Output of a document conversion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvertedDocument {
    /// Elements in reading order.
    pub elements: Vec<DocumentElement>,
    /// Number of pages reported by the converter (0 for unpaginated formats).
    pub page_count: usize,
}

impl ConvertedDocument {
    /// Build a document from elements, deriving the page count from provenance when larger.
    pub fn new(elements: Vec<DocumentElement>, page_count: usize) -> Self {
        let max_page = elements
            .iter()
            .flat_map(|element| element.provenance.iter().map(|prov| prov.page as usize))
            .max()
            .unwrap_or(0);
        Self {
            elements,
            page_count: page_count.max(max_page),
        }
    }
}

/// Render a table grid as pipe-separated rows.
pub fn grid_to_text(grid: &TableGrid) -> String {
    grid.iter()
        .map(|row| {
            row.iter()
                .map(|cell| cell.trim())
                .collect::<Vec<_>>()
                .join(" | ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
