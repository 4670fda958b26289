//! Element label taxonomy.
//!
//! Converters report a free-form label per element (`"paragraph"`, `"table"`, ...). Every label
//! is parsed once into [`ElementLabel`] and classified through [`ElementLabel::category`], so the
//! table/figure decisions made by the assembler never depend on ad-hoc substring checks.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Semantic bucket an element label belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementCategory {
    /// Tabular content.
    Table,
    /// Pictures, figures, and charts.
    Figure,
    /// Running text: paragraphs, headings, list items, captions, code.
    Text,
    /// Structural or unrecognized labels.
    Other,
}

/// Label attached to a converted document element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementLabel {
    /// Document title.
    Title,
    /// Section heading.
    SectionHeader,
    /// Body paragraph.
    Paragraph,
    /// Generic text block.
    Text,
    /// Bullet or numbered list entry.
    ListItem,
    /// Caption attached to a table or picture.
    Caption,
    /// Footnote text.
    Footnote,
    /// Running page header.
    PageHeader,
    /// Running page footer.
    PageFooter,
    /// Source code block.
    Code,
    /// Mathematical formula.
    Formula,
    /// Ticked checkbox.
    CheckboxSelected,
    /// Empty checkbox.
    CheckboxUnselected,
    /// Form region.
    Form,
    /// Key/value region.
    KeyValueRegion,
    /// Table of contents.
    DocumentIndex,
    /// Bibliographic reference.
    Reference,
    /// Table.
    Table,
    /// Embedded picture.
    Picture,
    /// Figure (legacy converter label for pictures).
    Figure,
    /// Chart.
    Chart,
    /// Any label outside the known taxonomy, kept verbatim (lowercased).
    Other(String),
}

impl ElementLabel {
    /// Parse a converter label, normalizing case and separators.
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "title" => Self::Title,
            "section_header" | "heading" => Self::SectionHeader,
            "paragraph" => Self::Paragraph,
            "text" => Self::Text,
            "list_item" => Self::ListItem,
            "caption" => Self::Caption,
            "footnote" => Self::Footnote,
            "page_header" => Self::PageHeader,
            "page_footer" => Self::PageFooter,
            "code" => Self::Code,
            "formula" => Self::Formula,
            "checkbox_selected" => Self::CheckboxSelected,
            "checkbox_unselected" => Self::CheckboxUnselected,
            "form" => Self::Form,
            "key_value_region" => Self::KeyValueRegion,
            "document_index" => Self::DocumentIndex,
            "reference" => Self::Reference,
            "table" => Self::Table,
            "picture" => Self::Picture,
            "figure" => Self::Figure,
            "chart" => Self::Chart,
            _ => Self::Other(normalized),
        }
    }

    /// Canonical snake_case label string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Title => "title",
            Self::SectionHeader => "section_header",
            Self::Paragraph => "paragraph",
            Self::Text => "text",
            Self::ListItem => "list_item",
            Self::Caption => "caption",
            Self::Footnote => "footnote",
            Self::PageHeader => "page_header",
            Self::PageFooter => "page_footer",
            Self::Code => "code",
            Self::Formula => "formula",
            Self::CheckboxSelected => "checkbox_selected",
            Self::CheckboxUnselected => "checkbox_unselected",
            Self::Form => "form",
            Self::KeyValueRegion => "key_value_region",
            Self::DocumentIndex => "document_index",
            Self::Reference => "reference",
            Self::Table => "table",
            Self::Picture => "picture",
            Self::Figure => "figure",
            Self::Chart => "chart",
            Self::Other(label) => label.as_str(),
        }
    }

    /// Semantic category used by the chunk assembler.
    pub fn category(&self) -> ElementCategory {
        match self {
            Self::Table => ElementCategory::Table,
            Self::Picture | Self::Figure | Self::Chart => ElementCategory::Figure,
            Self::Title
            | Self::SectionHeader
            | Self::Paragraph
            | Self::Text
            | Self::ListItem
            | Self::Caption
            | Self::Footnote
            | Self::Code
            | Self::Formula
            | Self::Reference => ElementCategory::Text,
            Self::PageHeader
            | Self::PageFooter
            | Self::CheckboxSelected
            | Self::CheckboxUnselected
            | Self::Form
            | Self::KeyValueRegion
            | Self::DocumentIndex
            | Self::Other(_) => ElementCategory::Other,
        }
    }

    /// Whether the label opens a new heading scope.
    pub fn is_heading(&self) -> bool {
        matches!(self, Self::Title | Self::SectionHeader)
    }
}

impl fmt::Display for ElementLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ElementLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ElementLabel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_labels_round_trip_through_their_string_form() {
        for raw in ["title", "section_header", "list_item", "table", "picture", "chart"] {
            assert_eq!(ElementLabel::parse(raw).as_str(), raw);
        }
    }

    #[test]
    fn parse_normalizes_case_and_separators() {
        assert_eq!(ElementLabel::parse("Section-Header"), ElementLabel::SectionHeader);
        assert_eq!(ElementLabel::parse(" TABLE "), ElementLabel::Table);
        assert_eq!(
            ElementLabel::parse("Grading Scale"),
            ElementLabel::Other("grading_scale".into())
        );
    }

    #[test]
    fn categories_cover_tables_and_figures() {
        assert_eq!(ElementLabel::Table.category(), ElementCategory::Table);
        assert_eq!(ElementLabel::Picture.category(), ElementCategory::Figure);
        assert_eq!(ElementLabel::Figure.category(), ElementCategory::Figure);
        assert_eq!(ElementLabel::Chart.category(), ElementCategory::Figure);
        assert_eq!(ElementLabel::Paragraph.category(), ElementCategory::Text);
        // a table of contents is not a data table
        assert_eq!(ElementLabel::DocumentIndex.category(), ElementCategory::Other);
        assert_eq!(
            ElementLabel::parse("timetable").category(),
            ElementCategory::Other
        );
    }
}
