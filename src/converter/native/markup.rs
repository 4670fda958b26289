//! Block parsers for lightweight markup (Markdown and AsciiDoc).
//!
//! Both dialects share one line-oriented state machine; only the syntax probes differ. Markup
//! has no pages, so elements carry no provenance.

use super::text::strip_list_marker;
use crate::document::{ConvertedDocument, DocumentElement, ElementLabel, TableGrid};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Markdown,
    AsciiDoc,
}

/// Parse Markdown into document elements.
pub(super) fn parse_markdown(source: &str) -> ConvertedDocument {
    BlockParser::new(Dialect::Markdown).run(source)
}

/// Parse AsciiDoc into document elements.
pub(super) fn parse_asciidoc(source: &str) -> ConvertedDocument {
    BlockParser::new(Dialect::AsciiDoc).run(source)
}

struct BlockParser {
    dialect: Dialect,
    elements: Vec<DocumentElement>,
    paragraph: Vec<String>,
    table: Option<TableGrid>,
}

impl BlockParser {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            elements: Vec::new(),
            paragraph: Vec::new(),
            table: None,
        }
    }

    fn run(mut self, source: &str) -> ConvertedDocument {
        let mut lines = source.lines();

        while let Some(raw) = lines.next() {
            let line = raw.trim_end();
            let trimmed = line.trim();

            if let Some(fence) = self.code_fence(trimmed) {
                self.flush();
                let mut body = Vec::new();
                for inner in lines.by_ref() {
                    if inner.trim() == fence {
                        break;
                    }
                    body.push(inner);
                }
                self.push(ElementLabel::Code, body.join("\n"));
                continue;
            }

            if self.dialect == Dialect::AsciiDoc && trimmed == "|===" {
                self.flush();
                let mut grid = TableGrid::new();
                for inner in lines.by_ref() {
                    let inner = inner.trim();
                    if inner == "|===" {
                        break;
                    }
                    if inner.is_empty() {
                        continue;
                    }
                    grid.push(asciidoc_cells(inner));
                }
                self.push_table(grid);
                continue;
            }

            if self.dialect == Dialect::Markdown && is_pipe_row(trimmed) {
                self.flush_paragraph();
                if is_separator_row(trimmed) {
                    continue;
                }
                self.table
                    .get_or_insert_with(TableGrid::new)
                    .push(pipe_cells(trimmed));
                continue;
            }

            if trimmed.is_empty() {
                self.flush();
                continue;
            }

            if let Some((level, text)) = self.heading(trimmed) {
                self.flush();
                let label = if level == 1 {
                    ElementLabel::Title
                } else {
                    ElementLabel::SectionHeader
                };
                self.push(label, text.to_string());
                continue;
            }

            if let Some(alt) = self.image(trimmed) {
                self.flush();
                self.push(ElementLabel::Picture, alt.to_string());
                continue;
            }

            if let Some(item) = self.list_item(trimmed) {
                self.flush();
                self.push(ElementLabel::ListItem, item.to_string());
                continue;
            }

            self.flush_table();
            self.paragraph.push(trimmed.to_string());
        }

        self.flush();
        ConvertedDocument::new(self.elements, 0)
    }

    fn code_fence<'a>(&self, line: &'a str) -> Option<&'a str> {
        match self.dialect {
            Dialect::Markdown if line.starts_with("```") => Some("```"),
            Dialect::Markdown if line.starts_with("~~~") => Some("~~~"),
            Dialect::AsciiDoc if line == "----" => Some("----"),
            Dialect::AsciiDoc if line == "...." => Some("...."),
            _ => None,
        }
    }

    fn heading<'a>(&self, line: &'a str) -> Option<(usize, &'a str)> {
        let marker = match self.dialect {
            Dialect::Markdown => '#',
            Dialect::AsciiDoc => '=',
        };
        let level = line.chars().take_while(|c| *c == marker).count();
        if level == 0 || level > 6 {
            return None;
        }
        let rest = &line[level..];
        if !rest.starts_with(' ') {
            return None;
        }
        let text = rest.trim().trim_end_matches(marker).trim();
        (!text.is_empty()).then_some((level, text))
    }

    fn image<'a>(&self, line: &'a str) -> Option<&'a str> {
        match self.dialect {
            Dialect::Markdown => {
                let rest = line.strip_prefix("![")?;
                let end = rest.find("](")?;
                line.ends_with(')').then(|| &rest[..end])
            }
            Dialect::AsciiDoc => {
                let rest = line.strip_prefix("image::")?;
                let open = rest.find('[')?;
                let close = rest.rfind(']')?;
                (close > open).then(|| &rest[open + 1..close])
            }
        }
    }

    fn list_item<'a>(&self, line: &'a str) -> Option<&'a str> {
        match self.dialect {
            Dialect::Markdown => strip_list_marker(line),
            Dialect::AsciiDoc => {
                let stars = line.chars().take_while(|c| *c == '*' || *c == '.').count();
                if stars == 0 {
                    return strip_list_marker(line);
                }
                let rest = &line[stars..];
                rest.starts_with(' ').then(|| rest.trim())
            }
        }
    }

    fn push(&mut self, label: ElementLabel, text: String) {
        self.elements.push(DocumentElement::new(label, text));
    }

    fn push_table(&mut self, grid: TableGrid) {
        if grid.is_empty() {
            return;
        }
        self.elements
            .push(DocumentElement::new(ElementLabel::Table, String::new()).with_structure(grid));
    }

    fn flush_paragraph(&mut self) {
        if self.paragraph.is_empty() {
            return;
        }
        let text = self.paragraph.join(" ");
        self.paragraph.clear();
        self.push(ElementLabel::Paragraph, text);
    }

    fn flush_table(&mut self) {
        if let Some(grid) = self.table.take() {
            self.push_table(grid);
        }
    }

    fn flush(&mut self) {
        self.flush_paragraph();
        self.flush_table();
    }
}

fn is_pipe_row(line: &str) -> bool {
    line.starts_with('|') && line.len() > 1
}

fn is_separator_row(line: &str) -> bool {
    line.chars()
        .all(|c| matches!(c, '|' | '-' | ':' | ' '))
        && line.contains('-')
}

fn pipe_cells(line: &str) -> Vec<String> {
    line.trim_matches('|')
        .split('|')
        .map(|cell| cell.trim().to_string())
        .collect()
}

fn asciidoc_cells(line: &str) -> Vec<String> {
    line.split('|')
        .skip(1)
        .map(|cell| cell.trim().to_string())
        .collect()
}
