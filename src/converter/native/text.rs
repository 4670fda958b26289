//! Layout-free heuristics for plain extracted text.

use crate::document::{ElementLabel, TableGrid};

const HEADING_MAX_LEN: usize = 120;
const HEADING_MAX_WORDS: usize = 12;

/// Split text into blank-line separated blocks.
pub(super) fn split_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line.trim_end());
        }
    }
    if !current.is_empty() {
        blocks.push(current.join("\n"));
    }
    blocks
}

/// Classified fragment of a text block.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct Fragment {
    pub(super) label: ElementLabel,
    pub(super) text: String,
    pub(super) grid: Option<TableGrid>,
}

impl Fragment {
    fn new(label: ElementLabel, text: String) -> Self {
        Self {
            label,
            text,
            grid: None,
        }
    }
}

/// Classify a block of extracted text into one or more fragments.
///
/// Tables and list blocks are recognized first; a short standalone line that reads like a
/// heading becomes a section header; everything else is a paragraph with lines re-flowed.
pub(super) fn classify_block(block: &str) -> Vec<Fragment> {
    let lines: Vec<&str> = block
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        return Vec::new();
    }

    if let Some(grid) = aligned_table(&lines) {
        return vec![Fragment {
            label: ElementLabel::Table,
            text: String::new(),
            grid: Some(grid),
        }];
    }

    if lines.iter().all(|line| strip_list_marker(line).is_some()) {
        return lines
            .iter()
            .filter_map(|line| strip_list_marker(line))
            .map(|item| Fragment::new(ElementLabel::ListItem, item.to_string()))
            .collect();
    }

    if lines.len() == 1 && looks_like_heading(lines[0]) {
        return vec![Fragment::new(
            ElementLabel::SectionHeader,
            lines[0].to_string(),
        )];
    }

    vec![Fragment::new(ElementLabel::Paragraph, lines.join(" "))]
}

/// Return the list item body when the line starts with a bullet or ordinal marker.
pub(super) fn strip_list_marker(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    for bullet in ["• ", "- ", "* ", "+ ", "◦ ", "▪ ", "– "] {
        if let Some(rest) = trimmed.strip_prefix(bullet) {
            return Some(rest.trim());
        }
    }

    let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 && digits <= 3 {
        let rest = &trimmed[digits..];
        if let Some(body) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return Some(body.trim());
        }
    }
    None
}

/// Heading heuristic for layout-free text: short, single line, no sentence punctuation,
/// capitalized or mostly upper case.
pub(super) fn looks_like_heading(line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() || line.len() > HEADING_MAX_LEN {
        return false;
    }
    if line.ends_with(['.', '?', '!', ',', ';', ':']) {
        return false;
    }
    let words = line.split_whitespace().count();
    if words == 0 || words > HEADING_MAX_WORDS {
        return false;
    }

    let starts_upper = line.chars().next().is_some_and(char::is_uppercase);
    let alpha: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    let mostly_upper = !alpha.is_empty()
        && alpha.iter().filter(|c| c.is_uppercase()).count() as f64 / alpha.len() as f64 > 0.65;
    starts_upper || mostly_upper
}

/// Detect tab- or whitespace-aligned tables (at least two rows with a stable column count).
fn aligned_table(lines: &[&str]) -> Option<TableGrid> {
    if lines.len() < 2 {
        return None;
    }

    let rows: Vec<Vec<String>> = lines.iter().map(|line| split_columns(line)).collect();
    let multi = rows.iter().filter(|row| row.len() >= 2).count();
    if (multi as f64) / (rows.len() as f64) < 0.8 {
        return None;
    }

    let widths: Vec<usize> = rows.iter().map(Vec::len).filter(|w| *w >= 2).collect();
    let min = widths.iter().copied().min()?;
    let max = widths.iter().copied().max()?;
    if max - min > 1 {
        return None;
    }
    Some(rows)
}

fn split_columns(line: &str) -> Vec<String> {
    if line.contains('\t') {
        return line
            .split('\t')
            .map(str::trim)
            .filter(|cell| !cell.is_empty())
            .map(str::to_string)
            .collect();
    }

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut spaces = 0;
    for ch in line.chars() {
        if ch == ' ' {
            spaces += 1;
            continue;
        }
        if spaces >= 2 && !current.is_empty() {
            cells.push(std::mem::take(&mut current));
        } else if spaces == 1 && !current.is_empty() {
            current.push(' ');
        }
        spaces = 0;
        current.push(ch);
    }
    if !current.is_empty() {
        cells.push(current);
    }
    cells
}
