//! Structure-aware, token-bounded chunker used by the RAG endpoint.
//!
//! Three passes over the converted document:
//!
//! 1. Hierarchical: headings update the heading path and are not emitted on their own;
//!    consecutive list items form one group; every other non-empty element is its own group.
//! 2. Split: groups above `max_tokens` are re-packed element by element, so each window only
//!    lists the elements whose text it holds. An element that is over budget on its own is split
//!    into semantic windows with `overlap_tokens` of trailing context carried between them.
//! 3. Merge (`merge_peers`): adjacent undersized groups under the same headings are merged while
//!    the combined text stays within `max_tokens`.

use super::ChunkingError;
use super::tokens::{TokenCounter, split_with_overlap};
use super::types::ChunkGroup;
use crate::document::{ConvertedDocument, DocumentElement, ElementLabel};
use serde::Serialize;

/// Token budget and merge policy for RAG chunking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkingConfig {
    /// Upper bound on tokens per chunk.
    pub max_tokens: usize,
    /// Tokens of trailing context repeated when an element is split.
    #[serde(rename = "overlap")]
    pub overlap_tokens: usize,
    /// Merge adjacent small chunks that share headings.
    pub merge_peers: bool,
}

/// Hybrid chunker bound to a token counter.
pub struct HybridChunker {
    config: ChunkingConfig,
    token_counter: TokenCounter,
}

impl HybridChunker {
    /// Validate the configuration and bind the token counter.
    pub fn new(config: ChunkingConfig, token_counter: TokenCounter) -> Result<Self, ChunkingError> {
        if config.max_tokens == 0 {
            return Err(ChunkingError::InvalidChunkSize);
        }
        Ok(Self {
            config,
            token_counter,
        })
    }

    /// Group the document's elements into token-bounded chunks.
    pub fn chunk<'a>(&self, document: &'a ConvertedDocument) -> Vec<ChunkGroup<'a>> {
        let groups = self.hierarchical(document);
        let groups = self.split_oversized(groups);
        if self.config.merge_peers {
            self.merge_peers(groups)
        } else {
            groups
        }
    }

    fn hierarchical<'a>(&self, document: &'a ConvertedDocument) -> Vec<ChunkGroup<'a>> {
        let mut groups: Vec<ChunkGroup<'a>> = Vec::new();
        let mut title: Option<String> = None;
        let mut section: Option<String> = None;
        let mut open_list = false;

        for element in &document.elements {
            let text = element.text.trim();
            if text.is_empty() {
                continue;
            }

            match element.label {
                ElementLabel::Title => {
                    title = Some(text.to_string());
                    section = None;
                    open_list = false;
                    continue;
                }
                ElementLabel::SectionHeader => {
                    section = Some(text.to_string());
                    open_list = false;
                    continue;
                }
                _ => {}
            }

            let is_list_item = element.label == ElementLabel::ListItem;
            if is_list_item
                && open_list
                && let Some(last) = groups.last_mut()
            {
                last.text.push('\n');
                last.text.push_str(text);
                last.doc_items.push(element);
                continue;
            }

            groups.push(ChunkGroup {
                text: text.to_string(),
                doc_items: vec![element],
                headings: title.iter().chain(section.iter()).cloned().collect(),
            });
            open_list = is_list_item;
        }

        groups
    }

    fn split_oversized<'a>(&self, groups: Vec<ChunkGroup<'a>>) -> Vec<ChunkGroup<'a>> {
        let mut result = Vec::with_capacity(groups.len());
        for group in groups {
            if self.count(&group.text) <= self.config.max_tokens {
                result.push(group);
                continue;
            }

            let before = result.len();
            self.split_by_items(group, &mut result);
            tracing::trace!(
                windows = result.len() - before,
                max_tokens = self.config.max_tokens,
                "Split oversized group"
            );
        }
        result
    }

    fn split_by_items<'a>(&self, group: ChunkGroup<'a>, result: &mut Vec<ChunkGroup<'a>>) {
        let mut window: Option<ChunkGroup<'a>> = None;
        for item in group.doc_items {
            let text = item.text.trim();
            if self.count(text) > self.config.max_tokens {
                result.extend(window.take());
                self.split_element(text, item, &group.headings, result);
                continue;
            }

            if let Some(current) = window.as_mut() {
                let candidate = format!("{}\n{}", current.text, text);
                if self.count(&candidate) <= self.config.max_tokens {
                    current.text = candidate;
                    current.doc_items.push(item);
                    continue;
                }
            }
            result.extend(window.take());
            window = Some(ChunkGroup {
                text: text.to_string(),
                doc_items: vec![item],
                headings: group.headings.clone(),
            });
        }
        result.extend(window);
    }

    fn split_element<'a>(
        &self,
        text: &str,
        item: &'a DocumentElement,
        headings: &[String],
        result: &mut Vec<ChunkGroup<'a>>,
    ) {
        let windows = split_with_overlap(
            text,
            self.config.max_tokens,
            self.config.overlap_tokens,
            &self.token_counter,
        );
        result.extend(windows.into_iter().map(|text| ChunkGroup {
            text,
            doc_items: vec![item],
            headings: headings.to_vec(),
        }));
    }

    fn merge_peers<'a>(&self, groups: Vec<ChunkGroup<'a>>) -> Vec<ChunkGroup<'a>> {
        let mut merged: Vec<ChunkGroup<'a>> = Vec::with_capacity(groups.len());
        for group in groups {
            if let Some(last) = merged.last_mut()
                && last.headings == group.headings
            {
                let candidate = format!("{}\n{}", last.text, group.text);
                if self.count(&candidate) <= self.config.max_tokens {
                    last.text = candidate;
                    last.doc_items.extend(group.doc_items);
                    continue;
                }
            }
            merged.push(group);
        }
        merged
    }

    fn count(&self, text: &str) -> usize {
        self.token_counter.as_ref()(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::assembler::assemble_rag;
    use crate::chunking::tokens::whitespace_token_counter;
    use crate::document::Provenance;

    fn chunker(max_tokens: usize, overlap_tokens: usize, merge_peers: bool) -> HybridChunker {
        HybridChunker::new(
            ChunkingConfig {
                max_tokens,
                overlap_tokens,
                merge_peers,
            },
            whitespace_token_counter(),
        )
        .expect("valid config")
    }

    fn sample() -> ConvertedDocument {
        ConvertedDocument::new(
            vec![
                DocumentElement::new(ElementLabel::Title, "Handbook"),
                DocumentElement::new(ElementLabel::SectionHeader, "Setup"),
                DocumentElement::new(ElementLabel::Paragraph, "Install the tool.")
                    .with_provenance(Provenance::page(1)),
                DocumentElement::new(ElementLabel::ListItem, "step one")
                    .with_provenance(Provenance::page(1)),
                DocumentElement::new(ElementLabel::ListItem, "step two")
                    .with_provenance(Provenance::page(2)),
                DocumentElement::new(ElementLabel::SectionHeader, "Usage"),
                DocumentElement::new(ElementLabel::Paragraph, "")
                    .with_provenance(Provenance::page(2)),
                DocumentElement::new(ElementLabel::Table, "cmd | effect\nrun | go")
                    .with_provenance(Provenance::page(2)),
            ],
            2,
        )
    }

    #[test]
    fn rejects_zero_token_budget() {
        let error = HybridChunker::new(
            ChunkingConfig {
                max_tokens: 0,
                overlap_tokens: 0,
                merge_peers: true,
            },
            whitespace_token_counter(),
        )
        .err()
        .expect("zero budget rejected");
        assert!(matches!(error, ChunkingError::InvalidChunkSize));
    }

    #[test]
    fn headings_become_context_and_lists_are_grouped() {
        let document = sample();
        let groups = chunker(512, 0, false).chunk(&document);

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].text, "Install the tool.");
        assert_eq!(groups[0].headings, vec!["Handbook", "Setup"]);
        assert_eq!(groups[1].text, "step one\nstep two");
        assert_eq!(groups[1].doc_items.len(), 2);
        assert_eq!(groups[2].headings, vec!["Handbook", "Usage"]);
        assert_eq!(groups[2].doc_items[0].label, ElementLabel::Table);
    }

    #[test]
    fn merge_peers_joins_siblings_under_same_heading_only() {
        let document = sample();
        let groups = chunker(512, 0, true).chunk(&document);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].text, "Install the tool.\nstep one\nstep two");
        assert_eq!(groups[0].doc_items.len(), 3);
        assert_eq!(groups[1].headings, vec!["Handbook", "Usage"]);
    }

    #[test]
    fn merge_peers_respects_token_budget() {
        let document = sample();
        let groups = chunker(4, 0, true).chunk(&document);
        for group in &groups {
            assert!(group.text.split_whitespace().count() <= 4, "{:?}", group.text);
        }
        // "Install the tool." (3) + "step one\nstep two" (4) exceeds the budget
        assert_eq!(groups[0].text, "Install the tool.");
    }

    #[test]
    fn oversized_elements_split_with_overlap_and_keep_doc_items() {
        let document = ConvertedDocument::new(
            vec![
                DocumentElement::new(ElementLabel::Paragraph, "one two three four five")
                    .with_provenance(Provenance::page(7)),
            ],
            7,
        );
        let groups = chunker(3, 1, false).chunk(&document);

        assert_eq!(groups.len(), 2);
        for group in &groups {
            assert!(group.text.split_whitespace().count() <= 3);
            assert_eq!(group.doc_items.len(), 1);
            assert_eq!(group.doc_items[0].first_page(), Some(7));
        }
        assert_eq!(groups[1].text, "three four five");
    }

    #[test]
    fn split_windows_only_report_their_own_pages() {
        let elements = (1..=6)
            .map(|page| {
                DocumentElement::new(ElementLabel::ListItem, format!("item on page {page}"))
                    .with_provenance(Provenance::page(page))
            })
            .collect();
        let document = ConvertedDocument::new(elements, 6);
        let groups = chunker(8, 0, false).chunk(&document);
        let chunks = assemble_rag("steps.pdf", &groups);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "item on page 1\nitem on page 2");
        let pages: Vec<Vec<u32>> = chunks
            .iter()
            .map(|chunk| chunk.metadata.pages.clone())
            .collect();
        assert_eq!(pages, vec![vec![1, 2], vec![3, 4], vec![5, 6]]);
        for chunk in &chunks {
            assert!(chunk.metadata.token_count <= 8);
            assert_eq!(chunk.metadata.element_types, vec!["list_item"]);
        }
    }

    #[test]
    fn oversized_table_windows_stay_within_budget_and_keep_their_table() {
        let document = ConvertedDocument::new(
            vec![
                DocumentElement::new(ElementLabel::Paragraph, "Results follow.")
                    .with_provenance(Provenance::page(3)),
                DocumentElement::new(
                    ElementLabel::Table,
                    "name | score\nada | 9\nbob | 7\ncy | 5",
                )
                .with_provenance(Provenance::page(4)),
            ],
            4,
        );
        let groups = chunker(4, 0, true).chunk(&document);
        let chunks = assemble_rag("scores.pdf", &groups);

        assert!(chunks.len() >= 4);
        for chunk in &chunks {
            assert!(chunk.metadata.token_count <= 4, "{:?}", chunk.text);
        }
        assert_eq!(chunks[0].text, "Results follow.");
        assert_eq!(chunks[0].metadata.pages, vec![3]);
        assert!(!chunks[0].metadata.has_table);
        for chunk in &chunks[1..] {
            assert_eq!(chunk.metadata.pages, vec![4]);
            assert!(chunk.metadata.has_table);
            assert_eq!(chunk.metadata.element_types, vec!["table"]);
        }
    }
}
