//! Configurable traversal over contiguous list blocks.
//!
//! Every list query is expressed as a walk from a start block. The walker
//! only visits list blocks adjacent to each other; the first non-list block
//! in the walk direction ends it.
//!
//! Indent handling relative to a reference indent (initially the start
//! block's indent):
//! - a shallower block stops the walk, unless `lower_indent` is set, in which
//!   case it is yielded and becomes the new reference,
//! - a deeper block is skipped, unless `higher_indent` is set. Walking
//!   backward, deeper blocks are buffered and only yielded once the block at
//!   the reference indent that owns them is reached,
//! - a block at the reference indent is yielded when `same_indent` is set
//!   and it matches the start block on every attribute in
//!   `same_attributes`; a mismatch stops the walk.

use std::collections::VecDeque;

use crate::model::{Block, ListAttr, ListAttributes};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Backward,
    Forward,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WalkerOptions<'a> {
    pub direction: Direction,
    pub include_self: bool,
    pub same_attributes: &'a [ListAttr],
    pub same_indent: bool,
    pub lower_indent: bool,
    pub higher_indent: bool,
}

impl<'a> WalkerOptions<'a> {
    pub fn backward() -> Self {
        Self::default()
    }

    pub fn forward() -> Self {
        Self {
            direction: Direction::Forward,
            ..Self::default()
        }
    }

    pub fn include_self(mut self) -> Self {
        self.include_self = true;
        self
    }

    pub fn same_indent(mut self) -> Self {
        self.same_indent = true;
        self
    }

    pub fn lower_indent(mut self) -> Self {
        self.lower_indent = true;
        self
    }

    pub fn higher_indent(mut self) -> Self {
        self.higher_indent = true;
        self
    }

    pub fn same_attributes(mut self, attrs: &'a [ListAttr]) -> Self {
        self.same_attributes = attrs;
        self
    }
}

/// Iterator over block indices produced by a walk.
pub struct ListWalker<'a> {
    blocks: &'a [Block],
    start: Option<&'a ListAttributes>,
    options: WalkerOptions<'a>,
    reference_indent: usize,
    cursor: Option<usize>,
    nested: Vec<usize>,
    pending: VecDeque<usize>,
}

impl<'a> ListWalker<'a> {
    pub fn new(blocks: &'a [Block], start: usize, options: WalkerOptions<'a>) -> Self {
        let start_list = blocks.get(start).and_then(|block| block.list.as_ref());
        let cursor = match (start_list, options.include_self, options.direction) {
            (None, _, _) => None,
            (Some(_), true, _) => Some(start),
            (Some(_), false, Direction::Forward) => Some(start + 1),
            (Some(_), false, Direction::Backward) => start.checked_sub(1),
        };

        Self {
            blocks,
            start: start_list,
            options,
            reference_indent: start_list.map(|list| list.indent).unwrap_or_default(),
            cursor,
            nested: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    /// The first block the walk yields, if any.
    pub fn first(blocks: &'a [Block], start: usize, options: WalkerOptions<'a>) -> Option<usize> {
        Self::new(blocks, start, options).next()
    }

    fn stop(&mut self) {
        self.cursor = None;
        self.nested.clear();
    }

    fn advance(&mut self, index: usize) {
        self.cursor = match self.options.direction {
            Direction::Forward => Some(index + 1),
            Direction::Backward => index.checked_sub(1),
        };
    }
}

impl Iterator for ListWalker<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        loop {
            if let Some(index) = self.pending.pop_front() {
                return Some(index);
            }

            let index = self.cursor?;
            let Some(list) = self.blocks.get(index).and_then(|block| block.list.as_ref()) else {
                self.stop();
                continue;
            };
            self.advance(index);

            let options = self.options;
            if list.indent < self.reference_indent {
                if !options.lower_indent {
                    self.stop();
                    continue;
                }
                self.reference_indent = list.indent;
            } else if list.indent > self.reference_indent {
                if !options.higher_indent {
                    continue;
                }
                if options.direction == Direction::Backward {
                    self.nested.push(index);
                    continue;
                }
            } else {
                if !options.same_indent {
                    if options.higher_indent {
                        self.pending.extend(self.nested.drain(..));
                        self.stop();
                    }
                    continue;
                }
                let matches = self
                    .start
                    .is_some_and(|start| list.matches(start, options.same_attributes));
                if !matches {
                    self.stop();
                    continue;
                }
            }

            self.pending.extend(self.nested.drain(..));
            self.pending.push_back(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixture::{parse_blocks, position};
    use pretty_assertions::assert_eq;

    const DOC: &str = "\
* A
  * B
    * C
  + B2
* D
  * E
* F
";

    fn walk(doc: &str, start: &str, options: WalkerOptions<'_>) -> Vec<String> {
        let blocks = parse_blocks(doc);
        let start = position(&blocks, start);
        ListWalker::new(&blocks, start, options)
            .map(|index| blocks[index].content.text.clone())
            .collect()
    }

    #[test]
    fn test_backward_same_indent_skips_nested_blocks() {
        // Given F at indent 0
        // When walking backward over same-indent blocks
        let result = walk(DOC, "F", WalkerOptions::backward().same_indent());

        // Then only the indent 0 blocks are visited, nearest first
        assert_eq!(result, vec!["D", "A"]);
    }

    #[test]
    fn test_backward_higher_indent_yields_nested_when_owner_is_reached() {
        let result = walk(
            DOC,
            "F",
            WalkerOptions::backward().same_indent().higher_indent(),
        );
        assert_eq!(result, vec!["E", "D", "B2", "C", "B", "A"]);
    }

    #[test]
    fn test_forward_higher_indent_without_same_indent_stops_at_sibling() {
        let result = walk(DOC, "A", WalkerOptions::forward().higher_indent());
        assert_eq!(result, vec!["B", "C", "B2"]);
    }

    #[test]
    fn test_lower_indent_finds_parent() {
        let parent = walk(DOC, "C", WalkerOptions::backward().lower_indent());
        assert_eq!(parent.first().map(String::as_str), Some("B"));

        let parent = walk(DOC, "B2", WalkerOptions::backward().lower_indent());
        assert_eq!(parent.first().map(String::as_str), Some("A"));
    }

    #[test]
    fn test_same_attributes_stop_the_walk() {
        let doc = "\
* A
# B
# C
";
        let result = walk(
            doc,
            "C",
            WalkerOptions::backward()
                .same_indent()
                .same_attributes(&[ListAttr::Type]),
        );
        assert_eq!(result, vec!["B"]);
    }

    #[test]
    fn test_non_list_block_ends_walk() {
        let doc = "\
* A
plain
* B
";
        let result = walk(doc, "B", WalkerOptions::backward().same_indent());
        assert!(result.is_empty());

        let result = walk(doc, "plain", WalkerOptions::forward().include_self());
        assert!(result.is_empty());
    }

    #[test]
    fn test_include_self() {
        let result = walk(DOC, "D", WalkerOptions::forward().include_self().same_indent());
        assert_eq!(result, vec!["D", "F"]);
    }
}
