//! Mapping of caret positions between blocks and content view nodes.
//!
//! Markers placed before a content node are separate nodes and do not
//! move offsets inside it. Inside markers sit in front of the text, so the
//! view offset is the model offset shifted by their view lengths; view
//! offsets that fall inside a marker map back to the start of the text.

use std::collections::HashMap;

use crate::model::BlockId;

use super::tree::{ViewId, ViewTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelPosition {
    pub block: BlockId,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewPosition {
    pub node: ViewId,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy)]
struct Span {
    shift: usize,
    len: usize,
}

#[derive(Debug, Clone, Default)]
pub struct PositionMap {
    by_block: HashMap<BlockId, (ViewId, Span)>,
    by_view: HashMap<ViewId, (BlockId, Span)>,
}

impl PositionMap {
    pub fn new(tree: &ViewTree) -> Self {
        let mut map = Self::default();
        for content in tree.contents() {
            let span = Span {
                shift: content.marker_offset(),
                len: content.text.chars().count(),
            };
            map.by_block.insert(content.block, (content.view_id, span));
            map.by_view.insert(content.view_id, (content.block, span));
        }
        map
    }

    /// Offsets past the end of the block are clamped to its length.
    pub fn to_view(&self, position: ModelPosition) -> Option<ViewPosition> {
        let (node, span) = self.by_block.get(&position.block)?;
        Some(ViewPosition {
            node: *node,
            offset: position.offset.min(span.len) + span.shift,
        })
    }

    pub fn to_model(&self, position: ViewPosition) -> Option<ModelPosition> {
        let (block, span) = self.by_view.get(&position.node)?;
        Some(ModelPosition {
            block: *block,
            offset: position.offset.saturating_sub(span.shift).min(span.len),
        })
    }
}
