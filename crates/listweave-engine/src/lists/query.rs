//! Read-only list queries over the flat block sequence.
//!
//! The free functions work on block indices of a slice and never fail:
//! structurally odd input (non-list blocks, out-of-range indices) yields an
//! empty result. [`ListQuery`] wraps them for callers holding [`BlockId`]s.

use std::collections::{BTreeSet, HashMap};
use std::ops::Range;

use crate::model::{Block, BlockId, ListAttr, ListItemId};

use super::walker::{ListWalker, WalkerOptions};

/// Which side of a block to collect when gathering an item's blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ItemBlocks {
    #[default]
    Both,
    /// The block and the blocks of its item before it.
    Backward,
    /// The block and the blocks of its item after it.
    Forward,
}

const ITEM_ID: &[ListAttr] = &[ListAttr::ItemId];

fn list_index(blocks: &[Block], index: usize) -> Option<usize> {
    blocks
        .get(index)
        .filter(|block| block.is_list_block())
        .map(|_| index)
}

/// Blocks of the item `index` belongs to, in document order.
pub fn blocks_of_item(blocks: &[Block], index: usize, side: ItemBlocks) -> Vec<usize> {
    let Some(index) = list_index(blocks, index) else {
        return Vec::new();
    };

    let backward = || {
        let mut found: Vec<usize> = ListWalker::new(
            blocks,
            index,
            WalkerOptions::backward()
                .same_indent()
                .same_attributes(ITEM_ID),
        )
        .collect();
        found.reverse();
        found
    };
    let forward = || {
        ListWalker::new(
            blocks,
            index,
            WalkerOptions::forward()
                .include_self()
                .same_indent()
                .same_attributes(ITEM_ID),
        )
        .collect::<Vec<_>>()
    };

    match side {
        ItemBlocks::Both => {
            let mut all = backward();
            all.extend(forward());
            all
        }
        ItemBlocks::Backward => {
            let mut all = backward();
            all.push(index);
            all
        }
        ItemBlocks::Forward => forward(),
    }
}

pub fn is_first_block_of_item(blocks: &[Block], index: usize) -> bool {
    list_index(blocks, index).is_some()
        && ListWalker::first(
            blocks,
            index,
            WalkerOptions::backward()
                .same_indent()
                .same_attributes(ITEM_ID),
        )
        .is_none()
}

pub fn is_last_block_of_item(blocks: &[Block], index: usize) -> bool {
    list_index(blocks, index).is_some()
        && ListWalker::first(
            blocks,
            index,
            WalkerOptions::forward()
                .same_indent()
                .same_attributes(ITEM_ID),
        )
        .is_none()
}

/// Blocks nested under the item `index` belongs to, at any depth.
///
/// Collection starts after the item's first block, steps over the item's own
/// continuation blocks and ends at the first block that is neither deeper
/// than the item nor part of it.
pub fn nested_blocks_of(blocks: &[Block], index: usize) -> Vec<usize> {
    let Some(first) = blocks_of_item(blocks, index, ItemBlocks::Both).first().copied() else {
        return Vec::new();
    };
    let Some(item) = blocks[first].list.as_ref() else {
        return Vec::new();
    };

    let mut nested = Vec::new();
    for (offset, block) in blocks[first + 1..].iter().enumerate() {
        let Some(list) = &block.list else { break };
        if list.indent > item.indent {
            nested.push(first + 1 + offset);
        } else if list.indent == item.indent && list.item_id == item.item_id {
            continue;
        } else {
            break;
        }
    }
    nested
}

/// Blocks directly following `index` that are deeper than it.
pub fn descendants_after(blocks: &[Block], index: usize) -> Vec<usize> {
    let Some(indent) = blocks.get(index).and_then(Block::indent) else {
        return Vec::new();
    };
    blocks[index + 1..]
        .iter()
        .take_while(|block| block.indent().is_some_and(|i| i > indent))
        .enumerate()
        .map(|(offset, _)| index + 1 + offset)
        .collect()
}

/// Blocks at the same indent as `index` that belong to the same list,
/// optionally restricted to blocks sharing `attrs` with it. Nested
/// sub-lists are stepped over.
pub fn sibling_items_of(blocks: &[Block], index: usize, attrs: &[ListAttr]) -> Vec<usize> {
    if list_index(blocks, index).is_none() {
        return Vec::new();
    }

    let mut siblings: Vec<usize> = ListWalker::new(
        blocks,
        index,
        WalkerOptions::backward().same_indent().same_attributes(attrs),
    )
    .collect();
    siblings.reverse();
    siblings.extend(ListWalker::new(
        blocks,
        index,
        WalkerOptions::forward()
            .include_self()
            .same_indent()
            .same_attributes(attrs),
    ));
    siblings
}

/// The selection extended so that every list item it touches is complete.
/// Non-list blocks of the selection are kept as they are.
pub fn expand_to_complete_items(blocks: &[Block], selection: &[usize]) -> Vec<usize> {
    let mut all = BTreeSet::new();
    for &index in selection {
        if index >= blocks.len() {
            continue;
        }
        if blocks[index].is_list_block() {
            all.extend(blocks_of_item(blocks, index, ItemBlocks::Both));
        } else {
            all.insert(index);
        }
    }
    all.into_iter().collect()
}

/// The selection extended to the complete list structure it touches: every
/// same-level item reachable from a selected block plus everything nested
/// between and after them.
pub fn expand_to_complete_list(
    blocks: &[Block],
    selection: &[usize],
    attrs: &[ListAttr],
) -> Vec<usize> {
    let mut all = BTreeSet::new();
    for &index in selection {
        if list_index(blocks, index).is_none() {
            continue;
        }
        all.extend(ListWalker::new(
            blocks,
            index,
            WalkerOptions::backward()
                .same_indent()
                .higher_indent()
                .same_attributes(attrs),
        ));
        all.extend(ListWalker::new(
            blocks,
            index,
            WalkerOptions::forward()
                .include_self()
                .same_indent()
                .higher_indent()
                .same_attributes(attrs),
        ));
    }
    all.into_iter().collect()
}

pub fn is_single_list_item(blocks: &[Block], selection: &[usize]) -> bool {
    let mut ids = selection
        .iter()
        .map(|&index| blocks.get(index).and_then(Block::item_id));
    match ids.next() {
        Some(Some(first)) => ids.all(|id| id == Some(first)),
        _ => false,
    }
}

/// Nearest preceding block with a strictly smaller indent.
pub fn parent_block(blocks: &[Block], index: usize) -> Option<usize> {
    ListWalker::first(blocks, index, WalkerOptions::backward().lower_indent())
}

/// The block at the same indent right before the item of `index`.
pub fn previous_sibling(blocks: &[Block], index: usize, attrs: &[ListAttr]) -> Option<usize> {
    let first = blocks_of_item(blocks, index, ItemBlocks::Backward)
        .first()
        .copied()?;
    ListWalker::first(
        blocks,
        first,
        WalkerOptions::backward().same_indent().same_attributes(attrs),
    )
}

/// The range of contiguous list blocks containing `index`.
pub fn list_run(blocks: &[Block], index: usize) -> Option<Range<usize>> {
    list_index(blocks, index)?;
    let start = blocks[..index]
        .iter()
        .rposition(|block| !block.is_list_block())
        .map_or(0, |i| i + 1);
    let end = blocks[index..]
        .iter()
        .position(|block| !block.is_list_block())
        .map_or(blocks.len(), |i| index + i);
    Some(start..end)
}

/// Every maximal run of contiguous list blocks, in document order.
pub fn list_runs(blocks: &[Block]) -> Vec<Range<usize>> {
    let mut runs = Vec::new();
    let mut start = None;
    for (index, block) in blocks.iter().enumerate() {
        match (block.is_list_block(), start) {
            (true, None) => start = Some(index),
            (false, Some(s)) => {
                runs.push(s..index);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push(s..blocks.len());
    }
    runs
}

/// [`BlockId`] based access to the list queries.
#[derive(Clone, Copy)]
pub struct ListQuery<'a> {
    blocks: &'a [Block],
    positions: &'a HashMap<BlockId, usize>,
}

impl<'a> ListQuery<'a> {
    pub fn new(blocks: &'a [Block], positions: &'a HashMap<BlockId, usize>) -> Self {
        Self { blocks, positions }
    }

    pub fn blocks(&self) -> &'a [Block] {
        self.blocks
    }

    pub fn index_of(&self, id: BlockId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    fn ids(&self, indices: impl IntoIterator<Item = usize>) -> Vec<BlockId> {
        indices.into_iter().map(|i| self.blocks[i].id).collect()
    }

    fn indices(&self, ids: &[BlockId]) -> Vec<usize> {
        ids.iter().filter_map(|id| self.index_of(*id)).collect()
    }

    fn with_index<T: Default>(&self, id: BlockId, f: impl FnOnce(usize) -> T) -> T {
        self.index_of(id).map(f).unwrap_or_default()
    }

    pub fn blocks_of_item(&self, id: BlockId, side: ItemBlocks) -> Vec<BlockId> {
        self.with_index(id, |i| self.ids(blocks_of_item(self.blocks, i, side)))
    }

    pub fn nested_blocks_of(&self, id: BlockId) -> Vec<BlockId> {
        self.with_index(id, |i| self.ids(nested_blocks_of(self.blocks, i)))
    }

    pub fn sibling_items_of(&self, id: BlockId, attrs: &[ListAttr]) -> Vec<BlockId> {
        self.with_index(id, |i| self.ids(sibling_items_of(self.blocks, i, attrs)))
    }

    pub fn expand_to_complete_items(&self, selection: &[BlockId]) -> Vec<BlockId> {
        self.ids(expand_to_complete_items(self.blocks, &self.indices(selection)))
    }

    pub fn expand_to_complete_list(&self, selection: &[BlockId], attrs: &[ListAttr]) -> Vec<BlockId> {
        self.ids(expand_to_complete_list(
            self.blocks,
            &self.indices(selection),
            attrs,
        ))
    }

    pub fn is_single_list_item(&self, selection: &[BlockId]) -> bool {
        selection.iter().all(|id| self.index_of(*id).is_some())
            && is_single_list_item(self.blocks, &self.indices(selection))
    }

    pub fn is_first_block_of_item(&self, id: BlockId) -> bool {
        self.with_index(id, |i| is_first_block_of_item(self.blocks, i))
    }

    pub fn is_last_block_of_item(&self, id: BlockId) -> bool {
        self.with_index(id, |i| is_last_block_of_item(self.blocks, i))
    }

    pub fn parent_of(&self, id: BlockId) -> Option<BlockId> {
        let index = self.index_of(id)?;
        parent_block(self.blocks, index).map(|i| self.blocks[i].id)
    }

    pub fn previous_sibling_of(&self, id: BlockId, attrs: &[ListAttr]) -> Option<BlockId> {
        let index = self.index_of(id)?;
        previous_sibling(self.blocks, index, attrs).map(|i| self.blocks[i].id)
    }

    /// Blocks of the first item carrying `item`, in document order.
    pub fn item_blocks(&self, item: &ListItemId) -> Vec<BlockId> {
        self.blocks
            .iter()
            .position(|block| block.item_id() == Some(item))
            .map(|i| self.ids(blocks_of_item(self.blocks, i, ItemBlocks::Forward)))
            .unwrap_or_default()
    }
}
