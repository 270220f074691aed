//! Structural list edits.
//!
//! Each operation runs inside an open [`ChangeBlock`]. Caller contract
//! violations are detected before the first write and reported as
//! [`EditError`]s, so a failing call leaves the document untouched. Blocks
//! whose content kind refuses list attributes are skipped and reported in
//! [`EditOutcome::skipped`]; the rest of the batch is still applied.

use std::collections::{BTreeSet, HashSet};

use crate::error::{EditError, SchemaRejection, StoreError};
use crate::model::{Block, BlockId, ChangeBlock, ListAttributes};

use super::query::{self, ItemBlocks};

/// Blocks an edit mutated, in the order they were written, and the blocks
/// it had to skip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditOutcome {
    pub changed: Vec<BlockId>,
    pub skipped: Vec<SchemaRejection>,
}

impl EditOutcome {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.skipped.is_empty()
    }

    pub fn merge(&mut self, other: EditOutcome) {
        for id in other.changed {
            self.record(id);
        }
        self.skipped.extend(other.skipped);
    }

    pub(crate) fn record(&mut self, id: BlockId) {
        if !self.changed.contains(&id) {
            self.changed.push(id);
        }
    }
}

fn index_of(tx: &ChangeBlock<'_>, id: BlockId) -> Result<usize, EditError> {
    tx.index_of(id).ok_or(EditError::BlockNotFound(id))
}

fn list_of(tx: &ChangeBlock<'_>, id: BlockId) -> Result<ListAttributes, EditError> {
    let index = index_of(tx, id)?;
    tx.blocks()[index]
        .list
        .clone()
        .ok_or(EditError::NotAListBlock(id))
}

fn ids_at(blocks: &[Block], indices: impl IntoIterator<Item = usize>) -> Vec<BlockId> {
    indices.into_iter().map(|i| blocks[i].id).collect()
}

fn list_indices(tx: &ChangeBlock<'_>, blocks: &[BlockId]) -> Result<Vec<usize>, EditError> {
    if blocks.is_empty() {
        return Err(EditError::EmptySelection);
    }
    blocks
        .iter()
        .map(|&id| {
            list_of(tx, id)?;
            index_of(tx, id)
        })
        .collect()
}

pub(crate) fn write_list(
    tx: &mut ChangeBlock<'_>,
    id: BlockId,
    list: Option<ListAttributes>,
    outcome: &mut EditOutcome,
) -> Result<(), EditError> {
    match tx.set_list(id, list) {
        Ok(true) => outcome.record(id),
        Ok(false) => {}
        Err(StoreError::Schema(rejection)) => outcome.skipped.push(rejection),
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

/// Gives `block` and the later blocks of its item a fresh item id.
///
/// A no-op on the first block of an item.
pub fn split_item_before(
    tx: &mut ChangeBlock<'_>,
    block: BlockId,
) -> Result<EditOutcome, EditError> {
    list_of(tx, block)?;
    let index = index_of(tx, block)?;
    if query::is_first_block_of_item(tx.blocks(), index) {
        return Ok(EditOutcome::default());
    }
    assign_new_item_id(tx, block)
}

/// Gives `block` and the blocks of its item after it a fresh item id,
/// without checking where in the item `block` sits.
pub(crate) fn assign_new_item_id(
    tx: &mut ChangeBlock<'_>,
    block: BlockId,
) -> Result<EditOutcome, EditError> {
    let index = index_of(tx, block)?;
    let mut outcome = EditOutcome::default();
    let run = ids_at(
        tx.blocks(),
        query::blocks_of_item(tx.blocks(), index, ItemBlocks::Forward),
    );
    let item_id = tx.new_item_id();
    for id in run {
        let mut list = list_of(tx, id)?;
        list.item_id = item_id.clone();
        write_list(tx, id, Some(list), &mut outcome)?;
    }
    Ok(outcome)
}

/// Moves `block` and the rest of its item into the item of `preceding`,
/// overwriting all list attributes with the preceding item's. Plain blocks
/// are merged on their own.
///
/// `preceding` must be the item right before `block`, ignoring blocks nested
/// deeper than `preceding`.
pub fn merge_item_before(
    tx: &mut ChangeBlock<'_>,
    block: BlockId,
    preceding: BlockId,
) -> Result<EditOutcome, EditError> {
    let index = index_of(tx, block)?;
    let target = list_of(tx, preceding)?;
    let not_preceding = EditError::NotPreceding { block, preceding };

    let blocks = tx.blocks();
    let reached = blocks[..index]
        .iter()
        .rev()
        .find(|b| !b.indent().is_some_and(|indent| indent > target.indent));
    if reached.and_then(Block::item_id) != Some(&target.item_id)
        || blocks[index].item_id() == Some(&target.item_id)
    {
        return Err(not_preceding);
    }

    let run = if blocks[index].is_list_block() {
        ids_at(
            blocks,
            query::blocks_of_item(blocks, index, ItemBlocks::Forward),
        )
    } else {
        vec![block]
    };

    let mut outcome = EditOutcome::default();
    for id in run {
        write_list(tx, id, Some(target.clone()), &mut outcome)?;
    }
    Ok(outcome)
}

/// Shifts the indent of `blocks` by `indent_by`, carrying their nested
/// blocks along. With `expand`, partially selected items are completed
/// first.
///
/// A block without a parent counts as indent 0. Blocks whose resulting
/// indent would be negative are demoted to plain blocks.
pub fn indent_blocks(
    tx: &mut ChangeBlock<'_>,
    blocks: &[BlockId],
    indent_by: isize,
    expand: bool,
) -> Result<EditOutcome, EditError> {
    let indices = list_indices(tx, blocks)?;
    let doc = tx.blocks();

    let selected = if expand {
        query::expand_to_complete_items(doc, &indices)
    } else {
        indices
    };
    let mut all: BTreeSet<usize> = selected.iter().copied().collect();
    for &index in &selected {
        all.extend(query::descendants_after(doc, index));
    }

    let mut plan = Vec::with_capacity(all.len());
    for index in all {
        let Some(mut list) = doc[index].list.clone() else {
            continue;
        };
        let base = match query::parent_block(doc, index) {
            Some(_) => list.indent as isize,
            None => 0,
        };
        let indent = base + indent_by;
        let next = if indent < 0 {
            None
        } else {
            list.indent = indent as usize;
            Some(list)
        };
        plan.push((doc[index].id, next));
    }

    let mut outcome = EditOutcome::default();
    for (id, list) in plan {
        match list {
            Some(list) => write_list(tx, id, Some(list), &mut outcome)?,
            None => outcome.merge(remove_list_attributes(tx, &[id])?),
        }
    }
    Ok(outcome)
}

/// Outdents `blocks` by one level.
///
/// Items at the shallowest selected indent whose parent item continues
/// after them are merged into that parent item instead of becoming its
/// following sibling. Nested blocks move up by one level, keeping their
/// relative structure.
pub fn outdent_blocks_with_merge(
    tx: &mut ChangeBlock<'_>,
    blocks: &[BlockId],
) -> Result<EditOutcome, EditError> {
    let indices = list_indices(tx, blocks)?;
    let doc = tx.blocks();

    let expanded = query::expand_to_complete_items(doc, &indices);
    let mut all: BTreeSet<usize> = expanded.iter().copied().collect();
    for &index in &expanded {
        all.extend(query::descendants_after(doc, index));
    }

    let reference = all
        .iter()
        .filter_map(|&i| doc[i].indent())
        .min()
        .unwrap_or_default();
    let plan: Vec<(BlockId, Option<BlockId>)> = all
        .iter()
        .map(|&i| (doc[i].id, query::parent_block(doc, i).map(|p| doc[p].id)))
        .collect();

    let mut outcome = EditOutcome::default();
    let mut visited = HashSet::new();
    for (id, parent) in plan {
        if !visited.insert(id) {
            continue;
        }
        let mut list = list_of(tx, id)?;
        if list.indent == 0 {
            outcome.merge(remove_list_attributes(tx, &[id])?);
            continue;
        }

        if list.indent == reference
            && let Some(parent) = parent
        {
            let merged = merge_into_parent_if_not_last(tx, id, parent, &mut outcome)?;
            let was_merged = !merged.is_empty();
            visited.extend(merged);
            if was_merged {
                continue;
            }
        }

        list.indent -= 1;
        write_list(tx, id, Some(list), &mut outcome)?;
    }
    Ok(outcome)
}

fn merge_into_parent_if_not_last(
    tx: &mut ChangeBlock<'_>,
    block: BlockId,
    parent: BlockId,
    outcome: &mut EditOutcome,
) -> Result<Vec<BlockId>, EditError> {
    let doc = tx.blocks();
    let index = index_of(tx, block)?;
    let parent_index = index_of(tx, parent)?;
    let parent_list = list_of(tx, parent)?;

    if doc[index].item_id() == Some(&parent_list.item_id) {
        return Ok(Vec::new());
    }
    let parent_item = query::blocks_of_item(doc, parent_index, ItemBlocks::Both);
    if parent_item.last().is_none_or(|&last| last < index) {
        return Ok(Vec::new());
    }

    let run = ids_at(
        doc,
        query::blocks_of_item(doc, index, ItemBlocks::Forward),
    );
    for &id in &run {
        write_list(tx, id, Some(parent_list.clone()), outcome)?;
    }
    Ok(run)
}

/// Demotes `blocks` to plain blocks by clearing their list attributes and
/// any list-semantic extension attributes. Other attributes are kept.
pub fn remove_list_attributes(
    tx: &mut ChangeBlock<'_>,
    blocks: &[BlockId],
) -> Result<EditOutcome, EditError> {
    for &id in blocks {
        index_of(tx, id)?;
    }
    let extensions: Vec<String> = tx
        .schema()
        .extension_attributes()
        .map(str::to_string)
        .collect();

    let mut outcome = EditOutcome::default();
    for &id in blocks {
        write_list(tx, id, None, &mut outcome)?;
        for name in &extensions {
            if tx.remove_extra(id, name)? {
                outcome.record(id);
            }
        }
    }
    Ok(outcome)
}

/// Re-derives the indent of the list blocks following `after` (or the
/// document start) once `after` was demoted or the block after it removed.
///
/// Blocks deeper than what may follow `after` are shifted up so that the
/// shallowest of each orphaned run lands on the highest allowed level and
/// deeper blocks keep their offset from it. The walk ends at the first
/// block that needs no shift or at the end of the list.
pub fn outdent_following_items(
    tx: &mut ChangeBlock<'_>,
    after: Option<BlockId>,
) -> Result<EditOutcome, EditError> {
    let (start, ceiling) = match after {
        Some(id) => {
            let index = index_of(tx, id)?;
            let ceiling = tx.blocks()[index].indent().map_or(0, |indent| indent + 1);
            (index + 1, ceiling)
        }
        None => (0, 0),
    };

    let mut reference: Option<usize> = None;
    let mut plan = Vec::new();
    for block in &tx.blocks()[start.min(tx.blocks().len())..] {
        let Some(list) = &block.list else { break };
        if list.indent <= ceiling {
            break;
        }
        let shallowest = reference.map_or(list.indent, |r| r.min(list.indent));
        reference = Some(shallowest);

        let mut list = list.clone();
        list.indent = list.indent - shallowest + ceiling;
        plan.push((block.id, list));
    }

    let mut outcome = EditOutcome::default();
    for (id, list) in plan {
        write_list(tx, id, Some(list), &mut outcome)?;
    }
    Ok(outcome)
}
