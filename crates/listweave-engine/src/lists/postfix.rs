//! Consistency post-fixer.
//!
//! Runs at the end of every change block, on the list runs around the
//! blocks the change touched, and repairs the flat model until it is
//! consistent again:
//!
//! 1. indent steps: a block may be at most one level deeper than the block
//!    before it,
//! 2. first block floor: the first block of a run sits at indent 0,
//! 3. item identity: the blocks of one item are contiguous and share one
//!    list type; a later span reusing an id gets a fresh one,
//! 4. item attributes: style, start and reversed are copied from an item's
//!    first block to the rest of it.
//!
//! The passes repeat while any of them reports a change, up to a pass cap.
//! Runs still inconsistent after the cap are demoted to plain blocks and a
//! diagnostic is reported instead of an error.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Range;

use crate::error::{Diagnostic, DiagnosticKind, StoreError};
use crate::model::{Block, BlockId, ChangeBlock, ListItemId, ListType};

use super::query::{self, ItemBlocks};

pub const DEFAULT_MAX_PASSES: usize = 8;

/// A broken list invariant found by [`invariant_breaches`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantBreach {
    IndentStep {
        block: BlockId,
        indent: usize,
        previous: usize,
    },
    FirstBlockIndent {
        block: BlockId,
        indent: usize,
    },
    SplitItem {
        block: BlockId,
        item: ListItemId,
    },
    ItemAttributes {
        block: BlockId,
        item: ListItemId,
    },
}

impl InvariantBreach {
    pub fn block(&self) -> BlockId {
        match self {
            InvariantBreach::IndentStep { block, .. }
            | InvariantBreach::FirstBlockIndent { block, .. }
            | InvariantBreach::SplitItem { block, .. }
            | InvariantBreach::ItemAttributes { block, .. } => *block,
        }
    }
}

/// Every list invariant the sequence breaks, in document order.
pub fn invariant_breaches(blocks: &[Block]) -> Vec<InvariantBreach> {
    let mut breaches = Vec::new();
    let mut items: HashMap<&ListItemId, (usize, usize)> = HashMap::new();

    for (index, block) in blocks.iter().enumerate() {
        let Some(list) = &block.list else { continue };

        match index.checked_sub(1).and_then(|i| blocks[i].list.as_ref()) {
            None if list.indent > 0 => breaches.push(InvariantBreach::FirstBlockIndent {
                block: block.id,
                indent: list.indent,
            }),
            Some(previous) if list.indent > previous.indent + 1 => {
                breaches.push(InvariantBreach::IndentStep {
                    block: block.id,
                    indent: list.indent,
                    previous: previous.indent,
                })
            }
            _ => {}
        }

        let Some(&(first, last)) = items.get(&list.item_id) else {
            items.insert(&list.item_id, (index, index));
            continue;
        };
        let Some(item) = &blocks[first].list else { continue };
        let connected = list.indent == item.indent
            && blocks[last + 1..index]
                .iter()
                .all(|b| b.indent().is_some_and(|indent| indent > item.indent));

        if !connected {
            breaches.push(InvariantBreach::SplitItem {
                block: block.id,
                item: list.item_id.clone(),
            });
        } else {
            if !list.same_item_properties(item) {
                breaches.push(InvariantBreach::ItemAttributes {
                    block: block.id,
                    item: list.item_id.clone(),
                });
            }
            items.insert(&list.item_id, (first, index));
        }
    }
    breaches
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixReport {
    /// Blocks the fixer wrote to, in first-write order.
    pub changed: Vec<BlockId>,
    /// Blocks demoted after the pass cap was reached.
    pub demoted: Vec<BlockId>,
    pub passes: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl FixReport {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.demoted.is_empty()
    }

    fn record(&mut self, ids: impl IntoIterator<Item = BlockId>) {
        for id in ids {
            if !self.changed.contains(&id) {
                self.changed.push(id);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct PostFixer {
    max_passes: usize,
}

impl Default for PostFixer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PASSES)
    }
}

impl PostFixer {
    pub fn new(max_passes: usize) -> Self {
        Self { max_passes }
    }

    pub fn max_passes(&self) -> usize {
        self.max_passes
    }

    /// Fixes the list runs around `touched`. Ids of blocks that no longer
    /// exist are ignored.
    pub fn run(
        &self,
        tx: &mut ChangeBlock<'_>,
        touched: &[BlockId],
    ) -> Result<FixReport, StoreError> {
        let blocks = tx.blocks();
        let mut runs = BTreeMap::new();
        for index in touched.iter().filter_map(|id| tx.index_of(*id)) {
            for around in [index.checked_sub(1), Some(index), Some(index + 1)] {
                if let Some(run) = around.and_then(|i| query::list_run(blocks, i)) {
                    runs.insert(run.start, run);
                }
            }
        }
        self.fix(tx, runs.into_values().collect())
    }

    /// Fixes every list run of the document.
    pub fn run_all(&self, tx: &mut ChangeBlock<'_>) -> Result<FixReport, StoreError> {
        let runs = query::list_runs(tx.blocks());
        self.fix(tx, runs)
    }

    fn fix(
        &self,
        tx: &mut ChangeBlock<'_>,
        runs: Vec<Range<usize>>,
    ) -> Result<FixReport, StoreError> {
        let mut report = FixReport::default();
        if runs.is_empty() {
            return Ok(report);
        }

        for pass in 0..self.max_passes {
            let mut changed = Vec::new();
            for run in &runs {
                changed.extend(fix_indents(tx, run.clone(), IndentFloor::PreviousStep)?);
            }
            for run in &runs {
                changed.extend(fix_indents(tx, run.clone(), IndentFloor::Root)?);
            }
            changed.extend(fix_item_ids(tx, &runs)?);
            for run in &runs {
                changed.extend(fix_item_attributes(tx, run.clone())?);
            }

            report.passes = pass + 1;
            if changed.is_empty() {
                break;
            }
            report.record(changed);
        }

        self.demote_broken_runs(tx, &runs, &mut report)?;
        log::debug!(
            "post-fixer: {} runs, {} passes, {} blocks changed, {} demoted",
            runs.len(),
            report.passes,
            report.changed.len(),
            report.demoted.len()
        );
        Ok(report)
    }

    fn demote_broken_runs(
        &self,
        tx: &mut ChangeBlock<'_>,
        runs: &[Range<usize>],
        report: &mut FixReport,
    ) -> Result<(), StoreError> {
        let blocks = tx.blocks();
        let mut broken = BTreeMap::new();
        for breach in invariant_breaches(blocks) {
            let Some(index) = tx.index_of(breach.block()) else {
                continue;
            };
            if let Some(run) = runs.iter().find(|run| run.contains(&index)) {
                broken.insert(run.start, run.clone());
            }
        }

        let broken: Vec<Vec<BlockId>> = broken
            .into_values()
            .map(|run| blocks[run].iter().map(|b| b.id).collect())
            .collect();
        let extensions: Vec<String> = tx
            .schema()
            .extension_attributes()
            .map(str::to_string)
            .collect();

        for ids in broken {
            log::warn!(
                "post-fixer did not converge within {} passes, demoting {} blocks",
                self.max_passes,
                ids.len()
            );
            report.diagnostics.push(Diagnostic::new(
                DiagnosticKind::InvariantViolation,
                ids.clone(),
                format!(
                    "list did not converge within {} post-fixer passes and was demoted",
                    self.max_passes
                ),
            ));
            for id in ids {
                tx.clear_list(id)?;
                for name in &extensions {
                    tx.remove_extra(id, name)?;
                }
                report.demoted.push(id);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndentFloor {
    /// The run's first block is accepted as is.
    PreviousStep,
    /// The run's first block must be at indent 0.
    Root,
}

/// Clamps blocks deeper than allowed, shifting each offending stretch up as
/// a whole so nested blocks keep their relative depth.
fn fix_indents(
    tx: &mut ChangeBlock<'_>,
    run: Range<usize>,
    floor: IndentFloor,
) -> Result<Vec<BlockId>, StoreError> {
    let blocks = tx.blocks();
    let Some(first) = blocks.get(run.start).and_then(Block::indent) else {
        return Ok(Vec::new());
    };
    let mut max_indent = match floor {
        IndentFloor::PreviousStep => first + 1,
        IndentFloor::Root => 0,
    };
    let mut previous: Option<usize> = None;
    let mut fix_by: Option<usize> = None;

    let mut plan = Vec::new();
    for block in &blocks[run] {
        let Some(indent) = block.indent() else { break };
        if indent > max_indent {
            let mut fixed = match fix_by {
                None => {
                    fix_by = Some(indent - max_indent);
                    max_indent
                }
                Some(by) => {
                    let by = by.min(indent);
                    fix_by = Some(by);
                    indent - by
                }
            };
            if let Some(previous) = previous
                && fixed > previous + 1
            {
                fixed = previous + 1;
            }
            plan.push((block.id, fixed));
            previous = Some(fixed);
        } else {
            fix_by = None;
            max_indent = indent + 1;
            previous = Some(indent);
        }
    }

    let mut changed = Vec::new();
    for (id, indent) in plan {
        if tx.update_list(id, |list| list.indent = indent)? {
            changed.push(id);
        }
    }
    Ok(changed)
}

enum FreshId {
    Keep(ListItemId),
    Fresh,
}

/// Gives a fresh id to every item span reusing an id already seen earlier
/// in the document, and to the part of an item whose list type differs
/// from the blocks before it.
fn fix_item_ids(
    tx: &mut ChangeBlock<'_>,
    runs: &[Range<usize>],
) -> Result<Vec<BlockId>, StoreError> {
    let blocks = tx.blocks();
    let mut seen: HashSet<&ListItemId> = HashSet::new();
    let mut visited = HashSet::new();
    let mut segments: Vec<(FreshId, Vec<(BlockId, bool)>)> = Vec::new();

    for (index, block) in blocks.iter().enumerate() {
        let Some(list) = &block.list else { continue };
        if visited.contains(&index) {
            continue;
        }
        let examined = runs.iter().any(|run| run.contains(&index));

        let mut id = if seen.contains(&list.item_id) {
            FreshId::Fresh
        } else {
            FreshId::Keep(list.item_id.clone())
        };
        seen.insert(&list.item_id);

        let mut list_type: &ListType = &list.list_type;
        let mut members = Vec::new();
        for member in query::blocks_of_item(blocks, index, ItemBlocks::Forward) {
            visited.insert(member);
            let Some(member_list) = &blocks[member].list else { continue };
            if &member_list.list_type != list_type {
                segments.push((std::mem::replace(&mut id, FreshId::Fresh), members));
                members = Vec::new();
                list_type = &member_list.list_type;
            }
            members.push((blocks[member].id, examined));
        }
        segments.push((id, members));
    }

    // Duplicates are renamed even outside the examined runs.
    let mut changed = Vec::new();
    for (id, members) in segments {
        if matches!(id, FreshId::Keep(_)) && members.iter().all(|(_, examined)| !examined) {
            continue;
        }
        let id = match id {
            FreshId::Keep(id) => id,
            FreshId::Fresh => tx.new_item_id(),
        };
        for (block, _) in members {
            if tx.update_list(block, |list| list.item_id = id.clone())? {
                changed.push(block);
            }
        }
    }
    Ok(changed)
}

/// Copies the item-level attributes of each item's first block to the
/// rest of the item.
fn fix_item_attributes(
    tx: &mut ChangeBlock<'_>,
    run: Range<usize>,
) -> Result<Vec<BlockId>, StoreError> {
    let blocks = tx.blocks();
    let mut visited = HashSet::new();
    let mut plan = Vec::new();

    for index in run {
        if visited.contains(&index) {
            continue;
        }
        let Some(first) = &blocks[index].list else { continue };
        for member in query::blocks_of_item(blocks, index, ItemBlocks::Forward) {
            visited.insert(member);
            if let Some(list) = &blocks[member].list
                && !list.same_item_properties(first)
            {
                plan.push((blocks[member].id, first.clone()));
            }
        }
    }

    let mut changed = Vec::new();
    for (id, first) in plan {
        if tx.update_list(id, |list| list.copy_item_properties(&first))? {
            changed.push(id);
        }
    }
    Ok(changed)
}
