//! Editing commands a host binds to toolbar buttons and keys.
//!
//! A command works on a selection of blocks inside one change block. When
//! an edit has to skip blocks because of the schema the command reports
//! [`CommandOutcome::NotApplied`] and the caller discards the change block,
//! so the document is either fully updated or left alone.

use crate::error::{EditError, SchemaRejection};
use crate::model::{AttributeValue, BlockId, ChangeBlock, ListAttr, ListAttributes, ListType};

use super::edit::{self, EditOutcome};
use super::query::{self, ItemBlocks, ListQuery};
use super::walker::{ListWalker, WalkerOptions};

/// Presentation attributes set through the list properties panel.
/// `start` and `reversed` only apply to ordered lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListProperties {
    pub style: Option<String>,
    pub start: Option<u32>,
    pub reversed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Turn the selection into items of the given type, or back into plain
    /// blocks when it already is one.
    ToggleList(ListType),
    Indent,
    Outdent,
    /// Split the item before the first selected block.
    SplitItem,
    /// Merge the item of the first selected block into the item before it.
    MergeBackward,
    SetListProperties(ListProperties),
    SetMarker {
        attribute: String,
        value: Option<AttributeValue>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Applied { changed: Vec<BlockId> },
    NotApplied { skipped: Vec<SchemaRejection> },
}

impl CommandOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, CommandOutcome::Applied { .. })
    }
}

fn selected(query: &ListQuery<'_>, selection: &[BlockId]) -> Vec<BlockId> {
    let mut found: Vec<(usize, BlockId)> = selection
        .iter()
        .filter_map(|&id| query.index_of(id).map(|index| (index, id)))
        .collect();
    found.sort();
    found.dedup();
    found.into_iter().map(|(_, id)| id).collect()
}

fn selected_list_blocks(query: &ListQuery<'_>, selection: &[BlockId]) -> Vec<BlockId> {
    selected(query, selection)
        .into_iter()
        .filter(|&id| {
            query
                .index_of(id)
                .is_some_and(|index| query.blocks()[index].is_list_block())
        })
        .collect()
}

fn splits_inside_item(query: &ListQuery<'_>, blocks: &[BlockId]) -> bool {
    query.is_single_list_item(blocks)
        && blocks
            .first()
            .is_some_and(|&first| !query.is_first_block_of_item(first))
}

fn merge_target(query: &ListQuery<'_>, block: BlockId) -> Option<BlockId> {
    let index = query.index_of(block)?;
    let blocks = query.blocks();
    ListWalker::first(
        blocks,
        index,
        WalkerOptions::backward().same_indent().lower_indent(),
    )
    .map(|i| blocks[i].id)
}

pub fn is_enabled(query: &ListQuery<'_>, command: &Command, selection: &[BlockId]) -> bool {
    let list_blocks = selected_list_blocks(query, selection);
    match command {
        Command::ToggleList(_) => !selected(query, selection).is_empty(),
        Command::Indent => {
            if list_blocks.is_empty() {
                return false;
            }
            if splits_inside_item(query, &list_blocks) {
                return true;
            }
            let expanded = query.expand_to_complete_items(&list_blocks);
            expanded.first().is_some_and(|&first| {
                query
                    .previous_sibling_of(first, &[ListAttr::Type])
                    .is_some()
            })
        }
        Command::Outdent | Command::SetListProperties(_) | Command::SetMarker { .. } => {
            !list_blocks.is_empty()
        }
        Command::SplitItem => list_blocks
            .first()
            .is_some_and(|&first| !query.is_first_block_of_item(first)),
        Command::MergeBackward => list_blocks.first().is_some_and(|&first| {
            query.is_first_block_of_item(first) && merge_target(query, first).is_some()
        }),
    }
}

/// Runs `command` on `selection`.
///
/// Disabled commands and commands that hit a schema rejection return
/// [`CommandOutcome::NotApplied`]; in the latter case the change block holds
/// partial writes and must be discarded by the caller.
pub fn execute(
    tx: &mut ChangeBlock<'_>,
    command: &Command,
    selection: &[BlockId],
) -> Result<CommandOutcome, EditError> {
    if !is_enabled(&tx.query(), command, selection) {
        return Ok(CommandOutcome::NotApplied {
            skipped: Vec::new(),
        });
    }

    let outcome = match command {
        Command::ToggleList(list_type) => toggle_list(tx, list_type, selection)?,
        Command::Indent => indent(tx, selection)?,
        Command::Outdent => outdent(tx, selection)?,
        Command::SplitItem => {
            let blocks = selected_list_blocks(&tx.query(), selection);
            edit::split_item_before(tx, blocks[0])?
        }
        Command::MergeBackward => {
            let blocks = selected_list_blocks(&tx.query(), selection);
            let target = merge_target(&tx.query(), blocks[0])
                .ok_or_else(|| EditError::InvalidOperation("nothing to merge into".into()))?;
            edit::merge_item_before(tx, blocks[0], target)?
        }
        Command::SetListProperties(properties) => {
            set_list_properties(tx, properties, selection)?
        }
        Command::SetMarker { attribute, value } => {
            set_marker(tx, attribute, value.as_ref(), selection)?
        }
    };

    if outcome.skipped.is_empty() {
        Ok(CommandOutcome::Applied {
            changed: outcome.changed,
        })
    } else {
        Ok(CommandOutcome::NotApplied {
            skipped: outcome.skipped,
        })
    }
}

fn toggle_list(
    tx: &mut ChangeBlock<'_>,
    list_type: &ListType,
    selection: &[BlockId],
) -> Result<EditOutcome, EditError> {
    let blocks = selected(&tx.query(), selection);
    let turn_off = blocks
        .iter()
        .all(|&id| tx.get(id).and_then(|b| b.list_type()) == Some(list_type));
    let mut outcome = EditOutcome::default();

    if turn_off {
        let Some(&last) = blocks.last() else {
            return Ok(outcome);
        };
        let following = tx.query().blocks_of_item(last, ItemBlocks::Forward);
        if let Some(&next) = following.get(1) {
            outcome.merge(edit::split_item_before(tx, next)?);
        }
        outcome.merge(edit::remove_list_attributes(tx, &blocks)?);
        outcome.merge(edit::outdent_following_items(tx, Some(last))?);
        return Ok(outcome);
    }

    let single_list_block =
        blocks.len() == 1 && tx.get(blocks[0]).is_some_and(|b| b.is_list_block());
    if single_list_block {
        let siblings = tx.query().sibling_items_of(blocks[0], &[ListAttr::Type]);
        for id in siblings {
            set_type(tx, id, list_type, &mut outcome)?;
        }
        return Ok(outcome);
    }

    for id in blocks {
        let Some(index) = tx.index_of(id) else { continue };
        if tx.blocks()[index].is_list_block() {
            let item = query::expand_to_complete_items(tx.blocks(), &[index]);
            let ids: Vec<BlockId> = item.iter().map(|&i| tx.blocks()[i].id).collect();
            for member in ids {
                set_type(tx, member, list_type, &mut outcome)?;
            }
        } else {
            let indent = index
                .checked_sub(1)
                .and_then(|previous| tx.blocks()[previous].indent())
                .unwrap_or_default();
            let item_id = tx.new_item_id();
            let list = ListAttributes::new(item_id, indent, list_type.clone());
            edit::write_list(tx, id, Some(list), &mut outcome)?;
        }
    }
    Ok(outcome)
}

fn set_type(
    tx: &mut ChangeBlock<'_>,
    id: BlockId,
    list_type: &ListType,
    outcome: &mut EditOutcome,
) -> Result<(), EditError> {
    let Some(mut list) = tx.get(id).and_then(|b| b.list.clone()) else {
        return Ok(());
    };
    if &list.list_type == list_type {
        return Ok(());
    }
    list.list_type = list_type.clone();
    edit::write_list(tx, id, Some(list), outcome)
}

fn indent(tx: &mut ChangeBlock<'_>, selection: &[BlockId]) -> Result<EditOutcome, EditError> {
    let blocks = selected_list_blocks(&tx.query(), selection);
    let mut outcome = if splits_inside_item(&tx.query(), &blocks) {
        let mut outcome = edit::indent_blocks(tx, &blocks, 1, false)?;
        outcome.merge(edit::assign_new_item_id(tx, blocks[0])?);
        outcome
    } else {
        edit::indent_blocks(tx, &blocks, 1, true)?
    };
    align_with_previous_sibling(tx, &mut outcome)?;
    Ok(outcome)
}

fn outdent(tx: &mut ChangeBlock<'_>, selection: &[BlockId]) -> Result<EditOutcome, EditError> {
    let blocks = selected_list_blocks(&tx.query(), selection);
    let mut outcome = if splits_inside_item(&tx.query(), &blocks) {
        edit::split_item_before(tx, blocks[0])?
    } else {
        edit::outdent_blocks_with_merge(tx, &blocks)?
    };
    align_with_previous_sibling(tx, &mut outcome)?;
    Ok(outcome)
}

/// Gives each changed list block the type of the block before it at the
/// same indent, so moved items join the list they land in.
fn align_with_previous_sibling(
    tx: &mut ChangeBlock<'_>,
    outcome: &mut EditOutcome,
) -> Result<(), EditError> {
    for id in outcome.changed.clone() {
        let Some(index) = tx.index_of(id) else { continue };
        let blocks = tx.blocks();
        let Some(previous) = ListWalker::first(blocks, index, WalkerOptions::backward().same_indent())
        else {
            continue;
        };
        let Some(list_type) = blocks[previous].list_type().cloned() else {
            continue;
        };
        set_type(tx, id, &list_type, outcome)?;
    }
    Ok(())
}

fn set_list_properties(
    tx: &mut ChangeBlock<'_>,
    properties: &ListProperties,
    selection: &[BlockId],
) -> Result<EditOutcome, EditError> {
    let query = tx.query();
    let mut targets: Vec<BlockId> = Vec::new();
    for id in selected_list_blocks(&query, selection) {
        for sibling in query.sibling_items_of(id, &[ListAttr::Type]) {
            if !targets.contains(&sibling) {
                targets.push(sibling);
            }
        }
    }

    let mut outcome = EditOutcome::default();
    for id in targets {
        let Some(mut list) = tx.get(id).and_then(|b| b.list.clone()) else {
            continue;
        };
        list.style = properties.style.clone();
        if list.list_type.is_ordered() {
            list.start = properties.start;
            list.reversed = properties.reversed;
        }
        edit::write_list(tx, id, Some(list), &mut outcome)?;
    }
    Ok(outcome)
}

fn set_marker(
    tx: &mut ChangeBlock<'_>,
    attribute: &str,
    value: Option<&AttributeValue>,
    selection: &[BlockId],
) -> Result<EditOutcome, EditError> {
    let query = tx.query();
    let targets = query.expand_to_complete_items(&selected_list_blocks(&query, selection));

    let mut outcome = EditOutcome::default();
    for id in targets {
        if tx.set_extra(id, attribute, value.cloned())? {
            outcome.record(id);
        }
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BlockContent, BlockStore, ContentKind, NewBlock};
    use crate::tests::fixture::{block_id, flat, store_from};
    use pretty_assertions::assert_eq;

    fn run(store: &mut BlockStore, command: Command, selection: &[&str]) -> CommandOutcome {
        let ids: Vec<BlockId> = selection.iter().map(|text| block_id(store, text)).collect();
        let (outcome, _) = store
            .change(|tx| execute(tx, &command, &ids))
            .unwrap();
        outcome
    }

    #[test]
    fn test_toggle_on_plain_blocks_creates_items() {
        let mut store = store_from("A\nB\n");
        let outcome = run(&mut store, Command::ToggleList(ListType::Numbered), &["A", "B"]);
        assert!(outcome.is_applied());
        assert_eq!(flat(store.blocks()), "# A {n1}\n# B {n2}\n");
    }

    #[test]
    fn test_toggle_on_plain_block_after_nested_item_joins_its_level() {
        let mut store = store_from(
            "\
* A
  * B
C
",
        );
        run(&mut store, Command::ToggleList(ListType::Bulleted), &["C"]);
        assert_eq!(
            flat(store.blocks()),
            "\
* A {a}
  * B {b}
  * C {n1}
"
        );
    }

    #[test]
    fn test_toggle_off_demotes_and_outdents_followers() {
        let mut store = store_from(
            "\
* A
  * B
    * C
    * D
* E
",
        );
        run(&mut store, Command::ToggleList(ListType::Bulleted), &["B"]);
        assert_eq!(
            flat(store.blocks()),
            "\
* A {a}
B
* C {c}
* D {d}
* E {e}
"
        );
    }

    #[test]
    fn test_toggle_off_splits_rest_of_item() {
        let mut store = store_from(
            "\
* A
+ A2
+ A3
",
        );
        run(&mut store, Command::ToggleList(ListType::Bulleted), &["A2"]);
        assert_eq!(flat(store.blocks()), "* A {a}\nA2\n* A3 {n1}\n");
    }

    #[test]
    fn test_toggle_other_type_on_single_block_retypes_its_list() {
        let mut store = store_from(
            "\
* A
  * A1
* B
",
        );
        run(&mut store, Command::ToggleList(ListType::Numbered), &["B"]);
        assert_eq!(
            flat(store.blocks()),
            "\
# A {a}
  * A1 {a1}
# B {b}
"
        );
    }

    #[test]
    fn test_indent_nests_under_previous_sibling_and_adopts_type() {
        let mut store = store_from(
            "\
* A
  # A1
* B
",
        );
        let outcome = run(&mut store, Command::Indent, &["B"]);
        assert!(outcome.is_applied());
        assert_eq!(
            flat(store.blocks()),
            "\
* A {a}
  # A1 {a1}
  # B {b}
"
        );
    }

    #[test]
    fn test_indent_first_item_is_disabled() {
        let mut store = store_from("* A\n* B\n");
        let outcome = run(&mut store, Command::Indent, &["A"]);
        assert_eq!(outcome, CommandOutcome::NotApplied { skipped: vec![] });
        assert_eq!(flat(store.blocks()), "* A {a}\n* B {b}\n");
    }

    #[test]
    fn test_indent_inside_item_creates_sub_item() {
        let mut store = store_from(
            "\
* A
+ A2
+ A3
",
        );
        run(&mut store, Command::Indent, &["A2"]);
        assert_eq!(
            flat(store.blocks()),
            "\
* A {a}
  * A2 {n1}
+ A3 {a}
"
        );
    }

    #[test]
    fn test_outdent_inside_item_only_splits() {
        let mut store = store_from("* A\n+ A2\n");
        run(&mut store, Command::Outdent, &["A2"]);
        assert_eq!(flat(store.blocks()), "* A {a}\n* A2 {n1}\n");
    }

    #[test]
    fn test_outdent_moves_item_up() {
        let mut store = store_from(
            "\
* A
  * B
",
        );
        run(&mut store, Command::Outdent, &["B"]);
        assert_eq!(flat(store.blocks()), "* A {a}\n* B {b}\n");
    }

    #[test]
    fn test_merge_backward_into_previous_item() {
        let mut store = store_from("* A\n* B\n");
        run(&mut store, Command::MergeBackward, &["B"]);
        assert_eq!(flat(store.blocks()), "* A {a}\n+ B {a}\n");
    }

    #[test]
    fn test_merge_backward_on_first_item_is_disabled() {
        let store = store_from("* A\n* B\n");
        let a = block_id(&store, "A");
        assert!(!is_enabled(&store.query(), &Command::MergeBackward, &[a]));
        assert!(!is_enabled(&store.query(), &Command::SplitItem, &[a]));
    }

    #[test]
    fn test_split_item_command() {
        let mut store = store_from("* A\n+ A2\n");
        run(&mut store, Command::SplitItem, &["A2"]);
        assert_eq!(flat(store.blocks()), "* A {a}\n* A2 {n1}\n");
    }

    #[test]
    fn test_set_list_properties_targets_same_level_items() {
        let mut store = store_from(
            "\
# A
  # A1
# B
",
        );
        run(
            &mut store,
            Command::SetListProperties(ListProperties {
                style: Some("lower-roman".into()),
                start: Some(3),
                reversed: None,
            }),
            &["B"],
        );
        let start = |text: &str| {
            store
                .get(block_id(&store, text))
                .and_then(|b| b.list.as_ref())
                .and_then(|l| l.start)
        };
        assert_eq!(start("A"), Some(3));
        assert_eq!(start("B"), Some(3));
        assert_eq!(start("A1"), None);
    }

    #[test]
    fn test_set_marker_covers_whole_item() {
        let mut store = store_from("* A\n+ A2\n* B\n");
        let outcome = run(
            &mut store,
            Command::SetMarker {
                attribute: "todoChecked".into(),
                value: Some(AttributeValue::Bool(true)),
            },
            &["A"],
        );
        assert_eq!(
            outcome,
            CommandOutcome::Applied {
                changed: vec![block_id(&store, "A"), block_id(&store, "A2")]
            }
        );
    }

    #[test]
    fn test_schema_rejection_reports_not_applied() {
        let mut store = store_from("A\n");
        let rule = store
            .change(|tx| {
                tx.insert(
                    1,
                    NewBlock::new(BlockContent::new(ContentKind::HorizontalRule, "")),
                )
            })
            .unwrap()
            .0;
        let a = block_id(&store, "A");

        let result = store.change(|tx| {
            match execute(tx, &Command::ToggleList(ListType::Bulleted), &[a, rule])? {
                CommandOutcome::NotApplied { skipped } => Err(EditError::InvalidOperation(
                    format!("{} blocks skipped", skipped.len()),
                )),
                applied => Ok(applied),
            }
        });

        assert_eq!(
            result,
            Err(EditError::InvalidOperation("1 blocks skipped".into()))
        );
        assert!(store.blocks().iter().all(|block| !block.is_list_block()));
    }
}
