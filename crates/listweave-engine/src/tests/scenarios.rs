//! End-to-end list editing workflows on small documents.

use crate::editor::{EditorOptions, ListEditor};
use crate::error::EditError;
use crate::lists::query::ItemBlocks;
use crate::lists::{edit, invariant_breaches};
use crate::model::{BlockStore, IdSource, ListType, NewBlock};
use pretty_assertions::assert_eq;

use super::fixture::{block_id, flat, parse, store_from};

fn editor_from(doc: &str) -> ListEditor {
    let options = EditorOptions {
        id_source: IdSource::sequential("n"),
        ..EditorOptions::default()
    };
    ListEditor::from_blocks(options, parse(doc)).unwrap()
}

fn edit_with<T>(
    store: &mut BlockStore,
    f: impl FnOnce(&mut crate::model::ChangeBlock<'_>) -> Result<T, EditError>,
) -> T {
    store.change(f).unwrap().0
}

#[test]
fn user_workflow_item_blocks_and_nested_blocks() {
    // Given an item made of two blocks with a nested item after them
    let store = store_from(
        "\
* A {a}
+ B {a}
  * C {b}
",
    );
    let (a, b, c) = (
        block_id(&store, "A"),
        block_id(&store, "B"),
        block_id(&store, "C"),
    );

    // When querying from either block of the item
    let query = store.query();

    // Then both blocks are found and the nested item is reported separately
    assert_eq!(query.blocks_of_item(a, ItemBlocks::Both), vec![a, b]);
    assert_eq!(query.blocks_of_item(b, ItemBlocks::Both), vec![a, b]);
    assert_eq!(query.nested_blocks_of(a), vec![c]);
    assert!(query.nested_blocks_of(c).is_empty());
}

#[test]
fn user_workflow_split_two_block_item() {
    // Given a two block item
    let mut store = store_from("* A {a}\n+ A2 {a}\n");
    let a2 = block_id(&store, "A2");

    // When splitting before its second block
    edit_with(&mut store, |tx| edit::split_item_before(tx, a2));

    // Then two single block items share indent and type under distinct ids
    assert_eq!(flat(store.blocks()), "* A {a}\n* A2 {n1}\n");
    let lists: Vec<_> = store
        .blocks()
        .iter()
        .filter_map(|block| block.list.as_ref())
        .collect();
    assert_ne!(lists[0].item_id, lists[1].item_id);
    assert_eq!(lists[0].indent, lists[1].indent);
    assert_eq!(lists[0].list_type, ListType::Bulleted);
    assert_eq!(lists[1].list_type, ListType::Bulleted);
}

#[test]
fn user_workflow_outdent_below_zero_demotes() {
    // Given an item at indent 1 with no parent before it
    let mut store = store_from("intro\n  * B\n");
    let b = block_id(&store, "B");

    // When outdenting it by one level
    let outcome = edit_with(&mut store, |tx| edit::indent_blocks(tx, &[b], -1, false));

    // Then it loses all list attributes
    assert_eq!(outcome.changed, vec![b]);
    assert_eq!(flat(store.blocks()), "intro\nB\n");
}

#[test]
fn user_workflow_removing_parent_lifts_children() {
    // Given a root item followed by two deeper levels
    let mut store = store_from(
        "\
* A
  * B
    * C
",
    );
    let a = block_id(&store, "A");

    // When the root item is removed and the followers re-derived
    edit_with(&mut store, |tx| {
        tx.remove(a)?;
        edit::outdent_following_items(tx, None)
    });

    // Then each follower moves up exactly one level
    assert_eq!(flat(store.blocks()), "* B {b}\n  * C {c}\n");
}

#[test]
fn user_workflow_merge_restores_split() {
    // Given an item split into two
    let mut store = store_from("* A {a}\n+ A2 {a}\n* Z\n");
    let (a, a2) = (block_id(&store, "A"), block_id(&store, "A2"));
    edit_with(&mut store, |tx| edit::split_item_before(tx, a2));

    // When merging the second part back
    edit_with(&mut store, |tx| edit::merge_item_before(tx, a2, a));

    // Then the original item is back
    assert_eq!(flat(store.blocks()), "* A {a}\n+ A2 {a}\n* Z {z}\n");
}

#[test]
fn user_workflow_merge_rejects_non_preceding_item() {
    let mut store = store_from("* A\n* B\n* C\n");
    let (a, c) = (block_id(&store, "A"), block_id(&store, "C"));

    let result = store.change(|tx| edit::merge_item_before(tx, c, a));

    assert!(matches!(result, Err(EditError::NotPreceding { .. })));
    assert_eq!(flat(store.blocks()), "* A {a}\n* B {b}\n* C {c}\n");
}

#[test]
fn user_workflow_move_item_out_of_nested_list() {
    // Given a three level list followed by two plain blocks
    let mut editor = editor_from(
        "\
* A
  * B
    * C
plain
plain2
",
    );
    let b = block_id(editor.store(), "B");

    // When moving the middle item past both plain blocks
    editor.change(|tx| tx.move_block(b, 4)).unwrap();

    // Then the child left behind is re-parented and the moved item starts at root
    assert_eq!(
        flat(editor.blocks()),
        "\
* A {a}
  * C {c}
plain
plain2
* B {b}
"
    );
    assert!(invariant_breaches(editor.blocks()).is_empty());
    assert!(editor.diagnostics().is_empty());
}

#[test]
fn user_workflow_insert_reusing_id_of_later_list() {
    // Given two lists separated by a plain block
    let mut editor = editor_from("* A {a}\nplain\n* B {x}\n");

    // When an item reusing the later list's id is inserted at the top
    editor
        .change(|tx| tx.insert(0, NewBlock::list_item("N", "x", 0, ListType::Bulleted)))
        .unwrap();

    // Then the later span gets a fresh id even though its list was not edited
    assert_eq!(
        flat(editor.blocks()),
        "* N {x}\n* A {a}\nplain\n* B {n1}\n"
    );
    assert!(invariant_breaches(editor.blocks()).is_empty());
    assert!(editor.diagnostics().is_empty());
}
