use insta::assert_snapshot;
use listweave_engine::{
    Command, EditorOptions, IdSource, ListEditor, ModelPosition, export_markdown, import_markdown,
    read_document, to_html,
};
use listweave_engine::model::AttributeValue;
use listweave_engine::view::marker::TODO_ATTRIBUTE;
use pretty_assertions::assert_eq;

fn load(name: &str) -> ListEditor {
    let path = std::path::PathBuf::from(format!(
        "{}/tests/fixtures/{name}.md",
        env!("CARGO_MANIFEST_DIR")
    ));
    let content = read_document(&path).unwrap();
    let mut ids = IdSource::sequential("i");
    let blocks = import_markdown(&content, &mut ids);
    let options = EditorOptions {
        id_source: ids,
        ..EditorOptions::default()
    };
    ListEditor::from_blocks(options, blocks).unwrap()
}

fn id_of(editor: &ListEditor, text: &str) -> listweave_engine::BlockId {
    editor
        .blocks()
        .iter()
        .find(|block| block.content.text == text)
        .map(|block| block.id)
        .unwrap()
}

#[test]
fn fixture_groceries_outline_and_html() {
    let editor = load("groceries");

    assert!(editor.diagnostics().is_empty());
    assert_snapshot!(editor.view().outline(), @r#"
    h1 "Groceries"
    ul
      li i1
        p "Fruit"
        ul
          li i2
            p "Apples"
          li i3
            p "Pears"
      li i4
        p "Bread"
    ol
      li i5
        p "Preheat"
      li i6
        p "Bake"
        p "Let it cool."
    "#);
    assert_eq!(
        to_html(editor.view()),
        "<h1>Groceries</h1>\
         <ul><li><p>Fruit</p><ul><li><p>Apples</p></li><li><p>Pears</p></li></ul></li>\
         <li><p>Bread</p></li></ul>\
         <ol><li><p>Preheat</p></li><li><p>Bake</p><p>Let it cool.</p></li></ol>"
    );
}

#[test]
fn fixture_groceries_indent_and_export() {
    // Given the groceries document
    let mut editor = load("groceries");
    let bread = id_of(&editor, "Bread");

    // When indenting the last bulleted item
    let (outcome, summary) = editor.execute(&Command::Indent, &[bread]).unwrap();

    // Then it joins the nested fruit list and exports that way
    assert!(outcome.is_applied());
    assert!(summary.conversion.reconverted.is_empty());
    assert_eq!(
        export_markdown(editor.blocks()),
        "\
# Groceries

- Fruit
  - Apples
  - Pears
  - Bread

1. Preheat
2. Bake

   Let it cool.
"
    );
}

#[test]
fn fixture_tasks_markers() {
    let editor = load("tasks");

    assert_snapshot!(editor.view().outline(), @r#"
    ul
      li i1
        p todo="[ ]" "Write report"
      li i2
        p todo="[x]" "Send invoices"
        ul
          li i3
            p "Follow up"
    "#);

    // The checkbox occupies one view offset in front of the text
    let report = id_of(&editor, "Write report");
    let view = editor
        .position_map()
        .to_view(ModelPosition {
            block: report,
            offset: 0,
        })
        .unwrap();
    assert_eq!(view.offset, 1);
}

#[test]
fn fixture_tasks_toggle_checkbox() {
    // Given an unchecked task
    let mut editor = load("tasks");
    let report = id_of(&editor, "Write report");

    // When checking it
    let (outcome, summary) = editor
        .execute(
            &Command::SetMarker {
                attribute: TODO_ATTRIBUTE.into(),
                value: Some(AttributeValue::Bool(true)),
            },
            &[report],
        )
        .unwrap();

    // Then only that item is rebuilt and the markdown reflects it
    assert!(outcome.is_applied());
    assert_eq!(
        summary.conversion.reconverted,
        vec![listweave_engine::ListItemId::new("i1")]
    );
    assert_eq!(
        export_markdown(editor.blocks()),
        "- [x] Write report\n- [x] Send invoices\n  - Follow up\n"
    );
}
