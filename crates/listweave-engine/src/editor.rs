//! The editing session: store, post-fixer and converter wired together.
//!
//! Every change block runs the post-fixer on the blocks it touched before
//! committing, so the converter only ever sees a consistent sequence.

use std::sync::Arc;

use crate::error::{Diagnostic, EditError, StoreError};
use crate::lists::commands::{self, Command, CommandOutcome};
use crate::lists::{FixReport, ListQuery, PostFixer, postfix::DEFAULT_MAX_PASSES};
use crate::model::{
    AttributeSchema, Block, BlockId, BlockStore, ChangeBlock, ChangeFeed, IdSource, ListItemId,
    NewBlock,
};
use crate::view::{ConversionReport, Converter, MarkerRegistry, PositionMap, ViewTree};

#[derive(Debug, Clone)]
pub struct EditorOptions {
    pub max_fixer_passes: usize,
    pub id_source: IdSource,
    pub schema: AttributeSchema,
    pub markers: Arc<MarkerRegistry>,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            max_fixer_passes: DEFAULT_MAX_PASSES,
            id_source: IdSource::default(),
            schema: AttributeSchema::default(),
            markers: Arc::new(MarkerRegistry::with_builtins()),
        }
    }
}

/// Everything one committed change block did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSummary {
    /// Includes the post-fixer's writes.
    pub feed: ChangeFeed,
    pub fixed: FixReport,
    pub conversion: ConversionReport,
}

enum Rejected {
    Edit(EditError),
    NotApplied(CommandOutcome),
}

impl From<StoreError> for Rejected {
    fn from(err: StoreError) -> Self {
        Rejected::Edit(err.into())
    }
}

impl From<EditError> for Rejected {
    fn from(err: EditError) -> Self {
        Rejected::Edit(err)
    }
}

pub struct ListEditor {
    store: BlockStore,
    fixer: PostFixer,
    converter: Converter,
    diagnostics: Vec<Diagnostic>,
}

impl ListEditor {
    /// An editor over an empty document.
    pub fn new(options: EditorOptions) -> Self {
        let (schema, ids, fixer, converter) = Self::parts(options);
        Self {
            store: BlockStore::new(schema, ids),
            fixer,
            converter,
            diagnostics: Vec::new(),
        }
    }

    /// Loads `blocks`, repairs the whole document and converts it.
    pub fn from_blocks(options: EditorOptions, blocks: Vec<NewBlock>) -> Result<Self, StoreError> {
        let (schema, ids, fixer, converter) = Self::parts(options);
        let mut editor = Self {
            store: BlockStore::with_blocks(schema, ids, blocks)?,
            fixer,
            converter,
            diagnostics: Vec::new(),
        };

        let fixer = &editor.fixer;
        let (fixed, _) = editor.store.change(|tx| fixer.run_all(tx))?;
        editor.diagnostics.extend(fixed.diagnostics);

        let conversion = editor.converter.convert_all(editor.store.blocks());
        editor.diagnostics.extend(conversion.diagnostics);
        Ok(editor)
    }

    /// Marker trigger attributes become list-semantic in the schema.
    fn parts(options: EditorOptions) -> (AttributeSchema, IdSource, PostFixer, Converter) {
        let EditorOptions {
            max_fixer_passes,
            id_source,
            mut schema,
            markers,
        } = options;
        for attribute in markers.attributes() {
            schema.register_list_attribute(attribute);
        }
        (
            schema,
            id_source,
            PostFixer::new(max_fixer_passes),
            Converter::new(markers),
        )
    }

    /// Runs `f` in a change block followed by the post-fixer, then updates
    /// the view. When `f` fails nothing is changed.
    pub fn change<T, E>(
        &mut self,
        f: impl FnOnce(&mut ChangeBlock<'_>) -> Result<T, E>,
    ) -> Result<(T, ChangeSummary), E>
    where
        E: From<StoreError>,
    {
        let fixer = &self.fixer;
        let ((value, fixed), feed) = self.store.change(|tx| {
            let value = f(tx)?;
            let touched = tx.touched_blocks();
            let fixed = fixer.run(tx, &touched)?;
            Ok::<_, E>((value, fixed))
        })?;
        Ok((value, self.publish(feed, fixed)))
    }

    fn publish(&mut self, feed: ChangeFeed, fixed: FixReport) -> ChangeSummary {
        let conversion = self
            .converter
            .apply(self.store.blocks(), &feed.touched_blocks());
        self.diagnostics.extend(fixed.diagnostics.iter().cloned());
        self.diagnostics.extend(conversion.diagnostics.iter().cloned());
        ChangeSummary {
            feed,
            fixed,
            conversion,
        }
    }

    pub fn is_enabled(&self, command: &Command, selection: &[BlockId]) -> bool {
        commands::is_enabled(&self.store.query(), command, selection)
    }

    /// Runs `command` on `selection`. A command that is disabled or would
    /// only partially apply leaves the document untouched and returns
    /// [`CommandOutcome::NotApplied`] with an empty summary.
    pub fn execute(
        &mut self,
        command: &Command,
        selection: &[BlockId],
    ) -> Result<(CommandOutcome, ChangeSummary), EditError> {
        let result = self.change(|tx| match commands::execute(tx, command, selection)? {
            applied @ CommandOutcome::Applied { .. } => Ok(applied),
            not_applied => Err(Rejected::NotApplied(not_applied)),
        });
        match result {
            Ok(done) => Ok(done),
            Err(Rejected::NotApplied(outcome)) => {
                log::debug!("command {command:?} not applied: {outcome:?}");
                Ok((outcome, ChangeSummary::default()))
            }
            Err(Rejected::Edit(err)) => Err(err),
        }
    }

    /// Forces the item's subtree to be rebuilt, e.g. after a host-side
    /// presentation change the render key does not capture.
    pub fn reconvert_item(&mut self, item: &ListItemId) -> ConversionReport {
        self.converter.request_reconversion(item.clone());
        let report = self.converter.apply(self.store.blocks(), &[]);
        self.diagnostics.extend(report.diagnostics.iter().cloned());
        report
    }

    pub fn query(&self) -> ListQuery<'_> {
        self.store.query()
    }

    pub fn blocks(&self) -> &[Block] {
        self.store.blocks()
    }

    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    pub fn view(&self) -> &ViewTree {
        self.converter.tree()
    }

    pub fn markers(&self) -> &Arc<MarkerRegistry> {
        self.converter.markers()
    }

    pub fn position_map(&self) -> PositionMap {
        PositionMap::new(self.converter.tree())
    }

    /// Diagnostics collected since the editor was created or last drained.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lists::invariant_breaches;
    use crate::model::{AttributeValue, BlockContent, ContentKind, ListAttr, ListType};
    use crate::tests::fixture::{flat, parse};
    use crate::view::marker::TODO_ATTRIBUTE;
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;

    fn editor(doc: &str) -> ListEditor {
        let options = EditorOptions {
            id_source: IdSource::sequential("n"),
            ..EditorOptions::default()
        };
        ListEditor::from_blocks(options, parse(doc)).unwrap()
    }

    fn id_of(editor: &ListEditor, text: &str) -> BlockId {
        editor
            .blocks()
            .iter()
            .find(|block| block.content.text == text)
            .map(|block| block.id)
            .unwrap()
    }

    #[test]
    fn test_loading_repairs_and_converts() {
        let editor = editor(
            "\
  * A
      * B
",
        );
        assert_eq!(flat(editor.blocks()), "* A {a}\n  * B {b}\n");
        assert_snapshot!(editor.view().outline(), @r#"
        ul
          li a
            p "A"
            ul
              li b
                p "B"
        "#);
    }

    #[test]
    fn test_scenario_e_retype_reconverts_once() {
        // Given a three item bulleted list
        let mut editor = editor("* A\n* B\n* C\n");
        let b = id_of(&editor, "B");

        // When the middle item is retyped
        let (_, summary) = editor
            .change(|tx| {
                tx.set_list_attr(
                    b,
                    ListAttr::Type,
                    Some(AttributeValue::Text("numbered".into())),
                )
            })
            .unwrap();

        // Then exactly that item is reconverted and the list is split around it
        assert_eq!(summary.conversion.reconverted, vec![ListItemId::new("b")]);
        assert_snapshot!(editor.view().outline(), @r#"
        ul
          li a
            p "A"
        ol
          li b
            p "B"
        ul
          li c
            p "C"
        "#);
    }

    #[test]
    fn test_post_fixer_runs_before_conversion() {
        let mut editor = editor(
            "\
* A
  * B
    * C
",
        );
        let a = id_of(&editor, "A");

        let (_, summary) = editor.change(|tx| tx.remove(a)).unwrap();

        assert_eq!(summary.fixed.changed.len(), 2);
        assert!(summary.conversion.diagnostics.is_empty());
        assert_eq!(summary.conversion.removed_items, vec![ListItemId::new("a")]);
        assert!(invariant_breaches(editor.blocks()).is_empty());
        assert_eq!(flat(editor.blocks()), "* B {b}\n  * C {c}\n");
    }

    #[test]
    fn test_failed_change_leaves_everything_untouched() {
        let mut editor = editor("* A\n* B\n");
        let before = editor.view().clone();
        let a = id_of(&editor, "A");

        let result = editor.change(|tx| {
            tx.clear_list(a)?;
            Err::<(), _>(EditError::InvalidOperation("abort".into()))
        });

        assert!(result.is_err());
        assert_eq!(flat(editor.blocks()), "* A {a}\n* B {b}\n");
        assert_eq!(editor.view(), &before);
    }

    #[test]
    fn test_command_with_schema_rejection_is_not_applied() {
        let mut editor = editor("A\n");
        let (rule, _) = editor
            .change(|tx| {
                tx.insert(
                    1,
                    NewBlock::new(BlockContent::new(ContentKind::HorizontalRule, "")),
                )
            })
            .unwrap();
        let a = id_of(&editor, "A");

        let (outcome, summary) = editor
            .execute(&Command::ToggleList(ListType::Bulleted), &[a, rule])
            .unwrap();

        assert!(matches!(outcome, CommandOutcome::NotApplied { ref skipped } if skipped.len() == 1));
        assert!(summary.feed.is_empty());
        assert!(editor.blocks().iter().all(|block| !block.is_list_block()));
    }

    #[test]
    fn test_execute_applies_and_converts() {
        let mut editor = editor("* A\n* B\n");
        let b = id_of(&editor, "B");

        let (outcome, summary) = editor.execute(&Command::Indent, &[b]).unwrap();

        assert!(outcome.is_applied());
        assert!(summary.conversion.reconverted.is_empty());
        assert_snapshot!(editor.view().outline(), @r#"
        ul
          li a
            p "A"
            ul
              li b
                p "B"
        "#);
    }

    #[test]
    fn test_demoting_clears_marker_attributes() {
        let mut editor = editor("* A\n");
        let a = id_of(&editor, "A");
        editor
            .execute(
                &Command::SetMarker {
                    attribute: TODO_ATTRIBUTE.into(),
                    value: Some(AttributeValue::Bool(true)),
                },
                &[a],
            )
            .unwrap();
        assert!(editor.store().get(a).unwrap().extra(TODO_ATTRIBUTE).is_some());

        editor
            .execute(&Command::ToggleList(ListType::Bulleted), &[a])
            .unwrap();

        assert!(editor.store().get(a).unwrap().extra(TODO_ATTRIBUTE).is_none());
        assert_snapshot!(editor.view().outline(), @r#"p "A""#);
    }

    #[test]
    fn test_explicit_reconversion() {
        let mut editor = editor("* A\n* B\n");
        let before = editor.view().find_item(&ListItemId::new("a")).unwrap().view_id;

        let report = editor.reconvert_item(&ListItemId::new("a"));

        assert_eq!(report.reconverted, vec![ListItemId::new("a")]);
        assert_ne!(
            editor.view().find_item(&ListItemId::new("a")).unwrap().view_id,
            before
        );
    }
}
