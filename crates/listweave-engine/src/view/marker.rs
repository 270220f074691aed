//! Per-item decorations contributed by extensions.
//!
//! A strategy is looked up by the attribute that triggers it. The registry
//! is assembled once at setup and shared read-only afterwards, so every
//! closure it holds is `Send + Sync`.

use std::fmt;

use crate::error::RegistryError;
use crate::model::{AttributeValue, Block, ListItemId, ListType};

use super::tree::MarkerNode;

/// Where a marker node is placed relative to the content it decorates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// A sibling rendered right before the content block.
    Before,
    /// Interleaved at the start of the content block's flow.
    Inside,
}

/// Which block of a multi-block item carries the marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MarkerTarget {
    #[default]
    FirstBlock,
    LastBlock,
}

/// What a strategy may look at when deciding about one item.
#[derive(Debug, Clone, Copy)]
pub struct ItemContext<'a> {
    pub item_id: &'a ListItemId,
    pub list_type: &'a ListType,
    pub indent: usize,
    /// The block selected by the strategy's [`MarkerTarget`].
    pub block: &'a Block,
}

type Factory = Box<dyn Fn(&AttributeValue, &ItemContext<'_>) -> Option<String> + Send + Sync>;
type InsidePredicate = Box<dyn Fn(&ItemContext<'_>) -> bool + Send + Sync>;
type ViewLength = Box<dyn Fn(&str) -> usize + Send + Sync>;

pub struct MarkerDescriptor {
    name: String,
    attribute: String,
    priority: i32,
    target: MarkerTarget,
    factory: Factory,
    inside: InsidePredicate,
    view_length: ViewLength,
}

impl MarkerDescriptor {
    /// A strategy named `name`, triggered by `attribute`, rendering the text
    /// returned by `factory`. Defaults: priority 0, first block, placed
    /// before the content, zero view length.
    pub fn new(
        name: impl Into<String>,
        attribute: impl Into<String>,
        factory: impl Fn(&AttributeValue, &ItemContext<'_>) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            attribute: attribute.into(),
            priority: 0,
            target: MarkerTarget::default(),
            factory: Box::new(factory),
            inside: Box::new(|_| false),
            view_length: Box::new(|_| 0),
        }
    }

    /// Lower priorities are materialized first.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn target(mut self, target: MarkerTarget) -> Self {
        self.target = target;
        self
    }

    pub fn inside(
        mut self,
        predicate: impl Fn(&ItemContext<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.inside = Box::new(predicate);
        self
    }

    /// Number of view positions an inside marker occupies in front of the
    /// content text.
    pub fn view_length(mut self, length: impl Fn(&str) -> usize + Send + Sync + 'static) -> Self {
        self.view_length = Box::new(length);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn marker_target(&self) -> MarkerTarget {
        self.target
    }

    /// The marker for the item described by `ctx`, or `None` when the
    /// target block does not carry the trigger attribute.
    pub fn materialize(&self, ctx: &ItemContext<'_>) -> Option<MarkerNode> {
        let value = ctx.block.extra(&self.attribute)?;
        let text = (self.factory)(value, ctx)?;
        let placement = if (self.inside)(ctx) {
            Placement::Inside
        } else {
            Placement::Before
        };
        let view_length = match placement {
            Placement::Inside => (self.view_length)(&text),
            Placement::Before => 0,
        };
        Some(MarkerNode {
            strategy: self.name.clone(),
            text,
            placement,
            view_length,
        })
    }
}

impl fmt::Debug for MarkerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkerDescriptor")
            .field("name", &self.name)
            .field("attribute", &self.attribute)
            .field("priority", &self.priority)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

pub const TODO_ATTRIBUTE: &str = "todoChecked";
pub const GLYPH_ATTRIBUTE: &str = "listMarkerGlyph";

/// Checkbox rendered inside the first block of any item.
pub fn todo_marker() -> MarkerDescriptor {
    MarkerDescriptor::new("todo", TODO_ATTRIBUTE, |value, _| {
        let checked = value.as_bool()?;
        Some(if checked { "[x]" } else { "[ ]" }.to_string())
    })
    .priority(10)
    .inside(|_| true)
    .view_length(|_| 1)
}

/// Custom bullet glyph. Top-level bulleted items take it inline, everything
/// else gets it as a sibling before the content.
pub fn glyph_marker() -> MarkerDescriptor {
    MarkerDescriptor::new("glyph", GLYPH_ATTRIBUTE, |value, _| {
        value.as_text().map(str::to_string)
    })
    .priority(20)
    .inside(|ctx| *ctx.list_type == ListType::Bulleted && ctx.indent == 0)
}

/// Immutable-after-setup collection of marker strategies, ordered by
/// priority and then by name.
#[derive(Debug, Default)]
pub struct MarkerRegistry {
    strategies: Vec<MarkerDescriptor>,
}

impl MarkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the `todo` and `glyph` strategies.
    pub fn with_builtins() -> Self {
        Self {
            strategies: vec![todo_marker(), glyph_marker()],
        }
    }

    pub fn register(&mut self, descriptor: MarkerDescriptor) -> Result<(), RegistryError> {
        if self.get(descriptor.name()).is_some() {
            return Err(RegistryError::DuplicateStrategy(descriptor.name));
        }
        if let Some(owner) = self
            .strategies
            .iter()
            .find(|s| s.attribute == descriptor.attribute)
        {
            return Err(RegistryError::DuplicateAttribute {
                attribute: descriptor.attribute,
                strategy: owner.name.clone(),
            });
        }

        let at = self
            .strategies
            .iter()
            .position(|s| (s.priority, &s.name) > (descriptor.priority, &descriptor.name))
            .unwrap_or(self.strategies.len());
        self.strategies.insert(at, descriptor);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&MarkerDescriptor> {
        self.strategies.iter().find(|s| s.name == name)
    }

    pub fn strategies(&self) -> impl Iterator<Item = &MarkerDescriptor> {
        self.strategies.iter()
    }

    /// Trigger attributes of every registered strategy.
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.strategies.iter().map(|s| s.attribute.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BlockContent, BlockId, ListAttributes};
    use std::collections::BTreeMap;

    fn block_with(extra: &[(&str, AttributeValue)]) -> Block {
        Block {
            id: BlockId(1),
            content: BlockContent::paragraph("A"),
            list: Some(ListAttributes::new("a", 0, ListType::Bulleted)),
            extra: extra
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn context<'a>(block: &'a Block, list_type: &'a ListType, indent: usize) -> ItemContext<'a> {
        ItemContext {
            item_id: block.item_id().unwrap(),
            list_type,
            indent,
            block,
        }
    }

    #[test]
    fn test_todo_marker_is_always_inside() {
        let block = block_with(&[(TODO_ATTRIBUTE, AttributeValue::Bool(true))]);
        let marker = todo_marker()
            .materialize(&context(&block, &ListType::Numbered, 2))
            .unwrap();
        assert_eq!(marker.text, "[x]");
        assert_eq!(marker.placement, Placement::Inside);
        assert_eq!(marker.view_length, 1);
    }

    #[test]
    fn test_glyph_placement_depends_on_type_and_depth() {
        let block = block_with(&[(GLYPH_ATTRIBUTE, AttributeValue::Text("→".into()))]);
        let glyph = glyph_marker();

        let root = glyph
            .materialize(&context(&block, &ListType::Bulleted, 0))
            .unwrap();
        let nested = glyph
            .materialize(&context(&block, &ListType::Bulleted, 1))
            .unwrap();
        let numbered = glyph
            .materialize(&context(&block, &ListType::Numbered, 0))
            .unwrap();

        assert_eq!(root.placement, Placement::Inside);
        assert_eq!(nested.placement, Placement::Before);
        assert_eq!(numbered.placement, Placement::Before);
        assert_eq!(nested.view_length, 0);
    }

    #[test]
    fn test_missing_or_mistyped_attribute_yields_nothing() {
        let plain = block_with(&[]);
        assert!(todo_marker()
            .materialize(&context(&plain, &ListType::Bulleted, 0))
            .is_none());

        let wrong = block_with(&[(TODO_ATTRIBUTE, AttributeValue::Text("yes".into()))]);
        assert!(todo_marker()
            .materialize(&context(&wrong, &ListType::Bulleted, 0))
            .is_none());
    }

    #[test]
    fn test_registry_orders_by_priority_and_rejects_duplicates() {
        let mut registry = MarkerRegistry::with_builtins();
        registry
            .register(MarkerDescriptor::new("star", "starred", |_, _| Some("*".into())).priority(15))
            .unwrap();

        let names: Vec<&str> = registry.strategies().map(MarkerDescriptor::name).collect();
        assert_eq!(names, vec!["todo", "star", "glyph"]);

        assert_eq!(
            registry.register(MarkerDescriptor::new("todo", "other", |_, _| None)),
            Err(RegistryError::DuplicateStrategy("todo".into()))
        );
        assert_eq!(
            registry.register(MarkerDescriptor::new("check", TODO_ATTRIBUTE, |_, _| None)),
            Err(RegistryError::DuplicateAttribute {
                attribute: TODO_ATTRIBUTE.into(),
                strategy: "todo".into()
            })
        );
    }
}
