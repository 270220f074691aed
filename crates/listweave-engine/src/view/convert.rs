//! Incremental conversion of the flat block sequence into a [`ViewTree`].
//!
//! The document is cut into segments: every maximal run of list blocks is
//! one segment, every plain block another. A segment whose blocks are
//! unchanged and untouched by the batch is reused as it is. Other segments
//! are rebuilt; inside a rebuilt run each item keeps its view identity
//! unless its render key (type, style, start, reversed, marker payloads)
//! changed or a reconversion was requested for it, in which case the item
//! and its content nodes get fresh view ids and the item is reported as
//! reconverted.

use std::collections::{HashMap, HashSet};
use std::mem;
use std::ops::Range;
use std::sync::Arc;

use crate::error::{Diagnostic, DiagnosticKind};
use crate::lists::query;
use crate::model::{AttributeValue, Block, BlockId, ListAttributes, ListItemId, ListType};

use super::marker::{ItemContext, MarkerRegistry, MarkerTarget, Placement};
use super::tree::{ContentNode, ItemChild, ItemNode, ListNode, ViewId, ViewNode, ViewTree};

/// What a batch did to the view tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionReport {
    /// Items whose subtree was rebuilt with new view ids, in document order.
    pub reconverted: Vec<ListItemId>,
    pub created_items: Vec<ListItemId>,
    /// Items that no longer exist, sorted by id.
    pub removed_items: Vec<ListItemId>,
    pub rebuilt_runs: usize,
    pub reused_runs: usize,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RenderKey {
    list_type: ListType,
    style: Option<String>,
    start: Option<u32>,
    reversed: Option<bool>,
    markers: Vec<(BlockId, String, AttributeValue)>,
}

#[derive(Debug, Clone)]
struct ItemState {
    view_id: ViewId,
    key: RenderKey,
}

#[derive(Debug, Clone)]
struct Segment {
    blocks: Vec<BlockId>,
    nodes: Vec<ViewNode>,
    items: Vec<ListItemId>,
    is_list: bool,
}

/// Previous state handed to a rebuild, drained as it is consumed.
#[derive(Default)]
struct Previous {
    items: HashMap<ListItemId, ItemState>,
    contents: HashMap<BlockId, ViewId>,
}

pub struct Converter {
    markers: Arc<MarkerRegistry>,
    segments: Vec<Segment>,
    items: HashMap<ListItemId, ItemState>,
    contents: HashMap<BlockId, ViewId>,
    pending: HashSet<ListItemId>,
    next_view_id: u64,
    tree: ViewTree,
}

impl Converter {
    pub fn new(markers: Arc<MarkerRegistry>) -> Self {
        Self {
            markers,
            segments: Vec::new(),
            items: HashMap::new(),
            contents: HashMap::new(),
            pending: HashSet::new(),
            next_view_id: 1,
            tree: ViewTree::default(),
        }
    }

    pub fn tree(&self) -> &ViewTree {
        &self.tree
    }

    pub fn markers(&self) -> &Arc<MarkerRegistry> {
        &self.markers
    }

    /// Asks for `item` to be rebuilt by the next [`Converter::apply`].
    pub fn request_reconversion(&mut self, item: ListItemId) {
        self.pending.insert(item);
    }

    /// Throws away all view state and converts `blocks` from scratch.
    pub fn convert_all(&mut self, blocks: &[Block]) -> ConversionReport {
        self.segments.clear();
        self.items.clear();
        self.contents.clear();
        self.pending.clear();
        let all: Vec<BlockId> = blocks.iter().map(|block| block.id).collect();
        self.apply(blocks, &all)
    }

    /// Brings the view tree in line with `blocks`, where `dirty` are the
    /// blocks touched since the previous call.
    pub fn apply(&mut self, blocks: &[Block], dirty: &[BlockId]) -> ConversionReport {
        let mut dirty: HashSet<BlockId> = dirty.iter().copied().collect();
        for block in blocks {
            if block.item_id().is_some_and(|id| self.pending.contains(id)) {
                dirty.insert(block.id);
            }
        }

        let mut old: HashMap<BlockId, Segment> = mem::take(&mut self.segments)
            .into_iter()
            .filter_map(|segment| segment.blocks.first().copied().map(|first| (first, segment)))
            .collect();
        let mut previous = Previous {
            items: mem::take(&mut self.items),
            contents: mem::take(&mut self.contents),
        };

        let mut report = ConversionReport::default();
        let mut seen = HashSet::new();
        let mut segments = Vec::new();

        for range in segment_ranges(blocks) {
            let ids: Vec<BlockId> = blocks[range.clone()].iter().map(|b| b.id).collect();
            let reusable = old
                .remove(&ids[0])
                .filter(|segment| segment.blocks == ids && !ids.iter().any(|id| dirty.contains(id)));

            let segment = match reusable {
                Some(segment) => {
                    self.adopt(&segment, &mut previous);
                    seen.extend(segment.items.iter().cloned());
                    if segment.is_list {
                        report.reused_runs += 1;
                    }
                    segment
                }
                None => {
                    let run = &blocks[range];
                    let is_list = run[0].is_list_block();
                    if is_list {
                        report.rebuilt_runs += 1;
                    }
                    let mut build = Build {
                        converter: self,
                        previous: &mut previous,
                        report: &mut report,
                        seen: &mut seen,
                        items: Vec::new(),
                    };
                    let nodes = if is_list {
                        build.run(run)
                    } else {
                        vec![ViewNode::Block(build.plain(&run[0]))]
                    };
                    let items = build.items;
                    Segment {
                        blocks: ids,
                        nodes,
                        items,
                        is_list,
                    }
                }
            };
            segments.push(segment);
        }

        let mut removed: Vec<ListItemId> = previous.items.into_keys().collect();
        removed.sort();
        report.removed_items = removed;

        self.pending.clear();
        self.segments = segments;
        self.tree = ViewTree {
            nodes: self
                .segments
                .iter()
                .flat_map(|segment| segment.nodes.iter().cloned())
                .collect(),
        };

        log::debug!(
            "conversion: {} runs rebuilt, {} reused, {} items reconverted, {} created, {} removed",
            report.rebuilt_runs,
            report.reused_runs,
            report.reconverted.len(),
            report.created_items.len(),
            report.removed_items.len()
        );
        report
    }

    fn adopt(&mut self, segment: &Segment, previous: &mut Previous) {
        for item in &segment.items {
            if let Some(state) = previous.items.remove(item) {
                self.items.insert(item.clone(), state);
            }
        }
        for block in &segment.blocks {
            if let Some(view_id) = previous.contents.remove(block) {
                self.contents.insert(*block, view_id);
            }
        }
    }

    fn fresh_view_id(&mut self) -> ViewId {
        let id = ViewId(self.next_view_id);
        self.next_view_id += 1;
        id
    }
}

/// Plain blocks one per segment, list runs as one segment each.
fn segment_ranges(blocks: &[Block]) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut runs = query::list_runs(blocks).into_iter().peekable();
    let mut index = 0;
    while index < blocks.len() {
        match runs.peek() {
            Some(run) if run.start == index => {
                index = run.end;
                ranges.extend(runs.next());
            }
            _ => {
                ranges.push(index..index + 1);
                index += 1;
            }
        }
    }
    ranges
}

/// One rebuilt segment in progress.
struct Build<'a> {
    converter: &'a mut Converter,
    previous: &'a mut Previous,
    report: &'a mut ConversionReport,
    seen: &'a mut HashSet<ListItemId>,
    items: Vec<ListItemId>,
}

impl Build<'_> {
    fn content_view_id(&mut self, block: BlockId, keep: bool) -> ViewId {
        let view_id = match self.previous.contents.remove(&block) {
            Some(view_id) if keep => view_id,
            _ => self.converter.fresh_view_id(),
        };
        self.converter.contents.insert(block, view_id);
        view_id
    }

    fn plain(&mut self, block: &Block) -> ContentNode {
        ContentNode {
            view_id: self.content_view_id(block.id, true),
            block: block.id,
            kind: block.content.kind.clone(),
            text: block.content.text.clone(),
            markers: Vec::new(),
        }
    }

    /// Converts one run of list blocks. Blocks that cannot be placed in a
    /// well-formed tree are rendered as plain blocks and reported.
    fn run(&mut self, run: &[Block]) -> Vec<ViewNode> {
        let mut nodes = Vec::new();
        let mut sub_run: Vec<(&Block, &ListAttributes)> = Vec::new();
        let mut previous_indent: Option<usize> = None;

        for block in run {
            let Some(list) = &block.list else { continue };
            let allowed = previous_indent.map_or(0, |indent| indent + 1);
            if list.indent > allowed {
                let message = format!(
                    "block {} at indent {} cannot follow indent {:?}; rendered as plain content",
                    block.id, list.indent, previous_indent
                );
                log::warn!("{message}");
                self.report.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::ConversionInconsistency,
                    vec![block.id],
                    message,
                ));
                self.flush(&mut sub_run, &mut nodes);
                nodes.push(ViewNode::Block(self.plain(block)));
                previous_indent = None;
                continue;
            }
            sub_run.push((block, list));
            previous_indent = Some(list.indent);
        }
        self.flush(&mut sub_run, &mut nodes);
        nodes
    }

    fn flush(&mut self, sub_run: &mut Vec<(&Block, &ListAttributes)>, nodes: &mut Vec<ViewNode>) {
        if sub_run.is_empty() {
            return;
        }
        let blocks = mem::take(sub_run);
        let mut pos = 0;
        let lists = self.lists(&blocks, &mut pos, 0);
        nodes.extend(lists.into_iter().map(ViewNode::List));
    }

    /// Containers for the items starting at `pos` at `indent`.
    fn lists(
        &mut self,
        run: &[(&Block, &ListAttributes)],
        pos: &mut usize,
        indent: usize,
    ) -> Vec<ListNode> {
        let mut lists: Vec<ListNode> = Vec::new();
        while let Some(&(_, list)) = run.get(*pos) {
            if list.indent < indent {
                break;
            }
            let item = self.item(run, pos);
            match lists.last_mut() {
                Some(last) if last.accepts(list) => last.items.push(item),
                _ => {
                    let mut container = ListNode::for_item(list);
                    container.items.push(item);
                    lists.push(container);
                }
            }
        }
        lists
    }

    fn item(&mut self, run: &[(&Block, &ListAttributes)], pos: &mut usize) -> ItemNode {
        let (first, attrs) = run[*pos];
        let attrs = attrs.clone();

        let duplicate = !self.seen.insert(attrs.item_id.clone());
        if duplicate {
            let message = format!(
                "item {} appears more than once; rendered as a separate item",
                attrs.item_id
            );
            log::warn!("{message}");
            self.report.diagnostics.push(Diagnostic::new(
                DiagnosticKind::ConversionInconsistency,
                vec![first.id],
                message,
            ));
        }

        let mut own: Vec<&Block> = Vec::new();
        let mut children = Vec::new();
        while let Some(&(block, list)) = run.get(*pos) {
            if list.indent == attrs.indent && list.item_id == attrs.item_id {
                own.push(block);
                children.push(None);
                *pos += 1;
            } else if list.indent > attrs.indent {
                let nested = self.lists(run, pos, attrs.indent + 1);
                children.extend(nested.into_iter().map(|list| Some(ItemChild::List(list))));
            } else {
                break;
            }
        }

        let key = self.render_key(&attrs, &own);
        let (view_id, keep_contents) = if duplicate {
            (self.converter.fresh_view_id(), false)
        } else {
            self.items.push(attrs.item_id.clone());
            self.item_identity(&attrs.item_id, key)
        };

        let mut own_iter = own.iter();
        let mut resolved: Vec<ItemChild> = Vec::with_capacity(children.len());
        for child in children {
            match child {
                Some(child) => resolved.push(child),
                None => {
                    if let Some(block) = own_iter.next() {
                        resolved.push(ItemChild::Content(ContentNode {
                            view_id: self.content_view_id(block.id, keep_contents),
                            block: block.id,
                            kind: block.content.kind.clone(),
                            text: block.content.text.clone(),
                            markers: Vec::new(),
                        }));
                    }
                }
            }
        }

        self.inject_markers(&attrs, &own, &mut resolved);
        ItemNode {
            view_id,
            item_id: attrs.item_id,
            children: resolved,
        }
    }

    fn render_key(&self, attrs: &ListAttributes, own: &[&Block]) -> RenderKey {
        let mut markers = Vec::new();
        for block in own {
            for attribute in self.converter.markers.attributes() {
                if let Some(value) = block.extra(attribute) {
                    markers.push((block.id, attribute.to_string(), value.clone()));
                }
            }
        }
        RenderKey {
            list_type: attrs.list_type.clone(),
            style: attrs.style.clone(),
            start: attrs.start,
            reversed: attrs.reversed,
            markers,
        }
    }

    /// View id of the item and whether its content nodes keep their ids.
    fn item_identity(&mut self, item: &ListItemId, key: RenderKey) -> (ViewId, bool) {
        let requested = self.converter.pending.contains(item);
        let (view_id, keep) = match self.previous.items.remove(item) {
            Some(state) if state.key == key && !requested => (state.view_id, true),
            Some(_) => {
                self.report.reconverted.push(item.clone());
                (self.converter.fresh_view_id(), false)
            }
            None => {
                self.report.created_items.push(item.clone());
                (self.converter.fresh_view_id(), false)
            }
        };
        self.converter
            .items
            .insert(item.clone(), ItemState { view_id, key });
        (view_id, keep)
    }

    fn inject_markers(&self, attrs: &ListAttributes, own: &[&Block], children: &mut Vec<ItemChild>) {
        for strategy in self.converter.markers.strategies() {
            let target = match strategy.marker_target() {
                MarkerTarget::FirstBlock => own.first(),
                MarkerTarget::LastBlock => own.last(),
            };
            let Some(block) = target else { continue };
            let ctx = ItemContext {
                item_id: &attrs.item_id,
                list_type: &attrs.list_type,
                indent: attrs.indent,
                block,
            };
            let Some(marker) = strategy.materialize(&ctx) else {
                continue;
            };

            let Some(at) = children.iter().position(
                |child| matches!(child, ItemChild::Content(content) if content.block == block.id),
            ) else {
                continue;
            };
            match marker.placement {
                Placement::Inside => {
                    if let ItemChild::Content(content) = &mut children[at] {
                        content.markers.push(marker);
                    }
                }
                Placement::Before => children.insert(at, ItemChild::Marker(marker)),
            }
        }
    }
}
