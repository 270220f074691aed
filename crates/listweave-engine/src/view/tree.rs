//! The nested view tree derived from the flat block sequence.
//!
//! List containers hold item containers, item containers hold content,
//! marker and nested list nodes. Plain blocks sit at the top level.

use std::fmt::Write;

use crate::model::{BlockId, ContentKind, ListAttributes, ListItemId, ListType};

use super::marker::Placement;

/// Identity of an item or content node. Stable until the node is rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerNode {
    pub strategy: String,
    pub text: String,
    pub placement: Placement,
    /// View positions taken in front of the content text; 0 for markers
    /// placed before the content.
    pub view_length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentNode {
    pub view_id: ViewId,
    pub block: BlockId,
    pub kind: ContentKind,
    pub text: String,
    /// Markers injected inside this content, in priority order.
    pub markers: Vec<MarkerNode>,
}

impl ContentNode {
    /// Sum of the view lengths of the inside markers.
    pub fn marker_offset(&self) -> usize {
        self.markers.iter().map(|marker| marker.view_length).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemChild {
    Marker(MarkerNode),
    Content(ContentNode),
    List(ListNode),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemNode {
    pub view_id: ViewId,
    pub item_id: ListItemId,
    pub children: Vec<ItemChild>,
}

/// A `<ul>`/`<ol>` equivalent. Adjacent items share a container only when
/// type, style, start and reversed agree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListNode {
    pub list_type: ListType,
    pub style: Option<String>,
    pub start: Option<u32>,
    pub reversed: Option<bool>,
    pub indent: usize,
    pub items: Vec<ItemNode>,
}

impl ListNode {
    pub fn for_item(list: &ListAttributes) -> Self {
        Self {
            list_type: list.list_type.clone(),
            style: list.style.clone(),
            start: list.start,
            reversed: list.reversed,
            indent: list.indent,
            items: Vec::new(),
        }
    }

    /// Whether an item with `list` belongs in this container.
    pub fn accepts(&self, list: &ListAttributes) -> bool {
        self.list_type == list.list_type
            && self.style == list.style
            && self.start == list.start
            && self.reversed == list.reversed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewNode {
    Block(ContentNode),
    List(ListNode),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewTree {
    pub nodes: Vec<ViewNode>,
}

impl ViewTree {
    /// Every content node in document order.
    pub fn contents(&self) -> Vec<&ContentNode> {
        let mut found = Vec::new();
        for node in &self.nodes {
            match node {
                ViewNode::Block(content) => found.push(content),
                ViewNode::List(list) => collect_contents(list, &mut found),
            }
        }
        found
    }

    /// Every item node in document order.
    pub fn items(&self) -> Vec<&ItemNode> {
        let mut found = Vec::new();
        for node in &self.nodes {
            if let ViewNode::List(list) = node {
                collect_items(list, &mut found);
            }
        }
        found
    }

    pub fn find_content(&self, block: BlockId) -> Option<&ContentNode> {
        self.contents().into_iter().find(|c| c.block == block)
    }

    pub fn find_item(&self, item: &ListItemId) -> Option<&ItemNode> {
        self.items().into_iter().find(|i| &i.item_id == item)
    }

    /// Indented text rendering of the tree, one node per line.
    ///
    /// ```text
    /// ul
    ///   li a
    ///     p todo="[x]" "A"
    ///     ol start=3
    ///       li b
    ///         marker glyph="→"
    ///         p "B"
    /// p "plain"
    /// ```
    pub fn outline(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            match node {
                ViewNode::Block(content) => outline_content(&mut out, content, 0),
                ViewNode::List(list) => outline_list(&mut out, list, 0),
            }
        }
        out
    }
}

fn collect_contents<'a>(list: &'a ListNode, found: &mut Vec<&'a ContentNode>) {
    for item in &list.items {
        for child in &item.children {
            match child {
                ItemChild::Content(content) => found.push(content),
                ItemChild::List(nested) => collect_contents(nested, found),
                ItemChild::Marker(_) => {}
            }
        }
    }
}

fn collect_items<'a>(list: &'a ListNode, found: &mut Vec<&'a ItemNode>) {
    for item in &list.items {
        found.push(item);
        for child in &item.children {
            if let ItemChild::List(nested) = child {
                collect_items(nested, found);
            }
        }
    }
}

fn pad(out: &mut String, depth: usize) {
    out.push_str(&"  ".repeat(depth));
}

fn outline_content(out: &mut String, content: &ContentNode, depth: usize) {
    pad(out, depth);
    out.push_str(&content.kind.tag());
    for marker in &content.markers {
        let _ = write!(out, " {}={:?}", marker.strategy, marker.text);
    }
    let _ = writeln!(out, " {:?}", content.text);
}

fn outline_list(out: &mut String, list: &ListNode, depth: usize) {
    pad(out, depth);
    out.push_str(list.list_type.container_tag());
    if let ListType::Custom(name) = &list.list_type {
        let _ = write!(out, " type={name}");
    }
    if let Some(start) = list.start {
        let _ = write!(out, " start={start}");
    }
    if list.reversed == Some(true) {
        out.push_str(" reversed");
    }
    if let Some(style) = &list.style {
        let _ = write!(out, " style={style}");
    }
    out.push('\n');

    for item in &list.items {
        pad(out, depth + 1);
        let _ = writeln!(out, "li {}", item.item_id);
        for child in &item.children {
            match child {
                ItemChild::Marker(marker) => {
                    pad(out, depth + 2);
                    let _ = writeln!(out, "marker {}={:?}", marker.strategy, marker.text);
                }
                ItemChild::Content(content) => outline_content(out, content, depth + 2),
                ItemChild::List(nested) => outline_list(out, nested, depth + 2),
            }
        }
    }
}
