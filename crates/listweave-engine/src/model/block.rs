use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identity of a block inside one store. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u64);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity shared by every block of one logical list item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListItemId(String);

impl ListItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ListItemId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListType {
    Bulleted,
    Numbered,
    /// Extension list types (e.g. a todo list) rendered as unordered lists.
    Custom(String),
}

impl ListType {
    /// Parses a `listType` value; unknown names become custom types.
    pub fn from_name(name: &str) -> Self {
        match name {
            "bulleted" => ListType::Bulleted,
            "numbered" => ListType::Numbered,
            other => ListType::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ListType::Bulleted => "bulleted",
            ListType::Numbered => "numbered",
            ListType::Custom(name) => name,
        }
    }

    pub fn is_ordered(&self) -> bool {
        matches!(self, ListType::Numbered)
    }

    pub fn container_tag(&self) -> &'static str {
        if self.is_ordered() { "ol" } else { "ul" }
    }
}

impl fmt::Display for ListType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Names of the list-semantic attributes carried by a list block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ListAttr {
    ItemId,
    Indent,
    Type,
    Style,
    Start,
    Reversed,
}

impl ListAttr {
    pub const ALL: [ListAttr; 6] = [
        ListAttr::ItemId,
        ListAttr::Indent,
        ListAttr::Type,
        ListAttr::Style,
        ListAttr::Start,
        ListAttr::Reversed,
    ];

    /// Attributes presented per item and duplicated on each of its blocks.
    pub const ITEM_PROPERTIES: [ListAttr; 4] = [
        ListAttr::Type,
        ListAttr::Style,
        ListAttr::Start,
        ListAttr::Reversed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ListAttr::ItemId => "listItemId",
            ListAttr::Indent => "listIndent",
            ListAttr::Type => "listType",
            ListAttr::Style => "listStyle",
            ListAttr::Start => "listStart",
            ListAttr::Reversed => "listReversed",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|attr| attr.name() == name)
    }
}

impl fmt::Display for ListAttr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value of a single block attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl AttributeValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(value) => write!(f, "{value}"),
            AttributeValue::Int(value) => write!(f, "{value}"),
            AttributeValue::Text(value) => f.write_str(value),
        }
    }
}

/// The list attributes of a list block.
///
/// Type, style, start and reversed belong to the item; every block of the
/// item carries a copy and the post-fixer keeps the copies identical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListAttributes {
    pub item_id: ListItemId,
    pub indent: usize,
    pub list_type: ListType,
    pub style: Option<String>,
    pub start: Option<u32>,
    pub reversed: Option<bool>,
}

impl ListAttributes {
    pub fn new(item_id: impl Into<ListItemId>, indent: usize, list_type: ListType) -> Self {
        Self {
            item_id: item_id.into(),
            indent,
            list_type,
            style: None,
            start: None,
            reversed: None,
        }
    }

    pub fn get(&self, attr: ListAttr) -> Option<AttributeValue> {
        match attr {
            ListAttr::ItemId => Some(AttributeValue::Text(self.item_id.to_string())),
            ListAttr::Indent => Some(AttributeValue::Int(self.indent as i64)),
            ListAttr::Type => Some(AttributeValue::Text(self.list_type.to_string())),
            ListAttr::Style => self.style.clone().map(AttributeValue::Text),
            ListAttr::Start => self.start.map(|start| AttributeValue::Int(start.into())),
            ListAttr::Reversed => self.reversed.map(AttributeValue::Bool),
        }
    }

    /// True when both share every attribute in `attrs`.
    pub fn matches(&self, other: &ListAttributes, attrs: &[ListAttr]) -> bool {
        attrs.iter().all(|attr| self.get(*attr) == other.get(*attr))
    }

    /// Copies type, style, start and reversed from `other`.
    pub fn copy_item_properties(&mut self, other: &ListAttributes) {
        self.list_type = other.list_type.clone();
        self.style = other.style.clone();
        self.start = other.start;
        self.reversed = other.reversed;
    }

    pub fn same_item_properties(&self, other: &ListAttributes) -> bool {
        self.matches(other, &ListAttr::ITEM_PROPERTIES)
    }
}

impl From<String> for ListItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Paragraph,
    Heading { level: u8 },
    CodeBlock { language: Option<String> },
    Table,
    Image,
    HorizontalRule,
}

impl ContentKind {
    pub fn name(&self) -> &'static str {
        match self {
            ContentKind::Paragraph => "paragraph",
            ContentKind::Heading { .. } => "heading",
            ContentKind::CodeBlock { .. } => "code_block",
            ContentKind::Table => "table",
            ContentKind::Image => "image",
            ContentKind::HorizontalRule => "horizontal_rule",
        }
    }

    pub fn tag(&self) -> String {
        match self {
            ContentKind::Paragraph => "p".to_string(),
            ContentKind::Heading { level } => format!("h{}", (*level).clamp(1, 6)),
            ContentKind::CodeBlock { .. } => "pre".to_string(),
            ContentKind::Table => "table".to_string(),
            ContentKind::Image => "img".to_string(),
            ContentKind::HorizontalRule => "hr".to_string(),
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque payload of a block. The list engine only reads its kind and
/// measures its text for position mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockContent {
    pub kind: ContentKind,
    pub text: String,
}

impl BlockContent {
    pub fn new(kind: ContentKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::new(ContentKind::Paragraph, text)
    }

    /// Length in model positions (characters).
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub content: BlockContent,
    pub list: Option<ListAttributes>,
    /// Extension attributes, e.g. marker payloads.
    pub extra: BTreeMap<String, AttributeValue>,
}

impl Block {
    pub fn is_list_block(&self) -> bool {
        self.list.is_some()
    }

    pub fn item_id(&self) -> Option<&ListItemId> {
        self.list.as_ref().map(|list| &list.item_id)
    }

    pub fn indent(&self) -> Option<usize> {
        self.list.as_ref().map(|list| list.indent)
    }

    pub fn list_type(&self) -> Option<&ListType> {
        self.list.as_ref().map(|list| &list.list_type)
    }

    pub fn extra(&self, name: &str) -> Option<&AttributeValue> {
        self.extra.get(name)
    }
}

/// Block description used when inserting into a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBlock {
    pub content: BlockContent,
    pub list: Option<ListAttributes>,
    pub extra: BTreeMap<String, AttributeValue>,
}

impl NewBlock {
    pub fn new(content: BlockContent) -> Self {
        Self {
            content,
            list: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::new(BlockContent::paragraph(text))
    }

    pub fn list_item(
        text: impl Into<String>,
        item_id: impl Into<ListItemId>,
        indent: usize,
        list_type: ListType,
    ) -> Self {
        Self::paragraph(text).with_list(ListAttributes::new(item_id, indent, list_type))
    }

    pub fn with_list(mut self, list: ListAttributes) -> Self {
        self.list = Some(list);
        self
    }

    pub fn with_extra(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.extra.insert(name.into(), value);
        self
    }
}

impl From<&Block> for NewBlock {
    fn from(block: &Block) -> Self {
        Self {
            content: block.content.clone(),
            list: block.list.clone(),
            extra: block.extra.clone(),
        }
    }
}
