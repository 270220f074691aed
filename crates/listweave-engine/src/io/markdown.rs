//! Markdown import into flat list blocks and export back to markdown.

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

use crate::lists::query;
use crate::model::{
    AttributeValue, Block, BlockContent, ContentKind, IdSource, ListAttributes, ListItemId,
    ListType, NewBlock,
};
use crate::view::marker::TODO_ATTRIBUTE;

/// Parses `content` into blocks. Every list item becomes one or more blocks
/// sharing a fresh item id from `ids`.
pub fn import_markdown(content: &str, ids: &mut IdSource) -> Vec<NewBlock> {
    let options = Options::ENABLE_TASKLISTS | Options::ENABLE_TABLES;
    let mut importer = Importer::new(ids);
    for event in Parser::new_ext(content, options) {
        importer.process_event(event);
    }
    importer.finish()
}

struct ListFrame {
    list_type: ListType,
    start: Option<u32>,
}

struct ItemFrame {
    item_id: ListItemId,
    indent: usize,
    list_type: ListType,
    start: Option<u32>,
    checked: Option<bool>,
    has_blocks: bool,
}

/// Turns the pulldown-cmark event stream into blocks.
///
/// Nested lists arrive inside their parent item, between the parent's
/// content and its `End(Item)`, so the importer keeps a stack of open lists
/// and one of open items. Tight list items carry their text without a
/// paragraph tag; text arriving while no block is open opens one.
struct Importer<'a> {
    ids: &'a mut IdSource,
    blocks: Vec<NewBlock>,
    open: Option<ContentKind>,
    text: String,
    lists: Vec<ListFrame>,
    items: Vec<ItemFrame>,
}

impl<'a> Importer<'a> {
    fn new(ids: &'a mut IdSource) -> Self {
        Self {
            ids,
            blocks: Vec::new(),
            open: None,
            text: String::new(),
            lists: Vec::new(),
            items: Vec::new(),
        }
    }

    fn process_event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(Tag::Paragraph) => self.open(ContentKind::Paragraph),
            Event::Start(Tag::Heading { level, .. }) => self.open(ContentKind::Heading {
                level: level as u8,
            }),
            Event::Start(Tag::CodeBlock(kind)) => {
                let language = match kind {
                    CodeBlockKind::Fenced(lang) if !lang.is_empty() => Some(lang.to_string()),
                    _ => None,
                };
                self.open(ContentKind::CodeBlock { language });
            }
            Event::Start(Tag::Table(_)) => self.open(ContentKind::Table),
            Event::End(
                TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::CodeBlock | TagEnd::Table,
            ) => self.flush(),

            Event::Start(Tag::List(first_number)) => {
                self.flush();
                self.ensure_item_block();
                self.lists.push(ListFrame {
                    list_type: if first_number.is_some() {
                        ListType::Numbered
                    } else {
                        ListType::Bulleted
                    },
                    start: first_number
                        .filter(|&n| n != 1)
                        .and_then(|n| u32::try_from(n).ok()),
                });
            }
            Event::End(TagEnd::List(_)) => {
                self.lists.pop();
            }
            Event::Start(Tag::Item) => {
                self.flush();
                let Some(list) = self.lists.last() else {
                    return;
                };
                let item = ItemFrame {
                    item_id: self.ids.next_id(),
                    indent: self.lists.len() - 1,
                    list_type: list.list_type.clone(),
                    start: list.start,
                    checked: None,
                    has_blocks: false,
                };
                self.items.push(item);
            }
            Event::End(TagEnd::Item) => {
                self.flush();
                self.ensure_item_block();
                self.items.pop();
            }
            Event::TaskListMarker(checked) => {
                if let Some(item) = self.items.last_mut() {
                    item.checked = Some(checked);
                }
            }

            Event::Start(Tag::TableCell) => {
                if !self.text.is_empty() && !self.text.ends_with('\n') {
                    self.text.push_str(" | ");
                }
            }
            Event::End(TagEnd::TableHead | TagEnd::TableRow) => self.text.push('\n'),

            Event::Text(text) | Event::Code(text) | Event::InlineMath(text) => {
                if self.open.is_none() {
                    self.open(ContentKind::Paragraph);
                }
                self.text.push_str(&text);
            }
            Event::SoftBreak => self.text.push(' '),
            Event::HardBreak => self.text.push('\n'),
            Event::Rule => {
                self.flush();
                self.blocks
                    .push(NewBlock::new(BlockContent::new(ContentKind::HorizontalRule, "")));
            }
            _ => {}
        }
    }

    fn open(&mut self, kind: ContentKind) {
        self.flush();
        self.open = Some(kind);
    }

    fn flush(&mut self) {
        let Some(kind) = self.open.take() else {
            return;
        };
        let text = match kind {
            ContentKind::CodeBlock { .. } => self.text.trim_end_matches('\n').to_string(),
            _ => self.text.trim().to_string(),
        };
        self.text.clear();
        self.push_block(BlockContent::new(kind, text));
    }

    /// Items whose content is only a nested list still get a block.
    fn ensure_item_block(&mut self) {
        if self.items.last().is_some_and(|item| !item.has_blocks) {
            self.push_block(BlockContent::paragraph(""));
        }
    }

    fn push_block(&mut self, content: BlockContent) {
        let mut block = NewBlock::new(content);
        if let Some(item) = self.items.last_mut() {
            item.has_blocks = true;
            let mut list =
                ListAttributes::new(item.item_id.clone(), item.indent, item.list_type.clone());
            list.start = item.start;
            block = block.with_list(list);
            if let Some(checked) = item.checked {
                block = block.with_extra(TODO_ATTRIBUTE, AttributeValue::Bool(checked));
            }
        }
        self.blocks.push(block);
    }

    fn finish(mut self) -> Vec<NewBlock> {
        self.flush();
        self.blocks
    }
}

/// Writes blocks as markdown. Sibling items are numbered per container;
/// continuation blocks are indented under their item's marker.
pub fn export_markdown(blocks: &[Block]) -> String {
    let mut out = String::new();
    // Marker width, type and number of the latest item per indent level.
    let mut levels: Vec<(usize, ListType, u32)> = Vec::new();

    for (index, block) in blocks.iter().enumerate() {
        let Some(list) = &block.list else {
            if index > 0 {
                out.push_str("\n\n");
            }
            levels.clear();
            out.push_str(&plain_markdown(block));
            continue;
        };

        let continuation = !query::is_first_block_of_item(blocks, index);
        levels.truncate(list.indent + 1);
        let new_container = levels
            .get(list.indent)
            .is_some_and(|(_, list_type, _)| *list_type != list.list_type);
        let after_list = index > 0 && blocks[index - 1].is_list_block();
        if index > 0 {
            let tight = after_list && !continuation && !new_container;
            out.push_str(if tight { "\n" } else { "\n\n" });
        }

        let pad: usize = levels.iter().take(list.indent).map(|(width, _, _)| width).sum();

        if continuation {
            let width = levels.get(list.indent).map_or(0, |(width, _, _)| *width);
            out.push_str(&" ".repeat(pad + width));
            out.push_str(&block.content.text);
            continue;
        }

        let number = match levels.get(list.indent) {
            Some((_, list_type, n)) if *list_type == list.list_type => n + 1,
            _ => list.start.unwrap_or(1),
        };
        let marker = match list.list_type {
            ListType::Numbered => format!("{number}. "),
            _ => "- ".to_string(),
        };
        let entry = (marker.len(), list.list_type.clone(), number);
        if levels.len() > list.indent {
            levels[list.indent] = entry;
        } else {
            levels.push(entry);
        }

        out.push_str(&" ".repeat(pad));
        out.push_str(&marker);
        if let Some(checked) = block.extra(TODO_ATTRIBUTE).and_then(AttributeValue::as_bool) {
            out.push_str(if checked { "[x] " } else { "[ ] " });
        }
        out.push_str(&block.content.text);
    }
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

fn plain_markdown(block: &Block) -> String {
    let text = &block.content.text;
    match &block.content.kind {
        ContentKind::Heading { level } => format!("{} {text}", "#".repeat(usize::from(*level))),
        ContentKind::CodeBlock { language } => {
            format!("```{}\n{text}\n```", language.as_deref().unwrap_or_default())
        }
        ContentKind::HorizontalRule => "---".to_string(),
        _ => text.clone(),
    }
}
