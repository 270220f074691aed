//! Compact text notation for flat list documents used across the unit tests.
//!
//! One block per line, two spaces per indent level:
//!
//! ```text
//! * A          bulleted item, item id "a"
//! # B {x}      numbered item with item id "x"
//! + B2         another block of the latest item at this indent
//! ?todo C      item of the custom type "todo"
//! plain        block without list attributes
//! ```

use crate::lists::query;
use crate::model::{
    AttributeSchema, Block, BlockId, BlockStore, IdSource, ListAttributes, ListType, NewBlock,
};

fn split_id(rest: &str) -> (&str, Option<&str>) {
    if let Some(body) = rest.strip_suffix('}')
        && let Some((text, id)) = body.rsplit_once(" {")
    {
        return (text, Some(id));
    }
    (rest, None)
}

pub fn parse(doc: &str) -> Vec<NewBlock> {
    let mut parsed: Vec<NewBlock> = Vec::new();
    for line in doc.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            continue;
        }
        let content = line.trim_start_matches(' ');
        let indent = (line.len() - content.len()) / 2;

        let (marker, rest) = match content.split_once(' ') {
            Some((marker, rest)) if matches!(marker, "*" | "#" | "+") || marker.starts_with('?') => {
                (marker, rest)
            }
            _ => {
                parsed.push(NewBlock::paragraph(content));
                continue;
            }
        };
        let (text, id) = split_id(rest);

        let list = match marker {
            "+" => {
                let mut list = parsed
                    .iter()
                    .rev()
                    .filter_map(|block| block.list.as_ref())
                    .find(|list| list.indent == indent)
                    .cloned()
                    .unwrap_or_else(|| panic!("no item to continue for {text:?}"));
                if let Some(id) = id {
                    list.item_id = id.into();
                }
                list
            }
            _ => {
                let list_type = match marker {
                    "*" => ListType::Bulleted,
                    "#" => ListType::Numbered,
                    custom => ListType::Custom(custom[1..].to_string()),
                };
                let id = id.map_or_else(|| text.to_lowercase(), str::to_string);
                ListAttributes::new(id, indent, list_type)
            }
        };
        parsed.push(NewBlock::paragraph(text).with_list(list));
    }
    parsed
}

/// Blocks of `doc` with ids 1..=n.
pub fn parse_blocks(doc: &str) -> Vec<Block> {
    parse(doc)
        .into_iter()
        .enumerate()
        .map(|(index, block)| Block {
            id: BlockId(index as u64 + 1),
            content: block.content,
            list: block.list,
            extra: block.extra,
        })
        .collect()
}

/// A store holding `doc`; fresh item ids come out as `n1`, `n2`, ...
pub fn store_from(doc: &str) -> BlockStore {
    BlockStore::with_blocks(
        AttributeSchema::default(),
        IdSource::sequential("n"),
        parse(doc),
    )
    .unwrap()
}

pub fn position(blocks: &[Block], text: &str) -> usize {
    blocks
        .iter()
        .position(|block| block.content.text == text)
        .unwrap_or_else(|| panic!("no block with text {text:?}"))
}

pub fn block_id(store: &BlockStore, text: &str) -> BlockId {
    store.blocks()[position(store.blocks(), text)].id
}

pub fn texts_at<'a>(blocks: &'a [Block], indices: &[usize]) -> Vec<&'a str> {
    indices
        .iter()
        .map(|&index| blocks[index].content.text.as_str())
        .collect()
}

/// Renders blocks back into the fixture notation, always printing item ids.
pub fn flat(blocks: &[Block]) -> String {
    let mut out = String::new();
    for (index, block) in blocks.iter().enumerate() {
        let Some(list) = &block.list else {
            out.push_str(&block.content.text);
            out.push('\n');
            continue;
        };
        let marker = if !query::is_first_block_of_item(blocks, index) {
            "+".to_string()
        } else {
            match &list.list_type {
                ListType::Bulleted => "*".to_string(),
                ListType::Numbered => "#".to_string(),
                ListType::Custom(name) => format!("?{name}"),
            }
        };
        out.push_str(&format!(
            "{}{marker} {} {{{}}}\n",
            "  ".repeat(list.indent),
            block.content.text,
            list.item_id
        ));
    }
    out
}

#[test]
fn test_fixture_round_trips_through_flat() {
    let doc = "\
* A {a}
+ A2 {a}
  # B {x}
    ?todo C {c}
plain
";
    assert_eq!(flat(&parse_blocks(doc)), doc);
}
