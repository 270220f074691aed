//! In-memory block store with transactional change blocks.
//!
//! The store is the single owner of block data. All writes go through a
//! [`ChangeBlock`] opened by [`BlockStore::change`]; each write is recorded
//! as a [`Change`] and the whole batch is delivered as one [`ChangeFeed`]
//! when the closure succeeds. When the closure fails the document, the
//! block id counter and the item id source are restored to their state at
//! the start of the change block.

use std::collections::HashMap;
use std::fmt;

use crate::error::{SchemaRejection, StoreError};
use crate::lists::ListQuery;

use super::{
    AttributeSchema, AttributeValue, Block, BlockId, ContentKind, ListAttr, ListAttributes,
    ListItemId, ListType, NewBlock,
};

/// Where fresh list item ids come from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum IdSource {
    /// uuid v4 in simple form.
    #[default]
    Random,
    /// `prefix` followed by a counter; deterministic, for tests and tooling.
    Sequential { prefix: String, next: u64 },
}

impl IdSource {
    pub fn sequential(prefix: impl Into<String>) -> Self {
        IdSource::Sequential {
            prefix: prefix.into(),
            next: 1,
        }
    }

    pub fn next_id(&mut self) -> ListItemId {
        match self {
            IdSource::Random => ListItemId::new(uuid::Uuid::new_v4().simple().to_string()),
            IdSource::Sequential { prefix, next } => {
                let id = format!("{prefix}{next}");
                *next += 1;
                ListItemId::new(id)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributeKey {
    List(ListAttr),
    Extra(String),
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeKey::List(attr) => f.write_str(attr.name()),
            AttributeKey::Extra(name) => f.write_str(name),
        }
    }
}

/// One recorded mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Insert {
        block: BlockId,
        index: usize,
    },
    Remove {
        block: BlockId,
        index: usize,
        former: Block,
        previous: Option<BlockId>,
        next: Option<BlockId>,
    },
    Attribute {
        block: BlockId,
        key: AttributeKey,
        old: Option<AttributeValue>,
        new: Option<AttributeValue>,
    },
    /// `previous`/`next` surround the block at `to`; `from_previous`/
    /// `from_next` surrounded it at `from`.
    Move {
        block: BlockId,
        from: usize,
        to: usize,
        previous: Option<BlockId>,
        next: Option<BlockId>,
        from_previous: Option<BlockId>,
        from_next: Option<BlockId>,
    },
    Rename {
        block: BlockId,
        old: ContentKind,
        new: ContentKind,
    },
    Text {
        block: BlockId,
    },
}

impl Change {
    pub fn block(&self) -> BlockId {
        match self {
            Change::Insert { block, .. }
            | Change::Remove { block, .. }
            | Change::Attribute { block, .. }
            | Change::Move { block, .. }
            | Change::Rename { block, .. }
            | Change::Text { block } => *block,
        }
    }
}

/// The changes of one committed change block, in the order they happened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeFeed {
    pub version: u64,
    pub changes: Vec<Change>,
}

impl ChangeFeed {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Blocks affected by the feed, including the neighbours of removed and
    /// moved blocks. Ids may refer to blocks that no longer exist.
    pub fn touched_blocks(&self) -> Vec<BlockId> {
        touched_blocks(&self.changes)
    }
}

fn touched_blocks(changes: &[Change]) -> Vec<BlockId> {
    let mut seen = Vec::new();
    let mut push = |id: BlockId| {
        if !seen.contains(&id) {
            seen.push(id);
        }
    };

    for change in changes {
        push(change.block());
        match change {
            Change::Remove { previous, next, .. } => {
                previous.iter().chain(next.iter()).copied().for_each(&mut push);
            }
            Change::Move {
                previous,
                next,
                from_previous,
                from_next,
                ..
            } => {
                [previous, next, from_previous, from_next]
                    .into_iter()
                    .flatten()
                    .copied()
                    .for_each(&mut push);
            }
            _ => {}
        }
    }
    seen
}

pub struct BlockStore {
    blocks: Vec<Block>,
    positions: HashMap<BlockId, usize>,
    schema: AttributeSchema,
    ids: IdSource,
    next_block_id: u64,
    version: u64,
}

impl Default for BlockStore {
    fn default() -> Self {
        Self::new(AttributeSchema::default(), IdSource::default())
    }
}

impl BlockStore {
    pub fn new(schema: AttributeSchema, ids: IdSource) -> Self {
        Self {
            blocks: Vec::new(),
            positions: HashMap::new(),
            schema,
            ids,
            next_block_id: 1,
            version: 0,
        }
    }

    /// Builds a store holding `blocks` in order. No change feed is produced.
    pub fn with_blocks(
        schema: AttributeSchema,
        ids: IdSource,
        blocks: Vec<NewBlock>,
    ) -> Result<Self, StoreError> {
        let mut store = Self::new(schema, ids);
        for block in blocks {
            let id = store.allocate_id();
            store.check_schema(id, &block.content.kind, block.list.as_ref())?;
            store.blocks.push(Block {
                id,
                content: block.content,
                list: block.list,
                extra: block.extra,
            });
        }
        store.reindex(0);
        Ok(store)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.index_of(id).map(|index| &self.blocks[index])
    }

    pub fn index_of(&self, id: BlockId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn schema(&self) -> &AttributeSchema {
        &self.schema
    }

    pub fn query(&self) -> ListQuery<'_> {
        ListQuery::new(&self.blocks, &self.positions)
    }

    /// Runs `f` inside a change block.
    ///
    /// On `Ok` the recorded changes are committed and returned. On `Err`
    /// every mutation made by `f` is undone and the error is returned.
    pub fn change<T, E>(
        &mut self,
        f: impl FnOnce(&mut ChangeBlock<'_>) -> Result<T, E>,
    ) -> Result<(T, ChangeFeed), E> {
        let saved_blocks = self.blocks.clone();
        let saved_next_block_id = self.next_block_id;
        let saved_ids = self.ids.clone();

        let mut tx = ChangeBlock {
            store: self,
            changes: Vec::new(),
        };
        let result = f(&mut tx);
        let changes = tx.changes;

        match result {
            Ok(value) => {
                if !changes.is_empty() {
                    self.version += 1;
                }
                Ok((
                    value,
                    ChangeFeed {
                        version: self.version,
                        changes,
                    },
                ))
            }
            Err(err) => {
                self.blocks = saved_blocks;
                self.next_block_id = saved_next_block_id;
                self.ids = saved_ids;
                self.positions.clear();
                self.reindex(0);
                Err(err)
            }
        }
    }

    fn allocate_id(&mut self) -> BlockId {
        let id = BlockId(self.next_block_id);
        self.next_block_id += 1;
        id
    }

    fn reindex(&mut self, from: usize) {
        for (index, block) in self.blocks.iter().enumerate().skip(from) {
            self.positions.insert(block.id, index);
        }
    }

    fn check_schema(
        &self,
        block: BlockId,
        kind: &ContentKind,
        list: Option<&ListAttributes>,
    ) -> Result<(), SchemaRejection> {
        if list.is_some() && !self.schema.can_host_list(kind) {
            return Err(SchemaRejection {
                block,
                kind: kind.clone(),
            });
        }
        Ok(())
    }
}

/// A scoped mutation transaction over a [`BlockStore`].
pub struct ChangeBlock<'a> {
    store: &'a mut BlockStore,
    changes: Vec<Change>,
}

impl ChangeBlock<'_> {
    pub fn blocks(&self) -> &[Block] {
        &self.store.blocks
    }

    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.store.get(id)
    }

    pub fn index_of(&self, id: BlockId) -> Option<usize> {
        self.store.index_of(id)
    }

    pub fn query(&self) -> ListQuery<'_> {
        self.store.query()
    }

    pub fn schema(&self) -> &AttributeSchema {
        &self.store.schema
    }

    /// Changes recorded so far in this change block.
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn touched_blocks(&self) -> Vec<BlockId> {
        touched_blocks(&self.changes)
    }

    /// A list item id not used by any block of the document.
    pub fn new_item_id(&mut self) -> ListItemId {
        loop {
            let id = self.store.ids.next_id();
            if !self.store.blocks.iter().any(|b| b.item_id() == Some(&id)) {
                return id;
            }
        }
    }

    fn position(&self, id: BlockId) -> Result<usize, StoreError> {
        self.store
            .index_of(id)
            .ok_or(StoreError::BlockNotFound(id))
    }

    fn neighbours(&self, index: usize) -> (Option<BlockId>, Option<BlockId>) {
        let blocks = &self.store.blocks;
        let previous = index.checked_sub(1).map(|i| blocks[i].id);
        let next = blocks.get(index + 1).map(|b| b.id);
        (previous, next)
    }

    pub fn insert(&mut self, index: usize, block: NewBlock) -> Result<BlockId, StoreError> {
        let len = self.store.blocks.len();
        if index > len {
            return Err(StoreError::IndexOutOfBounds { index, len });
        }
        let id = BlockId(self.store.next_block_id);
        self.store
            .check_schema(id, &block.content.kind, block.list.as_ref())?;
        self.store.next_block_id += 1;

        self.store.blocks.insert(
            index,
            Block {
                id,
                content: block.content,
                list: block.list,
                extra: block.extra,
            },
        );
        self.store.reindex(index);
        self.changes.push(Change::Insert { block: id, index });
        Ok(id)
    }

    pub fn remove(&mut self, id: BlockId) -> Result<Block, StoreError> {
        let index = self.position(id)?;
        let (previous, next) = self.neighbours(index);
        let former = self.store.blocks.remove(index);
        self.store.positions.remove(&id);
        self.store.reindex(index);
        self.changes.push(Change::Remove {
            block: id,
            index,
            former: former.clone(),
            previous,
            next,
        });
        Ok(former)
    }

    /// Moves a block so that it ends up at `to` in the resulting document.
    pub fn move_block(&mut self, id: BlockId, to: usize) -> Result<(), StoreError> {
        let from = self.position(id)?;
        let len = self.store.blocks.len();
        if to >= len {
            return Err(StoreError::IndexOutOfBounds { index: to, len });
        }
        if from == to {
            return Ok(());
        }
        let (from_previous, from_next) = self.neighbours(from);
        let block = self.store.blocks.remove(from);
        self.store.blocks.insert(to, block);
        self.store.reindex(from.min(to));

        let (previous, next) = self.neighbours(to);
        self.changes.push(Change::Move {
            block: id,
            from,
            to,
            previous,
            next,
            from_previous,
            from_next,
        });
        Ok(())
    }

    /// Changes the content kind of a block, keeping its text and attributes.
    pub fn rename(&mut self, id: BlockId, kind: ContentKind) -> Result<(), StoreError> {
        let index = self.position(id)?;
        let block = &self.store.blocks[index];
        self.store.check_schema(id, &kind, block.list.as_ref())?;
        if block.content.kind == kind {
            return Ok(());
        }
        let old = std::mem::replace(&mut self.store.blocks[index].content.kind, kind.clone());
        self.changes.push(Change::Rename {
            block: id,
            old,
            new: kind,
        });
        Ok(())
    }

    pub fn set_text(&mut self, id: BlockId, text: impl Into<String>) -> Result<(), StoreError> {
        let index = self.position(id)?;
        self.store.blocks[index].content.text = text.into();
        self.changes.push(Change::Text { block: id });
        Ok(())
    }

    /// Replaces the list attributes of a block, recording one attribute
    /// change per differing list attribute. Returns whether anything changed.
    pub fn set_list(
        &mut self,
        id: BlockId,
        list: Option<ListAttributes>,
    ) -> Result<bool, StoreError> {
        let index = self.position(id)?;
        let block = &self.store.blocks[index];
        self.store
            .check_schema(id, &block.content.kind, list.as_ref())?;
        if block.list == list {
            return Ok(false);
        }

        for attr in ListAttr::ALL {
            let old = block.list.as_ref().and_then(|l| l.get(attr));
            let new = list.as_ref().and_then(|l| l.get(attr));
            if old != new {
                self.changes.push(Change::Attribute {
                    block: id,
                    key: AttributeKey::List(attr),
                    old,
                    new,
                });
            }
        }
        self.store.blocks[index].list = list;
        Ok(true)
    }

    /// Applies `f` to a copy of the block's list attributes and writes it back.
    pub fn update_list(
        &mut self,
        id: BlockId,
        f: impl FnOnce(&mut ListAttributes),
    ) -> Result<bool, StoreError> {
        let mut list = self
            .get(id)
            .ok_or(StoreError::BlockNotFound(id))?
            .list
            .clone()
            .ok_or(StoreError::NotAListBlock(id))?;
        f(&mut list);
        self.set_list(id, Some(list))
    }

    /// Writes a single list attribute by name-typed key.
    ///
    /// Identity, indent and type cannot be removed individually; use
    /// [`ChangeBlock::clear_list`] to demote a block.
    pub fn set_list_attr(
        &mut self,
        id: BlockId,
        attr: ListAttr,
        value: Option<AttributeValue>,
    ) -> Result<bool, StoreError> {
        let invalid = |value: &Option<AttributeValue>| StoreError::InvalidAttributeValue {
            attribute: attr.name().to_string(),
            value: value.as_ref().map(ToString::to_string).unwrap_or_default(),
        };

        let mut list = self
            .get(id)
            .ok_or(StoreError::BlockNotFound(id))?
            .list
            .clone()
            .ok_or(StoreError::NotAListBlock(id))?;

        match (attr, &value) {
            (ListAttr::ItemId, Some(AttributeValue::Text(text))) => {
                list.item_id = ListItemId::new(text.clone());
            }
            (ListAttr::Indent, Some(AttributeValue::Int(indent))) => {
                list.indent = usize::try_from(*indent).map_err(|_| invalid(&value))?;
            }
            (ListAttr::Type, Some(AttributeValue::Text(name))) => {
                list.list_type = ListType::from_name(name);
            }
            (ListAttr::Style, Some(AttributeValue::Text(style))) => {
                list.style = Some(style.clone());
            }
            (ListAttr::Style, None) => list.style = None,
            (ListAttr::Start, Some(AttributeValue::Int(start))) => {
                list.start = Some(u32::try_from(*start).map_err(|_| invalid(&value))?);
            }
            (ListAttr::Start, None) => list.start = None,
            (ListAttr::Reversed, Some(AttributeValue::Bool(reversed))) => {
                list.reversed = Some(*reversed);
            }
            (ListAttr::Reversed, None) => list.reversed = None,
            _ => return Err(invalid(&value)),
        }
        self.set_list(id, Some(list))
    }

    pub fn clear_list(&mut self, id: BlockId) -> Result<bool, StoreError> {
        self.set_list(id, None)
    }

    pub fn set_extra(
        &mut self,
        id: BlockId,
        name: &str,
        value: Option<AttributeValue>,
    ) -> Result<bool, StoreError> {
        let index = self.position(id)?;
        let extra = &mut self.store.blocks[index].extra;
        let old = match &value {
            Some(value) => extra.insert(name.to_string(), value.clone()),
            None => extra.remove(name),
        };
        if old == value {
            return Ok(false);
        }
        self.changes.push(Change::Attribute {
            block: id,
            key: AttributeKey::Extra(name.to_string()),
            old,
            new: value,
        });
        Ok(true)
    }

    pub fn remove_extra(&mut self, id: BlockId, name: &str) -> Result<bool, StoreError> {
        self.set_extra(id, name, None)
    }
}
