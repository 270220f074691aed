//! Error and diagnostic types shared across the engine.

use thiserror::Error;

use crate::model::{BlockId, ContentKind};

/// A block refused a list attribute write because of its content kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("block {block} ({kind}) cannot host list attributes")]
pub struct SchemaRejection {
    pub block: BlockId,
    pub kind: ContentKind,
}

/// Errors raised by the block store while a change block is open.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("block not found: {0}")]
    BlockNotFound(BlockId),

    #[error("index {index} out of bounds for document with {len} blocks")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("block {0} is not a list block")]
    NotAListBlock(BlockId),

    #[error("invalid value {value:?} for attribute {attribute}")]
    InvalidAttributeValue { attribute: String, value: String },

    #[error(transparent)]
    Schema(#[from] SchemaRejection),
}

/// Caller contract violations reported by list edit operations.
///
/// None of these leave the document modified: operations validate their
/// input before the first write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("block not found: {0}")]
    BlockNotFound(BlockId),

    #[error("block {0} is not a list block")]
    NotAListBlock(BlockId),

    #[error("{preceding} is not the list item immediately before {block}")]
    NotPreceding { block: BlockId, preceding: BlockId },

    #[error("operation requires at least one block")]
    EmptySelection,

    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl From<StoreError> for EditError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::BlockNotFound(id) => EditError::BlockNotFound(id),
            StoreError::NotAListBlock(id) => EditError::NotAListBlock(id),
            other => EditError::InvalidOperation(other.to_string()),
        }
    }
}

/// Errors raised while assembling a marker registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("marker strategy already registered: {0}")]
    DuplicateStrategy(String),

    #[error("attribute {attribute} is already claimed by marker strategy {strategy}")]
    DuplicateAttribute { attribute: String, strategy: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// The post-fixer did not converge within its pass cap.
    InvariantViolation,
    /// The converter met a flat sequence it could not render as a list.
    ConversionInconsistency,
}

/// Recoverable problem surfaced to the host instead of an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub blocks: Vec<BlockId>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, blocks: Vec<BlockId>, message: impl Into<String>) -> Self {
        Self {
            kind,
            blocks,
            message: message.into(),
        }
    }
}
