pub mod block;
pub mod schema;
pub mod store;

pub use block::*;
pub use schema::AttributeSchema;
pub use store::{AttributeKey, BlockStore, Change, ChangeBlock, ChangeFeed, IdSource};
