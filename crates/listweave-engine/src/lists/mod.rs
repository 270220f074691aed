//! The list subsystem: traversal, queries, structural edits, the
//! consistency post-fixer and the editing commands built on top of them.

pub mod commands;
pub mod edit;
pub mod postfix;
pub mod query;
pub mod walker;

pub use commands::{Command, CommandOutcome, ListProperties};
pub use edit::EditOutcome;
pub use postfix::{FixReport, InvariantBreach, PostFixer, invariant_breaches};
pub use query::{ItemBlocks, ListQuery};
pub use walker::{Direction, ListWalker, WalkerOptions};
