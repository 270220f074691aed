pub mod editor;
pub mod error;
pub mod io;
pub mod lists;
pub mod model;
pub mod view;

#[cfg(test)]
pub mod tests;

// Re-export key types for easier usage
pub use editor::*;
pub use error::*;
pub use io::*;
pub use lists::{Command, CommandOutcome, ListProperties, ListQuery, PostFixer};
pub use model::*;
pub use view::{
    ConversionReport, Converter, MarkerRegistry, ModelPosition, PositionMap, ViewPosition, ViewTree,
    to_html,
};
