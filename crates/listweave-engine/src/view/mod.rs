//! The rendered side: view tree, incremental converter, marker strategies,
//! position mapping and HTML output.

pub mod convert;
pub mod html;
pub mod marker;
pub mod position;
pub mod tree;

pub use convert::{ConversionReport, Converter};
pub use html::to_html;
pub use marker::{ItemContext, MarkerDescriptor, MarkerRegistry, MarkerTarget, Placement};
pub use position::{ModelPosition, PositionMap, ViewPosition};
pub use tree::{ContentNode, ItemChild, ItemNode, ListNode, MarkerNode, ViewId, ViewNode, ViewTree};
