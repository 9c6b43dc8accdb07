//! Terminal presentation for the viewer: kitty graphics output, overlay
//! compositing, cell/canvas layout and key/mouse mapping.

pub mod compose;
pub mod input;
pub mod kitty;
pub mod layout;
pub mod panel;

pub use compose::{compose, crop_padded, Decorations, Palette};
pub use input::{CellPos, EventMapper, InputMode, MetadataField, PromptKind, UiEvent};
pub use kitty::{DrawParams, KittyRenderer};
pub use layout::{CropRegion, Viewport};
pub use panel::{draw_annotation, draw_outline, write_status_line, OutlineWindow};
