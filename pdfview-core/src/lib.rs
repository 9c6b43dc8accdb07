//! Engine-independent core of the viewer: coordinate mapping, the document
//! session, selection and hit-testing, annotation mutations, links and the
//! gesture controller.

pub mod annotate;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod links;
pub mod memory;
pub mod outline;
pub mod selection;
pub mod session;

pub use annotate::{AnnotationDraft, Placement, PlacementStep};
pub use config::ViewerConfig;
pub use controller::{Gesture, InputMode, Outcome, Viewer};
pub use engine::{
    document_id_for_path, AnnotationInfo, AnnotationKind, AnnotationRecord, DocumentBackend,
    DocumentId, DocumentInfo, DocumentMetadata, DocumentProvider, EmbeddedFile, LinkRecord,
    LinkTarget, OutlineEntry, PageHandle, Raster, RenderRequest, Word,
};
pub use error::{Error, Result};
pub use geometry::{Point, Rect};
pub use links::{LinkIndex, Overlay, OverlayKind};
pub use outline::OutlineNode;
pub use session::{AnnotationPopup, PageView, Session};
