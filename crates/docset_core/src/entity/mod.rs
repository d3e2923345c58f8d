//! Entities, change tracking and the attachment registry.

mod handle;
mod registry;
mod tracked;

pub use handle::EntityRef;
pub use registry::AttachmentRegistry;
pub use tracked::{Entity, DIRTY_MARKER, TRACKED_MARKER};
