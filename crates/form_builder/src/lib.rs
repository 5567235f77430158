pub mod canvas;
pub mod client;
pub mod palette;
pub mod session;

pub use canvas::{
    Canvas, CanvasFieldInstance, CanvasId, CanvasSnapshot, DragId, DropIndicator, DropZone,
    FieldDraftConfig, FieldPatch, Gesture, Outcome,
};
pub use client::{ClientError, FormServiceClient};
pub use palette::{PaletteEntry, PaletteEntryId};
pub use session::EditorSession;
