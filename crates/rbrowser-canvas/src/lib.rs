//! Canvas host: drawable surfaces shown inside the browser page.
//!
//! The server owns canvas state (which objects, with which draw options) and
//! pushes it to canvas viewers; rendering happens client-side.

pub mod canvas;
pub mod protocol;
pub mod registry;

pub use canvas::{Canvas, Primitive};
pub use protocol::CanvasEvent;
pub use registry::CanvasRegistry;
