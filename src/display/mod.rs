//! Terminal display: surface abstraction, fixed layout and render loop.

pub mod layout;
pub mod render_loop;
pub mod surface;
pub mod terminal;

pub use render_loop::{RenderLoop, RenderState};
pub use surface::{KeyPress, Surface, TextStyle, Tone};
pub use terminal::TerminalSurface;
