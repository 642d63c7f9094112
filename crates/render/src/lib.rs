//! Visual collaborator: renderers see an object's drawable state only after
//! the object asked for a visual update.
//!
//! # Invariants
//! - Renderers cannot mutate world truth; they get borrowed snapshots.
//! - An object appears in at most one drawable per presented frame.

mod renderer;

pub use renderer::{DebugTextRenderer, Drawable, Renderer, present};
