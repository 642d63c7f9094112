use std::fmt::Write as _;

use glam::Vec3;
use simkit_common::ObjectId;
use simkit_common::render_state::{RenderState, SHADERPARM_MODE, SHADERPARM_TIMEOFFSET};
use simkit_kernel::World;

/// What a renderer is told about one object.
#[derive(Debug, Clone, Copy)]
pub struct Drawable<'a> {
    pub object: ObjectId,
    pub class: &'a str,
    pub origin: Vec3,
    pub hidden: bool,
    pub state: &'a RenderState,
}

/// Renderer-agnostic interface. All renderers implement this trait.
pub trait Renderer {
    /// The output type produced by this renderer.
    type Output;

    /// Draws one frame's worth of refreshed objects, in id order.
    fn render(&mut self, tick: u64, drawables: &[Drawable<'_>]) -> Self::Output;
}

/// Drains the world's pending visual updates into `renderer`. Objects removed
/// since they asked for an update are skipped.
pub fn present<R: Renderer>(world: &mut World, renderer: &mut R) -> R::Output {
    let mut ids = world.take_visual_updates();
    ids.sort();
    ids.dedup();
    let drawables: Vec<Drawable<'_>> = ids
        .into_iter()
        .filter_map(|id| {
            let base = world.object(id)?;
            let origin = base
                .body
                .and_then(|b| world.physics().origin(b))
                .unwrap_or(Vec3::ZERO);
            Some(Drawable {
                object: id,
                class: &base.class,
                origin,
                hidden: base.hidden,
                state: &base.render,
            })
        })
        .collect();
    tracing::trace!(tick = world.tick(), count = drawables.len(), "presenting");
    renderer.render(world.tick(), &drawables)
}

/// Text renderer for the CLI, logs and tests.
#[derive(Debug, Default)]
pub struct DebugTextRenderer {
    frames: u64,
}

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames rendered so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render(&mut self, tick: u64, drawables: &[Drawable<'_>]) -> String {
        self.frames += 1;
        let mut out = String::new();
        let _ = writeln!(out, "=== tick {tick}: {} updated ===", drawables.len());
        for d in drawables {
            let c = d.state.color();
            let model = if d.state.model.is_empty() { "-" } else { &d.state.model };
            let _ = writeln!(
                out,
                "  {} {} model={} pos=({:.2}, {:.2}, {:.2}) rgba=({:.2}, {:.2}, {:.2}, {:.2}) mode={} t0={:.3}{}",
                d.object,
                d.class,
                model,
                d.origin.x,
                d.origin.y,
                d.origin.z,
                c.x,
                c.y,
                c.z,
                c.w,
                d.state.parm(SHADERPARM_MODE),
                d.state.parm(SHADERPARM_TIMEOFFSET),
                if d.hidden { " hidden" } else { "" },
            );
        }
        out
    }
}
