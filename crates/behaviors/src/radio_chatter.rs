//! `func_radio_chatter`: raises a player's radio indicator for a while, then
//! lowers it and passes the activation on to its targets.

use simkit_common::ObjectId;
use simkit_kernel::{
    ArgKind, Behavior, BehaviorError, Capabilities, ClassInfo, Ctx, EventArg, EventDef, ObjectBase, SpawnError,
};
use simkit_persist::{ArchiveError, RestoreReader, SaveWriter};

/// Chatter is over; the argument is the listening player.
pub static EV_RESET_RADIO: EventDef = EventDef::new("<resetradiohud>", &[ArgKind::Object]);

static EVENTS: &[&EventDef] = &[&EV_RESET_RADIO];

pub fn class() -> ClassInfo {
    ClassInfo {
        name: "func_radio_chatter",
        factory: || Box::new(RadioChatter::default()),
        events: EVENTS,
        field_set: None,
    }
}

#[derive(Debug, Default)]
pub struct RadioChatter {
    /// Seconds the indicator stays up.
    time: f32,
    /// Player whose indicator is up, if any.
    listener: Option<ObjectId>,
}

impl RadioChatter {
    fn listener_for(ctx: &Ctx<'_>, activator: Option<ObjectId>) -> Option<ObjectId> {
        activator
            .filter(|a| ctx.has_capability(*a, Capabilities::PLAYER))
            .or_else(|| ctx.objects_with(Capabilities::PLAYER).first().copied())
    }
}

impl Behavior for RadioChatter {
    fn spawn(&mut self, ctx: &mut Ctx<'_>) -> Result<(), SpawnError> {
        self.time = ctx.args().get_float("time", 5.0);
        self.listener = None;
        Ok(())
    }

    fn activate(&mut self, ctx: &mut Ctx<'_>, activator: Option<ObjectId>) -> Result<(), BehaviorError> {
        let Some(player) = Self::listener_for(ctx, activator) else {
            tracing::warn!(object = %ctx.id(), "radio chatter with no player");
            return Ok(());
        };
        self.listener = Some(player);
        tracing::debug!(object = %ctx.id(), %player, seconds = self.time, "radio chatter up");
        // A second trigger stretches the current chatter rather than stacking.
        ctx.cancel(&EV_RESET_RADIO);
        ctx.post_sec(&EV_RESET_RADIO, self.time, vec![EventArg::Object(Some(player))])?;
        Ok(())
    }

    fn handle_event(
        &mut self,
        ctx: &mut Ctx<'_>,
        event: &'static EventDef,
        args: &[EventArg],
    ) -> Result<bool, BehaviorError> {
        if !event.is(&EV_RESET_RADIO) {
            return Ok(false);
        }
        let player = args.first().and_then(EventArg::as_object);
        self.listener = None;
        tracing::debug!(object = %ctx.id(), "radio chatter down");
        ctx.activate_targets(player);
        Ok(true)
    }

    fn save(&self, w: &mut SaveWriter) {
        w.write_float(self.time);
        w.write_object(self.listener);
    }

    fn restore(&mut self, _base: &ObjectBase, r: &mut RestoreReader) -> Result<(), ArchiveError> {
        self.time = r.read_float()?;
        self.listener = r.read_object_or(None)?;
        Ok(())
    }

    fn relink(&mut self, live: &dyn Fn(ObjectId) -> bool) {
        self.listener = self.listener.filter(|p| live(*p));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{dump, spawn_all, world};
    use simkit_kernel::World;

    fn scene() -> (World, Vec<ObjectId>) {
        let mut w = world();
        let ids = spawn_all(
            &mut w,
            &[
                ("info_player", &[("name", "player")]),
                ("func_radio_chatter", &[("time", "0.5"), ("target", "lamp")]),
                ("func_static", &[("name", "lamp")]),
            ],
        );
        (w, ids)
    }

    #[test]
    fn chatter_ends_then_activates_targets() {
        let (mut w, ids) = scene();
        let (player, radio, lamp) = (ids[0], ids[1], ids[2]);
        w.activate(radio, None).unwrap();
        assert!(dump(&w, radio).contains(&format!("listener: Some({player:?})")));
        assert!(w.has_pending(radio, &EV_RESET_RADIO));

        w.run_frames(49);
        assert!(!w.object(lamp).unwrap().hidden);
        assert!(dump(&w, radio).contains("listener: Some"));

        w.run_frames(2);
        assert!(dump(&w, radio).contains("listener: None"));
        // func_static toggles visibility when activated.
        w.run_frame();
        assert!(w.object(lamp).unwrap().hidden);
    }

    #[test]
    fn retrigger_restarts_the_timer() {
        let (mut w, ids) = scene();
        let radio = ids[1];
        w.activate(radio, None).unwrap();
        w.run_frames(30);
        w.activate(radio, None).unwrap();
        assert_eq!(w.pending_events().filter(|(_, e)| e.owner == radio).count(), 1);
        w.run_frames(40);
        assert!(dump(&w, radio).contains("listener: Some"));
    }

    #[test]
    fn pending_chatter_survives_save_and_restore() {
        let (mut w, ids) = scene();
        let radio = ids[1];
        w.activate(radio, None).unwrap();
        w.run_frames(10);

        let mut restored = World::restore(&w.save().unwrap(), crate::class_registry()).unwrap();
        assert_eq!(dump(&restored, radio), dump(&w, radio));
        assert!(restored.has_pending(radio, &EV_RESET_RADIO));
        restored.run_frames(45);
        assert!(dump(&restored, radio).contains("listener: None"));
    }
}
