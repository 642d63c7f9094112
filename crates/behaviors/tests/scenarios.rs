//! Whole-world scenarios across the kernel, persistence, replication and the
//! shipped classes.

use std::sync::Arc;

use glam::Vec3;
use proptest::prelude::*;
use simkit_behaviors::damagable::EV_BREAK;
use simkit_behaviors::{class_registry, register_all};
use simkit_common::render_state::{SHADERPARM_MODE, SHADERPARM_TIMEOFFSET};
use simkit_common::{LevelDef, ObjectId, SpawnArgs, WorldConfig};
use simkit_kernel::{
    ActivationMask, ArgKind, Behavior, BehaviorError, ClassInfo, ClassRegistry, Ctx, EventArg, EventDef, Role,
    SpawnError, World,
};
use simkit_net::{ObserverId, ReplicationClient, ReplicationServer};
use simkit_persist::SaveStore;

fn config() -> WorldConfig {
    WorldConfig {
        msec_per_tick: 10,
        ..WorldConfig::default()
    }
}

fn level(doc: &str) -> (World, Vec<ObjectId>) {
    let mut world = World::new(config(), class_registry());
    let def = LevelDef::from_yaml_str(doc).expect("level yaml");
    let ids = world.load_level(&def).expect("level loads");
    (world, ids)
}

/// Pending events relative to the world clock.
fn schedule(world: &World) -> Vec<(u64, ObjectId, &'static str, String)> {
    let now = world.time_ms();
    world
        .pending_events()
        .map(|(time, e)| (time - now, e.owner, e.def.name, format!("{:?}", e.args)))
        .collect()
}

fn masks(world: &World) -> Vec<(ObjectId, ActivationMask)> {
    world.objects().map(|b| (b.id, b.mask())).collect()
}

fn fields(world: &World) -> Vec<(ObjectId, u16, String)> {
    world
        .replication_frame()
        .into_iter()
        .map(|s| (s.object, s.set.id, format!("{:?}", s.values)))
        .collect()
}

fn dump(world: &World, id: ObjectId) -> String {
    format!("{:?}", world.behavior(id).expect("behavior"))
}

const MIXED_LEVEL: &str = r#"
entities:
  - class: func_damagable
    args: { name: crate, health: 5, hideWhenBroken: 1, wait: 2 }
  - class: func_beam
    args: { name: a, target: b, origin: [0, 0, 0] }
  - class: func_beam
    args: { name: b, origin: [0, 0, 64] }
  - class: func_static
    args: { name: lamp, origin: [10, 0, 0], _color: [1, 0.5, 0] }
  - class: func_shaking
    args: { name: sign, shake: [4, 4, 4], period: 0.4 }
  - class: func_moveable
    args: { name: rock, origin: [0, 50, 0], mass: 2 }
  - class: func_spring
    args: { name: tether, ent1: rock, ent2: a, constant: 50, restlength: 20 }
"#;

#[test]
fn save_then_restore_preserves_masks_events_and_fields() {
    let (mut world, ids) = level(MIXED_LEVEL);
    world.run_frames(5);
    world.activate(ids[0], None).unwrap();
    world.run_frames(3);
    assert!(world.object(ids[0]).unwrap().hidden);
    assert!(!schedule(&world).is_empty(), "restore of the crate is pending");

    let dir = tempfile::tempdir().unwrap();
    let mut store = SaveStore::open(dir.path()).unwrap();
    store.write_slot("quick", world.tick(), &world.save().unwrap()).unwrap();
    let bytes = SaveStore::open(dir.path()).unwrap().read_slot("quick").unwrap();

    let mut restored = World::restore(&bytes, class_registry()).unwrap();
    assert_eq!(restored.time_ms(), world.time_ms());
    assert_eq!(masks(&restored), masks(&world));
    assert_eq!(schedule(&restored), schedule(&world));
    assert_eq!(fields(&restored), fields(&world));
    assert_eq!(restored.state_hash(), world.state_hash());

    world.run_frames(250);
    restored.run_frames(250);
    assert!(!restored.object(ids[0]).unwrap().hidden);
    assert_eq!(restored.state_hash(), world.state_hash());
}

#[test]
fn cancelled_break_never_fires() {
    let (mut world, ids) = level("entities:\n  - class: func_damagable\n    args: { forcestate: 2 }\n");
    let crate_id = ids[0];
    let mode = |w: &World| w.object(crate_id).unwrap().render.parm(SHADERPARM_MODE);

    world.post_event(crate_id, &EV_BREAK, 100, vec![EventArg::Object(None)]).unwrap();
    world.run_frames(5);
    assert_eq!(world.cancel_events(crate_id, &EV_BREAK), 1);
    world.run_frames(15);
    assert_eq!(mode(&world), 0.0);
}

#[test]
fn reposted_break_fires_at_the_new_time() {
    let (mut world, ids) = level("entities:\n  - class: func_damagable\n    args: { forcestate: 2 }\n");
    let crate_id = ids[0];
    let t = world.time_ms();

    world.post_event(crate_id, &EV_BREAK, 100, vec![EventArg::Object(None)]).unwrap();
    world.run_frames(5);
    assert_eq!(world.time_ms(), t + 50);
    world.cancel_events(crate_id, &EV_BREAK);
    world.post_event(crate_id, &EV_BREAK, 50, vec![EventArg::Object(None)]).unwrap();

    world.run_frames(4);
    assert_eq!(world.object(crate_id).unwrap().render.parm(SHADERPARM_MODE), 0.0);
    world.run_frame();
    let render = &world.object(crate_id).unwrap().render;
    assert_eq!(render.parm(SHADERPARM_MODE), 2.0);
    assert_eq!(render.parm(SHADERPARM_TIMEOFFSET), -((t + 100) as f32) / 1000.0);
}

#[test]
fn snapshot_changed_only_when_a_field_differs() {
    let (mut world, ids) = level(
        "entities:\n  - class: func_static\n    args: { origin: [1, 2, 3] }\n  - class: func_emitter\n",
    );
    let lamp = ids[0];
    let mut observer = World::restore(&world.save().unwrap(), class_registry()).unwrap();
    observer.set_role(Role::Observer);

    let peer = ObserverId(1);
    let mut server = ReplicationServer::new();
    server.add_observer(peer);
    let mut client = ReplicationClient::new(world.field_sets());

    let packet = server.build_packet(peer, &world.replication_frame()).unwrap().unwrap();
    let received = client.read_packet(&packet.bytes).unwrap();
    assert_eq!(received.updates.len(), 2);
    assert!(received.updates.iter().all(|u| u.changed));
    assert_eq!(observer.apply_updates(&received.updates), 2);
    server.ack(peer, packet.seq);

    world.run_frame();
    assert!(server.build_packet(peer, &world.replication_frame()).unwrap().is_none());

    world.activate(lamp, None).unwrap();
    let frame = world.replication_frame();
    let first = server.build_packet(peer, &frame).unwrap().unwrap();
    let update = client.read_packet(&first.bytes).unwrap().updates;
    assert_eq!(update.len(), 1);
    assert!(update[0].changed);
    observer.apply_updates(&update);
    assert!(observer.object(lamp).unwrap().hidden);

    // Unacked, so the server repeats it; the client already has it.
    let again = server.build_packet(peer, &frame).unwrap().unwrap();
    let repeat = client.read_packet(&again.bytes).unwrap().updates;
    assert_eq!(repeat.len(), 1);
    assert!(!repeat[0].changed);
}

static EV_ECHO: EventDef = EventDef::new("echo", &[ArgKind::Int]);
static ECHO_EVENTS: &[&EventDef] = &[&EV_ECHO];

#[derive(Debug, Default)]
struct Echo {
    heard: u32,
}

impl Behavior for Echo {
    fn spawn(&mut self, _ctx: &mut Ctx<'_>) -> Result<(), SpawnError> {
        Ok(())
    }

    fn handle_event(
        &mut self,
        ctx: &mut Ctx<'_>,
        event: &'static EventDef,
        args: &[EventArg],
    ) -> Result<bool, BehaviorError> {
        if !event.is(&EV_ECHO) {
            return Ok(false);
        }
        self.heard += 1;
        let depth = args.first().and_then(EventArg::as_int).unwrap_or(0);
        ctx.post(&EV_ECHO, 0, vec![EventArg::Int(depth + 1)])?;
        Ok(true)
    }
}

#[test]
fn zero_delay_self_post_waits_for_the_next_pass() {
    let mut classes = ClassRegistry::new();
    register_all(&mut classes);
    classes.register(ClassInfo {
        name: "test_echo",
        factory: || Box::new(Echo::default()),
        events: ECHO_EVENTS,
        field_set: None,
    });
    let mut world = World::new(config(), Arc::new(classes));
    let echo = world.spawn("test_echo", SpawnArgs::new()).unwrap();
    world.run_frame();

    world.post_event(echo, &EV_ECHO, 0, vec![EventArg::Int(0)]).unwrap();
    assert!(dump(&world, echo).contains("heard: 1"));
    assert_eq!(world.pending_event_count(), 1);
    world.run_frames(5);
    assert!(dump(&world, echo).contains("heard: 6"));
    assert_eq!(world.pending_event_count(), 1);
}

#[test]
fn physics_only_object_does_not_drift() {
    let (mut world, ids) = level("entities:\n  - class: func_moveable\n    args: { origin: [5, 6, 7] }\n");
    let prop = ids[0];
    let body = world.object(prop).unwrap().body.unwrap();
    world.run_frame();
    assert_eq!(world.mask_of(prop), ActivationMask::PHYSICS);
    assert_eq!(world.pending_event_count(), 0);

    let before = world.physics().body_state(body);
    world.run_frames(10);
    assert_eq!(world.mask_of(prop), ActivationMask::PHYSICS);
    assert_eq!(world.pending_event_count(), 0);
    assert_eq!(world.physics().body_state(body), before);
    assert_eq!(world.physics().origin(body), Some(Vec3::new(5.0, 6.0, 7.0)));
}

#[test]
fn mutual_beams_survive_save_and_restore() {
    let (mut world, ids) = level(
        r#"
entities:
  - class: func_beam
    args: { name: left, target: right, origin: [0, 0, 0] }
  - class: func_beam
    args: { name: right, target: left, origin: [100, 0, 0] }
"#,
    );
    let (left, right) = (ids[0], ids[1]);
    world.run_frame();
    for (me, other) in [(left, right), (right, left)] {
        let d = dump(&world, me);
        assert!(d.contains(&format!("target: Some({other:?})")), "{d}");
        assert!(d.contains(&format!("master: Some({other:?})")), "{d}");
    }

    let mut restored = World::restore(&world.save().unwrap(), class_registry()).unwrap();
    for (me, other) in [(left, right), (right, left)] {
        let d = dump(&restored, me);
        assert!(d.contains(&format!("target: Some({other:?})")), "{d}");
        assert!(d.contains(&format!("master: Some({other:?})")), "{d}");
    }
    assert_eq!(masks(&restored), masks(&world));

    let body = restored.object(right).unwrap().body.unwrap();
    restored.physics_mut().set_origin(body, Vec3::new(100.0, 40.0, 0.0));
    restored.run_frames(2);
    let render = &restored.object(left).unwrap().render;
    assert_eq!(render.parm(simkit_common::render_state::SHADERPARM_BEAM_END_Y), 40.0);
}

#[test]
fn explosion_field_pushes_bodies_by_distance() {
    let (mut world, ids) = level(
        r#"
entities:
  - class: func_forcefield
    args: { explosion: 500, start_on: 1, mins: [-100, -100, -100], maxs: [100, 100, 100] }
  - class: func_moveable
    args: { origin: [0, 30, 0], mass: 1 }
  - class: func_moveable
    args: { origin: [0, 80, 0], mass: 1 }
  - class: func_moveable
    args: { origin: [0, 400, 0], mass: 1 }
"#,
    );
    world.run_frame();
    let vel = |id: ObjectId| {
        let body = world.object(id).unwrap().body.unwrap();
        world.physics().linear_velocity(body).unwrap()
    };
    let (near, far, outside) = (vel(ids[1]), vel(ids[2]), vel(ids[3]));
    assert!(near.y > far.y, "near {near} far {far}");
    assert!(far.y > 0.0);
    assert_eq!(outside.y, 0.0);
}

/// Truncates the class record of every `class` object in an encoded save.
fn truncate_class_records(bytes: &[u8], class: &str, keep: usize) -> Vec<u8> {
    use ciborium::value::Value;

    let mut archive: Value = ciborium::from_reader(bytes).expect("cbor");
    let Value::Array(top) = &mut archive else { panic!("archive is not an array") };
    let Some(Value::Array(body)) = top.last_mut() else { panic!("archive has no body") };
    let mut hits = 0;
    for field in body.iter_mut() {
        let Value::Array(record) = field else { continue };
        if record.get(1) != Some(&Value::Text(class.into())) {
            continue;
        }
        let Some(Value::Array(behavior)) = record.last_mut() else { panic!("no class record") };
        behavior.truncate(keep);
        hits += 1;
    }
    assert!(hits > 0, "no {class} in the save");
    let mut out = Vec::new();
    ciborium::into_writer(&archive, &mut out).expect("cbor");
    out
}

#[test]
fn short_quake_record_falls_back_to_spawn_args() {
    let (world, ids) = level(
        r#"
entities:
  - class: info_player
  - class: func_earthquake
    args: { shakeTime: 2, playerOriented: 1 }
"#,
    );
    let quake = ids[1];
    let short = truncate_class_records(&world.save().expect("save"), "func_earthquake", 5);

    let restored = World::restore(&short, class_registry()).expect("short record restores");
    let state = dump(&restored, quake);
    assert!(state.contains("shake_time: 2.0"), "{state}");
    assert!(state.contains("player_oriented: true"), "{state}");
    assert!(state.contains("disabled: false"), "{state}");
}

#[test]
fn short_class_record_still_fails_for_required_fields() {
    let (world, _) = level("entities:\n  - class: func_earthquake\n");
    let short = truncate_class_records(&world.save().expect("save"), "func_earthquake", 2);
    assert!(World::restore(&short, class_registry()).is_err());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn cancel_before_due_time_fires_nothing(delay_ticks in 1u64..40, cancel_after in 0u64..40) {
        let cancel_after = cancel_after % delay_ticks;
        let (mut world, ids) = level("entities:\n  - class: func_damagable\n    args: { forcestate: 3 }\n");
        world.post_event(ids[0], &EV_BREAK, delay_ticks * 10, vec![EventArg::Object(None)]).unwrap();
        world.run_frames(cancel_after);
        prop_assert_eq!(world.cancel_events(ids[0], &EV_BREAK), 1);
        world.run_frames(delay_ticks * 2);
        prop_assert_eq!(world.object(ids[0]).unwrap().render.parm(SHADERPARM_MODE), 0.0);
    }

    #[test]
    fn restore_at_any_tick_matches_the_source(ticks in 0u64..60) {
        let (mut world, _) = level(MIXED_LEVEL);
        world.run_frames(ticks);
        let restored = World::restore(&world.save().unwrap(), class_registry()).unwrap();
        prop_assert_eq!(restored.state_hash(), world.state_hash());
        prop_assert_eq!(schedule(&restored), schedule(&world));
    }
}
