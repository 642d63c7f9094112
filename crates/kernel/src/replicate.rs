//! Glue between the world and the net crate's replication.

use simkit_net::{FieldSetRegistry, ObjectState, Update};

use crate::ctx::ObjectView;
use crate::world::World;

impl World {
    /// Replicated state of every object that has a field set, read in one
    /// pass between ticks.
    pub fn replication_frame(&self) -> Vec<ObjectState> {
        let time_ms = self.clock.time_ms();
        let mut frame = Vec::new();
        for slot in self.objects.values() {
            let Some(behavior) = slot.behavior.as_deref() else {
                continue;
            };
            let Some(set) = behavior.field_set() else {
                continue;
            };
            let view = ObjectView {
                base: &slot.base,
                physics: self.physics.as_ref(),
                time_ms,
            };
            let mut values = Vec::with_capacity(set.len());
            behavior.write_fields(&view, &mut values);
            if values.len() != set.len() {
                tracing::warn!(
                    object = %slot.base.id,
                    set = set.name,
                    expected = set.len(),
                    found = values.len(),
                    "behavior wrote the wrong number of fields"
                );
                continue;
            }
            frame.push(ObjectState {
                object: slot.base.id,
                set,
                values,
            });
        }
        frame
    }

    /// Field sets this world's classes replicate with.
    pub fn field_sets(&self) -> FieldSetRegistry {
        self.classes.field_sets()
    }

    /// Applies decoded updates on an observer world. Updates for unknown
    /// objects or mismatched field sets are skipped. Returns how many were
    /// applied.
    pub fn apply_updates(&mut self, updates: &[Update]) -> usize {
        let mut applied = 0;
        for update in updates {
            let matches = self
                .objects
                .get(&update.object)
                .and_then(|s| s.behavior.as_deref())
                .and_then(|b| b.field_set())
                .is_some_and(|set| set.id == update.set_id);
            if !matches {
                tracing::warn!(object = %update.object, set_id = update.set_id, "no matching object for update");
                continue;
            }
            let result = self.with_behavior(update.object, |b, ctx| {
                b.apply_fields(ctx, &update.values, update.changed)
            });
            match result {
                Some(Ok(())) => applied += 1,
                Some(Err(e)) => {
                    tracing::warn!(object = %update.object, error = %e, "snapshot apply failed");
                }
                None => {}
            }
        }
        applied
    }
}
