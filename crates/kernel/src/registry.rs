use std::collections::BTreeMap;

use simkit_net::{FieldSet, FieldSetRegistry};

use crate::behavior::Behavior;
use crate::event::{EventDef, EventRegistry};

pub type Factory = fn() -> Box<dyn Behavior>;

/// Everything the kernel needs to know about one behavior class.
#[derive(Clone, Copy)]
pub struct ClassInfo {
    pub name: &'static str,
    pub factory: Factory,
    pub events: &'static [&'static EventDef],
    pub field_set: Option<&'static FieldSet>,
}

impl std::fmt::Debug for ClassInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassInfo")
            .field("name", &self.name)
            .field("events", &self.events)
            .field("field_set", &self.field_set.map(|s| s.name))
            .finish()
    }
}

/// Class name to factory, plus the events and field sets the classes use.
#[derive(Debug)]
pub struct ClassRegistry {
    classes: BTreeMap<&'static str, ClassInfo>,
    events: EventRegistry,
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self {
            classes: BTreeMap::new(),
            events: EventRegistry::with_kernel_events(),
        }
    }

    pub fn register(&mut self, info: ClassInfo) {
        for def in info.events {
            self.events.register(def);
        }
        if self.classes.insert(info.name, info).is_some() {
            tracing::warn!(class = info.name, "class registered twice; last one wins");
        }
    }

    pub fn get(&self, name: &str) -> Option<&ClassInfo> {
        self.classes.get(name)
    }

    pub fn events(&self) -> &EventRegistry {
        &self.events
    }

    pub fn class_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.classes.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Field sets of every replicated class, for an observer's client.
    pub fn field_sets(&self) -> FieldSetRegistry {
        let mut sets = FieldSetRegistry::default();
        for info in self.classes.values() {
            if let Some(set) = info.field_set {
                sets.register(set);
            }
        }
        sets
    }
}
