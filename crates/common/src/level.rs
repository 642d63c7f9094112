//! Level files: the configuration collaborator's on-disk form.
//!
//! ```yaml
//! entities:
//!   - class: func_forcefield
//!     args:
//!       name: push
//!       explosion: 500
//!       origin: [0, 0, 0]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::spawn_args::{ConfigError, SpawnArgs};

/// One object record as written in a level file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDef {
    pub class: String,
    #[serde(default)]
    pub args: BTreeMap<String, serde_yaml::Value>,
}

impl EntityDef {
    /// Flatten YAML scalars and numeric sequences into string spawn args.
    pub fn spawn_args(&self) -> Result<SpawnArgs, ConfigError> {
        let mut args = SpawnArgs::new();
        for (key, value) in &self.args {
            args.set(key.clone(), scalar_to_string(key, value)?);
        }
        Ok(args)
    }
}

/// A whole level: objects in spawn order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LevelDef {
    #[serde(default)]
    pub entities: Vec<EntityDef>,
}

impl LevelDef {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&text)
    }
}

fn scalar_to_string(key: &str, value: &serde_yaml::Value) -> Result<String, ConfigError> {
    use serde_yaml::Value;
    Ok(match value {
        Value::Null => String::new(),
        Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Sequence(items) => {
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Number(n) => parts.push(n.to_string()),
                    Value::String(s) => parts.push(s.clone()),
                    _ => {
                        return Err(ConfigError::UnsupportedValue {
                            key: key.to_string(),
                        });
                    }
                }
            }
            parts.join(" ")
        }
        _ => {
            return Err(ConfigError::UnsupportedValue {
                key: key.to_string(),
            });
        }
    })
}
