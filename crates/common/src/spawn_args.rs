use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::random::SimRandom;

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("missing required key '{key}'")]
    MissingKey { key: String },
    #[error("key '{key}' has unsupported value type")]
    UnsupportedValue { key: String },
}

/// Immutable key/value configuration of one spawned object.
///
/// Values are kept as strings, the way the map format stores them, and parsed
/// on access. Accessors take a default that is used when the key is missing;
/// a present but unparsable value also falls back to the default with a
/// warning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpawnArgs {
    pairs: BTreeMap<String, String>,
}

impl SpawnArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Builder-style insert, used while constructing a record.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.get(key).map(String::as_str)
    }

    pub fn has(&self, key: &str) -> bool {
        self.pairs.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn get_string<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// A required string key. Missing keys are fatal for the spawn.
    pub fn require_string(&self, key: &str) -> Result<&str, ConfigError> {
        self.get(key).ok_or_else(|| ConfigError::MissingKey {
            key: key.to_string(),
        })
    }

    pub fn find_float(&self, key: &str) -> Option<f32> {
        let raw = self.get(key)?;
        match raw.trim().parse::<f32>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(key, value = raw, "expected a float");
                None
            }
        }
    }

    pub fn get_float(&self, key: &str, default: f32) -> f32 {
        self.find_float(key).unwrap_or(default)
    }

    pub fn find_int(&self, key: &str) -> Option<i32> {
        let raw = self.get(key)?.trim();
        if let Ok(v) = raw.parse::<i32>() {
            return Some(v);
        }
        match raw.parse::<f32>() {
            Ok(v) => Some(v as i32),
            Err(_) => {
                tracing::warn!(key, value = raw, "expected an integer");
                None
            }
        }
    }

    pub fn get_int(&self, key: &str, default: i32) -> i32 {
        self.find_int(key).unwrap_or(default)
    }

    pub fn find_bool(&self, key: &str) -> Option<bool> {
        let raw = self.get(key)?.trim();
        Some(match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "" | "0" | "false" | "no" | "off" => false,
            other => other.parse::<f32>().map(|v| v != 0.0).unwrap_or(false),
        })
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.find_bool(key).unwrap_or(default)
    }

    pub fn find_vector(&self, key: &str) -> Option<Vec3> {
        let parts = self.find_floats::<3>(key)?;
        Some(Vec3::from_array(parts))
    }

    pub fn get_vector(&self, key: &str, default: Vec3) -> Vec3 {
        self.find_vector(key).unwrap_or(default)
    }

    pub fn get_vec4(&self, key: &str, default: Vec4) -> Vec4 {
        self.find_floats::<4>(key)
            .map(Vec4::from_array)
            .unwrap_or(default)
    }

    /// Angles are stored as "pitch yaw roll" in degrees.
    pub fn get_angles(&self, key: &str, default: Vec3) -> Vec3 {
        self.get_vector(key, default)
    }

    /// All keys starting with `prefix`, in key order.
    pub fn matching_prefix<'a, 'b>(&'a self, prefix: &'b str) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.pairs
            .range(prefix.to_string()..)
            .take_while(move |(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// A random non-empty value among keys starting with `prefix`.
    pub fn random_prefix(&self, prefix: &str, random: &mut SimRandom) -> Option<&str> {
        let values: Vec<&str> = self
            .matching_prefix(prefix)
            .map(|(_, v)| v)
            .filter(|v| !v.is_empty())
            .collect();
        if values.is_empty() {
            return None;
        }
        let which = random.random_int(values.len() as i32) as usize;
        Some(values[which])
    }

    fn find_floats<const N: usize>(&self, key: &str) -> Option<[f32; N]> {
        let raw = self.get(key)?;
        let mut out = [0.0; N];
        let mut parts = raw.split_whitespace();
        for slot in &mut out {
            match parts.next().map(str::parse::<f32>) {
                Some(Ok(v)) => *slot = v,
                _ => {
                    tracing::warn!(key, value = raw, components = N, "expected a vector");
                    return None;
                }
            }
        }
        Some(out)
    }
}
