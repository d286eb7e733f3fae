use std::fmt;

use serde::de::{Error as _, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The value of a generator flag or an informational option.
///
/// A flag that takes no value is represented by `None` on the enclosing `Option<FlagValue>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Int(i64),
    Str(String),
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagValue::Int(n) => write!(f, "{n}"),
            FlagValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for FlagValue {
    fn from(value: i64) -> Self {
        FlagValue::Int(value)
    }
}

impl From<&str> for FlagValue {
    fn from(value: &str) -> Self {
        FlagValue::Str(value.to_string())
    }
}

impl From<String> for FlagValue {
    fn from(value: String) -> Self {
        FlagValue::Str(value)
    }
}

/// An ordered mapping of flag names to optional values.
///
/// Used for both the `generator` flags and the informational `options` of a control item. The
/// order the entries were authored in is kept because it becomes the argument order on the
/// generator command line. Serializes to and from a plain mapping:
///
/// ```yaml
/// generator: { --cfg: config/riscv.config, --noiss: ~, --max-instr: 50000 }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagMap(Vec<(String, Option<FlagValue>)>);

impl FlagMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, flag: &str) -> bool {
        self.0.iter().any(|(name, _)| name == flag)
    }

    /// Look up a flag. The outer `Option` is whether the flag is present, the inner one whether
    /// it carries a value.
    pub fn get(&self, flag: &str) -> Option<Option<&FlagValue>> {
        self.0
            .iter()
            .find(|(name, _)| name == flag)
            .map(|(_, value)| value.as_ref())
    }

    /// Set a flag, replacing the value in place if the flag is already present so that its
    /// position is kept.
    pub fn insert(&mut self, flag: impl Into<String>, value: Option<FlagValue>) {
        let flag = flag.into();
        match self.0.iter_mut().find(|(name, _)| *name == flag) {
            Some(entry) => entry.1 = value,
            None => self.0.push((flag, value)),
        }
    }

    /// Builder style [FlagMap::insert].
    pub fn with(mut self, flag: impl Into<String>, value: Option<FlagValue>) -> Self {
        self.insert(flag, value);
        self
    }

    /// Layer `self` over `defaults`. Flags from `defaults` come first in their original order,
    /// overridden values stay in the default's position and new flags are appended.
    pub fn over(&self, defaults: &FlagMap) -> FlagMap {
        let mut merged = defaults.clone();
        for (flag, value) in &self.0 {
            merged.insert(flag.clone(), value.clone());
        }
        merged
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&FlagValue>)> {
        self.0
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_ref()))
    }
}

impl FromIterator<(String, Option<FlagValue>)> for FlagMap {
    fn from_iter<T: IntoIterator<Item = (String, Option<FlagValue>)>>(iter: T) -> Self {
        let mut map = FlagMap::new();
        for (flag, value) in iter {
            map.insert(flag, value);
        }
        map
    }
}

impl Serialize for FlagMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (flag, value) in &self.0 {
            map.serialize_entry(flag, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FlagMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FlagMapVisitor;

        impl<'de> Visitor<'de> for FlagMapVisitor {
            type Value = FlagMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping of flag names to a string, an integer or null")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<FlagMap, A::Error> {
                let mut entries: Vec<(String, Option<FlagValue>)> =
                    Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((flag, value)) = access.next_entry::<String, Option<FlagValue>>()? {
                    if entries.iter().any(|(name, _)| *name == flag) {
                        return Err(A::Error::custom(format!("duplicate flag `{flag}`")));
                    }
                    entries.push((flag, value));
                }
                Ok(FlagMap(entries))
            }
        }

        deserializer.deserialize_map(FlagMapVisitor)
    }
}
