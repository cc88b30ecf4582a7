use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;

/// Ordered association between user fields and column names.
///
/// Entries keep the order in which they appear in the document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mapper {
    entries: Vec<MapperEntry>,
}

impl Mapper {
    pub fn entries(&self) -> &[MapperEntry] {
        &self.entries
    }

    pub fn get(&self, field: &str) -> Option<&MapperTarget> {
        self.entries
            .iter()
            .find(|entry| entry.field == field)
            .map(|entry| &entry.target)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapperEntry {
    pub field: String,
    pub target: MapperTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapperTarget {
    /// A single column holding a scalar field.
    Column(String),
    /// Several columns populating distinct keys of the attribute mapping.
    Attributes(Vec<AttributePair>),
}

/// A `{key, value}` pair. Both halves are optional at parse time so that a
/// malformed entry is reported by the consumer with its position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AttributePair {
    #[serde(default, deserialize_with = "optional_scalar")]
    pub key: Option<String>,
    #[serde(default, deserialize_with = "optional_scalar")]
    pub value: Option<String>,
}

impl AttributePair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            value: Some(value.into()),
        }
    }
}

impl<'de> Deserialize<'de> for Mapper {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(MapperVisitor)
    }
}

struct MapperVisitor;

impl<'de> Visitor<'de> for MapperVisitor {
    type Value = Mapper;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a mapping from user field to column name or attribute list")
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Mapper::default())
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));

        while let Some((field, raw)) = access.next_entry::<String, serde_yaml::Value>()? {
            let target = match raw {
                serde_yaml::Value::Sequence(items) => {
                    let pairs = items
                        .into_iter()
                        .map(serde_yaml::from_value::<AttributePair>)
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(de::Error::custom)?;
                    MapperTarget::Attributes(pairs)
                }
                other => match scalar_to_string(&other) {
                    Some(column) => MapperTarget::Column(column),
                    None => {
                        return Err(de::Error::custom(format!(
                            "mapper entry '{field}' must be a column name or a list of key/value pairs"
                        )))
                    }
                },
            };
            entries.push(MapperEntry { field, target });
        }

        Ok(Mapper { entries })
    }
}

pub(crate) fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(text) => Some(text.clone()),
        serde_yaml::Value::Number(number) => Some(number.to_string()),
        serde_yaml::Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn optional_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_yaml::Value>::deserialize(deserializer)? {
        None | Some(serde_yaml::Value::Null) => Ok(None),
        Some(value) => scalar_to_string(&value)
            .map(Some)
            .ok_or_else(|| de::Error::custom("expected a scalar value")),
    }
}
