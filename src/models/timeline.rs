use serde::{ Deserialize, Deserializer, Serialize };
use serde_json::{ Map, Value };

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    /// Anything else the model wrote, kept verbatim.
    #[serde(untagged)]
    Other(String),
}

/// A health or milestone record lifted out of a model reply.
///
/// Only JSON typing is enforced. Dates are not parsed and unknown severities
/// survive as [`Severity::Other`]; fields the model adds beyond the known set
/// are carried in `extra` and serialized back inline. A `null` title,
/// description, date or tags list reads as empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    /// `YYYY-MM-DD HH:mm` when the model follows the instruction.
    #[serde(default, deserialize_with = "null_as_default")]
    pub date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    /// Serialized as `null` when the model gave none.
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where D: Deserializer<'de>, T: Default + Deserialize<'de>
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
