//! Inbound `send_command` payloads.

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;

/// A raw function write addressed to one or more entities.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SendCommand {
    /// Target entity ids; a single string is accepted as a one-element list.
    #[serde(deserialize_with = "one_or_many")]
    pub entity_id: Vec<String>,

    pub function_class: String,

    /// Value written verbatim to the vendor as a string.
    pub value: String,

    /// Requested function instance. Entities that own an instance for
    /// `function_class` ignore this.
    #[serde(default)]
    pub function_instance: Option<String>,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(id) => vec![id],
        OneOrMany::Many(ids) => ids,
    })
}

/// Outcome of dispatching one command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Entities that received their write.
    pub written: Vec<String>,

    /// Entities that matched but whose write failed.
    pub failed: Vec<String>,

    /// Entities that matched but do not own the addressed function.
    pub skipped: Vec<String>,

    /// Requested ids that matched no entity.
    pub unmatched: Vec<String>,
}
