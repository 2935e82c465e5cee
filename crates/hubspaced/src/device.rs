//! Device model shared by the resolver, the instantiator and the entities.
//!
//! A physical Hubspace unit is described once by a [`DeviceIdentity`] and may
//! back several entities (e.g. the two sockets of a smart plug). Sibling
//! entities share the identity through an `Arc` and differ only in their
//! [`EntityRole`].

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Identity of a vendor child device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Vendor-assigned id of the controllable child. Immutable.
    pub child_id: String,

    /// Id of the physical unit, shared by every entity derived from it.
    pub device_id: String,

    /// Vendor model code (e.g. "HPKA315CWB").
    pub model: String,

    /// Vendor category string (e.g. "power-outlet").
    pub device_class: String,

    /// Name the user gave the device in the vendor app.
    pub friendly_name: String,
}

/// One function exposed by a vendor device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    /// Function key, e.g. "power", "fan-speed", "toggle".
    pub function_class: String,

    /// Optional sub-scope, e.g. "toggle-2" or "fan-power".
    #[serde(default)]
    pub function_instance: Option<String>,

    /// Vendor function id.
    #[serde(default)]
    pub id: String,
}

impl FunctionDescriptor {
    pub fn new(function_class: &str, function_instance: Option<&str>) -> Self {
        Self {
            function_class: function_class.to_string(),
            function_instance: function_instance.map(str::to_string),
            id: String::new(),
        }
    }
}

/// A device as returned by vendor discovery: identity plus its functions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryRecord {
    #[serde(flatten)]
    pub identity: DeviceIdentity,
    #[serde(default)]
    pub functions: Vec<FunctionDescriptor>,
}

/// Partial identity returned when resolving a device by its friendly name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRef {
    pub child_id: String,
    pub model: String,
    pub device_id: String,
    pub device_class: String,
}

impl ChildRef {
    /// Complete the reference with the name it was resolved from.
    pub fn into_identity(self, friendly_name: &str) -> DeviceIdentity {
        DeviceIdentity {
            child_id: self.child_id,
            device_id: self.device_id,
            model: self.model,
            device_class: self.device_class,
            friendly_name: friendly_name.to_string(),
        }
    }
}

/// Logical role one entity plays for its physical device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum EntityRole {
    Light,
    Lock,
    /// A switched socket, identified by its index on the unit.
    Outlet(String),
    /// A switched zone of a landscape transformer.
    Transformer(String),
    Fan,
}

impl EntityRole {
    /// Host platform the entity is registered under.
    pub fn platform(&self) -> Platform {
        match self {
            Self::Light => Platform::Light,
            Self::Lock => Platform::Lock,
            Self::Outlet(_) | Self::Transformer(_) => Platform::Switch,
            Self::Fan => Platform::Fan,
        }
    }

    /// Suffix used to disambiguate siblings on one physical unit.
    pub fn name_suffix(&self) -> String {
        match self {
            Self::Light => "_light".to_string(),
            Self::Lock => "_lock".to_string(),
            Self::Outlet(index) => format!("_outlet_{}", index),
            Self::Transformer(index) => format!("_transformer_{}", index),
            Self::Fan => "_fan".to_string(),
        }
    }
}

impl fmt::Display for EntityRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Light => write!(f, "Light"),
            Self::Lock => write!(f, "Lock"),
            Self::Outlet(index) => write!(f, "Outlet({})", index),
            Self::Transformer(index) => write!(f, "Transformer({})", index),
            Self::Fan => write!(f, "Fan"),
        }
    }
}

/// Host platform an entity belongs to, used as the entity id prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Light,
    Lock,
    Switch,
    Fan,
}
