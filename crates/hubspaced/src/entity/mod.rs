//! Entities exposed to the host.
//!
//! An [`Entity`] is one controllable aspect of a vendor device: a light, a
//! fan, one socket of a plug, one zone of a transformer, or a lock. Siblings
//! derived from one physical unit share the same `Arc<DeviceIdentity>`; each
//! keeps its own function-instance scope so writes never cross over.

mod fan;
mod light;
mod lock;
mod switch;

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

use crate::device::DeviceIdentity;
use crate::device::EntityRole;
use crate::device::Platform;
use crate::encoding::EncodingError;
use crate::encoding::FanSpeed;
use crate::encoding::LockState;
use crate::encoding::PowerState;
use crate::vendor::VendorClient;
use crate::vendor::VendorError;

/// Last known state of an entity.
///
/// Fields that do not apply to the entity's role stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityState {
    pub power: Option<PowerState>,

    /// Raw fan speed percentage as last reported.
    pub percentage: Option<u8>,

    /// Fan speed preset covering `percentage`; `None` when stopped.
    pub preset: Option<FanSpeed>,

    /// Brightness, 0-100.
    pub brightness: Option<u8>,

    pub lock: Option<LockState>,

    /// Raw vendor state, only collected when debugging is enabled.
    pub debug_info: Option<serde_json::Value>,

    /// Set when the last refresh could not read or decode every value.
    pub stale: bool,
}

/// Entity-level services, as opposed to raw function writes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "service", rename_all = "snake_case")]
pub enum Service {
    TurnOn {
        #[serde(default)]
        percentage: Option<u8>,
        #[serde(default)]
        brightness: Option<u8>,
    },
    TurnOff,
    Lock,
    Unlock,
}

#[derive(Debug, thiserror::Error)]
pub enum EntityError {
    #[error(transparent)]
    Vendor(#[from] VendorError),

    #[error("{entity_id} does not support {service}")]
    Unsupported {
        entity_id: String,
        service: &'static str,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] EncodingError),

    #[error("{entity_id} does not own {function_class}/{function_instance:?}")]
    NotOwned {
        entity_id: String,
        function_class: String,
        function_instance: Option<String>,
    },
}

/// Where an external write for one function class lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WriteScope {
    /// Write to this instance; `None` addresses the class without one.
    Own(Option<String>),

    /// The function belongs to a sibling on the same unit.
    Sibling,
}

/// A single function read and how to fold its value into the state.
pub(crate) struct StateRead {
    pub function_class: &'static str,
    pub function_instance: Option<String>,
    pub apply: fn(&mut EntityState, &serde_json::Value) -> Result<(), EncodingError>,
}

/// A single function write.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StateWrite {
    pub function_class: &'static str,
    pub function_instance: Option<String>,
    pub value: serde_json::Value,
}

/// A controllable entity bound to one vendor child.
#[derive(Debug, Clone)]
pub struct Entity {
    /// Host entity id, e.g. "switch.patio_plug_outlet_1".
    pub entity_id: String,

    /// Display name.
    pub name: String,

    /// Identity shared with sibling entities.
    pub identity: Arc<DeviceIdentity>,

    pub role: EntityRole,

    /// Fixed function instance for this entity's power writes, if any.
    pub power_instance: Option<String>,

    /// Whether the device exposes a `brightness` function.
    pub supports_brightness: bool,

    /// Collect debug snapshots on refresh.
    pub debug: bool,

    pub state: EntityState,
}

impl Entity {
    pub fn platform(&self) -> Platform {
        self.role.platform()
    }

    pub fn child_id(&self) -> &str {
        &self.identity.child_id
    }

    /// Function instance to use when writing `function_class` on behalf of
    /// an external command.
    ///
    /// Role-specific entities always write to their own instance. The
    /// caller's instance only passes through for instance-generic entities
    /// and for a combo light's own non-fan functions. Functions owned by a
    /// sibling on the same unit are refused.
    pub fn command_instance(
        &self,
        function_class: &str,
        requested: Option<&str>,
    ) -> Result<Option<String>, EntityError> {
        let scope = match &self.role {
            EntityRole::Outlet(index) | EntityRole::Transformer(index) => {
                WriteScope::Own(Some(switch::instance(index)))
            }
            EntityRole::Fan => fan::command_instance(function_class),
            EntityRole::Light => {
                light::command_instance(self.power_instance.as_deref(), function_class, requested)
            }
            EntityRole::Lock => WriteScope::Own(requested.map(str::to_string)),
        };

        match scope {
            WriteScope::Own(instance) => Ok(instance),
            WriteScope::Sibling => Err(EntityError::NotOwned {
                entity_id: self.entity_id.clone(),
                function_class: function_class.to_string(),
                function_instance: requested.map(str::to_string),
            }),
        }
    }

    fn reads(&self) -> Vec<StateRead> {
        match &self.role {
            EntityRole::Light => light::reads(self),
            EntityRole::Fan => fan::reads(),
            EntityRole::Outlet(index) | EntityRole::Transformer(index) => switch::reads(index),
            EntityRole::Lock => lock::reads(),
        }
    }

    fn plan(&self, service: &Service) -> Result<Vec<StateWrite>, EntityError> {
        let plan = match &self.role {
            EntityRole::Light => light::plan(self, service)?,
            EntityRole::Fan => fan::plan(&self.state, service)?,
            EntityRole::Outlet(index) | EntityRole::Transformer(index) => {
                switch::plan(index, service)
            }
            EntityRole::Lock => lock::plan(service),
        };

        plan.ok_or_else(|| EntityError::Unsupported {
            entity_id: self.entity_id.clone(),
            service: service.name(),
        })
    }

    /// Re-read the entity's functions from the vendor.
    ///
    /// Values that cannot be read or decoded keep their previous value and
    /// mark the entity stale; nothing here is fatal.
    pub async fn refresh(&mut self, client: &dyn VendorClient) {
        let mut stale = false;

        for read in self.reads() {
            let value = match client
                .read_state(
                    self.child_id(),
                    read.function_class,
                    read.function_instance.as_deref(),
                )
                .await
            {
                Ok(v) => v,
                Err(e) => {
                    warn!(
                        "Failed to read {}/{:?} for {}: {}",
                        read.function_class, read.function_instance, self.entity_id, e
                    );
                    stale = true;
                    continue;
                }
            };

            if let Err(e) = (read.apply)(&mut self.state, &value) {
                warn!(
                    "Failed to decode {}/{:?} for {}: {}",
                    read.function_class, read.function_instance, self.entity_id, e
                );
                stale = true;
            }
        }

        if self.debug {
            match client.debug_snapshot(self.child_id()).await {
                Ok(info) => self.state.debug_info = Some(info),
                Err(e) => {
                    warn!("Failed to fetch debug info for {}: {}", self.entity_id, e);
                    stale = true;
                }
            }
        }

        self.state.stale = stale;
    }

    /// Run an entity-level service and re-read the entity afterwards.
    ///
    /// The first failed write stops the sequence. The entity is re-read
    /// either way, so a partially applied service is reflected in the cache.
    pub async fn call_service(
        &mut self,
        client: &dyn VendorClient,
        service: &Service,
    ) -> Result<(), EntityError> {
        let writes = self.plan(service)?;
        debug!("{} {}: {:?}", self.entity_id, service.name(), writes);

        let mut result = Ok(());
        for write in writes {
            if let Err(e) = client
                .write_state(
                    self.child_id(),
                    write.function_class,
                    write.function_instance.as_deref(),
                    write.value,
                )
                .await
            {
                warn!("{} {} failed: {}", self.entity_id, service.name(), e);
                result = Err(e.into());
                break;
            }
        }

        self.refresh(client).await;
        result
    }

    pub fn snapshot(&self) -> EntitySnapshot {
        EntitySnapshot {
            entity_id: self.entity_id.clone(),
            name: self.name.clone(),
            platform: self.platform(),
            role: self.role.clone(),
            child_id: self.identity.child_id.clone(),
            device_id: self.identity.device_id.clone(),
            model: self.identity.model.clone(),
            state: self.state.clone(),
        }
    }
}

impl Service {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TurnOn { .. } => "turn_on",
            Self::TurnOff => "turn_off",
            Self::Lock => "lock",
            Self::Unlock => "unlock",
        }
    }
}

/// Serializable view of an entity for the API.
#[derive(Debug, Clone, Serialize)]
pub struct EntitySnapshot {
    pub entity_id: String,
    pub name: String,
    pub platform: Platform,
    pub role: EntityRole,
    pub child_id: String,
    pub device_id: String,
    pub model: String,
    pub state: EntityState,
}

/// Lower-case a display name into an entity id object part.
///
/// ASCII alphanumerics are kept; any other run of characters collapses to a
/// single `_`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("unnamed");
    }
    slug
}

#[cfg(test)]
pub(crate) mod tests {
    use serde_json::json;

    use super::*;
    use crate::vendor::mock::MockVendorClient;
    use crate::vendor::mock::RecordedWrite;

    pub(crate) fn identity(child_id: &str, model: &str, device_class: &str) -> Arc<DeviceIdentity> {
        Arc::new(DeviceIdentity {
            child_id: child_id.to_string(),
            device_id: format!("dev-{}", child_id),
            model: model.to_string(),
            device_class: device_class.to_string(),
            friendly_name: "Test Device".to_string(),
        })
    }

    pub(crate) fn entity(role: EntityRole, power_instance: Option<&str>) -> Entity {
        Entity {
            entity_id: format!("{}.test", role.platform()),
            name: "Test".to_string(),
            identity: identity("c1", "M", "class"),
            role,
            power_instance: power_instance.map(str::to_string),
            supports_brightness: false,
            debug: false,
            state: EntityState::default(),
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Living Room Fan"), "living_room_fan");
        assert_eq!(slugify("Patio Plug_outlet_1"), "patio_plug_outlet_1");
        assert_eq!(slugify("  Kid's  room!! "), "kid_s_room");
        assert_eq!(slugify("***"), "unnamed");
    }

    #[test]
    fn test_service_deserialize() {
        let service: Service =
            serde_json::from_value(json!({"service": "turn_on", "percentage": 50})).unwrap();
        assert_eq!(
            service,
            Service::TurnOn {
                percentage: Some(50),
                brightness: None
            }
        );

        let service: Service = serde_json::from_value(json!({"service": "unlock"})).unwrap();
        assert_eq!(service, Service::Unlock);
    }

    #[tokio::test]
    async fn test_refresh_fan() {
        let client = MockVendorClient::new();
        client.set_state("c1", "power", Some("fan-power"), json!("on"));
        client.set_state("c1", "fan-speed", Some("fan-speed"), json!("fan-speed-075"));

        let mut fan = entity(EntityRole::Fan, None);
        fan.refresh(&client).await;

        assert_eq!(fan.state.power, Some(PowerState::On));
        assert_eq!(fan.state.percentage, Some(75));
        assert_eq!(fan.state.preset, Some(FanSpeed::High));
        assert!(!fan.state.stale);
    }

    #[tokio::test]
    async fn test_refresh_malformed_speed_keeps_state() {
        let client = MockVendorClient::new();
        client.set_state("c1", "power", Some("fan-power"), json!("on"));
        client.set_state("c1", "fan-speed", Some("fan-speed"), json!("fan-speed-050"));

        let mut fan = entity(EntityRole::Fan, None);
        fan.refresh(&client).await;
        assert_eq!(fan.state.preset, Some(FanSpeed::Medium));

        client.set_state("c1", "fan-speed", Some("fan-speed"), json!("fan-speed-abc"));
        fan.refresh(&client).await;

        assert_eq!(fan.state.preset, Some(FanSpeed::Medium));
        assert_eq!(fan.state.percentage, Some(50));
        assert_eq!(fan.state.power, Some(PowerState::On));
        assert!(fan.state.stale);
    }

    #[tokio::test]
    async fn test_refresh_failed_read_keeps_state() {
        let client = MockVendorClient::new();
        client.set_state("c1", "toggle", Some("toggle-2"), json!("on"));

        let mut outlet = entity(EntityRole::Outlet("2".to_string()), None);
        outlet.refresh(&client).await;
        assert_eq!(outlet.state.power, Some(PowerState::On));

        client.set_fail_reads(true);
        outlet.refresh(&client).await;
        assert_eq!(outlet.state.power, Some(PowerState::On));
        assert!(outlet.state.stale);

        client.set_fail_reads(false);
        outlet.refresh(&client).await;
        assert!(!outlet.state.stale);
    }

    #[tokio::test]
    async fn test_refresh_idempotent() {
        let client = MockVendorClient::new();
        client.set_state("c1", "power", None, json!("on"));
        client.set_state("c1", "brightness", None, json!(60));

        let mut light = entity(EntityRole::Light, None);
        light.supports_brightness = true;

        light.refresh(&client).await;
        let first = light.state.clone();
        for _ in 0..3 {
            light.refresh(&client).await;
            assert_eq!(light.state, first);
        }
        assert_eq!(first.brightness, Some(60));
    }

    #[tokio::test]
    async fn test_refresh_collects_debug_info() {
        let client = MockVendorClient::new().with_device(crate::vendor::mock::record(
            "c1",
            "dev-c1",
            "M",
            "door-lock",
            "Front Door",
            &[],
        ));
        client.set_state("c1", "lock-control", None, json!("locked"));

        let mut lock = entity(EntityRole::Lock, None);
        lock.debug = true;
        lock.refresh(&client).await;

        assert_eq!(lock.state.lock, Some(LockState::Locked));
        assert_eq!(lock.state.debug_info.as_ref().unwrap()["child_id"], "c1");
        assert_eq!(client.call_count("debug_snapshot"), 1);
        assert!(!lock.state.stale);
    }

    #[tokio::test]
    async fn test_refresh_failed_debug_info_marks_stale() {
        // No device registered, so the snapshot lookup fails.
        let client = MockVendorClient::new();
        client.set_state("c1", "lock-control", None, json!("locked"));

        let mut lock = entity(EntityRole::Lock, None);
        lock.debug = true;
        lock.refresh(&client).await;

        assert_eq!(lock.state.lock, Some(LockState::Locked));
        assert_eq!(lock.state.debug_info, None);
        assert!(lock.state.stale);
    }

    #[tokio::test]
    async fn test_partial_service_refreshes() {
        let client = MockVendorClient::new();
        client.set_state("c1", "power", Some("fan-power"), json!("off"));
        client.set_state("c1", "fan-speed", Some("fan-speed"), json!("fan-speed-000"));

        let mut fan = entity(EntityRole::Fan, None);
        fan.refresh(&client).await;
        assert_eq!(fan.state.power, Some(PowerState::Off));

        // Power goes through, the speed write is rejected.
        client.set_write_budget(Some(1));
        let result = fan
            .call_service(
                &client,
                &Service::TurnOn {
                    percentage: Some(50),
                    brightness: None,
                },
            )
            .await;

        assert!(matches!(
            result,
            Err(EntityError::Vendor(VendorError::Rejected(_)))
        ));
        assert_eq!(client.writes().len(), 1);
        assert_eq!(fan.state.power, Some(PowerState::On));
        assert_eq!(fan.state.preset, None);
        assert!(!fan.state.stale);
    }

    #[tokio::test]
    async fn test_brightness_out_of_range_rejected() {
        let client = MockVendorClient::new();
        let mut light = entity(EntityRole::Light, None);
        light.supports_brightness = true;

        let result = light
            .call_service(
                &client,
                &Service::TurnOn {
                    percentage: None,
                    brightness: Some(101),
                },
            )
            .await;

        assert!(matches!(result, Err(EntityError::InvalidArgument(_))));
        assert!(client.writes().is_empty());
    }

    #[tokio::test]
    async fn test_fan_turn_on_and_off() {
        let client = MockVendorClient::new();
        let mut fan = entity(EntityRole::Fan, None);

        fan.call_service(
            &client,
            &Service::TurnOn {
                percentage: Some(60),
                brightness: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(
            client.writes(),
            vec![
                RecordedWrite {
                    child_id: "c1".to_string(),
                    function_class: "power".to_string(),
                    function_instance: Some("fan-power".to_string()),
                    value: json!("on"),
                },
                RecordedWrite {
                    child_id: "c1".to_string(),
                    function_class: "fan-speed".to_string(),
                    function_instance: Some("fan-speed".to_string()),
                    value: json!("fan-speed-075"),
                },
            ]
        );
        // Re-read after the write.
        assert_eq!(fan.state.preset, Some(FanSpeed::High));

        client.clear_writes();
        fan.call_service(&client, &Service::TurnOff).await.unwrap();
        let writes = client.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[1].value, json!("fan-speed-000"));
        assert_eq!(fan.state.power, Some(PowerState::Off));
        assert_eq!(fan.state.preset, None);
    }

    #[tokio::test]
    async fn test_unsupported_service() {
        let client = MockVendorClient::new();
        let mut outlet = entity(EntityRole::Outlet("1".to_string()), None);

        let result = outlet.call_service(&client, &Service::Lock).await;
        assert!(matches!(
            result,
            Err(EntityError::Unsupported {
                service: "lock",
                ..
            })
        ));
        assert!(client.writes().is_empty());
    }

    #[test]
    fn test_command_instance_scoping() {
        let outlet = entity(EntityRole::Outlet("2".to_string()), None);
        assert_eq!(
            outlet.command_instance("toggle", Some("toggle-1")).unwrap(),
            Some("toggle-2".to_string())
        );

        let fan = entity(EntityRole::Fan, None);
        assert_eq!(
            fan.command_instance("power", Some("light-power")).unwrap(),
            Some("fan-power".to_string())
        );
        assert_eq!(
            fan.command_instance("fan-direction", Some("light-power")).unwrap(),
            Some("fan-direction".to_string())
        );
        assert!(matches!(
            fan.command_instance("brightness", None),
            Err(EntityError::NotOwned { .. })
        ));

        let combo_light = entity(EntityRole::Light, Some("light-power"));
        assert_eq!(
            combo_light.command_instance("power", None).unwrap(),
            Some("light-power".to_string())
        );
        assert!(matches!(
            combo_light.command_instance("fan-speed", Some("fan-speed")),
            Err(EntityError::NotOwned { .. })
        ));
        assert!(matches!(
            combo_light.command_instance("power", Some("fan-power")),
            Err(EntityError::NotOwned { .. })
        ));

        let lock = entity(EntityRole::Lock, None);
        assert_eq!(lock.command_instance("lock-control", None).unwrap(), None);
    }
}
