//! Entity instantiation: identity + roles -> entities.
//!
//! Devices reach the bridge three ways: by friendly name, by room, or through
//! automatic discovery. All three end in [`instantiate`], so an entity looks
//! the same regardless of how its device was found.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::HubspaceConfig;
use crate::device::DeviceIdentity;
use crate::device::DiscoveryRecord;
use crate::device::EntityRole;
use crate::device::FunctionDescriptor;
use crate::entity::Entity;
use crate::entity::EntityState;
use crate::entity::slugify;
use crate::resolver::resolve;
use crate::vendor::VendorClient;
use crate::vendor::VendorError;

/// Power instance of a light that shares its unit with a fan.
const COMBO_LIGHT_INSTANCE: &str = "light-power";

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("Hubspace is not ready: {0}")]
    NotReady(#[source] VendorError),

    #[error("Automatic discovery failed: {0}")]
    Discovery(#[source] VendorError),
}

/// Build one entity per role, all bound to the same identity.
pub fn instantiate(
    identity: Arc<DeviceIdentity>,
    roles: &[EntityRole],
    debug: bool,
) -> Vec<Entity> {
    let shared = roles.len() > 1;
    let with_fan = roles.contains(&EntityRole::Fan);

    roles
        .iter()
        .map(|role| {
            let name = if shared {
                format!("{}{}", identity.friendly_name, role.name_suffix())
            } else {
                identity.friendly_name.clone()
            };
            let power_instance = match role {
                EntityRole::Light if with_fan => Some(COMBO_LIGHT_INSTANCE.to_string()),
                _ => None,
            };

            Entity {
                entity_id: format!("{}.{}", role.platform(), slugify(&name)),
                name,
                identity: Arc::clone(&identity),
                role: role.clone(),
                power_instance,
                supports_brightness: false,
                debug,
                state: EntityState::default(),
            }
        })
        .collect()
}

/// Resolve roles for a device whose identity and functions are known.
fn build(identity: DeviceIdentity, functions: &[FunctionDescriptor], debug: bool) -> Vec<Entity> {
    let roles = resolve(&identity.model, &identity.device_class, functions);
    if roles.is_empty() {
        warn!(
            "Device {} ({}) exposes no usable roles, skipping",
            identity.friendly_name, identity.child_id
        );
        return Vec::new();
    }

    debug!(
        "Creating {:?} for {} (model {}, class {})",
        roles, identity.friendly_name, identity.model, identity.device_class
    );

    let supports_brightness = functions.iter().any(|f| f.function_class == "brightness");
    let mut entities = instantiate(Arc::new(identity), &roles, debug);
    for entity in entities
        .iter_mut()
        .filter(|e| e.role == EntityRole::Light)
    {
        entity.supports_brightness = supports_brightness;
    }
    entities
}

/// Entities for a pre-fetched discovery record. Issues no vendor calls.
pub fn from_discovery(record: DiscoveryRecord, debug: bool) -> Vec<Entity> {
    build(record.identity, &record.functions, debug)
}

/// Entities for a device the user named in the configuration.
pub async fn from_name(
    client: &dyn VendorClient,
    friendly_name: &str,
    debug: bool,
) -> Result<Vec<Entity>, VendorError> {
    let child = client.resolve_by_name(friendly_name).await?;
    let functions = client.functions(&child.child_id).await?;
    Ok(build(child.into_identity(friendly_name), &functions, debug))
}

/// Entities for every device in a room.
///
/// A child that cannot be resolved is skipped; only connectivity failures
/// abort the room.
pub async fn from_room(
    client: &dyn VendorClient,
    room: &str,
    debug: bool,
) -> Result<Vec<Entity>, VendorError> {
    let mut entities = Vec::new();
    for child_id in client.list_children_of_room(room).await? {
        let resolved = async {
            let identity = client.resolve_by_id(&child_id).await?;
            let functions = client.functions(&child_id).await?;
            Ok::<_, VendorError>((identity, functions))
        }
        .await;

        match resolved {
            Ok((identity, functions)) => entities.extend(build(identity, &functions, debug)),
            Err(e) if e.is_connectivity() => return Err(e),
            Err(e) => warn!("Skipping child {} of room {}: {}", child_id, room, e),
        }
    }
    Ok(entities)
}

/// Create every entity the configuration asks for.
///
/// With no friendly names and no rooms configured, the whole account is
/// discovered instead. Connectivity failures surface as
/// [`SetupError::NotReady`] so the caller can retry later; anything else only
/// drops the affected device.
pub async fn setup(
    client: &dyn VendorClient,
    config: &HubspaceConfig,
) -> Result<Vec<Entity>, SetupError> {
    let mut entities = Vec::new();

    for name in &config.friendly_names {
        debug!("Resolving friendly name {}", name);
        match from_name(client, name, config.debug).await {
            Ok(found) => entities.extend(found),
            Err(e) if e.is_connectivity() => return Err(SetupError::NotReady(e)),
            Err(e) => warn!("Skipping {}: {}", name, e),
        }
    }

    for room in &config.room_names {
        debug!("Resolving room {}", room);
        match from_room(client, room, config.debug).await {
            Ok(found) => entities.extend(found),
            Err(e) if e.is_connectivity() => return Err(SetupError::NotReady(e)),
            Err(e) => warn!("Skipping room {}: {}", room, e),
        }
    }

    if config.friendly_names.is_empty() && config.room_names.is_empty() {
        info!("No devices configured, attempting automatic discovery");
        let records = client.discover_all().await.map_err(|e| {
            if e.is_connectivity() {
                SetupError::NotReady(e)
            } else {
                SetupError::Discovery(e)
            }
        })?;
        for record in records {
            entities.extend(from_discovery(record, config.debug));
        }
    }

    let entities = dedup(entities);
    info!("Created {} entities", entities.len());
    Ok(entities)
}

/// Drop repeated (child, role) pairs and make entity ids unique.
///
/// A device can be listed both by name and through its room; two devices can
/// also share a friendly name. Later colliding ids get `_2`, `_3`, ...
fn dedup(entities: Vec<Entity>) -> Vec<Entity> {
    let mut seen = HashSet::new();
    let mut taken: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(entities.len());

    for mut entity in entities {
        if !seen.insert((entity.identity.child_id.clone(), entity.role.clone())) {
            debug!("Ignoring duplicate entity {}", entity.entity_id);
            continue;
        }

        let count = taken.entry(entity.entity_id.clone()).or_insert(0);
        *count += 1;
        if *count > 1 {
            let mut n = *count;
            let mut candidate = format!("{}_{}", entity.entity_id, n);
            while taken.contains_key(&candidate) {
                n += 1;
                candidate = format!("{}_{}", entity.entity_id, n);
            }
            taken.insert(candidate.clone(), 1);
            entity.entity_id = candidate;
        }
        out.push(entity);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendor::mock::MockVendorClient;
    use crate::vendor::mock::record;

    fn config(names: &[&str], rooms: &[&str]) -> HubspaceConfig {
        HubspaceConfig {
            username: "user".to_string(),
            password: "pass".to_string(),
            debug: false,
            friendly_names: names.iter().map(|s| s.to_string()).collect(),
            room_names: rooms.iter().map(|s| s.to_string()).collect(),
            scan_interval_secs: 60,
        }
    }

    fn client() -> MockVendorClient {
        MockVendorClient::new()
            .with_device(record(
                "plug-a",
                "unit-1",
                "HPKA315CWB",
                "power-outlet",
                "Patio Plug",
                &[("toggle", Some("toggle-1")), ("toggle", Some("toggle-2"))],
            ))
            .with_device(record(
                "fan-a",
                "unit-2",
                "52133, 37833",
                "fan",
                "Bedroom",
                &[("power", Some("fan-power")), ("power", Some("light-power"))],
            ))
            .with_device(record(
                "lamp-a",
                "unit-3",
                "XYZ",
                "light",
                "Desk Lamp",
                &[("power", None), ("brightness", None)],
            ))
            .with_room("Patio", &["plug-a", "ghost"])
    }

    #[test]
    fn test_instantiate_two_outlets() {
        let identity = Arc::new(DeviceIdentity {
            child_id: "plug-a".to_string(),
            device_id: "unit-1".to_string(),
            model: "HPKA315CWB".to_string(),
            device_class: "power-outlet".to_string(),
            friendly_name: "Patio Plug".to_string(),
        });
        let roles = resolve("HPKA315CWB", "power-outlet", &[]);
        let entities = instantiate(identity, &roles, false);

        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].entity_id, "switch.patio_plug_outlet_1");
        assert_eq!(entities[1].entity_id, "switch.patio_plug_outlet_2");
        assert!(Arc::ptr_eq(&entities[0].identity, &entities[1].identity));
        assert_eq!(entities[0].identity.device_id, entities[1].identity.device_id);
    }

    #[test]
    fn test_single_role_keeps_name() {
        let entities = from_discovery(
            record("lock-a", "unit-9", "L", "door-lock", "Front Door", &[]),
            false,
        );
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].name, "Front Door");
        assert_eq!(entities[0].entity_id, "lock.front_door");
    }

    #[test]
    fn test_fan_light_combo_scopes() {
        let entities = from_discovery(
            record("fan-a", "unit-2", "76278, 37278", "fan", "Den", &[]),
            false,
        );

        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].entity_id, "fan.den_fan");
        assert_eq!(entities[1].entity_id, "light.den_light");
        assert_eq!(entities[1].power_instance.as_deref(), Some("light-power"));
    }

    #[test]
    fn test_sibling_write_scopes_disjoint() {
        let function_classes = [
            "power",
            "toggle",
            "fan-speed",
            "fan-direction",
            "brightness",
            "color-temperature",
        ];
        let requested = [
            None,
            Some("fan-power"),
            Some("fan-speed"),
            Some("light-power"),
            Some("toggle-1"),
        ];

        for model in crate::resolver::known_models() {
            let entities = from_discovery(record("c", "d", model, "", "Unit", &[]), false);

            // (class, instance) -> entity that writes there
            let mut owners: HashMap<(&str, Option<String>), &str> = HashMap::new();
            for entity in &entities {
                for class in function_classes {
                    for instance in requested {
                        let Ok(scope) = entity.command_instance(class, instance) else {
                            continue;
                        };
                        match entity.role {
                            EntityRole::Fan => {
                                assert_ne!(scope.as_deref(), Some(COMBO_LIGHT_INSTANCE))
                            }
                            EntityRole::Light if entity.power_instance.is_some() => {
                                assert!(!class.starts_with("fan-"), "{model}: light wrote {class}");
                                assert!(!scope.as_deref().is_some_and(|s| s.starts_with("fan-")));
                            }
                            _ => {}
                        }
                        let owner = owners
                            .entry((class, scope.clone()))
                            .or_insert(&entity.entity_id);
                        assert_eq!(
                            *owner, entity.entity_id,
                            "{}: {} and {} both write {}/{:?}",
                            model, owner, entity.entity_id, class, scope
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_transformer_discovery() {
        let entities = from_discovery(
            record(
                "t1",
                "unit-5",
                "ZZ",
                "landscape-transformer",
                "Garden",
                &[("toggle", Some("toggle-3"))],
            ),
            false,
        );
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].role, EntityRole::Transformer("3".to_string()));
        assert_eq!(
            entities[0].command_instance("toggle", None).unwrap().as_deref(),
            Some("toggle-3")
        );
    }

    #[tokio::test]
    async fn test_from_name_fetches_identity_once() {
        let client = client();
        let entities = from_name(&client, "Patio Plug", false).await.unwrap();

        assert_eq!(entities.len(), 2);
        assert_eq!(client.call_count("resolve_by_name"), 1);
        assert_eq!(client.call_count("resolve_by_id"), 0);
        assert_eq!(client.call_count("functions"), 1);
    }

    #[tokio::test]
    async fn test_named_and_discovery_paths_agree() {
        let client = client();
        let named = from_name(&client, "Bedroom", false).await.unwrap();
        let discovered = from_discovery(client.devices[1].clone(), false);

        let ids = |entities: &[Entity]| {
            entities
                .iter()
                .map(|e| (e.entity_id.clone(), e.role.clone(), e.power_instance.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(&named), ids(&discovered));
    }

    #[tokio::test]
    async fn test_brightness_capability() {
        let client = client();
        let entities = from_name(&client, "Desk Lamp", false).await.unwrap();
        assert!(entities[0].supports_brightness);
    }

    #[tokio::test]
    async fn test_from_room_skips_unknown_child() {
        let client = client();
        let entities = from_room(&client, "Patio", false).await.unwrap();
        assert_eq!(entities.len(), 2);
        assert_eq!(client.call_count("resolve_by_id"), 2);
    }

    #[tokio::test]
    async fn test_setup_skips_unknown_names() {
        let client = client();
        let entities = setup(&client, &config(&["Nope", "Desk Lamp"], &[]))
            .await
            .unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(client.call_count("discover_all"), 0);
    }

    #[tokio::test]
    async fn test_setup_discovers_when_unconfigured() {
        let client = client();
        let entities = setup(&client, &config(&[], &[])).await.unwrap();

        assert_eq!(client.call_count("discover_all"), 1);
        assert_eq!(client.call_count("resolve_by_name"), 0);
        // Two outlets, fan + light, lamp.
        assert_eq!(entities.len(), 5);
    }

    #[tokio::test]
    async fn test_setup_not_ready() {
        let client = client();
        client.set_unreachable(true);

        let result = setup(&client, &config(&["Patio Plug"], &[])).await;
        assert!(matches!(result, Err(SetupError::NotReady(_))));

        let result = setup(&client, &config(&[], &[])).await;
        assert!(matches!(result, Err(SetupError::NotReady(_))));
    }

    #[tokio::test]
    async fn test_setup_dedups_name_and_room() {
        let client = client();
        let entities = setup(&client, &config(&["Patio Plug"], &["Patio"]))
            .await
            .unwrap();
        assert_eq!(entities.len(), 2);
    }

    #[test]
    fn test_dedup_renames_colliding_ids() {
        let mut entities = from_discovery(
            record("a", "u1", "X", "light", "Lamp", &[]),
            false,
        );
        entities.extend(from_discovery(
            record("b", "u2", "X", "light", "Lamp", &[]),
            false,
        ));
        entities.extend(from_discovery(
            record("c", "u3", "X", "light", "Lamp", &[]),
            false,
        ));

        let ids: Vec<_> = dedup(entities)
            .into_iter()
            .map(|e| e.entity_id)
            .collect();
        assert_eq!(ids, vec!["light.lamp", "light.lamp_2", "light.lamp_3"]);
    }
}
