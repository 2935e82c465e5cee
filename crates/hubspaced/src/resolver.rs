//! Model resolution: which entity roles does a physical device expose?
//!
//! Known model codes map to a fixed role list. Anything else falls back on
//! the vendor device class, and for socket-style classes the roles are
//! derived from the device's `toggle` functions.

use std::collections::HashMap;
use std::sync::LazyLock;

use tracing::debug;
use tracing::warn;

use crate::device::EntityRole;
use crate::device::FunctionDescriptor;
use crate::encoding::parse_toggle_index;

fn outlets(indices: &[&str]) -> Vec<EntityRole> {
    indices
        .iter()
        .map(|i| EntityRole::Outlet(i.to_string()))
        .collect()
}

fn transformers(indices: &[&str]) -> Vec<EntityRole> {
    indices
        .iter()
        .map(|i| EntityRole::Transformer(i.to_string()))
        .collect()
}

/// Model code -> roles, for devices whose layout is fixed by the hardware.
static MODEL_ROLES: LazyLock<HashMap<&'static str, Vec<EntityRole>>> = LazyLock::new(|| {
    HashMap::from([
        ("HPKA315CWB", outlets(&["1", "2"])),
        ("HPPA52CWBA023", outlets(&["1", "2"])),
        ("HPPA51CWB", outlets(&["1", "2", "3", "4"])),
        ("HB-200-1215WIFIB", transformers(&["1", "2", "3"])),
        ("52133, 37833", vec![EntityRole::Fan, EntityRole::Light]),
        ("76278, 37278", vec![EntityRole::Fan, EntityRole::Light]),
    ])
});

/// Model codes with a fixed role layout.
pub fn known_models() -> impl Iterator<Item = &'static str> {
    MODEL_ROLES.keys().copied()
}

/// Resolve the roles a device exposes.
///
/// The model code takes precedence over the device class. Functions are
/// only consulted for socket-style device classes.
pub fn resolve(
    model: &str,
    device_class: &str,
    functions: &[FunctionDescriptor],
) -> Vec<EntityRole> {
    if let Some(roles) = MODEL_ROLES.get(model) {
        debug!("Model {} resolved from table: {:?}", model, roles);
        return roles.clone();
    }

    match device_class {
        "door-lock" => vec![EntityRole::Lock],
        "power-outlet" => toggle_roles(functions, EntityRole::Outlet),
        "landscape-transformer" => toggle_roles(functions, EntityRole::Transformer),
        "fan" => vec![EntityRole::Fan],
        "light" | "switch" => vec![EntityRole::Light],
        other => {
            // Unmapped classes have always been exposed as plain lights.
            debug!(
                "No mapping for model {} / class {}, defaulting to Light",
                model, other
            );
            vec![EntityRole::Light]
        }
    }
}

/// One role per `toggle` function with a parseable index.
fn toggle_roles(
    functions: &[FunctionDescriptor],
    make: impl Fn(String) -> EntityRole,
) -> Vec<EntityRole> {
    let mut roles = Vec::new();
    for function in functions.iter().filter(|f| f.function_class == "toggle") {
        let instance = function.function_instance.as_deref().unwrap_or_default();
        let Some(index) = parse_toggle_index(instance) else {
            warn!(
                "Skipping toggle function with unparseable instance {:?}",
                function.function_instance
            );
            continue;
        };

        let role = make(index);
        if !roles.contains(&role) {
            roles.push(role);
        }
    }
    roles
}
