use super::EntityState;
use super::Service;
use super::StateRead;
use super::StateWrite;
use super::WriteScope;
use crate::encoding::EncodingError;
use crate::encoding::FanSpeed;
use crate::encoding::PowerState;
use crate::encoding::decode_fan_speed;
use crate::encoding::speed_wire;

const POWER_INSTANCE: &str = "fan-power";
const SPEED_CLASS: &str = "fan-speed";
const SPEED_INSTANCE: &str = "fan-speed";

fn apply_power(state: &mut EntityState, value: &serde_json::Value) -> Result<(), EncodingError> {
    state.power = Some(PowerState::from_value(value)?);
    Ok(())
}

fn apply_speed(state: &mut EntityState, value: &serde_json::Value) -> Result<(), EncodingError> {
    let (percentage, preset) = decode_fan_speed(value)?;
    state.percentage = Some(percentage);
    state.preset = preset;
    Ok(())
}

pub(super) fn reads() -> Vec<StateRead> {
    vec![
        StateRead {
            function_class: "power",
            function_instance: Some(POWER_INSTANCE.to_string()),
            apply: apply_power,
        },
        StateRead {
            function_class: SPEED_CLASS,
            function_instance: Some(SPEED_INSTANCE.to_string()),
            apply: apply_speed,
        },
    ]
}

/// Whether a function class or instance belongs to the fan half of a unit.
pub(super) fn is_fan_function(name: &str) -> bool {
    name.starts_with("fan-")
}

/// The fan owns `power` through `fan-power` and every `fan-*` class, each
/// under the instance named after it. Anything else on the unit is the
/// light's.
pub(super) fn command_instance(function_class: &str) -> WriteScope {
    match function_class {
        "power" => WriteScope::Own(Some(POWER_INSTANCE.to_string())),
        SPEED_CLASS => WriteScope::Own(Some(SPEED_INSTANCE.to_string())),
        class if is_fan_function(class) => WriteScope::Own(Some(class.to_string())),
        _ => WriteScope::Sibling,
    }
}

fn power(state: PowerState) -> StateWrite {
    StateWrite {
        function_class: "power",
        function_instance: Some(POWER_INSTANCE.to_string()),
        value: state.to_value(),
    }
}

fn speed(percentage: u8) -> StateWrite {
    StateWrite {
        function_class: SPEED_CLASS,
        function_instance: Some(SPEED_INSTANCE.to_string()),
        value: serde_json::Value::String(speed_wire(percentage)),
    }
}

/// Turning on snaps the requested (or last known) speed up to a preset and
/// falls back to the lowest preset when neither is known.
pub(super) fn plan(
    state: &EntityState,
    service: &Service,
) -> Result<Option<Vec<StateWrite>>, EncodingError> {
    let writes = match service {
        Service::TurnOn { percentage: Some(0), .. } | Service::TurnOff => {
            vec![power(PowerState::Off), speed(0)]
        }
        Service::TurnOn { percentage, .. } => {
            let preset = match percentage.or(state.percentage) {
                Some(p) => FanSpeed::covering(p)?,
                None => None,
            };
            let preset = preset.unwrap_or(FanSpeed::Low);
            vec![power(PowerState::On), speed(preset.percentage())]
        }
        Service::Lock | Service::Unlock => return Ok(None),
    };
    Ok(Some(writes))
}
