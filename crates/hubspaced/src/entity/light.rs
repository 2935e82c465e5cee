use super::Entity;
use super::EntityState;
use super::Service;
use super::StateRead;
use super::StateWrite;
use super::WriteScope;
use super::fan::is_fan_function;
use crate::encoding::EncodingError;
use crate::encoding::PowerState;
use crate::encoding::decode_brightness;

fn apply_power(state: &mut EntityState, value: &serde_json::Value) -> Result<(), EncodingError> {
    state.power = Some(PowerState::from_value(value)?);
    Ok(())
}

fn apply_brightness(
    state: &mut EntityState,
    value: &serde_json::Value,
) -> Result<(), EncodingError> {
    state.brightness = Some(decode_brightness(value)?);
    Ok(())
}

pub(super) fn reads(light: &Entity) -> Vec<StateRead> {
    let mut reads = vec![StateRead {
        function_class: "power",
        function_instance: light.power_instance.clone(),
        apply: apply_power,
    }];
    if light.supports_brightness {
        reads.push(StateRead {
            function_class: "brightness",
            function_instance: None,
            apply: apply_brightness,
        });
    }
    reads
}

/// A light sharing a unit (e.g. under a ceiling fan) owns its power instance
/// and leaves every fan function alone; a standalone light passes the
/// caller's instance through.
pub(super) fn command_instance(
    power_instance: Option<&str>,
    function_class: &str,
    requested: Option<&str>,
) -> WriteScope {
    let Some(own) = power_instance else {
        return WriteScope::Own(requested.map(str::to_string));
    };

    if is_fan_function(function_class) || requested.is_some_and(is_fan_function) {
        WriteScope::Sibling
    } else if function_class == "power" {
        WriteScope::Own(Some(own.to_string()))
    } else {
        WriteScope::Own(requested.map(str::to_string))
    }
}

pub(super) fn plan(
    light: &Entity,
    service: &Service,
) -> Result<Option<Vec<StateWrite>>, EncodingError> {
    let power = |state: PowerState| StateWrite {
        function_class: "power",
        function_instance: light.power_instance.clone(),
        value: state.to_value(),
    };

    let writes = match service {
        Service::TurnOn { brightness, .. } => {
            let mut writes = vec![power(PowerState::On)];
            if let (Some(b), true) = (brightness, light.supports_brightness) {
                let value = serde_json::json!(b);
                if *b > 100 {
                    return Err(EncodingError::InvalidBrightness(value));
                }
                writes.push(StateWrite {
                    function_class: "brightness",
                    function_instance: None,
                    value,
                });
            }
            writes
        }
        Service::TurnOff => vec![power(PowerState::Off)],
        Service::Lock | Service::Unlock => return Ok(None),
    };
    Ok(Some(writes))
}
