//! Outlet sockets and transformer zones: one `toggle-<n>` function each.

use super::EntityState;
use super::Service;
use super::StateRead;
use super::StateWrite;
use crate::encoding::EncodingError;
use crate::encoding::PowerState;
use crate::encoding::toggle_instance;

fn apply_toggle(state: &mut EntityState, value: &serde_json::Value) -> Result<(), EncodingError> {
    state.power = Some(PowerState::from_value(value)?);
    Ok(())
}

pub(super) fn instance(index: &str) -> String {
    toggle_instance(index)
}

pub(super) fn reads(index: &str) -> Vec<StateRead> {
    vec![StateRead {
        function_class: "toggle",
        function_instance: Some(instance(index)),
        apply: apply_toggle,
    }]
}

pub(super) fn plan(index: &str, service: &Service) -> Option<Vec<StateWrite>> {
    let state = match service {
        Service::TurnOn { .. } => PowerState::On,
        Service::TurnOff => PowerState::Off,
        Service::Lock | Service::Unlock => return None,
    };
    Some(vec![StateWrite {
        function_class: "toggle",
        function_instance: Some(instance(index)),
        value: state.to_value(),
    }])
}
