use super::EntityState;
use super::Service;
use super::StateRead;
use super::StateWrite;
use crate::encoding::EncodingError;
use crate::encoding::LockState;

const LOCK_CLASS: &str = "lock-control";

fn apply_lock(state: &mut EntityState, value: &serde_json::Value) -> Result<(), EncodingError> {
    state.lock = Some(LockState::from_value(value)?);
    Ok(())
}

pub(super) fn reads() -> Vec<StateRead> {
    vec![StateRead {
        function_class: LOCK_CLASS,
        function_instance: None,
        apply: apply_lock,
    }]
}

/// The vendor expects the transitional state as the command value.
pub(super) fn plan(service: &Service) -> Option<Vec<StateWrite>> {
    let target = match service {
        Service::Lock => LockState::Locking,
        Service::Unlock => LockState::Unlocking,
        Service::TurnOn { .. } | Service::TurnOff => return None,
    };
    Some(vec![StateWrite {
        function_class: LOCK_CLASS,
        function_instance: None,
        value: serde_json::Value::String(target.to_string()),
    }])
}
