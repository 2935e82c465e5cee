//! Routing of raw `send_command` writes to entities.

use std::collections::HashSet;

use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::command::DispatchReport;
use crate::command::SendCommand;
use crate::entity::Entity;
use crate::vendor::VendorClient;

/// Write `cmd` to every entity it names.
///
/// Each matched entity writes to its own child, scoped to the function
/// instance it owns for the command's class. A function owned by a sibling
/// entity is not written. Unknown ids are skipped and a failed write does not
/// stop the remaining targets. State is not re-read here; the next poll picks
/// the change up.
pub async fn dispatch(
    entities: &[Entity],
    client: &dyn VendorClient,
    cmd: &SendCommand,
) -> DispatchReport {
    let mut report = DispatchReport::default();
    let mut seen = HashSet::new();

    for id in &cmd.entity_id {
        if !seen.insert(id.as_str()) {
            continue;
        }

        let Some(entity) = entities.iter().find(|e| &e.entity_id == id) else {
            debug!("send_command: no entity {}", id);
            report.unmatched.push(id.clone());
            continue;
        };

        let requested = cmd.function_instance.as_deref();
        let instance = match entity.command_instance(&cmd.function_class, requested) {
            Ok(instance) => instance,
            Err(e) => {
                debug!("send_command: skipping {}: {}", id, e);
                report.skipped.push(id.clone());
                continue;
            }
        };
        info!(
            "send_command {} -> {} {}/{:?} = {}",
            id,
            entity.child_id(),
            cmd.function_class,
            instance,
            cmd.value
        );

        match client
            .write_state(
                entity.child_id(),
                &cmd.function_class,
                instance.as_deref(),
                serde_json::Value::String(cmd.value.clone()),
            )
            .await
        {
            Ok(()) => report.written.push(id.clone()),
            Err(e) => {
                warn!("send_command to {} failed: {}", id, e);
                report.failed.push(id.clone());
            }
        }
    }

    report
}
