//! Delete-then-recreate so reruns never collide with stale resources.

use serde_json::Value;

use crate::engine::poll::{wait_until_settled, PollPolicy, StatusClassifier};
use crate::engine::EngineError;
use crate::plane::ControlPlaneClient;

/// Ensure no resource of `kind` named `name` survives, then run `create`.
///
/// Existing resources are found through a single-page listing (a paginated
/// listing is fatal), deleted by id, and their removal confirmed by polling
/// `describe` until the control plane reports them gone. Only then does
/// `create` run, so the new resource claims the name without tripping over
/// the old one. Rerunning the whole pipeline is therefore safe: each run
/// produces a fresh resource under the same logical name.
pub fn replace<T>(
    client: &dyn ControlPlaneClient,
    kind: &str,
    name: &str,
    poll: &PollPolicy,
    create: impl FnOnce() -> Result<T, EngineError>,
) -> Result<T, EngineError> {
    for descriptor in client.list(kind)? {
        if descriptor.name != name {
            continue;
        }
        tracing::info!(kind, name, id = %descriptor.id, "deleting stale resource");
        client.delete(kind, &descriptor.id)?;
        wait_until_settled(poll, &StatusClassifier::until_absent(), || {
            client.describe(kind, &descriptor.id)
        })?;
    }
    create()
}

/// Convenience for the common case where `create` is a plain mutation.
pub fn replace_with_mutate(
    client: &dyn ControlPlaneClient,
    kind: &str,
    name: &str,
    poll: &PollPolicy,
    payload: &Value,
) -> Result<Value, EngineError> {
    replace(client, kind, name, poll, || {
        Ok(client.mutate(kind, name, payload)?)
    })
}
