//! Control-plane gateway abstraction.
//!
//! Every pipeline talks to the remote API through [`ControlPlaneClient`], so
//! the engine stays independent of any one vendor surface and tests can
//! substitute a scripted double. Implementations classify each call's
//! failure into [`PlaneError`]; the engine's retry and poll loops key off
//! that classification.

use serde_json::Value;
use thiserror::Error;

/// Classified failure of a single control-plane call.
#[derive(Debug, Error)]
pub enum PlaneError {
    /// The control plane is busy with its own background processing and
    /// rejected the mutation for now. Safe to retry after a pause.
    #[error("control plane reported a conflict: {0}")]
    Conflict(String),

    /// The addressed resource does not exist.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// A listing spilled past a single page. The tool assumes bounded
    /// resource sets and refuses to guess which page holds the target.
    #[error("listing of {0} is paginated; single-page resource sets are required")]
    Truncated(String),

    /// Anything unclassified: transport failures, auth failures, 5xx.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Minimal shape of a provisioned resource as reported by the control plane.
///
/// `body` carries the full response document so steps can thread fields the
/// summary omits (checksums, version labels). Identity still travels as
/// plain ids and names; nothing here is a live handle.
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    pub kind: String,
    pub id: String,
    pub name: String,
    pub status: String,
    pub body: Value,
}

/// Abstract gateway to the remote control plane.
///
/// `kind` is a routing key (`"data-sources"`, `"bot-imports"`, ...); each
/// implementation maps it onto its own wire surface.
pub trait ControlPlaneClient {
    /// Issue a create/update mutation for the named resource. Mutations are
    /// keyed by name on the control-plane side, so re-issuing the same call
    /// is harmless.
    fn mutate(&self, kind: &str, name: &str, payload: &Value) -> Result<Value, PlaneError>;

    /// Fetch the current descriptor of one resource.
    fn describe(&self, kind: &str, id: &str) -> Result<ResourceDescriptor, PlaneError>;

    /// List every resource of a kind. Implementations must return
    /// [`PlaneError::Truncated`] when the control plane signals more pages.
    fn list(&self, kind: &str) -> Result<Vec<ResourceDescriptor>, PlaneError>;

    /// Delete one resource by id. Deletion is asynchronous; callers confirm
    /// removal by polling `describe` until it reports `NotFound`.
    fn delete(&self, kind: &str, id: &str) -> Result<(), PlaneError>;
}
