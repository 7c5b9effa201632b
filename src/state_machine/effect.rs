//! Effects produced by state transitions

use crate::roles::RoleRequest;

/// Effects to be executed after a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Call a reasoning role and feed its output back as an event
    InvokeRole(RoleRequest),

    /// The turn is finished and its state may be persisted
    CompleteTurn,
}
