//! Declarative status graphs.
//!
//! A status enum lists its states and the edges between them; everything
//! else (reachable targets, terminal states, guarded moves) is derived from
//! that edge relation.

use super::ValidationError;

pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug + 'static {
    /// Every state, in a stable order.
    const STATES: &'static [Self];

    /// The edge relation. Self-loops are edges too.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Targets reachable in one move, in `STATES` order.
    fn valid_transitions(&self) -> Vec<Self> {
        Self::STATES
            .iter()
            .copied()
            .filter(|target| self.can_transition_to(target))
            .collect()
    }

    /// Move to `target` if the graph has that edge.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            return Ok(target);
        }
        Err(ValidationError::invalid_format(
            "status",
            format!("no edge from {:?} to {:?}", self, target),
        ))
    }

    /// True when the state has no outgoing edge at all.
    fn is_terminal(&self) -> bool {
        !Self::STATES.iter().any(|target| self.can_transition_to(target))
    }
}
