use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ProtocolError;
use crate::types::{Address, Timestamp};

/// PartyA's relation to a single PartyB.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BindingState {
    #[default]
    Unbound,
    Bound {
        party_b: Address,
    },
    Unbinding {
        party_b: Address,
        requested_at: Timestamp,
    },
}

impl BindingState {
    pub fn party_b(&self) -> Option<&Address> {
        match self {
            Self::Unbound => None,
            Self::Bound { party_b } | Self::Unbinding { party_b, .. } => Some(party_b),
        }
    }

    /// `0` while no unbinding is pending.
    pub fn unbinding_request_time(&self) -> Timestamp {
        match self {
            Self::Unbinding { requested_at, .. } => *requested_at,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BindingRegistry {
    bindings: BTreeMap<Address, BindingState>,
}

impl BindingRegistry {
    pub fn state(&self, party_a: &Address) -> BindingState {
        self.bindings.get(party_a).cloned().unwrap_or_default()
    }

    pub fn bound_party_b(&self, party_a: &Address) -> Option<Address> {
        self.bindings
            .get(party_a)
            .and_then(|state| state.party_b().cloned())
    }

    pub fn bind(&mut self, party_a: &Address, party_b: Address) -> Result<(), ProtocolError> {
        if self.state(party_a) != BindingState::Unbound {
            return Err(ProtocolError::AlreadyBound);
        }
        self.bindings
            .insert(party_a.clone(), BindingState::Bound { party_b });
        Ok(())
    }

    pub fn initiate_unbinding(&mut self, party_a: &Address, now: Timestamp) -> Result<(), ProtocolError> {
        match self.state(party_a) {
            BindingState::Unbound => Err(ProtocolError::NotBound),
            BindingState::Unbinding { .. } => Err(ProtocolError::UnbindingAlreadyInitiated),
            BindingState::Bound { party_b } => {
                self.bindings.insert(
                    party_a.clone(),
                    BindingState::Unbinding {
                        party_b,
                        requested_at: now,
                    },
                );
                Ok(())
            }
        }
    }

    /// Returns the PartyB that was released.
    pub fn complete_unbinding(
        &mut self,
        party_a: &Address,
        now: Timestamp,
        cooldown: u64,
    ) -> Result<Address, ProtocolError> {
        match self.state(party_a) {
            BindingState::Unbound => Err(ProtocolError::NotBound),
            BindingState::Bound { .. } => Err(ProtocolError::UnbindingNotInitiated),
            BindingState::Unbinding {
                party_b,
                requested_at,
            } => {
                if now < requested_at.saturating_add(cooldown) {
                    return Err(ProtocolError::UnbindingCooldownNotReached);
                }
                self.bindings.remove(party_a);
                Ok(party_b)
            }
        }
    }

    pub fn cancel_unbinding(&mut self, party_a: &Address) -> Result<(), ProtocolError> {
        match self.state(party_a) {
            BindingState::Unbound => Err(ProtocolError::NotBound),
            BindingState::Bound { .. } => Err(ProtocolError::NoPendingUnbinding),
            BindingState::Unbinding { party_b, .. } => {
                self.bindings
                    .insert(party_a.clone(), BindingState::Bound { party_b });
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbinding_round_trip_respects_cooldown() {
        let mut registry = BindingRegistry::default();
        let party_a = Address::from_index(1);
        let party_b = Address::from_index(0xb);

        registry.bind(&party_a, party_b.clone()).unwrap();
        registry.initiate_unbinding(&party_a, 1_000).unwrap();
        assert_eq!(registry.state(&party_a).unbinding_request_time(), 1_000);

        assert_eq!(
            registry.complete_unbinding(&party_a, 1_119, 120),
            Err(ProtocolError::UnbindingCooldownNotReached)
        );
        assert_eq!(registry.complete_unbinding(&party_a, 1_120, 120), Ok(party_b));
        assert_eq!(registry.bound_party_b(&party_a), None);
        assert_eq!(registry.state(&party_a).unbinding_request_time(), 0);
    }

    #[test]
    fn rebinding_same_party_b_fails() {
        let mut registry = BindingRegistry::default();
        let party_a = Address::from_index(1);
        let party_b = Address::from_index(0xb);
        registry.bind(&party_a, party_b.clone()).unwrap();
        assert_eq!(registry.bind(&party_a, party_b), Err(ProtocolError::AlreadyBound));
    }

    #[test]
    fn cancel_keeps_binding() {
        let mut registry = BindingRegistry::default();
        let party_a = Address::from_index(1);
        let party_b = Address::from_index(0xb);

        assert_eq!(registry.cancel_unbinding(&party_a), Err(ProtocolError::NotBound));
        registry.bind(&party_a, party_b.clone()).unwrap();
        assert_eq!(
            registry.cancel_unbinding(&party_a),
            Err(ProtocolError::NoPendingUnbinding)
        );
        registry.initiate_unbinding(&party_a, 5).unwrap();
        assert_eq!(
            registry.initiate_unbinding(&party_a, 6),
            Err(ProtocolError::UnbindingAlreadyInitiated)
        );
        registry.cancel_unbinding(&party_a).unwrap();
        assert_eq!(registry.bound_party_b(&party_a), Some(party_b));
        assert_eq!(
            registry.complete_unbinding(&party_a, 500, 120),
            Err(ProtocolError::UnbindingNotInitiated)
        );
    }
}
