use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ProtocolError;
use crate::types::{Address, Timestamp};

/// Two-phase instant-action mode of a PartyA.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum InstantActionMode {
    #[default]
    Inactive,
    Active,
    DeactivationProposed {
        proposed_at: Timestamp,
    },
}

impl InstantActionMode {
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Inactive)
    }

    /// Earliest time deactivation may be confirmed, `0` without a proposal.
    pub fn deactivate_time(&self, cooldown: u64) -> Timestamp {
        match self {
            Self::DeactivationProposed { proposed_at } => proposed_at.saturating_add(cooldown),
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InstantActionRegistry {
    modes: BTreeMap<Address, InstantActionMode>,
}

impl InstantActionRegistry {
    pub fn mode(&self, party_a: &Address) -> InstantActionMode {
        self.modes.get(party_a).copied().unwrap_or_default()
    }

    pub fn is_active(&self, party_a: &Address) -> bool {
        self.mode(party_a).is_active()
    }

    pub fn ensure_inactive(&self, party_a: &Address) -> Result<(), ProtocolError> {
        if self.is_active(party_a) {
            Err(ProtocolError::InstantActionModeActive)
        } else {
            Ok(())
        }
    }

    pub fn activate(&mut self, party_a: &Address) -> Result<(), ProtocolError> {
        if self.is_active(party_a) {
            return Err(ProtocolError::InstantActionModeAlreadyActive);
        }
        self.modes.insert(party_a.clone(), InstantActionMode::Active);
        Ok(())
    }

    /// Repeated proposals restart the cooldown.
    pub fn propose_deactivation(&mut self, party_a: &Address, now: Timestamp) -> Result<(), ProtocolError> {
        if !self.is_active(party_a) {
            return Err(ProtocolError::InstantActionModeNotActive);
        }
        self.modes.insert(
            party_a.clone(),
            InstantActionMode::DeactivationProposed { proposed_at: now },
        );
        Ok(())
    }

    pub fn deactivate(&mut self, party_a: &Address, now: Timestamp, cooldown: u64) -> Result<(), ProtocolError> {
        match self.mode(party_a) {
            InstantActionMode::Inactive => Err(ProtocolError::InstantActionModeNotActive),
            InstantActionMode::Active => Err(ProtocolError::DeactivationNotProposed),
            InstantActionMode::DeactivationProposed { proposed_at } => {
                if now < proposed_at.saturating_add(cooldown) {
                    return Err(ProtocolError::CooldownNotOver);
                }
                self.modes.remove(party_a);
                Ok(())
            }
        }
    }

    /// Operator override; ignores any pending proposal.
    pub fn force(&mut self, party_a: &Address, active: bool) {
        if active {
            self.modes.insert(party_a.clone(), InstantActionMode::Active);
        } else {
            self.modes.remove(party_a);
        }
    }
}
