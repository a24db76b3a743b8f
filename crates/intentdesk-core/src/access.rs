use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{PauseScope, ProtocolError};
use crate::types::Address;

/// Administrative roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "DEFAULT_ADMIN_ROLE")]
    DefaultAdmin,
    #[serde(rename = "PAUSER_ROLE")]
    Pauser,
    #[serde(rename = "UNPAUSER_ROLE")]
    Unpauser,
    #[serde(rename = "SETTER_ROLE")]
    Setter,
    #[serde(rename = "SUSPENDER_ROLE")]
    Suspender,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::DefaultAdmin => "DEFAULT_ADMIN_ROLE",
            Self::Pauser => "PAUSER_ROLE",
            Self::Unpauser => "UNPAUSER_ROLE",
            Self::Setter => "SETTER_ROLE",
            Self::Suspender => "SUSPENDER_ROLE",
        };
        f.write_str(label)
    }
}

/// Roles, pause switches and suspensions.
#[derive(Debug, Clone, Default)]
pub struct AccessControl {
    roles: BTreeMap<Address, BTreeSet<Role>>,
    paused: BTreeSet<PauseScope>,
    suspended_addresses: BTreeSet<Address>,
    suspended_withdrawals: BTreeSet<u64>,
}

impl AccessControl {
    pub fn with_admin(admin: Address) -> Self {
        let mut access = Self::default();
        access.grant(admin, Role::DefaultAdmin);
        access
    }

    pub fn grant(&mut self, account: Address, role: Role) {
        self.roles.entry(account).or_default().insert(role);
    }

    pub fn revoke(&mut self, account: &Address, role: Role) {
        if let Some(roles) = self.roles.get_mut(account) {
            roles.remove(&role);
            if roles.is_empty() {
                self.roles.remove(account);
            }
        }
    }

    pub fn has_role(&self, account: &Address, role: Role) -> bool {
        self.roles
            .get(account)
            .map(|roles| roles.contains(&role))
            .unwrap_or(false)
    }

    pub fn require_role(&self, account: &Address, role: Role) -> Result<(), ProtocolError> {
        if self.has_role(account, role) {
            Ok(())
        } else {
            Err(ProtocolError::missing_role(role))
        }
    }

    pub fn roles_of(&self, account: &Address) -> Vec<Role> {
        self.roles
            .get(account)
            .map(|roles| roles.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn set_paused(&mut self, scope: PauseScope, paused: bool) {
        if paused {
            self.paused.insert(scope);
        } else {
            self.paused.remove(&scope);
        }
    }

    pub fn is_paused(&self, scope: PauseScope) -> bool {
        self.paused.contains(&scope)
    }

    /// Global pause always wins over the scoped switch.
    pub fn ensure_not_paused(&self, scope: PauseScope) -> Result<(), ProtocolError> {
        if self.is_paused(PauseScope::Global) {
            return Err(ProtocolError::Paused(PauseScope::Global));
        }
        if self.is_paused(scope) {
            return Err(ProtocolError::Paused(scope));
        }
        Ok(())
    }

    pub fn set_address_suspended(&mut self, account: Address, suspended: bool) {
        if suspended {
            self.suspended_addresses.insert(account);
        } else {
            self.suspended_addresses.remove(&account);
        }
    }

    pub fn is_suspended(&self, account: &Address) -> bool {
        self.suspended_addresses.contains(account)
    }

    pub fn set_withdrawal_suspended(&mut self, id: u64, suspended: bool) {
        if suspended {
            self.suspended_withdrawals.insert(id);
        } else {
            self.suspended_withdrawals.remove(&id);
        }
    }

    pub fn is_withdrawal_suspended(&self, id: u64) -> bool {
        self.suspended_withdrawals.contains(&id)
    }
}
