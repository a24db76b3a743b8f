use serde::{Deserialize, Serialize};

use crate::storage::JournalStorageConfig;
use crate::types::{Address, Amount, ONE};

/// Tunable protocol parameters.
///
/// Every field can be overridden from a TOML file; missing fields keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Wait between proposing and confirming instant-action deactivation (seconds).
    pub deactivate_instant_action_mode_cooldown: u64,
    /// Wait between initiating and completing an unbinding (seconds).
    pub unbinding_cooldown: u64,
    /// `deadline` must be at least this far in the future when an intent is sent.
    pub min_deadline_offset: u64,
    /// `expiration_timestamp` must be at least this far in the future when an intent is sent.
    pub min_expiration_offset: u64,
    /// Upper bound for `exercise_fee.cap` and `exercise_fee.rate` (18 decimals).
    #[serde(with = "crate::types::amount")]
    pub max_exercise_fee_cap: Amount,
    pub max_connected_party_bs: u64,
    /// Account credited with trading fees on fills.
    pub fee_collector: Address,
    /// Account holding deposited collateral on the external token ledger.
    pub vault: Address,
    pub price_oracle: Option<Address>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            deactivate_instant_action_mode_cooldown: 120,
            unbinding_cooldown: 120,
            min_deadline_offset: 60,
            min_expiration_offset: 60,
            max_exercise_fee_cap: ONE,
            max_connected_party_bs: 1,
            fee_collector: Address::from_index(0xfee),
            vault: Address::from_index(0xda7a),
            price_oracle: None,
        }
    }
}

/// Engine bootstrap configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Receives the default admin role on a fresh state.
    pub admin: Address,
    pub protocol: ProtocolConfig,
    pub journal_storage: JournalStorageConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            admin: Address::from_index(0xad),
            protocol: ProtocolConfig::default(),
            journal_storage: JournalStorageConfig::Memory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ProtocolConfig = toml::from_str(
            r#"
            unbinding_cooldown = 300
            fee_collector = "0x00000000000000000000000000000000000000aa"
            "#,
        )
        .unwrap();

        assert_eq!(config.unbinding_cooldown, 300);
        assert_eq!(config.deactivate_instant_action_mode_cooldown, 120);
        assert_eq!(config.fee_collector, Address::from_index(0xaa));
        assert_eq!(config.max_exercise_fee_cap, ONE);
    }

    #[test]
    fn malformed_address_in_toml_is_rejected() {
        let parsed = toml::from_str::<ProtocolConfig>(r#"vault = "not-an-address""#);
        assert!(parsed.is_err());
    }
}
