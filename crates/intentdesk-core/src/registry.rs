use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::ProtocolError;
use crate::types::{Address, Amount};

/// Counterparty parameters set by the protocol operator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyBConfig {
    pub is_active: bool,
    #[serde(with = "crate::types::amount")]
    pub loss_coverage: Amount,
    pub oracle_id: u64,
    pub symbol_type: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Oracle {
    pub id: u64,
    pub name: String,
    pub contract: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionType {
    Call,
    Put,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: u64,
    pub name: String,
    pub option_type: OptionType,
    pub oracle_id: u64,
    pub collateral: Address,
    pub is_stable_coin: bool,
    /// Fraction of the premium charged on fills (18 decimals).
    #[serde(with = "crate::types::amount")]
    pub trading_fee: Amount,
    pub symbol_type: u64,
    pub is_valid: bool,
}

/// Input for registering a symbol; the id and validity are assigned on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSymbol {
    pub name: String,
    pub option_type: OptionType,
    pub oracle_id: u64,
    pub collateral: Address,
    #[serde(default)]
    pub is_stable_coin: bool,
    #[serde(default, with = "crate::types::amount")]
    pub trading_fee: Amount,
    #[serde(default)]
    pub symbol_type: u64,
}

/// Counterparties, oracles, symbols, affiliates and accepted collateral.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    party_bs: BTreeMap<Address, PartyBConfig>,
    oracles: BTreeMap<u64, Oracle>,
    symbols: BTreeMap<u64, Symbol>,
    affiliates: BTreeMap<Address, bool>,
    collaterals: BTreeSet<Address>,
}

impl Registry {
    pub fn set_party_b_config(&mut self, party_b: Address, config: PartyBConfig) {
        self.party_bs.insert(party_b, config);
    }

    pub fn party_b_config(&self, party_b: &Address) -> Option<&PartyBConfig> {
        self.party_bs.get(party_b)
    }

    /// Only an active configuration makes an address a PartyB.
    pub fn is_active_party_b(&self, account: &Address) -> bool {
        self.party_bs
            .get(account)
            .map(|config| config.is_active)
            .unwrap_or(false)
    }

    pub fn add_oracle(&mut self, name: String, contract: Address) -> u64 {
        let id = self.oracles.len() as u64 + 1;
        self.oracles.insert(id, Oracle { id, name, contract });
        id
    }

    pub fn oracle(&self, id: u64) -> Option<&Oracle> {
        self.oracles.get(&id)
    }

    pub fn add_symbol(&mut self, symbol: NewSymbol) -> Result<u64, ProtocolError> {
        if !self.oracles.contains_key(&symbol.oracle_id) {
            return Err(ProtocolError::InvalidOracle(symbol.oracle_id));
        }
        let id = self.symbols.len() as u64 + 1;
        self.symbols.insert(
            id,
            Symbol {
                id,
                name: symbol.name,
                option_type: symbol.option_type,
                oracle_id: symbol.oracle_id,
                collateral: symbol.collateral,
                is_stable_coin: symbol.is_stable_coin,
                trading_fee: symbol.trading_fee,
                symbol_type: symbol.symbol_type,
                is_valid: true,
            },
        );
        Ok(id)
    }

    pub fn set_symbol_validation_state(&mut self, id: u64, is_valid: bool) -> Result<(), ProtocolError> {
        let symbol = self
            .symbols
            .get_mut(&id)
            .ok_or(ProtocolError::InvalidSymbol(id))?;
        symbol.is_valid = is_valid;
        Ok(())
    }

    pub fn symbol(&self, id: u64) -> Option<&Symbol> {
        self.symbols.get(&id)
    }

    /// Registered and currently marked valid.
    pub fn valid_symbol(&self, id: u64) -> Result<&Symbol, ProtocolError> {
        self.symbols
            .get(&id)
            .filter(|symbol| symbol.is_valid)
            .ok_or(ProtocolError::InvalidSymbol(id))
    }

    pub fn set_affiliate_status(&mut self, affiliate: Address, active: bool) {
        self.affiliates.insert(affiliate, active);
    }

    pub fn is_active_affiliate(&self, affiliate: &Address) -> bool {
        !affiliate.is_zero() && self.affiliates.get(affiliate).copied().unwrap_or(false)
    }

    pub fn whitelist_collateral(&mut self, collateral: Address) -> Result<(), ProtocolError> {
        if collateral.is_zero() {
            return Err(ProtocolError::ZeroAddress);
        }
        self.collaterals.insert(collateral);
        Ok(())
    }

    pub fn remove_collateral(&mut self, collateral: &Address) {
        self.collaterals.remove(collateral);
    }

    pub fn is_collateral_whitelisted(&self, collateral: &Address) -> bool {
        self.collaterals.contains(collateral)
    }

    pub fn ensure_collateral(&self, collateral: &Address) -> Result<(), ProtocolError> {
        if self.is_collateral_whitelisted(collateral) {
            Ok(())
        } else {
            Err(ProtocolError::CollateralNotWhitelisted(collateral.clone()))
        }
    }
}
