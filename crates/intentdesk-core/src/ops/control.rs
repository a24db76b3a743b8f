use std::sync::Arc;
use tracing::info;

use crate::access::Role;
use crate::command::{Command, Outcome};
use crate::error::ProtocolError;
use crate::state::{Guard, ProtocolState};
use crate::types::Address;

/// Role an operator needs for a control command, `None` for non-control commands.
pub(crate) fn required_role(command: &Command) -> Option<Role> {
    let role = match command {
        Command::SetAdmin { .. } | Command::GrantRole { .. } | Command::RevokeRole { .. } => {
            Role::DefaultAdmin
        }
        Command::Pause { .. } => Role::Pauser,
        Command::Unpause { .. } => Role::Unpauser,
        Command::SuspendAddress { .. } | Command::SuspendWithdrawal { .. } => Role::Suspender,
        Command::WhitelistCollateral { .. }
        | Command::RemoveFromWhitelistCollateral { .. }
        | Command::SetPartyBConfig { .. }
        | Command::AddOracle { .. }
        | Command::AddSymbol(_)
        | Command::SetSymbolValidationState { .. }
        | Command::SetAffiliateStatus { .. }
        | Command::SetDeactivateInstantActionModeCooldown { .. }
        | Command::SetUnbindingCooldown { .. }
        | Command::SetMaxConnectedPartyBs { .. }
        | Command::SetPriceOracleAddress { .. }
        | Command::SetFeeCollector { .. }
        | Command::SetInstantActionMode { .. } => Role::Setter,
        _ => return None,
    };
    Some(role)
}

impl ProtocolState {
    pub(crate) fn apply_control(&mut self, caller: &Address, command: &Command) -> Result<Outcome, ProtocolError> {
        let role = required_role(command).ok_or(ProtocolError::UnsupportedCommand(command.name()))?;
        self.enforce(&[Guard::HasRole(caller, role)])?;

        let outcome = match command {
            Command::SetAdmin { user } => {
                Arc::make_mut(&mut self.access).grant(user.clone(), Role::DefaultAdmin);
                Outcome::Done
            }
            Command::GrantRole { user, role } => {
                Arc::make_mut(&mut self.access).grant(user.clone(), *role);
                Outcome::Done
            }
            Command::RevokeRole { user, role } => {
                Arc::make_mut(&mut self.access).revoke(user, *role);
                Outcome::Done
            }
            Command::Pause { scope } => {
                Arc::make_mut(&mut self.access).set_paused(*scope, true);
                Outcome::Done
            }
            Command::Unpause { scope } => {
                Arc::make_mut(&mut self.access).set_paused(*scope, false);
                Outcome::Done
            }
            Command::WhitelistCollateral { collateral } => {
                Arc::make_mut(&mut self.registry).whitelist_collateral(collateral.clone())?;
                Outcome::Done
            }
            Command::RemoveFromWhitelistCollateral { collateral } => {
                Arc::make_mut(&mut self.registry).remove_collateral(collateral);
                Outcome::Done
            }
            Command::SetPartyBConfig { party_b, config } => {
                Arc::make_mut(&mut self.registry)
                    .set_party_b_config(party_b.clone(), config.clone());
                Outcome::Done
            }
            Command::AddOracle { name, contract } => {
                let id = Arc::make_mut(&mut self.registry).add_oracle(name.clone(), contract.clone());
                Outcome::OracleAdded { id }
            }
            Command::AddSymbol(symbol) => {
                let id = Arc::make_mut(&mut self.registry).add_symbol(symbol.clone())?;
                Outcome::SymbolAdded { id }
            }
            Command::SetSymbolValidationState {
                symbol_id,
                is_valid,
            } => {
                Arc::make_mut(&mut self.registry)
                    .set_symbol_validation_state(*symbol_id, *is_valid)?;
                Outcome::Done
            }
            Command::SetAffiliateStatus { affiliate, status } => {
                Arc::make_mut(&mut self.registry).set_affiliate_status(affiliate.clone(), *status);
                Outcome::Done
            }
            Command::SetDeactivateInstantActionModeCooldown { cooldown } => {
                self.config.deactivate_instant_action_mode_cooldown = *cooldown;
                Outcome::Done
            }
            Command::SetUnbindingCooldown { cooldown } => {
                self.config.unbinding_cooldown = *cooldown;
                Outcome::Done
            }
            Command::SetMaxConnectedPartyBs { max } => {
                self.config.max_connected_party_bs = *max;
                Outcome::Done
            }
            Command::SetPriceOracleAddress { oracle } => {
                if oracle.is_zero() {
                    return Err(ProtocolError::ZeroAddress);
                }
                self.config.price_oracle = Some(oracle.clone());
                Outcome::Done
            }
            Command::SetFeeCollector { collector } => {
                if collector.is_zero() {
                    return Err(ProtocolError::ZeroAddress);
                }
                self.config.fee_collector = collector.clone();
                Outcome::Done
            }
            Command::SetInstantActionMode { user, active } => {
                Arc::make_mut(&mut self.instant).force(user, *active);
                Outcome::Done
            }
            Command::SuspendAddress { user, suspended } => {
                Arc::make_mut(&mut self.access).set_address_suspended(user.clone(), *suspended);
                Outcome::Done
            }
            Command::SuspendWithdrawal { id, suspended } => {
                Arc::make_mut(&mut self.access).set_withdrawal_suspended(*id, *suspended);
                Outcome::Done
            }
            other => return Err(ProtocolError::UnsupportedCommand(other.name())),
        };

        info!(operator = %caller, command = command.name(), role = %role, "control command applied");
        Ok(outcome)
    }
}
