use std::sync::Arc;
use tracing::info;

use crate::command::Outcome;
use crate::error::{PauseScope, ProtocolError};
use crate::state::{Guard, ProtocolState};
use crate::types::{Address, Amount, Timestamp};
use crate::withdraw::WithdrawStatus;

impl ProtocolState {
    /// Pull `amount` of `collateral` from `sender` into `user`'s available balance.
    pub(crate) fn deposit_for(
        &mut self,
        sender: &Address,
        collateral: &Address,
        user: &Address,
        amount: Amount,
    ) -> Result<Outcome, ProtocolError> {
        self.enforce(&[
            Guard::NotPaused(PauseScope::Deposit),
            Guard::SenderNotSuspended(sender),
            Guard::UserNotSuspended(user),
            Guard::CollateralWhitelisted(collateral),
        ])?;

        let vault = self.config.vault.clone();
        Arc::make_mut(&mut self.tokens)
            .transfer_from(collateral, &vault, sender, &vault, amount)?;
        Arc::make_mut(&mut self.accounts).credit(user, collateral, amount)?;

        info!(
            sender = %sender,
            user = %user,
            collateral = %collateral,
            amount = %amount,
            "collateral deposited"
        );
        Ok(Outcome::Done)
    }

    pub(crate) fn initiate_withdraw(
        &mut self,
        user: &Address,
        collateral: &Address,
        amount: Amount,
        to: &Address,
        now: Timestamp,
    ) -> Result<Outcome, ProtocolError> {
        self.enforce(&[
            Guard::NotPaused(PauseScope::Withdraw),
            Guard::SenderNotSuspended(user),
            // a suspended receiver is reported as a suspended sender
            Guard::SenderNotSuspended(to),
            Guard::CollateralWhitelisted(collateral),
        ])?;
        if to.is_zero() {
            return Err(ProtocolError::ZeroAddress);
        }
        let available = self.accounts.balance(user, collateral).available;
        if available < amount {
            return Err(ProtocolError::InsufficientBalance {
                available,
                required: amount,
            });
        }
        self.enforce(&[Guard::InstantActionInactive(user)])?;

        Arc::make_mut(&mut self.accounts).debit(user, collateral, amount)?;
        let id = Arc::make_mut(&mut self.withdrawals)
            .create(user.clone(), to.clone(), collateral.clone(), amount, now);

        info!(
            withdraw_id = id,
            user = %user,
            to = %to,
            collateral = %collateral,
            amount = %amount,
            "withdraw initiated"
        );
        Ok(Outcome::WithdrawInitiated { id })
    }

    /// Gates shared by completion and cancellation of a request.
    fn withdraw_gates(&self, id: u64) -> Result<(Address, Address), ProtocolError> {
        self.enforce(&[Guard::NotPaused(PauseScope::Withdraw)])?;
        let request = self.withdrawals.existing(id)?;
        self.enforce(&[
            Guard::UserNotSuspended(&request.user),
            Guard::ReceiverNotSuspended(&request.to),
            Guard::WithdrawalNotSuspended(id),
        ])?;
        Ok((request.user.clone(), request.to.clone()))
    }

    /// Pays out an initiated request to its receiver; any caller may trigger it.
    pub(crate) fn complete_withdraw(&mut self, id: u64, now: Timestamp) -> Result<Outcome, ProtocolError> {
        self.withdraw_gates(id)?;
        let request = Arc::make_mut(&mut self.withdrawals).resolve(id, WithdrawStatus::Completed, now)?;

        let vault = self.config.vault.clone();
        Arc::make_mut(&mut self.tokens)
            .transfer(&request.collateral, &vault, &request.to, request.amount)?;

        info!(
            withdraw_id = id,
            to = %request.to,
            amount = %request.amount,
            "withdraw completed"
        );
        Ok(Outcome::WithdrawResolved {
            id,
            status: WithdrawStatus::Completed,
        })
    }

    pub(crate) fn cancel_withdraw(
        &mut self,
        caller: &Address,
        id: u64,
        now: Timestamp,
    ) -> Result<Outcome, ProtocolError> {
        let (user, _) = self.withdraw_gates(id)?;
        if &user != caller {
            return Err(ProtocolError::NotWithdrawOwner(id));
        }
        let request = Arc::make_mut(&mut self.withdrawals).resolve(id, WithdrawStatus::Canceled, now)?;
        Arc::make_mut(&mut self.accounts)
            .credit(&request.user, &request.collateral, request.amount)?;

        info!(withdraw_id = id, user = %request.user, amount = %request.amount, "withdraw canceled");
        Ok(Outcome::WithdrawResolved {
            id,
            status: WithdrawStatus::Canceled,
        })
    }

    pub(crate) fn activate_instant_action_mode(&mut self, caller: &Address) -> Result<Outcome, ProtocolError> {
        self.enforce(&[Guard::NotPartyB(caller)])?;
        Arc::make_mut(&mut self.instant).activate(caller)?;
        info!(party_a = %caller, "instant action mode activated");
        Ok(Outcome::Done)
    }

    pub(crate) fn propose_to_deactivate_instant_action_mode(
        &mut self,
        caller: &Address,
        now: Timestamp,
    ) -> Result<Outcome, ProtocolError> {
        self.enforce(&[Guard::NotPartyB(caller)])?;
        Arc::make_mut(&mut self.instant).propose_deactivation(caller, now)?;
        info!(
            party_a = %caller,
            eligible_at = now.saturating_add(self.config.deactivate_instant_action_mode_cooldown),
            "instant action mode deactivation proposed"
        );
        Ok(Outcome::Done)
    }

    pub(crate) fn deactivate_instant_action_mode(
        &mut self,
        caller: &Address,
        now: Timestamp,
    ) -> Result<Outcome, ProtocolError> {
        self.enforce(&[Guard::NotPartyB(caller)])?;
        Arc::make_mut(&mut self.instant)
            .deactivate(caller, now, self.config.deactivate_instant_action_mode_cooldown)?;
        info!(party_a = %caller, "instant action mode deactivated");
        Ok(Outcome::Done)
    }

    fn binding_gates(&self, caller: &Address) -> Result<(), ProtocolError> {
        self.enforce(&[
            Guard::NotPartyB(caller),
            Guard::NotPaused(PauseScope::PartyAActions),
        ])
    }

    pub(crate) fn bind_to_party_b(&mut self, caller: &Address, party_b: &Address) -> Result<Outcome, ProtocolError> {
        self.binding_gates(caller)?;
        if !self.registry.is_active_party_b(party_b) {
            return Err(ProtocolError::PartyBNotActive(party_b.clone()));
        }
        Arc::make_mut(&mut self.bindings).bind(caller, party_b.clone())?;
        info!(party_a = %caller, party_b = %party_b, "bound to partyB");
        Ok(Outcome::Done)
    }

    pub(crate) fn initiate_unbinding_from_party_b(
        &mut self,
        caller: &Address,
        now: Timestamp,
    ) -> Result<Outcome, ProtocolError> {
        self.binding_gates(caller)?;
        Arc::make_mut(&mut self.bindings).initiate_unbinding(caller, now)?;
        info!(party_a = %caller, requested_at = now, "unbinding initiated");
        Ok(Outcome::Done)
    }

    pub(crate) fn complete_unbinding_from_party_b(
        &mut self,
        caller: &Address,
        now: Timestamp,
    ) -> Result<Outcome, ProtocolError> {
        self.binding_gates(caller)?;
        let party_b = Arc::make_mut(&mut self.bindings)
            .complete_unbinding(caller, now, self.config.unbinding_cooldown)?;
        info!(party_a = %caller, party_b = %party_b, "unbinding completed");
        Ok(Outcome::Done)
    }

    pub(crate) fn cancel_unbinding_from_party_b(&mut self, caller: &Address) -> Result<Outcome, ProtocolError> {
        self.binding_gates(caller)?;
        Arc::make_mut(&mut self.bindings).cancel_unbinding(caller)?;
        info!(party_a = %caller, "unbinding canceled");
        Ok(Outcome::Done)
    }
}
