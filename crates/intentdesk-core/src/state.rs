use std::sync::Arc;
use tracing::debug;

use crate::access::{AccessControl, Role};
use crate::account::AccountLedger;
use crate::binding::BindingRegistry;
use crate::collateral::TokenLedger;
use crate::command::{Command, Outcome};
use crate::config::ProtocolConfig;
use crate::error::{PauseScope, ProtocolError};
use crate::instant::InstantActionRegistry;
use crate::intent::IntentBook;
use crate::registry::Registry;
use crate::types::{Address, Timestamp};
use crate::withdraw::WithdrawRegistry;

/// One precondition of an operation.
///
/// Operations list their guards in the order they must be reported; the
/// first failing guard wins.
#[derive(Debug, Clone, Copy)]
pub enum Guard<'a> {
    NotPaused(PauseScope),
    HasRole(&'a Address, Role),
    SenderNotSuspended(&'a Address),
    UserNotSuspended(&'a Address),
    ReceiverNotSuspended(&'a Address),
    WithdrawalNotSuspended(u64),
    PartyANotSuspended(&'a Address),
    IsPartyB(&'a Address),
    NotPartyB(&'a Address),
    InstantActionInactive(&'a Address),
    CollateralWhitelisted(&'a Address),
}

/// The whole protocol state: every registry plus the external token ledger.
///
/// `apply` mutates in place and may leave partial effects behind on error;
/// callers that need all-or-nothing semantics use [`ProtocolState::execute`]
/// or apply to a clone.
///
/// Components sit behind `Arc` and are written through `Arc::make_mut`, so a
/// clone costs one refcount bump per component and only the components a
/// command touches are copied.
#[derive(Debug, Clone)]
pub struct ProtocolState {
    pub(crate) config: ProtocolConfig,
    pub(crate) access: Arc<AccessControl>,
    pub(crate) registry: Arc<Registry>,
    pub(crate) accounts: Arc<AccountLedger>,
    pub(crate) withdrawals: Arc<WithdrawRegistry>,
    pub(crate) bindings: Arc<BindingRegistry>,
    pub(crate) instant: Arc<InstantActionRegistry>,
    pub(crate) intents: Arc<IntentBook>,
    pub(crate) tokens: Arc<TokenLedger>,
}

impl ProtocolState {
    pub fn new(admin: Address, config: ProtocolConfig) -> Self {
        Self {
            config,
            access: Arc::new(AccessControl::with_admin(admin)),
            registry: Arc::default(),
            accounts: Arc::default(),
            withdrawals: Arc::default(),
            bindings: Arc::default(),
            instant: Arc::default(),
            intents: Arc::default(),
            tokens: Arc::new(TokenLedger::new()),
        }
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn accounts(&self) -> &AccountLedger {
        &self.accounts
    }

    pub fn withdrawals(&self) -> &WithdrawRegistry {
        &self.withdrawals
    }

    pub fn bindings(&self) -> &BindingRegistry {
        &self.bindings
    }

    pub fn instant_actions(&self) -> &InstantActionRegistry {
        &self.instant
    }

    pub fn intents(&self) -> &IntentBook {
        &self.intents
    }

    pub fn tokens(&self) -> &TokenLedger {
        &self.tokens
    }

    pub fn check(&self, guard: Guard<'_>) -> Result<(), ProtocolError> {
        match guard {
            Guard::NotPaused(scope) => self.access.ensure_not_paused(scope),
            Guard::HasRole(account, role) => self.access.require_role(account, role),
            Guard::SenderNotSuspended(account) => {
                suspended_as(self.access.is_suspended(account), || {
                    ProtocolError::SenderSuspended(account.clone())
                })
            }
            Guard::UserNotSuspended(account) => suspended_as(self.access.is_suspended(account), || {
                ProtocolError::UserSuspended(account.clone())
            }),
            Guard::ReceiverNotSuspended(account) => {
                suspended_as(self.access.is_suspended(account), || {
                    ProtocolError::ReceiverSuspended(account.clone())
                })
            }
            Guard::WithdrawalNotSuspended(id) => {
                suspended_as(self.access.is_withdrawal_suspended(id), || {
                    ProtocolError::WithdrawalSuspended(id)
                })
            }
            Guard::PartyANotSuspended(account) => {
                suspended_as(self.access.is_suspended(account), || {
                    ProtocolError::PartyASuspended(account.clone())
                })
            }
            Guard::IsPartyB(account) => {
                if self.registry.is_active_party_b(account) {
                    Ok(())
                } else {
                    Err(ProtocolError::ShouldBePartyB)
                }
            }
            Guard::NotPartyB(account) => {
                if self.registry.is_active_party_b(account) {
                    Err(ProtocolError::ShouldNotBePartyB)
                } else {
                    Ok(())
                }
            }
            Guard::InstantActionInactive(account) => self.instant.ensure_inactive(account),
            Guard::CollateralWhitelisted(collateral) => self.registry.ensure_collateral(collateral),
        }
    }

    /// Evaluate `guards` in order, stopping at the first failure.
    pub fn enforce(&self, guards: &[Guard<'_>]) -> Result<(), ProtocolError> {
        for guard in guards {
            if let Err(err) = self.check(*guard) {
                debug!(guard = ?guard, error = %err, "guard rejected operation");
                return Err(err);
            }
        }
        Ok(())
    }

    /// Apply `command` on behalf of `caller` at time `now`, in place.
    pub fn apply(
        &mut self,
        caller: &Address,
        now: Timestamp,
        command: &Command,
    ) -> Result<Outcome, ProtocolError> {
        match command {
            Command::Mint { token, to, amount } => {
                Arc::make_mut(&mut self.tokens).mint(token, to, *amount)?;
                Ok(Outcome::Done)
            }
            Command::Approve {
                token,
                spender,
                amount,
            } => {
                Arc::make_mut(&mut self.tokens).approve(token, caller, spender, *amount);
                Ok(Outcome::Done)
            }

            Command::Deposit { collateral, amount } => {
                self.deposit_for(caller, collateral, caller, *amount)
            }
            Command::DepositFor {
                collateral,
                user,
                amount,
            } => self.deposit_for(caller, collateral, user, *amount),
            Command::InitiateWithdraw {
                collateral,
                amount,
                to,
            } => self.initiate_withdraw(caller, collateral, *amount, to, now),
            Command::CompleteWithdraw { id } => self.complete_withdraw(*id, now),
            Command::CancelWithdraw { id } => self.cancel_withdraw(caller, *id, now),
            Command::ActivateInstantActionMode => self.activate_instant_action_mode(caller),
            Command::ProposeToDeactivateInstantActionMode => {
                self.propose_to_deactivate_instant_action_mode(caller, now)
            }
            Command::DeactivateInstantActionMode => {
                self.deactivate_instant_action_mode(caller, now)
            }
            Command::BindToPartyB { party_b } => self.bind_to_party_b(caller, party_b),
            Command::InitiateUnbindingFromPartyB => {
                self.initiate_unbinding_from_party_b(caller, now)
            }
            Command::CompleteUnbindingFromPartyB => {
                self.complete_unbinding_from_party_b(caller, now)
            }
            Command::CancelUnbindingFromPartyB => self.cancel_unbinding_from_party_b(caller),

            Command::SendOpenIntent(request) => self.send_open_intent(caller, request, now),
            Command::CancelOpenIntent { ids } => self.cancel_open_intent(caller, ids, now),
            Command::ExpireOpenIntents { ids } => self.expire_open_intents(ids, now),

            Command::LockOpenIntent { id } => self.lock_open_intent(caller, *id, now),
            Command::UnlockOpenIntent { id } => self.unlock_open_intent(caller, *id, now),
            Command::FillOpenIntent {
                id,
                quantity,
                price,
            } => self.fill_open_intent(caller, *id, *quantity, *price, now),

            control => self.apply_control(caller, control),
        }
    }

    /// All-or-nothing variant of [`ProtocolState::apply`].
    pub fn execute(
        &mut self,
        caller: &Address,
        now: Timestamp,
        command: &Command,
    ) -> Result<Outcome, ProtocolError> {
        let mut working = self.clone();
        let outcome = working.apply(caller, now, command)?;
        *self = working;
        Ok(outcome)
    }
}

fn suspended_as(
    suspended: bool,
    error: impl FnOnce() -> ProtocolError,
) -> Result<(), ProtocolError> {
    if suspended {
        Err(error())
    } else {
        Ok(())
    }
}
