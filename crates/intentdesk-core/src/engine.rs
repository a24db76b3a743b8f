use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::account::Balance;
use crate::clock::{Clock, SystemClock};
use crate::command::{Command, Outcome};
use crate::config::{EngineConfig, ProtocolConfig};
use crate::error::ProtocolError;
use crate::instant::InstantActionMode;
use crate::intent::{OpenIntent, OpenIntentRequest, Trade};
use crate::journal::{Genesis, JournalEntry};
use crate::state::ProtocolState;
use crate::storage::PersistentJournal;
use crate::types::{Address, Amount, Timestamp};
use crate::withdraw::WithdrawRequest;

/// PartyA's binding as seen by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingView {
    pub party_b: Option<Address>,
    pub unbinding_request_time: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstantActionView {
    pub mode: InstantActionMode,
    pub active: bool,
    /// When a pending deactivation may be confirmed, `0` without a proposal.
    pub deactivate_time: Timestamp,
    pub cooldown: u64,
}

struct Ledgered {
    state: ProtocolState,
    journal: PersistentJournal,
}

/// Serialised front door to the protocol state.
///
/// Every command reads the clock once, runs against a working copy of the
/// state, is journaled, and only then replaces the live state.
pub struct Engine {
    inner: AsyncMutex<Ledgered>,
    clock: Arc<dyn Clock>,
}

impl Engine {
    pub async fn bootstrap(config: EngineConfig) -> Result<Self, ProtocolError> {
        Self::bootstrap_with_clock(config, Arc::new(SystemClock)).await
    }

    /// Load the journal from the configured backend and replay it.
    pub async fn bootstrap_with_clock(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ProtocolError> {
        let journal = PersistentJournal::bootstrap(config.journal_storage.clone()).await?;
        Self::from_journal(journal, &config, clock).await
    }

    /// Start from an already loaded journal.
    ///
    /// `config.admin` and `config.protocol` only seed a fresh journal; once
    /// a genesis entry exists, the journaled values win.
    pub async fn from_journal(
        mut journal: PersistentJournal,
        config: &EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ProtocolError> {
        let proposed = Genesis {
            admin: config.admin.clone(),
            protocol: config.protocol.clone(),
        };
        let genesis = journal.ensure_genesis(&proposed, clock.now()).await?;
        if genesis != proposed {
            warn!(
                journaled_admin = %genesis.admin,
                configured_admin = %proposed.admin,
                protocol_matches = genesis.protocol == proposed.protocol,
                "configured bootstrap differs from journal genesis; using journal"
            );
        }
        let state = replay(journal.entries())?;

        info!(
            backend = journal.backend_label(),
            entries = journal.entries().len(),
            admin = %genesis.admin,
            "engine bootstrapped"
        );
        Ok(Self {
            inner: AsyncMutex::new(Ledgered { state, journal }),
            clock,
        })
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub async fn submit(&self, caller: &Address, command: Command) -> Result<Outcome, ProtocolError> {
        let mut inner = self.inner.lock().await;
        let now = self.clock.now();

        let mut working = inner.state.clone();
        let outcome = match working.apply(caller, now, &command) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(
                    caller = %caller,
                    command = command.name(),
                    kind = ?err.kind(),
                    error = %err,
                    "command rejected"
                );
                return Err(err);
            }
        };

        let entry = match inner.journal.append(caller, now, &command).await {
            Ok(entry) => entry,
            Err(err) => {
                warn!(command = command.name(), error = %err, "journal append failed");
                return Err(err);
            }
        };
        inner.state = working;

        info!(
            caller = %caller,
            command = command.name(),
            journal_index = entry.index,
            now,
            "command applied"
        );
        Ok(outcome)
    }

    /// Run `read` against the current state under the engine lock.
    pub async fn read<R>(&self, read: impl FnOnce(&ProtocolState) -> R) -> R {
        let inner = self.inner.lock().await;
        read(&inner.state)
    }

    // collateral token

    pub async fn mint(&self, caller: &Address, token: &Address, to: &Address, amount: Amount) -> Result<(), ProtocolError> {
        self.submit(
            caller,
            Command::Mint {
                token: token.clone(),
                to: to.clone(),
                amount,
            },
        )
        .await
        .map(|_| ())
    }

    pub async fn approve(&self, caller: &Address, token: &Address, spender: &Address, amount: Amount) -> Result<(), ProtocolError> {
        self.submit(
            caller,
            Command::Approve {
                token: token.clone(),
                spender: spender.clone(),
                amount,
            },
        )
        .await
        .map(|_| ())
    }

    // account

    pub async fn deposit(&self, caller: &Address, collateral: &Address, amount: Amount) -> Result<(), ProtocolError> {
        self.submit(
            caller,
            Command::Deposit {
                collateral: collateral.clone(),
                amount,
            },
        )
        .await
        .map(|_| ())
    }

    pub async fn deposit_for(
        &self,
        caller: &Address,
        collateral: &Address,
        user: &Address,
        amount: Amount,
    ) -> Result<(), ProtocolError> {
        self.submit(
            caller,
            Command::DepositFor {
                collateral: collateral.clone(),
                user: user.clone(),
                amount,
            },
        )
        .await
        .map(|_| ())
    }

    /// Returns the new withdraw id.
    pub async fn initiate_withdraw(
        &self,
        caller: &Address,
        collateral: &Address,
        amount: Amount,
        to: &Address,
    ) -> Result<u64, ProtocolError> {
        let outcome = self
            .submit(
                caller,
                Command::InitiateWithdraw {
                    collateral: collateral.clone(),
                    amount,
                    to: to.clone(),
                },
            )
            .await?;
        match outcome {
            Outcome::WithdrawInitiated { id } => Ok(id),
            other => Err(unexpected(other)),
        }
    }

    pub async fn complete_withdraw(&self, caller: &Address, id: u64) -> Result<(), ProtocolError> {
        self.submit(caller, Command::CompleteWithdraw { id })
            .await
            .map(|_| ())
    }

    pub async fn cancel_withdraw(&self, caller: &Address, id: u64) -> Result<(), ProtocolError> {
        self.submit(caller, Command::CancelWithdraw { id })
            .await
            .map(|_| ())
    }

    pub async fn activate_instant_action_mode(&self, caller: &Address) -> Result<(), ProtocolError> {
        self.submit(caller, Command::ActivateInstantActionMode)
            .await
            .map(|_| ())
    }

    pub async fn propose_to_deactivate_instant_action_mode(&self, caller: &Address) -> Result<(), ProtocolError> {
        self.submit(caller, Command::ProposeToDeactivateInstantActionMode)
            .await
            .map(|_| ())
    }

    pub async fn deactivate_instant_action_mode(&self, caller: &Address) -> Result<(), ProtocolError> {
        self.submit(caller, Command::DeactivateInstantActionMode)
            .await
            .map(|_| ())
    }

    pub async fn bind_to_party_b(&self, caller: &Address, party_b: &Address) -> Result<(), ProtocolError> {
        self.submit(
            caller,
            Command::BindToPartyB {
                party_b: party_b.clone(),
            },
        )
        .await
        .map(|_| ())
    }

    pub async fn initiate_unbinding_from_party_b(&self, caller: &Address) -> Result<(), ProtocolError> {
        self.submit(caller, Command::InitiateUnbindingFromPartyB)
            .await
            .map(|_| ())
    }

    pub async fn complete_unbinding_from_party_b(&self, caller: &Address) -> Result<(), ProtocolError> {
        self.submit(caller, Command::CompleteUnbindingFromPartyB)
            .await
            .map(|_| ())
    }

    pub async fn cancel_unbinding_from_party_b(&self, caller: &Address) -> Result<(), ProtocolError> {
        self.submit(caller, Command::CancelUnbindingFromPartyB)
            .await
            .map(|_| ())
    }

    // party A

    /// Returns the new intent id.
    pub async fn send_open_intent(&self, caller: &Address, request: OpenIntentRequest) -> Result<u64, ProtocolError> {
        match self.submit(caller, Command::SendOpenIntent(request)).await? {
            Outcome::IntentOpened { id, .. } => Ok(id),
            other => Err(unexpected(other)),
        }
    }

    pub async fn cancel_open_intent(&self, caller: &Address, ids: Vec<u64>) -> Result<Outcome, ProtocolError> {
        self.submit(caller, Command::CancelOpenIntent { ids }).await
    }

    pub async fn expire_open_intents(&self, caller: &Address, ids: Vec<u64>) -> Result<Outcome, ProtocolError> {
        self.submit(caller, Command::ExpireOpenIntents { ids }).await
    }

    // party B

    pub async fn lock_open_intent(&self, caller: &Address, id: u64) -> Result<(), ProtocolError> {
        self.submit(caller, Command::LockOpenIntent { id })
            .await
            .map(|_| ())
    }

    pub async fn unlock_open_intent(&self, caller: &Address, id: u64) -> Result<Outcome, ProtocolError> {
        self.submit(caller, Command::UnlockOpenIntent { id }).await
    }

    pub async fn fill_open_intent(
        &self,
        caller: &Address,
        id: u64,
        quantity: Amount,
        price: Amount,
    ) -> Result<Outcome, ProtocolError> {
        self.submit(caller, Command::FillOpenIntent { id, quantity, price })
            .await
    }

    // queries

    pub async fn balance_of(&self, user: &Address, collateral: &Address) -> Amount {
        self.balances_of(user, collateral).await.available
    }

    pub async fn locked_balances_of(&self, user: &Address, collateral: &Address) -> Amount {
        self.balances_of(user, collateral).await.locked
    }

    pub async fn balances_of(&self, user: &Address, collateral: &Address) -> Balance {
        self.read(|state| state.accounts().balance(user, collateral))
            .await
    }

    pub async fn token_balance_of(&self, token: &Address, owner: &Address) -> Amount {
        self.read(|state| state.tokens().balance_of(token, owner))
            .await
    }

    pub async fn get_withdraw(&self, id: u64) -> Option<WithdrawRequest> {
        self.read(|state| state.withdrawals().get(id).cloned()).await
    }

    pub async fn get_last_withdraw_id(&self) -> u64 {
        self.read(|state| state.withdrawals().last_id()).await
    }

    pub async fn get_open_intent(&self, id: u64) -> Option<OpenIntent> {
        self.read(|state| state.intents().get(id).cloned()).await
    }

    pub async fn get_trade(&self, id: u64) -> Option<Trade> {
        self.read(|state| state.intents().trade(id).cloned()).await
    }

    pub async fn get_bound_party_b(&self, user: &Address) -> Option<Address> {
        self.binding(user).await.party_b
    }

    pub async fn get_unbinding_request_time(&self, user: &Address) -> Timestamp {
        self.binding(user).await.unbinding_request_time
    }

    pub async fn binding(&self, user: &Address) -> BindingView {
        self.read(|state| {
            let binding = state.bindings().state(user);
            BindingView {
                party_b: binding.party_b().cloned(),
                unbinding_request_time: binding.unbinding_request_time(),
            }
        })
        .await
    }

    pub async fn get_instant_actions_mode_status(&self, user: &Address) -> bool {
        self.instant_action_mode(user).await.active
    }

    pub async fn get_instant_actions_mode_deactivate_time(&self, user: &Address) -> Timestamp {
        self.instant_action_mode(user).await.deactivate_time
    }

    pub async fn instant_action_mode(&self, user: &Address) -> InstantActionView {
        self.read(|state| {
            let cooldown = state.config().deactivate_instant_action_mode_cooldown;
            let mode = state.instant_actions().mode(user);
            InstantActionView {
                mode,
                active: mode.is_active(),
                deactivate_time: mode.deactivate_time(cooldown),
                cooldown,
            }
        })
        .await
    }

    pub async fn get_deactivate_instant_action_mode_cooldown(&self) -> u64 {
        self.read(|state| state.config().deactivate_instant_action_mode_cooldown)
            .await
    }

    pub async fn protocol_config(&self) -> ProtocolConfig {
        self.read(|state| state.config().clone()).await
    }

    pub async fn journal_entries(&self) -> Vec<JournalEntry> {
        let inner = self.inner.lock().await;
        inner.journal.entries().to_vec()
    }

    pub async fn journal_entries_by(&self, caller: &Address) -> Vec<JournalEntry> {
        let inner = self.inner.lock().await;
        inner.journal.entries_by(caller).cloned().collect()
    }

    pub async fn verify_journal_chain(&self) -> bool {
        let inner = self.inner.lock().await;
        inner.journal.verify_chain()
    }

    pub async fn journal_backend(&self) -> &'static str {
        let inner = self.inner.lock().await;
        inner.journal.backend_label()
    }
}

/// Rebuild protocol state by re-applying journaled commands in order.
///
/// The first entry must be the genesis that seeds admin and protocol config.
pub fn replay(entries: &[JournalEntry]) -> Result<ProtocolState, ProtocolError> {
    let (first, rest) = entries.split_first().ok_or_else(|| ProtocolError::ReplayDiverged {
        index: 0,
        reason: "journal is empty".to_string(),
    })?;
    let genesis = first.genesis().ok_or_else(|| ProtocolError::ReplayDiverged {
        index: first.index,
        reason: "first entry is not a genesis".to_string(),
    })?;

    let mut state = ProtocolState::new(genesis.admin, genesis.protocol);
    for entry in rest {
        let command = entry.decode_command().map_err(|err| ProtocolError::ReplayDiverged {
            index: entry.index,
            reason: err.to_string(),
        })?;
        state
            .apply(&entry.caller, entry.applied_at, &command)
            .map_err(|err| ProtocolError::ReplayDiverged {
                index: entry.index,
                reason: err.to_string(),
            })?;
    }
    Ok(state)
}

fn unexpected(outcome: Outcome) -> ProtocolError {
    ProtocolError::Serialization(format!("unexpected outcome {outcome:?}"))
}
