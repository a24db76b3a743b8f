use std::sync::Arc;
use tracing::info;

use crate::command::{ClosedIntent, Outcome};
use crate::error::{PauseScope, ProtocolError};
use crate::intent::{lock_amount, IntentStatus, OpenIntentRequest};
use crate::state::{Guard, ProtocolState};
use crate::types::{Address, Amount, Timestamp, ONE};

const OPEN_STATES: [IntentStatus; 2] = [IntentStatus::Pending, IntentStatus::Locked];

impl ProtocolState {
    pub(crate) fn send_open_intent(
        &mut self,
        caller: &Address,
        request: &OpenIntentRequest,
        now: Timestamp,
    ) -> Result<Outcome, ProtocolError> {
        self.enforce(&[Guard::NotPaused(PauseScope::PartyAActions)])?;
        let fee_rate = self.registry.valid_symbol(request.symbol_id)?.trading_fee;

        if request.deadline < now.saturating_add(self.config.min_deadline_offset) {
            return Err(ProtocolError::LowDeadline);
        }
        if request.expiration_timestamp < now.saturating_add(self.config.min_expiration_offset) {
            return Err(ProtocolError::LowExpiration);
        }
        if request.exercise_fee.cap > self.config.max_exercise_fee_cap {
            return Err(ProtocolError::HighExerciseFeeCap);
        }
        if request.exercise_fee.rate > ONE {
            return Err(ProtocolError::HighExerciseFeeRate);
        }
        self.enforce(&[Guard::InstantActionInactive(caller)])?;
        if !self.registry.is_active_affiliate(&request.affiliate) {
            return Err(ProtocolError::InvalidAffiliate);
        }
        if let Some(bound) = self.bindings.bound_party_b(caller) {
            if !request.party_bs_white_list.contains(&bound) {
                return Err(ProtocolError::BoundToAnotherPartyB);
            }
        }
        if request.party_bs_white_list.contains(caller) {
            return Err(ProtocolError::SenderInWhitelist);
        }

        let id = self.open_intent_for(caller, request.clone(), fee_rate, 0, now)?;
        let locked_amount = self
            .intents
            .get(id)
            .map(|intent| intent.locked_amount)
            .unwrap_or_default();

        info!(
            intent_id = id,
            party_a = %caller,
            symbol_id = request.symbol_id,
            locked_amount = %locked_amount,
            "open intent sent"
        );
        Ok(Outcome::IntentOpened { id, locked_amount })
    }

    /// Reserve the lock amount and store a new pending intent.
    pub(crate) fn open_intent_for(
        &mut self,
        party_a: &Address,
        request: OpenIntentRequest,
        fee_rate: Amount,
        parent_id: u64,
        now: Timestamp,
    ) -> Result<u64, ProtocolError> {
        let available = self.accounts.balance(party_a, &request.fee_token).available;
        let amount = lock_amount(request.quantity, request.price, fee_rate).ok_or(
            ProtocolError::InsufficientAvailableBalance {
                available,
                required: Amount::MAX,
            },
        )?;
        Arc::make_mut(&mut self.accounts).lock(party_a, &request.fee_token, amount)?;
        Ok(Arc::make_mut(&mut self.intents)
            .open_pending(party_a.clone(), request, amount, parent_id, now))
    }

    /// Move an open intent to a terminal status and return PartyA's reservation.
    pub(crate) fn close_intent(
        &mut self,
        id: u64,
        status: IntentStatus,
        now: Timestamp,
    ) -> Result<(), ProtocolError> {
        let intent = Arc::make_mut(&mut self.intents).existing_mut(id)?;
        intent.set_status(status, now);
        let (party_a, fee_token, amount) = (
            intent.party_a.clone(),
            intent.fee_token.clone(),
            intent.locked_amount,
        );
        Arc::make_mut(&mut self.accounts).release(&party_a, &fee_token, amount)
    }

    /// Cancel every id, or none of them.
    ///
    /// Intents whose deadline has already passed end up `EXPIRED` instead.
    pub(crate) fn cancel_open_intent(
        &mut self,
        caller: &Address,
        ids: &[u64],
        now: Timestamp,
    ) -> Result<Outcome, ProtocolError> {
        self.enforce(&[Guard::NotPaused(PauseScope::PartyAActions)])?;

        let mut closed = Vec::with_capacity(ids.len());
        for &id in ids {
            let intent = self.intents.existing(id)?;
            if &intent.party_a != caller {
                return Err(ProtocolError::NotIntentPartyA(id));
            }
            self.enforce(&[Guard::InstantActionInactive(caller)])?;
            intent.ensure_status(&OPEN_STATES)?;

            let status = if intent.is_past_deadline(now) {
                IntentStatus::Expired
            } else {
                IntentStatus::Canceled
            };
            self.close_intent(id, status, now)?;
            closed.push(ClosedIntent { id, status });
            info!(intent_id = id, party_a = %caller, status = %status, "open intent closed");
        }
        Ok(Outcome::IntentsClosed { intents: closed })
    }

    /// Anyone may retire intents whose deadline has passed.
    pub(crate) fn expire_open_intents(&mut self, ids: &[u64], now: Timestamp) -> Result<Outcome, ProtocolError> {
        self.enforce(&[Guard::NotPaused(PauseScope::Global)])?;

        let mut closed = Vec::with_capacity(ids.len());
        for &id in ids {
            let intent = self.intents.existing(id)?;
            intent.ensure_status(&OPEN_STATES)?;
            if !intent.is_past_deadline(now) {
                return Err(ProtocolError::IntentNotExpired(id));
            }
            self.close_intent(id, IntentStatus::Expired, now)?;
            closed.push(ClosedIntent {
                id,
                status: IntentStatus::Expired,
            });
            info!(intent_id = id, "open intent expired");
        }
        Ok(Outcome::IntentsClosed { intents: closed })
    }
}
