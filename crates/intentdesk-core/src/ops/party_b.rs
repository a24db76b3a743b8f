use std::sync::Arc;
use tracing::info;

use crate::command::Outcome;
use crate::error::{PauseScope, ProtocolError};
use crate::intent::{premium, trading_fee, IntentStatus, OpenIntentRequest, Trade};
use crate::state::{Guard, ProtocolState};
use crate::types::{Address, Amount, Timestamp};

impl ProtocolState {
    pub(crate) fn lock_open_intent(
        &mut self,
        caller: &Address,
        id: u64,
        now: Timestamp,
    ) -> Result<Outcome, ProtocolError> {
        self.enforce(&[
            Guard::NotPaused(PauseScope::PartyBActions),
            Guard::IsPartyB(caller),
        ])?;
        let intent = self.intents.existing(id)?;
        intent.ensure_status(&[IntentStatus::Pending])?;
        if intent.is_past_deadline(now) {
            return Err(ProtocolError::IntentExpired);
        }
        if now >= intent.expiration_timestamp {
            return Err(ProtocolError::ExpirationPassed);
        }

        let symbol = self.registry.valid_symbol(intent.symbol_id)?;
        let party_b_oracle = self
            .registry
            .party_b_config(caller)
            .map(|config| config.oracle_id)
            .unwrap_or_default();
        if party_b_oracle != symbol.oracle_id {
            return Err(ProtocolError::OracleMismatch {
                party_b_oracle,
                symbol_oracle: symbol.oracle_id,
            });
        }
        if &intent.party_a == caller {
            return Err(ProtocolError::PartyACannotBePartyB);
        }
        if !intent.party_bs_white_list.is_empty() && !intent.party_bs_white_list.contains(caller) {
            return Err(ProtocolError::NotWhitelisted);
        }

        let intent = Arc::make_mut(&mut self.intents).existing_mut(id)?;
        intent.party_b = Some(caller.clone());
        intent.set_status(IntentStatus::Locked, now);

        info!(intent_id = id, party_b = %caller, "open intent locked");
        Ok(Outcome::IntentUpdated {
            id,
            status: IntentStatus::Locked,
        })
    }

    /// Hand a locked intent back to the market, or expire it once past its deadline.
    pub(crate) fn unlock_open_intent(
        &mut self,
        caller: &Address,
        id: u64,
        now: Timestamp,
    ) -> Result<Outcome, ProtocolError> {
        self.enforce(&[Guard::NotPaused(PauseScope::PartyBActions)])?;
        let intent = self.intents.existing(id)?;
        if intent.party_b.as_ref() != Some(caller) {
            return Err(ProtocolError::NotIntentPartyB(id));
        }
        intent.ensure_status(&[IntentStatus::Locked])?;

        let status = if intent.is_past_deadline(now) {
            self.close_intent(id, IntentStatus::Expired, now)?;
            IntentStatus::Expired
        } else {
            let intent = Arc::make_mut(&mut self.intents).existing_mut(id)?;
            intent.party_b = None;
            intent.set_status(IntentStatus::Pending, now);
            IntentStatus::Pending
        };

        info!(intent_id = id, party_b = %caller, status = %status, "open intent unlocked");
        Ok(Outcome::IntentUpdated { id, status })
    }

    pub(crate) fn fill_open_intent(
        &mut self,
        caller: &Address,
        id: u64,
        quantity: Amount,
        price: Amount,
        now: Timestamp,
    ) -> Result<Outcome, ProtocolError> {
        self.enforce(&[Guard::NotPaused(PauseScope::PartyBActions)])?;
        let intent = self.intents.existing(id)?.clone();
        if intent.party_b.as_ref() != Some(caller) {
            return Err(ProtocolError::NotIntentPartyB(id));
        }
        self.enforce(&[Guard::PartyANotSuspended(&intent.party_a)])?;
        intent.ensure_status(&[IntentStatus::Locked])?;
        if intent.is_past_deadline(now) {
            return Err(ProtocolError::IntentExpired);
        }
        if quantity == 0 || quantity > intent.quantity {
            return Err(ProtocolError::InvalidQuantity);
        }
        if price > intent.price {
            return Err(ProtocolError::InvalidFillPrice);
        }

        let fee_rate = self
            .registry
            .symbol(intent.symbol_id)
            .map(|symbol| symbol.trading_fee)
            .ok_or(ProtocolError::InvalidSymbol(intent.symbol_id))?;
        let premium = premium(quantity, price).ok_or(ProtocolError::Overflow("fill premium"))?;
        let fee = trading_fee(premium, fee_rate).ok_or(ProtocolError::Overflow("fill trading fee"))?;

        let token = &intent.fee_token;
        Arc::make_mut(&mut self.accounts)
            .release(&intent.party_a, token, intent.locked_amount)?;
        Arc::make_mut(&mut self.accounts)
            .transfer(&intent.party_a, caller, token, premium)?;
        let collector = self.config.fee_collector.clone();
        Arc::make_mut(&mut self.accounts)
            .transfer(&intent.party_a, &collector, token, fee)?;

        let trade_id = Arc::make_mut(&mut self.intents).record_trade(Trade {
            id: 0,
            open_intent_id: id,
            party_a: intent.party_a.clone(),
            party_b: caller.clone(),
            symbol_id: intent.symbol_id,
            quantity,
            price,
            strike_price: intent.strike_price,
            expiration_timestamp: intent.expiration_timestamp,
            exercise_fee: intent.exercise_fee,
            premium,
            trading_fee: fee,
            opened_at: now,
        });
        let filled = Arc::make_mut(&mut self.intents).existing_mut(id)?;
        filled.trade_id = Some(trade_id);
        filled.set_status(IntentStatus::Filled, now);

        let remainder_intent_id = if quantity < intent.quantity {
            let remainder = OpenIntentRequest {
                party_bs_white_list: intent.party_bs_white_list.clone(),
                symbol_id: intent.symbol_id,
                price: intent.price,
                quantity: intent.quantity - quantity,
                strike_price: intent.strike_price,
                expiration_timestamp: intent.expiration_timestamp,
                exercise_fee: intent.exercise_fee,
                deadline: intent.deadline,
                fee_token: intent.fee_token.clone(),
                affiliate: intent.affiliate.clone(),
                user_data: intent.user_data.clone(),
            };
            Some(self.open_intent_for(&intent.party_a, remainder, fee_rate, id, now)?)
        } else {
            None
        };

        info!(
            intent_id = id,
            trade_id,
            party_a = %intent.party_a,
            party_b = %caller,
            quantity = %quantity,
            price = %price,
            premium = %premium,
            trading_fee = %fee,
            remainder_intent_id = ?remainder_intent_id,
            "open intent filled"
        );
        Ok(Outcome::IntentFilled {
            id,
            trade_id,
            remainder_intent_id,
        })
    }
}
