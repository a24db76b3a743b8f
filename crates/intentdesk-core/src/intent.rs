use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ProtocolError;
use crate::types::{mul_div, Address, Amount, Timestamp, ONE};

/// Fee charged when an option is exercised, both values 18-decimal fractions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseFee {
    #[serde(with = "crate::types::amount")]
    pub rate: Amount,
    #[serde(with = "crate::types::amount")]
    pub cap: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentStatus {
    Pending,
    Locked,
    Canceled,
    Expired,
    Filled,
}

impl IntentStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Locked)
    }
}

impl fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "PENDING",
            Self::Locked => "LOCKED",
            Self::Canceled => "CANCELED",
            Self::Expired => "EXPIRED",
            Self::Filled => "FILLED",
        };
        f.write_str(label)
    }
}

/// Terms PartyA submits with `send_open_intent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenIntentRequest {
    #[serde(default)]
    pub party_bs_white_list: Vec<Address>,
    pub symbol_id: u64,
    #[serde(with = "crate::types::amount")]
    pub price: Amount,
    #[serde(with = "crate::types::amount")]
    pub quantity: Amount,
    #[serde(default, with = "crate::types::amount")]
    pub strike_price: Amount,
    pub expiration_timestamp: Timestamp,
    #[serde(default)]
    pub exercise_fee: ExerciseFee,
    pub deadline: Timestamp,
    pub fee_token: Address,
    pub affiliate: Address,
    #[serde(default)]
    pub user_data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenIntent {
    pub id: u64,
    pub party_a: Address,
    pub party_b: Option<Address>,
    pub party_bs_white_list: Vec<Address>,
    pub symbol_id: u64,
    #[serde(with = "crate::types::amount")]
    pub price: Amount,
    #[serde(with = "crate::types::amount")]
    pub quantity: Amount,
    #[serde(with = "crate::types::amount")]
    pub strike_price: Amount,
    pub expiration_timestamp: Timestamp,
    pub exercise_fee: ExerciseFee,
    pub deadline: Timestamp,
    pub affiliate: Address,
    pub fee_token: Address,
    pub user_data: Option<String>,
    pub status: IntentStatus,
    /// `0` for intents sent directly by PartyA.
    pub parent_id: u64,
    pub trade_id: Option<u64>,
    /// Amount reserved from PartyA's available balance in `fee_token`.
    #[serde(with = "crate::types::amount")]
    pub locked_amount: Amount,
    pub created_at: Timestamp,
    pub status_modified_at: Timestamp,
}

impl OpenIntent {
    pub fn is_past_deadline(&self, now: Timestamp) -> bool {
        now > self.deadline
    }

    pub fn ensure_status(&self, allowed: &[IntentStatus]) -> Result<(), ProtocolError> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(ProtocolError::InvalidIntentState {
                id: self.id,
                status: self.status.to_string(),
            })
        }
    }

    pub fn set_status(&mut self, status: IntentStatus, now: Timestamp) {
        self.status = status;
        self.status_modified_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub id: u64,
    pub open_intent_id: u64,
    pub party_a: Address,
    pub party_b: Address,
    pub symbol_id: u64,
    #[serde(with = "crate::types::amount")]
    pub quantity: Amount,
    #[serde(with = "crate::types::amount")]
    pub price: Amount,
    #[serde(with = "crate::types::amount")]
    pub strike_price: Amount,
    pub expiration_timestamp: Timestamp,
    pub exercise_fee: ExerciseFee,
    #[serde(with = "crate::types::amount")]
    pub premium: Amount,
    #[serde(with = "crate::types::amount")]
    pub trading_fee: Amount,
    pub opened_at: Timestamp,
}

/// `floor(quantity * price / ONE)`.
pub fn premium(quantity: Amount, price: Amount) -> Option<Amount> {
    mul_div(quantity, price, ONE)
}

pub fn trading_fee(premium: Amount, fee_rate: Amount) -> Option<Amount> {
    mul_div(premium, fee_rate, ONE)
}

/// Premium plus trading fee reserved when an intent is opened.
pub fn lock_amount(quantity: Amount, price: Amount, fee_rate: Amount) -> Option<Amount> {
    let premium = premium(quantity, price)?;
    premium.checked_add(trading_fee(premium, fee_rate)?)
}

/// Open intents and the trades created by filling them.
#[derive(Debug, Clone, Default)]
pub struct IntentBook {
    intents: BTreeMap<u64, OpenIntent>,
    trades: BTreeMap<u64, Trade>,
    last_intent_id: u64,
    last_trade_id: u64,
}

impl IntentBook {
    pub fn last_intent_id(&self) -> u64 {
        self.last_intent_id
    }

    pub fn last_trade_id(&self) -> u64 {
        self.last_trade_id
    }

    pub fn get(&self, id: u64) -> Option<&OpenIntent> {
        self.intents.get(&id)
    }

    /// "Invalid intentId" for 0 and ids past the counter.
    pub fn existing(&self, id: u64) -> Result<&OpenIntent, ProtocolError> {
        if id == 0 || id > self.last_intent_id {
            return Err(ProtocolError::InvalidIntentId(id));
        }
        self.intents.get(&id).ok_or(ProtocolError::InvalidIntentId(id))
    }

    pub fn existing_mut(&mut self, id: u64) -> Result<&mut OpenIntent, ProtocolError> {
        if id == 0 || id > self.last_intent_id {
            return Err(ProtocolError::InvalidIntentId(id));
        }
        self.intents
            .get_mut(&id)
            .ok_or(ProtocolError::InvalidIntentId(id))
    }

    pub fn open_pending(
        &mut self,
        party_a: Address,
        request: OpenIntentRequest,
        locked_amount: Amount,
        parent_id: u64,
        now: Timestamp,
    ) -> u64 {
        self.last_intent_id += 1;
        let id = self.last_intent_id;
        self.intents.insert(
            id,
            OpenIntent {
                id,
                party_a,
                party_b: None,
                party_bs_white_list: request.party_bs_white_list,
                symbol_id: request.symbol_id,
                price: request.price,
                quantity: request.quantity,
                strike_price: request.strike_price,
                expiration_timestamp: request.expiration_timestamp,
                exercise_fee: request.exercise_fee,
                deadline: request.deadline,
                affiliate: request.affiliate,
                fee_token: request.fee_token,
                user_data: request.user_data,
                status: IntentStatus::Pending,
                parent_id,
                trade_id: None,
                locked_amount,
                created_at: now,
                status_modified_at: now,
            },
        );
        id
    }

    /// Stores a trade under the next trade id, overwriting `trade.id`.
    pub fn record_trade(&mut self, mut trade: Trade) -> u64 {
        self.last_trade_id += 1;
        trade.id = self.last_trade_id;
        self.trades.insert(trade.id, trade);
        self.last_trade_id
    }

    pub fn trade(&self, id: u64) -> Option<&Trade> {
        self.trades.get(&id)
    }

    pub fn intents_of<'a>(&'a self, party_a: &'a Address) -> impl Iterator<Item = &'a OpenIntent> + 'a {
        self.intents
            .values()
            .filter(move |intent| &intent.party_a == party_a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> OpenIntentRequest {
        OpenIntentRequest {
            party_bs_white_list: vec![],
            symbol_id: 1,
            price: 7,
            quantity: 100 * ONE,
            strike_price: 0,
            expiration_timestamp: 200,
            exercise_fee: ExerciseFee { rate: 0, cap: ONE },
            deadline: 200,
            fee_token: Address::from_index(0xc0),
            affiliate: Address::from_index(0xaf),
            user_data: None,
        }
    }

    #[test]
    fn lock_amount_adds_trading_fee() {
        assert_eq!(lock_amount(100 * ONE, 7, 0), Some(700));
        // 1% fee on a 1000 premium
        assert_eq!(lock_amount(1_000 * ONE, ONE, ONE / 100), Some(1_010 * ONE));
        assert_eq!(lock_amount(Amount::MAX, Amount::MAX, 0), None);
    }

    #[test]
    fn book_assigns_sequential_ids() {
        let mut book = IntentBook::default();
        let party_a = Address::from_index(1);
        assert_eq!(book.open_pending(party_a.clone(), request(), 700, 0, 10), 1);
        assert_eq!(book.open_pending(party_a.clone(), request(), 700, 1, 11), 2);

        let child = book.existing(2).unwrap();
        assert_eq!(child.parent_id, 1);
        assert_eq!(child.status, IntentStatus::Pending);
        assert_eq!(child.party_b, None);
        assert_eq!(book.intents_of(&party_a).count(), 2);

        assert_eq!(book.existing(0), Err(ProtocolError::InvalidIntentId(0)));
        assert_eq!(book.existing(3), Err(ProtocolError::InvalidIntentId(3)));
    }

    #[test]
    fn status_guard_names_current_status() {
        let mut book = IntentBook::default();
        let id = book.open_pending(Address::from_index(1), request(), 700, 0, 10);
        let intent = book.existing_mut(id).unwrap();
        intent.set_status(IntentStatus::Canceled, 20);

        let err = intent
            .ensure_status(&[IntentStatus::Pending, IntentStatus::Locked])
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid state: intent 1 is CANCELED");
        assert_eq!(intent.status_modified_at, 20);
    }
}
