use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ProtocolError;
use crate::types::{Address, Amount, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WithdrawStatus {
    Initiated,
    Canceled,
    Completed,
}

impl fmt::Display for WithdrawStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Initiated => "INITIATED",
            Self::Canceled => "CANCELED",
            Self::Completed => "COMPLETED",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub id: u64,
    pub user: Address,
    pub to: Address,
    pub collateral: Address,
    #[serde(with = "crate::types::amount")]
    pub amount: Amount,
    pub status: WithdrawStatus,
    pub initiated_at: Timestamp,
    pub resolved_at: Option<Timestamp>,
}

/// Withdrawal requests keyed by sequential id.
#[derive(Debug, Clone, Default)]
pub struct WithdrawRegistry {
    requests: BTreeMap<u64, WithdrawRequest>,
    last_id: u64,
}

impl WithdrawRegistry {
    pub fn last_id(&self) -> u64 {
        self.last_id
    }

    pub fn get(&self, id: u64) -> Option<&WithdrawRequest> {
        self.requests.get(&id)
    }

    /// Existing request, or "Invalid withdraw id" for 0 and ids past the counter.
    pub fn existing(&self, id: u64) -> Result<&WithdrawRequest, ProtocolError> {
        if id == 0 || id > self.last_id {
            return Err(ProtocolError::InvalidWithdrawId(id));
        }
        self.requests
            .get(&id)
            .ok_or(ProtocolError::InvalidWithdrawId(id))
    }

    pub fn create(
        &mut self,
        user: Address,
        to: Address,
        collateral: Address,
        amount: Amount,
        now: Timestamp,
    ) -> u64 {
        self.last_id += 1;
        let id = self.last_id;
        self.requests.insert(
            id,
            WithdrawRequest {
                id,
                user,
                to,
                collateral,
                amount,
                status: WithdrawStatus::Initiated,
                initiated_at: now,
                resolved_at: None,
            },
        );
        id
    }

    /// Terminal transition out of `INITIATED`; returns the resolved request.
    pub fn resolve(
        &mut self,
        id: u64,
        status: WithdrawStatus,
        now: Timestamp,
    ) -> Result<WithdrawRequest, ProtocolError> {
        let request = self
            .requests
            .get_mut(&id)
            .ok_or(ProtocolError::InvalidWithdrawId(id))?;
        if request.status != WithdrawStatus::Initiated {
            return Err(ProtocolError::InvalidWithdrawState {
                id,
                status: request.status.to_string(),
            });
        }
        request.status = status;
        request.resolved_at = Some(now);
        Ok(request.clone())
    }
}
