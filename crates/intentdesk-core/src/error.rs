use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::types::{Address, Amount};

/// Feature switches that can be paused independently of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseScope {
    Global,
    Deposit,
    Withdraw,
    PartyAActions,
    PartyBActions,
}

impl fmt::Display for PauseScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Global => "Global",
            Self::Deposit => "Depositing",
            Self::Withdraw => "Withdrawing",
            Self::PartyAActions => "PartyA actions",
            Self::PartyBActions => "PartyB actions",
        };
        f.write_str(label)
    }
}

/// Coarse error category so callers can branch without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Pause,
    Access,
    Validation,
    State,
    Authorization,
    Balance,
    Collateral,
    Journal,
    Serialization,
}

/// Protocol errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Pausable: {0} paused")]
    Paused(PauseScope),

    #[error("Sender is suspended: {0}")]
    SenderSuspended(Address),

    #[error("User is suspended: {0}")]
    UserSuspended(Address),

    #[error("Receiver is suspended: {0}")]
    ReceiverSuspended(Address),

    #[error("Withdrawal is suspended: {0}")]
    WithdrawalSuspended(u64),

    #[error("PartyA is suspended: {0}")]
    PartyASuspended(Address),

    #[error("Must has role '{role}'")]
    MissingRole { role: String },

    #[error("Shouldn't be partyB")]
    ShouldNotBePartyB,

    #[error("Should be partyB")]
    ShouldBePartyB,

    #[error("Should be partyA of intent {0}")]
    NotIntentPartyA(u64),

    #[error("Should be partyB of intent {0}")]
    NotIntentPartyB(u64),

    #[error("Invalid sender for withdrawal {0}")]
    NotWithdrawOwner(u64),

    #[error("PartyA can't be partyB too")]
    PartyACannotBePartyB,

    #[error("Sender isn't whitelisted")]
    NotWhitelisted,

    #[error("User is bound to another PartyB")]
    BoundToAnotherPartyB,

    #[error("Oracle not matched: partyB uses {party_b_oracle}, symbol uses {symbol_oracle}")]
    OracleMismatch {
        party_b_oracle: u64,
        symbol_oracle: u64,
    },

    #[error("Invalid address '{0}'")]
    InvalidAddress(String),

    #[error("Zero address")]
    ZeroAddress,

    #[error("Collateral is not whitelisted: {0}")]
    CollateralNotWhitelisted(Address),

    #[error("Invalid withdraw id {0}")]
    InvalidWithdrawId(u64),

    #[error("Invalid intentId {0}")]
    InvalidIntentId(u64),

    #[error("Symbol is not valid: {0}")]
    InvalidSymbol(u64),

    #[error("Invalid oracle id {0}")]
    InvalidOracle(u64),

    #[error("Low deadline")]
    LowDeadline,

    #[error("Low expiration timestamp")]
    LowExpiration,

    #[error("High cap for exercise fee")]
    HighExerciseFeeCap,

    #[error("High rate for exercise fee")]
    HighExerciseFeeRate,

    #[error("Invalid affiliate")]
    InvalidAffiliate,

    #[error("Sender isn't allowed in partyBWhiteList")]
    SenderInWhitelist,

    #[error("PartyB is not active: {0}")]
    PartyBNotActive(Address),

    #[error("Invalid quantity")]
    InvalidQuantity,

    #[error("Opened price isn't valid")]
    InvalidFillPrice,

    #[error("Unsupported command: {0}")]
    UnsupportedCommand(&'static str),

    #[error("Invalid state: withdrawal {id} is {status}")]
    InvalidWithdrawState { id: u64, status: String },

    #[error("Invalid state: intent {id} is {status}")]
    InvalidIntentState { id: u64, status: String },

    #[error("Intent is expired")]
    IntentExpired,

    #[error("Requested expiration has been passed")]
    ExpirationPassed,

    #[error("Intent {0} is not expired")]
    IntentNotExpired(u64),

    #[error("Instant action mode is activated")]
    InstantActionModeActive,

    #[error("Instant actions mode is already activated")]
    InstantActionModeAlreadyActive,

    #[error("Instant actions mode isn't activated")]
    InstantActionModeNotActive,

    #[error("Deactivation is not proposed")]
    DeactivationNotProposed,

    #[error("Cooldown is not over yet")]
    CooldownNotOver,

    #[error("Already bound")]
    AlreadyBound,

    #[error("Not bound to any PartyB")]
    NotBound,

    #[error("Unbinding already initiated")]
    UnbindingAlreadyInitiated,

    #[error("Unbinding not initiated")]
    UnbindingNotInitiated,

    #[error("Unbinding cooldown not reached")]
    UnbindingCooldownNotReached,

    #[error("No pending unbinding")]
    NoPendingUnbinding,

    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientBalance { available: Amount, required: Amount },

    #[error("insufficient available balance: available {available}, required {required}")]
    InsufficientAvailableBalance { available: Amount, required: Amount },

    #[error("Insufficient locked balance: locked {locked}, required {required}")]
    InsufficientLockedBalance { locked: Amount, required: Amount },

    #[error("Arithmetic overflow in {0}")]
    Overflow(&'static str),

    #[error("insufficient allowance: allowed {allowed}, required {required}")]
    InsufficientAllowance { allowed: Amount, required: Amount },

    #[error("transfer amount exceeds balance: balance {balance}, required {required}")]
    InsufficientTokenBalance { balance: Amount, required: Amount },

    #[error("Journal error: {0}")]
    Journal(String),

    #[error("Journal replay diverged at entry {index}: {reason}")]
    ReplayDiverged { index: u64, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ProtocolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Paused(_) => ErrorKind::Pause,

            Self::SenderSuspended(_)
            | Self::UserSuspended(_)
            | Self::ReceiverSuspended(_)
            | Self::WithdrawalSuspended(_)
            | Self::PartyASuspended(_) => ErrorKind::Access,

            Self::MissingRole { .. }
            | Self::ShouldNotBePartyB
            | Self::ShouldBePartyB
            | Self::NotIntentPartyA(_)
            | Self::NotIntentPartyB(_)
            | Self::NotWithdrawOwner(_)
            | Self::PartyACannotBePartyB
            | Self::NotWhitelisted
            | Self::BoundToAnotherPartyB
            | Self::OracleMismatch { .. } => ErrorKind::Authorization,

            Self::InvalidAddress(_)
            | Self::ZeroAddress
            | Self::CollateralNotWhitelisted(_)
            | Self::InvalidWithdrawId(_)
            | Self::InvalidIntentId(_)
            | Self::InvalidSymbol(_)
            | Self::InvalidOracle(_)
            | Self::LowDeadline
            | Self::LowExpiration
            | Self::HighExerciseFeeCap
            | Self::HighExerciseFeeRate
            | Self::InvalidAffiliate
            | Self::SenderInWhitelist
            | Self::PartyBNotActive(_)
            | Self::InvalidQuantity
            | Self::InvalidFillPrice
            | Self::UnsupportedCommand(_) => ErrorKind::Validation,

            Self::InvalidWithdrawState { .. }
            | Self::InvalidIntentState { .. }
            | Self::IntentExpired
            | Self::ExpirationPassed
            | Self::IntentNotExpired(_)
            | Self::InstantActionModeActive
            | Self::InstantActionModeAlreadyActive
            | Self::InstantActionModeNotActive
            | Self::DeactivationNotProposed
            | Self::CooldownNotOver
            | Self::AlreadyBound
            | Self::NotBound
            | Self::UnbindingAlreadyInitiated
            | Self::UnbindingNotInitiated
            | Self::UnbindingCooldownNotReached
            | Self::NoPendingUnbinding => ErrorKind::State,

            Self::InsufficientBalance { .. }
            | Self::InsufficientAvailableBalance { .. }
            | Self::InsufficientLockedBalance { .. }
            | Self::Overflow(_) => ErrorKind::Balance,

            Self::InsufficientAllowance { .. } | Self::InsufficientTokenBalance { .. } => {
                ErrorKind::Collateral
            }

            Self::Journal(_) | Self::ReplayDiverged { .. } => ErrorKind::Journal,

            Self::Serialization(_) => ErrorKind::Serialization,
        }
    }

    pub fn missing_role(role: impl fmt::Display) -> Self {
        Self::MissingRole {
            role: role.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_messages_name_the_scope() {
        assert_eq!(
            ProtocolError::Paused(PauseScope::Deposit).to_string(),
            "Pausable: Depositing paused"
        );
        assert_eq!(
            ProtocolError::Paused(PauseScope::PartyBActions).to_string(),
            "Pausable: PartyB actions paused"
        );
    }

    #[test]
    fn kinds_follow_error_taxonomy() {
        assert_eq!(ProtocolError::Paused(PauseScope::Global).kind(), ErrorKind::Pause);
        assert_eq!(ProtocolError::WithdrawalSuspended(1).kind(), ErrorKind::Access);
        assert_eq!(ProtocolError::LowDeadline.kind(), ErrorKind::Validation);
        assert_eq!(ProtocolError::CooldownNotOver.kind(), ErrorKind::State);
        assert_eq!(ProtocolError::NotIntentPartyA(1).kind(), ErrorKind::Authorization);
        assert_eq!(
            ProtocolError::InsufficientBalance {
                available: 1,
                required: 2
            }
            .kind(),
            ErrorKind::Balance
        );
    }
}
