use serde::{Deserialize, Serialize};

use crate::access::Role;
use crate::config::ProtocolConfig;
use crate::error::PauseScope;
use crate::intent::{IntentStatus, OpenIntentRequest};
use crate::registry::{NewSymbol, PartyBConfig};
use crate::types::{Address, Amount};
use crate::withdraw::WithdrawStatus;

/// Every state-changing call the protocol accepts.
///
/// Commands are journaled verbatim, so the serde shape is part of the
/// persistence format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Entry 0 of every journal; never accepted from callers.
    Genesis {
        admin: Address,
        protocol: ProtocolConfig,
    },

    // collateral token
    Mint {
        token: Address,
        to: Address,
        #[serde(with = "crate::types::amount")]
        amount: Amount,
    },
    Approve {
        token: Address,
        spender: Address,
        #[serde(with = "crate::types::amount")]
        amount: Amount,
    },

    // account
    Deposit {
        collateral: Address,
        #[serde(with = "crate::types::amount")]
        amount: Amount,
    },
    DepositFor {
        collateral: Address,
        user: Address,
        #[serde(with = "crate::types::amount")]
        amount: Amount,
    },
    InitiateWithdraw {
        collateral: Address,
        #[serde(with = "crate::types::amount")]
        amount: Amount,
        to: Address,
    },
    CompleteWithdraw {
        id: u64,
    },
    CancelWithdraw {
        id: u64,
    },
    ActivateInstantActionMode,
    ProposeToDeactivateInstantActionMode,
    DeactivateInstantActionMode,
    BindToPartyB {
        party_b: Address,
    },
    InitiateUnbindingFromPartyB,
    CompleteUnbindingFromPartyB,
    CancelUnbindingFromPartyB,

    // party A
    SendOpenIntent(OpenIntentRequest),
    CancelOpenIntent {
        ids: Vec<u64>,
    },
    ExpireOpenIntents {
        ids: Vec<u64>,
    },

    // party B
    LockOpenIntent {
        id: u64,
    },
    UnlockOpenIntent {
        id: u64,
    },
    FillOpenIntent {
        id: u64,
        #[serde(with = "crate::types::amount")]
        quantity: Amount,
        #[serde(with = "crate::types::amount")]
        price: Amount,
    },

    // control
    SetAdmin {
        user: Address,
    },
    GrantRole {
        user: Address,
        role: Role,
    },
    RevokeRole {
        user: Address,
        role: Role,
    },
    Pause {
        scope: PauseScope,
    },
    Unpause {
        scope: PauseScope,
    },
    WhitelistCollateral {
        collateral: Address,
    },
    RemoveFromWhitelistCollateral {
        collateral: Address,
    },
    SetPartyBConfig {
        party_b: Address,
        config: PartyBConfig,
    },
    AddOracle {
        name: String,
        contract: Address,
    },
    AddSymbol(NewSymbol),
    SetSymbolValidationState {
        symbol_id: u64,
        is_valid: bool,
    },
    SetAffiliateStatus {
        affiliate: Address,
        status: bool,
    },
    SetDeactivateInstantActionModeCooldown {
        cooldown: u64,
    },
    SetUnbindingCooldown {
        cooldown: u64,
    },
    SetMaxConnectedPartyBs {
        max: u64,
    },
    SetPriceOracleAddress {
        oracle: Address,
    },
    SetFeeCollector {
        collector: Address,
    },
    SetInstantActionMode {
        user: Address,
        active: bool,
    },
    SuspendAddress {
        user: Address,
        suspended: bool,
    },
    SuspendWithdrawal {
        id: u64,
        suspended: bool,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Genesis { .. } => "genesis",
            Self::Mint { .. } => "mint",
            Self::Approve { .. } => "approve",
            Self::Deposit { .. } => "deposit",
            Self::DepositFor { .. } => "deposit_for",
            Self::InitiateWithdraw { .. } => "initiate_withdraw",
            Self::CompleteWithdraw { .. } => "complete_withdraw",
            Self::CancelWithdraw { .. } => "cancel_withdraw",
            Self::ActivateInstantActionMode => "activate_instant_action_mode",
            Self::ProposeToDeactivateInstantActionMode => "propose_to_deactivate_instant_action_mode",
            Self::DeactivateInstantActionMode => "deactivate_instant_action_mode",
            Self::BindToPartyB { .. } => "bind_to_party_b",
            Self::InitiateUnbindingFromPartyB => "initiate_unbinding_from_party_b",
            Self::CompleteUnbindingFromPartyB => "complete_unbinding_from_party_b",
            Self::CancelUnbindingFromPartyB => "cancel_unbinding_from_party_b",
            Self::SendOpenIntent(_) => "send_open_intent",
            Self::CancelOpenIntent { .. } => "cancel_open_intent",
            Self::ExpireOpenIntents { .. } => "expire_open_intents",
            Self::LockOpenIntent { .. } => "lock_open_intent",
            Self::UnlockOpenIntent { .. } => "unlock_open_intent",
            Self::FillOpenIntent { .. } => "fill_open_intent",
            Self::SetAdmin { .. } => "set_admin",
            Self::GrantRole { .. } => "grant_role",
            Self::RevokeRole { .. } => "revoke_role",
            Self::Pause { .. } => "pause",
            Self::Unpause { .. } => "unpause",
            Self::WhitelistCollateral { .. } => "whitelist_collateral",
            Self::RemoveFromWhitelistCollateral { .. } => "remove_from_whitelist_collateral",
            Self::SetPartyBConfig { .. } => "set_party_b_config",
            Self::AddOracle { .. } => "add_oracle",
            Self::AddSymbol(_) => "add_symbol",
            Self::SetSymbolValidationState { .. } => "set_symbol_validation_state",
            Self::SetAffiliateStatus { .. } => "set_affiliate_status",
            Self::SetDeactivateInstantActionModeCooldown { .. } => {
                "set_deactivate_instant_action_mode_cooldown"
            }
            Self::SetUnbindingCooldown { .. } => "set_unbinding_cooldown",
            Self::SetMaxConnectedPartyBs { .. } => "set_max_connected_party_bs",
            Self::SetPriceOracleAddress { .. } => "set_price_oracle_address",
            Self::SetFeeCollector { .. } => "set_fee_collector",
            Self::SetInstantActionMode { .. } => "set_instant_action_mode",
            Self::SuspendAddress { .. } => "suspend_address",
            Self::SuspendWithdrawal { .. } => "suspend_withdrawal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedIntent {
    pub id: u64,
    pub status: IntentStatus,
}

/// Result of an applied command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Done,
    WithdrawInitiated {
        id: u64,
    },
    WithdrawResolved {
        id: u64,
        status: WithdrawStatus,
    },
    IntentOpened {
        id: u64,
        #[serde(with = "crate::types::amount")]
        locked_amount: Amount,
    },
    IntentUpdated {
        id: u64,
        status: IntentStatus,
    },
    IntentsClosed {
        intents: Vec<ClosedIntent>,
    },
    IntentFilled {
        id: u64,
        trade_id: u64,
        remainder_intent_id: Option<u64>,
    },
    OracleAdded {
        id: u64,
    },
    SymbolAdded {
        id: u64,
    },
}
