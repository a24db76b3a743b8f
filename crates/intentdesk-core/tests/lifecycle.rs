use std::sync::Arc;

use intentdesk_core::{
    replay, Address, Amount, Command, Engine, EngineConfig, ExerciseFee, IntentStatus, ManualClock, NewSymbol,
    OpenIntentRequest, OptionType, Outcome, PartyBConfig, PauseScope, ProtocolError, Role, WithdrawStatus, ONE,
};

const START: u64 = 1_700_000_000;

struct Desk {
    engine: Engine,
    clock: ManualClock,
    admin: Address,
    party_a: Address,
    party_b: Address,
    collateral: Address,
    affiliate: Address,
}

impl Desk {
    async fn new() -> Self {
        Self::with_trading_fee(0).await
    }

    async fn with_trading_fee(trading_fee: Amount) -> Self {
        let clock = ManualClock::new(START);
        let config = EngineConfig::default();
        let admin = config.admin.clone();
        let engine = Engine::bootstrap_with_clock(config, Arc::new(clock.clone()))
            .await
            .unwrap();

        let desk = Self {
            engine,
            clock,
            admin,
            party_a: Address::from_index(0xa1),
            party_b: Address::from_index(0xb1),
            collateral: Address::from_index(0xc0),
            affiliate: Address::from_index(0xaf),
        };

        for role in [Role::Setter, Role::Pauser, Role::Unpauser, Role::Suspender] {
            desk.admin(Command::GrantRole {
                user: desk.admin.clone(),
                role,
            })
            .await;
        }
        desk.admin(Command::WhitelistCollateral {
            collateral: desk.collateral.clone(),
        })
        .await;
        desk.admin(Command::AddOracle {
            name: "chainlink".to_string(),
            contract: Address::from_index(0x0c),
        })
        .await;
        desk.admin(Command::SetPartyBConfig {
            party_b: desk.party_b.clone(),
            config: PartyBConfig {
                is_active: true,
                loss_coverage: 0,
                oracle_id: 1,
                symbol_type: 0,
            },
        })
        .await;
        desk.admin(Command::AddSymbol(NewSymbol {
            name: "BTCUSDT".to_string(),
            option_type: OptionType::Call,
            oracle_id: 1,
            collateral: desk.collateral.clone(),
            is_stable_coin: true,
            trading_fee,
            symbol_type: 0,
        }))
        .await;
        desk.admin(Command::SetAffiliateStatus {
            affiliate: desk.affiliate.clone(),
            status: true,
        })
        .await;

        let party_a = desk.party_a.clone();
        desk.fund(&party_a, 5_000 * ONE).await;
        desk
    }

    async fn admin(&self, command: Command) -> Outcome {
        self.engine.submit(&self.admin, command).await.unwrap()
    }

    async fn fund(&self, user: &Address, amount: Amount) {
        let vault = self.engine.protocol_config().await.vault;
        self.engine
            .mint(user, &self.collateral, user, amount)
            .await
            .unwrap();
        self.engine
            .approve(user, &self.collateral, &vault, Amount::MAX)
            .await
            .unwrap();
        self.engine
            .deposit(user, &self.collateral, amount)
            .await
            .unwrap();
    }

    fn request(&self) -> OpenIntentRequest {
        OpenIntentRequest {
            party_bs_white_list: vec![self.party_b.clone()],
            symbol_id: 1,
            price: 7,
            quantity: 100 * ONE,
            strike_price: 20_000 * ONE,
            expiration_timestamp: START + 120,
            exercise_fee: ExerciseFee {
                rate: ONE / 100,
                cap: ONE / 10,
            },
            deadline: START + 140,
            fee_token: self.collateral.clone(),
            affiliate: self.affiliate.clone(),
            user_data: None,
        }
    }

    async fn send(&self) -> u64 {
        self.engine
            .send_open_intent(&self.party_a, self.request())
            .await
            .unwrap()
    }

    async fn status(&self, id: u64) -> IntentStatus {
        self.engine.get_open_intent(id).await.unwrap().status
    }
}

#[tokio::test]
async fn sending_intent_locks_premium() {
    let desk = Desk::new().await;
    let id = desk.send().await;

    let intent = desk.engine.get_open_intent(id).await.unwrap();
    assert_eq!(intent.status, IntentStatus::Pending);
    assert_eq!(intent.locked_amount, 700);
    assert_eq!(intent.parent_id, 0);

    let balance = desk.engine.balances_of(&desk.party_a, &desk.collateral).await;
    assert_eq!(balance.locked, 700);
    assert_eq!(balance.available, 5_000 * ONE - 700);
}

#[tokio::test]
async fn trading_fee_is_locked_with_premium() {
    let desk = Desk::with_trading_fee(ONE / 100).await;
    let id = desk.send().await;
    assert_eq!(desk.engine.get_open_intent(id).await.unwrap().locked_amount, 707);
}

#[tokio::test]
async fn send_validates_deadline_and_fee_bounds() {
    let desk = Desk::new().await;

    let mut low_deadline = desk.request();
    low_deadline.deadline = START + 10;
    assert_eq!(
        desk.engine.send_open_intent(&desk.party_a, low_deadline).await,
        Err(ProtocolError::LowDeadline)
    );

    let mut high_cap = desk.request();
    high_cap.exercise_fee.cap = 2 * ONE;
    assert_eq!(
        desk.engine.send_open_intent(&desk.party_a, high_cap).await,
        Err(ProtocolError::HighExerciseFeeCap)
    );

    let mut self_whitelisted = desk.request();
    self_whitelisted.party_bs_white_list.push(desk.party_a.clone());
    assert_eq!(
        desk.engine.send_open_intent(&desk.party_a, self_whitelisted).await,
        Err(ProtocolError::SenderInWhitelist)
    );

    let mut unknown_affiliate = desk.request();
    unknown_affiliate.affiliate = Address::from_index(0x99);
    assert_eq!(
        desk.engine.send_open_intent(&desk.party_a, unknown_affiliate).await,
        Err(ProtocolError::InvalidAffiliate)
    );
}

#[tokio::test]
async fn lock_respects_expiration_then_deadline() {
    let desk = Desk::new().await;
    let id = desk.send().await;

    desk.clock.set(START + 130);
    assert_eq!(
        desk.engine.lock_open_intent(&desk.party_b, id).await,
        Err(ProtocolError::ExpirationPassed)
    );

    desk.clock.set(START + 150);
    assert_eq!(
        desk.engine.lock_open_intent(&desk.party_b, id).await,
        Err(ProtocolError::IntentExpired)
    );
    assert_eq!(desk.status(id).await, IntentStatus::Pending);
}

#[tokio::test]
async fn only_active_party_b_can_lock() {
    let desk = Desk::new().await;
    let id = desk.send().await;

    let stranger = Address::from_index(0x51);
    assert_eq!(
        desk.engine.lock_open_intent(&stranger, id).await,
        Err(ProtocolError::ShouldBePartyB)
    );

    desk.engine.lock_open_intent(&desk.party_b, id).await.unwrap();
    let intent = desk.engine.get_open_intent(id).await.unwrap();
    assert_eq!(intent.status, IntentStatus::Locked);
    assert_eq!(intent.party_b, Some(desk.party_b.clone()));

    desk.engine.unlock_open_intent(&desk.party_b, id).await.unwrap();
    let intent = desk.engine.get_open_intent(id).await.unwrap();
    assert_eq!(intent.status, IntentStatus::Pending);
    assert_eq!(intent.party_b, None);
}

#[tokio::test]
async fn lock_checks_oracle_then_self_lock_then_whitelist() {
    let desk = Desk::new().await;
    let id = desk.send().await;
    let party_b_on = |oracle_id| PartyBConfig {
        is_active: true,
        loss_coverage: 0,
        oracle_id,
        symbol_type: 0,
    };

    let other_oracle = Address::from_index(0xb2);
    desk.admin(Command::SetPartyBConfig {
        party_b: other_oracle.clone(),
        config: party_b_on(2),
    })
    .await;
    assert_eq!(
        desk.engine.lock_open_intent(&other_oracle, id).await,
        Err(ProtocolError::OracleMismatch {
            party_b_oracle: 2,
            symbol_oracle: 1,
        })
    );

    desk.admin(Command::SetPartyBConfig {
        party_b: desk.party_a.clone(),
        config: party_b_on(1),
    })
    .await;
    assert_eq!(
        desk.engine.lock_open_intent(&desk.party_a, id).await,
        Err(ProtocolError::PartyACannotBePartyB)
    );

    let outsider = Address::from_index(0xb3);
    desk.admin(Command::SetPartyBConfig {
        party_b: outsider.clone(),
        config: party_b_on(1),
    })
    .await;
    assert_eq!(
        desk.engine.lock_open_intent(&outsider, id).await,
        Err(ProtocolError::NotWhitelisted)
    );
    assert_eq!(desk.status(id).await, IntentStatus::Pending);

    let mut open_to_all = desk.request();
    open_to_all.party_bs_white_list.clear();
    let open_id = desk
        .engine
        .send_open_intent(&desk.party_a, open_to_all)
        .await
        .unwrap();
    desk.engine.lock_open_intent(&outsider, open_id).await.unwrap();
    assert_eq!(desk.status(open_id).await, IntentStatus::Locked);
}

#[tokio::test]
async fn send_requires_minimum_expiration_offset() {
    let desk = Desk::new().await;

    let mut early = desk.request();
    early.expiration_timestamp = START + 59;
    assert_eq!(
        desk.engine.send_open_intent(&desk.party_a, early).await,
        Err(ProtocolError::LowExpiration)
    );

    let mut at_offset = desk.request();
    at_offset.expiration_timestamp = START + 60;
    let id = desk
        .engine
        .send_open_intent(&desk.party_a, at_offset)
        .await
        .unwrap();
    assert_eq!(desk.status(id).await, IntentStatus::Pending);
}

#[tokio::test]
async fn cancel_restores_locked_funds() {
    let desk = Desk::new().await;
    let id = desk.send().await;

    let outcome = desk
        .engine
        .cancel_open_intent(&desk.party_a, vec![id])
        .await
        .unwrap();
    assert!(matches!(outcome, Outcome::IntentsClosed { ref intents } if intents[0].status == IntentStatus::Canceled));

    let balance = desk.engine.balances_of(&desk.party_a, &desk.collateral).await;
    assert_eq!(balance.locked, 0);
    assert_eq!(balance.available, 5_000 * ONE);
}

#[tokio::test]
async fn cancel_after_deadline_expires_intent() {
    let desk = Desk::new().await;
    let id = desk.send().await;
    desk.clock.set(START + 141);

    desk.engine
        .cancel_open_intent(&desk.party_a, vec![id])
        .await
        .unwrap();
    assert_eq!(desk.status(id).await, IntentStatus::Expired);
}

#[tokio::test]
async fn cancel_batch_is_all_or_nothing() {
    let desk = Desk::new().await;
    let first = desk.send().await;
    let journaled = desk.engine.journal_entries().await.len();

    let err = desk
        .engine
        .cancel_open_intent(&desk.party_a, vec![first, 99])
        .await
        .unwrap_err();
    assert_eq!(err, ProtocolError::InvalidIntentId(99));

    assert_eq!(desk.status(first).await, IntentStatus::Pending);
    assert_eq!(desk.engine.locked_balances_of(&desk.party_a, &desk.collateral).await, 700);
    assert_eq!(desk.engine.journal_entries().await.len(), journaled);
}

#[tokio::test]
async fn expire_requires_passed_deadline() {
    let desk = Desk::new().await;
    let id = desk.send().await;
    let keeper = Address::from_index(0x77);

    assert_eq!(
        desk.engine.expire_open_intents(&keeper, vec![id]).await,
        Err(ProtocolError::IntentNotExpired(id))
    );

    desk.clock.set(START + 200);
    desk.engine.expire_open_intents(&keeper, vec![id]).await.unwrap();
    assert_eq!(desk.status(id).await, IntentStatus::Expired);
    assert_eq!(desk.engine.locked_balances_of(&desk.party_a, &desk.collateral).await, 0);
}

#[tokio::test]
async fn partial_fill_opens_remainder_intent() {
    let desk = Desk::new().await;
    let id = desk.send().await;
    desk.engine.lock_open_intent(&desk.party_b, id).await.unwrap();

    let outcome = desk
        .engine
        .fill_open_intent(&desk.party_b, id, 40 * ONE, 7)
        .await
        .unwrap();
    let Outcome::IntentFilled {
        trade_id,
        remainder_intent_id: Some(child),
        ..
    } = outcome
    else {
        panic!("unexpected outcome {outcome:?}");
    };

    let trade = desk.engine.get_trade(trade_id).await.unwrap();
    assert_eq!(trade.premium, 280);
    assert_eq!(trade.quantity, 40 * ONE);
    assert_eq!(desk.status(id).await, IntentStatus::Filled);

    let remainder = desk.engine.get_open_intent(child).await.unwrap();
    assert_eq!(remainder.parent_id, id);
    assert_eq!(remainder.status, IntentStatus::Pending);
    assert_eq!(remainder.quantity, 60 * ONE);
    assert_eq!(remainder.locked_amount, 420);

    let party_a = desk.engine.balances_of(&desk.party_a, &desk.collateral).await;
    assert_eq!(party_a.locked, 420);
    assert_eq!(party_a.available, 5_000 * ONE - 700);
    assert_eq!(desk.engine.balance_of(&desk.party_b, &desk.collateral).await, 280);
}

#[tokio::test]
async fn full_fill_pays_fee_collector() {
    let desk = Desk::with_trading_fee(ONE / 100).await;
    let id = desk.send().await;
    desk.engine.lock_open_intent(&desk.party_b, id).await.unwrap();

    assert_eq!(
        desk.engine.fill_open_intent(&desk.party_b, id, 100 * ONE, 8).await,
        Err(ProtocolError::InvalidFillPrice)
    );
    desk.engine
        .fill_open_intent(&desk.party_b, id, 100 * ONE, 7)
        .await
        .unwrap();

    let collector = desk.engine.protocol_config().await.fee_collector;
    assert_eq!(desk.engine.balance_of(&collector, &desk.collateral).await, 7);
    assert_eq!(desk.engine.balance_of(&desk.party_b, &desk.collateral).await, 700);
    assert_eq!(desk.engine.locked_balances_of(&desk.party_a, &desk.collateral).await, 0);
}

#[tokio::test]
async fn withdraw_lifecycle() {
    let desk = Desk::new().await;
    let receiver = Address::from_index(0x4e);

    let id = desk
        .engine
        .initiate_withdraw(&desk.party_a, &desk.collateral, 1_000 * ONE, &receiver)
        .await
        .unwrap();
    assert_eq!(id, 1);
    assert_eq!(desk.engine.get_last_withdraw_id().await, 1);
    assert_eq!(desk.engine.balance_of(&desk.party_a, &desk.collateral).await, 4_000 * ONE);

    desk.engine.complete_withdraw(&receiver, id).await.unwrap();
    assert_eq!(
        desk.engine.token_balance_of(&desk.collateral, &receiver).await,
        1_000 * ONE
    );
    assert_eq!(
        desk.engine.get_withdraw(id).await.unwrap().status,
        WithdrawStatus::Completed
    );
    assert!(matches!(
        desk.engine.cancel_withdraw(&desk.party_a, id).await,
        Err(ProtocolError::InvalidWithdrawState { .. })
    ));
}

#[tokio::test]
async fn canceled_withdraw_returns_funds_to_owner() {
    let desk = Desk::new().await;
    let id = desk
        .engine
        .initiate_withdraw(&desk.party_a, &desk.collateral, ONE, &desk.party_a)
        .await
        .unwrap();

    assert_eq!(
        desk.engine.cancel_withdraw(&desk.party_b, id).await,
        Err(ProtocolError::NotWithdrawOwner(id))
    );
    desk.engine.cancel_withdraw(&desk.party_a, id).await.unwrap();
    assert_eq!(desk.engine.balance_of(&desk.party_a, &desk.collateral).await, 5_000 * ONE);
    assert_eq!(
        desk.engine.complete_withdraw(&desk.party_a, 7).await,
        Err(ProtocolError::InvalidWithdrawId(7))
    );
}

#[tokio::test]
async fn suspended_withdrawal_cannot_complete() {
    let desk = Desk::new().await;
    let id = desk
        .engine
        .initiate_withdraw(&desk.party_a, &desk.collateral, ONE, &desk.party_a)
        .await
        .unwrap();
    desk.admin(Command::SuspendWithdrawal { id, suspended: true })
        .await;

    assert_eq!(
        desk.engine.complete_withdraw(&desk.party_a, id).await,
        Err(ProtocolError::WithdrawalSuspended(id))
    );
}

#[tokio::test]
async fn suspended_receiver_blocks_withdraw_as_sender() {
    let desk = Desk::new().await;
    let receiver = Address::from_index(0x77);
    desk.admin(Command::SuspendAddress {
        user: receiver.clone(),
        suspended: true,
    })
    .await;

    assert_eq!(
        desk.engine
            .initiate_withdraw(&desk.party_a, &desk.collateral, ONE, &receiver)
            .await,
        Err(ProtocolError::SenderSuspended(receiver))
    );
    assert_eq!(desk.engine.get_last_withdraw_id().await, 0);
}

#[tokio::test]
async fn instant_action_mode_blocks_withdraw_initiation() {
    let desk = Desk::new().await;
    desk.engine
        .activate_instant_action_mode(&desk.party_a)
        .await
        .unwrap();

    assert_eq!(
        desk.engine
            .initiate_withdraw(&desk.party_a, &desk.collateral, ONE, &desk.party_a)
            .await,
        Err(ProtocolError::InstantActionModeActive)
    );
    assert_eq!(
        desk.engine
            .balances_of(&desk.party_a, &desk.collateral)
            .await
            .available,
        5_000 * ONE
    );
    assert_eq!(desk.engine.get_last_withdraw_id().await, 0);
}

#[tokio::test]
async fn instant_action_mode_blocks_until_cooldown_passes() {
    let desk = Desk::new().await;
    desk.engine
        .activate_instant_action_mode(&desk.party_a)
        .await
        .unwrap();
    assert!(desk.engine.get_instant_actions_mode_status(&desk.party_a).await);
    assert_eq!(
        desk.engine.send_open_intent(&desk.party_a, desk.request()).await,
        Err(ProtocolError::InstantActionModeActive)
    );

    desk.engine
        .propose_to_deactivate_instant_action_mode(&desk.party_a)
        .await
        .unwrap();
    assert_eq!(
        desk.engine
            .get_instant_actions_mode_deactivate_time(&desk.party_a)
            .await,
        START + 120
    );
    desk.clock.advance(60);
    assert_eq!(
        desk.engine.deactivate_instant_action_mode(&desk.party_a).await,
        Err(ProtocolError::CooldownNotOver)
    );

    desk.clock.advance(60);
    desk.engine
        .deactivate_instant_action_mode(&desk.party_a)
        .await
        .unwrap();
    assert!(!desk.engine.get_instant_actions_mode_status(&desk.party_a).await);
}

#[tokio::test]
async fn bound_party_a_must_whitelist_its_party_b() {
    let desk = Desk::new().await;
    desk.engine
        .bind_to_party_b(&desk.party_a, &desk.party_b)
        .await
        .unwrap();
    assert_eq!(
        desk.engine.get_bound_party_b(&desk.party_a).await,
        Some(desk.party_b.clone())
    );

    let mut elsewhere = desk.request();
    elsewhere.party_bs_white_list = vec![Address::from_index(0xb2)];
    assert_eq!(
        desk.engine.send_open_intent(&desk.party_a, elsewhere).await,
        Err(ProtocolError::BoundToAnotherPartyB)
    );
    desk.send().await;
}

#[tokio::test]
async fn unbinding_waits_for_cooldown() {
    let desk = Desk::new().await;
    desk.engine
        .bind_to_party_b(&desk.party_a, &desk.party_b)
        .await
        .unwrap();
    desk.engine
        .initiate_unbinding_from_party_b(&desk.party_a)
        .await
        .unwrap();
    assert_eq!(
        desk.engine.get_unbinding_request_time(&desk.party_a).await,
        START
    );

    assert_eq!(
        desk.engine.complete_unbinding_from_party_b(&desk.party_a).await,
        Err(ProtocolError::UnbindingCooldownNotReached)
    );
    desk.clock.advance(120);
    desk.engine
        .complete_unbinding_from_party_b(&desk.party_a)
        .await
        .unwrap();
    assert_eq!(desk.engine.get_bound_party_b(&desk.party_a).await, None);
}

#[tokio::test]
async fn paused_party_a_actions_reject_new_intents() {
    let desk = Desk::new().await;
    desk.admin(Command::Pause {
        scope: PauseScope::PartyAActions,
    })
    .await;

    assert_eq!(
        desk.engine.send_open_intent(&desk.party_a, desk.request()).await,
        Err(ProtocolError::Paused(PauseScope::PartyAActions))
    );

    desk.admin(Command::Unpause {
        scope: PauseScope::PartyAActions,
    })
    .await;
    desk.send().await;
}

#[tokio::test]
async fn journal_replay_rebuilds_balances() {
    let desk = Desk::new().await;
    let id = desk.send().await;
    desk.engine.lock_open_intent(&desk.party_b, id).await.unwrap();
    desk.engine
        .fill_open_intent(&desk.party_b, id, 40 * ONE, 7)
        .await
        .unwrap();

    let entries = desk.engine.journal_entries().await;
    assert!(desk.engine.verify_journal_chain().await);

    assert!(entries[0].genesis().is_some());
    let state = replay(&entries).unwrap();
    assert_eq!(
        state.accounts().balance(&desk.party_a, &desk.collateral),
        desk.engine.balances_of(&desk.party_a, &desk.collateral).await
    );
    assert_eq!(state.intents().last_trade_id(), 1);
}
