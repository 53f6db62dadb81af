use super::*;
use crate::error::BotError;
use crate::storage::MemoryStore;
use crate::testing::{RecordingMessenger, Sent};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const OPERATOR: UserId = 1000;

struct Harness {
    engine: Arc<RoundEngine>,
    messenger: Arc<RecordingMessenger>,
    operator: Caller,
}

fn harness(total_slots: u32) -> Harness {
    harness_with_store(Arc::new(MemoryStore::new()), total_slots)
}

fn harness_with_store(store: Arc<dyn Store>, total_slots: u32) -> Harness {
    let messenger = Arc::new(RecordingMessenger::new());
    let engine = RoundEngine::new(
        store,
        messenger.clone(),
        OPERATOR,
        total_slots,
    )
    .with_fanout(NotificationFanout::new(4, Duration::from_millis(500)));
    Harness {
        engine: Arc::new(engine),
        messenger,
        operator: Caller::private(OPERATOR, "Operator"),
    }
}

fn user(id: UserId) -> Caller {
    Caller::private(id, format!("user-{}", id))
}

fn proof(caller: &Caller) -> PaymentProof {
    PaymentProof {
        chat_id: caller.chat_id,
        message_id: 77,
    }
}

fn round_err<T: Debug>(result: Result<T>) -> RoundError {
    match result {
        Err(BotError::Round(e)) => e,
        other => panic!("expected a round error, got {:?}", other),
    }
}

/// Memory store that can be told to fail winner commits or user listings
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_winner_commits: AtomicBool,
    fail_user_listing: AtomicBool,
}

#[async_trait]
impl Store for FlakyStore {
    async fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        self.inner.get_user(user_id).await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        if self.fail_user_listing.load(Ordering::SeqCst) {
            return Err(BotError::Internal("user listing unavailable".into()));
        }
        self.inner.list_users().await
    }

    async fn settings(&self) -> Result<Option<RoundSettings>> {
        self.inner.settings().await
    }

    async fn tally(&self) -> Result<Option<ResultTally>> {
        self.inner.tally().await
    }

    async fn winners(&self) -> Result<Option<WinnerSet>> {
        self.inner.winners().await
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<()> {
        let touches_winners = writes.iter().any(|w| matches!(w, Write::Winners(_)));
        if touches_winners && self.fail_winner_commits.load(Ordering::SeqCst) {
            return Err(BotError::Internal("disk full".into()));
        }
        self.inner.commit(writes).await
    }
}

impl Harness {
    async fn open_round(&self) {
        self.engine.open_betting(&self.operator).await.unwrap();
    }

    async fn registered(&self, id: UserId) -> Caller {
        let caller = user(id);
        self.engine.register(&caller).await.unwrap();
        caller
    }

    /// Register, bet and submit one payment proof.
    async fn paid_bettor(&self, id: UserId, side: Side) -> Caller {
        let caller = self.registered(id).await;
        self.engine.place_bet(&caller, side).await.unwrap();
        self.engine.submit_payment(&caller, proof(&caller)).await.unwrap();
        caller
    }

    async fn available(&self) -> u32 {
        self.engine.slot_count().await.unwrap().available
    }
}

// ============ Registration ============

#[tokio::test]
async fn test_register_is_idempotent() {
    let h = harness(5);
    let first = h.engine.register(&user(1)).await.unwrap();
    assert!(first.newly_registered);

    let renamed = Caller::private(1, "New Name");
    let again = h.engine.register(&renamed).await.unwrap();
    assert!(!again.newly_registered);
    assert_eq!(again.user.name, "New Name");
    assert_eq!(h.engine.list_all_users(&h.operator).await.unwrap().len(), 1);
}

// ============ Bet placement ============

#[tokio::test]
async fn test_place_bet_requires_registration_first() {
    let h = harness(5);
    // Closed round, but the unregistered check comes first
    let err = round_err(h.engine.place_bet(&user(9), Side::Heads).await);
    assert_eq!(err, RoundError::NotRegistered);
}

#[tokio::test]
async fn test_place_bet_when_closed() {
    let h = harness(5);
    let caller = h.registered(1).await;
    let err = round_err(h.engine.place_bet(&caller, Side::Heads).await);
    assert_eq!(err, RoundError::RoundClosed);
    assert_eq!(h.engine.check_status(&caller).await.unwrap().bet, None);
}

#[tokio::test]
async fn test_place_bet_with_zero_capacity() {
    let h = harness(0);
    h.open_round().await;
    let caller = h.registered(1).await;
    assert_eq!(round_err(h.engine.check_can_bet(&caller).await), RoundError::SlotsFull);
    assert_eq!(round_err(h.engine.place_bet(&caller, Side::Tails).await), RoundError::SlotsFull);
}

#[tokio::test]
async fn test_second_bet_keeps_first() {
    let h = harness(5);
    h.open_round().await;
    let caller = h.registered(1).await;

    h.engine.place_bet(&caller, Side::Heads).await.unwrap();
    let err = round_err(h.engine.place_bet(&caller, Side::Tails).await);

    assert_eq!(err, RoundError::AlreadyBet);
    assert_eq!(h.engine.check_status(&caller).await.unwrap().bet, Some(Side::Heads));
    assert_eq!(round_err(h.engine.check_can_bet(&caller).await), RoundError::AlreadyBet);
}

#[tokio::test]
async fn test_place_bet_does_not_take_a_slot() {
    let h = harness(3);
    h.open_round().await;
    let caller = h.registered(1).await;

    tokio_test::assert_ok!(h.engine.check_can_bet(&caller).await);
    h.engine.place_bet(&caller, Side::Heads).await.unwrap();

    assert_eq!(h.available().await, 3);
    let instructions = h.messenger.last_text_to(1).unwrap();
    assert!(instructions.contains("HEADS"));
}

#[tokio::test]
async fn test_payment_image_is_sent_when_configured() {
    let messenger = Arc::new(RecordingMessenger::new());
    let engine = RoundEngine::new(Arc::new(MemoryStore::new()), messenger.clone(), OPERATOR, 2)
        .with_payment_image(Some("https://example.com/pay.jpeg".into()));
    let operator = Caller::private(OPERATOR, "Operator");
    engine.open_betting(&operator).await.unwrap();
    let caller = user(3);
    engine.register(&caller).await.unwrap();

    engine.place_bet(&caller, Side::Tails).await.unwrap();

    let photo = messenger
        .sent()
        .into_iter()
        .find(|s| matches!(s, Sent::Photo { .. }))
        .expect("payment photo");
    match photo {
        Sent::Photo { chat_id, photo, caption } => {
            assert_eq!(chat_id, 3);
            assert_eq!(photo, "https://example.com/pay.jpeg");
            assert!(caption.contains("TAILS"));
        }
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn test_bet_survives_messenger_failure() {
    let h = harness(3);
    h.open_round().await;
    let caller = h.registered(4).await;
    h.messenger.fail_for(4);

    tokio_test::assert_ok!(h.engine.place_bet(&caller, Side::Heads).await);
    assert_eq!(h.engine.check_status(&caller).await.unwrap().bet, Some(Side::Heads));
}

// ============ Payment ============

#[tokio::test]
async fn test_payment_without_bet() {
    let h = harness(3);
    let caller = h.registered(1).await;
    let err = round_err(h.engine.submit_payment(&caller, proof(&caller)).await);
    assert_eq!(err, RoundError::NoBetPlaced);
    assert_eq!(h.engine.check_status(&caller).await.unwrap().payment_attempts, 0);
}

#[tokio::test]
async fn test_payment_is_forwarded_to_operator() {
    let h = harness(3);
    h.open_round().await;
    let caller = h.registered(5).await;
    h.engine.place_bet(&caller, Side::Heads).await.unwrap();
    h.messenger.clear();

    let receipt = h.engine.submit_payment(&caller, proof(&caller)).await.unwrap();

    assert_eq!(receipt, PaymentReceipt { attempt: 1, final_attempt: false });
    let user = h.engine.check_status(&caller).await.unwrap();
    assert_eq!(user.status, Some(BetStatus::Waiting));
    assert_eq!(user.payment_attempts, 1);

    let sent = h.messenger.sent();
    assert!(sent.contains(&Sent::Forward {
        to_chat: OPERATOR,
        from_chat: 5,
        message_id: 77,
    }));
    let summary = h.messenger.last_text_to(OPERATOR).unwrap();
    assert!(summary.contains("<code>5</code>"));
    assert!(summary.contains("1/3"));
}

#[tokio::test]
async fn test_fourth_payment_is_rejected() {
    let h = harness(3);
    h.open_round().await;
    let caller = h.registered(1).await;
    h.engine.place_bet(&caller, Side::Tails).await.unwrap();

    for attempt in 1..=3 {
        let receipt = h.engine.submit_payment(&caller, proof(&caller)).await.unwrap();
        assert_eq!(receipt.attempt, attempt);
        assert_eq!(receipt.final_attempt, attempt == 3);
    }

    let err = round_err(h.engine.submit_payment(&caller, proof(&caller)).await);
    assert_eq!(err, RoundError::AttemptsExceeded);
    assert_eq!(h.engine.check_status(&caller).await.unwrap().payment_attempts, 3);
}

#[tokio::test]
async fn test_disapprove_then_resubmit() {
    let h = harness(3);
    h.open_round().await;
    let d = h.registered(4).await;
    h.engine.place_bet(&d, Side::Tails).await.unwrap();
    for _ in 0..3 {
        h.engine.submit_payment(&d, proof(&d)).await.unwrap();
    }
    assert_eq!(
        round_err(h.engine.submit_payment(&d, proof(&d)).await),
        RoundError::AttemptsExceeded
    );

    let user = h.engine.disapprove(&h.operator, 4).await.unwrap();
    assert_eq!(user.status, Some(BetStatus::Disapproved));
    assert_eq!(user.payment_attempts, 0);
    assert_eq!(h.available().await, 3);
    assert!(h.messenger.last_text_to(4).unwrap().contains("Disapproved"));

    let receipt = h.engine.submit_payment(&d, proof(&d)).await.unwrap();
    assert_eq!(receipt.attempt, 1);
}

// ============ Approval ============

#[tokio::test]
async fn test_approve_requires_operator() {
    let h = harness(3);
    h.open_round().await;
    let a = h.paid_bettor(1, Side::Heads).await;

    assert_eq!(round_err(h.engine.approve(&a, 1).await), RoundError::Unauthorized);
    assert_eq!(round_err(h.engine.disapprove(&a, 1).await), RoundError::Unauthorized);
    assert_eq!(h.available().await, 3);
}

#[tokio::test]
async fn test_approve_unknown_user() {
    let h = harness(3);
    assert_eq!(round_err(h.engine.approve(&h.operator, 42).await), RoundError::UserNotFound(42));
    assert_eq!(round_err(h.engine.disapprove(&h.operator, 42).await), RoundError::UserNotFound(42));
}

#[tokio::test]
async fn test_approve_without_bet() {
    let h = harness(3);
    h.registered(2).await;
    assert_eq!(round_err(h.engine.approve(&h.operator, 2).await), RoundError::NoBetPlaced);
    assert_eq!(h.available().await, 3);
}

#[tokio::test]
async fn test_double_approval_counts_once() {
    let h = harness(3);
    h.open_round().await;
    h.paid_bettor(1, Side::Heads).await;

    let approval = h.engine.approve(&h.operator, 1).await.unwrap();
    assert_eq!(approval.available_slots, 2);
    assert_eq!(approval.user.payment_attempts, 0);
    assert!(h.messenger.last_text_to(1).unwrap().contains("Approved"));

    let err = round_err(h.engine.approve(&h.operator, 1).await);
    assert_eq!(err, RoundError::AlreadyApproved(1));
    assert_eq!(h.available().await, 2);
}

#[tokio::test]
async fn test_approval_never_oversells() {
    let h = harness(1);
    h.open_round().await;
    // Both bet while a slot is still free
    h.paid_bettor(1, Side::Heads).await;
    h.paid_bettor(2, Side::Tails).await;

    h.engine.approve(&h.operator, 1).await.unwrap();
    let err = round_err(h.engine.approve(&h.operator, 2).await);

    assert_eq!(err, RoundError::SlotsFull);
    assert_eq!(h.available().await, 0);
    let pending = h.engine.list_pending(&h.operator).await.unwrap();
    assert_eq!(pending.iter().map(|u| u.user_id).collect::<Vec<_>>(), vec![2]);
}

#[tokio::test]
async fn test_concurrent_approvals_respect_capacity() {
    let h = harness(3);
    h.open_round().await;
    for id in 1..=10 {
        h.paid_bettor(id, Side::Heads).await;
    }

    let mut tasks = Vec::new();
    for id in 1..=10 {
        let engine = h.engine.clone();
        let operator = h.operator.clone();
        tasks.push(tokio::spawn(async move { engine.approve(&operator, id).await }));
    }

    let mut approved = 0;
    let mut full = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => approved += 1,
            Err(BotError::Round(RoundError::SlotsFull)) => full += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(approved, 3);
    assert_eq!(full, 7);
    assert_eq!(h.available().await, 0);
    assert_eq!(h.engine.list_participants(&h.operator).await.unwrap().len(), 3);
}

// ============ Declaration ============

#[tokio::test]
async fn test_full_round_scenario() {
    let h = harness(2);
    h.open_round().await;
    let a = h.paid_bettor(1, Side::Heads).await;
    h.paid_bettor(2, Side::Heads).await;

    assert_eq!(h.engine.approve(&h.operator, a.user_id).await.unwrap().available_slots, 1);
    assert_eq!(h.engine.approve(&h.operator, 2).await.unwrap().available_slots, 0);

    let c = h.registered(3).await;
    assert_eq!(round_err(h.engine.place_bet(&c, Side::Heads).await), RoundError::SlotsFull);

    let declaration = h.engine.declare(&h.operator, "heads").await.unwrap();
    assert_eq!(declaration.side, Side::Heads);
    assert_eq!(declaration.winners.user_ids, vec![1, 2]);
    assert_eq!(declaration.tally.heads_wins, 1);
    assert_eq!(declaration.report.delivered, 3);
    assert_eq!(h.available().await, 2);

    let listing = h.engine.list_winners(&h.operator).await.unwrap();
    assert_eq!(listing.side, Some(Side::Heads));
    assert_eq!(listing.users.len(), 2);
    for id in 1..=3 {
        assert!(h.messenger.texts_to(id).iter().any(|t| t.contains("Results Are Out")));
    }
}

#[tokio::test]
async fn test_winners_are_fixed_at_declaration() {
    let h = harness(4);
    h.open_round().await;
    h.paid_bettor(1, Side::Heads).await;
    h.paid_bettor(2, Side::Tails).await;
    h.paid_bettor(3, Side::Heads).await;
    h.engine.approve(&h.operator, 1).await.unwrap();
    h.engine.approve(&h.operator, 2).await.unwrap();

    let declaration = h.engine.declare(&h.operator, "HEADS").await.unwrap();
    assert_eq!(declaration.winners.user_ids, vec![1]);

    // Later state changes do not rewrite the winner set
    h.engine.approve(&h.operator, 3).await.unwrap();
    h.engine.disapprove(&h.operator, 1).await.unwrap();
    let winners = h.engine.winners().await.unwrap();
    assert_eq!(winners.user_ids, vec![1]);
    assert_eq!(winners.declared_side, Some(Side::Heads));
}

#[tokio::test]
async fn test_declare_keeps_betting_flag_and_bets() {
    let h = harness(2);
    h.open_round().await;
    h.paid_bettor(1, Side::Tails).await;
    h.engine.approve(&h.operator, 1).await.unwrap();

    h.engine.declare(&h.operator, "tails").await.unwrap();

    let settings = h.engine.settings().await.unwrap();
    assert!(settings.betting_open);
    assert_eq!(settings.available_slots, 2);
    let user = h.engine.check_status(&user(1)).await.unwrap();
    assert_eq!(user.bet, Some(Side::Tails));
    assert!(user.is_approved());
}

#[tokio::test]
async fn test_declare_invalid_side_changes_nothing() {
    let h = harness(2);
    let err = round_err(h.engine.declare(&h.operator, "edge").await);
    assert_eq!(err, RoundError::InvalidSide);
    assert!(h.engine.list_results().await.unwrap().tally.is_empty());

    let stranger = user(5);
    assert_eq!(round_err(h.engine.declare(&stranger, "heads").await), RoundError::Unauthorized);
}

#[tokio::test]
async fn test_declare_tolerates_delivery_failures() {
    let h = harness(2);
    h.open_round().await;
    h.paid_bettor(1, Side::Heads).await;
    h.paid_bettor(2, Side::Heads).await;
    h.engine.approve(&h.operator, 1).await.unwrap();
    h.messenger.fail_for(2);

    let declaration = h.engine.declare(&h.operator, "heads").await.unwrap();

    assert_eq!(declaration.report.delivered, 1);
    assert_eq!(declaration.report.failed, 1);
    assert_eq!(declaration.report.failures[0].recipient, 2);
    assert_eq!(declaration.winners.user_ids, vec![1]);
    assert_eq!(h.available().await, 2);
}

#[tokio::test]
async fn test_tally_accumulates_until_reset() {
    let h = harness(2);
    h.engine.declare(&h.operator, "heads").await.unwrap();
    h.engine.declare(&h.operator, "heads").await.unwrap();
    let last = h.engine.declare(&h.operator, "tails").await.unwrap();
    assert_eq!(last.tally, ResultTally { heads_wins: 2, tails_wins: 1 });

    h.engine.reset_round(&h.operator).await.unwrap();
    assert!(h.engine.list_results().await.unwrap().tally.is_empty());
}

#[tokio::test]
async fn test_failed_declare_commit_changes_nothing() {
    let store = Arc::new(FlakyStore::default());
    let h = harness_with_store(store.clone(), 2);
    h.open_round().await;
    h.paid_bettor(1, Side::Heads).await;
    h.engine.approve(&h.operator, 1).await.unwrap();
    h.messenger.clear();

    store.fail_winner_commits.store(true, Ordering::SeqCst);
    let result = h.engine.declare(&h.operator, "heads").await;
    assert!(matches!(result, Err(BotError::Internal(_))));

    assert!(h.engine.list_results().await.unwrap().tally.is_empty());
    assert!(h.engine.winners().await.unwrap().is_empty());
    assert_eq!(h.available().await, 1);
    assert!(h.messenger.texts_to(1).is_empty());

    // Retrying after the store recovers counts the result once
    store.fail_winner_commits.store(false, Ordering::SeqCst);
    let declaration = h.engine.declare(&h.operator, "heads").await.unwrap();
    assert_eq!(declaration.tally, ResultTally { heads_wins: 1, tails_wins: 0 });
    assert_eq!(declaration.winners.user_ids, vec![1]);
    assert_eq!(h.available().await, 2);
}

// ============ Reset ============

#[tokio::test]
async fn test_reset_lets_approved_user_bet_again() {
    let h = harness(2);
    h.open_round().await;
    let a = h.paid_bettor(1, Side::Heads).await;
    h.engine.approve(&h.operator, 1).await.unwrap();
    h.engine.schedule(&h.operator, "Friday 18:00").await.unwrap();
    h.engine.set_announcement(&h.operator, "Friday 20:00").await.unwrap();
    h.engine.declare(&h.operator, "heads").await.unwrap();

    let summary = h.engine.reset_round(&h.operator).await.unwrap();
    assert_eq!(summary.users_cleared, 1);
    assert_eq!(summary.report.delivered, 1);

    let settings = h.engine.settings().await.unwrap();
    assert!(settings.betting_open);
    assert_eq!(settings.available_slots, 2);
    assert!(settings.next_betting_time.is_none());
    assert!(settings.result_announcement_time.is_none());
    assert!(h.engine.winners().await.unwrap().is_empty());

    let cleared = h.engine.check_status(&a).await.unwrap();
    assert_eq!((cleared.bet, cleared.status, cleared.payment_attempts), (None, None, 0));

    tokio_test::assert_ok!(h.engine.place_bet(&a, Side::Tails).await);
}

#[tokio::test]
async fn test_reset_keeps_user_records() {
    let h = harness(2);
    h.registered(1).await;
    h.registered(2).await;
    let summary = h.engine.reset_round(&h.operator).await.unwrap();
    assert_eq!(summary.users_cleared, 0);
    assert_eq!(h.engine.list_all_users(&h.operator).await.unwrap().len(), 2);
}

// ============ Setters ============

#[tokio::test]
async fn test_schedule_and_announcement() {
    let h = harness(2);
    h.registered(1).await;

    let change = h.engine.schedule(&h.operator, "  2024-06-01 18:00 ").await.unwrap();
    assert_eq!(change.settings.next_betting_time.as_deref(), Some("2024-06-01 18:00"));
    assert_eq!(change.report.delivered, 1);
    assert_eq!(
        h.engine.next_round_time().await.unwrap().as_deref(),
        Some("2024-06-01 18:00")
    );

    h.engine.set_announcement(&h.operator, "Sunday").await.unwrap();
    let results = h.engine.list_results().await.unwrap();
    assert_eq!(results.announcement_time.as_deref(), Some("Sunday"));
}

#[tokio::test]
async fn test_setters_reject_blank_input() {
    let h = harness(2);
    assert!(matches!(
        round_err(h.engine.schedule(&h.operator, "   ").await),
        RoundError::InvalidInput(_)
    ));
    assert!(matches!(
        round_err(h.engine.set_announcement(&h.operator, "").await),
        RoundError::InvalidInput(_)
    ));
    assert!(matches!(
        round_err(h.engine.broadcast(&h.operator, " ").await),
        RoundError::InvalidInput(_)
    ));
    assert!(h.engine.next_round_time().await.unwrap().is_none());
}

#[tokio::test]
async fn test_set_total_slots() {
    let h = harness(5);
    h.open_round().await;
    h.paid_bettor(1, Side::Heads).await;
    h.engine.approve(&h.operator, 1).await.unwrap();

    let change = h.engine.set_total_slots(&h.operator, "8").await.unwrap();
    assert_eq!(change.settings.total_slots, 8);
    assert_eq!(change.settings.available_slots, 8);
    assert_eq!(h.engine.slot_count().await.unwrap(), SlotCount { available: 8, total: 8 });

    for bad in ["-3", "abc", "", "2.5"] {
        let err = round_err(h.engine.set_total_slots(&h.operator, bad).await);
        assert!(matches!(err, RoundError::InvalidInput(_)), "{:?}", bad);
    }
    assert_eq!(h.available().await, 8);

    let change = h.engine.set_total_slots(&h.operator, "0").await.unwrap();
    assert_eq!(change.settings.total_slots, 0);
}

#[tokio::test]
async fn test_setter_survives_broadcast_failure() {
    let h = harness(2);
    h.registered(1).await;
    h.registered(2).await;
    h.messenger.fail_for(1);

    let change = h.engine.close_betting(&h.operator).await.unwrap();
    assert!(!change.settings.betting_open);
    assert_eq!(change.report.failed, 1);
    assert_eq!(change.report.delivered, 1);
}

#[tokio::test]
async fn test_setter_error_means_nothing_saved() {
    let store = Arc::new(FlakyStore::default());
    let h = harness_with_store(store.clone(), 2);
    h.registered(1).await;
    h.engine.schedule(&h.operator, "Friday 20:00").await.unwrap();

    store.fail_user_listing.store(true, Ordering::SeqCst);
    assert!(h.engine.schedule(&h.operator, "Saturday 18:00").await.is_err());
    assert!(h.engine.reset_round(&h.operator).await.is_err());
    assert_eq!(
        h.engine.next_round_time().await.unwrap().as_deref(),
        Some("Friday 20:00")
    );

    store.fail_user_listing.store(false, Ordering::SeqCst);
    let change = h.engine.schedule(&h.operator, "Saturday 18:00").await.unwrap();
    assert_eq!(change.report.delivered, 1);
    assert_eq!(h.engine.next_round_time().await.unwrap().as_deref(), Some("Saturday 18:00"));
}

#[tokio::test]
async fn test_setters_require_operator() {
    let h = harness(2);
    let stranger = user(3);
    assert_eq!(round_err(h.engine.open_betting(&stranger).await), RoundError::Unauthorized);
    assert_eq!(round_err(h.engine.schedule(&stranger, "x").await), RoundError::Unauthorized);
    assert_eq!(round_err(h.engine.set_total_slots(&stranger, "1").await), RoundError::Unauthorized);
    assert_eq!(round_err(h.engine.list_pending(&stranger).await), RoundError::Unauthorized);
    assert_eq!(round_err(h.engine.reset_round(&stranger).await), RoundError::Unauthorized);
    assert!(!h.engine.settings().await.unwrap().betting_open);
}

// ============ Broadcast and views ============

#[tokio::test]
async fn test_broadcast_reports_to_operator() {
    let h = harness(2);
    h.registered(1).await;
    h.registered(2).await;
    h.messenger.fail_for(2);

    let summary = h.engine.broadcast(&h.operator, "Round starts <soon>").await.unwrap();

    assert_eq!(summary.total_users, 2);
    assert_eq!(summary.report.delivered, 1);
    assert_eq!(summary.report.failed, 1);
    assert!(h.messenger.last_text_to(1).unwrap().contains("&lt;soon&gt;"));
    let operator_summary = h.messenger.last_text_to(OPERATOR).unwrap();
    assert!(operator_summary.contains("Broadcast Summary"));
}

#[tokio::test]
async fn test_snapshot_counts() {
    let h = harness(3);
    h.open_round().await;
    h.paid_bettor(1, Side::Heads).await;
    h.paid_bettor(2, Side::Tails).await;
    h.registered(3).await;
    h.engine.approve(&h.operator, 1).await.unwrap();

    let snapshot = h.engine.snapshot().await.unwrap();
    assert_eq!(snapshot.registered_users, 3);
    assert_eq!(snapshot.bets_placed, 2);
    assert_eq!(snapshot.pending, 1);
    assert_eq!(snapshot.approved, 1);
    assert_eq!(snapshot.settings.available_slots, 2);
}

// ============ Randomized capacity check ============

#[tokio::test]
async fn test_capacity_bounds_under_random_operations() {
    let h = harness(4);
    h.open_round().await;
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let users: Vec<UserId> = (1..=12).collect();
    for id in &users {
        h.registered(*id).await;
    }

    for _ in 0..400 {
        let id = users[rng.random_range(0..users.len())];
        let caller = user(id);
        let outcome = match rng.random_range(0..10) {
            0..=2 => {
                let side = if rng.random_bool(0.5) { Side::Heads } else { Side::Tails };
                h.engine.place_bet(&caller, side).await.map(|_| ())
            }
            3..=4 => h.engine.submit_payment(&caller, proof(&caller)).await.map(|_| ()),
            5..=6 => h.engine.approve(&h.operator, id).await.map(|_| ()),
            7 => h.engine.disapprove(&h.operator, id).await.map(|_| ()),
            8 => {
                let side = if rng.random_bool(0.5) { "heads" } else { "tails" };
                h.engine.declare(&h.operator, side).await.map(|_| ())
            }
            _ => {
                if rng.random_bool(0.5) {
                    h.engine.reset_round(&h.operator).await.map(|_| ())
                } else {
                    let total = rng.random_range(0..6u32).to_string();
                    h.engine.set_total_slots(&h.operator, &total).await.map(|_| ())
                }
            }
        };
        if let Err(e) = outcome {
            assert!(e.as_round().is_some(), "infrastructure error: {}", e);
        }

        let settings = h.engine.settings().await.unwrap();
        assert!(settings.available_slots <= settings.total_slots);
        for u in h.engine.list_all_users(&h.operator).await.unwrap() {
            assert!(u.payment_attempts <= crate::types::MAX_PAYMENT_ATTEMPTS);
        }
    }
}
