use mishwar::config::DebtConfig;
use mishwar::db::init_db;
use mishwar::domain::{DriverId, DriverStatus, Money, RideId, TimeMs, TransactionKind, VehicleClass};
use mishwar::notify::{Recipient, RecordingDispatcher};
use mishwar::{AppError, LedgerManager, Repository};
use std::sync::Arc;
use tempfile::TempDir;

struct TestLedger {
    ledger: LedgerManager,
    repo: Arc<Repository>,
    dispatcher: Arc<RecordingDispatcher>,
    _temp: TempDir,
}

async fn setup_ledger(config: DebtConfig) -> TestLedger {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let ledger = LedgerManager::new(repo.clone(), dispatcher.clone(), config);

    TestLedger {
        ledger,
        repo,
        dispatcher,
        _temp: temp_dir,
    }
}

fn default_config() -> DebtConfig {
    DebtConfig {
        max_debt_limit: 100.0,
        warning_threshold: 70.0,
        auto_suspend: true,
    }
}

fn m(s: &str) -> Money {
    Money::from_str_canonical(s).unwrap()
}

async fn with_driver(t: &TestLedger, driver_id: i64) -> DriverId {
    let id = DriverId::new(driver_id);
    t.repo
        .upsert_driver(id, VehicleClass::Standard, TimeMs::now())
        .await
        .unwrap();
    id
}

#[tokio::test]
async fn test_commission_chain_links_balances() {
    let t = setup_ledger(default_config()).await;
    let driver = with_driver(&t, 1).await;

    let t1 = t
        .ledger
        .post_commission(driver, RideId::new(10), m("10"), "Ride commission")
        .await
        .unwrap();
    assert_eq!(t1.balance_before, m("0"));
    assert_eq!(t1.balance_after, m("10"));

    let t2 = t
        .ledger
        .post_commission(driver, RideId::new(11), m("15.5"), "Ride commission")
        .await
        .unwrap();
    assert_eq!(t2.balance_before, m("10"));
    assert_eq!(t2.balance_after, m("25.5"));

    let stored = t.repo.get_driver(driver).await.unwrap().unwrap();
    assert_eq!(stored.current_debt, m("25.5"));

    // The stored chain is intact and ordered.
    let chain = t
        .repo
        .ledger_transactions_since(driver, TimeMs::new(0))
        .await
        .unwrap();
    assert_eq!(chain.len(), 2);
    assert_eq!(chain[0].balance_after, chain[1].balance_before);
}

#[tokio::test]
async fn test_warning_threshold_notifies_without_suspending() {
    let t = setup_ledger(default_config()).await;
    let driver = with_driver(&t, 1).await;

    t.ledger
        .post_commission(driver, RideId::new(1), m("65"), "Ride commission")
        .await
        .unwrap();
    assert!(t.dispatcher.sent_to(Recipient::Driver(driver)).is_empty());

    t.ledger
        .post_commission(driver, RideId::new(2), m("10"), "Ride commission")
        .await
        .unwrap();

    let messages = t.dispatcher.sent_to(Recipient::Driver(driver));
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("Warning"), "got: {}", messages[0]);

    let stored = t.repo.get_driver(driver).await.unwrap().unwrap();
    assert_eq!(stored.status, DriverStatus::Active);
}

#[tokio::test]
async fn test_crossing_limit_suspends_driver() {
    let t = setup_ledger(default_config()).await;
    let driver = with_driver(&t, 1).await;

    t.ledger
        .post_commission(driver, RideId::new(1), m("95"), "Ride commission")
        .await
        .unwrap();
    t.ledger
        .post_commission(driver, RideId::new(2), m("10"), "Ride commission")
        .await
        .unwrap();

    let stored = t.repo.get_driver(driver).await.unwrap().unwrap();
    assert_eq!(stored.status, DriverStatus::Suspended);
    assert!(!stored.is_online);
    assert_eq!(stored.current_debt, m("105"));

    let messages = t.dispatcher.sent_to(Recipient::Driver(driver));
    assert!(messages.iter().any(|msg| msg.contains("suspended")));
}

#[tokio::test]
async fn test_auto_suspend_disabled_warns_instead() {
    let t = setup_ledger(DebtConfig {
        auto_suspend: false,
        ..default_config()
    })
    .await;
    let driver = with_driver(&t, 1).await;

    t.ledger
        .post_commission(driver, RideId::new(1), m("120"), "Ride commission")
        .await
        .unwrap();

    let stored = t.repo.get_driver(driver).await.unwrap().unwrap();
    assert_eq!(stored.status, DriverStatus::Active);

    let messages = t.dispatcher.sent_to(Recipient::Driver(driver));
    assert!(messages.iter().any(|msg| msg.contains("Warning")));
}

#[tokio::test]
async fn test_overpayment_clamps_to_zero_and_credits_wallet() {
    let t = setup_ledger(default_config()).await;
    let driver = with_driver(&t, 1).await;

    t.ledger
        .post_commission(driver, RideId::new(1), m("100"), "Ride commission")
        .await
        .unwrap();

    let payment = t
        .ledger
        .post_payment(driver, m("150"), "card", Some("txn-42"))
        .await
        .unwrap();
    assert_eq!(payment.amount, m("-100"));
    assert_eq!(payment.balance_after, m("0"));
    assert!(payment.description.contains("txn-42"));

    let stored = t.repo.get_driver(driver).await.unwrap().unwrap();
    assert_eq!(stored.current_debt, m("0"));
    assert_eq!(stored.wallet_balance, m("100"));
}

#[tokio::test]
async fn test_payment_reactivates_suspended_driver() {
    let t = setup_ledger(default_config()).await;
    let driver = with_driver(&t, 1).await;

    t.ledger
        .post_commission(driver, RideId::new(1), m("110"), "Ride commission")
        .await
        .unwrap();
    let stored = t.repo.get_driver(driver).await.unwrap().unwrap();
    assert_eq!(stored.status, DriverStatus::Suspended);

    t.ledger
        .post_payment(driver, m("50"), "cash", None)
        .await
        .unwrap();

    let stored = t.repo.get_driver(driver).await.unwrap().unwrap();
    assert_eq!(stored.status, DriverStatus::Active);
    assert!(stored.is_online);
    assert_eq!(stored.current_debt, m("60"));

    let messages = t.dispatcher.sent_to(Recipient::Driver(driver));
    assert!(messages.iter().any(|msg| msg.contains("active again")));
}

#[tokio::test]
async fn test_partial_payment_below_limit_not_enough_to_reactivate_above_it() {
    let t = setup_ledger(default_config()).await;
    let driver = with_driver(&t, 1).await;

    t.ledger
        .post_commission(driver, RideId::new(1), m("150"), "Ride commission")
        .await
        .unwrap();

    // 150 - 30 = 120, still at or above the limit: stays suspended.
    t.ledger
        .post_payment(driver, m("30"), "cash", None)
        .await
        .unwrap();

    let stored = t.repo.get_driver(driver).await.unwrap().unwrap();
    assert_eq!(stored.status, DriverStatus::Suspended);
    assert_eq!(stored.current_debt, m("120"));
}

#[tokio::test]
async fn test_non_positive_amounts_rejected() {
    let t = setup_ledger(default_config()).await;
    let driver = with_driver(&t, 1).await;

    let result = t
        .ledger
        .post_commission(driver, RideId::new(1), m("0"), "x")
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let result = t.ledger.post_payment(driver, m("-5"), "cash", None).await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let result = t
        .ledger
        .post_adjustment(driver, m("0"), TransactionKind::Adjustment, "noop")
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let result = t
        .ledger
        .post_adjustment(driver, m("-3"), TransactionKind::Penalty, "bad penalty")
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_adjustments_move_balance_both_ways() {
    let t = setup_ledger(default_config()).await;
    let driver = with_driver(&t, 1).await;

    let up = t
        .ledger
        .post_adjustment(driver, m("20"), TransactionKind::Penalty, "late cancellation")
        .await
        .unwrap();
    assert_eq!(up.balance_after, m("20"));

    let down = t
        .ledger
        .post_adjustment(driver, m("-5"), TransactionKind::Adjustment, "support credit")
        .await
        .unwrap();
    assert_eq!(down.balance_after, m("15"));

    // A negative adjustment never pushes the balance below zero.
    let floor = t
        .ledger
        .post_adjustment(driver, m("-40"), TransactionKind::Adjustment, "goodwill")
        .await
        .unwrap();
    assert_eq!(floor.amount, m("-15"));
    assert_eq!(floor.balance_after, m("0"));
}

#[tokio::test]
async fn test_unknown_driver_is_not_found() {
    let t = setup_ledger(default_config()).await;

    let result = t
        .ledger
        .post_commission(DriverId::new(999), RideId::new(1), m("10"), "x")
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    let result = t.ledger.debt_summary(DriverId::new(999)).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_debt_summary_aggregates_recent_activity() {
    let t = setup_ledger(default_config()).await;
    let driver = with_driver(&t, 1).await;

    t.ledger
        .post_commission(driver, RideId::new(1), m("40"), "Ride commission")
        .await
        .unwrap();
    t.ledger
        .post_payment(driver, m("15"), "cash", None)
        .await
        .unwrap();

    let summary = t.ledger.debt_summary(driver).await.unwrap();
    assert_eq!(summary.current_debt, m("25"));
    assert_eq!(summary.debt_limit, m("100"));
    assert_eq!(summary.warning_threshold, m("70"));
    assert!(!summary.is_suspended);
    assert!(summary.can_work);
    assert_eq!(summary.monthly.total_commission, m("40"));
    assert_eq!(summary.monthly.total_payments, m("15"));
    assert_eq!(summary.monthly.transaction_count, 2);
}

#[tokio::test]
async fn test_concurrent_postings_all_land() {
    let t = setup_ledger(default_config()).await;
    let driver = with_driver(&t, 1).await;

    let (a, b, c) = tokio::join!(
        t.ledger
            .post_commission(driver, RideId::new(1), m("5"), "Ride commission"),
        t.ledger
            .post_commission(driver, RideId::new(2), m("7"), "Ride commission"),
        t.ledger
            .post_commission(driver, RideId::new(3), m("9"), "Ride commission"),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    let stored = t.repo.get_driver(driver).await.unwrap().unwrap();
    assert_eq!(stored.current_debt, m("21"));

    let chain = t
        .repo
        .ledger_transactions_since(driver, TimeMs::new(0))
        .await
        .unwrap();
    assert_eq!(chain.len(), 3);
    for pair in chain.windows(2) {
        assert_eq!(pair[0].balance_after, pair[1].balance_before);
    }
}
