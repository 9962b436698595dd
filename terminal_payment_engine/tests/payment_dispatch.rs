use std::time::Duration;

use payment_common::Cents;
use terminal_payment_engine::{
    db_types::{AttemptStatus, InvoiceStatus, NewPaymentAttempt},
    events::{EventProducer, EventProducers, IntentOrphanedEvent},
    payment_objects::DispatchPolicy,
    test_utils::{tear_down, Fault, Op, ScriptedProcessor},
    DispatchError,
    InvoiceManagement,
    PaymentAttemptManagement,
    PaymentDispatchApi,
    PaymentMode,
    SqliteDatabase,
    SweepReport,
    TerminalApi,
};
use tokio::sync::mpsc;

use crate::support::*;

mod support;

fn api(db: &SqliteDatabase, processor: &ScriptedProcessor) -> PaymentDispatchApi<SqliteDatabase, ScriptedProcessor> {
    PaymentDispatchApi::new(db.clone(), processor.clone(), EventProducers::default(), fast_policy())
}

#[tokio::test]
async fn live_payment_charges_the_invoice_total_with_platform_fee() {
    let db = new_db().await;
    seed_connected_shop(&db, "shop1", "acct_barber").await;
    bind_reader(&db, "shop1", "tmr_reader_1").await;
    seed_invoice(&db, "shop1", "inv1").await;
    let processor = ScriptedProcessor::new();
    let api = api(&db, &processor);

    let result = api.create_payment(&invoice_id("inv1"), &shop_id("shop1"), PaymentMode::Live).await.unwrap();
    assert_eq!(result.amount, Cents::from(11_000));
    assert_eq!(result.application_fee, Cents::from(555));
    assert_eq!(result.terminal_id, "tmr_reader_1");
    assert!(result.payment_intent.starts_with("pi_"));

    let requests = processor.intent_requests();
    assert_eq!(requests.len(), 1);
    let destination = requests[0].destination.clone().expect("destination charge");
    assert_eq!(destination.account_id, "acct_barber");
    assert_eq!(destination.application_fee, Cents::from(555));
    assert_eq!(processor.calls(Op::ProcessIntent), 1);

    // Dispatch alone never pays the invoice
    let invoice = db.fetch_invoice(&invoice_id("inv1")).await.unwrap().unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Draft);
    assert!(invoice.paid_date.is_none());
    let attempts = db.fetch_attempts_for_invoice(&invoice_id("inv1")).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].status, AttemptStatus::Dispatched);
    assert_eq!(attempts[0].intent_id.as_deref(), Some(result.payment_intent.as_str()));
    tear_down(db).await;
}

#[tokio::test]
async fn shops_without_connected_account_get_a_platform_charge() {
    let db = new_db().await;
    seed_shop(&db, "shop1").await;
    bind_reader(&db, "shop1", "tmr_reader_1").await;
    seed_invoice(&db, "shop1", "inv1").await;
    let processor = ScriptedProcessor::new();
    let result = api(&db, &processor).create_payment(&invoice_id("inv1"), &shop_id("shop1"), PaymentMode::Live).await;
    let result = result.unwrap();
    assert_eq!(result.application_fee, Cents::from(0));
    assert!(processor.intent_requests()[0].destination.is_none());
    tear_down(db).await;
}

#[tokio::test]
async fn no_reader_means_no_processor_calls() {
    let db = new_db().await;
    seed_connected_shop(&db, "shop1", "acct_barber").await;
    seed_invoice(&db, "shop1", "inv1").await;
    let processor = ScriptedProcessor::new();
    let err = api(&db, &processor).create_payment(&invoice_id("inv1"), &shop_id("shop1"), PaymentMode::Live).await;
    assert!(matches!(err, Err(DispatchError::NoTerminal(_))));
    assert_eq!(processor.total_calls(), 0);
    assert!(db.fetch_attempts_for_invoice(&invoice_id("inv1")).await.unwrap().is_empty());
    tear_down(db).await;
}

#[tokio::test]
async fn invoices_are_scoped_to_their_shop() {
    let db = new_db().await;
    seed_shop(&db, "shop1").await;
    seed_shop(&db, "shop2").await;
    bind_reader(&db, "shop2", "tmr_reader_1").await;
    seed_invoice(&db, "shop1", "inv1").await;
    let processor = ScriptedProcessor::new();
    let api = api(&db, &processor);
    let err = api.create_payment(&invoice_id("inv1"), &shop_id("shop2"), PaymentMode::Live).await;
    assert!(matches!(err, Err(DispatchError::InvoiceNotFound { .. })));
    let err = api.create_payment(&invoice_id("nope"), &shop_id("shop2"), PaymentMode::Live).await;
    assert!(matches!(err, Err(DispatchError::InvoiceNotFound { .. })));
    assert_eq!(processor.total_calls(), 0);
    tear_down(db).await;
}

#[tokio::test]
async fn empty_invoices_are_rejected() {
    let db = new_db().await;
    seed_shop(&db, "shop1").await;
    bind_reader(&db, "shop1", "tmr_reader_1").await;
    let invoice = terminal_payment_engine::db_types::NewInvoice::new(invoice_id("inv0"), shop_id("shop1"), vec![]);
    db.insert_invoice(invoice).await.unwrap();
    let processor = ScriptedProcessor::new();
    let err = api(&db, &processor).create_payment(&invoice_id("inv0"), &shop_id("shop1"), PaymentMode::Live).await;
    assert!(matches!(err, Err(DispatchError::InvalidAmount { .. })));
    assert_eq!(processor.total_calls(), 0);
    tear_down(db).await;
}

#[tokio::test]
async fn paid_invoices_cannot_be_charged_again() {
    let db = new_db().await;
    seed_shop(&db, "shop1").await;
    bind_reader(&db, "shop1", "tmr_reader_1").await;
    seed_invoice(&db, "shop1", "inv1").await;
    db.mark_invoice_paid(&invoice_id("inv1"), "pi_earlier").await.unwrap();
    let processor = ScriptedProcessor::new();
    let err = api(&db, &processor).create_payment(&invoice_id("inv1"), &shop_id("shop1"), PaymentMode::Live).await;
    assert!(matches!(err, Err(DispatchError::InvoiceNotPayable { status: InvoiceStatus::Paid, .. })));
    assert_eq!(processor.total_calls(), 0);
    tear_down(db).await;
}

#[tokio::test]
async fn only_one_payment_in_flight_per_invoice() {
    let db = new_db().await;
    seed_shop(&db, "shop1").await;
    bind_reader(&db, "shop1", "tmr_reader_1").await;
    seed_invoice(&db, "shop1", "inv1").await;
    let processor = ScriptedProcessor::new();
    let api = api(&db, &processor);
    let (inv, shop) = (invoice_id("inv1"), shop_id("shop1"));
    let (a, b) = tokio::join!(
        api.create_payment(&inv, &shop, PaymentMode::Live),
        api.create_payment(&inv, &shop, PaymentMode::Live)
    );
    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(results.iter().filter(|r| matches!(r, Err(DispatchError::PaymentInProgress(_)))).count(), 1);
    assert_eq!(processor.calls(Op::CreateIntent), 1);
    // Still in flight, so a later retry is refused too
    let err = api.create_payment(&inv, &shop, PaymentMode::Live).await;
    assert!(matches!(err, Err(DispatchError::PaymentInProgress(_))));
    tear_down(db).await;
}

#[tokio::test]
async fn rejected_dispatch_cancels_the_intent() {
    let db = new_db().await;
    seed_shop(&db, "shop1").await;
    bind_reader(&db, "shop1", "tmr_reader_1").await;
    seed_invoice(&db, "shop1", "inv1").await;
    let processor = ScriptedProcessor::new();
    processor.fail(Op::ProcessIntent, Fault::Reject("reader is busy".into()), 1);
    let api = api(&db, &processor);

    let err = api.create_payment(&invoice_id("inv1"), &shop_id("shop1"), PaymentMode::Live).await.unwrap_err();
    match err {
        DispatchError::TerminalProcessingFailed { canceled, reason, .. } => {
            assert!(canceled);
            assert!(reason.contains("reader is busy"));
        },
        e => panic!("Unexpected error: {e}"),
    }
    assert_eq!(processor.calls(Op::CancelIntent), 1);
    let invoice = db.fetch_invoice(&invoice_id("inv1")).await.unwrap().unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Draft);
    let attempts = db.fetch_attempts_for_invoice(&invoice_id("inv1")).await.unwrap();
    assert_eq!(attempts[0].status, AttemptStatus::Canceled);
    assert_eq!(attempts[0].cancel_attempts, 1);

    // The slot is free again
    let retry = api.create_payment(&invoice_id("inv1"), &shop_id("shop1"), PaymentMode::Live).await;
    assert!(retry.is_ok());
    tear_down(db).await;
}

#[tokio::test]
async fn unresponsive_reader_times_out_and_is_compensated() {
    let db = new_db().await;
    seed_shop(&db, "shop1").await;
    bind_reader(&db, "shop1", "tmr_reader_1").await;
    seed_invoice(&db, "shop1", "inv1").await;
    let processor = ScriptedProcessor::new();
    processor.fail(Op::ProcessIntent, Fault::Hang, 1);
    let started = std::time::Instant::now();
    let err = api(&db, &processor).create_payment(&invoice_id("inv1"), &shop_id("shop1"), PaymentMode::Live).await;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(matches!(err, Err(DispatchError::TerminalProcessingFailed { canceled: true, .. })));
    let attempts = db.fetch_attempts_for_invoice(&invoice_id("inv1")).await.unwrap();
    assert_eq!(attempts[0].status, AttemptStatus::Canceled);
    tear_down(db).await;
}

#[tokio::test]
async fn failed_intent_creation_releases_the_slot() {
    let db = new_db().await;
    seed_shop(&db, "shop1").await;
    bind_reader(&db, "shop1", "tmr_reader_1").await;
    seed_invoice(&db, "shop1", "inv1").await;
    let processor = ScriptedProcessor::new();
    processor.fail(Op::CreateIntent, Fault::Unavailable, 1);
    let api = api(&db, &processor);
    let err = api.create_payment(&invoice_id("inv1"), &shop_id("shop1"), PaymentMode::Live).await;
    assert!(matches!(err, Err(DispatchError::ProcessorUnavailable { .. })));
    assert_eq!(processor.calls(Op::ProcessIntent), 0);
    let attempts = db.fetch_attempts_for_invoice(&invoice_id("inv1")).await.unwrap();
    assert_eq!(attempts[0].status, AttemptStatus::Failed);
    assert!(api.create_payment(&invoice_id("inv1"), &shop_id("shop1"), PaymentMode::Live).await.is_ok());
    tear_down(db).await;
}

#[tokio::test]
async fn uncancelable_intents_are_orphaned_and_reported() {
    let db = new_db().await;
    seed_shop(&db, "shop1").await;
    bind_reader(&db, "shop1", "tmr_reader_1").await;
    seed_invoice(&db, "shop1", "inv1").await;
    let processor = ScriptedProcessor::new();
    processor.fail(Op::ProcessIntent, Fault::Reject("reader is offline".into()), 1);
    processor.fail(Op::CancelIntent, Fault::Unavailable, 3);
    let (tx, mut rx) = mpsc::channel::<IntentOrphanedEvent>(4);
    let producers = EventProducers { intent_orphaned_producer: vec![EventProducer::new(tx)], ..Default::default() };
    let api = PaymentDispatchApi::new(db.clone(), processor.clone(), producers, fast_policy());

    let err = api.create_payment(&invoice_id("inv1"), &shop_id("shop1"), PaymentMode::Live).await.unwrap_err();
    let intent_id = match err {
        DispatchError::TerminalProcessingFailed { canceled: false, intent_id, .. } => intent_id,
        e => panic!("Unexpected error: {e}"),
    };
    assert_eq!(processor.calls(Op::CancelIntent), 3);
    let event = rx.try_recv().expect("orphan event");
    assert_eq!(event.intent_id, intent_id);
    assert_eq!(event.invoice_id, "inv1");
    assert!(rx.try_recv().is_err());

    let attempts = db.fetch_attempts_by_status(AttemptStatus::Orphaned).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].cancel_attempts, 3);
    let invoice = db.fetch_invoice(&invoice_id("inv1")).await.unwrap().unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Draft);

    // The processor recovers and the sweeper finishes the job
    let report = api.sweep(Duration::from_secs(600)).await.unwrap();
    assert_eq!(report.canceled, vec![intent_id]);
    assert!(report.still_orphaned.is_empty());
    let attempts = db.fetch_attempts_for_invoice(&invoice_id("inv1")).await.unwrap();
    assert_eq!(attempts[0].status, AttemptStatus::Canceled);
    assert_eq!(attempts[0].cancel_attempts, 4);
    tear_down(db).await;
}

#[tokio::test]
async fn orphaned_intent_holds_the_payment_slot() {
    let db = new_db().await;
    seed_shop(&db, "shop1").await;
    bind_reader(&db, "shop1", "tmr_reader_1").await;
    seed_invoice(&db, "shop1", "inv1").await;
    let processor = ScriptedProcessor::new();
    processor.fail(Op::ProcessIntent, Fault::Hang, 1);
    processor.fail(Op::CancelIntent, Fault::Unavailable, 3);
    let api = api(&db, &processor);

    let err = api.create_payment(&invoice_id("inv1"), &shop_id("shop1"), PaymentMode::Live).await.unwrap_err();
    let orphan = match err {
        DispatchError::TerminalProcessingFailed { canceled: false, intent_id, .. } => intent_id,
        e => panic!("Unexpected error: {e}"),
    };
    // The orphan may still be collected, so a second intent must not be created
    let err = api.create_payment(&invoice_id("inv1"), &shop_id("shop1"), PaymentMode::Live).await.unwrap_err();
    assert!(matches!(err, DispatchError::PaymentInProgress(ref id) if id.as_str() == "inv1"), "{err}");
    assert_eq!(processor.calls(Op::CreateIntent), 1);

    let report = api.sweep(Duration::from_secs(600)).await.unwrap();
    assert_eq!(report.canceled, vec![orphan.clone()]);
    let result = api.create_payment(&invoice_id("inv1"), &shop_id("shop1"), PaymentMode::Live).await.unwrap();
    assert_ne!(result.payment_intent, orphan);
    assert_eq!(processor.calls(Op::CreateIntent), 2);
    tear_down(db).await;
}

#[tokio::test]
async fn unpaid_dispatches_expire() {
    let db = new_db().await;
    seed_shop(&db, "shop1").await;
    bind_reader(&db, "shop1", "tmr_reader_1").await;
    seed_invoice(&db, "shop1", "inv1").await;
    let processor = ScriptedProcessor::new();
    let patient = api(&db, &processor);
    let dispatched = patient.create_payment(&invoice_id("inv1"), &shop_id("shop1"), PaymentMode::Live).await.unwrap();

    // Well within the expiry, nothing happens
    let report = patient.sweep(Duration::from_secs(600)).await.unwrap();
    assert_eq!(report, SweepReport::default());
    assert_eq!(processor.calls(Op::CancelIntent), 0);

    let policy = DispatchPolicy { dispatch_expiry: Duration::ZERO, ..fast_policy() };
    let api = PaymentDispatchApi::new(db.clone(), processor.clone(), EventProducers::default(), policy);
    let report = api.sweep(Duration::from_secs(600)).await.unwrap();
    assert_eq!(report.expired, vec![dispatched.payment_intent.clone()]);
    assert_eq!(processor.calls(Op::CancelIntent), 1);
    let attempts = db.fetch_attempts_for_invoice(&invoice_id("inv1")).await.unwrap();
    assert_eq!(attempts[0].status, AttemptStatus::Canceled);
    assert!(attempts[0].last_error.as_deref().unwrap_or_default().contains("did not pay"));
    let invoice = db.fetch_invoice(&invoice_id("inv1")).await.unwrap().unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Draft);

    let retry = api.create_payment(&invoice_id("inv1"), &shop_id("shop1"), PaymentMode::Live).await.unwrap();
    assert_ne!(retry.payment_intent, dispatched.payment_intent);
    tear_down(db).await;
}

#[tokio::test]
async fn expired_dispatch_that_cannot_be_canceled_is_orphaned() {
    let db = new_db().await;
    seed_shop(&db, "shop1").await;
    bind_reader(&db, "shop1", "tmr_reader_1").await;
    seed_invoice(&db, "shop1", "inv1").await;
    let processor = ScriptedProcessor::new();
    let (tx, mut rx) = mpsc::channel::<IntentOrphanedEvent>(4);
    let producers = EventProducers { intent_orphaned_producer: vec![EventProducer::new(tx)], ..Default::default() };
    let policy = DispatchPolicy { dispatch_expiry: Duration::ZERO, ..fast_policy() };
    let api = PaymentDispatchApi::new(db.clone(), processor.clone(), producers, policy);
    let dispatched = api.create_payment(&invoice_id("inv1"), &shop_id("shop1"), PaymentMode::Live).await.unwrap();
    processor.fail(Op::CancelIntent, Fault::Unavailable, 3);

    let report = api.sweep(Duration::from_secs(600)).await.unwrap();
    assert!(report.expired.is_empty());
    assert_eq!(report.still_orphaned, vec![dispatched.payment_intent.clone()]);
    assert_eq!(rx.try_recv().expect("orphan event").intent_id, dispatched.payment_intent);
    let err = api.create_payment(&invoice_id("inv1"), &shop_id("shop1"), PaymentMode::Live).await.unwrap_err();
    assert!(matches!(err, DispatchError::PaymentInProgress(_)), "{err}");

    let report = api.sweep(Duration::from_secs(600)).await.unwrap();
    assert_eq!(report.canceled, vec![dispatched.payment_intent]);
    assert!(api.create_payment(&invoice_id("inv1"), &shop_id("shop1"), PaymentMode::Live).await.is_ok());
    tear_down(db).await;
}

#[tokio::test]
async fn sweeper_releases_stale_claims() {
    let db = new_db().await;
    seed_shop(&db, "shop1").await;
    bind_reader(&db, "shop1", "tmr_reader_1").await;
    seed_invoice(&db, "shop1", "inv1").await;
    let claim = NewPaymentAttempt {
        invoice_id: invoice_id("inv1"),
        shop_id: shop_id("shop1"),
        amount: Cents::from(11_000),
        application_fee: Cents::from(0),
        reader_id: "tmr_reader_1".into(),
    };
    let stale = db.claim_payment_slot(claim).await.unwrap();
    let processor = ScriptedProcessor::new();
    let api = api(&db, &processor);
    let report = api.sweep(Duration::from_secs(600)).await.unwrap();
    assert!(report.abandoned.is_empty());
    let report = api.sweep(Duration::ZERO).await.unwrap();
    assert_eq!(report.abandoned, vec![stale.id]);
    assert!(api.create_payment(&invoice_id("inv1"), &shop_id("shop1"), PaymentMode::Live).await.is_ok());
    tear_down(db).await;
}

#[tokio::test]
async fn test_mode_completes_without_the_processor() {
    let db = new_db().await;
    seed_shop(&db, "shop1").await;
    seed_invoice(&db, "shop1", "inv1").await;
    let processor = ScriptedProcessor::new();
    let terminals = TerminalApi::new(db.clone(), processor.clone());
    let registered = terminals.register(&shop_id("shop1"), "abcde-12345", PaymentMode::Test).await.unwrap();
    assert!(registered.reader.id.starts_with("sim_"));
    let api = api(&db, &processor);

    let result = api.create_payment(&invoice_id("inv1"), &shop_id("shop1"), PaymentMode::Test).await.unwrap();
    assert!(result.payment_intent.starts_with("sim_pi_"));
    assert_eq!(result.amount, Cents::from(11_000));
    assert_eq!(result.terminal_id, registered.reader.id);
    assert!(result.message.contains("Test payment"));
    assert_eq!(processor.total_calls(), 0);

    let invoice = db.fetch_invoice(&invoice_id("inv1")).await.unwrap().unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Paid);
    assert_eq!(invoice.payment_intent_id.as_deref(), Some(result.payment_intent.as_str()));
    assert!(invoice.paid_date.is_some());

    // A simulated reader cannot take live payments
    seed_invoice(&db, "shop1", "inv2").await;
    let err = api.create_payment(&invoice_id("inv2"), &shop_id("shop1"), PaymentMode::Live).await;
    assert!(matches!(err, Err(DispatchError::NoTerminal(_))));
    assert_eq!(processor.total_calls(), 0);
    tear_down(db).await;
}
