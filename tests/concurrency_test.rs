mod common;

use common::*;
use panel_ledger::domain::deposit::IngestOutcome;
use panel_ledger::domain::order::OrderStatus;
use panel_ledger::services::ingestion::DepositIngestor;
use panel_ledger::services::reconciliation::{ReconcileSettings, Reconciler};
use std::sync::Arc;
use std::time::Duration;

// ── concurrent duplicate webhooks ──────────────────────────────────────────
// 20 deliveries of the same notification race across pooled connections.
// Exactly one credits.

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicate_webhooks_credit_once() {
    let (pool, _dir) = setup_file_pool().await;
    let notifier = Arc::new(RecordingNotifier::new());
    let ingestor = DepositIngestor::new(pool.clone(), notifier.clone(), Duration::from_secs(3600));
    let user = seed_account(&pool).await;
    ingestor
        .open_payment(reference("PAY-1"), user, usd(5000), "card")
        .await
        .unwrap();

    let body: &'static [u8] = br#"{"event":"deposit.success","reference":"PAY-1","amount":"50.00"}"#;
    let signature = sign(body);

    let mut handles = Vec::new();
    for _ in 0..20 {
        let ingestor = ingestor.clone();
        let signature = signature.clone();
        handles.push(tokio::spawn(async move {
            ingestor
                .ingest(&card_gateway(), body, Some(&signature))
                .await
                .unwrap()
        }));
    }

    let mut accepted = 0;
    let mut duplicates = 0;
    for h in handles {
        match h.await.unwrap() {
            IngestOutcome::Accepted { .. } => accepted += 1,
            IngestOutcome::Duplicate => duplicates += 1,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    assert_eq!(accepted, 1, "exactly 1 Accepted");
    assert_eq!(duplicates, 19, "19 Duplicates");
    assert_eq!(balance(&pool, user).await, 5000);
    assert_eq!(count_transactions(&pool, user, "deposit").await, 1);
    assert_eq!(count_unmatched(&pool).await, 0);
    assert_eq!(notifier.kinds().len(), 1);
}

// ── overlapping reconciliation runs ────────────────────────────────────────
// Two runs observe the same cancellation. One refund request, one winner.

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_runs_create_one_refund() {
    let (pool, _dir) = setup_file_pool().await;
    let user = seed_account(&pool).await;
    let order = seed_order(&pool, user, Some("ext-9"), OrderStatus::Pending, 1000).await;

    let provider = Arc::new(
        ScriptedProvider::with_delay(Duration::from_millis(20)).answer("ext-9", OrderStatus::Cancelled),
    );
    let notifier = Arc::new(RecordingNotifier::new());
    let reconciler = Reconciler::new(
        pool.clone(),
        provider,
        notifier.clone(),
        ReconcileSettings::default(),
    );

    let (a, b) = tokio::join!(
        tokio::spawn({
            let r = reconciler.clone();
            async move { r.run().await.unwrap() }
        }),
        tokio::spawn({
            let r = reconciler.clone();
            async move { r.run().await.unwrap() }
        }),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.refunds_created + b.refunds_created, 1);
    assert_eq!(a.orders_updated + b.orders_updated, 1);
    assert_eq!(count_refund_requests(&pool, order).await, 1);
    assert_eq!(order_status(&pool, order).await, "cancelled");
    assert_eq!(notifier.kinds().len(), 1);
}
