#![allow(dead_code)]

use chrono::Utc;
use panel_ledger::config::Secret;
use panel_ledger::domain::error::ProviderError;
use panel_ledger::domain::id::{ExternalOrderId, PaymentReference};
use panel_ledger::domain::money::{Currency, Money, MoneyAmount};
use panel_ledger::domain::notify::{NotificationKind, Notifier};
use panel_ledger::domain::order::OrderStatus;
use panel_ledger::domain::provider::StatusProvider;
use panel_ledger::gateway::{GatewayConfig, signature};
use panel_ledger::infra::sqlite::ledger_repo;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

pub const SECRET: &str = "whsec_test";

/// Database file in a fresh temp dir behind a multi-connection WAL pool, so
/// concurrent writers contend for the real write lock. Keep the `TempDir`
/// alive for the whole test.
pub async fn setup_file_pool() -> (SqlitePool, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let url = format!("sqlite://{}", dir.path().join("ledger.db").display());
    let pool = panel_ledger::infra::sqlite::connect(&url, 10)
        .await
        .expect("failed to open file db");
    (pool, dir)
}

/// Fresh in-memory database per test. One connection, kept alive for the
/// whole test, so every query sees the same database.
pub async fn setup_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory db");

    panel_ledger::infra::sqlite::migrate(&pool)
        .await
        .expect("failed to run migrations");

    pool
}

pub fn usd(minor: i64) -> Money {
    Money::new(MoneyAmount::new(minor).unwrap(), Currency::Usd)
}

pub fn ngn(minor: i64) -> Money {
    Money::new(MoneyAmount::new(minor).unwrap(), Currency::Ngn)
}

pub fn reference(r: &str) -> PaymentReference {
    PaymentReference::new(r).unwrap()
}

pub fn card_gateway() -> GatewayConfig {
    GatewayConfig::new("card", Some(Secret::new(SECRET.to_string())))
}

pub fn sign(body: &[u8]) -> String {
    signature::sign(body, SECRET)
}

// ── Seed helpers ───────────────────────────────────────────────────────────

pub async fn seed_account(pool: &SqlitePool) -> Uuid {
    let id = Uuid::now_v7();
    ledger_repo::insert_account(pool, id, Currency::Usd)
        .await
        .expect("insert account failed");
    id
}

pub async fn seed_order(
    pool: &SqlitePool,
    owner_id: Uuid,
    external_id: Option<&str>,
    status: OrderStatus,
    charge: i64,
) -> Uuid {
    let id = Uuid::now_v7();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO orders (id, external_id, owner_id, status, charge, currency, quantity, service, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, 'usd', 1000, 'followers', $6, $6)",
    )
    .bind(id)
    .bind(external_id)
    .bind(owner_id)
    .bind(status.as_str())
    .bind(charge)
    .bind(now)
    .execute(pool)
    .await
    .expect("insert order failed");
    id
}

/// Records a charge the way order placement would: transaction plus balance debit.
pub async fn seed_charge(pool: &SqlitePool, owner_id: Uuid, order_id: Uuid, amount: i64) {
    sqlx::query(
        "INSERT INTO transactions (id, owner_id, kind, amount, currency, description, order_id, reference_id, status, created_at)
         VALUES ($1, $2, 'charge', $3, 'usd', 'Order charge', $4, $5, 'completed', $6)",
    )
    .bind(Uuid::now_v7())
    .bind(owner_id)
    .bind(amount)
    .bind(order_id)
    .bind(order_id.to_string())
    .bind(Utc::now())
    .execute(pool)
    .await
    .expect("insert charge failed");

    sqlx::query("UPDATE accounts SET balance = balance - $1 WHERE id = $2")
        .bind(amount)
        .bind(owner_id)
        .execute(pool)
        .await
        .expect("debit failed");
}

pub async fn set_balance(pool: &SqlitePool, owner_id: Uuid, balance: i64) {
    sqlx::query("UPDATE accounts SET balance = $1 WHERE id = $2")
        .bind(balance)
        .bind(owner_id)
        .execute(pool)
        .await
        .expect("set balance failed");
}

pub async fn set_order_status(pool: &SqlitePool, order_id: Uuid, status: OrderStatus) {
    sqlx::query("UPDATE orders SET status = $1 WHERE id = $2")
        .bind(status.as_str())
        .bind(order_id)
        .execute(pool)
        .await
        .expect("set status failed");
}

// ── Query helpers ──────────────────────────────────────────────────────────

pub async fn balance(pool: &SqlitePool, owner_id: Uuid) -> i64 {
    ledger_repo::get_balance(pool, owner_id)
        .await
        .expect("query failed")
        .expect("account missing")
}

pub async fn order_status(pool: &SqlitePool, order_id: Uuid) -> String {
    sqlx::query_scalar::<_, String>("SELECT status FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_one(pool)
        .await
        .expect("query failed")
}

pub async fn count_transactions(pool: &SqlitePool, owner_id: Uuid, kind: &str) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM transactions WHERE owner_id = $1 AND kind = $2")
        .bind(owner_id)
        .bind(kind)
        .fetch_one(pool)
        .await
        .expect("count failed")
}

pub async fn count_refund_requests(pool: &SqlitePool, order_id: Uuid) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM refund_requests WHERE order_id = $1")
        .bind(order_id)
        .fetch_one(pool)
        .await
        .expect("count failed")
}

pub async fn count_pending_payments(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM pending_payments")
        .fetch_one(pool)
        .await
        .expect("count failed")
}

pub async fn count_unmatched(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM unmatched_deposits")
        .fetch_one(pool)
        .await
        .expect("count failed")
}

pub async fn audit_actions(pool: &SqlitePool, entity_type: &str, entity_id: Uuid) -> Vec<String> {
    sqlx::query_scalar::<_, String>(
        "SELECT action FROM audit_log WHERE entity_type = $1 AND entity_id = $2 ORDER BY created_at",
    )
    .bind(entity_type)
    .bind(entity_id.to_string())
    .fetch_all(pool)
    .await
    .expect("query failed")
}

// ── Fakes ──────────────────────────────────────────────────────────────────

/// Provider answering from a fixed script keyed by external order id.
/// Ids without an answer fail with a transport error.
#[derive(Default)]
pub struct ScriptedProvider {
    answers: Mutex<HashMap<String, Result<OrderStatus, ProviderError>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn answer(self, external_id: &str, status: OrderStatus) -> Self {
        self.answers
            .lock()
            .unwrap()
            .insert(external_id.to_string(), Ok(status));
        self
    }

    pub fn fail(self, external_id: &str, error: ProviderError) -> Self {
        self.answers
            .lock()
            .unwrap()
            .insert(external_id.to_string(), Err(error));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl StatusProvider for ScriptedProvider {
    fn fetch_status(
        &self,
        id: &ExternalOrderId,
    ) -> Pin<Box<dyn Future<Output = Result<OrderStatus, ProviderError>> + Send + '_>> {
        let key = id.as_str().to_string();
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let answer = self
                .answers
                .lock()
                .unwrap()
                .get(&key)
                .cloned()
                .unwrap_or_else(|| Err(ProviderError::Transport("no scripted answer".into())));

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            answer
        })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(NotificationKind, serde_json::Value)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kinds(&self) -> Vec<NotificationKind> {
        self.sent.lock().unwrap().iter().map(|(k, _)| *k).collect()
    }

    pub fn sent(&self) -> Vec<(NotificationKind, serde_json::Value)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, kind: NotificationKind, payload: serde_json::Value) {
        self.sent.lock().unwrap().push((kind, payload));
    }
}
