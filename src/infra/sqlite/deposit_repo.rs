use {
    super::Tx,
    crate::domain::{
        deposit::{DepositEvent, PendingPayment, UnmatchedDeposit, UnmatchedReason},
        error::PipelineError,
        id::PaymentReference,
        money::{Currency, Money, MoneyAmount},
    },
    chrono::{DateTime, Utc},
    sqlx::SqlitePool,
    uuid::Uuid,
};

// ── Pending payments ───────────────────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct PendingRow {
    reference: String,
    owner_id: Uuid,
    amount: i64,
    currency: String,
    gateway: String,
    created_at: DateTime<Utc>,
    expires_at: i64,
}

impl TryFrom<PendingRow> for PendingPayment {
    type Error = PipelineError;

    fn try_from(row: PendingRow) -> Result<Self, Self::Error> {
        Ok(PendingPayment {
            reference: PaymentReference::new(row.reference)?,
            owner_id: row.owner_id,
            money: Money::new(
                MoneyAmount::new(row.amount)?,
                Currency::try_from(row.currency.as_str())?,
            ),
            gateway: row.gateway,
            created_at: row.created_at,
            expires_at: row.expires_at,
        })
    }
}

/// Records a payment the user just initiated.
/// Returns `false` if the reference is already pending.
pub async fn insert_pending(pool: &SqlitePool, pending: &PendingPayment) -> Result<bool, PipelineError> {
    let result = sqlx::query(
        r#"
        INSERT INTO pending_payments (reference, owner_id, amount, currency, gateway, created_at, expires_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (reference) DO NOTHING
        "#,
    )
    .bind(pending.reference.as_str())
    .bind(pending.owner_id)
    .bind(pending.money.amount().minor())
    .bind(pending.money.currency().as_str())
    .bind(&pending.gateway)
    .bind(pending.created_at)
    .bind(pending.expires_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn get_pending(
    pool: &SqlitePool,
    reference: &PaymentReference,
) -> Result<Option<PendingPayment>, PipelineError> {
    let row = sqlx::query_as::<_, PendingRow>(
        "SELECT reference, owner_id, amount, currency, gateway, created_at, expires_at
         FROM pending_payments WHERE reference = $1",
    )
    .bind(reference.as_str())
    .fetch_optional(pool)
    .await?;

    row.map(PendingPayment::try_from).transpose()
}

/// Deletes and returns the pending payment in one statement, so exactly one
/// concurrent caller can consume a given reference.
pub async fn take_pending(
    tx: &mut Tx<'_>,
    reference: &PaymentReference,
) -> Result<Option<PendingPayment>, PipelineError> {
    let row = sqlx::query_as::<_, PendingRow>(
        r#"
        DELETE FROM pending_payments WHERE reference = $1
        RETURNING reference, owner_id, amount, currency, gateway, created_at, expires_at
        "#,
    )
    .bind(reference.as_str())
    .fetch_optional(&mut **tx)
    .await?;

    row.map(PendingPayment::try_from).transpose()
}

// ── Consumed references ────────────────────────────────────────────────────

pub async fn mark_consumed(
    tx: &mut Tx<'_>,
    reference: &PaymentReference,
    transaction_id: Uuid,
    expires_at: i64,
) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        INSERT INTO consumed_references (reference, transaction_id, consumed_at, expires_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (reference) DO UPDATE SET transaction_id = excluded.transaction_id,
            consumed_at = excluded.consumed_at, expires_at = excluded.expires_at
        "#,
    )
    .bind(reference.as_str())
    .bind(transaction_id)
    .bind(Utc::now())
    .bind(expires_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn is_consumed(tx: &mut Tx<'_>, reference: &PaymentReference) -> Result<bool, PipelineError> {
    let found = sqlx::query_scalar::<_, i64>("SELECT 1 FROM consumed_references WHERE reference = $1")
        .bind(reference.as_str())
        .fetch_optional(&mut **tx)
        .await?;
    Ok(found.is_some())
}

// ── Unmatched deposits ─────────────────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct UnmatchedRow {
    id: Uuid,
    gateway: String,
    event_type: String,
    reference: Option<String>,
    amount: i64,
    currency: Option<String>,
    reason: String,
    payload_hash: String,
    raw_payload: String,
    received_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
    resolved_by: Option<String>,
    transaction_id: Option<Uuid>,
}

impl From<UnmatchedRow> for UnmatchedDeposit {
    fn from(row: UnmatchedRow) -> Self {
        UnmatchedDeposit {
            id: row.id,
            gateway: row.gateway,
            event_type: row.event_type,
            reference: row.reference,
            amount: row.amount,
            currency: row.currency,
            reason: row.reason,
            payload_hash: row.payload_hash,
            raw_payload: row.raw_payload,
            received_at: row.received_at,
            resolved_at: row.resolved_at,
            resolved_by: row.resolved_by,
            transaction_id: row.transaction_id,
        }
    }
}

const UNMATCHED_COLUMNS: &str = "id, gateway, event_type, reference, amount, currency, reason, \
     payload_hash, raw_payload, received_at, resolved_at, resolved_by, transaction_id";

/// Parks an event for manual review. An identical payload is stored once;
/// returns `None` for the repeat.
pub async fn park_unmatched(
    tx: &mut Tx<'_>,
    event: &DepositEvent,
    reason: UnmatchedReason,
) -> Result<Option<Uuid>, PipelineError> {
    let id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO unmatched_deposits
            (id, gateway, event_type, reference, amount, currency, reason, payload_hash, raw_payload, received_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (payload_hash) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(Uuid::now_v7())
    .bind(&event.gateway)
    .bind(&event.event_type)
    .bind(event.reference.as_ref().map(|r| r.as_str()))
    .bind(event.amount)
    .bind(event.currency.as_deref())
    .bind(reason.as_str())
    .bind(&event.payload_hash)
    .bind(&event.raw_payload)
    .bind(Utc::now())
    .fetch_optional(&mut **tx)
    .await?;

    Ok(id)
}

pub async fn list_unmatched(
    pool: &SqlitePool,
    include_resolved: bool,
) -> Result<Vec<UnmatchedDeposit>, PipelineError> {
    let filter = if include_resolved {
        ""
    } else {
        "WHERE resolved_at IS NULL"
    };
    let rows = sqlx::query_as::<_, UnmatchedRow>(&format!(
        "SELECT {UNMATCHED_COLUMNS} FROM unmatched_deposits {filter} ORDER BY received_at, id"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(UnmatchedDeposit::from).collect())
}

/// Claims an unresolved record for resolution. Returns `None` if it does not
/// exist or was already resolved.
pub async fn claim_unmatched(
    tx: &mut Tx<'_>,
    id: Uuid,
    actor: &str,
) -> Result<Option<UnmatchedDeposit>, PipelineError> {
    let row = sqlx::query_as::<_, UnmatchedRow>(&format!(
        r#"
        UPDATE unmatched_deposits SET resolved_at = $1, resolved_by = $2
        WHERE id = $3 AND resolved_at IS NULL
        RETURNING {UNMATCHED_COLUMNS}
        "#
    ))
    .bind(Utc::now())
    .bind(actor)
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(row.map(UnmatchedDeposit::from))
}

pub async fn set_unmatched_transaction(
    tx: &mut Tx<'_>,
    id: Uuid,
    transaction_id: Uuid,
) -> Result<(), PipelineError> {
    sqlx::query("UPDATE unmatched_deposits SET transaction_id = $1 WHERE id = $2")
        .bind(transaction_id)
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

// ── Expiry ─────────────────────────────────────────────────────────────────

/// Deletes pending payments and consumed markers whose expiry has passed.
/// Returns `(pending_removed, consumed_removed)`.
pub async fn sweep_expired(pool: &SqlitePool, now_ts: i64) -> Result<(u64, u64), PipelineError> {
    let pending = sqlx::query("DELETE FROM pending_payments WHERE expires_at <= $1")
        .bind(now_ts)
        .execute(pool)
        .await?;
    let consumed = sqlx::query("DELETE FROM consumed_references WHERE expires_at <= $1")
        .bind(now_ts)
        .execute(pool)
        .await?;
    Ok((pending.rows_affected(), consumed.rows_affected()))
}
