use {
    super::Tx,
    crate::domain::{
        error::PipelineError,
        money::{Currency, Money, MoneyAmount},
        refund::{RefundRequest, RefundStatus},
    },
    chrono::{DateTime, Utc},
    sqlx::SqlitePool,
    uuid::Uuid,
};

#[derive(sqlx::FromRow)]
struct RefundRow {
    id: Uuid,
    order_id: Uuid,
    owner_id: Uuid,
    amount: i64,
    currency: String,
    status: String,
    notes: String,
    approver: Option<String>,
    decided_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<RefundRow> for RefundRequest {
    type Error = PipelineError;

    fn try_from(row: RefundRow) -> Result<Self, Self::Error> {
        Ok(RefundRequest {
            id: row.id,
            order_id: row.order_id,
            owner_id: row.owner_id,
            money: Money::new(
                MoneyAmount::new(row.amount)?,
                Currency::try_from(row.currency.as_str())?,
            ),
            status: RefundStatus::try_from(row.status.as_str())?,
            notes: row.notes,
            approver: row.approver,
            decided_at: row.decided_at,
            created_at: row.created_at,
        })
    }
}

const REFUND_COLUMNS: &str =
    "id, order_id, owner_id, amount, currency, status, notes, approver, decided_at, created_at";

pub async fn find_by_order(
    pool: &SqlitePool,
    order_id: Uuid,
) -> Result<Option<RefundRequest>, PipelineError> {
    let row = sqlx::query_as::<_, RefundRow>(&format!(
        "SELECT {REFUND_COLUMNS} FROM refund_requests WHERE order_id = $1"
    ))
    .bind(order_id)
    .fetch_optional(pool)
    .await?;

    row.map(RefundRequest::try_from).transpose()
}

pub async fn get_refund(pool: &SqlitePool, id: Uuid) -> Result<Option<RefundRequest>, PipelineError> {
    let row = sqlx::query_as::<_, RefundRow>(&format!(
        "SELECT {REFUND_COLUMNS} FROM refund_requests WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(RefundRequest::try_from).transpose()
}

/// Inserts unless a request for the same order exists.
/// Returns `true` if inserted, `false` if the unique constraint fired.
pub async fn insert_if_absent(tx: &mut Tx<'_>, refund: &RefundRequest) -> Result<bool, PipelineError> {
    let result = sqlx::query(
        r#"
        INSERT INTO refund_requests
            (id, order_id, owner_id, amount, currency, status, notes, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (order_id) DO NOTHING
        "#,
    )
    .bind(refund.id)
    .bind(refund.order_id)
    .bind(refund.owner_id)
    .bind(refund.money.amount().minor())
    .bind(refund.money.currency().as_str())
    .bind(refund.status.as_str())
    .bind(&refund.notes)
    .bind(refund.created_at)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Moves a pending request to `decision`. Returns the updated row, or `None`
/// if the request was not pending any more.
pub async fn decide(
    tx: &mut Tx<'_>,
    id: Uuid,
    decision: RefundStatus,
    approver: &str,
    notes: Option<&str>,
) -> Result<Option<RefundRequest>, PipelineError> {
    let row = sqlx::query_as::<_, RefundRow>(&format!(
        r#"
        UPDATE refund_requests
        SET status = $1, approver = $2, decided_at = $3, notes = COALESCE($4, notes)
        WHERE id = $5 AND status = 'pending'
        RETURNING {REFUND_COLUMNS}
        "#
    ))
    .bind(decision.as_str())
    .bind(approver)
    .bind(Utc::now())
    .bind(notes)
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;

    row.map(RefundRequest::try_from).transpose()
}
