use {
    super::Tx,
    crate::domain::{
        error::PipelineError,
        id::ExternalOrderId,
        money::{Currency, Money, MoneyAmount},
        order::{Order, OrderStatus},
    },
    chrono::{DateTime, Utc},
    sqlx::SqlitePool,
    uuid::Uuid,
};

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    external_id: Option<String>,
    owner_id: Uuid,
    status: String,
    charge: i64,
    currency: String,
    quantity: i64,
    service: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = PipelineError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            id: row.id,
            external_id: row.external_id.map(ExternalOrderId::new).transpose()?,
            owner_id: row.owner_id,
            status: OrderStatus::try_from(row.status.as_str())?,
            charge: Money::new(
                MoneyAmount::new(row.charge)?,
                Currency::try_from(row.currency.as_str())?,
            ),
            quantity: row.quantity,
            service: row.service,
            created_at: row.created_at,
        })
    }
}

const ORDER_COLUMNS: &str =
    "id, external_id, owner_id, status, charge, currency, quantity, service, created_at";

/// Open orders that failed to decode, keyed by row id.
pub type RejectedRows = Vec<(Uuid, PipelineError)>;

/// Orders still owed a reconciliation pass: open status and accepted by the provider.
///
/// Rows are decoded one by one; a row that does not decode is returned in the
/// second list and does not hide the others.
pub async fn list_open_orders(pool: &SqlitePool) -> Result<(Vec<Order>, RejectedRows), PipelineError> {
    let rows = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders
         WHERE status IN ('pending', 'processing')
           AND external_id IS NOT NULL AND external_id <> ''
         ORDER BY created_at"
    ))
    .fetch_all(pool)
    .await?;

    let mut orders = Vec::with_capacity(rows.len());
    let mut rejected = Vec::new();
    for row in rows {
        let id = row.id;
        match Order::try_from(row) {
            Ok(order) => orders.push(order),
            Err(e) => rejected.push((id, e)),
        }
    }
    Ok((orders, rejected))
}

pub async fn get_order(pool: &SqlitePool, id: Uuid) -> Result<Option<Order>, PipelineError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(Order::try_from).transpose()
}

/// Writes `new` only if the row still holds `expected`.
/// Returns `false` when another writer got there first.
pub async fn compare_and_set_status(
    tx: &mut Tx<'_>,
    id: Uuid,
    expected: OrderStatus,
    new: OrderStatus,
) -> Result<bool, PipelineError> {
    let result = sqlx::query(
        "UPDATE orders SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4",
    )
    .bind(new.as_str())
    .bind(Utc::now())
    .bind(id)
    .bind(expected.as_str())
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() == 1)
}
