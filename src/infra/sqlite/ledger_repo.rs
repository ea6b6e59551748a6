use {
    super::Tx,
    crate::domain::{
        error::PipelineError,
        ledger::{BalanceDrift, Transaction, TransactionKind},
        money::{Currency, Money, MoneyAmount},
    },
    chrono::{DateTime, Utc},
    sqlx::SqlitePool,
    uuid::Uuid,
};

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    owner_id: Uuid,
    kind: String,
    amount: i64,
    currency: String,
    description: String,
    order_id: Option<Uuid>,
    reference_id: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = PipelineError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Transaction {
            id: row.id,
            owner_id: row.owner_id,
            kind: TransactionKind::try_from(row.kind.as_str())?,
            money: Money::new(
                MoneyAmount::new(row.amount)?,
                Currency::try_from(row.currency.as_str())?,
            ),
            description: row.description,
            order_id: row.order_id,
            reference_id: row.reference_id,
            status: row.status,
            created_at: row.created_at,
        })
    }
}

/// Derived balance expression over the transaction log.
const DERIVED_SUM: &str = "COALESCE(SUM(CASE kind WHEN 'charge' THEN -amount ELSE amount END), 0)";

pub async fn insert_account(
    pool: &SqlitePool,
    id: Uuid,
    currency: Currency,
) -> Result<(), PipelineError> {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO accounts (id, balance, currency, created_at, updated_at) VALUES ($1, 0, $2, $3, $3)",
    )
    .bind(id)
    .bind(currency.as_str())
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_balance(pool: &SqlitePool, owner_id: Uuid) -> Result<Option<i64>, PipelineError> {
    let balance = sqlx::query_scalar::<_, i64>("SELECT balance FROM accounts WHERE id = $1")
        .bind(owner_id)
        .fetch_optional(pool)
        .await?;
    Ok(balance)
}

/// Atomic in-place increment; the write lock it takes serializes concurrent
/// credits for the same account. Returns `false` if the account does not exist.
pub async fn increment_balance(
    tx: &mut Tx<'_>,
    owner_id: Uuid,
    delta: i64,
) -> Result<bool, PipelineError> {
    let result = sqlx::query(
        "UPDATE accounts SET balance = balance + $1, updated_at = $2 WHERE id = $3",
    )
    .bind(delta)
    .bind(Utc::now())
    .bind(owner_id)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Returns `false` when a transaction of the same kind already carries this reference.
pub async fn insert_transaction(tx: &mut Tx<'_>, record: &Transaction) -> Result<bool, PipelineError> {
    let result = sqlx::query(
        r#"
        INSERT INTO transactions
            (id, owner_id, kind, amount, currency, description, order_id, reference_id, status, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(record.id)
    .bind(record.owner_id)
    .bind(record.kind.as_str())
    .bind(record.money.amount().minor())
    .bind(record.money.currency().as_str())
    .bind(&record.description)
    .bind(record.order_id)
    .bind(record.reference_id.as_deref())
    .bind(&record.status)
    .bind(record.created_at)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Currency the account is held in, outside any unit of work.
pub async fn get_currency(pool: &SqlitePool, owner_id: Uuid) -> Result<Option<Currency>, PipelineError> {
    let currency = sqlx::query_scalar::<_, String>("SELECT currency FROM accounts WHERE id = $1")
        .bind(owner_id)
        .fetch_optional(pool)
        .await?;
    currency.map(|c| Currency::try_from(c.as_str())).transpose()
}

pub async fn account_currency(
    tx: &mut Tx<'_>,
    owner_id: Uuid,
) -> Result<Option<Currency>, PipelineError> {
    let currency = sqlx::query_scalar::<_, String>("SELECT currency FROM accounts WHERE id = $1")
        .bind(owner_id)
        .fetch_optional(&mut **tx)
        .await?;
    currency.map(|c| Currency::try_from(c.as_str())).transpose()
}

pub async fn find_transaction_id(
    tx: &mut Tx<'_>,
    kind: TransactionKind,
    reference_id: &str,
) -> Result<Option<Uuid>, PipelineError> {
    let id = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM transactions WHERE kind = $1 AND reference_id = $2",
    )
    .bind(kind.as_str())
    .bind(reference_id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(id)
}

pub async fn list_transactions(
    pool: &SqlitePool,
    owner_id: Uuid,
) -> Result<Vec<Transaction>, PipelineError> {
    let rows = sqlx::query_as::<_, TransactionRow>(
        r#"
        SELECT id, owner_id, kind, amount, currency, description, order_id, reference_id, status, created_at
        FROM transactions WHERE owner_id = $1 ORDER BY created_at, id
        "#,
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Transaction::try_from).collect()
}

pub async fn derived_balance(pool: &SqlitePool, owner_id: Uuid) -> Result<i64, PipelineError> {
    let sum = sqlx::query_scalar::<_, i64>(&format!(
        "SELECT {DERIVED_SUM} FROM transactions WHERE owner_id = $1 AND status = 'completed'"
    ))
    .bind(owner_id)
    .fetch_one(pool)
    .await?;
    Ok(sum)
}

pub async fn find_drift(pool: &SqlitePool) -> Result<Vec<BalanceDrift>, PipelineError> {
    let rows = sqlx::query_as::<_, (Uuid, i64, i64)>(&format!(
        r#"
        SELECT id, balance, derived FROM (
            SELECT a.id, a.balance, (
                SELECT {DERIVED_SUM} FROM transactions t
                WHERE t.owner_id = a.id AND t.status = 'completed'
            ) AS derived
            FROM accounts a
        )
        WHERE balance <> derived
        ORDER BY id
        "#
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(owner_id, cached, derived)| BalanceDrift {
            owner_id,
            cached,
            derived,
        })
        .collect())
}

/// Overwrites the cached balance with the value derived inside the same transaction.
/// Returns `(previous, derived)`.
pub async fn rebuild_balance(
    tx: &mut Tx<'_>,
    owner_id: Uuid,
) -> Result<Option<(i64, i64)>, PipelineError> {
    // Write first so the read below happens under the account's write lock.
    let previous = sqlx::query_scalar::<_, i64>(
        "UPDATE accounts SET updated_at = $1 WHERE id = $2 RETURNING balance",
    )
    .bind(Utc::now())
    .bind(owner_id)
    .fetch_optional(&mut **tx)
    .await?;
    let Some(previous) = previous else {
        return Ok(None);
    };

    let derived = sqlx::query_scalar::<_, i64>(&format!(
        "SELECT {DERIVED_SUM} FROM transactions WHERE owner_id = $1 AND status = 'completed'"
    ))
    .bind(owner_id)
    .fetch_one(&mut **tx)
    .await?;

    sqlx::query("UPDATE accounts SET balance = $1, updated_at = $2 WHERE id = $3")
        .bind(derived)
        .bind(Utc::now())
        .bind(owner_id)
        .execute(&mut **tx)
        .await?;

    Ok(Some((previous, derived)))
}
