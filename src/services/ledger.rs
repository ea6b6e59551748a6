use {
    crate::domain::{
        audit::NewAuditEntry,
        error::PipelineError,
        ledger::{BalanceDrift, CreditRequest, Transaction},
    },
    crate::infra::sqlite::{Tx, audit_repo::insert_audit_entry, ledger_repo},
    chrono::Utc,
    sqlx::SqlitePool,
    uuid::Uuid,
};

/// Credit inside the caller's unit of work: balance increment and transaction
/// append commit or roll back together.
///
/// Fails with `OwnerNotFound` if the account is missing, `CurrencyMismatch` if
/// the account is held in another currency and `AlreadyCredited` if a
/// transaction of the same kind already carries the reference. The caller
/// must roll back on any error.
pub async fn credit_in_tx(tx: &mut Tx<'_>, request: &CreditRequest) -> Result<Transaction, PipelineError> {
    let amount = request.money.amount();
    if amount.is_zero() {
        return Err(PipelineError::Validation(
            "credit amount must be positive".into(),
        ));
    }

    let Some(account) = ledger_repo::account_currency(tx, request.owner_id).await? else {
        return Err(PipelineError::OwnerNotFound(request.owner_id));
    };
    let credit = request.money.currency();
    if account != credit {
        return Err(PipelineError::CurrencyMismatch { account, credit });
    }

    if !ledger_repo::increment_balance(tx, request.owner_id, amount.minor()).await? {
        return Err(PipelineError::OwnerNotFound(request.owner_id));
    }

    let record = Transaction {
        id: Uuid::now_v7(),
        owner_id: request.owner_id,
        kind: request.kind,
        money: request.money.clone(),
        description: request.description.clone(),
        order_id: request.order_id,
        reference_id: request.reference_id.clone(),
        status: "completed".to_string(),
        created_at: Utc::now(),
    };

    if !ledger_repo::insert_transaction(tx, &record).await? {
        return Err(PipelineError::AlreadyCredited(
            request.reference_id.clone().unwrap_or_default(),
        ));
    }

    tracing::info!(
        owner_id = %record.owner_id,
        kind = %record.kind,
        amount = %record.money,
        reference = record.reference_id.as_deref().unwrap_or(""),
        "balance credited"
    );
    Ok(record)
}

/// Standalone credit in its own unit of work.
pub async fn credit(pool: &SqlitePool, request: &CreditRequest) -> Result<Transaction, PipelineError> {
    let mut tx = pool.begin().await?;
    let record = credit_in_tx(&mut tx, request).await?;
    tx.commit().await?;
    Ok(record)
}

/// Balance as the transaction log says it should be.
pub async fn derived_balance(pool: &SqlitePool, owner_id: Uuid) -> Result<i64, PipelineError> {
    ledger_repo::derived_balance(pool, owner_id).await
}

pub async fn find_balance_drift(pool: &SqlitePool) -> Result<Vec<BalanceDrift>, PipelineError> {
    let drift = ledger_repo::find_drift(pool).await?;
    for d in &drift {
        tracing::warn!(
            owner_id = %d.owner_id,
            cached = d.cached,
            derived = d.derived,
            "balance drift detected"
        );
    }
    Ok(drift)
}

/// Rebuilds the cached balance from the transaction log.
pub async fn repair_balance(
    pool: &SqlitePool,
    owner_id: Uuid,
    actor: &str,
) -> Result<BalanceDrift, PipelineError> {
    let mut tx = pool.begin().await?;
    let Some((cached, derived)) = ledger_repo::rebuild_balance(&mut tx, owner_id).await? else {
        return Err(PipelineError::OwnerNotFound(owner_id));
    };

    if cached != derived {
        let audit = NewAuditEntry::new(
            "account",
            owner_id,
            "balance_repaired",
            actor,
            serde_json::json!({ "cached": cached, "derived": derived }),
        );
        insert_audit_entry(&mut tx, &audit).await?;
        tracing::warn!(%owner_id, cached, derived, "cached balance rebuilt from transaction log");
    }
    tx.commit().await?;

    Ok(BalanceDrift {
        owner_id,
        cached,
        derived,
    })
}
