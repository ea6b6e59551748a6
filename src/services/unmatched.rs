use {
    crate::domain::{
        audit::NewAuditEntry,
        deposit::UnmatchedDeposit,
        error::PipelineError,
        ledger::{CreditRequest, Transaction},
        money::{Currency, Money, MoneyAmount},
        notify::{NotificationKind, Notifier},
    },
    crate::infra::sqlite::{audit_repo::insert_audit_entry, deposit_repo, ledger_repo},
    crate::services::ledger,
    sqlx::SqlitePool,
    uuid::Uuid,
};

pub async fn list_unmatched(
    pool: &SqlitePool,
    include_resolved: bool,
) -> Result<Vec<UnmatchedDeposit>, PipelineError> {
    deposit_repo::list_unmatched(pool, include_resolved).await
}

/// Credits a parked deposit to `owner_id` after an operator matched it by hand.
/// The ledger reference `unmatched:<id>` makes a second resolution impossible.
///
/// `operator_amount` is required when the gateway's amount could not be read
/// and must agree with it otherwise.
pub async fn resolve_unmatched(
    pool: &SqlitePool,
    notifier: &dyn Notifier,
    unmatched_id: Uuid,
    owner_id: Uuid,
    operator_amount: Option<MoneyAmount>,
    actor: &str,
) -> Result<Transaction, PipelineError> {
    let mut tx = pool.begin().await?;

    let Some(record) = deposit_repo::claim_unmatched(&mut tx, unmatched_id, actor).await? else {
        tx.rollback().await?;
        return Err(PipelineError::InvalidState(format!(
            "unmatched deposit {unmatched_id} does not exist or is already resolved"
        )));
    };

    let amount = match (record.amount, operator_amount) {
        (reported, None) if reported <= 0 => {
            tx.rollback().await?;
            return Err(PipelineError::InvalidState(format!(
                "unmatched deposit {unmatched_id} has no creditable amount; supply one"
            )));
        }
        (reported, None) => MoneyAmount::new(reported)?,
        (reported, Some(given)) if reported > 0 && given.minor() != reported => {
            tx.rollback().await?;
            return Err(PipelineError::Validation(format!(
                "unmatched deposit {unmatched_id} reports {reported} minor units, not {}",
                given.minor()
            )));
        }
        (_, Some(given)) if given.is_zero() => {
            tx.rollback().await?;
            return Err(PipelineError::Validation("resolution amount must be positive".into()));
        }
        (_, Some(given)) => given,
    };

    let Some(account_currency) = ledger_repo::account_currency(&mut tx, owner_id).await? else {
        tx.rollback().await?;
        return Err(PipelineError::OwnerNotFound(owner_id));
    };
    let currency = record
        .currency
        .as_deref()
        .and_then(|c| Currency::try_from(c).ok())
        .unwrap_or(account_currency);

    let request = CreditRequest::deposit(
        owner_id,
        Money::new(amount, currency),
        format!(
            "Manual match of {} deposit {}",
            record.gateway,
            record.reference.as_deref().unwrap_or("(no reference)")
        ),
        format!("unmatched:{unmatched_id}"),
    );
    let credited = ledger::credit_in_tx(&mut tx, &request).await?;
    deposit_repo::set_unmatched_transaction(&mut tx, unmatched_id, credited.id).await?;

    let audit = NewAuditEntry::new(
        "unmatched_deposit",
        unmatched_id,
        "resolved",
        actor,
        serde_json::json!({
            "owner_id": owner_id,
            "amount": amount.minor(),
            "reported_amount": record.amount,
            "operator_amount": operator_amount.map(|a| a.minor()),
            "transaction_id": credited.id,
            "payload_hash": record.payload_hash,
        }),
    );
    insert_audit_entry(&mut tx, &audit).await?;
    tx.commit().await?;

    tracing::info!(%unmatched_id, %owner_id, actor, "unmatched deposit resolved");
    notifier.notify(
        NotificationKind::AdminAction,
        serde_json::json!({
            "action": "unmatched_resolved",
            "unmatched_id": unmatched_id,
            "owner_id": owner_id,
            "transaction_id": credited.id,
            "amount": credited.money.amount().to_string(),
        }),
    );
    Ok(credited)
}
