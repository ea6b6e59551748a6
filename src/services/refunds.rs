//! Decisions on refund requests raised by compensation. The screens that
//! call these live elsewhere; the ledger effects live here.

use {
    crate::domain::{
        audit::NewAuditEntry,
        error::PipelineError,
        ledger::{CreditRequest, Transaction},
        notify::{NotificationKind, Notifier},
        order::OrderStatus,
        refund::{RefundRequest, RefundStatus},
    },
    crate::infra::sqlite::{audit_repo::insert_audit_entry, order_repo, refund_repo},
    crate::services::ledger,
    sqlx::SqlitePool,
    uuid::Uuid,
};

/// Approves a pending refund: credits the owner, marks the order refunded.
/// All three writes commit together or not at all.
pub async fn approve_refund(
    pool: &SqlitePool,
    notifier: &dyn Notifier,
    refund_id: Uuid,
    approver: &str,
) -> Result<(RefundRequest, Transaction), PipelineError> {
    let mut tx = pool.begin().await?;

    let Some(refund) =
        refund_repo::decide(&mut tx, refund_id, RefundStatus::Approved, approver, None).await?
    else {
        tx.rollback().await?;
        return Err(not_pending(pool, refund_id).await);
    };

    let request = CreditRequest::refund(
        refund.owner_id,
        refund.money.clone(),
        refund.order_id,
        format!("Refund for cancelled order {}", refund.order_id),
    );
    let record = ledger::credit_in_tx(&mut tx, &request).await?;

    if !order_repo::compare_and_set_status(
        &mut tx,
        refund.order_id,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    )
    .await?
    {
        tx.rollback().await?;
        return Err(PipelineError::InvalidState(format!(
            "order {} is not cancelled",
            refund.order_id
        )));
    }

    let audit = NewAuditEntry::new(
        "refund_request",
        refund.id,
        "approved",
        approver,
        serde_json::json!({
            "order_id": refund.order_id,
            "amount": refund.money.amount().minor(),
            "transaction_id": record.id,
        }),
    );
    insert_audit_entry(&mut tx, &audit).await?;
    tx.commit().await?;

    tracing::info!(refund_id = %refund.id, order_id = %refund.order_id, approver, "refund approved");
    notifier.notify(
        NotificationKind::AdminAction,
        serde_json::json!({
            "action": "refund_approved",
            "refund_id": refund.id,
            "order_id": refund.order_id,
            "owner_id": refund.owner_id,
            "amount": refund.money.amount().to_string(),
            "approver": approver,
        }),
    );
    Ok((refund, record))
}

pub async fn reject_refund(
    pool: &SqlitePool,
    notifier: &dyn Notifier,
    refund_id: Uuid,
    approver: &str,
    notes: &str,
) -> Result<RefundRequest, PipelineError> {
    let mut tx = pool.begin().await?;

    let Some(refund) =
        refund_repo::decide(&mut tx, refund_id, RefundStatus::Rejected, approver, Some(notes)).await?
    else {
        tx.rollback().await?;
        return Err(not_pending(pool, refund_id).await);
    };

    let audit = NewAuditEntry::new(
        "refund_request",
        refund.id,
        "rejected",
        approver,
        serde_json::json!({ "order_id": refund.order_id, "notes": notes }),
    );
    insert_audit_entry(&mut tx, &audit).await?;
    tx.commit().await?;

    tracing::info!(refund_id = %refund.id, approver, "refund rejected");
    notifier.notify(
        NotificationKind::AdminAction,
        serde_json::json!({
            "action": "refund_rejected",
            "refund_id": refund.id,
            "order_id": refund.order_id,
            "approver": approver,
        }),
    );
    Ok(refund)
}

async fn not_pending(pool: &SqlitePool, refund_id: Uuid) -> PipelineError {
    match refund_repo::get_refund(pool, refund_id).await {
        Ok(Some(existing)) => PipelineError::InvalidState(format!(
            "refund {refund_id} is already {}",
            existing.status
        )),
        Ok(None) => PipelineError::NotFound(format!("refund {refund_id}")),
        Err(e) => e,
    }
}
