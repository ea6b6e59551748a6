use {
    crate::domain::{
        error::PipelineError,
        notify::{NotificationKind, Notifier},
        order::{Order, OrderStatus},
        refund::{CompensationResult, RefundRequest, RefundStatus},
    },
    crate::infra::sqlite::{Tx, refund_repo},
    chrono::Utc,
    sqlx::SqlitePool,
    uuid::Uuid,
};

/// Creates the refund request for a freshly cancelled order inside the
/// caller's unit of work. The unique constraint on `order_id` decides
/// whether this call or a concurrent one wins.
pub async fn compensate_in_tx(tx: &mut Tx<'_>, order: &Order) -> Result<CompensationResult, PipelineError> {
    if order.status != OrderStatus::Cancelled {
        return Err(PipelineError::InvalidState(format!(
            "order {} is {}, not cancelled",
            order.id, order.status
        )));
    }

    let refund = RefundRequest {
        id: Uuid::now_v7(),
        order_id: order.id,
        owner_id: order.owner_id,
        money: order.charge.clone(),
        status: RefundStatus::Pending,
        notes: format!(
            "Order cancelled by provider (external id {}); refund of {} pending approval",
            order
                .external_id
                .as_ref()
                .map(|id| id.as_str())
                .unwrap_or("-"),
            order.charge
        ),
        approver: None,
        decided_at: None,
        created_at: Utc::now(),
    };

    if refund_repo::insert_if_absent(tx, &refund).await? {
        tracing::info!(order_id = %order.id, refund_id = %refund.id, "refund request created");
        Ok(CompensationResult::Created(refund))
    } else {
        tracing::debug!(order_id = %order.id, "refund request already exists");
        Ok(CompensationResult::NoOp)
    }
}

/// Standalone entry point for callers that already persisted the cancellation.
pub async fn compensate_cancellation(
    pool: &SqlitePool,
    notifier: &dyn Notifier,
    order: &Order,
) -> Result<CompensationResult, PipelineError> {
    let mut tx = pool.begin().await?;
    let result = compensate_in_tx(&mut tx, order).await?;
    tx.commit().await?;

    if let CompensationResult::Created(refund) = &result {
        notify_refund_created(notifier, refund);
    }
    Ok(result)
}

pub fn notify_refund_created(notifier: &dyn Notifier, refund: &RefundRequest) {
    notifier.notify(
        NotificationKind::CancellationRefund,
        serde_json::json!({
            "refund_id": refund.id,
            "order_id": refund.order_id,
            "owner_id": refund.owner_id,
            "amount": refund.money.amount().to_string(),
            "currency": refund.money.currency(),
        }),
    );
}
