use {
    crate::domain::{
        audit::NewAuditEntry,
        error::PipelineError,
        notify::Notifier,
        order::{Order, OrderStatus, StatusDecision},
        provider::StatusProvider,
        refund::CompensationResult,
    },
    crate::infra::sqlite::{audit_repo::insert_audit_entry, order_repo},
    crate::services::compensation,
    serde::Serialize,
    sqlx::SqlitePool,
    std::{sync::Arc, time::Duration},
    tokio::{sync::Semaphore, task::JoinSet},
};

/// Counters for one reconciliation run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub orders_scanned: u64,
    pub orders_updated: u64,
    pub errors: u64,
    pub refunds_created: u64,
    /// Provider reported a status behind the stored one.
    pub regressions: u64,
    /// Row changed under us between read and write.
    pub conflicts: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrderOutcome {
    Unchanged,
    Updated { refund_created: bool },
    Conflict,
    Regression,
    Failed,
}

impl RunStats {
    fn record(&mut self, outcome: OrderOutcome) {
        match outcome {
            OrderOutcome::Unchanged => {}
            OrderOutcome::Updated { refund_created } => {
                self.orders_updated += 1;
                if refund_created {
                    self.refunds_created += 1;
                }
            }
            OrderOutcome::Conflict => self.conflicts += 1,
            OrderOutcome::Regression => self.regressions += 1,
            OrderOutcome::Failed => self.errors += 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReconcileSettings {
    /// Upper bound on provider calls in flight.
    pub concurrency: usize,
    /// Budget for one order's provider call, retries included.
    pub per_order_timeout: Duration,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            concurrency: 8,
            per_order_timeout: Duration::from_secs(45),
        }
    }
}

/// Brings local order status in line with the provider.
#[derive(Clone)]
pub struct Reconciler {
    pool: SqlitePool,
    provider: Arc<dyn StatusProvider>,
    notifier: Arc<dyn Notifier>,
    settings: ReconcileSettings,
}

const ACTOR: &str = "reconciler";

impl Reconciler {
    pub fn new(
        pool: SqlitePool,
        provider: Arc<dyn StatusProvider>,
        notifier: Arc<dyn Notifier>,
        settings: ReconcileSettings,
    ) -> Self {
        Self {
            pool,
            provider,
            notifier,
            settings,
        }
    }

    /// One full pass over every open order with an external id.
    ///
    /// Only failing to enumerate orders is fatal; every per-order failure,
    /// including a row that does not decode, is counted in `errors` and the
    /// run moves on.
    #[tracing::instrument(name = "reconcile", skip_all)]
    pub async fn run(&self) -> Result<RunStats, PipelineError> {
        let (orders, rejected) = order_repo::list_open_orders(&self.pool).await?;
        let mut stats = RunStats {
            orders_scanned: (orders.len() + rejected.len()) as u64,
            errors: rejected.len() as u64,
            ..RunStats::default()
        };
        for (order_id, error) in &rejected {
            tracing::error!(%order_id, %error, "order row does not decode, skipping");
        }

        let permits = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for order in orders {
            let this = self.clone();
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return OrderOutcome::Failed;
                };
                this.reconcile_order(order).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => stats.record(outcome),
                Err(e) => {
                    tracing::error!(error = %e, "reconciliation task aborted");
                    stats.errors += 1;
                }
            }
        }

        tracing::info!(
            scanned = stats.orders_scanned,
            updated = stats.orders_updated,
            errors = stats.errors,
            refunds = stats.refunds_created,
            regressions = stats.regressions,
            conflicts = stats.conflicts,
            "reconciliation run finished"
        );
        Ok(stats)
    }

    async fn reconcile_order(&self, order: Order) -> OrderOutcome {
        let Some(external_id) = order.external_id.clone() else {
            return OrderOutcome::Unchanged;
        };

        let fetched = tokio::time::timeout(
            self.settings.per_order_timeout,
            self.provider.fetch_status(&external_id),
        )
        .await;

        let observed = match fetched {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                tracing::warn!(order_id = %order.id, external_id = %external_id, error = %e, "provider status check failed");
                return OrderOutcome::Failed;
            }
            Err(_) => {
                tracing::warn!(
                    order_id = %order.id,
                    external_id = %external_id,
                    timeout = ?self.settings.per_order_timeout,
                    "provider status check timed out"
                );
                return OrderOutcome::Failed;
            }
        };

        match order.decide(observed) {
            StatusDecision::Unchanged => OrderOutcome::Unchanged,
            StatusDecision::Regression { stored, observed } => {
                tracing::warn!(
                    order_id = %order.id,
                    %stored,
                    %observed,
                    "provider reported a backward transition, ignoring"
                );
                OrderOutcome::Regression
            }
            StatusDecision::Advance { from, to } => match self.apply_transition(&order, from, to).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(order_id = %order.id, error = %e, "failed to persist order transition");
                    OrderOutcome::Failed
                }
            },
        }
    }

    /// Status write, audit row and (for cancellations) the refund request
    /// commit as one unit. The write is conditional on `from` still being stored.
    async fn apply_transition(
        &self,
        order: &Order,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<OrderOutcome, PipelineError> {
        let mut tx = self.pool.begin().await?;

        if !order_repo::compare_and_set_status(&mut tx, order.id, from, to).await? {
            tx.rollback().await?;
            tracing::info!(order_id = %order.id, %from, %to, "order changed concurrently, skipping");
            return Ok(OrderOutcome::Conflict);
        }

        let audit = NewAuditEntry::new(
            "order",
            order.id,
            "status_changed",
            ACTOR,
            serde_json::json!({
                "external_id": order.external_id,
                "old_status": from.as_str(),
                "new_status": to.as_str(),
            }),
        );
        insert_audit_entry(&mut tx, &audit).await?;

        let compensation = if to == OrderStatus::Cancelled {
            let cancelled = Order {
                status: to,
                ..order.clone()
            };
            Some(compensation::compensate_in_tx(&mut tx, &cancelled).await?)
        } else {
            None
        };

        tx.commit().await?;
        tracing::info!(order_id = %order.id, %from, %to, "order status updated");

        let refund_created = match &compensation {
            Some(CompensationResult::Created(refund)) => {
                compensation::notify_refund_created(self.notifier.as_ref(), refund);
                true
            }
            _ => false,
        };

        Ok(OrderOutcome::Updated { refund_created })
    }
}
