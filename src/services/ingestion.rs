use {
    crate::{
        config,
        domain::{
            deposit::{DepositEvent, IngestOutcome, PendingPayment, UnmatchedReason},
            error::PipelineError,
            id::PaymentReference,
            ledger::{CreditRequest, TransactionKind},
            money::Money,
            notify::{NotificationKind, Notifier},
        },
        gateway::{GatewayConfig, payload, signature},
        infra::sqlite::{deposit_repo, ledger_repo},
        services::ledger,
    },
    chrono::Utc,
    sqlx::SqlitePool,
    std::{sync::Arc, time::Duration},
    uuid::Uuid,
};

/// Turns verified gateway notifications into exactly-once balance credits.
#[derive(Clone)]
pub struct DepositIngestor {
    pool: SqlitePool,
    notifier: Arc<dyn Notifier>,
    /// How long a consumed reference is remembered for duplicate detection.
    consumed_ttl: Duration,
    /// How long an initiated payment waits for its webhook before the sweeper drops it.
    pending_ttl: Duration,
}

impl DepositIngestor {
    pub fn new(pool: SqlitePool, notifier: Arc<dyn Notifier>, consumed_ttl: Duration) -> Self {
        Self {
            pool,
            notifier,
            consumed_ttl,
            pending_ttl: config::DEFAULT_PENDING_PAYMENT_TTL,
        }
    }

    pub fn with_pending_ttl(mut self, ttl: Duration) -> Self {
        self.pending_ttl = ttl;
        self
    }

    /// Entry point for the payment-initiation flow: remembers who started
    /// `reference` so the gateway's webhook can be matched later.
    pub async fn open_payment(
        &self,
        reference: PaymentReference,
        owner_id: Uuid,
        money: Money,
        gateway: &str,
    ) -> Result<PendingPayment, PipelineError> {
        if money.amount().is_zero() {
            return Err(PipelineError::Validation("payment amount must be positive".into()));
        }
        let Some(account) = ledger_repo::get_currency(&self.pool, owner_id).await? else {
            return Err(PipelineError::OwnerNotFound(owner_id));
        };
        if account != money.currency() {
            return Err(PipelineError::CurrencyMismatch {
                account,
                credit: money.currency(),
            });
        }
        let now = Utc::now();
        let pending = PendingPayment {
            reference,
            owner_id,
            money,
            gateway: gateway.to_ascii_lowercase(),
            created_at: now,
            expires_at: now.timestamp() + self.pending_ttl.as_secs() as i64,
        };
        if !deposit_repo::insert_pending(&self.pool, &pending).await? {
            return Err(PipelineError::InvalidState(format!(
                "reference {} is already pending",
                pending.reference
            )));
        }
        tracing::info!(
            reference = %pending.reference,
            %owner_id,
            amount = %pending.money,
            gateway = %pending.gateway,
            "payment initiated"
        );
        Ok(pending)
    }

    /// Full pipeline for one delivery. `Err(WebhookSignature)` means reject;
    /// `Err(Validation)` means the body was not parseable JSON.
    #[tracing::instrument(
        name = "ingest",
        skip_all,
        fields(gateway = %gateway.name, event_type = tracing::field::Empty, reference = tracing::field::Empty)
    )]
    pub async fn ingest(
        &self,
        gateway: &GatewayConfig,
        raw_body: &[u8],
        signature_header: Option<&str>,
    ) -> Result<IngestOutcome, PipelineError> {
        let body: serde_json::Value = match serde_json::from_slice(raw_body) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(
                    payload_hash = %payload::payload_hash(raw_body),
                    error = %e,
                    "malformed webhook payload"
                );
                return Err(PipelineError::Validation(format!("malformed payload: {e}")));
            }
        };

        let event_type = payload::event_type(&body).unwrap_or_default();
        tracing::Span::current().record("event_type", event_type);
        if !gateway.accepts(event_type) {
            tracing::debug!("not a deposit event, acknowledged");
            return Ok(IngestOutcome::Ignored);
        }

        if signature::check(gateway.secret.as_ref(), raw_body, signature_header)?
            == signature::Verification::Skipped
        {
            tracing::debug!("gateway has no secret, signature check skipped");
        }

        let (event, amount_read) = payload::extract_deposit(&gateway.name, &body, raw_body);
        if let Some(reference) = &event.reference {
            tracing::Span::current().record("reference", tracing::field::display(reference));
        }

        if let Err(e) = amount_read {
            tracing::warn!(payload_hash = %event.payload_hash, error = %e, "deposit amount unreadable, parking");
            return self.park(&event, UnmatchedReason::MalformedAmount).await;
        }
        if event.amount <= 0 {
            tracing::info!(amount = event.amount, "non-positive deposit amount, acknowledged");
            return Ok(IngestOutcome::Ignored);
        }
        let Some(reference) = event.reference.clone() else {
            tracing::warn!(payload_hash = %event.payload_hash, "deposit without reference, parking");
            return self.park(&event, UnmatchedReason::MissingReference).await;
        };

        self.settle(&event, &reference).await
    }

    /// Consume the pending payment and credit its owner in one unit of work.
    async fn settle(
        &self,
        event: &DepositEvent,
        reference: &PaymentReference,
    ) -> Result<IngestOutcome, PipelineError> {
        let mut tx = self.pool.begin().await?;

        let Some(pending) = deposit_repo::take_pending(&mut tx, reference).await? else {
            if deposit_repo::is_consumed(&mut tx, reference).await? {
                tx.commit().await?;
                tracing::info!("reference already settled, duplicate delivery ignored");
                return Ok(IngestOutcome::Duplicate);
            }
            let parked = deposit_repo::park_unmatched(&mut tx, event, UnmatchedReason::NoPendingPayment).await?;
            tx.commit().await?;
            log_parked(event, UnmatchedReason::NoPendingPayment, parked.is_some());
            return Ok(IngestOutcome::Unmatched { unmatched_id: parked });
        };

        warn_on_mismatch(event, &pending);
        if reported_other_currency(event, &pending) {
            tx.rollback().await?;
            return self.park(event, UnmatchedReason::CurrencyMismatch).await;
        }

        let request = CreditRequest::deposit(
            pending.owner_id,
            pending.money.clone(),
            format!("Deposit via {} ({})", pending.gateway, reference),
            reference.as_str(),
        );

        match ledger::credit_in_tx(&mut tx, &request).await {
            Ok(record) => {
                deposit_repo::mark_consumed(&mut tx, reference, record.id, self.consumed_expiry()).await?;
                tx.commit().await?;

                self.notifier.notify(
                    NotificationKind::Deposit,
                    serde_json::json!({
                        "owner_id": record.owner_id,
                        "transaction_id": record.id,
                        "reference": reference,
                        "amount": record.money.amount().to_string(),
                        "currency": record.money.currency(),
                        "gateway": event.gateway,
                    }),
                );
                Ok(IngestOutcome::Accepted {
                    transaction_id: record.id,
                })
            }
            Err(PipelineError::OwnerNotFound(owner_id)) => {
                tx.rollback().await?;
                tracing::error!(%owner_id, payload_hash = %event.payload_hash, "pending payment owner missing, parking");
                self.park(event, UnmatchedReason::OwnerNotFound).await
            }
            Err(PipelineError::CurrencyMismatch { account, credit }) => {
                tx.rollback().await?;
                tracing::error!(%account, %credit, payload_hash = %event.payload_hash, "pending payment currency differs from account, parking");
                self.park(event, UnmatchedReason::CurrencyMismatch).await
            }
            Err(PipelineError::AlreadyCredited(_)) => {
                tx.rollback().await?;
                self.retire_settled_reference(reference).await
            }
            Err(e) => Err(e),
        }
    }

    /// The ledger already holds a deposit for this reference but the pending
    /// record survived. Drop the pending record and remember the reference.
    async fn retire_settled_reference(&self, reference: &PaymentReference) -> Result<IngestOutcome, PipelineError> {
        let mut tx = self.pool.begin().await?;
        deposit_repo::take_pending(&mut tx, reference).await?;
        if let Some(id) =
            ledger_repo::find_transaction_id(&mut tx, TransactionKind::Deposit, reference.as_str()).await?
        {
            deposit_repo::mark_consumed(&mut tx, reference, id, self.consumed_expiry()).await?;
        }
        tx.commit().await?;
        tracing::warn!("reference was already credited, pending record retired");
        Ok(IngestOutcome::Duplicate)
    }

    async fn park(&self, event: &DepositEvent, reason: UnmatchedReason) -> Result<IngestOutcome, PipelineError> {
        let mut tx = self.pool.begin().await?;
        let parked = deposit_repo::park_unmatched(&mut tx, event, reason).await?;
        tx.commit().await?;
        log_parked(event, reason, parked.is_some());
        Ok(IngestOutcome::Unmatched { unmatched_id: parked })
    }

    fn consumed_expiry(&self) -> i64 {
        Utc::now().timestamp() + self.consumed_ttl.as_secs() as i64
    }
}

fn log_parked(event: &DepositEvent, reason: UnmatchedReason, new_record: bool) {
    if new_record {
        tracing::warn!(
            reason = reason.as_str(),
            amount = event.amount,
            payload_hash = %event.payload_hash,
            "deposit parked for manual review"
        );
    } else {
        tracing::info!(payload_hash = %event.payload_hash, "deposit already parked");
    }
}

/// The stored pending amount is what gets credited; an amount disagreement is only logged.
fn warn_on_mismatch(event: &DepositEvent, pending: &PendingPayment) {
    if event.amount != pending.money.amount().minor() {
        tracing::warn!(
            reported = event.amount,
            expected = pending.money.amount().minor(),
            "webhook amount differs from pending payment, crediting pending amount"
        );
    }
}

/// A gateway that names a currency must name the pending payment's currency.
fn reported_other_currency(event: &DepositEvent, pending: &PendingPayment) -> bool {
    match &event.currency {
        Some(currency) if currency != pending.money.currency().as_str() => {
            tracing::warn!(
                reported = %currency,
                expected = %pending.money.currency(),
                "webhook currency differs from pending payment, parking"
            );
            true
        }
        _ => false,
    }
}
