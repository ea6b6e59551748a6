use {
    super::Tx,
    crate::domain::{audit::NewAuditEntry, error::PipelineError},
    chrono::Utc,
};

pub async fn insert_audit_entry(tx: &mut Tx<'_>, entry: &NewAuditEntry) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        INSERT INTO audit_log (id, entity_type, entity_id, action, actor, detail, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(entry.id)
    .bind(&entry.entity_type)
    .bind(&entry.entity_id)
    .bind(&entry.action)
    .bind(&entry.actor)
    .bind(entry.detail.to_string())
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;

    Ok(())
}
