use sqlx::PgPool;

/// Execute the schema DDL. Every statement is `IF NOT EXISTS`, so this is
/// safe to run on each startup.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(include_str!("../../sql/schema.sql"))
        .execute(pool)
        .await?;
    tracing::info!("schema migration applied");
    Ok(())
}
