use std::collections::HashSet;

use deadpool_postgres::Pool;

use super::error::DbError;

/// Schema migrations, applied in order. Names are recorded in `_migrations`.
const MIGRATIONS: &[(&str, &str)] = &[(
    "001_auction_replica.sql",
    include_str!("../../migrations/001_auction_replica.sql"),
)];

pub async fn run(pool: &Pool) -> Result<(), DbError> {
    let client = pool.get().await?;

    client
        .execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                id SERIAL PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )",
            &[],
        )
        .await?;

    let rows = client.query("SELECT name FROM _migrations", &[]).await?;
    let applied: HashSet<String> = rows.iter().map(|row| row.get(0)).collect();
    drop(client);

    for (name, sql) in MIGRATIONS {
        if applied.contains(*name) {
            continue;
        }

        let mut client = pool.get().await?;
        let tx = client.transaction().await?;

        tx.batch_execute(sql).await.map_err(|e| {
            DbError::MigrationError(format!("Failed to run migration {}: {}", name, e))
        })?;
        tx.execute("INSERT INTO _migrations (name) VALUES ($1)", &[name])
            .await?;
        tx.commit().await?;

        tracing::info!("Applied migration: {}", name);
    }

    tracing::info!("All migrations up to date");
    Ok(())
}
