use anyhow::Context;
use sqlx::{PgPool, postgres::PgPoolOptions};

pub async fn connect_pg(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .context("failed to connect to postgres")
}
