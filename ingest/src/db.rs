use bb8_postgres::PostgresConnectionManager;
use tokio_postgres::NoTls;

use crate::config::StoreConfig;
use crate::store::StoreError;

pub type Pool = bb8::Pool<PostgresConnectionManager<NoTls>>;
pub type Client<'a> = bb8::PooledConnection<'a, PostgresConnectionManager<NoTls>>;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

pub async fn pool(conf: &StoreConfig) -> Result<Pool, tokio_postgres::Error> {
    let mgr = PostgresConnectionManager::new(conf.pg_config(), NoTls);

    bb8::Pool::builder()
        .max_size(conf.pool_size)
        .build(mgr)
        .await
}

/// Create the collections and their indexes. Safe to run on every start.
pub async fn migrate(pool: &Pool) -> Result<(), StoreError> {
    let mut conn = pool.dedicated_connection().await?;
    let report = embedded::migrations::runner().run_async(&mut conn).await?;
    for migration in report.applied_migrations() {
        log::info!("Applied migration {}", migration);
    }
    Ok(())
}

pub async fn reset(pool: &Pool) -> Result<(), StoreError> {
    let client = pool.get().await?;
    client
        .batch_execute(
            "DROP TABLE IF EXISTS air_quality_parsed;
             DROP TABLE IF EXISTS air_quality_raw;
             DROP TABLE IF EXISTS refinery_schema_history;",
        )
        .await?;
    Ok(())
}
