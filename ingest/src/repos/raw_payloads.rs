use crate::db;
use crate::models::RawPayload;

pub async fn create<'a>(
    client: &db::Client<'a>,
    raw: &RawPayload,
) -> Result<(), tokio_postgres::Error> {
    client
        .execute(
            "INSERT INTO air_quality_raw (city, fetched_at, payload) VALUES ($1, $2, $3)",
            &[&raw.city, &raw.fetched_at, &raw.payload],
        )
        .await?;
    Ok(())
}
