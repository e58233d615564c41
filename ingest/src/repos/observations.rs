use crate::db;
use crate::models::ObservationDocument;

const INSERT_STMT: &str = r#"
    INSERT INTO air_quality_parsed
        (city, "timestamp", pollutant, value, latitude, longitude, elevation, source)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
    ON CONFLICT (city, "timestamp", pollutant) DO NOTHING"#;

/// Returns false when a document with the same key was already stored.
pub async fn insert<'a>(
    client: &db::Client<'a>,
    doc: &ObservationDocument,
) -> Result<bool, tokio_postgres::Error> {
    let rows = client
        .execute(
            INSERT_STMT,
            &[
                &doc.city,
                &doc.timestamp,
                &doc.pollutant,
                &doc.value,
                &doc.latitude,
                &doc.longitude,
                &doc.elevation,
                &doc.source,
            ],
        )
        .await?;
    Ok(rows == 1)
}
