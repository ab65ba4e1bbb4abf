//! Read-only access to communes and consulates.

use procura_core::types::DbId;
use sqlx::PgPool;

use crate::models::commune::{Commune, Consulate};

const COMMUNE_COLUMNS: &str =
    "id, code, name, postal_codes, latitude, longitude, district, created_at";

/// Lookups over the commune and consulate reference tables.
pub struct CommuneRepo;

impl CommuneRepo {
    pub async fn find_commune(pool: &PgPool, id: DbId) -> Result<Option<Commune>, sqlx::Error> {
        let query = format!("SELECT {COMMUNE_COLUMNS} FROM communes WHERE id = $1");
        sqlx::query_as::<_, Commune>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_consulate(pool: &PgPool, id: DbId) -> Result<Option<Consulate>, sqlx::Error> {
        sqlx::query_as::<_, Consulate>(
            "SELECT id, name, countries, created_at FROM consulates WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }
}
