//! Voyage history store access.
//!
//! The store is opaque to the aggregator: any backend returning row tuples
//! sorted by (voyage, event time, port) satisfies the trait.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::info;

use crate::carriers::util::voyage_window;
use crate::models::{Scac, ScheduleRow, VoyageQuery};

#[async_trait]
pub trait VoyageRepository: Send + Sync {
    async fn voyage_rows(
        &self,
        scac: Scac,
        query: &VoyageQuery,
    ) -> Result<Vec<ScheduleRow>, sqlx::Error>;
}

const VOYAGE_QUERY: &str = "\
SELECT data_source, scac, provider_voyage_id, vessel_name, vessel_imo, \
       voyage_num, voyage_direction, service_code, port_code, port_name, \
       port_event, event_time \
FROM voyage_history \
WHERE scac = ?1 \
  AND vessel_imo = ?2 \
  AND (?3 IS NULL OR voyage_num = ?3) \
  AND (?4 IS NULL OR event_time >= ?4) \
  AND (?5 IS NULL OR event_time <= ?5)";

pub struct SqliteVoyageStore {
    pool: SqlitePool,
}

impl SqliteVoyageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VoyageRepository for SqliteVoyageStore {
    async fn voyage_rows(
        &self,
        scac: Scac,
        query: &VoyageQuery,
    ) -> Result<Vec<ScheduleRow>, sqlx::Error> {
        let started = std::time::Instant::now();
        let window = query
            .start_date
            .as_deref()
            .and_then(|date| voyage_window(date, query.date_range.unwrap_or(0)));
        let (window_start, window_end) = match window {
            Some((start, end)) => (
                Some(format!("{start}T00:00:00")),
                Some(format!("{end}T23:59:59")),
            ),
            None => (None, None),
        };

        let mut rows: Vec<ScheduleRow> = sqlx::query_as(VOYAGE_QUERY)
            .bind(scac.as_str())
            .bind(&query.vessel_imo)
            .bind(query.voyage_num.as_deref().filter(|v| !v.is_empty()))
            .bind(window_start)
            .bind(window_end)
            .fetch_all(&self.pool)
            .await?;

        rows.sort_by(|a, b| {
            a.voyage_num
                .cmp(&b.voyage_num)
                .then_with(|| a.event_time.cmp(&b.event_time))
                .then_with(|| a.port_code.cmp(&b.port_code))
        });
        info!(
            scac = %scac,
            rows = rows.len(),
            elapsed = ?started.elapsed(),
            "fetched vessel voyages from the history store"
        );
        Ok(rows)
    }
}

/// Schema used by the integration tests and local development stores.
pub const VOYAGE_HISTORY_SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS voyage_history (
    data_source TEXT NOT NULL,
    scac TEXT NOT NULL,
    provider_voyage_id TEXT NOT NULL,
    vessel_name TEXT NOT NULL,
    vessel_imo TEXT NOT NULL,
    voyage_num TEXT NOT NULL,
    voyage_direction TEXT NOT NULL,
    service_code TEXT NOT NULL,
    port_code TEXT NOT NULL,
    port_name TEXT NOT NULL,
    port_event TEXT NOT NULL,
    event_time TEXT NOT NULL
)";

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with_rows(rows: &[(&str, &str, &str, &str, &str)]) -> SqliteVoyageStore {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::query(VOYAGE_HISTORY_SCHEMA).execute(&pool).await.unwrap();
        for (voyage, direction, event, port, time) in rows {
            sqlx::query(
                "INSERT INTO voyage_history VALUES ('HISTORY', 'CMDU', ?1, 'APL RAFFLES', \
                 '9839272', ?2, ?3, 'FAL1', ?4, ?4, ?5, ?6)",
            )
            .bind(format!("ID-{voyage}"))
            .bind(voyage)
            .bind(direction)
            .bind(port)
            .bind(event)
            .bind(time)
            .execute(&pool)
            .await
            .unwrap();
        }
        SqliteVoyageStore::new(pool)
    }

    fn query() -> VoyageQuery {
        VoyageQuery {
            scac: vec![Scac::CMDU],
            vessel_imo: "9839272".into(),
            voyage_num: None,
            start_date: None,
            date_range: None,
        }
    }

    #[tokio::test]
    async fn rows_come_back_sorted() {
        let store = store_with_rows(&[
            ("A2", "EBO", "UNL", "DEHAM", "2025-03-01T07:00:00"),
            ("A1", "WBO", "LOA", "SGSIN", "2025-02-01T10:00:00"),
            ("A1", "WBO", "UNL", "HKHKG", "2025-01-28T08:00:00"),
        ])
        .await;
        let rows = store.voyage_rows(Scac::CMDU, &query()).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].event_time, "2025-01-28T08:00:00");
        assert_eq!(rows[2].voyage_num, "A2");
    }

    #[tokio::test]
    async fn voyage_filter_narrows_results() {
        let store = store_with_rows(&[
            ("A1", "WBO", "LOA", "SGSIN", "2025-02-01T10:00:00"),
            ("A2", "EBO", "UNL", "DEHAM", "2025-03-01T07:00:00"),
        ])
        .await;
        let mut q = query();
        q.voyage_num = Some("A2".into());
        let rows = store.voyage_rows(Scac::CMDU, &q).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].voyage_num, "A2");
    }

    #[tokio::test]
    async fn date_window_filters_and_widens() {
        let store = store_with_rows(&[
            ("A1", "WBO", "LOA", "SGSIN", "2025-02-01T10:00:00"),
            ("A1", "WBO", "UNL", "HKHKG", "2024-06-01T08:00:00"),
        ])
        .await;
        let mut q = query();
        q.start_date = Some("2025-02-01".into());
        q.date_range = Some(5);
        let rows = store.voyage_rows(Scac::CMDU, &q).await.unwrap();
        // The 5-day range widens to the 20-back/150-forward minimums, which
        // still excludes the mid-2024 row.
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].event_time, "2025-02-01T10:00:00");
    }
}
