//! Relational store
//!
//! Read-only batch lookups against the corpora database. Every query is a
//! single batched `IN`-style statement per kind; the request path never
//! issues per-row queries and never mutates.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{QueryBuilder, Row, SqlitePool};
use tracing::info;

use mishkat_config::RelationalSettings;

use crate::error::Result;

/// Read-only pool over the corpora database.
pub struct RelationalStore {
    pool: SqlitePool,
}

impl RelationalStore {
    /// Connect with the configured bounded pool.
    pub async fn connect(settings: &RelationalSettings) -> Result<Self> {
        info!("Connecting to relational store");
        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections)
            .connect(&settings.database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool (tests).
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch ayah texts for `(surah, ayah)` keys in one query.
    pub async fn ayahs_in(&self, keys: &[(u16, u16)]) -> Result<Vec<(u16, u16, String)>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
            "SELECT surah_number, ayah_number, text_uthmani FROM ayahs \
             WHERE (surah_number, ayah_number) IN ",
        );
        builder.push_tuples(keys, |mut b, (surah, ayah)| {
            b.push_bind(*surah as i64).push_bind(*ayah as i64);
        });

        let rows = builder.build().fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    row.get::<i64, _>(0) as u16,
                    row.get::<i64, _>(1) as u16,
                    row.get::<String, _>(2),
                )
            })
            .collect())
    }

    /// Fetch hadith texts for one collection in one query.
    pub async fn hadith_texts(
        &self,
        collection: &str,
        numbers: &[String],
    ) -> Result<Vec<(String, String)>> {
        if numbers.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
            "SELECT hadith_number, text_ar FROM hadiths WHERE collection_slug = ",
        );
        builder.push_bind(collection);
        builder.push(" AND hadith_number IN (");
        {
            let mut separated = builder.separated(", ");
            for number in numbers {
                separated.push_bind(number);
            }
        }
        builder.push(")");

        let rows = builder.build().fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.get::<String, _>(0), row.get::<String, _>(1)))
            .collect())
    }

    /// Fetch tafsir passages for `(source, surah, ayah)` triples in one query.
    pub async fn tafsir_texts(
        &self,
        triples: &[(String, u16, u16)],
    ) -> Result<Vec<(String, u16, u16, String)>> {
        if triples.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
            "SELECT source, surah_number, ayah_number, text FROM tafsirs \
             WHERE (source, surah_number, ayah_number) IN ",
        );
        builder.push_tuples(triples, |mut b, (source, surah, ayah)| {
            b.push_bind(source.clone())
                .push_bind(*surah as i64)
                .push_bind(*ayah as i64);
        });

        let rows = builder.build().fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    row.get::<String, _>(0),
                    row.get::<i64, _>(1) as u16,
                    row.get::<i64, _>(2) as u16,
                    row.get::<String, _>(3),
                )
            })
            .collect())
    }

    /// Fetch book pages for `(book_id, page)` keys in one query.
    pub async fn book_pages(&self, keys: &[(String, u32)]) -> Result<Vec<(String, u32, String)>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
            "SELECT book_id, page_number, content_plain FROM book_pages \
             WHERE (book_id, page_number) IN ",
        );
        builder.push_tuples(keys, |mut b, (book_id, page)| {
            b.push_bind(book_id.clone()).push_bind(*page as i64);
        });

        let rows = builder.build().fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    row.get::<String, _>(0),
                    row.get::<i64, _>(1) as u32,
                    row.get::<String, _>(2),
                )
            })
            .collect())
    }

    /// Fetch stored Quran translations for one edition, batched by key.
    pub async fn quran_translations(
        &self,
        keys: &[(u16, u16)],
        edition_code: &str,
    ) -> Result<Vec<(u16, u16, String)>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
            "SELECT surah_number, ayah_number, text FROM quran_translations WHERE edition_code = ",
        );
        builder.push_bind(edition_code);
        builder.push(" AND (surah_number, ayah_number) IN ");
        builder.push_tuples(keys, |mut b, (surah, ayah)| {
            b.push_bind(*surah as i64).push_bind(*ayah as i64);
        });

        let rows = builder.build().fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    row.get::<i64, _>(0) as u16,
                    row.get::<i64, _>(1) as u16,
                    row.get::<String, _>(2),
                )
            })
            .collect())
    }

    /// Fetch stored hadith translations for one edition, batched by key.
    pub async fn hadith_translations(
        &self,
        keys: &[(String, String)],
        edition_code: &str,
    ) -> Result<Vec<(String, String, String)>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
            "SELECT collection_slug, hadith_number, text FROM hadith_translations \
             WHERE edition_code = ",
        );
        builder.push_bind(edition_code);
        builder.push(" AND (collection_slug, hadith_number) IN ");
        builder.push_tuples(keys, |mut b, (collection, number)| {
            b.push_bind(collection.clone()).push_bind(number.clone());
        });

        let rows = builder.build().fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    row.get::<String, _>(0),
                    row.get::<String, _>(1),
                    row.get::<String, _>(2),
                )
            })
            .collect())
    }

    /// Reachability check for the doctor command.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
