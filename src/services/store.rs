use crate::error::Result;
use crate::models::{
    BucketStat, DailyBreadthStats, DistributionSnapshot, HighRiseStock, Side, UnifiedSnapshot,
};
use sqlx::{sqlite::SqliteConnectOptions, Row, SqlitePool};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// SQLite-backed snapshot cache. One record set per `(date, kind)`;
/// rewriting the same date replaces the previous set atomically.
#[derive(Debug)]
pub struct SnapshotStore {
    pool: SqlitePool,
}

impl SnapshotStore {
    pub async fn new(database_path: PathBuf) -> Result<Self> {
        info!("Initializing snapshot database at: {:?}", database_path);

        if let Some(parent) = database_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let connect_options = SqliteConnectOptions::new()
            .filename(&database_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePool::connect_with(connect_options).await?;

        let store = Self { pool };
        store.initialize_schema().await?;
        Ok(store)
    }

    async fn initialize_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS market_stats (
                date TEXT PRIMARY KEY,
                total INTEGER NOT NULL,
                rise INTEGER NOT NULL,
                fall INTEGER NOT NULL,
                flat INTEGER NOT NULL,
                rise_ratio REAL NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rise_fall_distribution (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                side TEXT NOT NULL,
                label TEXT NOT NULL,
                count INTEGER NOT NULL,
                percentage REAL NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS high_rise_stocks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                code TEXT NOT NULL,
                name TEXT NOT NULL,
                current_price REAL NOT NULL,
                pct_chg REAL NOT NULL,
                is_3y_high INTEGER NOT NULL,
                is_all_time_high INTEGER NOT NULL,
                max_3y REAL NOT NULL,
                max_all REAL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS unified_snapshots (
                date TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        let indexes = [
            "CREATE INDEX IF NOT EXISTS idx_distribution_date ON rise_fall_distribution(date)",
            "CREATE INDEX IF NOT EXISTS idx_high_rise_date ON high_rise_stocks(date)",
        ];
        for index in indexes {
            sqlx::query(index).execute(&self.pool).await?;
        }

        Ok(())
    }

    pub async fn upsert_breadth(&self, stats: &DailyBreadthStats) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO market_stats (date, total, rise, fall, flat, rise_ratio)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&stats.date)
        .bind(stats.total)
        .bind(stats.rise)
        .bind(stats.fall)
        .bind(stats.flat)
        .bind(stats.rise_ratio)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn latest_breadth(&self) -> Result<Option<DailyBreadthStats>> {
        let row = sqlx::query(
            "SELECT date, total, rise, fall, flat, rise_ratio FROM market_stats ORDER BY date DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(row) => Some(DailyBreadthStats {
                date: row.try_get("date")?,
                total: row.try_get("total")?,
                rise: row.try_get("rise")?,
                fall: row.try_get("fall")?,
                flat: row.try_get("flat")?,
                rise_ratio: row.try_get("rise_ratio")?,
            }),
            None => None,
        })
    }

    /// Replace both sides of a date's distribution in one transaction.
    /// Insertion order preserves band order; reads rely on it.
    pub async fn replace_distribution(
        &self,
        date: &str,
        rise: &[BucketStat],
        fall: &[BucketStat],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM rise_fall_distribution WHERE date = ?1")
            .bind(date)
            .execute(&mut *tx)
            .await?;

        for (side, buckets) in [(Side::Rise, rise), (Side::Fall, fall)] {
            for bucket in buckets {
                sqlx::query(
                    r#"
                    INSERT INTO rise_fall_distribution (date, side, label, count, percentage)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
                )
                .bind(date)
                .bind(side.as_str())
                .bind(&bucket.label)
                .bind(bucket.count)
                .bind(bucket.percentage)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn latest_distribution(&self) -> Result<Option<DistributionSnapshot>> {
        let date: Option<String> =
            sqlx::query_scalar("SELECT MAX(date) FROM rise_fall_distribution")
                .fetch_one(&self.pool)
                .await?;
        let Some(date) = date else {
            return Ok(None);
        };

        let rows = sqlx::query(
            "SELECT side, label, count, percentage FROM rise_fall_distribution WHERE date = ?1 ORDER BY id",
        )
        .bind(&date)
        .fetch_all(&self.pool)
        .await?;

        let mut rise = Vec::new();
        let mut fall = Vec::new();
        for row in rows {
            let side: String = row.try_get("side")?;
            let bucket = BucketStat {
                label: row.try_get("label")?,
                count: row.try_get("count")?,
                percentage: row.try_get("percentage")?,
            };
            match Side::from_str(&side) {
                Some(Side::Rise) => rise.push(bucket),
                Some(Side::Fall) => fall.push(bucket),
                None => {}
            }
        }

        Ok(Some(DistributionSnapshot { date, rise, fall }))
    }

    pub async fn replace_high_rise(&self, date: &str, stocks: &[HighRiseStock]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM high_rise_stocks WHERE date = ?1")
            .bind(date)
            .execute(&mut *tx)
            .await?;

        for stock in stocks {
            sqlx::query(
                r#"
                INSERT INTO high_rise_stocks
                    (date, code, name, current_price, pct_chg, is_3y_high, is_all_time_high, max_3y, max_all)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(date)
            .bind(&stock.code)
            .bind(&stock.name)
            .bind(stock.current_price)
            .bind(stock.pct_chg)
            .bind(stock.is_3y_high)
            .bind(stock.is_all_time_high)
            .bind(stock.max_3y)
            .bind(stock.max_all)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn latest_high_rise(&self) -> Result<Option<(String, Vec<HighRiseStock>)>> {
        let date: Option<String> = sqlx::query_scalar("SELECT MAX(date) FROM high_rise_stocks")
            .fetch_one(&self.pool)
            .await?;
        let Some(date) = date else {
            return Ok(None);
        };

        let rows = sqlx::query(
            r#"
            SELECT code, name, current_price, pct_chg, is_3y_high, is_all_time_high, max_3y, max_all
            FROM high_rise_stocks WHERE date = ?1 ORDER BY pct_chg DESC
            "#,
        )
        .bind(&date)
        .fetch_all(&self.pool)
        .await?;

        let mut stocks = Vec::with_capacity(rows.len());
        for row in rows {
            stocks.push(HighRiseStock {
                code: row.try_get("code")?,
                name: row.try_get("name")?,
                current_price: row.try_get("current_price")?,
                pct_chg: row.try_get("pct_chg")?,
                is_3y_high: row.try_get("is_3y_high")?,
                is_all_time_high: row.try_get("is_all_time_high")?,
                max_3y: row.try_get("max_3y")?,
                max_all: row.try_get("max_all")?,
            });
        }

        Ok(Some((date, stocks)))
    }

    pub async fn upsert_unified(&self, snapshot: &UnifiedSnapshot) -> Result<()> {
        let payload = serde_json::to_string(snapshot)?;
        sqlx::query("INSERT OR REPLACE INTO unified_snapshots (date, payload) VALUES (?1, ?2)")
            .bind(&snapshot.date)
            .bind(payload)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn latest_unified(&self) -> Result<Option<UnifiedSnapshot>> {
        let payload: Option<String> = sqlx::query_scalar(
            "SELECT payload FROM unified_snapshots ORDER BY date DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(match payload {
            Some(payload) => Some(serde_json::from_str(&payload)?),
            None => None,
        })
    }
}
