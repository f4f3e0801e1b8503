use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use tally_core::record::PLACEHOLDER_CATEGORIES;
use tally_core::{LedgerStore, ReadFilter, Record, StoreError};

pub type DbPool = Pool<Sqlite>;

/// SQLite-backed ledger store. One `records` table holds every ledger's rows;
/// ledgers are registered in a `ledgers` table on first insert. Amounts are
/// stored as canonical decimal strings since SQLite has no decimal type.
pub struct SqliteLedgerStore {
    pool: DbPool,
}

impl SqliteLedgerStore {
    pub async fn open(path: &Path) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA busy_timeout = 5000")
            .execute(&pool)
            .await?;

        run_migrations(&pool).await?;

        Ok(SqliteLedgerStore { pool })
    }

    pub async fn open_in_memory() -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        run_migrations(&pool).await?;
        Ok(SqliteLedgerStore { pool })
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn ledger_exists(&self, name: &str) -> Result<bool, StoreError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT name FROM ledgers WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(row.is_some())
    }
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ledgers (
            name TEXT PRIMARY KEY,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ledger TEXT NOT NULL REFERENCES ledgers(name) ON DELETE CASCADE,
            date TEXT,
            description TEXT NOT NULL,
            amount TEXT NOT NULL,
            balance TEXT,
            category TEXT,
            responsible TEXT,
            bank TEXT,
            comment TEXT,
            owner TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_ledger ON records(ledger)")
        .execute(pool)
        .await?;

    Ok(())
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(anyhow::Error::new(e))
}

type RecordRow = (
    i64,            // id
    Option<String>, // date
    String,         // description
    String,         // amount
    Option<String>, // balance
    Option<String>, // category
    Option<String>, // responsible
    Option<String>, // bank
    Option<String>, // comment
    Option<String>, // owner
);

fn record_from_row(ledger: &str, row: RecordRow) -> Result<Record, StoreError> {
    let (id, date, description, amount, balance, category, responsible, bank, comment, owner) = row;

    // A malformed date weakens the row's match evidence, never the whole read.
    let date = date.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok());

    let amount = Decimal::from_str(&amount)
        .with_context(|| format!("bad amount '{amount}' in ledger '{ledger}'"))?;
    let balance = balance
        .map(|s| {
            Decimal::from_str(&s).with_context(|| format!("bad balance '{s}' in ledger '{ledger}'"))
        })
        .transpose()?;

    Ok(Record {
        id: Some(id),
        date,
        description,
        amount,
        balance,
        category,
        responsible,
        bank,
        comment,
        owner,
    })
}

impl LedgerStore for SqliteLedgerStore {
    async fn list_related_ledgers(&self) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT name FROM ledgers ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    async fn read_ledger(&self, name: &str, filter: ReadFilter)
        -> Result<Vec<Record>, StoreError> {
        if !self.ledger_exists(name).await? {
            return Err(StoreError::LedgerNotFound(name.to_string()));
        }

        let mut sql = String::from(
            "SELECT id, date, description, amount, balance, category, responsible, bank, \
             comment, owner FROM records WHERE ledger = ?",
        );
        if filter == ReadFilter::Categorized {
            sql.push_str(" AND category IS NOT NULL AND TRIM(category) <> ''");
            for _ in PLACEHOLDER_CATEGORIES {
                sql.push_str(" AND TRIM(category) <> ?");
            }
        }
        sql.push_str(" ORDER BY date ASC, id ASC");

        let mut query = sqlx::query_as::<_, RecordRow>(&sql).bind(name);
        if filter == ReadFilter::Categorized {
            for placeholder in PLACEHOLDER_CATEGORIES {
                query = query.bind(*placeholder);
            }
        }

        let rows = query.fetch_all(&self.pool).await.map_err(backend)?;
        rows.into_iter().map(|row| record_from_row(name, row)).collect()
    }

    async fn insert_records(&self, name: &str, records: &[Record])
        -> Result<Vec<i64>, StoreError> {
        sqlx::query("INSERT OR IGNORE INTO ledgers (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            let row: (i64,) = sqlx::query_as(
                "INSERT INTO records (ledger, date, description, amount, balance, category, \
                 responsible, bank, comment, owner) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
                 RETURNING id",
            )
            .bind(name)
            .bind(record.date.map(|d| d.to_string()))
            .bind(&record.description)
            .bind(record.amount.to_string())
            .bind(record.balance.map(|b| b.to_string()))
            .bind(&record.category)
            .bind(&record.responsible)
            .bind(&record.bank)
            .bind(&record.comment)
            .bind(&record.owner)
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
            ids.push(row.0);
        }

        Ok(ids)
    }

    async fn update_category(
        &self,
        name: &str,
        record_id: i64,
        category: &str,
    ) -> Result<(), StoreError> {
        if !self.ledger_exists(name).await? {
            return Err(StoreError::LedgerNotFound(name.to_string()));
        }

        let result = sqlx::query("UPDATE records SET category = ? WHERE ledger = ? AND id = ?")
            .bind(category)
            .bind(name)
            .bind(record_id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RecordNotFound {
                ledger: name.to_string(),
                record_id,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(date: Option<(i32, u32, u32)>, desc: &str, amount_cents: i64) -> Record {
        Record::new(
            date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            desc,
            Decimal::new(amount_cents, 2),
        )
    }

    fn categorized(date: (i32, u32, u32), desc: &str, amount_cents: i64, category: &str) -> Record {
        let mut r = rec(Some(date), desc, amount_cents);
        r.category = Some(category.to_string());
        r
    }

    #[tokio::test]
    async fn insert_and_read_round_trip_ordered_by_date() {
        let store = SqliteLedgerStore::open_in_memory().await.unwrap();
        let ids = store
            .insert_records(
                "AM_202505",
                &[
                    rec(Some((2025, 5, 28)), "SPOTIFY AB", -119_00),
                    rec(Some((2025, 5, 2)), "HYRA MAJ", -8_500_00),
                ],
            )
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);

        let records = store.read_ledger("AM_202505", ReadFilter::All).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].description, "HYRA MAJ");
        assert_eq!(records[1].description, "SPOTIFY AB");
        assert_eq!(records[1].amount, Decimal::new(-119_00, 2));
        assert_eq!(records[1].id, Some(ids[0]));
    }

    #[tokio::test]
    async fn read_missing_ledger_is_not_found() {
        let store = SqliteLedgerStore::open_in_memory().await.unwrap();
        let result = store.read_ledger("AM_209901", ReadFilter::All).await;
        assert!(matches!(result, Err(StoreError::LedgerNotFound(name)) if name == "AM_209901"));
    }

    #[tokio::test]
    async fn categorized_filter_excludes_placeholders_and_blanks() {
        let store = SqliteLedgerStore::open_in_memory().await.unwrap();
        store
            .insert_records(
                "AM_202504",
                &[
                    categorized((2025, 4, 28), "Spotify AB", -119_00, "Entertainment"),
                    categorized((2025, 4, 20), "OKQ8", -700_00, "Unknown"),
                    categorized((2025, 4, 21), "PRESSBYRAN", -45_00, "Uncategorized"),
                    categorized((2025, 4, 22), "SWISH", -200_00, "  "),
                    rec(Some((2025, 4, 2)), "HYRA APRIL", -8_500_00),
                ],
            )
            .await
            .unwrap();

        let records = store
            .read_ledger("AM_202504", ReadFilter::Categorized)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].description, "Spotify AB");
    }

    #[tokio::test]
    async fn records_without_dates_round_trip_as_none() {
        let store = SqliteLedgerStore::open_in_memory().await.unwrap();
        store
            .insert_records("AM_202505", &[rec(None, "OKAND RAD", -10_00)])
            .await
            .unwrap();
        let records = store.read_ledger("AM_202505", ReadFilter::All).await.unwrap();
        assert_eq!(records[0].date, None);
    }

    #[tokio::test]
    async fn list_related_ledgers_returns_sorted_names() {
        let store = SqliteLedgerStore::open_in_memory().await.unwrap();
        store
            .insert_records("AM_202505", &[rec(Some((2025, 5, 2)), "A", -1_00)])
            .await
            .unwrap();
        store
            .insert_records("AM_202504", &[rec(Some((2025, 4, 2)), "B", -2_00)])
            .await
            .unwrap();

        let names = store.list_related_ledgers().await.unwrap();
        assert_eq!(names, vec!["AM_202504", "AM_202505"]);
    }

    #[tokio::test]
    async fn update_category_overwrites_in_place() {
        let store = SqliteLedgerStore::open_in_memory().await.unwrap();
        let ids = store
            .insert_records("AM_202505", &[rec(Some((2025, 5, 28)), "SPOTIFY AB", -119_00)])
            .await
            .unwrap();

        store
            .update_category("AM_202505", ids[0], "Entertainment")
            .await
            .unwrap();
        let records = store.read_ledger("AM_202505", ReadFilter::All).await.unwrap();
        assert_eq!(records[0].category.as_deref(), Some("Entertainment"));

        // Re-applying the same update is harmless.
        store
            .update_category("AM_202505", ids[0], "Entertainment")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn update_category_for_missing_record_fails() {
        let store = SqliteLedgerStore::open_in_memory().await.unwrap();
        store
            .insert_records("AM_202505", &[rec(Some((2025, 5, 2)), "A", -1_00)])
            .await
            .unwrap();

        let result = store.update_category("AM_202505", 999, "Misc").await;
        assert!(matches!(
            result,
            Err(StoreError::RecordNotFound { record_id: 999, .. })
        ));
    }
}
