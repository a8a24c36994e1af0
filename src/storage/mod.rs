use crate::models::{KeyFeatures, NewProduct, PricePoint, ProductImage, ProductRecord};
use anyhow::{Context, Result};
use chrono::{Duration, NaiveDateTime, SubsecRound, Utc};
use duckdb::{params, Connection, OptionalExt};
use std::path::Path;
use tracing::{debug, info, warn};

// ── Schema ────────────────────────────────────────────────────────────────────

const DDL: &str = r#"
CREATE SEQUENCE IF NOT EXISTS seq_stores START 1;
CREATE SEQUENCE IF NOT EXISTS seq_categories START 1;
CREATE SEQUENCE IF NOT EXISTS seq_products START 1;
CREATE SEQUENCE IF NOT EXISTS seq_product_images START 1;
CREATE SEQUENCE IF NOT EXISTS seq_product_prices START 1;
CREATE SEQUENCE IF NOT EXISTS seq_crawl_runs START 1;

CREATE TABLE IF NOT EXISTS stores (
    id          BIGINT  PRIMARY KEY DEFAULT nextval('seq_stores'),
    name        VARCHAR NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS categories (
    id          BIGINT  PRIMARY KEY DEFAULT nextval('seq_categories'),
    name        VARCHAR NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS products (
    id            BIGINT    PRIMARY KEY DEFAULT nextval('seq_products'),
    name          VARCHAR   NOT NULL,
    store_id      BIGINT    NOT NULL REFERENCES stores (id),
    category_id   BIGINT    NOT NULL REFERENCES categories (id),
    purchase_url  VARCHAR   NOT NULL,
    description   VARCHAR   NOT NULL DEFAULT '',
    -- JSON object of enrichment attributes, frozen at creation
    key_features  VARCHAR   NOT NULL DEFAULT '{}',
    is_active     BOOLEAN   NOT NULL DEFAULT TRUE,
    created_at    TIMESTAMP NOT NULL,
    UNIQUE (name, purchase_url)
);

CREATE TABLE IF NOT EXISTS product_images (
    id          BIGINT  PRIMARY KEY DEFAULT nextval('seq_product_images'),
    product_id  BIGINT  NOT NULL REFERENCES products (id),
    url         VARCHAR NOT NULL,
    is_main     BOOLEAN NOT NULL DEFAULT FALSE,
    UNIQUE (product_id, url)
);

-- Append-only
CREATE TABLE IF NOT EXISTS product_prices (
    id          BIGINT    PRIMARY KEY DEFAULT nextval('seq_product_prices'),
    product_id  BIGINT    NOT NULL REFERENCES products (id),
    store_id    BIGINT    NOT NULL REFERENCES stores (id),
    price       DOUBLE    NOT NULL,
    crawled_at  TIMESTAMP NOT NULL
);

CREATE TABLE IF NOT EXISTS crawl_runs (
    id                BIGINT    PRIMARY KEY DEFAULT nextval('seq_crawl_runs'),
    started_at        TIMESTAMP NOT NULL,
    finished_at       TIMESTAMP,
    status            VARCHAR   NOT NULL DEFAULT 'running',
    passes            INTEGER   DEFAULT 0,
    products_saved    INTEGER   DEFAULT 0,
    prices_recorded   INTEGER   DEFAULT 0,
    error_msg         VARCHAR
);

CREATE TABLE IF NOT EXISTS schema_version (
    version     INTEGER PRIMARY KEY,
    applied_at  TIMESTAMP NOT NULL
);
"#;

const INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_prices_product ON product_prices (product_id, crawled_at);
CREATE INDEX IF NOT EXISTS idx_products_store ON products (store_id);
CREATE INDEX IF NOT EXISTS idx_images_product ON product_images (product_id);
"#;

/// Name → id registries. A closed set so table names never come from input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceTable {
    Stores,
    Categories,
}

impl ReferenceTable {
    fn table(self) -> &'static str {
        match self {
            ReferenceTable::Stores => "stores",
            ReferenceTable::Categories => "categories",
        }
    }
}

/// Row totals for the `stats` command.
#[derive(Debug, Default, Clone, Copy)]
pub struct TableCounts {
    pub stores: i64,
    pub categories: i64,
    pub products: i64,
    pub images: i64,
    pub prices: i64,
}

// ── Repository ────────────────────────────────────────────────────────────────

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create dir {:?}", parent))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open DuckDB at {:?}", path))?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self { conn: Connection::open_in_memory()? })
    }

    pub fn run_migrations(&self) -> Result<()> {
        info!("Running migrations…");
        self.conn.execute_batch(DDL).context("DDL failed")?;
        self.conn.execute_batch(INDEXES).context("Index creation failed")?;
        self.conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, ?)",
            params![Utc::now().naive_utc()],
        )?;
        info!("Migrations done.");
        Ok(())
    }

    // ── Reference tables ──────────────────────────────────────────────────────

    /// Id for `name`, inserting it first if needed. The UNIQUE constraint
    /// makes concurrent callers converge on one row.
    pub fn get_or_create_reference(&self, table: ReferenceTable, name: &str) -> Result<i64> {
        let t = table.table();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            &format!("INSERT INTO {t} (name) VALUES (?) ON CONFLICT (name) DO NOTHING"),
            params![name],
        )
        .with_context(|| format!("insert {} {:?}", t, name))?;
        let id: i64 = tx
            .query_row(&format!("SELECT id FROM {t} WHERE name = ?"), params![name], |r| r.get(0))
            .with_context(|| format!("lookup {} {:?}", t, name))?;
        tx.commit()?;
        Ok(id)
    }

    // ── Products ──────────────────────────────────────────────────────────────

    /// Id of the (name, purchase_url) product, created if absent. An existing
    /// row is returned untouched: its description and key_features stay as
    /// they were first written.
    pub fn upsert_product(&self, p: &NewProduct<'_>) -> Result<i64> {
        let features = serde_json::to_string(p.key_features)?;
        let tx = self.conn.unchecked_transaction()?;

        let inserted = tx
            .execute(
                r#"INSERT INTO products
                       (name, store_id, category_id, purchase_url, description,
                        key_features, is_active, created_at)
                   VALUES (?, ?, ?, ?, ?, ?, TRUE, ?)
                   ON CONFLICT (name, purchase_url) DO NOTHING"#,
                params![
                    p.name,
                    p.store_id,
                    p.category_id,
                    p.purchase_url,
                    p.description,
                    features,
                    Utc::now().naive_utc(),
                ],
            )
            .with_context(|| format!("insert product {:?}", p.name))?;

        let id: i64 = tx.query_row(
            "SELECT id FROM products WHERE name = ? AND purchase_url = ?",
            params![p.name, p.purchase_url],
            |r| r.get(0),
        )?;
        tx.commit()?;

        if inserted > 0 {
            debug!("product #{} created: {}", id, p.name);
        }
        Ok(id)
    }

    pub fn find_product(&self, id: i64) -> Result<Option<ProductRecord>> {
        let row = self
            .conn
            .query_row(
                r#"SELECT id, name, store_id, category_id, purchase_url, description,
                          key_features, is_active, created_at
                   FROM products WHERE id = ?"#,
                params![id],
                |r| {
                    Ok((
                        ProductRecord {
                            id: r.get(0)?,
                            name: r.get(1)?,
                            store_id: r.get(2)?,
                            category_id: r.get(3)?,
                            purchase_url: r.get(4)?,
                            description: r.get(5)?,
                            key_features: KeyFeatures::new(),
                            is_active: r.get(7)?,
                            created_at: r.get(8)?,
                        },
                        r.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()?;

        let Some((mut record, features)) = row else { return Ok(None) };
        record.key_features = serde_json::from_str(&features).unwrap_or_else(|e| {
            warn!("product #{}: unreadable key_features: {}", id, e);
            KeyFeatures::new()
        });
        Ok(Some(record))
    }

    // ── Images ────────────────────────────────────────────────────────────────

    /// Adds `url` to the product's images unless already there. The first
    /// image a product gets is its main one. Returns whether a row was added.
    pub fn upsert_image(&self, product_id: i64, url: &str) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        let existing: i64 = tx.query_row(
            "SELECT COUNT(*) FROM product_images WHERE product_id = ?",
            params![product_id],
            |r| r.get(0),
        )?;
        let inserted = tx
            .execute(
                r#"INSERT INTO product_images (product_id, url, is_main)
                   VALUES (?, ?, ?)
                   ON CONFLICT (product_id, url) DO NOTHING"#,
                params![product_id, url, existing == 0],
            )
            .with_context(|| format!("insert image for product #{}", product_id))?;
        tx.commit()?;
        Ok(inserted > 0)
    }

    pub fn images_for(&self, product_id: i64) -> Result<Vec<ProductImage>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, product_id, url, is_main FROM product_images WHERE product_id = ? ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![product_id], |r| {
                Ok(ProductImage {
                    id: r.get(0)?,
                    product_id: r.get(1)?,
                    url: r.get(2)?,
                    is_main: r.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Price history ─────────────────────────────────────────────────────────

    /// Always a new row. `crawled_at` is kept strictly increasing per product
    /// even when two points land in the same microsecond.
    pub fn append_price_point(&self, product_id: i64, store_id: i64, price: f64) -> Result<i64> {
        let tx = self.conn.unchecked_transaction()?;
        let latest: Option<NaiveDateTime> = tx.query_row(
            "SELECT MAX(crawled_at) FROM product_prices WHERE product_id = ?",
            params![product_id],
            |r| r.get(0),
        )?;

        // TIMESTAMP holds microseconds
        let mut crawled_at = Utc::now().naive_utc().trunc_subsecs(6);
        if let Some(latest) = latest.filter(|l| *l >= crawled_at) {
            crawled_at = latest + Duration::microseconds(1);
        }

        let id: i64 = tx
            .query_row(
                r#"INSERT INTO product_prices (product_id, store_id, price, crawled_at)
                   VALUES (?, ?, ?, ?)
                   RETURNING id"#,
                params![product_id, store_id, price, crawled_at],
                |r| r.get(0),
            )
            .with_context(|| format!("insert price for product #{}", product_id))?;
        tx.commit()?;
        Ok(id)
    }

    pub fn price_history(&self, product_id: i64) -> Result<Vec<PricePoint>> {
        let mut stmt = self.conn.prepare(
            r#"SELECT id, product_id, store_id, price, crawled_at
               FROM product_prices WHERE product_id = ?
               ORDER BY crawled_at, id"#,
        )?;
        let rows = stmt
            .query_map(params![product_id], |r| {
                Ok(PricePoint {
                    id: r.get(0)?,
                    product_id: r.get(1)?,
                    store_id: r.get(2)?,
                    price: r.get(3)?,
                    crawled_at: r.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Stats ─────────────────────────────────────────────────────────────────

    fn count(&self, table: &str) -> Result<i64> {
        let mut s = self.conn.prepare(&format!("SELECT COUNT(*) FROM {table}"))?;
        Ok(s.query_row([], |r| r.get(0))?)
    }

    pub fn table_counts(&self) -> Result<TableCounts> {
        Ok(TableCounts {
            stores: self.count("stores")?,
            categories: self.count("categories")?,
            products: self.count("products")?,
            images: self.count("product_images")?,
            prices: self.count("product_prices")?,
        })
    }

    pub fn crawl_range(&self) -> Result<(Option<NaiveDateTime>, Option<NaiveDateTime>)> {
        let mut s = self
            .conn
            .prepare("SELECT MIN(crawled_at), MAX(crawled_at) FROM product_prices")?;
        Ok(s.query_row([], |r| Ok((r.get(0)?, r.get(1)?)))?)
    }

    // ── Crawl run log ─────────────────────────────────────────────────────────

    pub fn begin_crawl_run(&self) -> Result<i64> {
        let id: i64 = self.conn.query_row(
            "INSERT INTO crawl_runs (started_at, status) VALUES (?, 'running') RETURNING id",
            params![Utc::now().naive_utc()],
            |r| r.get(0),
        )?;
        Ok(id)
    }

    pub fn finish_crawl_run(
        &self,
        run_id: i64,
        passes: usize,
        products: usize,
        prices: usize,
        error: Option<&str>,
    ) -> Result<()> {
        self.conn.execute(
            r#"UPDATE crawl_runs SET
               finished_at = ?, status = ?,
               passes = ?, products_saved = ?, prices_recorded = ?, error_msg = ?
               WHERE id = ?"#,
            params![
                Utc::now().naive_utc(),
                if error.is_none() { "success" } else { "error" },
                passes as i64,
                products as i64,
                prices as i64,
                error,
                run_id,
            ],
        )?;
        Ok(())
    }

    /// Id, start time and status of the most recent run.
    pub fn last_crawl_run(&self) -> Result<Option<(i64, NaiveDateTime, String)>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, started_at, status FROM crawl_runs ORDER BY id DESC LIMIT 1",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()?)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
