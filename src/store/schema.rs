//! Ordered, idempotent schema migrations, applied inside a single
//! transaction and recorded in `schema_migrations`. Generalizes the
//! teacher's flat `SCHEMA_SQL` constant (see
//! `signals/db_storage.rs` in the retrieval pack) into a list of
//! numbered steps, since this store's schema is expected to grow.

use rusqlite::Connection;

struct Migration {
    id: i64,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        id: 1,
        sql: r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS companies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                raw_name TEXT,
                display_name TEXT,
                normalized_name TEXT,
                website_url TEXT,
                website_domain TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_companies_domain
                ON companies(website_domain) WHERE website_domain IS NOT NULL;
            CREATE UNIQUE INDEX IF NOT EXISTS idx_companies_normalized_name
                ON companies(normalized_name) WHERE website_domain IS NULL AND normalized_name IS NOT NULL;

            CREATE TABLE IF NOT EXISTS company_sources (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company_id INTEGER NOT NULL REFERENCES companies(id),
                provider TEXT NOT NULL,
                provider_company_id TEXT,
                provider_url TEXT,
                hidden INTEGER NOT NULL DEFAULT 0
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_company_sources_provider_id
                ON company_sources(provider, provider_company_id)
                WHERE provider_company_id IS NOT NULL;

            CREATE TABLE IF NOT EXISTS offers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company_id INTEGER NOT NULL REFERENCES companies(id),
                provider TEXT NOT NULL,
                provider_offer_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                min_requirements TEXT,
                desired_requirements TEXT,
                published_at TEXT,
                updated_at TEXT,
                created_at TEXT NOT NULL,
                application_count INTEGER,
                location TEXT,
                category TEXT,
                subcategory TEXT,
                contract_type TEXT,
                workday TEXT,
                experience TEXT,
                salary TEXT,
                content_fingerprint TEXT,
                canonical_offer_id INTEGER REFERENCES offers(id),
                repost_count INTEGER NOT NULL DEFAULT 0,
                last_seen_at TEXT
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_offers_provider_offer_id
                ON offers(provider, provider_offer_id);
            CREATE INDEX IF NOT EXISTS idx_offers_company
                ON offers(company_id);
            CREATE INDEX IF NOT EXISTS idx_offers_fingerprint
                ON offers(company_id, content_fingerprint)
                WHERE content_fingerprint IS NOT NULL AND canonical_offer_id IS NULL;

            CREATE TABLE IF NOT EXISTS matches (
                offer_id INTEGER PRIMARY KEY REFERENCES offers(id),
                score INTEGER NOT NULL,
                top_category_id TEXT,
                reasons_json TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS ingestion_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                provider TEXT NOT NULL,
                query_fingerprint TEXT,
                started_at TEXT NOT NULL,
                ended_at TEXT,
                pages_fetched INTEGER NOT NULL DEFAULT 0,
                offers_fetched INTEGER NOT NULL DEFAULT 0,
                requests_count INTEGER NOT NULL DEFAULT 0,
                http_429_count INTEGER NOT NULL DEFAULT 0,
                errors_count INTEGER NOT NULL DEFAULT 0,
                status TEXT
            );

            CREATE TABLE IF NOT EXISTS run_lock (
                name TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                acquired_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS feedback_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company_id INTEGER NOT NULL REFERENCES companies(id),
                value TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
        "#,
    },
    Migration {
        id: 2,
        sql: r#"
            ALTER TABLE companies ADD COLUMN unique_offer_count INTEGER NOT NULL DEFAULT 0;
            ALTER TABLE companies ADD COLUMN offer_count INTEGER NOT NULL DEFAULT 0;
            ALTER TABLE companies ADD COLUMN max_score INTEGER NOT NULL DEFAULT 0;
            ALTER TABLE companies ADD COLUMN top_offer_id INTEGER;
            ALTER TABLE companies ADD COLUMN top_category_id TEXT;
            ALTER TABLE companies ADD COLUMN strong_offer_count INTEGER NOT NULL DEFAULT 0;
            ALTER TABLE companies ADD COLUMN avg_strong_score REAL;
            ALTER TABLE companies ADD COLUMN category_max_scores_json TEXT;
            ALTER TABLE companies ADD COLUMN last_strong_at TEXT;
        "#,
    },
];

/// Apply every migration that hasn't run yet, in order, inside a
/// single transaction. Idempotent: re-running against an up-to-date
/// database is a no-op.
pub fn migrate(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            id INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );",
    )?;

    let tx = conn.transaction()?;
    for migration in MIGRATIONS {
        let already_applied: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM schema_migrations WHERE id = ?1)",
            [migration.id],
            |row| row.get(0),
        )?;
        if already_applied {
            continue;
        }
        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (id, applied_at) VALUES (?1, ?2)",
            rusqlite::params![migration.id, chrono::Utc::now().to_rfc3339()],
        )?;
    }
    tx.commit()
}
