//! Application state for the intake API

use anyhow::Result;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::PathBuf;

pub struct AppState {
    pub db: SqlitePool,
    /// Directory holding fillable templates named
    /// `{form_code}_{tax_year}_fillable.pdf`.
    pub template_dir: PathBuf,
}

impl AppState {
    pub async fn new() -> Result<Self> {
        let db_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:intake.db?mode=rwc".to_string());
        let template_dir = std::env::var("TEMPLATE_DIR").unwrap_or_else(|_| "templates".to_string());

        Self::with_options(&db_url, template_dir.into()).await
    }

    pub async fn with_options(db_url: &str, template_dir: PathBuf) -> Result<Self> {
        tracing::info!("Connecting to database: {}", db_url);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?;

        Self::run_migrations(&pool).await?;

        Ok(Self {
            db: pool,
            template_dir,
        })
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS filings (
                id TEXT PRIMARY KEY,
                client_name TEXT NOT NULL,
                form_code TEXT NOT NULL,
                tax_year INTEGER NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
        )
        .execute(pool)
        .await?;

        // Populated by the external sheet-sync pipeline; read-only here.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS form_fields (
                form_code TEXT NOT NULL,
                field_key TEXT NOT NULL,
                label TEXT NOT NULL,
                help_text TEXT,
                field_type TEXT,
                input_type TEXT,
                required INTEGER NOT NULL DEFAULT 0,
                section TEXT,
                field_order INTEGER,
                audience TEXT,
                is_calculated INTEGER NOT NULL DEFAULT 0,
                calculation TEXT,
                options_json TEXT,
                PRIMARY KEY (form_code, field_key)
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS form_answers (
                filing_id TEXT NOT NULL,
                field_key TEXT NOT NULL,
                value_json TEXT NOT NULL,
                source TEXT NOT NULL DEFAULT 'lawyer',
                updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (filing_id, field_key)
            )
            "#,
        )
        .execute(pool)
        .await?;

        // Also sync-owned: one row per (field option, PDF widget).
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pdf_field_mappings (
                form_code TEXT NOT NULL,
                tax_year INTEGER NOT NULL,
                field_key TEXT NOT NULL,
                pdf_field_name TEXT NOT NULL,
                format TEXT,
                constant_value TEXT,
                PRIMARY KEY (form_code, tax_year, pdf_field_name)
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_form_answers_filing ON form_answers(filing_id)
            "#,
        )
        .execute(pool)
        .await?;

        tracing::info!("Migrations complete");
        Ok(())
    }
}
