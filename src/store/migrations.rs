//! Schema for the formation desk database.
//!
//! Migrations are numbered and append-only; `_migrations` records which
//! ones a database has seen.

use libsql::Connection;

use crate::error::DatabaseError;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// Ordered by version. Never edit a shipped entry; append a new one.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "crm_schema",
        sql: r#"
            CREATE TABLE IF NOT EXISTS clients (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                phone TEXT,
                company TEXT,
                status TEXT NOT NULL DEFAULT 'active'
                    CHECK (status IN ('active', 'inactive', 'pending', 'completed', 'on_hold')),
                notes TEXT,
                assigned_to INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                metadata TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_clients_status ON clients(status);
            CREATE INDEX IF NOT EXISTS idx_clients_created ON clients(created_at);

            CREATE TABLE IF NOT EXISTS client_projects (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                client_id INTEGER NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                description TEXT,
                status TEXT NOT NULL DEFAULT 'not_started'
                    CHECK (status IN ('not_started', 'in_progress', 'review', 'completed', 'cancelled')),
                progress INTEGER NOT NULL DEFAULT 0 CHECK (progress BETWEEN 0 AND 100),
                start_date TEXT,
                end_date TEXT,
                estimated_hours INTEGER,
                actual_hours INTEGER NOT NULL DEFAULT 0,
                budget TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_client_projects_client ON client_projects(client_id);
            CREATE INDEX IF NOT EXISTS idx_client_projects_status ON client_projects(status);

            CREATE TABLE IF NOT EXISTS client_documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                client_id INTEGER NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
                project_id INTEGER REFERENCES client_projects(id) ON DELETE SET NULL,
                title TEXT NOT NULL,
                description TEXT,
                file_name TEXT NOT NULL,
                file_path TEXT NOT NULL,
                file_size INTEGER NOT NULL CHECK (file_size >= 0),
                mime_type TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending'
                    CHECK (status IN ('pending', 'uploaded', 'reviewed', 'approved', 'rejected')),
                uploaded_by INTEGER,
                reviewed_by INTEGER,
                review_notes TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_client_documents_client ON client_documents(client_id);
            CREATE INDEX IF NOT EXISTS idx_client_documents_status ON client_documents(status);

            CREATE TABLE IF NOT EXISTS progress_updates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                client_id INTEGER NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
                project_id INTEGER REFERENCES client_projects(id) ON DELETE SET NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                update_type TEXT NOT NULL,
                previous_status TEXT,
                new_status TEXT,
                hours_worked INTEGER NOT NULL DEFAULT 0,
                created_by INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                metadata TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_progress_updates_client ON progress_updates(client_id);
            CREATE INDEX IF NOT EXISTS idx_progress_updates_created ON progress_updates(created_at);

            CREATE TABLE IF NOT EXISTS client_communications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                client_id INTEGER NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
                project_id INTEGER REFERENCES client_projects(id) ON DELETE SET NULL,
                type TEXT NOT NULL,
                subject TEXT NOT NULL,
                content TEXT NOT NULL,
                direction TEXT NOT NULL,
                created_by INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                scheduled_for TEXT,
                completed_at TEXT,
                metadata TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_client_communications_client
                ON client_communications(client_id);
        "#,
    },
    Migration {
        version: 2,
        name: "onboarding_schema",
        sql: r#"
            CREATE TABLE IF NOT EXISTS onboarding_applications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER,
                session_id TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'not_started'
                    CHECK (status IN ('not_started', 'in_progress', 'completed', 'abandoned')),
                current_step INTEGER NOT NULL DEFAULT 1,
                total_steps INTEGER NOT NULL DEFAULT 4,
                first_name TEXT,
                last_name TEXT,
                email TEXT,
                phone TEXT,
                passport_number TEXT,
                passport_country TEXT,
                passport_expiry_date TEXT,
                passport_image_url TEXT,
                street_address TEXT,
                city TEXT,
                state TEXT,
                zip_code TEXT,
                country TEXT,
                business_name TEXT,
                business_type TEXT
                    CHECK (business_type IS NULL OR business_type IN
                        ('llc', 'corporation', 'partnership', 'sole_proprietorship', 'other')),
                business_description TEXT,
                business_industry TEXT,
                estimated_revenue TEXT,
                completed_steps TEXT NOT NULL DEFAULT '[]',
                validation_errors TEXT,
                auto_save_data TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                completed_at TEXT,
                last_saved_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_onboarding_applications_session
                ON onboarding_applications(session_id);

            CREATE TABLE IF NOT EXISTS onboarding_step_validations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                application_id INTEGER NOT NULL
                    REFERENCES onboarding_applications(id) ON DELETE CASCADE,
                step_number INTEGER NOT NULL,
                field_name TEXT NOT NULL,
                is_valid INTEGER NOT NULL DEFAULT 0,
                error_message TEXT,
                validated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_onboarding_step_validations_app
                ON onboarding_step_validations(application_id);

            CREATE TABLE IF NOT EXISTS onboarding_auto_saves (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                application_id INTEGER NOT NULL
                    REFERENCES onboarding_applications(id) ON DELETE CASCADE,
                step_number INTEGER NOT NULL,
                form_data TEXT NOT NULL,
                saved_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_onboarding_auto_saves_app
                ON onboarding_auto_saves(application_id);
        "#,
    },
    Migration {
        version: 3,
        name: "contact_leads",
        sql: r#"
            CREATE TABLE IF NOT EXISTS contact_leads (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                company TEXT,
                country TEXT,
                message TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_contact_leads_created ON contact_leads(created_at);
        "#,
    },
];

/// Bring the schema up to the latest version.
///
/// Each pending migration runs in its own transaction together with the
/// `_migrations` row that records it, so a failed step leaves no trace.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        );",
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("cannot create _migrations: {e}")))?;

    let applied = schema_version(conn).await?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > applied).collect();
    if pending.is_empty() {
        tracing::debug!(version = applied, "Schema is up to date");
        return Ok(());
    }

    for step in pending {
        apply(conn, step).await?;
    }

    let version = schema_version(conn).await?;
    tracing::info!(version, "Schema migrated");
    Ok(())
}

async fn apply(conn: &Connection, step: &Migration) -> Result<(), DatabaseError> {
    tracing::info!(version = step.version, name = step.name, "Applying schema migration");
    let failed = |e: libsql::Error| {
        DatabaseError::Migration(format!("V{} {} failed: {e}", step.version, step.name))
    };

    let tx = conn.transaction().await.map_err(failed)?;
    tx.execute_batch(step.sql).await.map_err(failed)?;
    tx.execute(
        "INSERT INTO _migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
        libsql::params![
            step.version,
            step.name,
            chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
        ],
    )
    .await
    .map_err(failed)?;
    tx.commit().await.map_err(failed)
}

/// Highest recorded version; 0 on a fresh database.
pub async fn schema_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let read_failed =
        |e: libsql::Error| DatabaseError::Migration(format!("cannot read schema version: {e}"));
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(read_failed)?;
    match rows.next().await.map_err(read_failed)? {
        Some(row) => row.get::<i64>(0).map_err(read_failed),
        None => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_conn() -> Connection {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .unwrap();
        db.connect().unwrap()
    }

    async fn table_exists(conn: &Connection, table: &str) -> bool {
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                libsql::params![table],
            )
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        row.get::<i64>(0).unwrap() == 1
    }

    #[tokio::test]
    async fn migrations_create_all_tables() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();

        for table in &[
            "_migrations",
            "clients",
            "client_projects",
            "client_documents",
            "progress_updates",
            "client_communications",
            "onboarding_applications",
            "onboarding_step_validations",
            "onboarding_auto_saves",
            "contact_leads",
        ] {
            assert!(table_exists(&conn, table).await, "Table '{}' should exist", table);
        }
    }

    #[tokio::test]
    async fn migration_future_is_send() {
        fn require_send<F: std::future::Future + Send>(fut: F) -> F {
            fut
        }
        let conn = test_conn().await;
        require_send(run_migrations(&conn)).await.unwrap();
        assert_eq!(schema_version(&conn).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();
        run_migrations(&conn).await.unwrap();

        assert_eq!(schema_version(&conn).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn version_tracking() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();

        let mut rows = conn
            .query("SELECT version, name FROM _migrations ORDER BY version", ())
            .await
            .unwrap();
        let mut applied = Vec::new();
        while let Some(row) = rows.next().await.unwrap() {
            let version: i64 = row.get(0).unwrap();
            let name: String = row.get(1).unwrap();
            applied.push((version, name));
        }
        assert_eq!(
            applied,
            vec![
                (1, "crm_schema".to_string()),
                (2, "onboarding_schema".to_string()),
                (3, "contact_leads".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn progress_check_constraint() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();
        conn.execute(
            "INSERT INTO clients (first_name, last_name, email, created_at, updated_at)
             VALUES ('A', 'B', 'a@b.co', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
            (),
        )
        .await
        .unwrap();
        let result = conn
            .execute(
                "INSERT INTO client_projects (client_id, title, progress, created_at, updated_at)
                 VALUES (1, 'LLC filing', 101, '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
                (),
            )
            .await;
        assert!(result.is_err());
    }
}
