/// Embedded schema migrations
///
/// Migrations live in `proptrack-shared/migrations/` and are compiled into
/// the binary with `sqlx::migrate!`. The seed migration installs the
/// capability catalog and the starter plan, so a freshly migrated database
/// can create orgs straight away.

use sqlx::{migrate::MigrateDatabase, postgres::PgPool, Postgres};
use tracing::{debug, info, warn};

/// Applies every pending migration
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Running database migrations");

    match sqlx::migrate!("./migrations").run(pool).await {
        Ok(()) => {
            info!("Database schema is up to date");
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "Migration failed");
            Err(e)
        }
    }
}

/// Creates the database if it is missing (development and tests)
pub async fn ensure_database_exists(database_url: &str) -> Result<(), sqlx::Error> {
    if Postgres::database_exists(database_url).await? {
        debug!("Database already exists");
    } else {
        info!("Creating database");
        Postgres::create_database(database_url).await?;
    }

    Ok(())
}
