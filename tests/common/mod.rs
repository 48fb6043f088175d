// Shared helpers for the integration suite.
//
// Connection parameters come from the TEST_DB_* environment variables,
// read once per test; tests that touch the shared fixture table serialize
// themselves through db_lock().

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, OnceLock};

use rust_mysql::{
    ColumnConstraint, ColumnDefinition, DataSet, DataType, DbConfig, DbConnection, Schema,
    TableDefinition,
};

pub const FIXTURE_TABLE: &str = "db_functions_test";

/// Serialize tests that share the fixture table
pub fn db_lock() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

/// Connection parameters for the test server, or `None` when no server is
/// configured (the caller should skip).
pub fn test_config() -> Option<DbConfig> {
    init_tracing();
    if std::env::var("TEST_DB_HOST").is_err() {
        tracing::warn!("TEST_DB_HOST is not set, skipping database test");
        return None;
    }
    Some(DbConfig::from_env_with_prefix("TEST_DB").expect("invalid TEST_DB_* configuration"))
}

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

pub fn dataset() -> anyhow::Result<DataSet> {
    Ok(DataSet::from_file(fixture_path("db_functions.xml"))?)
}

/// Same data as `dataset()` with one extra row in the table
pub fn extra_dataset() -> anyhow::Result<DataSet> {
    Ok(DataSet::from_file(fixture_path("db_functions_extra.xml"))?)
}

fn fixture_schema() -> Schema {
    Schema::new().add_table(
        TableDefinition::new(FIXTURE_TABLE)
            .add_column(
                ColumnDefinition::new("a_integer", DataType::Int)
                    .with_constraint(ColumnConstraint::NotNull),
            )
            .add_column(ColumnDefinition::new("a_string", DataType::VarChar(255)))
            .add_column(ColumnDefinition::new("a_nullable", DataType::VarChar(255)))
            .with_primary_key(&["a_integer"]),
    )
}

/// Recreate the fixture table and clean-insert the dataset
pub fn prepare(conn: &mut DbConnection, dataset: &DataSet) -> anyhow::Result<()> {
    fixture_schema().apply(conn)?;
    dataset.load_table(conn, FIXTURE_TABLE)?;
    Ok(())
}
