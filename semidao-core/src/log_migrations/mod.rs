//! Log database migrations - embedded SQL files
//!
//! Kept separate from the bill database so `logs.duckdb` can be cleared
//! without touching stored bills.

/// All log migrations, embedded at compile time.
/// Format: (filename, sql_content)
pub const LOG_MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    (
        "001_initial_schema.sql",
        include_str!("001_initial_schema.sql"),
    ),
];
