use rusqlite::{Connection, Result};

/// Initialise store tables. Safe to call on every startup (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    create_event_log_table(conn)?;
    create_keywords_table(conn)?;
    Ok(())
}

/// Append-only chat log. `(millis, seq)` is the event id; rows are never
/// updated or deleted.
fn create_event_log_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS event_log (
            millis      INTEGER NOT NULL,
            seq         INTEGER NOT NULL,
            raw_text    TEXT    NOT NULL,
            fields      TEXT    NOT NULL,   -- JSON-encoded EventFields
            PRIMARY KEY (millis, seq)
        ) STRICT;",
    )
}

fn create_keywords_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS keywords (
            name        TEXT NOT NULL PRIMARY KEY,
            value       TEXT NOT NULL,
            created_at  TEXT NOT NULL
        ) STRICT;",
    )
}
