use rusqlite::Connection;

pub(crate) fn init(conn: &Connection) -> rusqlite::Result<()> {
    // No UNIQUE on alias: uniqueness is by normalized key, checked before writes.
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS command_alias (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          alias VARCHAR(50) NOT NULL,
          action_type VARCHAR(20) NOT NULL,
          target TEXT NOT NULL,
          comment TEXT
        );
        "#,
    )
}
