//! SQLite-backed alias store.
//!
//! Key uniqueness is enforced here, by normalized key, before every insert
//! and update. The table itself carries no constraint on `alias`.

mod schema;

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::{StoreError, ValidationError};
use crate::model::{ActionKind, AliasBinding, MAX_KEY_LEN, NewAlias, normalize_key};

pub type Result<T> = std::result::Result<T, StoreError>;

pub struct AliasStore {
    conn: Connection,
}

impl AliasStore {
    /// Open (creating if needed) the database at `path`. An empty database
    /// gets the sample binding when `seed_sample` is set.
    pub fn open(path: impl AsRef<Path>, seed_sample: bool) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        log::debug!("Opened alias database at {}", path.as_ref().display());
        Self::from_connection(conn, seed_sample)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, false)
    }

    fn from_connection(conn: Connection, seed_sample: bool) -> Result<Self> {
        schema::init(&conn)?;
        let store = Self { conn };
        if seed_sample {
            store.seed_sample()?;
        }
        Ok(store)
    }

    fn seed_sample(&self) -> Result<()> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM command_alias", [], |r| r.get(0))?;
        if count > 0 {
            log::debug!("Alias table holds {} rows, skipping seed", count);
            return Ok(());
        }
        let sample = self.add(sample_alias())?;
        log::info!("Seeded sample alias \"{}\" -> {}", sample.key, sample.target);
        Ok(())
    }

    /// All aliases ordered by key.
    pub fn list(&self) -> Result<Vec<AliasBinding>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, alias, action_type, target, comment FROM command_alias ORDER BY alias ASC, id ASC",
        )?;
        let rows = stmt.query_map([], RawRow::from_row)?;
        rows.map(|row| row?.into_binding()).collect()
    }

    pub fn get(&self, id: i64) -> Result<Option<AliasBinding>> {
        self.conn
            .query_row(
                "SELECT id, alias, action_type, target, comment FROM command_alias WHERE id = ?1",
                params![id],
                RawRow::from_row,
            )
            .optional()?
            .map(RawRow::into_binding)
            .transpose()
    }

    /// Alias whose normalized key equals the normalized `key`.
    pub fn find_by_key(&self, key: &str) -> Result<Option<AliasBinding>> {
        let wanted = normalize_key(key);
        if wanted.is_empty() {
            return Ok(None);
        }
        Ok(self
            .list()?
            .into_iter()
            .find(|alias| normalize_key(&alias.key) == wanted))
    }

    pub fn add(&self, alias: NewAlias) -> Result<AliasBinding> {
        let alias = validate(alias)?;
        self.ensure_unique(&alias.key, None)?;

        self.conn.execute(
            "INSERT INTO command_alias (alias, action_type, target, comment) VALUES (?1, ?2, ?3, ?4)",
            params![
                alias.key,
                alias.action_kind.as_str(),
                alias.target,
                alias.comment
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        log::info!("Added alias {} \"{}\" ({})", id, alias.key, alias.action_kind);
        Ok(alias.with_id(id))
    }

    pub fn update(&self, alias: &AliasBinding) -> Result<AliasBinding> {
        if alias.id <= 0 {
            return Err(ValidationError::InvalidId(alias.id).into());
        }
        let fields = validate(NewAlias {
            key: alias.key.clone(),
            action_kind: alias.action_kind,
            target: alias.target.clone(),
            comment: alias.comment.clone(),
        })?;
        self.ensure_unique(&fields.key, Some(alias.id))?;

        let changed = self.conn.execute(
            "UPDATE command_alias SET alias = ?1, action_type = ?2, target = ?3, comment = ?4 WHERE id = ?5",
            params![
                fields.key,
                fields.action_kind.as_str(),
                fields.target,
                fields.comment,
                alias.id
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(alias.id));
        }
        log::info!("Updated alias {} \"{}\"", alias.id, fields.key);
        Ok(fields.with_id(alias.id))
    }

    /// Delete by id. Returns whether a row was removed; removing twice is fine.
    pub fn remove(&self, id: i64) -> Result<bool> {
        if id <= 0 {
            return Err(ValidationError::InvalidId(id).into());
        }
        let removed = self
            .conn
            .execute("DELETE FROM command_alias WHERE id = ?1", params![id])?;
        if removed > 0 {
            log::info!("Removed alias {}", id);
        } else {
            log::debug!("Alias {} already absent", id);
        }
        Ok(removed > 0)
    }

    /// First key (in key order) that starts with `name`, both normalized.
    pub fn check_prefix(&self, name: &str) -> Result<Option<String>> {
        let prefix = normalize_key(name);
        if prefix.is_empty() {
            return Err(ValidationError::EmptyPrefix.into());
        }
        Ok(self
            .list()?
            .into_iter()
            .map(|alias| alias.key)
            .find(|key| normalize_key(key).starts_with(&prefix)))
    }

    fn ensure_unique(&self, key: &str, except: Option<i64>) -> Result<()> {
        if let Some(existing) = self.find_by_key(key)?
            && Some(existing.id) != except
        {
            return Err(ValidationError::DuplicateKey(existing.key).into());
        }
        Ok(())
    }
}

/// Trimmed copy of `alias`, or the first constraint it breaks.
fn validate(alias: NewAlias) -> std::result::Result<NewAlias, ValidationError> {
    let key = alias.key.trim();
    if key.is_empty() {
        return Err(ValidationError::EmptyKey);
    }
    if key.chars().count() > MAX_KEY_LEN {
        return Err(ValidationError::KeyTooLong);
    }
    let target = alias.target.trim();
    if target.is_empty() {
        return Err(ValidationError::EmptyTarget);
    }
    let comment = alias
        .comment
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string);

    Ok(NewAlias {
        key: key.to_string(),
        action_kind: alias.action_kind,
        target: target.to_string(),
        comment,
    })
}

struct RawRow {
    id: i64,
    key: String,
    action_type: String,
    target: String,
    comment: Option<String>,
}

impl RawRow {
    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: r.get(0)?,
            key: r.get(1)?,
            action_type: r.get(2)?,
            target: r.get(3)?,
            comment: r.get(4)?,
        })
    }

    fn into_binding(self) -> Result<AliasBinding> {
        let action_kind: ActionKind =
            self.action_type
                .parse()
                .map_err(|_| StoreError::CorruptRow {
                    id: self.id,
                    action_type: self.action_type.clone(),
                })?;
        Ok(AliasBinding {
            id: self.id,
            key: self.key,
            action_kind,
            target: self.target,
            comment: self.comment,
        })
    }
}

fn sample_alias() -> NewAlias {
    #[cfg(target_os = "windows")]
    let target = r"C:\Program Files\Microsoft VS Code\Code.exe";
    #[cfg(target_os = "macos")]
    let target = "/Applications/Visual Studio Code.app";
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    let target = "/usr/bin/code";

    NewAlias {
        key: "c o d e".to_string(),
        action_kind: ActionKind::LaunchApp,
        target: target.to_string(),
        comment: Some("Launch Visual Studio Code".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_alias(key: &str, kind: ActionKind, target: &str) -> NewAlias {
        NewAlias {
            key: key.to_string(),
            action_kind: kind,
            target: target.to_string(),
            comment: None,
        }
    }

    #[test]
    fn added_alias_reads_back_with_new_id() {
        let store = AliasStore::open_in_memory().unwrap();
        let wanted = NewAlias {
            comment: Some("editor".into()),
            ..new_alias("c o d e", ActionKind::LaunchApp, "/usr/bin/code")
        };
        let added = store.add(wanted.clone()).unwrap();
        assert!(added.id > 0);

        let listed = store.list().unwrap();
        assert_eq!(listed, vec![wanted.with_id(added.id)]);
    }

    #[test]
    fn normalized_duplicates_are_rejected_before_insert() {
        let store = AliasStore::open_in_memory().unwrap();
        store
            .add(new_alias("c o d e", ActionKind::LaunchApp, "/usr/bin/code"))
            .unwrap();

        let err = store
            .add(new_alias("CODE", ActionKind::RunCommand, "echo hi"))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::DuplicateKey(ref key)) if key == "c o d e"
        ));
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn field_constraints() {
        let store = AliasStore::open_in_memory().unwrap();
        let err = |alias| match store.add(alias) {
            Err(StoreError::Validation(e)) => e,
            other => panic!("expected validation error, got {:?}", other.map(|a| a.id)),
        };

        assert_eq!(
            err(new_alias("   ", ActionKind::LaunchApp, "/bin/x")),
            ValidationError::EmptyKey
        );
        assert_eq!(
            err(new_alias(&"k".repeat(51), ActionKind::LaunchApp, "/bin/x")),
            ValidationError::KeyTooLong
        );
        assert_eq!(
            err(new_alias("k", ActionKind::LaunchApp, "  ")),
            ValidationError::EmptyTarget
        );
        assert!(
            store
                .add(new_alias(&"k".repeat(50), ActionKind::LaunchApp, "/bin/x"))
                .is_ok()
        );
    }

    #[test]
    fn blank_comment_is_stored_as_null() {
        let store = AliasStore::open_in_memory().unwrap();
        let added = store
            .add(NewAlias {
                comment: Some("  ".into()),
                ..new_alias("gg", ActionKind::RunCommand, "echo hi")
            })
            .unwrap();
        assert_eq!(store.get(added.id).unwrap().unwrap().comment, None);
    }

    #[test]
    fn update_keeps_own_key_but_rejects_others() {
        let store = AliasStore::open_in_memory().unwrap();
        let code = store
            .add(new_alias("code", ActionKind::LaunchApp, "/usr/bin/code"))
            .unwrap();
        store
            .add(new_alias("term", ActionKind::LaunchApp, "/usr/bin/xterm"))
            .unwrap();

        let renamed = AliasBinding {
            key: "C o d e".into(),
            target: "/opt/code/code".into(),
            ..code.clone()
        };
        store.update(&renamed).unwrap();
        assert_eq!(store.get(code.id).unwrap(), Some(renamed));

        let clash = AliasBinding {
            key: "t e r m".into(),
            ..code.clone()
        };
        assert!(matches!(
            store.update(&clash),
            Err(StoreError::Validation(ValidationError::DuplicateKey(_)))
        ));

        let missing = AliasBinding {
            id: 999,
            key: "other".into(),
            ..code
        };
        assert!(matches!(store.update(&missing), Err(StoreError::NotFound(999))));
    }

    #[test]
    fn remove_twice_reports_absence_without_error() {
        let store = AliasStore::open_in_memory().unwrap();
        let added = store
            .add(new_alias("gg", ActionKind::RunCommand, "echo hi"))
            .unwrap();
        assert!(store.remove(added.id).unwrap());
        assert!(!store.remove(added.id).unwrap());
        assert!(matches!(
            store.remove(0),
            Err(StoreError::Validation(ValidationError::InvalidId(0)))
        ));
    }

    #[test]
    fn prefix_check_uses_normalized_keys() {
        let store = AliasStore::open_in_memory().unwrap();
        store
            .add(new_alias("code", ActionKind::LaunchApp, "/usr/bin/code"))
            .unwrap();

        assert_eq!(store.check_prefix("co").unwrap(), Some("code".to_string()));
        assert_eq!(store.check_prefix("C O").unwrap(), Some("code".to_string()));
        assert_eq!(store.check_prefix("xyz").unwrap(), None);
        assert!(matches!(
            store.check_prefix(" "),
            Err(StoreError::Validation(ValidationError::EmptyPrefix))
        ));
    }

    #[test]
    fn list_is_ordered_by_key() {
        let store = AliasStore::open_in_memory().unwrap();
        for key in ["zed", "alpha", "mid"] {
            store
                .add(new_alias(key, ActionKind::RunCommand, "true"))
                .unwrap();
        }
        let keys: Vec<String> = store.list().unwrap().into_iter().map(|a| a.key).collect();
        assert_eq!(keys, ["alpha", "mid", "zed"]);
    }

    #[test]
    fn find_by_key_ignores_spacing_and_case() {
        let store = AliasStore::open_in_memory().unwrap();
        let added = store
            .add(new_alias("c o d e", ActionKind::LaunchApp, "/usr/bin/code"))
            .unwrap();
        assert_eq!(store.find_by_key("Code").unwrap().map(|a| a.id), Some(added.id));
        assert_eq!(store.find_by_key("cod").unwrap(), None);
        assert_eq!(store.find_by_key("").unwrap(), None);
    }

    #[test]
    fn seeds_sample_once_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aliases.db");

        let store = AliasStore::open(&path, true).unwrap();
        let aliases = store.list().unwrap();
        assert_eq!(aliases.len(), 1);
        assert_eq!(aliases[0].key, "c o d e");
        store.remove(aliases[0].id).unwrap();
        store
            .add(new_alias("gg", ActionKind::RunCommand, "echo hi"))
            .unwrap();
        drop(store);

        // A non-empty table is left alone on reopen.
        let reopened = AliasStore::open(&path, true).unwrap();
        let keys: Vec<String> = reopened.list().unwrap().into_iter().map(|a| a.key).collect();
        assert_eq!(keys, ["gg"]);
    }

    #[test]
    fn unknown_action_type_is_reported_as_corrupt() {
        let store = AliasStore::open_in_memory().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO command_alias (alias, action_type, target) VALUES ('x', 'open-url', 'y')",
                [],
            )
            .unwrap();
        assert!(matches!(
            store.list(),
            Err(StoreError::CorruptRow { ref action_type, .. }) if action_type == "open-url"
        ));
    }
}
