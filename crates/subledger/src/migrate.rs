//! Schema migrations for the `user_info` table, applied through [`refinery`].
//!
//! Migrations come either from the set compiled into this crate or from a directory of
//! `V{n}__{name}.sql` / `V{n}__{name}.up.sql` / `V{n}__{name}.down.sql` files. `up` applies
//! everything pending, `down` reverts every applied migration (newest first) and `version`
//! reports the latest applied one.
//!
//! ```ignore
//! use subledger::migrate::{self, MigrationSource};
//!
//! let (mut client, connection) = tokio_postgres::connect(&url, tokio_postgres::NoTls).await?;
//! tokio::spawn(async move { let _ = connection.await; });
//! let applied = migrate::up(&mut client, &MigrationSource::Embedded).await?;
//! ```

use crate::error::{StoreError, StoreResult};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

pub use refinery::{Migration, Report, Runner};

const HISTORY_TABLE: &str = "refinery_schema_history";

/// The migrations shipped with this crate.
const EMBEDDED: &[(i64, &str, &str, &str)] = &[(
    1,
    "create_user_info",
    include_str!("../migrations/V1__create_user_info.up.sql"),
    include_str!("../migrations/V1__create_user_info.down.sql"),
)];

/// Where migration SQL is read from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MigrationSource {
    /// The set compiled into this crate.
    #[default]
    Embedded,
    /// A directory scanned at call time.
    Dir(PathBuf),
}

impl MigrationSource {
    /// `Dir` when a directory is given, `Embedded` otherwise.
    pub fn from_dir(dir: Option<impl Into<PathBuf>>) -> Self {
        dir.map_or(Self::Embedded, |d| Self::Dir(d.into()))
    }
}

/// One migration with its SQL loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    pub version: i64,
    pub name: String,
    pub up_sql: String,
    pub down_sql: Option<String>,
}

impl MigrationFile {
    /// Name in the form refinery records in its history table.
    fn canonical_name(&self) -> String {
        format!("V{}__{}.sql", self.version, self.name)
    }
}

/// A row of the migration history table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub version: i64,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Up,
    Down,
}

fn parse_with_suffix(file_name: &str, suffix: &str) -> Option<(i64, String)> {
    let stem = file_name.strip_prefix('V')?.strip_suffix(suffix)?;
    let (version, name) = stem.split_once("__")?;
    if name.is_empty() {
        return None;
    }
    let version = version.parse::<i64>().ok().filter(|v| *v > 0)?;
    Some((version, name.to_string()))
}

fn parse_file_name(file_name: &str) -> Option<(i64, String, FileKind)> {
    if let Some((v, name)) = parse_with_suffix(file_name, ".down.sql") {
        return Some((v, name, FileKind::Down));
    }
    if let Some((v, name)) = parse_with_suffix(file_name, ".up.sql") {
        return Some((v, name, FileKind::Up));
    }
    parse_with_suffix(file_name, ".sql").map(|(v, name)| (v, name, FileKind::Up))
}

fn read_sql(path: &Path) -> StoreResult<String> {
    fs::read_to_string(path)
        .map_err(|e| StoreError::Migration(format!("failed to read {}: {e}", path.display())))
}

/// Load every migration of a directory, ordered by version.
///
/// Files that do not follow the naming scheme are ignored. A version with a down file but
/// no up file, or with two different names, is an error.
pub fn scan_dir(dir: impl AsRef<Path>) -> StoreResult<Vec<MigrationFile>> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir).map_err(|e| {
        StoreError::Migration(format!("failed to read migrations dir {}: {e}", dir.display()))
    })?;

    let mut by_version: BTreeMap<i64, (String, Option<String>, Option<String>)> = BTreeMap::new();
    for entry in entries {
        let path = entry
            .map_err(|e| StoreError::Migration(format!("{}: {e}", dir.display())))?
            .path();
        if !path.is_file() {
            continue;
        }
        let Some((version, name, kind)) = path
            .file_name()
            .and_then(|s| s.to_str())
            .and_then(parse_file_name)
        else {
            continue;
        };

        let slot = by_version
            .entry(version)
            .or_insert_with(|| (name.clone(), None, None));
        if slot.0 != name {
            return Err(StoreError::Migration(format!(
                "conflicting names for version {version}: '{}' vs '{name}'",
                slot.0
            )));
        }
        let target = match kind {
            FileKind::Up => &mut slot.1,
            FileKind::Down => &mut slot.2,
        };
        if target.is_some() {
            return Err(StoreError::Migration(format!(
                "duplicate {kind:?} migration for version {version}"
            )));
        }
        *target = Some(read_sql(&path)?);
    }

    by_version
        .into_iter()
        .map(|(version, (name, up, down))| {
            let up_sql = up.ok_or_else(|| {
                StoreError::Migration(format!(
                    "migration V{version}__{name} has a down file but no up file"
                ))
            })?;
            Ok(MigrationFile {
                version,
                name,
                up_sql,
                down_sql: down,
            })
        })
        .collect()
}

/// Load the migrations of `source`, ordered by version.
pub fn load(source: &MigrationSource) -> StoreResult<Vec<MigrationFile>> {
    match source {
        MigrationSource::Embedded => Ok(EMBEDDED
            .iter()
            .map(|(version, name, up, down)| MigrationFile {
                version: *version,
                name: (*name).to_string(),
                up_sql: (*up).to_string(),
                down_sql: Some((*down).to_string()),
            })
            .collect()),
        MigrationSource::Dir(dir) => scan_dir(dir),
    }
}

fn runner(migrations: &[MigrationFile]) -> StoreResult<Runner> {
    let unapplied = migrations
        .iter()
        .map(|m| Migration::unapplied(&m.canonical_name(), &m.up_sql))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Runner::new(&unapplied))
}

async fn fetch_applied(client: &tokio_postgres::Client) -> StoreResult<Vec<AppliedMigration>> {
    let sql = format!(
        "SELECT version::bigint AS version, name FROM {HISTORY_TABLE} ORDER BY version ASC"
    );
    let rows = match client.query(&sql, &[]).await {
        Ok(rows) => rows,
        // No history table yet: nothing applied.
        Err(err) if err.as_db_error().is_some_and(|db| db.code().code() == "42P01") => {
            return Ok(Vec::new());
        }
        Err(err) => return Err(StoreError::from_db_error(err).in_op("migrate")),
    };

    rows.iter()
        .map(|row| {
            Ok(AppliedMigration {
                version: row
                    .try_get("version")
                    .map_err(|e| StoreError::Migration(format!("history version: {e}")))?,
                name: row
                    .try_get("name")
                    .map_err(|e| StoreError::Migration(format!("history name: {e}")))?,
            })
        })
        .collect()
}

/// Apply every pending migration. Returns the versions applied by this call.
pub async fn up(
    client: &mut tokio_postgres::Client,
    source: &MigrationSource,
) -> StoreResult<Vec<i64>> {
    let migrations = load(source)?;
    let report = runner(&migrations)?.run_async(client).await?;
    let applied: Vec<i64> = report
        .applied_migrations()
        .iter()
        .map(|m| i64::from(m.version()))
        .collect();
    tracing::info!(target: "subledger.migrate", ?applied, "migrations applied");
    Ok(applied)
}

/// Revert every applied migration, newest first, each in its own transaction.
///
/// Returns the reverted migrations in revert order.
pub async fn down(
    client: &mut tokio_postgres::Client,
    source: &MigrationSource,
) -> StoreResult<Vec<AppliedMigration>> {
    let local: HashMap<i64, MigrationFile> = load(source)?
        .into_iter()
        .map(|m| (m.version, m))
        .collect();
    let applied = fetch_applied(client).await?;
    let delete_sql = format!("DELETE FROM {HISTORY_TABLE} WHERE version = $1");

    let mut reverted = Vec::with_capacity(applied.len());
    for applied in applied.into_iter().rev() {
        let down_sql = local
            .get(&applied.version)
            .and_then(|m| m.down_sql.as_deref())
            .ok_or_else(|| {
                StoreError::Migration(format!(
                    "cannot revert V{}__{}: no down migration available",
                    applied.version, applied.name
                ))
            })?;

        let tx = client
            .transaction()
            .await
            .map_err(|e| StoreError::from_db_error(e).in_op("migrate"))?;
        tx.batch_execute(down_sql)
            .await
            .map_err(|e| StoreError::from_db_error(e).in_op("migrate"))?;
        // Version is INT4 in the history table unless refinery uses 64-bit versions.
        let version = i32::try_from(applied.version).map_err(|_| {
            StoreError::Migration(format!("version out of range: {}", applied.version))
        })?;
        let affected = tx
            .execute(&delete_sql, &[&version])
            .await
            .map_err(|e| StoreError::from_db_error(e).in_op("migrate"))?;
        if affected == 0 {
            return Err(StoreError::Migration(format!(
                "failed to update migration history for version {}",
                applied.version
            )));
        }
        tx.commit()
            .await
            .map_err(|e| StoreError::from_db_error(e).in_op("migrate"))?;

        tracing::info!(
            target: "subledger.migrate",
            version = applied.version,
            name = %applied.name,
            "migration reverted"
        );
        reverted.push(applied);
    }
    Ok(reverted)
}

/// The latest applied migration, or `None` on an empty database.
pub async fn version(client: &tokio_postgres::Client) -> StoreResult<Option<AppliedMigration>> {
    Ok(fetch_applied(client).await?.pop())
}

/// Check out a pooled connection and apply pending migrations on it.
#[cfg(feature = "pool")]
pub async fn up_pool(
    pool: &deadpool_postgres::Pool,
    source: &MigrationSource,
) -> StoreResult<Vec<i64>> {
    let mut client = pool.get().await.map_err(|e| StoreError::from(e).in_op("migrate"))?;
    up(&mut client, source).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn make_temp_dir() -> PathBuf {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("subledger-migrate-test-{nonce}"));
        std::fs::create_dir_all(&dir).expect("mkdir");
        dir
    }

    #[test]
    fn file_name_variants() {
        assert_eq!(
            parse_file_name("V1__create_user_info.sql"),
            Some((1, "create_user_info".to_string(), FileKind::Up))
        );
        assert_eq!(
            parse_file_name("V2__add_index.up.sql"),
            Some((2, "add_index".to_string(), FileKind::Up))
        );
        assert_eq!(
            parse_file_name("V2__add_index.down.sql"),
            Some((2, "add_index".to_string(), FileKind::Down))
        );
        assert_eq!(parse_file_name("V0__zero.sql"), None);
        assert_eq!(parse_file_name("V3__.sql"), None);
        assert_eq!(parse_file_name("README.md"), None);
    }

    #[test]
    fn embedded_set_creates_the_record_table() {
        let migrations = load(&MigrationSource::Embedded).unwrap();
        assert_eq!(migrations.len(), 1);
        let first = &migrations[0];
        assert_eq!(first.canonical_name(), "V1__create_user_info.sql");
        assert!(first.up_sql.contains("CREATE TABLE IF NOT EXISTS user_info"));
        assert!(first.up_sql.contains("UNIQUE (user_id, service_name, start_date)"));
        assert!(first.down_sql.as_deref().unwrap().contains("DROP TABLE"));
        assert!(runner(&migrations).is_ok());
    }

    #[test]
    fn scan_dir_pairs_up_and_down() {
        let dir = make_temp_dir();
        std::fs::write(dir.join("V1__init.sql"), "CREATE TABLE t1(id int);").unwrap();
        std::fs::write(dir.join("V2__extra.up.sql"), "CREATE TABLE t2(id int);").unwrap();
        std::fs::write(dir.join("V2__extra.down.sql"), "DROP TABLE t2;").unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let migrations = scan_dir(&dir).unwrap();
        assert_eq!(migrations.len(), 2);
        assert_eq!(migrations[0].version, 1);
        assert!(migrations[0].down_sql.is_none());
        assert_eq!(migrations[1].down_sql.as_deref(), Some("DROP TABLE t2;"));

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn scan_dir_rejects_down_without_up() {
        let dir = make_temp_dir();
        std::fs::write(dir.join("V3__x.down.sql"), "DROP TABLE x;").unwrap();

        let err = scan_dir(&dir).unwrap_err();
        assert!(err.to_string().contains("no up file"));

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn source_from_optional_dir() {
        assert_eq!(MigrationSource::from_dir(None::<PathBuf>), MigrationSource::Embedded);
        assert_eq!(
            MigrationSource::from_dir(Some("db/migrations")),
            MigrationSource::Dir(PathBuf::from("db/migrations"))
        );
    }
}
