//! Versioned schema migrations for vigil storage backends.
//!
//! A backend declares its schema as a [`MigrationPlan`]: an ordered list of
//! SQL [`Migration`]s. Every applied migration is recorded together with a
//! checksum of its statements, so a database that was migrated by a build
//! with different SQL is refused instead of silently drifting.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Migration failed: {0}")]
    Migration(String),
    #[error("Migration versions must increase: {version} follows {previous}")]
    OutOfOrder { previous: i64, version: i64 },
    #[error("Migration {version} ({name}) was changed after it was applied")]
    ChecksumMismatch { version: i64, name: String },
    #[error("Database has migration {0}, which this build does not know")]
    UnknownVersion(i64),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, MigrationError>;

/// One schema change, written as plain SQL statements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    version: i64,
    name: &'static str,
    up: &'static [&'static str],
    down: &'static [&'static str],
}

impl Migration {
    pub const fn new(
        version: i64,
        name: &'static str,
        up: &'static [&'static str],
        down: &'static [&'static str],
    ) -> Self {
        Self {
            version,
            name,
            up,
            down,
        }
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn name(&self) -> &str {
        self.name
    }

    /// Statements that apply the change, run in order inside one transaction.
    pub fn up(&self) -> &[&'static str] {
        self.up
    }

    /// Statements that undo the change.
    pub fn down(&self) -> &[&'static str] {
        self.down
    }

    /// Hex SHA-256 over the trimmed `up` statements.
    ///
    /// Renaming a migration does not change its checksum; editing its SQL does.
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        for statement in self.up {
            hasher.update(statement.trim().as_bytes());
            hasher.update([0u8]);
        }
        format!("{:x}", hasher.finalize())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub checksum: String,
    /// Unix seconds
    pub applied_at: i64,
}

/// The full, validated schema history of a backend.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    migrations: Vec<Migration>,
}

impl MigrationPlan {
    /// Build a plan, rejecting versions that do not strictly increase.
    pub fn new(migrations: Vec<Migration>) -> Result<Self> {
        for pair in migrations.windows(2) {
            if pair[1].version <= pair[0].version {
                return Err(MigrationError::OutOfOrder {
                    previous: pair[0].version,
                    version: pair[1].version,
                });
            }
        }
        Ok(Self { migrations })
    }

    pub fn latest_version(&self) -> Option<i64> {
        self.migrations.last().map(Migration::version)
    }

    fn find(&self, version: i64) -> Option<&Migration> {
        self.migrations.iter().find(|m| m.version == version)
    }

    /// Check that every applied migration is known and unchanged.
    pub fn verify(&self, applied: &[MigrationRecord]) -> Result<()> {
        for record in applied {
            let migration = self
                .find(record.version)
                .ok_or(MigrationError::UnknownVersion(record.version))?;
            if migration.checksum() != record.checksum {
                return Err(MigrationError::ChecksumMismatch {
                    version: record.version,
                    name: migration.name.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Migrations not yet applied, oldest first.
    pub fn pending(&self, applied: &[MigrationRecord]) -> Result<Vec<&Migration>> {
        self.verify(applied)?;
        Ok(self
            .migrations
            .iter()
            .filter(|m| !applied.iter().any(|r| r.version == m.version))
            .collect())
    }

    /// Applied migrations newer than `target_version`, newest first.
    pub fn rollback_to(
        &self,
        applied: &[MigrationRecord],
        target_version: i64,
    ) -> Result<Vec<&Migration>> {
        self.verify(applied)?;
        Ok(self
            .migrations
            .iter()
            .rev()
            .filter(|m| m.version > target_version)
            .filter(|m| applied.iter().any(|r| r.version == m.version))
            .collect())
    }
}

/// Backend side of migrations: storage of the history table and execution of
/// single migrations. Planning is shared through the provided methods.
#[async_trait]
pub trait MigrationManager: Send + Sync {
    fn table_name(&self) -> &str {
        "_vigil_migrations"
    }

    /// Create the history table if it does not exist
    async fn initialize(&self) -> Result<()>;

    /// Applied migrations ordered by version
    async fn applied(&self) -> Result<Vec<MigrationRecord>>;

    /// Run `migration.up()` and record it, atomically
    async fn apply(&self, migration: &Migration) -> Result<()>;

    /// Run `migration.down()` and remove its record, atomically
    async fn revert(&self, migration: &Migration) -> Result<()>;

    /// Bring the schema up to the latest version of `plan`.
    ///
    /// Returns the number of migrations applied.
    async fn migrate(&self, plan: &MigrationPlan) -> Result<usize> {
        self.initialize().await?;
        let applied = self.applied().await?;
        let pending = plan.pending(&applied)?;

        for migration in &pending {
            tracing::info!(
                version = migration.version(),
                name = migration.name(),
                "Applying migration"
            );
            self.apply(migration).await?;
        }
        Ok(pending.len())
    }

    /// Revert every applied migration newer than `target_version`.
    ///
    /// Returns the number of migrations reverted.
    async fn rollback_to(&self, plan: &MigrationPlan, target_version: i64) -> Result<usize> {
        self.initialize().await?;
        let applied = self.applied().await?;
        let reverting = plan.rollback_to(&applied, target_version)?;

        for migration in &reverting {
            tracing::info!(
                version = migration.version(),
                name = migration.name(),
                "Reverting migration"
            );
            self.revert(migration).await?;
        }
        Ok(reverting.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIRST: Migration = Migration::new(
        1,
        "CreateThings",
        &["CREATE TABLE things (id INTEGER PRIMARY KEY)"],
        &["DROP TABLE things"],
    );
    const SECOND: Migration = Migration::new(
        2,
        "IndexThings",
        &["CREATE INDEX idx_things ON things(id)"],
        &["DROP INDEX idx_things"],
    );

    fn record(migration: &Migration) -> MigrationRecord {
        MigrationRecord {
            version: migration.version(),
            name: migration.name().to_string(),
            checksum: migration.checksum(),
            applied_at: 1_735_689_600,
        }
    }

    #[test]
    fn test_plan_rejects_out_of_order_versions() {
        let err = MigrationPlan::new(vec![SECOND, FIRST]).unwrap_err();
        assert!(matches!(
            err,
            MigrationError::OutOfOrder {
                previous: 2,
                version: 1
            }
        ));

        let err = MigrationPlan::new(vec![FIRST, FIRST]).unwrap_err();
        assert!(matches!(err, MigrationError::OutOfOrder { .. }));
    }

    #[test]
    fn test_pending_skips_applied() {
        let plan = MigrationPlan::new(vec![FIRST, SECOND]).unwrap();
        assert_eq!(plan.latest_version(), Some(2));

        let pending = plan.pending(&[]).unwrap();
        assert_eq!(pending.len(), 2);

        let pending = plan.pending(&[record(&FIRST)]).unwrap();
        assert_eq!(pending, vec![&SECOND]);
    }

    #[test]
    fn test_checksum_ignores_name_and_whitespace() {
        let renamed = Migration::new(1, "Renamed", &["  CREATE TABLE things (id INTEGER PRIMARY KEY)\n"], &[]);
        assert_eq!(renamed.checksum(), FIRST.checksum());
        assert_eq!(FIRST.checksum().len(), 64);
        assert_ne!(FIRST.checksum(), SECOND.checksum());
    }

    #[test]
    fn test_edited_migration_is_refused() {
        let edited = Migration::new(
            1,
            "CreateThings",
            &["CREATE TABLE things (id INTEGER PRIMARY KEY, name TEXT)"],
            &["DROP TABLE things"],
        );
        let plan = MigrationPlan::new(vec![edited, SECOND]).unwrap();

        let err = plan.pending(&[record(&FIRST)]).unwrap_err();
        assert!(matches!(
            err,
            MigrationError::ChecksumMismatch { version: 1, .. }
        ));
    }

    #[test]
    fn test_unknown_applied_version_is_refused() {
        let plan = MigrationPlan::new(vec![FIRST]).unwrap();
        let err = plan.pending(&[record(&FIRST), record(&SECOND)]).unwrap_err();
        assert!(matches!(err, MigrationError::UnknownVersion(2)));
    }

    #[test]
    fn test_rollback_is_newest_first() {
        let plan = MigrationPlan::new(vec![FIRST, SECOND]).unwrap();
        let applied = [record(&FIRST), record(&SECOND)];

        assert_eq!(plan.rollback_to(&applied, 0).unwrap(), vec![&SECOND, &FIRST]);
        assert_eq!(plan.rollback_to(&applied, 1).unwrap(), vec![&SECOND]);
        assert!(plan.rollback_to(&[record(&FIRST)], 1).unwrap().is_empty());
    }
}
