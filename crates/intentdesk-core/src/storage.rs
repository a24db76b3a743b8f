use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use crate::command::Command;
use crate::error::ProtocolError;
use crate::journal::{CommandJournal, Genesis, JournalEntry};
use crate::types::{Address, Timestamp};

/// Journal persistence backend configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum JournalStorageConfig {
    /// Keep the journal in process memory only; state is lost on restart.
    #[default]
    Memory,
    /// Mirror every entry to PostgreSQL and replay it on startup.
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

impl JournalStorageConfig {
    pub fn memory() -> Self {
        Self::Memory
    }

    pub fn postgres(database_url: impl Into<String>, max_connections: u32) -> Self {
        Self::Postgres {
            database_url: database_url.into(),
            max_connections,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres { .. } => "postgres",
        }
    }
}

#[derive(Debug, Clone)]
enum JournalBackend {
    Memory,
    Postgres(PostgresJournalStore),
}

/// Command journal with an optional durable mirror.
///
/// An entry is persisted before it is committed to the in-memory chain, and
/// the chain loaded on startup is hash-verified before replay.
#[derive(Debug, Clone)]
pub struct PersistentJournal {
    journal: CommandJournal,
    backend: JournalBackend,
}

impl PersistentJournal {
    /// In-memory journal seeded with already persisted entries.
    pub fn from_entries(entries: Vec<JournalEntry>) -> Result<Self, ProtocolError> {
        Ok(Self {
            journal: CommandJournal::from_entries(entries)?,
            backend: JournalBackend::Memory,
        })
    }

    pub async fn bootstrap(config: JournalStorageConfig) -> Result<Self, ProtocolError> {
        match config {
            JournalStorageConfig::Memory => Ok(Self {
                journal: CommandJournal::new(),
                backend: JournalBackend::Memory,
            }),
            JournalStorageConfig::Postgres {
                database_url,
                max_connections,
            } => {
                let store = PostgresJournalStore::connect(&database_url, max_connections).await?;
                store.ensure_schema().await?;
                let entries = store.load_entries().await?;
                Ok(Self {
                    journal: CommandJournal::from_entries(entries)?,
                    backend: JournalBackend::Postgres(store),
                })
            }
        }
    }

    pub fn backend_label(&self) -> &'static str {
        match self.backend {
            JournalBackend::Memory => "memory",
            JournalBackend::Postgres(_) => "postgres",
        }
    }

    pub fn entries(&self) -> &[JournalEntry] {
        self.journal.entries()
    }

    /// Entries submitted by `caller`, oldest first.
    pub fn entries_by<'a>(&'a self, caller: &'a Address) -> impl Iterator<Item = &'a JournalEntry> + 'a {
        self.journal
            .entries()
            .iter()
            .filter(move |entry| &entry.caller == caller)
    }

    /// Record `proposed` as entry 0 of a fresh journal.
    ///
    /// Returns the genesis the chain actually opens with; on a journal that
    /// already has entries `proposed` is ignored.
    pub async fn ensure_genesis(
        &mut self,
        proposed: &Genesis,
        applied_at: Timestamp,
    ) -> Result<Genesis, ProtocolError> {
        if let Some(existing) = self.journal.genesis() {
            return Ok(existing);
        }
        if !self.journal.is_empty() {
            return Err(ProtocolError::Journal(
                "journal has entries but no genesis".to_string(),
            ));
        }
        self.append(&proposed.admin, applied_at, &proposed.command())
            .await?;
        Ok(proposed.clone())
    }

    pub fn verify_chain(&self) -> bool {
        self.journal.verify_chain()
    }

    pub async fn append(
        &mut self,
        caller: &Address,
        applied_at: Timestamp,
        command: &Command,
    ) -> Result<JournalEntry, ProtocolError> {
        let entry = self.journal.build_entry(caller, applied_at, command)?;

        if let JournalBackend::Postgres(store) = &self.backend {
            store.insert_entry(&entry).await?;
        }

        self.journal.commit_entry(entry.clone())?;
        Ok(entry)
    }
}

#[derive(Debug, Clone)]
struct PostgresJournalStore {
    pool: PgPool,
}

fn pg_error(action: &str) -> impl Fn(sqlx::Error) -> ProtocolError + '_ {
    move |e| ProtocolError::Journal(format!("postgres {action} failed: {e}"))
}

impl PostgresJournalStore {
    async fn connect(database_url: &str, max_connections: u32) -> Result<Self, ProtocolError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await
            .map_err(pg_error("connect"))?;

        Ok(Self { pool })
    }

    async fn ensure_schema(&self) -> Result<(), ProtocolError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS intentdesk_journal_entries (
                journal_index BIGINT PRIMARY KEY,
                entry_id TEXT NOT NULL UNIQUE,
                caller TEXT NOT NULL,
                applied_at BIGINT NOT NULL,
                command JSONB NOT NULL,
                recorded_at TIMESTAMPTZ NOT NULL,
                previous_hash TEXT NULL,
                entry_hash TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(pg_error("schema create"))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_intentdesk_journal_caller ON intentdesk_journal_entries (caller)",
        )
        .execute(&self.pool)
        .await
        .map_err(pg_error("index create"))?;

        Ok(())
    }

    async fn load_entries(&self) -> Result<Vec<JournalEntry>, ProtocolError> {
        let rows = sqlx::query(
            r#"
            SELECT
                journal_index,
                entry_id,
                caller,
                applied_at,
                command,
                recorded_at,
                previous_hash,
                entry_hash
            FROM intentdesk_journal_entries
            ORDER BY journal_index ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(pg_error("load"))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let index: i64 = row
                .try_get("journal_index")
                .map_err(pg_error("decode journal_index"))?;
            let applied_at: i64 = row
                .try_get("applied_at")
                .map_err(pg_error("decode applied_at"))?;
            let caller: String = row.try_get("caller").map_err(pg_error("decode caller"))?;

            entries.push(JournalEntry {
                entry_id: row.try_get("entry_id").map_err(pg_error("decode entry_id"))?,
                index: index
                    .try_into()
                    .map_err(|_| ProtocolError::Journal("negative journal index in storage".to_string()))?,
                caller: Address::parse(&caller)?,
                applied_at: applied_at
                    .try_into()
                    .map_err(|_| ProtocolError::Journal("negative applied_at in storage".to_string()))?,
                command: row.try_get("command").map_err(pg_error("decode command"))?,
                recorded_at: row
                    .try_get("recorded_at")
                    .map_err(pg_error("decode recorded_at"))?,
                previous_hash: row
                    .try_get("previous_hash")
                    .map_err(pg_error("decode previous_hash"))?,
                entry_hash: row.try_get("entry_hash").map_err(pg_error("decode entry_hash"))?,
            });
        }

        Ok(entries)
    }

    async fn insert_entry(&self, entry: &JournalEntry) -> Result<(), ProtocolError> {
        let index: i64 = entry
            .index
            .try_into()
            .map_err(|_| ProtocolError::Journal("journal index exceeds postgres BIGINT range".to_string()))?;
        let applied_at: i64 = entry
            .applied_at
            .try_into()
            .map_err(|_| ProtocolError::Journal("applied_at exceeds postgres BIGINT range".to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO intentdesk_journal_entries (
                journal_index,
                entry_id,
                caller,
                applied_at,
                command,
                recorded_at,
                previous_hash,
                entry_hash
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(index)
        .bind(&entry.entry_id)
        .bind(entry.caller.as_str())
        .bind(applied_at)
        .bind(&entry.command)
        .bind(entry.recorded_at)
        .bind(&entry.previous_hash)
        .bind(&entry.entry_hash)
        .execute(&self.pool)
        .await
        .map_err(pg_error("insert"))?;

        Ok(())
    }
}
