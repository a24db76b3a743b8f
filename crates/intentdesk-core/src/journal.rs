use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::command::Command;
use crate::config::ProtocolConfig;
use crate::error::ProtocolError;
use crate::types::{Address, Timestamp};

/// Sub-second digits kept in `recorded_at`, matching PostgreSQL TIMESTAMPTZ.
const RECORDED_AT_DIGITS: u16 = 6;

/// Bootstrap parameters recorded as entry 0 of every journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Genesis {
    pub admin: Address,
    pub protocol: ProtocolConfig,
}

impl Genesis {
    pub fn command(&self) -> Command {
        Command::Genesis {
            admin: self.admin.clone(),
            protocol: self.protocol.clone(),
        }
    }
}

/// One applied command in the hash-chained journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub entry_id: String,
    pub index: u64,
    pub caller: Address,
    /// Protocol time the command was applied at; replay reuses it.
    pub applied_at: Timestamp,
    pub command: Value,
    pub recorded_at: DateTime<Utc>,
    pub previous_hash: Option<String>,
    pub entry_hash: String,
}

impl JournalEntry {
    pub fn decode_command(&self) -> Result<Command, ProtocolError> {
        serde_json::from_value(self.command.clone())
            .map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    /// The bootstrap parameters, if this is a genesis entry.
    pub fn genesis(&self) -> Option<Genesis> {
        match self.decode_command() {
            Ok(Command::Genesis { admin, protocol }) => Some(Genesis { admin, protocol }),
            _ => None,
        }
    }
}

/// Append-only log of every command that changed protocol state.
///
/// Entries are built first, made durable elsewhere, then committed here,
/// so the in-memory chain never runs ahead of storage.
#[derive(Debug, Default, Clone)]
pub struct CommandJournal {
    entries: Vec<JournalEntry>,
}

impl CommandJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted entries, rejecting index gaps, broken hashes
    /// and a chain that does not open with exactly one genesis entry.
    pub fn from_entries(entries: Vec<JournalEntry>) -> Result<Self, ProtocolError> {
        let journal = Self { entries };

        for (expected_index, entry) in journal.entries.iter().enumerate() {
            if entry.index != expected_index as u64 {
                return Err(ProtocolError::Journal(format!(
                    "journal index gap at position {} (found {})",
                    expected_index, entry.index
                )));
            }
            if (expected_index == 0) != entry.genesis().is_some() {
                return Err(ProtocolError::Journal(format!(
                    "genesis entry misplaced at position {expected_index}"
                )));
            }
        }

        if !journal.verify_chain() {
            return Err(ProtocolError::Journal(
                "persisted journal hash-chain verification failed".to_string(),
            ));
        }

        Ok(journal)
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parameters journaled at index 0; `None` for a fresh journal.
    pub fn genesis(&self) -> Option<Genesis> {
        self.entries.first().and_then(JournalEntry::genesis)
    }

    pub fn head_hash(&self) -> Option<&str> {
        self.entries.last().map(|entry| entry.entry_hash.as_str())
    }

    pub fn verify_chain(&self) -> bool {
        let mut previous_hash: Option<String> = None;
        for entry in &self.entries {
            if entry.previous_hash != previous_hash {
                return false;
            }
            let expected = compute_entry_hash(
                entry.index,
                &entry.caller,
                entry.applied_at,
                &entry.command,
                entry.recorded_at,
                previous_hash.as_deref(),
            );
            if entry.entry_hash != expected {
                return false;
            }
            previous_hash = Some(entry.entry_hash.clone());
        }
        true
    }

    /// Next entry for `command`; the journal itself is left untouched.
    pub fn build_entry(
        &self,
        caller: &Address,
        applied_at: Timestamp,
        command: &Command,
    ) -> Result<JournalEntry, ProtocolError> {
        let command =
            serde_json::to_value(command).map_err(|e| ProtocolError::Serialization(e.to_string()))?;
        let index = self.entries.len() as u64;
        let recorded_at = Utc::now().trunc_subsecs(RECORDED_AT_DIGITS);
        let previous_hash = self.entries.last().map(|entry| entry.entry_hash.clone());
        let entry_hash = compute_entry_hash(
            index,
            caller,
            applied_at,
            &command,
            recorded_at,
            previous_hash.as_deref(),
        );

        Ok(JournalEntry {
            entry_id: Uuid::new_v4().to_string(),
            index,
            caller: caller.clone(),
            applied_at,
            command,
            recorded_at,
            previous_hash,
            entry_hash,
        })
    }

    /// Commit an entry built by [`CommandJournal::build_entry`] once it is durable.
    pub fn commit_entry(&mut self, entry: JournalEntry) -> Result<(), ProtocolError> {
        let expected_index = self.entries.len() as u64;
        if entry.index != expected_index {
            return Err(ProtocolError::Journal(format!(
                "commit index mismatch: expected {}, got {}",
                expected_index, entry.index
            )));
        }
        if entry.previous_hash.as_deref() != self.head_hash() {
            return Err(ProtocolError::Journal("commit previous hash mismatch".to_string()));
        }

        let expected_hash = compute_entry_hash(
            entry.index,
            &entry.caller,
            entry.applied_at,
            &entry.command,
            entry.recorded_at,
            entry.previous_hash.as_deref(),
        );
        if entry.entry_hash != expected_hash {
            return Err(ProtocolError::Journal(
                "commit hash mismatch for journal entry".to_string(),
            ));
        }

        self.entries.push(entry);
        Ok(())
    }
}

fn compute_entry_hash(
    index: u64,
    caller: &Address,
    applied_at: Timestamp,
    command: &Value,
    recorded_at: DateTime<Utc>,
    previous_hash: Option<&str>,
) -> String {
    let material = serde_json::json!({
        "index": index,
        "caller": caller,
        "applied_at": applied_at,
        "command": command,
        "recorded_at": recorded_at,
        "previous_hash": previous_hash,
    });

    let bytes = serde_json::to_vec(&material).unwrap_or_default();
    blake3::hash(&bytes).to_hex().to_string()
}
