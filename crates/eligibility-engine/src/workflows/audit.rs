//! Append-only transition log shared by both state machines.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of entity an audit entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Consumer,
    Enrollment,
}

impl EntityKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Consumer => "consumer",
            Self::Enrollment => "enrollment",
        }
    }
}

impl std::str::FromStr for EntityKind {
    type Err = AuditError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "consumer" | "consumers" => Ok(Self::Consumer),
            "enrollment" | "enrollments" => Ok(Self::Enrollment),
            other => Err(AuditError::UnknownEntityKind(other.to_string())),
        }
    }
}

/// A transition waiting to be sequenced into the trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub entity_kind: EntityKind,
    pub entity_id: String,
    /// `None` marks the creation of the entity.
    pub from_state: Option<String>,
    pub to_state: String,
    pub triggering_event: String,
    pub actor_id: String,
    pub occurred_at: DateTime<Utc>,
}

/// Sequenced, immutable audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub sequence_no: u64,
    pub entity_kind: EntityKind,
    pub entity_id: String,
    pub from_state: Option<String>,
    pub to_state: String,
    pub triggering_event: String,
    pub actor_id: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuditError {
    #[error("{kind} {entity_id} already has a creation entry", kind = .entity_kind.label())]
    AlreadyCreated {
        entity_kind: EntityKind,
        entity_id: String,
    },
    #[error("{kind} {entity_id} expected prior state {expected:?}, found {found:?}", kind = .entity_kind.label())]
    OutOfOrder {
        entity_kind: EntityKind,
        entity_id: String,
        expected: Option<String>,
        found: Option<String>,
    },
    #[error("unknown entity kind '{0}'")]
    UnknownEntityKind(String),
}

type EntityKey = (EntityKind, String);

#[derive(Debug, Clone)]
struct EntityHead {
    last_sequence: u64,
    state: String,
}

/// Per-entity ordered transition log. Batches are validated as a whole before any entry is
/// appended, and every entry must start from the state the previous one ended in.
#[derive(Debug, Clone, Default)]
pub struct AuditTrail {
    entries: Vec<AuditEntry>,
    heads: HashMap<EntityKey, EntityHead>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_batch(&mut self, records: Vec<AuditRecord>) -> Result<Vec<AuditEntry>, AuditError> {
        let mut staged_heads: HashMap<EntityKey, EntityHead> = HashMap::new();
        let mut staged = Vec::with_capacity(records.len());

        for record in records {
            let key = (record.entity_kind, record.entity_id.clone());
            let head = staged_heads
                .get(&key)
                .or_else(|| self.heads.get(&key))
                .cloned();

            let sequence_no = match (&head, &record.from_state) {
                (None, None) => 1,
                (Some(_), None) => {
                    return Err(AuditError::AlreadyCreated {
                        entity_kind: record.entity_kind,
                        entity_id: record.entity_id,
                    })
                }
                (Some(head), Some(from)) if head.state == *from => head.last_sequence + 1,
                (head, found) => {
                    return Err(AuditError::OutOfOrder {
                        entity_kind: record.entity_kind,
                        entity_id: record.entity_id.clone(),
                        expected: head.as_ref().map(|head| head.state.clone()),
                        found: found.clone(),
                    })
                }
            };

            staged_heads.insert(
                key,
                EntityHead {
                    last_sequence: sequence_no,
                    state: record.to_state.clone(),
                },
            );
            staged.push(AuditEntry {
                sequence_no,
                entity_kind: record.entity_kind,
                entity_id: record.entity_id,
                from_state: record.from_state,
                to_state: record.to_state,
                triggering_event: record.triggering_event,
                actor_id: record.actor_id,
                occurred_at: record.occurred_at,
            });
        }

        self.heads.extend(staged_heads);
        self.entries.extend(staged.iter().cloned());
        Ok(staged)
    }

    pub fn entries_for(&self, kind: EntityKind, entity_id: &str) -> Vec<AuditEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.entity_kind == kind && entry.entity_id == entity_id)
            .cloned()
            .collect()
    }

    /// Whether the entity ever entered `state`, including at creation.
    pub fn was_ever_in(&self, kind: EntityKind, entity_id: &str, state: &str) -> bool {
        self.entries.iter().any(|entry| {
            entry.entity_kind == kind && entry.entity_id == entity_id && entry.to_state == state
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
