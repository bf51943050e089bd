//! Entity and Topic domain types.
//!
//! One record shape covers both messages and tool calls; the two are
//! distinguished by [`EntityKind`]. An oversized entity is persisted as an
//! ordered chunk set sharing one synthetic grouping key (`chunk_parent_id`).
//! Chunk index 0 is the canonical record: it carries the externally visible
//! id, the only non-empty snippet, and all reply-chain / called-by linkage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of entity a record is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Message,
    ToolCall,
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One superseded version of an entity's content.
///
/// Edit history is append-only: entries are never rewritten or removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionRecord {
    /// The content that was replaced by the edit.
    pub content: String,
    /// When the edit happened.
    pub edited_at: DateTime<Utc>,
}

/// A persisted message, tool call, or chunk thereof.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Globally unique, immutable once assigned.
    pub id: String,

    pub kind: EntityKind,

    /// Present on messages (and their chunks); absent on tool calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    /// Full content — or, on a chunk record, one slice of it.
    pub content: String,

    /// Short preview. Non-empty only on top-level records and chunk index 0.
    #[serde(default)]
    pub snippet: String,

    pub created_at: DateTime<Utc>,

    /// Reply-chain parent (messages) or triggering message (tool calls).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Tool calls only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// Serialized tool arguments. Tool calls only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_args: Option<String>,

    /// Embedding vector (stored as a blob by SQL backends, never serialized
    /// on the wire). Mandatory for tool calls and for every chunk.
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,

    /// Approximate token count of `content` (4 chars ≈ 1 token).
    #[serde(default)]
    pub token_count: usize,

    /// Extensible metadata map.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    #[serde(default)]
    pub edited: bool,

    /// Soft delete: excluded from search and index building, kept for audit.
    #[serde(default)]
    pub deleted: bool,

    /// Ordered prior-version records, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub versions: Vec<VersionRecord>,

    /// True only for chunk records with index >= 1. Chunk index 0 is the
    /// canonical entity and keeps this false.
    #[serde(default)]
    pub is_chunk: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u32>,

    /// Synthetic grouping key shared by a chunk set. Never a node id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_parent_id: Option<String>,
}

impl Entity {
    /// Create an unchunked message record.
    pub fn message(role: Role, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            id: Uuid::new_v4().to_string(),
            kind: EntityKind::Message,
            role: Some(role),
            content,
            snippet: String::new(),
            created_at: Utc::now(),
            parent_id: None,
            tool_name: None,
            tool_args: None,
            embedding: None,
            token_count: 0,
            metadata: serde_json::Map::new(),
            edited: false,
            deleted: false,
            versions: Vec::new(),
            is_chunk: false,
            chunk_index: None,
            chunk_parent_id: None,
        }
    }

    /// Create an unchunked tool-call record. `content` is the serialized result.
    pub fn tool_call(
        tool_name: impl Into<String>,
        tool_args: impl Into<String>,
        content: impl Into<String>,
        message_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind: EntityKind::ToolCall,
            role: None,
            content: content.into(),
            snippet: String::new(),
            created_at: Utc::now(),
            parent_id: Some(message_id.into()),
            tool_name: Some(tool_name.into()),
            tool_args: Some(tool_args.into()),
            embedding: None,
            token_count: 0,
            metadata: serde_json::Map::new(),
            edited: false,
            deleted: false,
            versions: Vec::new(),
            is_chunk: false,
            chunk_index: None,
            chunk_parent_id: None,
        }
    }

    /// Whether this is the chunk-index-0 record of a chunked entity.
    pub fn is_chunked_parent(&self) -> bool {
        !self.is_chunk && self.chunk_parent_id.is_some()
    }

    /// The identity used to collapse chunk hits onto their logical entity:
    /// the grouping key when chunked, the id otherwise.
    pub fn logical_key(&self) -> &str {
        self.chunk_parent_id.as_deref().unwrap_or(&self.id)
    }
}

/// Input for storing a new message.
#[derive(Debug, Clone)]
pub struct MessageDraft {
    pub role: Role,
    pub content: String,
    pub parent_id: Option<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl MessageDraft {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            parent_id: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Map<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Input for storing a new tool call.
#[derive(Debug, Clone)]
pub struct ToolCallDraft {
    pub tool_name: String,
    pub arguments: serde_json::Value,
    pub result: serde_json::Value,
    /// The message that triggered the call.
    pub message_id: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ToolCallDraft {
    pub fn new(
        tool_name: impl Into<String>,
        arguments: serde_json::Value,
        result: serde_json::Value,
        message_id: impl Into<String>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
            result,
            message_id: message_id.into(),
            metadata: serde_json::Map::new(),
        }
    }
}

/// A background-computed cluster of semantically related entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    /// Short human-readable summary of what the members are about.
    pub summary: String,
    /// Member entity ids, best match first.
    pub member_ids: Vec<String>,
    /// Time span covered by the members.
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Topic {
    pub fn new(summary: impl Into<String>, member_ids: Vec<String>, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            summary: summary.into(),
            member_ids,
            from,
            to,
            created_at: Utc::now(),
        }
    }
}

/// A search match: an entity plus its relevance score.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub entity: Entity,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_message_entity() {
        let e = Entity::message(Role::User, "Hello, agent!");
        assert_eq!(e.kind, EntityKind::Message);
        assert_eq!(e.role, Some(Role::User));
        assert!(!e.is_chunk);
        assert!(e.chunk_parent_id.is_none());
        assert!(!e.id.is_empty());
    }

    #[test]
    fn create_tool_call_entity() {
        let e = Entity::tool_call("web_search", r#"{"q":"rust"}"#, "result text", "msg_1");
        assert_eq!(e.kind, EntityKind::ToolCall);
        assert_eq!(e.role, None);
        assert_eq!(e.parent_id.as_deref(), Some("msg_1"));
        assert_eq!(e.tool_name.as_deref(), Some("web_search"));
    }

    #[test]
    fn logical_key_prefers_chunk_parent() {
        let mut e = Entity::message(Role::Assistant, "chunked");
        assert_eq!(e.logical_key(), e.id);
        e.chunk_parent_id = Some("group_1".into());
        assert_eq!(e.logical_key(), "group_1");
        assert!(e.is_chunked_parent());
    }

    #[test]
    fn entity_serialization_skips_embedding() {
        let mut e = Entity::message(Role::User, "has embedding");
        e.embedding = Some(vec![0.1, 0.2]);
        let json = serde_json::to_string(&e).unwrap();
        assert!(!json.contains("embedding"));
        let back: Entity = serde_json::from_str(&json).unwrap();
        assert!(back.embedding.is_none());
        assert_eq!(back.content, "has embedding");
    }

    #[test]
    fn draft_builders() {
        let d = MessageDraft::new(Role::User, "hi").with_parent("msg_0");
        assert_eq!(d.parent_id.as_deref(), Some("msg_0"));
    }
}
