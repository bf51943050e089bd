//! Stable response shapes consumed by the LLM runtime.
//!
//! These are the fixed tool contracts: whatever the storage layer does
//! internally, tools answer in these shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityKind, Role};

/// Chunk flags attached to a response when the record is part of a chunk set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkFlags {
    pub is_chunk: bool,
    pub chunk_index: u32,
    pub chunk_parent_id: String,
}

impl ChunkFlags {
    fn from_entity(e: &Entity) -> Option<Self> {
        let parent = e.chunk_parent_id.as_ref()?;
        Some(Self {
            is_chunk: e.is_chunk,
            chunk_index: e.chunk_index.unwrap_or(0),
            chunk_parent_id: parent.clone(),
        })
    }
}

/// Message response shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: String,
    pub content: String,
    pub role: Role,
    pub timestamp: DateTime<Utc>,
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<ChunkFlags>,
}

impl From<&Entity> for MessageResponse {
    fn from(e: &Entity) -> Self {
        Self {
            id: e.id.clone(),
            content: e.content.clone(),
            role: e.role.unwrap_or(Role::Assistant),
            timestamp: e.created_at,
            parent_id: e.parent_id.clone(),
            metadata: if e.metadata.is_empty() {
                None
            } else {
                Some(e.metadata.clone())
            },
            chunk: ChunkFlags::from_entity(e),
        }
    }
}

/// Tool-call response shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResponse {
    pub id: String,
    pub tool_name: String,
    /// Serialized arguments, exactly as stored.
    pub arguments: String,
    /// Serialized result, exactly as stored.
    pub result: String,
    pub timestamp: DateTime<Utc>,
    /// The message that triggered the call.
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<ChunkFlags>,
}

impl From<&Entity> for ToolCallResponse {
    fn from(e: &Entity) -> Self {
        Self {
            id: e.id.clone(),
            tool_name: e.tool_name.clone().unwrap_or_default(),
            arguments: e.tool_args.clone().unwrap_or_default(),
            result: e.content.clone(),
            timestamp: e.created_at,
            message_id: e.parent_id.clone(),
            chunk: ChunkFlags::from_entity(e),
        }
    }
}

/// Which kind of record a search result points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    Message,
    ToolCall,
}

impl From<EntityKind> for ResultType {
    fn from(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Message => Self::Message,
            EntityKind::ToolCall => Self::ToolCall,
        }
    }
}

/// Search result shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub snippet: String,
    pub timestamp: DateTime<Utc>,
    pub score: f32,
    #[serde(rename = "type")]
    pub result_type: ResultType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_chunk: Option<bool>,
}

impl SearchResult {
    pub fn from_entity(e: &Entity, score: f32) -> Self {
        Self {
            id: e.id.clone(),
            snippet: e.snippet.clone(),
            timestamp: e.created_at,
            score,
            result_type: e.kind.into(),
            is_chunk: if e.is_chunk { Some(true) } else { None },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_response_from_entity() {
        let mut e = Entity::message(Role::User, "hello");
        e.snippet = "hello".into();
        let r = MessageResponse::from(&e);
        assert_eq!(r.content, "hello");
        assert_eq!(r.role, Role::User);
        assert!(r.chunk.is_none());
        assert!(r.metadata.is_none());
    }

    #[test]
    fn chunk_flags_present_on_chunked_records() {
        let mut e = Entity::message(Role::Assistant, "slice 0");
        e.chunk_parent_id = Some("group_9".into());
        e.chunk_index = Some(0);
        let r = MessageResponse::from(&e);
        let flags = r.chunk.unwrap();
        assert!(!flags.is_chunk);
        assert_eq!(flags.chunk_index, 0);
        assert_eq!(flags.chunk_parent_id, "group_9");
    }

    #[test]
    fn search_result_type_field_name() {
        let e = Entity::tool_call("calc", "{}", "42", "msg_1");
        let r = SearchResult::from_entity(&e, 0.9);
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("\"type\":\"tool_call\""));
    }

    #[test]
    fn tool_call_response_carries_serialized_payloads() {
        let e = Entity::tool_call("calc", r#"{"a":1}"#, r#"{"sum":2}"#, "msg_2");
        let r = ToolCallResponse::from(&e);
        assert_eq!(r.arguments, r#"{"a":1}"#);
        assert_eq!(r.result, r#"{"sum":2}"#);
        assert_eq!(r.message_id.as_deref(), Some("msg_2"));
    }
}
