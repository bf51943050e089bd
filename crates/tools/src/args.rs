//! Argument validation shared by every retrieval tool.

use engram_core::{Entity, EntityKind, MessageResponse, ToolCallResponse, ToolError, ToolResult};

pub(crate) const MAX_LIMIT: usize = 100;
pub(crate) const MAX_DEPTH: usize = 50;

/// A required, non-empty string argument.
pub(crate) fn require_str(args: &serde_json::Value, key: &str) -> Result<String, ToolError> {
    match args.get(key).and_then(|v| v.as_str()) {
        Some(s) if !s.trim().is_empty() => Ok(s.to_string()),
        Some(_) => Err(ToolError::InvalidArguments(format!("'{key}' must be non-empty"))),
        None => Err(ToolError::InvalidArguments(format!("missing '{key}' argument"))),
    }
}

/// A required, non-empty array of non-empty string ids.
pub(crate) fn require_ids(args: &serde_json::Value, key: &str) -> Result<Vec<String>, ToolError> {
    let Some(values) = args.get(key).and_then(|v| v.as_array()) else {
        return Err(ToolError::InvalidArguments(format!("missing '{key}' array")));
    };
    if values.is_empty() {
        return Err(ToolError::InvalidArguments(format!("'{key}' must not be empty")));
    }
    if values.len() > MAX_LIMIT {
        return Err(ToolError::InvalidArguments(format!(
            "'{key}' accepts at most {MAX_LIMIT} ids"
        )));
    }
    values
        .iter()
        .map(|v| match v.as_str() {
            Some(s) if !s.trim().is_empty() => Ok(s.to_string()),
            _ => Err(ToolError::InvalidArguments(format!(
                "'{key}' entries must be non-empty strings"
            ))),
        })
        .collect()
}

/// An optional positive limit, defaulted and capped at [`MAX_LIMIT`].
pub(crate) fn optional_limit(args: &serde_json::Value, default: usize) -> Result<usize, ToolError> {
    match args.get("limit") {
        None | Some(serde_json::Value::Null) => Ok(default),
        Some(v) => match v.as_u64() {
            Some(n) if n >= 1 && n as usize <= MAX_LIMIT => Ok(n as usize),
            _ => Err(ToolError::InvalidArguments(format!(
                "'limit' must be between 1 and {MAX_LIMIT}"
            ))),
        },
    }
}

/// An optional positive depth, defaulted and capped at [`MAX_DEPTH`].
pub(crate) fn optional_depth(args: &serde_json::Value, default: usize) -> Result<usize, ToolError> {
    match args.get("depth") {
        None | Some(serde_json::Value::Null) => Ok(default),
        Some(v) => match v.as_u64() {
            Some(n) if n >= 1 && n as usize <= MAX_DEPTH => Ok(n as usize),
            _ => Err(ToolError::InvalidArguments(format!(
                "'depth' must be between 1 and {MAX_DEPTH}"
            ))),
        },
    }
}

/// The typed not-found signal for single-id lookups.
pub(crate) fn not_found(id: &str) -> ToolResult {
    ToolResult {
        success: false,
        output: format!("not_found: {id}"),
        data: Some(serde_json::json!({ "error": "not_found", "id": id })),
    }
}

/// Map an entity to its wire shape by kind.
pub(crate) fn entity_to_value(entity: &Entity) -> serde_json::Value {
    match entity.kind {
        EntityKind::Message => {
            serde_json::to_value(MessageResponse::from(entity)).unwrap_or_default()
        }
        EntityKind::ToolCall => {
            serde_json::to_value(ToolCallResponse::from(entity)).unwrap_or_default()
        }
    }
}

/// Repository errors other than not-found become execution failures.
pub(crate) fn exec_error(tool_name: &str, error: engram_core::Error) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: tool_name.to_string(),
        reason: error.to_string(),
    }
}

/// True when the error is the repository's single-id miss.
pub(crate) fn is_not_found(error: &engram_core::Error) -> bool {
    matches!(
        error,
        engram_core::Error::Store(engram_core::StoreError::NotFound(_))
    )
}
