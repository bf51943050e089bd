//! `get_period_messages` — time-bucketed retrieval.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use engram_core::{RetrievalTool, ToolError, ToolResult};
use engram_store::Repository;

use crate::args;

/// Fetch top-level entities from a named period or a custom RFC 3339 range.
pub struct GetPeriodMessagesTool {
    repo: Arc<Repository>,
}

impl GetPeriodMessagesTool {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }
}

/// Resolve a period token (or `start..end` range) against `now`.
fn resolve_period(period: &str, now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>), ToolError> {
    match period {
        "today" => Ok((now - Duration::days(1), now)),
        "week" => Ok((now - Duration::days(7), now)),
        "month" => Ok((now - Duration::days(30), now)),
        "older" => Ok((DateTime::<Utc>::MIN_UTC, now - Duration::days(30))),
        custom => {
            let Some((start, end)) = custom.split_once("..") else {
                return Err(ToolError::InvalidArguments(format!(
                    "unrecognized period '{custom}'; use today|week|month|older or start..end"
                )));
            };
            let parse = |s: &str| {
                DateTime::parse_from_rfc3339(s.trim())
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| {
                        ToolError::InvalidArguments(format!("invalid RFC 3339 timestamp '{s}': {e}"))
                    })
            };
            let (from, to) = (parse(start)?, parse(end)?);
            if from >= to {
                return Err(ToolError::InvalidArguments(
                    "period start must precede end".into(),
                ));
            }
            Ok((from, to))
        }
    }
}

#[async_trait]
impl RetrievalTool for GetPeriodMessagesTool {
    fn name(&self) -> &str {
        "get_period_messages"
    }

    fn description(&self) -> &str {
        "List entities from a time period: today, week, month, older, or a custom \
         'start..end' RFC 3339 range. Newest first."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "period": {
                    "type": "string",
                    "description": "today | week | month | older, or '2026-01-01T00:00:00Z..2026-02-01T00:00:00Z'"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum results (default 20, max 100)",
                    "default": 20
                }
            },
            "required": ["period"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let period = args::require_str(&arguments, "period")?;
        let limit = args::optional_limit(&arguments, 20)?;
        let (from, to) = resolve_period(&period, Utc::now())?;

        let entities = self
            .repo
            .in_period(from, to, limit)
            .await
            .map_err(|e| args::exec_error(self.name(), e))?;

        if entities.is_empty() {
            return Ok(ToolResult::empty(format!("No entities in period '{period}'.")));
        }
        let data: Vec<serde_json::Value> = entities.iter().map(args::entity_to_value).collect();
        Ok(ToolResult::ok(
            serde_json::to_string_pretty(&data).unwrap_or_default(),
            Some(serde_json::Value::Array(data)),
        ))
    }
}
