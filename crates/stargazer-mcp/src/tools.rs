//! MCP tool implementations
//!
//! One tool is exposed:
//! - analysis_area: find stargazing sites in a bounding box and return one page

use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use stargazer_lib::SearchEngine;
use tracing::info;

use crate::types::{AnalysisAreaInput, AnalysisAreaOutput, ResponseMeta, ToolEnvelope};
use crate::Error;

pub const ANALYSIS_AREA: &str = "analysis_area";

/// Tool descriptor for `tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Every tool this server exposes.
pub fn list_tools() -> crate::Result<Vec<ToolDescriptor>> {
    let input_schema = serde_json::to_value(schemars::schema_for!(AnalysisAreaInput))
        .map_err(|e| Error::internal(e.to_string()))?;
    Ok(vec![ToolDescriptor {
        name: ANALYSIS_AREA,
        description: "Find candidate stargazing sites inside a bounding box: elevated \
                      terrain near a road, ranked by darkest sky first. Results are cached \
                      per filter set; request further pages with the same filters.",
        input_schema,
    }])
}

/// Site search tool handler
pub struct AnalysisAreaTool;

impl AnalysisAreaTool {
    /// Run the search for `arguments` and wrap the page in the response envelope.
    pub async fn execute(
        engine: &SearchEngine,
        arguments: Value,
    ) -> crate::Result<AnalysisAreaOutput> {
        let input: AnalysisAreaInput = serde_json::from_value(arguments)
            .map_err(|e| Error::invalid_param("arguments", e.to_string()))?;

        info!(
            south = input.south,
            west = input.west,
            north = input.north,
            east = input.east,
            network_type = %input.network_type,
            page = input.page,
            "analysis_area called"
        );

        let start = Instant::now();
        let page = engine
            .search(&input.params(), input.page, input.page_size)
            .await
            .map_err(|e| Error::from_search(&e))?;

        Ok(ToolEnvelope {
            data: page,
            meta: ResponseMeta::success(ANALYSIS_AREA, start.elapsed().as_millis() as u64),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_list_has_schema() {
        let tools = list_tools().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, ANALYSIS_AREA);
        assert_eq!(tools[0].input_schema["type"], "object");
        assert!(tools[0].input_schema["properties"]["south"].is_object());
    }

    #[test]
    fn test_descriptor_serializes_camel_case_schema_key() {
        let tools = list_tools().unwrap();
        let value = serde_json::to_value(&tools[0]).unwrap();
        assert!(value.get("inputSchema").is_some());
        assert!(value.get("input_schema").is_none());
    }
}
