//! Interactive tools exposed via Model Context Protocol
//!
//! Five healthcare lookups, each mapped to one backend query: FDA drug data,
//! PubMed literature, Health.gov topics, clinical trials, and ICD-10 codes.

use rust_mcp_sdk::{
    macros,
    schema::{CallToolRequestParams, CallToolResult, ContentBlock, TextContent, Tool},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::utils::{
    normalize_date_range, normalize_icd_code, normalize_language, normalize_max_results,
    normalize_search_type, normalize_trial_status, require_text, DEFAULT_ICD_RESULTS,
    DEFAULT_PUBMED_RESULTS, DEFAULT_TRIALS_RESULTS,
};
use crate::mcp::rpc::{
    app_error_to_json_rpc, json_rpc_error, json_rpc_error_with_data, json_rpc_result,
};
use crate::{errors::AppError, AppState};

#[macros::mcp_tool(
    name = "fda_drug_lookup",
    description = "Look up FDA drug information by drug name"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct FdaDrugLookupTool {
    pub drug_name: String,
    pub search_type: Option<String>,
}

#[macros::mcp_tool(
    name = "pubmed_search",
    description = "Search PubMed for medical literature"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct PubmedSearchTool {
    pub query: String,
    pub max_results: Option<u32>,
    pub date_range: Option<String>,
}

#[macros::mcp_tool(
    name = "health_topics",
    description = "Get health topic information from Health.gov"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct HealthTopicsTool {
    pub topic: String,
    pub language: Option<String>,
}

#[macros::mcp_tool(
    name = "clinical_trials_search",
    description = "Search for clinical trials by condition and status"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct ClinicalTrialsSearchTool {
    pub condition: String,
    pub status: Option<String>,
    pub max_results: Option<u32>,
}

#[macros::mcp_tool(
    name = "lookup_icd_code",
    description = "Look up ICD-10 codes and medical terminology"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct LookupIcdCodeTool {
    pub code: Option<String>,
    pub description: Option<String>,
    pub max_results: Option<u32>,
}

pub fn build_tools_list() -> Vec<Tool> {
    vec![
        FdaDrugLookupTool::tool(),
        PubmedSearchTool::tool(),
        HealthTopicsTool::tool(),
        ClinicalTrialsSearchTool::tool(),
        LookupIcdCodeTool::tool(),
    ]
}

pub async fn handle_tools_call(
    state: &AppState,
    id: Option<Value>,
    params: Option<Value>,
) -> Value {
    let Some(raw_params) = params else {
        return json_rpc_error(id, -32602, "Invalid params");
    };

    let tool_call: CallToolRequestParams = match serde_json::from_value(raw_params) {
        Ok(value) => value,
        Err(_) => return json_rpc_error(id, -32602, "Invalid params"),
    };

    let arguments = json!(tool_call.arguments.unwrap_or_default());
    let outcome = match tool_call.name.as_str() {
        "fda_drug_lookup" => call_fda_drug_lookup(state, arguments).await,
        "pubmed_search" => call_pubmed_search(state, arguments).await,
        "health_topics" => call_health_topics(state, arguments).await,
        "clinical_trials_search" => call_clinical_trials_search(state, arguments).await,
        "lookup_icd_code" => call_lookup_icd_code(state, arguments).await,
        _ => {
            return json_rpc_error_with_data(
                id,
                -32601,
                "Method not found",
                Some(json!({
                    "code": "tool_not_found",
                    "message": "unknown tool name",
                    "details": {
                        "name": tool_call.name,
                    },
                })),
            )
        }
    };

    match outcome {
        Ok(result) => json_rpc_result(
            id,
            serde_json::to_value(result).expect("tool result serialization"),
        ),
        Err(err) => app_error_to_json_rpc(id, err),
    }
}

async fn call_fda_drug_lookup(state: &AppState, arguments: Value) -> Result<CallToolResult, AppError> {
    let args: FdaDrugLookupTool = parse_tool_arguments(arguments)?;
    let drug_name = require_text(
        &args.drug_name,
        "invalid_drug_name",
        "drug_name must be a non-empty string",
    )?;
    let search_type = normalize_search_type(args.search_type)?;

    let data = state
        .provider
        .fetch(
            "/api/fda",
            &[("drug_name", drug_name), ("search_type", search_type)],
        )
        .await?;
    Ok(backend_tool_result(data))
}

async fn call_pubmed_search(state: &AppState, arguments: Value) -> Result<CallToolResult, AppError> {
    let args: PubmedSearchTool = parse_tool_arguments(arguments)?;
    let query = require_text(
        &args.query,
        "invalid_query",
        "query must be a non-empty string",
    )?;
    let max_results = normalize_max_results(args.max_results, DEFAULT_PUBMED_RESULTS)?;

    let mut params = vec![("query", query), ("max_results", max_results.to_string())];
    if let Some(date_range) = normalize_date_range(args.date_range)? {
        params.push(("date_range", date_range));
    }

    let data = state.provider.fetch("/api/pubmed", &params).await?;
    Ok(backend_tool_result(data))
}

async fn call_health_topics(state: &AppState, arguments: Value) -> Result<CallToolResult, AppError> {
    let args: HealthTopicsTool = parse_tool_arguments(arguments)?;
    let topic = require_text(
        &args.topic,
        "invalid_topic",
        "topic must be a non-empty string",
    )?;
    let language = normalize_language(args.language)?;

    let data = state
        .provider
        .fetch("/api/health_finder", &[("topic", topic), ("language", language)])
        .await?;
    Ok(backend_tool_result(data))
}

async fn call_clinical_trials_search(
    state: &AppState,
    arguments: Value,
) -> Result<CallToolResult, AppError> {
    let args: ClinicalTrialsSearchTool = parse_tool_arguments(arguments)?;
    let condition = require_text(
        &args.condition,
        "invalid_condition",
        "condition must be a non-empty string",
    )?;
    let status = normalize_trial_status(args.status)?;
    let max_results = normalize_max_results(args.max_results, DEFAULT_TRIALS_RESULTS)?;

    let data = state
        .provider
        .fetch(
            "/api/clinical_trials",
            &[
                ("condition", condition),
                ("status", status),
                ("max_results", max_results.to_string()),
            ],
        )
        .await?;
    Ok(backend_tool_result(data))
}

async fn call_lookup_icd_code(
    state: &AppState,
    arguments: Value,
) -> Result<CallToolResult, AppError> {
    let args: LookupIcdCodeTool = parse_tool_arguments(arguments)?;
    let code = normalize_icd_code(args.code)?;
    let description = args
        .description
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    let max_results = normalize_max_results(args.max_results, DEFAULT_ICD_RESULTS)?;

    if code.is_none() && description.is_none() {
        return Err(AppError::bad_request(
            "missing_lookup_key",
            "provide at least one of: code, description",
        ));
    }

    let mut params = vec![("max_results", max_results.to_string())];
    if let Some(code) = code {
        params.push(("code", code));
    }
    if let Some(description) = description {
        params.push(("description", description));
    }

    let data = state
        .provider
        .fetch("/api/medical_terminology", &params)
        .await?;
    Ok(backend_tool_result(data))
}

fn parse_tool_arguments<T: serde::de::DeserializeOwned>(arguments: Value) -> Result<T, AppError> {
    serde_json::from_value(arguments).map_err(|_| {
        AppError::bad_request(
            "invalid_arguments",
            "tool arguments do not match the expected schema",
        )
    })
}

fn backend_tool_result(data: Value) -> CallToolResult {
    let text = serde_json::to_string_pretty(&data).expect("backend payload serialization");
    CallToolResult {
        content: vec![ContentBlock::from(TextContent::new(text, None, None))],
        is_error: None,
        meta: None,
        structured_content: data.as_object().cloned(),
    }
}
