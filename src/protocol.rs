//! Request and response types of the parse and version operations.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::driver::Driver;
use crate::node::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseRequest {
    /// The native tree produced by the language parser.
    pub native: Node,
    /// Source text, when source-aware stages should run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseResponse {
    pub status: Status,
    #[serde(default)]
    pub errors: Vec<String>,
    pub uast: Option<Node>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionRequest {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionResponse {
    pub status: Status,
    pub version: String,
    pub build: String,
}

/// Normalizes the request's native tree. Failures are reported in the response.
pub fn parse(driver: &Driver, req: &ParseRequest) -> ParseResponse {
    let result = match &req.content {
        Some(code) => driver.transform_with_code(&req.native, code),
        None => driver.transform(&req.native),
    };
    match result {
        Ok(uast) => ParseResponse {
            status: Status::Ok,
            errors: Vec::new(),
            uast: Some(uast),
        },
        Err(err) => {
            warn!(
                driver = driver.name(),
                file = req.filename.as_deref().unwrap_or("<input>"),
                error = %err,
                "parse failed"
            );
            ParseResponse {
                status: Status::Error,
                errors: vec![err.to_string()],
                uast: None,
            }
        }
    }
}

pub fn version(_req: &VersionRequest) -> VersionResponse {
    VersionResponse {
        status: Status::Ok,
        version: env!("CARGO_PKG_VERSION").to_string(),
        build: env!("CARGO_PKG_NAME").to_string(),
    }
}
