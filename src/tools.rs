//! Domain-tool collaborator contract.
//!
//! Scoring, SQL lookups, compliance calculations and other business
//! collaborators sit behind [`DomainTool`]: a synchronous
//! request/response call keyed by org id and typed parameters. Failures
//! are structured [`ToolError`]s, never panics or ad-hoc exceptions
//! crossing the node boundary - a node maps a recoverable tool failure
//! into an [`ErrorEvent`](crate::errors::ErrorEvent) and an outage into
//! [`NodeError`](crate::node::NodeError).

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::Value;
use thiserror::Error;

/// Structured failures a domain tool may report.
#[derive(Debug, Error, Diagnostic)]
pub enum ToolError {
    /// The collaborator is down; nodes surface this as an
    /// infrastructure failure.
    #[error("tool unavailable: {message}")]
    #[diagnostic(code(dispatchflow::tools::unavailable))]
    Unavailable { message: String },

    /// The collaborator bounded its own latency and gave up.
    #[error("tool call timed out")]
    #[diagnostic(code(dispatchflow::tools::timeout))]
    Timeout,

    /// The request was understood and refused; a domain-level,
    /// recoverable condition.
    #[error("tool rejected request: {message}")]
    #[diagnostic(code(dispatchflow::tools::rejected))]
    Rejected { message: String },
}

/// Synchronous request/response collaborator keyed by org id.
#[async_trait]
pub trait DomainTool: Send + Sync {
    async fn call(
        &self,
        org_id: &str,
        params: &FxHashMap<String, Value>,
    ) -> Result<Value, ToolError>;
}

/// Adapter turning a plain function into a [`DomainTool`], for tests and
/// simple in-process tools.
///
/// # Examples
///
/// ```
/// use dispatchflow::tools::{DomainTool, FnTool};
/// use dispatchflow::utils::collections::context_map;
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let scoring = FnTool::new(|org_id, params| {
///     let count = params.get("count").and_then(|v| v.as_u64()).unwrap_or(0);
///     Ok(json!({"org": org_id, "scored": count}))
/// });
/// let result = scoring
///     .call("org-1", &context_map([("count", json!(3))]))
///     .await
///     .unwrap();
/// assert_eq!(result["scored"], 3);
/// # }
/// ```
pub struct FnTool<F> {
    f: F,
}

impl<F> FnTool<F>
where
    F: Fn(&str, &FxHashMap<String, Value>) -> Result<Value, ToolError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> DomainTool for FnTool<F>
where
    F: Fn(&str, &FxHashMap<String, Value>) -> Result<Value, ToolError> + Send + Sync,
{
    async fn call(
        &self,
        org_id: &str,
        params: &FxHashMap<String, Value>,
    ) -> Result<Value, ToolError> {
        (self.f)(org_id, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::collections::context_map;
    use serde_json::json;

    #[tokio::test]
    async fn fn_tool_passes_org_and_params_through() {
        let tool = FnTool::new(|org_id, params| {
            Ok(json!({
                "org": org_id,
                "count": params.get("count").cloned().unwrap_or(json!(0)),
            }))
        });
        let result = tool
            .call("org-9", &context_map([("count", json!(20))]))
            .await
            .unwrap();
        assert_eq!(result["org"], "org-9");
        assert_eq!(result["count"], 20);
    }

    #[tokio::test]
    async fn fn_tool_propagates_structured_errors() {
        let tool = FnTool::new(|_, _| {
            Err(ToolError::Rejected {
                message: "outside service area".into(),
            })
        });
        let err = tool
            .call("org-1", &FxHashMap::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Rejected { .. }));
    }
}
