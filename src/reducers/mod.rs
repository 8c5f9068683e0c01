//! Merge semantics for folding a node's partial update into workflow
//! state.
//!
//! The merge is total and side-effect-free: every field of a
//! [`StateUpdate`] either appends, replaces, or map-merges into the
//! state, and unspecified fields retain their prior values. Channels:
//!
//! - **append**: `messages`, `errors` - concatenated, never overwritten
//! - **replace**: `intent`, `confidence`, `params`, `response_text`
//! - **map-merge**: `context`, `response_data` - shallow insert, with
//!   every key validated against the writing node's declared key set
//!
//! An undeclared key fails the whole merge with [`SchemaError`] before
//! anything is written, so a rejected update leaves the state untouched.

use miette::Diagnostic;
use thiserror::Error;

use crate::message::push_bounded;
use crate::node::StateUpdate;
use crate::state::WorkflowState;

/// A node wrote a context or response-data key outside its declared set.
///
/// This is a node-contract bug, not a runtime condition: it is fatal and
/// should never occur in production.
#[derive(Debug, Clone, Error, Diagnostic, PartialEq, Eq)]
#[error("node '{node}' wrote undeclared key '{key}' into {channel}")]
#[diagnostic(
    code(dispatchflow::reducers::schema),
    help("Add the key to the node's declared_keys() or stop writing it.")
)]
pub struct SchemaError {
    pub node: String,
    pub key: String,
    /// `"context"` or `"response_data"`.
    pub channel: &'static str,
}

fn check_declared(
    node: &str,
    channel: &'static str,
    declared: &[&str],
    keys: impl Iterator<Item = impl AsRef<str>>,
) -> Result<(), SchemaError> {
    for key in keys {
        let key = key.as_ref();
        if !declared.contains(&key) {
            return Err(SchemaError {
                node: node.to_string(),
                key: key.to_string(),
                channel,
            });
        }
    }
    Ok(())
}

/// Fold `update` produced by `node` into `state`.
///
/// `declared` is the node's declared key set
/// ([`Node::declared_keys`](crate::node::Node::declared_keys)); it gates
/// the `context` and `response_data` channels. Validation runs before any
/// mutation, so a `SchemaError` leaves `state` exactly as it was.
pub fn apply_update(
    state: &mut WorkflowState,
    node: &str,
    declared: &[&str],
    update: &StateUpdate,
) -> Result<(), SchemaError> {
    if let Some(context) = &update.context {
        check_declared(node, "context", declared, context.keys())?;
    }
    if let Some(response_data) = &update.response_data {
        check_declared(node, "response_data", declared, response_data.keys())?;
    }

    if let Some(messages) = &update.messages {
        for message in messages {
            push_bounded(&mut state.messages, message.clone());
        }
    }
    if let Some(intent) = &update.intent {
        state.intent = Some(intent.clone());
    }
    if let Some(confidence) = update.confidence {
        state.confidence = Some(confidence);
    }
    if let Some(params) = &update.params {
        state.params = params.clone();
    }
    if let Some(context) = &update.context {
        for (key, value) in context {
            state.context.insert(key.clone(), value.clone());
        }
    }
    if let Some(text) = &update.response_text {
        state.response_text = Some(text.clone());
    }
    if let Some(response_data) = &update.response_data {
        for (key, value) in response_data {
            state.response_data.insert(key.clone(), value.clone());
        }
    }
    if let Some(errors) = &update.errors {
        state.errors.extend(errors.iter().cloned());
    }
    Ok(())
}
