use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use shared::error::SessionError;
use storage::{path::apply_ops, DocumentKey, FieldOp, FieldPath, Snapshot, StoreError};
use tracing::{debug, warn};

use crate::ApiContext;

/// Number of times a conditional write is re-planned against a fresh read before giving up.
pub const MAX_WRITE_ATTEMPTS: usize = 3;

/// The narrow field writes a mutation needs, plus what it reports back to the caller.
///
/// An empty `ops` list means the document already satisfies the request and nothing is
/// written.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation<T> {
    pub ops: Vec<FieldOp>,
    pub output: T,
}

impl<T> Mutation<T> {
    pub fn write(ops: Vec<FieldOp>, output: T) -> Self {
        Self { ops, output }
    }

    pub fn unchanged(output: T) -> Self {
        Self {
            ops: Vec::new(),
            output,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.ops.is_empty()
    }

    /// Applies the writes to a copy of `document`, as the store would.
    pub fn apply<D>(&self, document: &D) -> Result<D, SessionError>
    where
        D: Serialize + DeserializeOwned,
    {
        let current = serde_json::to_value(document).map_err(encode_error)?;
        let next = apply_ops(&current, &self.ops).map_err(store_error)?;
        serde_json::from_value(next).map_err(|e| SessionError::Internal(e.to_string()))
    }
}

pub(crate) fn set<V: Serialize>(path: FieldPath, value: &V) -> Result<FieldOp, SessionError> {
    let value = serde_json::to_value(value).map_err(encode_error)?;
    Ok(FieldOp::Set(path, value))
}

/// Guarded read-modify-write.
///
/// Reads the document, lets `plan` derive the writes from that exact version and applies
/// them only if nobody else wrote in between. On a version conflict `plan` runs again on
/// the fresh document, so existence and authorization are re-checked every attempt.
pub(crate) async fn commit<D, T, F>(
    ctx: &ApiContext,
    key: &DocumentKey,
    kind: &str,
    mut plan: F,
) -> Result<T, SessionError>
where
    D: DeserializeOwned,
    F: FnMut(&D) -> Result<Mutation<T>, SessionError>,
{
    for attempt in 1..=MAX_WRITE_ATTEMPTS {
        let snapshot = fetch(ctx, key, kind).await?;
        let document: D = decode(&snapshot, kind)?;
        let Mutation { ops, output } = plan(&document)?;
        if ops.is_empty() {
            debug!(%key, "mutation already satisfied; nothing written");
            return Ok(output);
        }

        match ctx.store.update(key, &ops, Some(snapshot.version)).await {
            Ok(written) => {
                debug!(
                    %key,
                    version = written.version,
                    paths = %describe_paths(&ops),
                    "mutation committed"
                );
                return Ok(output);
            }
            Err(StoreError::VersionConflict {
                expected, actual, ..
            }) => {
                warn!(%key, attempt, expected, actual, "concurrent write detected; re-reading");
            }
            Err(err) => return Err(store_error(err)),
        }
    }

    Err(SessionError::Conflict(format!(
        "{kind} {} kept changing; gave up after {MAX_WRITE_ATTEMPTS} attempts",
        key.id
    )))
}

pub(crate) async fn fetch(
    ctx: &ApiContext,
    key: &DocumentKey,
    kind: &str,
) -> Result<Snapshot, SessionError> {
    ctx.store
        .get(key)
        .await
        .map_err(store_error)?
        .ok_or_else(|| SessionError::not_found(format!("{kind} {} not found", key.id)))
}

pub(crate) fn decode<D: DeserializeOwned>(
    snapshot: &Snapshot,
    kind: &str,
) -> Result<D, SessionError> {
    decode_value(snapshot.data.clone(), kind)
}

pub(crate) fn decode_value<D: DeserializeOwned>(data: Value, kind: &str) -> Result<D, SessionError> {
    serde_json::from_value(data)
        .map_err(|e| SessionError::Internal(format!("stored {kind} is malformed: {e}")))
}

pub(crate) fn encode_error(err: serde_json::Error) -> SessionError {
    SessionError::Internal(format!("failed to encode document: {err}"))
}

pub fn store_error(err: StoreError) -> SessionError {
    if err.is_unavailable() {
        return SessionError::StoreUnavailable(err.to_string());
    }
    match err {
        StoreError::NotFound(key) => SessionError::not_found(format!("{key} not found")),
        StoreError::AlreadyExists(key) => SessionError::Conflict(format!("{key} already exists")),
        StoreError::VersionConflict { key, .. } => {
            SessionError::Conflict(format!("{key} was modified concurrently"))
        }
        other => SessionError::Internal(other.to_string()),
    }
}

fn describe_paths(ops: &[FieldOp]) -> String {
    ops.iter()
        .map(|op| op.path().to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
#[path = "tests/mutation_tests.rs"]
mod tests;
