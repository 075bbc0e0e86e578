//! Agent error types.
//!
//! None of these reach the caller of `apply_deltas`: they are rendered into the
//! log sink at the agent boundary.

use thiserror::Error;

use crate::runtime::RuntimeError;

/// Failure in the agent's own orchestration (aborts the current batch).
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("failed to apply delta for module {module_id} to {module}")]
    Patch {
        module_id: String,
        module: String,
        #[source]
        source: RuntimeError,
    },
}

/// Failure inside one handler action (contained, never aborts a batch).
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("exception from '{action}': {error:#}")]
    Failed { action: String, error: anyhow::Error },

    #[error("exception from '{action}': panicked: {message}")]
    Panicked { action: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_error_chain() {
        let err = AgentError::Patch {
            module_id: "8c1b9f3e-5d4a-4f6e-9a1b-2c3d4e5f6a7b".into(),
            module: "App#0".into(),
            source: RuntimeError::PatchRejected {
                module: "App#0".into(),
                reason: "bad metadata".into(),
            },
        };
        assert_eq!(
            format!("{:#}", anyhow::Error::from(err)),
            "failed to apply delta for module 8c1b9f3e-5d4a-4f6e-9a1b-2c3d4e5f6a7b to App#0: \
             patch rejected by `App#0`: bad metadata"
        );
    }

    #[test]
    fn test_action_error_names_action() {
        let err = ActionError::Failed {
            action: "App.Cache.ClearCache".into(),
            error: anyhow::anyhow!("boom"),
        };
        assert_eq!(err.to_string(), "exception from 'App.Cache.ClearCache': boom");
    }
}
