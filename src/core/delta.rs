//! Update deltas and their JSON wire format.
//!
//! A batch on the wire is a JSON array:
//!
//! ```json
//! [{ "moduleId": "…", "metadataDelta": "<base64>", "ilDelta": "<base64>", "updatedTypes": [33554434] }]
//! ```
//!
//! `metadataPatch`, `codePatch` and `updatedTypeTokens` are accepted as aliases.
//! `updatedTypes` may be missing or `null`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{ModuleId, TypeToken};

/// Errors while reading a delta batch.
#[derive(Debug, Error)]
pub enum DeltaFormatError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("malformed delta batch")]
    Json(#[from] serde_json::Error),
}

/// One incremental patch for one module build.
///
/// Immutable once created. Payloads are shared, so clones are cheap and the
/// cache can hand out snapshots without copying patch bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    #[serde(rename = "moduleId")]
    module_id: ModuleId,

    #[serde(rename = "metadataDelta", alias = "metadataPatch", with = "base64_bytes")]
    metadata_patch: Arc<[u8]>,

    #[serde(rename = "ilDelta", alias = "codePatch", with = "base64_bytes")]
    code_patch: Arc<[u8]>,

    #[serde(
        rename = "updatedTypes",
        alias = "updatedTypeTokens",
        default,
        with = "token_list"
    )]
    updated_type_tokens: Arc<[TypeToken]>,
}

impl Delta {
    pub fn new(
        module_id: ModuleId,
        metadata_patch: impl Into<Arc<[u8]>>,
        code_patch: impl Into<Arc<[u8]>>,
        updated_type_tokens: impl IntoIterator<Item = TypeToken>,
    ) -> Self {
        Self {
            module_id,
            metadata_patch: metadata_patch.into(),
            code_patch: code_patch.into(),
            updated_type_tokens: updated_type_tokens.into_iter().collect(),
        }
    }

    #[inline]
    pub fn module_id(&self) -> ModuleId {
        self.module_id
    }

    #[inline]
    pub fn metadata_patch(&self) -> &[u8] {
        &self.metadata_patch
    }

    #[inline]
    pub fn code_patch(&self) -> &[u8] {
        &self.code_patch
    }

    #[inline]
    pub fn updated_type_tokens(&self) -> &[TypeToken] {
        &self.updated_type_tokens
    }
}

/// Decode a JSON batch.
pub fn parse_batch(json: &str) -> Result<Vec<Delta>, DeltaFormatError> {
    Ok(serde_json::from_str(json)?)
}

/// Read and decode a JSON batch file.
pub fn read_batch(path: &Path) -> Result<Vec<Delta>, DeltaFormatError> {
    let json = fs::read_to_string(path).map_err(|e| DeltaFormatError::Io(path.to_path_buf(), e))?;
    parse_batch(&json)
}

/// Encode a batch in the wire format.
pub fn encode_batch(deltas: &[Delta]) -> Result<String, DeltaFormatError> {
    Ok(serde_json::to_string_pretty(deltas)?)
}

mod base64_bytes {
    use std::sync::Arc;

    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(bytes: &Arc<[u8]>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Arc<[u8]>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Arc::from)
            .map_err(D::Error::custom)
    }
}

mod token_list {
    use std::sync::Arc;

    use serde::{Deserialize, Deserializer, Serializer};

    use crate::core::TypeToken;

    pub fn serialize<S: Serializer>(tokens: &Arc<[TypeToken]>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(tokens.iter())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Arc<[TypeToken]>, D::Error> {
        let tokens = Option::<Vec<TypeToken>>::deserialize(deserializer)?;
        Ok(tokens.unwrap_or_default().into())
    }
}

// =============================================================================
// Tests
// =============================================================================
