//! `hotdelta inspect`: list the deltas in a batch file.

use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use super::common::plural_count;
use crate::core::{Delta, read_batch};
use crate::log;

/// Decode `batch` and print one line per delta.
pub fn inspect_batch(batch: &Path) -> Result<()> {
    let deltas = read_batch(batch).with_context(|| format!("cannot inspect {}", batch.display()))?;

    log!("inspect"; "{} in {}", plural_count(deltas.len(), "delta"), batch.display());
    for (index, delta) in deltas.iter().enumerate() {
        log!("inspect"; "{:>3}. {}", index + 1, describe(delta));
    }
    Ok(())
}

fn describe(delta: &Delta) -> String {
    let tokens = delta
        .updated_type_tokens()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "{}  metadata {} B, code {} B, types [{}]",
        delta.module_id().cyan(),
        delta.metadata_patch().len(),
        delta.code_patch().len(),
        tokens
    )
}
