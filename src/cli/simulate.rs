//! `hotdelta simulate`: run a batch through the agent against a manifest.
//!
//! The manifest's modules are loaded first, the agent attaches, the batch is
//! applied, and then every `--late` module is loaded so replay can be observed.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use super::common::plural_count;
use crate::agent::HotReloadAgent;
use crate::config::AgentConfig;
use crate::core::{Delta, read_batch};
use crate::log;
use crate::logger::{LogSink, MemorySink, TerminalSink};
use crate::runtime::ModuleRegistry;
use crate::runtime::manifest::{Journal, JournalEntry, Manifest};

/// Patch count for one module instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceReport {
    pub instance: String,
    pub late: bool,
    pub patches: usize,
}

/// Everything observed during one simulation.
#[derive(Debug, Clone, Default)]
pub struct SimulationReport {
    pub instances: Vec<InstanceReport>,
    pub invocations: Vec<JournalEntry>,
    pub diagnostics: Vec<String>,
}

/// Run a simulation and print its report.
pub fn run_simulation(config: &AgentConfig, manifest: &Path, batch: &Path, late: &[String]) -> Result<()> {
    let manifest = Manifest::load(manifest)
        .with_context(|| format!("cannot load manifest {}", manifest.display()))?;
    let deltas = read_batch(batch).with_context(|| format!("cannot read batch {}", batch.display()))?;

    let report = simulate(config, &manifest, &deltas, late)?;
    print_report(&report);
    Ok(())
}

/// Run a simulation without printing.
pub fn simulate(
    config: &AgentConfig,
    manifest: &Manifest,
    deltas: &[Delta],
    late: &[String],
) -> Result<SimulationReport> {
    let registry = Arc::new(ModuleRegistry::new());
    let journal = Arc::new(Journal::new());
    manifest.install(&registry, &journal);

    let initial = manifest.load_instances(&registry)?;
    crate::debug!("simulate"; "loaded {}", plural_count(initial.len(), "module instance"));

    let sink = Arc::new(MemorySink::new());
    let agent = HotReloadAgent::new(
        Arc::clone(&registry),
        Arc::clone(&sink) as Arc<dyn LogSink>,
        config.agent,
    );
    agent.apply_deltas(deltas);

    let mut loaded_late = Vec::with_capacity(late.len());
    for name in late {
        loaded_late.push(registry.load(name)?);
    }
    agent.dispose();

    let instances = initial
        .iter()
        .map(|h| (h, false))
        .chain(loaded_late.iter().map(|h| (h, true)))
        .map(|(handle, late)| InstanceReport {
            instance: handle.to_string(),
            late,
            patches: registry.patches(handle).len(),
        })
        .collect();

    Ok(SimulationReport {
        instances,
        invocations: journal.entries(),
        diagnostics: sink.messages(),
    })
}

fn print_report(report: &SimulationReport) {
    log!("simulate"; "{}", plural_count(report.instances.len(), "module instance"));
    for instance in &report.instances {
        let marker = if instance.late { " (late)" } else { "" };
        log!(
            "simulate";
            "  {}{} {}",
            instance.instance.bold(),
            marker.dimmed(),
            plural_count(instance.patches, "delta")
        );
    }

    log!("simulate"; "{}", plural_count(report.invocations.len(), "handler invocation"));
    for entry in &report.invocations {
        log!("simulate"; "  {}.{} [{}]", entry.handler, entry.hook.cyan(), entry.updated.join(", "));
    }

    let sink = TerminalSink;
    for message in &report.diagnostics {
        sink.log(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::DELTAS_APPLIED;
    use crate::config::AgentSectionConfig;
    use crate::core::{ModuleId, TypeToken, parse_batch};

    const MANIFEST: &str = r#"
[[module]]
name = "Core"
id = "00000000-0000-0000-0000-0000000000c0"
types = [{ token = 33554434, name = "Core.Cache" }]
handlers = ["Core.Handler"]

[[module]]
name = "App"
id = "00000000-0000-0000-0000-0000000000a0"
references = ["Core"]
instances = 2
handlers = ["App.Handler"]

[[handler]]
type = "App.Handler"
fail = ["ClearCache"]
"#;

    fn core_delta() -> Delta {
        Delta::new(ModuleId::from_u128(0xc0), vec![1u8], vec![2u8], [TypeToken(33554434)])
    }

    fn app_delta() -> Delta {
        Delta::new(ModuleId::from_u128(0xa0), vec![3u8], vec![4u8], Vec::new())
    }

    #[test]
    fn test_simulate_patches_and_replays() {
        let manifest = Manifest::parse(MANIFEST).unwrap();
        let report = simulate(
            &AgentConfig::default(),
            &manifest,
            &[core_delta(), app_delta()],
            &["App".to_string()],
        )
        .unwrap();

        let patches: Vec<_> = report.instances.iter().map(|i| (i.late, i.patches)).collect();
        assert_eq!(patches, vec![(false, 1), (false, 1), (false, 1), (true, 1)]);
        assert_eq!(
            report.diagnostics.iter().filter(|m| *m == DELTAS_APPLIED).count(),
            2
        );
    }

    #[test]
    fn test_simulate_orders_handlers_and_reports_failures() {
        let manifest = Manifest::parse(MANIFEST).unwrap();
        let report = simulate(&AgentConfig::default(), &manifest, &[core_delta()], &[]).unwrap();

        let order: Vec<_> = report
            .invocations
            .iter()
            .map(|e| format!("{}.{}", e.handler, e.hook))
            .collect();
        assert_eq!(
            order,
            vec![
                "Core.Handler.ClearCache",
                "App.Handler.ClearCache",
                "Core.Handler.UpdateApplication",
                "App.Handler.UpdateApplication",
            ]
        );
        assert_eq!(report.invocations[0].updated, vec!["Core.Cache"]);
        assert!(
            report
                .diagnostics
                .iter()
                .any(|m| m.contains("App.Handler.ClearCache"))
        );
    }

    #[test]
    fn test_simulate_without_replay() {
        let manifest = Manifest::parse(MANIFEST).unwrap();
        let config = AgentConfig {
            agent: AgentSectionConfig {
                replay_on_load: false,
            },
            ..AgentConfig::default()
        };
        let report = simulate(&config, &manifest, &[app_delta()], &["App".to_string()]).unwrap();

        let late = report.instances.last().unwrap();
        assert!(late.late);
        assert_eq!(late.patches, 0);
    }

    #[test]
    fn test_simulate_unknown_late_module() {
        let manifest = Manifest::parse(MANIFEST).unwrap();
        let batch = parse_batch("[]").unwrap();
        assert!(simulate(&AgentConfig::default(), &manifest, &batch, &["Nope".to_string()]).is_err());
    }
}
