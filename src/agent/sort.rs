//! Dependency ordering of loaded modules.
//!
//! Handlers in a dependency must run before handlers in its dependents (a
//! reflection cache in a base library is cleared before a serializer rebuilds
//! its own cache from it). Modules are therefore sorted so every referenced
//! module in the set comes first.
//!
//! ```text
//! App ──► Ui ──► Core          sorted: Core, Ui, App
//!  └────────────►┘
//! ```
//!
//! Cycles are tolerated: a module is marked visited before its references are
//! walked, so a cycle ends at the first member seen again. The result is some
//! valid reverse-postorder, never an error.

use rustc_hash::FxHashSet;

/// Sort `modules` so that referenced modules precede the modules referencing them.
///
/// Modules are keyed by `name_of`; references that name no module in the set
/// are ignored. When two modules share a name only the first is kept.
pub fn sort_modules<M, N, R>(modules: &[M], name_of: N, references_of: R) -> Vec<M>
where
    M: Clone,
    N: Fn(&M) -> String,
    R: Fn(&M) -> Vec<String>,
{
    let names: Vec<String> = modules.iter().map(&name_of).collect();
    let mut sorter = Sorter {
        modules,
        names: &names,
        references_of: &references_of,
        visited: FxHashSet::default(),
        sorted: Vec::with_capacity(modules.len()),
    };

    for index in 0..modules.len() {
        sorter.visit(index);
    }
    sorter.sorted
}

struct Sorter<'a, M, R> {
    modules: &'a [M],
    names: &'a [String],
    references_of: &'a R,
    visited: FxHashSet<&'a str>,
    sorted: Vec<M>,
}

impl<'a, M, R> Sorter<'a, M, R>
where
    M: Clone,
    R: Fn(&M) -> Vec<String>,
{
    fn visit(&mut self, index: usize) {
        let names = self.names;
        if !self.visited.insert(names[index].as_str()) {
            return;
        }
        crate::debug!("sort"; "visiting {}", names[index]);

        for reference in (self.references_of)(&self.modules[index]) {
            if let Some(dependency) = names.iter().position(|n| *n == reference) {
                self.visit(dependency);
            }
        }

        self.sorted.push(self.modules[index].clone());
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Module {
        name: &'static str,
        refs: Vec<&'static str>,
    }

    fn module(name: &'static str, refs: &[&'static str]) -> Module {
        Module {
            name,
            refs: refs.to_vec(),
        }
    }

    fn sort(modules: &[Module]) -> Vec<&'static str> {
        sort_modules(
            modules,
            |m| m.name.to_string(),
            |m| m.refs.iter().map(|r| r.to_string()).collect(),
        )
        .into_iter()
        .map(|m| m.name)
        .collect()
    }

    fn position(order: &[&str], name: &str) -> usize {
        order.iter().position(|n| *n == name).unwrap()
    }

    #[test]
    fn test_dependencies_come_first() {
        let modules = vec![
            module("App", &["Ui", "Core"]),
            module("Ui", &["Core"]),
            module("Core", &[]),
        ];
        assert_eq!(sort(&modules), vec!["Core", "Ui", "App"]);
    }

    #[test]
    fn test_unrelated_modules_keep_input_order() {
        let modules = vec![module("B", &[]), module("A", &[]), module("C", &[])];
        assert_eq!(sort(&modules), vec!["B", "A", "C"]);
    }

    #[test]
    fn test_references_outside_set_ignored() {
        let modules = vec![module("App", &["System.Runtime", "Core"]), module("Core", &["System.Private"])];
        assert_eq!(sort(&modules), vec!["Core", "App"]);
    }

    #[test]
    fn test_cycle_terminates_with_each_module_once() {
        let modules = vec![module("A", &["B"]), module("B", &["A"]), module("C", &[])];
        let order = sort(&modules);

        assert_eq!(order.len(), 3);
        for name in ["A", "B", "C"] {
            assert_eq!(order.iter().filter(|n| **n == name).count(), 1);
        }
        // First visited member of the cycle is appended last.
        assert_eq!(order, vec!["B", "A", "C"]);
    }

    #[test]
    fn test_self_reference() {
        let modules = vec![module("A", &["A"]), module("B", &["A"])];
        assert_eq!(sort(&modules), vec!["A", "B"]);
    }

    #[test]
    fn test_duplicate_names_visited_once() {
        let modules = vec![module("A", &[]), module("A", &["B"]), module("B", &[])];
        let order = sort(&modules);
        assert_eq!(order, vec!["A", "B"]);
    }

    #[test]
    fn test_diamond_precedence() {
        let modules = vec![
            module("Top", &["Left", "Right"]),
            module("Left", &["Base"]),
            module("Right", &["Base"]),
            module("Base", &[]),
        ];
        let order = sort(&modules);

        assert_eq!(order.len(), 4);
        assert!(position(&order, "Base") < position(&order, "Left"));
        assert!(position(&order, "Base") < position(&order, "Right"));
        assert!(position(&order, "Left") < position(&order, "Top"));
        assert!(position(&order, "Right") < position(&order, "Top"));
    }

    #[test]
    fn test_empty_input() {
        assert!(sort(&[]).is_empty());
    }
}
