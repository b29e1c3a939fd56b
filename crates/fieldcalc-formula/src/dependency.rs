//! Dependency resolution across named formulas
//!
//! Formulas reference each other by name through `{name}`. Given the whole
//! set, [`resolve_formulas`] works out for every formula its transitive
//! dependencies, an evaluation order (layer) and the cross-formula errors:
//! cycles, and formulas that depend on an invalid one.
//!
//! Names are case-insensitive and canonicalised to lowercase.

use crate::parser::parse;
use crate::scanner::scan;
use crate::token::{Token, TokenKind, TokenNode};
use crate::validator::{validate, ErrorType, ValidationError};
use std::collections::{BTreeMap, BTreeSet};

/// A resolved formula
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FormulaEntry {
    /// Canonical (lowercase) name
    pub reference_name: String,
    /// Name as supplied
    pub reference_name_orig: String,
    pub formula: String,
    pub tokens: Vec<Token>,
    pub token_nodes: Vec<TokenNode>,
    pub validation_errors: Vec<ValidationError>,
    /// Evaluation layer starting at 1; 0 means it never resolved (cycle)
    pub order: usize,
    /// Defined formulas reachable through references, sorted
    pub dependencies: Vec<String>,
}

impl FormulaEntry {
    fn new(reference_name_orig: String, formula: String) -> Self {
        let tokens = scan(&formula);
        let token_nodes = parse(&formula);
        Self {
            reference_name: reference_name_orig.to_lowercase(),
            reference_name_orig,
            formula,
            tokens,
            token_nodes,
            validation_errors: Vec::new(),
            order: 0,
            dependencies: Vec::new(),
        }
    }

    /// Whether the formula carries no errors
    pub fn is_valid(&self) -> bool {
        self.validation_errors.is_empty()
    }

    /// Whether the formula got an evaluation layer
    pub fn is_resolved(&self) -> bool {
        self.order > 0
    }

    /// Lowercased reference names with their token index, in token order
    pub fn references(&self) -> impl Iterator<Item = (usize, String)> + '_ {
        self.tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| t.kind == TokenKind::ReferenceName)
            .map(|(i, t)| (i, t.value.to_lowercase()))
    }
}

/// Direct references between formula names
///
/// Edges may point at names that are not formulas themselves (plain record
/// fields or unknown names); those are leaves.
#[derive(Debug, Default)]
pub struct ReferenceGraph {
    references: BTreeMap<String, BTreeSet<String>>,
}

impl ReferenceGraph {
    /// Create a new empty reference graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an edge: `from` references `to`
    pub fn add_reference(&mut self, from: &str, to: &str) {
        self.references
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
    }

    /// Names directly referenced by `name`
    pub fn get_references(&self, name: &str) -> impl Iterator<Item = &str> + '_ {
        self.references
            .get(name)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Every name reachable from `name` through one or more edges
    ///
    /// Contains `name` itself only if it lies on a cycle.
    pub fn closure(&self, name: &str) -> BTreeSet<String> {
        let mut visited = BTreeSet::new();
        let mut stack: Vec<&str> = self.get_references(name).collect();

        while let Some(current) = stack.pop() {
            if visited.insert(current.to_string()) {
                stack.extend(self.get_references(current));
            }
        }

        visited
    }
}

/// Resolve a set of named formulas
///
/// `supported_refs` lists record field names formulas may reference. The
/// formula names are always allowed in addition. The result is keyed by
/// canonical name; if two names only differ in case, the later one wins.
///
/// # Example
/// ```rust
/// use fieldcalc_formula::resolve_formulas;
///
/// let refs = vec!["price".to_string()];
/// let entries = resolve_formulas(
///     [("total", "{net} * 1.2"), ("net", "{price} - 5")],
///     Some(refs.as_slice()),
/// );
/// assert_eq!(entries["net"].order, 1);
/// assert_eq!(entries["total"].order, 2);
/// assert_eq!(entries["total"].dependencies, vec!["net"]);
/// ```
pub fn resolve_formulas<I, K, V>(
    formulas: I,
    supported_refs: Option<&[String]>,
) -> BTreeMap<String, FormulaEntry>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    let mut entries: BTreeMap<String, FormulaEntry> = BTreeMap::new();
    for (name, formula) in formulas {
        let entry = FormulaEntry::new(name.as_ref().to_string(), formula.into());
        entries.insert(entry.reference_name.clone(), entry);
    }

    let mut graph = ReferenceGraph::new();
    for (name, entry) in &entries {
        for (_, target) in entry.references() {
            graph.add_reference(name, &target);
        }
    }

    let allowed: Vec<String> = supported_refs
        .unwrap_or_default()
        .iter()
        .cloned()
        .chain(entries.keys().cloned())
        .collect();

    // Syntax and cycle errors
    let names: Vec<String> = entries.keys().cloned().collect();
    for name in &names {
        let closure = graph.closure(name);
        let Some(entry) = entries.get_mut(name) else {
            continue;
        };

        let mut errors = validate(&entry.tokens, Some(allowed.as_slice()));
        for (index, target) in entry.references() {
            if &target == name {
                errors.push(ValidationError::at(
                    index,
                    &entry.tokens[index],
                    ErrorType::CircularReferenceToItself,
                ));
            } else if graph.closure(&target).contains(name) {
                errors.push(ValidationError::at(
                    index,
                    &entry.tokens[index],
                    ErrorType::CircularReference,
                ));
            }
        }

        entry.validation_errors = errors;
        entry.dependencies = closure
            .into_iter()
            .filter(|dep| names.binary_search(dep).is_ok())
            .collect();
    }

    assign_orders(&mut entries);
    propagate_invalid(&mut entries);

    for entry in entries.values_mut() {
        if !entry.is_resolved() && entry.is_valid() {
            entry
                .validation_errors
                .push(ValidationError::unpositioned(ErrorType::DependsOnCircular));
        }
    }

    entries
}

/// Assign evaluation layers
///
/// A formula lands in the first layer after all of its dependencies; each
/// pass only sees the formulas resolved by earlier passes.
fn assign_orders(entries: &mut BTreeMap<String, FormulaEntry>) {
    let mut resolved: BTreeSet<String> = BTreeSet::new();
    let mut order = 1;

    loop {
        let layer: Vec<String> = entries
            .values()
            .filter(|entry| !resolved.contains(&entry.reference_name))
            .filter(|entry| entry.dependencies.iter().all(|dep| resolved.contains(dep)))
            .map(|entry| entry.reference_name.clone())
            .collect();

        if layer.is_empty() {
            break;
        }

        log::debug!("formula layer {}: {:?}", order, layer);
        for name in layer {
            if let Some(entry) = entries.get_mut(&name) {
                entry.order = order;
            }
            resolved.insert(name);
        }
        order += 1;
    }

    let unresolved = entries.len() - resolved.len();
    if unresolved > 0 {
        log::debug!("{} formulas left unresolved by circular references", unresolved);
    }
}

/// Mark valid formulas that reference an invalid one
///
/// Visits formulas by ascending order so a cause is marked before its
/// dependents look at it. Only the first offending reference is reported.
fn propagate_invalid(entries: &mut BTreeMap<String, FormulaEntry>) {
    let mut visit: Vec<(usize, String)> = entries
        .values()
        .map(|entry| (entry.order, entry.reference_name.clone()))
        .collect();
    visit.sort();

    for (_, name) in visit {
        let Some(entry) = entries.get(&name) else {
            continue;
        };
        if !entry.is_valid() {
            continue;
        }

        let invalid_reference = entry.references().find(|(_, target)| {
            target != &name && entries.get(target).map_or(false, |t| !t.is_valid())
        });

        if let Some((index, _)) = invalid_reference {
            let error =
                ValidationError::at(index, &entry.tokens[index], ErrorType::DependsOnInvalid);
            if let Some(entry) = entries.get_mut(&name) {
                entry.validation_errors.push(error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn supported() -> Vec<String> {
        vec!["d".to_string()]
    }

    fn error_types(entry: &FormulaEntry) -> Vec<ErrorType> {
        entry.validation_errors.iter().map(|e| e.error_type).collect()
    }

    #[test]
    fn test_reference_graph_closure() {
        let mut graph = ReferenceGraph::new();
        graph.add_reference("a", "b");
        graph.add_reference("b", "c");
        graph.add_reference("c", "b");

        let names: Vec<String> = graph.closure("a").into_iter().collect();
        assert_eq!(names, vec!["b", "c"]);
        assert!(graph.closure("b").contains("b"));
        assert!(graph.closure("x").is_empty());
    }

    #[test]
    fn test_resolve_layers() {
        let refs = supported();
        let entries = resolve_formulas(
            [("a", "{b} + {c}"), ("b", "1"), ("c", "{d}")],
            Some(refs.as_slice()),
        );

        assert_eq!(entries["a"].order, 2);
        assert_eq!(entries["a"].dependencies, vec!["b", "c"]);
        assert_eq!(entries["b"].order, 1);
        assert_eq!(entries["c"].order, 1);
        assert_eq!(entries["c"].dependencies, Vec::<String>::new());
        assert!(entries.values().all(FormulaEntry::is_valid));
    }

    #[test]
    fn test_resolve_self_reference() {
        let refs = supported();
        let entries = resolve_formulas([("a", "{a}")], Some(refs.as_slice()));

        let a = &entries["a"];
        assert_eq!(a.order, 0);
        assert_eq!(a.dependencies, vec!["a"]);
        assert_eq!(error_types(a), vec![ErrorType::CircularReferenceToItself]);
        assert_eq!(a.validation_errors[0].token_index, Some(1));
    }

    #[test]
    fn test_resolve_mutual_cycle_with_dependent() {
        let refs = supported();
        let entries = resolve_formulas(
            [("a", "{b}"), ("b", "{c}"), ("c", "{b}")],
            Some(refs.as_slice()),
        );

        for name in ["a", "b", "c"] {
            assert_eq!(entries[name].order, 0, "{name}");
            assert_eq!(entries[name].dependencies, vec!["b", "c"], "{name}");
        }
        assert_eq!(error_types(&entries["a"]), vec![ErrorType::DependsOnInvalid]);
        assert_eq!(error_types(&entries["b"]), vec![ErrorType::CircularReference]);
        assert_eq!(error_types(&entries["c"]), vec![ErrorType::CircularReference]);
    }

    #[test]
    fn test_resolve_invalid_formula_propagates() {
        let refs = supported();
        let entries = resolve_formulas(
            [
                ("a", "{d}"),
                ("b", "{c}"),
                ("c", "1"),
                ("e", "{f}"),
                ("f", "}\""),
            ],
            Some(refs.as_slice()),
        );

        assert_eq!(entries["a"].order, 1);
        assert_eq!(entries["b"].order, 2);
        assert_eq!(entries["b"].dependencies, vec!["c"]);
        assert_eq!(entries["c"].order, 1);
        assert_eq!(entries["e"].order, 2);
        assert_eq!(entries["e"].dependencies, vec!["f"]);
        assert_eq!(error_types(&entries["e"]), vec![ErrorType::DependsOnInvalid]);
        assert_eq!(entries["e"].validation_errors[0].token_index, Some(1));
        assert_eq!(entries["f"].order, 1);
        assert_eq!(
            error_types(&entries["f"]),
            vec![
                ErrorType::UnexpectedReferenceBracket,
                ErrorType::OperatorRequiredBeforeQuote,
                ErrorType::UnclosedDoubleQuote,
            ]
        );
    }

    #[test]
    fn test_resolve_without_supported_refs() {
        let entries = resolve_formulas([("a", "{b} + {c}"), ("b", "1"), ("c", "{d}")], None);

        assert_eq!(entries["a"].order, 2);
        assert_eq!(entries["a"].dependencies, vec!["b", "c"]);
        assert_eq!(error_types(&entries["a"]), vec![ErrorType::DependsOnInvalid]);
        assert_eq!(entries["b"].order, 1);
        assert_eq!(entries["c"].order, 1);
        assert_eq!(error_types(&entries["c"]), vec![ErrorType::UnsupportedReferenceName]);
    }

    #[test]
    fn test_resolve_indirect_cycle_participant() {
        // `a` only reaches the cycle through `b`, which is flagged directly
        let entries = resolve_formulas([("a", "{b} + 1"), ("b", "{c}"), ("c", "{b}")], None);
        assert_eq!(entries["a"].order, 0);
        assert_eq!(error_types(&entries["a"]), vec![ErrorType::DependsOnInvalid]);
        assert_eq!(entries["a"].validation_errors[0].token_index, Some(1));
    }

    #[test]
    fn test_resolve_names_are_case_insensitive() {
        let entries = resolve_formulas([("Total", "{NET} * 2"), ("net", "3")], None);

        assert!(entries.contains_key("total"));
        assert_eq!(entries["total"].reference_name, "total");
        assert_eq!(entries["total"].reference_name_orig, "Total");
        assert_eq!(entries["total"].formula, "{NET} * 2");
        assert_eq!(entries["total"].dependencies, vec!["net"]);
        assert_eq!(entries["total"].order, 2);
        assert!(entries["total"].is_valid());
    }

    #[test]
    fn test_resolve_keeps_name_as_supplied() {
        let upper = resolve_formulas([("A", "1")], None);
        let lower = resolve_formulas([("a", "1")], None);

        assert_eq!(upper["a"].order, lower["a"].order);
        assert_eq!(upper["a"].dependencies, lower["a"].dependencies);
        assert_eq!(upper["a"].validation_errors, lower["a"].validation_errors);
        assert_eq!(upper["a"].reference_name_orig, "A");
        assert_eq!(lower["a"].reference_name_orig, "a");
        assert_ne!(upper, lower);
    }

    #[test]
    fn test_resolve_empty_set() {
        let entries = resolve_formulas(Vec::<(String, String)>::new(), None);
        assert!(entries.is_empty());
    }
}
