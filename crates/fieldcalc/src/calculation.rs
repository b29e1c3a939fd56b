//! Record calculation engine
//!
//! A [`FormulaSet`] resolves a group of named formulas once and then computes
//! them for any number of records. Within a record, formulas run in
//! dependency order and each result becomes visible to later formulas under
//! its name, alongside the record's own fields.
//!
//! # Example
//!
//! ```rust
//! use fieldcalc::prelude::*;
//!
//! let options = CalculationOptions::default().with_supported_refs(["price", "qty"]);
//! let set = FormulaSet::with_options(
//!     [("Total", "{net} * 1.2"), ("Net", "{price} * {qty}")],
//!     &options,
//! );
//! assert!(set.is_valid());
//!
//! let result = set.calculate([("price", "2.5"), ("qty", "4")]);
//! assert_eq!(result.get("total"), Some("12"));
//! assert_eq!(result.stats.calculated, 2);
//! ```

use crate::{resolve_formulas, ErrorType, FormulaEntry, FormulaError, FormulaResult};
use fieldcalc_formula::{evaluate, scan, TokenKind};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Options for building a formula set
#[derive(Debug, Clone, Default)]
pub struct CalculationOptions {
    /// Record field names formulas may reference; `None` accepts any name.
    /// Formula names are always allowed.
    pub supported_refs: Option<Vec<String>>,
}

impl CalculationOptions {
    /// Restrict references to the given field names
    pub fn with_supported_refs<I, S>(mut self, refs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_refs = Some(refs.into_iter().map(Into::into).collect());
        self
    }
}

/// Statistics from a calculation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalculationStats {
    /// Total number of formulas in the set
    pub formula_count: usize,
    /// Number of formulas calculated
    pub calculated: usize,
    /// Number of formulas skipped because they are invalid or unresolved
    pub skipped: usize,
}

/// Formula results for one record
#[derive(Debug, Clone, Default)]
pub struct CalculatedRecord {
    /// Results keyed by the formula name as originally given
    pub values: BTreeMap<String, String>,
    pub stats: CalculationStats,
}

impl CalculatedRecord {
    /// Result of a formula (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_lowercase();
        self.values
            .iter()
            .find(|(key, _)| key.to_lowercase() == name)
            .map(|(_, value)| value.as_str())
    }
}

/// A resolved group of named formulas
#[derive(Debug, Clone)]
pub struct FormulaSet {
    /// Sorted by `(order, name)`
    entries: Vec<FormulaEntry>,
}

impl FormulaSet {
    /// Resolve formulas without restricting record field names
    pub fn new<I, K, V>(formulas: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self::with_options(formulas, &CalculationOptions::default())
    }

    /// Resolve formulas with custom options
    pub fn with_options<I, K, V>(formulas: I, options: &CalculationOptions) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let formulas: Vec<(String, String)> = formulas
            .into_iter()
            .map(|(name, formula)| (name.as_ref().to_string(), formula.into()))
            .collect();

        let supported_refs = match &options.supported_refs {
            Some(refs) => refs.clone(),
            None => referenced_names(&formulas),
        };
        let resolved = resolve_formulas(formulas, Some(supported_refs.as_slice()));
        let mut entries: Vec<FormulaEntry> = resolved.into_values().collect();
        entries.sort_by(|a, b| {
            (a.order, &a.reference_name).cmp(&(b.order, &b.reference_name))
        });

        let invalid = entries.iter().filter(|e| !e.is_valid()).count();
        log::debug!(
            "resolved {} formulas ({} invalid)",
            entries.len(),
            invalid
        );

        Self { entries }
    }

    /// All entries in evaluation order
    ///
    /// Unresolved entries (`order == 0`) come first; they are never evaluated.
    pub fn entries(&self) -> &[FormulaEntry] {
        &self.entries
    }

    /// Entry for a formula name (case-insensitive)
    pub fn entry(&self, name: &str) -> Option<&FormulaEntry> {
        let name = name.to_lowercase();
        self.entries.iter().find(|e| e.reference_name == name)
    }

    /// Name of an entry as originally given
    pub fn original_name<'a>(&self, entry: &'a FormulaEntry) -> &'a str {
        &entry.reference_name_orig
    }

    /// Whether no formula carries errors
    pub fn is_valid(&self) -> bool {
        self.entries.iter().all(FormulaEntry::is_valid)
    }

    /// Entries with validation or dependency errors
    pub fn invalid_entries(&self) -> impl Iterator<Item = &FormulaEntry> {
        self.entries.iter().filter(|e| !e.is_valid())
    }

    /// Number of formulas in the set
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set has no formulas
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Calculate every valid formula for one record
    ///
    /// `record` maps field names to values. References are looked up
    /// case-insensitively in earlier formula results, then in the record;
    /// unknown names resolve to an empty string.
    pub fn calculate<I, K, V>(&self, record: I) -> CalculatedRecord
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut scope = record_scope(record);
        let mut result = CalculatedRecord {
            values: BTreeMap::new(),
            stats: CalculationStats {
                formula_count: self.entries.len(),
                ..CalculationStats::default()
            },
        };

        for entry in &self.entries {
            if !is_evaluable(entry) {
                result.stats.skipped += 1;
                continue;
            }
            let value = evaluate_in_scope(entry, &scope);
            scope.insert(entry.reference_name.clone(), value.clone());
            result
                .values
                .insert(self.original_name(entry).to_string(), value);
            result.stats.calculated += 1;
        }

        result
    }

    /// Calculate a single formula for one record
    ///
    /// Only the formula and its dependencies are evaluated.
    pub fn value<I, K, V>(&self, name: &str, record: I) -> FormulaResult<String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let target = self
            .entry(name)
            .ok_or_else(|| FormulaError::UnknownFormula(name.to_string()))?;

        if !target.is_valid() {
            return Err(FormulaError::InvalidFormula {
                name: self.original_name(target).to_string(),
                errors: error_types(target),
            });
        }
        if !target.is_resolved() {
            return Err(FormulaError::UnresolvedFormula(
                self.original_name(target).to_string(),
            ));
        }

        let needed: BTreeSet<&str> = target.dependencies.iter().map(String::as_str).collect();
        let mut scope = record_scope(record);

        for entry in &self.entries {
            if entry.order >= target.order {
                break;
            }
            if is_evaluable(entry) && needed.contains(entry.reference_name.as_str()) {
                let value = evaluate_in_scope(entry, &scope);
                scope.insert(entry.reference_name.clone(), value);
            }
        }

        Ok(evaluate_in_scope(target, &scope))
    }
}

/// Every reference name used by the formulas
fn referenced_names(formulas: &[(String, String)]) -> Vec<String> {
    formulas
        .iter()
        .flat_map(|(_, formula)| scan(formula))
        .filter(|token| token.kind == TokenKind::ReferenceName)
        .map(|token| token.value)
        .collect()
}

fn is_evaluable(entry: &FormulaEntry) -> bool {
    entry.is_valid() && entry.is_resolved()
}

fn error_types(entry: &FormulaEntry) -> Vec<ErrorType> {
    entry
        .validation_errors
        .iter()
        .map(|e| e.error_type)
        .collect()
}

/// Record fields keyed by lowercase name
fn record_scope<I, K, V>(record: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    record
        .into_iter()
        .map(|(name, value)| (name.as_ref().to_lowercase(), value.into()))
        .collect()
}

fn evaluate_in_scope(entry: &FormulaEntry, scope: &HashMap<String, String>) -> String {
    evaluate(&entry.token_nodes, |name| {
        scope.get(&name.to_lowercase()).cloned().unwrap_or_default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_calculation_order() {
        let set = FormulaSet::new([("b", "{a} * 2"), ("a", "{x} + 1"), ("c", "5")]);
        let names: Vec<&str> = set
            .entries()
            .iter()
            .map(|e| e.reference_name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "c", "b"]);
    }

    #[test]
    fn test_calculate_feeds_results_forward() {
        let set = FormulaSet::new([("b", "{a} * 2"), ("a", "{x} + 1")]);
        let result = set.calculate([("x", "4")]);

        assert_eq!(result.values.get("a").map(String::as_str), Some("5"));
        assert_eq!(result.values.get("b").map(String::as_str), Some("10"));
        assert_eq!(
            result.stats,
            CalculationStats {
                formula_count: 2,
                calculated: 2,
                skipped: 0,
            }
        );
    }

    #[test]
    fn test_calculate_skips_invalid_formulas() {
        let set = FormulaSet::new([("a", "1 +"), ("b", "{a} + 1"), ("c", "2")]);
        assert!(!set.is_valid());
        assert_eq!(set.invalid_entries().count(), 2);

        let result = set.calculate(Vec::<(String, String)>::new());
        assert_eq!(result.values.len(), 1);
        assert_eq!(result.get("c"), Some("2"));
        assert_eq!(result.stats.skipped, 2);
    }

    #[test]
    fn test_result_keeps_original_name() {
        let set = FormulaSet::new([("NetPrice", "{Price} - 1")]);
        let result = set.calculate([("PRICE", "3")]);
        assert_eq!(result.values.get("NetPrice").map(String::as_str), Some("2"));
        assert_eq!(result.get("netprice"), Some("2"));

        let entry = set.entry("NETPRICE").unwrap();
        assert_eq!(entry.reference_name, "netprice");
        assert_eq!(set.original_name(entry), "NetPrice");
    }

    #[test]
    fn test_formula_result_shadows_field() {
        let set = FormulaSet::new([("price", "10"), ("total", "{price} * 2")]);
        let result = set.calculate([("price", "1")]);
        assert_eq!(result.get("total"), Some("20"));
    }

    #[test]
    fn test_value_errors() {
        let set = FormulaSet::new([("a", "{a}"), ("b", "5 5"), ("c", "{b}")]);

        assert!(matches!(
            set.value("missing", [("x", "1")]),
            Err(FormulaError::UnknownFormula(name)) if name == "missing"
        ));
        assert!(matches!(
            set.value("A", [("x", "1")]),
            Err(FormulaError::InvalidFormula { errors, .. })
                if errors == vec![ErrorType::CircularReferenceToItself]
        ));
        assert!(matches!(
            set.value("c", [("x", "1")]),
            Err(FormulaError::InvalidFormula { errors, .. })
                if errors == vec![ErrorType::DependsOnInvalid]
        ));
    }

    #[test]
    fn test_value_evaluates_dependencies_only() {
        let set = FormulaSet::new([("a", "{x} * 3"), ("b", "{a} + 1"), ("z", "{b} / 0")]);
        assert_eq!(set.value("b", [("x", "2")]).unwrap(), "7");
    }

    #[test]
    fn test_supported_refs_option() {
        let options = CalculationOptions::default().with_supported_refs(["price"]);
        let set = FormulaSet::with_options([("a", "{price} + {tax}")], &options);
        let entry = set.entry("a").unwrap();
        assert_eq!(
            error_types(entry),
            vec![ErrorType::UnsupportedReferenceName]
        );
    }
}
