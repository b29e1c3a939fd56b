//! Built-in functions and operators
//!
//! Every function takes its evaluated arguments as strings and returns a
//! string. Lookups are case-insensitive; unknown names and operators evaluate
//! to an empty string rather than failing.

pub mod logical;
pub mod math;
pub mod number;
pub mod text;

use ahash::AHashMap;
use std::sync::OnceLock;

/// Function implementation signature
pub type FunctionImpl = fn(&[String]) -> String;

/// Function definition
pub struct FunctionDef {
    /// Function name (lowercase)
    pub name: &'static str,
    /// Implementation
    pub implementation: FunctionImpl,
}

/// Function and operator registry
pub struct FunctionRegistry {
    functions: AHashMap<String, FunctionDef>,
    operators: AHashMap<&'static str, FunctionImpl>,
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions and operators
    pub fn new() -> Self {
        let mut registry = Self {
            functions: AHashMap::new(),
            operators: AHashMap::new(),
        };

        registry.register_text_functions();
        registry.register_math_functions();
        registry.register_logical_functions();
        registry.register_operators();

        registry
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(&name.to_lowercase())
    }

    /// Look up an operator by its symbol
    pub fn operator(&self, symbol: &str) -> Option<FunctionImpl> {
        self.operators.get(symbol).copied()
    }

    /// Register a function
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.to_lowercase(), def);
    }

    /// Names of all registered functions, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.functions.values().map(|def| def.name).collect();
        names.sort_unstable();
        names
    }

    fn register_text_functions(&mut self) {
        self.register(FunctionDef {
            name: "uppercase",
            implementation: text::fn_uppercase,
        });
        self.register(FunctionDef {
            name: "lowercase",
            implementation: text::fn_lowercase,
        });
        self.register(FunctionDef {
            name: "concatenate",
            implementation: text::fn_concatenate,
        });
    }

    fn register_math_functions(&mut self) {
        self.register(FunctionDef {
            name: "round",
            implementation: math::fn_round,
        });
        self.register(FunctionDef {
            name: "ceil",
            implementation: math::fn_ceil,
        });
        self.register(FunctionDef {
            name: "floor",
            implementation: math::fn_floor,
        });
        self.register(FunctionDef {
            name: "add",
            implementation: math::fn_add,
        });
        self.register(FunctionDef {
            name: "multiply",
            implementation: math::fn_multiply,
        });
        self.register(FunctionDef {
            name: "subtract",
            implementation: math::fn_subtract,
        });
        self.register(FunctionDef {
            name: "divide",
            implementation: math::fn_divide,
        });
        self.register(FunctionDef {
            name: "pow",
            implementation: math::fn_pow,
        });
        self.register(FunctionDef {
            name: "max",
            implementation: math::fn_max,
        });
        self.register(FunctionDef {
            name: "min",
            implementation: math::fn_min,
        });
    }

    fn register_logical_functions(&mut self) {
        self.register(FunctionDef {
            name: "lt",
            implementation: logical::fn_lt,
        });
        self.register(FunctionDef {
            name: "lte",
            implementation: logical::fn_lte,
        });
        self.register(FunctionDef {
            name: "eq",
            implementation: logical::fn_eq,
        });
        self.register(FunctionDef {
            name: "gte",
            implementation: logical::fn_gte,
        });
        self.register(FunctionDef {
            name: "gt",
            implementation: logical::fn_gt,
        });
        self.register(FunctionDef {
            name: "if",
            implementation: logical::fn_if,
        });
    }

    fn register_operators(&mut self) {
        let operators: [(&'static str, FunctionImpl); 12] = [
            ("&", text::fn_concatenate),
            ("+", math::fn_add),
            ("-", math::fn_subtract),
            ("*", math::fn_multiply),
            ("/", math::fn_divide),
            ("^", math::fn_pow),
            ("<", logical::fn_lt),
            ("<=", logical::fn_lte),
            ("=", logical::fn_eq),
            ("==", logical::fn_eq),
            (">=", logical::fn_gte),
            (">", logical::fn_gt),
        ];
        for (symbol, implementation) in operators {
            self.operators.insert(symbol, implementation);
        }
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static FUNCTION_REGISTRY: OnceLock<FunctionRegistry> = OnceLock::new();

/// Shared registry of the built-in functions
pub fn get_function_registry() -> &'static FunctionRegistry {
    FUNCTION_REGISTRY.get_or_init(FunctionRegistry::new)
}

/// Run a built-in function; unknown names give `""`
pub fn execute_function(name: &str, args: &[String]) -> String {
    match get_function_registry().get(name) {
        Some(def) => (def.implementation)(args),
        None => String::new(),
    }
}

/// Run an operator; unknown operators give `""`
pub fn execute_operator(operator: &str, args: &[String]) -> String {
    match get_function_registry().operator(operator) {
        Some(implementation) => implementation(args),
        None => String::new(),
    }
}

/// Whether a function name is known (case-insensitive)
pub fn is_supported(name: &str) -> bool {
    get_function_registry().get(name).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_function_lookup_is_case_insensitive() {
        assert!(is_supported("round"));
        assert!(is_supported("ROUND"));
        assert!(is_supported("UpperCase"));
        assert!(!is_supported("sin"));
        assert_eq!(execute_function("MAX", &args(&["1", "3"])), "3");
    }

    #[test]
    fn test_unknown_function_is_empty() {
        assert_eq!(execute_function("invalidFunction", &[]), "");
    }

    #[test]
    fn test_execute_operator() {
        assert_eq!(execute_operator("*", &args(&["2", "2"])), "4");
        assert_eq!(execute_operator("&", &args(&["a", "b"])), "ab");
        assert_eq!(execute_operator("==", &args(&["2", "2"])), "1");
        assert_eq!(execute_operator("%", &args(&["2", "2"])), "");
    }

    #[test]
    fn test_registry_names() {
        let names = get_function_registry().names();
        assert_eq!(names.len(), 19);
        assert_eq!(names.first(), Some(&"add"));
        assert!(names.contains(&"if"));
    }
}
