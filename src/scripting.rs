//! Rhai expression predicates
//!
//! A boolean Rhai expression is compiled once and evaluated on every tick
//! with each parameter bound as a variable of the same name:
//!
//! ```ignore
//! let predicate = ScriptPredicate::compile("doctors < 2 && patients >= 8")?;
//! ```
//!
//! Referencing a variable that is not in the parameters fails with
//! [`AlarmError::MissingParameter`].

use rhai::{Dynamic, Engine as RhaiVM, EvalAltResult, Scope, AST};
use std::fmt;
use std::sync::Arc;

use crate::conditions::{Condition, Predicate};
use crate::error::{AlarmError, Result};
use crate::params::{ParamValue, Params};

/// A compiled Rhai boolean expression
pub struct ScriptPredicate {
    vm: RhaiVM,
    ast: AST,
    source: String,
}

impl ScriptPredicate {
    /// Compile `expr`; statements and function definitions are rejected
    pub fn compile(expr: &str) -> Result<Self> {
        let mut vm = RhaiVM::new();

        // Expressions run once per frame; keep them cheap
        vm.set_max_expr_depths(64, 64);
        vm.set_max_call_levels(16);
        vm.set_max_operations(100_000);
        vm.set_max_string_size(10_000);

        let ast = vm
            .compile_expression(expr)
            .map_err(|e| AlarmError::Predicate(format!("Compilation error in {:?}: {}", expr, e)))?;

        Ok(Self {
            vm,
            ast,
            source: expr.to_string(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

fn to_dynamic(value: &ParamValue) -> Dynamic {
    match value {
        ParamValue::Bool(v) => Dynamic::from(*v),
        ParamValue::Int(v) => Dynamic::from(*v),
        ParamValue::Float(v) => Dynamic::from(*v),
        ParamValue::String(v) => Dynamic::from(v.clone()),
    }
}

impl Predicate for ScriptPredicate {
    fn test(&self, params: &Params) -> Result<bool> {
        let mut scope = Scope::new();
        for (name, value) in params {
            scope.push_dynamic(name.clone(), to_dynamic(value));
        }

        self.vm
            .eval_ast_with_scope::<bool>(&mut scope, &self.ast)
            .map_err(|e| match *e {
                EvalAltResult::ErrorVariableNotFound(name, _) => AlarmError::MissingParameter(name),
                other => AlarmError::Predicate(format!("{}: {}", self.source, other)),
            })
    }
}

impl fmt::Debug for ScriptPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptPredicate")
            .field("source", &self.source)
            .finish()
    }
}

/// Condition that is active while `expr` evaluates to true
pub fn expression_condition(expr: &str, hysteresis: f64) -> Result<Condition> {
    let predicate = ScriptPredicate::compile(expr)?;
    log::debug!("Compiled expression condition {:?}", predicate.source());
    Condition::from_predicate(Arc::new(predicate), hysteresis)
}
