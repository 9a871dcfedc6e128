//! Kernel specifications and the generic evaluator executing them.
//!
//! Compilation is two-phase: the compiler first produces an immutable
//! [`KernelSpec`] — plain data listing binding statements, computation
//! statements and a return statement under one signature — and
//! [`assemble`] then turns it into a callable [`Kernel`] after structural
//! checks. The spec is retained by the kernel for introspection (statement
//! counts), never for control flow.
//!
//! Generated kernels are pure functions of their arguments: every call
//! builds a fresh scope and returns a freshly allocated output sequence.
//! No buffer is ever mutated in place between calls, which is the invariant
//! that keeps kernels safe to run from parallel workers and compatible with
//! reverse-mode differentiation.

use crate::errors::{KernelError, KernelResult};
use crate::expr::{BinaryOp, Expr, UnaryOp};
use crate::rank::Rank;
use crate::value::Value;
use ndarray::{ArrayView1, ArrayView2, ArrayView3, Axis};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Whether a kernel computes outputs or state derivatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KernelRole {
    Value,
    Derivative,
}

impl fmt::Display for KernelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelRole::Value => write!(f, "value"),
            KernelRole::Derivative => write!(f, "derivative"),
        }
    }
}

/// How binding statements access the input slice.
///
/// `Checked` guards every positional access and raises a typed error on a
/// short axis. `Unchecked` indexes directly and is an explicit per-call
/// opt-in, never a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BindingMode {
    Checked,
    Unchecked,
}

impl Default for BindingMode {
    fn default() -> Self {
        BindingMode::Checked
    }
}

/// Where a bound name comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BindingSource {
    /// Positional extraction from the input slice (0-based).
    Input(usize),
    /// Positional extraction from the state slice (0-based).
    State(usize),
    /// Named lookup in the parameter bag.
    Param(String),
    /// Named lookup in the network-slot bag.
    Network(String),
}

/// Names assembled into the kernel's return value, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReturnSpec {
    Outputs(Vec<String>),
    Derivatives(Vec<String>),
    /// Routed-network value kernels return outputs followed by derivatives.
    Combined {
        outputs: Vec<String>,
        derivatives: Vec<String>,
    },
}

impl ReturnSpec {
    /// All returned names in return order.
    pub fn names(&self) -> Vec<&String> {
        match self {
            ReturnSpec::Outputs(names) | ReturnSpec::Derivatives(names) => names.iter().collect(),
            ReturnSpec::Combined {
                outputs,
                derivatives,
            } => outputs.iter().chain(derivatives.iter()).collect(),
        }
    }
}

/// One statement of a kernel body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Bind {
        name: String,
        source: BindingSource,
    },
    Compute {
        name: String,
        expr: Expr,
    },
}

impl Statement {
    /// Name defined by this statement.
    pub fn name(&self) -> &str {
        match self {
            Statement::Bind { name, .. } | Statement::Compute { name, .. } => name,
        }
    }

    /// Render the statement the way the spec's statement lists read,
    /// with 1-based positions in index patterns.
    pub fn render(&self, rank: Rank) -> String {
        match self {
            Statement::Bind { name, source } => match source {
                BindingSource::Input(pos) => {
                    format!("{} := input[{}]", name, rank.index_pattern(pos + 1))
                }
                BindingSource::State(pos) => {
                    format!("{} := state[{}]", name, rank.index_pattern(pos + 1))
                }
                BindingSource::Param(key) => format!("{} := params[{}]", name, key),
                BindingSource::Network(key) => format!("{} := networks[{}]", name, key),
            },
            Statement::Compute { name, expr } => format!("{} := {}", name, expr.render()),
        }
    }
}

/// Call signature of a compiled kernel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub component: String,
    pub rank: Rank,
    pub role: KernelRole,
    pub takes_state: bool,
    pub mode: BindingMode,
}

/// Build-time intermediate: the full body of one kernel as data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelSpec {
    pub signature: Signature,
    pub bindings: Vec<Statement>,
    pub computations: Vec<Statement>,
    pub ret: ReturnSpec,
}

impl KernelSpec {
    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    pub fn computation_count(&self) -> usize {
        self.computations.len()
    }

    pub fn return_count(&self) -> usize {
        self.ret.names().len()
    }
}

/// An externally supplied sub-model occupying a network slot.
///
/// Sub-models are opaque callables (e.g. a learned function); kernel `Call`
/// expressions that resolve to a network slot invoke them with evaluated
/// argument values.
pub trait SubModel: Send + Sync {
    fn eval(&self, args: &[Value]) -> KernelResult<Value>;
}

impl<F> SubModel for F
where
    F: Fn(&[Value]) -> KernelResult<Value> + Send + Sync,
{
    fn eval(&self, args: &[Value]) -> KernelResult<Value> {
        self(args)
    }
}

/// Parameter / initial-state bag.
pub type ParamBag = HashMap<String, Value>;

/// Network-slot bag: sub-model name to object.
pub type NetworkBag = HashMap<String, Arc<dyn SubModel>>;

/// A borrowed view of the per-call input (or state) data at some rank.
#[derive(Debug, Clone, Copy)]
pub enum SliceView<'a> {
    /// One value per variable.
    Scalar(ArrayView1<'a, f64>),
    /// Variables x cells.
    Vector(ArrayView2<'a, f64>),
    /// Variables x rows x cols.
    Matrix(ArrayView3<'a, f64>),
}

impl SliceView<'_> {
    fn ndim(&self) -> usize {
        match self {
            SliceView::Scalar(_) => 1,
            SliceView::Vector(_) => 2,
            SliceView::Matrix(_) => 3,
        }
    }

    fn variable_count(&self) -> usize {
        match self {
            SliceView::Scalar(v) => v.len(),
            SliceView::Vector(v) => v.nrows(),
            SliceView::Matrix(v) => v.len_of(Axis(0)),
        }
    }
}

/// Arguments for one kernel invocation.
pub struct KernelArgs<'a> {
    pub input: SliceView<'a>,
    pub state: Option<SliceView<'a>>,
    pub params: &'a ParamBag,
    pub networks: &'a NetworkBag,
}

impl<'a> KernelArgs<'a> {
    pub fn new(input: SliceView<'a>, params: &'a ParamBag, networks: &'a NetworkBag) -> Self {
        Self {
            input,
            state: None,
            params,
            networks,
        }
    }

    pub fn with_state(mut self, state: SliceView<'a>) -> Self {
        self.state = Some(state);
        self
    }
}

enum ScopeEntry {
    Value(Value),
    Network(Arc<dyn SubModel>),
}

type Scope = HashMap<String, ScopeEntry>;

fn binary_fn(op: BinaryOp) -> fn(f64, f64) -> f64 {
    match op {
        BinaryOp::Add => |a, b| a + b,
        BinaryOp::Sub => |a, b| a - b,
        BinaryOp::Mul => |a, b| a * b,
        BinaryOp::Div => |a, b| a / b,
        BinaryOp::Pow => f64::powf,
        BinaryOp::Max => f64::max,
        BinaryOp::Min => f64::min,
    }
}

fn unary_fn(op: UnaryOp) -> fn(f64) -> f64 {
    match op {
        UnaryOp::Neg => |a| -a,
        UnaryOp::Exp => f64::exp,
        UnaryOp::Log => f64::ln,
        UnaryOp::Sqrt => f64::sqrt,
        UnaryOp::Abs => f64::abs,
        UnaryOp::Tanh => f64::tanh,
        UnaryOp::Ceil => f64::ceil,
        UnaryOp::Floor => f64::floor,
    }
}

fn builtin_unary(name: &str) -> Option<fn(f64) -> f64> {
    match name {
        "exp" => Some(f64::exp),
        "log" => Some(f64::ln),
        "sqrt" => Some(f64::sqrt),
        "abs" => Some(f64::abs),
        "tanh" => Some(f64::tanh),
        "ceil" => Some(f64::ceil),
        "floor" => Some(f64::floor),
        _ => None,
    }
}

fn builtin_binary(name: &str) -> Option<fn(f64, f64) -> f64> {
    match name {
        "max" => Some(f64::max),
        "min" => Some(f64::min),
        "pow" => Some(f64::powf),
        _ => None,
    }
}

/// Evaluate an expression against a plain value bag (no network slots).
///
/// Used by the unit-hydrograph builder, which evaluates threshold and lag
/// expressions outside any compiled kernel.
pub(crate) fn eval_expr_over(expr: &Expr, values: &ParamBag) -> KernelResult<Value> {
    let scope: Scope = values
        .iter()
        .map(|(k, v)| (k.clone(), ScopeEntry::Value(v.clone())))
        .collect();
    eval_expr(expr, &scope)
}

/// Evaluate an expression against a kernel scope.
fn eval_expr(expr: &Expr, scope: &Scope) -> KernelResult<Value> {
    match expr {
        Expr::Literal(v) => Ok(Value::Scalar(*v)),
        Expr::Var(name) => match scope.get(name) {
            Some(ScopeEntry::Value(value)) => Ok(value.clone()),
            Some(ScopeEntry::Network(_)) => Err(KernelError::Error(format!(
                "'{}' is a network slot and cannot be read as a value",
                name
            ))),
            None => Err(KernelError::UndefinedVariable { name: name.clone() }),
        },
        Expr::Unary { op, operand } => Ok(eval_expr(operand, scope)?.map(unary_fn(*op))),
        Expr::Binary {
            op,
            lhs,
            rhs,
            elementwise,
        } => {
            let lhs = eval_expr(lhs, scope)?;
            let rhs = eval_expr(rhs, scope)?;
            lhs.combine(&rhs, *elementwise, binary_fn(*op))
        }
        Expr::Call { name, args } => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval_expr(arg, scope)?);
            }
            if let Some(f) = builtin_unary(name) {
                if values.len() != 1 {
                    return Err(KernelError::Error(format!(
                        "builtin '{}' takes 1 argument, got {}",
                        name,
                        values.len()
                    )));
                }
                return Ok(values[0].map(f));
            }
            if let Some(f) = builtin_binary(name) {
                if values.len() != 2 {
                    return Err(KernelError::Error(format!(
                        "builtin '{}' takes 2 arguments, got {}",
                        name,
                        values.len()
                    )));
                }
                return values[0].combine(&values[1], true, f);
            }
            match scope.get(name) {
                Some(ScopeEntry::Network(submodel)) => submodel.eval(&values),
                Some(ScopeEntry::Value(_)) => Err(KernelError::Error(format!(
                    "'{}' is bound to a value and cannot be called",
                    name
                ))),
                None => Err(KernelError::UnknownFunction { name: name.clone() }),
            }
        }
    }
}

/// Generate the binding statements for a contract.
///
/// Inputs and states are bound positionally from their slices in contract
/// order; parameters and network slots are bound by name. The kernel's rank
/// and binding mode live in its [`Signature`] and are applied when the
/// statements execute.
pub fn generate_bindings(spec: &crate::spec::ComponentSpec) -> Vec<Statement> {
    let mut statements = Vec::new();
    for (i, name) in spec.inputs.iter().enumerate() {
        statements.push(Statement::Bind {
            name: name.clone(),
            source: BindingSource::Input(i),
        });
    }
    for (i, name) in spec.states.iter().enumerate() {
        statements.push(Statement::Bind {
            name: name.clone(),
            source: BindingSource::State(i),
        });
    }
    for name in &spec.params {
        statements.push(Statement::Bind {
            name: name.clone(),
            source: BindingSource::Param(name.clone()),
        });
    }
    for name in &spec.networks {
        statements.push(Statement::Bind {
            name: name.clone(),
            source: BindingSource::Network(name.clone()),
        });
    }
    statements
}

/// Generate the computation statements, one per `(name, expr)` pair, with
/// the broadcast strategy applied to each expression.
pub fn generate_computations(
    names: &[String],
    exprs: &[Expr],
    strategy: crate::rank::BroadcastStrategy,
) -> KernelResult<Vec<Statement>> {
    if names.len() != exprs.len() {
        return Err(KernelError::StructuralBuild {
            details: format!(
                "expression count {} does not match output count {}",
                exprs.len(),
                names.len()
            ),
        });
    }
    Ok(names
        .iter()
        .zip(exprs.iter())
        .map(|(name, expr)| Statement::Compute {
            name: name.clone(),
            expr: expr.clone().apply_broadcast(strategy),
        })
        .collect())
}

/// Structural checks, then wrap the spec into a callable kernel.
///
/// Only the spec's internal shape is checked here: a non-empty return, no
/// duplicate defined names, and every returned name defined by a binding or
/// computation. Live-data validation is the validator's job.
pub fn assemble(spec: KernelSpec) -> KernelResult<Kernel> {
    if spec.ret.names().is_empty() {
        return Err(KernelError::StructuralBuild {
            details: format!(
                "kernel '{}' ({}) has an empty return",
                spec.signature.component, spec.signature.role
            ),
        });
    }

    let mut defined: Vec<&str> = Vec::new();
    for statement in spec.bindings.iter().chain(spec.computations.iter()) {
        let name = statement.name();
        if defined.contains(&name) {
            return Err(KernelError::StructuralBuild {
                details: format!(
                    "kernel '{}' defines '{}' more than once",
                    spec.signature.component, name
                ),
            });
        }
        defined.push(name);
    }

    for name in spec.ret.names() {
        if !defined.contains(&name.as_str()) {
            return Err(KernelError::StructuralBuild {
                details: format!(
                    "kernel '{}' returns '{}' which no statement defines",
                    spec.signature.component, name
                ),
            });
        }
    }

    log::debug!(
        "assembled {} kernel for '{}' at {} rank ({} bindings, {} computations)",
        spec.signature.role,
        spec.signature.component,
        spec.signature.rank,
        spec.binding_count(),
        spec.computation_count()
    );

    Ok(Kernel { spec, noop: false })
}

/// A compiled, executable kernel.
pub struct Kernel {
    spec: KernelSpec,
    noop: bool,
}

impl Kernel {
    /// The substituted derivative kernel of a stateless component.
    ///
    /// Always returns an empty, freshly allocated sequence.
    pub fn noop(component: &str) -> Self {
        Kernel {
            spec: KernelSpec {
                signature: Signature {
                    component: component.to_string(),
                    rank: Rank::Scalar,
                    role: KernelRole::Derivative,
                    takes_state: false,
                    mode: BindingMode::Checked,
                },
                bindings: vec![],
                computations: vec![],
                ret: ReturnSpec::Derivatives(vec![]),
            },
            noop: true,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.noop
    }

    /// The spec this kernel was assembled from, for introspection only.
    pub fn spec(&self) -> &KernelSpec {
        &self.spec
    }

    pub fn signature(&self) -> &Signature {
        &self.spec.signature
    }

    /// Execute the kernel body against one call's arguments.
    ///
    /// The returned sequence is always freshly allocated.
    pub fn call(&self, args: &KernelArgs<'_>) -> KernelResult<Vec<Value>> {
        if self.noop {
            return Ok(Vec::new());
        }
        if self.spec.signature.takes_state && args.state.is_none() {
            return Err(KernelError::Error(format!(
                "kernel '{}' is stateful but no state slice was supplied",
                self.spec.signature.component
            )));
        }

        let mut scope: Scope = HashMap::new();
        for statement in &self.spec.bindings {
            match statement {
                Statement::Bind { name, source } => {
                    let entry = self.bind(source, args)?;
                    scope.insert(name.clone(), entry);
                }
                Statement::Compute { .. } => {
                    return Err(KernelError::StructuralBuild {
                        details: "computation statement in binding list".to_string(),
                    })
                }
            }
        }

        for statement in &self.spec.computations {
            match statement {
                Statement::Compute { name, expr } => {
                    let value = eval_expr(expr, &scope)?;
                    scope.insert(name.clone(), ScopeEntry::Value(value));
                }
                Statement::Bind { .. } => {
                    return Err(KernelError::StructuralBuild {
                        details: "binding statement in computation list".to_string(),
                    })
                }
            }
        }

        // Assemble the return by concatenation into a fresh sequence.
        let mut result = Vec::with_capacity(self.spec.ret.names().len());
        for name in self.spec.ret.names() {
            match scope.get(name) {
                Some(ScopeEntry::Value(value)) => result.push(value.clone()),
                _ => return Err(KernelError::UndefinedVariable { name: name.clone() }),
            }
        }
        Ok(result)
    }

    fn bind(&self, source: &BindingSource, args: &KernelArgs<'_>) -> KernelResult<ScopeEntry> {
        match source {
            BindingSource::Input(pos) => self
                .extract(&args.input, *pos, "input")
                .map(ScopeEntry::Value),
            BindingSource::State(pos) => {
                let state = args.state.as_ref().ok_or_else(|| KernelError::Error(format!(
                    "kernel '{}' is stateful but no state slice was supplied",
                    self.spec.signature.component
                )))?;
                self.extract(state, *pos, "state").map(ScopeEntry::Value)
            }
            BindingSource::Param(key) => match args.params.get(key) {
                Some(value) => Ok(ScopeEntry::Value(value.clone())),
                None => Err(missing_key("params", key, args.params.keys())),
            },
            BindingSource::Network(key) => match args.networks.get(key) {
                Some(submodel) => Ok(ScopeEntry::Network(Arc::clone(submodel))),
                None => Err(missing_key("networks", key, args.networks.keys())),
            },
        }
    }

    /// Extract one variable from a slice according to the kernel rank.
    fn extract(&self, view: &SliceView<'_>, pos: usize, label: &str) -> KernelResult<Value> {
        let rank = self.spec.signature.rank;
        let checked = self.spec.signature.mode == BindingMode::Checked;
        if checked && pos >= view.variable_count() {
            return Err(KernelError::ShapeMismatch {
                context: format!(
                    "{} binding at position {} for kernel '{}'",
                    label,
                    pos + 1,
                    self.spec.signature.component
                ),
                expected: pos + 1,
                actual: view.variable_count(),
                hint: "variable axis is shorter than the component contract".to_string(),
            });
        }
        match (rank, view) {
            (Rank::Scalar, SliceView::Scalar(v)) => Ok(Value::Scalar(v[pos])),
            (Rank::Vector, SliceView::Vector(v)) => Ok(Value::Vector(v.row(pos).to_owned())),
            (Rank::Matrix, SliceView::Matrix(v)) => {
                Ok(Value::Matrix(v.index_axis(Axis(0), pos).to_owned()))
            }
            (rank, view) => Err(KernelError::ShapeMismatch {
                context: format!(
                    "{} slice for kernel '{}' at {} rank",
                    label, self.spec.signature.component, rank
                ),
                expected: match rank {
                    Rank::Scalar => 1,
                    Rank::Vector => 2,
                    Rank::Matrix => 3,
                },
                actual: view.ndim(),
                hint: "slice dimensionality must match the kernel rank".to_string(),
            }),
        }
    }
}

fn missing_key<'a>(
    category: &str,
    key: &str,
    available: impl Iterator<Item = &'a String>,
) -> KernelError {
    let mut available: Vec<String> = available.cloned().collect();
    available.sort();
    KernelError::MissingKey {
        category: category.to_string(),
        missing: vec![key.to_string()],
        available,
    }
}
