//! Kernel-pair orchestration: per component family, decide which ranks the
//! value and derivative kernels use and assemble the pair.
//!
//! The family-to-rank table is deterministic and not configurable per call:
//!
//! | Family | Value rank | Derivative rank |
//! |---|---|---|
//! | plain flux (stateless) | Scalar | none (no-op kernel) |
//! | bucket, single unit | Vector | Scalar |
//! | bucket, multi unit | Matrix | Vector |
//! | routed network | Matrix (combined return) | Vector |
//!
//! The unit hydrograph is not rank-dispatched at all; it builds two scalar
//! functions of one time argument (see [`UnitHydrograph`]).

use crate::errors::{KernelError, KernelResult};
use crate::expr::Expr;
use crate::kernel::{
    assemble, eval_expr_over, generate_bindings, generate_computations, BindingMode, Kernel,
    KernelRole, KernelSpec, ParamBag, ReturnSpec, Signature,
};
use crate::rank::Rank;
use crate::spec::ComponentSpec;
use crate::value::Value;

/// The component families the pair builder knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentFamily {
    /// Stateless flux: outputs only, no derivative kernel.
    Flux,
    /// Stateful bucket solved for a single unit.
    BucketSingle,
    /// Stateful bucket solved per grid cell ("multiply" mode).
    BucketMultiply,
    /// Routed network: value kernel returns outputs and derivatives together.
    RoutedNetwork,
}

impl ComponentFamily {
    pub fn value_rank(&self) -> Rank {
        match self {
            ComponentFamily::Flux => Rank::Scalar,
            ComponentFamily::BucketSingle => Rank::Vector,
            ComponentFamily::BucketMultiply | ComponentFamily::RoutedNetwork => Rank::Matrix,
        }
    }

    /// Rank of the derivative kernel, if the family has one.
    pub fn derivative_rank(&self) -> Option<Rank> {
        match self {
            ComponentFamily::Flux => None,
            ComponentFamily::BucketSingle => Some(Rank::Scalar),
            ComponentFamily::BucketMultiply | ComponentFamily::RoutedNetwork => Some(Rank::Vector),
        }
    }
}

/// Name used for a state's derivative in computation statements.
pub fn derivative_name(state: &str) -> String {
    format!("d_{}", state)
}

/// Compile one kernel for a contract at a given rank and role.
///
/// `exprs` are ordered: one per output for a value kernel, one per state for
/// a derivative kernel. The unchecked binding mode is an explicit opt-in.
pub fn compile_kernel(
    spec: &ComponentSpec,
    rank: Rank,
    role: KernelRole,
    exprs: &[Expr],
    mode: BindingMode,
) -> KernelResult<Kernel> {
    let strategy = rank.broadcast();
    let names: Vec<String> = match role {
        KernelRole::Value => spec.outputs.clone(),
        KernelRole::Derivative => spec.states.iter().map(|s| derivative_name(s)).collect(),
    };
    let ret = match role {
        KernelRole::Value => ReturnSpec::Outputs(names.clone()),
        KernelRole::Derivative => ReturnSpec::Derivatives(names.clone()),
    };
    assemble(KernelSpec {
        signature: Signature {
            component: spec.name.clone(),
            rank,
            role,
            takes_state: spec.is_stateful(),
            mode,
        },
        bindings: generate_bindings(spec),
        computations: generate_computations(&names, exprs, strategy)?,
        ret,
    })
}

/// A component's compiled value and derivative kernels.
pub struct KernelPair {
    pub value: Kernel,
    pub derivative: Kernel,
}

/// Build the `(value, derivative)` kernel pair for a component family.
///
/// `outputs` are ordered per the contract's output list, `derivatives` per
/// its state list. Stateless families get a no-op derivative kernel.
pub fn build_kernel_pair(
    spec: &ComponentSpec,
    family: ComponentFamily,
    outputs: &[Expr],
    derivatives: &[Expr],
    mode: BindingMode,
) -> KernelResult<KernelPair> {
    if outputs.len() != spec.outputs.len() {
        return Err(KernelError::StructuralBuild {
            details: format!(
                "component '{}': {} output expressions for {} declared outputs",
                spec.name,
                outputs.len(),
                spec.outputs.len()
            ),
        });
    }
    if derivatives.len() != spec.states.len() {
        return Err(KernelError::StructuralBuild {
            details: format!(
                "component '{}': {} derivative expressions for {} declared states",
                spec.name,
                derivatives.len(),
                spec.states.len()
            ),
        });
    }
    if family == ComponentFamily::Flux && spec.is_stateful() {
        return Err(KernelError::StructuralBuild {
            details: format!(
                "component '{}' declares states but was built as a plain flux",
                spec.name
            ),
        });
    }

    let value = match family {
        ComponentFamily::RoutedNetwork => compile_routed_value(spec, outputs, derivatives, mode)?,
        _ => compile_kernel(spec, family.value_rank(), KernelRole::Value, outputs, mode)?,
    };

    let derivative = match family.derivative_rank() {
        None => Kernel::noop(&spec.name),
        Some(rank) => compile_kernel(spec, rank, KernelRole::Derivative, derivatives, mode)?,
    };

    Ok(KernelPair { value, derivative })
}

/// Routed-network value kernel: outputs and derivative assignments in one
/// body with a combined `[outputs..., derivatives...]` return.
fn compile_routed_value(
    spec: &ComponentSpec,
    outputs: &[Expr],
    derivatives: &[Expr],
    mode: BindingMode,
) -> KernelResult<Kernel> {
    let rank = ComponentFamily::RoutedNetwork.value_rank();
    let strategy = rank.broadcast();

    let deriv_names: Vec<String> = spec.states.iter().map(|s| derivative_name(s)).collect();
    let mut computations = generate_computations(&spec.outputs, outputs, strategy)?;
    computations.extend(generate_computations(&deriv_names, derivatives, strategy)?);

    assemble(KernelSpec {
        signature: Signature {
            component: spec.name.clone(),
            rank,
            role: KernelRole::Value,
            takes_state: spec.is_stateful(),
            mode,
        },
        bindings: generate_bindings(spec),
        computations,
        ret: ReturnSpec::Combined {
            outputs: spec.outputs.clone(),
            derivatives: deriv_names,
        },
    })
}

/// Piecewise unit-hydrograph weight and maximum-lag functions.
///
/// Built from an ordered list of `(upper bound, value)` expression pairs.
/// [`UnitHydrograph::weight`] selects over inclusive intervals with the
/// thresholds taken in descending order and a floor of zero. For `t` beyond
/// the largest threshold the weight is `1.0`; this fallback is the
/// documented saturation policy, guaranteeing total coverage, and is applied
/// uniformly regardless of how many segments were declared.
pub struct UnitHydrograph {
    segments: Vec<(Expr, Expr)>,
    max_lag: Expr,
}

impl UnitHydrograph {
    /// Build from segment pairs plus the maximum-lag expression.
    pub fn build(segments: Vec<(Expr, Expr)>, max_lag: Expr) -> KernelResult<Self> {
        if segments.is_empty() {
            return Err(KernelError::StructuralBuild {
                details: "unit hydrograph needs at least one (threshold, value) segment"
                    .to_string(),
            });
        }
        Ok(Self { segments, max_lag })
    }

    /// Evaluate the weight at time offset `t`.
    ///
    /// Segment expressions may reference `t` and any parameter name.
    pub fn weight(&self, t: f64, params: &ParamBag) -> KernelResult<f64> {
        let scope = Self::scope(Some(t), params);

        // Walk thresholds in descending order; the innermost inclusive
        // interval containing t wins. Fallback of 1.0 past the largest
        // threshold.
        let mut selected = 1.0;
        for (threshold, value) in self.segments.iter().rev() {
            let upper = Self::scalar(threshold, &scope, "threshold")?;
            if t <= upper {
                selected = Self::scalar(value, &scope, "segment value")?;
            }
        }
        Ok(selected)
    }

    /// Ceiling of the maximum-lag expression.
    pub fn max_lag(&self, params: &ParamBag) -> KernelResult<f64> {
        let scope = Self::scope(None, params);
        Ok(Self::scalar(&self.max_lag, &scope, "max lag")?.ceil())
    }

    fn scope(t: Option<f64>, params: &ParamBag) -> ParamBag {
        let mut scope: ParamBag = params.clone();
        if let Some(t) = t {
            scope.insert("t".to_string(), Value::Scalar(t));
        }
        scope
    }

    fn scalar(expr: &Expr, scope: &ParamBag, what: &str) -> KernelResult<f64> {
        match eval_expr_over(expr, scope)? {
            Value::Scalar(v) => Ok(v),
            other => Err(KernelError::Error(format!(
                "unit hydrograph {} must evaluate to a scalar, got {}-d value",
                what,
                other.ndim()
            ))),
        }
    }
}
