pub mod buckets;
pub mod fluxes;
pub mod routing;
pub mod uh;

use hydrokernel_core::compile::{build_kernel_pair, ComponentFamily, KernelPair};
use hydrokernel_core::errors::KernelResult;
use hydrokernel_core::expr::Expr;
use hydrokernel_core::kernel::BindingMode;
use hydrokernel_core::spec::ComponentSpec;

/// A component definition: contract, expressions and family, ready to
/// compile into a kernel pair.
pub struct ComponentDefinition {
    pub spec: ComponentSpec,
    pub family: ComponentFamily,
    pub outputs: Vec<Expr>,
    pub derivatives: Vec<Expr>,
}

impl ComponentDefinition {
    /// Compile the `(value, derivative)` kernel pair.
    pub fn build(&self, mode: BindingMode) -> KernelResult<KernelPair> {
        build_kernel_pair(
            &self.spec,
            self.family,
            &self.outputs,
            &self.derivatives,
            mode,
        )
    }
}

/// Smooth step function used throughout the flux formulations.
///
/// `step(x) = (tanh(5x) + 1) / 2`, a differentiable approximation of the
/// Heaviside step so that generated kernels stay compatible with
/// gradient-based calibration.
pub fn step(x: Expr) -> Expr {
    (Expr::lit(5.0) * x).tanh() * Expr::lit(0.5) + Expr::lit(0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_renders() {
        assert_eq!(
            step(Expr::var("x")).render(),
            "((tanh((5 * x)) * 0.5) + 0.5)"
        );
    }
}
