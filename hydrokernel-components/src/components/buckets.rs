//! Stateful bucket components.
//!
//! A bucket bundles its output fluxes with the state derivatives that balance
//! them, so a single contract drives both kernels of the pair. The same
//! definition can be built for a single unit ([`ComponentFamily::BucketSingle`],
//! vector-rank values) or per grid cell ([`ComponentFamily::BucketMultiply`],
//! matrix-rank values).

use super::{step, ComponentDefinition};
use hydrokernel_core::compile::ComponentFamily;
use hydrokernel_core::errors::KernelResult;
use hydrokernel_core::expr::Expr;
use hydrokernel_core::spec::ComponentSpec;

fn snowfall_expr() -> Expr {
    step(Expr::var("Tmin") - Expr::var("temp")) * Expr::var("prcp")
}

fn rainfall_expr() -> Expr {
    step(Expr::var("temp") - Expr::var("Tmin")) * Expr::var("prcp")
}

fn melt_expr() -> Expr {
    let excess = Expr::var("temp") - Expr::var("Tmax");
    step(excess.clone()) * Expr::var("snowpack").min(Expr::var("Df") * excess)
}

/// Snow store: partitions precipitation and melts by degree-day.
///
/// Outputs `[snowfall, rainfall, melt]`; the snowpack balance is
/// `d_snowpack = snowfall - melt`.
pub fn snowpack_bucket(family: ComponentFamily) -> KernelResult<ComponentDefinition> {
    let spec = ComponentSpec::new(
        "snowpack_bucket",
        &["temp", "prcp"],
        &["snowfall", "rainfall", "melt"],
        &["snowpack"],
        &["Tmin", "Tmax", "Df"],
        &[],
    )?;
    Ok(ComponentDefinition {
        spec,
        family,
        outputs: vec![snowfall_expr(), rainfall_expr(), melt_expr()],
        derivatives: vec![snowfall_expr() - melt_expr()],
    })
}

fn evap_expr() -> Expr {
    step(Expr::var("soilwater"))
        * Expr::var("pet")
        * Expr::lit(1.0).min(Expr::var("soilwater") / Expr::var("Smax"))
}

fn baseflow_expr() -> Expr {
    let deficit = Expr::var("Smax") - Expr::var("Smax").min(Expr::var("soilwater"));
    step(Expr::var("soilwater")) * Expr::var("Qmax") * (-(Expr::var("f") * deficit)).exp()
}

fn surfaceflow_expr() -> Expr {
    Expr::lit(0.0).max(Expr::var("soilwater") - Expr::var("Smax"))
}

/// Soil store: evaporation, exponential baseflow and saturation excess.
///
/// Outputs `[evap, baseflow, surfaceflow, flow]` where `flow` is the sum of
/// the two runoff terms; the water balance is
/// `d_soilwater = rainfall + melt - evap - baseflow - surfaceflow`.
pub fn soilwater_bucket(family: ComponentFamily) -> KernelResult<ComponentDefinition> {
    let spec = ComponentSpec::new(
        "soilwater_bucket",
        &["rainfall", "melt", "pet"],
        &["evap", "baseflow", "surfaceflow", "flow"],
        &["soilwater"],
        &["Smax", "Qmax", "f"],
        &[],
    )?;
    let balance = Expr::var("rainfall") + Expr::var("melt")
        - evap_expr()
        - baseflow_expr()
        - surfaceflow_expr();
    Ok(ComponentDefinition {
        spec,
        family,
        outputs: vec![
            evap_expr(),
            baseflow_expr(),
            surfaceflow_expr(),
            baseflow_expr() + surfaceflow_expr(),
        ],
        derivatives: vec![balance],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydrokernel_core::kernel::{BindingMode, KernelArgs, NetworkBag, ParamBag, SliceView};
    use hydrokernel_core::value::Value;
    use is_close::{all_close, is_close};
    use ndarray::array;

    fn snow_params() -> ParamBag {
        [("Tmin", -1.0), ("Tmax", 0.0), ("Df", 2.0)]
            .iter()
            .map(|(k, v)| (k.to_string(), Value::Scalar(*v)))
            .collect()
    }

    fn soil_params() -> ParamBag {
        [("Smax", 100.0), ("Qmax", 5.0), ("f", 0.05)]
            .iter()
            .map(|(k, v)| (k.to_string(), Value::Scalar(*v)))
            .collect()
    }

    #[test]
    fn test_snowpack_single_value_kernel_runs_per_cell() {
        let pair = snowpack_bucket(ComponentFamily::BucketSingle)
            .unwrap()
            .build(BindingMode::Checked)
            .unwrap();

        // Two cells: one cold and snowy, one warm and melting.
        let input = array![[-6.0, 5.0], [10.0, 0.0]]; // temp, prcp
        let state = array![[20.0, 20.0]]; // snowpack
        let params = snow_params();
        let networks = NetworkBag::new();
        let args = KernelArgs::new(SliceView::Vector(input.view()), &params, &networks)
            .with_state(SliceView::Vector(state.view()));

        let result = pair.value.call(&args).unwrap();
        assert_eq!(result.len(), 3);
        let snowfall = result[0].as_vector().unwrap();
        let melt = result[2].as_vector().unwrap();
        assert!(all_close!(snowfall.to_vec(), vec![10.0, 0.0], abs_tol = 1e-9));
        // Warm cell melts Df * 5 = 10, limited by snowpack 20.
        assert!(all_close!(melt.to_vec(), vec![0.0, 10.0], abs_tol = 1e-9));
    }

    #[test]
    fn test_snowpack_derivative_balances_snowfall_and_melt() {
        let pair = snowpack_bucket(ComponentFamily::BucketSingle)
            .unwrap()
            .build(BindingMode::Checked)
            .unwrap();

        let input = array![-6.0, 10.0]; // temp, prcp
        let state = array![20.0];
        let params = snow_params();
        let networks = NetworkBag::new();
        let args = KernelArgs::new(SliceView::Scalar(input.view()), &params, &networks)
            .with_state(SliceView::Scalar(state.view()));

        let result = pair.derivative.call(&args).unwrap();
        assert_eq!(result.len(), 1);
        // Cold day: all precipitation accumulates, nothing melts.
        assert!(is_close!(result[0].as_scalar().unwrap(), 10.0));
    }

    #[test]
    fn test_soilwater_flow_is_sum_of_runoff_terms() {
        let pair = soilwater_bucket(ComponentFamily::BucketSingle)
            .unwrap()
            .build(BindingMode::Checked)
            .unwrap();

        let input = array![[3.0], [2.0], [1.0]]; // rainfall, melt, pet
        let state = array![[130.0]]; // over capacity
        let params = soil_params();
        let networks = NetworkBag::new();
        let args = KernelArgs::new(SliceView::Vector(input.view()), &params, &networks)
            .with_state(SliceView::Vector(state.view()));

        let result = pair.value.call(&args).unwrap();
        let evap = result[0].as_vector().unwrap()[0];
        let baseflow = result[1].as_vector().unwrap()[0];
        let surfaceflow = result[2].as_vector().unwrap()[0];
        let flow = result[3].as_vector().unwrap()[0];
        assert!(is_close!(evap, 1.0)); // saturated, evaporates at pet
        assert!(is_close!(baseflow, 5.0)); // saturated, Qmax
        assert!(is_close!(surfaceflow, 30.0));
        assert!(is_close!(flow, baseflow + surfaceflow));
    }

    #[test]
    fn test_soilwater_derivative_closes_the_water_balance() {
        let pair = soilwater_bucket(ComponentFamily::BucketSingle)
            .unwrap()
            .build(BindingMode::Checked)
            .unwrap();

        let input = array![3.0, 2.0, 1.0];
        let state = array![130.0];
        let params = soil_params();
        let networks = NetworkBag::new();
        let args = KernelArgs::new(SliceView::Scalar(input.view()), &params, &networks)
            .with_state(SliceView::Scalar(state.view()));

        let result = pair.derivative.call(&args).unwrap();
        // rainfall + melt - evap - baseflow - surfaceflow = 3 + 2 - 1 - 5 - 30
        assert!(is_close!(result[0].as_scalar().unwrap(), -31.0));
    }

    #[test]
    fn test_multiply_family_uses_matrix_rank() {
        let pair = snowpack_bucket(ComponentFamily::BucketMultiply)
            .unwrap()
            .build(BindingMode::Checked)
            .unwrap();

        // 2 variables x 1 row x 2 cols.
        let input = array![[[-6.0, 5.0]], [[10.0, 0.0]]];
        let state = array![[[20.0, 20.0]]];
        let params = snow_params();
        let networks = NetworkBag::new();
        let args = KernelArgs::new(SliceView::Matrix(input.view()), &params, &networks)
            .with_state(SliceView::Matrix(state.view()));

        let result = pair.value.call(&args).unwrap();
        let snowfall = result[0].as_matrix().unwrap();
        assert_eq!(snowfall.shape(), &[1, 2]);
        assert!(is_close!(snowfall[[0, 0]], 10.0));
        assert!(is_close!(snowfall[[0, 1]], 0.0, abs_tol = 1e-9));
    }
}
