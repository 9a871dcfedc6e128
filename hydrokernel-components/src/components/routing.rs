//! Routed-network components.
//!
//! Routing delegates the storage-to-discharge relation to a pluggable
//! sub-model bound through the contract's network slot, so one component
//! covers linear reservoirs, rating curves and learned surrogates alike. The
//! value kernel runs at matrix rank and returns outputs and state derivatives
//! in one combined sequence.

use super::ComponentDefinition;
use hydrokernel_core::compile::ComponentFamily;
use hydrokernel_core::errors::KernelResult;
use hydrokernel_core::expr::Expr;
use hydrokernel_core::spec::ComponentSpec;

/// Channel routing with a sub-model discharge law.
///
/// `outflow = route(storage / k)` and `d_storage = inflow - outflow`, where
/// `route` is whatever sub-model the caller binds into the `route` slot.
pub fn river_network() -> KernelResult<ComponentDefinition> {
    let spec = ComponentSpec::new(
        "river_network",
        &["inflow"],
        &["outflow"],
        &["storage"],
        &["k"],
        &["route"],
    )?;
    let outflow = Expr::call("route", vec![Expr::var("storage") / Expr::var("k")]);
    let balance = Expr::var("inflow") - outflow.clone();
    Ok(ComponentDefinition {
        spec,
        family: ComponentFamily::RoutedNetwork,
        outputs: vec![outflow],
        derivatives: vec![balance],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydrokernel_core::kernel::{
        BindingMode, KernelArgs, NetworkBag, ParamBag, SliceView, SubModel,
    };
    use hydrokernel_core::value::Value;
    use is_close::is_close;
    use ndarray::array;
    use std::sync::Arc;

    fn linear_route() -> Arc<dyn SubModel> {
        Arc::new(|args: &[Value]| -> KernelResult<Value> { Ok(args[0].clone()) })
    }

    #[test]
    fn test_value_kernel_returns_outputs_then_derivatives() {
        let pair = river_network()
            .unwrap()
            .build(BindingMode::Checked)
            .unwrap();

        let input = array![[[1.0, 1.0], [1.0, 1.0]]]; // inflow
        let state = array![[[2.0, 4.0], [6.0, 8.0]]]; // storage
        let params: ParamBag = [("k".to_string(), Value::Scalar(2.0))].into_iter().collect();
        let mut networks = NetworkBag::new();
        networks.insert("route".to_string(), linear_route());

        let args = KernelArgs::new(SliceView::Matrix(input.view()), &params, &networks)
            .with_state(SliceView::Matrix(state.view()));
        let result = pair.value.call(&args).unwrap();

        assert_eq!(result.len(), 2);
        let outflow = result[0].as_matrix().unwrap();
        let d_storage = result[1].as_matrix().unwrap();
        assert!(is_close!(outflow[[0, 0]], 1.0));
        assert!(is_close!(outflow[[1, 1]], 4.0));
        assert!(is_close!(d_storage[[0, 0]], 0.0));
        assert!(is_close!(d_storage[[1, 1]], -3.0));
    }

    #[test]
    fn test_derivative_kernel_runs_at_vector_rank() {
        let pair = river_network()
            .unwrap()
            .build(BindingMode::Checked)
            .unwrap();

        let input = array![[3.0, 3.0]]; // inflow per cell
        let state = array![[2.0, 8.0]];
        let params: ParamBag = [("k".to_string(), Value::Scalar(2.0))].into_iter().collect();
        let mut networks = NetworkBag::new();
        networks.insert("route".to_string(), linear_route());

        let args = KernelArgs::new(SliceView::Vector(input.view()), &params, &networks)
            .with_state(SliceView::Vector(state.view()));
        let result = pair.derivative.call(&args).unwrap();

        assert_eq!(result.len(), 1);
        let d_storage = result[0].as_vector().unwrap();
        assert!(is_close!(d_storage[0], 2.0));
        assert!(is_close!(d_storage[1], -1.0));
    }

    #[test]
    fn test_missing_network_binding_is_reported() {
        let pair = river_network()
            .unwrap()
            .build(BindingMode::Checked)
            .unwrap();

        let input = array![[[1.0]]];
        let state = array![[[2.0]]];
        let params: ParamBag = [("k".to_string(), Value::Scalar(2.0))].into_iter().collect();
        let networks = NetworkBag::new();

        let args = KernelArgs::new(SliceView::Matrix(input.view()), &params, &networks)
            .with_state(SliceView::Matrix(state.view()));
        let err = pair.value.call(&args).unwrap_err();
        assert!(err.to_string().contains("route"));
    }
}
