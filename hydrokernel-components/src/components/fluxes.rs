//! Plain (stateless) flux components.
//!
//! Each flux declares a scalar-rank value kernel and no derivative kernel.
//! The formulations use the smooth step of [`super::step`] instead of hard
//! conditionals, following the exp-hydro model family.

use super::{step, ComponentDefinition};
use hydrokernel_core::compile::ComponentFamily;
use hydrokernel_core::errors::KernelResult;
use hydrokernel_core::expr::Expr;
use hydrokernel_core::spec::ComponentSpec;

/// Temperature-based rain/snow partition of precipitation.
///
/// snowfall = step(Tmin - temp) * prcp
/// rainfall = step(temp - Tmin) * prcp
pub fn precipitation_partition() -> KernelResult<ComponentDefinition> {
    let spec = ComponentSpec::flux(
        "precipitation_partition",
        &["temp", "prcp"],
        &["snowfall", "rainfall"],
        &["Tmin"],
    )?;
    let snowfall = step(Expr::var("Tmin") - Expr::var("temp")) * Expr::var("prcp");
    let rainfall = step(Expr::var("temp") - Expr::var("Tmin")) * Expr::var("prcp");
    Ok(ComponentDefinition {
        spec,
        family: ComponentFamily::Flux,
        outputs: vec![snowfall, rainfall],
        derivatives: vec![],
    })
}

/// Degree-day snowmelt, limited by the available snowpack.
///
/// melt = step(temp - Tmax) * min(snowpack, Df * (temp - Tmax))
pub fn snowmelt() -> KernelResult<ComponentDefinition> {
    let spec = ComponentSpec::flux(
        "snowmelt",
        &["temp", "snowpack"],
        &["melt"],
        &["Tmax", "Df"],
    )?;
    let excess = Expr::var("temp") - Expr::var("Tmax");
    let melt = step(excess.clone())
        * Expr::var("snowpack").min(Expr::var("Df") * excess);
    Ok(ComponentDefinition {
        spec,
        family: ComponentFamily::Flux,
        outputs: vec![melt],
        derivatives: vec![],
    })
}

/// Soil evaporation scaled by relative storage.
///
/// evap = step(soilwater) * pet * min(1, soilwater / Smax)
pub fn evaporation() -> KernelResult<ComponentDefinition> {
    let spec = ComponentSpec::flux(
        "evaporation",
        &["soilwater", "pet"],
        &["evap"],
        &["Smax"],
    )?;
    let evap = step(Expr::var("soilwater"))
        * Expr::var("pet")
        * Expr::lit(1.0).min(Expr::var("soilwater") / Expr::var("Smax"));
    Ok(ComponentDefinition {
        spec,
        family: ComponentFamily::Flux,
        outputs: vec![evap],
        derivatives: vec![],
    })
}

/// Exponential baseflow from the saturated store.
///
/// baseflow = step(soilwater) * Qmax * exp(-f * (Smax - min(Smax, soilwater)))
pub fn baseflow() -> KernelResult<ComponentDefinition> {
    let spec = ComponentSpec::flux(
        "baseflow",
        &["soilwater"],
        &["baseflow"],
        &["Smax", "Qmax", "f"],
    )?;
    let deficit = Expr::var("Smax") - Expr::var("Smax").min(Expr::var("soilwater"));
    let baseflow =
        step(Expr::var("soilwater")) * Expr::var("Qmax") * (-(Expr::var("f") * deficit)).exp();
    Ok(ComponentDefinition {
        spec,
        family: ComponentFamily::Flux,
        outputs: vec![baseflow],
        derivatives: vec![],
    })
}

/// Saturation-excess surface flow.
///
/// surfaceflow = max(0, soilwater - Smax)
pub fn surface_flow() -> KernelResult<ComponentDefinition> {
    let spec = ComponentSpec::flux(
        "surface_flow",
        &["soilwater"],
        &["surfaceflow"],
        &["Smax"],
    )?;
    let surfaceflow = Expr::lit(0.0).max(Expr::var("soilwater") - Expr::var("Smax"));
    Ok(ComponentDefinition {
        spec,
        family: ComponentFamily::Flux,
        outputs: vec![surfaceflow],
        derivatives: vec![],
    })
}
