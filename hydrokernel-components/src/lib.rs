//! Concrete component definitions built on `hydrokernel-core`.
//!
//! These follow the exp-hydro lineage: a snowpack bucket partitioning
//! precipitation, a soil-water bucket producing evaporation and flow, plain
//! flux components, a routed channel network and unit-hydrograph lag
//! curves. Each module declares a contract plus expressions and builds
//! its kernels through the core's kernel-pair builder.

pub mod components;
