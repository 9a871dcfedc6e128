//! Declarative simulation components compiled into shape-specialized numeric
//! kernels.
//!
//! This crate re-exports the two workspace members:
//! - [`hydrokernel_core`]: component contracts, the rank-polymorphic kernel
//!   compiler and the runtime-argument validator.
//! - [`hydrokernel_components`]: concrete component definitions (fluxes,
//!   buckets, routing, unit hydrographs) built on the core.

pub use hydrokernel_components as components;
pub use hydrokernel_core as core;
