//! Component contracts, kernel compilation and runtime validation for
//! declarative simulation models.
//!
//! A component declares its input/output/state/parameter/network-slot names
//! in a [`spec::ComponentSpec`] and its computations as [`expr::Expr`]
//! trees. The [`compile`] module turns that declarative description into
//! shape-specialized, executable kernels; the [`validate`] module checks
//! runtime arguments against the same contract before a kernel runs.

pub mod cache;
pub mod catalog;
pub mod compile;
pub mod expr;
pub mod kernel;
pub mod rank;
pub mod spec;
pub mod validate;
pub mod value;

pub mod errors;

pub use errors::{KernelError, KernelResult};
