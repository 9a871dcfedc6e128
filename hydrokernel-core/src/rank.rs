//! The rank model: array-shape classes kernels are specialized for.
//!
//! [`Rank`] is a closed set of three tags. Every consumer matches on it
//! exhaustively; the set is not open to extension.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Array-shape class a kernel is specialized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rank {
    /// One value per variable: `x := input[i]`.
    Scalar,
    /// A column per variable: `x := input[(i, :)]`.
    Vector,
    /// A grid per variable: `x := input[(i, :, :)]`.
    Matrix,
}

/// Whether an expression's operators apply once or per element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BroadcastStrategy {
    None,
    ElementWise,
}

/// Indexing pattern extracting one variable from an input slice.
///
/// Positions are 1-based in the rendered form, matching the binding order of
/// the component contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexPattern {
    Scalar(usize),
    Vector(usize),
    Matrix(usize),
}

impl IndexPattern {
    /// The 1-based variable position this pattern extracts.
    pub fn position(&self) -> usize {
        match self {
            IndexPattern::Scalar(i) | IndexPattern::Vector(i) | IndexPattern::Matrix(i) => *i,
        }
    }
}

impl fmt::Display for IndexPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexPattern::Scalar(i) => write!(f, "{}", i),
            IndexPattern::Vector(i) => write!(f, "({}, :)", i),
            IndexPattern::Matrix(i) => write!(f, "({}, :, :)", i),
        }
    }
}

impl Rank {
    /// Broadcast strategy derived from the rank.
    pub fn broadcast(&self) -> BroadcastStrategy {
        match self {
            Rank::Scalar => BroadcastStrategy::None,
            Rank::Vector | Rank::Matrix => BroadcastStrategy::ElementWise,
        }
    }

    /// Indexing pattern for the variable at 1-based `position`.
    pub fn index_pattern(&self, position: usize) -> IndexPattern {
        match self {
            Rank::Scalar => IndexPattern::Scalar(position),
            Rank::Vector => IndexPattern::Vector(position),
            Rank::Matrix => IndexPattern::Matrix(position),
        }
    }

    /// Highest state dimensionality the rank implies.
    ///
    /// Used by the validator to warn (non-fatally) about over-dimensioned
    /// initial states.
    pub fn state_ndim_limit(&self) -> usize {
        match self {
            Rank::Scalar | Rank::Vector => 1,
            Rank::Matrix => 2,
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rank::Scalar => write!(f, "Scalar"),
            Rank::Vector => write!(f, "Vector"),
            Rank::Matrix => write!(f, "Matrix"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_strategy() {
        assert_eq!(Rank::Scalar.broadcast(), BroadcastStrategy::None);
        assert_eq!(Rank::Vector.broadcast(), BroadcastStrategy::ElementWise);
        assert_eq!(Rank::Matrix.broadcast(), BroadcastStrategy::ElementWise);
    }

    #[test]
    fn test_index_pattern_rendering() {
        for i in 1..=4 {
            assert_eq!(Rank::Scalar.index_pattern(i).to_string(), format!("{}", i));
            assert_eq!(
                Rank::Vector.index_pattern(i).to_string(),
                format!("({}, :)", i)
            );
            assert_eq!(
                Rank::Matrix.index_pattern(i).to_string(),
                format!("({}, :, :)", i)
            );
        }
    }

    #[test]
    fn test_state_ndim_limit() {
        assert_eq!(Rank::Scalar.state_ndim_limit(), 1);
        assert_eq!(Rank::Vector.state_ndim_limit(), 1);
        assert_eq!(Rank::Matrix.state_ndim_limit(), 2);
    }
}
