//! Runtime values flowing through compiled kernels.
//!
//! A [`Value`] is either a scalar, a per-column vector or a per-grid matrix,
//! matching the three ranks. Arithmetic between values follows the broadcast
//! strategy baked into the expression: a non-element-wise operator only
//! accepts scalars, while an element-wise operator broadcasts scalars
//! against arrays and combines arrays of equal shape.

use crate::errors::{KernelError, KernelResult};
use ndarray::{Array1, Array2};

/// A scalar, vector or matrix value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(f64),
    Vector(Array1<f64>),
    Matrix(Array2<f64>),
}

impl Value {
    /// Number of array dimensions (0 for scalars).
    pub fn ndim(&self) -> usize {
        match self {
            Value::Scalar(_) => 0,
            Value::Vector(_) => 1,
            Value::Matrix(_) => 2,
        }
    }

    /// Get the scalar value if this is a Scalar variant.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&Array1<f64>> {
        match self {
            Value::Vector(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_matrix(&self) -> Option<&Array2<f64>> {
        match self {
            Value::Matrix(v) => Some(v),
            _ => None,
        }
    }

    /// Whether any element is NaN or infinite.
    pub fn has_non_finite(&self) -> bool {
        match self {
            Value::Scalar(v) => !v.is_finite(),
            Value::Vector(v) => v.iter().any(|x| !x.is_finite()),
            Value::Matrix(v) => v.iter().any(|x| !x.is_finite()),
        }
    }

    /// Whether any element is negative.
    pub fn has_negative(&self) -> bool {
        match self {
            Value::Scalar(v) => *v < 0.0,
            Value::Vector(v) => v.iter().any(|x| *x < 0.0),
            Value::Matrix(v) => v.iter().any(|x| *x < 0.0),
        }
    }

    /// Apply a pointwise unary function.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Value {
        match self {
            Value::Scalar(v) => Value::Scalar(f(*v)),
            Value::Vector(v) => Value::Vector(v.mapv(&f)),
            Value::Matrix(v) => Value::Matrix(v.mapv(&f)),
        }
    }

    /// Combine two values with a binary function under a broadcast flag.
    pub fn combine(
        &self,
        other: &Value,
        elementwise: bool,
        f: impl Fn(f64, f64) -> f64,
    ) -> KernelResult<Value> {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(f(*a, *b))),
            _ if !elementwise => Err(KernelError::Error(format!(
                "operator applied once cannot combine {}-d and {}-d operands; \
                 an element-wise broadcast strategy is required",
                self.ndim(),
                other.ndim()
            ))),
            (Value::Scalar(a), Value::Vector(b)) => Ok(Value::Vector(b.mapv(|x| f(*a, x)))),
            (Value::Vector(a), Value::Scalar(b)) => Ok(Value::Vector(a.mapv(|x| f(x, *b)))),
            (Value::Scalar(a), Value::Matrix(b)) => Ok(Value::Matrix(b.mapv(|x| f(*a, x)))),
            (Value::Matrix(a), Value::Scalar(b)) => Ok(Value::Matrix(a.mapv(|x| f(x, *b)))),
            (Value::Vector(a), Value::Vector(b)) => {
                if a.len() != b.len() {
                    return Err(KernelError::ShapeMismatch {
                        context: "element-wise vector operation".to_string(),
                        expected: a.len(),
                        actual: b.len(),
                        hint: "operand lengths must agree".to_string(),
                    });
                }
                let mut out = a.clone();
                out.zip_mut_with(b, |x, y| *x = f(*x, *y));
                Ok(Value::Vector(out))
            }
            (Value::Matrix(a), Value::Matrix(b)) => {
                if a.shape() != b.shape() {
                    return Err(KernelError::ShapeMismatch {
                        context: "element-wise matrix operation".to_string(),
                        expected: a.nrows(),
                        actual: b.nrows(),
                        hint: format!(
                            "operand shapes must agree, got {:?} and {:?}",
                            a.shape(),
                            b.shape()
                        ),
                    });
                }
                let mut out = a.clone();
                out.zip_mut_with(b, |x, y| *x = f(*x, *y));
                Ok(Value::Matrix(out))
            }
            (Value::Vector(a), Value::Matrix(b)) | (Value::Matrix(b), Value::Vector(a)) => {
                Err(KernelError::ShapeMismatch {
                    context: "element-wise operation".to_string(),
                    expected: b.nrows(),
                    actual: a.len(),
                    hint: "cannot combine vector and matrix operands".to_string(),
                })
            }
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Scalar(value)
    }
}

impl From<Array1<f64>> for Value {
    fn from(value: Array1<f64>) -> Self {
        Value::Vector(value)
    }
}

impl From<Array2<f64>> for Value {
    fn from(value: Array2<f64>) -> Self {
        Value::Matrix(value)
    }
}

impl From<Vec<f64>> for Value {
    fn from(value: Vec<f64>) -> Self {
        Value::Vector(Array1::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_scalar_combine() {
        let a = Value::Scalar(2.0);
        let b = Value::Scalar(3.0);
        assert_eq!(
            a.combine(&b, false, |x, y| x * y).unwrap(),
            Value::Scalar(6.0)
        );
    }

    #[test]
    fn test_non_elementwise_rejects_arrays() {
        let a = Value::Scalar(2.0);
        let b = Value::Vector(array![1.0, 2.0]);
        assert!(a.combine(&b, false, |x, y| x + y).is_err());
    }

    #[test]
    fn test_scalar_broadcasts_over_vector() {
        let a = Value::Scalar(2.0);
        let b = Value::Vector(array![1.0, 2.0, 3.0]);
        assert_eq!(
            a.combine(&b, true, |x, y| x * y).unwrap(),
            Value::Vector(array![2.0, 4.0, 6.0])
        );
    }

    #[test]
    fn test_vector_length_mismatch() {
        let a = Value::Vector(array![1.0, 2.0]);
        let b = Value::Vector(array![1.0, 2.0, 3.0]);
        assert!(matches!(
            a.combine(&b, true, |x, y| x + y),
            Err(KernelError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_matrix_broadcast() {
        let a = Value::Matrix(array![[1.0, 2.0], [3.0, 4.0]]);
        let b = Value::Scalar(10.0);
        assert_eq!(
            a.combine(&b, true, |x, y| x + y).unwrap(),
            Value::Matrix(array![[11.0, 12.0], [13.0, 14.0]])
        );
    }

    #[test]
    fn test_value_scans() {
        assert!(Value::Scalar(f64::NAN).has_non_finite());
        assert!(Value::Vector(array![1.0, f64::INFINITY]).has_non_finite());
        assert!(!Value::Scalar(1.0).has_non_finite());
        assert!(Value::Vector(array![1.0, -0.5]).has_negative());
        assert!(!Value::Matrix(array![[0.0, 1.0]]).has_negative());
    }
}
