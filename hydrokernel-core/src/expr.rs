//! Expression IR consumed by the kernel compiler.
//!
//! Expressions are plain tagged-union trees over named variables. The core
//! never simplifies them algebraically; it only rewrites them (broadcast
//! marking), renders them into statements, and evaluates them against a
//! kernel scope.
//!
//! Builder helpers and operator overloads keep component definitions close
//! to the mathematical notation:
//!
//! ```
//! use hydrokernel_core::expr::Expr;
//!
//! let flux = Expr::var("k") * (Expr::var("temp") + Expr::var("prcp"));
//! assert_eq!(flux.render(), "(k * (temp + prcp))");
//! ```

use crate::rank::BroadcastStrategy;
use serde::{Deserialize, Serialize};
use std::ops;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Max,
    Min,
}

impl BinaryOp {
    fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
            BinaryOp::Max => "max",
            BinaryOp::Min => "min",
        }
    }

    fn is_infix(&self) -> bool {
        !matches!(self, BinaryOp::Max | BinaryOp::Min)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Exp,
    Log,
    Sqrt,
    Abs,
    Tanh,
    Ceil,
    Floor,
}

impl UnaryOp {
    fn name(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Exp => "exp",
            UnaryOp::Log => "log",
            UnaryOp::Sqrt => "sqrt",
            UnaryOp::Abs => "abs",
            UnaryOp::Tanh => "tanh",
            UnaryOp::Ceil => "ceil",
            UnaryOp::Floor => "floor",
        }
    }
}

/// Abstract expression tree over named variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(f64),
    Var(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        /// Whether the operator applies per element. Set by
        /// [`Expr::apply_broadcast`]; re-marking is a no-op.
        elementwise: bool,
    },
    /// Elementary-function or network-slot invocation.
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn lit(value: f64) -> Self {
        Expr::Literal(value)
    }

    pub fn var(name: &str) -> Self {
        Expr::Var(name.to_string())
    }

    pub fn call(name: &str, args: Vec<Expr>) -> Self {
        Expr::Call {
            name: name.to_string(),
            args,
        }
    }

    fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            elementwise: false,
        }
    }

    pub fn pow(self, exponent: Expr) -> Self {
        Expr::binary(BinaryOp::Pow, self, exponent)
    }

    pub fn max(self, other: Expr) -> Self {
        Expr::binary(BinaryOp::Max, self, other)
    }

    pub fn min(self, other: Expr) -> Self {
        Expr::binary(BinaryOp::Min, self, other)
    }

    pub fn exp(self) -> Self {
        Expr::unary(UnaryOp::Exp, self)
    }

    pub fn log(self) -> Self {
        Expr::unary(UnaryOp::Log, self)
    }

    pub fn sqrt(self) -> Self {
        Expr::unary(UnaryOp::Sqrt, self)
    }

    pub fn abs(self) -> Self {
        Expr::unary(UnaryOp::Abs, self)
    }

    pub fn tanh(self) -> Self {
        Expr::unary(UnaryOp::Tanh, self)
    }

    pub fn ceil(self) -> Self {
        Expr::unary(UnaryOp::Ceil, self)
    }

    pub fn floor(self) -> Self {
        Expr::unary(UnaryOp::Floor, self)
    }

    /// Apply a broadcasting strategy to the tree.
    ///
    /// Purely syntactic: no evaluation happens, only operator marking.
    /// Idempotent by construction since marking an already element-wise
    /// operator is a no-op rather than a double wrap.
    pub fn apply_broadcast(self, strategy: BroadcastStrategy) -> Self {
        match strategy {
            BroadcastStrategy::None => self,
            BroadcastStrategy::ElementWise => match self {
                Expr::Literal(_) | Expr::Var(_) => self,
                Expr::Unary { op, operand } => Expr::Unary {
                    op,
                    operand: Box::new(operand.apply_broadcast(strategy)),
                },
                Expr::Binary { op, lhs, rhs, .. } => Expr::Binary {
                    op,
                    lhs: Box::new(lhs.apply_broadcast(strategy)),
                    rhs: Box::new(rhs.apply_broadcast(strategy)),
                    elementwise: true,
                },
                Expr::Call { name, args } => Expr::Call {
                    name,
                    args: args
                        .into_iter()
                        .map(|a| a.apply_broadcast(strategy))
                        .collect(),
                },
            },
        }
    }

    /// Render the tree to its flat operator-expression form.
    ///
    /// Element-wise operators carry a `.` marker, e.g. `(a .+ b)`.
    pub fn render(&self) -> String {
        match self {
            Expr::Literal(v) => format!("{}", v),
            Expr::Var(name) => name.clone(),
            Expr::Unary { op, operand } => match op {
                UnaryOp::Neg => format!("(-{})", operand.render()),
                _ => format!("{}({})", op.name(), operand.render()),
            },
            Expr::Binary {
                op,
                lhs,
                rhs,
                elementwise,
            } => {
                let dot = if *elementwise { "." } else { "" };
                if op.is_infix() {
                    format!("({} {}{} {})", lhs.render(), dot, op.symbol(), rhs.render())
                } else {
                    format!("{}{}({}, {})", op.symbol(), dot, lhs.render(), rhs.render())
                }
            }
            Expr::Call { name, args } => {
                let rendered: Vec<String> = args.iter().map(|a| a.render()).collect();
                format!("{}({})", name, rendered.join(", "))
            }
        }
    }

    /// Collect the free variable names, in first-use order.
    pub fn variables(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables(&self, names: &mut Vec<String>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Var(name) => {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
            Expr::Unary { operand, .. } => operand.collect_variables(names),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_variables(names);
                rhs.collect_variables(names);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_variables(names);
                }
            }
        }
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Literal(value)
    }
}

impl ops::Add for Expr {
    type Output = Expr;
    fn add(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Add, self, rhs)
    }
}

impl ops::Sub for Expr {
    type Output = Expr;
    fn sub(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Sub, self, rhs)
    }
}

impl ops::Mul for Expr {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Mul, self, rhs)
    }
}

impl ops::Div for Expr {
    type Output = Expr;
    fn div(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Div, self, rhs)
    }
}

impl ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::unary(UnaryOp::Neg, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Expr {
        Expr::var("k") * (Expr::var("temp") + Expr::var("prcp"))
    }

    #[test]
    fn test_render_plain() {
        assert_eq!(sample().render(), "(k * (temp + prcp))");
    }

    #[test]
    fn test_render_elementwise_marker() {
        let marked = sample().apply_broadcast(BroadcastStrategy::ElementWise);
        assert_eq!(marked.render(), "(k .* (temp .+ prcp))");
    }

    #[test]
    fn test_apply_broadcast_none_is_identity() {
        let expr = sample();
        assert_eq!(expr.clone().apply_broadcast(BroadcastStrategy::None), expr);
    }

    #[test]
    fn test_apply_broadcast_idempotent() {
        let once = sample().apply_broadcast(BroadcastStrategy::ElementWise);
        let twice = once.clone().apply_broadcast(BroadcastStrategy::ElementWise);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_variables_first_use_order() {
        let expr = (Expr::var("b") + Expr::var("a")) * Expr::var("b");
        assert_eq!(expr.variables(), vec!["b", "a"]);
    }

    #[test]
    fn test_function_style_render() {
        let expr = Expr::var("x").max(Expr::lit(0.0));
        assert_eq!(expr.render(), "max(x, 0)");

        let marked = expr.apply_broadcast(BroadcastStrategy::ElementWise);
        assert_eq!(marked.render(), "max.(x, 0)");
    }

    #[test]
    fn test_serialization_round_trip() {
        let expr = sample().apply_broadcast(BroadcastStrategy::ElementWise);
        let json = serde_json::to_string(&expr).unwrap();
        let deserialized: Expr = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, expr);
    }
}
