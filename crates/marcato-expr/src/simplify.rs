//! Constant folding over the expression sum type.
//!
//! Folding is semantics-preserving: a subtree is only replaced by its
//! value when evaluating it cannot depend on bindings and cannot change
//! observable behavior. Subtrees whose evaluation fails (such as a
//! constant division by zero) are left in place so the error still
//! surfaces at evaluation time.

use crate::eval::{Evaluator, NO_BINDINGS, is_intrinsic};
use crate::parser::{BinaryOp, Expr};

pub fn simplify(expr: &Expr) -> Expr {
    match expr {
        Expr::Const(_) | Expr::Var(_) => expr.clone(),
        Expr::Unary { op, expr } => {
            let inner = simplify(expr);
            fold(Expr::Unary { op: *op, expr: Box::new(inner) })
        }
        Expr::Binary { op, left, right } => {
            let left = simplify(left);
            let right = simplify(right);
            // Short-circuit operators fold against a constant left side
            // without looking at the right: `false && x` never evaluates
            // x, so dropping x preserves semantics.
            if let Expr::Const(v) = &left {
                if let Ok(b) = v.as_bool() {
                    match (op, b) {
                        (BinaryOp::And, false) => return Expr::constant(false),
                        (BinaryOp::And, true) => return right,
                        (BinaryOp::Or, true) => return Expr::constant(true),
                        (BinaryOp::Or, false) => return right,
                        _ => {}
                    }
                }
            }
            fold(Expr::Binary { op: *op, left: Box::new(left), right: Box::new(right) })
        }
        Expr::Call { name, args } => {
            let args: Vec<Expr> = args.iter().map(simplify).collect();
            let call = Expr::Call { name: name.clone(), args };
            // Only the pure intrinsics fold; Print is an effect and user
            // functions are not visible here.
            if let Expr::Call { name, args } = &call {
                let foldable = is_intrinsic(name)
                    && name != "Print"
                    && name != "PrintValue"
                    && args.iter().all(|a| matches!(a, Expr::Const(_)));
                if foldable {
                    return fold(call.clone());
                }
            }
            call
        }
        Expr::Brackets(inner) => {
            let inner = simplify(inner);
            match inner {
                Expr::Const(v) => Expr::Const(v),
                other => Expr::Brackets(Box::new(other)),
            }
        }
    }
}

/// Replace a closed subtree by its value when it evaluates cleanly.
fn fold(expr: Expr) -> Expr {
    let closed = match &expr {
        Expr::Unary { expr: e, .. } => matches!(**e, Expr::Const(_)),
        Expr::Binary { left, right, .. } => {
            matches!(**left, Expr::Const(_)) && matches!(**right, Expr::Const(_))
        }
        Expr::Call { args, .. } => args.iter().all(|a| matches!(a, Expr::Const(_))),
        _ => false,
    };
    if !closed {
        return expr;
    }
    match Evaluator::new(&NO_BINDINGS).eval(&expr) {
        Ok(v) => Expr::Const(v),
        Err(_) => expr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::pretty::render;

    fn simplified(src: &str) -> String {
        render(&simplify(&parse(src).unwrap()))
    }

    #[test]
    fn folds_constants() {
        assert_eq!(simplified("1 + 2 * 3"), "7");
        assert_eq!(simplified("-(2 + 3)"), "-5");
        assert_eq!(simplified("min(4, 2 + 1)"), "3");
        assert_eq!(simplified("(1 + 1)"), "2");
    }

    #[test]
    fn keeps_variables() {
        assert_eq!(simplified("p + 1 * 2"), "p + 2");
        assert_eq!(simplified("If(p > 0, 1 + 1, 0)"), "If(p > 0, 2, 0)");
    }

    #[test]
    fn short_circuit_folds() {
        assert_eq!(simplified("false && p > 0"), "false");
        assert_eq!(simplified("true && p > 0"), "p > 0");
        assert_eq!(simplified("true || p > 0"), "true");
        assert_eq!(simplified("false || p > 0"), "p > 0");
    }

    #[test]
    fn failing_subtrees_stay() {
        assert_eq!(simplified("1 / 0"), "1 / 0");
        assert_eq!(simplified("p + 1 / 0"), "p + 1 / 0");
    }

    #[test]
    fn effects_do_not_fold() {
        assert_eq!(simplified("Print(1 + 1)"), "Print(2)");
    }
}
