//! Rendering of expressions back to parseable text.
//!
//! Parenthesization is driven by operator precedence, so `render` output
//! re-parses to an equivalent tree (explicit `Brackets` nodes are kept).

use crate::parser::{Expr, UnaryOp, Update};
use std::fmt::Write;

/// Render an expression to canonical text.
pub fn render(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr, 0);
    out
}

/// Render an update list as `p := e; q := f;`.
pub fn render_updates(updates: &[Update]) -> String {
    let mut out = String::new();
    for u in updates {
        let _ = write!(out, "{} := {}; ", u.target, render(&u.expr));
    }
    out.trim_end().to_string()
}

fn write_expr(out: &mut String, expr: &Expr, parent_prec: u8) {
    match expr {
        Expr::Const(v) => {
            let _ = write!(out, "{v}");
        }
        Expr::Var(name) => out.push_str(name),
        Expr::Unary { op, expr } => {
            let sym = match op {
                UnaryOp::Plus => "+",
                UnaryOp::Neg => "-",
                UnaryOp::Not => "!",
            };
            out.push_str(sym);
            // Unary binds tighter than every binary op but ^.
            write_expr(out, expr, 6);
        }
        Expr::Binary { op, left, right } => {
            let prec = op.precedence();
            let needs_parens = prec < parent_prec;
            if needs_parens {
                out.push('(');
            }
            let (left_prec, right_prec) =
                if op.is_right_associative() { (prec + 1, prec) } else { (prec, prec + 1) };
            write_expr(out, left, left_prec);
            let _ = write!(out, " {} ", op.as_str());
            write_expr(out, right, right_prec);
            if needs_parens {
                out.push(')');
            }
        }
        Expr::Call { name, args } => {
            out.push_str(name);
            out.push('(');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(out, arg, 0);
            }
            out.push(')');
        }
        Expr::Brackets(inner) => {
            out.push('(');
            write_expr(out, inner, 0);
            out.push(')');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse, parse_updates};

    fn roundtrip(src: &str) -> String {
        render(&parse(src).unwrap())
    }

    #[test]
    fn renders_with_minimal_parens() {
        assert_eq!(roundtrip("1 + 2 * 3"), "1 + 2 * 3");
        assert_eq!(roundtrip("(1 + 2) * 3"), "(1 + 2) * 3");
        assert_eq!(roundtrip("If(p > 0, -p, 2)"), "If(p > 0, -p, 2)");
        assert_eq!(roundtrip("a - b - c"), "a - b - c");
    }

    #[test]
    fn rendered_text_reparses_to_same_value_shape() {
        for src in ["p1 >= 2 && p2 < 3", "2 ^ 3 ^ 2", "-(a + b)", "min(a, b, 3)"] {
            let once = parse(src).unwrap();
            let again = parse(&render(&once)).unwrap();
            assert_eq!(render(&again), render(&once), "source: {src}");
        }
    }

    #[test]
    fn renders_updates() {
        let ups = parse_updates("p1 := p1 + 1; p2 := 0;").unwrap();
        assert_eq!(render_updates(&ups), "p1 := p1 + 1; p2 := 0;");
    }
}
