//! Read-only evaluation of expressions against a marking.
//!
//! The evaluator resolves variables through a [`Bindings`] trait, knows
//! a fixed, closed set of intrinsics, and defers any other call to an
//! optional user-supplied [`FunctionResolver`]. Printing is a capability:
//! without an injected [`OutputSink`] the `Print` intrinsics do not
//! exist.

use crate::parser::{BinaryOp, Expr, UnaryOp};
use crate::pretty::render;
use marcato_common::{EvalError, EvalErrorKind, Num, Value};
use num_traits::ToPrimitive;
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap};

/// Name-to-value resolution, read-only by construction.
pub trait Bindings {
    fn value_of(&self, name: &str) -> Option<Value>;
}

/// The canonical empty binding set.
pub struct EmptyBindings;

pub const NO_BINDINGS: EmptyBindings = EmptyBindings;

impl Bindings for EmptyBindings {
    fn value_of(&self, _name: &str) -> Option<Value> {
        None
    }
}

impl Bindings for HashMap<String, Value> {
    fn value_of(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl Bindings for BTreeMap<String, Value> {
    fn value_of(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

/// User-supplied `(name, args) -> value` lookup, consulted for calls
/// that are not intrinsics. Return `None` to decline the name.
pub trait FunctionResolver {
    fn call(&self, name: &str, args: &[Value]) -> Option<Result<Value, EvalError>>;
}

/// Where `Print`/`PrintValue` write. Injected, never global.
pub trait OutputSink {
    fn print(&self, text: &str);
}

static INTRINSICS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec!["If", "min", "max", "floor", "round", "abs", "Int", "Real", "Print", "PrintValue"]
});

pub fn is_intrinsic(name: &str) -> bool {
    INTRINSICS.iter().any(|&intrinsic| intrinsic == name)
}

/// Divisors closer to zero than this fail with `DivisionByZero`.
static DIV_TOLERANCE: Lazy<Num> = Lazy::new(|| Num::ratio(1, 1_000_000));

pub struct Evaluator<'a> {
    bindings: &'a dyn Bindings,
    functions: Option<&'a dyn FunctionResolver>,
    output: Option<&'a dyn OutputSink>,
}

/// Evaluate `expr` against `bindings` with no resolver and no sink.
pub fn evaluate(expr: &Expr, bindings: &dyn Bindings) -> Result<Value, EvalError> {
    Evaluator::new(bindings).eval(expr)
}

impl<'a> Evaluator<'a> {
    pub fn new(bindings: &'a dyn Bindings) -> Self {
        Self { bindings, functions: None, output: None }
    }

    pub fn with_functions(mut self, functions: &'a dyn FunctionResolver) -> Self {
        self.functions = Some(functions);
        self
    }

    pub fn with_output(mut self, output: &'a dyn OutputSink) -> Self {
        self.output = Some(output);
        self
    }

    pub fn eval(&self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Const(v) => Ok(v.clone()),
            Expr::Var(name) => self.bindings.value_of(name).ok_or_else(|| {
                EvalError::new(EvalErrorKind::UndefinedSymbol).with_message(name.clone())
            }),
            Expr::Unary { op, expr } => self.eval_unary(*op, expr),
            Expr::Binary { op, left, right } => self.eval_binary(*op, left, right),
            Expr::Call { name, args } => self.eval_call(name, args),
            Expr::Brackets(inner) => self.eval(inner),
        }
    }

    pub fn eval_bool(&self, expr: &Expr) -> Result<bool, EvalError> {
        self.eval(expr)?.as_bool()
    }

    pub fn eval_num(&self, expr: &Expr) -> Result<Num, EvalError> {
        self.eval(expr)?.as_num()
    }

    /* ===================  unary ops  =================== */

    fn eval_unary(&self, op: UnaryOp, expr: &Expr) -> Result<Value, EvalError> {
        let v = self.eval(expr)?;
        match op {
            UnaryOp::Plus => {
                v.as_num()?;
                Ok(v)
            }
            UnaryOp::Neg => match v {
                Value::Int(i) => match i.checked_neg() {
                    Some(n) => Ok(Value::Int(n)),
                    None => Ok(Value::Real(-Num::from_i64(i))),
                },
                Value::Real(n) => Ok(Value::Real(-n)),
                Value::Bool(_) => Err(EvalError::new(EvalErrorKind::TypeMismatch)
                    .with_message("cannot negate a boolean")),
            },
            UnaryOp::Not => Ok(Value::Bool(!v.as_bool()?)),
        }
    }

    /* ===================  binary ops  =================== */

    fn eval_binary(&self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<Value, EvalError> {
        // Logical operators short-circuit.
        match op {
            BinaryOp::And => {
                return Ok(Value::Bool(self.eval_bool(left)? && self.eval_bool(right)?));
            }
            BinaryOp::Or => {
                return Ok(Value::Bool(self.eval_bool(left)? || self.eval_bool(right)?));
            }
            _ => {}
        }

        let l = self.eval(left)?;
        let r = self.eval(right)?;

        match op {
            BinaryOp::Add => self.numeric(l, r, |a, b| a.checked_add(b), |a, b| a + b),
            BinaryOp::Sub => self.numeric(l, r, |a, b| a.checked_sub(b), |a, b| a - b),
            BinaryOp::Mul => self.numeric(l, r, |a, b| a.checked_mul(b), |a, b| a * b),
            BinaryOp::Div => self.divide(l, r),
            BinaryOp::Mod => self.remainder(l, r),
            BinaryOp::Pow => self.power(l, r),
            BinaryOp::Eq => Ok(Value::Bool(self.values_equal(&l, &r)?)),
            BinaryOp::Ne => Ok(Value::Bool(!self.values_equal(&l, &r)?)),
            BinaryOp::Lt => Ok(Value::Bool(l.as_num()? < r.as_num()?)),
            BinaryOp::Le => Ok(Value::Bool(l.as_num()? <= r.as_num()?)),
            BinaryOp::Gt => Ok(Value::Bool(l.as_num()? > r.as_num()?)),
            BinaryOp::Ge => Ok(Value::Bool(l.as_num()? >= r.as_num()?)),
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    /// Int stays Int while it fits; anything else goes through `Num`.
    fn numeric(
        &self,
        l: Value,
        r: Value,
        int_op: impl Fn(i64, i64) -> Option<i64>,
        num_op: impl Fn(&Num, &Num) -> Num,
    ) -> Result<Value, EvalError> {
        if let (Value::Int(a), Value::Int(b)) = (&l, &r) {
            if let Some(out) = int_op(*a, *b) {
                return Ok(Value::Int(out));
            }
        }
        Ok(Value::Real(num_op(&l.as_num()?, &r.as_num()?)).normalized())
    }

    fn divide(&self, l: Value, r: Value) -> Result<Value, EvalError> {
        let divisor = r.as_num()?;
        if divisor.abs() < *DIV_TOLERANCE {
            return Err(EvalError::new(EvalErrorKind::DivisionByZero));
        }
        let quotient = &l.as_num()? / &divisor;
        Ok(Value::Real(quotient).normalized())
    }

    /// `%` splits by type: truncated `i64 %` for integers, IEEE
    /// remainder for reals.
    fn remainder(&self, l: Value, r: Value) -> Result<Value, EvalError> {
        match (&l, &r) {
            (Value::Int(a), Value::Int(b)) => {
                if *b == 0 {
                    Err(EvalError::new(EvalErrorKind::DivisionByZero))
                } else {
                    Ok(Value::Int(a % b))
                }
            }
            _ => {
                let x = l.as_num()?;
                let y = r.as_num()?;
                if y.abs() < *DIV_TOLERANCE {
                    return Err(EvalError::new(EvalErrorKind::DivisionByZero));
                }
                let n = Num::from((&x / &y).round_half_even());
                Ok(Value::Real(&x - &(&y * &n)).normalized())
            }
        }
    }

    fn power(&self, l: Value, r: Value) -> Result<Value, EvalError> {
        let base = l.as_num()?;
        let exp = r.as_num()?;
        if exp.is_integer() {
            let e = exp.as_ratio().numer().to_i32().ok_or_else(|| {
                EvalError::new(EvalErrorKind::TypeMismatch).with_message("exponent out of range")
            })?;
            if e < 0 && base.is_zero() {
                return Err(EvalError::new(EvalErrorKind::DivisionByZero));
            }
            if e == 0 {
                return Ok(Value::Int(1));
            }
            return Ok(Value::Real(base.pow(e)).normalized());
        }
        // Fractional exponent: drop to f64.
        let out = base.to_f64().powf(exp.to_f64());
        if !out.is_finite() {
            return Err(non_real());
        }
        let n = Num::from_f64(out).ok_or_else(non_real)?;
        Ok(Value::Real(n).normalized())
    }

    fn values_equal(&self, l: &Value, r: &Value) -> Result<bool, EvalError> {
        match (l, r) {
            (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
            (Value::Bool(_), _) | (_, Value::Bool(_)) => {
                Err(EvalError::new(EvalErrorKind::TypeMismatch)
                    .with_message("cannot compare a boolean with a number"))
            }
            _ => Ok(l.as_num()? == r.as_num()?),
        }
    }

    /* ===================  calls  =================== */

    fn eval_call(&self, name: &str, args: &[Expr]) -> Result<Value, EvalError> {
        match name {
            "If" => {
                let [cond, then, alt] = args else {
                    return Err(arity("If", 3, args.len()));
                };
                if self.eval_bool(cond)? { self.eval(then) } else { self.eval(alt) }
            }
            "min" | "max" => {
                if args.is_empty() {
                    return Err(arity(name, 1, 0));
                }
                let mut best = self.eval(&args[0])?;
                let mut best_key = best.as_num()?;
                for arg in &args[1..] {
                    let v = self.eval(arg)?;
                    let key = v.as_num()?;
                    let better = if name == "min" { key < best_key } else { key > best_key };
                    if better {
                        best = v;
                        best_key = key;
                    }
                }
                Ok(best)
            }
            "floor" => {
                let v = self.single(name, args)?.as_num()?;
                int_value(v.floor())
            }
            "round" => {
                let v = self.single(name, args)?.as_num()?;
                int_value(v.round())
            }
            "abs" => match self.single(name, args)? {
                Value::Int(i) => match i.checked_abs() {
                    Some(a) => Ok(Value::Int(a)),
                    None => Ok(Value::Real(Num::from_i64(i).abs())),
                },
                Value::Real(n) => Ok(Value::Real(n.abs())),
                Value::Bool(_) => Err(EvalError::new(EvalErrorKind::TypeMismatch)
                    .with_message("abs expects a number")),
            },
            "Int" => {
                let v = self.single(name, args)?.as_num()?;
                int_value(v.trunc())
            }
            "Real" => Ok(Value::Real(self.single(name, args)?.as_num()?)),
            "Print" | "PrintValue" => {
                let Some(sink) = self.output else {
                    return Err(EvalError::new(EvalErrorKind::UndefinedSymbol)
                        .with_message(format!("{name} (no output sink configured)")));
                };
                let [arg] = args else { return Err(arity(name, 1, args.len())) };
                let v = self.eval(arg)?;
                if name == "Print" {
                    sink.print(&render(arg));
                } else {
                    sink.print(&v.to_string());
                }
                Ok(v)
            }
            _ => {
                if let Some(resolver) = self.functions {
                    let mut values = Vec::with_capacity(args.len());
                    for arg in args {
                        values.push(self.eval(arg)?);
                    }
                    if let Some(result) = resolver.call(name, &values) {
                        return result;
                    }
                }
                Err(EvalError::new(EvalErrorKind::UndefinedSymbol).with_message(name.to_string()))
            }
        }
    }

    fn single(&self, name: &str, args: &[Expr]) -> Result<Value, EvalError> {
        let [arg] = args else { return Err(arity(name, 1, args.len())) };
        self.eval(arg)
    }
}

fn arity(name: &str, wanted: usize, got: usize) -> EvalError {
    EvalError::new(EvalErrorKind::TypeMismatch)
        .with_message(format!("{name} expects {wanted} argument(s), got {got}"))
}

fn non_real() -> EvalError {
    EvalError::new(EvalErrorKind::TypeMismatch).with_message("power has no real value")
}

fn int_value(i: num_bigint::BigInt) -> Result<Value, EvalError> {
    i.to_i64().map(Value::Int).ok_or_else(|| {
        EvalError::new(EvalErrorKind::TypeMismatch).with_message("result out of integer range")
    })
}
