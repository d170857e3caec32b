pub mod eval;
pub mod parser;
pub mod pretty;
pub mod simplify;
pub mod tokenizer;

pub use eval::{
    Bindings, EmptyBindings, Evaluator, FunctionResolver, NO_BINDINGS, OutputSink, evaluate,
    is_intrinsic,
};
pub use parser::{BinaryOp, Expr, ParserError, UnaryOp, Update, parse, parse_updates};
pub use pretty::{render, render_updates};
pub use simplify::simplify;
pub use tokenizer::{Token, TokenKind, TokenizerError, tokenize};

// Re-export common types
pub use marcato_common::{EvalError, EvalErrorKind, Num, OmegaNum, Value};
