//! Lazy evaluation engine: computers and the tree-to-computer compiler.

pub mod compile;
pub mod computer;

pub use compile::{compile_expr, floor_div, floor_mod, EvalContext};
pub use computer::{
    with_location, BooleanComputer, Computer, FloatComputer, IntegerComputer, StringComputer,
    Thunk,
};
