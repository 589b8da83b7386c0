pub mod ast;
pub mod error;
pub mod eval;
pub mod fuzzy;
pub mod logic;
pub mod registry;
pub mod resolve;
pub mod signature;
pub mod syntax;
pub mod types;
pub mod typing;
