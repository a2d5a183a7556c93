//! Formula construction: expression tree, function constructors, scenario
//! builders and conditional-format rules.

pub mod builders;
pub mod expr;
pub mod func;
pub mod status;

pub use expr::Expr;
