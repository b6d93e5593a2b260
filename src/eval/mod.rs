//! Expression evaluation and template rendering over dynamically typed [`value::Value`]s.

pub mod builtin;
pub mod expression;
pub mod template;
pub mod value;

pub use expression::{evaluate, Bindings};
pub use template::{render, Template};
pub use value::Value;
