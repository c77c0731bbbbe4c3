pub mod ast;
pub mod parser;
pub mod predicates;
pub mod render;

pub use ast::*;
pub use parser::{parse_query, parse_select};
pub use predicates::{and_all, and_with, extract_equality, extract_string_equality, show_where};
