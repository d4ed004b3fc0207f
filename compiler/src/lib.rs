// bindc - binding expression compiler
//
// Library root. Parses layout binding expressions, builds the shared
// expression model and plans the dirty-flag reads generated code performs.

pub mod analyzer;
pub mod ast;
pub mod binder;
pub mod diag;
pub mod dot;
pub mod expr;
pub mod flags;
pub mod imports;
pub mod lexer;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod registry;
pub mod schedule;
