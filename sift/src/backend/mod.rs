//! Reference backends.
//!
//! Every backend implements [`QueryBuilder`](crate::compiler::QueryBuilder);
//! the compiler hands it resolved comparisons and collection scopes.

pub mod memory;
