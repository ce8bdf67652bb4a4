//! The SQL DSL (§4.6): a small, render-only model of the Postgres
//! fragments the emitter needs. No dialect abstraction and no parsing —
//! values are built in Rust and rendered once via `sql()`.

pub mod expr;
pub mod format;
pub mod stmt;

pub use expr::Expr;
pub use format::{comment_block, dedent, indent, pretty, select_into};
pub use stmt::{CteDef, Join, JoinKind, SelectStmt, TableExpr, WithStmt};
