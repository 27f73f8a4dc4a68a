//! Workspace root package. It exists to carry the `rusty-hook` pre-commit
//! configuration; the code lives in `crates/`.
