//! CLI subcommand implementations.

pub mod listen;
pub mod roster;
pub mod send;
