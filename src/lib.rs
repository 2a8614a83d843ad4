//! Optimization passes over a sea-of-nodes intermediate representation.
//!
//! This crate provides two whole-graph analyses and their accompanying
//! transformations:
//!
//! - [`optimize_func_calls`] infers, for every procedure of a
//!   [`Program`](ir::Program), whether it is const, pure, nothrow and/or
//!   malloc, and then rewrites the call sites those properties allow:
//!   memory edges of const and pure calls are bypassed so the calls can
//!   take part in code motion, and exception edges of nothrow calls are
//!   removed.
//! - [`schedule_preparation`] bounds the register pressure of every
//!   basic block before list scheduling: it computes the block's
//!   register saturation and, while that exceeds the register budget,
//!   inserts explicit dependency edges that serialize value lifetimes.
//!
//! Both passes are total over well-formed IR: they never fail, they
//! degrade to "no property / no change" when uncertain. Structural
//! violations are programmer errors and abort. Debug logging through the
//! `log` crate is the only other output channel.

#![deny(missing_docs)]

mod call_props;
mod call_rewrite;
mod fx;
pub mod height;
pub mod ir;
pub mod isa;
pub mod loops;
pub mod matching;
pub mod satur;

pub use crate::call_rewrite::optimize_func_calls;
pub use crate::satur::{register_saturation, schedule_preparation};
