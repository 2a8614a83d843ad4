//! Entity references.
//!
//! These are the compact, densely numbered handles that everything else in
//! the crate uses to talk about IR objects. They are indices into the
//! `PrimaryMap`s of a [`Program`](crate::ir::Program) or a
//! [`FunctionData`](crate::ir::FunctionData) and carry no lifetime.

use cranelift_entity::entity_impl;

/// An opaque reference to a node in a function graph.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Node(u32);
entity_impl!(Node, "n");

/// An opaque reference to a function graph in a program.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Func(u32);
entity_impl!(Func, "fn");

/// An opaque reference to a callable entity.
///
/// Every direct call names an entity. An entity either wraps a function
/// graph defined in the same program, or declares an external procedure
/// whose property word is authoritative.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ent(u32);
entity_impl!(Ent, "ent");
