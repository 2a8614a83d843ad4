//! Sea-of-nodes intermediate representation.
//!
//! The representation is deliberately small: a program is a set of
//! function graphs and callable entities; a graph is a table of nodes
//! with an always-maintained out-edge index. Everything the optimization
//! passes consume lives behind the accessors of [`FunctionData`] and
//! [`Program`].

mod entities;
mod graph;
mod node;
mod program;
mod props;

pub use self::entities::{Ent, Func, Node};
pub use self::graph::{FunctionData, ScratchToken};
pub use self::node::{AllocKind, Callee, Mode, NodeData, NodePayload, Opcode, Pinned, ProjKind};
pub use self::program::{EntityData, ParamKind, Program, Signature};
pub use self::props::FuncProps;
