//! Node representation: opcodes, modes, payloads.

use crate::ir::entities::{Ent, Node};
use cranelift_entity::packed_option::PackedOption;
use smallvec::SmallVec;

/// The closed set of operations a node can perform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Start of a function graph; produces the initial memory state and the
    /// incoming arguments as projections.
    Start,
    /// A basic block; its inputs are the control-flow predecessors.
    Block,
    /// Unconditional jump terminating a block.
    Jmp,
    /// Conditional branch; produces control projections.
    Cond,
    /// Function return; first input is memory, the rest are results.
    Return,
    /// End node; its inputs keep otherwise unreachable nodes alive.
    End,
    /// Placeholder for dead or unreachable values.
    Bad,
    /// Projection out of a tuple-producing node.
    Proj,
    /// SSA merge of values flowing in from block predecessors.
    Phi,
    /// Merge of independent memory states.
    Sync,
    /// The empty memory state.
    NoMem,
    /// Function call; inputs are memory, callee pointer, arguments.
    Call,
    /// Memory read; inputs are memory and address.
    Load,
    /// Memory write; inputs are memory, address, value.
    Store,
    /// Memory allocation; inputs are memory and size.
    Alloc,
    /// Member or element address selection.
    Sel,
    /// Address of a named entity.
    SymConst,
    /// Constant value.
    Const,
    /// Value reinterpretation.
    Cast,
    /// Value-range assertion on a value; transparent to most analyses.
    Confirm,
    /// Comparison of two values.
    Cmp,
    /// Integer addition. Stands in for all plain data operations.
    Add,
}

impl Opcode {
    /// Is this node a block?
    pub fn is_block(self) -> bool {
        self == Opcode::Block
    }

    /// Does this node transparently forward a value (strippable by
    /// analyses that look through value views)?
    pub fn is_value_view(self) -> bool {
        matches!(self, Opcode::Cast | Opcode::Confirm)
    }
}

/// The mode of the value a node produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    /// A memory state.
    M,
    /// A control flow token.
    X,
    /// A tuple of values, accessed through `Proj` nodes.
    T,
    /// A basic block.
    BB,
    /// Mode of nodes that can stand in for anything (`Bad`).
    Any,
    /// An integer value.
    Int,
    /// A floating point value.
    Float,
}

impl Mode {
    /// Is this a register-carrying data mode?
    pub fn is_data(self) -> bool {
        matches!(self, Mode::Int | Mode::Float)
    }

    /// Is this the memory mode?
    pub fn is_mem(self) -> bool {
        self == Mode::M
    }
}

/// What a `Proj` node extracts from its predecessor's tuple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProjKind {
    /// The memory result.
    Mem,
    /// The `i`th data result.
    Res(u32),
    /// The `i`th incoming argument (projection out of `Start`).
    Arg(u32),
    /// Control flow for the regular path out of a call.
    XRegular,
    /// Control flow for the exceptional path out of a call.
    XExcept,
    /// The `i`th control output of a `Cond`.
    XTarget(u32),
}

/// Where an `Alloc` places its memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AllocKind {
    /// Heap allocation; lives past the function.
    Heap,
    /// Stack allocation; dies with the frame.
    Stack,
}

/// Pin state of a node.
///
/// Pinned nodes must stay in their block; floating nodes may be placed
/// anywhere their dependencies allow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Pinned {
    /// The node must execute in its block.
    Yes,
    /// The node may be scheduled freely.
    Floats,
}

/// One possible target of an indirect call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Callee {
    /// The callee is this entity.
    Known(Ent),
    /// The callee could be anything.
    Unknown,
}

/// Opcode-specific payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodePayload {
    /// No extra data.
    None,
    /// `Proj` selector.
    Proj(ProjKind),
    /// `Alloc` placement.
    Alloc(AllocKind),
    /// `Load` volatility.
    Load {
        /// Volatile loads observe externally visible state and must not be
        /// removed or reordered.
        volatile: bool,
    },
    /// Entity named by a `SymConst`.
    Entity(Ent),
    /// Value of a `Const`.
    Value(i64),
    /// Possible targets of a call, when callee analysis has run.
    /// `None` means no information is available.
    Callees(Option<Vec<Callee>>),
}

/// The data stored for every node of a function graph.
#[derive(Clone, Debug)]
pub struct NodeData {
    /// The node's operation.
    pub opcode: Opcode,
    /// The mode of the produced value.
    pub mode: Mode,
    /// Ordered value inputs. For blocks these are the control-flow
    /// predecessors; for `End` the keep-alive edges.
    pub(crate) inputs: SmallVec<[Node; 4]>,
    /// Explicit scheduling dependencies: every node listed here must
    /// execute before this one. Produced by serialization.
    pub(crate) deps: SmallVec<[Node; 2]>,
    /// The owning block. `None` for blocks themselves.
    pub(crate) block: PackedOption<Node>,
    /// Placement constraint.
    pub(crate) pinned: Pinned,
    /// ABI helper nodes are invisible to register pressure analysis.
    pub(crate) ignore: bool,
    /// Opcode-specific payload.
    pub(crate) payload: NodePayload,
}
