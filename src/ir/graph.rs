//! Function graphs.
//!
//! A [`FunctionData`] owns the sea-of-nodes graph of one procedure: the
//! node table, the always-maintained out-edge index, the distinguished
//! nodes every graph has (entry block, start, initial memory, no-mem, end
//! block, end), the inferred property word, and the per-graph analysis
//! services (visited generations and the scoped scratch reservation).
//!
//! Nodes are created through the builder methods and are never deleted;
//! dead nodes are simply disconnected by [`FunctionData::exchange`].

use crate::ir::entities::{Ent, Node};
use crate::ir::node::{AllocKind, Callee, Mode, NodeData, NodePayload, Opcode, Pinned, ProjKind};
use crate::ir::props::FuncProps;
use cranelift_entity::{PrimaryMap, SecondaryMap};
use core::cell::Cell;
use smallvec::SmallVec;
use std::rc::Rc;

/// Scoped reservation of the per-node scratch side table.
///
/// At most one analysis pass at a time may attach scratch data to the
/// nodes of a graph. The pass obtains a token before building its side
/// table; a second reservation while the token is alive is a programmer
/// error and panics. The reservation is released when the token is
/// dropped, on every exit path.
pub struct ScratchToken {
    flag: Rc<Cell<bool>>,
}

impl Drop for ScratchToken {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

/// The graph of a single procedure.
pub struct FunctionData {
    /// Name, for logging only.
    pub name: String,
    nodes: PrimaryMap<Node, NodeData>,
    /// Users of each node, via inputs or explicit dependencies. May
    /// contain a user more than once if it uses the node more than once.
    outs: SecondaryMap<Node, Vec<Node>>,
    entry: Node,
    start: Node,
    initial_mem: Node,
    no_mem: Node,
    bad_ctrl: Node,
    end_block: Node,
    end: Node,
    /// Properties inferred for this procedure.
    pub props: FuncProps,
    dominance_valid: bool,
    loop_info_valid: bool,
    visit_epoch: u32,
    visit_stamp: SecondaryMap<Node, u32>,
    scratch_busy: Rc<Cell<bool>>,
}

impl FunctionData {
    /// Create the skeleton graph every procedure starts from.
    pub fn new(name: &str) -> Self {
        let mut f = Self {
            name: name.to_string(),
            nodes: PrimaryMap::new(),
            outs: SecondaryMap::new(),
            entry: Node::from_u32(0),
            start: Node::from_u32(0),
            initial_mem: Node::from_u32(0),
            no_mem: Node::from_u32(0),
            bad_ctrl: Node::from_u32(0),
            end_block: Node::from_u32(0),
            end: Node::from_u32(0),
            props: FuncProps::NONE,
            dominance_valid: true,
            loop_info_valid: true,
            visit_epoch: 0,
            visit_stamp: SecondaryMap::new(),
            scratch_busy: Rc::new(Cell::new(false)),
        };
        f.entry = f.make(Opcode::Block, Mode::BB, None, &[], NodePayload::None);
        f.start = f.make(Opcode::Start, Mode::T, Some(f.entry), &[], NodePayload::None);
        f.initial_mem = f.proj(f.start, Mode::M, ProjKind::Mem);
        f.no_mem = f.make(Opcode::NoMem, Mode::M, Some(f.entry), &[], NodePayload::None);
        f.bad_ctrl = f.make(Opcode::Bad, Mode::X, Some(f.entry), &[], NodePayload::None);
        f.end_block = f.make(Opcode::Block, Mode::BB, None, &[], NodePayload::None);
        f.end = f.make(Opcode::End, Mode::X, Some(f.end_block), &[], NodePayload::None);
        f
    }

    fn make(
        &mut self,
        opcode: Opcode,
        mode: Mode,
        block: Option<Node>,
        inputs: &[Node],
        payload: NodePayload,
    ) -> Node {
        let n = self.nodes.push(NodeData {
            opcode,
            mode,
            inputs: SmallVec::from_slice(inputs),
            deps: SmallVec::new(),
            block: block.into(),
            pinned: Pinned::Yes,
            ignore: false,
            payload,
        });
        for &input in inputs {
            self.outs[input].push(n);
        }
        n
    }

    /// The entry block.
    pub fn entry(&self) -> Node {
        self.entry
    }

    /// The start node.
    pub fn start(&self) -> Node {
        self.start
    }

    /// The initial memory state of the procedure.
    pub fn initial_mem(&self) -> Node {
        self.initial_mem
    }

    /// The empty memory state.
    pub fn no_mem(&self) -> Node {
        self.no_mem
    }

    /// The shared dead control token.
    pub fn bad_ctrl(&self) -> Node {
        self.bad_ctrl
    }

    /// The end block. Its control-flow predecessors are the Returns (and
    /// possibly Bads or uncaught exceptional exits) of the procedure.
    pub fn end_block(&self) -> Node {
        self.end_block
    }

    /// The end node, holder of the keep-alive edges.
    pub fn end(&self) -> Node {
        self.end
    }

    // ------------------------------------------------------------------
    // Builders.

    /// Create a new block with the given control-flow predecessors.
    pub fn make_block(&mut self, preds: &[Node]) -> Node {
        self.make(Opcode::Block, Mode::BB, None, preds, NodePayload::None)
    }

    /// Add a control-flow predecessor to a block. Needed to close loops.
    pub fn add_block_pred(&mut self, block: Node, pred: Node) {
        debug_assert!(self.nodes[block].opcode.is_block());
        self.nodes[block].inputs.push(pred);
        self.outs[pred].push(block);
    }

    /// Create a projection out of `pred`'s tuple.
    pub fn proj(&mut self, pred: Node, mode: Mode, kind: ProjKind) -> Node {
        let block = self.nodes[pred].block;
        self.make(Opcode::Proj, mode, block.expand(), &[pred], NodePayload::Proj(kind))
    }

    /// Create the projection of the `i`th incoming argument.
    pub fn arg(&mut self, i: u32, mode: Mode) -> Node {
        let start = self.start;
        self.proj(start, mode, ProjKind::Arg(i))
    }

    /// Create an unconditional jump terminating `block`.
    pub fn jmp(&mut self, block: Node) -> Node {
        self.make(Opcode::Jmp, Mode::X, Some(block), &[], NodePayload::None)
    }

    /// Create a conditional branch on `selector` terminating `block`.
    /// Control leaves through `XTarget` projections.
    pub fn cond(&mut self, block: Node, selector: Node) -> Node {
        self.make(Opcode::Cond, Mode::T, Some(block), &[selector], NodePayload::None)
    }

    /// Create a return and register it as a predecessor of the end block.
    pub fn ret(&mut self, block: Node, mem: Node, results: &[Node]) -> Node {
        let mut inputs = vec![mem];
        inputs.extend_from_slice(results);
        let r = self.make(Opcode::Return, Mode::X, Some(block), &inputs, NodePayload::None);
        let end_block = self.end_block;
        self.add_block_pred(end_block, r);
        r
    }

    /// Create a phi merging `inputs` in `block`.
    pub fn phi(&mut self, block: Node, mode: Mode, inputs: &[Node]) -> Node {
        self.make(Opcode::Phi, mode, Some(block), inputs, NodePayload::None)
    }

    /// Create a memory sync merging independent memory states.
    pub fn sync(&mut self, block: Node, inputs: &[Node]) -> Node {
        self.make(Opcode::Sync, Mode::M, Some(block), inputs, NodePayload::None)
    }

    /// Create a constant.
    pub fn iconst(&mut self, value: i64) -> Node {
        let entry = self.entry;
        self.make(Opcode::Const, Mode::Int, Some(entry), &[], NodePayload::Value(value))
    }

    /// Create the address of an entity.
    pub fn sym_const(&mut self, ent: Ent) -> Node {
        let entry = self.entry;
        self.make(Opcode::SymConst, Mode::Int, Some(entry), &[], NodePayload::Entity(ent))
    }

    /// Create a load. The memory result and the loaded value are reached
    /// through projections.
    pub fn load(&mut self, block: Node, mem: Node, addr: Node, volatile: bool) -> Node {
        self.make(
            Opcode::Load,
            Mode::T,
            Some(block),
            &[mem, addr],
            NodePayload::Load { volatile },
        )
    }

    /// Create a store of `value` to `addr`.
    pub fn store(&mut self, block: Node, mem: Node, addr: Node, value: Node) -> Node {
        self.make(Opcode::Store, Mode::T, Some(block), &[mem, addr, value], NodePayload::None)
    }

    /// Create an allocation of `size` bytes.
    pub fn alloc(&mut self, block: Node, mem: Node, size: Node, kind: AllocKind) -> Node {
        self.make(Opcode::Alloc, Mode::T, Some(block), &[mem, size], NodePayload::Alloc(kind))
    }

    /// Create a member selection based at `base`.
    pub fn sel(&mut self, block: Node, base: Node, index: Node) -> Node {
        self.make(Opcode::Sel, Mode::Int, Some(block), &[base, index], NodePayload::None)
    }

    /// Create a cast of `value`.
    pub fn cast(&mut self, value: Node, mode: Mode) -> Node {
        let block = self.nodes[value].block;
        self.make(Opcode::Cast, mode, block.expand(), &[value], NodePayload::None)
    }

    /// Create a confirmation view of `value`.
    pub fn confirm(&mut self, value: Node) -> Node {
        let block = self.nodes[value].block;
        let mode = self.nodes[value].mode;
        self.make(Opcode::Confirm, mode, block.expand(), &[value], NodePayload::None)
    }

    /// Create a comparison of `a` and `b`.
    pub fn cmp(&mut self, block: Node, a: Node, b: Node) -> Node {
        self.make(Opcode::Cmp, Mode::Int, Some(block), &[a, b], NodePayload::None)
    }

    /// Create an addition.
    pub fn add(&mut self, block: Node, a: Node, b: Node) -> Node {
        debug_assert_eq!(self.nodes[a].mode, self.nodes[b].mode);
        let mode = self.nodes[a].mode;
        self.make(Opcode::Add, mode, Some(block), &[a, b], NodePayload::None)
    }

    /// Create a call of `ptr` with `args`. Memory, results and control
    /// exits are reached through projections.
    pub fn call(&mut self, block: Node, mem: Node, ptr: Node, args: &[Node]) -> Node {
        let mut inputs = vec![mem, ptr];
        inputs.extend_from_slice(args);
        self.make(Opcode::Call, Mode::T, Some(block), &inputs, NodePayload::Callees(None))
    }

    /// Keep `n` alive by attaching it to the end node.
    pub fn add_keepalive(&mut self, n: Node) {
        let end = self.end;
        self.nodes[end].inputs.push(n);
        self.outs[n].push(end);
    }

    // ------------------------------------------------------------------
    // Accessors.

    /// All nodes of the graph, in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = Node> {
        self.nodes.keys()
    }

    /// Number of nodes ever created in this graph.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// The opcode of `n`.
    pub fn opcode(&self, n: Node) -> Opcode {
        self.nodes[n].opcode
    }

    /// The mode of `n`.
    pub fn mode(&self, n: Node) -> Mode {
        self.nodes[n].mode
    }

    /// The block `n` belongs to; `None` if `n` is itself a block.
    pub fn block_of(&self, n: Node) -> Option<Node> {
        self.nodes[n].block.expand()
    }

    /// The ordered inputs of `n`.
    pub fn inputs(&self, n: Node) -> &[Node] {
        &self.nodes[n].inputs
    }

    /// The explicit scheduling dependencies of `n`.
    pub fn deps(&self, n: Node) -> &[Node] {
        &self.nodes[n].deps
    }

    /// The users of `n`.
    pub fn outs(&self, n: Node) -> &[Node] {
        &self.outs[n]
    }

    /// The control-flow predecessors of a block.
    pub fn cfg_preds(&self, block: Node) -> &[Node] {
        debug_assert!(self.nodes[block].opcode.is_block());
        &self.nodes[block].inputs
    }

    /// The keep-alive edges of the graph.
    pub fn keepalives(&self) -> &[Node] {
        &self.nodes[self.end].inputs
    }

    /// The pin state of `n`.
    pub fn pinned(&self, n: Node) -> Pinned {
        self.nodes[n].pinned
    }

    /// Change the pin state of `n`.
    pub fn set_pinned(&mut self, n: Node, pinned: Pinned) {
        self.nodes[n].pinned = pinned;
    }

    /// Is `n` an ABI helper invisible to register pressure analysis?
    pub fn is_ignore(&self, n: Node) -> bool {
        self.nodes[n].ignore
    }

    /// Mark `n` as an ABI helper.
    pub fn set_ignore(&mut self, n: Node, ignore: bool) {
        self.nodes[n].ignore = ignore;
    }

    /// The tuple a projection projects out of.
    pub fn proj_pred(&self, proj: Node) -> Node {
        debug_assert_eq!(self.nodes[proj].opcode, Opcode::Proj);
        self.nodes[proj].inputs[0]
    }

    /// What a projection extracts.
    pub fn proj_kind(&self, proj: Node) -> ProjKind {
        match self.nodes[proj].payload {
            NodePayload::Proj(kind) => kind,
            _ => panic!("{} is not a Proj", proj),
        }
    }

    /// Is this load volatile?
    pub fn load_volatile(&self, load: Node) -> bool {
        match self.nodes[load].payload {
            NodePayload::Load { volatile } => volatile,
            _ => panic!("{} is not a Load", load),
        }
    }

    /// The memory input of a load.
    pub fn load_mem(&self, load: Node) -> Node {
        debug_assert_eq!(self.nodes[load].opcode, Opcode::Load);
        self.nodes[load].inputs[0]
    }

    /// The value stored by a store.
    pub fn store_value(&self, store: Node) -> Node {
        debug_assert_eq!(self.nodes[store].opcode, Opcode::Store);
        self.nodes[store].inputs[2]
    }

    /// Where an allocation places its memory.
    pub fn alloc_kind(&self, alloc: Node) -> AllocKind {
        match self.nodes[alloc].payload {
            NodePayload::Alloc(kind) => kind,
            _ => panic!("{} is not an Alloc", alloc),
        }
    }

    /// The entity a SymConst names.
    pub fn entity_of(&self, sym: Node) -> Ent {
        match self.nodes[sym].payload {
            NodePayload::Entity(ent) => ent,
            _ => panic!("{} is not a SymConst", sym),
        }
    }

    /// The memory input of a call.
    pub fn call_mem(&self, call: Node) -> Node {
        debug_assert_eq!(self.nodes[call].opcode, Opcode::Call);
        self.nodes[call].inputs[0]
    }

    /// Retarget the memory input of a call.
    pub fn set_call_mem(&mut self, call: Node, mem: Node) {
        debug_assert_eq!(self.nodes[call].opcode, Opcode::Call);
        self.set_input(call, 0, mem);
    }

    /// The callee pointer of a call.
    pub fn call_ptr(&self, call: Node) -> Node {
        debug_assert_eq!(self.nodes[call].opcode, Opcode::Call);
        self.nodes[call].inputs[1]
    }

    /// The argument inputs of a call.
    pub fn call_args(&self, call: Node) -> &[Node] {
        debug_assert_eq!(self.nodes[call].opcode, Opcode::Call);
        &self.nodes[call].inputs[2..]
    }

    /// The possible callees of a call, if callee analysis has run.
    pub fn call_callees(&self, call: Node) -> Option<&[Callee]> {
        match &self.nodes[call].payload {
            NodePayload::Callees(callees) => callees.as_deref(),
            _ => panic!("{} is not a Call", call),
        }
    }

    /// Record the possible callees of a call.
    pub fn set_call_callees(&mut self, call: Node, callees: Vec<Callee>) {
        match &mut self.nodes[call].payload {
            NodePayload::Callees(slot) => *slot = Some(callees),
            _ => panic!("{} is not a Call", call),
        }
    }

    /// The memory input of a return.
    pub fn return_mem(&self, ret: Node) -> Node {
        debug_assert_eq!(self.nodes[ret].opcode, Opcode::Return);
        self.nodes[ret].inputs[0]
    }

    /// The result values of a return.
    pub fn return_results(&self, ret: Node) -> &[Node] {
        debug_assert_eq!(self.nodes[ret].opcode, Opcode::Return);
        &self.nodes[ret].inputs[1..]
    }

    /// All blocks of the graph.
    pub fn blocks(&self) -> impl Iterator<Item = Node> + '_ {
        self.nodes
            .iter()
            .filter(|(_, data)| data.opcode.is_block())
            .map(|(n, _)| n)
    }

    /// All nodes belonging to `block`.
    pub fn nodes_in(&self, block: Node) -> impl Iterator<Item = Node> + '_ {
        self.nodes
            .iter()
            .filter(move |(_, data)| data.block.expand() == Some(block))
            .map(|(n, _)| n)
    }

    // ------------------------------------------------------------------
    // Mutators.

    /// Replace the `idx`th input of `n`, keeping the out-edge index in
    /// sync.
    pub fn set_input(&mut self, n: Node, idx: usize, new: Node) {
        let old = self.nodes[n].inputs[idx];
        if old == new {
            return;
        }
        self.nodes[n].inputs[idx] = new;
        self.remove_out(old, n);
        self.outs[new].push(n);
    }

    /// Replace every use of `old` by `new`. `old` keeps its inputs but no
    /// longer has users afterwards.
    pub fn exchange(&mut self, old: Node, new: Node) {
        debug_assert_ne!(old, new, "exchanging a node with itself");
        let users = core::mem::take(&mut self.outs[old]);
        for &user in &users {
            let data = &mut self.nodes[user];
            for input in data.inputs.iter_mut() {
                if *input == old {
                    *input = new;
                }
            }
            for dep in data.deps.iter_mut() {
                if *dep == old {
                    *dep = new;
                }
            }
            self.outs[new].push(user);
        }
    }

    /// Make `n` depend on `dep`: `dep` must execute before `n`.
    pub fn add_dep(&mut self, n: Node, dep: Node) {
        debug_assert_ne!(n, dep);
        self.nodes[n].deps.push(dep);
        self.outs[dep].push(n);
    }

    fn remove_out(&mut self, tgt: Node, user: Node) {
        let users = &mut self.outs[tgt];
        if let Some(pos) = users.iter().position(|&u| u == user) {
            users.swap_remove(pos);
        }
    }

    // ------------------------------------------------------------------
    // Analysis bookkeeping.

    /// Is the cached dominance information still valid?
    pub fn dominance_valid(&self) -> bool {
        self.dominance_valid
    }

    /// Is the cached loop information still valid?
    pub fn loop_info_valid(&self) -> bool {
        self.loop_info_valid
    }

    /// Invalidate cached dominance and loop information after a
    /// control-flow rewrite.
    pub fn invalidate_cfg_info(&mut self) {
        self.dominance_valid = false;
        self.loop_info_valid = false;
    }

    /// Begin a fresh visited generation.
    pub fn start_visit(&mut self) {
        self.visit_epoch += 1;
    }

    /// Stamp `n` as visited in the current generation.
    pub fn mark_visited(&mut self, n: Node) {
        self.visit_stamp[n] = self.visit_epoch;
    }

    /// Was `n` visited in the current generation?
    pub fn is_visited(&self, n: Node) -> bool {
        self.visit_stamp.get(n).copied().unwrap_or(0) == self.visit_epoch
    }

    /// Reserve the per-node scratch side table for one pass.
    ///
    /// Panics if another pass holds the reservation.
    pub fn reserve_scratch(&self) -> ScratchToken {
        assert!(
            !self.scratch_busy.get(),
            "nested scratch reservation on graph `{}`",
            self.name
        );
        self.scratch_busy.set(true);
        ScratchToken {
            flag: Rc::clone(&self.scratch_busy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_edges_track_mutation() {
        let mut f = FunctionData::new("f");
        let entry = f.entry();
        let mem = f.initial_mem();
        let addr = f.iconst(16);
        let load = f.load(entry, mem, addr, false);
        let load_m = f.proj(load, Mode::M, ProjKind::Mem);
        let ret = f.ret(entry, load_m, &[]);

        assert!(f.outs(mem).contains(&load));
        assert!(f.outs(load_m).contains(&ret));

        // Bypass the load on the return path.
        f.set_input(ret, 0, mem);
        assert!(!f.outs(load_m).contains(&ret));
        assert!(f.outs(mem).contains(&ret));
    }

    #[test]
    fn exchange_rewrites_all_users() {
        let mut f = FunctionData::new("f");
        let entry = f.entry();
        let mem = f.initial_mem();
        let a = f.iconst(1);
        let b = f.iconst(2);
        let s1 = f.add(entry, a, a);
        let r = f.ret(entry, mem, &[s1]);

        f.exchange(a, b);
        assert_eq!(f.inputs(s1), &[b, b]);
        assert!(f.outs(a).is_empty());
        assert_eq!(f.return_results(r), &[s1]);
    }

    #[test]
    fn visited_generations_do_not_leak() {
        let mut f = FunctionData::new("f");
        let n = f.iconst(7);
        f.start_visit();
        assert!(!f.is_visited(n));
        f.mark_visited(n);
        assert!(f.is_visited(n));
        f.start_visit();
        assert!(!f.is_visited(n));
    }

    #[test]
    fn scratch_reservation_is_scoped() {
        let f = FunctionData::new("f");
        {
            let _token = f.reserve_scratch();
        }
        // Released on drop; a second reservation succeeds.
        let _token = f.reserve_scratch();
    }

    #[test]
    #[should_panic(expected = "nested scratch reservation")]
    fn nested_scratch_reservation_panics() {
        let f = FunctionData::new("f");
        let _outer = f.reserve_scratch();
        let _inner = f.reserve_scratch();
    }
}
