//! Procedure property inference.
//!
//! Classifies every procedure of a program as const, pure, nothrow and/or
//! malloc. The solver runs in two passes over all graphs:
//!
//! - **Pass A** establishes nothrow and malloc by looking at the
//!   predecessors of each end block: returned values must come from fresh
//!   heap allocations (or calls that themselves are malloc), and no
//!   exceptional exit may reach the end block unless it comes from a call
//!   whose callees are all nothrow. A malloc candidate is dropped again
//!   if a returned value can escape into memory.
//! - **Pass B** establishes const and pure by walking each return's
//!   memory input backwards through the memory chain. Loads weaken const
//!   to pure, volatile loads and anything unrecognized drop to bottom,
//!   and direct calls recurse into their callee.
//!
//! Recursion over the call graph is guarded by a busy set: a procedure
//! that is asked about itself while its own analysis is in flight answers
//! optimistically-tentatively in pass A and bottom in pass B (a call
//! chain that only leads back into itself never terminates). Tentative
//! results are committed only at the top level.

use crate::ir::{
    AllocKind, Callee, Ent, Func, FuncProps, FunctionData, Node, Opcode, Program,
};
use crate::loops::has_cfg_loop;
use cranelift_entity::EntitySet;

/// The solver state shared by both passes: which procedures have final
/// results and which are currently being analyzed.
pub(crate) struct PropSolver {
    ready: EntitySet<Func>,
    busy: EntitySet<Func>,
}

impl PropSolver {
    pub fn new() -> Self {
        Self {
            ready: EntitySet::new(),
            busy: EntitySet::new(),
        }
    }

    /// Forget which procedures are ready, for the transition from pass A
    /// to pass B. The property words persisted on the graphs survive, so
    /// pass A's results stay visible while pass B runs.
    pub fn reset(&mut self) {
        self.ready.clear();
        self.busy.clear();
    }

    pub fn is_ready(&self, func: Func) -> bool {
        self.ready.contains(func)
    }

    // ------------------------------------------------------------------
    // Pass A: nothrow + malloc.

    /// Determine whether `func` is nothrow and/or malloc.
    pub fn check_nothrow_or_malloc(
        &mut self,
        prog: &mut Program,
        func: Func,
        top: bool,
    ) -> FuncProps {
        if self.ready.contains(func) {
            return prog.funcs[func]
                .props
                .mask(FuncProps::NOTHROW | FuncProps::MALLOC);
        }
        if self.busy.contains(func) {
            // The caller is part of a recursion through `func`; answer
            // optimistically so the cycle contributes nothing, and mark
            // the answer as tentative.
            return FuncProps::NOTHROW | FuncProps::MALLOC | FuncProps::TENTATIVE;
        }
        self.busy.insert(func);

        let mut curr = FuncProps::NOTHROW | FuncProps::MALLOC;
        if prog.func_sig(func).n_results == 0 {
            curr = curr.without(FuncProps::MALLOC);
        }

        let end_preds: Vec<Node> = {
            let g = &prog.funcs[func];
            g.cfg_preds(g.end_block()).to_vec()
        };
        for &pred in &end_preds {
            match prog.funcs[func].opcode(pred) {
                Opcode::Return => {
                    if curr.is_malloc() {
                        let results = prog.funcs[func].return_results(pred).to_vec();
                        for value in results {
                            curr = self.classify_returned_value(prog, func, value, curr);
                        }
                    }
                }
                Opcode::Bad => {}
                _ => curr = self.classify_exceptional_exit(prog, func, pred, curr),
            }
        }

        // A fresh allocation only stays fresh if no returned value can be
        // reached through memory afterwards.
        if curr.is_malloc() {
            let g = &prog.funcs[func];
            'returns: for &pred in &end_preds {
                if g.opcode(pred) != Opcode::Return {
                    continue;
                }
                for &value in g.return_results(pred) {
                    if is_stored(g, value) {
                        curr = curr.without(FuncProps::MALLOC);
                        break 'returns;
                    }
                }
            }
        }

        self.busy.remove(func);
        if !curr.is_tentative() || top {
            let committed = curr.without(FuncProps::TENTATIVE);
            self.ready.insert(func);
            let inferred = committed.mask(FuncProps::NOTHROW | FuncProps::MALLOC);
            if !inferred.is_bottom() {
                log::debug!("{}: inferred {}", prog.funcs[func].name, inferred);
                prog.add_func_props(func, inferred);
            }
            return committed;
        }
        curr
    }

    /// Fold one returned value into the malloc/nothrow accumulator.
    fn classify_returned_value(
        &mut self,
        prog: &mut Program,
        func: Func,
        value: Node,
        curr: FuncProps,
    ) -> FuncProps {
        let g = &prog.funcs[func];
        let value = strip_views(g, value);
        match g.opcode(value) {
            Opcode::Alloc if g.alloc_kind(value) == AllocKind::Heap => curr,
            Opcode::Call => {
                let ptr = g.call_ptr(value);
                if g.opcode(ptr) == Opcode::SymConst {
                    let ent = g.entity_of(ptr);
                    match self.callee_nothrow_malloc(prog, func, ent) {
                        Some(props) => curr.update(props),
                        None => curr,
                    }
                } else if let Some(callees) = g.call_callees(value) {
                    if callees.is_empty() {
                        return curr.without(FuncProps::MALLOC);
                    }
                    let callees = callees.to_vec();
                    let mut curr = curr;
                    for callee in callees {
                        match callee {
                            Callee::Unknown => curr = curr.without(FuncProps::MALLOC),
                            Callee::Known(ent) => {
                                if let Some(props) = self.callee_nothrow_malloc(prog, func, ent) {
                                    curr = curr.update(props);
                                }
                            }
                        }
                    }
                    curr
                } else {
                    curr.without(FuncProps::MALLOC)
                }
            }
            _ => curr.without(FuncProps::MALLOC),
        }
    }

    /// The pass A properties of a callee; `None` for self-recursion,
    /// which contributes nothing.
    fn callee_nothrow_malloc(
        &mut self,
        prog: &mut Program,
        current: Func,
        ent: Ent,
    ) -> Option<FuncProps> {
        match prog.ents[ent].func.expand() {
            Some(callee) if callee == current => None,
            Some(callee) => Some(self.check_nothrow_or_malloc(prog, callee, false)),
            None => Some(prog.ents[ent].props),
        }
    }

    /// An end-block predecessor that is neither Return nor Bad is an
    /// exceptional exit. It preserves nothrow only if it comes from a
    /// call whose callees are all nothrow.
    fn classify_exceptional_exit(
        &mut self,
        prog: &mut Program,
        func: Func,
        pred: Node,
        curr: FuncProps,
    ) -> FuncProps {
        let g = &prog.funcs[func];
        let mut n = pred;
        if g.opcode(n) == Opcode::Proj {
            n = g.proj_pred(n);
        }
        if g.opcode(n) != Opcode::Call {
            return curr.without(FuncProps::NOTHROW);
        }

        let callees: Vec<Option<Ent>> = {
            let ptr = g.call_ptr(n);
            if g.opcode(ptr) == Opcode::SymConst {
                vec![Some(g.entity_of(ptr))]
            } else if let Some(callees) = g.call_callees(n) {
                if callees.is_empty() {
                    return curr.without(FuncProps::NOTHROW);
                }
                callees
                    .iter()
                    .map(|c| match c {
                        Callee::Known(ent) => Some(*ent),
                        Callee::Unknown => None,
                    })
                    .collect()
            } else {
                return curr.without(FuncProps::NOTHROW);
            }
        };

        let mut curr = curr;
        for callee in callees {
            let Some(ent) = callee else {
                return curr.without(FuncProps::NOTHROW);
            };
            match self.callee_nothrow_malloc(prog, func, ent) {
                None => {} // self-recursion
                Some(props) => {
                    if !props.is_nothrow() {
                        return curr.without(FuncProps::NOTHROW);
                    }
                    if props.is_tentative() {
                        curr = curr | FuncProps::TENTATIVE;
                    }
                }
            }
        }
        curr
    }

    // ------------------------------------------------------------------
    // Pass B: const + pure.

    /// Determine whether `func` is const or pure.
    pub fn check_const_or_pure(&mut self, prog: &mut Program, func: Func, top: bool) -> FuncProps {
        if self.ready.contains(func) {
            return prog.funcs[func].props.mask(FuncProps::CONST | FuncProps::PURE);
        }
        if self.busy.contains(func) {
            // A memory chain that leads back into an in-flight analysis
            // is a recursion that never terminates.
            return FuncProps::NONE;
        }
        self.busy.insert(func);

        let mut prop = if prog.func_sig(func).has_compound_params() {
            FuncProps::NONE
        } else {
            self.follow_mem_chains(prog, func)
        };

        if !prop.is_bottom() {
            // Keep-alive edges witness values that survive past all
            // returns; only plain memory keep-alives are harmless.
            let g = &prog.funcs[func];
            for &ka in g.keepalives() {
                if g.opcode(ka).is_block() || !g.mode(ka).is_mem() {
                    prop = FuncProps::NONE;
                    break;
                }
            }
        }

        if prop.is_const() && has_cfg_loop(&prog.funcs[func]) {
            // The procedure might not terminate; callers must not hoist
            // calls to it out of their own control flow.
            prop = prop | FuncProps::HAS_LOOP;
        }

        self.busy.remove(func);
        if !prop.is_tentative() || top {
            let committed = prop.without(FuncProps::TENTATIVE);
            self.ready.insert(func);
            let inferred =
                committed.mask(FuncProps::CONST | FuncProps::PURE | FuncProps::HAS_LOOP);
            if !inferred.is_bottom() {
                log::debug!("{}: inferred {}", prog.funcs[func].name, inferred);
                prog.add_func_props(func, inferred);
            }
            return committed;
        }
        prop
    }

    /// Walk every return's memory input backwards through the memory
    /// chain and meet the per-path results.
    fn follow_mem_chains(&mut self, prog: &mut Program, func: Func) -> FuncProps {
        let mut worklist: Vec<Node> = {
            let g = &mut prog.funcs[func];
            g.start_visit();
            let initial_mem = g.initial_mem();
            g.mark_visited(initial_mem);
            let end_block = g.end_block();
            g.cfg_preds(end_block)
                .iter()
                .copied()
                .collect::<Vec<_>>()
                .into_iter()
                .filter(|&p| g.opcode(p) == Opcode::Return)
                .map(|p| g.return_mem(p))
                .collect()
        };

        let mut prop = FuncProps::CONST;
        while let Some(m) = worklist.pop() {
            let g = &mut prog.funcs[func];
            if g.is_visited(m) {
                continue;
            }
            g.mark_visited(m);
            match g.opcode(m) {
                Opcode::Proj => worklist.push(g.proj_pred(m)),
                Opcode::NoMem => {}
                Opcode::Phi | Opcode::Sync => worklist.extend_from_slice(g.inputs(m)),
                Opcode::Load => {
                    if g.load_volatile(m) {
                        return FuncProps::NONE;
                    }
                    // Reading memory is as good as it gets from here on.
                    prop = prop.max(FuncProps::PURE);
                    worklist.push(g.load_mem(m));
                }
                Opcode::Call => {
                    let ptr = g.call_ptr(m);
                    if g.opcode(ptr) != Opcode::SymConst {
                        return FuncProps::NONE;
                    }
                    let ent = g.entity_of(ptr);
                    let mem = g.call_mem(m);
                    let callee_props = match prog.ents[ent].func.expand() {
                        Some(callee) => self.check_const_or_pure(prog, callee, false),
                        None => prog.ents[ent].props,
                    };
                    prop = prop.max(
                        callee_props.mask(FuncProps::CONST | FuncProps::PURE | FuncProps::TENTATIVE),
                    );
                    if prop.is_bottom() {
                        return FuncProps::NONE;
                    }
                    worklist.push(mem);
                }
                _ => return FuncProps::NONE,
            }
        }
        prop
    }
}

/// Strip Proj, Cast and Confirm views off a value.
fn strip_views(g: &FunctionData, mut value: Node) -> Node {
    loop {
        match g.opcode(value) {
            Opcode::Proj => value = g.proj_pred(value),
            op if op.is_value_view() => value = g.inputs(value)[0],
            _ => return value,
        }
    }
}

/// Can `n` be reached through memory after the procedure returns?
///
/// Follows out-edges: uses as Return result, Load address, Cmp operand or
/// Store address are harmless; being stored as a value, passed to a call
/// or used by anything else counts as an escape. Sel, Cast and Confirm
/// are transparent.
fn is_stored(g: &FunctionData, n: Node) -> bool {
    for &user in g.outs(n) {
        match g.opcode(user) {
            Opcode::Return | Opcode::Load | Opcode::Cmp => {}
            Opcode::Store => {
                if g.store_value(user) == n {
                    return true;
                }
            }
            Opcode::Sel | Opcode::Cast | Opcode::Confirm => {
                if is_stored(g, user) {
                    return true;
                }
            }
            _ => return true,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Mode, ProjKind, Signature};

    fn solve(prog: &mut Program) {
        let _ = env_logger::builder().is_test(true).try_init();
        let funcs: Vec<Func> = prog.funcs.keys().collect();
        let mut solver = PropSolver::new();
        for &f in &funcs {
            if !solver.is_ready(f) {
                solver.check_nothrow_or_malloc(prog, f, true);
            }
        }
        solver.reset();
        for &f in &funcs {
            if !solver.is_ready(f) {
                solver.check_const_or_pure(prog, f, true);
            }
        }
    }

    #[test]
    fn constant_return_is_const() {
        let mut prog = Program::new();
        let (f, _) = prog.define_func("one", Signature::simple(0, 1));
        let g = &mut prog.funcs[f];
        let entry = g.entry();
        let one = g.iconst(1);
        let mem = g.initial_mem();
        g.ret(entry, mem, &[one]);

        solve(&mut prog);
        let props = prog.funcs[f].props;
        assert!(props.is_const());
        assert!(!props.has_loop());
        assert!(props.is_nothrow());
        assert!(!props.is_malloc());
    }

    #[test]
    fn volatile_load_disqualifies() {
        let mut prog = Program::new();
        let (f, _) = prog.define_func("read_hw", Signature::simple(1, 1));
        let g = &mut prog.funcs[f];
        let entry = g.entry();
        let addr = g.arg(0, Mode::Int);
        let mem = g.initial_mem();
        let load = g.load(entry, mem, addr, true);
        let load_m = g.proj(load, Mode::M, ProjKind::Mem);
        let load_v = g.proj(load, Mode::Int, ProjKind::Res(0));
        g.ret(entry, load_m, &[load_v]);

        solve(&mut prog);
        let props = prog.funcs[f].props;
        assert!(!props.is_const());
        assert!(!props.is_pure());
    }

    #[test]
    fn nonvolatile_load_is_pure() {
        let mut prog = Program::new();
        let (f, _) = prog.define_func("deref", Signature::simple(1, 1));
        let g = &mut prog.funcs[f];
        let entry = g.entry();
        let addr = g.arg(0, Mode::Int);
        let mem = g.initial_mem();
        let load = g.load(entry, mem, addr, false);
        let load_m = g.proj(load, Mode::M, ProjKind::Mem);
        let load_v = g.proj(load, Mode::Int, ProjKind::Res(0));
        g.ret(entry, load_m, &[load_v]);

        solve(&mut prog);
        let props = prog.funcs[f].props;
        assert!(!props.is_const());
        assert!(props.is_pure());
    }

    #[test]
    fn mutual_recursion_promotes_nothing() {
        let mut prog = Program::new();
        let (fa, ea) = prog.define_func("a", Signature::simple(0, 1));
        let (fb, eb) = prog.define_func("b", Signature::simple(0, 1));

        for (f, other) in [(fa, eb), (fb, ea)] {
            let g = &mut prog.funcs[f];
            let entry = g.entry();
            let mem = g.initial_mem();
            let ptr = g.sym_const(other);
            let call = g.call(entry, mem, ptr, &[]);
            let call_m = g.proj(call, Mode::M, ProjKind::Mem);
            let res = g.proj(call, Mode::Int, ProjKind::Res(0));
            g.ret(entry, call_m, &[res]);
        }

        solve(&mut prog);
        for f in [fa, fb] {
            let props = prog.funcs[f].props;
            assert!(!props.is_const());
            assert!(!props.is_pure());
        }
    }

    #[test]
    fn heap_alloc_return_is_malloc() {
        let mut prog = Program::new();
        let (f, _) = prog.define_func("mk", Signature::simple(0, 1));
        let g = &mut prog.funcs[f];
        let entry = g.entry();
        let mem = g.initial_mem();
        let size = g.iconst(16);
        let alloc = g.alloc(entry, mem, size, AllocKind::Heap);
        let alloc_m = g.proj(alloc, Mode::M, ProjKind::Mem);
        let alloc_p = g.proj(alloc, Mode::Int, ProjKind::Res(0));
        g.ret(entry, alloc_m, &[alloc_p]);

        solve(&mut prog);
        assert!(prog.funcs[f].props.is_malloc());
    }

    #[test]
    fn escaping_alloc_is_not_malloc() {
        let mut prog = Program::new();
        let (f, _) = prog.define_func("mk_escaping", Signature::simple(1, 1));
        let g = &mut prog.funcs[f];
        let entry = g.entry();
        let mem = g.initial_mem();
        let size = g.iconst(16);
        let slot = g.arg(0, Mode::Int);
        let alloc = g.alloc(entry, mem, size, AllocKind::Heap);
        let alloc_m = g.proj(alloc, Mode::M, ProjKind::Mem);
        let alloc_p = g.proj(alloc, Mode::Int, ProjKind::Res(0));
        // The pointer is written to memory before being returned.
        let store = g.store(entry, alloc_m, slot, alloc_p);
        let store_m = g.proj(store, Mode::M, ProjKind::Mem);
        g.ret(entry, store_m, &[alloc_p]);

        solve(&mut prog);
        assert!(!prog.funcs[f].props.is_malloc());
    }

    #[test]
    fn stack_alloc_is_not_malloc() {
        let mut prog = Program::new();
        let (f, _) = prog.define_func("mk_local", Signature::simple(0, 1));
        let g = &mut prog.funcs[f];
        let entry = g.entry();
        let mem = g.initial_mem();
        let size = g.iconst(16);
        let alloc = g.alloc(entry, mem, size, AllocKind::Stack);
        let alloc_m = g.proj(alloc, Mode::M, ProjKind::Mem);
        let alloc_p = g.proj(alloc, Mode::Int, ProjKind::Res(0));
        g.ret(entry, alloc_m, &[alloc_p]);

        solve(&mut prog);
        assert!(!prog.funcs[f].props.is_malloc());
    }

    #[test]
    fn exceptional_exit_clears_nothrow() {
        let mut prog = Program::new();
        let may_throw = prog.declare_ent("may_throw", Signature::simple(0, 0), FuncProps::NONE);
        let (f, _) = prog.define_func("wrapper", Signature::simple(0, 0));
        let g = &mut prog.funcs[f];
        let entry = g.entry();
        let mem = g.initial_mem();
        let ptr = g.sym_const(may_throw);
        let call = g.call(entry, mem, ptr, &[]);
        let call_m = g.proj(call, Mode::M, ProjKind::Mem);
        let call_x = g.proj(call, Mode::X, ProjKind::XExcept);
        let end_block = g.end_block();
        g.add_block_pred(end_block, call_x);
        g.ret(entry, call_m, &[]);

        solve(&mut prog);
        assert!(!prog.funcs[f].props.is_nothrow());
    }

    #[test]
    fn nothrow_callee_preserves_nothrow() {
        let mut prog = Program::new();
        let safe = prog.declare_ent("safe", Signature::simple(0, 0), FuncProps::NOTHROW);
        let (f, _) = prog.define_func("wrapper", Signature::simple(0, 0));
        let g = &mut prog.funcs[f];
        let entry = g.entry();
        let mem = g.initial_mem();
        let ptr = g.sym_const(safe);
        let call = g.call(entry, mem, ptr, &[]);
        let call_m = g.proj(call, Mode::M, ProjKind::Mem);
        let call_x = g.proj(call, Mode::X, ProjKind::XExcept);
        let end_block = g.end_block();
        g.add_block_pred(end_block, call_x);
        g.ret(entry, call_m, &[]);

        solve(&mut prog);
        assert!(prog.funcs[f].props.is_nothrow());
    }

    #[test]
    fn sync_of_loads_is_pure() {
        let mut prog = Program::new();
        let (f, _) = prog.define_func("sum_two_cells", Signature::simple(2, 1));
        let g = &mut prog.funcs[f];
        let entry = g.entry();
        let mem = g.initial_mem();
        let addr1 = g.arg(0, Mode::Int);
        let addr2 = g.arg(1, Mode::Int);
        let l1 = g.load(entry, mem, addr1, false);
        let l1_m = g.proj(l1, Mode::M, ProjKind::Mem);
        let l1_v = g.proj(l1, Mode::Int, ProjKind::Res(0));
        let l2 = g.load(entry, mem, addr2, false);
        let l2_m = g.proj(l2, Mode::M, ProjKind::Mem);
        let l2_v = g.proj(l2, Mode::Int, ProjKind::Res(0));
        let sum = g.add(entry, l1_v, l2_v);
        let sync = g.sync(entry, &[l1_m, l2_m]);
        g.ret(entry, sync, &[sum]);

        solve(&mut prog);
        let props = prog.funcs[f].props;
        assert!(!props.is_const());
        assert!(props.is_pure());
    }

    #[test]
    fn unknown_indirect_callee_clears_nothrow() {
        let mut prog = Program::new();
        let safe = prog.declare_ent("safe", Signature::simple(0, 0), FuncProps::NOTHROW);
        let (f, _) = prog.define_func("dispatch", Signature::simple(2, 0));
        let g = &mut prog.funcs[f];
        let entry = g.entry();
        let mem = g.initial_mem();
        let base = g.arg(0, Mode::Int);
        let index = g.arg(1, Mode::Int);
        let ptr = g.sel(entry, base, index);
        let call = g.call(entry, mem, ptr, &[]);
        g.set_call_callees(call, vec![Callee::Known(safe), Callee::Unknown]);
        let call_m = g.proj(call, Mode::M, ProjKind::Mem);
        let call_x = g.proj(call, Mode::X, ProjKind::XExcept);
        let end_block = g.end_block();
        g.add_block_pred(end_block, call_x);
        g.ret(entry, call_m, &[]);

        solve(&mut prog);
        assert!(!prog.funcs[f].props.is_nothrow());
    }

    #[test]
    fn resolved_indirect_callees_preserve_nothrow() {
        let mut prog = Program::new();
        let safe1 = prog.declare_ent("safe1", Signature::simple(0, 0), FuncProps::NOTHROW);
        let safe2 = prog.declare_ent("safe2", Signature::simple(0, 0), FuncProps::NOTHROW);
        let (f, _) = prog.define_func("dispatch", Signature::simple(2, 0));
        let g = &mut prog.funcs[f];
        let entry = g.entry();
        let mem = g.initial_mem();
        let base = g.arg(0, Mode::Int);
        let index = g.arg(1, Mode::Int);
        let ptr = g.sel(entry, base, index);
        let call = g.call(entry, mem, ptr, &[]);
        g.set_call_callees(call, vec![Callee::Known(safe1), Callee::Known(safe2)]);
        let call_m = g.proj(call, Mode::M, ProjKind::Mem);
        let call_x = g.proj(call, Mode::X, ProjKind::XExcept);
        let end_block = g.end_block();
        g.add_block_pred(end_block, call_x);
        g.ret(entry, call_m, &[]);

        solve(&mut prog);
        assert!(prog.funcs[f].props.is_nothrow());
    }

    #[test]
    fn views_are_stripped_on_returned_allocations() {
        let mut prog = Program::new();
        let (f, _) = prog.define_func("mk_viewed", Signature::simple(0, 1));
        let g = &mut prog.funcs[f];
        let entry = g.entry();
        let mem = g.initial_mem();
        let size = g.iconst(24);
        let alloc = g.alloc(entry, mem, size, AllocKind::Heap);
        let alloc_m = g.proj(alloc, Mode::M, ProjKind::Mem);
        let alloc_p = g.proj(alloc, Mode::Int, ProjKind::Res(0));
        let cast = g.cast(alloc_p, Mode::Int);
        let view = g.confirm(cast);
        // Comparing the pointer does not let it escape.
        let zero = g.iconst(0);
        let _cmp = g.cmp(entry, view, zero);
        g.ret(entry, alloc_m, &[view]);

        solve(&mut prog);
        assert!(prog.funcs[f].props.is_malloc());
    }

    #[test]
    fn compound_parameters_disqualify_const() {
        let mut prog = Program::new();
        let sig = Signature {
            params: vec![crate::ir::ParamKind::Compound],
            n_results: 1,
        };
        let (f, _) = prog.define_func("takes_struct", sig);
        let g = &mut prog.funcs[f];
        let entry = g.entry();
        let one = g.iconst(1);
        let mem = g.initial_mem();
        g.ret(entry, mem, &[one]);

        solve(&mut prog);
        assert!(!prog.funcs[f].props.is_const());
        assert!(!prog.funcs[f].props.is_pure());
    }

    #[test]
    fn repeated_solving_is_idempotent() {
        let mut prog = Program::new();
        let (f, _) = prog.define_func("one", Signature::simple(0, 1));
        let g = &mut prog.funcs[f];
        let entry = g.entry();
        let one = g.iconst(1);
        let mem = g.initial_mem();
        g.ret(entry, mem, &[one]);

        solve(&mut prog);
        let first = prog.funcs[f].props;
        solve(&mut prog);
        assert_eq!(first, prog.funcs[f].props);
    }

    #[test]
    fn non_memory_keepalive_disqualifies() {
        let mut prog = Program::new();
        let (f, _) = prog.define_func("kept", Signature::simple(0, 1));
        let g = &mut prog.funcs[f];
        let entry = g.entry();
        let one = g.iconst(1);
        let mem = g.initial_mem();
        g.ret(entry, mem, &[one]);
        g.add_keepalive(one);

        solve(&mut prog);
        assert!(!prog.funcs[f].props.is_const());
        assert!(!prog.funcs[f].props.is_pure());
    }
}
