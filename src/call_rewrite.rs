//! Call-site specialization.
//!
//! Once the property solver has classified the procedures of a program,
//! call sites to classified callees can shed edges they no longer need:
//!
//! - Calls to const and pure callees lose their memory input: the call is
//!   retargeted to the no-mem node and its former memory flows directly
//!   to every user of the call's memory projection. Calls whose callee
//!   might loop forever stay pinned in their block; all others float.
//! - Exception projections of const, pure and nothrow calls are replaced
//!   by the dead control token, and the corresponding regular-exit
//!   projections by a plain jump in the call's block.
//!
//! Each graph is walked exactly once to collect the call and projection
//! lists; the rewrite then works off the lists. The call's former memory
//! is kept in a pass side table, guarded by the graph's scratch
//! reservation; presence in the table is also the "already handled" mark
//! consulted while walking the projection list.

use crate::call_props::PropSolver;
use crate::fx::FxHashMap;
use crate::ir::{Callee, Func, FuncProps, FunctionData, Node, Opcode, Pinned, Program, ProjKind};

/// Infer procedure properties for the whole program, then rewrite every
/// call site the results allow. Idempotent.
pub fn optimize_func_calls(prog: &mut Program) {
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

    for &f in &funcs {
        rewrite_calls(prog, f);
    }
}

/// The call sites of one graph, sorted by the strongest applicable
/// rewrite, plus every memory/control projection of any call.
#[derive(Default)]
struct CallLists {
    float_const: Vec<Node>,
    nonfloat_const: Vec<Node>,
    pure_calls: Vec<Node>,
    nothrow_calls: Vec<Node>,
    projs: Vec<Node>,
}

/// The combined properties of all possible callees of `call`, or bottom
/// if any callee is unknown or no callee information exists.
fn callee_props(prog: &Program, g: &FunctionData, call: Node) -> FuncProps {
    let ptr = g.call_ptr(call);
    if g.opcode(ptr) == Opcode::SymConst {
        return prog.ent_props(g.entity_of(ptr));
    }
    let Some(callees) = g.call_callees(call) else {
        return FuncProps::NONE;
    };
    if callees.is_empty() {
        // No known target: leave the call site alone.
        return FuncProps::NONE;
    }
    let mut props =
        FuncProps::CONST | FuncProps::PURE | FuncProps::NOTHROW | FuncProps::MALLOC;
    // The property bits hold only if every callee has them; has-loop is
    // the other way around: one possibly endless callee taints the call.
    let mut has_loop = FuncProps::NONE;
    for callee in callees {
        match callee {
            Callee::Unknown => return FuncProps::NONE,
            Callee::Known(ent) => {
                let callee_props = prog.ent_props(*ent);
                has_loop = has_loop | callee_props.mask(FuncProps::HAS_LOOP);
                props = props.update(callee_props.without(FuncProps::HAS_LOOP));
            }
        }
    }
    props | has_loop
}

fn collect_calls(prog: &Program, func: Func) -> CallLists {
    let g = &prog.funcs[func];
    let mut lists = CallLists::default();
    for n in g.nodes() {
        match g.opcode(n) {
            Opcode::Call => {
                let props = callee_props(prog, g, n);
                if props.is_const() {
                    if props.has_loop() {
                        lists.nonfloat_const.push(n);
                    } else {
                        lists.float_const.push(n);
                    }
                } else if props.is_pure() {
                    lists.pure_calls.push(n);
                } else if props.is_nothrow() {
                    lists.nothrow_calls.push(n);
                }
            }
            Opcode::Proj => {
                let pred = g.proj_pred(n);
                if g.opcode(pred) == Opcode::Call
                    && matches!(
                        g.proj_kind(n),
                        ProjKind::Mem | ProjKind::XRegular | ProjKind::XExcept
                    )
                {
                    lists.projs.push(n);
                }
            }
            _ => {}
        }
    }
    lists
}

/// How a collected call is to be rewritten.
enum Handled {
    /// Memory bypassed; the call's former memory input.
    Bypassed(Node),
    /// Only the exceptional control flow is removed.
    Nothrow,
}

fn rewrite_calls(prog: &mut Program, func: Func) {
    let lists = collect_calls(prog, func);
    if lists.float_const.is_empty()
        && lists.nonfloat_const.is_empty()
        && lists.pure_calls.is_empty()
        && lists.nothrow_calls.is_empty()
    {
        return;
    }
    log::debug!(
        "{}: rewriting {} const, {} pure, {} nothrow call sites",
        prog.funcs[func].name,
        lists.float_const.len() + lists.nonfloat_const.len(),
        lists.pure_calls.len(),
        lists.nothrow_calls.len(),
    );

    let g = &mut prog.funcs[func];
    let _scratch = g.reserve_scratch();
    let mut handled: FxHashMap<Node, Handled> = FxHashMap::default();

    // Detach the memory edge of every const and pure call. Calls to
    // callees that might loop forever keep their pin so they cannot be
    // hoisted past the control flow guarding them.
    for &call in lists.float_const.iter().chain(&lists.pure_calls) {
        let mem = g.call_mem(call);
        handled.insert(call, Handled::Bypassed(mem));
        let no_mem = g.no_mem();
        g.set_call_mem(call, no_mem);
        g.set_pinned(call, Pinned::Floats);
    }
    for &call in &lists.nonfloat_const {
        let mem = g.call_mem(call);
        handled.insert(call, Handled::Bypassed(mem));
        let no_mem = g.no_mem();
        g.set_call_mem(call, no_mem);
    }
    for &call in &lists.nothrow_calls {
        handled.insert(call, Handled::Nothrow);
    }

    // Reroute the projections of every handled call. `replaced` chases
    // projections that were themselves exchanged earlier in the loop,
    // which happens when one bypassed call's memory came out of another.
    let mut replaced: FxHashMap<Node, Node> = FxHashMap::default();
    let mut exc_changed = false;
    for &proj in &lists.projs {
        let call = g.proj_pred(proj);
        match handled.get(&call) {
            None => {}
            Some(&Handled::Bypassed(mem)) => match g.proj_kind(proj) {
                ProjKind::Mem => {
                    let mem = resolve(&replaced, mem);
                    if proj != mem {
                        g.exchange(proj, mem);
                        replaced.insert(proj, mem);
                    }
                }
                ProjKind::XExcept => {
                    exc_changed = true;
                    let bad = g.bad_ctrl();
                    g.exchange(proj, bad);
                }
                ProjKind::XRegular => {
                    exc_changed = true;
                    let block = g.block_of(call).expect("call outside any block");
                    let jmp = g.jmp(block);
                    g.exchange(proj, jmp);
                }
                _ => {}
            },
            Some(&Handled::Nothrow) => match g.proj_kind(proj) {
                ProjKind::XExcept => {
                    exc_changed = true;
                    let bad = g.bad_ctrl();
                    g.exchange(proj, bad);
                }
                ProjKind::XRegular => {
                    exc_changed = true;
                    let block = g.block_of(call).expect("call outside any block");
                    let jmp = g.jmp(block);
                    g.exchange(proj, jmp);
                }
                _ => {}
            },
        }
    }

    if exc_changed {
        g.invalidate_cfg_info();
    }
}

/// Chase a node through earlier exchanges.
fn resolve(replaced: &FxHashMap<Node, Node>, mut n: Node) -> Node {
    while let Some(&r) = replaced.get(&n) {
        n = r;
    }
    n
}
