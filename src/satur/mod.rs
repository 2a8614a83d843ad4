//! Register saturation scheduling preparation.
//!
//! Before list scheduling, every block is checked against the register
//! budget of each register class: the block's *register saturation*, the
//! size of a maximal antichain in its disjoint value DAG, is a lower
//! bound on the number of registers any schedule of the block needs.
//! While the saturation exceeds the available registers, the cheapest
//! admissible value serialization is inserted as an explicit dependency
//! edge, forcing one value to die before another is born, and the
//! saturation is recomputed.
//!
//! The pipeline per block and class is: collect the per-value
//! information, select a unique killer per value, build the disjoint
//! value DAG, partition it into chains, derive the antichain, then
//! serialize until the budget holds or no admissible edge remains.

mod block_info;
mod dvg;
mod killers;

use crate::fx::FxHashSet;
use crate::height::BlockHeights;
use crate::ir::{Func, FunctionData, Node, Program};
use crate::isa::{RegClassInfo, RegInfo};
use crate::satur::block_info::{BlockInfo, Vid, SINK};
use crate::satur::dvg::{maximal_antichain, ChainPartition, Dvg};
use crate::satur::killers::select_killers;

/// Prepare every block of `func` for list scheduling under the register
/// budget of `regs`.
pub fn schedule_preparation(prog: &mut Program, func: Func, regs: &RegInfo) {
    for cls in regs.classes() {
        let blocks: Vec<Node> = prog.funcs[func].blocks().collect();
        for block in blocks {
            prepare_block(&mut prog.funcs[func], block, cls);
        }
    }
}

/// The register saturation of one block for one class, without touching
/// the graph.
pub fn register_saturation(f: &FunctionData, block: Node, cls: &RegClassInfo) -> u32 {
    let info = BlockInfo::compute(f, block, cls);
    if info.interesting().len() < 2 {
        return info.interesting().len() as u32;
    }
    let sel = select_killers(&info);
    let dvg = Dvg::build(f, &info, &sel.killer);
    let chains = ChainPartition::compute(&dvg);
    maximal_antichain(&dvg, &chains).len() as u32
}

fn prepare_block(f: &mut FunctionData, block: Node, cls: &RegClassInfo) {
    let avail = cls.available();
    let info = BlockInfo::compute(f, block, cls);
    if info.interesting().len() < 2 {
        return;
    }
    let sel = select_killers(&info);
    let mut dvg = Dvg::build(f, &info, &sel.killer);
    let mut heights = BlockHeights::compute(f, block);

    loop {
        let chains = ChainPartition::compute(&dvg);
        let antichain = maximal_antichain(&dvg, &chains);
        let saturation = antichain.len() as u32;
        log::trace!(
            "{}: {} in class {}: saturation {saturation}, available {avail}",
            f.name,
            block,
            cls.name
        );
        if saturation <= avail {
            break;
        }
        let Some((src, tgt)) = best_serialization(f, &heights, &info, &dvg, &antichain, avail)
        else {
            // No admissible serialization gains anything; the block
            // keeps its saturation.
            break;
        };
        log::debug!(
            "{}: serializing {} before {} in {}",
            f.name,
            info.node(src),
            info.node(tgt),
            block
        );
        f.add_dep(info.node(tgt), info.node(src));
        dvg.add_edge(src, tgt);
        heights.recompute(f);
    }
}

/// The reflexive DVG descendants of `v`, sink excluded.
fn down_set(dvg: &Dvg, v: Vid) -> FxHashSet<Vid> {
    let mut set: FxHashSet<Vid> = dvg
        .descendants(v)
        .iter()
        .copied()
        .filter(|&d| d != SINK)
        .collect();
    set.insert(v);
    set
}

/// Find the best admissible serialization edge for the current
/// antichain, or `None` if no candidate reduces the pressure.
///
/// For every ordered antichain pair `(u, v)` and every DVG potential
/// killer `vv` of `u`, the candidate edge `vv -> v` delays `v` until
/// `u`'s lifetime has ended. Its gain ω1 weighs the antichain members
/// serialized behind `v` against the killing region of `u` that `v` does
/// not already cover; ω2 is the critical-path growth. The edge with the
/// smallest benefit `avail - ω1` wins, preferring candidates that leave
/// the critical path untouched.
fn best_serialization(
    f: &FunctionData,
    heights: &BlockHeights,
    info: &BlockInfo,
    dvg: &Dvg,
    antichain: &[Vid],
    avail: u32,
) -> Option<(Vid, Vid)> {
    let max_h = heights.max_height() as i64;
    let mut best: Option<(i64, Vid, Vid)> = None;
    let mut best_no_stretch: Option<(i64, Vid, Vid)> = None;
    let mut any_gain = false;

    for &u in antichain {
        let pkillers = dvg.pkiller(u);
        for &v in antichain {
            if v == u {
                continue;
            }
            let v_is_pkiller = pkillers.contains(&v);
            let d_v = down_set(dvg, v);
            for &vv in pkillers {
                if vv == SINK {
                    continue;
                }
                if dvg.has_edge(vv, v) {
                    continue;
                }
                // The edge must not close a cycle, neither in the
                // block's height graph nor in the DVG. `reachable` also
                // rules out vv == v.
                let admissible = !heights.reachable(f, info.node(v), info.node(vv))
                    && !dvg.has_descendant(v, vv);
                if !admissible {
                    continue;
                }

                let mu1 = antichain.iter().filter(|&&w| d_v.contains(&w)).count() as i64;
                let mu2 = if v_is_pkiller {
                    0
                } else {
                    let mut kill_region: FxHashSet<Vid> = FxHashSet::default();
                    for &k in pkillers {
                        if k == SINK {
                            continue;
                        }
                        kill_region.insert(k);
                        for &d in dvg.descendants(k) {
                            if d != SINK {
                                kill_region.insert(d);
                            }
                        }
                    }
                    kill_region.iter().filter(|k| !d_v.contains(k)).count() as i64
                };
                let omega1 = mu1 - mu2;
                let h_v = heights.height(info.node(v)) as i64;
                let h_vv = heights.height(info.node(vv)) as i64;
                let omega2 = (h_v + (max_h - h_vv) + 1 - max_h).max(0);

                if omega1 > 0 {
                    any_gain = true;
                }
                let benefit = avail as i64 - omega1;
                if best.is_none_or(|(b, _, _)| benefit < b) {
                    best = Some((benefit, vv, v));
                }
                if omega2 == 0 && best_no_stretch.is_none_or(|(b, _, _)| benefit < b) {
                    best_no_stretch = Some((benefit, vv, v));
                }
            }
        }
    }

    if !any_gain {
        return None;
    }
    let (_, src, tgt) = best_no_stretch.or(best)?;
    Some((src, tgt))
}
