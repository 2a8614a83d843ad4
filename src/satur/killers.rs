//! Potential killers and unique-killer selection.
//!
//! A consumer `v` of a value `u` *potentially kills* `u` if `v` can be
//! scheduled after every other consumer of `u`, i.e. if no other
//! consumer of `u` is a descendant of `v`. Every value needs exactly one
//! killer for the disjoint value DAG, so the potential-killing relation
//! is decomposed into connected bipartite components (values on one
//! side, their candidate killers on the other) and a greedy saturating
//! k-set heuristic picks, per component, killers that cover as many
//! values as possible with as few distinct operations as possible.
//!
//! Values whose only possible killer is the block exit keep the sink as
//! their killer.

use crate::fx::FxHashSet;
use crate::satur::block_info::{BlockInfo, Vid, SINK};

/// The result of killer selection for one block.
pub(crate) struct KillerSelection {
    /// The unique killer of every vid; `SINK` where no in-block killer
    /// was selected.
    pub killer: Vec<Vid>,
}

/// Does `v` potentially kill `u`?
///
/// `v` must be a consumer of `u`; the test then is
/// `descendants(v) ∩ consumers(u) ⊆ {v}`, evaluated by scanning the
/// shorter of the two sorted arrays and binary-searching the other.
fn is_potential_killer(info: &BlockInfo, u: Vid, v: Vid) -> bool {
    let desc = info.descendants(v);
    let cons = info.consumers(u);
    let (scan, probe) = if desc.len() <= cons.len() {
        (desc, cons)
    } else {
        (cons, desc)
    };
    for &x in scan {
        if x != v && probe.binary_search(&x).is_ok() {
            return false;
        }
    }
    true
}

/// Compute the potential-killer and killed-values lists for every vid.
fn compute_pkill_sets(info: &BlockInfo) -> (Vec<Vec<Vid>>, Vec<Vec<Vid>>) {
    let n = info.n_vids();
    let mut pkiller = vec![Vec::new(); n];
    let mut kill_values = vec![Vec::new(); n];
    for &u in info.interesting() {
        for &v in info.consumers(u) {
            // The sink is the implicit fallback killer; it never takes
            // part in the bipartite selection.
            if v == SINK {
                continue;
            }
            if is_potential_killer(info, u, v) {
                pkiller[u].push(v);
                kill_values[v].push(u);
            }
        }
    }
    (pkiller, kill_values)
}

/// One connected bipartite component: values `s`, candidate killers `t`.
struct Cbc {
    s: Vec<Vid>,
    t: Vec<Vid>,
}

/// Decompose the kill-edge relation into connected bipartite components.
fn bipartite_components(
    info: &BlockInfo,
    pkiller: &[Vec<Vid>],
    kill_values: &[Vec<Vid>],
) -> Vec<Cbc> {
    let mut components = Vec::new();
    let mut visited = vec![false; info.n_vids()];
    for &seed in info.interesting() {
        if visited[seed] {
            continue;
        }
        let mut s = vec![seed];
        let mut t = pkiller[seed].clone();
        // Alternate closure until both sides are stable.
        loop {
            let mut grew = false;
            for i in 0..t.len() {
                for &value in &kill_values[t[i]] {
                    if !s.contains(&value) {
                        s.push(value);
                        grew = true;
                    }
                }
            }
            for i in 0..s.len() {
                for &k in &pkiller[s[i]] {
                    if !t.contains(&k) {
                        t.push(k);
                        grew = true;
                    }
                }
            }
            if !grew {
                break;
            }
        }
        for &value in &s {
            visited[value] = true;
        }
        // A node that shows up in both roles stays a value; dropping its
        // killer role keeps the component bipartite.
        t.retain(|k| !s.contains(k));
        components.push(Cbc { s, t });
    }
    components
}

/// Greedy saturating k-set selection inside one component.
///
/// Repeatedly picks the killer covering the most still-uncovered values
/// relative to how much of the block it drags along (its descendants and
/// everything already selected), then assigns killers to values in
/// descending cost order.
fn greedy_k(info: &BlockInfo, cbc: &Cbc, edges: &FxHashSet<(Vid, Vid)>, killer: &mut [Vid]) {
    let mut x: Vec<Vid> = cbc.s.clone();
    let mut y: FxHashSet<Vid> = FxHashSet::default();
    let mut sks: Vec<(Vid, f64, Vec<Vid>)> = Vec::new();

    while !x.is_empty() {
        let mut best: Option<(f64, Vid)> = None;
        for &t in &cbc.t {
            let covered = x.iter().filter(|&&s| edges.contains(&(s, t))).count();
            let den = info.descendants(t).len() + y.len();
            let cost = if den == 0 {
                covered as f64
            } else {
                covered as f64 / den as f64
            };
            if covered > 0 && best.is_none_or(|(c, _)| cost > c) {
                best = Some((cost, t));
            }
        }
        let Some((cost, t)) = best else {
            // Values without a selectable killer keep the sink.
            break;
        };
        let killed: Vec<Vid> = x.iter().copied().filter(|&s| edges.contains(&(s, t))).collect();
        x.retain(|s| !killed.contains(s));
        for &d in info.descendants(t) {
            y.insert(d);
        }
        sks.push((t, cost, killed));
    }

    // Ascending by cost, assigned in descending order; every value was
    // recorded by exactly one selected killer.
    sks.sort_by(|a, b| a.1.partial_cmp(&b.1).expect("cost is never NaN"));
    for (t, _cost, parents) in sks.iter().rev() {
        for &p in parents {
            if killer[p] == SINK {
                killer[p] = *t;
            }
        }
    }
}

/// Select a unique killer for every interesting value of the block.
pub(crate) fn select_killers(info: &BlockInfo) -> KillerSelection {
    let (pkiller, kill_values) = compute_pkill_sets(info);

    let mut edges: FxHashSet<(Vid, Vid)> = FxHashSet::default();
    for &u in info.interesting() {
        for &v in &pkiller[u] {
            edges.insert((u, v));
        }
    }

    let mut killer = vec![SINK; info.n_vids()];
    for cbc in bipartite_components(info, &pkiller, &kill_values) {
        greedy_k(info, &cbc, &edges, &mut killer);
    }
    log::trace!(
        "selected killers for {} values in {}",
        info.interesting().len(),
        info.block()
    );
    KillerSelection { killer }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FunctionData, Mode};
    use crate::isa::RegClassInfo;

    fn int_class() -> RegClassInfo {
        RegClassInfo {
            name: "gp",
            mode: Mode::Int,
            n_regs: 8,
            n_ignore: 0,
            n_abi_ignore: 0,
        }
    }

    #[test]
    fn single_consumer_is_the_killer() {
        let mut f = FunctionData::new("f");
        let entry = f.entry();
        let a = f.arg(0, Mode::Int);
        let jmp = f.jmp(entry);
        let b = f.make_block(&[jmp]);
        let x = f.add(b, a, a);
        let y = f.add(b, x, x);
        let mem = f.initial_mem();
        f.ret(b, mem, &[y]);

        let info = BlockInfo::compute(&f, b, &int_class());
        let sel = select_killers(&info);
        let vx = info.interesting()[0];
        let vy = info.interesting()[1];
        assert_eq!(info.node(vx), x);
        // x dies at y; y dies at the return, which is no tracked value,
        // so its selected killer is an in-block operation as well.
        assert_eq!(sel.killer[vx], vy);
        assert_ne!(sel.killer[vy], SINK);
    }

    #[test]
    fn ordered_consumers_select_the_last_one() {
        let mut f = FunctionData::new("f");
        let entry = f.entry();
        let a = f.arg(0, Mode::Int);
        let jmp = f.jmp(entry);
        let b = f.make_block(&[jmp]);
        // x has two consumers; y2 consumes y1 and must run last.
        let x = f.add(b, a, a);
        let y1 = f.add(b, x, a);
        let y2 = f.add(b, y1, x);
        let mem = f.initial_mem();
        f.ret(b, mem, &[y2]);

        let info = BlockInfo::compute(&f, b, &int_class());
        let vx = info.interesting()[0];
        let vy1 = info.interesting()[1];
        let vy2 = info.interesting()[2];
        assert_eq!(info.node(vy2), y2);

        let (pkiller, _) = compute_pkill_sets(&info);
        // y1 cannot kill x because y2, another consumer of x, runs after
        // it.
        assert_eq!(pkiller[vx], vec![vy2]);
        assert_eq!(pkiller[vy1], vec![vy2]);

        let sel = select_killers(&info);
        assert_eq!(sel.killer[vx], vy2);
        assert_eq!(sel.killer[vy1], vy2);
    }

    #[test]
    fn live_out_value_keeps_the_sink() {
        let mut f = FunctionData::new("f");
        let entry = f.entry();
        let a = f.arg(0, Mode::Int);
        let jmp = f.jmp(entry);
        let b1 = f.make_block(&[jmp]);
        let x = f.add(b1, a, a);
        let z = f.add(b1, x, a);
        let jmp1 = f.jmp(b1);
        let b2 = f.make_block(&[jmp1]);
        let y = f.add(b2, x, x);
        let mem = f.initial_mem();
        f.ret(b2, mem, &[y]);
        // z keeps x's consumer set honest but is itself dead in-block.
        let _ = z;

        let info = BlockInfo::compute(&f, b1, &int_class());
        let sel = select_killers(&info);
        let vx = info.interesting()[0];
        assert_eq!(info.node(vx), x);
        // x survives the block; nothing in-block may kill it.
        assert_eq!(sel.killer[vx], SINK);
    }
}
