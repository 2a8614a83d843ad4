//! The disjoint value DAG and its chain partition.
//!
//! The DVG's nodes are the block's interesting values plus the sink; its
//! edges follow the selected killer of each value transitively, so a path
//! in the DVG is a sequence of values whose lifetimes cannot overlap. A
//! minimum partition of the DVG into such chains is found through a
//! maximum-cardinality bipartite matching; the number of chains equals
//! the size of a maximal antichain, which is the block's register
//! saturation.

use crate::fx::FxHashSet;
use crate::ir::FunctionData;
use crate::matching::BipartiteMatcher;
use crate::satur::block_info::{BlockInfo, Vid, SINK};

/// The disjoint value DAG of one block.
pub(crate) struct Dvg {
    /// The member vids: all interesting values, then the sink.
    members: Vec<Vid>,
    /// Local dense index per vid; indexed by vid.
    local: Vec<Option<usize>>,
    edges: FxHashSet<(Vid, Vid)>,
    /// The edges in insertion order, for deterministic matching.
    edge_list: Vec<(Vid, Vid)>,
    /// DVG successors per vid.
    users: Vec<Vec<Vid>>,
    /// Transitive DVG descendants per vid, sorted.
    desc: Vec<Vec<Vid>>,
    /// DVG potential killers per vid.
    pkiller: Vec<Vec<Vid>>,
}

impl Dvg {
    /// Build the DVG by following every value's killer chain. A killer
    /// outside the DVG's member set stands for the sink. Serialization
    /// dependencies already present in the graph re-enter the DVG as
    /// edges, so recomputed saturation reflects earlier serializations.
    pub fn build(f: &FunctionData, info: &BlockInfo, killer: &[Vid]) -> Self {
        let n = info.n_vids();
        let mut members: Vec<Vid> = info.interesting().to_vec();
        members.push(SINK);
        let mut local = vec![None; n];
        for (i, &m) in members.iter().enumerate() {
            local[m] = Some(i);
        }

        let mut dvg = Self {
            members,
            local,
            edges: FxHashSet::default(),
            edge_list: Vec::new(),
            users: vec![Vec::new(); n],
            desc: vec![Vec::new(); n],
            pkiller: vec![Vec::new(); n],
        };

        for &u in info.interesting() {
            let mut cur = u;
            while cur != SINK {
                // Map killers that are no DVG members (e.g. a killing
                // store or return) to the sink.
                let mut next = killer[cur];
                if dvg.local[next].is_none() {
                    next = SINK;
                }
                if !dvg.insert_edge(cur, next) {
                    // The rest of this chain is already present.
                    break;
                }
                cur = next;
            }
        }

        for &u in info.interesting() {
            let deps: Vec<_> = f.deps(info.node(u)).to_vec();
            for dep in deps {
                if let Some(dv) = info.vid(dep) {
                    if dvg.local[dv].is_some() && !dvg.edges.contains(&(u, dv)) {
                        dvg.insert_edge(dv, u);
                    }
                }
            }
        }

        dvg.recompute_closure();
        dvg
    }

    fn insert_edge(&mut self, src: Vid, tgt: Vid) -> bool {
        debug_assert!(
            !self.edges.contains(&(tgt, src)),
            "inserting DVG edge ({src}, {tgt}) against an existing reverse edge"
        );
        if self.edges.insert((src, tgt)) {
            self.edge_list.push((src, tgt));
            self.users[src].push(tgt);
            true
        } else {
            false
        }
    }

    /// Append a serialization edge and refresh the derived sets.
    pub fn add_edge(&mut self, src: Vid, tgt: Vid) {
        if self.insert_edge(src, tgt) {
            self.recompute_closure();
        }
    }

    fn recompute_closure(&mut self) {
        for i in 0..self.members.len() {
            let m = self.members[i];
            let mut seen = FxHashSet::default();
            let mut stack: Vec<Vid> = self.users[m].clone();
            while let Some(v) = stack.pop() {
                if seen.insert(v) {
                    stack.extend_from_slice(&self.users[v]);
                }
            }
            debug_assert!(!seen.contains(&m), "DVG contains a cycle through {m}");
            let mut desc: Vec<Vid> = seen.into_iter().collect();
            desc.sort_unstable();
            self.desc[m] = desc;
        }

        // A DVG user w of u is a potential killer of u if no other DVG
        // user of u has w among its descendants.
        for i in 0..self.members.len() {
            let m = self.members[i];
            let users = &self.users[m];
            self.pkiller[m] = users
                .iter()
                .copied()
                .filter(|&w| {
                    !users
                        .iter()
                        .any(|&other| other != w && self.desc[other].binary_search(&w).is_ok())
                })
                .collect();
        }
    }

    /// The member vids, sink last.
    pub fn members(&self) -> &[Vid] {
        &self.members
    }

    /// The sorted DVG descendants of `v`.
    pub fn descendants(&self, v: Vid) -> &[Vid] {
        &self.desc[v]
    }

    /// Binary search in the DVG descendants of `v`.
    pub fn has_descendant(&self, v: Vid, x: Vid) -> bool {
        self.desc[v].binary_search(&x).is_ok()
    }

    /// The DVG potential killers of `v`.
    pub fn pkiller(&self, v: Vid) -> &[Vid] {
        &self.pkiller[v]
    }

    /// Is `(src, tgt)` already a DVG edge?
    pub fn has_edge(&self, src: Vid, tgt: Vid) -> bool {
        self.edges.contains(&(src, tgt))
    }
}

/// The chain partition of a DVG.
pub(crate) struct ChainPartition {
    /// The chains, each a path in the DVG. Chains never start with the
    /// sink; at most one ends with it.
    pub chains: Vec<Vec<Vid>>,
    /// Chain successor and predecessor per vid.
    succ: Vec<Option<Vid>>,
    pred: Vec<Option<Vid>>,
}

impl ChainPartition {
    /// Partition the DVG into a minimum number of chains.
    pub fn compute(dvg: &Dvg) -> Self {
        let n_members = dvg.members.len();
        let mut matcher = BipartiteMatcher::new(n_members, n_members);
        for &(src, tgt) in &dvg.edge_list {
            matcher.add(
                dvg.local[src].expect("edge source is a member"),
                dvg.local[tgt].expect("edge target is a member"),
                1,
            );
        }
        let matching = matcher.solve();

        let n = dvg.local.len();
        let mut succ: Vec<Option<Vid>> = vec![None; n];
        let mut pred: Vec<Option<Vid>> = vec![None; n];
        for (i, &m) in dvg.members.iter().enumerate() {
            if let Some(j) = matching.matched_right(i) {
                let t = dvg.members[j];
                succ[m] = Some(t);
                pred[t] = Some(m);
            }
        }

        let mut chains = Vec::new();
        for &m in &dvg.members {
            if pred[m].is_some() {
                continue;
            }
            let mut chain = vec![m];
            let mut cur = m;
            while let Some(next) = succ[cur] {
                chain.push(next);
                cur = next;
            }
            chains.push(chain);
        }
        Self { chains, succ, pred }
    }

    /// The chain predecessor of `v`.
    pub fn pred(&self, v: Vid) -> Option<Vid> {
        self.pred[v]
    }
}

/// A maximal antichain of the DVG; its size is the register saturation.
///
/// Start from the last value of every chain and, as long as some member
/// still has another member among its DVG descendants, move it towards
/// its chain's head. One value per chain survives, so the size equals
/// the number of chains.
pub(crate) fn maximal_antichain(dvg: &Dvg, chains: &ChainPartition) -> Vec<Vid> {
    let mut v: Vec<Vid> = chains
        .chains
        .iter()
        .filter_map(|chain| {
            let &last = chain.last().expect("chains are never empty");
            if last != SINK {
                Some(last)
            } else if chain.len() > 1 {
                Some(chain[chain.len() - 2])
            } else {
                None
            }
        })
        .collect();

    loop {
        let mut changed = false;
        for i in 0..v.len() {
            let u = v[i];
            let comparable = v.iter().any(|&w| w != u && dvg.has_descendant(u, w));
            if comparable {
                if let Some(p) = chains.pred(u) {
                    v[i] = p;
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FunctionData, Mode};
    use crate::isa::RegClassInfo;
    use crate::satur::killers::select_killers;

    fn int_class() -> RegClassInfo {
        RegClassInfo {
            name: "gp",
            mode: Mode::Int,
            n_regs: 8,
            n_ignore: 0,
            n_abi_ignore: 0,
        }
    }

    /// Two independent chains that merge in a final sum.
    fn two_chain_block() -> (FunctionData, crate::ir::Node) {
        let mut f = FunctionData::new("f");
        let entry = f.entry();
        let a = f.arg(0, Mode::Int);
        let b = f.arg(1, Mode::Int);
        let jmp = f.jmp(entry);
        let blk = f.make_block(&[jmp]);
        let x1 = f.add(blk, a, a);
        let x2 = f.add(blk, x1, a);
        let y1 = f.add(blk, b, b);
        let y2 = f.add(blk, y1, b);
        let s = f.add(blk, x2, y2);
        let mem = f.initial_mem();
        f.ret(blk, mem, &[s]);
        (f, blk)
    }

    #[test]
    fn chains_cover_all_members_exactly_once() {
        let (f, blk) = two_chain_block();
        let info = BlockInfo::compute(&f, blk, &int_class());
        let sel = select_killers(&info);
        let dvg = Dvg::build(&f, &info, &sel.killer);
        let chains = ChainPartition::compute(&dvg);

        let mut seen = FxHashSet::default();
        for chain in &chains.chains {
            for &m in chain {
                assert!(seen.insert(m), "vid {m} appears in two chains");
            }
        }
        assert_eq!(seen.len(), dvg.members().len());
    }

    #[test]
    fn dvg_is_acyclic() {
        let (f, blk) = two_chain_block();
        let info = BlockInfo::compute(&f, blk, &int_class());
        let sel = select_killers(&info);
        let dvg = Dvg::build(&f, &info, &sel.killer);
        for &m in dvg.members() {
            assert!(!dvg.has_descendant(m, m));
            for &w in dvg.descendants(m) {
                assert!(!dvg.has_descendant(w, m));
            }
        }
    }

    #[test]
    fn antichain_has_one_member_per_chain() {
        let (f, blk) = two_chain_block();
        let info = BlockInfo::compute(&f, blk, &int_class());
        let sel = select_killers(&info);
        let dvg = Dvg::build(&f, &info, &sel.killer);
        let chains = ChainPartition::compute(&dvg);
        let antichain = maximal_antichain(&dvg, &chains);

        assert_eq!(antichain.len(), chains.chains.len());
        for (i, chain) in chains.chains.iter().enumerate() {
            let members = antichain
                .iter()
                .filter(|v| chain.contains(v))
                .count();
            assert_eq!(members, 1, "chain {i} must contribute one member");
        }
        // No member may descend from another through an upward swap's
        // own chain; residual comparabilities across chains are what the
        // serialization costs measure.
        assert!(antichain.iter().all(|&v| v != SINK));
    }
}
