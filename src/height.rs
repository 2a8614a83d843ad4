//! Heights of nodes inside one block.
//!
//! The height of a node is the length of the longest path from it to the
//! block's sink in the data-dependency graph, augmented by any explicit
//! serialization dependencies. Nodes without in-block successors have
//! height 0. Serialization uses heights to price the critical-path cost
//! of a new dependency edge and to test admissibility (`reachable`).

use crate::fx::{FxHashMap, FxHashSet};
use crate::ir::{FunctionData, Node};

/// Heights for the nodes of one block.
pub struct BlockHeights {
    block: Node,
    height: FxHashMap<Node, u32>,
    max: u32,
}

impl BlockHeights {
    /// Compute heights for `block`.
    pub fn compute(f: &FunctionData, block: Node) -> Self {
        let mut heights = Self {
            block,
            height: FxHashMap::default(),
            max: 0,
        };
        heights.recompute(f);
        heights
    }

    /// Recompute all heights, e.g. after a dependency edge was added.
    pub fn recompute(&mut self, f: &FunctionData) {
        self.height.clear();
        self.max = 0;
        let nodes: Vec<Node> = f.nodes_in(self.block).collect();
        for n in nodes {
            let h = self.compute_height(f, n);
            self.max = self.max.max(h);
        }
    }

    fn compute_height(&mut self, f: &FunctionData, n: Node) -> u32 {
        if let Some(&h) = self.height.get(&n) {
            return h;
        }
        let mut h = 0;
        for &succ in f.outs(n) {
            if f.block_of(succ) == Some(self.block) {
                h = h.max(1 + self.compute_height(f, succ));
            }
        }
        self.height.insert(n, h);
        h
    }

    /// The height of `n`. Nodes outside the block have height 0.
    pub fn height(&self, n: Node) -> u32 {
        self.height.get(&n).copied().unwrap_or(0)
    }

    /// The largest height in the block.
    pub fn max_height(&self) -> u32 {
        self.max
    }

    /// Is there a path from `a` to `b` inside the block, following data
    /// edges and explicit dependencies?
    pub fn reachable(&self, f: &FunctionData, a: Node, b: Node) -> bool {
        if a == b {
            return true;
        }
        let mut seen = FxHashSet::default();
        let mut stack = vec![a];
        while let Some(n) = stack.pop() {
            for &succ in f.outs(n) {
                if f.block_of(succ) != Some(self.block) {
                    continue;
                }
                if succ == b {
                    return true;
                }
                if seen.insert(succ) {
                    stack.push(succ);
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_heights() {
        let mut f = FunctionData::new("f");
        let entry = f.entry();
        let a = f.arg(0, crate::ir::Mode::Int);
        let b = f.add(entry, a, a);
        let c = f.add(entry, b, b);
        let heights = BlockHeights::compute(&f, entry);
        // c has no in-block users, b feeds c, a feeds b.
        assert_eq!(heights.height(c), 0);
        assert_eq!(heights.height(b), 1);
        assert_eq!(heights.height(a), 2);
        assert!(heights.max_height() >= 2);
        assert!(heights.reachable(&f, a, c));
        assert!(!heights.reachable(&f, c, a));
    }

    #[test]
    fn dependency_edges_count() {
        let mut f = FunctionData::new("f");
        let entry = f.entry();
        let a = f.arg(0, crate::ir::Mode::Int);
        let b = f.arg(1, crate::ir::Mode::Int);
        let x = f.add(entry, a, a);
        let y = f.add(entry, b, b);
        let mut heights = BlockHeights::compute(&f, entry);
        assert!(!heights.reachable(&f, x, y));
        f.add_dep(y, x);
        heights.recompute(&f);
        assert!(heights.reachable(&f, x, y));
        assert!(heights.height(x) > heights.height(y));
    }
}
