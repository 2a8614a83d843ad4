//! Per-block, per-register-class value information.
//!
//! The saturation analysis works on one block at a time with a dense
//! local numbering: every in-block node that participates gets a [`Vid`],
//! and one extra vid, the *sink*, stands for everything that happens
//! after the block (all out-of-block users of in-block values).
//!
//! For each node two relations are computed:
//!
//! - **consumers**: the in-block, non-ignore users. A tuple-mode user is
//!   unwrapped to its projections; any out-of-block user marks the value
//!   live-out and is represented by the sink.
//! - **descendants**: the transitive closure of the consumer relation.
//!
//! Both are kept as sorted vid arrays so the killer analysis can do its
//! subset tests with binary searches.

use crate::fx::FxHashMap;
use crate::ir::{FunctionData, Mode, Node, Opcode};
use crate::isa::RegClassInfo;

/// Dense per-block node index.
pub(crate) type Vid = usize;

/// The vid of the sink.
pub(crate) const SINK: Vid = 0;

struct VidData {
    /// The IR node; `None` only for the sink.
    node: Option<Node>,
    consumers: Vec<Vid>,
    descendants: Vec<Vid>,
    live_out: bool,
}

/// The value information of one block for one register class.
pub(crate) struct BlockInfo {
    block: Node,
    data: Vec<VidData>,
    vid_of: FxHashMap<Node, Vid>,
    interesting: Vec<Vid>,
}

impl BlockInfo {
    /// Compute the information for `block` restricted to values of
    /// `cls`.
    pub fn compute(f: &FunctionData, block: Node, cls: &RegClassInfo) -> Self {
        let mut info = Self {
            block,
            data: vec![VidData {
                node: None,
                consumers: Vec::new(),
                descendants: Vec::new(),
                live_out: false,
            }],
            vid_of: FxHashMap::default(),
            interesting: Vec::new(),
        };

        // The interesting values: in-block producers of the class's mode,
        // tuples and ABI helpers excluded.
        for n in f.nodes_in(block) {
            if f.mode(n) == cls.mode && f.mode(n).is_data() && !f.is_ignore(n) {
                let v = info.intern(n);
                info.interesting.push(v);
            }
        }

        // Consumers, for every node the consumer chains reach.
        let mut queue: Vec<Vid> = info.interesting.clone();
        let mut queued = vec![false; info.data.len()];
        for &v in &queue {
            queued[v] = true;
        }
        while let Some(v) = queue.pop() {
            let consumers = info.collect_consumers(f, v);
            for &c in &consumers {
                if c >= queued.len() {
                    queued.resize(info.data.len(), false);
                }
                if c != SINK && !queued[c] {
                    queued[c] = true;
                    queue.push(c);
                }
            }
            info.data[v].consumers = consumers;
        }

        // Descendants, bottom-up over the consumer DAG.
        let order: Vec<Vid> = (1..info.data.len()).collect();
        for v in order {
            info.compute_descendants(v);
        }
        info
    }

    fn intern(&mut self, n: Node) -> Vid {
        if let Some(&v) = self.vid_of.get(&n) {
            return v;
        }
        let v = self.data.len();
        self.data.push(VidData {
            node: Some(n),
            consumers: Vec::new(),
            descendants: Vec::new(),
            live_out: false,
        });
        self.vid_of.insert(n, v);
        v
    }

    fn collect_consumers(&mut self, f: &FunctionData, v: Vid) -> Vec<Vid> {
        let n = self.data[v].node.expect("sink has no consumers");
        let mut consumers = Vec::new();
        let users: Vec<Node> = f.outs(n).to_vec();
        for user in users {
            if f.block_of(user) != Some(self.block) {
                self.data[v].live_out = true;
                consumers.push(SINK);
            } else if f.is_ignore(user) {
                continue;
            } else if f.mode(user) == Mode::T {
                // A tuple consumes the value on behalf of its
                // projections.
                let projs: Vec<Node> = f.outs(user).to_vec();
                for p in projs {
                    if f.opcode(p) != Opcode::Proj || f.is_ignore(p) {
                        continue;
                    }
                    if f.block_of(p) == Some(self.block) {
                        consumers.push(self.intern(p));
                    } else {
                        self.data[v].live_out = true;
                        consumers.push(SINK);
                    }
                }
            } else {
                consumers.push(self.intern(user));
            }
        }
        consumers.sort_unstable();
        consumers.dedup();
        consumers
    }

    fn compute_descendants(&mut self, v: Vid) -> Vec<Vid> {
        if !self.data[v].descendants.is_empty() || v == SINK {
            return self.data[v].descendants.clone();
        }
        let consumers = self.data[v].consumers.clone();
        // The block exit follows every operation, so the sink is a
        // descendant of every node.
        let mut desc = vec![SINK];
        for c in consumers {
            desc.push(c);
            desc.extend(self.compute_descendants(c));
        }
        desc.sort_unstable();
        desc.dedup();
        self.data[v].descendants = desc.clone();
        desc
    }

    /// The block this information describes.
    pub fn block(&self) -> Node {
        self.block
    }

    /// The number of vids, including the sink.
    pub fn n_vids(&self) -> usize {
        self.data.len()
    }

    /// The interesting values, in block order.
    pub fn interesting(&self) -> &[Vid] {
        &self.interesting
    }

    /// The IR node behind `v`. Panics for the sink.
    pub fn node(&self, v: Vid) -> Node {
        self.data[v].node.expect("the sink has no IR node")
    }

    /// The vid of `n`, if `n` was interned.
    pub fn vid(&self, n: Node) -> Option<Vid> {
        self.vid_of.get(&n).copied()
    }

    /// The sorted consumers of `v`.
    pub fn consumers(&self, v: Vid) -> &[Vid] {
        &self.data[v].consumers
    }

    /// The sorted descendants of `v`.
    pub fn descendants(&self, v: Vid) -> &[Vid] {
        &self.data[v].descendants
    }

    /// Binary search in the descendants of `v`.
    pub fn has_descendant(&self, v: Vid, x: Vid) -> bool {
        self.data[v].descendants.binary_search(&x).is_ok()
    }

    /// Does any out-of-block user see `v`?
    pub fn is_live_out(&self, v: Vid) -> bool {
        self.data[v].live_out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Mode, ProjKind};
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
    fn consumers_and_descendants_of_a_chain() {
        let mut f = FunctionData::new("f");
        let entry = f.entry();
        let a = f.arg(0, Mode::Int);
        let jmp = f.jmp(entry);
        let b = f.make_block(&[jmp]);
        let x = f.add(b, a, a);
        let y = f.add(b, x, a);
        let mem = f.initial_mem();
        let ret = f.ret(b, mem, &[y]);

        let info = BlockInfo::compute(&f, b, &int_class());
        assert_eq!(info.interesting().len(), 2);

        let vx = *info.vid_of.get(&x).unwrap();
        let vy = *info.vid_of.get(&y).unwrap();
        let vret = *info.vid_of.get(&ret).unwrap();
        assert_eq!(info.consumers(vx), &[vy]);
        assert_eq!(info.consumers(vy), &[vret]);
        // The return is consumed by the end block, i.e. by the sink.
        assert_eq!(info.consumers(vret), &[SINK]);
        assert!(info.is_live_out(vret));
        assert!(info.has_descendant(vx, vy));
        assert!(info.has_descendant(vx, vret));
        assert!(info.has_descendant(vx, SINK));
        assert!(!info.has_descendant(vy, vx));
    }

    #[test]
    fn tuples_are_unwrapped_to_projections() {
        let mut f = FunctionData::new("f");
        let entry = f.entry();
        let jmp = f.jmp(entry);
        let b = f.make_block(&[jmp]);
        let addr = f.arg(0, Mode::Int);
        let mem = f.initial_mem();
        let x = f.add(b, addr, addr);
        let load = f.load(b, mem, x, false);
        let load_m = f.proj(load, Mode::M, ProjKind::Mem);
        let load_v = f.proj(load, Mode::Int, ProjKind::Res(0));
        f.ret(b, load_m, &[load_v]);

        let info = BlockInfo::compute(&f, b, &int_class());
        let vx = *info.vid_of.get(&x).unwrap();
        // x is consumed by the load's projections, not the load itself.
        let cons = info.consumers(vx);
        assert!(cons.contains(&info.vid_of[&load_m]));
        assert!(cons.contains(&info.vid_of[&load_v]));
        assert!(!info.vid_of.contains_key(&load));
    }

    #[test]
    fn out_of_block_users_become_the_sink() {
        let mut f = FunctionData::new("f");
        let entry = f.entry();
        let jmp = f.jmp(entry);
        let b1 = f.make_block(&[jmp]);
        let a = f.arg(0, Mode::Int);
        let x = f.add(b1, a, a);
        let jmp1 = f.jmp(b1);
        let b2 = f.make_block(&[jmp1]);
        let y = f.add(b2, x, x);
        let mem = f.initial_mem();
        f.ret(b2, mem, &[y]);

        let info = BlockInfo::compute(&f, b1, &int_class());
        let vx = *info.vid_of.get(&x).unwrap();
        assert_eq!(info.consumers(vx), &[SINK]);
        assert!(info.is_live_out(vx));
    }
}
