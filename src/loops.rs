//! Control-flow loop detection.
//!
//! The property solver only needs one bit from loop analysis: does a
//! procedure contain a control-flow cycle at all? A const call that sits
//! inside such a procedure may never terminate and therefore must not be
//! hoisted. The full nesting structure is irrelevant here, so this is a
//! plain back-edge search over the block graph.

use crate::fx::FxHashMap;
use crate::ir::{FunctionData, Node};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Grey,
    Black,
}

/// Does the block graph of `f` contain a cycle?
pub fn has_cfg_loop(f: &FunctionData) -> bool {
    // Successor lists, derived from the control-flow predecessors.
    let mut succs: FxHashMap<Node, Vec<Node>> = FxHashMap::default();
    let blocks: Vec<Node> = f.blocks().collect();
    for &block in &blocks {
        for &pred in f.cfg_preds(block) {
            if let Some(src) = f.block_of(pred) {
                succs.entry(src).or_default().push(block);
            }
        }
    }

    let mut color: FxHashMap<Node, Color> = blocks.iter().map(|&b| (b, Color::White)).collect();
    for &root in &blocks {
        if color[&root] != Color::White {
            continue;
        }
        // Iterative DFS; a grey successor is a back edge.
        let mut stack = vec![(root, 0usize)];
        color.insert(root, Color::Grey);
        while let Some(&(block, next)) = stack.last() {
            let block_succs = succs.get(&block).map(Vec::as_slice).unwrap_or(&[]);
            if next < block_succs.len() {
                stack.last_mut().unwrap().1 += 1;
                let succ = block_succs[next];
                match color[&succ] {
                    Color::Grey => return true,
                    Color::White => {
                        color.insert(succ, Color::Grey);
                        stack.push((succ, 0));
                    }
                    Color::Black => {}
                }
            } else {
                color.insert(block, Color::Black);
                stack.pop();
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_line_has_no_loop() {
        let mut f = FunctionData::new("f");
        let entry = f.entry();
        let jmp = f.jmp(entry);
        let b1 = f.make_block(&[jmp]);
        let mem = f.initial_mem();
        f.ret(b1, mem, &[]);
        assert!(!has_cfg_loop(&f));
    }

    #[test]
    fn back_edge_is_detected() {
        let mut f = FunctionData::new("f");
        let entry = f.entry();
        let jmp = f.jmp(entry);
        let header = f.make_block(&[jmp]);
        let latch_jmp = f.jmp(header);
        f.add_block_pred(header, latch_jmp);
        let mem = f.initial_mem();
        f.ret(header, mem, &[]);
        assert!(has_cfg_loop(&f));
    }
}
