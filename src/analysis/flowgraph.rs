//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::ir::{Block, Func, Module};
use slotmap::SecondaryMap;
use smallvec::SmallVec;

#[derive(Default, Clone)]
struct CFGNodeData {
    predecessors: SmallVec<[Block; 4]>,
    successors: SmallVec<[Block; 4]>,
}

/// Models successor/predecessor information about the control-flow graph of
/// a given function.
///
/// Edge lists are kept in a deterministic order: blocks contribute their
/// out-edges in layout order, and a block's successors appear in terminator
/// target order. Analyses that fold over predecessors therefore produce
/// reproducible results.
pub struct ControlFlowGraph {
    nodes: SecondaryMap<Block, CFGNodeData>,
}

impl ControlFlowGraph {
    /// Directly computes flowgraph information for a given function.
    ///
    /// The graph is a snapshot: it does not observe blocks split or
    /// instructions inserted after it was computed.
    pub fn compute(module: &Module, func: Func) -> Self {
        let mut nodes = SecondaryMap::default();

        for &block in module.function(func).blocks() {
            // make sure that any block we see at least gets an empty node,
            // even if it has no edges at all
            nodes
                .entry(block)
                .unwrap()
                .or_insert_with(CFGNodeData::default);

            let terminator = match module.block(block).insts().last() {
                Some(&inst) => inst,
                None => continue,
            };

            let targets: SmallVec<[Block; 2]> =
                SmallVec::from_slice(module.inst_data(terminator).targets());

            for target in targets {
                Self::add_edge(&mut nodes, block, target);
            }
        }

        Self { nodes }
    }

    /// Returns an iterator over the predecessors for a given block.
    pub fn predecessors(&self, block: Block) -> impl Iterator<Item = Block> + '_ {
        self.data_of(block).predecessors.iter().copied()
    }

    /// Returns an iterator over the successors for a given block.
    pub fn successors(&self, block: Block) -> impl Iterator<Item = Block> + '_ {
        self.data_of(block).successors.iter().copied()
    }

    /// Checks if a given block `pred` is a predecessor of `block`
    pub fn is_pred_of(&self, block: Block, pred: Block) -> bool {
        self.data_of(block).predecessors.contains(&pred)
    }

    /// Checks if a given block `succ` is a successor of `block`
    pub fn is_succ_of(&self, block: Block, succ: Block) -> bool {
        self.data_of(block).successors.contains(&succ)
    }

    fn add_edge(nodes: &mut SecondaryMap<Block, CFGNodeData>, from: Block, to: Block) {
        let node = nodes.entry(from).unwrap().or_insert_with(CFGNodeData::default);

        if !node.successors.contains(&to) {
            node.successors.push(to);
        }

        let node = nodes.entry(to).unwrap().or_insert_with(CFGNodeData::default);

        if !node.predecessors.contains(&from) {
            node.predecessors.push(from);
        }
    }

    fn data_of(&self, block: Block) -> &CFGNodeData {
        self.nodes
            .get(block)
            .expect("block is not part of the computed function")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::*;
    use std::iter;

    #[test]
    fn one_block() {
        let mut m = Module::new("test");
        let mut b = m.define_function("main", SigBuilder::new().build());

        // fn void @main() {
        // entry:
        //   ret void
        // }
        let entry = b.create_block("entry");
        b.switch_to(entry);
        b.append().ret_void();

        let f = b.define();
        let cfg = ControlFlowGraph::compute(&m, f);

        assert_eq!(cfg.predecessors(entry).next(), None);
        assert_eq!(cfg.successors(entry).next(), None);
    }

    #[test]
    fn merge() {
        let mut m = Module::new("test");
        let mut b = m.define_function("main", SigBuilder::new().param("c", Type::bool()).build());
        let cond = b.func_params()[0];

        //
        // fn void @main(bool %c) {
        // entry:
        //   condbr bool %c, if.true, otherwise
        //
        // if.true:
        //   br merge
        //
        // otherwise:
        //   br merge
        //
        // merge:
        //   ret void
        // }
        //
        let entry = b.create_block("entry");
        let if_true = b.create_block("if.true");
        let otherwise = b.create_block("otherwise");
        let merge = b.create_block("merge");

        b.switch_to(entry);
        b.append().condbr(cond, if_true, otherwise);

        b.switch_to(if_true);
        b.append().br(merge);

        b.switch_to(otherwise);
        b.append().br(merge);

        b.switch_to(merge);
        b.append().ret_void();

        let f = b.define();
        let cfg = ControlFlowGraph::compute(&m, f);

        assert_eq!(cfg.predecessors(entry).next(), None);
        assert!(cfg.is_pred_of(if_true, entry));
        assert!(cfg.is_pred_of(otherwise, entry));
        assert!(cfg.is_pred_of(merge, if_true));
        assert!(cfg.is_pred_of(merge, otherwise));
        assert!(cfg.is_succ_of(entry, if_true));
        assert!(cfg.is_succ_of(entry, otherwise));
        assert!(cfg.successors(if_true).eq(iter::once(merge)));
        assert!(cfg.successors(otherwise).eq(iter::once(merge)));
        assert_eq!(cfg.successors(merge).next(), None);

        // predecessor order is layout order
        assert!(cfg.predecessors(merge).eq([if_true, otherwise]));
    }

    #[test]
    fn infinite_loop() {
        let mut m = Module::new("test");
        let mut b = m.define_function("main", SigBuilder::new().build());

        //
        // fn void @main() {
        // entry:
        //   br entry
        // }
        //
        let entry = b.create_block("entry");
        b.switch_to(entry);
        b.append().br(entry);

        let f = b.define();
        let cfg = ControlFlowGraph::compute(&m, f);

        assert!(cfg.predecessors(entry).eq(iter::once(entry)));
        assert!(cfg.successors(entry).eq(iter::once(entry)));
    }

    #[test]
    fn split_updates_on_recompute() {
        let mut m = Module::new("test");
        let g = m.define_global("g");
        let mut b = m.define_function("main", SigBuilder::new().build());

        let entry = b.create_block("entry");
        b.switch_to(entry);
        let v = b.append().load(Type::i32(), g);
        b.append().store(v, g);
        b.append().ret_void();

        let f = b.define();
        let tail = m.split_block(entry, 1);
        let cfg = ControlFlowGraph::compute(&m, f);

        assert!(cfg.successors(entry).eq(iter::once(tail)));
        assert!(cfg.predecessors(tail).eq(iter::once(entry)));
    }
}
