//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::analysis::ControlFlowGraph;
use crate::ir::{Block, Func, InstData, Module, Value};
use crate::transforms::stm::{AccessSet, ReserveStats};
use crate::utility::{SaHashMap, SaHashSet};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

type AddressSet = BTreeSet<Value>;

/// The set of argument positions of one call site whose addresses the
/// caller's boundary block reserved, split by kind. A callee may only
/// compress a formal parameter out of its own blocks when the position
/// is in here.
pub(super) type ReservedIndices = BTreeSet<usize>;

/// Drives the second phase of the pass: a reverse data-flow walk over each
/// function's CFG that removes accesses already reserved by every incoming
/// path, recursing into callees at call-boundary blocks.
///
/// Both recursions are guarded: a function is compressed at most once (the
/// first caller's view wins, the same policy the analysis worklist applies),
/// and a block whose walk is still on the stack contributes nothing when a
/// CFG back edge reaches it again.
pub(super) struct Compressor<'a> {
    module: &'a Module,
    block_sets: &'a mut BTreeMap<Block, AccessSet>,
    call_boundaries: &'a SaHashSet<Block>,
    stats: &'a mut ReserveStats,
    cfgs: SaHashMap<Func, ControlFlowGraph>,
    compressed: SaHashSet<Func>,
    collecting: SaHashSet<Block>,
    collected: SaHashMap<Block, (AddressSet, AddressSet)>,
}

impl<'a> Compressor<'a> {
    pub(super) fn new(
        module: &'a Module,
        block_sets: &'a mut BTreeMap<Block, AccessSet>,
        call_boundaries: &'a SaHashSet<Block>,
        stats: &'a mut ReserveStats,
    ) -> Self {
        Self {
            module,
            block_sets,
            call_boundaries,
            stats,
            cfgs: SaHashMap::default(),
            compressed: SaHashSet::default(),
            collecting: SaHashSet::default(),
            collected: SaHashMap::default(),
        }
    }

    /// Compresses one function, given the argument positions its (first
    /// observed) caller reserved.
    ///
    /// Formal parameters at reserved positions are removed from every block
    /// of the function, then the CFG walk runs from each `ret` block. The
    /// root transaction is compressed with both index sets empty: nobody
    /// reserves on its behalf.
    pub(super) fn compress_function(
        &mut self,
        func: Func,
        reserved_loads: &ReservedIndices,
        reserved_stores: &ReservedIndices,
    ) {
        if !self.compressed.insert(func) {
            return;
        }

        let f = self.module.function(func);

        debug!("compressing function `{}`", f.name());

        let params: Vec<Value> = f.params().to_vec();
        let blocks: Vec<Block> = f.blocks().to_vec();

        for (i, &param) in params.iter().enumerate() {
            let load_reserved = reserved_loads.contains(&i);
            let store_reserved = reserved_stores.contains(&i);

            if !load_reserved && !store_reserved {
                continue;
            }

            for &bb in &blocks {
                if let Some(set) = self.block_sets.get_mut(&bb) {
                    if load_reserved {
                        set.compress_with_prior_load(param, self.stats);
                    }

                    if store_reserved {
                        set.compress_with_prior_store(param, self.stats);
                    }
                }
            }
        }

        // walk backwards from every returning block; functions that never
        // return still get a walk from their layout-terminal block. Each
        // exit's walk starts from scratch, shared prefixes are served from
        // the `collected` cache.
        let mut exits: Vec<Block> = blocks
            .iter()
            .copied()
            .filter(|&bb| {
                matches!(
                    self.module.block(bb).insts().last().map(|&inst| self.module.inst_data(inst)),
                    Some(InstData::Ret(_))
                )
            })
            .collect();

        if exits.is_empty() {
            exits.extend(f.terminal_block());
        }

        if !exits.is_empty() && !self.cfgs.contains_key(&func) {
            let cfg = ControlFlowGraph::compute(self.module, func);

            self.cfgs.insert(func, cfg);
        }

        for exit in exits {
            let mut loads = AddressSet::new();
            let mut stores = AddressSet::new();

            self.collect(exit, &mut loads, &mut stores);
        }
    }

    /// The reverse CFG walk. On return, `loads`/`stores` hold everything
    /// reserved on every path through `block`, including the block's own
    /// residual set; the block's access set has been compressed against
    /// what its predecessors reserved.
    fn collect(&mut self, block: Block, loads: &mut AddressSet, stores: &mut AddressSet) {
        debug_assert!(loads.is_empty() && stores.is_empty());

        if let Some((prior_loads, prior_stores)) = self.collected.get(&block) {
            loads.extend(prior_loads.iter().copied());
            stores.extend(prior_stores.iter().copied());

            return;
        }

        // a back edge: the block is still being walked further down the
        // stack, it contributes nothing on re-entry
        if !self.collecting.insert(block) {
            return;
        }

        let func = self.module.block(block).func();
        let preds: Vec<Block> = self.cfgs[&func].predecessors(block).collect();

        for (i, &pred) in preds.iter().enumerate() {
            if i == 0 {
                self.collect(pred, loads, stores);
            } else {
                let mut pred_loads = AddressSet::new();
                let mut pred_stores = AddressSet::new();

                self.collect(pred, &mut pred_loads, &mut pred_stores);

                // a value is reserved on entry only if every incoming path
                // reserved it; a store reservation on one path covers a
                // load on the other
                let new_loads: AddressSet = pred_loads
                    .intersection(loads)
                    .chain(pred_loads.intersection(stores))
                    .chain(pred_stores.intersection(loads))
                    .copied()
                    .collect();
                let new_stores: AddressSet =
                    pred_stores.intersection(stores).copied().collect();

                *loads = new_loads;
                *stores = new_stores;
            }
        }

        if let Some(set) = self.block_sets.get_mut(&block) {
            set.compress(loads, stores, self.stats);
            set.compress_phi_nodes(self.module, self.stats);
        }

        if self.call_boundaries.contains(&block) {
            self.compress_callee_of(block);
        }

        // export the residual set on top of what was inherited; successors
        // see both
        if let Some(set) = self.block_sets.get(&block) {
            set.copy_loads(loads);
            set.copy_stores(stores);
        }

        self.collecting.remove(&block);
        self.collected.insert(block, (loads.clone(), stores.clone()));
    }

    /// Reads the call leading a call-boundary block, works out which
    /// argument positions the block actually reserved (against its frozen
    /// snapshot), and recurses into the callee with those index sets.
    fn compress_callee_of(&mut self, block: Block) {
        let first = *self
            .module
            .block(block)
            .insts()
            .first()
            .expect("call-boundary block with no instructions");

        let call = match self.module.inst_data(first) {
            InstData::Call(call) => call.clone(),
            _ => panic!(
                "call-boundary block `{}` does not start with a call",
                self.module.block(block).name()
            ),
        };

        let mut reserved_loads = ReservedIndices::new();
        let mut reserved_stores = ReservedIndices::new();

        if let Some(set) = self.block_sets.get(&block) {
            for (i, &arg) in call.args().iter().enumerate() {
                if set.contains_load(arg) {
                    reserved_loads.insert(i);
                }

                if set.contains_store(arg) {
                    reserved_stores.insert(i);
                }
            }
        }

        self.compress_function(call.callee(), &reserved_loads, &reserved_stores);
    }
}
