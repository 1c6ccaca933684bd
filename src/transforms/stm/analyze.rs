//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::ir::{Block, Func, InstData, Module, Value};
use crate::transforms::stm::{AccessSet, ReserveContext};
use log::trace;

/// Adds `func` to the analysis worklist unless it has ever been enqueued
/// before. Functions are analyzed at most once, which is what bounds the
/// pass on recursive call graphs.
pub(super) fn enqueue(ctx: &mut ReserveContext, func: Func) {
    if ctx.enqueued.insert(func) {
        ctx.queue.push_back(func);
    }
}

/// Analyzes one basic block: walks its instructions, collects every named
/// address it loads from or stores to, and records the result under the
/// block.
///
/// Blocks are split at two kinds of boundary while walking:
///
/// - a call that is not the block's first instruction is pushed into a
///   fresh tail block, so that every call ends up *leading* a block (a
///   "call-boundary block"),
/// - everything following an `alloca` is pushed into a fresh tail block,
///   isolating the stack allocation so a later escape-aware filter can
///   treat it separately.
///
/// Tail blocks created by splitting are analyzed by direct recursion;
/// every block is analyzed at most once.
pub(super) fn analyze_block(ctx: &mut ReserveContext, module: &mut Module, block: Block) {
    if !ctx.analyzed.insert(block) {
        return;
    }

    trace!("analyzing block `{}`", module.block(block).name());

    let mut set = AccessSet::new();
    let insts = module.block(block).insts().to_vec();

    for (idx, &inst) in insts.iter().enumerate() {
        let data = module.inst_data(inst).clone();

        match data {
            InstData::Load(load) => {
                record_load(ctx, module, &mut set, load.pointer());
            }
            InstData::Store(store) => {
                ctx.stats.stores += 1;

                let addr = store.pointer();

                if module.value_has_name(addr) {
                    if !set.insert_store(module, addr, &mut ctx.stats) {
                        ctx.stats.stores_skipped += 1;
                    }
                } else {
                    ctx.stats.stores_unprocessed += 1;
                }
            }
            InstData::Call(call) => {
                if idx != 0 {
                    // push the call (and everything after it) into its own
                    // block and deal with it there
                    let tail = module.split_block(block, idx);

                    analyze_block(ctx, module, tail);
                } else {
                    // the call leads this block: its arguments are handed to
                    // the callee, which reads them, so they count as loads
                    for &arg in call.args() {
                        ctx.stats.loads_from_calls += 1;

                        record_load(ctx, module, &mut set, arg);
                    }

                    ctx.call_boundaries.insert(block);
                    enqueue(ctx, call.callee());

                    if idx + 1 < insts.len() {
                        let tail = module.split_block(block, idx + 1);

                        analyze_block(ctx, module, tail);
                    }
                }

                break;
            }
            InstData::IndirectCall(_) => {
                panic!(
                    "indirect call in transactional code (block `{}`), the reservation \
                     analysis only supports calls to known functions",
                    module.block(block).name()
                );
            }
            InstData::Alloca(_) => {
                if idx + 1 < insts.len() {
                    let tail = module.split_block(block, idx + 1);

                    analyze_block(ctx, module, tail);
                }

                break;
            }
            // arithmetic, compares, φs, casts, terminators: observed
            // but not recorded
            _ => {}
        }
    }

    if !set.is_empty() {
        set.freeze();
        ctx.block_sets.insert(block, set);
    }
}

fn record_load(ctx: &mut ReserveContext, module: &Module, set: &mut AccessSet, addr: Value) {
    ctx.stats.loads += 1;

    if module.value_has_name(addr) {
        if !set.insert_load(module, addr, &mut ctx.stats) {
            ctx.stats.loads_skipped += 1;
        }
    } else {
        ctx.stats.loads_unprocessed += 1;
    }
}
