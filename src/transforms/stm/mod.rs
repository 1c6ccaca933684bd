//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Whole-program instrumentation for software transactional memory.
//!
//! Transactional entry functions are discovered by name, every block
//! reachable through direct calls is analyzed for the set of addresses it
//! may load from or store to, the per-block sets are compressed against
//! what dominating predecessors and enclosing callers already reserved,
//! and each block that still has residual accesses gets a single call to
//! the `stm_reserve` runtime helper inserted at its head. The runtime can
//! then make one bulk reservation per block instead of taking a barrier
//! per access.

mod access_set;
mod analyze;
mod compress;
mod escape;
mod stats;

pub use access_set::AccessSet;
pub use escape::EscapeMap;
pub use stats::ReserveStats;

use crate::ir::{Block, Func, Module, Type, Value};
use crate::pass::{ModuleTransformPass, PreservedAnalyses};
use crate::transforms::stm::compress::{Compressor, ReservedIndices};
use crate::utility::SaHashSet;
use log::{debug, trace};
use std::collections::{BTreeMap, VecDeque};

/// The name of the runtime helper the pass emits calls to. Resolved in the
/// module by name; declared as `void stm_reserve(i32, ...)` if absent.
pub const RESERVE_SYMBOL: &str = "stm_reserve";

/// A function whose name contains this substring is *the* transactional
/// root; the first match wins and ends the scan.
pub const ROOT_MARKER: &str = "tx";

/// A function whose name contains this substring is an auxiliary
/// transactional root; it is analyzed, and stands in as the root if no
/// [`ROOT_MARKER`] function exists.
pub const AUX_ROOT_MARKER: &str = "foo";

/// Everything the pass accumulates over one module: per-block access sets,
/// the call-boundary blocks, the function worklist, the escape stub and the
/// counters. Created at pass entry, dropped at pass exit.
#[derive(Default)]
struct ReserveContext {
    block_sets: BTreeMap<Block, AccessSet>,
    call_boundaries: SaHashSet<Block>,
    analyzed: SaHashSet<Block>,
    queue: VecDeque<Func>,
    enqueued: SaHashSet<Func>,
    escape: EscapeMap,
    stats: ReserveStats,
}

impl ReserveContext {
    fn new() -> Self {
        Self::default()
    }
}

/// Instruments a module for software transactional memory.
///
/// Returns whether any reservation call was inserted, along with the
/// counters of the run.
pub fn instrument_reservations(module: &mut Module) -> (bool, ReserveStats) {
    let mut ctx = ReserveContext::new();

    let root = match discover_roots(&mut ctx, module) {
        Some(root) => root,
        None => {
            trace!("module `{}` has no transactional roots", module.name());

            return (false, ctx.stats);
        }
    };

    // every global may be visible to other transactions; a global accessed
    // by a single transaction could be exempted, but nothing narrows the
    // map yet
    for &global in module.globals() {
        ctx.escape.mark(global, true);
    }

    while let Some(func) = ctx.queue.pop_front() {
        debug!("analyzing function `{}`", module.function(func).name());

        let blocks = module.function(func).blocks().to_vec();

        for block in blocks {
            analyze::analyze_block(&mut ctx, module, block);
        }
    }

    // compressing the root transaction recursively compresses everything
    // it calls
    let mut compressor = Compressor::new(
        module,
        &mut ctx.block_sets,
        &ctx.call_boundaries,
        &mut ctx.stats,
    );

    compressor.compress_function(root, &ReservedIndices::new(), &ReservedIndices::new());

    let changed = instrument(module, &ctx.block_sets);

    (changed, ctx.stats)
}

/// The STM reservation instrumentation pass. See [`instrument_reservations`]
/// for what it does; the pass form keeps the counters of the last run
/// around for inspection.
#[derive(Default)]
pub struct StmReservePass {
    stats: ReserveStats,
}

impl StmReservePass {
    /// Creates the pass.
    pub fn new() -> Self {
        Self::default()
    }

    /// The counters accumulated by the most recent run.
    pub fn stats(&self) -> &ReserveStats {
        &self.stats
    }
}

impl ModuleTransformPass for StmReservePass {
    fn run(&mut self, module: &mut Module) -> PreservedAnalyses {
        let (changed, stats) = instrument_reservations(module);

        self.stats = stats;

        if changed {
            PreservedAnalyses::none()
        } else {
            PreservedAnalyses::all()
        }
    }
}

/// Scans the function table for transactional roots and enqueues them.
/// Returns the root transaction: the first `"tx"` function, or failing
/// that, the last `"foo"` function.
fn discover_roots(ctx: &mut ReserveContext, module: &Module) -> Option<Func> {
    let mut root = None;

    for func in module.functions() {
        let name = module.function(func).name();

        if name.contains(AUX_ROOT_MARKER) {
            analyze::enqueue(ctx, func);
            root = Some(func);
        }

        if name.contains(ROOT_MARKER) {
            analyze::enqueue(ctx, func);
            root = Some(func);

            break;
        }
    }

    root
}

/// Materializes one `stm_reserve` call per block with a non-empty residual
/// access set.
///
/// The argument vector is `[num_args, num_loads, L..., num_stores, S...]`
/// with `num_args = 2 + num_loads + num_stores`, lengths encoded as 32-bit
/// signed constants. The call lands after the block's leading φs, before
/// everything else; no existing instruction is touched.
fn instrument(module: &mut Module, block_sets: &BTreeMap<Block, AccessSet>) -> bool {
    let mut planned: Vec<(Block, Vec<Value>)> = Vec::new();

    for (&block, set) in block_sets {
        if set.is_empty() {
            continue;
        }

        let num_loads = set.num_loads();
        let num_stores = set.num_stores();
        let mut args = Vec::with_capacity(3 + num_loads + num_stores);

        args.push(module.iconst(Type::i32(), (2 + num_loads + num_stores) as i64));
        args.push(module.iconst(Type::i32(), num_loads as i64));
        set.copy_loads(&mut args);
        args.push(module.iconst(Type::i32(), num_stores as i64));
        set.copy_stores(&mut args);

        planned.push((block, args));
    }

    if planned.is_empty() {
        return false;
    }

    let reserve = module
        .find_function_by_name(RESERVE_SYMBOL)
        .unwrap_or_else(|| declare_reserve(module));

    for (block, args) in planned {
        let insts = module.block(block).insts();
        let at = insts
            .iter()
            .position(|&inst| !module.inst_data(inst).is_phi())
            .unwrap_or(insts.len());

        debug_assert!(
            insts[at..].iter().all(|&inst| !module.inst_data(inst).is_phi()),
            "φ in non-leading position in block `{}`",
            module.block(block).name()
        );

        trace!(
            "instrumenting block `{}` with {} argument(s)",
            module.block(block).name(),
            args.len()
        );

        module.insert_call_at(block, at, reserve, &args);
    }

    true
}

fn declare_reserve(module: &mut Module) -> Func {
    use crate::ir::SigBuilder;

    let sig = SigBuilder::new()
        .param("num_args", Type::i32())
        .vararg(true)
        .build();

    module.declare_function(RESERVE_SYMBOL, sig)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{InstData, SigBuilder};

    // the `stm_reserve` call leading `block`, if any
    fn reserve_call(module: &Module, block: Block) -> Option<Vec<Value>> {
        let reserve = module.find_function_by_name(RESERVE_SYMBOL)?;

        for &inst in module.block(block).insts() {
            if let InstData::Call(call) = module.inst_data(inst) {
                if call.callee() == reserve {
                    return Some(call.args().to_vec());
                }
            }
        }

        None
    }

    fn count_reserves(module: &Module, block: Block) -> usize {
        let reserve = match module.find_function_by_name(RESERVE_SYMBOL) {
            Some(reserve) => reserve,
            None => return 0,
        };

        module
            .block(block)
            .insts()
            .iter()
            .filter(|&&inst| {
                matches!(module.inst_data(inst), InstData::Call(call) if call.callee() == reserve)
            })
            .count()
    }

    // every emitted call satisfies num_args == 2 + num_loads + num_stores
    // with the right number of address words
    fn assert_arg_shape(module: &Module, args: &[Value]) {
        let num_args = module.value_as_const(args[0]).unwrap();
        let num_loads = module.value_as_const(args[1]).unwrap() as usize;
        let num_stores = module
            .value_as_const(args[2 + num_loads])
            .unwrap() as usize;

        assert_eq!(num_args, 2 + (num_loads + num_stores) as i64);
        assert_eq!(args.len(), 3 + num_loads + num_stores);
    }

    #[test]
    fn straight_line_transaction_reserves_once() {
        let mut m = Module::new("test");
        let a = m.define_global("a");
        let b = m.define_global("b");
        let c = m.define_global("c");
        let mut fb = m.define_function("tx", SigBuilder::new().build());

        // entry:
        //   %0 = load i32, ptr @b
        //   store i32 %0, ptr @a
        //   %1 = load i32, ptr @c
        //   store i32 %1, ptr @b
        //   br exit
        //
        // exit:
        //   ret void
        let entry = fb.create_block("entry");
        let exit = fb.create_block("exit");
        fb.switch_to(entry);
        let v0 = fb.append().load(Type::i32(), b);
        fb.append().store(v0, a);
        let v1 = fb.append().load(Type::i32(), c);
        fb.append().store(v1, b);
        fb.append().br(exit);
        fb.switch_to(exit);
        fb.append().ret_void();
        fb.define();

        let (changed, stats) = instrument_reservations(&mut m);

        assert!(changed);
        assert!(stats.loads >= 2);
        assert!(stats.stores >= 2);
        assert_eq!(stats.loads_compressed, 0);
        assert_eq!(stats.stores_compressed, 0);

        // one reservation in the entry block: the store to @b subsumed the
        // earlier load of it, so it reserves loads {c} and stores {a, b}
        let args = reserve_call(&m, entry).expect("entry must be instrumented");

        assert_arg_shape(&m, &args);
        assert_eq!(m.value_as_const(args[0]), Some(5));
        assert_eq!(m.value_as_const(args[1]), Some(1));
        assert_eq!(args[2], c);
        assert_eq!(m.value_as_const(args[3]), Some(2));
        assert_eq!(&args[4..], &[a, b]);

        assert_eq!(count_reserves(&m, entry), 1);
        assert_eq!(count_reserves(&m, exit), 0);
    }

    #[test]
    fn callee_param_compressed_via_boundary_reservation() {
        let mut m = Module::new("test");
        let b = m.define_global("b");
        let foo_sig = SigBuilder::new()
            .param("e", Type::ptr())
            .ret(Some(Type::i32()))
            .build();
        let foo = m.declare_function("foo", foo_sig);
        let e = m.function(foo).params()[0];

        let mut fb = m.define_existing_function(foo);
        let fentry = fb.create_block("entry");
        fb.switch_to(fentry);
        let v = fb.append().load(Type::i32(), e);
        let one = fb.append().iconst(Type::i32(), 1);
        let sum = fb.append().iadd(v, one);
        fb.append().ret_val(sum);
        fb.define();

        let mut fb = m.define_function("tx", SigBuilder::new().build());
        let entry = fb.create_block("entry");
        fb.switch_to(entry);
        fb.append().load(Type::i32(), b);
        fb.append().call(foo, &[b]);
        fb.append().ret_void();
        let tx = fb.define();

        let (changed, stats) = instrument_reservations(&mut m);

        assert!(changed);

        // the call was split into its own boundary block, and the formal
        // `e` was compressed out of `foo` because `tx`'s boundary block
        // reserved the matching argument
        assert!(stats.loads_compressed >= 1);
        assert!(reserve_call(&m, fentry).is_none());

        // exactly one reservation per instrumented block, none anywhere else
        for func in [tx, foo] {
            for &block in m.function(func).blocks() {
                assert!(count_reserves(&m, block) <= 1);
            }
        }

        // tx's entry kept its load of @b
        let args = reserve_call(&m, entry).expect("entry must be instrumented");

        assert_arg_shape(&m, &args);
        assert_eq!(&args[2..3], &[b]);
    }

    #[test]
    fn stack_slot_block_is_not_instrumented() {
        let mut m = Module::new("test");
        let b = m.define_global("b");
        let mut fb = m.define_function("tx", SigBuilder::new().build());

        // entry:
        //   %a = alloca i32
        //   %0 = load i32, ptr @b
        //   store i32 %0, ptr %a
        //   ret void
        let entry = fb.create_block("entry");
        fb.switch_to(entry);
        let slot = fb.append().alloca(Type::i32());
        let v = fb.append().load(Type::i32(), b);
        fb.append().store(v, slot);
        fb.append().ret_void();
        fb.name_value(slot, "a");
        let tx = fb.define();

        let (changed, _) = instrument_reservations(&mut m);

        assert!(changed);

        // the alloca was isolated into an uninstrumented block; the tail
        // still reserves the (named) stack slot, the escape stub does not
        // filter it yet
        let blocks = m.function(tx).blocks().to_vec();

        assert_eq!(blocks.len(), 2);
        assert_eq!(count_reserves(&m, blocks[0]), 0);

        let args = reserve_call(&m, blocks[1]).expect("tail must be instrumented");

        assert_arg_shape(&m, &args);
        assert!(args.contains(&slot));
    }

    #[test]
    fn reserve_lands_after_phis() {
        let mut m = Module::new("test");
        let a = m.define_global("a");
        let c = m.define_global("c");
        let sel = m.define_global("sel");
        let mut fb = m.define_function("tx", SigBuilder::new().build());

        let entry = fb.create_block("entry");
        let left = fb.create_block("left");
        let right = fb.create_block("right");
        let join = fb.create_block("join");

        fb.switch_to(entry);
        let sv = fb.append().load(Type::bool(), sel);
        fb.append().condbr(sv, left, right);

        fb.switch_to(left);
        fb.append().br(join);

        fb.switch_to(right);
        fb.append().br(join);

        fb.switch_to(join);
        let p = fb.append().phi(Type::ptr(), &[a, c], "p");
        let v = fb.append().load(Type::i32(), p);
        fb.append().store(v, a);
        fb.append().ret_void();
        fb.define();

        let (changed, _) = instrument_reservations(&mut m);

        assert!(changed);

        // the reservation call sits between the φ and the first real
        // instruction
        let insts = m.block(join).insts().to_vec();

        assert!(m.inst_data(insts[0]).is_phi());
        assert!(matches!(m.inst_data(insts[1]), InstData::Call(_)));
        assert_eq!(count_reserves(&m, join), 1);
    }

    #[test]
    fn recursive_callees_terminate() {
        let mut m = Module::new("test");
        let a = m.define_global("a");
        let even_sig = SigBuilder::new().param("p", Type::ptr()).build();
        let even = m.declare_function("even_step", even_sig);
        let odd_sig = SigBuilder::new().param("q", Type::ptr()).build();
        let odd = m.declare_function("odd_step", odd_sig);

        let mut fb = m.define_existing_function(even);
        let p = fb.func_params()[0];
        let entry = fb.create_block("entry");
        fb.switch_to(entry);
        fb.append().call(odd, &[p]);
        fb.append().ret_void();
        fb.define();

        let mut fb = m.define_existing_function(odd);
        let q = fb.func_params()[0];
        let entry = fb.create_block("entry");
        fb.switch_to(entry);
        fb.append().call(even, &[q]);
        fb.append().ret_void();
        fb.define();

        let mut fb = m.define_function("tx", SigBuilder::new().build());
        let entry = fb.create_block("entry");
        fb.switch_to(entry);
        fb.append().call(even, &[a]);
        fb.append().ret_void();
        fb.define();

        // mutually recursive callees: the visit-once queue and the
        // visit-once compressor both have to break the cycle
        let (changed, stats) = instrument_reservations(&mut m);

        assert!(changed);
        assert_eq!(stats.loads_from_calls, 3);
    }

    // across a branchy transaction, every emitted reservation keeps its
    // load and store address lists disjoint and its length prefixes honest
    #[test]
    fn reservations_are_disjoint_and_well_shaped() {
        let mut m = Module::new("test");
        let a = m.define_global("a");
        let b = m.define_global("b");
        let c = m.define_global("c");
        let d = m.define_global("d");
        let mut fb = m.define_function("tx", SigBuilder::new().build());

        let entry = fb.create_block("entry");
        let if_true = fb.create_block("if.true");
        let otherwise = fb.create_block("otherwise");
        let exit = fb.create_block("exit");

        fb.switch_to(entry);
        let dv = fb.append().load(Type::bool(), d);
        let av = fb.append().load(Type::i32(), a);
        fb.append().store(av, a);
        fb.append().condbr(dv, if_true, otherwise);

        fb.switch_to(if_true);
        let cv = fb.append().load(Type::i32(), c);
        fb.append().store(cv, b);
        fb.append().br(exit);

        fb.switch_to(otherwise);
        let bv = fb.append().load(Type::i32(), b);
        fb.append().store(bv, a);
        fb.append().br(exit);

        fb.switch_to(exit);
        let v = fb.append().load(Type::i32(), b);
        fb.append().store(v, c);
        fb.append().ret_void();
        let tx = fb.define();

        let (changed, _) = instrument_reservations(&mut m);

        assert!(changed);

        for &block in m.function(tx).blocks() {
            assert!(count_reserves(&m, block) <= 1);

            if let Some(args) = reserve_call(&m, block) {
                assert_arg_shape(&m, &args);

                let num_loads = m.value_as_const(args[1]).unwrap() as usize;
                let loads = &args[2..2 + num_loads];
                let stores = &args[3 + num_loads..];

                assert!(loads.iter().all(|l| !stores.contains(l)));
            }
        }
    }

    #[test]
    fn module_without_roots_is_untouched() {
        let mut m = Module::new("test");
        let a = m.define_global("a");
        let mut fb = m.define_function("main", SigBuilder::new().build());

        let entry = fb.create_block("entry");
        fb.switch_to(entry);
        let v = fb.append().load(Type::i32(), a);
        fb.append().store(v, a);
        fb.append().ret_void();
        fb.define();

        let mut pass = StmReservePass::new();
        let preserved = pass.run(&mut m);

        assert!(preserved.preserves_all());
        assert!(m.find_function_by_name(RESERVE_SYMBOL).is_none());
    }

    #[test]
    fn pass_reports_module_changed() {
        let mut m = Module::new("test");
        let a = m.define_global("a");
        let mut fb = m.define_function("tx", SigBuilder::new().build());

        let entry = fb.create_block("entry");
        fb.switch_to(entry);
        let v = fb.append().load(Type::i32(), a);
        fb.append().store(v, a);
        fb.append().ret_void();
        fb.define();

        let mut pass = StmReservePass::new();
        let preserved = pass.run(&mut m);

        assert!(!preserved.preserves_all());
        assert_eq!(pass.stats().loads, 1);
        assert_eq!(pass.stats().stores, 1);
    }

    #[test]
    fn aux_root_is_used_when_no_tx_exists() {
        let mut m = Module::new("test");
        let a = m.define_global("a");
        let mut fb = m.define_function("foo_worker", SigBuilder::new().build());

        let entry = fb.create_block("entry");
        fb.switch_to(entry);
        let v = fb.append().load(Type::i32(), a);
        fb.append().store(v, a);
        fb.append().ret_void();
        fb.define();

        let (changed, _) = instrument_reservations(&mut m);

        assert!(changed);
        assert_eq!(count_reserves(&m, entry), 1);
    }
}
