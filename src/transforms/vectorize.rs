//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::ir::{Block, Module};

/// Configuration for basic-block vectorization.
///
/// This is a plain bundle of knobs consumed by [`vectorize_block`]; it is
/// independent of every other transform in the crate.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct VectorizeConfig {
    /// The size of the native vector registers, in bits.
    pub vector_bits: u32,
    /// Vectorize integer values.
    pub vectorize_ints: bool,
    /// Vectorize floating-point values.
    pub vectorize_floats: bool,
    /// Vectorize pointer values.
    pub vectorize_pointers: bool,
    /// Vectorize casting (conversion) operations.
    pub vectorize_casts: bool,
    /// Vectorize floating-point math intrinsics.
    pub vectorize_math: bool,
    /// Vectorize the fused-multiply-add intrinsic.
    pub vectorize_fma: bool,
    /// Vectorize select instructions.
    pub vectorize_select: bool,
    /// Vectorize address-computation instructions.
    pub vectorize_gep: bool,
    /// Vectorize loads and stores.
    pub vectorize_mem_ops: bool,
    /// Only generate aligned loads and stores.
    pub aligned_only: bool,
    /// The required chain depth for vectorization.
    pub req_chain_depth: u32,
    /// The maximum search distance for instruction pairs.
    pub search_limit: u32,
    /// The maximum number of candidate pairs with which to use a full
    /// cycle check.
    pub max_cand_pairs_for_cycle_check: u32,
    /// Replicating one element to a pair breaks the chain.
    pub splat_breaks_chain: bool,
    /// The maximum number of pairable instructions per group.
    pub max_insts: u32,
    /// The maximum number of pairing iterations.
    pub max_iter: u32,
    /// Don't boost the chain-depth contribution of loads and stores.
    pub no_mem_op_boost: bool,
    /// Use a fast instruction dependency analysis.
    pub fast_dep: bool,
}

impl Default for VectorizeConfig {
    fn default() -> Self {
        Self {
            vector_bits: 128,
            vectorize_ints: true,
            vectorize_floats: true,
            vectorize_pointers: true,
            vectorize_casts: true,
            vectorize_math: true,
            vectorize_fma: true,
            vectorize_select: true,
            vectorize_gep: true,
            vectorize_mem_ops: true,
            aligned_only: false,
            req_chain_depth: 6,
            search_limit: 400,
            max_cand_pairs_for_cycle_check: 200,
            splat_breaks_chain: false,
            max_insts: 500,
            max_iter: 200,
            no_mem_op_boost: false,
            fast_dep: false,
        }
    }
}

/// Vectorizes one basic block under the given configuration. Returns
/// whether the block was changed.
///
/// Only the configuration surface is stable at this point: candidates are
/// screened, but no pairs are formed yet.
// TODO: implement the pair-selection search driven by the config knobs
pub fn vectorize_block(module: &mut Module, block: Block, config: &VectorizeConfig) -> bool {
    debug_assert!(config.vector_bits.is_power_of_two());

    // a block below the required chain depth can never produce a chain,
    // skip it without any screening
    let len = module.block(block).insts().len();

    if (len as u32) < config.req_chain_depth {
        return false;
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{SigBuilder, Type};

    #[test]
    fn default_knobs() {
        let config = VectorizeConfig::default();

        assert_eq!(config.vector_bits, 128);
        assert!(config.vectorize_mem_ops);
        assert!(!config.aligned_only);
        assert_eq!(config.req_chain_depth, 6);
        assert_eq!(config.search_limit, 400);
        assert_eq!(config.max_iter, 200);
    }

    #[test]
    fn tiny_block_is_left_alone() {
        let mut m = Module::new("test");
        let g = m.define_global("g");
        let mut b = m.define_function("f", SigBuilder::new().build());

        let entry = b.create_block("entry");
        b.switch_to(entry);
        let v = b.append().load(Type::i32(), g);
        b.append().store(v, g);
        b.append().ret_void();
        b.define();

        assert!(!vectorize_block(&mut m, entry, &VectorizeConfig::default()));
    }
}
