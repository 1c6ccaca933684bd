//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

#![deny(
    unreachable_pub,
    missing_docs,
    missing_abi,
    rust_2018_idioms,
    rustdoc::broken_intra_doc_links,
    rustdoc::private_intra_doc_links
)]

//! # Garnet
//!
//! These are the basic APIs for building and manipulating GIR, along with
//! the transforms that run over it. The centerpiece is the whole-program
//! STM reservation instrumentation pass in [`transforms`].

pub mod analysis;
pub mod ir;
pub mod pass;
pub mod transforms;
pub mod utility;

use crate::pass::{ModulePassManager, ModuleTransformPass};
use crate::transforms::StmReservePass;

/// A helper function that handles "run these passes specified by the user"
/// in a way that multiple tools can use.
///
/// This is not intended to be used for pre-determined pass pipelines, it is
/// for driver-style tools that take a pass list from the outside.
pub fn run_passes(module: &mut ir::Module, passes: &[String]) -> bool {
    let mut mpm = ModulePassManager::new();

    for pass in passes {
        match pass.as_str() {
            "stm-reserve" => mpm.add_pass(StmReservePass::new()),
            _ => panic!("unknown pass `{pass}`"),
        }
    }

    !mpm.run(module).preserves_all()
}
