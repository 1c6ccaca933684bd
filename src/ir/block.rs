//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::ir::{Func, Inst};

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// Models a single basic block in a function within the IR.
///
/// A block is a linear sequence of instructions ending in a terminator,
/// with any φ nodes leading the sequence:
///
/// ```other
/// join.4:
///   %v = phi i32 [%a, %b]
///   store i32 %v, ptr @g
///   br exit
/// ```
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct BasicBlock {
    pub(in crate::ir) name: String,
    pub(in crate::ir) func: Func,
    pub(in crate::ir) insts: Vec<Inst>,
}

impl BasicBlock {
    /// Gets the name of the block.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the function that the block belongs to.
    #[inline]
    pub fn func(&self) -> Func {
        self.func
    }

    /// Gets the instructions of the block, in program order.
    #[inline]
    pub fn insts(&self) -> &[Inst] {
        &self.insts
    }
}
