//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::ir::{Block, Func, Type, Value};
use smallvec::SmallVec;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// Holds all of the information necessary to call a function: the
/// parameter names and types, the return type, and whether the tail
/// of the parameter list is variadic.
///
/// Parameters are *named* so that formal-parameter values satisfy the
/// named-value predicate that the memory analyses key off of.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Signature {
    pub(in crate::ir) params: SmallVec<[(String, Type); 4]>,
    pub(in crate::ir) ret: Option<Type>,
    pub(in crate::ir) vararg: bool,
}

impl Signature {
    /// Gets the return type of the function signature.
    ///
    /// Note that `None` represents `void`, i.e. a function that doesn't
    /// actually return anything.
    #[inline]
    pub fn return_ty(&self) -> Option<Type> {
        self.ret
    }

    /// Gets the list of parameter names and types for the function.
    #[inline]
    pub fn params(&self) -> &[(String, Type)] {
        &self.params
    }

    /// Checks if the signature is for a vararg (`...`) function.
    #[inline]
    pub fn vararg(&self) -> bool {
        self.vararg
    }

    /// Checks if the signature refers to a `void` function.
    #[inline]
    pub fn is_void(&self) -> bool {
        self.ret.is_none()
    }
}

/// Models a single function in the IR.
///
/// Contains the list of basic blocks making up the body (in layout order),
/// the formal parameter values, the signature, and a name. A function with
/// no blocks is a declaration.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Function {
    pub(in crate::ir) name: String,
    pub(in crate::ir) sig: Signature,
    pub(in crate::ir) func: Func,
    pub(in crate::ir) params: SmallVec<[Value; 4]>,
    pub(in crate::ir) blocks: Vec<Block>,
}

impl Function {
    /// Gets the name of the function without `@`.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the signature of the function.
    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.sig
    }

    /// Gets the return type of the function. If the function
    /// is a `void` function, [`None`] is returned.
    #[inline]
    pub fn return_ty(&self) -> Option<Type> {
        self.sig.return_ty()
    }

    /// Gets the formal parameter values, in declaration order.
    #[inline]
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Gets the blocks of the body, in layout order. The first block
    /// is the entry block.
    #[inline]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Checks if the function is a declaration, i.e. whether or not
    /// it actually has a body.
    #[inline]
    pub fn is_decl(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Gets the terminal block, defined as the last block in layout order.
    /// `None` for declarations.
    #[inline]
    pub fn terminal_block(&self) -> Option<Block> {
        self.blocks.last().copied()
    }

    /// Gets a [`Func`] that refers to `self`. This can be used when a
    /// [`Module`](crate::ir::Module) is not available to get [`Func`]s from.
    #[inline]
    pub fn func(&self) -> Func {
        self.func
    }
}
