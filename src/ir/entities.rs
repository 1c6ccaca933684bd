//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use slotmap::new_key_type;

new_key_type! {
    /// A basic reference to some value: the result of some computation,
    /// a formal parameter, a global, or a constant. This is effectively
    /// equivalent to a `llvm::Value*`.
    ///
    /// Equality is *identity*, not structure. Since GIR is a whole-program
    /// IR, values are keys into tables owned by the [`Module`](crate::ir::Module),
    /// and are completely useless without it.
    pub struct Value;

    /// While [`Value`]s refer to a result of some sort, [`Inst`]s refer to
    /// the instructions themselves. This has a subtly different meaning: an
    /// [`Inst`] may not actually refer to something that produces a *result*.
    ///
    /// Some instructions only perform side effects (e.g. `call void`, `store`),
    /// some model control flow (e.g. `ret`, `br`). These can never be referred
    /// to with [`Value`]s, but they *can* be referred to with [`Inst`]s.
    pub struct Inst;

    /// References a single basic block in the program.
    ///
    /// Must be resolved with the owning [`Module`](crate::ir::Module) into
    /// actual block data.
    pub struct Block;

    /// The reference type for a function. These can be looked up
    /// at the [`Module`](crate::ir::Module) level.
    pub struct Func;
}
