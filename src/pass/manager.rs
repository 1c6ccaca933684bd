//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::ir::Module;
use crate::pass::{ModuleTransformPass, PreservedAnalyses};

/// Manages running a set of passes over IR.
///
/// An important note is that this is actually a module pass itself, it's a
/// pass that simply runs other passes.
#[derive(Default)]
pub struct ModulePassManager {
    passes: Vec<Box<dyn ModuleTransformPass>>,
}

impl ModulePassManager {
    /// Creates a new, empty, module pass manager.
    pub fn new() -> Self {
        Self {
            passes: Vec::default(),
        }
    }

    /// Adds a transformation pass to the pass manager. This pass's order is
    /// defined relative to other calls to [`Self::add_pass`].
    pub fn add_pass<T: ModuleTransformPass + 'static>(&mut self, pass: T) {
        self.passes.push(Box::new(pass));
    }
}

impl ModuleTransformPass for ModulePassManager {
    fn run(&mut self, module: &mut Module) -> PreservedAnalyses {
        let mut preserved = PreservedAnalyses::all();

        for pass in self.passes.iter_mut() {
            let other = pass.run(module);

            preserved = preserved.intersect(other)
        }

        preserved
    }
}
