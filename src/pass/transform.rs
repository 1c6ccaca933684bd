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
use smallvec::{smallvec, SmallVec};
use std::any::{Any, TypeId};

struct All;

/// Models the set of analyses that a given transformation pass
/// preserves.
///
/// This is not a contract that is checked, it is expected that the transform
/// knows what analyses it can preserve. If it reports incorrectly, this can
/// lead to mis-compilations or panics inside the compiler.
///
/// A transform that did not touch the IR at all reports [`Self::all`]; this
/// doubles as the "nothing changed" signal back to whoever ran the pass.
#[derive(Debug)]
pub struct PreservedAnalyses {
    // sorted so we can binary_search for `contains`
    preserved: SmallVec<[TypeId; 2]>,
}

impl PreservedAnalyses {
    /// Returns a [`PreservedAnalyses`] that marks every analysis as preserved.
    pub fn all() -> Self {
        Self {
            preserved: smallvec![TypeId::of::<All>()],
        }
    }

    /// Returns a [`PreservedAnalyses`] that marks every analysis as invalidated.
    pub fn none() -> Self {
        Self {
            preserved: smallvec![],
        }
    }

    /// Checks if *all* analyses are preserved by a given transformation. If
    /// this is true, the transformation effectively reports to have not
    /// changed *anything* in the IR.
    ///
    /// This cannot be obtained in any way except [`Self::all`].
    pub fn preserves_all(&self) -> bool {
        self.preserved.len() == 1 && self.preserved[0] == TypeId::of::<All>()
    }

    /// Reports that an analysis is preserved by the current transformation.
    pub fn preserve<T: Any>(&mut self) {
        self.insert(TypeId::of::<T>())
    }

    /// Gets the intersection of two sets of preserved analyses, returning
    /// the analyses that are preserved both by `self` and by `other`.
    pub fn intersect(self, other: PreservedAnalyses) -> PreservedAnalyses {
        if self.preserves_all() {
            return other;
        }

        let mut new = PreservedAnalyses::none();
        let intersection = self.preserved.into_iter().filter(|id| other.contains(*id));

        for id in intersection {
            new.insert(id)
        }

        new
    }

    /// Checks if an analysis is preserved. If all are preserved
    /// or an analysis with an equivalent [`TypeId`] has been preserved
    /// with [`Self::preserve`], this returns `true`.
    pub fn is_preserved(&self, id: TypeId) -> bool {
        self.preserves_all() || self.contains(id)
    }

    fn contains(&self, id: TypeId) -> bool {
        self.preserved.binary_search(&id).is_ok()
    }

    fn insert(&mut self, id: TypeId) {
        if let Err(pos) = self.preserved.binary_search(&id) {
            self.preserved.insert(pos, id);
        }
    }
}

/// Models a pass that possibly performs a transformation over an entire GIR
/// module.
///
/// While the pass may not actually modify the IR, it has the ability to, and
/// needs to declare what it changed (if anything) through
/// [`PreservedAnalyses`].
pub trait ModuleTransformPass {
    /// Performs the transformation over a given GIR module.
    ///
    /// This function is expected to act as-if it was pure, i.e. calling the
    /// same pass multiple times on the same IR should produce equivalent IR
    /// each time and should return the same preserved analyses each time.
    fn run(&mut self, module: &mut Module) -> PreservedAnalyses;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct A;
    struct B;

    #[test]
    fn all_preserves_everything() {
        let all = PreservedAnalyses::all();

        assert!(all.preserves_all());
        assert!(all.is_preserved(TypeId::of::<A>()));
    }

    #[test]
    fn none_preserves_nothing() {
        let none = PreservedAnalyses::none();

        assert!(!none.preserves_all());
        assert!(!none.is_preserved(TypeId::of::<A>()));
    }

    #[test]
    fn intersect_keeps_common() {
        let mut lhs = PreservedAnalyses::none();
        let mut rhs = PreservedAnalyses::none();

        lhs.preserve::<A>();
        lhs.preserve::<B>();
        rhs.preserve::<B>();

        let both = lhs.intersect(rhs);

        assert!(both.is_preserved(TypeId::of::<B>()));
        assert!(!both.is_preserved(TypeId::of::<A>()));
    }
}
