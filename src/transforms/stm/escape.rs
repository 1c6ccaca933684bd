//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::ir::Value;
use crate::utility::SaHashMap;

/// Records, per value, whether the memory it names may escape the
/// transaction it is used in.
///
/// This is currently a placeholder for a real escape analysis: the pass
/// marks every global as escapable at entry and nothing ever narrows the
/// map, so every tracked address stays reserved. Stack storage is already
/// isolated structurally (the analyzer splits blocks at `alloca`s), which
/// is where a real analysis would hook in to filter non-escaping slots
/// out of the reservation sets.
#[derive(Debug, Default)]
pub struct EscapeMap {
    escapable: SaHashMap<Value, bool>,
}

impl EscapeMap {
    /// Creates an empty map. Every value is considered non-escaping until
    /// marked.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records whether `value` may escape. The first recording wins,
    /// a value's escapability is never downgraded or upgraded later.
    pub fn mark(&mut self, value: Value, escapable: bool) {
        self.escapable.entry(value).or_insert(escapable);
    }

    /// Checks whether `value` may escape the transaction. Unmarked values
    /// do not escape.
    pub fn can_escape(&self, value: Value) -> bool {
        self.escapable.get(&value).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Module;

    #[test]
    fn unmarked_values_do_not_escape() {
        let mut m = Module::new("test");
        let g = m.define_global("g");
        let map = EscapeMap::new();

        assert!(!map.can_escape(g));
    }

    #[test]
    fn first_mark_wins() {
        let mut m = Module::new("test");
        let g = m.define_global("g");
        let mut map = EscapeMap::new();

        map.mark(g, true);
        map.mark(g, false);

        assert!(map.can_escape(g));
    }
}
