//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::ir::{InstData, Module, Value};
use crate::transforms::stm::ReserveStats;
use std::collections::BTreeSet;

/// The candidate loads and stores of one basic block.
///
/// An access set goes through three phases:
///
/// 1. **analysis**: the block analyzer inserts every named address the
///    block reads or writes,
/// 2. **freeze**: a one-shot snapshot is taken so callers can later ask
///    "did this block reserve that address" against the pre-compression
///    state,
/// 3. **compression**: addresses already reserved by every dominating
///    path or by an enclosing caller are removed again.
///
/// The sets are ordered (`BTreeSet` over arena keys) so that everything
/// downstream is deterministic, including the argument order of the
/// emitted reservation calls.
#[derive(Debug, Clone, Default)]
pub struct AccessSet {
    loads: BTreeSet<Value>,
    stores: BTreeSet<Value>,
    phi_loads: BTreeSet<Value>,
    phi_stores: BTreeSet<Value>,
    orig_loads: BTreeSet<Value>,
    orig_stores: BTreeSet<Value>,
    seen_loads: BTreeSet<Value>,
    seen_stores: BTreeSet<Value>,
}

impl AccessSet {
    /// Creates an empty access set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks whether the set currently holds no loads and no stores.
    pub fn is_empty(&self) -> bool {
        self.loads.is_empty() && self.stores.is_empty()
    }

    /// Records a load of the address `v`.
    ///
    /// A load of an address this block already stores to is suppressed,
    /// the store reservation covers it. Returns whether the load set grew.
    pub fn insert_load(&mut self, module: &Module, v: Value, stats: &mut ReserveStats) -> bool {
        if self.stores.contains(&v) {
            stats.loads_skipped_from_previous_store += 1;

            return false;
        }

        let grew = self.loads.insert(v);

        if grew && module.value_is_phi(v) {
            stats.loads_on_phi += 1;

            // store-φ membership wins, never track the same φ on both sides
            if !self.phi_stores.contains(&v) {
                self.phi_loads.insert(v);
            }
        }

        grew
    }

    /// Records a store to the address `v`. Returns whether the store set
    /// grew.
    ///
    /// Inserting a store evicts any load of the same address: the sets stay
    /// disjoint, and a store reservation subsumes a load reservation.
    pub fn insert_store(&mut self, module: &Module, v: Value, stats: &mut ReserveStats) -> bool {
        self.loads.remove(&v);
        self.phi_loads.remove(&v);

        let grew = self.stores.insert(v);

        if module.value_is_phi(v) {
            if grew {
                stats.stores_on_phi += 1;
            }

            self.phi_stores.insert(v);
        }

        grew
    }

    /// Snapshots the analyzed sets. Called exactly once per block, at the
    /// boundary between analysis and compression.
    pub fn freeze(&mut self) {
        debug_assert!(
            self.orig_loads.is_empty() && self.orig_stores.is_empty(),
            "access set frozen twice"
        );

        self.orig_loads = self.loads.clone();
        self.orig_stores = self.stores.clone();
    }

    /// Checks whether the block reserved a load of `v`, as of the frozen
    /// snapshot.
    pub fn contains_load(&self, v: Value) -> bool {
        self.orig_loads.contains(&v)
    }

    /// Checks whether the block reserved a store to `v`, as of the frozen
    /// snapshot.
    pub fn contains_store(&self, v: Value) -> bool {
        self.orig_stores.contains(&v)
    }

    /// Removes `v` from the load set on the grounds that an earlier block
    /// (or the caller) already reserved it as a load. Returns whether
    /// anything was removed.
    pub fn compress_with_prior_load(&mut self, v: Value, stats: &mut ReserveStats) -> bool {
        self.seen_loads.insert(v);

        if self.loads.remove(&v) {
            stats.loads_compressed += 1;

            return true;
        }

        false
    }

    /// Removes `v` from both sets on the grounds that an earlier block (or
    /// the caller) already reserved it as a store. A prior store also kills
    /// a load of the same address. Returns whether anything was removed.
    pub fn compress_with_prior_store(&mut self, v: Value, stats: &mut ReserveStats) -> bool {
        self.seen_stores.insert(v);

        let mut removed = false;

        if self.compress_with_prior_load(v, stats) {
            stats.loads_compressed_from_previous_store += 1;
            removed = true;
        }

        if self.stores.remove(&v) {
            stats.stores_compressed += 1;
            removed = true;
        }

        removed
    }

    /// Applies [`Self::compress_with_prior_load`] and
    /// [`Self::compress_with_prior_store`] for every element of the
    /// incoming reserved-on-entry sets.
    pub fn compress(
        &mut self,
        prior_loads: &BTreeSet<Value>,
        prior_stores: &BTreeSet<Value>,
        stats: &mut ReserveStats,
    ) {
        for &v in prior_loads {
            self.compress_with_prior_load(v, stats);
        }

        for &v in prior_stores {
            self.compress_with_prior_store(v, stats);
        }
    }

    /// Removes φs whose every incoming value is already covered by the
    /// compression context or by the block's own sets.
    ///
    /// A φ-load is covered by loads or stores; a φ-store only by stores.
    /// φs feeding φs are resolved recursively. Must run after
    /// [`Self::compress`] so the `seen` accumulators are populated.
    pub fn compress_phi_nodes(&mut self, module: &Module, stats: &mut ReserveStats) {
        for phi in self.phi_loads.clone() {
            let mut visited = BTreeSet::new();

            if self.can_compress_load_phi(module, phi, &mut visited) && self.loads.remove(&phi) {
                stats.loads_on_phi_compressed += 1;
            }
        }

        for phi in self.phi_stores.clone() {
            let mut visited = BTreeSet::new();

            if self.can_compress_store_phi(module, phi, &mut visited) && self.stores.remove(&phi) {
                stats.stores_on_phi_compressed += 1;
            }
        }
    }

    /// Copies the residual loads into `sink`.
    pub fn copy_loads<S: Extend<Value>>(&self, sink: &mut S) {
        sink.extend(self.loads.iter().copied());
    }

    /// Copies the residual stores into `sink`.
    pub fn copy_stores<S: Extend<Value>>(&self, sink: &mut S) {
        sink.extend(self.stores.iter().copied());
    }

    /// Iterates the residual loads in deterministic order.
    pub fn loads(&self) -> impl Iterator<Item = Value> + '_ {
        self.loads.iter().copied()
    }

    /// Iterates the residual stores in deterministic order.
    pub fn stores(&self) -> impl Iterator<Item = Value> + '_ {
        self.stores.iter().copied()
    }

    /// The number of residual loads.
    pub fn num_loads(&self) -> usize {
        self.loads.len()
    }

    /// The number of residual stores.
    pub fn num_stores(&self) -> usize {
        self.stores.len()
    }

    fn can_compress_load_phi(
        &self,
        module: &Module,
        phi: Value,
        visited: &mut BTreeSet<Value>,
    ) -> bool {
        let inst = module.value_to_inst(phi).expect("φ value without its instruction");
        let incoming = match module.inst_data(inst) {
            InstData::Phi(phi) => phi.incoming().to_vec(),
            _ => unreachable!("tracked φ value does not refer to a φ node"),
        };

        for v in incoming {
            if module.value_is_phi(v) {
                // a φ already on the walk resolves optimistically, its own
                // non-φ inputs decide the cycle
                if !visited.insert(v) || self.can_compress_load_phi(module, v, visited) {
                    continue;
                }

                return false;
            }

            let covered = self.seen_stores.contains(&v)
                || self.seen_loads.contains(&v)
                || self.stores.contains(&v)
                || self.loads.contains(&v);

            if !covered {
                return false;
            }
        }

        true
    }

    fn can_compress_store_phi(
        &self,
        module: &Module,
        phi: Value,
        visited: &mut BTreeSet<Value>,
    ) -> bool {
        let inst = module.value_to_inst(phi).expect("φ value without its instruction");
        let incoming = match module.inst_data(inst) {
            InstData::Phi(phi) => phi.incoming().to_vec(),
            _ => unreachable!("tracked φ value does not refer to a φ node"),
        };

        for v in incoming {
            if module.value_is_phi(v) {
                if !visited.insert(v) || self.can_compress_store_phi(module, v, visited) {
                    continue;
                }

                return false;
            }

            if !(self.seen_stores.contains(&v) || self.stores.contains(&v)) {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Module, SigBuilder, Type};

    fn harness() -> (Module, Value, Value) {
        let mut m = Module::new("test");
        let a = m.define_global("a");
        let b = m.define_global("b");

        (m, a, b)
    }

    #[test]
    fn load_after_store_is_suppressed() {
        let (m, a, _) = harness();
        let mut stats = ReserveStats::default();
        let mut set = AccessSet::new();

        assert!(set.insert_store(&m, a, &mut stats));
        assert!(!set.insert_load(&m, a, &mut stats));
        assert_eq!(stats.loads_skipped_from_previous_store, 1);
        assert_eq!(set.num_loads(), 0);
        assert_eq!(set.num_stores(), 1);
    }

    #[test]
    fn store_after_load_keeps_sets_disjoint() {
        let (m, a, _) = harness();
        let mut stats = ReserveStats::default();
        let mut set = AccessSet::new();

        assert!(set.insert_load(&m, a, &mut stats));
        assert!(set.insert_store(&m, a, &mut stats));

        assert_eq!(set.num_loads(), 0);
        assert_eq!(set.num_stores(), 1);
    }

    #[test]
    fn duplicate_inserts_do_not_grow() {
        let (m, a, b) = harness();
        let mut stats = ReserveStats::default();
        let mut set = AccessSet::new();

        assert!(set.insert_load(&m, a, &mut stats));
        assert!(!set.insert_load(&m, a, &mut stats));
        assert!(set.insert_store(&m, b, &mut stats));
        assert!(!set.insert_store(&m, b, &mut stats));
    }

    #[test]
    fn freeze_snapshots_are_immune_to_compression() {
        let (m, a, b) = harness();
        let mut stats = ReserveStats::default();
        let mut set = AccessSet::new();

        set.insert_load(&m, a, &mut stats);
        set.insert_store(&m, b, &mut stats);
        set.freeze();

        set.compress_with_prior_load(a, &mut stats);
        set.compress_with_prior_store(b, &mut stats);

        assert!(set.is_empty());
        assert!(set.contains_load(a));
        assert!(set.contains_store(b));
    }

    #[test]
    fn prior_store_kills_both_kinds() {
        let (m, a, _) = harness();
        let mut stats = ReserveStats::default();
        let mut set = AccessSet::new();

        set.insert_load(&m, a, &mut stats);

        assert!(set.compress_with_prior_store(a, &mut stats));
        assert_eq!(stats.loads_compressed, 1);
        assert_eq!(stats.loads_compressed_from_previous_store, 1);
        assert_eq!(stats.stores_compressed, 0);
    }

    #[test]
    fn compress_counters_match_removals() {
        let (m, a, b) = harness();
        let mut stats = ReserveStats::default();
        let mut set = AccessSet::new();

        set.insert_load(&m, a, &mut stats);
        set.insert_store(&m, b, &mut stats);
        set.freeze();

        let prior_loads = BTreeSet::from([a]);
        let prior_stores = BTreeSet::from([b]);

        set.compress(&prior_loads, &prior_stores, &mut stats);

        assert_eq!(stats.loads_compressed, 1);
        assert_eq!(stats.stores_compressed, 1);
        assert!(set.is_empty());
    }

    // a φ whose incoming values are both locally present gets removed
    // from the load set
    #[test]
    fn phi_over_covered_values_is_compressed() {
        let mut m = Module::new("test");
        let a = m.define_global("a");
        let c = m.define_global("c");
        let mut b = m.define_function("tx", SigBuilder::new().build());

        let entry = b.create_block("entry");
        b.switch_to(entry);
        let phi = b.append().phi(Type::ptr(), &[a, c], "p");
        b.append().ret_void();

        let mut stats = ReserveStats::default();
        let mut set = AccessSet::new();

        set.insert_load(&m, a, &mut stats);
        set.insert_store(&m, c, &mut stats);
        set.insert_load(&m, phi, &mut stats);

        assert_eq!(stats.loads_on_phi, 1);

        set.freeze();
        set.compress_phi_nodes(&m, &mut stats);

        assert_eq!(stats.loads_on_phi_compressed, 1);
        assert!(set.loads().all(|v| v != phi));
        assert!(set.contains_load(phi));
    }

    // φ-stores are only covered by stores
    #[test]
    fn phi_store_not_compressed_by_loads() {
        let mut m = Module::new("test");
        let a = m.define_global("a");
        let c = m.define_global("c");
        let mut b = m.define_function("tx", SigBuilder::new().build());

        let entry = b.create_block("entry");
        b.switch_to(entry);
        let phi = b.append().phi(Type::ptr(), &[a, c], "p");
        b.append().ret_void();

        let mut stats = ReserveStats::default();
        let mut set = AccessSet::new();

        set.insert_load(&m, a, &mut stats);
        set.insert_load(&m, c, &mut stats);
        set.insert_store(&m, phi, &mut stats);
        set.freeze();
        set.compress_phi_nodes(&m, &mut stats);

        assert_eq!(stats.stores_on_phi_compressed, 0);
        assert!(set.stores().any(|v| v == phi));
    }

    #[test]
    fn phi_with_uncovered_incoming_stays() {
        let mut m = Module::new("test");
        let a = m.define_global("a");
        let c = m.define_global("c");
        let mut b = m.define_function("tx", SigBuilder::new().build());

        let entry = b.create_block("entry");
        b.switch_to(entry);
        let phi = b.append().phi(Type::ptr(), &[a, c], "p");
        b.append().ret_void();

        let mut stats = ReserveStats::default();
        let mut set = AccessSet::new();

        set.insert_load(&m, a, &mut stats);
        set.insert_load(&m, phi, &mut stats);
        set.freeze();
        set.compress_phi_nodes(&m, &mut stats);

        assert_eq!(stats.loads_on_phi_compressed, 0);
        assert!(set.loads().any(|v| v == phi));
    }
}
