//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use std::fmt;

/// Counters maintained by the reservation pass, scoped to one run over one
/// module.
///
/// The "skipped" buckets count addresses that were seen but did not grow a
/// set; the "unprocessed" buckets count addresses the analysis cannot name
/// and therefore drops; the "compressed" buckets count set entries removed
/// because an earlier block or an enclosing caller already reserved them.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct ReserveStats {
    /// Number of loads (total)
    pub loads: u64,
    /// Number of loads on φ values (total)
    pub loads_on_phi: u64,
    /// Number of loads on φ values compressed
    pub loads_on_phi_compressed: u64,
    /// Number of loads from function-call arguments
    pub loads_from_calls: u64,
    /// Number of loads skipped (total)
    pub loads_skipped: u64,
    /// Number of loads skipped because of a previous store in the block
    pub loads_skipped_from_previous_store: u64,
    /// Number of loads from addresses the analysis cannot name
    pub loads_unprocessed: u64,
    /// Number of loads compressed
    pub loads_compressed: u64,
    /// Number of loads compressed because of a previously-seen store
    pub loads_compressed_from_previous_store: u64,
    /// Number of stores (total)
    pub stores: u64,
    /// Number of stores on φ values (total)
    pub stores_on_phi: u64,
    /// Number of stores on φ values compressed
    pub stores_on_phi_compressed: u64,
    /// Number of stores skipped (total)
    pub stores_skipped: u64,
    /// Number of stores to addresses the analysis cannot name
    pub stores_unprocessed: u64,
    /// Number of stores compressed
    pub stores_compressed: u64,
}

impl fmt::Display for ReserveStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "loads: {} total, {} skipped ({} from prior store), {} unprocessed, {} compressed ({} from prior store), {} on phi ({} compressed)",
            self.loads,
            self.loads_skipped,
            self.loads_skipped_from_previous_store,
            self.loads_unprocessed,
            self.loads_compressed,
            self.loads_compressed_from_previous_store,
            self.loads_on_phi,
            self.loads_on_phi_compressed,
        )?;
        write!(
            f,
            "stores: {} total, {} skipped, {} unprocessed, {} compressed, {} on phi ({} compressed)",
            self.stores,
            self.stores_skipped,
            self.stores_unprocessed,
            self.stores_compressed,
            self.stores_on_phi,
            self.stores_on_phi_compressed,
        )
    }
}
