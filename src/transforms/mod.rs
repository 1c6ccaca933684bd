//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Defines the "transform" passes in GIR's infrastructure.
//!
//! These are the passes that can (potentially) modify GIR, and don't
//! actually logically yield a result. All of them logically yield no result
//! except the IR that exists after they run.

mod stm;
mod vectorize;

pub use stm::*;
pub use vectorize::*;
