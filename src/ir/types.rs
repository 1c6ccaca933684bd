//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use static_assertions::assert_eq_size;
use std::fmt;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// A compact representation of a GIR value type.
///
/// These are passed around by value everywhere, they are cheaper to copy
/// than to reference. The full list:
///
/// - `bool`: the result type of comparisons and the operand of `condbr`
/// - `iN`: an integer of width `N` bits
/// - `ptr`: an opaque pointer, the address operand of `load`/`store`
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum Type {
    /// A boolean, the output of comparisons.
    Bool,
    /// An integer type of the given bit width.
    Int(u32),
    /// An opaque pointer. GIR pointers are untyped, the pointee type
    /// is carried by the `load`/`store` instead.
    Ptr,
}

assert_eq_size!(Type, u64);

impl Type {
    /// Shorthand for the `bool` type.
    #[inline]
    pub fn bool() -> Self {
        Self::Bool
    }

    /// Shorthand for an integer type of width `bits`.
    #[inline]
    pub fn int(bits: u32) -> Self {
        debug_assert!(bits.is_power_of_two() && (8..=64).contains(&bits));

        Self::Int(bits)
    }

    /// Shorthand for the 32-bit integer type.
    #[inline]
    pub fn i32() -> Self {
        Self::Int(32)
    }

    /// Shorthand for the 64-bit integer type.
    #[inline]
    pub fn i64() -> Self {
        Self::Int(64)
    }

    /// Shorthand for the pointer type.
    #[inline]
    pub fn ptr() -> Self {
        Self::Ptr
    }

    /// Checks if the type is `bool`.
    #[inline]
    pub fn is_bool(self) -> bool {
        matches!(self, Self::Bool)
    }

    /// Checks if the type is an integer of any width.
    #[inline]
    pub fn is_int(self) -> bool {
        matches!(self, Self::Int(_))
    }

    /// Checks if the type is a pointer.
    #[inline]
    pub fn is_ptr(self) -> bool {
        matches!(self, Self::Ptr)
    }

    /// Gets the width of an integer type. Panics if the type is
    /// not an integer.
    #[inline]
    pub fn int_width(self) -> u32 {
        match self {
            Self::Int(bits) => bits,
            _ => panic!("`int_width` called on non-integer type `{self}`"),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Int(bits) => write!(f, "i{bits}"),
            Self::Ptr => write!(f, "ptr"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn introspection() {
        assert!(Type::bool().is_bool());
        assert!(Type::i32().is_int());
        assert!(Type::ptr().is_ptr());
        assert!(!Type::ptr().is_int());
        assert_eq!(Type::int(16).int_width(), 16);
    }

    #[test]
    fn display() {
        assert_eq!(Type::i32().to_string(), "i32");
        assert_eq!(Type::ptr().to_string(), "ptr");
        assert_eq!(Type::bool().to_string(), "bool");
    }
}
