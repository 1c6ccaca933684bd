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
use std::slice;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// This holds both the opcode of a given instruction and all the state
/// that makes up that specific instruction.
///
/// While each instruction may have wildly different actual data, they all
/// are stored in the same table and all inside the same `InstData` type.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum InstData {
    /// `%v = load T, ptr %addr`, reads memory at `%addr`.
    Load(LoadInst),
    /// `store T %v, ptr %addr`, writes `%v` to memory at `%addr`.
    Store(StoreInst),
    /// `call T @function(args...)`, models a direct call to a known function.
    Call(CallInst),
    /// `call T %var(args...)`, models an indirect call through a pointer.
    IndirectCall(IndirectCallInst),
    /// `%v = alloca T`, reserves a slot of stack storage.
    Alloca(AllocaInst),
    /// `%v = phi T [%a, %b, ...]`, merges one value per incoming edge.
    /// φs must lead their block.
    Phi(PhiInst),
    /// `iadd T %a, %b`, integer addition
    IAdd(ArithInst),
    /// `isub T %a, %b`, integer subtraction
    ISub(ArithInst),
    /// `imul T %a, %b`, integer multiplication
    IMul(ArithInst),
    /// `icmp op T %a, %b`, models an integer comparison
    ICmp(ICmpInst),
    /// `br block`, models an unconditional branch
    Br(BrInst),
    /// `condbr bool %cond, if block1, else block2`, a two-way branch
    CondBr(CondBrInst),
    /// `ret T %v` / `ret void`, returns from the function
    Ret(RetInst),
}

impl InstData {
    /// Gets any values that the instruction operates on.
    ///
    /// Note that this may be an empty array, it is not safe to assume that
    /// there will be at least one operand.
    pub fn operands(&self) -> &[Value] {
        match self {
            Self::Load(i) => &i.operand,
            Self::Store(i) => &i.operands,
            Self::Call(i) => &i.args,
            Self::IndirectCall(i) => &i.operands,
            Self::Alloca(_) => &[],
            Self::Phi(i) => &i.incoming,
            Self::IAdd(i) | Self::ISub(i) | Self::IMul(i) => &i.operands,
            Self::ICmp(i) => &i.operands,
            Self::Br(_) => &[],
            Self::CondBr(i) => slice::from_ref(&i.cond),
            Self::Ret(i) => match &i.value {
                Some(value) => slice::from_ref(value),
                None => &[],
            },
        }
    }

    /// Gets the type of the instruction's result after it has been evaluated.
    ///
    /// Not all instructions will have one of these, e.g. terminators,
    /// `call void`s and `store`s do not evaluate to anything.
    pub fn result_ty(&self) -> Option<Type> {
        match self {
            Self::Load(i) => Some(i.ty),
            Self::Store(_) => None,
            Self::Call(i) => i.ret,
            Self::IndirectCall(i) => i.ret,
            Self::Alloca(_) => Some(Type::ptr()),
            Self::Phi(i) => Some(i.ty),
            Self::IAdd(i) | Self::ISub(i) | Self::IMul(i) => Some(i.ty),
            Self::ICmp(_) => Some(Type::bool()),
            Self::Br(_) | Self::CondBr(_) | Self::Ret(_) => None,
        }
    }

    /// Gets the possible blocks where control could be transferred to once
    /// this instruction is executed. Empty for non-terminators and `ret`.
    pub fn targets(&self) -> &[Block] {
        match self {
            Self::Br(i) => slice::from_ref(&i.target),
            Self::CondBr(i) => &i.targets,
            _ => &[],
        }
    }

    /// Checks if the instruction is one of the block-ending instructions.
    pub fn is_terminator(&self) -> bool {
        matches!(self, Self::Br(_) | Self::CondBr(_) | Self::Ret(_))
    }

    /// Checks if the instruction is a φ node.
    pub fn is_phi(&self) -> bool {
        matches!(self, Self::Phi(_))
    }
}

/// Models a single `load` instruction.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct LoadInst {
    pub(in crate::ir) ty: Type,
    pub(in crate::ir) operand: [Value; 1],
}

impl LoadInst {
    /// The address being read from.
    pub fn pointer(&self) -> Value {
        self.operand[0]
    }

    /// The type of the loaded value.
    pub fn loaded_ty(&self) -> Type {
        self.ty
    }
}

/// Models a single `store` instruction.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct StoreInst {
    // operands[0] is the stored value, operands[1] the address
    pub(in crate::ir) operands: [Value; 2],
}

impl StoreInst {
    /// The value being written.
    pub fn stored(&self) -> Value {
        self.operands[0]
    }

    /// The address being written to.
    pub fn pointer(&self) -> Value {
        self.operands[1]
    }
}

/// Models a direct call to a function known at compile time.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct CallInst {
    pub(in crate::ir) callee: Func,
    pub(in crate::ir) ret: Option<Type>,
    pub(in crate::ir) args: SmallVec<[Value; 4]>,
}

impl CallInst {
    /// The function being called.
    pub fn callee(&self) -> Func {
        self.callee
    }

    /// The actual arguments, in declaration order.
    pub fn args(&self) -> &[Value] {
        &self.args
    }
}

/// Models an indirect call through a function pointer.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct IndirectCallInst {
    pub(in crate::ir) ret: Option<Type>,
    // operands[0] is the callee pointer, the rest are arguments
    pub(in crate::ir) operands: SmallVec<[Value; 4]>,
}

impl IndirectCallInst {
    /// The pointer being called through.
    pub fn callee_ptr(&self) -> Value {
        self.operands[0]
    }

    /// The actual arguments, in declaration order.
    pub fn args(&self) -> &[Value] {
        &self.operands[1..]
    }
}

/// Models a stack allocation.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct AllocaInst {
    pub(in crate::ir) alloc_ty: Type,
}

impl AllocaInst {
    /// The type being allocated storage for.
    pub fn alloc_ty(&self) -> Type {
        self.alloc_ty
    }
}

/// Models a φ node. GIR φs carry their incoming values only; the association
/// with incoming edges is positional and is not consumed by any analysis
/// in this crate.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct PhiInst {
    pub(in crate::ir) ty: Type,
    pub(in crate::ir) incoming: SmallVec<[Value; 2]>,
}

impl PhiInst {
    /// The values merged by this φ, one per incoming edge.
    pub fn incoming(&self) -> &[Value] {
        &self.incoming
    }
}

/// Shared payload for the two-operand integer arithmetic instructions.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct ArithInst {
    pub(in crate::ir) ty: Type,
    pub(in crate::ir) operands: [Value; 2],
}

impl ArithInst {
    /// Gets the left-hand operand. For `inst T %a, %b` this is `%a`.
    pub fn lhs(&self) -> Value {
        self.operands[0]
    }

    /// Gets the right-hand operand. For `inst T %a, %b` this is `%b`.
    pub fn rhs(&self) -> Value {
        self.operands[1]
    }
}

/// Models the different ways that integer values can be compared
/// using the `icmp` instruction.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum ICmpOp {
    /// `eq`, checks if the integers are (bitwise) equivalent
    EQ,
    /// `ne`, checks if the integers are (bitwise) not-equal
    NE,
    /// `sgt`, treats both integers as signed and checks if `a > b`
    SGT,
    /// `slt`, treats both integers as signed and checks if `a < b`
    SLT,
    /// `sge`, treats both integers as signed and checks if `a >= b`
    SGE,
    /// `sle`, treats both integers as signed and checks if `a <= b`
    SLE,
}

/// Models a single `icmp` instruction.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct ICmpInst {
    pub(in crate::ir) comparison: ICmpOp,
    pub(in crate::ir) operands: [Value; 2],
}

impl ICmpInst {
    /// The comparison being performed.
    pub fn op(&self) -> ICmpOp {
        self.comparison
    }
}

/// Models an unconditional branch.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct BrInst {
    pub(in crate::ir) target: Block,
}

impl BrInst {
    /// The block branched to.
    pub fn target(&self) -> Block {
        self.target
    }
}

/// Models a conditional branch between two blocks.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct CondBrInst {
    pub(in crate::ir) cond: Value,
    pub(in crate::ir) targets: [Block; 2],
}

impl CondBrInst {
    /// The boolean being branched on.
    pub fn condition(&self) -> Value {
        self.cond
    }

    /// The block taken when the condition is true.
    pub fn true_branch(&self) -> Block {
        self.targets[0]
    }

    /// The block taken when the condition is false.
    pub fn false_branch(&self) -> Block {
        self.targets[1]
    }
}

/// Models a return, with or without a value.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct RetInst {
    pub(in crate::ir) value: Option<Value>,
}

impl RetInst {
    /// The value being returned, if the function is not `void`.
    pub fn value(&self) -> Option<Value> {
        self.value
    }
}
