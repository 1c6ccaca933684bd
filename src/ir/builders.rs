//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::ir::*;
use smallvec::SmallVec;

/// Helper type for building a [`Signature`].
pub struct SigBuilder {
    vararg: bool,
    ret: Option<Type>,
    params: SmallVec<[(String, Type); 4]>,
}

impl SigBuilder {
    /// Creates a [`SigBuilder`] for the signature `void ()`
    pub fn new() -> Self {
        Self {
            vararg: false,
            ret: None,
            params: SmallVec::default(),
        }
    }

    /// Marks the signature as having a variable number of arguments.
    pub fn vararg(mut self, value: bool) -> Self {
        self.vararg = value;
        self
    }

    /// Marks the signature as having a given return type.
    pub fn ret(mut self, ret: Option<Type>) -> Self {
        self.ret = ret;
        self
    }

    /// Appends a named parameter to the signature.
    pub fn param(mut self, name: &str, param: Type) -> Self {
        self.params.push((name.to_owned(), param));
        self
    }

    /// Builds the signature
    pub fn build(self) -> Signature {
        Signature {
            params: self.params,
            ret: self.ret,
            vararg: self.vararg,
        }
    }
}

impl Default for SigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper type that appends instructions to a block. Returned
/// by [`FuncBuilder::append`].
pub struct AppendBuilder<'b> {
    module: &'b mut Module,
    curr: Block,
}

impl<'b> AppendBuilder<'b> {
    /// `%v = load T, ptr %addr`
    pub fn load(self, ty: Type, addr: Value) -> Value {
        debug_assert!(self.module.ty(addr).is_ptr());

        let (_, val) = self
            .module
            .append_inst(self.curr, InstData::Load(LoadInst { ty, operand: [addr] }));

        val.unwrap()
    }

    /// `store T %v, ptr %addr`
    pub fn store(self, stored: Value, addr: Value) -> Inst {
        debug_assert!(self.module.ty(addr).is_ptr());

        let (inst, _) = self.module.append_inst(
            self.curr,
            InstData::Store(StoreInst {
                operands: [stored, addr],
            }),
        );

        inst
    }

    /// `call T @callee(args...)`. The return type comes from the callee's
    /// signature.
    pub fn call(self, callee: Func, args: &[Value]) -> Inst {
        let ret = self.module.function(callee).return_ty();
        let (inst, _) = self.module.append_inst(
            self.curr,
            InstData::Call(CallInst {
                callee,
                ret,
                args: SmallVec::from_slice(args),
            }),
        );

        inst
    }

    /// `call T %callee(args...)`, an indirect call through a pointer.
    pub fn indirect_call(self, callee: Value, ret: Option<Type>, args: &[Value]) -> Inst {
        debug_assert!(self.module.ty(callee).is_ptr());

        let mut operands = SmallVec::from_slice(args);
        operands.insert(0, callee);

        let (inst, _) = self
            .module
            .append_inst(self.curr, InstData::IndirectCall(IndirectCallInst { ret, operands }));

        inst
    }

    /// `%v = alloca T`
    pub fn alloca(self, alloc_ty: Type) -> Value {
        let (_, val) = self
            .module
            .append_inst(self.curr, InstData::Alloca(AllocaInst { alloc_ty }));

        val.unwrap()
    }

    /// `%name = phi T [incoming...]`. φ results are always named, they
    /// stand in for source-level variables.
    pub fn phi(self, ty: Type, incoming: &[Value], name: &str) -> Value {
        let (_, val) = self.module.append_inst(
            self.curr,
            InstData::Phi(PhiInst {
                ty,
                incoming: SmallVec::from_slice(incoming),
            }),
        );
        let val = val.unwrap();

        self.module.name_value(val, name);

        val
    }

    /// `%v = iadd T %a, %b`
    pub fn iadd(self, lhs: Value, rhs: Value) -> Value {
        let ty = self.module.ty(lhs);

        self.arith(ty, lhs, rhs, InstData::IAdd)
    }

    /// `%v = isub T %a, %b`
    pub fn isub(self, lhs: Value, rhs: Value) -> Value {
        let ty = self.module.ty(lhs);

        self.arith(ty, lhs, rhs, InstData::ISub)
    }

    /// `%v = imul T %a, %b`
    pub fn imul(self, lhs: Value, rhs: Value) -> Value {
        let ty = self.module.ty(lhs);

        self.arith(ty, lhs, rhs, InstData::IMul)
    }

    /// `%v = icmp op T %a, %b`
    pub fn icmp(self, op: ICmpOp, lhs: Value, rhs: Value) -> Value {
        debug_assert_eq!(self.module.ty(lhs), self.module.ty(rhs));

        let (_, val) = self.module.append_inst(
            self.curr,
            InstData::ICmp(ICmpInst {
                comparison: op,
                operands: [lhs, rhs],
            }),
        );

        val.unwrap()
    }

    /// `%v = iconst T imm`, materializes an integer constant.
    pub fn iconst(self, ty: Type, imm: i64) -> Value {
        self.module.iconst(ty, imm)
    }

    /// `br target`
    pub fn br(self, target: Block) -> Inst {
        let (inst, _) = self
            .module
            .append_inst(self.curr, InstData::Br(BrInst { target }));

        inst
    }

    /// `condbr bool %cond, if_true, otherwise`
    pub fn condbr(self, cond: Value, if_true: Block, otherwise: Block) -> Inst {
        debug_assert!(self.module.ty(cond).is_bool());

        let (inst, _) = self.module.append_inst(
            self.curr,
            InstData::CondBr(CondBrInst {
                cond,
                targets: [if_true, otherwise],
            }),
        );

        inst
    }

    /// `ret T %v`
    pub fn ret_val(self, value: Value) -> Inst {
        let (inst, _) = self
            .module
            .append_inst(self.curr, InstData::Ret(RetInst { value: Some(value) }));

        inst
    }

    /// `ret void`
    pub fn ret_void(self) -> Inst {
        let (inst, _) = self
            .module
            .append_inst(self.curr, InstData::Ret(RetInst { value: None }));

        inst
    }

    fn arith(
        self,
        ty: Type,
        lhs: Value,
        rhs: Value,
        opcode: fn(ArithInst) -> InstData,
    ) -> Value {
        debug_assert_eq!(self.module.ty(lhs), self.module.ty(rhs));

        let (_, val) = self.module.append_inst(
            self.curr,
            opcode(ArithInst {
                ty,
                operands: [lhs, rhs],
            }),
        );

        val.unwrap()
    }
}

/// Helper type for building a GIR function.
///
/// Instructions are written straight into the module; [`Self::define`]
/// merely finishes the builder and hands the [`Func`] back.
pub struct FuncBuilder<'m> {
    module: &'m mut Module,
    func: Func,
    current: Option<Block>,
}

impl<'m> FuncBuilder<'m> {
    pub(in crate::ir) fn new(module: &'m mut Module, func: Func) -> Self {
        Self {
            module,
            func,
            current: None,
        }
    }

    /// Finishes defining the function.
    pub fn define(self) -> Func {
        self.func
    }

    /// Creates a single basic block and returns it. This block is appended
    /// to the end of the block list.
    ///
    /// Note that this does not switch the builder to operate on that block,
    /// you still need to call [`Self::switch_to`].
    pub fn create_block(&mut self, name: &str) -> Block {
        self.module.create_block(self.func, name)
    }

    /// Switches to inserting at a specific block.
    pub fn switch_to(&mut self, block: Block) {
        debug_assert_eq!(self.module.block(block).func(), self.func);

        self.current = Some(block);
    }

    /// Returns a builder that can be used to append an instruction to
    /// the current block.
    ///
    /// If there is no current block, this will panic.
    pub fn append(&mut self) -> AppendBuilder<'_> {
        AppendBuilder {
            module: self.module,
            curr: self.current.expect("cannot append without a current block"),
        }
    }

    /// Gets the formal parameter values of the function being built.
    pub fn func_params(&self) -> SmallVec<[Value; 4]> {
        SmallVec::from_slice(self.module.function(self.func).params())
    }

    /// Converts an [`Inst`] into a [`Value`] that refers to the result
    /// of the instruction if possible.
    ///
    /// Not all instructions actually yield results, those will return `None`
    pub fn inst_to_result(&self, inst: Inst) -> Option<Value> {
        self.module.inst_to_result(inst)
    }

    /// Assigns a name to a previously-built value.
    pub fn name_value(&mut self, value: Value, name: &str) {
        self.module.name_value(value, name)
    }

    /// Finds a [`Func`] with a given name. If the function has not been
    /// added to the module, `None` is returned.
    pub fn find_function_by_name(&self, func: &str) -> Option<Func> {
        self.module.find_function_by_name(func)
    }

    /// Gets a [`Func`] referring to the function being built.
    pub fn current_func(&self) -> Func {
        self.func
    }
}
