//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::ir::{
    BasicBlock, Block, BrInst, CallInst, Func, FuncBuilder, Function, Inst, InstData, Signature,
    Type, Value,
};
use crate::utility::SaHashMap;
use slotmap::{SecondaryMap, SlotMap};
use smallvec::SmallVec;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// Models where a given value came from.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum ValueDef {
    /// The value is the result yielded by an instruction
    Inst(Inst),
    /// The value is the nth formal parameter of a function
    Param(Func, u32),
    /// The value is the address of a module-level global
    Global,
    /// The value is an integer constant
    Const(i64),
}

#[derive(Debug, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
struct ValueData {
    ty: Type,
    name: Option<String>,
    def: ValueDef,
}

/// Contains all the data necessary for a single module of GIR.
///
/// GIR is a whole-program IR: a module owns every function, block,
/// instruction and value in the program, all in one set of arenas. This
/// is what gives value handles program-wide identity, which interprocedural
/// passes lean on.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Module {
    name: String,
    funcs: SlotMap<Func, Function>,
    // function declaration order, the iteration order promised by `functions`
    order: Vec<Func>,
    names: SaHashMap<String, Func>,
    blocks: SlotMap<Block, BasicBlock>,
    insts: SlotMap<Inst, InstData>,
    results: SecondaryMap<Inst, Value>,
    values: SlotMap<Value, ValueData>,
    globals: Vec<Value>,
    splits: u32,
}

impl Module {
    /// Creates a new, empty module with a given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Self::default()
        }
    }

    /// Gets the name the module was created with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declares a function without providing it a definition. It can be
    /// defined later with [`Self::define_existing_function`], or it can be
    /// left as-is if the function is opaque to this module.
    ///
    /// The formal parameter values are created here, one per signature
    /// parameter, named after it.
    pub fn declare_function(&mut self, name: &str, sig: Signature) -> Func {
        debug_assert!(
            self.find_function_by_name(name).is_none(),
            "redeclaring function `{name}`"
        );

        let params: SmallVec<[(String, Type); 4]> = sig.params.clone();
        let func = self.funcs.insert_with_key(|func| Function {
            name: name.to_owned(),
            sig,
            func,
            params: SmallVec::default(),
            blocks: Vec::default(),
        });

        for (i, (param_name, ty)) in params.into_iter().enumerate() {
            let val = self.values.insert(ValueData {
                ty,
                name: Some(param_name),
                def: ValueDef::Param(func, i as u32),
            });

            self.funcs[func].params.push(val);
        }

        self.order.push(func);
        self.names.insert(name.to_owned(), func);

        func
    }

    /// Declares and then defines a new function.
    pub fn define_function(&mut self, name: &str, sig: Signature) -> FuncBuilder<'_> {
        let func = self.declare_function(name, sig);

        self.define_existing_function(func)
    }

    /// Returns a [`FuncBuilder`] that will create a body for a
    /// previously-declared function.
    pub fn define_existing_function(&mut self, func: Func) -> FuncBuilder<'_> {
        FuncBuilder::new(self, func)
    }

    /// Creates a module-level global and returns the value that refers to
    /// its address. Globals are always named and always of pointer type.
    pub fn define_global(&mut self, name: &str) -> Value {
        let val = self.values.insert(ValueData {
            ty: Type::ptr(),
            name: Some(name.to_owned()),
            def: ValueDef::Global,
        });

        self.globals.push(val);

        val
    }

    /// Creates an unnamed integer constant value.
    pub fn iconst(&mut self, ty: Type, imm: i64) -> Value {
        debug_assert!(ty.is_int());

        self.values.insert(ValueData {
            ty,
            name: None,
            def: ValueDef::Const(imm),
        })
    }

    /// Returns an iterator over all of the functions in the module,
    /// in declaration order.
    pub fn functions(&self) -> impl Iterator<Item = Func> + '_ {
        self.order.iter().copied()
    }

    /// Resolves a [`Func`] into a real function object.
    pub fn function(&self, func: Func) -> &Function {
        &self.funcs[func]
    }

    /// Finds a [`Func`] with a given name. If the function has not been
    /// added to the module, `None` is returned.
    pub fn find_function_by_name(&self, func: &str) -> Option<Func> {
        self.names.get(func).copied()
    }

    /// Gets the addresses of every global in the module, in definition order.
    pub fn globals(&self) -> &[Value] {
        &self.globals
    }

    /// Resolves a [`Block`] into its block data.
    pub fn block(&self, block: Block) -> &BasicBlock {
        &self.blocks[block]
    }

    /// Gets a single instruction's [`InstData`].
    pub fn inst_data(&self, inst: Inst) -> &InstData {
        &self.insts[inst]
    }

    /// Converts an [`Inst`] into a [`Value`] referring to its result if and
    /// only if that instruction actually yields a result.
    pub fn inst_to_result(&self, inst: Inst) -> Option<Value> {
        self.results.get(inst).copied()
    }

    /// Converts a [`Value`] into an [`Inst`] if and only if that value
    /// refers to an instruction's result.
    pub fn value_to_inst(&self, value: Value) -> Option<Inst> {
        match self.values[value].def {
            ValueDef::Inst(inst) => Some(inst),
            _ => None,
        }
    }

    /// Gets the type of the value that a given [`Value`] evaluates to.
    pub fn ty(&self, value: Value) -> Type {
        self.values[value].ty
    }

    /// Gets the definition of a given value.
    pub fn value_def(&self, value: Value) -> ValueDef {
        self.values[value].def
    }

    /// Gets the name of a value, if it has one. Globals, formal parameters
    /// and explicitly-named instruction results have names; temporaries and
    /// constants do not.
    pub fn value_name(&self, value: Value) -> Option<&str> {
        self.values[value].name.as_deref()
    }

    /// The named-value predicate: memory analyses only track addresses
    /// they can name.
    pub fn value_has_name(&self, value: Value) -> bool {
        self.values[value].name.is_some()
    }

    /// Checks if a value is the result of a φ node.
    pub fn value_is_phi(&self, value: Value) -> bool {
        match self.values[value].def {
            ValueDef::Inst(inst) => self.insts[inst].is_phi(),
            _ => false,
        }
    }

    /// Gets the immediate of a constant value, if the value is a constant.
    pub fn value_as_const(&self, value: Value) -> Option<i64> {
        match self.values[value].def {
            ValueDef::Const(imm) => Some(imm),
            _ => None,
        }
    }

    /// Assigns a name to a value. Mostly useful for making instruction
    /// results visible to the memory analyses in tests.
    pub fn name_value(&mut self, value: Value, name: &str) {
        self.values[value].name = Some(name.to_owned());
    }

    /// Splits `block` in two at instruction index `at`.
    ///
    /// The instructions at `insts[at..]` move into a fresh block that is
    /// placed immediately after `block` in the function's layout, and
    /// `block` is given an unconditional branch to the new block as its new
    /// terminator. Returns the new block.
    pub fn split_block(&mut self, block: Block, at: usize) -> Block {
        let data = &mut self.blocks[block];

        debug_assert!(
            at >= 1 && at < data.insts.len(),
            "cannot split block `{}` at instruction {at}",
            data.name
        );

        let func = data.func;
        let tail = data.insts.split_off(at);
        let name = format!("{}.split{}", data.name, self.splits);

        self.splits += 1;

        let new = self.blocks.insert(BasicBlock { name, func, insts: tail });

        // new block goes right after the original so that layout order still
        // ends at the function's exit block
        let blocks = &mut self.funcs[func].blocks;
        let pos = blocks
            .iter()
            .position(|&bb| bb == block)
            .expect("split target not in its function's layout");

        blocks.insert(pos + 1, new);
        self.append_inst(block, InstData::Br(BrInst { target: new }));

        new
    }

    /// Inserts an instruction into the module and appends it to the end of
    /// `block`. If the instruction yields a result, that value is also
    /// returned.
    pub fn append_inst(&mut self, block: Block, data: InstData) -> (Inst, Option<Value>) {
        let len = self.blocks[block].insts.len();

        self.insert_inst_at(block, len, data)
    }

    /// Inserts an instruction into `block` at instruction index `at`,
    /// shifting everything at and beyond `at` down by one.
    pub fn insert_inst_at(
        &mut self,
        block: Block,
        at: usize,
        data: InstData,
    ) -> (Inst, Option<Value>) {
        let result = data.result_ty();
        let inst = self.insts.insert(data);
        let val = result.map(|ty| {
            let val = self.values.insert(ValueData {
                ty,
                name: None,
                def: ValueDef::Inst(inst),
            });

            self.results.insert(inst, val);

            val
        });

        self.blocks[block].insts.insert(at, inst);

        (inst, val)
    }

    /// Inserts a direct call to `callee` into `block` at instruction index
    /// `at`. The return type comes from the callee's signature.
    pub fn insert_call_at(&mut self, block: Block, at: usize, callee: Func, args: &[Value]) -> Inst {
        let ret = self.function(callee).return_ty();
        let (inst, _) = self.insert_inst_at(
            block,
            at,
            InstData::Call(CallInst {
                callee,
                ret,
                args: SmallVec::from_slice(args),
            }),
        );

        inst
    }

    pub(in crate::ir) fn create_block(&mut self, func: Func, name: &str) -> Block {
        let block = self.blocks.insert(BasicBlock {
            name: name.to_owned(),
            func,
            insts: Vec::default(),
        });

        self.funcs[func].blocks.push(block);

        block
    }
}
