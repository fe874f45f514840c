//! Function and basic-block construction, and the function registry.
//!
//! A [`Function`] is a name, an entry block id, and a mapping from integer
//! block ids to [`BasicBlock`]s. Functions are built once, validated and
//! registered in a [`FunctionRegistry`], and are immutable from then on.
//! CALL operands carry a [`FuncId`] in integer form and resolve through the
//! registry at dispatch time; there is no symbol table.

use crate::errors::VmError;
use crate::isa::{Cond, Instruction, Opcode};
use std::collections::BTreeMap;

/// An ordered, uninterrupted instruction sequence.
///
/// Identified only by its integer key within the owning function's block
/// map; no implicit block exists beyond what is explicitly inserted. Control
/// only leaves a block through BR, CALL-then-fallthrough, or RET.
#[derive(Clone, Debug, Default)]
pub struct BasicBlock {
    instructions: Vec<Instruction>,
}

impl BasicBlock {
    /// Creates a block from an ordered instruction list.
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    /// Returns the instruction at `index`, if present.
    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    /// Returns the number of instructions in this block.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns `true` if this block holds no instructions.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Iterates over the instructions in program order.
    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter()
    }
}

/// A function: a name, an entry block id, and its basic blocks.
///
/// Built by inserting blocks one at a time, then handed to
/// [`FunctionRegistry::register`], which validates the block graph and
/// operand shapes before execution can reach it.
#[derive(Clone, Debug)]
pub struct Function {
    name: String,
    entry: i64,
    blocks: BTreeMap<i64, BasicBlock>,
}

impl Function {
    /// Creates an empty function with the given name and entry block id.
    pub fn new(name: impl Into<String>, entry: i64) -> Self {
        Self {
            name: name.into(),
            entry,
            blocks: BTreeMap::new(),
        }
    }

    /// Inserts a basic block under `id`.
    ///
    /// Returns [`VmError::DuplicateBlock`] if the id is already taken.
    pub fn insert_block(&mut self, id: i64, instructions: Vec<Instruction>) -> Result<(), VmError> {
        if self.blocks.contains_key(&id) {
            return Err(VmError::DuplicateBlock { block: id });
        }
        self.blocks.insert(id, BasicBlock::new(instructions));
        Ok(())
    }

    /// Returns the function's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the entry block id.
    pub fn entry(&self) -> i64 {
        self.entry
    }

    /// Returns the block with the given id, if present.
    pub fn block(&self, id: i64) -> Option<&BasicBlock> {
        self.blocks.get(&id)
    }

    /// Validates the block graph and the operand shape of every instruction.
    ///
    /// Checks that the entry block exists, that every instruction carries
    /// exactly as many operands as its opcode's arity, that BR targets name
    /// existing blocks, and that CMP condition immediates are valid codes.
    /// Whether a block actually ends in a control transfer is not checked;
    /// running past the end of a block is a runtime error.
    fn validate(&self) -> Result<(), VmError> {
        if !self.blocks.contains_key(&self.entry) {
            return Err(VmError::UnknownBlock {
                function: self.name.clone(),
                block: self.entry,
            });
        }

        for block in self.blocks.values() {
            for instr in block.iter() {
                let expected = instr.opcode.arity();
                if instr.operands.len() != expected {
                    return Err(VmError::ArityMismatch {
                        mnemonic: instr.opcode.mnemonic(),
                        expected,
                        actual: instr.operands.len(),
                    });
                }
                match instr.opcode {
                    Opcode::Br => {
                        for target in [instr.operands[1], instr.operands[2]] {
                            if !self.blocks.contains_key(&target) {
                                return Err(VmError::UnknownBlock {
                                    function: self.name.clone(),
                                    block: target,
                                });
                            }
                        }
                    }
                    Opcode::Cmp => {
                        Cond::try_from(instr.operands[1])?;
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }
}

/// Stable handle to a registered function.
///
/// CALL operands carry this id in `i64` form ([`FuncId::to_operand`]) and
/// the engine resolves it back through the registry, replacing any notion of
/// a raw in-memory function reference.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct FuncId(u32);

impl FuncId {
    /// Returns the integer form this id takes as a CALL operand.
    pub fn to_operand(self) -> i64 {
        self.0 as i64
    }
}

/// Table of registered functions, addressed by [`FuncId`].
///
/// Registration validates a function before admitting it, so everything the
/// engine fetches out of the registry has already passed the structural
/// checks in [`Function::validate`].
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: Vec<Function>,
}

impl FunctionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and registers a function, returning its id.
    ///
    /// Call targets are not validated here: a function may CALL an id that
    /// is registered later (or never, in which case dispatch reports
    /// [`VmError::UnknownFunction`]).
    pub fn register(&mut self, function: Function) -> Result<FuncId, VmError> {
        function.validate()?;
        self.functions.push(function);
        Ok(FuncId((self.functions.len() - 1) as u32))
    }

    /// Returns the function registered under `id`.
    pub fn get(&self, id: FuncId) -> Result<&Function, VmError> {
        self.functions
            .get(id.0 as usize)
            .ok_or(VmError::UnknownFunction {
                id: id.to_operand(),
            })
    }

    /// Resolves the integer form of a CALL operand back to a function id.
    pub(crate) fn resolve(&self, operand: i64) -> Result<FuncId, VmError> {
        let index = u32::try_from(operand).map_err(|_| VmError::UnknownFunction { id: operand })?;
        if (index as usize) >= self.functions.len() {
            return Err(VmError::UnknownFunction { id: operand });
        }
        Ok(FuncId(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instr(opcode: Opcode, operands: &[i64]) -> Instruction {
        Instruction::new(opcode, operands.to_vec())
    }

    #[test]
    fn register_valid_function() {
        let mut f = Function::new("main", 0);
        f.insert_block(0, vec![instr(Opcode::Ret, &[])]).unwrap();

        let mut registry = FunctionRegistry::new();
        let id = registry.register(f).unwrap();
        assert_eq!(registry.get(id).unwrap().name(), "main");
    }

    #[test]
    fn duplicate_block_id_rejected() {
        let mut f = Function::new("main", 0);
        f.insert_block(0, vec![]).unwrap();
        assert_eq!(
            f.insert_block(0, vec![]),
            Err(VmError::DuplicateBlock { block: 0 })
        );
    }

    #[test]
    fn missing_entry_block_rejected() {
        let mut f = Function::new("main", 7);
        f.insert_block(0, vec![instr(Opcode::Ret, &[])]).unwrap();

        let err = FunctionRegistry::new().register(f).unwrap_err();
        assert_eq!(
            err,
            VmError::UnknownBlock {
                function: "main".into(),
                block: 7
            }
        );
    }

    #[test]
    fn branch_to_missing_block_rejected() {
        let mut f = Function::new("main", 0);
        f.insert_block(0, vec![instr(Opcode::Br, &[1, 0, 9])])
            .unwrap();

        let err = FunctionRegistry::new().register(f).unwrap_err();
        assert_eq!(
            err,
            VmError::UnknownBlock {
                function: "main".into(),
                block: 9
            }
        );
    }

    #[test]
    fn arity_mismatch_rejected() {
        let mut f = Function::new("main", 0);
        f.insert_block(0, vec![instr(Opcode::Add, &[1, 2])]).unwrap();

        let err = FunctionRegistry::new().register(f).unwrap_err();
        assert_eq!(
            err,
            VmError::ArityMismatch {
                mnemonic: "ADD",
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn invalid_condition_code_rejected() {
        let mut f = Function::new("main", 0);
        f.insert_block(0, vec![instr(Opcode::Cmp, &[1, 5, 2, 3])])
            .unwrap();

        let err = FunctionRegistry::new().register(f).unwrap_err();
        assert_eq!(err, VmError::InvalidCondition { value: 5 });
    }

    #[test]
    fn resolve_unregistered_id_fails() {
        let registry = FunctionRegistry::new();
        assert_eq!(
            registry.resolve(3),
            Err(VmError::UnknownFunction { id: 3 })
        );
        assert_eq!(
            registry.resolve(-1),
            Err(VmError::UnknownFunction { id: -1 })
        );
    }
}
