//! Demonstration program for the k0 virtual machine.
//!
//! Builds a two-function program by direct data construction and runs it:
//! the entry function prints a literal, calls an empty callee, then prints a
//! register it never assigned. The run uses the permissive
//! `DefaultZero` register policy, so that last read prints `0` instead of
//! failing.
//!
//! Expected output on stderr:
//! ```text
//! 4096
//! 0
//! ```

use k0::engine::{ExecutionEngine, RegisterPolicy, StderrSink};
use k0::errors::VmError;
use k0::isa::{Instruction, Opcode};
use k0::program::{Function, FunctionRegistry};
use k0::{error, info};
use std::process;

fn build_program(registry: &mut FunctionRegistry) -> Result<k0::program::FuncId, VmError> {
    let mut callee = Function::new("callee", 0);
    callee.insert_block(0, vec![Instruction::new(Opcode::Ret, vec![])])?;
    let callee_id = registry.register(callee)?;

    let mut entry = Function::new("entry", 0);
    entry.insert_block(
        0,
        vec![
            Instruction::new(Opcode::Imm, vec![1, 4096]),
            Instruction::new(Opcode::Debug, vec![1]),
            Instruction::new(Opcode::Imm, vec![1, 1024]),
            Instruction::new(Opcode::Call, vec![callee_id.to_operand()]),
            Instruction::new(Opcode::Imm, vec![2, -1024]),
            Instruction::new(Opcode::Debug, vec![3]),
            Instruction::new(Opcode::Ret, vec![]),
        ],
    )?;
    registry.register(entry)
}

fn main() {
    let mut registry = FunctionRegistry::new();
    let entry = match build_program(&mut registry) {
        Ok(id) => id,
        Err(e) => {
            error!("failed to build program: {}", e);
            process::exit(1);
        }
    };

    let mut engine = ExecutionEngine::new(&registry);
    engine.set_register_policy(RegisterPolicy::DefaultZero);

    if let Err(e) = engine.run(entry, &mut StderrSink) {
        error!("vm run failed: {}", e);
        process::exit(1);
    }
    info!("halted");
}
