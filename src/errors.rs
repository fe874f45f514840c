use k0_derive::Error;

/// Errors that can occur during function registration or VM execution.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    /// Numeric opcode with no assigned instruction.
    #[error("unknown opcode {opcode}")]
    UnknownOpcode { opcode: u8 },
    /// Wrong number of operands for an instruction.
    #[error("{mnemonic} expects {expected} operands, got {actual}")]
    ArityMismatch {
        mnemonic: &'static str,
        expected: usize,
        actual: usize,
    },
    /// CMP condition immediate outside LT(-1)/EQ(0)/GT(1).
    #[error("invalid condition code {value}")]
    InvalidCondition { value: i64 },
    /// Entry id or branch target with no corresponding basic block.
    #[error("function {function}: no basic block with id {block}")]
    UnknownBlock { function: String, block: i64 },
    /// Same block id inserted twice while building a function.
    #[error("duplicate basic block id {block}")]
    DuplicateBlock { block: i64 },
    /// Register read before any instruction assigned to it.
    #[error("register r{register} read before assignment")]
    UnboundRegister { register: i64 },
    /// CALL operand that resolves to no registered function.
    #[error("unable to resolve call target {id}")]
    UnknownFunction { id: i64 },
    /// Execution ran past the last instruction of a block.
    #[error("function {function}: block {block} ended without a control transfer")]
    MissingTerminator { function: String, block: i64 },
    /// Load or store outside any live allocation.
    #[error("invalid memory access of {len} bytes at address {address:#x}")]
    InvalidMemoryAccess { address: u64, len: usize },
    /// ALLOCA with a non-positive size.
    #[error("invalid allocation size {size}")]
    InvalidAllocationSize { size: i64 },
}
