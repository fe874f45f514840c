use super::registers::{RegisterFile, RegisterPolicy};
use crate::program::FuncId;

/// Program counter: the currently executing function, block, and
/// instruction offset within that block.
///
/// The instruction index resets to 0 on every branch, call, and return.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Pc {
    /// Currently executing function.
    pub function: FuncId,
    /// Current basic-block id within that function.
    pub block: i64,
    /// Index of the next instruction to fetch within the block.
    pub index: usize,
}

/// One activation record: the state for one in-progress call.
///
/// Created fresh on every CALL (and once for the entry invocation) with an
/// empty register file and no allocations. Exclusively owns its registers
/// and the memory regions its ALLOCAs created; the regions are released
/// exactly when the context is popped on RET, never before.
#[derive(Debug)]
pub(super) struct FunctionContext {
    /// Register file, dynamically bound on first write.
    pub(super) registers: RegisterFile,
    /// Owned allocation bases, keyed by the ALLOCA destination register.
    ///
    /// An ordered list rather than a map: re-ALLOCA into the same register
    /// keeps the displaced region alive until the context is popped.
    pub(super) allocations: Vec<(i64, u64)>,
    /// This activation's program counter.
    pub(super) pc: Pc,
}

impl FunctionContext {
    /// Creates a fresh activation starting at `pc`.
    pub(super) fn new(pc: Pc, policy: RegisterPolicy) -> Self {
        Self {
            registers: RegisterFile::new(policy),
            allocations: Vec::new(),
            pc,
        }
    }
}
