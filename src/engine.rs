//! Core execution engine.
//!
//! The engine owns a call stack of per-activation contexts and drives the
//! fetch-execute loop: fetch the instruction at the top context's program
//! counter, advance the instruction index, dispatch on opcode. CALL pushes a
//! fresh context, RET pops one and releases its allocations, and execution
//! halts quietly when the stack empties. All arithmetic uses wrapping
//! semantics to prevent overflow panics.
//!
//! Engines share no state with one another; independent instances may run
//! on separate threads with no coordination.

use crate::engine::context::{FunctionContext, Pc};
use crate::engine::memory::AddressSpace;
use crate::errors::VmError;
use crate::isa::{Cond, Instruction, Opcode};
use crate::program::{FuncId, FunctionRegistry};

mod context;
mod memory;
mod registers;
mod sink;

pub use registers::RegisterPolicy;
pub use sink::{DebugSink, StderrSink};

macro_rules! exec_engine {
    // Entry point
    (
        engine = $engine:ident,
        sink = $sink:ident,
        instr = $instr:ident,
        { $( $variant:ident => $handler:ident $args:tt ),* $(,)? }
    ) => {{
        match $instr.opcode {
            $(
                Opcode::$variant => exec_engine!(@call $engine, $sink, $instr, $handler, $args),
            )*
        }
    }};

    // Handler that writes to the debug sink (semicolon separator)
    (@call $engine:ident, $sink:ident, $instr:ident, $handler:ident,
        (sink; $( $field:ident : $kind:ident ),* $(,)? )
    ) => {{
        let mut operands = $instr.operands.iter().copied();
        $( let $field = exec_engine!(@next $instr, operands); )*
        $engine.$handler($sink, $( $field ),*)
    }};

    // Zero-operand handler; no cursor needed
    (@call $engine:ident, $sink:ident, $instr:ident, $handler:ident, ()) => {
        $engine.$handler()
    };

    // Handler without sink access
    (@call $engine:ident, $sink:ident, $instr:ident, $handler:ident,
        ( $( $field:ident : $kind:ident ),* $(,)? )
    ) => {{
        let mut operands = $instr.operands.iter().copied();
        $( let $field = exec_engine!(@next $instr, operands); )*
        $engine.$handler($( $field ),*)
    }};

    // Pulls the next operand off the cursor. Arity is validated when the
    // function is registered, so this only trips on a dispatch-table bug.
    (@next $instr:ident, $ops:ident) => {
        $ops.next().ok_or(VmError::ArityMismatch {
            mnemonic: $instr.opcode.mnemonic(),
            expected: $instr.opcode.arity(),
            actual: $instr.operands.len(),
        })?
    };
}

/// The virtual machine's execution engine.
///
/// Borrows a [`FunctionRegistry`] for the duration of a program run and
/// executes validated functions out of it until the call stack empties.
/// Debug output goes to the [`DebugSink`] injected into [`run`](Self::run).
pub struct ExecutionEngine<'p> {
    /// Registry CALL operands resolve through.
    registry: &'p FunctionRegistry,
    /// Call stack, innermost activation at the top.
    stack: Vec<FunctionContext>,
    /// All live allocations across the stack.
    memory: AddressSpace,
    /// Policy applied to every activation's register file.
    register_policy: RegisterPolicy,
}

impl<'p> ExecutionEngine<'p> {
    /// Creates an engine with bounds-checked memory and the default
    /// [`RegisterPolicy`].
    pub fn new(registry: &'p FunctionRegistry) -> Self {
        Self {
            registry,
            stack: Vec::new(),
            memory: AddressSpace::new(),
            register_policy: RegisterPolicy::default(),
        }
    }

    /// Creates an engine whose LOAD and STORE reinterpret register values as
    /// raw host addresses with no bounds or liveness checking.
    ///
    /// # Safety
    ///
    /// Any program run on this engine can read and write arbitrary host
    /// memory. Only run programs trusted to confine themselves to addresses
    /// obtained from their own live ALLOCAs.
    pub unsafe fn new_with_raw_memory(registry: &'p FunctionRegistry) -> Self {
        Self {
            // SAFETY: forwarded to the caller's contract.
            memory: unsafe { AddressSpace::raw() },
            ..Self::new(registry)
        }
    }

    /// Sets the policy for reads of never-assigned registers.
    pub fn set_register_policy(&mut self, policy: RegisterPolicy) {
        self.register_policy = policy;
    }

    /// Returns the current call-stack depth.
    pub fn call_depth(&self) -> usize {
        self.stack.len()
    }

    /// Runs `entry` until the call stack empties.
    ///
    /// Pushes one activation for the entry function and iterates the
    /// fetch-execute loop. Returns when the outermost RET pops the last
    /// context (quiet success) or an error terminates execution. A
    /// well-formed program that never returns loops forever; there is no
    /// step limit or timeout.
    pub fn run<S: DebugSink>(&mut self, entry: FuncId, sink: &mut S) -> Result<(), VmError> {
        let function = self.registry.get(entry)?;
        self.stack.push(FunctionContext::new(
            Pc {
                function: entry,
                block: function.entry(),
                index: 0,
            },
            self.register_policy,
        ));

        while let Some(pc) = self.stack.last().map(|ctx| ctx.pc) {
            self.step(pc, sink)?;
        }
        Ok(())
    }

    /// Fetches, advances past, and executes the instruction at `pc`.
    fn step<S: DebugSink>(&mut self, pc: Pc, sink: &mut S) -> Result<(), VmError> {
        let function = self.registry.get(pc.function)?;
        let block = function
            .block(pc.block)
            .ok_or_else(|| VmError::UnknownBlock {
                function: function.name().to_string(),
                block: pc.block,
            })?;
        let instr = block
            .get(pc.index)
            .ok_or_else(|| VmError::MissingTerminator {
                function: function.name().to_string(),
                block: pc.block,
            })?
            .clone();

        // BR/CALL/RET overwrite the fields this advance touches.
        self.context_mut().pc.index += 1;
        self.exec(&instr, sink)
    }

    /// Dispatches a single instruction to its handler.
    fn exec<S: DebugSink>(&mut self, instr: &Instruction, sink: &mut S) -> Result<(), VmError> {
        exec_engine! {
            engine = self,
            sink = sink,
            instr = instr,
            {
                Alloca => op_alloca(dst: Reg, size: Imm),
                Imm => op_imm(dst: Reg, value: Imm),
                Add => op_add(dst: Reg, a: Reg, b: Reg),
                Cmp => op_cmp(dst: Reg, cond: Cond, a: Reg, b: Reg),
                Br => op_br(cond: Reg, t: Block, f: Block),
                Call => op_call(func: Func),
                Ret => op_ret(),
                Copy => op_copy(dst: Reg, src: Reg),
                Load => op_load(dst: Reg, addr: Reg),
                Store => op_store(val: Reg, addr: Reg),
                Debug => op_debug(sink; reg: Reg),
            }
        }
    }

    /// Returns the executing activation.
    fn context_mut(&mut self) -> &mut FunctionContext {
        match self.stack.last_mut() {
            Some(ctx) => ctx,
            // Instructions only execute while the stack is non-empty.
            None => unreachable!("instruction executed with empty call stack"),
        }
    }

    fn op_alloca(&mut self, dst: i64, size: i64) -> Result<(), VmError> {
        let base = self.memory.allocate(size)?;
        let ctx = self.context_mut();
        ctx.registers.set(dst, base as i64);
        ctx.allocations.push((dst, base));
        Ok(())
    }

    fn op_imm(&mut self, dst: i64, value: i64) -> Result<(), VmError> {
        self.context_mut().registers.set(dst, value);
        Ok(())
    }

    fn op_add(&mut self, dst: i64, a: i64, b: i64) -> Result<(), VmError> {
        let ctx = self.context_mut();
        let va = ctx.registers.get(a)?;
        let vb = ctx.registers.get(b)?;
        ctx.registers.set(dst, va.wrapping_add(vb));
        Ok(())
    }

    fn op_cmp(&mut self, dst: i64, cond: i64, a: i64, b: i64) -> Result<(), VmError> {
        let cond = Cond::try_from(cond)?;
        let ctx = self.context_mut();
        let va = ctx.registers.get(a)?;
        let vb = ctx.registers.get(b)?;
        let flag = Cond::from(va.cmp(&vb));
        ctx.registers.set(dst, (flag == cond) as i64);
        Ok(())
    }

    /// BR always jumps; there is no fallthrough case.
    fn op_br(&mut self, cond: i64, t: i64, f: i64) -> Result<(), VmError> {
        let ctx = self.context_mut();
        let taken = ctx.registers.get(cond)? != 0;
        ctx.pc.index = 0;
        ctx.pc.block = if taken { t } else { f };
        Ok(())
    }

    fn op_call(&mut self, func: i64) -> Result<(), VmError> {
        let id = self.registry.resolve(func)?;
        let entry = self.registry.get(id)?.entry();
        self.stack.push(FunctionContext::new(
            Pc {
                function: id,
                block: entry,
                index: 0,
            },
            self.register_policy,
        ));
        Ok(())
    }

    fn op_ret(&mut self) -> Result<(), VmError> {
        if let Some(ctx) = self.stack.pop() {
            for (_, base) in ctx.allocations {
                self.memory.release(base);
            }
        }
        Ok(())
    }

    fn op_copy(&mut self, dst: i64, src: i64) -> Result<(), VmError> {
        let ctx = self.context_mut();
        let value = ctx.registers.get(src)?;
        ctx.registers.set(dst, value);
        Ok(())
    }

    fn op_load(&mut self, dst: i64, addr: i64) -> Result<(), VmError> {
        let address = self.context_mut().registers.get(addr)?;
        let value = self.memory.load(address)?;
        self.context_mut().registers.set(dst, value);
        Ok(())
    }

    fn op_store(&mut self, val: i64, addr: i64) -> Result<(), VmError> {
        let ctx = self.context_mut();
        let value = ctx.registers.get(val)?;
        let address = ctx.registers.get(addr)?;
        self.memory.store(address, value)
    }

    fn op_debug<S: DebugSink>(&mut self, sink: &mut S, reg: i64) -> Result<(), VmError> {
        let value = self.context_mut().registers.get(reg)?;
        sink.emit(value);
        Ok(())
    }
}
