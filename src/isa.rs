//! Instruction Set Architecture (ISA) definitions.
//!
//! Defines the VM's instruction set. The [`for_each_instruction!`](crate::for_each_instruction)
//! macro holds the canonical instruction definitions and invokes a callback
//! macro for code generation, so multiple modules can generate
//! instruction-related code without duplicating the definitions.
//!
//! This module generates:
//! - The [`Opcode`] enum with mnemonic and arity tables
//! - `TryFrom<u8>` for mapping numeric opcodes
//!
//! Programs are built by direct data construction, not parsed or decoded:
//! an [`Instruction`] is an [`Opcode`] plus an ordered list of `i64`
//! operands whose meaning depends entirely on the opcode. The mnemonics in
//! the definition list are documentation only.

use crate::errors::VmError;

/// Invokes a callback macro with the complete instruction definition list.
///
/// Operand kinds are documentation for the dispatcher: `Reg` is a register
/// id, `Imm` a literal, `Cond` a condition code, `Block` a basic-block id,
/// and `Func` a function-registry id.
#[macro_export]
macro_rules! for_each_instruction {
    ($callback:ident) => {
        $callback! {
            /// ALLOCA dst, size ; dst = base address of a fresh `size`-byte region
            Alloca = 0x00, "ALLOCA" => [dst: Reg, size: Imm],
            /// IMM dst, value ; dst = value
            Imm = 0x01, "IMM" => [dst: Reg, value: Imm],
            /// ADD dst, a, b ; dst = a + b (64-bit, wraps on overflow)
            Add = 0x02, "ADD" => [dst: Reg, a: Reg, b: Reg],
            /// CMP dst, cond, a, b ; dst = 1 if three-way-compare(a, b) == cond else 0
            Cmp = 0x03, "CMP" => [dst: Reg, cond: Cond, a: Reg, b: Reg],
            /// BR cond, t, f ; jump to block t if cond != 0, else block f
            Br = 0x04, "BR" => [cond: Reg, t: Block, f: Block],
            /// CALL func ; push a fresh context at func's entry block
            Call = 0x05, "CALL" => [func: Func],
            /// RET ; pop the current context, releasing its allocations
            Ret = 0x06, "RET" => [],
            /// COPY dst, src ; dst = src
            Copy = 0x07, "COPY" => [dst: Reg, src: Reg],
            /// LOAD dst, addr ; dst = 8 bytes read at address in addr
            Load = 0x08, "LOAD" => [dst: Reg, addr: Reg],
            /// STORE val, addr ; write val as 8 bytes at address in addr
            Store = 0x09, "STORE" => [val: Reg, addr: Reg],
            /// DEBUG reg ; emit the decimal value of reg to the debug sink
            Debug = 0x0A, "DEBUG" => [reg: Reg],
        }
    };
}

#[macro_export]
macro_rules! define_instructions {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:expr, $mnemonic:literal => [
                $( $field:ident : $kind:ident ),* $(,)?
            ]
        ),* $(,)?
    ) => {
        /// VM opcode.
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        pub enum Opcode {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        impl TryFrom<u8> for Opcode {
            type Error = VmError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $( $opcode => Ok(Opcode::$name), )*
                    _ => Err(VmError::UnknownOpcode { opcode: value }),
                }
            }
        }

        impl Opcode {
            /// Returns the assembly-style mnemonic for this opcode.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( Opcode::$name => $mnemonic, )*
                }
            }

            /// Returns the fixed operand count for this opcode.
            pub const fn arity(&self) -> usize {
                match self {
                    $( Opcode::$name => (&[$( stringify!($field) ),*] as &[&str]).len(), )*
                }
            }
        }
    };
}

for_each_instruction!(define_instructions);

/// Condition code: the three-way result of comparing two register values.
///
/// The numeric values (-1/0/1) are what CMP's `cond` immediate carries.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(i64)]
pub enum Cond {
    /// First operand compares less than the second.
    Lt = -1,
    /// Operands compare equal.
    Eq = 0,
    /// First operand compares greater than the second.
    Gt = 1,
}

impl TryFrom<i64> for Cond {
    type Error = VmError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Cond::Lt),
            0 => Ok(Cond::Eq),
            1 => Ok(Cond::Gt),
            _ => Err(VmError::InvalidCondition { value }),
        }
    }
}

impl From<std::cmp::Ordering> for Cond {
    fn from(ord: std::cmp::Ordering) -> Self {
        match ord {
            std::cmp::Ordering::Less => Cond::Lt,
            std::cmp::Ordering::Equal => Cond::Eq,
            std::cmp::Ordering::Greater => Cond::Gt,
        }
    }
}

/// One VM instruction: an opcode plus its ordered operand list.
///
/// Immutable once constructed. Operand count is checked against the opcode's
/// arity when the containing function is registered, not here.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Instruction {
    /// The operation to perform.
    pub opcode: Opcode,
    /// Ordered 64-bit integer operands; meaning depends on the opcode.
    pub operands: Vec<i64>,
}

impl Instruction {
    /// Creates a new instruction from an opcode and operand list.
    pub fn new(opcode: Opcode, operands: impl Into<Vec<i64>>) -> Self {
        Self {
            opcode,
            operands: operands.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_try_from_invalid() {
        assert!(matches!(
            Opcode::try_from(0xFF),
            Err(VmError::UnknownOpcode { opcode: 0xFF })
        ));
    }

    #[test]
    fn cond_try_from_matches_discriminants() {
        assert_eq!(Cond::try_from(-1), Ok(Cond::Lt));
        assert_eq!(Cond::try_from(0), Ok(Cond::Eq));
        assert_eq!(Cond::try_from(1), Ok(Cond::Gt));
        assert!(matches!(
            Cond::try_from(2),
            Err(VmError::InvalidCondition { value: 2 })
        ));
    }
}
