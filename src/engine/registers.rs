use crate::errors::VmError;
use std::collections::BTreeMap;

/// Policy for reading a register that was never assigned.
///
/// The VM's registers are dynamically bound: a register id becomes valid the
/// moment any instruction assigns to it, with no declaration step. What a
/// read before that first assignment means is a policy decision.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum RegisterPolicy {
    /// Reading an unbound register is an error ([`VmError::UnboundRegister`]).
    #[default]
    Fail,
    /// Reading an unbound register silently yields zero.
    DefaultZero,
}

/// Register file for one activation.
///
/// Maps register ids to 64-bit values. Ids are unconstrained; any `i64` is a
/// valid register name once written to.
#[derive(Debug)]
pub(super) struct RegisterFile {
    values: BTreeMap<i64, i64>,
    policy: RegisterPolicy,
}

impl RegisterFile {
    /// Creates an empty register file governed by `policy`.
    pub(super) fn new(policy: RegisterPolicy) -> Self {
        Self {
            values: BTreeMap::new(),
            policy,
        }
    }

    /// Returns the value in register `reg`.
    ///
    /// An unbound register reads as zero or fails depending on the policy.
    pub(super) fn get(&self, reg: i64) -> Result<i64, VmError> {
        match self.values.get(&reg) {
            Some(v) => Ok(*v),
            None => match self.policy {
                RegisterPolicy::DefaultZero => Ok(0),
                RegisterPolicy::Fail => Err(VmError::UnboundRegister { register: reg }),
            },
        }
    }

    /// Binds register `reg` to `value`.
    pub(super) fn set(&mut self, reg: i64, value: i64) {
        self.values.insert(reg, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get() {
        let mut regs = RegisterFile::new(RegisterPolicy::Fail);
        regs.set(1, 42);
        regs.set(-7, i64::MIN);
        assert_eq!(regs.get(1), Ok(42));
        assert_eq!(regs.get(-7), Ok(i64::MIN));
    }

    #[test]
    fn unbound_read_fails_under_fail_policy() {
        let regs = RegisterFile::new(RegisterPolicy::Fail);
        assert_eq!(regs.get(3), Err(VmError::UnboundRegister { register: 3 }));
    }

    #[test]
    fn unbound_read_is_zero_under_default_zero_policy() {
        let regs = RegisterFile::new(RegisterPolicy::DefaultZero);
        assert_eq!(regs.get(3), Ok(0));
    }
}
