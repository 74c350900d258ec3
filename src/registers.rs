//! Typed register file.
//!
//! Each register owns its value outright. Writing a register drops whatever
//! it held before, so a text buffer is released exactly once when it is
//! overwritten or when the machine goes away.

use crate::error::VmError;
use crate::value::Value;

/// Number of registers in the machine (R00-R09).
pub const REGISTER_COUNT: usize = 10;

/// Register file holding VM storage.
#[derive(Debug, Clone, Default)]
pub struct RegisterFile {
    regs: [Value; REGISTER_COUNT],
}

impl RegisterFile {
    /// Creates a register file with every register set to `Integer(0)`.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.regs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regs.is_empty()
    }

    /// Returns a reference to the value in register `index`.
    ///
    /// Returns [`VmError::IndexOutOfBounds`] if `index` is out of range.
    pub fn get(&self, index: usize) -> Result<&Value, VmError> {
        self.regs.get(index).ok_or(VmError::IndexOutOfBounds {
            index,
            count: REGISTER_COUNT,
        })
    }

    /// Replaces the value in register `index`, dropping the old one.
    pub fn set(&mut self, index: usize, value: Value) -> Result<(), VmError> {
        let slot = self.regs.get_mut(index).ok_or(VmError::IndexOutOfBounds {
            index,
            count: REGISTER_COUNT,
        })?;
        *slot = value;
        Ok(())
    }

    /// Returns the integer in register `index`.
    ///
    /// Returns [`VmError::TypeMismatch`] if the register holds text.
    pub fn read_integer(&self, index: usize) -> Result<u32, VmError> {
        match self.get(index)? {
            Value::Integer(n) => Ok(*n),
            other => Err(VmError::TypeMismatch {
                index,
                expected: "Integer",
                actual: other.kind(),
            }),
        }
    }

    /// Returns the raw text bytes in register `index`.
    ///
    /// Returns [`VmError::TypeMismatch`] if the register holds an integer.
    pub fn read_text(&self, index: usize) -> Result<&[u8], VmError> {
        match self.get(index)? {
            Value::Text(s) => Ok(s),
            other => Err(VmError::TypeMismatch {
                index,
                expected: "Text",
                actual: other.kind(),
            }),
        }
    }

    pub fn write_integer(&mut self, index: usize, value: u32) -> Result<(), VmError> {
        self.set(index, Value::Integer(value))
    }

    /// Stores `value` in register `index`; the register takes ownership.
    pub fn write_text(&mut self, index: usize, value: impl Into<Vec<u8>>) -> Result<(), VmError> {
        self.set(index, Value::Text(value.into()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.regs.iter()
    }
}
