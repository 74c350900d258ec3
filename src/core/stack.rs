use crate::error::VmError;

/// Default number of entries the operand stack can hold.
pub const DEFAULT_STACK_CAPACITY: usize = 1024;

/// Fixed-capacity stack of signed 32-bit values.
///
/// `sp` counts the entries in use: it starts at 0, a push stores at `sp` and
/// then increments, a pop decrements and then reads.
#[derive(Debug, Clone)]
pub struct OperandStack {
    entries: Vec<i32>,
    sp: usize,
}

impl OperandStack {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: vec![0; capacity],
            sp: 0,
        }
    }

    pub fn push(&mut self, value: i32) -> Result<(), VmError> {
        let capacity = self.entries.len();
        let slot = self
            .entries
            .get_mut(self.sp)
            .ok_or(VmError::StackOverflow { capacity })?;
        *slot = value;
        self.sp += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<i32, VmError> {
        if self.sp == 0 {
            return Err(VmError::StackUnderflow);
        }
        self.sp -= 1;
        Ok(self.entries[self.sp])
    }

    /// Top entry without removing it.
    pub fn peek(&self) -> Option<i32> {
        self.sp.checked_sub(1).map(|top| self.entries[top])
    }

    pub fn sp(&self) -> usize {
        self.sp
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sp == 0
    }
}

impl Default for OperandStack {
    fn default() -> Self {
        Self::new(DEFAULT_STACK_CAPACITY)
    }
}
