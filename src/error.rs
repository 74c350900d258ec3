//! Error taxonomy and the fatal-error hook.

use thiserror::Error;

/// Everything that can go wrong while loading or executing bytecode.
///
/// Runtime variants are fatal: the engine hands them to the machine's
/// error hook and halts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("register {index} out of bounds (machine has {count} registers)")]
    IndexOutOfBounds { index: usize, count: usize },
    #[error("register {index} holds {actual}, expected {expected}")]
    TypeMismatch {
        index: usize,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("attempted division by zero")]
    DivisionByZero,
    #[error("stack overflow - stack is full ({capacity} entries)")]
    StackOverflow { capacity: usize },
    #[error("stack underflow - stack is empty")]
    StackUnderflow,
    #[error("address {address:#06X} is outside the {size:#X}-byte address space")]
    AddressOutOfRange { address: usize, size: usize },
    #[error("unrecognized opcode {opcode:#04X} at {ip:#06X}")]
    UnrecognizedOpcode { opcode: u8, ip: usize },
    #[error("register {index} holds {text:?}, which is not an integer")]
    InvalidInteger { index: usize, text: String },
    #[error("failed writing output: {0}")]
    Output(String),
    #[error("program is empty")]
    EmptyProgram,
    #[error("program is {len} bytes, the address space holds {max}")]
    ProgramTooLarge { len: usize, max: usize },
}

impl From<std::io::Error> for VmError {
    fn from(err: std::io::Error) -> Self {
        VmError::Output(err.to_string())
    }
}

/// Callback receiving fatal runtime errors.
///
/// It is expected not to return (the default terminates the process). If it
/// does return, the machine halts and `run` reports the error.
pub type ErrorHook = Box<dyn FnMut(&VmError)>;

/// Print a one-line diagnostic to stderr and exit with status 1.
pub fn default_error_hook(err: &VmError) {
    eprintln!("ERROR running script - {err}");
    std::process::exit(1);
}
