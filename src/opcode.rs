//! Opcode numbering and the byte-to-handler dispatch table.
//!
//! Opcodes are grouped in bunches of 16 by class: integers at 0x00, jumps at
//! 0x10, math at 0x20, strings at 0x30, comparisons at 0x40, misc at 0x50,
//! memory at 0x60 and the stack at 0x70.

use std::fmt;
use std::rc::Rc;

use crate::error::VmError;
use crate::machine::Machine;

/// Built-in instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Exit = 0x00,
    IntStore = 0x01,
    IntPrint = 0x02,
    IntToString = 0x03,
    IntRandom = 0x04,

    JumpTo = 0x10,
    JumpZ = 0x11,
    JumpNz = 0x12,

    Xor = 0x20,
    Add = 0x21,
    Sub = 0x22,
    Mul = 0x23,
    Div = 0x24,
    Inc = 0x25,
    Dec = 0x26,
    And = 0x27,
    Or = 0x28,

    StringStore = 0x30,
    StringPrint = 0x31,
    StringConcat = 0x32,
    StringSystem = 0x33,
    StringToInt = 0x34,

    CmpReg = 0x40,
    CmpImmediate = 0x41,
    CmpString = 0x42,
    IsString = 0x43,
    IsInteger = 0x44,

    Nop = 0x50,
    StoreReg = 0x51,

    Peek = 0x60,
    Poke = 0x61,
    Memcpy = 0x62,

    StackPush = 0x70,
    StackPop = 0x71,
    StackRet = 0x72,
    StackCall = 0x73,
}

impl Opcode {
    pub const ALL: [Opcode; 36] = [
        Opcode::Exit,
        Opcode::IntStore,
        Opcode::IntPrint,
        Opcode::IntToString,
        Opcode::IntRandom,
        Opcode::JumpTo,
        Opcode::JumpZ,
        Opcode::JumpNz,
        Opcode::Xor,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Div,
        Opcode::Inc,
        Opcode::Dec,
        Opcode::And,
        Opcode::Or,
        Opcode::StringStore,
        Opcode::StringPrint,
        Opcode::StringConcat,
        Opcode::StringSystem,
        Opcode::StringToInt,
        Opcode::CmpReg,
        Opcode::CmpImmediate,
        Opcode::CmpString,
        Opcode::IsString,
        Opcode::IsInteger,
        Opcode::Nop,
        Opcode::StoreReg,
        Opcode::Peek,
        Opcode::Poke,
        Opcode::Memcpy,
        Opcode::StackPush,
        Opcode::StackPop,
        Opcode::StackRet,
        Opcode::StackCall,
    ];

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Exit => "EXIT",
            Opcode::IntStore => "INT_STORE",
            Opcode::IntPrint => "INT_PRINT",
            Opcode::IntToString => "INT_TOSTRING",
            Opcode::IntRandom => "INT_RANDOM",
            Opcode::JumpTo => "JUMP_TO",
            Opcode::JumpZ => "JUMP_Z",
            Opcode::JumpNz => "JUMP_NZ",
            Opcode::Xor => "XOR",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Inc => "INC",
            Opcode::Dec => "DEC",
            Opcode::And => "AND",
            Opcode::Or => "OR",
            Opcode::StringStore => "STRING_STORE",
            Opcode::StringPrint => "STRING_PRINT",
            Opcode::StringConcat => "STRING_CONCAT",
            Opcode::StringSystem => "STRING_SYSTEM",
            Opcode::StringToInt => "STRING_TOINT",
            Opcode::CmpReg => "CMP_REG",
            Opcode::CmpImmediate => "CMP_IMMEDIATE",
            Opcode::CmpString => "CMP_STRING",
            Opcode::IsString => "IS_STRING",
            Opcode::IsInteger => "IS_INTEGER",
            Opcode::Nop => "NOP",
            Opcode::StoreReg => "STORE_REG",
            Opcode::Peek => "PEEK",
            Opcode::Poke => "POKE",
            Opcode::Memcpy => "MEMCPY",
            Opcode::StackPush => "PUSH",
            Opcode::StackPop => "POP",
            Opcode::StackRet => "RET",
            Opcode::StackCall => "CALL",
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    /// Maps a raw byte to its built-in instruction, handing the byte back
    /// when nothing is assigned to it.
    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Opcode::ALL
            .iter()
            .copied()
            .find(|op| *op as u8 == byte)
            .ok_or(byte)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// What the engine does with the instruction pointer after a handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Step one byte past the last operand the handler consumed.
    Next,
    /// The handler already set `ip`; leave it alone.
    Jumped,
}

/// Handler supplied by embedding code for an opcode byte.
pub type CustomHandler = Rc<dyn Fn(&mut Machine) -> Result<Control, VmError>>;

/// One entry of the dispatch table.
#[derive(Clone)]
pub enum Handler {
    Builtin(Opcode),
    Custom(CustomHandler),
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Builtin(op) => write!(f, "Builtin({op})"),
            Handler::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// 256-entry table mapping opcode bytes to handlers. Empty entries are
/// dispatched to the unknown-instruction path.
#[derive(Clone)]
pub struct OpcodeTable {
    entries: [Option<Handler>; 256],
}

impl OpcodeTable {
    /// Table with no handlers at all.
    pub fn empty() -> Self {
        Self {
            entries: std::array::from_fn(|_| None),
        }
    }

    /// Table with every built-in instruction installed.
    pub fn new() -> Self {
        let mut table = Self::empty();
        for op in Opcode::ALL {
            table.entries[op as usize] = Some(Handler::Builtin(op));
        }
        table
    }

    pub fn get(&self, byte: u8) -> Option<&Handler> {
        self.entries[byte as usize].as_ref()
    }

    pub fn set(&mut self, byte: u8, handler: Handler) {
        self.entries[byte as usize] = Some(handler);
    }

    /// Unmap `byte` so it falls back to the unknown-instruction path.
    pub fn clear(&mut self, byte: u8) {
        self.entries[byte as usize] = None;
    }
}

impl Default for OpcodeTable {
    fn default() -> Self {
        Self::new()
    }
}
