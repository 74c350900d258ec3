//! The execution engine.
//!
//! A [`Machine`] owns the register file, the Z flag, the operand stack and
//! the 64 KiB address space, and drives them through a fetch-decode-execute
//! loop:
//!
//! - wrap the instruction pointer to 0 once it reaches the end of memory
//! - fetch the opcode byte and look it up in the [`OpcodeTable`]
//! - run the handler, which consumes its own operand bytes
//! - step past the instruction unless the handler moved `ip` itself
//!
//! Fatal errors go to the error hook and halt the machine.

use std::io::{self, Write};
use std::rc::Rc;

use bitflags::bitflags;
use log::{debug, error, info, warn};

use crate::core::memory::decode_u16;
use crate::core::stack::DEFAULT_STACK_CAPACITY;
use crate::core::{AddressSpace, OperandStack};
use crate::error::{ErrorHook, VmError, default_error_hook};
use crate::handlers;
use crate::opcode::{Control, Handler, OpcodeTable};
use crate::registers::RegisterFile;

bitflags! {
    /// CPU flags. Only Z exists: set when an arithmetic result is exactly
    /// zero, or when a comparison/type test succeeds.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Flags: u8 {
        const ZERO = 0x01;
    }
}

impl Flags {
    pub fn zero(&self) -> bool {
        self.contains(Flags::ZERO)
    }

    pub fn set_zero(&mut self, value: bool) {
        self.set(Flags::ZERO, value);
    }

    /// Update Z from a stored result.
    pub fn update_z(&mut self, result: u32) {
        self.set_zero(result == 0);
    }
}

/// Run-time policy for a [`Machine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineConfig {
    /// Log every fetched instruction at info level.
    pub trace: bool,
    /// Abort once more than this many unrecognized opcodes have been seen.
    /// `None` tolerates any number.
    pub unknown_opcode_limit: Option<u32>,
    /// Wrap `ip` to 0 at the end of the address space. When false the
    /// machine halts there instead.
    pub wrap_at_bound: bool,
    pub stack_capacity: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            trace: false,
            unknown_opcode_limit: Some(20),
            wrap_at_bound: true,
            stack_capacity: DEFAULT_STACK_CAPACITY,
        }
    }
}

/// Machine execution statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineStats {
    pub instructions: u64,
    pub unknown_opcodes: u32,
    pub ip: usize,
    pub halted: bool,
}

/// Register-based bytecode virtual machine.
pub struct Machine {
    pub registers: RegisterFile,
    pub flags: Flags,
    /// Address of the opcode being executed. Handlers advance it while
    /// reading operands.
    pub ip: usize,
    pub memory: AddressSpace,
    pub stack: OperandStack,
    pub running: bool,

    table: OpcodeTable,
    error_hook: Option<ErrorHook>,
    output: Box<dyn Write>,
    config: MachineConfig,
    instructions: u64,
    unknown_opcodes: u32,
}

impl Machine {
    /// Load `program` at address 0 with the default configuration.
    pub fn new(program: &[u8]) -> Result<Self, VmError> {
        Self::with_config(program, MachineConfig::default())
    }

    pub fn with_config(program: &[u8], config: MachineConfig) -> Result<Self, VmError> {
        let memory = AddressSpace::new(program)?;
        debug!("loaded {} byte program", program.len());

        Ok(Self {
            registers: RegisterFile::new(),
            flags: Flags::empty(),
            ip: 0,
            memory,
            stack: OperandStack::new(config.stack_capacity),
            running: true,
            table: OpcodeTable::new(),
            error_hook: Some(Box::new(default_error_hook)),
            output: Box::new(io::stdout()),
            config,
            instructions: 0,
            unknown_opcodes: 0,
        })
    }

    /// Bind `byte` to a custom handler. Must be called before [`run`](Self::run).
    pub fn set_handler<F>(&mut self, byte: u8, handler: F)
    where
        F: Fn(&mut Machine) -> Result<Control, VmError> + 'static,
    {
        self.table.set(byte, Handler::Custom(Rc::new(handler)));
    }

    /// Unmap `byte`, including built-ins.
    pub fn clear_handler(&mut self, byte: u8) {
        self.table.clear(byte);
    }

    /// Replace the default print-and-exit error hook.
    pub fn set_error_hook<F>(&mut self, hook: F)
    where
        F: FnMut(&VmError) + 'static,
    {
        self.error_hook = Some(Box::new(hook));
    }

    /// Redirect instruction output (prints, dumps, captured commands).
    pub fn set_output<W: Write + 'static>(&mut self, output: W) {
        self.output = Box::new(output);
    }

    pub fn output(&mut self) -> &mut dyn Write {
        &mut *self.output
    }

    /// Run until EXIT, a fatal error, or (without wrapping) the end of memory.
    pub fn run(&mut self) -> Result<(), VmError> {
        let result = self.run_loop();
        let flushed = self.output.flush().map_err(VmError::from);

        if self.config.trace {
            info!("executed {} instructions", self.instructions);
        }

        if let Err(err) = result.and(flushed) {
            self.fail(&err);
            return Err(err);
        }
        Ok(())
    }

    fn run_loop(&mut self) -> Result<(), VmError> {
        while self.is_running() {
            self.step()?;
        }
        Ok(())
    }

    /// Execute a single instruction. Errors are returned as-is; only
    /// [`run`](Self::run) routes them to the error hook.
    pub fn step(&mut self) -> Result<(), VmError> {
        if !self.running {
            return Ok(());
        }

        if self.ip >= AddressSpace::SIZE {
            if !self.config.wrap_at_bound {
                debug!("reached end of address space, halting");
                self.running = false;
                return Ok(());
            }
            self.ip = 0;
        }

        let byte = self.memory.read_byte(self.ip)?;
        let handler = self.table.get(byte).cloned();

        let control = match handler {
            Some(Handler::Builtin(op)) => {
                self.trace(byte, op.mnemonic());
                handlers::execute(self, op)?
            }
            Some(Handler::Custom(custom)) => {
                self.trace(byte, "CUSTOM");
                custom(self)?
            }
            None => {
                self.trace(byte, "UNKNOWN");
                self.unknown(byte)?
            }
        };

        if control == Control::Next {
            self.ip += 1;
        }
        self.instructions += 1;
        Ok(())
    }

    fn trace(&self, byte: u8, name: &str) {
        if self.config.trace {
            info!("{:04X} - {:02X} {}", self.ip, byte, name);
        }
    }

    fn unknown(&mut self, byte: u8) -> Result<Control, VmError> {
        self.unknown_opcodes += 1;
        warn!("{:04X} - unknown opcode {:02X}", self.ip, byte);

        if let Some(limit) = self.config.unknown_opcode_limit {
            if self.unknown_opcodes > limit {
                return Err(VmError::UnrecognizedOpcode {
                    opcode: byte,
                    ip: self.ip,
                });
            }
        }
        Ok(Control::Next)
    }

    fn fail(&mut self, err: &VmError) {
        error!("{:04X} - {}", self.ip, err);
        self.running = false;
        if let Some(hook) = self.error_hook.as_mut() {
            hook(err);
        }
    }

    /// Advance `ip` and read the byte there, wrapping at the end of memory.
    pub fn next_byte(&mut self) -> Result<u8, VmError> {
        self.ip += 1;
        if self.ip >= AddressSpace::SIZE {
            self.ip = 0;
        }
        self.memory.read_byte(self.ip)
    }

    /// Read a two-byte operand, low byte first.
    pub fn next_u16(&mut self) -> Result<u16, VmError> {
        let lo = self.next_byte()?;
        let hi = self.next_byte()?;
        Ok(decode_u16(lo, hi))
    }

    /// Read a register-number operand.
    pub fn next_register(&mut self) -> Result<usize, VmError> {
        let index = self.next_byte()? as usize;
        // Validate eagerly so bad operands fail at decode time.
        self.registers.get(index)?;
        Ok(index)
    }

    /// Read an inline text literal: 16-bit length followed by raw bytes.
    /// The bytes are returned exactly as stored.
    pub fn next_text(&mut self) -> Result<Vec<u8>, VmError> {
        let len = self.next_u16()? as usize;
        let mut bytes = Vec::with_capacity(len);
        for _ in 0..len {
            bytes.push(self.next_byte()?);
        }
        Ok(bytes)
    }

    /// Move `ip` to `target`, validating it against the address space.
    pub fn jump(&mut self, target: usize) -> Result<Control, VmError> {
        if target >= AddressSpace::SIZE {
            return Err(VmError::AddressOutOfRange {
                address: target,
                size: AddressSpace::SIZE,
            });
        }
        self.ip = target;
        Ok(Control::Jumped)
    }

    /// Write every register and the Z flag to the output.
    pub fn dump_registers(&mut self) -> Result<(), VmError> {
        writeln!(self.output, "Register dump")?;
        for (i, value) in self.registers.iter().enumerate() {
            writeln!(self.output, "\tRegister {i:02} - {value}")?;
        }
        writeln!(self.output, "Z-flag: {}", self.flags.zero())?;
        self.output.flush()?;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Get current execution statistics
    pub fn stats(&self) -> MachineStats {
        MachineStats {
            instructions: self.instructions,
            unknown_opcodes: self.unknown_opcodes,
            ip: self.ip,
            halted: !self.running,
        }
    }
}
