// Copyright (C) 2025 Dayton Fishell
// simple-vm register bytecode interpreter
// This file is part of simple-vm.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! simple-vm register bytecode interpreter
//!
//! This library provides the execution engine for a small register machine:
//! ten typed registers, a Z flag, an operand stack and a 64 KiB
//! self-modifiable address space.

pub mod core;
pub mod error;
mod handlers;
pub mod machine;
pub mod opcode;
pub mod registers;
pub mod value;

// Re-export commonly used types
pub use crate::core::{AddressSpace, OperandStack};
pub use error::{ErrorHook, VmError};
pub use machine::{Flags, Machine, MachineConfig, MachineStats};
pub use opcode::{Control, Opcode, OpcodeTable};
pub use registers::{REGISTER_COUNT, RegisterFile};
pub use value::Value;
