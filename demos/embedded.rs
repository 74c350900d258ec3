// Copyright (C) 2025 Dayton Fishell
// simple-vm register bytecode interpreter
// This file is part of simple-vm.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Embedding demo: bind a custom opcode and a custom error hook, then run a
//! statically defined program.

use svm_core::{Control, Machine};

const CUSTOM_OPCODE: u8 = 0xCD;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    println!("simple-vm embedding demo");
    println!("========================");
    println!();

    let bytecode = [
        0x01, 0x01, 0x34, 0x12, // INT_STORE r1, 0x1234
        0x02, 0x01, // INT_PRINT r1
        CUSTOM_OPCODE, // handled below
        0x00, // EXIT
    ];

    let mut machine = Machine::new(&bytecode)?;

    machine.set_handler(CUSTOM_OPCODE, |vm| {
        let out = vm.output();
        writeln!(out)?;
        writeln!(out, "Custom Handling Here")?;
        let len = vm.memory.program_len();
        writeln!(vm.output(), "\tOur bytecode is {len} bytes long")?;
        Ok(Control::Next)
    });

    machine.set_error_hook(|err| eprintln!("demo program failed: {err}"));

    machine.run()?;

    println!();
    let stats = machine.stats();
    println!("Final state:");
    println!("  IP:           0x{:04X}", stats.ip);
    println!("  Instructions: {}", stats.instructions);
    println!("  Halted:       {}", stats.halted);
    println!();

    machine.dump_registers()?;
    Ok(())
}
