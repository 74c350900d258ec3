// Copyright (C) 2025 Dayton Fishell
// simple-vm register bytecode interpreter
// This file is part of simple-vm.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

// Command-line driver: load a bytecode file and run it.
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use svm_core::{Machine, MachineConfig};

fn main() -> ExitCode {
    // DEBUG turns on instruction tracing and a register dump after the run.
    let debug = std::env::var_os("DEBUG").is_some();

    let default_filter = if debug { "info" } else { "warn" };
    // Trace lines share stdout with program output; stderr is left for the
    // error hook.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Stdout)
        .init();

    match run(debug) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(debug: bool) -> Result<()> {
    let mut args = std::env::args();
    let program_name = args.next().unwrap_or_else(|| "svm".into());
    let Some(path) = args.next().map(PathBuf::from) else {
        bail!("Usage: {program_name} input-file");
    };

    let code = std::fs::read(&path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    let config = MachineConfig {
        trace: debug,
        ..MachineConfig::default()
    };
    let mut machine = Machine::with_config(&code, config)
        .with_context(|| format!("Failed to load program {}", path.display()))?;

    // The default error hook prints the failure and exits the process.
    machine.run()?;

    if debug {
        machine.dump_registers()?;
    }
    Ok(())
}
