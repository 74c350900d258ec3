//! Built-in instruction semantics.
//!
//! On entry `vm.ip` points at the opcode byte. Each handler pulls its
//! operands with the `next_*` readers, which leave `ip` on the last byte
//! consumed, and returns [`Control::Next`] so the engine steps past the
//! instruction, or [`Control::Jumped`] when it moved `ip` itself.

use log::{debug, warn};
use rand_core::{OsRng, RngCore};

use crate::core::AddressSpace;
use crate::error::VmError;
use crate::machine::Machine;
use crate::opcode::{Control, Opcode};

pub(crate) fn execute(vm: &mut Machine, op: Opcode) -> Result<Control, VmError> {
    match op {
        Opcode::Exit => {
            vm.running = false;
            Ok(Control::Next)
        }
        Opcode::Nop => Ok(Control::Next),

        Opcode::IntStore => int_store(vm),
        Opcode::IntPrint => int_print(vm),
        Opcode::IntToString => int_to_string(vm),
        Opcode::IntRandom => int_random(vm),

        Opcode::JumpTo => jump_if(vm, |_| true),
        Opcode::JumpZ => jump_if(vm, |z| z),
        Opcode::JumpNz => jump_if(vm, |z| !z),

        Opcode::Xor => math(vm, op, |a, b| Ok(a ^ b)),
        Opcode::Add => math(vm, op, |a, b| Ok(a.wrapping_add(b))),
        Opcode::Sub => math(vm, op, |a, b| Ok(a.wrapping_sub(b))),
        Opcode::Mul => math(vm, op, |a, b| Ok(a.wrapping_mul(b))),
        Opcode::Div => math(vm, op, |a, b| a.checked_div(b).ok_or(VmError::DivisionByZero)),
        Opcode::And => math(vm, op, |a, b| Ok(a & b)),
        Opcode::Or => math(vm, op, |a, b| Ok(a | b)),
        Opcode::Inc => step_by(vm, op, u32::wrapping_add),
        Opcode::Dec => step_by(vm, op, u32::wrapping_sub),

        Opcode::StringStore => string_store(vm),
        Opcode::StringPrint => string_print(vm),
        Opcode::StringConcat => string_concat(vm),
        Opcode::StringSystem => string_system(vm),
        Opcode::StringToInt => string_to_int(vm),

        Opcode::CmpReg => cmp_reg(vm),
        Opcode::CmpImmediate => cmp_immediate(vm),
        Opcode::CmpString => cmp_string(vm),
        Opcode::IsString => is_kind(vm, true),
        Opcode::IsInteger => is_kind(vm, false),

        Opcode::StoreReg => store_reg(vm),

        Opcode::Peek => peek(vm),
        Opcode::Poke => poke(vm),
        Opcode::Memcpy => memcpy(vm),

        Opcode::StackPush => stack_push(vm),
        Opcode::StackPop => stack_pop(vm),
        Opcode::StackRet => stack_ret(vm),
        Opcode::StackCall => stack_call(vm),
    }
}

fn int_store(vm: &mut Machine) -> Result<Control, VmError> {
    let reg = vm.next_register()?;
    let value = vm.next_u16()?;
    debug!("STORE_INT(Reg:{reg:02}) => {value:04} [Hex:{value:04X}]");
    vm.registers.write_integer(reg, value as u32)?;
    Ok(Control::Next)
}

fn int_print(vm: &mut Machine) -> Result<Control, VmError> {
    let reg = vm.next_register()?;
    let value = vm.registers.read_integer(reg)?;
    write!(vm.output(), "0x{value:04X}")?;
    Ok(Control::Next)
}

fn int_to_string(vm: &mut Machine) -> Result<Control, VmError> {
    let reg = vm.next_register()?;
    let value = vm.registers.read_integer(reg)?;
    vm.registers.write_text(reg, value.to_string())?;
    Ok(Control::Next)
}

fn int_random(vm: &mut Machine) -> Result<Control, VmError> {
    let reg = vm.next_register()?;
    let value = OsRng.next_u32() % 0xFFFF;
    debug!("INT_RANDOM(Reg:{reg:02}) => {value:04X}");
    vm.registers.write_integer(reg, value)?;
    Ok(Control::Next)
}

fn jump_if(vm: &mut Machine, taken: fn(bool) -> bool) -> Result<Control, VmError> {
    let target = vm.next_u16()? as usize;
    if taken(vm.flags.zero()) {
        debug!("jump to {target:04X}");
        vm.jump(target)
    } else {
        Ok(Control::Next)
    }
}

/// `dst = a OP b` over two integer registers; Z reflects the stored result.
fn math(
    vm: &mut Machine,
    op: Opcode,
    apply: fn(u32, u32) -> Result<u32, VmError>,
) -> Result<Control, VmError> {
    let dst = vm.next_register()?;
    let src1 = vm.next_register()?;
    let src2 = vm.next_register()?;
    debug!("{op}(Register:{dst} = Register:{src1} ? Register:{src2})");

    let a = vm.registers.read_integer(src1)?;
    let b = vm.registers.read_integer(src2)?;
    let result = apply(a, b)?;

    vm.registers.write_integer(dst, result)?;
    vm.flags.update_z(result);
    Ok(Control::Next)
}

fn step_by(vm: &mut Machine, op: Opcode, apply: fn(u32, u32) -> u32) -> Result<Control, VmError> {
    let reg = vm.next_register()?;
    debug!("{op}(Register {reg})");
    let result = apply(vm.registers.read_integer(reg)?, 1);
    vm.registers.write_integer(reg, result)?;
    vm.flags.update_z(result);
    Ok(Control::Next)
}

fn string_store(vm: &mut Machine) -> Result<Control, VmError> {
    let reg = vm.next_register()?;
    let text = vm.next_text()?;
    debug!(
        "STRING_STORE(Register {reg}) = {:?}",
        String::from_utf8_lossy(&text)
    );
    vm.registers.write_text(reg, text)?;
    Ok(Control::Next)
}

fn string_print(vm: &mut Machine) -> Result<Control, VmError> {
    let reg = vm.next_register()?;
    let text = vm.registers.read_text(reg)?.to_vec();
    vm.output().write_all(&text)?;
    Ok(Control::Next)
}

fn string_concat(vm: &mut Machine) -> Result<Control, VmError> {
    let dst = vm.next_register()?;
    let src1 = vm.next_register()?;
    let src2 = vm.next_register()?;
    debug!("STRING_CONCAT(Register:{dst} = Register:{src1} + Register:{src2})");

    let joined = [vm.registers.read_text(src1)?, vm.registers.read_text(src2)?].concat();
    vm.registers.write_text(dst, joined)?;
    Ok(Control::Next)
}

/// Blocks until the command exits. Its stdout then stderr are copied to the
/// machine output; a failure to spawn is logged, not fatal.
#[cfg(feature = "host-system")]
fn string_system(vm: &mut Machine) -> Result<Control, VmError> {
    use std::process::Command;

    let reg = vm.next_register()?;
    let command = String::from_utf8_lossy(vm.registers.read_text(reg)?).into_owned();
    debug!("STRING_SYSTEM({command:?})");

    let output = if cfg!(windows) {
        Command::new("cmd").args(["/C", command.as_str()]).output()
    } else {
        Command::new("sh").args(["-c", command.as_str()]).output()
    };

    match output {
        Ok(output) => {
            vm.output().write_all(&output.stdout)?;
            vm.output().write_all(&output.stderr)?;
            if !output.status.success() {
                warn!("{command:?} exited with {}", output.status);
            }
        }
        Err(e) => warn!("failed to run {command:?}: {e}"),
    }
    Ok(Control::Next)
}

#[cfg(not(feature = "host-system"))]
fn string_system(vm: &mut Machine) -> Result<Control, VmError> {
    let reg = vm.next_register()?;
    let command = String::from_utf8_lossy(vm.registers.read_text(reg)?);
    warn!("host-system disabled, not running {command:?}");
    Ok(Control::Next)
}

fn string_to_int(vm: &mut Machine) -> Result<Control, VmError> {
    let reg = vm.next_register()?;
    let text = vm.registers.read_text(reg)?;
    // Negative input wraps like the arithmetic instructions do.
    let value = std::str::from_utf8(text)
        .ok()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .map(|n| n as u32)
        .ok_or_else(|| VmError::InvalidInteger {
            index: reg,
            text: String::from_utf8_lossy(text).into_owned(),
        })?;
    vm.registers.write_integer(reg, value)?;
    Ok(Control::Next)
}

fn cmp_reg(vm: &mut Machine) -> Result<Control, VmError> {
    let reg1 = vm.next_register()?;
    let reg2 = vm.next_register()?;
    let equal = vm.registers.get(reg1)?.same_as(vm.registers.get(reg2)?);
    debug!("CMP(Register:{reg1} vs Register:{reg2}) => {equal}");
    vm.flags.set_zero(equal);
    Ok(Control::Next)
}

fn cmp_immediate(vm: &mut Machine) -> Result<Control, VmError> {
    let reg = vm.next_register()?;
    let value = vm.next_u16()? as u32;
    let equal = vm.registers.read_integer(reg).is_ok_and(|n| n == value);
    debug!("CMP_IMMEDIATE(Register:{reg} vs {value:04X}) => {equal}");
    vm.flags.set_zero(equal);
    Ok(Control::Next)
}

fn cmp_string(vm: &mut Machine) -> Result<Control, VmError> {
    let reg = vm.next_register()?;
    let literal = vm.next_text()?;
    let equal = vm
        .registers
        .read_text(reg)
        .is_ok_and(|s| s == literal.as_slice());
    debug!(
        "CMP_STRING(Register:{reg} vs {:?}) => {equal}",
        String::from_utf8_lossy(&literal)
    );
    vm.flags.set_zero(equal);
    Ok(Control::Next)
}

fn is_kind(vm: &mut Machine, text: bool) -> Result<Control, VmError> {
    let reg = vm.next_register()?;
    let is_text = vm.registers.get(reg)?.is_text();
    vm.flags.set_zero(is_text == text);
    Ok(Control::Next)
}

fn store_reg(vm: &mut Machine) -> Result<Control, VmError> {
    let dst = vm.next_register()?;
    let src = vm.next_register()?;
    debug!("STORE(Reg{dst:02} = Reg{src:02})");
    let value = vm.registers.get(src)?.clone();
    vm.registers.set(dst, value)?;
    Ok(Control::Next)
}

fn peek(vm: &mut Machine) -> Result<Control, VmError> {
    let dst = vm.next_register()?;
    let addr_reg = vm.next_register()?;
    let addr = vm.registers.read_integer(addr_reg)? as usize;
    let byte = vm.memory.read_byte(addr)?;
    debug!("PEEK(Register:{dst} = [{addr:04X}] = {byte:02X})");
    vm.registers.write_integer(dst, byte as u32)?;
    Ok(Control::Next)
}

fn poke(vm: &mut Machine) -> Result<Control, VmError> {
    let val_reg = vm.next_register()?;
    let addr_reg = vm.next_register()?;
    let value = vm.registers.read_integer(val_reg)?;
    let addr = vm.registers.read_integer(addr_reg)? as usize;
    debug!("POKE([{addr:04X}] = {:02X})", value as u8);
    vm.memory.write_byte(addr, value as u8)?;
    Ok(Control::Next)
}

fn memcpy(vm: &mut Machine) -> Result<Control, VmError> {
    let dst_reg = vm.next_register()?;
    let src_reg = vm.next_register()?;
    let len_reg = vm.next_register()?;
    let dst = vm.registers.read_integer(dst_reg)? as usize;
    let src = vm.registers.read_integer(src_reg)? as usize;
    let len = vm.registers.read_integer(len_reg)? as usize;
    debug!("MEMCPY({len:04X} bytes from {src:04X} to {dst:04X})");
    vm.memory.copy_within(src, dst, len)?;
    Ok(Control::Next)
}

fn stack_push(vm: &mut Machine) -> Result<Control, VmError> {
    let reg = vm.next_register()?;
    let value = vm.registers.read_integer(reg)?;
    vm.stack.push(value as i32)?;
    Ok(Control::Next)
}

fn stack_pop(vm: &mut Machine) -> Result<Control, VmError> {
    let reg = vm.next_register()?;
    let value = vm.stack.pop()?;
    vm.registers.write_integer(reg, value as u32)?;
    Ok(Control::Next)
}

fn stack_ret(vm: &mut Machine) -> Result<Control, VmError> {
    let addr = vm.stack.pop()?;
    debug!("RET() => {addr:04X}");
    vm.jump(addr as u32 as usize)
}

fn stack_call(vm: &mut Machine) -> Result<Control, VmError> {
    let target = vm.next_u16()? as usize;
    // ip sits on the last operand byte; the caller resumes just past it.
    let ret = (vm.ip + 1) % AddressSpace::SIZE;
    vm.stack.push(ret as i32)?;
    debug!("CALL({target:04X}) return to {ret:04X}");
    vm.jump(target)
}
