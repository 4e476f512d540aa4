// Copyright 2021 Nir H. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
//! Implementation of the Sharp LR35902 cpu's instructions.
//!
//! Opcodes are not implemented one function per byte. Instead, `decode`
//! (see `super::decode`) pulls the register/condition/ALU-op selector
//! straight out of the opcode's bit fields and dispatches into the small
//! set of parameterized helpers defined here - one per *instruction
//! shape*, not one per opcode.

use super::Cpu;
use super::alu::*;
use super::state::registers::*;

use crate::GameboyError;

/// Instructions return the number of clock cycles taken, or the relevant
/// error if one occurred.
pub type InsnResult = Result<usize, GameboyError>;

/// Enter the given interrupt vector: push PC, clear IME, jump.
///
/// 5 m-cycles total (2 internal + 2 push + 1 jump): the push here writes
/// PC's two bytes directly rather than going through `push_nn`, since
/// dispatch has no fetch/decode overhead to account for like a real `PUSH`
/// instruction does.
pub fn enter_interrupt(cpu: &mut Cpu, int_vector: u16) -> InsnResult {
	assert!(int_vector & 0xFF00 == 0);

	let mut address: u16 = cpu.registers.get(Register::SP);
	let pc: u16 = cpu.registers.get(Register::PC);

	cpu.registers.set(Register::SP, address.wrapping_sub(2));

	address = address.wrapping_sub(1);
	cpu.mmap.write(address, ((pc >> 8) & 0xFF) as u8)?;

	address = address.wrapping_sub(1);
	cpu.mmap.write(address, (pc & 0xFF) as u8)?;

	cpu.registers.set_ime(false);
	cpu.registers.set(Register::PC, int_vector);

	Ok(8 + 8 + 4)
}

/// Maps the 3-bit `r8` selector used throughout the opcode grid to a
/// register. Index 6 (`(HL)`) has no matching register and is handled by
/// callers before reaching for this table.
pub fn r8(index: u8) -> Register {
	match index {
		0 => Register::B,
		1 => Register::C,
		2 => Register::D,
		3 => Register::E,
		4 => Register::H,
		5 => Register::L,
		7 => Register::A,
		_ => unreachable!("index 6 ((HL)) is not a plain register"),
	}
}

/// Maps the 2-bit `r16` selector (`rp` in the opcode tables) to a wide
/// register, for instruction groups that terminate the table with SP.
pub fn r16_sp(index: u8) -> Register {
	match index {
		0 => Register::BC,
		1 => Register::DE,
		2 => Register::HL,
		3 => Register::SP,
		_ => unreachable!(),
	}
}

/// Maps the 2-bit `r16` selector to a wide register, for instruction
/// groups (`PUSH`/`POP`) that terminate the table with AF instead of SP.
pub fn r16_af(index: u8) -> Register {
	match index {
		0 => Register::BC,
		1 => Register::DE,
		2 => Register::HL,
		3 => Register::AF,
		_ => unreachable!(),
	}
}

/// Maps the 2-bit condition code selector to a flag and its expected
/// state.
pub fn cc(index: u8) -> (Flag, bool) {
	match index {
		0 => (Flag::Z, false),
		1 => (Flag::Z, true),
		2 => (Flag::C, false),
		3 => (Flag::C, true),
		_ => unreachable!(),
	}
}

/// Reads one of the 8 `r8`/`(HL)` operands (index 6 reads through HL).
pub fn read_r8(cpu: &mut Cpu, index: u8) -> Result<u8, GameboyError> {
	if index == 6 {
		let address = cpu.registers.get(Register::HL);
		cpu.mmap.read(address)
	} else {
		Ok(cpu.registers.get(r8(index)) as u8)
	}
}

/// Writes one of the 8 `r8`/`(HL)` operands (index 6 writes through HL).
pub fn write_r8(cpu: &mut Cpu, index: u8, value: u8) -> Result<(), GameboyError> {
	if index == 6 {
		let address = cpu.registers.get(Register::HL);
		cpu.mmap.write(address, value)
	} else {
		cpu.registers.set(r8(index), value as u16);
		Ok(())
	}
}

/// `(HL)` takes twice as long to access as a plain register for most
/// single-register instruction shapes.
pub fn r8_cycles(index: u8, reg_cycles: usize, hl_cycles: usize) -> usize {
	if index == 6 { hl_cycles } else { reg_cycles }
}

fn apply(cpu: &mut Cpu, result: u8, flags: Flags) {
	cpu.registers.set(Register::A, result as u16);
	write_flags(cpu, flags);
}

fn write_flags(cpu: &mut Cpu, flags: Flags) {
	cpu.registers.set_flag(Flag::Z, flags.z);
	cpu.registers.set_flag(Flag::N, flags.n);
	cpu.registers.set_flag(Flag::H, flags.h);
	cpu.registers.set_flag(Flag::C, flags.c);
}

fn carry_flag(cpu: &Cpu) -> bool {
	cpu.registers.get_flag(Flag::C)
}

/// Dispatches one of the 8 accumulator ALU operations (`ADD`/`ADC`/`SUB`/
/// `SBC`/`AND`/`XOR`/`OR`/`CP`) against the given right-hand operand.
/// `CP` (op 7) discards the result and keeps only the flags.
pub fn alu_op(cpu: &mut Cpu, op: u8, rhs: u8) {
	let a = cpu.registers.get(Register::A) as u8;
	let carry = carry_flag(cpu);

	let (result, flags) = match op {
		0 => alu8::add(a, rhs, false),
		1 => alu8::add(a, rhs, carry),
		2 => alu8::sub(a, rhs, false),
		3 => alu8::sub(a, rhs, carry),
		4 => alu8::and(a, rhs),
		5 => alu8::xor(a, rhs),
		6 => alu8::or(a, rhs),
		7 => alu8::cp(a, rhs),
		_ => unreachable!(),
	};

	if op == 7 {
		write_flags(cpu, flags);
	} else {
		apply(cpu, result, flags);
	}
}

/// Increments an 8-bit `r8`/`(HL)` operand in place.
pub fn inc_r8(cpu: &mut Cpu, index: u8) -> InsnResult {
	let value = read_r8(cpu, index)?;
	let (result, flags) = alu8::inc(value, carry_flag(cpu));
	write_r8(cpu, index, result)?;
	write_flags(cpu, flags);

	Ok(r8_cycles(index, 4, 12))
}

/// Decrements an 8-bit `r8`/`(HL)` operand in place.
pub fn dec_r8(cpu: &mut Cpu, index: u8) -> InsnResult {
	let value = read_r8(cpu, index)?;
	let (result, flags) = alu8::dec(value, carry_flag(cpu));
	write_r8(cpu, index, result)?;
	write_flags(cpu, flags);

	Ok(r8_cycles(index, 4, 12))
}

/// Places a 16-bit register on the stack.
pub fn push_nn(cpu: &mut Cpu, reg: Register) -> InsnResult {
	assert!(get_type(&reg) == RegisterType::Wide);

	let mut address: u16 = cpu.registers.get(Register::SP);
	let value: u16 = cpu.registers.get(reg);

	cpu.registers.set(Register::SP, address.wrapping_sub(2));

	address = address.wrapping_sub(1);
	cpu.mmap.write(address, ((value >> 8) & 0xFF) as u8)?;

	address = address.wrapping_sub(1);
	cpu.mmap.write(address, (value & 0xFF) as u8)?;

	Ok(16)
}

/// Pops a 16-bit register from the stack.
pub fn pop_nn(cpu: &mut Cpu, reg: Register) -> InsnResult {
	assert!(get_type(&reg) == RegisterType::Wide);

	let address: u16 = cpu.registers.get(Register::SP);

	let low = cpu.mmap.read(address)? as u16;
	let high = cpu.mmap.read(address.wrapping_add(1))? as u16;

	cpu.registers.set(reg, (high << 8) + low);
	cpu.registers.set(Register::SP, address.wrapping_add(2));

	Ok(12)
}

/// Reads a signed 8-bit displacement immediate, advancing PC.
fn fetch_offset(cpu: &mut Cpu) -> Result<i8, GameboyError> {
	Ok(cpu.fetch::<u8>()? as i8)
}

/// `JR e`.
pub fn jump_relative(cpu: &mut Cpu) -> InsnResult {
	let offset = fetch_offset(cpu)?;
	let address: u16 = cpu.registers.get(Register::PC);

	cpu.registers.set(Register::PC, address.wrapping_add((offset as i16) as u16));

	Ok(12)
}

/// `JR cc,e`.
pub fn jump_relative_conditional(cpu: &mut Cpu, flag: Flag, expected: bool) -> InsnResult {
	let offset = fetch_offset(cpu)?;
	let address: u16 = cpu.registers.get(Register::PC);

	if cpu.registers.get_flag(flag) == expected {
		cpu.registers.set(Register::PC, address.wrapping_add((offset as i16) as u16));
		Ok(12)
	} else {
		Ok(8)
	}
}

/// `JP nn`.
pub fn jump(cpu: &mut Cpu) -> InsnResult {
	let dest: u16 = cpu.fetch()?;
	cpu.registers.set(Register::PC, dest);

	Ok(16)
}

/// `JP cc,nn`.
pub fn jump_conditional(cpu: &mut Cpu, flag: Flag, expected: bool) -> InsnResult {
	let dest: u16 = cpu.fetch()?;

	if cpu.registers.get_flag(flag) == expected {
		cpu.registers.set(Register::PC, dest);
		Ok(16)
	} else {
		Ok(12)
	}
}

/// `CALL nn`.
pub fn call(cpu: &mut Cpu) -> InsnResult {
	let dest: u16 = cpu.fetch()?;
	push_nn(cpu, Register::PC)?;
	cpu.registers.set(Register::PC, dest);

	Ok(24)
}

/// `CALL cc,nn`.
pub fn call_conditional(cpu: &mut Cpu, flag: Flag, expected: bool) -> InsnResult {
	let dest: u16 = cpu.fetch()?;

	if cpu.registers.get_flag(flag) == expected {
		push_nn(cpu, Register::PC)?;
		cpu.registers.set(Register::PC, dest);
		Ok(24)
	} else {
		Ok(12)
	}
}

/// `RET`.
pub fn ret(cpu: &mut Cpu) -> InsnResult {
	pop_nn(cpu, Register::PC)?;

	Ok(16)
}

/// `RETI`.
pub fn ret_interrupt(cpu: &mut Cpu) -> InsnResult {
	pop_nn(cpu, Register::PC)?;
	cpu.registers.set_ime(true);

	Ok(16)
}

/// `RET cc`.
pub fn ret_conditional(cpu: &mut Cpu, flag: Flag, expected: bool) -> InsnResult {
	if cpu.registers.get_flag(flag) == expected {
		pop_nn(cpu, Register::PC)?;
		Ok(20)
	} else {
		Ok(8)
	}
}

/// `RST t`.
pub fn rst(cpu: &mut Cpu, target: u16) -> InsnResult {
	push_nn(cpu, Register::PC)?;
	cpu.registers.set(Register::PC, target);

	Ok(16)
}

/// Dispatches one of the 8 CB-prefixed rotate/shift operations.
pub fn rotate_shift(cpu: &mut Cpu, op: u8, index: u8) -> InsnResult {
	let value = read_r8(cpu, index)?;
	let carry_in = carry_flag(cpu);

	let (result, flags) = match op {
		0 => alu8::rlc(value),
		1 => alu8::rrc(value),
		2 => alu8::rl(value, carry_in),
		3 => alu8::rr(value, carry_in),
		4 => alu8::sla(value),
		5 => alu8::sra(value),
		6 => alu8::swap(value),
		7 => alu8::srl(value),
		_ => unreachable!(),
	};

	write_r8(cpu, index, result)?;
	write_flags(cpu, flags);

	Ok(r8_cycles(index, 8, 16))
}

/// `BIT b,r8`.
pub fn bit(cpu: &mut Cpu, b: u8, index: u8) -> InsnResult {
	let value = read_r8(cpu, index)?;
	let flags = alu8::bit(value, b, carry_flag(cpu));
	write_flags(cpu, flags);

	Ok(r8_cycles(index, 8, 12))
}

/// `RES b,r8`.
pub fn res(cpu: &mut Cpu, b: u8, index: u8) -> InsnResult {
	let value = read_r8(cpu, index)?;
	write_r8(cpu, index, alu8::res(value, b))?;

	Ok(r8_cycles(index, 8, 16))
}

/// `SET b,r8`.
pub fn set(cpu: &mut Cpu, b: u8, index: u8) -> InsnResult {
	let value = read_r8(cpu, index)?;
	write_r8(cpu, index, alu8::set(value, b))?;

	Ok(r8_cycles(index, 8, 16))
}

/// `RLCA`/`RRCA`/`RLA`/`RRA`: like their CB-prefixed counterparts on `A`,
/// but always 4 cycles and Z is forced clear rather than reflecting the
/// (always nonzero after rotation) result.
pub fn rotate_accumulator(cpu: &mut Cpu, op: u8) -> InsnResult {
	let a = cpu.registers.get(Register::A) as u8;
	let carry_in = carry_flag(cpu);

	let (result, mut flags) = match op {
		0 => alu8::rlc(a),
		1 => alu8::rrc(a),
		2 => alu8::rl(a, carry_in),
		3 => alu8::rr(a, carry_in),
		_ => unreachable!(),
	};

	flags.z = false;
	apply(cpu, result, flags);

	Ok(4)
}

/// `DAA`.
pub fn daa(cpu: &mut Cpu) -> InsnResult {
	let a = cpu.registers.get(Register::A) as u8;
	let n = cpu.registers.get_flag(Flag::N);
	let h = cpu.registers.get_flag(Flag::H);
	let c = cpu.registers.get_flag(Flag::C);

	let (result, flags) = alu8::daa(a, n, h, c);
	apply(cpu, result, flags);

	Ok(4)
}

/// `CPL`.
pub fn cpl(cpu: &mut Cpu) -> InsnResult {
	let a = cpu.registers.get(Register::A) as u8;
	let z = cpu.registers.get_flag(Flag::Z);
	let c = cpu.registers.get_flag(Flag::C);

	let (result, flags) = alu8::cpl(a, z, c);
	apply(cpu, result, flags);

	Ok(4)
}

/// `SCF`.
pub fn scf(cpu: &mut Cpu) -> InsnResult {
	cpu.registers.set_flag(Flag::N, false);
	cpu.registers.set_flag(Flag::H, false);
	cpu.registers.set_flag(Flag::C, true);

	Ok(4)
}

/// `CCF`.
pub fn ccf(cpu: &mut Cpu) -> InsnResult {
	let carry = cpu.registers.get_flag(Flag::C);
	cpu.registers.set_flag(Flag::N, false);
	cpu.registers.set_flag(Flag::H, false);
	cpu.registers.set_flag(Flag::C, !carry);

	Ok(4)
}

/// `ADD HL,rr`.
pub fn add_hl(cpu: &mut Cpu, reg: Register) -> InsnResult {
	let hl = cpu.registers.get(Register::HL);
	let rhs = cpu.registers.get(reg);
	let z = cpu.registers.get_flag(Flag::Z);

	let (result, flags) = alu16::add(hl, rhs, z);
	cpu.registers.set(Register::HL, result);
	write_flags(cpu, flags);

	Ok(8)
}

/// `INC rr`/`DEC rr`: flagless wide increment/decrement.
pub fn inc_dec_wide(cpu: &mut Cpu, reg: Register, increment: bool) -> InsnResult {
	let value = cpu.registers.get(reg);
	let result = if increment { value.wrapping_add(1) } else { value.wrapping_sub(1) };
	cpu.registers.set(reg, result);

	Ok(8)
}

/// `ADD SP,e`.
pub fn add_sp_offset(cpu: &mut Cpu) -> InsnResult {
	let sp = cpu.registers.get(Register::SP);
	let offset = fetch_offset(cpu)?;

	let (result, flags) = alu16::add_signed(sp, offset);
	cpu.registers.set(Register::SP, result);
	write_flags(cpu, flags);

	Ok(16)
}

/// `LD HL,SP+e`.
pub fn load_hl_sp_offset(cpu: &mut Cpu) -> InsnResult {
	let sp = cpu.registers.get(Register::SP);
	let offset = fetch_offset(cpu)?;

	let (result, flags) = alu16::add_signed(sp, offset);
	cpu.registers.set(Register::HL, result);
	write_flags(cpu, flags);

	Ok(12)
}
