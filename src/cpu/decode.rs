// Copyright 2021 Nir H. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
//! Gameboy cpu's opcode decoder.
//!
//! Rather than one function per opcode, the primary and CB-prefixed
//! tables are both driven by their bit fields: `[7:6]` selects the
//! instruction group, and `[5:3]`/`[2:0]` select registers, ALU
//! operations, bit indices or condition codes within that group. Groups
//! that don't fit the regular grid (control flow, stack ops, the 11
//! illegal opcodes) are handled as individual arms.

use super::Cpu;
use super::instructions::*;
use super::state::registers::*;
use crate::GameboyError;

impl<'a> Cpu<'a> {
	/// Decodes and executes the instruction starting at `opcode`, returning
	/// the number of clock cycles it took.
	pub fn decode(&mut self, opcode: u8) -> InsnResult {
		// Bit fields shared by most of the regular grid.
		let x = opcode >> 6;
		let y = (opcode >> 3) & 0x07;
		let z = opcode & 0x07;

		match opcode {
			0x00 => Ok(4),
			0x10 => { let _ = self.fetch::<u8>()?; Ok(4) } // STOP (the GBC double-speed switch is out of scope)
			0x76 => { self.halt(); Ok(4) }

			0x07 => rotate_accumulator(self, 0),
			0x0F => rotate_accumulator(self, 1),
			0x17 => rotate_accumulator(self, 2),
			0x1F => rotate_accumulator(self, 3),

			0x08 => {
				let address: u16 = self.fetch()?;
				let sp = self.registers.get(Register::SP);
				self.mmap.write(address, (sp & 0xFF) as u8)?;
				self.mmap.write(address.wrapping_add(1), ((sp >> 8) & 0xFF) as u8)?;
				Ok(20)
			}

			0x18 => jump_relative(self),
			0x20 | 0x28 | 0x30 | 0x38 => {
				let (flag, expected) = cc(y & 0x03);
				jump_relative_conditional(self, flag, expected)
			}

			0x27 => daa(self),
			0x2F => cpl(self),
			0x37 => scf(self),
			0x3F => ccf(self),

			// LD rr,nn
			0x01 | 0x11 | 0x21 | 0x31 => {
				let value: u16 = self.fetch()?;
				self.registers.set(r16_sp(y >> 1), value);
				Ok(12)
			}

			// ADD HL,rr
			0x09 | 0x19 | 0x29 | 0x39 => add_hl(self, r16_sp(y >> 1)),

			// INC rr / DEC rr
			0x03 | 0x13 | 0x23 | 0x33 => inc_dec_wide(self, r16_sp(y >> 1), true),
			0x0B | 0x1B | 0x2B | 0x3B => inc_dec_wide(self, r16_sp(y >> 1), false),

			// LD (BC),A / LD (DE),A / LD (HL+),A / LD (HL-),A
			0x02 | 0x12 | 0x22 | 0x32 => {
				let address = self.indirect_target(y >> 1);
				let value = self.registers.get(Register::A) as u8;
				self.mmap.write(address, value)?;
				self.post_indirect(y >> 1, address);
				Ok(8)
			}
			// LD A,(BC) / LD A,(DE) / LD A,(HL+) / LD A,(HL-)
			0x0A | 0x1A | 0x2A | 0x3A => {
				let address = self.indirect_target(y >> 1);
				let value = self.mmap.read(address)?;
				self.registers.set(Register::A, value as u16);
				self.post_indirect(y >> 1, address);
				Ok(8)
			}

			// INC r8 / DEC r8 / LD r8,n
			_ if x == 0 && z == 4 => inc_r8(self, y),
			_ if x == 0 && z == 5 => dec_r8(self, y),
			_ if x == 0 && z == 6 => {
				let value: u8 = self.fetch()?;
				write_r8(self, y, value)?;
				Ok(r8_cycles(y, 8, 12))
			}

			// LD r8,r8' (the 0x40-0x7F grid, HALT already handled above)
			_ if x == 1 => {
				let value = read_r8(self, z)?;
				write_r8(self, y, value)?;
				Ok(if y == 6 || z == 6 { 8 } else { 4 })
			}

			// ALU A,r8 (0x80-0xBF)
			_ if x == 2 => {
				let rhs = read_r8(self, z)?;
				alu_op(self, y, rhs);
				Ok(r8_cycles(z, 4, 8))
			}

			// RET cc
			0xC0 | 0xC8 | 0xD0 | 0xD8 => {
				let (flag, expected) = cc(y & 0x03);
				ret_conditional(self, flag, expected)
			}
			0xC9 => ret(self),
			0xD9 => ret_interrupt(self),

			// JP cc,nn
			0xC2 | 0xCA | 0xD2 | 0xDA => {
				let (flag, expected) = cc(y & 0x03);
				jump_conditional(self, flag, expected)
			}
			0xC3 => jump(self),
			0xE9 => {
				let address = self.registers.get(Register::HL);
				self.registers.set(Register::PC, address);
				Ok(4)
			}

			// CALL cc,nn
			0xC4 | 0xCC | 0xD4 | 0xDC => {
				let (flag, expected) = cc(y & 0x03);
				call_conditional(self, flag, expected)
			}
			0xCD => call(self),

			// POP rr2 / PUSH rr2
			0xC1 | 0xD1 | 0xE1 | 0xF1 => pop_nn(self, r16_af(y >> 1)),
			0xC5 | 0xD5 | 0xE5 | 0xF5 => push_nn(self, r16_af(y >> 1)),

			// RST t
			0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
				rst(self, (y * 8) as u16)
			}

			// ALU A,n (0xC6/CE/D6/DE/E6/EE/F6/FE)
			0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
				let rhs: u8 = self.fetch()?;
				alu_op(self, y, rhs);
				Ok(8)
			}

			0xE0 => {
				let offset: u8 = self.fetch()?;
				let value = self.registers.get(Register::A) as u8;
				self.mmap.write(0xFF00 + offset as u16, value)?;
				Ok(12)
			}
			0xF0 => {
				let offset: u8 = self.fetch()?;
				let value = self.mmap.read(0xFF00 + offset as u16)?;
				self.registers.set(Register::A, value as u16);
				Ok(12)
			}
			0xE2 => {
				let c = self.registers.get(Register::C);
				let value = self.registers.get(Register::A) as u8;
				self.mmap.write(0xFF00 + c, value)?;
				Ok(8)
			}
			0xF2 => {
				let c = self.registers.get(Register::C);
				let value = self.mmap.read(0xFF00 + c)?;
				self.registers.set(Register::A, value as u16);
				Ok(8)
			}
			0xEA => {
				let address: u16 = self.fetch()?;
				let value = self.registers.get(Register::A) as u8;
				self.mmap.write(address, value)?;
				Ok(16)
			}
			0xFA => {
				let address: u16 = self.fetch()?;
				let value = self.mmap.read(address)?;
				self.registers.set(Register::A, value as u16);
				Ok(16)
			}

			0xE8 => add_sp_offset(self),
			0xF8 => load_hl_sp_offset(self),
			0xF9 => {
				let value = self.registers.get(Register::HL);
				self.registers.set(Register::SP, value);
				Ok(8)
			}

			0xF3 => { self.registers.set_ime(false); Ok(4) }
			0xFB => { self.toggle_ime_delayed(); Ok(4) }

			// The 11 opcodes the LR35902 leaves undefined.
			0xD3 | 0xDB | 0xDD | 0xE3 | 0xE4 | 0xEB | 0xEC | 0xED | 0xF4 | 0xFC | 0xFD => {
				Err(GameboyError::BadOpcode(opcode))
			}

			0xCB => {
				let next: u8 = self.fetch()?;
				self.decode_cb(next)
			}

			_ => Err(GameboyError::BadOpcode(opcode)),
		}
	}

	/// Resolves the memory operand for the `LD (rr),A`/`LD A,(rr)` group,
	/// where `selector` is `0..=3` for BC/DE/HL+/HL-.
	fn indirect_target(&self, selector: u8) -> u16 {
		match selector {
			0 => self.registers.get(Register::BC),
			1 => self.registers.get(Register::DE),
			2 | 3 => self.registers.get(Register::HL),
			_ => unreachable!(),
		}
	}

	/// Applies HL's post-increment/decrement for the HL+/HL- variants of
	/// the same group.
	fn post_indirect(&mut self, selector: u8, address: u16) {
		match selector {
			2 => self.registers.set(Register::HL, address.wrapping_add(1)),
			3 => self.registers.set(Register::HL, address.wrapping_sub(1)),
			_ => {}
		}
	}

	/// Decode a 16-bit opcode that starts with 0xCB.
	///
	/// `[7:6]` selects rotate/shift (0) vs `BIT`/`RES`/`SET` (1/2/3);
	/// `[5:3]` is the rotate-shift sub-op or the bit index; `[2:0]`
	/// selects the `r8`/`(HL)` operand.
	pub fn decode_cb(&mut self, opcode: u8) -> InsnResult {
		let group = opcode >> 6;
		let mid = (opcode >> 3) & 0x07;
		let operand = opcode & 0x07;

		match group {
			0 => rotate_shift(self, mid, operand),
			1 => bit(self, mid, operand),
			2 => res(self, mid, operand),
			3 => set(self, mid, operand),
			_ => unreachable!(),
		}
	}
}
