//! Applies one microcode line's signals to the register bank and memory device: the
//! "decode -> apply signals -> clock" portion of a micro-step, before the branch function picks
//! the next µPC.
//!
//! The reduced seven-register model (`A`, `X`, `SP`, `PC`, `IR`, `T1`, `OS`) has no separate
//! memory address/data registers, so `OS` doubles as the address register memory accesses use.
//! This mapping of signal to effect is an original simplification, not a literal port of the
//! full hardware data path, and is recorded as such in the project's design notes.

use pep9_memory::MemoryDevice;
use pep9_micro::{CodeLine, Signal};

use crate::alu::{self, AluFunction};
use crate::error::ErrorLatch;
use crate::registers::{RegisterFile, RegisterSelect};

/// Apply `code`'s signals and clocks for one cycle. Returns the byte read from memory this cycle,
/// if `MemRead` was asserted (callers use it for tracing).
pub fn step<M: MemoryDevice>(
    code: &CodeLine,
    registers: &mut RegisterFile,
    memory: &mut M,
    errors: &mut ErrorLatch,
) -> Option<u8> {
    let regs = registers.current();
    let a_reg = code.signal_value(Signal::A).and_then(RegisterSelect::from_selector);
    let b_reg = code.signal_value(Signal::B).and_then(RegisterSelect::from_selector);
    let c_reg = code.signal_value(Signal::C).and_then(RegisterSelect::from_selector);

    let address = regs.os;
    let mut membyte = None;

    if code.has_signal(Signal::MemRead) {
        match memory.read(address) {
            Ok(b) => membyte = Some(b),
            Err(e) => errors.latch_memory(format!("read refused at 0x{:04X}: {}", address, e)),
        }
    }
    if code.has_signal(Signal::MemWrite) {
        let value = c_reg.map(|r| regs.get(r) as u8).unwrap_or(0);
        if let Err(e) = memory.write(address, value) {
            errors.latch_memory(format!("write refused at 0x{:04X}: {}", address, e));
        }
    }

    let a_mux = code.signal_value(Signal::AMux).unwrap_or(0);
    let alu_input_a = if a_mux == 0 {
        u16::from(membyte.unwrap_or(0))
    } else {
        a_reg.map(|r| registers.current().get(r)).unwrap_or(0)
    };
    let alu_input_b = b_reg.map(|r| registers.current().get(r)).unwrap_or(0);

    let cs_mux = code.signal_value(Signal::CSMux).unwrap_or(0);
    let carry_in = if cs_mux == 0 { false } else { registers.current().c };

    let alu_out = match code.signal_value(Signal::Alu) {
        Some(code) => match AluFunction::from_code(code) {
            Some(f) => Some(alu::evaluate(f, alu_input_a, alu_input_b, carry_in)),
            None => {
                errors.latch_control(format!("ALU function code {} is out of range", code));
                None
            }
        },
        None => None,
    };

    let c_mux = code.signal_value(Signal::CMux).unwrap_or(0);
    let c_bus_value = match (c_mux, alu_out) {
        (1, Some(out)) => out.result,
        _ => alu_input_a,
    };

    if code.has_clock(pep9_micro::Clock::LoadCk) {
        if let Some(reg) = c_reg {
            registers.current_mut().set(reg, c_bus_value);
        }
    }

    let mar_mux = code.signal_value(Signal::MarMux).unwrap_or(0);
    if code.has_clock(pep9_micro::Clock::MarCk) {
        let source = if mar_mux == 0 { registers.current().pc } else { alu_out.map(|o| o.result).unwrap_or(0) };
        registers.current_mut().os = source;
    }

    if let Some(out) = alu_out {
        let and_z = code.has_signal(Signal::AndZ) && code.signal_value(Signal::AndZ) == Some(1);
        if code.has_clock(pep9_micro::Clock::NCk) {
            registers.current_mut().n = out.n;
        }
        if code.has_clock(pep9_micro::Clock::ZCk) {
            let prev_z = registers.current().z;
            registers.current_mut().z = if and_z { out.z && prev_z } else { out.z };
        }
        if code.has_clock(pep9_micro::Clock::VCk) {
            registers.current_mut().v = out.v;
        }
        if code.has_clock(pep9_micro::Clock::CCk) {
            registers.current_mut().c = out.c;
        }
    }

    membyte
}

/// Whether this cycle set the prefetch-valid bit: asserted only when a line both clocks
/// `PValidCk` and supplies a `PValid` value, per §4.5.
pub fn prefetch_valid_this_cycle(code: &CodeLine) -> Option<bool> {
    if code.has_clock(pep9_micro::Clock::PValidCk) {
        code.signal_value(Signal::PValid).map(|v| v != 0)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pep9_memory::FlatMemory;
    use pep9_micro::parse_line;

    fn code_line(src: &str) -> CodeLine {
        match parse_line(src, 1, true).unwrap() {
            pep9_micro::MicrocodeLine::Code(c) => c,
            _ => panic!("expected a code line"),
        }
    }

    #[test]
    fn loadck_latches_the_alu_result_into_the_destination_register() {
        let mut registers = RegisterFile::new();
        registers.current_mut().a = 5;
        registers.current_mut().x = 3;
        let mut memory = FlatMemory::new();
        let mut errors = ErrorLatch::new();
        let code = code_line("A=0, B=1, C=2, AMux=1, ALU=6, CMux=1; LoadCk stop");
        step(&code, &mut registers, &mut memory, &mut errors);
        assert_eq!(registers.current().sp, 8);
        assert!(!errors.has_error());
    }

    #[test]
    fn memread_populates_the_membyte_return_value() {
        let mut registers = RegisterFile::new();
        registers.current_mut().os = 0x10;
        let mut memory = FlatMemory::new();
        memory.set(0x10, 0xAB);
        let mut errors = ErrorLatch::new();
        let code = code_line("MemRead=1; stop");
        let byte = step(&code, &mut registers, &mut memory, &mut errors);
        assert_eq!(byte, Some(0xAB));
    }

    #[test]
    fn andz_ands_with_the_previous_z_flag() {
        let mut registers = RegisterFile::new();
        registers.current_mut().z = true;
        registers.current_mut().a = 1;
        let mut memory = FlatMemory::new();
        let mut errors = ErrorLatch::new();
        let code = code_line("A=0, ALU=0, ANDZ=1; ZCk stop");
        step(&code, &mut registers, &mut memory, &mut errors);
        assert!(!registers.current().z);
    }

    #[test]
    fn prefetch_valid_requires_both_signal_and_clock() {
        let clocked = code_line("PValid=1; PValidCk stop");
        assert_eq!(prefetch_valid_this_cycle(&clocked), Some(true));
        let unclocked = code_line("PValid=1; stop");
        assert_eq!(prefetch_valid_this_cycle(&unclocked), None);
    }
}
