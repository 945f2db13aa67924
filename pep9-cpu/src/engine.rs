//! The microcoded CPU engine: steps one loaded [`MicrocodeProgram`] cycle by cycle against a
//! [`MemoryDevice`], evaluating branch functions, latching runtime errors, and maintaining the
//! ISA-level call/stack trace and per-instruction memoizer.

use std::collections::{BTreeSet, HashMap};

use pep9_micro::{BranchFunction, Condition, MicrocodeProgram};
use pep9_memory::MemoryDevice;
use pep9_types::TypeTag;

use crate::datapath;
use crate::error::ErrorLatch;
use crate::jumptable::{self, JumpEntry, JumpTable};
use crate::memoizer::Memoizer;
use crate::registers::RegisterFile;
use crate::trace::MemoryTrace;

/// I/O trap mnemonics: unary at the micro level (one microcode dispatch, no operand fetch)
/// even though they're non-unary at the ISA level.
const TRAP_MNEMONICS: &[&str] = &["DECI", "DECO", "HEXO", "STRO"];

/// How many micro-cycles [`Engine::run_with_observer`] executes between checks of `observer`.
const RUN_SLICE: u32 = 5000;

/// The engine's only hook into a host's event loop (§5, §9 "UI-coupled model events become a
/// narrow observer trait"). `run_with_observer` calls [`RunObserver::on_slice_yield`] every
/// [`RUN_SLICE`] micro-cycles; there is no other way for the engine to observe the outside world
/// mid-run, and no implicit event loop runs on its own.
pub trait RunObserver {
    /// Called after each slice of [`RUN_SLICE`] cycles. Return `false` to stop the run early, as
    /// if a breakpoint had been hit.
    fn on_slice_yield(&mut self) -> bool;
}

impl RunObserver for () {
    fn on_slice_yield(&mut self) -> bool {
        true
    }
}

fn eval_condition(cond: Condition, regs: &crate::registers::RegisterSnapshot) -> bool {
    let signed_lt = regs.n ^ regs.v;
    match cond {
        Condition::N => regs.n,
        Condition::Z => regs.z,
        Condition::V => regs.v,
        Condition::C => regs.c,
        Condition::S => regs.s,
        Condition::BrEq => regs.z,
        Condition::BrNe => !regs.z,
        Condition::BrLt => signed_lt,
        Condition::BrLe => signed_lt || regs.z,
        Condition::BrGe => !signed_lt,
        Condition::BrGt => !(signed_lt || regs.z),
    }
}

/// A microcoded CPU bound to a loaded microprogram and a memory device.
pub struct Engine<M: MemoryDevice> {
    program: MicrocodeProgram,
    isd: JumpTable,
    amd: JumpTable,
    registers: RegisterFile,
    memory: M,
    memoizer: Memoizer,
    errors: ErrorLatch,
    trace: MemoryTrace,
    /// Per-instruction trace-tag lists keyed by the start-of-instruction PC, supplied by whatever
    /// assembled the loaded program's type information (a `CALL malloc #2d`-style annotation, or
    /// a `SUBSP`/`ADDSP` operand's declared local/param layout).
    trace_tags: HashMap<u16, Vec<TypeTag>>,
    /// The address `CALL` must target for the call to be treated as a heap allocation.
    malloc_address: Option<u16>,
    upc: usize,
    micro_breakpoints: BTreeSet<usize>,
    asm_breakpoints: BTreeSet<u16>,
    micro_breakpoint_hit: bool,
    asm_breakpoint_hit: bool,
    execution_finished: bool,
    prefetch_valid: bool,
    call_depth: i64,
    bytes_read_this_instruction: Vec<u16>,
    bytes_written_this_instruction: Vec<u16>,
    pending_opcode: Option<u8>,
}

impl<M: MemoryDevice> Engine<M> {
    pub fn new(program: MicrocodeProgram, memory: M, heap_base: u16) -> Self {
        let isd = jumptable::build_isd(&program);
        let amd = jumptable::build_amd(&program);
        let upc = program.start_line();
        Engine {
            program,
            isd,
            amd,
            registers: RegisterFile::new(),
            memory,
            memoizer: Memoizer::new(),
            errors: ErrorLatch::new(),
            trace: MemoryTrace::new(heap_base),
            trace_tags: HashMap::new(),
            malloc_address: None,
            upc,
            micro_breakpoints: BTreeSet::new(),
            asm_breakpoints: BTreeSet::new(),
            micro_breakpoint_hit: false,
            asm_breakpoint_hit: false,
            execution_finished: false,
            prefetch_valid: false,
            call_depth: 0,
            bytes_read_this_instruction: Vec::new(),
            bytes_written_this_instruction: Vec::new(),
            pending_opcode: None,
        }
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    /// Mutable access to the register file, used by [`crate::unittest::run_unit_test`] to apply
    /// `UnitPre:` clauses before the program runs.
    pub fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.registers
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    pub fn memoizer(&self) -> &Memoizer {
        &self.memoizer
    }

    pub fn trace(&self) -> &MemoryTrace {
        &self.trace
    }

    pub fn errors(&self) -> &ErrorLatch {
        &self.errors
    }

    pub fn micro_pc(&self) -> usize {
        self.upc
    }

    pub fn is_finished(&self) -> bool {
        self.execution_finished
    }

    pub fn set_malloc_address(&mut self, address: u16) {
        self.malloc_address = Some(address);
    }

    pub fn set_trace_tags(&mut self, pc: u16, tags: Vec<TypeTag>) {
        self.trace_tags.insert(pc, tags);
    }

    pub fn add_micro_breakpoint(&mut self, position: usize) {
        self.micro_breakpoints.insert(position);
    }

    pub fn add_asm_breakpoint(&mut self, address: u16) {
        self.asm_breakpoints.insert(address);
    }

    pub fn micro_breakpoint_hit(&self) -> bool {
        self.micro_breakpoint_hit
    }

    pub fn asm_breakpoint_hit(&self) -> bool {
        self.asm_breakpoint_hit
    }

    /// Resets counters, µPC, call depth, error flags, snapshot caches, and breakpoint latches,
    /// but preserves the loaded microprogram and breakpoint sets.
    pub fn reset(&mut self) {
        self.registers.reset();
        self.memoizer.reset();
        self.errors.clear();
        self.trace.reset();
        self.upc = self.program.start_line();
        self.micro_breakpoint_hit = false;
        self.asm_breakpoint_hit = false;
        self.execution_finished = false;
        self.prefetch_valid = false;
        self.call_depth = 0;
        self.bytes_read_this_instruction.clear();
        self.bytes_written_this_instruction.clear();
        self.pending_opcode = None;
    }

    fn branch_next(&mut self, code: &pep9_micro::CodeLine, true_target: usize, false_target: usize) -> Option<usize> {
        let regs = *self.registers.current();
        match code.branch {
            BranchFunction::Unconditional => Some(true_target),
            BranchFunction::Conditional(cond) => {
                Some(if eval_condition(cond, &regs) { true_target } else { false_target })
            }
            BranchFunction::IsPrefetchValid => Some(if self.prefetch_valid { true_target } else { false_target }),
            BranchFunction::IsUnary => {
                let opcode = regs.ir_opcode();
                let unary = match pep9_isa::decode_opcode(opcode) {
                    Some((mnemonic, mode)) => mode.is_none() || TRAP_MNEMONICS.contains(&mnemonic),
                    None => true,
                };
                Some(if unary { true_target } else { false_target })
            }
            BranchFunction::IsPCEven => Some(if regs.pc & 1 == 0 { true_target } else { false_target }),
            BranchFunction::AddressingModeDecoder => self.resolve_decoder(&self.amd.clone(), regs.ir_opcode(), jumptable::amd_symbol_for),
            BranchFunction::InstructionSpecifierDecoder => {
                self.resolve_decoder(&self.isd.clone(), regs.ir_opcode(), jumptable::isd_symbol_for)
            }
            BranchFunction::Stop => None,
            BranchFunction::AssemblerAssigned => {
                unreachable!("AssemblerAssigned never survives MicrocodeProgram::parse's link pass")
            }
        }
    }

    fn resolve_decoder(
        &mut self,
        table: &JumpTable,
        opcode: u8,
        symbol_for: impl Fn(u8) -> Option<&'static str>,
    ) -> Option<usize> {
        match table.get(opcode) {
            JumpEntry::Valid(pos) => Some(pos),
            JumpEntry::Invalid => {
                let name = symbol_for(opcode).unwrap_or("<unknown>");
                self.errors.latch_control(format!("jump table has no entry for symbol '{}'", name));
                None
            }
        }
    }

    /// Execute exactly one microcode line, per §4.5's single-step algorithm. Returns `true` if
    /// this step completed an ISA instruction (µPC returned to the start line).
    pub fn step_micro(&mut self) -> bool {
        if self.execution_finished {
            return false;
        }
        self.micro_breakpoint_hit = false;
        self.asm_breakpoint_hit = false;

        let start_line = self.program.start_line();
        if self.upc == start_line {
            self.pending_opcode = Some(self.registers.current().ir_opcode());
            self.update_call_depth_before_step();
            self.registers.flatten();
            self.memory.begin_cycle();
            self.bytes_read_this_instruction.clear();
            self.bytes_written_this_instruction.clear();
        }

        let linked = &self.program.code_lines[self.upc];
        let code = linked.source.clone();
        let true_target = linked.true_target;
        let false_target = linked.false_target;

        if let Some(byte) = datapath::step(&code, &mut self.registers, &mut self.memory, &mut self.errors) {
            if code.has_signal(pep9_micro::Signal::MemRead) {
                self.bytes_read_this_instruction.push(self.registers.current().os);
            }
            let _ = byte;
        }
        if code.has_signal(pep9_micro::Signal::MemWrite) {
            self.bytes_written_this_instruction.push(self.registers.current().os);
        }
        if let Some(valid) = datapath::prefetch_valid_this_cycle(&code) {
            self.prefetch_valid = valid;
        }
        if self.errors.has_error() {
            self.execution_finished = true;
            return false;
        }

        let next = self.branch_next(&code, true_target, false_target);

        self.memoizer.stats.record_micro_cycle();

        let completed_instruction;
        match next {
            None => {
                self.execution_finished = true;
                completed_instruction = false;
            }
            Some(next_upc) => {
                if next_upc == self.upc {
                    self.errors.latch_control("microinstructions cannot branch to themselves");
                    self.execution_finished = true;
                    completed_instruction = false;
                } else {
                    completed_instruction = next_upc == start_line;
                    self.upc = next_upc;
                }
            }
        }

        if completed_instruction {
            self.update_call_depth_after_step();
            self.registers.flatten();
            let start = *self.registers.start();
            let end = *self.registers.current();
            self.memoizer.snapshot(
                &start,
                &end,
                std::mem::take(&mut self.bytes_read_this_instruction),
                std::mem::take(&mut self.bytes_written_this_instruction),
            );
            if self.asm_breakpoints.contains(&self.registers.current().pc) {
                self.asm_breakpoint_hit = true;
            }
        }

        if self.micro_breakpoints.contains(&self.upc) {
            self.micro_breakpoint_hit = true;
        }

        completed_instruction
    }

    /// Before the about-to-execute instruction runs: route trap/`RETTR` transitions between the
    /// user and OS stack traces.
    fn update_call_depth_before_step(&mut self) {
        let Some(opcode) = self.pending_opcode else { return };
        let Some((mnemonic, _)) = pep9_isa::decode_opcode(opcode) else { return };
        if TRAP_MNEMONICS.contains(&mnemonic) {
            self.trace.switch_to_os();
        } else if mnemonic == "RETTR" {
            self.trace.switch_to_user();
        }
    }

    /// After the instruction just executed: update the active stack trace per §4.5's
    /// `CALL`/`RET`/`SUBSP`/`ADDSP` rules, using the start-of-instruction PC/SP and the
    /// end-of-instruction `A` register.
    fn update_call_depth_after_step(&mut self) {
        let Some(opcode) = self.pending_opcode else { return };
        let Some((mnemonic, _)) = pep9_isa::decode_opcode(opcode) else { return };
        let start = *self.registers.start();
        let current_a = self.registers.current().a;
        let operand = start.ir_operand();
        let start_pc = start.pc;

        match mnemonic {
            "CALL" => {
                self.call_depth += 1;
                self.trace.active_mut().call();
                if self.malloc_address == Some(operand) {
                    if let Some(tags) = self.trace_tags.get(&start_pc).cloned() {
                        self.trace.push_heap(tags);
                    }
                }
                self.trace.first_line_after_call = true;
            }
            "RET" => {
                self.call_depth -= 1;
                if !self.trace.active_mut().ret() {
                    self.trace.active_mut().set_not_intact("RET with no matching CALL frame on the stack");
                }
            }
            "SUBSP" => {
                let n = operand;
                let size: u32 = self
                    .trace_tags
                    .get(&start_pc)
                    .map(|tags| tags.iter().map(TypeTag::size).sum())
                    .unwrap_or(u32::from(n));
                if size != u32::from(n) {
                    self.trace.active_mut().set_not_intact(format!(
                        "SUBSP {} does not match declared trace-tag size {}",
                        n, size
                    ));
                } else {
                    let items = self.trace_tags.get(&start_pc).cloned().unwrap_or_default();
                    if self.trace.first_line_after_call {
                        self.trace.active_mut().push_locals(items);
                    } else {
                        self.trace.active_mut().push_params(items);
                    }
                }
                self.trace.first_line_after_call = false;
            }
            "ADDSP" => {
                let n = u32::from(operand);
                let active = self.trace.active_mut();
                let ok = match active.top_size() {
                    Some(top) if top == n => active.pop_locals(n) || active.pop_params(n),
                    Some(top) if top > n => active.pop_and_orphan(n),
                    Some(top) if top < n => {
                        let mut remaining = n;
                        let mut ok = true;
                        while remaining > 0 {
                            match active.top_size() {
                                Some(size) if size <= remaining => {
                                    remaining -= size;
                                    if !(active.pop_locals(size) || active.pop_params(size)) {
                                        ok = false;
                                        break;
                                    }
                                }
                                Some(size) => {
                                    let cut = remaining;
                                    remaining = 0;
                                    if !active.pop_and_orphan(cut) {
                                        ok = false;
                                    }
                                    let _ = size;
                                }
                                None => {
                                    ok = false;
                                    break;
                                }
                            }
                        }
                        ok
                    }
                    None => n == 0,
                };
                if !ok {
                    self.trace.active_mut().set_not_intact(format!("ADDSP {} does not balance the current frame", n));
                }
                self.trace.first_line_after_call = false;
            }
            m if m.starts_with("BR") => {
                self.trace.first_line_after_call = true;
            }
            _ => {
                self.trace.first_line_after_call = false;
            }
        }
    }

    /// Repeats [`Engine::step_micro`] until one ISA instruction completes, or an error/breakpoint
    /// cuts it short.
    pub fn step_isa(&mut self) {
        loop {
            if self.execution_finished || self.micro_breakpoint_hit {
                return;
            }
            if self.step_micro() {
                return;
            }
        }
    }

    /// Loops [`Engine::step_micro`] until error, finish, or breakpoint, with no event pump (the
    /// common case for batch/test callers). Equivalent to `run_with_observer(&mut ())`.
    pub fn run(&mut self) {
        self.run_with_observer(&mut ());
    }

    /// Loops [`Engine::step_micro`] until error, finish, or breakpoint. Every 5000 cycles, control
    /// is handed to `observer` so an embedding host can pump its own event loop or request
    /// cancellation (§5); returning `false` from [`RunObserver::on_slice_yield`] stops the run
    /// early, as if a breakpoint had been hit.
    pub fn run_with_observer(&mut self, observer: &mut impl RunObserver) {
        self.micro_breakpoint_hit = false;
        self.asm_breakpoint_hit = false;
        let mut cycles = 0u32;
        loop {
            if self.execution_finished || self.micro_breakpoint_hit || self.asm_breakpoint_hit {
                return;
            }
            self.step_micro();
            cycles += 1;
            if cycles % RUN_SLICE == 0 {
                log::trace!("engine: {} micro-cycles executed", cycles);
                if !observer.on_slice_yield() {
                    return;
                }
            }
        }
    }

    pub fn step_over(&mut self) {
        let depth = self.call_depth;
        self.step_isa();
        while !self.execution_finished && !self.micro_breakpoint_hit && self.call_depth > depth {
            self.step_isa();
        }
    }

    pub fn step_into(&mut self) {
        self.step_isa();
    }

    pub fn step_out(&mut self) {
        let depth = self.call_depth;
        while !self.execution_finished && !self.micro_breakpoint_hit && self.call_depth >= depth {
            self.step_isa();
        }
    }
}
