//! The ISA-level symbolic stack/heap trace: a model of the running program's stack frames, kept
//! in parallel with the real byte-addressed stack so a debugger can label memory as "locals of
//! `foo`" rather than raw bytes. Maintained from the start/current register snapshots and the
//! static per-instruction trace-tag lists the assembler attaches to `SUBSP`/`ADDSP`/`CALL`.

use pep9_types::TypeTag;

/// What kind of activation record one stack-trace frame represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Pushed by `CALL`/a trap: the return address. Carries no typed items.
    Call,
    /// Pushed by a `SUBSP` that is the first instruction after a call.
    Locals,
    /// Pushed by any other `SUBSP`.
    Params,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub kind: FrameKind,
    pub items: Vec<TypeTag>,
}

impl Frame {
    pub fn size(&self) -> u32 {
        self.items.iter().map(TypeTag::size).sum()
    }
}

/// One call stack's worth of frames (the engine keeps one for the user program and one for the
/// operating system, switching between them at trap/`RETTR` boundaries).
#[derive(Debug, Clone, Default)]
pub struct StackTrace {
    frames: Vec<Frame>,
    intact: bool,
    error_message: Option<String>,
}

impl StackTrace {
    pub fn new() -> Self {
        StackTrace { frames: Vec::new(), intact: true, error_message: None }
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn is_intact(&self) -> bool {
        self.intact
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn set_not_intact(&mut self, message: impl Into<String>) {
        self.intact = false;
        self.error_message = Some(message.into());
    }

    pub fn call(&mut self) {
        self.frames.push(Frame { kind: FrameKind::Call, items: Vec::new() });
    }

    /// `RET`: the top frame must be a `Call` frame. Returns whether it was.
    pub fn ret(&mut self) -> bool {
        match self.frames.last() {
            Some(f) if f.kind == FrameKind::Call => {
                self.frames.pop();
                true
            }
            _ => false,
        }
    }

    pub fn push_locals(&mut self, items: Vec<TypeTag>) {
        self.frames.push(Frame { kind: FrameKind::Locals, items });
    }

    pub fn push_params(&mut self, items: Vec<TypeTag>) {
        self.frames.push(Frame { kind: FrameKind::Params, items });
    }

    pub fn top_size(&self) -> Option<u32> {
        self.frames.last().map(Frame::size)
    }

    /// `ADDSP n` when the top frame is exactly `n` bytes of locals: pop it entirely.
    pub fn pop_locals(&mut self, size: u32) -> bool {
        match self.frames.last() {
            Some(f) if f.kind == FrameKind::Locals && f.size() == size => {
                self.frames.pop();
                true
            }
            _ => false,
        }
    }

    /// `ADDSP n` when the top frame is params and bigger than `n`: peel `n` bytes' worth of
    /// items off the low-address end, leaving the remainder as a smaller params frame.
    pub fn pop_and_orphan(&mut self, size: u32) -> bool {
        let Some(top) = self.frames.last_mut() else { return false };
        if top.kind != FrameKind::Params || top.size() <= size {
            return false;
        }
        let mut removed = 0u32;
        let mut cut = 0;
        for item in &top.items {
            if removed >= size {
                break;
            }
            removed += item.size();
            cut += 1;
        }
        if removed != size {
            return false;
        }
        top.items.drain(0..cut);
        true
    }

    /// `ADDSP n` when the top frame is params and its size exactly matches the slice being
    /// popped: remove it entirely. `size` here is the top frame's own size, pre-validated by the
    /// caller against its running total.
    pub fn pop_params(&mut self, size: u32) -> bool {
        match self.frames.last() {
            Some(f) if f.kind == FrameKind::Params && f.size() == size => {
                self.frames.pop();
                true
            }
            _ => false,
        }
    }
}

/// One heap allocation, tracked from `CALL malloc` when the call carries a trace-tag list.
#[derive(Debug, Clone, PartialEq)]
pub struct HeapBlock {
    pub address: u16,
    pub items: Vec<TypeTag>,
}

/// The full symbolic memory trace: one stack for the user program, one for the operating system
/// (traps and `RETTR` switch which is "active"), and a heap that only ever grows.
#[derive(Debug, Clone)]
pub struct MemoryTrace {
    pub user_stack: StackTrace,
    pub os_stack: StackTrace,
    pub active_is_os: bool,
    pub heap: Vec<HeapBlock>,
    pub heap_pointer: u16,
    /// Set by `CALL` so the engine knows the very next `SUBSP` is a locals frame rather than
    /// params.
    pub first_line_after_call: bool,
}

impl MemoryTrace {
    pub fn new(heap_pointer: u16) -> Self {
        MemoryTrace {
            user_stack: StackTrace::new(),
            os_stack: StackTrace::new(),
            active_is_os: false,
            heap: Vec::new(),
            heap_pointer,
            first_line_after_call: false,
        }
    }

    pub fn active(&self) -> &StackTrace {
        if self.active_is_os {
            &self.os_stack
        } else {
            &self.user_stack
        }
    }

    pub fn active_mut(&mut self) -> &mut StackTrace {
        if self.active_is_os {
            &mut self.os_stack
        } else {
            &mut self.user_stack
        }
    }

    pub fn switch_to_os(&mut self) {
        self.active_is_os = true;
    }

    pub fn switch_to_user(&mut self) {
        self.active_is_os = false;
    }

    pub fn push_heap(&mut self, items: Vec<TypeTag>) -> u16 {
        let address = self.heap_pointer;
        let size: u32 = items.iter().map(TypeTag::size).sum();
        self.heap.push(HeapBlock { address, items });
        self.heap_pointer = self.heap_pointer.wrapping_add(size as u16);
        address
    }

    pub fn reset(&mut self) {
        *self = MemoryTrace::new(self.heap_pointer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pep9_types::Fmt;

    fn prim(fmt: Fmt) -> TypeTag {
        TypeTag::LiteralPrimitive { fmt }
    }

    #[test]
    fn call_then_ret_balances() {
        let mut trace = StackTrace::new();
        trace.call();
        assert!(trace.ret());
        assert!(trace.frames().is_empty());
    }

    #[test]
    fn ret_without_a_call_frame_fails() {
        let mut trace = StackTrace::new();
        trace.push_locals(vec![prim(Fmt::TwoByteDec)]);
        assert!(!trace.ret());
    }

    #[test]
    fn subsp_then_addsp_of_equal_size_balances() {
        let mut trace = StackTrace::new();
        trace.push_locals(vec![prim(Fmt::TwoByteDec), prim(Fmt::OneByteChar)]);
        assert_eq!(trace.top_size(), Some(3));
        assert!(trace.pop_locals(3));
        assert!(trace.frames().is_empty());
    }

    #[test]
    fn params_orphan_peels_from_the_front() {
        let mut trace = StackTrace::new();
        trace.push_params(vec![prim(Fmt::TwoByteDec), prim(Fmt::TwoByteDec)]);
        assert!(trace.pop_and_orphan(2));
        assert_eq!(trace.top_size(), Some(2));
    }

    #[test]
    fn heap_pointer_advances_by_allocation_size() {
        let mut mem = MemoryTrace::new(0x8000);
        let addr = mem.push_heap(vec![prim(Fmt::TwoByteDec), prim(Fmt::TwoByteDec)]);
        assert_eq!(addr, 0x8000);
        assert_eq!(mem.heap_pointer, 0x8004);
    }

    #[test]
    fn switching_to_os_isolates_the_active_stack() {
        let mut mem = MemoryTrace::new(0);
        mem.user_stack.call();
        mem.switch_to_os();
        assert!(mem.active().frames().is_empty());
        mem.switch_to_user();
        assert_eq!(mem.active().frames().len(), 1);
    }
}
