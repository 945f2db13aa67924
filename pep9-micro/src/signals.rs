//! The fixed control-signal and clock-signal tables the microcode lexer/parser validates lines
//! against. Per Design Note "Module-level mnemonic maps become a single immutable table built
//! once at process start", these are plain `const` slices rather than lazily-built maps: unlike
//! the ISA's opcode table, nothing here needs opcode-position arithmetic at startup.

/// A value-bearing control signal, set with `name=value` before the `;` separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    MemRead,
    MemWrite,
    MarMux,
    AMux,
    CMux,
    CSMux,
    AndZ,
    Alu,
    PValid,
    A,
    B,
    C,
}

/// A boolean clock signal, asserted by bare presence in the clock list after `;`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Clock {
    MarCk,
    LoadCk,
    NCk,
    ZCk,
    VCk,
    CCk,
    SCk,
    PValidCk,
}

/// Table entry: a signal's source spelling and its maximum legal value (inclusive). Single-bit
/// signals have `max = 1`; `Alu`'s 4-bit function select has `max = 15`; the three register-select
/// signals address up to the 7 named registers (`max = 6`).
pub const SIGNALS: &[(&str, Signal, u8)] = &[
    ("MemRead", Signal::MemRead, 1),
    ("MemWrite", Signal::MemWrite, 1),
    ("MARMux", Signal::MarMux, 1),
    ("AMux", Signal::AMux, 1),
    ("CMux", Signal::CMux, 1),
    ("CSMux", Signal::CSMux, 1),
    ("ANDZ", Signal::AndZ, 1),
    ("ALU", Signal::Alu, 15),
    ("PValid", Signal::PValid, 1),
    ("A", Signal::A, 6),
    ("B", Signal::B, 6),
    ("C", Signal::C, 6),
];

pub const CLOCKS: &[(&str, Clock)] = &[
    ("MARCk", Clock::MarCk),
    ("LoadCk", Clock::LoadCk),
    ("NCk", Clock::NCk),
    ("ZCk", Clock::ZCk),
    ("VCk", Clock::VCk),
    ("CCk", Clock::CCk),
    ("SCk", Clock::SCk),
    ("PValidCk", Clock::PValidCk),
];

pub fn lookup_signal(name: &str) -> Option<(Signal, u8)> {
    SIGNALS.iter().find(|(n, _, _)| *n == name).map(|&(_, s, max)| (s, max))
}

pub fn lookup_clock(name: &str) -> Option<Clock> {
    CLOCKS.iter().find(|(n, _)| *n == name).map(|&(_, c)| c)
}

pub fn signal_name(signal: Signal) -> &'static str {
    SIGNALS.iter().find(|(_, s, _)| *s == signal).map(|&(n, _, _)| n).unwrap_or("?")
}

pub fn clock_name(clock: Clock) -> &'static str {
    CLOCKS.iter().find(|(_, c)| *c == clock).map(|&(n, _)| n).unwrap_or("?")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_known_signal() {
        assert_eq!(lookup_signal("ALU"), Some((Signal::Alu, 15)));
    }

    #[test]
    fn looks_up_known_clock() {
        assert_eq!(lookup_clock("LoadCk"), Some(Clock::LoadCk));
    }

    #[test]
    fn unknown_names_resolve_to_none() {
        assert_eq!(lookup_signal("Bogus"), None);
        assert_eq!(lookup_clock("Bogus"), None);
    }
}
