//! `Spec`: one clause of a `UnitPre:`/`UnitPost:` line — an assertion about a memory byte, a
//! register's value, or a status bit, checked before/after a microcode unit test runs.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spec {
    /// `Mem[0xNNNN]=0xNN` or `Mem[0xNNNN]=0xNNNN` — a one- or two-byte memory assertion. The
    /// width is inferred from how many hex digits follow `=`, mirroring the source spelling.
    Mem { address: u16, value: u16, two_bytes: bool },
    /// `REG=0xNNNN` — a register assertion, where `name` is one of `A`, `X`, `SP`, `PC`, `IR`,
    /// `T1`, `OS`.
    Register { name: RegisterName, value: u16 },
    /// `FLAG=0|1` — a status-bit assertion, where `name` is one of `N`, `Z`, `V`, `C`, `S`.
    Flag { name: char, value: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterName {
    A,
    X,
    Sp,
    Pc,
    Ir,
    T1,
    Os,
}

impl RegisterName {
    pub fn parse(text: &str) -> Option<RegisterName> {
        match text {
            "A" => Some(RegisterName::A),
            "X" => Some(RegisterName::X),
            "SP" => Some(RegisterName::Sp),
            "PC" => Some(RegisterName::Pc),
            "IR" => Some(RegisterName::Ir),
            "T1" => Some(RegisterName::T1),
            "OS" => Some(RegisterName::Os),
            _ => None,
        }
    }
}

impl fmt::Display for RegisterName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            RegisterName::A => "A",
            RegisterName::X => "X",
            RegisterName::Sp => "SP",
            RegisterName::Pc => "PC",
            RegisterName::Ir => "IR",
            RegisterName::T1 => "T1",
            RegisterName::Os => "OS",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for Spec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Spec::Mem { address, value, two_bytes } => {
                if *two_bytes {
                    write!(f, "Mem[0x{:04X}]=0x{:04X}", address, value)
                } else {
                    write!(f, "Mem[0x{:04X}]=0x{:02X}", address, value)
                }
            }
            Spec::Register { name, value } => write!(f, "{}=0x{:04X}", name, value),
            Spec::Flag { name, value } => write!(f, "{}={}", name, *value as u8),
        }
    }
}

pub const FLAG_NAMES: &[char] = &['N', 'Z', 'V', 'C', 'S'];
