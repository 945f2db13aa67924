//! The ALU: the 16 functions selectable by the microcode `ALU` signal (`pep9_micro::signals`'s
//! 4-bit `Alu` field), each combining the `A`/`B` data-section inputs and producing a result plus
//! the `N`/`Z`/`V`/`C` status bits.

/// One of the 16 functions the microcode `ALU=n` signal selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluFunction {
    /// 0: pass `A` through unchanged.
    PassA,
    /// 1: pass `B` through unchanged.
    PassB,
    /// 2: `~A` (one's complement).
    NotA,
    /// 3: `~B`.
    NotB,
    /// 4: `-A` (two's complement negate).
    NegA,
    /// 5: `-B`.
    NegB,
    /// 6: `A + B`.
    Add,
    /// 7: `A + ~B + 1` (subtract).
    Sub,
    /// 8: `A & B`.
    And,
    /// 9: `A | B`.
    Or,
    /// 10: `A ^ B`.
    Xor,
    /// 11: arithmetic shift left of `A`.
    Asl,
    /// 12: arithmetic shift right of `A`.
    Asr,
    /// 13: rotate left of `A` through carry.
    Rol,
    /// 14: rotate right of `A` through carry.
    Ror,
    /// 15: transfer `A` to status bits only (used by `MOVAFLG`-style microcode to force `N`/`Z`
    /// without touching the bus).
    TestA,
}

impl AluFunction {
    pub fn from_code(code: u8) -> Option<AluFunction> {
        use AluFunction::*;
        Some(match code {
            0 => PassA,
            1 => PassB,
            2 => NotA,
            3 => NotB,
            4 => NegA,
            5 => NegB,
            6 => Add,
            7 => Sub,
            8 => And,
            9 => Or,
            10 => Xor,
            11 => Asl,
            12 => Asr,
            13 => Rol,
            14 => Ror,
            15 => TestA,
            _ => return None,
        })
    }
}

/// The ALU's output: a 16-bit result plus the four flags this cycle computed (`S`, the "trap
/// is unary" sentinel, is never an ALU output — the engine sets it directly from the IR).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AluOutput {
    pub result: u16,
    pub n: bool,
    pub z: bool,
    pub v: bool,
    pub c: bool,
}

/// Evaluate `function` over inputs `a`/`b`, with `carry_in` the current `C` status bit (rotates
/// shift it in).
pub fn evaluate(function: AluFunction, a: u16, b: u16, carry_in: bool) -> AluOutput {
    use AluFunction::*;
    let (result, carry, overflow) = match function {
        PassA => (a, false, false),
        PassB => (b, false, false),
        NotA => (!a, false, false),
        NotB => (!b, false, false),
        NegA => {
            let (r, c) = 0u16.overflowing_sub(a);
            let overflow = a == 0x8000;
            (r, c, overflow)
        }
        NegB => {
            let (r, c) = 0u16.overflowing_sub(b);
            let overflow = b == 0x8000;
            (r, c, overflow)
        }
        Add => {
            let (r, c) = a.overflowing_add(b);
            let overflow = (a ^ r) & (b ^ r) & 0x8000 != 0;
            (r, c, overflow)
        }
        Sub => {
            let (sum, c1) = a.overflowing_add(!b);
            let (r, c2) = sum.overflowing_add(1);
            let overflow = (a ^ r) & (!b ^ r) & 0x8000 != 0;
            (r, c1 || c2, overflow)
        }
        And => (a & b, false, false),
        Or => (a | b, false, false),
        Xor => (a ^ b, false, false),
        Asl => {
            let carry = a & 0x8000 != 0;
            let r = a << 1;
            let overflow = (a & 0x8000) != (r & 0x8000);
            (r, carry, overflow)
        }
        Asr => {
            let carry = a & 0x0001 != 0;
            let sign = a & 0x8000;
            let r = (a >> 1) | sign;
            (r, carry, false)
        }
        Rol => {
            let carry = a & 0x8000 != 0;
            let r = (a << 1) | u16::from(carry_in);
            (r, carry, false)
        }
        Ror => {
            let carry = a & 0x0001 != 0;
            let r = (a >> 1) | (u16::from(carry_in) << 15);
            (r, carry, false)
        }
        TestA => (a, false, false),
    };
    AluOutput { result, n: result & 0x8000 != 0, z: result == 0, v: overflow, c: carry }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_sets_carry_on_unsigned_overflow() {
        let out = evaluate(AluFunction::Add, 0xFFFF, 0x0001, false);
        assert_eq!(out.result, 0);
        assert!(out.c);
        assert!(out.z);
    }

    #[test]
    fn add_sets_overflow_on_signed_overflow() {
        let out = evaluate(AluFunction::Add, 0x7FFF, 0x0001, false);
        assert_eq!(out.result, 0x8000);
        assert!(out.v);
        assert!(out.n);
    }

    #[test]
    fn sub_computes_twos_complement_difference() {
        let out = evaluate(AluFunction::Sub, 10, 3, false);
        assert_eq!(out.result, 7);
        assert!(!out.n);
    }

    #[test]
    fn asl_shifts_sign_bit_into_carry() {
        let out = evaluate(AluFunction::Asl, 0x8001, 0, false);
        assert_eq!(out.result, 0x0002);
        assert!(out.c);
    }

    #[test]
    fn rol_brings_in_the_current_carry_bit() {
        let out = evaluate(AluFunction::Rol, 0x0001, 0, true);
        assert_eq!(out.result, 0x0003);
    }

    #[test]
    fn not_a_complements_bitwise() {
        let out = evaluate(AluFunction::NotA, 0x00FF, 0, false);
        assert_eq!(out.result, 0xFF00);
    }

    #[test]
    fn from_code_rejects_values_above_15() {
        assert_eq!(AluFunction::from_code(16), None);
        assert_eq!(AluFunction::from_code(15), Some(AluFunction::TestA));
    }
}
