//! Runs a microcode program's `UnitPre:`/`UnitPost:` banners as a self-contained test, per §6's
//! "Unit tests begin with `UnitPre:` / `UnitPost:` and list ... clauses" and §8's scenarios 5/6.
//!
//! A pre-condition is applied directly to the engine's register file and memory device before
//! the program runs to completion; each post-condition is then checked against the final state.
//! Per §7, "Unit post-condition failures produce a single descriptive message per failed spec" —
//! there is no first-failure-wins latching here, every failing spec is reported.

use pep9_memory::MemoryDevice;
use pep9_micro::{RegisterName, Spec};

use crate::engine::Engine;
use crate::registers::{RegisterSelect, RegisterSnapshot};

fn register_select(name: RegisterName) -> RegisterSelect {
    match name {
        RegisterName::A => RegisterSelect::A,
        RegisterName::X => RegisterSelect::X,
        RegisterName::Sp => RegisterSelect::Sp,
        RegisterName::Pc => RegisterSelect::Pc,
        RegisterName::Ir => RegisterSelect::Ir,
        RegisterName::T1 => RegisterSelect::T1,
        RegisterName::Os => RegisterSelect::Os,
    }
}

fn flag(snapshot: &RegisterSnapshot, name: char) -> Option<bool> {
    match name {
        'N' => Some(snapshot.n),
        'Z' => Some(snapshot.z),
        'V' => Some(snapshot.v),
        'C' => Some(snapshot.c),
        'S' => Some(snapshot.s),
        _ => None,
    }
}

fn set_flag(snapshot: &mut RegisterSnapshot, name: char, value: bool) {
    match name {
        'N' => snapshot.n = value,
        'Z' => snapshot.z = value,
        'V' => snapshot.v = value,
        'C' => snapshot.c = value,
        'S' => snapshot.s = value,
        _ => {}
    }
}

/// One failed post-condition, carrying both the clause text and why it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitTestFailure {
    pub spec: Spec,
    pub message: String,
}

/// The outcome of running a microcode unit test: either every post-condition held, or the list
/// of the ones that didn't.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitTestOutcome {
    Passed,
    Failed(Vec<UnitTestFailure>),
}

impl UnitTestOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, UnitTestOutcome::Passed)
    }
}

/// Apply every pre-condition to `engine`'s register file and memory device, run the program to
/// completion (or until a runtime error latches), then check every post-condition.
pub fn run_unit_test<M: MemoryDevice>(
    engine: &mut Engine<M>,
    pre_conditions: &[Spec],
    post_conditions: &[Spec],
) -> UnitTestOutcome {
    apply_pre_conditions(engine, pre_conditions);

    while !engine.is_finished() {
        engine.step_micro();
    }

    check_post_conditions(engine, post_conditions)
}

fn apply_pre_conditions<M: MemoryDevice>(engine: &mut Engine<M>, pre_conditions: &[Spec]) {
    for spec in pre_conditions {
        match *spec {
            Spec::Mem { address, value, two_bytes } => {
                if two_bytes {
                    let bytes = value.to_be_bytes();
                    engine.memory_mut().set(address, bytes[0]);
                    engine.memory_mut().set(address.wrapping_add(1), bytes[1]);
                } else {
                    engine.memory_mut().set(address, value as u8);
                }
            }
            Spec::Register { name, value } => {
                let select = register_select(name);
                engine.registers_mut().current_mut().set(select, value);
                engine.registers_mut().flatten();
            }
            Spec::Flag { name, value } => {
                set_flag(engine.registers_mut().current_mut(), name, value);
                engine.registers_mut().flatten();
            }
        }
    }
}

fn check_post_conditions<M: MemoryDevice>(
    engine: &Engine<M>,
    post_conditions: &[Spec],
) -> UnitTestOutcome {
    let mut failures = Vec::new();
    let snapshot = *engine.registers().current();
    for spec in post_conditions {
        match *spec {
            Spec::Mem { address, value, two_bytes } => {
                let actual = if two_bytes {
                    let hi = engine.memory().get(address);
                    let lo = engine.memory().get(address.wrapping_add(1));
                    u16::from_be_bytes([hi, lo])
                } else {
                    u16::from(engine.memory().get(address))
                };
                if actual != value {
                    failures.push(UnitTestFailure {
                        spec: *spec,
                        message: format!(
                            "expected Mem[0x{:04X}] = 0x{:04X}, got 0x{:04X}",
                            address, value, actual
                        ),
                    });
                }
            }
            Spec::Register { name, value } => {
                let actual = snapshot.get(register_select(name));
                if actual != value {
                    failures.push(UnitTestFailure {
                        spec: *spec,
                        message: format!("expected {} = 0x{:04X}, got 0x{:04X}", name, value, actual),
                    });
                }
            }
            Spec::Flag { name, value } => match flag(&snapshot, name) {
                Some(actual) if actual == value => {}
                Some(actual) => failures.push(UnitTestFailure {
                    spec: *spec,
                    message: format!("expected {} = {}, got {}", name, value as u8, actual as u8),
                }),
                None => failures.push(UnitTestFailure {
                    spec: *spec,
                    message: format!("unknown status flag '{}'", name),
                }),
            },
        }
    }

    if failures.is_empty() {
        UnitTestOutcome::Passed
    } else {
        UnitTestOutcome::Failed(failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pep9_memory::FlatMemory;
    use pep9_micro::MicrocodeProgram;

    fn engine_for(source: &str) -> Engine<FlatMemory> {
        let program = MicrocodeProgram::parse(source, true).unwrap();
        Engine::new(program, FlatMemory::new(), 0x8000)
    }

    #[test]
    fn flag_pre_condition_drives_a_passing_post_condition() {
        let mut engine = engine_for("start: NCk=1; NCk stop");
        let pre = vec![Spec::Flag { name: 'N', value: true }];
        let post = vec![Spec::Flag { name: 'N', value: true }];
        let outcome = run_unit_test(&mut engine, &pre, &post);
        assert!(outcome.is_pass());
    }

    #[test]
    fn mismatched_post_condition_fails_with_a_descriptive_message() {
        let mut engine = engine_for("start: NCk=1; NCk stop");
        let pre = vec![Spec::Flag { name: 'N', value: true }];
        let post = vec![Spec::Flag { name: 'N', value: false }];
        match run_unit_test(&mut engine, &pre, &post) {
            UnitTestOutcome::Failed(failures) => {
                assert_eq!(failures.len(), 1);
                assert!(failures[0].message.contains("expected N = 0"));
            }
            UnitTestOutcome::Passed => panic!("expected a failure"),
        }
    }

    #[test]
    fn memory_pre_and_post_conditions_round_trip() {
        let mut engine = engine_for("start: A=0; LoadCk stop");
        let pre = vec![Spec::Mem { address: 0x10, value: 0x42, two_bytes: false }];
        let post = vec![Spec::Mem { address: 0x10, value: 0x42, two_bytes: false }];
        assert!(run_unit_test(&mut engine, &pre, &post).is_pass());
    }
}
