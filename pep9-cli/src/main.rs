//! `pep9`: a batch-mode front end for the Pep/9 toolchain, in the spirit of the original
//! `Pep9Term` command-line runner. Three subcommands: `asm` drives the ISA assembler, `micro`
//! drives the microcode assembler (and, when the source carries `UnitPre:`/`UnitPost:` banners,
//! the unit-test runner), and `run` drives the CPU engine end to end.
//!
//! Per §4.7, this binary is the only place in the workspace that installs a logger
//! (`env_logger::init`) — every library crate only ever emits `log::*` calls.

mod io;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use pep9_asm::{format_error_log as asm_error_log, full_listing, object_code_text, AsmProgramManager};
use pep9_cpu::{run_unit_test, Engine, UnitTestOutcome};
use pep9_memory::FlatMemory;
use pep9_micro::{format_error_log as micro_error_log, MicrocodeProgram};

use io::ConsoleMemory;

#[derive(Parser)]
#[command(name = "pep9", version, about = "Batch-mode Pep/9 assembler, microcode assembler, and CPU runner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble a Pep/9 ISA source file, writing `.obj`/`.lst`/`.err` beside it.
    Asm {
        source: PathBuf,
        /// Operating system source to assemble first and load the user program against.
        #[arg(long)]
        os: Option<PathBuf>,
        /// Reject the operating system unless its `.BURN` address is exactly 0xFFFF.
        #[arg(long)]
        burn_at_ffff: bool,
    },
    /// Assemble a Pep/9 microcode source file, writing a `.microerr` log; runs any embedded
    /// `UnitPre:`/`UnitPost:` unit test and reports pass/fail.
    Micro {
        source: PathBuf,
        /// Allow symbolic branches (`goto`/`if`/`AMD`/`ISD`); off assembles only plain lines.
        #[arg(long)]
        extended: bool,
    },
    /// Assemble a user program (and optional OS) against a microcode source and run it to
    /// completion, redirecting charIn/charOut to files.
    Run {
        source: PathBuf,
        #[arg(long)]
        os: Option<PathBuf>,
        /// Microcode source controlling the data path; the toolchain carries no built-in one.
        #[arg(long)]
        micro: PathBuf,
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long, default_value_t = 1_000_000)]
        max_steps: u64,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    match Cli::parse().command {
        Command::Asm { source, os, burn_at_ffff } => run_asm(&source, os.as_deref(), burn_at_ffff),
        Command::Micro { source, extended } => run_micro(&source, extended),
        Command::Run { source, os, micro, input, output, max_steps } => {
            run_cpu(&source, os.as_deref(), &micro, input.as_deref(), output.as_deref(), max_steps)
        }
    }
}

fn beside(source: &Path, suffix: &str) -> PathBuf {
    let mut name = source.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn run_asm(source: &Path, os: Option<&Path>, burn_at_ffff: bool) -> ExitCode {
    match assemble_pair(source, os, burn_at_ffff) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("pep9 asm: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn assemble_pair(source: &Path, os: Option<&Path>, burn_at_ffff: bool) -> Result<()> {
    let mut manager = AsmProgramManager::new();

    if let Some(os_path) = os {
        let os_text = fs::read_to_string(os_path)
            .with_context(|| format!("reading operating system source {}", os_path.display()))?;
        match manager.assemble_os(&os_text, burn_at_ffff) {
            Ok(outcome) => {
                fs::write(beside(os_path, ".obj"), object_code_text(&outcome.program.object_code()))?;
                fs::write(beside(os_path, ".lst"), full_listing(&outcome.program))?;
                fs::write(beside(os_path, ".err"), asm_error_log(&os_text, &outcome.warnings))?;
            }
            Err(errors) => {
                fs::write(beside(os_path, ".err"), asm_error_log(&os_text, &errors))?;
                anyhow::bail!("operating system assembly failed with {} error(s)", errors.len());
            }
        }
    }

    let source_text =
        fs::read_to_string(source).with_context(|| format!("reading source {}", source.display()))?;
    match manager.assemble_user(&source_text) {
        Ok(outcome) => {
            fs::write(beside(source, ".obj"), object_code_text(&outcome.program.object_code()))?;
            fs::write(beside(source, ".lst"), full_listing(&outcome.program))?;
            fs::write(beside(source, ".err"), asm_error_log(&source_text, &outcome.warnings))?;
            log::info!(
                "assembled {} ({} bytes)",
                source.display(),
                outcome.program.program_byte_length()
            );
            Ok(())
        }
        Err(errors) => {
            fs::write(beside(source, ".err"), asm_error_log(&source_text, &errors))?;
            anyhow::bail!("assembly failed with {} error(s)", errors.len());
        }
    }
}

fn run_micro(source: &Path, extended: bool) -> ExitCode {
    match assemble_and_test_micro(source, extended) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("pep9 micro: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn assemble_and_test_micro(source: &Path, extended: bool) -> Result<bool> {
    let text =
        fs::read_to_string(source).with_context(|| format!("reading microcode source {}", source.display()))?;

    let program = match MicrocodeProgram::parse(&text, extended) {
        Ok(program) => {
            fs::write(beside(source, ".microerr"), "")?;
            program
        }
        Err(errors) => {
            fs::write(beside(source, ".microerr"), micro_error_log(&text, &errors))?;
            eprintln!("microcode assembly failed with {} error(s)", errors.len());
            return Ok(false);
        }
    };

    if program.pre_conditions.is_empty() && program.post_conditions.is_empty() {
        log::info!("assembled {} code lines, no unit test present", program.code_count());
        return Ok(true);
    }

    let mut engine = Engine::new(program.clone(), FlatMemory::new(), 0x8000);
    match run_unit_test(&mut engine, &program.pre_conditions, &program.post_conditions) {
        UnitTestOutcome::Passed => {
            println!("unit test passed");
            Ok(true)
        }
        UnitTestOutcome::Failed(failures) => {
            for failure in &failures {
                println!("FAIL {}: {}", failure.spec, failure.message);
            }
            Ok(false)
        }
    }
}

fn run_cpu(
    source: &Path,
    os: Option<&Path>,
    micro: &Path,
    input: Option<&Path>,
    output: Option<&Path>,
    max_steps: u64,
) -> ExitCode {
    match execute(source, os, micro, input, output, max_steps) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("pep9 run: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn execute(
    source: &Path,
    os: Option<&Path>,
    micro: &Path,
    input: Option<&Path>,
    output: Option<&Path>,
    max_steps: u64,
) -> Result<()> {
    let mut manager = AsmProgramManager::new();

    if let Some(os_path) = os {
        let os_text = fs::read_to_string(os_path)
            .with_context(|| format!("reading operating system source {}", os_path.display()))?;
        manager
            .assemble_os(&os_text, false)
            .map_err(|errors| anyhow::anyhow!("operating system assembly failed: {} error(s)", errors.len()))?;
    }

    let source_text =
        fs::read_to_string(source).with_context(|| format!("reading source {}", source.display()))?;
    manager
        .assemble_user(&source_text)
        .map_err(|errors| anyhow::anyhow!("assembly failed: {} error(s)", errors.len()))?;

    let user = manager.user().expect("assemble_user just populated this");
    let (user_base, _) = user.program_bounds();

    let micro_text =
        fs::read_to_string(micro).with_context(|| format!("reading microcode source {}", micro.display()))?;
    let program = MicrocodeProgram::parse(&micro_text, true)
        .map_err(|errors| anyhow::anyhow!("microcode assembly failed: {} error(s)", errors.len()))?;

    let mut flat = FlatMemory::new();
    flat.load(user_base as u16, &user.object_code());
    let (char_in, char_out) = if let Some(os_program) = manager.os() {
        flat.load(os_program.program_bounds().0 as u16, &os_program.object_code());
        (os_program.addrss_vector("charIn"), os_program.addrss_vector("charOut"))
    } else {
        (None, None)
    };

    let input_bytes = ConsoleMemory::<FlatMemory>::read_input_file(input);
    let console = ConsoleMemory::new(flat, char_in, char_out, input_bytes);

    let heap_base = user.program_bounds().1.min(0xFFFF) as u16;
    let mut engine = Engine::new(program, console, heap_base);
    engine.registers_mut().current_mut().pc = user_base as u16;
    engine.registers_mut().flatten();

    let mut steps = 0u64;
    while !engine.is_finished() && steps < max_steps {
        engine.step_micro();
        steps += 1;
    }

    let output_bytes = engine.memory_mut().take_output();
    match output {
        Some(path) => fs::write(path, &output_bytes).with_context(|| format!("writing output to {}", path.display()))?,
        None => {
            use std::io::Write as _;
            std::io::stdout().write_all(&output_bytes)?;
        }
    }

    if engine.errors().has_error() {
        anyhow::bail!("runtime error: {}", engine.errors().message().unwrap_or("unknown"));
    }
    if steps >= max_steps && !engine.is_finished() {
        anyhow::bail!("exceeded --max-steps ({max_steps}) without reaching Stop");
    }

    log::info!("ran {} micro-cycles, {} ISA instructions", steps, engine.memoizer().stats.isa_instructions);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn beside_appends_the_suffix_to_the_whole_path() {
        let p = beside(Path::new("prog.pep"), ".obj");
        assert_eq!(p, PathBuf::from("prog.pep.obj"));
    }

    #[test]
    fn asm_subcommand_writes_object_and_listing_for_a_minimal_program() {
        let dir = std::env::temp_dir().join(format!("pep9-cli-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let source = dir.join("min.pep");
        let mut f = fs::File::create(&source).unwrap();
        writeln!(f, "main: ASLA\n.END").unwrap();

        assemble_pair(&source, None, false).unwrap();

        let obj = fs::read_to_string(beside(&source, ".obj")).unwrap();
        assert!(obj.trim_end().ends_with("zz"));
        let lst = fs::read_to_string(beside(&source, ".lst")).unwrap();
        assert!(lst.contains("ASLA"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn asm_subcommand_reports_failure_for_a_missing_end() {
        let dir = std::env::temp_dir().join(format!("pep9-cli-test-end-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let source = dir.join("noend.pep");
        fs::write(&source, "ASLA\n").unwrap();

        let result = assemble_pair(&source, None, false);
        assert!(result.is_err());
        let err_log = fs::read_to_string(beside(&source, ".err")).unwrap();
        assert!(err_log.contains(";ERROR:"));

        let _ = fs::remove_dir_all(&dir);
    }
}
