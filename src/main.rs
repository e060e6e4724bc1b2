use std::fs;

use clap::Parser;
use gameboy_cpu::{Catalog, Cpu, CpuStatus};
use log::info;

/// Runs a memory image through the LR35902 interpreter without any display.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the memory image, loaded at address 0
    #[arg(short = 'r', long = "rom", required = true)]
    rom_path: String,

    /// Opcode definition JSON; the built-in table is used when absent
    #[arg(short = 'o', long = "opcodes")]
    opcodes_path: Option<String>,

    /// Number of instructions to execute
    #[arg(short, long, default_value_t = 10)]
    steps: usize,

    /// Start from the register state the boot ROM leaves behind
    #[arg(long, default_value_t = false)]
    post_boot: bool,

    /// Write the active opcode table as JSON to this path and exit
    #[arg(long = "dump-opcodes")]
    dump_opcodes: Option<String>,
}

fn main() -> Result<(), String> {
    env_logger::init();

    let args = Args::parse();

    let catalog = match &args.opcodes_path {
        Some(path) => {
            let json = fs::read_to_string(path).map_err(|e| e.to_string())?;
            Catalog::from_json(&json).map_err(|e| e.to_string())?
        }
        None => Catalog::builtin().map_err(|e| e.to_string())?,
    };

    if let Some(path) = &args.dump_opcodes {
        let json = catalog
            .to_definitions()
            .to_json()
            .map_err(|e| e.to_string())?;
        fs::write(path, json).map_err(|e| e.to_string())?;
        info!("Wrote opcode table to {}", path);
        return Ok(());
    }

    let bytes = fs::read(&args.rom_path).map_err(|e| e.to_string())?;
    let mut cpu = Cpu::from_image(&bytes).map_err(|e| e.to_string())?;
    if args.post_boot {
        cpu.emulate_bootrom();
    }

    let mut total_cycles: u64 = 0;
    let mut executed = 0;
    for _ in 0..args.steps {
        let outcome = cpu.step(&catalog).map_err(|e| e.to_string())?;
        total_cycles += u64::from(outcome.cycles);
        executed += 1;
        if let CpuStatus::Halted(reason) = outcome.status {
            println!("Halted: {}", reason);
            break;
        }
    }

    println!("{} steps, {} cycles", executed, total_cycles);
    println!("{}", cpu.registers);
    Ok(())
}
