#![allow(dead_code)]

use gameboy_cpu::{Catalog, Cpu, StepOutcome};

/// A CPU with `image` loaded at address 0, all registers zero.
pub fn cpu_from_image(image: &[u8]) -> (Cpu, Catalog) {
    let catalog = Catalog::builtin().expect("built-in catalog is valid");
    let cpu = Cpu::from_image(image).expect("image fits the address space");
    (cpu, catalog)
}

/// Steps `count` times, returning every outcome.
pub fn run_steps(cpu: &mut Cpu, catalog: &Catalog, count: usize) -> Vec<StepOutcome> {
    (0..count)
        .map(|_| cpu.step(catalog).expect("step failed"))
        .collect()
}
