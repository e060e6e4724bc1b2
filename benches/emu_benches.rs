mod perf;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gameboy_cpu::cpu::Decoder;
use gameboy_cpu::{Catalog, Cpu};

fn repeat_regular_opcode(c: &mut Criterion, name: &str, image: &[u8]) {
    let catalog = Catalog::builtin().unwrap();
    let mut cpu = Cpu::from_image(image).unwrap();
    cpu.registers.sp = 0xfffe;

    c.bench_function(name, |b| {
        b.iter(|| {
            cpu.registers.pc = 0;
            black_box(cpu.step(&catalog).unwrap());
        })
    });
}

fn repeat_nop(c: &mut Criterion) {
    repeat_regular_opcode(c, "nop", &[0x00]);
}

fn repeat_ld_b_a(c: &mut Criterion) {
    repeat_regular_opcode(c, "ld-b-a", &[0x47]);
}

fn repeat_call(c: &mut Criterion) {
    repeat_regular_opcode(c, "call", &[0xcd, 0x00, 0x00]);
}

fn bench_decode_prefixed(c: &mut Criterion) {
    let catalog = Catalog::builtin().unwrap();
    let mut cpu = Cpu::from_image(&[0xcb, 0x7e]).unwrap();
    let decoder = Decoder::new(&catalog);

    c.bench_function("decode-bit-7-hl", |b| {
        b.iter(|| black_box(decoder.decode(&cpu.registers, &mut cpu.bus).unwrap()))
    });
}

fn bench_catalog_build(c: &mut Criterion) {
    c.bench_function("catalog builtin", |b| {
        b.iter(|| black_box(Catalog::builtin().unwrap()))
    });
}

criterion_group! {
    name = cpu_benches;
    config = Criterion::default().with_profiler(perf::FlamegraphProfiler::new(100)).sample_size(500);
    targets = repeat_nop, repeat_ld_b_a, repeat_call, bench_decode_prefixed, bench_catalog_build
}

criterion_main!(cpu_benches);
