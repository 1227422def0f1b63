use bitview::layout::{Member, OffsetSpec, ScalarLayout, StructLayout};
use bitview::view::View;
use criterion::{Criterion, criterion_group, criterion_main};

fn gen_layout(field_count: usize) -> StructLayout {
    let mut members = Vec::with_capacity(field_count);
    for i in 0..field_count {
        members.push(Member::scalar(
            &format!("f{}", i),
            OffsetSpec::next(),
            ScalarLayout::unsigned(16),
        ));
    }
    StructLayout::new("bench", members)
}

fn gen_buffer(total_bits: usize) -> Vec<u8> {
    let total_bytes = total_bits.div_ceil(8);
    let mut data = Vec::with_capacity(total_bytes);

    // Deterministic but non-trivial pattern
    for i in 0..total_bytes {
        data.push((i * 31 % 256) as u8);
    }

    data
}

fn bench_view_read(c: &mut Criterion) {
    for &field_count in &[1usize, 10, 50, 100] {
        let layout = gen_layout(field_count);
        let buffer = gen_buffer(field_count * 16);

        c.bench_function(&format!("ok_{}_fields", field_count), |b| {
            b.iter(|| {
                let view = View::new(&layout, &buffer);
                assert!(view.ok());
            })
        });

        c.bench_function(&format!("read_all_{}_fields", field_count), |b| {
            b.iter(|| {
                let view = View::new(&layout, &buffer);
                let mut sum = 0i64;
                for field in view.fields() {
                    sum = sum.wrapping_add(field.read());
                }
                sum
            })
        });
    }
}

criterion_group!(benches, bench_view_read);
criterion_main!(benches);
