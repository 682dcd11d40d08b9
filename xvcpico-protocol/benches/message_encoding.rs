use std::hint::black_box;
use std::io::Cursor;

use criterion::{Criterion, criterion_group, criterion_main};
use xvcpico_protocol::{Message, XvcInfo};

fn full_shift() -> Vec<u8> {
    let num_bytes = XvcInfo::default().buffer_size() as usize / 2;
    let msg = Message::Shift {
        num_bits: 8 * num_bytes as u32,
        tms: vec![0x5A; num_bytes].into_boxed_slice(),
        tdi: vec![0xC3; num_bytes].into_boxed_slice(),
    };
    let mut out = Vec::new();
    msg.write_to(&mut out).unwrap();
    out
}

fn decode_shift(c: &mut Criterion) {
    let data = full_shift();
    c.bench_function("read full buffer shift", |b| {
        b.iter(|| {
            let mut cursor = Cursor::new(black_box(&data));
            Message::from_reader(&mut cursor, 2048).unwrap()
        })
    });
}

fn encode_shift(c: &mut Criterion) {
    let data = full_shift();
    let msg = Message::from_reader(&mut Cursor::new(&data), 2048).unwrap();
    c.bench_function("write full buffer shift", |b| {
        b.iter(|| {
            let mut out = Vec::with_capacity(data.len());
            black_box(&msg).write_to(&mut out).unwrap();
            out
        })
    });
}

criterion_group!(benches, decode_shift, encode_shift);
criterion_main!(benches);
