use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use stream_connectors::emitter;
use stream_connectors::{Buffer, Record};

fn records(count: usize, size: usize) -> Vec<Record> {
    (1..=count)
        .map(|i| Record::new(format!("{i:020}"), vec![b'x'; size]))
        .collect()
}

fn benchmark_buffer_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_lifecycle");
    for batch_size in [100usize, 500, 5_000] {
        let input = records(batch_size, 256);
        group.bench_with_input(BenchmarkId::from_parameter(batch_size), &input, |b, input| {
            b.iter(|| {
                let mut buffer = Buffer::new("shardId-000000000000", batch_size);
                for record in input.iter().cloned() {
                    buffer.add_record(record);
                    if buffer.should_flush() {
                        let key = emitter::key(
                            "bench",
                            buffer.first_seq().unwrap_or_default(),
                            buffer.last_seq().unwrap_or_default(),
                        );
                        black_box((key, buffer.payload()));
                        buffer.flush();
                    }
                }
            })
        });
    }
    group.finish();
}

fn benchmark_payload_concat(c: &mut Criterion) {
    let mut buffer = Buffer::new("shardId-000000000000", 0);
    for record in records(500, 1024) {
        buffer.add_record(record);
    }
    c.bench_function("payload_500x1k", |b| b.iter(|| black_box(buffer.payload())));
}

criterion_group!(benches, benchmark_buffer_lifecycle, benchmark_payload_concat);
criterion_main!(benches);
