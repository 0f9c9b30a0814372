use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pprof::criterion::Output;
use wpilog_analyzer::ingest::Ingester;

/// Builds a synthetic WPILOG byte buffer with three entries (double, int64,
/// boolean) and `num_records` data records cycling across them, mirroring a
/// real robot's telemetry mix.
fn create_wpilog_with_records(num_records: usize) -> Vec<u8> {
    let mut data = Vec::new();

    data.extend_from_slice(b"WPILOG");
    data.extend_from_slice(&0x0100u16.to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes());

    push_start(&mut data, 1, "/speed", "double");
    push_start(&mut data, 2, "/count", "int64");
    push_start(&mut data, 3, "/active", "boolean");

    for i in 0..num_records {
        let timestamp = (i * 20_000) as u64; // 20ms between records, in us

        push_data(&mut data, 1, timestamp, &((i as f64) * 1.5).to_le_bytes());

        if i % 2 == 0 {
            push_data(&mut data, 2, timestamp, &(i as i64).to_le_bytes());
        }
        if i % 3 == 0 {
            push_data(&mut data, 3, timestamp, &[if i % 6 == 0 { 1 } else { 0 }]);
        }
    }

    data
}

fn push_start(out: &mut Vec<u8>, entry: u32, name: &str, type_name: &str) {
    let mut payload = vec![0u8]; // control type: Start
    payload.extend_from_slice(&entry.to_le_bytes());
    for s in [name, type_name, ""] {
        payload.extend_from_slice(&(s.len() as u32).to_le_bytes());
        payload.extend_from_slice(s.as_bytes());
    }
    push_frame(out, 0, 0, &payload);
}

fn push_data(out: &mut Vec<u8>, entry: u32, timestamp_us: u64, payload: &[u8]) {
    push_frame(out, entry, timestamp_us, payload);
}

fn push_frame(out: &mut Vec<u8>, entry: u32, timestamp_us: u64, payload: &[u8]) {
    out.push(0b0111_1111u8); // entry_len=4, size_len=4, timestamp_len=8
    out.extend_from_slice(&entry.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&timestamp_us.to_le_bytes());
    out.extend_from_slice(payload);
}

fn benchmark_ingest_small(c: &mut Criterion) {
    let data = create_wpilog_with_records(100);
    let size = data.len();

    let mut group = c.benchmark_group("ingest_small");
    group.throughput(Throughput::Bytes(size as u64));

    group.bench_function(BenchmarkId::new("100_records", size), |b| {
        b.iter(|| {
            let mut ingester = Ingester::new();
            ingester.ingest_bytes(black_box(&data)).unwrap();
            black_box(ingester.into_log());
        });
    });

    group.finish();
}

fn benchmark_ingest_medium(c: &mut Criterion) {
    let data = create_wpilog_with_records(10_000);
    let size = data.len();

    let mut group = c.benchmark_group("ingest_medium");
    group.throughput(Throughput::Bytes(size as u64));

    group.bench_function(BenchmarkId::new("10k_records", size), |b| {
        b.iter(|| {
            let mut ingester = Ingester::new();
            ingester.ingest_bytes(black_box(&data)).unwrap();
            black_box(ingester.into_log());
        });
    });

    group.finish();
}

fn benchmark_ingest_large(c: &mut Criterion) {
    let data = create_wpilog_with_records(100_000);
    let size = data.len();

    let mut group = c.benchmark_group("ingest_large");
    group.throughput(Throughput::Bytes(size as u64));
    group.sample_size(10);

    group.bench_function(BenchmarkId::new("100k_records", size), |b| {
        b.iter(|| {
            let mut ingester = Ingester::new();
            ingester.ingest_bytes(black_box(&data)).unwrap();
            black_box(ingester.into_log());
        });
    });

    group.finish();
}

fn benchmark_ingest_very_large(c: &mut Criterion) {
    let data = create_wpilog_with_records(500_000);
    let size = data.len();

    let mut group = c.benchmark_group("ingest_very_large");
    group.throughput(Throughput::Bytes(size as u64));
    group.sample_size(10);

    group.bench_function(BenchmarkId::new("500k_records", size), |b| {
        b.iter(|| {
            let mut ingester = Ingester::new();
            ingester.ingest_bytes(black_box(&data)).unwrap();
            black_box(ingester.into_log());
        });
    });

    group.finish();
}

fn benchmark_interval_query(c: &mut Criterion) {
    let data = create_wpilog_with_records(100_000);
    let mut ingester = Ingester::new();
    ingester.ingest_bytes(&data).unwrap();
    let log = ingester.into_log();

    c.bench_function("interval_query_100k", |b| {
        b.iter(|| {
            let result = wpilog_analyzer::analysis::interval_query(
                black_box(&log),
                "/active",
                &serde_json::Value::Bool(true),
                "/active",
                &serde_json::Value::Bool(false),
            )
            .unwrap();
            black_box(result);
        });
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().with_profiler(pprof::criterion::PProfProfiler::new(100, Output::Flamegraph(None)));
    targets =
        benchmark_ingest_small,
        benchmark_ingest_medium,
        benchmark_ingest_large,
        benchmark_ingest_very_large,
        benchmark_interval_query
}
criterion_main!(benches);
