use axonraster::{
    filter_voltage, find_spike_origin, rasterize, BiquadCoeffs, DetectionParams, ExecutionMode,
    IirFilter, NotchFilter, RasterPrefix, SimulationRecord, SpikeDetector, Window,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ndarray::Array2;

const DT: f64 = 0.005;
const SAMPLES: usize = 10_000;

// Fiber with a spike travelling along every row, one onset every 400 samples
fn synthetic_record(rows: usize) -> SimulationRecord {
    let mut record = SimulationRecord::new(DT, SAMPLES as f64 * DT);
    record.t = Some((0..SAMPLES).map(|j| j as f64 * DT).collect());
    record.x_rec = Some((0..rows).map(|i| i as f64 * 100.0).collect());
    record.threshold = Some(-20.0);
    record.voltage = Some(Array2::from_shape_fn((rows, SAMPLES), |(i, j)| {
        let phase = (j + 4 * i) % 400;
        let artifact = 5.0 * (2.0 * std::f64::consts::PI * 10.0 * j as f64 * DT).sin();
        let level = if phase < 60 { 30.0 } else { -70.0 };
        level + artifact
    }));
    record
}

// Full-matrix scan - sequential vs one rayon task per row
fn bench_spike_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("spike_detection");

    for rows in [16, 128, 512].iter() {
        let record = synthetic_record(*rows);
        group.throughput(Throughput::Elements((*rows * SAMPLES) as u64));

        for mode in [ExecutionMode::Sequential, ExecutionMode::Parallel] {
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", mode), format!("{}_rows", rows)),
                rows,
                |b, _| {
                    let params = DetectionParams {
                        mode,
                        ..DetectionParams::default()
                    };
                    b.iter(|| {
                        let mut record = record.clone();
                        let _ = black_box(rasterize(&mut record, RasterPrefix::Raw, &params));
                    });
                },
            );
        }
    }

    group.finish();
}

// Single trace scan, no allocation beyond the onset list
fn bench_scan_trace(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan_trace");
    let record = synthetic_record(1);
    let trace = record.voltage.as_ref().unwrap().row(0).to_vec();
    let detector = SpikeDetector::new(-20.0, DT, 0.0, SAMPLES, 2.0, 0.1).unwrap();

    group.throughput(Throughput::Elements(SAMPLES as u64));
    group.bench_function("10k_samples", |b| {
        let mut onsets = Vec::with_capacity(64);
        b.iter(|| {
            onsets.clear();
            detector.scan_trace(black_box(&trace), &mut onsets);
            black_box(onsets.len())
        });
    });

    group.finish();
}

// Notch stage - single sample, then whole matrices
fn bench_notch(c: &mut Criterion) {
    let mut group = c.benchmark_group("notch");

    let mut notch = IirFilter::new(vec![BiquadCoeffs::notch(1.0 / DT, 10.0, 10.0).unwrap()]);
    group.bench_function("single_sample", |b| {
        b.iter(|| {
            let _ = black_box(notch.process_sample(black_box(1.0)));
        });
    });

    for rows in [16, 128].iter() {
        let record = synthetic_record(*rows);
        let voltage = record.voltage.clone().unwrap();
        let filter = NotchFilter::new(1.0 / DT, &[10.0, 20.0], 10.0).unwrap();
        group.throughput(Throughput::Elements((*rows * SAMPLES) as u64));

        group.bench_with_input(BenchmarkId::new("matrix_2_sections", rows), rows, |b, _| {
            b.iter(|| black_box(filter.filter_matrix(black_box(&voltage))));
        });

        group.bench_with_input(BenchmarkId::new("filter_voltage", rows), rows, |b, _| {
            b.iter(|| {
                let mut record = record.clone();
                let _ = black_box(filter_voltage(&mut record, &[10.0], 10.0));
            });
        });
    }

    group.finish();
}

// Origin query over a dense raster
fn bench_origin_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("origin_query");
    let mut record = synthetic_record(512);
    let _ = rasterize(&mut record, RasterPrefix::Raw, &DetectionParams::default());

    group.bench_function("512_rows_full_window", |b| {
        b.iter(|| black_box(find_spike_origin(&record, None, black_box(&Window::full()))));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_spike_detection,
    bench_scan_trace,
    bench_notch,
    bench_origin_query
);
criterion_main!(benches);
