//! # Path Segmenter Benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use follow_lib::path::{segment, SegmenterParams, Waypoint};

fn segmenter_benchmark(c: &mut Criterion) {
    // ---- Build a zig-zag path with a turning point every 20 waypoints ----

    let params = SegmenterParams {
        turning_threshold_rad: 0.5,
        duplicate_tolerance_m: 0.001,
    };

    let mut waypoints = Vec::with_capacity(2000);
    let mut x_m = 0.0;
    let mut y_m = 0.0;
    for i in 0..2000 {
        if (i / 20) % 2 == 0 {
            x_m += 0.05;
        } else {
            y_m += 0.05;
        }
        waypoints.push(Waypoint::new(x_m, y_m, 0.0));
    }

    c.bench_function("segment::split", |b| {
        b.iter(|| segment(black_box(&waypoints), false, &params))
    });

    c.bench_function("segment::single", |b| {
        b.iter(|| segment(black_box(&waypoints), true, &params))
    });

    let path = segment(&waypoints, false, &params);
    c.bench_function("Path::flatten", |b| b.iter(|| black_box(&path).flatten()));
}

criterion_group!(benches, segmenter_benchmark);
criterion_main!(benches);
