//! Microbenchmarks for the append hot path.
//!
//! Measures raw frame appends and full writer-session batch inserts.
//!
//! Run with: `cargo bench -p ddh5 -- append`

#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use ddh5::container::Container;
use ddh5::writer::Ddh5Writer;
use ddh5::{DataDict, DataField};
use tempfile::tempdir;

/// Creates a container with one group and one scalar dataset.
fn setup_container() -> (Container, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let mut container = Container::open_append(temp_dir.path().join("bench.ddh5")).unwrap();
    container.init_group("data").unwrap();
    container
        .create_field("data", "x", &[], None, &[], Vec::new())
        .unwrap();
    (container, temp_dir)
}

fn bench_append_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("append_rows/batch_rows");

    for rows in [1usize, 100, 10_000] {
        let (mut container, _dir) = setup_container();
        let samples = vec![42.5f64; rows];

        group.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, _| {
            b.iter(|| {
                container
                    .append_rows("data", "x", black_box(&samples))
                    .unwrap();
            });
        });
    }

    group.finish();
}

fn bench_append_rows_flushed(c: &mut Criterion) {
    let (mut container, _dir) = setup_container();
    let samples = vec![42.5f64; 100];

    c.bench_function("append_rows/100_rows_fsync", |b| {
        b.iter(|| {
            container
                .append_rows("data", "x", black_box(&samples))
                .unwrap();
            container.flush().unwrap();
        });
    });
}

fn bench_writer_add_data(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let mut dd = DataDict::new();
    dd.insert_field("x", DataField::independent());
    dd.insert_field("y", DataField::dependent(["x"]));
    let mut writer = Ddh5Writer::open(dd, dir.path(), Some("bench")).unwrap();

    let xs = vec![1.0f64; 100];
    let ys = vec![2.0f64; 100];

    c.bench_function("writer/add_data_100_rows", |b| {
        b.iter(|| {
            writer
                .add_data(black_box(&[("x", xs.as_slice()), ("y", ys.as_slice())]))
                .unwrap();
        });
    });

    writer.close().unwrap();
}

criterion_group!(
    benches,
    bench_append_rows,
    bench_append_rows_flushed,
    bench_writer_add_data,
);
criterion_main!(benches);
