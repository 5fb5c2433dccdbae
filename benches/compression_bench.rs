use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use zipkit::codec::deflate::compress_bound;
use zipkit::codec::{compress_all, compressor_for};

fn generate_compressible_data(size: usize) -> Vec<u8> {
    let pattern = b"The quick brown fox jumps over the lazy dog. ";
    let mut data = Vec::with_capacity(size);
    while data.len() < size {
        data.extend_from_slice(pattern);
    }
    data.truncate(size);
    data
}

fn generate_random_data(size: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    let mut state = 0x1234_5678u32;
    for _ in 0..size {
        state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
        data.push((state >> 16) as u8);
    }
    data
}

fn bench_compression_methods(c: &mut Criterion) {
    let sizes = [1024, 10 * 1024, 100 * 1024, 1024 * 1024];

    for size in sizes {
        let mut group = c.benchmark_group(format!("compress_compressible_{}", format_size(size)));
        group.throughput(Throughput::Bytes(size as u64));
        let data = generate_compressible_data(size);

        group.bench_with_input(BenchmarkId::new("deflate", size), &data, |b, data| {
            b.iter(|| {
                let mut codec = compressor_for(8, -1).unwrap();
                compress_all(&mut *codec, black_box(data), compress_bound(data.len())).unwrap();
            });
        });

        group.bench_with_input(BenchmarkId::new("store", size), &data, |b, data| {
            b.iter(|| {
                let mut codec = compressor_for(0, -1).unwrap();
                compress_all(&mut *codec, black_box(data), data.len()).unwrap();
            });
        });

        #[cfg(feature = "zstd-support")]
        {
            group.bench_with_input(BenchmarkId::new("zstd_level_3", size), &data, |b, data| {
                b.iter(|| {
                    let mut codec = compressor_for(93, 3).unwrap();
                    compress_all(&mut *codec, black_box(data), compress_bound(data.len())).unwrap();
                });
            });
            group.bench_with_input(BenchmarkId::new("zstd_level_19", size), &data, |b, data| {
                b.iter(|| {
                    let mut codec = compressor_for(93, 19).unwrap();
                    compress_all(&mut *codec, black_box(data), compress_bound(data.len())).unwrap();
                });
            });
        }

        group.finish();
    }
}

fn bench_random_data_compression(c: &mut Criterion) {
    let sizes = [100 * 1024, 1024 * 1024];

    for size in sizes {
        let mut group = c.benchmark_group(format!("compress_random_{}", format_size(size)));
        group.throughput(Throughput::Bytes(size as u64));
        let data = generate_random_data(size);

        group.bench_with_input(BenchmarkId::new("deflate", size), &data, |b, data| {
            b.iter(|| {
                let mut codec = compressor_for(8, -1).unwrap();
                compress_all(&mut *codec, black_box(data), compress_bound(data.len())).unwrap();
            });
        });

        #[cfg(feature = "zstd-support")]
        group.bench_with_input(BenchmarkId::new("zstd_level_3", size), &data, |b, data| {
            b.iter(|| {
                let mut codec = compressor_for(93, 3).unwrap();
                compress_all(&mut *codec, black_box(data), compress_bound(data.len())).unwrap();
            });
        });

        group.finish();
    }
}

fn bench_archive_with_many_entries(c: &mut Criterion) {
    use tempfile::NamedTempFile;
    use zipkit::{Archive, ArchiveConfig, BufferSource};

    let mut group = c.benchmark_group("archive_many_entries");
    let entry_count = 100;
    let entry_size = 10 * 1024;
    group.throughput(Throughput::Bytes((entry_count * entry_size) as u64));
    let data = generate_compressible_data(entry_size);

    group.bench_function("deflate_100_entries", |b| {
        b.iter(|| {
            let temp = NamedTempFile::new().unwrap();
            let mut archive =
                Archive::open_write_new(temp.path(), ArchiveConfig::default()).unwrap();
            for i in 0..entry_count {
                archive
                    .add(
                        format!("file_{i}.txt").as_bytes(),
                        BufferSource::borrowed(black_box(&data)),
                        Some(8),
                    )
                    .unwrap();
            }
            archive.close().unwrap();
        });
    });

    group.finish();
}

fn format_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{bytes}B")
    } else if bytes < 1024 * 1024 {
        format!("{}KB", bytes / 1024)
    } else {
        format!("{}MB", bytes / (1024 * 1024))
    }
}

criterion_group!(
    benches,
    bench_compression_methods,
    bench_random_data_compression,
    bench_archive_with_many_entries
);
criterion_main!(benches);
