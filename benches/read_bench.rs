use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::NamedTempFile;
use zipkit::{Archive, ArchiveConfig, BufferSource};

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

fn create_test_zip(data: &[u8], method: u16) -> NamedTempFile {
    let temp = NamedTempFile::new().unwrap();
    let mut archive = Archive::open_write_new(temp.path(), ArchiveConfig::default()).unwrap();
    archive
        .add(b"test.bin", BufferSource::borrowed(data), Some(method))
        .unwrap();
    archive.close().unwrap();
    temp
}

fn read_all_entries(path: &std::path::Path) {
    let mut archive = Archive::open_read(path, ArchiveConfig::default()).unwrap();
    for index in 0..archive.num_entries() as usize {
        let opened = archive.open_index(index).unwrap();
        black_box(opened.bytes());
    }
}

fn bench_read_compressible_data(c: &mut Criterion) {
    let sizes = [100 * 1024, 1024 * 1024];

    for size in sizes {
        let mut group = c.benchmark_group(format!("read_compressible_{}", format_size(size)));
        group.throughput(Throughput::Bytes(size as u64));

        let data = generate_compressible_data(size);
        let zip_deflate = create_test_zip(&data, 8);
        group.bench_function(BenchmarkId::new("deflate", size), |b| {
            b.iter(|| read_all_entries(zip_deflate.path()));
        });

        #[cfg(feature = "zstd-support")]
        {
            let zip_zstd = create_test_zip(&data, 93);
            group.bench_function(BenchmarkId::new("zstd", size), |b| {
                b.iter(|| read_all_entries(zip_zstd.path()));
            });
        }

        group.finish();
    }
}

fn bench_read_random_data(c: &mut Criterion) {
    let sizes = [100 * 1024, 1024 * 1024];

    for size in sizes {
        let mut group = c.benchmark_group(format!("read_random_{}", format_size(size)));
        group.throughput(Throughput::Bytes(size as u64));

        let data = generate_random_data(size);
        let zip_deflate = create_test_zip(&data, 8);
        group.bench_function(BenchmarkId::new("deflate", size), |b| {
            b.iter(|| read_all_entries(zip_deflate.path()));
        });

        group.finish();
    }
}

fn bench_read_multiple_entries(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_multiple_entries");

    let entry_count = 100;
    let entry_size = 10 * 1024;
    group.throughput(Throughput::Bytes((entry_count * entry_size) as u64));

    let data = generate_compressible_data(entry_size);
    let temp = NamedTempFile::new().unwrap();
    let mut archive = Archive::open_write_new(temp.path(), ArchiveConfig::default()).unwrap();
    for i in 0..entry_count {
        archive
            .add(
                format!("file_{i}.txt").as_bytes(),
                BufferSource::borrowed(&data),
                Some(8),
            )
            .unwrap();
    }
    archive.close().unwrap();

    group.bench_function("deflate_100_entries", |b| {
        b.iter(|| read_all_entries(temp.path()));
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
    bench_read_compressible_data,
    bench_read_random_data,
    bench_read_multiple_entries
);
criterion_main!(benches);
