// In: benches/deflate_bench.rs

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use canned_deflate::job::{compress_in_chunks, decompress_in_chunks, ChunkSizes};
use canned_deflate::table::{gather_deflate_statistics, HuffmanTable, TableKind, TableRepresentation};
use canned_deflate::{
    CompressSettings, CompressionLevel, DecompressSettings, EngineConfig, ExecutionPath, Job,
    JobFlags,
};

/// Generates a vector of highly compressible data.
fn generate_low_entropy_bytes(size: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    let pattern = b"GET /index.html HTTP/1.1\r\nHost: example.org\r\nAccept: */*\r\n\r\n";
    while data.len() < size {
        data.extend_from_slice(pattern);
        data.extend_from_slice((data.len() as u32).to_string().as_bytes());
    }
    data.truncate(size);
    data
}

const BENCH_DATA_SIZE: usize = 65536; // 64 KB

fn compress_once(settings: CompressSettings<'_>, path: ExecutionPath, data: &[u8]) -> Vec<u8> {
    let mut job = Job::new(path);
    let out = compress_in_chunks(&mut job, settings, data, ChunkSizes::Single, 2 * data.len())
        .expect("compression failed");
    job.finalize().expect("finalize failed");
    out
}

fn bench_block_modes(c: &mut Criterion) {
    let data = generate_low_entropy_bytes(BENCH_DATA_SIZE);
    let path = ExecutionPath::Software;

    let histogram = gather_deflate_statistics(&data, CompressionLevel::Default, path, &EngineConfig::default())
        .expect("statistics failed");
    let mut canned = HuffmanTable::create(TableKind::Combined, TableRepresentation::Deflate, path)
        .expect("table creation failed");
    canned.init_with_histogram(histogram).expect("table init failed");

    let mut group = c.benchmark_group("DEFLATE Block Modes");
    group.throughput(criterion::Throughput::Bytes(BENCH_DATA_SIZE as u64));

    let modes = [
        ("Fixed", CompressSettings::new(JobFlags::empty())),
        ("Static", CompressSettings::new(JobFlags::empty()).with_table(&canned)),
        ("Dynamic", CompressSettings::new(JobFlags::DYNAMIC_HUFFMAN)),
        (
            "Dynamic High",
            CompressSettings::new(JobFlags::DYNAMIC_HUFFMAN).with_level(CompressionLevel::High),
        ),
        ("Canned", CompressSettings::new(JobFlags::CANNED_MODE).with_table(&canned)),
    ];
    for (name, settings) in modes {
        group.bench_function(format!("Compress {}", name), |b| {
            b.iter(|| black_box(compress_once(settings, path, black_box(&data))))
        });
    }

    let dynamic = compress_once(CompressSettings::new(JobFlags::DYNAMIC_HUFFMAN), path, &data);
    group.bench_function("Decompress Dynamic", |b| {
        b.iter(|| {
            let mut job = Job::new(path);
            let out = decompress_in_chunks(
                &mut job,
                DecompressSettings::new(JobFlags::empty()),
                black_box(&dynamic),
                ChunkSizes::Single,
                BENCH_DATA_SIZE,
            );
            let _ = job.finalize();
            black_box(out)
        })
    });

    group.finish();
}

fn bench_chunking(c: &mut Criterion) {
    let data = generate_low_entropy_bytes(BENCH_DATA_SIZE);
    let mut group = c.benchmark_group("Chunked Streaming");
    group.throughput(criterion::Throughput::Bytes(BENCH_DATA_SIZE as u64));

    for size in [1024usize, 8192] {
        group.bench_function(format!("Dynamic in {} byte chunks", size), |b| {
            b.iter(|| {
                let mut job = Job::new(ExecutionPath::Software);
                let out = compress_in_chunks(
                    &mut job,
                    CompressSettings::new(JobFlags::DYNAMIC_HUFFMAN),
                    black_box(&data),
                    ChunkSizes::Fixed(size),
                    2 * BENCH_DATA_SIZE,
                );
                let _ = job.finalize();
                black_box(out)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_block_modes, bench_chunking);
criterion_main!(benches);
