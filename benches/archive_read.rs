//! Benchmarks for archive lookups and content reads

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::path::PathBuf;
use tempfile::TempDir;
use zimkit::config::{ArchiveConfig, WriterConfig};
use zimkit::writer::{ArchiveWriter, MemorySource};
use zimkit::{Archive, CompressionMethod, Reader, ReaderConfig};

const PAGES: usize = 2000;

fn build(dir: &TempDir, compression: CompressionMethod) -> PathBuf {
    let mut source = MemorySource::new();
    for i in 0..PAGES {
        source.add_html(
            'A',
            &format!("Article_{:05}", i),
            &format!("Article {}", i),
            &format!("<body>{}</body>", "benchmark text ".repeat(i % 50 + 10)),
        );
    }
    let config = WriterConfig {
        compression,
        min_chunk_size: 64 * 1024,
        ..WriterConfig::default()
    };
    let path = dir.path().join(format!("bench_{:?}.zim", compression));
    ArchiveWriter::new(config).create(&path, &mut source).unwrap();
    path
}

fn bench_find_by_url(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let mut archive = Archive::open(build(&dir, CompressionMethod::Zstd)).unwrap();

    c.bench_function("find_by_url", |b| {
        let mut i = 0;
        b.iter(|| {
            i = (i + 7919) % PAGES;
            black_box(archive.find_by_url('A', &format!("Article_{:05}", i)).unwrap());
        });
    });
}

fn bench_content_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("content_read");
    let dir = TempDir::new().unwrap();

    for compression in [CompressionMethod::None, CompressionMethod::Lz4, CompressionMethod::Zstd] {
        let path = build(&dir, compression);

        group.bench_with_input(
            BenchmarkId::new("cached", format!("{:?}", compression)),
            &path,
            |b, path| {
                let mut reader = Reader::open(path).unwrap();
                let mut i = 0;
                b.iter(|| {
                    i = (i + 13) % PAGES;
                    let url = format!("/A/Article_{:05}", i);
                    black_box(reader.content_by_url(&url).unwrap());
                });
            },
        );

        // Single-entry cluster cache forces a decompression per read
        group.bench_with_input(
            BenchmarkId::new("uncached", format!("{:?}", compression)),
            &path,
            |b, path| {
                let config = ReaderConfig {
                    archive: ArchiveConfig {
                        cluster_cache_size: 1,
                        ..ArchiveConfig::default()
                    },
                    ..ReaderConfig::default()
                };
                let mut reader = Reader::open_with_config(path, config).unwrap();
                let mut i = 0;
                b.iter(|| {
                    i = (i + 997) % PAGES;
                    let url = format!("/A/Article_{:05}", i);
                    black_box(reader.content_by_url(&url).unwrap());
                });
            },
        );
    }

    group.finish();
}

fn bench_suggestions(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let mut reader = Reader::open(build(&dir, CompressionMethod::Zstd)).unwrap();

    c.bench_function("search_suggestions_smart", |b| {
        b.iter(|| {
            reader.search_suggestions_smart(black_box("article 1"), 10).unwrap();
            black_box(reader.suggestions().len());
        });
    });
}

fn bench_checksum(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let mut archive = Archive::open(build(&dir, CompressionMethod::Zstd)).unwrap();

    let mut group = c.benchmark_group("checksum");
    group.sample_size(20);
    group.bench_function("md5_full_archive", |b| {
        b.iter(|| black_box(archive.compute_checksum().unwrap()));
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_find_by_url,
    bench_content_read,
    bench_suggestions,
    bench_checksum
);
criterion_main!(benches);
