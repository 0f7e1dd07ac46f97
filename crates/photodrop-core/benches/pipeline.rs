//! Benchmarks for the Photodrop ingestion pipeline.
//!
//! Run with: cargo bench -p photodrop-core

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use photodrop_core::config::{EncodingConfig, LimitsConfig, ProcessingConfig};
use photodrop_core::pipeline::{FormatAnalyzer, Hasher, ImageTransformer, Validator};
use photodrop_core::store::MemoryObjectStore;
use photodrop_core::types::RawAsset;
use photodrop_core::{Attribution, Config, IngestBatch, IngestService, MetadataStore};
use std::io::Cursor;
use std::sync::Arc;

fn photo(width: u32, height: u32) -> RawAsset {
    let img = DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }));
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Jpeg).unwrap();
    RawAsset::new("bench.jpg", "image/jpeg", buffer.into_inner())
}

fn benchmark_content_hash(c: &mut Criterion) {
    let data = vec![0xA5u8; 10 * 1024 * 1024];

    c.bench_function("content_hash_10mb", |b| {
        b.iter(|| Hasher::content_hash(black_box(&data)))
    });
}

fn benchmark_validate(c: &mut Criterion) {
    let asset = photo(640, 480);
    let validator = Validator::new(ProcessingConfig::default(), LimitsConfig::default());

    c.bench_function("validate_asset", |b| {
        b.iter(|| validator.validate(black_box(&asset)))
    });
}

fn benchmark_analyze(c: &mut Criterion) {
    let asset = photo(1920, 1080);
    let analyzer = FormatAnalyzer::new(LimitsConfig::default(), EncodingConfig::default());
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("analyze_1080p_jpeg", |b| {
        b.iter(|| rt.block_on(analyzer.analyze(black_box(asset.clone()))))
    });
}

fn benchmark_transform(c: &mut Criterion) {
    let asset = photo(3000, 2000);
    let analyzer = FormatAnalyzer::new(LimitsConfig::default(), EncodingConfig::default());
    let transformer = ImageTransformer::new(&LimitsConfig::default());
    let rt = tokio::runtime::Runtime::new().unwrap();
    let analyzed = rt.block_on(analyzer.analyze(asset)).unwrap();

    let mut group = c.benchmark_group("transform");
    group.sample_size(10);
    group.bench_function("3000x2000_to_webp", |b| {
        b.iter(|| {
            transformer.transform(
                black_box(&analyzed.image),
                &analyzed.target,
                &analyzed.metadata,
                "bench.jpg",
            )
        })
    });
    group.finish();
}

fn benchmark_batch(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let assets: Vec<RawAsset> = (0..6).map(|_| photo(800, 600)).collect();

    let mut group = c.benchmark_group("ingest");
    group.sample_size(10);
    group.bench_function("batch_of_6_in_memory", |b| {
        b.iter(|| {
            let metadata: Arc<dyn MetadataStore> =
                Arc::new(photodrop_core::store::MemoryMetadataStore::new());
            let service = IngestService::new(
                Config::default(),
                Arc::new(MemoryObjectStore::new()),
                metadata,
            );
            let batch = IngestBatch::new(Attribution::new("bench", None), assets.clone());
            rt.block_on(service.ingest(batch))
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    benchmark_content_hash,
    benchmark_validate,
    benchmark_analyze,
    benchmark_transform,
    benchmark_batch,
);
criterion_main!(benches);
