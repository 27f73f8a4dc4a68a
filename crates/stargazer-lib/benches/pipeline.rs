use criterion::{criterion_group, criterion_main, Criterion};
use once_cell::sync::Lazy;
use stargazer_lib::{
    AsciiGrid, DataSources, Pipeline, RetryPolicy, RoadIndex, SearchParams, SearchRequest,
    TerrainConfig,
};
use std::hint::black_box;
use std::path::PathBuf;
use std::sync::Arc;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../docs/fixtures/beijing-west")
        .join(name)
}

static PIPELINE: Lazy<Pipeline> = Lazy::new(|| {
    let sources = DataSources {
        elevation: Arc::new(AsciiGrid::load(&fixture_path("dem.asc")).expect("dem loads")),
        roads: Arc::new(
            RoadIndex::load_geojson(&fixture_path("roads.geojson")).expect("roads load"),
        ),
        light: Some(Arc::new(
            AsciiGrid::load(&fixture_path("light.asc")).expect("light grid loads"),
        )),
    };
    Pipeline::new(sources, TerrainConfig::default(), RetryPolicy::none())
});

static ROADS: Lazy<RoadIndex> = Lazy::new(|| {
    RoadIndex::load_geojson(&fixture_path("roads.geojson")).expect("roads load")
});

fn request(network: &str, radius_km: f64) -> SearchRequest {
    SearchRequest::normalize(&SearchParams {
        south: 39.98,
        west: 116.18,
        north: 40.02,
        east: 116.22,
        max_locations: 10,
        min_height_diff: 50.0,
        road_radius_km: radius_km,
        network_type: network.to_string(),
    })
    .expect("valid request")
}

fn benchmark_pipeline(c: &mut Criterion) {
    let pipeline = &*PIPELINE;

    c.bench_function("pipeline_drive_5km", |b| {
        let request = request("drive", 5.0);
        b.iter(|| {
            let items = pipeline.run(&request).expect("pipeline runs");
            black_box(items.len())
        });
    });

    c.bench_function("pipeline_walk_100m", |b| {
        let request = request("walk", 0.1);
        b.iter(|| {
            let items = pipeline.run(&request).expect("pipeline runs");
            black_box(items.len())
        });
    });
}

fn benchmark_road_index(c: &mut Criterion) {
    c.bench_function("road_index_build", |b| {
        b.iter(|| {
            let index = RoadIndex::load_geojson(&fixture_path("roads.geojson")).expect("roads");
            black_box(index.segment_count())
        });
    });

    let roads = &*ROADS;
    c.bench_function("nearest_drive_road", |b| {
        let point = stargazer_lib::GeoPoint::new(40.011, 116.19);
        b.iter(|| black_box(roads.nearest(point, stargazer_lib::NetworkType::Drive)));
    });
}

criterion_group!(benches, benchmark_pipeline, benchmark_road_index);
criterion_main!(benches);
