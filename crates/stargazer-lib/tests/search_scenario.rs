//! End-to-end searches over the `beijing-west` fixture.

mod common;

use common::{scenario_params, FixtureEnv};
use stargazer_lib::{DataSources, SearchConfig, SearchEngine, SearchError, SearchParams};

fn engine(sources: DataSources) -> SearchEngine {
    SearchEngine::new(sources, SearchConfig::default())
}

#[tokio::test]
async fn scenario_pages_share_one_result_set() {
    let env = FixtureEnv::new();
    let engine = engine(env.sources());
    let params = scenario_params();

    let first = engine.search(&params, 1, 2).await.expect("page 1");
    assert_eq!(first.total, 3);
    assert_eq!(first.items.len(), 2);
    assert_eq!(first.total_pages, 2);
    assert!(first.has_more);

    let second = engine.search(&params, 2, 2).await.expect("page 2");
    assert_eq!(second.total, 3);
    assert_eq!(second.items.len(), 1);
    assert!(!second.has_more);
    assert_eq!(first.resource_id, second.resource_id);
    assert_eq!(first.computed_at, second.computed_at);
    assert_ne!(first.items[0], second.items[0]);

    let stats = engine.cache_stats();
    assert_eq!(stats.computations, 1);
    assert_eq!(stats.hits, 1);

    engine.shutdown();
}

#[tokio::test]
async fn scenario_ranks_darkest_sites_first() {
    let env = FixtureEnv::new();
    let engine = engine(env.sources());

    let page = engine.search(&scenario_params(), 1, 10).await.unwrap();
    let ranks: Vec<usize> = page.items.iter().map(|i| i.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3]);

    let brightness: Vec<f64> = page
        .items
        .iter()
        .map(|i| i.light_pollution.expect("fixture grid covers the box"))
        .collect();
    assert!(brightness.windows(2).all(|w| w[0] <= w[1]), "{:?}", brightness);

    // The south-western hill sits under the darkest sky.
    let darkest = &page.items[0];
    assert!((darkest.lat - 39.9883).abs() < 1e-3);
    assert!((darkest.lon - 116.1883).abs() < 1e-3);
    assert_eq!(darkest.road_type, "residential");
    assert_eq!(darkest.name, "Site 1");
    assert_eq!(page.items[1].name, "Site 2 near Xiangshan Road");

    for item in &page.items {
        assert!(item.height_diff >= 50.0);
        assert!(item.distance_to_road_km <= 5.0);
        assert!(item.sky_quality.is_some());
        assert!(matches!(item.bortle_class, Some(1..=9)));
    }
}

#[tokio::test]
async fn walking_network_reaches_trail_side_hills() {
    let env = FixtureEnv::new();
    let engine = engine(env.sources());
    let params = SearchParams {
        road_radius_km: 0.1,
        network_type: "walk".to_string(),
        max_locations: 10,
        ..scenario_params()
    };

    let page = engine.search(&params, 1, 10).await.unwrap();
    assert_eq!(page.total, 2);
    for item in &page.items {
        assert_eq!(item.road_type, "footway");
        assert_eq!(item.road_name.as_deref(), Some("Ridge Trail"));
        assert!(item.name.ends_with("near Ridge Trail"));
    }
}

#[tokio::test]
async fn no_site_within_radius_is_an_empty_result() {
    let env = FixtureEnv::new();
    let engine = engine(env.sources());
    let params = SearchParams {
        road_radius_km: 0.1,
        ..scenario_params()
    };

    let page = engine.search(&params, 1, 10).await.expect("empty result is not an error");
    assert_eq!(page.total, 0);
    assert_eq!(page.total_pages, 0);
    assert!(page.items.is_empty());
    assert!(!page.has_more);
}

#[tokio::test]
async fn missing_light_grid_leaves_brightness_unknown() {
    let env = FixtureEnv::new();
    let mut sources = env.sources();
    sources.light = None;
    let engine = engine(sources);

    let page = engine.search(&scenario_params(), 1, 10).await.unwrap();
    assert_eq!(page.total, 3);
    assert!(page.items.iter().all(|i| i.light_pollution.is_none()));
    assert!(page.items.iter().all(|i| i.bortle_class.is_none()));

    let relief: Vec<f64> = page.items.iter().map(|i| i.height_diff).collect();
    assert!(relief.windows(2).all(|w| w[0] >= w[1]), "{:?}", relief);
}

#[tokio::test]
async fn invalid_input_never_starts_a_computation() {
    let env = FixtureEnv::new();
    let engine = engine(env.sources());

    let inverted = SearchParams {
        south: 40.0,
        north: 39.0,
        ..scenario_params()
    };
    assert!(matches!(
        engine.search(&inverted, 1, 2).await,
        Err(SearchError::InvalidBoundingBox { .. })
    ));
    assert!(matches!(
        engine.search(&scenario_params(), 0, 2).await,
        Err(SearchError::InvalidPagination { .. })
    ));
    let bad_network = SearchParams {
        network_type: "boat".to_string(),
        ..scenario_params()
    };
    assert!(matches!(
        engine.search(&bad_network, 1, 2).await,
        Err(SearchError::InvalidNetworkType { .. })
    ));

    let stats = engine.cache_stats();
    assert_eq!(stats.misses, 0);
    assert_eq!(stats.computations, 0);
}
