// Criterion benchmarks for Market Algo

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use market_algo::core::{
    distance::{calculate_bounding_box, distance_km, filter_by_radius},
    engine::apply_filters,
};
use market_algo::models::{Coordinate, EntityType, FilterCriteria, ListableEntity, SortMode};
use chrono::{Duration, Utc};

const TORONTO: Coordinate = Coordinate { latitude: 43.6532, longitude: -79.3832 };

fn create_listing(id: usize) -> ListableEntity {
    let lat_offset = (id as f64 * 0.001) % 0.5;
    let lon_offset = (id as f64 * 0.0013) % 0.5;

    ListableEntity {
        id: id.to_string(),
        entity_type: EntityType::Product,
        title: if id % 4 == 0 { "Road bike" } else { "Desk lamp" }.to_string(),
        description: "Pickup only".to_string(),
        tags: vec!["used".to_string()],
        category: if id % 2 == 0 { "sports" } else { "home" }.to_string(),
        price: if id % 7 == 0 { None } else { Some((id % 500) as f64) },
        salary_min: None,
        salary_max: None,
        city: Some("Toronto".to_string()),
        state: Some("ON".to_string()),
        coordinate: Some(Coordinate::new(
            TORONTO.latitude + lat_offset,
            TORONTO.longitude + lon_offset,
        )),
        created_at: Utc::now() - Duration::minutes(id as i64),
        is_active: true,
        is_boosted: id % 10 == 0,
        boost_score: if id % 10 == 0 { 70 } else { 0 },
        boost_expires_at: Some(Utc::now() + Duration::days(7)),
    }
}

fn bench_distance(c: &mut Criterion) {
    let ottawa = Coordinate::new(45.4215, -75.6972);
    c.bench_function("distance_km", |b| {
        b.iter(|| distance_km(black_box(TORONTO), black_box(ottawa)));
    });
}

fn bench_bounding_box(c: &mut Criterion) {
    c.bench_function("bounding_box_calculation", |b| {
        b.iter(|| calculate_bounding_box(black_box(TORONTO), black_box(50.0)));
    });
}

fn bench_radius_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("radius_filter");

    for count in [100, 1000, 10000].iter() {
        let listings: Vec<ListableEntity> = (0..*count).map(create_listing).collect();

        group.bench_with_input(BenchmarkId::new("filter_by_radius", count), count, |b, _| {
            b.iter(|| filter_by_radius(black_box(listings.clone()), TORONTO, black_box(25.0)));
        });
    }

    group.finish();
}

fn bench_filtering_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("filtering_pipeline");

    let criteria = FilterCriteria {
        search_query: Some("bike".to_string()),
        category: Some("sports".to_string()),
        price_max: Some(400.0),
        origin: Some(TORONTO),
        radius_km: 30.0,
        sort_mode: SortMode::Boosted,
        ..FilterCriteria::default()
    };

    for count in [100, 1000, 10000].iter() {
        let listings: Vec<ListableEntity> = (0..*count).map(create_listing).collect();

        group.bench_with_input(BenchmarkId::new("apply_filters", count), count, |b, _| {
            b.iter(|| apply_filters(black_box(listings.clone()), black_box(&criteria)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_distance,
    bench_bounding_box,
    bench_radius_filter,
    bench_filtering_pipeline
);

criterion_main!(benches);
