use chrono::{DateTime, Utc};

use crate::core::{
    distance::filter_by_radius,
    filters::matches_criteria,
    sorting::sort_entities,
};
use crate::models::{FilterCriteria, ListableEntity, Page, RankedEntity};

/// Run the full listing pipeline as of the current time
///
/// See [`apply_filters_at`].
pub fn apply_filters(entities: Vec<ListableEntity>, criteria: &FilterCriteria) -> Vec<RankedEntity> {
    apply_filters_at(entities, criteria, Utc::now())
}

/// Run the full listing pipeline
///
/// # Pipeline Stages
/// 1. Text search over title, description and tags
/// 2. Category equality
/// 3. Price / salary range
/// 4. City and state
/// 5. Radius around `criteria.origin` (injects `distance_km`)
/// 6. Sort by `criteria.sort_mode`
///
/// `now` decides which boosts are still in effect for the boosted sort.
pub fn apply_filters_at(
    entities: Vec<ListableEntity>,
    criteria: &FilterCriteria,
    now: DateTime<Utc>,
) -> Vec<RankedEntity> {
    // Stages 1-4
    let survivors = entities
        .into_iter()
        .filter(|entity| matches_criteria(entity, criteria));

    // Stage 5
    let mut ranked: Vec<RankedEntity> = match criteria.origin {
        Some(origin) => filter_by_radius(survivors, origin, criteria.radius_km),
        None => survivors.map(RankedEntity::from).collect(),
    };

    // Stage 6
    sort_entities(&mut ranked, criteria.sort_mode, now);

    ranked
}

/// Slice one page out of a ranked result
///
/// Pages are 1-based; page 0 is read as page 1. Pages past the end come back
/// empty with the totals still filled in.
pub fn paginate<T>(items: Vec<T>, page: usize, page_size: usize) -> Page<T> {
    let page = page.max(1);
    let page_size = page_size.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(page_size);

    let start = (page - 1).saturating_mul(page_size);
    let items: Vec<T> = items.into_iter().skip(start).take(page_size).collect();

    Page {
        items,
        page,
        page_size,
        total_items,
        total_pages,
    }
}

/// Search orchestrator - filter, rank and page a listing collection
#[derive(Debug, Clone, Copy)]
pub struct ListingEngine {
    default_page_size: usize,
    max_page_size: usize,
}

impl ListingEngine {
    pub fn new(default_page_size: usize, max_page_size: usize) -> Self {
        let max_page_size = max_page_size.max(1);
        Self {
            default_page_size: default_page_size.clamp(1, max_page_size),
            max_page_size,
        }
    }

    /// Filter, sort and return the requested page
    pub fn search(
        &self,
        entities: Vec<ListableEntity>,
        criteria: &FilterCriteria,
        page: usize,
        page_size: Option<usize>,
    ) -> Page<RankedEntity> {
        self.search_at(entities, criteria, page, page_size, Utc::now())
    }

    pub fn search_at(
        &self,
        entities: Vec<ListableEntity>,
        criteria: &FilterCriteria,
        page: usize,
        page_size: Option<usize>,
        now: DateTime<Utc>,
    ) -> Page<RankedEntity> {
        let total_candidates = entities.len();
        let ranked = apply_filters_at(entities, criteria, now);

        tracing::debug!(
            "Filtered {} candidates down to {} ({:?})",
            total_candidates,
            ranked.len(),
            criteria.sort_mode
        );

        paginate(ranked, page, self.page_size(page_size))
    }

    fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size)
    }
}

impl Default for ListingEngine {
    fn default() -> Self {
        Self::new(20, 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinate, EntityType, SortMode};
    use chrono::Duration;

    fn create_listing(id: &str, lat: f64, lon: f64, price: Option<f64>) -> ListableEntity {
        ListableEntity {
            id: id.to_string(),
            entity_type: EntityType::Product,
            title: format!("Bike {}", id),
            description: "Road bike".to_string(),
            tags: vec!["cycling".to_string()],
            category: "sports".to_string(),
            price,
            salary_min: None,
            salary_max: None,
            city: Some("New York".to_string()),
            state: Some("NY".to_string()),
            coordinate: Some(Coordinate::new(lat, lon)),
            created_at: Utc::now() - Duration::minutes(id.len() as i64),
            is_active: true,
            is_boosted: false,
            boost_score: 0,
            boost_expires_at: None,
        }
    }

    #[test]
    fn test_pipeline_basic() {
        let entities = vec![
            create_listing("1", 40.72, -74.01, Some(300.0)),
            create_listing("2", 40.72, -74.01, Some(900.0)),
            create_listing("3", 45.0, -74.0, Some(200.0)),
        ];

        let criteria = FilterCriteria {
            price_max: Some(500.0),
            origin: Some(Coordinate::new(40.7128, -74.0060)),
            sort_mode: SortMode::Distance,
            ..FilterCriteria::default()
        };

        let result = apply_filters(entities, &criteria);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].entity.id, "1");
        assert!(result[0].distance_km.unwrap() < 2.0);
    }

    #[test]
    fn test_no_origin_means_no_distance() {
        let entities = vec![create_listing("1", 40.72, -74.01, Some(300.0))];
        let result = apply_filters(entities, &FilterCriteria::default());

        assert_eq!(result.len(), 1);
        assert!(result[0].distance_km.is_none());
    }

    #[test]
    fn test_paginate() {
        let page = paginate((1..=45).collect::<Vec<_>>(), 3, 20);
        assert_eq!(page.items, (41..=45).collect::<Vec<_>>());
        assert_eq!(page.total_items, 45);
        assert_eq!(page.total_pages, 3);

        let beyond = paginate((1..=45).collect::<Vec<_>>(), 9, 20);
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total_pages, 3);

        let first = paginate(vec!['a', 'b'], 0, 1);
        assert_eq!(first.page, 1);
        assert_eq!(first.items, vec!['a']);
    }

    #[test]
    fn test_engine_clamps_page_size() {
        let engine = ListingEngine::new(2, 3);
        let entities: Vec<ListableEntity> = (0..10)
            .map(|i| create_listing(&i.to_string(), 40.72, -74.01, None))
            .collect();

        let page = engine.search(entities.clone(), &FilterCriteria::default(), 1, Some(50));
        assert_eq!(page.items.len(), 3);

        let page = engine.search(entities, &FilterCriteria::default(), 1, None);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_items, 10);
    }
}
