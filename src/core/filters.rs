use crate::models::{FilterCriteria, ListableEntity};

/// Parse a user-supplied numeric bound
///
/// Never fails: anything that is not a finite, non-negative number is
/// treated as "no bound".
pub fn parse_bound(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().and_then(sanitize_bound)
}

/// Drop bounds that cannot constrain anything meaningfully
#[inline]
pub fn sanitize_bound(value: f64) -> Option<f64> {
    if value.is_finite() && value >= 0.0 {
        Some(value)
    } else {
        None
    }
}

/// Non-empty, trimmed view of an optional text criterion
#[inline]
fn active_text(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Stage 1 - case-insensitive substring search over title, description and tags
#[inline]
pub fn matches_search(entity: &ListableEntity, query: &str) -> bool {
    entity
        .searchable_text()
        .to_lowercase()
        .contains(&query.to_lowercase())
}

/// Stage 2 - exact category match
#[inline]
pub fn matches_category(entity: &ListableEntity, category: &str) -> bool {
    entity.category == category
}

/// Stage 3 - price or salary range
///
/// Jobs carry a salary range rather than a price; the range passes when it
/// overlaps the bounds. Missing amounts never reject.
#[inline]
pub fn matches_price_range(
    entity: &ListableEntity,
    price_min: Option<f64>,
    price_max: Option<f64>,
) -> bool {
    let lower = entity.price.or(entity.salary_min);
    let upper = entity.price.or(entity.salary_max).or(lower);

    if let (Some(min), Some(upper)) = (price_min, upper) {
        if upper < min {
            return false;
        }
    }

    if let (Some(max), Some(lower)) = (price_max, lower) {
        if lower > max {
            return false;
        }
    }

    true
}

/// Stage 4 - exact city and state match when requested
#[inline]
pub fn matches_location(
    entity: &ListableEntity,
    city: Option<&str>,
    state: Option<&str>,
) -> bool {
    if let Some(city) = city {
        if entity.city.as_deref() != Some(city) {
            return false;
        }
    }

    if let Some(state) = state {
        if entity.state.as_deref() != Some(state) {
            return false;
        }
    }

    true
}

/// Run stages 1-4 of the pipeline against a single entity
pub fn matches_criteria(entity: &ListableEntity, criteria: &FilterCriteria) -> bool {
    if let Some(query) = active_text(&criteria.search_query) {
        if !matches_search(entity, query) {
            return false;
        }
    }

    if let Some(category) = active_text(&criteria.category) {
        if !matches_category(entity, category) {
            return false;
        }
    }

    if !matches_price_range(entity, criteria.price_min, criteria.price_max) {
        return false;
    }

    matches_location(
        entity,
        active_text(&criteria.city),
        active_text(&criteria.state),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityType;
    use chrono::Utc;

    fn create_test_entity(title: &str, price: Option<f64>) -> ListableEntity {
        ListableEntity {
            id: "e1".to_string(),
            entity_type: EntityType::Product,
            title: title.to_string(),
            description: "Barely used, pickup only".to_string(),
            tags: vec!["furniture".to_string(), "oak".to_string()],
            category: "home".to_string(),
            price,
            salary_min: None,
            salary_max: None,
            city: Some("Toronto".to_string()),
            state: Some("ON".to_string()),
            coordinate: None,
            created_at: Utc::now(),
            is_active: true,
            is_boosted: false,
            boost_score: 0,
            boost_expires_at: None,
        }
    }

    #[test]
    fn test_parse_bound() {
        assert_eq!(parse_bound("12.5"), Some(12.5));
        assert_eq!(parse_bound("  40 "), Some(40.0));
        assert_eq!(parse_bound(""), None);
        assert_eq!(parse_bound("abc"), None);
        assert_eq!(parse_bound("-5"), None);
        assert_eq!(parse_bound("NaN"), None);
        assert_eq!(parse_bound("inf"), None);
    }

    #[test]
    fn test_search_matches_tags_case_insensitive() {
        let entity = create_test_entity("Dining Table", Some(100.0));

        assert!(matches_search(&entity, "dining"));
        assert!(matches_search(&entity, "OAK"));
        assert!(matches_search(&entity, "pickup"));
        assert!(!matches_search(&entity, "sofa"));
    }

    #[test]
    fn test_missing_price_passes_range() {
        let entity = create_test_entity("Free chair", None);
        assert!(matches_price_range(&entity, Some(10.0), Some(20.0)));
    }

    #[test]
    fn test_price_range_bounds_inclusive() {
        let entity = create_test_entity("Table", Some(100.0));

        assert!(matches_price_range(&entity, Some(100.0), Some(100.0)));
        assert!(!matches_price_range(&entity, Some(100.01), None));
        assert!(!matches_price_range(&entity, None, Some(99.99)));
    }

    #[test]
    fn test_salary_range_overlap() {
        let mut job = create_test_entity("Line cook", None);
        job.entity_type = EntityType::Job;
        job.salary_min = Some(40_000.0);
        job.salary_max = Some(55_000.0);

        assert!(matches_price_range(&job, Some(50_000.0), None));
        assert!(!matches_price_range(&job, Some(60_000.0), None));
        assert!(matches_price_range(&job, None, Some(45_000.0)));
        assert!(!matches_price_range(&job, None, Some(30_000.0)));
    }

    #[test]
    fn test_location_requires_field_when_requested() {
        let mut entity = create_test_entity("Table", Some(10.0));
        assert!(matches_location(&entity, Some("Toronto"), Some("ON")));
        assert!(!matches_location(&entity, Some("Ottawa"), None));

        entity.city = None;
        assert!(!matches_location(&entity, Some("Toronto"), None));
        assert!(matches_location(&entity, None, None));
    }

    #[test]
    fn test_blank_criteria_are_skipped() {
        let entity = create_test_entity("Table", Some(10.0));
        let criteria = FilterCriteria {
            search_query: Some("   ".to_string()),
            category: Some(String::new()),
            city: Some(String::new()),
            ..FilterCriteria::default()
        };

        assert!(matches_criteria(&entity, &criteria));
    }
}
