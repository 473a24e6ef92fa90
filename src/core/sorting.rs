use chrono::{DateTime, Utc};
use std::cmp::Ordering;

use crate::models::{RankedEntity, SortMode};

/// Sort ranked entities in place according to `mode`
///
/// All orderings are stable. A missing price counts as +infinity, so it
/// sinks under `PriceLow` and floats to the top under `PriceHigh`.
/// `Distance` leaves the order untouched: the radius stage already sorted
/// nearest first.
pub fn sort_entities(entities: &mut [RankedEntity], mode: SortMode, now: DateTime<Utc>) {
    match mode {
        SortMode::Newest => {
            entities.sort_by(|a, b| b.entity.created_at.cmp(&a.entity.created_at));
        }
        SortMode::PriceLow => {
            entities.sort_by(|a, b| compare_price(a, b));
        }
        SortMode::PriceHigh => {
            entities.sort_by(|a, b| compare_price(b, a));
        }
        SortMode::Boosted => {
            entities.sort_by(|a, b| compare_boost(a, b, now));
        }
        SortMode::Distance => {}
    }
}

#[inline]
fn price_key(entity: &RankedEntity) -> f64 {
    entity.entity.sort_price().unwrap_or(f64::INFINITY)
}

#[inline]
fn compare_price(a: &RankedEntity, b: &RankedEntity) -> Ordering {
    price_key(a)
        .partial_cmp(&price_key(b))
        .unwrap_or(Ordering::Equal)
}

/// Currently boosted first, then higher boost score first
#[inline]
fn compare_boost(a: &RankedEntity, b: &RankedEntity, now: DateTime<Utc>) -> Ordering {
    let a_boosted = a.entity.is_boosted_at(now);
    let b_boosted = b.entity.is_boosted_at(now);

    b_boosted.cmp(&a_boosted).then_with(|| {
        b.entity
            .effective_boost_score(now)
            .cmp(&a.entity.effective_boost_score(now))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityType, ListableEntity};
    use chrono::Duration;

    fn ranked(id: &str, price: Option<f64>, age_hours: i64) -> RankedEntity {
        RankedEntity::from(ListableEntity {
            id: id.to_string(),
            entity_type: EntityType::Product,
            title: id.to_string(),
            description: String::new(),
            tags: vec![],
            category: "misc".to_string(),
            price,
            salary_min: None,
            salary_max: None,
            city: None,
            state: None,
            coordinate: None,
            created_at: Utc::now() - Duration::hours(age_hours),
            is_active: true,
            is_boosted: false,
            boost_score: 0,
            boost_expires_at: None,
        })
    }

    fn ids(entities: &[RankedEntity]) -> Vec<&str> {
        entities.iter().map(|e| e.entity.id.as_str()).collect()
    }

    #[test]
    fn test_newest_first() {
        let mut items = vec![ranked("old", None, 48), ranked("new", None, 1), ranked("mid", None, 10)];
        sort_entities(&mut items, SortMode::Newest, Utc::now());
        assert_eq!(ids(&items), vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_price_low_missing_last() {
        let mut items = vec![
            ranked("none", None, 1),
            ranked("ten", Some(10.0), 1),
            ranked("free", Some(0.0), 1),
        ];
        sort_entities(&mut items, SortMode::PriceLow, Utc::now());
        assert_eq!(ids(&items), vec!["free", "ten", "none"]);
    }

    #[test]
    fn test_price_high_missing_first() {
        let mut items = vec![
            ranked("ten", Some(10.0), 1),
            ranked("none", None, 1),
            ranked("fifty", Some(50.0), 1),
        ];
        sort_entities(&mut items, SortMode::PriceHigh, Utc::now());
        assert_eq!(ids(&items), vec!["none", "fifty", "ten"]);
    }

    #[test]
    fn test_boosted_then_score() {
        let now = Utc::now();
        let mut plain = ranked("plain", None, 1);
        plain.entity.boost_score = 999;
        let mut week = ranked("week", None, 1);
        week.entity.is_boosted = true;
        week.entity.boost_score = 70;
        let mut month = ranked("month", None, 1);
        month.entity.is_boosted = true;
        month.entity.boost_score = 300;
        let mut lapsed = ranked("lapsed", None, 1);
        lapsed.entity.is_boosted = true;
        lapsed.entity.boost_score = 300;
        lapsed.entity.boost_expires_at = Some(now - Duration::days(1));

        let mut items = vec![plain, lapsed, week, month];
        sort_entities(&mut items, SortMode::Boosted, now);
        assert_eq!(ids(&items), vec!["month", "week", "plain", "lapsed"]);
    }

    #[test]
    fn test_distance_mode_keeps_order() {
        let mut items = vec![ranked("b", Some(5.0), 5), ranked("a", Some(1.0), 1)];
        sort_entities(&mut items, SortMode::Distance, Utc::now());
        assert_eq!(ids(&items), vec!["b", "a"]);
    }
}
