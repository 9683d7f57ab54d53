use crate::models::Provider;

/// Reorder providers so those serving `target_location` come first
///
/// This is a stable partition, not a sort: both groups keep their original
/// relative order and nobody is dropped.
pub fn rank(candidates: &[Provider], target_location: &str) -> Vec<Provider> {
    let (mut serving, others): (Vec<Provider>, Vec<Provider>) = candidates
        .iter()
        .cloned()
        .partition(|p| p.serves(target_location));
    serving.extend(others);
    serving
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProviderStatus, SerialNumber};
    use chrono::Utc;

    fn create_provider(name: &str, regions: &[&str]) -> Provider {
        Provider {
            id: name.to_string(),
            serial_number: SerialNumber(2001),
            user_id: "u".to_string(),
            name: name.to_string(),
            experience: String::new(),
            certificates: String::new(),
            available_regions: regions.iter().map(|r| r.to_string()).collect(),
            phone_number: "010-0000-0000".to_string(),
            status: ProviderStatus::Approved,
            created_at: Utc::now(),
        }
    }

    fn names(providers: &[Provider]) -> Vec<&str> {
        providers.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn test_matches_first_order_preserved() {
        let candidates = vec![
            create_provider("A", &["Seoul"]),
            create_provider("B", &["Busan"]),
            create_provider("C", &["Seoul"]),
        ];

        assert_eq!(names(&rank(&candidates, "Seoul")), vec!["A", "C", "B"]);
    }

    #[test]
    fn test_no_match_keeps_input_order() {
        let candidates = vec![
            create_provider("A", &["Daegu"]),
            create_provider("B", &["Busan"]),
        ];

        assert_eq!(names(&rank(&candidates, "Seoul")), vec!["A", "B"]);
    }

    #[test]
    fn test_exact_region_membership() {
        // "Seoul" must not match "Seoul-si" by substring
        let candidates = vec![
            create_provider("A", &["Seoul-si"]),
            create_provider("B", &["Incheon", "Seoul"]),
        ];

        assert_eq!(names(&rank(&candidates, "Seoul")), vec!["B", "A"]);
    }

    #[test]
    fn test_empty_candidates() {
        assert!(rank(&[], "Seoul").is_empty());
    }
}
