use crate::engine::structures::{
    age_bracket::AgeBracket, gender::Gender, partition_key::PartitionKey, ranking_type::RankingType
};
use chrono::NaiveDate;
use strum::IntoEnumIterator;

/// The slice of a competitor's profile that determines which leaderboards a
/// tournament result fans out to.
#[derive(Debug, Clone, Copy)]
pub struct CompetitorProfile {
    pub competitor_id: i32,
    pub state_id: Option<i32>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<Gender>
}

/// Derives every partition a competitor's result applies to: for each ranking
/// type, the national board always, plus state / age-group / gender boards
/// when the profile carries the corresponding attribute.
///
/// Pure function so the fan-out set is testable independent of storage.
pub fn derive_partitions(profile: &CompetitorProfile, on: NaiveDate) -> Vec<PartitionKey> {
    let age_group = profile.birth_date.map(|b| AgeBracket::from_birth_date(b, on));

    let mut partitions = Vec::new();
    for ranking_type in RankingType::iter() {
        partitions.push(PartitionKey::national(ranking_type));

        if let Some(state_id) = profile.state_id {
            partitions.push(PartitionKey::state(ranking_type, state_id));
        }
        if let Some(age_group) = age_group {
            partitions.push(PartitionKey::age_group(ranking_type, age_group));
        }
        if let Some(gender) = profile.gender {
            partitions.push(PartitionKey::gender(ranking_type, gender));
        }
    }

    partitions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::structures::ranking_category::RankingCategory;

    fn on() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn full_profile() -> CompetitorProfile {
        CompetitorProfile {
            competitor_id: 1,
            state_id: Some(11),
            birth_date: NaiveDate::from_ymd_opt(1990, 3, 14),
            gender: Some(Gender::Female)
        }
    }

    #[test]
    fn test_full_profile_fans_out_to_sixteen_partitions() {
        let partitions = derive_partitions(&full_profile(), on());

        // 4 ranking types x (national + state + age group + gender)
        assert_eq!(partitions.len(), 16);
    }

    #[test]
    fn test_minimal_profile_gets_national_only() {
        let profile = CompetitorProfile {
            competitor_id: 2,
            state_id: None,
            birth_date: None,
            gender: None
        };

        let partitions = derive_partitions(&profile, on());

        assert_eq!(partitions.len(), 4);
        assert!(partitions.iter().all(|p| p.category == RankingCategory::National));
    }

    #[test]
    fn test_age_group_derived_from_birth_date() {
        let partitions = derive_partitions(&full_profile(), on());

        let age_partitions: Vec<_> = partitions
            .iter()
            .filter(|p| p.category == RankingCategory::AgeGroup)
            .collect();

        assert_eq!(age_partitions.len(), 4);
        // Born 1990-03-14, so 34 on 2024-06-01
        assert!(age_partitions.iter().all(|p| p.age_group == Some(AgeBracket::Age19To34)));
    }

    #[test]
    fn test_every_ranking_type_present() {
        let partitions = derive_partitions(&full_profile(), on());

        for ranking_type in RankingType::iter() {
            assert!(partitions.iter().any(|p| p.ranking_type == ranking_type));
        }
    }

    #[test]
    fn test_state_key_carried() {
        let partitions = derive_partitions(&full_profile(), on());
        let state_partition = partitions
            .iter()
            .find(|p| p.category == RankingCategory::State)
            .unwrap();

        assert_eq!(state_partition.state_id, Some(11));
        assert_eq!(state_partition.age_group, None);
        assert_eq!(state_partition.gender, None);
    }
}
