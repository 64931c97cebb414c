use crate::engine::structures::{
    age_bracket::AgeBracket, gender::Gender, ranking_category::RankingCategory, ranking_type::RankingType
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scopes one leaderboard. Together with a competitor id this uniquely
/// identifies a standing row: the optional keys are present exactly when the
/// category requires them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionKey {
    pub ranking_type: RankingType,
    pub category: RankingCategory,
    pub state_id: Option<i32>,
    pub age_group: Option<AgeBracket>,
    pub gender: Option<Gender>
}

impl PartitionKey {
    pub fn national(ranking_type: RankingType) -> PartitionKey {
        PartitionKey {
            ranking_type,
            category: RankingCategory::National,
            state_id: None,
            age_group: None,
            gender: None
        }
    }

    pub fn state(ranking_type: RankingType, state_id: i32) -> PartitionKey {
        PartitionKey {
            ranking_type,
            category: RankingCategory::State,
            state_id: Some(state_id),
            age_group: None,
            gender: None
        }
    }

    pub fn age_group(ranking_type: RankingType, age_group: AgeBracket) -> PartitionKey {
        PartitionKey {
            ranking_type,
            category: RankingCategory::AgeGroup,
            state_id: None,
            age_group: Some(age_group),
            gender: None
        }
    }

    pub fn gender(ranking_type: RankingType, gender: Gender) -> PartitionKey {
        PartitionKey {
            ranking_type,
            category: RankingCategory::Gender,
            state_id: None,
            age_group: None,
            gender: Some(gender)
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}", self.ranking_type, self.category)?;
        if let Some(state_id) = self.state_id {
            write!(f, "[state {}]", state_id)?;
        }
        if let Some(age_group) = self.age_group {
            write!(f, "[{}]", age_group)?;
        }
        if let Some(gender) = self.gender {
            write!(f, "[{:?}]", gender)?;
        }
        Ok(())
    }
}
