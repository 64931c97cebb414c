pub mod age_bracket;
pub mod batch_result;
pub mod gender;
pub mod partition_key;
pub mod ranking_category;
pub mod ranking_type;
pub mod skill_level;
pub mod tournament_level;
pub mod transition_reason;
