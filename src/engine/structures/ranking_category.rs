use serde_repr::{Deserialize_repr, Serialize_repr};
use std::convert::TryFrom;
use strum_macros::EnumIter;

/// The axis a leaderboard is partitioned on. `State`, `AgeGroup` and `Gender`
/// carry an extra key on the partition (state id, age bracket, gender).
#[derive(Deserialize_repr, Serialize_repr, Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
#[repr(u8)]
pub enum RankingCategory {
    National = 0,
    State = 1,
    AgeGroup = 2,
    Gender = 3,
    TournamentLevel = 4
}

impl TryFrom<i32> for RankingCategory {
    type Error = ();

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(RankingCategory::National),
            1 => Ok(RankingCategory::State),
            2 => Ok(RankingCategory::AgeGroup),
            3 => Ok(RankingCategory::Gender),
            4 => Ok(RankingCategory::TournamentLevel),
            _ => Err(())
        }
    }
}
