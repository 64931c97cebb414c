use serde_repr::{Deserialize_repr, Serialize_repr};
use std::convert::TryFrom;
use strum_macros::EnumIter;

#[derive(Deserialize_repr, Serialize_repr, Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
#[repr(u8)]
pub enum RankingType {
    Overall = 0,
    Singles = 1,
    Doubles = 2,
    MixedDoubles = 3
}

impl TryFrom<i32> for RankingType {
    type Error = ();

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(RankingType::Overall),
            1 => Ok(RankingType::Singles),
            2 => Ok(RankingType::Doubles),
            3 => Ok(RankingType::MixedDoubles),
            _ => Err(())
        }
    }
}
