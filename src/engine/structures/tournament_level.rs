use serde_repr::{Deserialize_repr, Serialize_repr};
use std::convert::TryFrom;
use strum_macros::EnumIter;

#[derive(Deserialize_repr, Serialize_repr, Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
#[repr(u8)]
pub enum TournamentLevel {
    National = 0,
    State = 1,
    Municipal = 2,
    Local = 3
}

impl TournamentLevel {
    /// Levels stored as unknown integers score as `Local`.
    pub fn from_i32_or_local(v: i32) -> TournamentLevel {
        TournamentLevel::try_from(v).unwrap_or(TournamentLevel::Local)
    }
}

impl TryFrom<i32> for TournamentLevel {
    type Error = ();

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(TournamentLevel::National),
            1 => Ok(TournamentLevel::State),
            2 => Ok(TournamentLevel::Municipal),
            3 => Ok(TournamentLevel::Local),
            _ => Err(())
        }
    }
}
