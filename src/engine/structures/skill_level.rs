use serde_repr::{Deserialize_repr, Serialize_repr};
use std::convert::TryFrom;

/// Competitor skill tier. Drives the level multiplier applied to base points.
#[derive(Deserialize_repr, Serialize_repr, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SkillLevel {
    Beginner = 0,
    Amateur = 1,
    Intermediate = 2,
    Advanced = 3,
    Professional = 4
}

impl SkillLevel {
    pub fn multiplier(&self) -> f64 {
        match self {
            SkillLevel::Beginner => 0.8,
            SkillLevel::Amateur => 0.9,
            SkillLevel::Intermediate => 1.0,
            SkillLevel::Advanced => 1.2,
            SkillLevel::Professional => 1.5
        }
    }
}

impl TryFrom<i32> for SkillLevel {
    type Error = ();

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(SkillLevel::Beginner),
            1 => Ok(SkillLevel::Amateur),
            2 => Ok(SkillLevel::Intermediate),
            3 => Ok(SkillLevel::Advanced),
            4 => Ok(SkillLevel::Professional),
            _ => Err(())
        }
    }
}
