use serde_repr::{Deserialize_repr, Serialize_repr};
use std::convert::TryFrom;

#[derive(Deserialize_repr, Serialize_repr, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Gender {
    Female = 0,
    Male = 1
}

impl TryFrom<i32> for Gender {
    type Error = ();

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Gender::Female),
            1 => Ok(Gender::Male),
            _ => Err(())
        }
    }
}
