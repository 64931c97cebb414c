use chrono::{Datelike, NaiveDate};
use serde_repr::{Deserialize_repr, Serialize_repr};
use std::{convert::TryFrom, fmt};

/// Competitive age bracket. Derived from the competitor's birth date at
/// fan-out time, never stored on the profile.
#[derive(Deserialize_repr, Serialize_repr, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum AgeBracket {
    Under19 = 0,
    Age19To34 = 1,
    Age35To49 = 2,
    Age50To64 = 3,
    Age65Plus = 4
}

impl AgeBracket {
    pub fn from_age(age: i32) -> AgeBracket {
        match age {
            a if a < 19 => AgeBracket::Under19,
            a if a < 35 => AgeBracket::Age19To34,
            a if a < 50 => AgeBracket::Age35To49,
            a if a < 65 => AgeBracket::Age50To64,
            _ => AgeBracket::Age65Plus
        }
    }

    pub fn from_birth_date(birth_date: NaiveDate, on: NaiveDate) -> AgeBracket {
        AgeBracket::from_age(age_on(birth_date, on))
    }
}

/// Whole years between `birth_date` and `on`, corrected for whether the
/// birthday has occurred yet in the current year.
pub fn age_on(birth_date: NaiveDate, on: NaiveDate) -> i32 {
    let mut age = on.year() - birth_date.year();
    if (on.month(), on.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    age
}

impl fmt::Display for AgeBracket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AgeBracket::Under19 => "Under 19",
            AgeBracket::Age19To34 => "19-34",
            AgeBracket::Age35To49 => "35-49",
            AgeBracket::Age50To64 => "50-64",
            AgeBracket::Age65Plus => "65+"
        };
        write!(f, "{}", label)
    }
}

impl TryFrom<i32> for AgeBracket {
    type Error = ();

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(AgeBracket::Under19),
            1 => Ok(AgeBracket::Age19To34),
            2 => Ok(AgeBracket::Age35To49),
            3 => Ok(AgeBracket::Age50To64),
            4 => Ok(AgeBracket::Age65Plus),
            _ => Err(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_age_before_birthday() {
        // Turns 19 in November; still 18 in June.
        assert_eq!(age_on(date(2005, 11, 20), date(2024, 6, 1)), 18);
    }

    #[test]
    fn test_age_on_birthday() {
        assert_eq!(age_on(date(2005, 6, 1), date(2024, 6, 1)), 19);
    }

    #[test]
    fn test_bracket_boundaries() {
        assert_eq!(AgeBracket::from_age(18), AgeBracket::Under19);
        assert_eq!(AgeBracket::from_age(19), AgeBracket::Age19To34);
        assert_eq!(AgeBracket::from_age(34), AgeBracket::Age19To34);
        assert_eq!(AgeBracket::from_age(35), AgeBracket::Age35To49);
        assert_eq!(AgeBracket::from_age(49), AgeBracket::Age35To49);
        assert_eq!(AgeBracket::from_age(50), AgeBracket::Age50To64);
        assert_eq!(AgeBracket::from_age(64), AgeBracket::Age50To64);
        assert_eq!(AgeBracket::from_age(65), AgeBracket::Age65Plus);
    }

    #[test]
    fn test_display_labels() {
        assert_eq!(AgeBracket::Under19.to_string(), "Under 19");
        assert_eq!(AgeBracket::Age65Plus.to_string(), "65+");
    }
}
