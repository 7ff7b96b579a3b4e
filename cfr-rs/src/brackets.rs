use crate::prelude::*;
use getset::CopyGetters;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;

/// A closed interval of ages `[low, high]`. An absent `high` means the bracket
/// is unbounded above.
///
/// In configuration files brackets are written as `[low, high]` or `[low]`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, CopyGetters, Serialize, Deserialize)]
#[serde(try_from = "Vec<u32>", into = "Vec<u32>")]
#[getset(get_copy = "pub")]
pub struct AgeBracket {
    low: u32,
    high: Option<u32>,
}

impl AgeBracket {
    pub fn new(low: u32, high: u32) -> Self {
        AgeBracket {
            low,
            high: Some(high),
        }
    }

    /// Bracket covering every age from `low` onwards.
    pub fn open(low: u32) -> Self {
        AgeBracket { low, high: None }
    }

    pub fn contains(&self, age: Age) -> bool {
        age >= self.low as Real && self.high.map_or(true, |h| age <= h as Real)
    }
}

impl fmt::Display for AgeBracket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.high {
            Some(high) => write!(f, "{}-{}", self.low, high),
            None => write!(f, "{}+", self.low),
        }
    }
}

impl TryFrom<Vec<u32>> for AgeBracket {
    type Error = String;

    fn try_from(value: Vec<u32>) -> std::result::Result<Self, Self::Error> {
        match value.as_slice() {
            &[low] => Ok(AgeBracket::open(low)),
            &[low, high] if low <= high => Ok(AgeBracket::new(low, high)),
            _ => Err(format!("malformed age bracket {:?}", value)),
        }
    }
}

impl From<AgeBracket> for Vec<u32> {
    fn from(b: AgeBracket) -> Vec<u32> {
        match b.high {
            Some(high) => vec![b.low, high],
            None => vec![b.low],
        }
    }
}

/// An ordered set of age brackets that covers ages contiguously starting at
/// zero: no gaps, no overlaps, and only the last bracket may be unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<AgeBracket>", into = "Vec<AgeBracket>")]
pub struct AgeBrackets {
    data: Vec<AgeBracket>,
}

impl AgeBrackets {
    pub fn new(brackets: Vec<AgeBracket>) -> Result<Self> {
        check_partition(&brackets)?;
        return Ok(AgeBrackets { data: brackets });
    }

    /// Ten-year brackets used by the line-list CFR charts: 0-29, 30-39, ...,
    /// 80-89 and 90+.
    pub fn florida() -> Self {
        let mut data = vec![AgeBracket::new(0, 29)];
        data.extend((3..9).map(|i| AgeBracket::new(10 * i, 10 * i + 9)));
        data.push(AgeBracket::open(90));
        AgeBrackets { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AgeBracket> {
        self.data.iter()
    }

    pub fn get(&self, i: usize) -> Option<AgeBracket> {
        self.data.get(i).copied()
    }

    pub fn as_slice(&self) -> &[AgeBracket] {
        &self.data
    }

    /// Index of the bracket containing age, if any.
    pub fn position(&self, age: Age) -> Option<usize> {
        self.data.iter().position(|b| b.contains(age))
    }

    /// Like position(), but fails with BracketNotFound. The context string
    /// names the bracket set in the error message.
    pub fn index_of(&self, age: Age, context: &str) -> Result<usize> {
        self.position(age).ok_or_else(|| Error::BracketNotFound {
            age,
            context: context.to_string(),
        })
    }
}

impl Default for AgeBrackets {
    fn default() -> Self {
        AgeBrackets::florida()
    }
}

impl TryFrom<Vec<AgeBracket>> for AgeBrackets {
    type Error = Error;

    fn try_from(value: Vec<AgeBracket>) -> Result<Self> {
        AgeBrackets::new(value)
    }
}

impl From<AgeBrackets> for Vec<AgeBracket> {
    fn from(b: AgeBrackets) -> Vec<AgeBracket> {
        b.data
    }
}

impl<'a> IntoIterator for &'a AgeBrackets {
    type Item = &'a AgeBracket;
    type IntoIter = std::slice::Iter<'a, AgeBracket>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}

/// Check that brackets start at zero and follow each other without gaps or
/// overlaps.
pub fn check_partition(brackets: &[AgeBracket]) -> Result<()> {
    let first = match brackets.first() {
        Some(b) => b,
        None => return Err(Error::InvalidBrackets("empty bracket set".into())),
    };
    if first.low != 0 {
        return Err(Error::InvalidBrackets(format!(
            "first bracket {} does not start at age 0",
            first
        )));
    }
    for pair in brackets.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        let high = match prev.high {
            Some(h) => h,
            None => {
                return Err(Error::InvalidBrackets(format!(
                    "unbounded bracket {} is followed by {}",
                    prev, next
                )))
            }
        };
        if next.low <= high {
            return Err(Error::InvalidBrackets(format!("{} overlaps {}", prev, next)));
        }
        if next.low != high + 1 {
            return Err(Error::InvalidBrackets(format!(
                "gap between {} and {}",
                prev, next
            )));
        }
    }
    Ok(())
}
