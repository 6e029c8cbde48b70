use std::{collections::BTreeMap, fmt, str::FromStr};

use crate::{error::ValidationError, tracking::TrackedUser};

/// Ordinal label derived from a score, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    S,
    A,
    B,
    C,
    D,
}

pub const ALL_TIERS: [Tier; 5] = [Tier::S, Tier::A, Tier::B, Tier::C, Tier::D];

/// `sign(score) * log10(|score| + 1)`.
pub fn log_score(score: f64) -> f64 {
    if score == 0.0 {
        return 0.0;
    }
    score.signum() * (score.abs() + 1.0).log10()
}

impl Tier {
    /// Bucket a score on the signed log scale: 3 and up is S, 2 A, 0 B, -2 C,
    /// anything lower (or NaN) D.
    pub fn for_score(score: f64) -> Tier {
        let l = log_score(score);
        if l >= 3.0 {
            Tier::S
        } else if l >= 2.0 {
            Tier::A
        } else if l >= 0.0 {
            Tier::B
        } else if l >= -2.0 {
            Tier::C
        } else {
            Tier::D
        }
    }
}

impl FromStr for Tier {
    type Err = ValidationError;

    /// Tier of a score given as text, e.g. `"1000"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<f64>()
            .map(Tier::for_score)
            .map_err(|_| ValidationError::NotANumber)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Tier::S => "S",
            Tier::A => "A",
            Tier::B => "B",
            Tier::C => "C",
            Tier::D => "D",
        };
        f.write_str(label)
    }
}

/// Group users by tier, S first, each tier sorted by descending score.
/// Every tier is present, possibly empty.
pub fn group_by_tier<'a>(
    users: impl IntoIterator<Item = &'a TrackedUser>,
) -> BTreeMap<Tier, Vec<&'a TrackedUser>> {
    let mut groups: BTreeMap<Tier, Vec<&TrackedUser>> =
        ALL_TIERS.iter().map(|t| (*t, Vec::new())).collect();
    for user in users {
        groups
            .entry(Tier::for_score(user.score()))
            .or_default()
            .push(user);
    }
    for members in groups.values_mut() {
        members.sort_by(|a, b| b.score().total_cmp(&a.score()));
    }
    groups
}
