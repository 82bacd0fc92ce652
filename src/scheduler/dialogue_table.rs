//! Time-of-day dialogue lines for autonomous chatter.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// One of five non-overlapping parts of the local day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayPeriod {
    /// 05:00 to 10:59.
    Dawn,
    /// 11:00 to 13:59.
    Midday,
    /// 14:00 to 17:59.
    Afternoon,
    /// 18:00 to 21:59.
    Evening,
    /// 22:00 to 04:59.
    Night,
}

impl DayPeriod {
    /// Period containing the given local hour (taken modulo 24).
    pub fn from_hour(hour: u32) -> Self {
        match hour % 24 {
            5..=10 => Self::Dawn,
            11..=13 => Self::Midday,
            14..=17 => Self::Afternoon,
            18..=21 => Self::Evening,
            _ => Self::Night,
        }
    }
}

impl std::fmt::Display for DayPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dawn => write!(f, "dawn"),
            Self::Midday => write!(f, "midday"),
            Self::Afternoon => write!(f, "afternoon"),
            Self::Evening => write!(f, "evening"),
            Self::Night => write!(f, "night"),
        }
    }
}

/// Candidate lines per [`DayPeriod`].
///
/// A literal `\n` (backslash, `n`) inside a line is rendered as a line break
/// by the dialogue task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueTable {
    /// Morning lines.
    pub dawn: Vec<String>,
    /// Lunchtime lines.
    pub midday: Vec<String>,
    /// Afternoon lines.
    pub afternoon: Vec<String>,
    /// Evening lines.
    pub evening: Vec<String>,
    /// Late night lines.
    pub night: Vec<String>,
}

fn lines(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| (*s).to_owned()).collect()
}

impl Default for DialogueTable {
    fn default() -> Self {
        Self {
            dawn: lines(&[
                "Good morning!",
                "The sprouts look thirsty today.",
                "Early start?\\nLet's plant something.",
            ]),
            midday: lines(&[
                "Lunch break soon?",
                "The sun is right overhead.",
                "Halfway through the day!",
            ]),
            afternoon: lines(&[
                "Keep going, you're doing great.",
                "A little more focus,\\nthen a little rest.",
                "The carrots are growing nicely.",
            ]),
            evening: lines(&[
                "The sky is turning orange.",
                "Nice work today.",
                "Time to water before dark.",
            ]),
            night: lines(&[
                "It's getting late...",
                "The stars are out.",
                "Don't forget to sleep!\\nThe farm will wait.",
            ]),
        }
    }
}

impl DialogueTable {
    /// Candidate lines for a period.
    pub fn lines(&self, period: DayPeriod) -> &[String] {
        match period {
            DayPeriod::Dawn => &self.dawn,
            DayPeriod::Midday => &self.midday,
            DayPeriod::Afternoon => &self.afternoon,
            DayPeriod::Evening => &self.evening,
            DayPeriod::Night => &self.night,
        }
    }

    /// Uniformly random line for a period, or `None` if it has no lines.
    pub fn pick<R: Rng + ?Sized>(&self, period: DayPeriod, rng: &mut R) -> Option<&str> {
        self.lines(period).choose(rng).map(String::as_str)
    }
}
