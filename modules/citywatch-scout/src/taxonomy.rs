//! Deterministic keyword taxonomy.
//!
//! Used when the reasoning model returns a category or severity label that is
//! not one of the canonical ones. The same text always maps to the same label.

use std::collections::HashSet;
use std::sync::OnceLock;

use citywatch_common::{EventType, Severity};
use regex::Regex;

/// Keywords per category, in tie-break priority order.
const CATEGORY_KEYWORDS: &[(EventType, &[&str])] = &[
    (
        EventType::UtilityDisruption,
        &[
            "power outage",
            "power cut",
            "outage",
            "blackout",
            "electricity",
            "no power",
            "bescom",
            "water supply",
            "no water",
            "gas line",
            "gas leak",
            "network outage",
            "internet",
        ],
    ),
    (
        EventType::WeatherRelatedDamage,
        &[
            "water logging",
            "waterlogging",
            "waterlogged",
            "flood",
            "flooded",
            "flooding",
            "heavy rain",
            "downpour",
            "rain",
            "storm",
            "tree fall",
            "fallen tree",
            "uprooted",
            "hailstorm",
        ],
    ),
    (
        EventType::TrafficAnomaly,
        &[
            "traffic",
            "congestion",
            "jam",
            "gridlock",
            "accident",
            "collision",
            "crash",
            "signal failure",
            "traffic signal",
            "road block",
            "roadblock",
            "diversion",
            "metro delay",
            "metro",
            "illegal parking",
        ],
    ),
    (
        EventType::InfrastructureIssue,
        &[
            "pothole",
            "sinkhole",
            "cave-in",
            "caved in",
            "streetlight",
            "street light",
            "pipe burst",
            "pipeline burst",
            "sewage",
            "drain",
            "construction debris",
            "debris",
        ],
    ),
    (
        EventType::EnvironmentalHazard,
        &[
            "garbage",
            "waste",
            "dumping",
            "pollution",
            "noise",
            "smoke",
            "spill",
            "stench",
            "landslide",
        ],
    ),
    (
        EventType::PublicSafetyConcern,
        &[
            "fire",
            "blaze",
            "exposed wire",
            "live wire",
            "manhole",
            "crime",
            "theft",
            "robbery",
            "unsafe",
        ],
    ),
    (
        EventType::StructuralDamage,
        &[
            "crack",
            "cracked",
            "collapse",
            "collapsed",
            "bridge",
            "dilapidated",
            "structural",
        ],
    ),
    (
        EventType::UnusualActivity,
        &[
            "protest",
            "dharna",
            "rally",
            "gathering",
            "stray",
            "vandalism",
            "vandalised",
            "suspicious",
        ],
    ),
];

const HIGH_SEVERITY: &[&str] = &[
    "injured",
    "injury",
    "injuries",
    "killed",
    "dead",
    "death",
    "fatal",
    "collapse",
    "collapsed",
    "blaze",
    "gas leak",
    "explosion",
    "widespread",
    "entire",
    "severe",
    "massive",
    "major",
    "emergency",
    "evacuated",
    "evacuation",
    "stranded",
    "submerged",
];

const LOW_SEVERITY: &[&str] = &[
    "minor",
    "small",
    "slight",
    "brief",
    "briefly",
    "restored",
    "cleared",
    "resolved",
];

struct CategoryMatcher {
    event_type: EventType,
    pattern: Regex,
}

/// Whole-word, case-insensitive alternation with optional plural suffix.
fn keyword_pattern(keywords: &[&str]) -> Regex {
    let alternation = keywords
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    // Keywords are escaped literals, so the pattern is always valid.
    Regex::new(&format!(r"(?i)\b(?:{alternation})(?:s|es)?\b")).expect("valid keyword regex")
}

fn category_matchers() -> &'static [CategoryMatcher] {
    static MATCHERS: OnceLock<Vec<CategoryMatcher>> = OnceLock::new();
    MATCHERS.get_or_init(|| {
        CATEGORY_KEYWORDS
            .iter()
            .map(|(event_type, keywords)| CategoryMatcher {
                event_type: *event_type,
                pattern: keyword_pattern(keywords),
            })
            .collect()
    })
}

fn severity_patterns() -> &'static (Regex, Regex) {
    static PATTERNS: OnceLock<(Regex, Regex)> = OnceLock::new();
    PATTERNS.get_or_init(|| (keyword_pattern(HIGH_SEVERITY), keyword_pattern(LOW_SEVERITY)))
}

/// Number of distinct keywords of a category present in `text`.
fn hits(pattern: &Regex, text: &str) -> usize {
    pattern
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect::<HashSet<_>>()
        .len()
}

/// Classify free text into a category. The category with the most distinct
/// keyword hits wins; ties go to the earlier category in priority order.
/// `None` when no keyword matches.
pub fn classify(text: &str) -> Option<EventType> {
    let mut best: Option<(EventType, usize)> = None;
    for matcher in category_matchers() {
        let count = hits(&matcher.pattern, text);
        if count > 0 && best.map_or(true, |(_, top)| count > top) {
            best = Some((matcher.event_type, count));
        }
    }
    best.map(|(event_type, _)| event_type)
}

/// Severity from danger and scale signals. High wins over Low; neither is Medium.
pub fn assess_severity(text: &str) -> Severity {
    let (high, low) = severity_patterns();
    if high.is_match(text) {
        Severity::High
    } else if low.is_match(text) {
        Severity::Low
    } else {
        Severity::Medium
    }
}
