//! Archetype decision table and supporting rules.
//!
//! Archetypes are detected by an ordered list of `(predicate, archetype)`
//! pairs evaluated in order — the first matching rule wins, even when later
//! rules would also match. The table shape keeps each rule independently
//! testable.

use serde::{Deserialize, Serialize};

use crate::mastery::MasteryMap;
use crate::patterns::StudyPatternSnapshot;
use crate::threat::{ExamThreatSnapshot, ThreatLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Archetype {
    #[serde(rename = "Last-Minute Sprinter")]
    LastMinuteSprinter,
    #[serde(rename = "Avoidant Crammer")]
    AvoidantCrammer,
    #[serde(rename = "Consistent Grinder")]
    ConsistentGrinder,
    #[serde(rename = "Momentum Builder")]
    MomentumBuilder,
    #[serde(rename = "Drift Cycler")]
    DriftCycler,
}

impl Archetype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Archetype::LastMinuteSprinter => "Last-Minute Sprinter",
            Archetype::AvoidantCrammer => "Avoidant Crammer",
            Archetype::ConsistentGrinder => "Consistent Grinder",
            Archetype::MomentumBuilder => "Momentum Builder",
            Archetype::DriftCycler => "Drift Cycler",
        }
    }
}

/// Everything an archetype predicate may look at.
pub struct RuleInputs<'a> {
    pub patterns: &'a StudyPatternSnapshot,
    pub threats: &'a [ExamThreatSnapshot],
    pub avg_mastery: f64,
}

pub struct ArchetypeRule {
    pub archetype: Archetype,
    pub matches: fn(&RuleInputs) -> bool,
}

fn is_last_minute_sprinter(input: &RuleInputs) -> bool {
    input
        .threats
        .iter()
        .any(|t| t.threat_level == ThreatLevel::Critical)
        && input.avg_mastery < 60.0
}

fn is_avoidant_crammer(input: &RuleInputs) -> bool {
    input.threats.iter().any(|t| t.days_remaining < 7)
        && input.patterns.procrastination_triggers.len() > 3
        && input.avg_mastery < 50.0
}

fn is_consistent_grinder(input: &RuleInputs) -> bool {
    input.patterns.consistency_score > 75 && input.patterns.drift_windows.len() <= 1
}

fn is_momentum_builder(input: &RuleInputs) -> bool {
    input.patterns.consistency_score > 55
        && input.patterns.consistency_score < 75
        && input.patterns.average_session_minutes > 30
}

fn always(_: &RuleInputs) -> bool {
    true
}

/// The decision table, in priority order. The final rule is the catch-all.
pub const ARCHETYPE_RULES: &[ArchetypeRule] = &[
    ArchetypeRule {
        archetype: Archetype::LastMinuteSprinter,
        matches: is_last_minute_sprinter,
    },
    ArchetypeRule {
        archetype: Archetype::AvoidantCrammer,
        matches: is_avoidant_crammer,
    },
    ArchetypeRule {
        archetype: Archetype::ConsistentGrinder,
        matches: is_consistent_grinder,
    },
    ArchetypeRule {
        archetype: Archetype::MomentumBuilder,
        matches: is_momentum_builder,
    },
    ArchetypeRule {
        archetype: Archetype::DriftCycler,
        matches: always,
    },
];

/// Walk the table; first match wins.
pub fn detect_archetype(
    patterns: &StudyPatternSnapshot,
    mastery: &MasteryMap,
    threats: &[ExamThreatSnapshot],
) -> Archetype {
    let input = RuleInputs {
        patterns,
        threats,
        avg_mastery: mastery.average(),
    };
    ARCHETYPE_RULES
        .iter()
        .find(|rule| (rule.matches)(&input))
        .map(|rule| rule.archetype)
        .unwrap_or(Archetype::DriftCycler)
}

/// Up to 3 behavioral drivers, in priority order: best peak window, best
/// subject, session-length note. Generic placeholders when nothing qualifies.
pub fn extract_drivers(patterns: &StudyPatternSnapshot) -> Vec<String> {
    let mut drivers = Vec::new();

    if let Some(window) = patterns.peak_study_windows.first() {
        drivers.push(window.description.clone());
    }
    if let Some(best) = patterns.best_subjects.first() {
        drivers.push(format!("Strong performance in {best}"));
    }
    if patterns.consistency_score > 60 {
        drivers.push(format!(
            "{}-minute average sessions",
            patterns.average_session_minutes
        ));
    }

    if drivers.is_empty() {
        drivers.push("Building study foundation".to_string());
        drivers.push("Exploring effective routines".to_string());
    }

    drivers.truncate(3);
    drivers
}

/// Risk tag: red zone trumps at-risk trumps safe.
pub fn assign_risk_tag(
    threats: &[ExamThreatSnapshot],
    mastery: &MasteryMap,
    patterns: &StudyPatternSnapshot,
) -> super::RiskTag {
    let any_critical = threats
        .iter()
        .any(|t| t.threat_level == ThreatLevel::Critical);
    let any_high = threats.iter().any(|t| t.threat_level == ThreatLevel::High);

    if any_critical && mastery.average() < 60.0 {
        super::RiskTag::RedZoneBeforeExam
    } else if any_high || patterns.consistency_score < 40 {
        super::RiskTag::AtRisk
    } else {
        super::RiskTag::Safe
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
