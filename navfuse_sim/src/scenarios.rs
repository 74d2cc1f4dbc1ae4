//! Survey scenarios for deterministic fusion tests.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// NAV-001: Clean lawn-mower survey, recorded then fused
    SteadySurvey,

    /// NAV-002: Survey across UTC midnight with a sticky GNSS date
    MidnightCrossing,

    /// NAV-003: A share of raw records is garbage
    CorruptRecords,

    /// NAV-004: Operator removes a time range after it was fused
    BulkRemove,

    /// NAV-005: Track change in the middle of the survey
    TrackChange,

    /// NAV-006: Recorder, overseer and queries running concurrently
    LiveIngest,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::SteadySurvey,
            ScenarioId::MidnightCrossing,
            ScenarioId::CorruptRecords,
            ScenarioId::BulkRemove,
            ScenarioId::TrackChange,
            ScenarioId::LiveIngest,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::SteadySurvey => "steady_survey",
            ScenarioId::MidnightCrossing => "midnight_crossing",
            ScenarioId::CorruptRecords => "corrupt_records",
            ScenarioId::BulkRemove => "bulk_remove",
            ScenarioId::TrackChange => "track_change",
            ScenarioId::LiveIngest => "live_ingest",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::SteadySurvey => "Lawn-mower survey with GNSS noise and recorder drift, fused after recording",
            ScenarioId::MidnightCrossing => "Survey through 00:00 UTC while GNSS keeps reporting yesterday's date",
            ScenarioId::CorruptRecords => "10% of raw records are garbage; fusion must skip them",
            ScenarioId::BulkRemove => "30 s removed by the operator after fusion; queries inside report Removed",
            ScenarioId::TrackChange => "New track started mid-survey; old history is dropped",
            ScenarioId::LiveIngest => "Writer, overseer and query tasks share one engine while recording",
        }
    }

    /// Returns true if the scenario runs on the tokio runtime.
    pub fn is_async(&self) -> bool {
        matches!(self, ScenarioId::LiveIngest)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "steady_survey" | "steady" | "nav-001" => Ok(ScenarioId::SteadySurvey),
            "midnight_crossing" | "midnight" | "nav-002" => Ok(ScenarioId::MidnightCrossing),
            "corrupt_records" | "corrupt" | "nav-003" => Ok(ScenarioId::CorruptRecords),
            "bulk_remove" | "remove" | "nav-004" => Ok(ScenarioId::BulkRemove),
            "track_change" | "nav-005" => Ok(ScenarioId::TrackChange),
            "live_ingest" | "live" | "nav-006" => Ok(ScenarioId::LiveIngest),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_back() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
        }
        assert_eq!("NAV-004".parse::<ScenarioId>(), Ok(ScenarioId::BulkRemove));
        assert!("time_warp".parse::<ScenarioId>().is_err());
    }
}
