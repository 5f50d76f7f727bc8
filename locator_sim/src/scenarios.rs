//! Simulation scenarios.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    /// Clean helix feed, baseline invariants
    Helix,

    /// More samples than trail capacity; ordering across the wrap seam
    Wraparound,

    /// Garbage payloads mixed into the feed
    Malformed,

    /// Long silent gap with the link reported down
    Dropout,

    /// Clear halfway through; origin re-derived from the next sample
    ClearMidstream,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Helix,
            ScenarioId::Wraparound,
            ScenarioId::Malformed,
            ScenarioId::Dropout,
            ScenarioId::ClearMidstream,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Helix => "helix",
            ScenarioId::Wraparound => "wraparound",
            ScenarioId::Malformed => "malformed",
            ScenarioId::Dropout => "dropout",
            ScenarioId::ClearMidstream => "clear_midstream",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Helix => "Clean 60 ms helix feed, trail/history/camera invariants every tick",
            ScenarioId::Wraparound => "Trail capacity 50, history 120: wrap seam ordering and FIFO eviction",
            ScenarioId::Malformed => "20% garbage payloads and 5% loss, rejects never touch the buffers",
            ScenarioId::Dropout => "Link down for the middle third, render keeps running on a still marker",
            ScenarioId::ClearMidstream => "Clear at the halfway mark, next sample becomes the new origin",
        }
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
            "helix" | "baseline" => Ok(ScenarioId::Helix),
            "wraparound" | "wrap" => Ok(ScenarioId::Wraparound),
            "malformed" | "garbage" => Ok(ScenarioId::Malformed),
            "dropout" => Ok(ScenarioId::Dropout),
            "clear_midstream" | "clear" => Ok(ScenarioId::ClearMidstream),
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
            assert_eq!(scenario.name().parse::<ScenarioId>().unwrap(), scenario);
            assert_eq!(scenario.to_string(), scenario.name());
        }
    }

    #[test]
    fn test_aliases_and_unknown() {
        assert_eq!("CLEAR".parse::<ScenarioId>().unwrap(), ScenarioId::ClearMidstream);
        assert!("split_brain".parse::<ScenarioId>().is_err());
    }
}
