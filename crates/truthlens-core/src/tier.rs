use serde::Serialize;

/// Presentation band for a trust score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Tier {
    /// Lowest score (inclusive) that lands in this band.
    pub min_score: u8,
    pub label: &'static str,
    pub description: &'static str,
    pub color: &'static str,
    pub gradient: [&'static str; 2],
}

/// Bands ordered from the highest threshold down.
pub static TIERS: [Tier; 6] = [
    Tier {
        min_score: 90,
        label: "Verified Fact",
        description: "Validated by trusted sources.",
        color: "#00C853",
        gradient: ["#00C853", "#69F0AE"],
    },
    Tier {
        min_score: 75,
        label: "Likely True",
        description: "Strong consensus found.",
        color: "#4CAF50",
        gradient: ["#4CAF50", "#81C784"],
    },
    Tier {
        min_score: 60,
        label: "Plausible",
        description: "Generally accurate.",
        color: "#2196F3",
        gradient: ["#2196F3", "#64B5F6"],
    },
    Tier {
        min_score: 40,
        label: "Disputed",
        description: "Conflict or outdated info.",
        color: "#FFC107",
        gradient: ["#FFC107", "#FFE082"],
    },
    Tier {
        min_score: 10,
        label: "Misleading",
        description: "Contains false elements.",
        color: "#FF5722",
        gradient: ["#FF5722", "#FF8A65"],
    },
    Tier {
        min_score: 0,
        label: "Fabricated (Fake)",
        description: "Contradicts facts or no evidence.",
        color: "#D32F2F",
        gradient: ["#D32F2F", "#EF5350"],
    },
];

/// Look up the band for a score.
pub fn tier_for(score: u8) -> &'static Tier {
    TIERS
        .iter()
        .find(|tier| score >= tier.min_score)
        .unwrap_or(&TIERS[TIERS.len() - 1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_edges() {
        assert_eq!(tier_for(100).label, "Verified Fact");
        assert_eq!(tier_for(90).label, "Verified Fact");
        assert_eq!(tier_for(89).label, "Likely True");
        assert_eq!(tier_for(75).label, "Likely True");
        assert_eq!(tier_for(74).label, "Plausible");
        assert_eq!(tier_for(60).label, "Plausible");
        assert_eq!(tier_for(59).label, "Disputed");
        assert_eq!(tier_for(50).label, "Disputed");
        assert_eq!(tier_for(40).label, "Disputed");
        assert_eq!(tier_for(39).label, "Misleading");
        assert_eq!(tier_for(10).label, "Misleading");
        assert_eq!(tier_for(9).label, "Fabricated (Fake)");
        assert_eq!(tier_for(0).label, "Fabricated (Fake)");
    }

    #[test]
    fn thresholds_descend() {
        assert!(TIERS.windows(2).all(|w| w[0].min_score > w[1].min_score));
        assert_eq!(TIERS[TIERS.len() - 1].min_score, 0);
    }
}
