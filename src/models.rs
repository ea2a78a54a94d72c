use serde::{Deserialize, Deserializer, Serialize};

/// Number of boats in a full race
pub const NUM_BOATS: usize = 6;

/// Finishing-position probabilities for one boat, as produced by the prediction model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoatProbability {
    /// 0 when missing or not a boat number; such entries never take part
    #[serde(default, deserialize_with = "lenient_boat_number")]
    pub boat_number: u8,
    #[serde(default, deserialize_with = "lenient_prob")]
    pub win_prob: f64,
    #[serde(default, deserialize_with = "lenient_prob")]
    pub second_prob: f64,
    #[serde(default, deserialize_with = "lenient_prob")]
    pub third_prob: f64,
    #[serde(default, deserialize_with = "lenient_prob")]
    pub fourth_prob: f64,
    #[serde(default, deserialize_with = "lenient_prob")]
    pub fifth_prob: f64,
    #[serde(default, deserialize_with = "lenient_prob")]
    pub sixth_prob: f64,
}

impl BoatProbability {
    /// Build from P(1st), P(2nd), ..., P(6th)
    pub fn from_ranks(boat_number: u8, probs: [f64; 6]) -> Self {
        Self {
            boat_number,
            win_prob: probs[0],
            second_prob: probs[1],
            third_prob: probs[2],
            fourth_prob: probs[3],
            fifth_prob: probs[4],
            sixth_prob: probs[5],
        }
    }

    /// Uniform distribution (1/6 for every position)
    pub fn uniform(boat_number: u8) -> Self {
        Self::from_ranks(boat_number, [1.0 / NUM_BOATS as f64; 6])
    }

    pub fn rank_probs(&self) -> [f64; 6] {
        [
            self.win_prob,
            self.second_prob,
            self.third_prob,
            self.fourth_prob,
            self.fifth_prob,
            self.sixth_prob,
        ]
    }
}

/// Accepts any JSON value; anything that is not a number becomes 0.0
fn lenient_prob<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_f64().unwrap_or(0.0))
}

/// Accepts any JSON value; anything that is not a whole number in u8 range becomes 0
fn lenient_boat_number<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let number = match value.as_u64() {
        Some(n) => Some(n),
        None => value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= 0.0)
            .map(|f| f as u64),
    };
    Ok(number.and_then(|n| u8::try_from(n).ok()).unwrap_or(0))
}

/// Coarse display classification of a candidate's probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl ConfidenceTier {
    /// Label used in terminal output
    pub fn label(&self) -> &'static str {
        match self {
            ConfidenceTier::High => "高",
            ConfidenceTier::Medium => "中",
            ConfidenceTier::Low => "低",
        }
    }
}

/// Wager types, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WagerType {
    /// 単勝: pick the winner
    Tansho,
    /// 2連単: 1st and 2nd in order
    Nirentan,
    /// 2連複: 1st and 2nd in any order
    Nirenpuku,
    /// 3連単: 1st, 2nd and 3rd in order
    Sanrentan,
    /// 3連複: 1st, 2nd and 3rd in any order
    Sanrenpuku,
}

impl WagerType {
    pub const ALL: [WagerType; 5] = [
        WagerType::Tansho,
        WagerType::Nirentan,
        WagerType::Nirenpuku,
        WagerType::Sanrentan,
        WagerType::Sanrenpuku,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            WagerType::Tansho => "単勝",
            WagerType::Nirentan => "2連単",
            WagerType::Nirenpuku => "2連複",
            WagerType::Sanrentan => "3連単",
            WagerType::Sanrenpuku => "3連複",
        }
    }

    /// Number of boats in one combination
    pub fn arity(&self) -> usize {
        match self {
            WagerType::Tansho => 1,
            WagerType::Nirentan | WagerType::Nirenpuku => 2,
            WagerType::Sanrentan | WagerType::Sanrenpuku => 3,
        }
    }

    /// Whether the finishing order matters
    pub fn is_ordered(&self) -> bool {
        !matches!(self, WagerType::Nirenpuku | WagerType::Sanrenpuku)
    }

    /// Separator between boat numbers in the combination string
    pub fn separator(&self) -> &'static str {
        if self.is_ordered() {
            "-"
        } else {
            "="
        }
    }

    /// (high, medium) thresholds, both strict lower bounds
    pub fn thresholds(&self) -> (f64, f64) {
        match self {
            WagerType::Tansho => (0.4, 0.3),
            WagerType::Nirentan => (0.12, 0.08),
            WagerType::Nirenpuku => (0.15, 0.10),
            WagerType::Sanrentan => (0.05, 0.02),
            WagerType::Sanrenpuku => (0.08, 0.04),
        }
    }

    /// Maximum number of candidates returned (None = all)
    pub fn max_candidates(&self) -> Option<usize> {
        match self {
            WagerType::Tansho => None,
            _ => Some(10),
        }
    }

    pub fn classify(&self, probability: f64) -> ConfidenceTier {
        let (high, medium) = self.thresholds();
        if probability > high {
            ConfidenceTier::High
        } else if probability > medium {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }

    /// Format boat numbers as a combination string, e.g. "1-2-3" or "2=5"
    pub fn format_combination(&self, boats: &[u8]) -> String {
        boats
            .iter()
            .map(|b| b.to_string())
            .collect::<Vec<_>>()
            .join(self.separator())
    }
}

/// One recommended bet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetCandidate {
    pub combination: String,
    pub probability: f64,
    pub confidence: ConfidenceTier,
}

/// Ranked candidates for every wager type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSet {
    pub tansho: Vec<BetCandidate>,
    pub nirentan: Vec<BetCandidate>,
    pub nirenpuku: Vec<BetCandidate>,
    pub sanrentan: Vec<BetCandidate>,
    pub sanrenpuku: Vec<BetCandidate>,
}

impl RecommendationSet {
    pub fn get(&self, wager_type: WagerType) -> &[BetCandidate] {
        match wager_type {
            WagerType::Tansho => &self.tansho,
            WagerType::Nirentan => &self.nirentan,
            WagerType::Nirenpuku => &self.nirenpuku,
            WagerType::Sanrentan => &self.sanrentan,
            WagerType::Sanrenpuku => &self.sanrenpuku,
        }
    }

    /// Iterate (wager type, candidates) in display order
    pub fn iter(&self) -> impl Iterator<Item = (WagerType, &[BetCandidate])> + '_ {
        WagerType::ALL.into_iter().map(move |t| (t, self.get(t)))
    }
}

/// Row of the flat cross-wager-type view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatRecommendation {
    #[serde(rename = "type")]
    pub wager_type: WagerType,
    pub bet: String,
    pub probability: f64,
    pub confidence: ConfidenceTier,
}

/// Document printed by the CLI in JSON mode
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub race_id: Option<u64>,
    pub predictions: Vec<BoatProbability>,
    pub recommendations: RecommendationSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flat: Option<Vec<FlatRecommendation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
