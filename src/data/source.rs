//! Probability sources for the recommendation engine

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::SourceError;
use crate::models::{BoatProbability, NUM_BOATS};

/// Warning attached to results computed from the uniform fallback
pub const UNIFORM_FALLBACK_WARNING: &str =
    "ML model unavailable, using uniform probability distribution";

/// Supplies the per-boat probability table for a race
pub trait ProbabilitySource {
    fn fetch_boat_probabilities(&self, race_id: u64) -> Result<Vec<BoatProbability>, SourceError>;
}

/// Prediction file written by the model pipeline
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PredictionFile {
    race_id: Option<u64>,
    model_version: Option<String>,
    predictions: Vec<BoatProbability>,
}

/// Reads `race_<id>.json` files from a directory
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    dir: PathBuf,
}

impl JsonFileSource {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, race_id: u64) -> PathBuf {
        self.dir.join(format!("race_{}.json", race_id))
    }

    /// List race ids with a prediction file, ascending
    pub fn list_races(&self) -> Result<Vec<u64>, SourceError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| SourceError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut ids: Vec<u64> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| parse_race_filename(&e.file_name().to_string_lossy()))
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

/// Parse "race_<id>.json" into the race id
fn parse_race_filename(name: &str) -> Option<u64> {
    name.strip_prefix("race_")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

/// Load a prediction file (wrapped object or bare array)
///
/// Returns the race id recorded in the file, if any, and the boats.
pub fn load_prediction_file<P: AsRef<Path>>(
    path: P,
) -> Result<(Option<u64>, Vec<BoatProbability>), SourceError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let parse_error = |source: serde_json::Error| SourceError::Parse {
        path: path.to_path_buf(),
        source,
    };

    // A bare array of boats, or the wrapped object
    if content.trim_start().starts_with('[') {
        let predictions: Vec<BoatProbability> =
            serde_json::from_str(&content).map_err(parse_error)?;
        return Ok((None, predictions));
    }

    let file: PredictionFile = serde_json::from_str(&content).map_err(parse_error)?;
    if let Some(ref version) = file.model_version {
        debug!(?path, %version, "Loaded predictions");
    }
    Ok((file.race_id, file.predictions))
}

impl ProbabilitySource for JsonFileSource {
    fn fetch_boat_probabilities(&self, race_id: u64) -> Result<Vec<BoatProbability>, SourceError> {
        let path = self.path_for(race_id);

        let (file_race_id, predictions) = match load_prediction_file(&path) {
            Ok(loaded) => loaded,
            Err(SourceError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                return Err(SourceError::NotFound(race_id))
            }
            Err(e) => return Err(e),
        };

        if file_race_id.is_some_and(|id| id != race_id) {
            warn!(
                "Prediction file {:?} is labelled race {:?}, expected {}",
                path, file_race_id, race_id
            );
        }

        if predictions.is_empty() {
            return Err(SourceError::Empty(race_id));
        }
        Ok(predictions)
    }
}

/// In-memory source keyed by race id
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    races: HashMap<u64, Vec<BoatProbability>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, race_id: u64, boats: Vec<BoatProbability>) {
        self.races.insert(race_id, boats);
    }
}

impl ProbabilitySource for InMemorySource {
    fn fetch_boat_probabilities(&self, race_id: u64) -> Result<Vec<BoatProbability>, SourceError> {
        match self.races.get(&race_id) {
            Some(boats) if boats.is_empty() => Err(SourceError::Empty(race_id)),
            Some(boats) => Ok(boats.clone()),
            None => Err(SourceError::NotFound(race_id)),
        }
    }
}

/// Uniform table for boats 1-6
pub fn uniform_field() -> Vec<BoatProbability> {
    (1..=NUM_BOATS as u8).map(BoatProbability::uniform).collect()
}

/// Probabilities for a race, possibly from the uniform fallback
#[derive(Debug, Clone)]
pub struct FetchedProbabilities {
    pub boats: Vec<BoatProbability>,
    /// Set when the uniform fallback was used
    pub warning: Option<String>,
    /// Source error that triggered the fallback
    pub error: Option<String>,
}

impl FetchedProbabilities {
    pub fn is_fallback(&self) -> bool {
        self.warning.is_some()
    }
}

/// Fetch probabilities, falling back to a uniform distribution on any source error
pub fn fetch_or_uniform<S: ProbabilitySource + ?Sized>(
    source: &S,
    race_id: u64,
) -> FetchedProbabilities {
    match source.fetch_boat_probabilities(race_id) {
        Ok(boats) => FetchedProbabilities {
            boats,
            warning: None,
            error: None,
        },
        Err(e) => {
            warn!(
                "Failed to fetch probabilities for race {}: {}. Using uniform distribution.",
                race_id, e
            );
            FetchedProbabilities {
                boats: uniform_field(),
                warning: Some(UNIFORM_FALLBACK_WARNING.to_string()),
                error: Some(e.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

    /// Scratch directory under the system temp dir, removed on drop
    struct ScratchDir(PathBuf);

    impl ScratchDir {
        fn join(&self, name: &str) -> PathBuf {
            self.0.join(name)
        }
    }

    impl AsRef<Path> for ScratchDir {
        fn as_ref(&self) -> &Path {
            &self.0
        }
    }

    impl Drop for ScratchDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    fn scratch_dir() -> ScratchDir {
        let n = DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!(
            "boatrace-source-test-{}-{}",
            std::process::id(),
            n
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        ScratchDir(dir)
    }

    #[test]
    fn test_json_source_wrapped_file() {
        let dir = scratch_dir();
        fs::write(
            dir.join("race_101.json"),
            r#"{"raceId": 101, "modelVersion": "v2", "predictions": [
                {"boatNumber": 1, "winProb": 0.5, "secondProb": 0.2},
                {"boatNumber": 2, "winProb": 0.3, "secondProb": "n/a"}
            ]}"#,
        )
        .unwrap();

        let source = JsonFileSource::new(&dir);
        let boats = source.fetch_boat_probabilities(101).unwrap();

        assert_eq!(boats.len(), 2);
        assert_eq!(boats[0].win_prob, 0.5);
        assert_eq!(boats[1].second_prob, 0.0);
    }

    #[test]
    fn test_json_source_bare_array() {
        let dir = scratch_dir();
        fs::write(
            dir.join("race_7.json"),
            r#"[{"boatNumber": 4, "winProb": 0.25}]"#,
        )
        .unwrap();

        let boats = JsonFileSource::new(&dir).fetch_boat_probabilities(7).unwrap();
        assert_eq!(boats.len(), 1);
        assert_eq!(boats[0].boat_number, 4);
    }

    #[test]
    fn test_json_source_errors() {
        let dir = scratch_dir();
        fs::write(dir.join("race_2.json"), "{not json").unwrap();
        fs::write(dir.join("race_3.json"), r#"{"predictions": []}"#).unwrap();

        let source = JsonFileSource::new(&dir);
        assert!(matches!(
            source.fetch_boat_probabilities(1),
            Err(SourceError::NotFound(1))
        ));
        assert!(matches!(
            source.fetch_boat_probabilities(2),
            Err(SourceError::Parse { .. })
        ));
        assert!(matches!(
            source.fetch_boat_probabilities(3),
            Err(SourceError::Empty(3))
        ));
    }

    #[test]
    fn test_invalid_boat_entry_drops_only_that_boat() {
        let dir = scratch_dir();
        fs::write(
            dir.join("race_1.json"),
            r#"{"raceId": 1, "predictions": [
                {"boatNumber": 1, "winProb": 0.6, "secondProb": 0.2},
                {"boatNumber": 2, "winProb": 0.3, "secondProb": 0.4},
                {"winProb": 0.1},
                {"boatNumber": "3", "winProb": 0.05},
                {"boatNumber": 300, "winProb": 0.05}
            ]}"#,
        )
        .unwrap();

        let source = JsonFileSource::new(&dir);
        let fetched = fetch_or_uniform(&source, 1);
        assert!(!fetched.is_fallback());
        assert_eq!(fetched.boats.len(), 5);
        assert_eq!(fetched.boats[0].win_prob, 0.6);

        let set = crate::core::compute_recommendations(&fetched.boats);
        assert_eq!(set.tansho.len(), 2);
        assert_eq!(set.tansho[0].combination, "1");
        assert_eq!(set.nirentan.len(), 2);
    }

    #[test]
    fn test_parse_error_keeps_location() {
        let dir = scratch_dir();
        fs::write(
            dir.join("race_4.json"),
            "{\n  \"predictions\": [\n    {\"boatNumber\": 1,, }\n  ]\n}",
        )
        .unwrap();
        fs::write(dir.join("race_5.json"), "[{\"boatNumber\": 1}\n  oops]").unwrap();

        let source = JsonFileSource::new(&dir);
        for (race_id, line) in [(4, "line 3"), (5, "line 2")] {
            let err = source.fetch_boat_probabilities(race_id).unwrap_err();
            assert!(matches!(err, SourceError::Parse { .. }));
            let message = err.to_string();
            assert!(message.contains(line), "{}", message);
            assert!(!message.contains("did not match any variant"), "{}", message);
        }
    }

    #[test]
    fn test_scratch_dir_removed_on_drop() {
        let dir = scratch_dir();
        let path = dir.0.clone();
        fs::write(dir.join("race_1.json"), "[]").unwrap();
        assert!(path.exists());

        drop(dir);
        assert!(!path.exists());
    }

    #[test]
    fn test_load_prediction_file_reports_race_id() {
        let dir = scratch_dir();
        let path = dir.join("input.json");
        fs::write(
            &path,
            r#"{"raceId": 55, "predictions": [{"boatNumber": 2, "winProb": 0.4}]}"#,
        )
        .unwrap();

        let (race_id, boats) = load_prediction_file(&path).unwrap();
        assert_eq!(race_id, Some(55));
        assert_eq!(boats[0].boat_number, 2);

        assert!(matches!(
            load_prediction_file(dir.join("absent.json")),
            Err(SourceError::Io { .. })
        ));
    }

    #[test]
    fn test_list_races() {
        let dir = scratch_dir();
        for name in ["race_12.json", "race_3.json", "notes.txt", "race_x.json"] {
            fs::write(dir.join(name), "[]").unwrap();
        }

        let ids = JsonFileSource::new(&dir).list_races().unwrap();
        assert_eq!(ids, vec![3, 12]);
    }

    #[test]
    fn test_list_races_missing_dir() {
        let dir = scratch_dir();
        let source = JsonFileSource::new(dir.join("missing"));
        assert!(matches!(source.list_races(), Err(SourceError::Io { .. })));
    }

    #[test]
    fn test_parse_race_filename() {
        assert_eq!(parse_race_filename("race_42.json"), Some(42));
        assert_eq!(parse_race_filename("race_.json"), None);
        assert_eq!(parse_race_filename("odds_42.json"), None);
    }

    #[test]
    fn test_in_memory_source() {
        let mut source = InMemorySource::new();
        source.insert(1, uniform_field());
        source.insert(2, Vec::new());

        assert_eq!(source.fetch_boat_probabilities(1).unwrap().len(), 6);
        assert!(matches!(
            source.fetch_boat_probabilities(2),
            Err(SourceError::Empty(2))
        ));
        assert!(matches!(
            source.fetch_boat_probabilities(3),
            Err(SourceError::NotFound(3))
        ));
    }

    #[test]
    fn test_fetch_or_uniform_success() {
        let mut source = InMemorySource::new();
        let boats = vec![BoatProbability::from_ranks(1, [0.9, 0.1, 0.0, 0.0, 0.0, 0.0])];
        source.insert(5, boats.clone());

        let fetched = fetch_or_uniform(&source, 5);
        assert!(!fetched.is_fallback());
        assert_eq!(fetched.boats, boats);
        assert!(fetched.error.is_none());
    }

    #[test]
    fn test_fetch_or_uniform_fallback() {
        let source = InMemorySource::new();
        let fetched = fetch_or_uniform(&source, 9);

        assert!(fetched.is_fallback());
        assert_eq!(fetched.warning.as_deref(), Some(UNIFORM_FALLBACK_WARNING));
        assert_eq!(fetched.error.as_deref(), Some("race 9 not found"));
        assert_eq!(fetched.boats.len(), 6);
        for boat in &fetched.boats {
            for p in boat.rank_probs() {
                assert!((p - 1.0 / 6.0).abs() < 1e-12);
            }
        }
    }
}
