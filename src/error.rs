use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::models::{BoatProbability, NUM_BOATS};

/// Errors from a probability source
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("race {0} not found")]
    NotFound(u64),

    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no predictions for race {0}")]
    Empty(u64),
}

/// Problems with the shape of a probability table.
///
/// The engine tolerates all of these; they are only raised by the
/// `validate_*` functions for callers that want strict input.
#[derive(Debug, Error, PartialEq)]
pub enum InputShapeError {
    #[error("Exactly 6 boats required, got {0}")]
    WrongCount(usize),

    #[error("Boat number {0} appears more than once")]
    DuplicateBoat(u8),

    #[error("Boat number must be between 1 and 6, got {0}")]
    BoatOutOfRange(u8),

    #[error("Probability must be between 0 and 1, got {value} (boat {boat_number})")]
    ProbabilityOutOfRange { boat_number: u8, value: f64 },
}

/// Validation functions
pub fn validate_boat_number(boat_number: u8) -> Result<(), InputShapeError> {
    if !(1..=NUM_BOATS as u8).contains(&boat_number) {
        return Err(InputShapeError::BoatOutOfRange(boat_number));
    }
    Ok(())
}

pub fn validate_probability(boat_number: u8, value: f64) -> Result<(), InputShapeError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(InputShapeError::ProbabilityOutOfRange { boat_number, value });
    }
    Ok(())
}

/// Check for exactly one entry per boat 1-6 with every probability in [0, 1]
pub fn validate_boat_set(boats: &[BoatProbability]) -> Result<(), InputShapeError> {
    let mut seen = [false; NUM_BOATS];

    for boat in boats {
        validate_boat_number(boat.boat_number)?;

        let idx = (boat.boat_number - 1) as usize;
        if seen[idx] {
            return Err(InputShapeError::DuplicateBoat(boat.boat_number));
        }
        seen[idx] = true;

        for value in boat.rank_probs() {
            validate_probability(boat.boat_number, value)?;
        }
    }

    if boats.len() != NUM_BOATS {
        return Err(InputShapeError::WrongCount(boats.len()));
    }
    Ok(())
}
