//! JSON files for datasets and empirical fixation distributions.

use addm_core::{Dataset, DdmError, Result};
use addm_sampler::{EmpiricalDistributions, SimulatedTrial};
use serde::de::DeserializeOwned;
use std::path::Path;

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| DdmError::data_load(format!("reading {what} from {}", path.display()), e))?;
    serde_json::from_str(&json)
        .map_err(|e| DdmError::data_load(format!("parsing {what} in {}", path.display()), e))
}

/// Loads a subject -> trials dataset. An empty dataset is an error.
pub fn load_dataset(path: &Path) -> Result<Dataset> {
    let dataset: Dataset = read_json(path, "dataset")?;
    if dataset.is_empty() {
        return Err(DdmError::data_load(
            format!("loading dataset from {}", path.display()),
            "file contains no trials",
        ));
    }
    Ok(dataset)
}

pub fn save_dataset(dataset: &Dataset, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(dataset)
        .map_err(|e| DdmError::data_load("serializing dataset", e))?;
    std::fs::write(path, json)
        .map_err(|e| DdmError::data_load(format!("writing dataset to {}", path.display()), e))
}

pub fn load_distributions(path: &Path) -> Result<EmpiricalDistributions> {
    read_json(path, "fixation distributions")
}

pub fn dataset_from_simulated(subject: &str, trials: &[SimulatedTrial]) -> Dataset {
    Dataset::single_subject(subject, trials.iter().map(|s| s.trial.clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use addm_core::{Choice, Fixation, FixationItem, Trial};

    #[test]
    fn test_dataset_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let trial = Trial::new(1200, Choice::Left, 3.0, 1.0).with_fixations(vec![
            Fixation::new(FixationItem::Latency, 200),
            Fixation::new(FixationItem::Left, 1000),
        ]);
        let dataset = Dataset::single_subject("cai", vec![trial]);

        save_dataset(&dataset, &path).unwrap();
        assert_eq!(load_dataset(&path).unwrap(), dataset);
    }

    #[test]
    fn test_missing_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(load_dataset(&missing), Err(DdmError::DataLoadFailure { .. })));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{\"subjects\": 3}").unwrap();
        assert!(matches!(load_dataset(&bad), Err(DdmError::DataLoadFailure { .. })));

        let empty = dir.path().join("empty.json");
        std::fs::write(&empty, "{\"subjects\": {}}").unwrap();
        assert!(matches!(load_dataset(&empty), Err(DdmError::DataLoadFailure { .. })));
    }

    #[test]
    fn test_distributions_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dists.json");
        std::fs::write(
            &path,
            r#"{"prob_left_fix_first": 0.7, "latencies": [180, 220], "transitions": [40], "fixations": [300, 450, 600]}"#,
        )
        .unwrap();
        let dists = load_distributions(&path).unwrap();
        assert_eq!(dists.prob_left_fix_first, 0.7);
        assert_eq!(dists.fixations, vec![300, 450, 600]);
    }
}
