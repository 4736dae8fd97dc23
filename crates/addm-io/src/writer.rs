use addm_core::ModelParameters;
use addm_sampler::SimulatedTrial;
use arrow::array::{Array, Float64Array, Int8Array, StringArray, UInt32Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Everything needed to regenerate a simulated run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub timestamp: String,
    pub seed: u64,
    pub variant: String, // "ddm" | "addm"
    pub params: ModelParameters,
    pub time_step_ms: u32,
    pub n_trials: usize,
    pub crate_version: String,
    pub commit_hash: Option<String>,
}

impl RunManifest {
    pub fn new(seed: u64, params: ModelParameters, time_step_ms: u32) -> Self {
        let variant = if params.is_attentional() { "addm" } else { "ddm" };
        Self {
            run_id: Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            seed,
            variant: variant.to_string(),
            params,
            time_step_ms,
            n_trials: 0, // set when writing
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            commit_hash: git_commit(),
        }
    }

    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// One fixation event of one trial. DDM trials carry a single row with no
/// fixation columns.
#[derive(Clone, Debug)]
struct EventRow<'a> {
    trial_id: u64,
    trial: &'a SimulatedTrial,
    fix_item: Option<&'static str>,
    fix_time_ms: Option<u32>,
    fix_rdv: Option<f64>,
}

/// Parquet table of simulated trials, one row per fixation event.
pub struct ParquetWriter {
    writer: ArrowWriter<File>,
    schema: Arc<Schema>,
    rows_written: usize,
}

impl ParquetWriter {
    pub fn new(path: &Path) -> anyhow::Result<Self> {
        let file = File::create(path)?;
        let schema = Arc::new(Schema::new(vec![
            Field::new("run_id", DataType::Utf8, false),
            Field::new("trial_id", DataType::UInt64, false),
            Field::new("choice", DataType::Int8, false),
            Field::new("rt_ms", DataType::UInt32, false),
            Field::new("value_left", DataType::Float64, false),
            Field::new("value_right", DataType::Float64, false),
            Field::new("fix_item", DataType::Utf8, true),
            Field::new("fix_time_ms", DataType::UInt32, true),
            Field::new("fix_rdv", DataType::Float64, true),
        ]));
        let writer = ArrowWriter::try_new(file, schema.clone(), None)?;
        Ok(Self {
            writer,
            schema,
            rows_written: 0,
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Appends `trials` numbered from `first_trial_id`.
    pub fn write_trials(
        &mut self,
        trials: &[SimulatedTrial],
        run_id: &str,
        first_trial_id: u64,
    ) -> anyhow::Result<()> {
        let mut rows = Vec::new();
        for (offset, trial) in trials.iter().enumerate() {
            let trial_id = first_trial_id + offset as u64;
            let fixations = &trial.trial.fixations;
            if fixations.is_empty() {
                rows.push(EventRow {
                    trial_id,
                    trial,
                    fix_item: None,
                    fix_time_ms: None,
                    fix_rdv: None,
                });
                continue;
            }
            for (fix, rdv) in fixations.iter().zip(&trial.fixation_rdv) {
                rows.push(EventRow {
                    trial_id,
                    trial,
                    fix_item: Some(fix.item.as_str()),
                    fix_time_ms: Some(fix.duration),
                    fix_rdv: Some(*rdv),
                });
            }
        }

        if rows.is_empty() {
            return Ok(());
        }

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(vec![run_id; rows.len()])),
            Arc::new(UInt64Array::from(rows.iter().map(|r| r.trial_id).collect::<Vec<_>>())),
            Arc::new(Int8Array::from(
                rows.iter().map(|r| r.trial.trial.choice.code()).collect::<Vec<_>>(),
            )),
            Arc::new(UInt32Array::from(rows.iter().map(|r| r.trial.trial.rt).collect::<Vec<_>>())),
            Arc::new(Float64Array::from(
                rows.iter().map(|r| r.trial.trial.value_left).collect::<Vec<_>>(),
            )),
            Arc::new(Float64Array::from(
                rows.iter().map(|r| r.trial.trial.value_right).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(rows.iter().map(|r| r.fix_item).collect::<Vec<_>>())),
            Arc::new(UInt32Array::from(rows.iter().map(|r| r.fix_time_ms).collect::<Vec<_>>())),
            Arc::new(Float64Array::from(rows.iter().map(|r| r.fix_rdv).collect::<Vec<_>>())),
        ];

        let batch = RecordBatch::try_new(self.schema.clone(), arrays)?;
        self.writer.write(&batch)?;
        self.rows_written += rows.len();
        Ok(())
    }

    pub fn close(self) -> anyhow::Result<()> {
        self.writer.close()?;
        Ok(())
    }
}

/// Writes the trial table and its manifest side by side.
pub fn write_simulation_with_manifest(
    trials: &[SimulatedTrial],
    manifest: &RunManifest,
    parquet_path: &Path,
    manifest_path: &Path,
) -> anyhow::Result<()> {
    let mut writer = ParquetWriter::new(parquet_path)?;
    writer.write_trials(trials, &manifest.run_id, 0)?;
    let rows = writer.rows_written();
    writer.close()?;

    let mut manifest = manifest.clone();
    manifest.n_trials = trials.len();
    manifest.save_to_file(manifest_path)?;

    println!("Wrote {} trials ({} rows) to {}", trials.len(), rows, parquet_path.display());
    println!("Wrote manifest to {}", manifest_path.display());
    Ok(())
}

fn git_commit() -> Option<String> {
    std::process::Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use addm_core::{Choice, Fixation, FixationItem, Trial};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    fn trials() -> Vec<SimulatedTrial> {
        vec![
            SimulatedTrial {
                trial: Trial::new(450, Choice::Right, 1.0, 2.0),
                fixation_rdv: Vec::new(),
                final_rdv: -1.02,
            },
            SimulatedTrial {
                trial: Trial::new(900, Choice::Left, 3.0, 0.0).with_fixations(vec![
                    Fixation::new(FixationItem::Latency, 200),
                    Fixation::new(FixationItem::Left, 500),
                    Fixation::new(FixationItem::Transition, 200),
                ]),
                fixation_rdv: vec![0.05, 0.7, 1.01],
                final_rdv: 1.01,
            },
        ]
    }

    #[test]
    fn test_one_row_per_fixation_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trials.parquet");
        let mut writer = ParquetWriter::new(&path).unwrap();
        writer.write_trials(&trials(), "run-1", 10).unwrap();
        assert_eq!(writer.rows_written(), 4);
        writer.close().unwrap();

        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&path).unwrap())
            .unwrap()
            .build()
            .unwrap();
        let batches: Vec<RecordBatch> = reader.collect::<Result<_, _>>().unwrap();
        let batch = &batches[0];
        assert_eq!(batch.num_rows(), 4);
        assert_eq!(batch.num_columns(), 9);

        let trial_ids = batch.column(1).as_any().downcast_ref::<UInt64Array>().unwrap();
        assert_eq!(trial_ids.values().to_vec(), vec![10, 11, 11, 11]);
        let choices = batch.column(2).as_any().downcast_ref::<Int8Array>().unwrap();
        assert_eq!(choices.value(0), 1);
        assert_eq!(choices.value(1), -1);

        let items = batch.column(6).as_any().downcast_ref::<StringArray>().unwrap();
        assert!(items.is_null(0));
        assert_eq!(items.value(2), "left");
        let rdv = batch.column(8).as_any().downcast_ref::<Float64Array>().unwrap();
        assert!(rdv.is_null(0));
        assert_eq!(rdv.value(3), 1.01);
    }

    #[test]
    fn test_manifest_written_alongside() {
        let dir = tempfile::tempdir().unwrap();
        let parquet_path = dir.path().join("run.parquet");
        let manifest_path = dir.path().join("run.manifest.json");
        let manifest = RunManifest::new(7, ModelParameters::addm(0.006, 0.5, 0.08), 10);

        write_simulation_with_manifest(&trials(), &manifest, &parquet_path, &manifest_path).unwrap();

        let loaded = RunManifest::load_from_file(&manifest_path).unwrap();
        assert_eq!(loaded.run_id, manifest.run_id);
        assert_eq!(loaded.variant, "addm");
        assert_eq!(loaded.n_trials, 2);
        assert_eq!(loaded.params, manifest.params);
        assert!(parquet_path.exists());
    }
}
