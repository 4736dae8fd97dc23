use crate::error::{DdmError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Observed choice. Left is absorbed at the upper barrier, right at the lower.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Choice {
    Left,
    Right,
}

impl Choice {
    pub fn code(self) -> i8 {
        match self {
            Choice::Left => -1,
            Choice::Right => 1,
        }
    }

    pub fn is_upper(self) -> bool {
        matches!(self, Choice::Left)
    }
}

impl From<Choice> for i8 {
    fn from(choice: Choice) -> Self {
        choice.code()
    }
}

impl TryFrom<i8> for Choice {
    type Error = DdmError;

    fn try_from(code: i8) -> Result<Self> {
        match code {
            -1 => Ok(Choice::Left),
            1 => Ok(Choice::Right),
            other => Err(DdmError::InvalidTrial(format!("choice must be -1 or +1, got {other}"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixationItem {
    /// Before the first fixation lands.
    Latency,
    /// Saccade between two fixations.
    Transition,
    Left,
    Right,
}

impl FixationItem {
    pub fn as_str(self) -> &'static str {
        match self {
            FixationItem::Latency => "latency",
            FixationItem::Transition => "transition",
            FixationItem::Left => "left",
            FixationItem::Right => "right",
        }
    }

    pub fn other(self) -> Self {
        match self {
            FixationItem::Left => FixationItem::Right,
            FixationItem::Right => FixationItem::Left,
            item => item,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fixation {
    pub item: FixationItem,
    /// Duration in milliseconds.
    pub duration: u32,
}

impl Fixation {
    pub fn new(item: FixationItem, duration: u32) -> Self {
        Self { item, duration }
    }
}

/// A single observed (or synthetic) choice with its reaction time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    /// Reaction time in milliseconds.
    pub rt: u32,
    pub choice: Choice,
    pub value_left: f64,
    pub value_right: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fixations: Vec<Fixation>,
}

impl Trial {
    pub fn new(rt: u32, choice: Choice, value_left: f64, value_right: f64) -> Self {
        Self {
            rt,
            choice,
            value_left,
            value_right,
            fixations: Vec::new(),
        }
    }

    pub fn with_fixations(mut self, fixations: Vec<Fixation>) -> Self {
        self.fixations = fixations;
        self
    }

    /// Number of whole time steps the trial spans.
    pub fn max_time(&self, time_step_ms: u32) -> Result<usize> {
        if time_step_ms == 0 {
            return Err(DdmError::InvalidParameter("time step must be positive".into()));
        }
        let steps = (self.rt / time_step_ms) as usize;
        if steps < 1 {
            return Err(DdmError::InvalidTrial(format!(
                "reaction time {}ms is shorter than one {}ms time step",
                self.rt, time_step_ms
            )));
        }
        Ok(steps)
    }
}

/// Trials grouped by subject, in presentation order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub subjects: BTreeMap<String, Vec<Trial>>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single_subject(subject: impl Into<String>, trials: Vec<Trial>) -> Self {
        let mut subjects = BTreeMap::new();
        subjects.insert(subject.into(), trials);
        Self { subjects }
    }

    pub fn n_trials(&self) -> usize {
        self.subjects.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.n_trials() == 0
    }

    /// All trials, subject by subject.
    pub fn trials(&self) -> impl Iterator<Item = &Trial> {
        self.subjects.values().flatten()
    }
}
