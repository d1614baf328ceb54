//! Interactive session controller.
//!
//! A [`Session`] turns one submission of the 14 feature values into a
//! prediction, records it in an append-only [`History`], optionally redraws
//! the history chart, and classifies the flood risk. Errors stop at this
//! boundary: they are kept for display and leave the history untouched.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::chart::render_history_chart;
use crate::error::Result;
use crate::predict::{predict_with, InferenceContext, Prediction};

/// Where the controller is in its submit cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    DisplayingResult,
    DisplayingError,
}

/// Flood risk band derived from the predicted percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    /// `> 70` is high, `> 40` is moderate, anything else is low.
    pub fn classify(flood_risk_pct: f64) -> Self {
        if flood_risk_pct > 70.0 {
            RiskLevel::High
        } else if flood_risk_pct > 40.0 {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }

    /// Banner text shown after a prediction
    pub fn message(&self) -> &'static str {
        match self {
            RiskLevel::High => "High Flood Risk! Immediate action advised.",
            RiskLevel::Moderate => "Moderate Flood Risk. Stay alert.",
            RiskLevel::Low => "Low Flood Risk. Conditions stable.",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RiskLevel::High => "high",
            RiskLevel::Moderate => "moderate",
            RiskLevel::Low => "low",
        };
        f.write_str(name)
    }
}

/// One successful prediction run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub run: usize,
    pub rainfall_mm: f64,
    pub flood_risk_pct: f64,
}

/// Append-only log of runs, numbered from 1
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    records: Vec<HistoryRecord>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a prediction under the next run number
    pub fn push(&mut self, prediction: &Prediction) -> HistoryRecord {
        let record = HistoryRecord {
            run: self.records.len() + 1,
            rainfall_mm: prediction.rainfall_mm,
            flood_risk_pct: prediction.flood_risk_pct,
        };
        self.records.push(record);
        record
    }

    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&HistoryRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl fmt::Display for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>5}  {:>12}  {:>14}", "Run", "Rainfall_mm", "FloodRisk_pct")?;
        for record in &self.records {
            writeln!(
                f,
                "{:>5}  {:>12.2}  {:>14.2}",
                record.run, record.rainfall_mm, record.flood_risk_pct
            )?;
        }
        Ok(())
    }
}

/// What a successful submission produced
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionOutcome {
    pub prediction: Prediction,
    pub run: usize,
    pub risk: RiskLevel,
    /// Chart file written for this run, if charting is enabled and succeeded
    pub chart: Option<PathBuf>,
}

/// Single-user prediction session
pub struct Session {
    context: Option<InferenceContext>,
    history: History,
    state: SessionState,
    chart_path: Option<PathBuf>,
    last_error: Option<String>,
}

impl Session {
    pub fn new(context: InferenceContext) -> Self {
        Session {
            context: Some(context),
            history: History::new(),
            state: SessionState::Idle,
            chart_path: None,
            last_error: None,
        }
    }

    /// A session with no model; every submission fails with `ModelNotLoaded`
    pub fn without_model() -> Self {
        Session {
            context: None,
            history: History::new(),
            state: SessionState::Idle,
            chart_path: None,
            last_error: None,
        }
    }

    /// Redraw the history chart at `path` after every successful run
    pub fn with_chart<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.chart_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn load_model(&mut self, context: InferenceContext) {
        self.context = Some(context);
    }

    pub fn is_model_loaded(&self) -> bool {
        self.context.is_some()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Message of the most recent failed submission, cleared on success
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Run one prediction. On failure the error is returned, kept for display
    /// and the history is left as it was.
    pub fn submit(&mut self, input: &HashMap<String, f64>) -> Result<PredictionOutcome> {
        self.state = SessionState::Running;

        let prediction = match predict_with(self.context.as_ref(), input) {
            Ok(prediction) => prediction,
            Err(e) => {
                warn!("Prediction failed: {}", e);
                self.state = SessionState::DisplayingError;
                self.last_error = Some(format!("Error: {}", e));
                return Err(e);
            }
        };

        let record = self.history.push(&prediction);
        let risk = RiskLevel::classify(prediction.flood_risk_pct);
        info!(
            "Run {}: rainfall {:.2} mm, flood risk {:.2}% ({})",
            record.run, prediction.rainfall_mm, prediction.flood_risk_pct, risk
        );

        let chart = match &self.chart_path {
            Some(path) => match render_history_chart(&self.history, path) {
                Ok(()) => Some(path.clone()),
                Err(e) => {
                    warn!("Could not redraw chart at {}: {}", path.display(), e);
                    None
                }
            },
            None => None,
        };

        self.state = SessionState::DisplayingResult;
        self.last_error = None;
        Ok(PredictionOutcome {
            prediction,
            run: record.run,
            risk,
            chart,
        })
    }
}
