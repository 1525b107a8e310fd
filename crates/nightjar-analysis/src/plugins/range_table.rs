//! File-backed species predictor.
//!
//! The `species_presence_model` artifact is a plain-text range table, one
//! species per line:
//!
//! ```text
//! label lat_min lat_max lon_min lon_max month_start month_end probability
//! ```
//!
//! `predict` returns every label whose bounding box contains the query
//! point, whose month window contains the query date, and whose presence
//! probability meets the threshold. The table is loaded once at
//! construction; a missing or malformed file is a pipeline-build error.

use crate::error::PipelineError;
use crate::pipeline::SpeciesPredictor;
use chrono::{Datelike, NaiveDate};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug)]
struct RangeEntry {
    label: String,
    lat_min: f64,
    lat_max: f64,
    lon_min: f64,
    lon_max: f64,
    month_start: u32,
    month_end: u32,
    probability: f32,
}

impl RangeEntry {
    fn matches(&self, latitude: f64, longitude: f64, month: u32, threshold: f32) -> bool {
        if self.probability < threshold {
            return false;
        }
        if latitude < self.lat_min || latitude > self.lat_max {
            return false;
        }
        if longitude < self.lon_min || longitude > self.lon_max {
            return false;
        }
        // Month windows may wrap the year end (e.g. 11..2 for wintering).
        if self.month_start <= self.month_end {
            (self.month_start..=self.month_end).contains(&month)
        } else {
            month >= self.month_start || month <= self.month_end
        }
    }
}

#[derive(Debug)]
pub struct RangeTableSpeciesPredictor {
    name: String,
    entries: Vec<RangeEntry>,
}

impl RangeTableSpeciesPredictor {
    pub fn load(name: &str, path: &Path) -> Result<Self, PipelineError> {
        let text = std::fs::read_to_string(path).map_err(|_| {
            PipelineError::SpeciesModelMissing {
                name: name.to_string(),
                path: path.to_path_buf(),
            }
        })?;

        let mut entries = Vec::new();
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            entries.push(parse_entry(line, path)?);
        }
        Ok(Self {
            name: name.to_string(),
            entries,
        })
    }
}

fn parse_entry(line: &str, path: &Path) -> Result<RangeEntry, PipelineError> {
    let bad = || {
        PipelineError::Config(format!(
            "bad species range line {line:?} in {}",
            path.display()
        ))
    };
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [label, lat_min, lat_max, lon_min, lon_max, month_start, month_end, probability] =
        fields.as_slice()
    else {
        return Err(bad());
    };
    Ok(RangeEntry {
        label: label.to_string(),
        lat_min: lat_min.parse().map_err(|_| bad())?,
        lat_max: lat_max.parse().map_err(|_| bad())?,
        lon_min: lon_min.parse().map_err(|_| bad())?,
        lon_max: lon_max.parse().map_err(|_| bad())?,
        month_start: month_start.parse().map_err(|_| bad())?,
        month_end: month_end.parse().map_err(|_| bad())?,
        probability: probability.parse().map_err(|_| bad())?,
    })
}

impl SpeciesPredictor for RangeTableSpeciesPredictor {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(
        &self,
        latitude: f64,
        longitude: f64,
        date: NaiveDate,
        threshold: f32,
    ) -> Result<HashSet<String>, PipelineError> {
        let month = date.month();
        Ok(self
            .entries
            .iter()
            .filter(|e| e.matches(latitude, longitude, month, threshold))
            .map(|e| e.label.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn table(root: &Path, content: &str) -> std::path::PathBuf {
        let path = root.join("species_presence_model");
        std::fs::write(&path, content).unwrap();
        path
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn filters_by_box_month_and_threshold() {
        let root = TempDir::new().unwrap();
        let path = table(
            root.path(),
            "robin 45 60 0 20 3 8 0.8\n\
             owl 45 60 0 20 3 8 0.01\n\
             sparrow -10 10 0 20 3 8 0.8\n",
        );
        let predictor = RangeTableSpeciesPredictor::load("energy", &path).unwrap();

        let allowed = predictor.predict(52.5, 13.4, date(2026, 5, 14), 0.05).unwrap();
        // robin: in box, in season, above threshold. owl: below threshold.
        // sparrow: latitude outside the box.
        assert_eq!(allowed, HashSet::from(["robin".to_string()]));
    }

    #[test]
    fn month_window_may_wrap_the_year() {
        let root = TempDir::new().unwrap();
        let path = table(root.path(), "owl 45 60 0 20 11 2 0.9\n");
        let predictor = RangeTableSpeciesPredictor::load("energy", &path).unwrap();

        assert!(!predictor
            .predict(52.5, 13.4, date(2026, 6, 1), 0.05)
            .unwrap()
            .contains("owl"));
        assert!(predictor
            .predict(52.5, 13.4, date(2026, 12, 1), 0.05)
            .unwrap()
            .contains("owl"));
        assert!(predictor
            .predict(52.5, 13.4, date(2026, 1, 15), 0.05)
            .unwrap()
            .contains("owl"));
    }

    #[test]
    fn missing_table_is_a_distinct_build_error() {
        let err =
            RangeTableSpeciesPredictor::load("energy", Path::new("/nonexistent/table")).unwrap_err();
        assert!(matches!(err, PipelineError::SpeciesModelMissing { .. }));
    }

    #[test]
    fn malformed_line_is_a_config_error() {
        let root = TempDir::new().unwrap();
        let path = table(root.path(), "robin 45 60\n");
        let err = RangeTableSpeciesPredictor::load("energy", &path).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
