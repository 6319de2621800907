use std::io::Read;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    #[serde(rename = "price")]
    pub value: f64,
}

/// Observed history for one entity. Never empty, strictly ascending by date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSnapshot {
    pub entity: String,
    points: Vec<SeriesPoint>,
}

impl SeriesSnapshot {
    pub fn new(entity: impl Into<String>, points: Vec<SeriesPoint>) -> Result<Self, String> {
        if points.is_empty() {
            return Err("series is empty".to_string());
        }
        for pair in points.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(format!(
                    "series dates must be strictly ascending: {} followed by {}",
                    pair[0].date, pair[1].date
                ));
            }
        }
        if let Some(bad) = points.iter().find(|p| !p.value.is_finite()) {
            return Err(format!("non-finite value on {}", bad.date));
        }

        Ok(Self {
            entity: entity.into(),
            points,
        })
    }

    /// Reads `Date,<value_column>` rows. Other columns are ignored.
    pub fn from_csv<R: Read>(entity: &str, reader: R, value_column: &str) -> Result<Self, String> {
        let mut csv = csv::Reader::from_reader(reader);
        let headers = csv.headers().map_err(|e| e.to_string())?.clone();
        let date_idx = headers
            .iter()
            .position(|h| h.trim() == "Date")
            .ok_or_else(|| "missing Date column".to_string())?;
        let value_idx = headers
            .iter()
            .position(|h| h.trim() == value_column)
            .ok_or_else(|| format!("missing {} column", value_column))?;

        let mut points = Vec::new();
        for (line, record) in csv.records().enumerate() {
            let record = record.map_err(|e| e.to_string())?;
            let row = line + 2;
            let raw_date = record.get(date_idx).unwrap_or_default();
            let date = parse_date(raw_date)
                .ok_or_else(|| format!("row {}: bad date {:?}", row, raw_date))?;
            let raw_value = record.get(value_idx).unwrap_or_default().trim();
            let value: f64 = raw_value
                .parse()
                .map_err(|_| format!("row {}: bad value {:?}", row, raw_value))?;
            points.push(SeriesPoint { date, value });
        }

        Self::new(entity, points)
    }

    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last_date(&self) -> NaiveDate {
        // Non-empty by construction.
        self.points[self.points.len() - 1].date
    }

    /// The most recent `n` values, oldest first.
    pub fn tail(&self, n: usize) -> Option<Vec<f64>> {
        if self.points.len() < n {
            return None;
        }
        Some(
            self.points[self.points.len() - n..]
                .iter()
                .map(|p| p.value)
                .collect(),
        )
    }

    pub fn calculate_statistics(&self) -> SeriesStats {
        let values: Vec<f64> = self.points.iter().map(|p| p.value).collect();
        SeriesStats {
            count: values.len(),
            mean: values.iter().mean(),
            std_dev: values.iter().std_dev(),
            min: Statistics::min(values.iter()),
            max: Statistics::max(values.iter()),
            first_date: self.points[0].date,
            last_date: self.last_date(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesStats {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; NaN for a single point.
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
}

/// Accepts `YYYY-MM-DD`, a naive timestamp, or RFC 3339. Time of day is dropped.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ts.date());
        }
    }
    DateTime::parse_from_rfc3339(raw).ok().map(|ts| ts.date_naive())
}
