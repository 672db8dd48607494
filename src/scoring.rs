//! Batch scoring of observation feeds.

use std::io::Write;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::data::{DataError, Observation};
use crate::model::DelayModel;

/// An observation with its predicted delay attached.
///
/// Flat on purpose: the same shape serializes to the JSON API and to the CSV
/// export without nesting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredObservation {
    pub timestamp: NaiveDateTime,
    pub route_id: String,
    pub stop_id: String,
    pub day_of_week: u8,
    pub time_of_day: f32,
    pub weather_temp: f32,
    pub weather_precip: f32,
    pub traffic_index: f32,
    pub scheduled_minute_of_day: u16,
    pub delay_min: Option<f32>,
    pub predicted_delay_min: f32,
}

impl ScoredObservation {
    fn new(obs: Observation, predicted: f32) -> Self {
        Self {
            timestamp: obs.timestamp,
            route_id: obs.route_id,
            stop_id: obs.stop_id,
            day_of_week: obs.day_of_week,
            time_of_day: obs.time_of_day,
            weather_temp: obs.weather_temp,
            weather_precip: obs.weather_precip,
            traffic_index: obs.traffic_index,
            scheduled_minute_of_day: obs.scheduled_minute_of_day,
            delay_min: obs.delay_min,
            predicted_delay_min: predicted,
        }
    }
}

/// Round to two decimal places for display/export.
pub fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

/// Score a feed, sorted ascending by timestamp, predictions rounded to
/// 2 decimals.
pub fn score_feed(model: &DelayModel, mut rows: Vec<Observation>) -> Vec<ScoredObservation> {
    rows.sort_by_key(|o| o.timestamp);
    let predictions = model.predict(&rows);
    rows.into_iter()
        .zip(predictions)
        .map(|(obs, pred)| ScoredObservation::new(obs, round2(pred)))
        .collect()
}

/// Write scored rows as CSV.
pub fn write_scored_csv<W: Write>(
    writer: W,
    rows: &[ScoredObservation],
) -> Result<(), DataError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{SynthConfig, SynthGenerator};
    use crate::training::{TrainParams, Verbosity};

    fn trained_model() -> (DelayModel, Vec<Observation>) {
        let generator = SynthGenerator::new(SynthConfig {
            days: 2,
            per_hour: 2,
            ..Default::default()
        });
        let history = generator.history();
        let params = TrainParams {
            n_rounds: 10,
            verbosity: Verbosity::Silent,
            ..Default::default()
        };
        let (model, _) = DelayModel::fit(&history, params, 0.2, 42).unwrap();
        (model, history)
    }

    #[test]
    fn round2_behaves() {
        assert_eq!(round2(1.234), 1.23);
        assert_eq!(round2(1.235), 1.24);
        assert_eq!(round2(-2.555), -2.56);
    }

    #[test]
    fn scoring_sorts_and_rounds() {
        let (model, mut rows) = trained_model();
        rows.reverse();
        let scored = score_feed(&model, rows);

        assert!(scored.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        for row in &scored {
            assert_eq!(row.predicted_delay_min, round2(row.predicted_delay_min));
            assert!(row.predicted_delay_min.is_finite());
        }
    }

    #[test]
    fn csv_export_includes_prediction_column() {
        let (model, rows) = trained_model();
        let scored = score_feed(&model, rows[..3].to_vec());

        let mut buf = Vec::new();
        write_scored_csv(&mut buf, &scored).unwrap();
        let text = String::from_utf8(buf).unwrap();

        let header = text.lines().next().unwrap();
        assert!(header.ends_with("delay_min,predicted_delay_min"));
        assert_eq!(text.lines().count(), 4);
    }
}
