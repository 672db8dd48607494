//! Observation records and CSV I/O.
//!
//! All persistence in this system is flat CSV: the historical training set,
//! the live feed the dashboard scores at startup, and user uploads. Rows
//! that fail to parse (bad timestamp, malformed numerics) are dropped and
//! counted rather than aborting the whole load.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A single transit-stop observation.
///
/// `delay_min` is the training label; it is absent (or simply ignored) at
/// scoring time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Naive local timestamp of the observation.
    pub timestamp: NaiveDateTime,
    /// Route identifier (e.g. "R3").
    pub route_id: String,
    /// Stop identifier (e.g. "S7").
    pub stop_id: String,
    /// Day of week, Monday = 0.
    pub day_of_week: u8,
    /// Fractional hour of day (e.g. 14.5 for 14:30).
    pub time_of_day: f32,
    /// Air temperature in °C.
    pub weather_temp: f32,
    /// Precipitation in mm.
    pub weather_precip: f32,
    /// Congestion index (1.0 = free flow).
    pub traffic_index: f32,
    /// Scheduled departure, minutes after midnight.
    pub scheduled_minute_of_day: u16,
    /// Observed delay in minutes (label).
    #[serde(default)]
    pub delay_min: Option<f32>,
}

/// Result of loading a feed: the usable rows plus the number dropped.
#[derive(Debug, Clone, Default)]
pub struct Feed {
    /// Successfully parsed observations.
    pub rows: Vec<Observation>,
    /// Number of records dropped because they failed to parse.
    pub skipped: usize,
}

impl Feed {
    /// Latest timestamp in the feed, if any rows are present.
    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.rows.iter().map(|o| o.timestamp).max()
    }

    /// Sort rows ascending by timestamp (stable for equal stamps).
    pub fn sort_by_timestamp(&mut self) {
        self.rows.sort_by_key(|o| o.timestamp);
    }
}

/// Errors that can occur when loading or writing observation CSV.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("no usable rows in input ({skipped} records dropped)")]
    Empty { skipped: usize },
}

/// Load observations from a CSV file on disk.
pub fn read_feed(path: impl AsRef<Path>) -> Result<Feed, DataError> {
    let file = File::open(path.as_ref())?;
    read_feed_from(file)
}

/// Load observations from any CSV reader.
///
/// Records that fail to deserialize are counted in [`Feed::skipped`].
/// Returns [`DataError::Empty`] if nothing parses.
pub fn read_feed_from<R: Read>(reader: R) -> Result<Feed, DataError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut feed = Feed::default();

    for record in csv_reader.deserialize::<Observation>() {
        match record {
            Ok(obs) => feed.rows.push(obs),
            Err(_) => feed.skipped += 1,
        }
    }

    if feed.rows.is_empty() {
        return Err(DataError::Empty {
            skipped: feed.skipped,
        });
    }
    Ok(feed)
}

/// Write observations to a CSV file, one header row first.
pub fn write_observations(
    path: impl AsRef<Path>,
    rows: &[Observation],
) -> Result<(), DataError> {
    let file = File::create(path.as_ref())?;
    write_observations_to(file, rows)
}

/// Write observations to any writer as CSV.
pub fn write_observations_to<W: Write>(writer: W, rows: &[Observation]) -> Result<(), DataError> {
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

    const SAMPLE: &str = "\
timestamp,route_id,stop_id,day_of_week,time_of_day,weather_temp,weather_precip,traffic_index,scheduled_minute_of_day,delay_min
2025-09-01T07:30:00,R1,S2,0,7.5,18.2,0.0,1.5,450,4.25
2025-09-01T08:00:00,R2,S3,0,8.0,18.0,0.12,1.5,480,6.1
not-a-timestamp,R2,S3,0,8.0,18.0,0.12,1.5,480,6.1
";

    #[test]
    fn parses_rows_and_counts_rejects() {
        let feed = read_feed_from(SAMPLE.as_bytes()).unwrap();
        assert_eq!(feed.rows.len(), 2);
        assert_eq!(feed.skipped, 1);
        assert_eq!(feed.rows[0].route_id, "R1");
        assert_eq!(feed.rows[0].scheduled_minute_of_day, 450);
        assert_eq!(feed.rows[0].delay_min, Some(4.25));
    }

    #[test]
    fn label_column_optional() {
        let without_label = "\
timestamp,route_id,stop_id,day_of_week,time_of_day,weather_temp,weather_precip,traffic_index,scheduled_minute_of_day
2025-09-01T07:30:00,R1,S2,0,7.5,18.2,0.0,1.5,450
";
        let feed = read_feed_from(without_label.as_bytes()).unwrap();
        assert_eq!(feed.rows.len(), 1);
        assert_eq!(feed.rows[0].delay_min, None);
    }

    #[test]
    fn empty_input_is_an_error() {
        let only_bad = "\
timestamp,route_id,stop_id,day_of_week,time_of_day,weather_temp,weather_precip,traffic_index,scheduled_minute_of_day,delay_min
nope,R1,S2,0,7.5,18.2,0.0,1.5,450,4.25
";
        let err = read_feed_from(only_bad.as_bytes()).unwrap_err();
        assert!(matches!(err, DataError::Empty { skipped: 1 }));
    }

    #[test]
    fn roundtrip_through_writer() {
        let feed = read_feed_from(SAMPLE.as_bytes()).unwrap();
        let mut buf = Vec::new();
        write_observations_to(&mut buf, &feed.rows).unwrap();

        let reread = read_feed_from(buf.as_slice()).unwrap();
        assert_eq!(reread.rows, feed.rows);
        assert_eq!(reread.skipped, 0);
    }

    #[test]
    fn last_timestamp_and_sort() {
        let mut feed = read_feed_from(SAMPLE.as_bytes()).unwrap();
        feed.rows.reverse();
        feed.sort_by_timestamp();
        assert_eq!(feed.rows[0].route_id, "R1");
        assert_eq!(
            feed.last_timestamp().unwrap(),
            feed.rows[1].timestamp
        );
    }
}
