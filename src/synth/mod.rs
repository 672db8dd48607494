//! Synthetic historical data generation.
//!
//! Produces a plausible delay history for offline training: seasonal
//! temperature, weekday-skewed precipitation, rush-hour traffic, per-route
//! and per-stop base effects, and the occasional large incident spike.
//! Everything is driven by a seeded RNG so generated datasets are
//! reproducible.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use rand::prelude::*;

use crate::data::Observation;

/// Configuration for the generator.
#[derive(Debug, Clone)]
pub struct SynthConfig {
    /// First timestamp of the history.
    pub start: NaiveDateTime,
    /// Days of history to generate.
    pub days: u32,
    /// Observations per hour.
    pub per_hour: u32,
    /// Number of routes (`R1..`).
    pub n_routes: u32,
    /// Number of stops (`S1..`).
    pub n_stops: u32,
    /// RNG seed.
    pub seed: u64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2025, 9, 1)
                .expect("valid date")
                .and_hms_opt(0, 0, 0)
                .expect("valid time"),
            days: 60,
            per_hour: 6,
            n_routes: 5,
            n_stops: 10,
            seed: 42,
        }
    }
}

/// Seeded generator for history and live-feed datasets.
#[derive(Debug, Clone)]
pub struct SynthGenerator {
    config: SynthConfig,
    routes: Vec<String>,
    stops: Vec<String>,
}

impl SynthGenerator {
    /// Create a generator for the given configuration.
    pub fn new(config: SynthConfig) -> Self {
        let routes = (1..=config.n_routes).map(|r| format!("R{r}")).collect();
        let stops = (1..=config.n_stops).map(|s| format!("S{s}")).collect();
        Self {
            config,
            routes,
            stops,
        }
    }

    /// Generate the labeled training history.
    pub fn history(&self) -> Vec<Observation> {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut rows = Vec::new();

        for day in 0..self.config.days {
            for hour in 0..24u32 {
                for slot in 0..self.config.per_hour {
                    let minute = slot * 60 / self.config.per_hour;
                    let stamp = self.config.start
                        + Duration::days(day as i64)
                        + Duration::hours(hour as i64)
                        + Duration::minutes(minute as i64);
                    rows.push(self.make_observation(stamp, &mut rng));
                }
            }
        }
        rows
    }

    /// Generate a live feed of `n_rows` at 5-minute spacing after `after`.
    pub fn live_feed(&self, after: NaiveDateTime, n_rows: usize) -> Vec<Observation> {
        // Offset the seed so the feed is not a replay of history draws.
        let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(1));
        (0..n_rows)
            .map(|i| {
                let stamp = after + Duration::minutes(5 * (i as i64 + 1));
                self.make_observation(stamp, &mut rng)
            })
            .collect()
    }

    /// One observation at a given timestamp with random route/stop.
    fn make_observation(&self, stamp: NaiveDateTime, rng: &mut StdRng) -> Observation {
        let route_pos = rng.gen_range(0..self.routes.len());
        let stop_pos = rng.gen_range(0..self.stops.len());
        let hour = stamp.hour();
        let minute = stamp.minute();

        let seasonal =
            (stamp.ordinal() as f32 / 365.0 * std::f32::consts::TAU).sin();
        let weather_temp = 15.0 + 10.0 * seasonal + sample_normal(rng, 0.0, 2.0);

        let day_of_week = stamp.weekday().num_days_from_monday() as u8;
        let weekday_drying = if day_of_week < 5 { 0.1 } else { 0.0 };
        let weather_precip = (sample_exponential(rng, 0.1) - weekday_drying).max(0.0);

        let rush = (8..=10).contains(&hour) || (17..=19).contains(&hour);
        let traffic_index = if rush { 1.5 } else { 1.0 };

        let route_effect = route_pos as f32 * 0.5;
        let stop_effect = stop_pos as f32 * 0.2;
        let mut delay = sample_normal(
            rng,
            route_effect + stop_effect + 2.0 * traffic_index,
            3.0,
        );
        // Rare incident: a large additive spike.
        if rng.gen::<f32>() < 0.02 {
            delay += rng.gen_range(10.0..40.0);
        }

        Observation {
            timestamp: stamp,
            route_id: self.routes[route_pos].clone(),
            stop_id: self.stops[stop_pos].clone(),
            day_of_week,
            time_of_day: hour as f32 + minute as f32 / 60.0,
            weather_temp: round_to(weather_temp, 2),
            weather_precip: round_to(weather_precip, 3),
            traffic_index,
            scheduled_minute_of_day: (hour * 60 + minute) as u16,
            delay_min: Some(round_to(delay, 2)),
        }
    }
}

/// Normal sample via the Box-Muller transform.
fn sample_normal(rng: &mut StdRng, mean: f32, std_dev: f32) -> f32 {
    let u1: f32 = 1.0 - rng.gen::<f32>(); // (0, 1]: keeps ln finite
    let u2: f32 = rng.gen();
    let radius = (-2.0 * u1.ln()).sqrt();
    mean + std_dev * radius * (std::f32::consts::TAU * u2).cos()
}

/// Exponential sample with the given mean, via inverse CDF.
fn sample_exponential(rng: &mut StdRng, mean: f32) -> f32 {
    let u: f32 = 1.0 - rng.gen::<f32>();
    -mean * u.ln()
}

/// Round to `decimals` decimal places.
fn round_to(value: f32, decimals: u32) -> f32 {
    let factor = 10f32.powi(decimals as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_deterministic() {
        let config = SynthConfig {
            days: 2,
            per_hour: 3,
            ..Default::default()
        };
        let a = SynthGenerator::new(config.clone()).history();
        let b = SynthGenerator::new(config).history();
        assert_eq!(a, b);
        assert_eq!(a.len(), 2 * 24 * 3);
    }

    #[test]
    fn rows_are_internally_consistent() {
        let config = SynthConfig {
            days: 2,
            per_hour: 4,
            ..Default::default()
        };
        for obs in SynthGenerator::new(config).history() {
            assert_eq!(
                obs.day_of_week,
                obs.timestamp.weekday().num_days_from_monday() as u8
            );
            assert_eq!(
                obs.scheduled_minute_of_day as u32,
                obs.timestamp.hour() * 60 + obs.timestamp.minute()
            );
            assert!(obs.weather_precip >= 0.0);
            assert!(obs.traffic_index == 1.0 || obs.traffic_index == 1.5);
            assert!(obs.route_id.starts_with('R'));
            assert!(obs.stop_id.starts_with('S'));
            assert!(obs.delay_min.is_some());
        }
    }

    #[test]
    fn rush_hours_raise_traffic() {
        let config = SynthConfig {
            days: 1,
            per_hour: 1,
            ..Default::default()
        };
        let rows = SynthGenerator::new(config).history();
        for obs in &rows {
            let hour = obs.timestamp.hour();
            let rush = (8..=10).contains(&hour) || (17..=19).contains(&hour);
            assert_eq!(obs.traffic_index, if rush { 1.5 } else { 1.0 });
        }
    }

    #[test]
    fn live_feed_follows_history() {
        let config = SynthConfig {
            days: 1,
            per_hour: 1,
            ..Default::default()
        };
        let generator = SynthGenerator::new(config);
        let history = generator.history();
        let last = history.last().unwrap().timestamp;

        let feed = generator.live_feed(last, 50);
        assert_eq!(feed.len(), 50);
        assert_eq!(feed[0].timestamp, last + Duration::minutes(5));
        assert_eq!(feed[49].timestamp, last + Duration::minutes(250));
        assert!(feed.iter().all(|o| o.timestamp > last));
    }

    #[test]
    fn samplers_have_sane_moments() {
        let mut rng = StdRng::seed_from_u64(7);
        let normals: Vec<f32> = (0..5000).map(|_| sample_normal(&mut rng, 5.0, 2.0)).collect();
        let mean = normals.iter().sum::<f32>() / normals.len() as f32;
        assert!((mean - 5.0).abs() < 0.2, "normal mean drifted: {mean}");

        let exps: Vec<f32> = (0..5000)
            .map(|_| sample_exponential(&mut rng, 0.1))
            .collect();
        let mean = exps.iter().sum::<f32>() / exps.len() as f32;
        assert!((mean - 0.1).abs() < 0.02, "exponential mean drifted: {mean}");
        assert!(exps.iter().all(|&e| e >= 0.0));
    }
}
