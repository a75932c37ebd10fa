//! Synthesize daily entries from three-hour samples.
//!
//! Samples are bucketed by UTC calendar day. Each bucket keeps the rounded
//! min/max temperature and the most frequent icon and description. Ties go to
//! the value seen first in sample order.

use chrono::{DateTime, NaiveDate, NaiveTime};
use std::collections::BTreeMap;

use crate::models::{Condition, DailyForecastEntry, HourlyForecastEntry, TemperatureRange};

/// Group samples into day buckets, sorted by day ascending
#[must_use]
pub fn daily_from_samples(samples: &[HourlyForecastEntry]) -> Vec<DailyForecastEntry> {
    let mut buckets: BTreeMap<NaiveDate, DayBucket<'_>> = BTreeMap::new();

    for sample in samples {
        let Some(day) = DateTime::from_timestamp(sample.dt, 0).map(|t| t.date_naive()) else {
            continue;
        };
        buckets.entry(day).or_default().add(sample);
    }

    buckets
        .into_iter()
        .filter_map(|(day, bucket)| bucket.summarize(day))
        .collect()
}

#[derive(Default)]
struct DayBucket<'a> {
    min: Option<f64>,
    max: Option<f64>,
    icons: Tally<'a>,
    descriptions: Tally<'a>,
}

impl<'a> DayBucket<'a> {
    fn add(&mut self, sample: &'a HourlyForecastEntry) {
        self.min = Some(self.min.map_or(sample.temp, |m| m.min(sample.temp)));
        self.max = Some(self.max.map_or(sample.temp, |m| m.max(sample.temp)));
        self.icons.add(&sample.icon);
        self.descriptions.add(&sample.description);
    }

    fn summarize(self, day: NaiveDate) -> Option<DailyForecastEntry> {
        let (min, max) = (self.min?, self.max?);
        let icon = self.icons.mode();
        let description = self.descriptions.mode();

        let weather = if icon.is_none() && description.is_none() {
            Vec::new()
        } else {
            vec![Condition {
                icon: icon.unwrap_or_default().to_string(),
                description: description.unwrap_or_default().to_string(),
            }]
        };

        Some(DailyForecastEntry {
            dt: day.and_time(NaiveTime::default()).and_utc().timestamp(),
            temp: TemperatureRange {
                min: min.round(),
                max: max.round(),
            },
            weather,
        })
    }
}

/// Occurrence counts in first-seen order
#[derive(Default)]
struct Tally<'a> {
    counts: Vec<(&'a str, usize)>,
}

impl<'a> Tally<'a> {
    fn add(&mut self, value: &'a str) {
        if value.is_empty() {
            return;
        }
        match self.counts.iter_mut().find(|(v, _)| *v == value) {
            Some((_, count)) => *count += 1,
            None => self.counts.push((value, 1)),
        }
    }

    fn mode(&self) -> Option<&'a str> {
        let mut best: Option<(&'a str, usize)> = None;
        for &(value, count) in &self.counts {
            if best.is_none_or(|(_, top)| count > top) {
                best = Some((value, count));
            }
        }
        best.map(|(value, _)| value)
    }
}
