//! Time-bucketed line charts.
//!
//! A [`LineChart`] lays out contiguous buckets of one [`DateUnit`] over an
//! inclusive date range, counts raw timestamps into them and renders the
//! labeled series as [`ChartData`].

use std::str::FromStr;

use serde::{Serialize, Serializer};
use time::format_description::{self, well_known::Rfc3339};
use time::{Date, Duration, Month, Time};

use crate::data::Timestamp;
use crate::{Error, Result};

const HOUR_FORMAT: &str =
    "[month repr:short] [day padding:none], [hour repr:12 padding:none][period case:lower]";

/// Granularity of chart buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateUnit {
    Minute,
    Hour,
    Day,
    /// ISO week, starting on Monday
    Week,
    Month,
    Year,
}

impl FromStr for DateUnit {
    type Err = Error;

    /// Accepts unit names as well as the single-letter date codes `i H d W m Y`
    fn from_str(unit: &str) -> Result<Self> {
        match unit {
            "i" | "minute" => Ok(DateUnit::Minute),
            "H" | "hour" => Ok(DateUnit::Hour),
            "d" | "D" | "day" => Ok(DateUnit::Day),
            "W" | "week" => Ok(DateUnit::Week),
            "m" | "M" | "month" => Ok(DateUnit::Month),
            "Y" | "y" | "year" => Ok(DateUnit::Year),
            other => Err(Error::InvalidDateUnit(other.to_string())),
        }
    }
}

impl DateUnit {
    /// Label format used when the caller does not supply one
    pub fn default_format(&self) -> &'static str {
        match self {
            DateUnit::Minute => "[hour]:[minute]",
            DateUnit::Hour => HOUR_FORMAT,
            DateUnit::Day => "[month repr:short] [day padding:none], [year repr:last_two]",
            DateUnit::Week => "Week [week_number repr:iso]",
            DateUnit::Month => "[month repr:short] [year]",
            DateUnit::Year => "[year]",
        }
    }

    /// Start of the bucket containing `at`
    pub fn truncate(&self, at: Timestamp) -> Result<Timestamp> {
        let time_of_day = Duration::seconds(at.second() as i64)
            + Duration::nanoseconds(at.nanosecond() as i64);
        let start_of_day = at.replace_time(Time::MIDNIGHT);

        let truncated = match self {
            DateUnit::Minute => at.checked_sub(time_of_day),
            DateUnit::Hour => at.checked_sub(time_of_day + Duration::minutes(at.minute() as i64)),
            DateUnit::Day => Some(start_of_day),
            DateUnit::Week => start_of_day.checked_sub(Duration::days(
                at.weekday().number_days_from_monday() as i64,
            )),
            DateUnit::Month => start_of_day.checked_sub(Duration::days(at.day() as i64 - 1)),
            DateUnit::Year => start_of_day.checked_sub(Duration::days(at.ordinal() as i64 - 1)),
        };

        truncated.ok_or_else(|| Error::DateOutOfRange(format!("{} truncated to {:?}", at, self)))
    }

    /// Start of the bucket following the one starting at `start`
    pub fn advance(&self, start: Timestamp) -> Result<Timestamp> {
        let next = match self {
            DateUnit::Minute => start.checked_add(Duration::minutes(1)),
            DateUnit::Hour => start.checked_add(Duration::hours(1)),
            DateUnit::Day => start.checked_add(Duration::days(1)),
            DateUnit::Week => start.checked_add(Duration::weeks(1)),
            DateUnit::Month => {
                let (year, month) = match start.month() {
                    Month::December => (start.year() + 1, Month::January),
                    month => (start.year(), month.next()),
                };
                Date::from_calendar_date(year, month, 1)
                    .ok()
                    .map(|date| start.replace_date(date))
            }
            DateUnit::Year => Date::from_calendar_date(start.year() + 1, Month::January, 1)
                .ok()
                .map(|date| start.replace_date(date)),
        };

        next.ok_or_else(|| Error::DateOutOfRange(format!("{} advanced by {:?}", start, self)))
    }
}

/// One named series of bucket counts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    pub label: String,
    pub data: Vec<u64>,
}

/// Rendered chart: one label and bucket start per point, any number of series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    #[serde(serialize_with = "serialize_buckets")]
    pub buckets: Vec<Timestamp>,
    pub datasets: Vec<Dataset>,
}

impl ChartData {
    pub fn dataset(&self, label: &str) -> Option<&Dataset> {
        self.datasets.iter().find(|dataset| dataset.label == label)
    }

    /// Bucket start paired with its count for the named series
    pub fn series(&self, label: &str) -> Option<Vec<(Timestamp, u64)>> {
        self.dataset(label).map(|dataset| {
            self.buckets
                .iter()
                .copied()
                .zip(dataset.data.iter().copied())
                .collect()
        })
    }
}

fn serialize_buckets<S: Serializer>(
    buckets: &[Timestamp],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let formatted = buckets
        .iter()
        .map(|bucket| bucket.format(&Rfc3339))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(serde::ser::Error::custom)?;
    formatted.serialize(serializer)
}

/// Chart under construction
#[derive(Debug, Clone)]
pub struct LineChart {
    buckets: Vec<Timestamp>,
    labels: Vec<String>,
    /// Exclusive end of the last bucket
    end: Option<Timestamp>,
    datasets: Vec<Dataset>,
}

impl LineChart {
    /// Lay out buckets covering `[date_from, date_to]`; an inverted range has no buckets
    pub fn new(
        unit: DateUnit,
        date_from: Timestamp,
        date_to: Timestamp,
        date_format: Option<&str>,
    ) -> Result<Self> {
        let format = date_format.unwrap_or_else(|| unit.default_format());
        let items = format_description::parse(format)
            .map_err(|e| Error::InvalidDateFormat(format!("{}: {}", format, e)))?;

        let mut buckets = Vec::new();
        let mut labels = Vec::new();
        let mut end = None;

        if date_from <= date_to {
            let mut cursor = unit.truncate(date_from)?;
            while cursor <= date_to {
                labels.push(
                    cursor
                        .format(&items)
                        .map_err(|e| Error::InvalidDateFormat(format!("{}: {}", format, e)))?,
                );
                buckets.push(cursor);
                cursor = unit.advance(cursor)?;
            }
            end = Some(cursor);
        }

        Ok(Self {
            buckets,
            labels,
            end,
            datasets: Vec::new(),
        })
    }

    pub fn buckets(&self) -> &[Timestamp] {
        &self.buckets
    }

    /// `[first bucket start, end of last bucket)`, `None` when there are no buckets
    pub fn range(&self) -> Option<(Timestamp, Timestamp)> {
        Some((*self.buckets.first()?, self.end?))
    }

    /// Count timestamps per bucket; timestamps outside the range are ignored
    pub fn bucket_counts(&self, timestamps: &[Timestamp]) -> Vec<u64> {
        let mut counts = vec![0u64; self.buckets.len()];
        let Some((from, to)) = self.range() else {
            return counts;
        };

        for at in timestamps {
            if *at < from || *at >= to {
                continue;
            }
            let index = self.buckets.partition_point(|start| start <= at) - 1;
            counts[index] += 1;
        }

        counts
    }

    pub fn set_dataset(&mut self, label: impl Into<String>, data: Vec<u64>) {
        self.datasets.push(Dataset {
            label: label.into(),
            data,
        });
    }

    pub fn render(self) -> ChartData {
        ChartData {
            labels: self.labels,
            buckets: self.buckets,
            datasets: self.datasets,
        }
    }
}
