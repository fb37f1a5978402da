use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OncoError;

/// Two doses closer than this (in days) to a period boundary count as "on" the boundary
pub const DOSE_TIME_TOLERANCE: f64 = 1e-6;

/// Named dosing interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    Daily,
    Weekly,
    Q2w,
    Q3w,
    Q4w,
    Q6m,
}

impl Interval {
    pub const ALL: [Interval; 6] = [
        Interval::Daily,
        Interval::Weekly,
        Interval::Q2w,
        Interval::Q3w,
        Interval::Q4w,
        Interval::Q6m,
    ];

    /// Length of one dosing period in days
    pub fn period_days(&self) -> f64 {
        match self {
            Interval::Daily => 1.0,
            Interval::Weekly => 7.0,
            Interval::Q2w => 14.0,
            Interval::Q3w => 21.0,
            Interval::Q4w => 28.0,
            Interval::Q6m => 180.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Daily => "daily",
            Interval::Weekly => "weekly",
            Interval::Q2w => "q2w",
            Interval::Q3w => "q3w",
            Interval::Q4w => "q4w",
            Interval::Q6m => "q6m",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Interval {
    type Err = OncoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "qd" | "q1d" => Ok(Interval::Daily),
            "weekly" | "qw" | "q1w" => Ok(Interval::Weekly),
            "q2w" | "biweekly" => Ok(Interval::Q2w),
            "q3w" => Ok(Interval::Q3w),
            "q4w" | "monthly" => Ok(Interval::Q4w),
            "q6m" => Ok(Interval::Q6m),
            other => Err(OncoError::InvalidParameter(format!(
                "unknown dosing interval '{}'",
                other
            ))),
        }
    }
}

/// When doses are given
///
/// Anything that does not name a known [`Interval`] is treated as a single bolus
/// at `t = 0`, so parsing a schedule never fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Schedule {
    Periodic(Interval),
    SingleBolus,
}

impl Schedule {
    pub fn parse(s: &str) -> Self {
        match s.parse::<Interval>() {
            Ok(interval) => Schedule::Periodic(interval),
            Err(_) => Schedule::SingleBolus,
        }
    }

    pub fn interval(&self) -> Option<Interval> {
        match self {
            Schedule::Periodic(interval) => Some(*interval),
            Schedule::SingleBolus => None,
        }
    }

    pub fn period_days(&self) -> Option<f64> {
        self.interval().map(|i| i.period_days())
    }
}

impl From<Interval> for Schedule {
    fn from(interval: Interval) -> Self {
        Schedule::Periodic(interval)
    }
}

impl From<String> for Schedule {
    fn from(s: String) -> Self {
        Schedule::parse(&s)
    }
}

impl From<Schedule> for String {
    fn from(schedule: Schedule) -> Self {
        schedule.to_string()
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Schedule::Periodic(interval) => write!(f, "{}", interval),
            Schedule::SingleBolus => write!(f, "single"),
        }
    }
}

/// A dose repeated on a schedule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DosingSchedule {
    pub schedule: Schedule,
    /// Absolute dose in mg
    pub dose: f64,
}

impl DosingSchedule {
    pub fn new(schedule: Schedule, dose: f64) -> Self {
        DosingSchedule { schedule, dose }
    }

    /// Impulse delivered at `t`: the full dose when `t` sits on a period
    /// boundary (or at `t = 0` for a single bolus), zero otherwise
    pub fn input_at(&self, t: f64) -> f64 {
        if t < -DOSE_TIME_TOLERANCE {
            return 0.0;
        }
        match self.schedule {
            Schedule::SingleBolus => {
                if t.abs() <= DOSE_TIME_TOLERANCE {
                    self.dose
                } else {
                    0.0
                }
            }
            Schedule::Periodic(interval) => {
                let period = interval.period_days();
                let phase = t.rem_euclid(period);
                if phase <= DOSE_TIME_TOLERANCE || period - phase <= DOSE_TIME_TOLERANCE {
                    self.dose
                } else {
                    0.0
                }
            }
        }
    }

    /// Every dose time in `[0, horizon)`
    ///
    /// A dose falling exactly on the horizon has no time to act and is left out.
    pub fn dose_times(&self, horizon: f64) -> Vec<f64> {
        match self.schedule {
            Schedule::SingleBolus => vec![0.0],
            Schedule::Periodic(interval) => {
                let period = interval.period_days();
                let mut times = Vec::new();
                let mut k = 0usize;
                loop {
                    let t = k as f64 * period;
                    if t >= horizon - DOSE_TIME_TOLERANCE && k > 0 {
                        break;
                    }
                    times.push(t);
                    k += 1;
                }
                times
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn periods() {
        assert_eq!(Interval::Daily.period_days(), 1.0);
        assert_eq!(Interval::Weekly.period_days(), 7.0);
        assert_eq!(Interval::Q2w.period_days(), 14.0);
        assert_eq!(Interval::Q3w.period_days(), 21.0);
        assert_eq!(Interval::Q4w.period_days(), 28.0);
        assert_eq!(Interval::Q6m.period_days(), 180.0);
    }

    #[test]
    fn parse_round_trips_names() {
        for interval in Interval::ALL {
            assert_eq!(interval.to_string().parse::<Interval>().unwrap(), interval);
        }
        assert_eq!("Q3W".parse::<Interval>().unwrap(), Interval::Q3w);
    }

    #[test]
    fn unknown_names_become_single_bolus() {
        assert_eq!(Schedule::parse("once"), Schedule::SingleBolus);
        assert_eq!(Schedule::parse("q5w"), Schedule::SingleBolus);
        assert_eq!(Schedule::parse("q2w"), Schedule::Periodic(Interval::Q2w));
    }

    #[test]
    fn dose_times_q3w() {
        let s = DosingSchedule::new(Interval::Q3w.into(), 100.0);
        assert_eq!(s.dose_times(84.0), vec![0.0, 21.0, 42.0, 63.0]);
        // A dose on the horizon itself is dropped
        assert_eq!(s.dose_times(63.0), vec![0.0, 21.0, 42.0]);
    }

    #[test]
    fn input_only_on_boundaries() {
        let s = DosingSchedule::new(Interval::Weekly.into(), 80.0);
        assert_eq!(s.input_at(0.0), 80.0);
        assert_eq!(s.input_at(14.0), 80.0);
        assert_eq!(s.input_at(14.0 + 5e-7), 80.0);
        assert_eq!(s.input_at(13.5), 0.0);

        let bolus = DosingSchedule::new(Schedule::SingleBolus, 50.0);
        assert_eq!(bolus.input_at(0.0), 50.0);
        assert_eq!(bolus.input_at(7.0), 0.0);
        assert_eq!(bolus.dose_times(100.0), vec![0.0]);
    }

    #[test]
    fn schedule_serializes_as_plain_string() {
        let json = serde_json::to_string(&Schedule::Periodic(Interval::Q6m)).unwrap();
        assert_eq!(json, "\"q6m\"");
        let back: Schedule = serde_json::from_str("\"every other day\"").unwrap();
        assert_eq!(back, Schedule::SingleBolus);
    }
}
