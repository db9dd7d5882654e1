// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Animation time.
//!
//! A [`Time`] is either an exact frame, an instant infinitesimally before or
//! after a frame, or an arbitrary float time. Frames are one time unit
//! apart.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const FPS: f64 = 1.0;
const JUST_EPSILON: f64 = 1.0e-10;
const SNAP_EPSILON: f64 = 1.0e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeKind {
    ExactFrame,
    JustBeforeFrame,
    JustAfterFrame,
    FloatTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Time {
    kind: TimeKind,
    frame: i32,
    time: f64,
}

impl Default for Time {
    fn default() -> Self {
        Time::frame(0)
    }
}

impl Time {
    /// Exact frame `f`.
    pub fn frame(f: i32) -> Time {
        Time {
            kind: TimeKind::ExactFrame,
            frame: f,
            time: f as f64 / FPS,
        }
    }

    pub fn just_before(f: i32) -> Time {
        Time {
            kind: TimeKind::JustBeforeFrame,
            frame: f,
            time: f as f64 / FPS - JUST_EPSILON,
        }
    }

    pub fn just_after(f: i32) -> Time {
        Time {
            kind: TimeKind::JustAfterFrame,
            frame: f,
            time: f as f64 / FPS + JUST_EPSILON,
        }
    }

    /// Float time `t`, snapped to an exact frame when within 1e-4 of one.
    pub fn from_float(t: f64) -> Time {
        let rounded = (t + 0.5).floor();
        let rest = t - rounded;
        if -SNAP_EPSILON < rest && rest < SNAP_EPSILON {
            return Time::frame(rounded as i32);
        }
        Time {
            kind: TimeKind::FloatTime,
            frame: (t * FPS) as i32,
            time: t,
        }
    }

    pub fn kind(&self) -> TimeKind {
        self.kind
    }

    pub fn is_exact_frame(&self) -> bool {
        self.kind == TimeKind::ExactFrame
    }

    /// Frame number (truncated for float times).
    pub fn frame_number(&self) -> i32 {
        self.frame
    }

    pub fn float_time(&self) -> f64 {
        self.time
    }

    /// Hashable identity, used to key per-time caches.
    pub fn cache_key(&self) -> (u8, i64) {
        match self.kind {
            TimeKind::ExactFrame => (0, self.frame as i64),
            TimeKind::JustBeforeFrame => (1, self.frame as i64),
            TimeKind::JustAfterFrame => (2, self.frame as i64),
            TimeKind::FloatTime => (3, self.time.to_bits() as i64),
        }
    }

    /// Legacy text form: `ExactFrame 3`, `FloatTime 2.5`, ...
    pub fn to_legacy_string(&self) -> String {
        match self.kind {
            TimeKind::ExactFrame => format!("ExactFrame {}", self.frame),
            TimeKind::JustBeforeFrame => format!("JustBeforeFrame {}", self.frame),
            TimeKind::JustAfterFrame => format!("JustAfterFrame {}", self.frame),
            TimeKind::FloatTime => format!(
                "FloatTime {}",
                vac_lite_geometry::format_number(self.time)
            ),
        }
    }

    pub fn from_legacy_parts(kind: &str, value: &str) -> Result<Time> {
        let frame = || {
            value
                .parse::<i32>()
                .map_err(|_| Error::Parse(format!("invalid frame '{}'", value)))
        };
        match kind {
            "ExactFrame" => Ok(Time::frame(frame()?)),
            "JustBeforeFrame" => Ok(Time::just_before(frame()?)),
            "JustAfterFrame" => Ok(Time::just_after(frame()?)),
            "FloatTime" => value
                .parse::<f64>()
                .map(Time::from_float)
                .map_err(|_| Error::Parse(format!("invalid time '{}'", value))),
            _ => Err(Error::Parse(format!("unknown time kind '{}'", kind))),
        }
    }
}

impl PartialEq for Time {
    fn eq(&self, other: &Self) -> bool {
        if self.kind != other.kind {
            return false;
        }
        match self.kind {
            TimeKind::FloatTime => self.time == other.time,
            _ => self.frame == other.frame,
        }
    }
}

impl PartialOrd for Time {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.kind != other.kind {
            return self.time.partial_cmp(&other.time);
        }
        match self.kind {
            TimeKind::FloatTime => self.time.partial_cmp(&other.time),
            _ => Some(self.frame.cmp(&other.frame)),
        }
    }
}

impl Add for Time {
    type Output = Time;

    fn add(self, rhs: Time) -> Time {
        if self.kind != rhs.kind || self.kind == TimeKind::FloatTime {
            Time::from_float(self.time + rhs.time)
        } else {
            Time::frame(self.frame + rhs.frame)
        }
    }
}

impl Sub for Time {
    type Output = Time;

    fn sub(self, rhs: Time) -> Time {
        if self.kind != rhs.kind || self.kind == TimeKind::FloatTime {
            Time::from_float(self.time - rhs.time)
        } else {
            Time::frame(self.frame - rhs.frame)
        }
    }
}

impl From<i32> for Time {
    fn from(f: i32) -> Time {
        Time::frame(f)
    }
}

impl From<f64> for Time {
    fn from(t: f64) -> Time {
        Time::from_float(t)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TimeKind::ExactFrame => write!(f, "{}", self.frame),
            TimeKind::JustBeforeFrame => write!(f, "{}-", self.frame),
            TimeKind::JustAfterFrame => write!(f, "{}+", self.frame),
            TimeKind::FloatTime => write!(f, "{}", self.time),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snaps_to_frames() {
        assert_eq!(Time::from_float(3.00001), Time::frame(3));
        assert_eq!(Time::from_float(2.99999), Time::frame(3));
        assert_eq!(Time::from_float(2.5).kind(), TimeKind::FloatTime);
    }

    #[test]
    fn ordering_across_kinds() {
        assert!(Time::just_before(3) < Time::frame(3));
        assert!(Time::frame(3) < Time::just_after(3));
        assert!(Time::from_float(2.5) < Time::frame(3));
        assert!(Time::frame(2) < Time::from_float(2.5));
        assert_ne!(Time::just_after(3), Time::frame(3));
    }

    #[test]
    fn arithmetic() {
        assert_eq!(Time::frame(5) - Time::frame(2), Time::frame(3));
        assert_eq!(Time::frame(1) + Time::from_float(0.5), Time::from_float(1.5));
    }

    #[test]
    fn legacy_form() {
        let t = Time::from_float(2.25);
        let s = t.to_legacy_string();
        let (kind, value) = s.split_once(' ').unwrap();
        assert_eq!(Time::from_legacy_parts(kind, value).unwrap(), t);
        assert_eq!(Time::frame(-4).to_legacy_string(), "ExactFrame -4");
    }
}
