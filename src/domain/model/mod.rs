// Domain models - Core types and data structures

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::domain::errors::DomainError;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Point in time since container start, with nanosecond precision.
///
/// Never negative. Ordering is exact, so a keyframe read from an index
/// compares equal to the same instant parsed from user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimeSpec {
    inner: Duration,
}

impl TimeSpec {
    pub const ZERO: TimeSpec = TimeSpec {
        inner: Duration::ZERO,
    };

    pub const MAX: TimeSpec = TimeSpec {
        inner: Duration::MAX,
    };

    /// Create a new TimeSpec from seconds. Negative and non-finite values become zero.
    pub fn from_seconds(seconds: f64) -> Self {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Self::ZERO;
        }
        // Nearest nanosecond, so 4.04 parses to the same instant a 90 kHz index yields
        let nanos = (seconds * NANOS_PER_SEC as f64).round();
        if nanos >= u64::MAX as f64 {
            return Self::from_nanos(u64::MAX);
        }
        Self::from_nanos(nanos as u64)
    }

    /// Create a new TimeSpec from hours, minutes, seconds, milliseconds
    pub fn from_components(hours: u32, minutes: u32, seconds: u32, milliseconds: u32) -> Self {
        let secs = hours as u64 * 3600 + minutes as u64 * 60 + seconds as u64;
        Self {
            inner: Duration::from_secs(secs) + Duration::from_millis(milliseconds as u64),
        }
    }

    pub fn from_nanos(nanos: u64) -> Self {
        Self {
            inner: Duration::from_nanos(nanos),
        }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self {
            inner: Duration::from_millis(millis),
        }
    }

    /// Convert from Duration
    pub fn from_duration(duration: Duration) -> Self {
        Self { inner: duration }
    }

    /// Convert to Duration
    pub fn to_duration(&self) -> Duration {
        self.inner
    }

    pub fn as_seconds(&self) -> f64 {
        self.inner.as_secs_f64()
    }

    pub fn as_nanos(&self) -> u128 {
        self.inner.as_nanos()
    }

    pub fn saturating_sub(&self, other: TimeSpec) -> TimeSpec {
        Self {
            inner: self.inner.saturating_sub(other.inner),
        }
    }

    /// Parse time string in various formats
    pub fn parse(time_str: &str) -> Result<Self, DomainError> {
        let trimmed = time_str.trim();
        if trimmed.is_empty() {
            return Err(DomainError::BadArgs("Time cannot be empty".to_string()));
        }

        let parts: Vec<&str> = trimmed.split(':').collect();
        match parts.len() {
            1 => Self::parse_seconds(parts[0], false),
            2 => {
                // MM:SS.ms format
                let minutes = parts[0]
                    .parse::<u32>()
                    .map_err(|_| DomainError::BadArgs(format!("Invalid minutes in '{}'", trimmed)))?;
                let seconds = Self::parse_seconds(parts[1], true)?;
                Ok(Self::from_components(0, minutes, 0, 0).plus(seconds))
            }
            3 => {
                // HH:MM:SS.ms format
                let hours = parts[0]
                    .parse::<u32>()
                    .map_err(|_| DomainError::BadArgs(format!("Invalid hours in '{}'", trimmed)))?;
                let minutes = parts[1]
                    .parse::<u32>()
                    .map_err(|_| DomainError::BadArgs(format!("Invalid minutes in '{}'", trimmed)))?;
                if minutes >= 60 {
                    return Err(DomainError::BadArgs("Minutes must be less than 60".to_string()));
                }
                let seconds = Self::parse_seconds(parts[2], true)?;
                Ok(Self::from_components(hours, minutes, 0, 0).plus(seconds))
            }
            _ => Err(DomainError::BadArgs(format!(
                "Invalid time format '{}'. Supported formats: seconds (e.g., 123.45), MM:SS.ms (e.g., 2:30.5), HH:MM:SS.ms (e.g., 1:02:30.5)",
                trimmed
            ))),
        }
    }

    fn parse_seconds(field: &str, bounded: bool) -> Result<Self, DomainError> {
        let seconds = field
            .parse::<f64>()
            .map_err(|_| DomainError::BadArgs(format!("Invalid seconds '{}'", field)))?;
        if !seconds.is_finite() {
            return Err(DomainError::BadArgs(format!("Invalid seconds '{}'", field)));
        }
        if seconds < 0.0 {
            return Err(DomainError::BadArgs("Time cannot be negative".to_string()));
        }
        if bounded && seconds >= 60.0 {
            return Err(DomainError::BadArgs("Seconds must be less than 60".to_string()));
        }
        Ok(Self::from_seconds(seconds))
    }

    fn plus(self, other: TimeSpec) -> TimeSpec {
        Self {
            inner: self.inner.saturating_add(other.inner),
        }
    }

    /// Format as [H:]MM:SS.mmm
    pub fn format_hms(&self) -> String {
        let total_ms = self.inner.as_millis();
        let hours = total_ms / 3_600_000;
        let minutes = (total_ms % 3_600_000) / 60_000;
        let seconds = (total_ms % 60_000) / 1000;
        let milliseconds = total_ms % 1000;

        if hours > 0 {
            format!("{}:{:02}:{:02}.{:03}", hours, minutes, seconds, milliseconds)
        } else {
            format!("{:02}:{:02}.{:03}", minutes, seconds, milliseconds)
        }
    }

    /// Format as decimal seconds for a seek argument.
    ///
    /// Rounded up to the microsecond: seeking never lands before the instant,
    /// so a keyframe boundary stays on its own keyframe.
    pub fn format_seek_arg(&self) -> String {
        let micros = self.inner.as_nanos().div_ceil(1000);
        format!("{}.{:06}", micros / 1_000_000, micros % 1_000_000)
    }
}

impl fmt::Display for TimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_hms())
    }
}

impl Serialize for TimeSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_seconds())
    }
}

/// Timebase for timestamp calculations - seconds per tick as a rational number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Timebase {
    pub num: u32,
    pub den: u32,
}

impl Timebase {
    /// Create a new timebase
    pub fn new(num: u32, den: u32) -> Result<Self, DomainError> {
        if den == 0 {
            return Err(DomainError::BadArgs("Timebase denominator cannot be zero".to_string()));
        }
        Ok(Self { num, den })
    }

    /// Timebase of a track counting `timescale` ticks per second
    pub fn from_timescale(timescale: u32) -> Result<Self, DomainError> {
        Self::new(1, timescale)
    }

    /// Convert a tick count to a time. Ticks before zero clamp to zero.
    pub fn ticks_to_time(&self, ticks: i64) -> TimeSpec {
        if ticks <= 0 {
            return TimeSpec::ZERO;
        }
        let nanos = ticks as i128 * self.num as i128 * NANOS_PER_SEC as i128 / self.den as i128;
        TimeSpec::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    pub fn to_seconds(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    pub fn av_time_base() -> Self {
        Self { num: 1, den: 1_000_000 }
    }
}

/// A keyframe of the primary video stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeyframeTimestamp {
    /// Stream or track identifier inside the container
    pub stream: u64,
    /// Presentation timestamp in stream ticks
    pub pts: i64,
    /// Presentation time since container start
    pub time: TimeSpec,
}

impl KeyframeTimestamp {
    pub fn new(stream: u64, pts: i64, time: TimeSpec) -> Self {
        Self { stream, pts, time }
    }
}

/// Metadata gathered while opening a container
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerInfo {
    pub path: String,
    /// Container format name (e.g. "mp4", "matroska")
    pub format: String,
    pub duration: Option<TimeSpec>,
    /// Identifier of the primary video stream
    pub video_stream: u64,
    pub video_codec: Option<String>,
    pub stream_count: usize,
}

/// Trim range requested by the selection layer
#[derive(Debug, Clone, PartialEq)]
pub struct TrimRequest {
    pub source: PathBuf,
    pub start: TimeSpec,
    pub stop: TimeSpec,
}

impl TrimRequest {
    /// Create a new trim request; start must precede stop
    pub fn new(source: impl Into<PathBuf>, start: TimeSpec, stop: TimeSpec) -> Result<Self, DomainError> {
        if start >= stop {
            return Err(DomainError::InvalidRequest(format!(
                "start ({}) must be before stop ({})",
                start, stop
            )));
        }
        Ok(Self {
            source: source.into(),
            start,
            stop,
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

/// Trim range whose start sits on a keyframe
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedTrim {
    pub source: PathBuf,
    /// Keyframe time used as the stream-copy start
    pub start: TimeSpec,
    pub requested_start: TimeSpec,
    pub stop: TimeSpec,
    pub keyframe: KeyframeTimestamp,
}

impl ResolvedTrim {
    /// Length to copy once the input has been seeked to the keyframe
    pub fn copy_duration(&self) -> TimeSpec {
        self.stop.saturating_sub(self.start)
    }

    /// How far the start moved back to reach the keyframe
    pub fn start_shift(&self) -> TimeSpec {
        self.requested_start.saturating_sub(self.start)
    }
}

/// In/out selection of a loaded media file, bounded by its duration
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentSelection {
    duration: TimeSpec,
    start: TimeSpec,
    stop: TimeSpec,
}

impl FragmentSelection {
    /// Whole-file selection
    pub fn new(duration: TimeSpec) -> Self {
        Self {
            duration,
            start: TimeSpec::ZERO,
            stop: duration,
        }
    }

    pub fn start(&self) -> TimeSpec {
        self.start
    }

    pub fn stop(&self) -> TimeSpec {
        self.stop
    }

    pub fn duration(&self) -> TimeSpec {
        self.duration
    }

    /// Move the in point; clamps to the duration and must stay before the out point
    pub fn set_start(&mut self, start: TimeSpec) -> Result<(), DomainError> {
        let start = start.min(self.duration);
        if start >= self.stop {
            return Err(DomainError::InvalidRequest(format!(
                "start ({}) must be before stop ({})",
                start, self.stop
            )));
        }
        self.start = start;
        Ok(())
    }

    /// Move the out point; clamps to the duration and must stay after the in point
    pub fn set_stop(&mut self, stop: TimeSpec) -> Result<(), DomainError> {
        let stop = stop.min(self.duration);
        if stop <= self.start {
            return Err(DomainError::InvalidRequest(format!(
                "stop ({}) must be after start ({})",
                stop, self.start
            )));
        }
        self.stop = stop;
        Ok(())
    }
}
