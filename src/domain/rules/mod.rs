// Domain rules - Keyframe ordering, cut-point resolution and GOP statistics

use serde::Serialize;

use crate::domain::errors::DomainError;
use crate::domain::model::{KeyframeTimestamp, TimeSpec};

/// Ordered, forward-only view over a prober's keyframe sequence.
///
/// Items must belong to the primary video stream and never go back in time;
/// the first violation is reported as a demux error and ends the sequence.
pub struct KeyframeIndex<I> {
    inner: I,
    stream: u64,
    last: Option<TimeSpec>,
    done: bool,
}

impl<I> KeyframeIndex<I>
where
    I: Iterator<Item = Result<KeyframeTimestamp, DomainError>>,
{
    pub fn new(stream: u64, inner: I) -> Self {
        Self {
            inner,
            stream,
            last: None,
            done: false,
        }
    }

    fn fail(&mut self, error: DomainError) -> Option<Result<KeyframeTimestamp, DomainError>> {
        self.done = true;
        Some(Err(error))
    }
}

impl<I> Iterator for KeyframeIndex<I>
where
    I: Iterator<Item = Result<KeyframeTimestamp, DomainError>>,
{
    type Item = Result<KeyframeTimestamp, DomainError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.inner.next() {
            None => {
                self.done = true;
                None
            }
            Some(Err(e)) => self.fail(e),
            Some(Ok(keyframe)) => {
                if keyframe.stream != self.stream {
                    return self.fail(DomainError::demux(format!(
                        "keyframe tagged with stream {} while indexing stream {}",
                        keyframe.stream, self.stream
                    )));
                }
                if let Some(last) = self.last {
                    if keyframe.time < last {
                        return self.fail(DomainError::demux(format!(
                            "keyframe timestamps out of order: {} after {}",
                            keyframe.time, last
                        )));
                    }
                }
                self.last = Some(keyframe.time);
                Some(Ok(keyframe))
            }
        }
    }
}

/// Maps a requested start time to the keyframe a stream copy must start from
pub struct KeyframeResolver;

impl KeyframeResolver {
    /// Return the greatest keyframe not later than `target`.
    ///
    /// The sequence must be in increasing time order. Scanning stops at the
    /// first keyframe past `target`, so the rest of the index is never read.
    pub fn resolve<I>(target: TimeSpec, keyframes: I) -> Result<KeyframeTimestamp, DomainError>
    where
        I: IntoIterator<Item = Result<KeyframeTimestamp, DomainError>>,
    {
        let mut first: Option<TimeSpec> = None;
        let mut best: Option<KeyframeTimestamp> = None;

        for item in keyframes {
            let keyframe = item?;
            if first.is_none() {
                first = Some(keyframe.time);
            }
            if keyframe.time > target {
                break;
            }
            best = Some(keyframe);
        }

        match (best, first) {
            (Some(keyframe), _) => Ok(keyframe),
            (None, Some(first)) => Err(DomainError::NoPrecedingKeyframe {
                requested: target,
                first,
            }),
            (None, None) => Err(DomainError::EmptyIndex),
        }
    }
}

/// Spacing statistics for a run of keyframes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GopSummary {
    pub keyframe_count: usize,
    pub first: Option<TimeSpec>,
    pub last: Option<TimeSpec>,
    pub min_interval: Option<TimeSpec>,
    pub mean_interval: Option<TimeSpec>,
    pub max_interval: Option<TimeSpec>,
    /// 1.0 for evenly spaced keyframes, towards 0.0 as spacing varies
    pub regularity: Option<f64>,
}

impl GopSummary {
    pub fn from_keyframes(keyframes: &[KeyframeTimestamp]) -> Self {
        let intervals: Vec<TimeSpec> = keyframes
            .windows(2)
            .map(|pair| pair[1].time.saturating_sub(pair[0].time))
            .collect();

        let (mean_interval, regularity) = if intervals.is_empty() {
            (None, None)
        } else {
            let total: u128 = intervals.iter().map(|i| i.as_nanos()).sum();
            let mean_nanos = total / intervals.len() as u128;
            let mean = TimeSpec::from_nanos(u64::try_from(mean_nanos).unwrap_or(u64::MAX));
            (Some(mean), Some(Self::regularity_score(&intervals, mean)))
        };

        Self {
            keyframe_count: keyframes.len(),
            first: keyframes.first().map(|k| k.time),
            last: keyframes.last().map(|k| k.time),
            min_interval: intervals.iter().min().copied(),
            mean_interval,
            max_interval: intervals.iter().max().copied(),
            regularity,
        }
    }

    fn regularity_score(intervals: &[TimeSpec], mean: TimeSpec) -> f64 {
        let mean = mean.as_seconds();
        if intervals.len() < 2 || mean <= 0.0 {
            return 1.0;
        }

        let variance = intervals
            .iter()
            .map(|i| (i.as_seconds() - mean).powi(2))
            .sum::<f64>()
            / intervals.len() as f64;
        let coefficient_of_variation = variance.sqrt() / mean;

        (-coefficient_of_variation * 5.0).exp().clamp(0.0, 1.0)
    }
}
