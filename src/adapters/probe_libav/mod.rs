// Probe LibAV adapter - Keyframe enumeration through FFmpeg's demuxers

use std::path::Path;

use ffmpeg_next as ffmpeg;
use ffmpeg::codec::packet::Packet;
use ffmpeg::format::context::Input;
use ffmpeg::media::Type;
use tracing::debug;

use crate::domain::errors::DomainError;
use crate::domain::model::{ContainerInfo, KeyframeTimestamp, TimeSpec, Timebase};
use crate::ports::{KeyframeStream, ProbePort};

/// LibAV-based probing adapter
pub struct ProbeLibavAdapter;

impl ProbeLibavAdapter {
    /// Initialize FFmpeg and create the adapter
    pub fn new() -> Result<Self, DomainError> {
        ffmpeg::init().map_err(|e| DomainError::demux(format!("Failed to initialize FFmpeg: {}", e)))?;
        Ok(Self)
    }
}

/// Container start time (AV_TIME_BASE microseconds) in stream ticks.
///
/// ffmpeg measures an input `-ss` from this point, so keyframe times are
/// reported relative to it rather than to the video stream's own start.
fn container_start_ticks(start_us: i64, timebase: Timebase) -> i64 {
    if start_us == ffmpeg::ffi::AV_NOPTS_VALUE || timebase.num == 0 {
        return 0;
    }
    let ticks = start_us as i128 * timebase.den as i128 / (timebase.num as i128 * 1_000_000);
    i64::try_from(ticks).unwrap_or(0)
}

/// Keyframe packets of the best video stream, read one packet at a time
struct LibavKeyframeStream {
    input: Input,
    info: ContainerInfo,
    stream_index: usize,
    timebase: Timebase,
    start_offset: i64,
    done: bool,
}

impl LibavKeyframeStream {
    fn advance(&mut self) -> Result<Option<KeyframeTimestamp>, DomainError> {
        loop {
            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {}
                Err(ffmpeg::Error::Eof) => return Ok(None),
                Err(e) => return Err(DomainError::demux(format!("Failed to read packet: {}", e))),
            }

            if packet.stream() != self.stream_index || !packet.is_key() {
                continue;
            }

            let pts = packet
                .pts()
                .or_else(|| packet.dts())
                .ok_or_else(|| DomainError::demux("keyframe packet has no timestamp"))?
                .saturating_sub(self.start_offset);
            return Ok(Some(KeyframeTimestamp::new(
                self.stream_index as u64,
                pts,
                self.timebase.ticks_to_time(pts),
            )));
        }
    }
}

impl Iterator for LibavKeyframeStream {
    type Item = Result<KeyframeTimestamp, DomainError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.advance().transpose();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}

impl KeyframeStream for LibavKeyframeStream {
    fn info(&self) -> &ContainerInfo {
        &self.info
    }
}

impl ProbePort for ProbeLibavAdapter {
    fn name(&self) -> &'static str {
        "libav"
    }

    fn open_keyframes(&self, path: &Path) -> Result<Box<dyn KeyframeStream>, DomainError> {
        let display = path.display().to_string();
        if !path.is_file() {
            return Err(DomainError::open(&display, "not a regular file"));
        }

        let input = ffmpeg::format::input(&path).map_err(|e| DomainError::open(&display, e.to_string()))?;

        // SAFETY: the context pointer stays valid while `input` is alive
        let container_start = unsafe { (*input.as_ptr()).start_time };

        let (stream_index, timebase, codec) = {
            let stream = input
                .streams()
                .best(Type::Video)
                .ok_or_else(|| DomainError::NoVideoStream { path: display.clone() })?;
            let rational = stream.time_base();
            let timebase = u32::try_from(rational.numerator())
                .ok()
                .zip(u32::try_from(rational.denominator()).ok())
                .ok_or_else(|| DomainError::demux(format!("invalid stream timebase {}", rational)))
                .and_then(|(num, den)| Timebase::new(num, den))?;
            let codec = format!("{:?}", stream.parameters().id()).to_lowercase();
            (stream.index(), timebase, codec)
        };
        let start_offset = container_start_ticks(container_start, timebase);

        let duration = match input.duration() {
            d if d > 0 => Some(Timebase::av_time_base().ticks_to_time(d)),
            _ => None,
        };

        let info = ContainerInfo {
            path: display.clone(),
            format: input.format().name().to_string(),
            duration: duration.filter(|d| *d > TimeSpec::ZERO),
            video_stream: stream_index as u64,
            video_codec: Some(codec),
            stream_count: input.nb_streams() as usize,
        };

        debug!(
            path = %path.display(),
            stream = stream_index,
            start_offset,
            format = %info.format,
            "Opened container through libav"
        );

        Ok(Box::new(LibavKeyframeStream {
            input,
            info,
            stream_index,
            timebase,
            start_offset,
            done: false,
        }))
    }
}
