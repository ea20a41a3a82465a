//! ISO base media file (MP4/MOV) keyframe index.
//!
//! Keyframes are the sync samples (`stss`) of the first video track, or every
//! sample when the track has no sync sample table. Times come from the
//! decode durations (`stts`) plus composition offsets (`ctts`), shifted by the
//! track's edit list. Only `moov` is read; sample data is never touched.

use std::io::{Read, Seek, SeekFrom};

use tracing::debug;

use super::io_error;
use crate::domain::errors::DomainError;
use crate::domain::model::{ContainerInfo, KeyframeTimestamp, TimeSpec, Timebase};
use crate::ports::KeyframeStream;

/// Largest `moov` payload loaded into memory
const MAX_MOOV_SIZE: u64 = 512 * 1024 * 1024;

type FourCC = [u8; 4];

fn fourcc_str(code: &FourCC) -> String {
    String::from_utf8_lossy(code).into_owned()
}

/// Big-endian reader over a box payload
struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    context: &'static str,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8], context: &'static str) -> Self {
        Self { data, pos: 0, context }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DomainError> {
        if self.remaining() < n {
            return Err(DomainError::demux(format!("{} box is truncated", self.context)));
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn skip(&mut self, n: usize) -> Result<(), DomainError> {
        self.take(n).map(|_| ())
    }

    fn u8(&mut self) -> Result<u8, DomainError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, DomainError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64, DomainError> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
    }

    fn i32(&mut self) -> Result<i32, DomainError> {
        Ok(self.u32()? as i32)
    }

    fn i64(&mut self) -> Result<i64, DomainError> {
        Ok(self.u64()? as i64)
    }

    fn fourcc(&mut self) -> Result<FourCC, DomainError> {
        let b = self.take(4)?;
        Ok([b[0], b[1], b[2], b[3]])
    }

    /// Full-box header; returns the version
    fn version_flags(&mut self) -> Result<u8, DomainError> {
        let version = self.u8()?;
        self.skip(3)?;
        Ok(version)
    }

    /// Entry count checked against the bytes left in the box
    fn entry_count(&mut self, entry_size: usize) -> Result<usize, DomainError> {
        let count = self.u32()? as usize;
        match count.checked_mul(entry_size) {
            Some(needed) if needed <= self.remaining() => Ok(count),
            _ => Err(DomainError::demux(format!(
                "{} entry count {} exceeds box size",
                self.context, count
            ))),
        }
    }
}

/// Child boxes of an in-memory container box
struct Children<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Children<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn header(&self) -> Result<(FourCC, usize, usize), DomainError> {
        let rest = &self.data[self.pos..];
        if rest.len() < 8 {
            return Err(DomainError::demux(format!(
                "truncated box header at offset {} of parent",
                self.pos
            )));
        }
        let size = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]) as u64;
        let kind = [rest[4], rest[5], rest[6], rest[7]];
        let (size, header_len) = match size {
            0 => (rest.len() as u64, 8),
            1 => {
                if rest.len() < 16 {
                    return Err(DomainError::demux("truncated 64-bit box header"));
                }
                let large = u64::from_be_bytes([
                    rest[8], rest[9], rest[10], rest[11], rest[12], rest[13], rest[14], rest[15],
                ]);
                (large, 16)
            }
            n => (n, 8),
        };
        if size < header_len as u64 || size > rest.len() as u64 {
            return Err(DomainError::demux(format!(
                "box {} overruns its parent",
                fourcc_str(&kind)
            )));
        }
        Ok((kind, header_len, size as usize))
    }
}

impl<'a> Iterator for Children<'a> {
    type Item = Result<(FourCC, &'a [u8]), DomainError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.data.len() {
            return None;
        }
        match self.header() {
            Ok((kind, header_len, size)) => {
                let body = &self.data[self.pos + header_len..self.pos + size];
                self.pos += size;
                Some(Ok((kind, body)))
            }
            Err(e) => {
                self.pos = self.data.len();
                Some(Err(e))
            }
        }
    }
}

fn find_child<'a>(data: &'a [u8], kind: &FourCC) -> Result<Option<&'a [u8]>, DomainError> {
    for child in Children::new(data) {
        let (found, body) = child?;
        if &found == kind {
            return Ok(Some(body));
        }
    }
    Ok(None)
}

fn require_child<'a>(data: &'a [u8], kind: &FourCC) -> Result<&'a [u8], DomainError> {
    find_child(data, kind)?.ok_or_else(|| {
        DomainError::demux(format!("video track is missing its {} box", fourcc_str(kind)))
    })
}

/// Walk top-level boxes until `moov`; returns the `ftyp` major brand and the `moov` payload
fn read_moov<R: Read + Seek>(reader: &mut R, len: u64) -> Result<(Option<FourCC>, Vec<u8>), DomainError> {
    let mut pos = 0u64;
    let mut brand = None;

    while pos < len {
        if len - pos < 8 {
            return Err(DomainError::demux(format!("truncated box header at offset {}", pos)));
        }
        reader.seek(SeekFrom::Start(pos)).map_err(io_error)?;
        let mut header = [0u8; 8];
        reader.read_exact(&mut header).map_err(io_error)?;

        let size = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as u64;
        let kind = [header[4], header[5], header[6], header[7]];
        let (size, header_len) = match size {
            0 => (len - pos, 8u64),
            1 => {
                let mut large = [0u8; 8];
                reader.read_exact(&mut large).map_err(io_error)?;
                (u64::from_be_bytes(large), 16u64)
            }
            n => (n, 8u64),
        };
        if size < header_len {
            return Err(DomainError::demux(format!(
                "invalid size for box {} at offset {}",
                fourcc_str(&kind),
                pos
            )));
        }
        let body_len = size - header_len;

        match &kind {
            b"moov" => {
                if pos.saturating_add(size) > len {
                    return Err(DomainError::demux("moov box is truncated"));
                }
                if body_len > MAX_MOOV_SIZE {
                    return Err(DomainError::demux(format!(
                        "moov box of {} bytes exceeds the {} byte limit",
                        body_len, MAX_MOOV_SIZE
                    )));
                }
                let mut body = vec![0u8; body_len as usize];
                reader.read_exact(&mut body).map_err(io_error)?;
                return Ok((brand, body));
            }
            b"ftyp" if body_len >= 4 => {
                let mut major = [0u8; 4];
                reader.read_exact(&mut major).map_err(io_error)?;
                brand = Some(major);
            }
            _ => {}
        }

        pos = pos.saturating_add(size);
    }

    Err(DomainError::demux(
        "no moov box found; the file is truncated or fragmented",
    ))
}

/// Movie-level header values
struct MovieHeader {
    timescale: u32,
    duration: u64,
}

fn parse_mvhd(moov: &[u8]) -> Result<MovieHeader, DomainError> {
    let mvhd = find_child(moov, b"mvhd")?.ok_or_else(|| DomainError::demux("moov is missing mvhd"))?;
    let mut r = ByteReader::new(mvhd, "mvhd");
    let version = r.version_flags()?;
    if version == 1 {
        r.skip(16)?;
        Ok(MovieHeader {
            timescale: r.u32()?,
            duration: r.u64()?,
        })
    } else {
        r.skip(8)?;
        Ok(MovieHeader {
            timescale: r.u32()?,
            duration: r.u32()? as u64,
        })
    }
}

fn handler_of(trak: &[u8]) -> Result<Option<FourCC>, DomainError> {
    let Some(mdia) = find_child(trak, b"mdia")? else {
        return Ok(None);
    };
    let Some(hdlr) = find_child(mdia, b"hdlr")? else {
        return Ok(None);
    };
    let mut r = ByteReader::new(hdlr, "hdlr");
    r.version_flags()?;
    r.skip(4)?;
    Ok(Some(r.fourcc()?))
}

/// Video track tables needed for keyframe timing
struct VideoTrack {
    track_id: u32,
    timescale: u32,
    duration: u64,
    codec: Option<String>,
    stts: Vec<(u32, u32)>,
    stss: Option<Vec<u32>>,
    ctts: Vec<(u32, i32)>,
    edit_offset: i64,
}

fn parse_video_track(trak: &[u8], movie: &MovieHeader) -> Result<VideoTrack, DomainError> {
    let tkhd = require_child(trak, b"tkhd")?;
    let mut r = ByteReader::new(tkhd, "tkhd");
    let version = r.version_flags()?;
    r.skip(if version == 1 { 16 } else { 8 })?;
    let track_id = r.u32()?;

    let mdia = require_child(trak, b"mdia")?;
    let mdhd = require_child(mdia, b"mdhd")?;
    let mut r = ByteReader::new(mdhd, "mdhd");
    let (timescale, duration) = if r.version_flags()? == 1 {
        r.skip(16)?;
        (r.u32()?, r.u64()?)
    } else {
        r.skip(8)?;
        (r.u32()?, r.u32()? as u64)
    };
    if timescale == 0 {
        return Err(DomainError::demux("video track has a zero timescale"));
    }

    let minf = require_child(mdia, b"minf")?;
    let stbl = require_child(minf, b"stbl")?;

    let codec = match find_child(stbl, b"stsd")? {
        Some(stsd) => parse_stsd(stsd)?,
        None => None,
    };
    let stts = parse_stts(require_child(stbl, b"stts")?)?;
    let stss = find_child(stbl, b"stss")?.map(parse_stss).transpose()?;
    let ctts = match find_child(stbl, b"ctts")? {
        Some(ctts) => parse_ctts(ctts)?,
        None => Vec::new(),
    };
    let edit_offset = match find_child(trak, b"edts")? {
        Some(edts) => match find_child(edts, b"elst")? {
            Some(elst) => parse_elst(elst, movie.timescale, timescale)?,
            None => 0,
        },
        None => 0,
    };

    Ok(VideoTrack {
        track_id,
        timescale,
        duration,
        codec,
        stts,
        stss,
        ctts,
        edit_offset,
    })
}

fn parse_stsd(stsd: &[u8]) -> Result<Option<String>, DomainError> {
    let mut r = ByteReader::new(stsd, "stsd");
    r.version_flags()?;
    if r.u32()? == 0 {
        return Ok(None);
    }
    r.skip(4)?;
    Ok(Some(fourcc_str(&r.fourcc()?)))
}

fn parse_stts(stts: &[u8]) -> Result<Vec<(u32, u32)>, DomainError> {
    let mut r = ByteReader::new(stts, "stts");
    r.version_flags()?;
    let count = r.entry_count(8)?;
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        entries.push((r.u32()?, r.u32()?));
    }
    Ok(entries)
}

fn parse_stss(stss: &[u8]) -> Result<Vec<u32>, DomainError> {
    let mut r = ByteReader::new(stss, "stss");
    r.version_flags()?;
    let count = r.entry_count(4)?;
    let mut samples = Vec::with_capacity(count);
    for _ in 0..count {
        samples.push(r.u32()?);
    }
    Ok(samples)
}

fn parse_ctts(ctts: &[u8]) -> Result<Vec<(u32, i32)>, DomainError> {
    let mut r = ByteReader::new(ctts, "ctts");
    r.version_flags()?;
    let count = r.entry_count(8)?;
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        // Version 0 offsets are unsigned on paper; writers store negatives anyway.
        entries.push((r.u32()?, r.i32()?));
    }
    Ok(entries)
}

/// Offset in media ticks from composition time to presentation time
fn parse_elst(elst: &[u8], movie_timescale: u32, media_timescale: u32) -> Result<i64, DomainError> {
    let mut r = ByteReader::new(elst, "elst");
    let version = r.version_flags()?;
    let count = r.entry_count(if version == 1 { 20 } else { 12 })?;

    let mut delay = 0u64;
    for _ in 0..count {
        let (segment_duration, media_time) = if version == 1 {
            (r.u64()?, r.i64()?)
        } else {
            (r.u32()? as u64, r.i32()? as i64)
        };
        r.skip(4)?;

        if media_time == -1 {
            delay = delay.saturating_add(segment_duration);
            continue;
        }

        let delay_media = if movie_timescale == 0 {
            0
        } else {
            i64::try_from(delay as i128 * media_timescale as i128 / movie_timescale as i128)
                .unwrap_or(i64::MAX)
        };
        return Ok(delay_media.saturating_sub(media_time));
    }

    Ok(0)
}

/// Forward-only decode time lookup over `stts` runs
struct DecodeTimes {
    entries: Vec<(u32, u32)>,
    entry: usize,
    entry_first: u64,
    entry_base: u64,
}

impl DecodeTimes {
    fn new(entries: Vec<(u32, u32)>) -> Self {
        Self {
            entries,
            entry: 0,
            entry_first: 1,
            entry_base: 0,
        }
    }

    fn sample_count(&self) -> u64 {
        self.entries.iter().map(|(count, _)| *count as u64).sum()
    }

    /// Decode time of a 1-based sample number not lower than any asked before
    fn dts(&mut self, sample: u64) -> Option<u64> {
        while let Some(&(count, delta)) = self.entries.get(self.entry) {
            let count = count as u64;
            if sample < self.entry_first + count {
                let within = (sample - self.entry_first).saturating_mul(delta as u64);
                return Some(self.entry_base.saturating_add(within));
            }
            self.entry_first += count;
            self.entry_base = self
                .entry_base
                .saturating_add(count.saturating_mul(delta as u64));
            self.entry += 1;
        }
        None
    }
}

/// Forward-only composition offset lookup over `ctts` runs
struct CompositionOffsets {
    entries: Vec<(u32, i32)>,
    entry: usize,
    entry_first: u64,
}

impl CompositionOffsets {
    fn new(entries: Vec<(u32, i32)>) -> Self {
        Self {
            entries,
            entry: 0,
            entry_first: 1,
        }
    }

    fn offset(&mut self, sample: u64) -> i32 {
        while let Some(&(count, offset)) = self.entries.get(self.entry) {
            if sample < self.entry_first + count as u64 {
                return offset;
            }
            self.entry_first += count as u64;
            self.entry += 1;
        }
        0
    }
}

enum SyncSamples {
    Listed { samples: Vec<u32>, next: usize },
    Every { next: u64 },
}

/// Keyframes of the first video track of an MP4/MOV file
pub(super) struct Mp4KeyframeStream {
    info: ContainerInfo,
    track_id: u64,
    timebase: Timebase,
    sync: SyncSamples,
    decode_times: DecodeTimes,
    composition: CompositionOffsets,
    edit_offset: i64,
    sample_count: u64,
    last_sample: u64,
    done: bool,
}

impl Mp4KeyframeStream {
    fn advance(&mut self) -> Result<Option<KeyframeTimestamp>, DomainError> {
        let sample = match &mut self.sync {
            SyncSamples::Listed { samples, next } => {
                let Some(&sample) = samples.get(*next) else {
                    return Ok(None);
                };
                *next += 1;
                sample as u64
            }
            SyncSamples::Every { next } => {
                if *next > self.sample_count {
                    return Ok(None);
                }
                let sample = *next;
                *next += 1;
                sample
            }
        };

        if sample == 0 || sample <= self.last_sample {
            return Err(DomainError::demux("sync sample table is not strictly increasing"));
        }
        if sample > self.sample_count {
            return Err(DomainError::demux(format!(
                "sync sample {} is beyond the {} samples of the track",
                sample, self.sample_count
            )));
        }
        self.last_sample = sample;

        let dts = self
            .decode_times
            .dts(sample)
            .ok_or_else(|| DomainError::demux(format!("no decode time for sample {}", sample)))?;
        let pts = i64::try_from(dts)
            .unwrap_or(i64::MAX)
            .saturating_add(self.composition.offset(sample) as i64)
            .saturating_add(self.edit_offset);

        Ok(Some(KeyframeTimestamp::new(
            self.track_id,
            pts,
            self.timebase.ticks_to_time(pts),
        )))
    }
}

impl Iterator for Mp4KeyframeStream {
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

impl KeyframeStream for Mp4KeyframeStream {
    fn info(&self) -> &ContainerInfo {
        &self.info
    }
}

/// Read `moov` and position a keyframe stream on the first video track
pub(super) fn open<R: Read + Seek>(mut reader: R, path: &str) -> Result<Mp4KeyframeStream, DomainError> {
    let len = reader.seek(SeekFrom::End(0)).map_err(io_error)?;
    let (brand, moov) = read_moov(&mut reader, len)?;
    let movie = parse_mvhd(&moov)?;

    let mut traks = Vec::new();
    for child in Children::new(&moov) {
        let (kind, body) = child?;
        if &kind == b"trak" {
            traks.push(body);
        }
    }

    let mut video = None;
    for trak in &traks {
        if handler_of(trak)? == Some(*b"vide") {
            video = Some(*trak);
            break;
        }
    }
    let trak = video.ok_or_else(|| DomainError::NoVideoStream {
        path: path.to_string(),
    })?;
    let track = parse_video_track(trak, &movie)?;

    let duration = if movie.timescale > 0 && movie.duration > 0 && movie.duration != u32::MAX as u64 {
        Some(Timebase::from_timescale(movie.timescale)?.ticks_to_time(movie.duration as i64))
    } else if track.duration > 0 {
        Some(Timebase::from_timescale(track.timescale)?.ticks_to_time(track.duration as i64))
    } else {
        None
    };

    let format = match brand.as_ref() {
        Some(b"qt  ") => "mov",
        _ => "mp4",
    };

    let decode_times = DecodeTimes::new(track.stts);
    let sample_count = decode_times.sample_count();

    debug!(
        track_id = track.track_id,
        timescale = track.timescale,
        samples = sample_count,
        sync_samples = track.stss.as_ref().map(Vec::len),
        edit_offset = track.edit_offset,
        "Indexed MP4 video track"
    );

    let sync = match track.stss {
        Some(samples) => SyncSamples::Listed { samples, next: 0 },
        None => SyncSamples::Every { next: 1 },
    };

    Ok(Mp4KeyframeStream {
        info: ContainerInfo {
            path: path.to_string(),
            format: format.to_string(),
            duration: duration.filter(|d| *d > TimeSpec::ZERO),
            video_stream: track.track_id as u64,
            video_codec: track.codec,
            stream_count: traks.len(),
        },
        track_id: track.track_id as u64,
        timebase: Timebase::from_timescale(track.timescale)?,
        sync,
        decode_times,
        composition: CompositionOffsets::new(track.ctts),
        edit_offset: track.edit_offset,
        sample_count,
        last_sample: 0,
        done: false,
    })
}
