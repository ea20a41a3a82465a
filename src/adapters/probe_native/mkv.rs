//! Matroska / WebM keyframe index.
//!
//! Metadata (`Info`, `Tracks`) is read up front. Clusters are then streamed
//! one element at a time: only block headers are read, payloads are skipped.

use std::io::{BufReader, Read, Seek, SeekFrom};

use tracing::debug;

use super::io_error;
use crate::domain::errors::DomainError;
use crate::domain::model::{ContainerInfo, KeyframeTimestamp, TimeSpec, Timebase};
use crate::ports::KeyframeStream;

const EBML_HEADER: u32 = 0x1A45_DFA3;
const DOC_TYPE: u32 = 0x4282;
const SEGMENT: u32 = 0x1853_8067;
const INFO: u32 = 0x1549_A966;
const TIMESTAMP_SCALE: u32 = 0x2A_D7B1;
const DURATION: u32 = 0x4489;
const TRACKS: u32 = 0x1654_AE6B;
const TRACK_ENTRY: u32 = 0xAE;
const TRACK_NUMBER: u32 = 0xD7;
const TRACK_TYPE: u32 = 0x83;
const CODEC_ID: u32 = 0x86;
const CLUSTER: u32 = 0x1F43_B675;
const CLUSTER_TIMESTAMP: u32 = 0xE7;
const SIMPLE_BLOCK: u32 = 0xA3;
const BLOCK_GROUP: u32 = 0xA0;
const BLOCK: u32 = 0xA1;
const REFERENCE_BLOCK: u32 = 0xFB;

const TRACK_TYPE_VIDEO: u64 = 1;
const KEYFRAME_FLAG: u8 = 0x80;
const DEFAULT_TIMESTAMP_SCALE: u64 = 1_000_000;
const MAX_STRING_SIZE: u64 = 4096;

/// Element header position and size; `size` is `None` for unknown-size elements
#[derive(Debug, Clone, Copy)]
struct Element {
    id: u32,
    size: Option<u64>,
    start: u64,
    data_start: u64,
}

impl Element {
    fn end(&self) -> Option<u64> {
        self.size.map(|size| self.data_start.saturating_add(size))
    }
}

#[derive(Debug, Clone, Copy)]
struct BlockHeader {
    track: u64,
    timecode: i16,
    flags: u8,
}

#[derive(Debug, Clone)]
struct TrackEntry {
    number: u64,
    track_type: u64,
    codec_id: Option<String>,
}

/// EBML element reader that tracks its own offset
struct EbmlReader<R> {
    inner: BufReader<R>,
    pos: u64,
    len: u64,
}

impl<R: Read + Seek> EbmlReader<R> {
    fn new(mut inner: R) -> Result<Self, DomainError> {
        let len = inner.seek(SeekFrom::End(0)).map_err(io_error)?;
        inner.seek(SeekFrom::Start(0)).map_err(io_error)?;
        Ok(Self {
            inner: BufReader::new(inner),
            pos: 0,
            len,
        })
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), DomainError> {
        self.inner.read_exact(buf).map_err(io_error)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn read_u8(&mut self) -> Result<u8, DomainError> {
        let mut byte = [0u8; 1];
        self.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    /// Variable-length integer; returns the value and whether every value bit was set
    fn read_vint(&mut self, keep_marker: bool, max_len: u32, what: &str) -> Result<(u64, bool), DomainError> {
        let offset = self.pos;
        let first = self.read_u8()?;
        let len = first.leading_zeros() + 1;
        if len > max_len {
            return Err(DomainError::demux(format!("invalid {} at offset {}", what, offset)));
        }

        let mask = (0xFFu32 >> len) as u8;
        let mut value = if keep_marker { first as u64 } else { (first & mask) as u64 };
        let mut all_ones = first & mask == mask;
        for _ in 1..len {
            let byte = self.read_u8()?;
            value = (value << 8) | byte as u64;
            all_ones &= byte == 0xFF;
        }
        Ok((value, all_ones))
    }

    /// Next element header, or `None` at end of file
    fn read_header(&mut self) -> Result<Option<Element>, DomainError> {
        if self.pos >= self.len {
            return Ok(None);
        }
        let start = self.pos;
        let (id, _) = self.read_vint(true, 4, "element id")?;
        let (size, unknown) = self.read_vint(false, 8, "element size")?;
        Ok(Some(Element {
            id: id as u32,
            size: if unknown { None } else { Some(size) },
            start,
            data_start: self.pos,
        }))
    }

    fn known_end(&self, element: &Element) -> Result<u64, DomainError> {
        element.end().ok_or_else(|| {
            DomainError::demux(format!(
                "element {:#x} at offset {} has unknown size",
                element.id, element.start
            ))
        })
    }

    fn seek_to(&mut self, offset: u64) -> Result<(), DomainError> {
        if offset > self.len {
            return Err(DomainError::demux(format!(
                "element runs past the end of the file at offset {}",
                offset
            )));
        }
        if offset != self.pos {
            let delta = offset as i128 - self.pos as i128;
            let delta = i64::try_from(delta)
                .map_err(|_| DomainError::demux(format!("cannot seek to offset {}", offset)))?;
            self.inner.seek_relative(delta).map_err(io_error)?;
            self.pos = offset;
        }
        Ok(())
    }

    fn skip(&mut self, element: &Element) -> Result<(), DomainError> {
        let end = self.known_end(element)?;
        self.seek_to(end)
    }

    /// Header of a child element that must end inside `parent_end`
    fn read_child(&mut self, parent_end: u64) -> Result<(Element, u64), DomainError> {
        let child = self
            .read_header()?
            .ok_or_else(|| DomainError::demux("element is truncated"))?;
        let end = self.known_end(&child)?;
        if end > parent_end {
            return Err(DomainError::demux(format!(
                "element {:#x} at offset {} overruns its parent",
                child.id, child.start
            )));
        }
        Ok((child, end))
    }

    fn read_uint(&mut self, element: &Element) -> Result<u64, DomainError> {
        let size = element.size.unwrap_or(u64::MAX);
        if size > 8 {
            return Err(DomainError::demux(format!(
                "unsigned integer element {:#x} has size {}",
                element.id, size
            )));
        }
        let mut value = 0u64;
        for _ in 0..size {
            value = (value << 8) | self.read_u8()? as u64;
        }
        Ok(value)
    }

    fn read_float(&mut self, element: &Element) -> Result<f64, DomainError> {
        match element.size {
            Some(0) => Ok(0.0),
            Some(4) => {
                let mut bytes = [0u8; 4];
                self.read_exact(&mut bytes)?;
                Ok(f32::from_be_bytes(bytes) as f64)
            }
            Some(8) => {
                let mut bytes = [0u8; 8];
                self.read_exact(&mut bytes)?;
                Ok(f64::from_be_bytes(bytes))
            }
            other => Err(DomainError::demux(format!(
                "float element {:#x} has size {:?}",
                element.id, other
            ))),
        }
    }

    fn read_string(&mut self, element: &Element) -> Result<String, DomainError> {
        let size = element.size.unwrap_or(u64::MAX);
        if size > MAX_STRING_SIZE {
            return Err(DomainError::demux(format!(
                "string element {:#x} has size {}",
                element.id, size
            )));
        }
        let mut bytes = vec![0u8; size as usize];
        self.read_exact(&mut bytes)?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(text.trim_end_matches('\0').to_string())
    }

    fn read_block_header(&mut self, element: &Element) -> Result<BlockHeader, DomainError> {
        let end = self.known_end(element)?;
        let (track, _) = self.read_vint(false, 8, "block track number")?;
        let mut timecode = [0u8; 2];
        self.read_exact(&mut timecode)?;
        let flags = self.read_u8()?;
        if self.pos > end {
            return Err(DomainError::demux(format!(
                "block header at offset {} overruns its block",
                element.start
            )));
        }
        Ok(BlockHeader {
            track,
            timecode: i16::from_be_bytes(timecode),
            flags,
        })
    }

    fn read_doc_type(&mut self, header: &Element) -> Result<String, DomainError> {
        let end = self.known_end(header)?;
        let mut doc_type = "matroska".to_string();
        while self.pos < end {
            let (child, child_end) = self.read_child(end)?;
            if child.id == DOC_TYPE {
                doc_type = self.read_string(&child)?;
            }
            self.seek_to(child_end)?;
        }
        Ok(doc_type)
    }

    fn read_info(&mut self, info: &Element) -> Result<(u64, Option<f64>), DomainError> {
        let end = self.known_end(info)?;
        let mut scale = DEFAULT_TIMESTAMP_SCALE;
        let mut duration = None;
        while self.pos < end {
            let (child, child_end) = self.read_child(end)?;
            match child.id {
                TIMESTAMP_SCALE => scale = self.read_uint(&child)?,
                DURATION => duration = Some(self.read_float(&child)?),
                _ => {}
            }
            self.seek_to(child_end)?;
        }
        Ok((scale, duration))
    }

    fn read_tracks(&mut self, tracks: &Element) -> Result<Vec<TrackEntry>, DomainError> {
        let end = self.known_end(tracks)?;
        let mut entries = Vec::new();
        while self.pos < end {
            let (child, child_end) = self.read_child(end)?;
            if child.id == TRACK_ENTRY {
                let mut entry = TrackEntry {
                    number: 0,
                    track_type: 0,
                    codec_id: None,
                };
                while self.pos < child_end {
                    let (field, field_end) = self.read_child(child_end)?;
                    match field.id {
                        TRACK_NUMBER => entry.number = self.read_uint(&field)?,
                        TRACK_TYPE => entry.track_type = self.read_uint(&field)?,
                        CODEC_ID => entry.codec_id = Some(self.read_string(&field)?),
                        _ => {}
                    }
                    self.seek_to(field_end)?;
                }
                entries.push(entry);
            }
            self.seek_to(child_end)?;
        }
        Ok(entries)
    }
}

/// Keyframes of the first video track of a Matroska/WebM file
pub(super) struct MkvKeyframeStream<R> {
    ebml: EbmlReader<R>,
    info: ContainerInfo,
    track: u64,
    timebase: Timebase,
    segment_end: u64,
    cluster_timestamp: Option<u64>,
    done: bool,
}

impl<R: Read + Seek> MkvKeyframeStream<R> {
    fn keyframe_at(&self, timecode: i16) -> Result<KeyframeTimestamp, DomainError> {
        let base = self
            .cluster_timestamp
            .ok_or_else(|| DomainError::demux("block precedes its cluster timestamp"))?;
        let pts = i64::try_from(base)
            .unwrap_or(i64::MAX)
            .saturating_add(timecode as i64);
        Ok(KeyframeTimestamp::new(
            self.track,
            pts,
            self.timebase.ticks_to_time(pts),
        ))
    }

    /// A `BlockGroup` holds a keyframe when its block references no other frame
    fn read_block_group(&mut self, group: &Element) -> Result<Option<KeyframeTimestamp>, DomainError> {
        let end = self.ebml.known_end(group)?;
        let mut block = None;
        let mut referenced = false;
        while self.ebml.pos < end {
            let (child, child_end) = self.ebml.read_child(end)?;
            match child.id {
                BLOCK => block = Some(self.ebml.read_block_header(&child)?),
                REFERENCE_BLOCK => referenced = true,
                _ => {}
            }
            self.ebml.seek_to(child_end)?;
        }

        match block {
            Some(block) if block.track == self.track && !referenced => {
                Ok(Some(self.keyframe_at(block.timecode)?))
            }
            _ => Ok(None),
        }
    }

    fn advance(&mut self) -> Result<Option<KeyframeTimestamp>, DomainError> {
        loop {
            if self.ebml.pos >= self.segment_end {
                return Ok(None);
            }
            let element = self
                .ebml
                .read_header()?
                .ok_or_else(|| DomainError::demux("segment is truncated"))?;

            match element.id {
                // Descend: cluster children are read at this level
                CLUSTER => self.cluster_timestamp = None,
                CLUSTER_TIMESTAMP => {
                    self.cluster_timestamp = Some(self.ebml.read_uint(&element)?);
                }
                SIMPLE_BLOCK => {
                    let block = self.ebml.read_block_header(&element)?;
                    self.ebml.skip(&element)?;
                    if block.track == self.track && block.flags & KEYFRAME_FLAG != 0 {
                        return self.keyframe_at(block.timecode).map(Some);
                    }
                }
                BLOCK_GROUP => {
                    if let Some(keyframe) = self.read_block_group(&element)? {
                        return Ok(Some(keyframe));
                    }
                }
                _ => self.ebml.skip(&element)?,
            }
        }
    }
}

impl<R: Read + Seek> Iterator for MkvKeyframeStream<R> {
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

impl<R: Read + Seek> KeyframeStream for MkvKeyframeStream<R> {
    fn info(&self) -> &ContainerInfo {
        &self.info
    }
}

/// Read the EBML header, segment info and tracks, then park on the first cluster
pub(super) fn open<R: Read + Seek>(reader: R, path: &str) -> Result<MkvKeyframeStream<R>, DomainError> {
    let mut ebml = EbmlReader::new(reader)?;

    let header = ebml
        .read_header()?
        .ok_or_else(|| DomainError::open(path, "file is empty"))?;
    if header.id != EBML_HEADER {
        return Err(DomainError::open(path, "missing EBML header"));
    }
    let doc_type = ebml.read_doc_type(&header)?;
    if doc_type != "matroska" && doc_type != "webm" {
        return Err(DomainError::open(
            path,
            format!("unsupported EBML document type '{}'", doc_type),
        ));
    }

    let segment = loop {
        let element = ebml
            .read_header()?
            .ok_or_else(|| DomainError::demux("no Segment element"))?;
        if element.id == SEGMENT {
            break element;
        }
        ebml.skip(&element)?;
    };
    let segment_end = segment.end().unwrap_or(ebml.len);

    let mut scale = DEFAULT_TIMESTAMP_SCALE;
    let mut duration_ticks = None;
    let mut tracks: Option<Vec<TrackEntry>> = None;
    let mut first_cluster = None;

    while ebml.pos < segment_end {
        let element = ebml
            .read_header()?
            .ok_or_else(|| DomainError::demux("segment is truncated"))?;
        match element.id {
            INFO => {
                let (info_scale, info_duration) = ebml.read_info(&element)?;
                scale = info_scale;
                duration_ticks = info_duration;
            }
            TRACKS => tracks = Some(ebml.read_tracks(&element)?),
            CLUSTER => {
                first_cluster.get_or_insert(element.start);
                if tracks.is_some() {
                    break;
                }
                if element.size.is_none() {
                    return Err(DomainError::demux(
                        "Tracks must precede an unknown-size Cluster",
                    ));
                }
                ebml.skip(&element)?;
            }
            _ => ebml.skip(&element)?,
        }
        if tracks.is_some() && first_cluster.is_some() {
            break;
        }
    }

    let tracks = tracks.ok_or_else(|| DomainError::demux("segment has no Tracks element"))?;
    let video = tracks
        .iter()
        .find(|t| t.track_type == TRACK_TYPE_VIDEO)
        .ok_or_else(|| DomainError::NoVideoStream {
            path: path.to_string(),
        })?;

    let scale = u32::try_from(scale)
        .ok()
        .filter(|s| *s > 0)
        .ok_or_else(|| DomainError::demux(format!("invalid timestamp scale {}", scale)))?;
    let timebase = Timebase::new(scale, 1_000_000_000)?;
    let duration = duration_ticks
        .filter(|d| d.is_finite() && *d > 0.0)
        .map(|d| TimeSpec::from_seconds(d * scale as f64 / 1e9));

    debug!(
        track = video.number,
        timestamp_scale = scale,
        tracks = tracks.len(),
        first_cluster = ?first_cluster,
        "Indexed Matroska video track"
    );

    if let Some(offset) = first_cluster {
        ebml.seek_to(offset)?;
    }

    Ok(MkvKeyframeStream {
        info: ContainerInfo {
            path: path.to_string(),
            format: doc_type,
            duration,
            video_stream: video.number,
            video_codec: video.codec_id.clone(),
            stream_count: tracks.len(),
        },
        track: video.number,
        timebase,
        segment_end,
        cluster_timestamp: None,
        done: first_cluster.is_none(),
        ebml,
    })
}
