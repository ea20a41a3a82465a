//! Synthetic media files built byte by byte for tests
#![allow(dead_code)]

use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ISO BMFF
// ---------------------------------------------------------------------------

pub fn mp4_box(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 8);
    out.extend_from_slice(&((payload.len() + 8) as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(payload);
    out
}

fn full_box(kind: &[u8; 4], version: u8, payload: &[u8]) -> Vec<u8> {
    let mut body = vec![version, 0, 0, 0];
    body.extend_from_slice(payload);
    mp4_box(kind, &body)
}

fn concat(parts: &[Vec<u8>]) -> Vec<u8> {
    parts.iter().flatten().copied().collect()
}

/// One `trak` of a synthetic movie
#[derive(Debug, Clone)]
pub struct Mp4Track {
    pub track_id: u32,
    pub handler: [u8; 4],
    pub codec: [u8; 4],
    pub timescale: u32,
    /// (sample count, sample delta) runs
    pub stts: Vec<(u32, u32)>,
    /// 1-based sync sample numbers; `None` omits the box
    pub stss: Option<Vec<u32>>,
    /// (sample count, composition offset) runs
    pub ctts: Vec<(u32, i32)>,
    /// (segment duration in movie ticks, media time) edits
    pub elst: Vec<(u32, i32)>,
}

impl Mp4Track {
    pub fn video(timescale: u32, stts: Vec<(u32, u32)>, stss: Option<Vec<u32>>) -> Self {
        Self {
            track_id: 1,
            handler: *b"vide",
            codec: *b"avc1",
            timescale,
            stts,
            stss,
            ctts: Vec::new(),
            elst: Vec::new(),
        }
    }

    pub fn audio(track_id: u32) -> Self {
        Self {
            track_id,
            handler: *b"soun",
            codec: *b"mp4a",
            timescale: 48_000,
            stts: vec![(100, 1024)],
            stss: None,
            ctts: Vec::new(),
            elst: Vec::new(),
        }
    }

    fn duration(&self) -> u32 {
        self.stts.iter().map(|(count, delta)| count * delta).sum()
    }

    fn to_trak(&self) -> Vec<u8> {
        let mut tkhd = vec![0u8; 8];
        tkhd.extend_from_slice(&self.track_id.to_be_bytes());
        tkhd.extend_from_slice(&[0u8; 72]);

        let mut mdhd = vec![0u8; 8];
        mdhd.extend_from_slice(&self.timescale.to_be_bytes());
        mdhd.extend_from_slice(&self.duration().to_be_bytes());
        mdhd.extend_from_slice(&[0x55, 0xC4, 0, 0]);

        let mut hdlr = vec![0u8; 4];
        hdlr.extend_from_slice(&self.handler);
        hdlr.extend_from_slice(&[0u8; 12]);
        hdlr.push(0);

        let mut sample_entry = vec![0u8; 6];
        sample_entry.extend_from_slice(&1u16.to_be_bytes());
        let mut stsd = 1u32.to_be_bytes().to_vec();
        stsd.extend_from_slice(&mp4_box(&self.codec, &sample_entry));

        let mut stts = (self.stts.len() as u32).to_be_bytes().to_vec();
        for (count, delta) in &self.stts {
            stts.extend_from_slice(&count.to_be_bytes());
            stts.extend_from_slice(&delta.to_be_bytes());
        }

        let mut stbl = vec![full_box(b"stsd", 0, &stsd), full_box(b"stts", 0, &stts)];
        if let Some(samples) = &self.stss {
            let mut stss = (samples.len() as u32).to_be_bytes().to_vec();
            for sample in samples {
                stss.extend_from_slice(&sample.to_be_bytes());
            }
            stbl.push(full_box(b"stss", 0, &stss));
        }
        if !self.ctts.is_empty() {
            let mut ctts = (self.ctts.len() as u32).to_be_bytes().to_vec();
            for (count, offset) in &self.ctts {
                ctts.extend_from_slice(&count.to_be_bytes());
                ctts.extend_from_slice(&offset.to_be_bytes());
            }
            stbl.push(full_box(b"ctts", 0, &ctts));
        }

        let minf = mp4_box(b"minf", &mp4_box(b"stbl", &concat(&stbl)));
        let mdia = mp4_box(
            b"mdia",
            &concat(&[full_box(b"mdhd", 0, &mdhd), full_box(b"hdlr", 0, &hdlr), minf]),
        );

        let mut trak = vec![full_box(b"tkhd", 0, &tkhd)];
        if !self.elst.is_empty() {
            let mut elst = (self.elst.len() as u32).to_be_bytes().to_vec();
            for (segment_duration, media_time) in &self.elst {
                elst.extend_from_slice(&segment_duration.to_be_bytes());
                elst.extend_from_slice(&media_time.to_be_bytes());
                elst.extend_from_slice(&[0, 1, 0, 0]);
            }
            trak.push(mp4_box(b"edts", &full_box(b"elst", 0, &elst)));
        }
        trak.push(mdia);
        mp4_box(b"trak", &concat(&trak))
    }
}

/// `ftyp`, `moov` and a filler `mdat`
pub fn build_mp4(tracks: &[Mp4Track], movie_timescale: u32, movie_duration: u32) -> Vec<u8> {
    let ftyp = mp4_box(b"ftyp", b"isom\0\0\x02\0isomiso2avc1mp41");

    let mut mvhd = vec![0u8; 8];
    mvhd.extend_from_slice(&movie_timescale.to_be_bytes());
    mvhd.extend_from_slice(&movie_duration.to_be_bytes());
    mvhd.extend_from_slice(&[0u8; 80]);

    let mut moov = vec![full_box(b"mvhd", 0, &mvhd)];
    moov.extend(tracks.iter().map(Mp4Track::to_trak));

    concat(&[ftyp, mp4_box(b"moov", &concat(&moov)), mp4_box(b"mdat", &[0xAB; 64])])
}

/// 90 kHz video, 50 fps, sync samples at 0.0, 2.0, 4.04 and 6.1 seconds
pub fn sample_mp4() -> Vec<u8> {
    let video = Mp4Track::video(90_000, vec![(400, 1800)], Some(vec![1, 101, 203, 306]));
    build_mp4(&[video, Mp4Track::audio(2)], 1000, 8000)
}

// ---------------------------------------------------------------------------
// Matroska
// ---------------------------------------------------------------------------

fn id_bytes(id: u32) -> Vec<u8> {
    let bytes = id.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    bytes[skip..].to_vec()
}

/// Element with an 8-byte size field
pub fn ebml(id: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = id_bytes(id);
    out.push(0x01);
    out.extend_from_slice(&(payload.len() as u64).to_be_bytes()[1..]);
    out.extend_from_slice(payload);
    out
}

pub fn ebml_unknown_size(id: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = id_bytes(id);
    out.extend_from_slice(&[0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
    out.extend_from_slice(payload);
    out
}

fn ebml_uint(id: u32, value: u64) -> Vec<u8> {
    ebml(id, &value.to_be_bytes())
}

fn ebml_float(id: u32, value: f64) -> Vec<u8> {
    ebml(id, &value.to_be_bytes())
}

fn ebml_string(id: u32, value: &str) -> Vec<u8> {
    ebml(id, value.as_bytes())
}

#[derive(Debug, Clone)]
pub enum MkvBlock {
    Simple { track: u8, timecode: i16, key: bool },
    Group { track: u8, timecode: i16, referenced: bool },
}

#[derive(Debug, Clone)]
pub struct MkvCluster {
    pub timestamp: u64,
    pub blocks: Vec<MkvBlock>,
}

#[derive(Debug, Clone)]
pub struct MkvTrack {
    pub number: u64,
    pub track_type: u64,
    pub codec: &'static str,
}

fn block_payload(track: u8, timecode: i16, flags: u8) -> Vec<u8> {
    let mut out = vec![0x80 | track];
    out.extend_from_slice(&timecode.to_be_bytes());
    out.push(flags);
    out.extend_from_slice(&[0xAA; 24]);
    out
}

fn cluster_body(cluster: &MkvCluster) -> Vec<u8> {
    let mut body = ebml_uint(0xE7, cluster.timestamp);
    for block in &cluster.blocks {
        match *block {
            MkvBlock::Simple { track, timecode, key } => {
                let flags = if key { 0x80 } else { 0x00 };
                body.extend(ebml(0xA3, &block_payload(track, timecode, flags)));
            }
            MkvBlock::Group {
                track,
                timecode,
                referenced,
            } => {
                let mut group = ebml(0xA1, &block_payload(track, timecode, 0));
                if referenced {
                    group.extend(ebml(0xFB, &[0xFE]));
                }
                body.extend(ebml(0xA0, &group));
            }
        }
    }
    body
}

/// Matroska file options
#[derive(Debug, Clone)]
pub struct MkvSpec {
    pub doc_type: &'static str,
    pub timestamp_scale: Option<u64>,
    /// Duration in timestamp ticks
    pub duration: Option<f64>,
    pub tracks: Vec<MkvTrack>,
    pub clusters: Vec<MkvCluster>,
    pub unknown_sizes: bool,
}

impl MkvSpec {
    pub fn new(tracks: Vec<MkvTrack>, clusters: Vec<MkvCluster>) -> Self {
        Self {
            doc_type: "matroska",
            timestamp_scale: None,
            duration: None,
            tracks,
            clusters,
            unknown_sizes: false,
        }
    }
}

pub fn build_mkv(spec: &MkvSpec) -> Vec<u8> {
    let header = ebml(
        0x1A45_DFA3,
        &concat(&[ebml_uint(0x4286, 1), ebml_string(0x4282, spec.doc_type)]),
    );

    let mut info = Vec::new();
    if let Some(scale) = spec.timestamp_scale {
        info.extend(ebml_uint(0x2A_D7B1, scale));
    }
    if let Some(duration) = spec.duration {
        info.extend(ebml_float(0x4489, duration));
    }

    let mut tracks = Vec::new();
    for track in &spec.tracks {
        tracks.extend(ebml(
            0xAE,
            &concat(&[
                ebml_uint(0xD7, track.number),
                ebml_uint(0x83, track.track_type),
                ebml_string(0x86, track.codec),
            ]),
        ));
    }

    let mut segment = concat(&[
        ebml(0xEC, &[0u8; 8]),
        ebml(0x1549_A966, &info),
        ebml(0x1654_AE6B, &tracks),
    ]);
    for cluster in &spec.clusters {
        let body = cluster_body(cluster);
        if spec.unknown_sizes {
            segment.extend(ebml_unknown_size(0x1F43_B675, &body));
        } else {
            segment.extend(ebml(0x1F43_B675, &body));
        }
    }

    let segment = if spec.unknown_sizes {
        ebml_unknown_size(0x1853_8067, &segment)
    } else {
        ebml(0x1853_8067, &segment)
    };
    concat(&[header, segment])
}

pub fn video_and_audio_tracks() -> Vec<MkvTrack> {
    vec![
        MkvTrack {
            number: 1,
            track_type: 1,
            codec: "V_MPEG4/ISO/AVC",
        },
        MkvTrack {
            number: 2,
            track_type: 2,
            codec: "A_OPUS",
        },
    ]
}

/// Keyframes at 0.0, 2.0, 4.04 and 6.1 seconds with interleaved audio
pub fn sample_mkv_spec() -> MkvSpec {
    let cluster = |timestamp: u64| MkvCluster {
        timestamp,
        blocks: vec![
            MkvBlock::Simple { track: 1, timecode: 0, key: true },
            MkvBlock::Simple { track: 2, timecode: 5, key: true },
            MkvBlock::Simple { track: 1, timecode: 40, key: false },
            MkvBlock::Simple { track: 1, timecode: 80, key: false },
        ],
    };
    let mut spec = MkvSpec::new(
        video_and_audio_tracks(),
        vec![cluster(0), cluster(2000), cluster(4040), cluster(6100)],
    );
    spec.duration = Some(8000.0);
    spec
}

pub fn sample_mkv() -> Vec<u8> {
    build_mkv(&sample_mkv_spec())
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("write fixture");
    path
}

pub fn secs(s: f64) -> clipchop::TimeSpec {
    clipchop::TimeSpec::from_seconds(s)
}
