// Native probe adapter - MP4/MOV and Matroska/WebM keyframe indexes read directly from the file

mod mkv;
mod mp4;

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use tracing::debug;

use crate::domain::errors::DomainError;
use crate::ports::{KeyframeStream, ProbePort};

const EBML_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];
const MP4_TOP_LEVEL_BOXES: [&[u8; 4]; 7] = [b"ftyp", b"moov", b"mdat", b"free", b"skip", b"wide", b"pnot"];

/// Container family recognized from the first bytes of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerKind {
    IsoBmff,
    Matroska,
}

pub(crate) fn io_error(e: std::io::Error) -> DomainError {
    if e.kind() == ErrorKind::UnexpectedEof {
        DomainError::demux("file is truncated")
    } else {
        DomainError::demux(format!("read failed: {}", e))
    }
}

fn sniff(signature: &[u8]) -> Option<ContainerKind> {
    if signature.len() < 8 {
        return None;
    }
    if signature[..4] == EBML_MAGIC {
        return Some(ContainerKind::Matroska);
    }
    if MP4_TOP_LEVEL_BOXES.iter().any(|kind| signature[4..8] == kind[..]) {
        return Some(ContainerKind::IsoBmff);
    }
    None
}

/// Probe adapter that parses container indexes without external libraries
#[derive(Debug, Default, Clone)]
pub struct NativeProbeAdapter;

impl NativeProbeAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl ProbePort for NativeProbeAdapter {
    fn name(&self) -> &'static str {
        "native"
    }

    fn open_keyframes(&self, path: &Path) -> Result<Box<dyn KeyframeStream>, DomainError> {
        let display = path.display().to_string();

        let metadata = std::fs::metadata(path).map_err(|e| DomainError::open(&display, e.to_string()))?;
        if !metadata.is_file() {
            return Err(DomainError::open(&display, "not a regular file"));
        }

        let mut file = File::open(path).map_err(|e| DomainError::open(&display, e.to_string()))?;
        let mut signature = [0u8; 8];
        let read = read_up_to(&mut file, &mut signature).map_err(|e| DomainError::open(&display, e.to_string()))?;
        let kind = sniff(&signature[..read])
            .ok_or_else(|| DomainError::open(&display, "unrecognized container format"))?;

        debug!(path = %path.display(), kind = ?kind, size = metadata.len(), "Opening container");

        let reader = BufReader::new(file);
        match kind {
            ContainerKind::IsoBmff => Ok(Box::new(mp4::open(reader, &display)?)),
            // the Matroska reader buffers internally
            ContainerKind::Matroska => Ok(Box::new(mkv::open(reader.into_inner(), &display)?)),
        }
    }
}

/// Fill `buf` as far as the file allows
fn read_up_to(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
