//! Disc checksums, DSP ROM hashes and source-revision bytes.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::{Path, PathBuf},
    thread,
};

use crossbeam_channel::{Receiver, TryRecvError, bounded};
use md5::{Digest, Md5};
use tracing::debug;

use super::header::REVISION_LEN;
use crate::error::ChecksumError;

pub type Md5Digest = [u8; 16];

pub const DSP_IROM_BYTE_SIZE: usize = 0x2000;
pub const DSP_COEF_BYTE_SIZE: usize = 0x1000;

pub fn md5_file(path: &Path) -> Result<Md5Digest, ChecksumError> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Md5::new();
    let mut chunk = vec![0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        hasher.update(&chunk[..n]);
    }
    Ok(hasher.finalize().into())
}

/// MD5 of a disc image computed on a worker thread.
///
/// Completion is observed either by polling from the frame loop or by
/// blocking in [`ChecksumJob::wait`].
#[derive(Debug)]
pub struct ChecksumJob {
    path: PathBuf,
    reply_rx: Receiver<Result<Md5Digest, ChecksumError>>,
}

impl ChecksumJob {
    pub fn spawn(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (reply_tx, reply_rx) = bounded(1);

        let worker_path = path.clone();
        let worker_tx = reply_tx.clone();
        let spawned = thread::Builder::new()
            .name("md5-worker".into())
            .spawn(move || {
                let _ = worker_tx.send(md5_file(&worker_path));
            });
        if let Err(err) = spawned {
            let _ = reply_tx.send(Err(ChecksumError::Io(err)));
        }

        debug!("checksum job started for {}", path.display());
        Self { path, reply_rx }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Non-blocking. `None` while the worker is still hashing.
    pub fn poll(&self) -> Option<Result<Md5Digest, ChecksumError>> {
        match self.reply_rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(ChecksumError::WorkerLost)),
        }
    }

    pub fn wait(self) -> Result<Md5Digest, ChecksumError> {
        self.reply_rx
            .recv()
            .map_err(|_| ChecksumError::WorkerLost)?
    }
}

/// Adler-32 over a DSP ROM image as the DSP sees it: zero-padded to
/// `byte_size` and with every 16-bit word byte-swapped.
pub fn dsp_rom_hash(image: &[u8], byte_size: usize) -> u32 {
    let mut words = vec![0u8; byte_size];
    let len = image.len().min(byte_size);
    words[..len].copy_from_slice(&image[..len]);
    for pair in words.chunks_exact_mut(2) {
        pair.swap(0, 1);
    }
    adler2::adler32_slice(&words)
}

/// Packs a source revision into the header's 20 revision bytes.
///
/// An even-length all-hex string (a commit hash) is stored as one byte per
/// digit pair. Anything else is copied verbatim.
pub fn revision_to_bytes(revision: &str) -> [u8; REVISION_LEN] {
    let mut out = [0u8; REVISION_LEN];
    let is_hex_pairs =
        revision.len() % 2 == 0 && revision.bytes().all(|b| b.is_ascii_hexdigit());

    if is_hex_pairs {
        let digits = (revision.len() / 2).min(REVISION_LEN) * 2;
        if let Ok(bytes) = hex::decode(&revision[..digits]) {
            out[..bytes.len()].copy_from_slice(&bytes);
        }
    } else {
        let raw = revision.as_bytes();
        let len = raw.len().min(REVISION_LEN);
        out[..len].copy_from_slice(&raw[..len]);
    }
    out
}
