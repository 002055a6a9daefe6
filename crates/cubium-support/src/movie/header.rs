//! The fixed 256-byte DTM header.
//!
//! All multi-byte fields are little-endian. Text fields are NUL-padded and
//! truncated to their slot; decoding stops at the first NUL.

use std::io::{Read, Write};

use crate::error::MovieError;

pub const DTM_MAGIC: [u8; 4] = *b"DTM\x1A";
pub const HEADER_SIZE: usize = 256;

pub const GAME_ID_LEN: usize = 6;
pub const AUTHOR_LEN: usize = 32;
pub const BACKEND_NAME_LEN: usize = 16;
pub const DISC_CHANGE_LEN: usize = 40;
pub const REVISION_LEN: usize = 20;

/// Emulator settings embedded in a recording so playback can reproduce them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovieConfig {
    pub video_backend: String,
    pub audio_emulator: String,
    pub skip_idle: bool,
    pub dual_core: bool,
    pub progressive: bool,
    pub dsp_hle: bool,
    pub fast_disc_speed: bool,
    pub cpu_core: u8,
    pub efb_access_enable: bool,
    pub efb_copy_enable: bool,
    pub skip_efb_copy_to_ram: bool,
    pub efb_copy_cache_enable: bool,
    pub efb_emulate_format_changes: bool,
    pub immediate_xfb: bool,
    pub skip_xfb_copy_to_ram: bool,
    pub sync_gpu: bool,
    pub pal60: bool,
    pub language: u8,
    pub follow_branch: bool,
    pub use_fma: bool,
    pub widescreen: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DtmHeader {
    pub game_id: String,
    pub is_wii: bool,
    /// Bits 0-3: GameCube pads, bits 4-7: Wii Remotes.
    pub controllers: u8,
    pub from_save_state: bool,
    pub frame_count: u64,
    pub input_count: u64,
    pub lag_count: u64,
    pub unique_id: u64,
    pub num_rerecords: u32,
    pub author: String,
    pub md5: [u8; 16],
    /// Seconds since 1970.
    pub recording_start_time: u64,
    pub save_config: bool,
    pub config: MovieConfig,
    pub memcards: u8,
    pub clear_save: bool,
    pub bongos: u8,
    pub netplay: bool,
    pub gba_controllers: u8,
    pub disc_change: String,
    pub revision: [u8; REVISION_LEN],
    pub dsp_irom_hash: u32,
    pub dsp_coef_hash: u32,
    pub tick_count: u64,
}

pub fn is_movie_header(magic: &[u8]) -> bool {
    magic.starts_with(&DTM_MAGIC)
}

struct Writer {
    buf: [u8; HEADER_SIZE],
    pos: usize,
}

impl Writer {
    fn bytes(&mut self, data: &[u8]) {
        self.buf[self.pos..self.pos + data.len()].copy_from_slice(data);
        self.pos += data.len();
    }

    fn u8(&mut self, v: u8) {
        self.bytes(&[v]);
    }

    fn bool(&mut self, v: bool) {
        self.u8(u8::from(v));
    }

    fn u32(&mut self, v: u32) {
        self.bytes(&v.to_le_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.bytes(&v.to_le_bytes());
    }

    fn text(&mut self, s: &str, width: usize) {
        let raw = s.as_bytes();
        let len = raw.len().min(width);
        self.bytes(&raw[..len]);
        self.pos += width - len;
    }

    fn skip(&mut self, n: usize) {
        self.pos += n;
    }
}

struct Reader<'a> {
    buf: &'a [u8; HEADER_SIZE],
    pos: usize,
}

impl Reader<'_> {
    fn array<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn u8(&mut self) -> u8 {
        let [v] = self.array::<1>();
        v
    }

    fn bool(&mut self) -> bool {
        self.u8() != 0
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.array())
    }

    fn u64(&mut self) -> u64 {
        u64::from_le_bytes(self.array())
    }

    fn text(&mut self, width: usize) -> String {
        let field = &self.buf[self.pos..self.pos + width];
        self.pos += width;
        let end = field.iter().position(|&b| b == 0).unwrap_or(width);
        String::from_utf8_lossy(&field[..end]).into_owned()
    }

    fn skip(&mut self, n: usize) {
        self.pos += n;
    }
}

impl DtmHeader {
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut w = Writer {
            buf: [0; HEADER_SIZE],
            pos: 0,
        };
        let cfg = &self.config;

        w.bytes(&DTM_MAGIC);
        w.text(&self.game_id, GAME_ID_LEN);
        w.bool(self.is_wii);
        w.u8(self.controllers);
        w.bool(self.from_save_state);
        w.u64(self.frame_count);
        w.u64(self.input_count);
        w.u64(self.lag_count);
        w.u64(self.unique_id);
        w.u32(self.num_rerecords);
        w.text(&self.author, AUTHOR_LEN);
        w.text(&cfg.video_backend, BACKEND_NAME_LEN);
        w.text(&cfg.audio_emulator, BACKEND_NAME_LEN);
        w.bytes(&self.md5);
        w.u64(self.recording_start_time);
        w.bool(self.save_config);
        w.bool(cfg.skip_idle);
        w.bool(cfg.dual_core);
        w.bool(cfg.progressive);
        w.bool(cfg.dsp_hle);
        w.bool(cfg.fast_disc_speed);
        w.u8(cfg.cpu_core);
        w.bool(cfg.efb_access_enable);
        w.bool(cfg.efb_copy_enable);
        w.bool(cfg.skip_efb_copy_to_ram);
        w.bool(cfg.efb_copy_cache_enable);
        w.bool(cfg.efb_emulate_format_changes);
        w.bool(cfg.immediate_xfb);
        w.bool(cfg.skip_xfb_copy_to_ram);
        w.u8(self.memcards);
        w.bool(self.clear_save);
        w.u8(self.bongos);
        w.bool(cfg.sync_gpu);
        w.bool(self.netplay);
        w.bool(cfg.pal60);
        w.u8(cfg.language);
        w.skip(1);
        w.bool(cfg.follow_branch);
        w.bool(cfg.use_fma);
        w.u8(self.gba_controllers);
        w.bool(cfg.widescreen);
        w.skip(6);
        w.text(&self.disc_change, DISC_CHANGE_LEN);
        w.bytes(&self.revision);
        w.u32(self.dsp_irom_hash);
        w.u32(self.dsp_coef_hash);
        w.u64(self.tick_count);
        w.skip(11);
        debug_assert_eq!(w.pos, HEADER_SIZE);

        w.buf
    }

    /// Decodes a header from the first [`HEADER_SIZE`] bytes of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self, MovieError> {
        let Some(buf) = bytes.first_chunk::<HEADER_SIZE>() else {
            return Err(MovieError::Truncated {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        };
        if !is_movie_header(buf) {
            return Err(MovieError::InvalidHeader);
        }

        let mut r = Reader { buf, pos: 4 };
        let game_id = r.text(GAME_ID_LEN);
        let is_wii = r.bool();
        let controllers = r.u8();
        let from_save_state = r.bool();
        let frame_count = r.u64();
        let input_count = r.u64();
        let lag_count = r.u64();
        let unique_id = r.u64();
        let num_rerecords = r.u32();
        let author = r.text(AUTHOR_LEN);
        let video_backend = r.text(BACKEND_NAME_LEN);
        let audio_emulator = r.text(BACKEND_NAME_LEN);
        let md5 = r.array();
        let recording_start_time = r.u64();
        let save_config = r.bool();
        let skip_idle = r.bool();
        let dual_core = r.bool();
        let progressive = r.bool();
        let dsp_hle = r.bool();
        let fast_disc_speed = r.bool();
        let cpu_core = r.u8();
        let efb_access_enable = r.bool();
        let efb_copy_enable = r.bool();
        let skip_efb_copy_to_ram = r.bool();
        let efb_copy_cache_enable = r.bool();
        let efb_emulate_format_changes = r.bool();
        let immediate_xfb = r.bool();
        let skip_xfb_copy_to_ram = r.bool();
        let memcards = r.u8();
        let clear_save = r.bool();
        let bongos = r.u8();
        let sync_gpu = r.bool();
        let netplay = r.bool();
        let pal60 = r.bool();
        let language = r.u8();
        r.skip(1);
        let follow_branch = r.bool();
        let use_fma = r.bool();
        let gba_controllers = r.u8();
        let widescreen = r.bool();
        r.skip(6);
        let disc_change = r.text(DISC_CHANGE_LEN);
        let revision = r.array();
        let dsp_irom_hash = r.u32();
        let dsp_coef_hash = r.u32();
        let tick_count = r.u64();

        Ok(Self {
            game_id,
            is_wii,
            controllers,
            from_save_state,
            frame_count,
            input_count,
            lag_count,
            unique_id,
            num_rerecords,
            author,
            md5,
            recording_start_time,
            save_config,
            config: MovieConfig {
                video_backend,
                audio_emulator,
                skip_idle,
                dual_core,
                progressive,
                dsp_hle,
                fast_disc_speed,
                cpu_core,
                efb_access_enable,
                efb_copy_enable,
                skip_efb_copy_to_ram,
                efb_copy_cache_enable,
                efb_emulate_format_changes,
                immediate_xfb,
                skip_xfb_copy_to_ram,
                sync_gpu,
                pal60,
                language,
                follow_branch,
                use_fma,
                widescreen,
            },
            memcards,
            clear_save,
            bongos,
            netplay,
            gba_controllers,
            disc_change,
            revision,
            dsp_irom_hash,
            dsp_coef_hash,
            tick_count,
        })
    }

    pub fn read_from<R: Read>(mut reader: R) -> Result<Self, MovieError> {
        let mut buf = [0u8; HEADER_SIZE];
        let mut filled = 0;
        while filled < HEADER_SIZE {
            match reader.read(&mut buf[filled..])? {
                0 => break,
                n => filled += n,
            }
        }
        Self::decode(&buf[..filled])
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<(), MovieError> {
        writer.write_all(&self.encode())?;
        Ok(())
    }

    /// `true` when a disc checksum was recorded.
    pub fn has_md5(&self) -> bool {
        self.md5.iter().any(|&b| b != 0)
    }
}
