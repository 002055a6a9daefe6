use std::{
    fs,
    path::{Path, PathBuf},
};

use cubium_core::controller::{GcPadStatus, PadButtons, SiDevice};
use cubium_support::{
    MovieError,
    movie::{
        BootInfo, ControllerType, DspRoms, DtmHeader, HEADER_SIZE, Movie, MovieConfig,
        MovieHost, MovieStateChunk, PlayMode, RecordingSettings,
        checksum::{DSP_COEF_BYTE_SIZE, DSP_IROM_BYTE_SIZE, dsp_rom_hash, md5_file},
        sibling_state_path,
    },
};
use proptest::prelude::*;

#[derive(Debug, Default)]
struct FakeHost {
    running: bool,
    started: bool,
    ticks: u64,
    game_id: String,
    wii: bool,
    si: [SiDevice; 4],
    wiimotes: [bool; 4],
    saves_dir: PathBuf,
    settings: RecordingSettings,
    auto_change_disc_ok: bool,

    alerts: Vec<String>,
    messages: Vec<String>,
    cpu_breaks: u32,
    reset_taps: u32,
    wiimote_resets: u32,
    applied_configs: u32,
}

impl FakeHost {
    fn new(saves_dir: &Path) -> Self {
        Self {
            game_id: "GALE01".into(),
            saves_dir: saves_dir.to_path_buf(),
            si: [SiDevice::GcController, SiDevice::None, SiDevice::None, SiDevice::None],
            ..Default::default()
        }
    }

    fn saw_message(&self, needle: &str) -> bool {
        self.messages.iter().any(|m| m.contains(needle))
    }

    fn saw_alert(&self, needle: &str) -> bool {
        self.alerts.iter().any(|m| m.contains(needle))
    }
}

impl MovieHost for FakeHost {
    fn is_running(&self) -> bool {
        self.running
    }

    fn is_running_and_started(&self) -> bool {
        self.running && self.started
    }

    fn ticks(&self) -> u64 {
        self.ticks
    }

    fn game_id(&self) -> String {
        self.game_id.clone()
    }

    fn is_wii(&self) -> bool {
        self.wii
    }

    fn panic_alert(&mut self, message: &str) {
        self.alerts.push(message.to_string());
    }

    fn display_message(&mut self, message: &str, _duration_ms: u32) {
        self.messages.push(message.to_string());
    }

    fn si_device(&self, channel: usize) -> SiDevice {
        self.si[channel]
    }

    fn change_si_device(&mut self, channel: usize, device: SiDevice) {
        self.si[channel] = device;
    }

    fn wiimote_enabled(&self, wiimote: usize) -> bool {
        self.wiimotes[wiimote]
    }

    fn set_wiimote_enabled(&mut self, wiimote: usize, enabled: bool) {
        self.wiimotes[wiimote] = enabled;
    }

    fn reset_all_wiimotes(&mut self) {
        self.wiimote_resets += 1;
    }

    fn state_saves_dir(&self) -> PathBuf {
        self.saves_dir.clone()
    }

    fn save_state(&mut self, path: &Path) -> bool {
        fs::write(path, b"state").is_ok()
    }

    fn movie_author(&self) -> String {
        "tester".into()
    }

    fn movie_config(&self) -> MovieConfig {
        MovieConfig {
            video_backend: "Vulkan".into(),
            cpu_core: 1,
            ..Default::default()
        }
    }

    fn apply_movie_config(&mut self, _header: &DtmHeader) {
        self.applied_configs += 1;
    }

    fn recording_settings(&self) -> RecordingSettings {
        self.settings.clone()
    }

    fn auto_change_disc(&mut self) -> bool {
        self.auto_change_disc_ok
    }

    fn cpu_break(&mut self) {
        self.cpu_breaks += 1;
    }

    fn reset_button_tap(&mut self) {
        self.reset_taps += 1;
    }

    fn local_time(&self) -> u64 {
        1_700_000_000
    }
}

const ONE_PAD: [ControllerType; 4] = [
    ControllerType::Gc,
    ControllerType::None,
    ControllerType::None,
    ControllerType::None,
];

fn pad_frame(stick_x: u8) -> GcPadStatus {
    GcPadStatus {
        button: PadButtons::A,
        stick_x,
        ..Default::default()
    }
}

/// Records one pad poll per frame, advancing emulated time by 100 ticks.
fn record_frames(movie: &mut Movie, host: &mut FakeHost, sticks: &[u8]) {
    for &stick_x in sticks {
        host.ticks += 100;
        movie.set_polled_device();
        movie.input_update(&*host);
        movie.record_input(&pad_frame(stick_x), 0);
        movie.frame_update();
    }
}

fn write_movie(path: &Path, header: &DtmHeader, stream: &[u8]) {
    let mut bytes = header.encode().to_vec();
    bytes.extend_from_slice(stream);
    fs::write(path, bytes).unwrap();
}

fn gc_header() -> DtmHeader {
    DtmHeader {
        game_id: "GALE01".into(),
        controllers: 0b0001,
        tick_count: u64::MAX,
        ..Default::default()
    }
}

fn read_header(path: &Path) -> DtmHeader {
    DtmHeader::read_from(fs::File::open(path).unwrap()).unwrap()
}

#[test]
fn record_save_and_play_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.dtm");
    let mut host = FakeHost::new(dir.path());

    let mut recorder = Movie::new();
    recorder
        .begin_recording_input(&mut host, ONE_PAD, [false; 4])
        .unwrap();
    assert_eq!(recorder.play_mode(), PlayMode::Recording);
    assert!(host.saw_message("Starting movie recording"));
    assert_eq!(host.wiimote_resets, 1);

    recorder.init(&mut host, &BootInfo::default());
    record_frames(&mut recorder, &mut host, &[10, 20, 30]);

    assert_eq!(recorder.total_frames(), 3);
    assert_eq!(recorder.total_input_count(), 3);
    assert_eq!(recorder.total_tick_count(), 300);
    assert_eq!(recorder.input_stream().len(), 24);
    assert!(recorder.is_config_saved());

    recorder.save_recording(&mut host, &path).unwrap();
    assert!(host.saw_message("saved"));

    let header = read_header(&path);
    assert_eq!(header.game_id, "GALE01");
    assert_eq!(header.controllers, 0b0001);
    assert_eq!(header.frame_count, 3);
    assert_eq!(header.input_count, 3);
    assert_eq!(header.tick_count, 300);
    assert_eq!(header.author, "tester");
    assert_eq!(header.recording_start_time, 1_700_000_000);
    assert_eq!(header.config.video_backend, "Vulkan");
    assert!(header.save_config);
    assert!(!header.from_save_state);
    assert_eq!(
        fs::metadata(&path).unwrap().len(),
        (HEADER_SIZE + 24) as u64
    );

    let mut player = Movie::new();
    host.ticks = 0;
    assert_eq!(player.play_input(&mut host, &path).unwrap(), None);
    assert!(player.is_playing_input());
    assert_eq!(player.input_stream(), recorder.input_stream());
    assert_eq!(player.total_frames(), 3);
    assert_eq!(player.total_tick_count(), 300);
    assert_eq!(host.applied_configs, 1);

    player.init(&mut host, &BootInfo::default());
    assert!(host.alerts.is_empty());

    for expected in [10, 20, 30] {
        let mut pad = GcPadStatus::default();
        player.play_controller(&mut host, &mut pad, 0);
        assert_eq!(pad.stick_x, expected);
        assert!(pad.button.contains(PadButtons::A | PadButtons::USE_ORIGIN));
    }
    assert_eq!(player.play_mode(), PlayMode::None);
    assert!(host.saw_message("Movie End."));
}

#[test]
fn begin_without_devices_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let mut host = FakeHost::new(dir.path());
    let mut movie = Movie::new();

    let err = movie
        .begin_recording_input(&mut host, [ControllerType::None; 4], [false; 4])
        .unwrap_err();
    assert!(matches!(err, MovieError::NoInputDevices));
    assert_eq!(movie.play_mode(), PlayMode::None);

    movie
        .begin_recording_input(&mut host, ONE_PAD, [false; 4])
        .unwrap();
    let err = movie
        .begin_recording_input(&mut host, ONE_PAD, [false; 4])
        .unwrap_err();
    assert!(matches!(err, MovieError::AlreadyActive));
}

#[test]
fn bad_magic_is_rejected_without_state_change() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bogus.dtm");
    let mut bytes = b"NOPE".to_vec();
    bytes.resize(HEADER_SIZE + 16, 0);
    fs::write(&path, bytes).unwrap();

    let mut host = FakeHost::new(dir.path());
    let mut movie = Movie::new();
    let err = movie.play_input(&mut host, &path).unwrap_err();
    assert!(matches!(err, MovieError::InvalidHeader));
    assert_eq!(movie.play_mode(), PlayMode::None);
    assert!(movie.input_stream().is_empty());
    assert!(host.saw_alert("Invalid recording file"));
}

#[test]
fn truncated_header_fails_quietly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.dtm");
    fs::write(&path, b"DTM\x1A0123456789").unwrap();

    let mut host = FakeHost::new(dir.path());
    let mut movie = Movie::new();
    let err = movie.play_input(&mut host, &path).unwrap_err();
    assert!(matches!(err, MovieError::Truncated { .. }));
    assert_eq!(movie.play_mode(), PlayMode::None);
    assert!(host.alerts.is_empty());
}

#[test]
fn premature_end_stops_playback() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cut.dtm");
    write_movie(&path, &gc_header(), &[0x00, 0x40, 0, 0, 128, 128, 128, 128, 0, 0, 0, 0]);

    let mut host = FakeHost::new(dir.path());
    let mut movie = Movie::new();
    movie.play_input(&mut host, &path).unwrap();

    let mut pad = GcPadStatus::default();
    movie.play_controller(&mut host, &mut pad, 0);
    assert!(movie.is_playing_input());
    movie.play_controller(&mut host, &mut pad, 0);

    assert!(host.saw_alert("Premature movie end in PlayController. 8 + 8 > 12"));
    assert_eq!(movie.play_mode(), PlayMode::None);
}

#[test]
fn playback_past_recorded_ticks_ends() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ticks.dtm");
    let header = DtmHeader {
        tick_count: 10,
        ..gc_header()
    };
    write_movie(&path, &header, &[0u8; 16]);

    let mut host = FakeHost::new(dir.path());
    let mut movie = Movie::new();
    movie.play_input(&mut host, &path).unwrap();
    host.ticks = 11;

    let mut pad = GcPadStatus::default();
    movie.play_controller(&mut host, &mut pad, 0);
    assert_eq!(movie.play_mode(), PlayMode::None);
    assert_eq!(movie.current_byte(), 0);
}

#[test]
fn recorded_ticks_do_not_end_a_movie_that_starts_from_a_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("midticks.dtm");
    let header = DtmHeader {
        tick_count: 10,
        from_save_state: true,
        ..gc_header()
    };
    write_movie(&path, &header, &[0u8; 16]);

    let mut host = FakeHost::new(dir.path());
    let mut movie = Movie::new();
    movie.play_input(&mut host, &path).unwrap();
    assert!(movie.is_recording_input_from_save_state());
    host.ticks = 11;

    let mut pad = GcPadStatus::default();
    movie.play_controller(&mut host, &mut pad, 0);
    assert_eq!(movie.play_mode(), PlayMode::Playing);
    assert_eq!(movie.current_byte(), 8);

    // The stream running out still ends it.
    movie.play_controller(&mut host, &mut pad, 0);
    assert_eq!(movie.play_mode(), PlayMode::None);
}

#[test]
fn read_write_playback_resumes_recording_at_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("resume.dtm");
    write_movie(&path, &gc_header(), &[0u8; 8]);

    let mut host = FakeHost::new(dir.path());
    let mut movie = Movie::new();
    movie.set_read_only(&mut host, false);
    assert!(host.saw_message("Read+Write mode."));
    movie.play_input(&mut host, &path).unwrap();

    let mut pad = GcPadStatus::default();
    movie.play_controller(&mut host, &mut pad, 0);
    assert_eq!(movie.play_mode(), PlayMode::Recording);
    assert!(host.saw_message("Reached movie end. Resuming recording."));

    movie.record_input(&pad_frame(77), 0);
    assert_eq!(movie.input_stream().len(), 16);
    assert_eq!(movie.input_stream()[12], 77);
}

#[test]
fn wiimote_reports_play_back_and_detect_size_desync() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wii.dtm");
    let header = DtmHeader {
        game_id: "RMGE01".into(),
        is_wii: true,
        controllers: 1 << 4,
        tick_count: u64::MAX,
        ..Default::default()
    };
    write_movie(&path, &header, &[4, 1, 2, 3, 4, 2, 9, 9]);

    let mut host = FakeHost::new(dir.path());
    let mut movie = Movie::new();
    movie.play_input(&mut host, &path).unwrap();
    assert!(movie.is_using_wiimote(0));
    assert!(!movie.is_using_pad(0));

    let mut report = [0u8; 4];
    assert!(movie.play_wiimote(&mut host, 0, &mut report));
    assert_eq!(report, [1, 2, 3, 4]);
    assert_eq!(movie.current_input_count(), 1);

    let mut wrong = [0u8; 3];
    assert!(!movie.play_wiimote(&mut host, 0, &mut wrong));
    assert!(host.saw_alert("Fatal desync. Aborting playback. (Error in PlayWiimote: 2 != 3, byte 5.)"));
    assert!(host.saw_alert("all GameCube controllers disabled"));
    assert_eq!(movie.play_mode(), PlayMode::None);
}

#[test]
fn wiimote_payload_past_end_is_premature() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wii-cut.dtm");
    let header = DtmHeader {
        is_wii: true,
        controllers: 1 << 4,
        tick_count: u64::MAX,
        ..gc_header()
    };
    write_movie(&path, &header, &[4, 1, 2]);

    let mut host = FakeHost::new(dir.path());
    let mut movie = Movie::new();
    movie.play_input(&mut host, &path).unwrap();

    let mut report = [0u8; 4];
    assert!(!movie.play_wiimote(&mut host, 0, &mut report));
    assert!(host.saw_alert("Premature movie end in PlayWiimote. 1 + 4 > 3"));
    assert_eq!(movie.play_mode(), PlayMode::None);
}

#[test]
fn wiimote_reports_are_recorded_with_length_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wii-rec.dtm");
    let mut host = FakeHost::new(dir.path());
    host.wii = true;

    let mut movie = Movie::new();
    movie
        .begin_recording_input(&mut host, [ControllerType::None; 4], [true, false, false, false])
        .unwrap();
    movie.check_wiimote_status(&host, 0, &[0x31, 0x00, 0x08, 0x80, 0x80, 0x80]);
    movie.check_wiimote_status(&host, 1, &[0x30, 0x00, 0x00]);

    assert_eq!(movie.input_stream(), &[6, 0x31, 0x00, 0x08, 0x80, 0x80, 0x80]);
    assert_eq!(movie.current_input_count(), 1);
    assert!(movie.get_input_display(&host).contains("R1: A"));

    movie.save_recording(&mut host, &path).unwrap();
    assert_eq!(read_header(&path).controllers, 1 << 4);
}

#[test]
fn disc_change_and_reset_replay_as_events() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.dtm");
    let mut host = FakeHost::new(dir.path());

    let mut recorder = Movie::new();
    recorder
        .begin_recording_input(&mut host, ONE_PAD, [false; 4])
        .unwrap();
    recorder.signal_disc_change(&mut host, "C:\\games\\disc2.iso");
    assert_eq!(recorder.disc_change(), "disc2.iso");
    recorder.record_input(&GcPadStatus::default(), 0);
    recorder.set_reset(true);
    recorder.record_input(&GcPadStatus::default(), 0);
    recorder.record_input(&GcPadStatus::default(), 0);

    let stream = recorder.input_stream();
    assert_eq!(stream[1] & 0x10, 0x10);
    assert_eq!(stream[9] & 0x30, 0x20);
    assert_eq!(stream[17] & 0x30, 0x00);
    recorder.save_recording(&mut host, &path).unwrap();
    assert_eq!(read_header(&path).disc_change, "disc2.iso");

    let mut player = Movie::new();
    player.play_input(&mut host, &path).unwrap();
    let mut pad = GcPadStatus::default();
    player.play_controller(&mut host, &mut pad, 0);
    assert_eq!(host.cpu_breaks, 1);
    assert!(host.saw_alert("Change the disc to disc2.iso"));
    player.play_controller(&mut host, &mut pad, 0);
    assert_eq!(host.reset_taps, 1);
}

#[test]
fn overlong_disc_name_is_flagged() {
    let dir = tempfile::tempdir().unwrap();
    let mut host = FakeHost::new(dir.path());
    let mut movie = Movie::new();

    // Not recording: ignored.
    movie.signal_disc_change(&mut host, "/games/disc2.iso");
    assert_eq!(movie.disc_change(), "");

    movie
        .begin_recording_input(&mut host, ONE_PAD, [false; 4])
        .unwrap();
    let long = format!("/games/{}.iso", "x".repeat(40));
    movie.signal_disc_change(&mut host, &long);
    assert!(host.saw_alert("must not be longer than 40 characters"));
}

/// Records four frames, keeping the state chunk taken after frame two.
fn recording_with_checkpoint(host: &mut FakeHost, path: &Path) -> MovieStateChunk {
    let mut recorder = Movie::new();
    recorder
        .begin_recording_input(host, ONE_PAD, [false; 4])
        .unwrap();
    record_frames(&mut recorder, host, &[0, 1]);
    let checkpoint = recorder.state_chunk();
    record_frames(&mut recorder, host, &[2, 3]);
    recorder.save_recording(host, path).unwrap();
    checkpoint
}

#[test]
fn read_only_load_reports_mismatching_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("branch.dtm");
    let mut host = FakeHost::new(dir.path());
    let checkpoint = recording_with_checkpoint(&mut host, &path);
    assert_eq!(checkpoint.current_byte, 16);

    let mut player = Movie::new();
    host.ticks = 0;
    player.play_input(&mut host, &path).unwrap();
    let mut pad = GcPadStatus::default();
    player.play_controller(&mut host, &mut pad, 0);
    player.play_controller(&mut host, &mut pad, 0);

    // The file on disk diverges at frame 1's stick X.
    let mut bytes = fs::read(&path).unwrap();
    bytes[HEADER_SIZE + 8 + 4] = 85;
    fs::write(&path, &bytes).unwrap();

    player.restore_state_chunk(&checkpoint);
    player.load_input(&mut host, &path);

    assert!(host.saw_alert("mismatches on frame 1"));
    assert!(host.saw_alert("the current movie presses:\nStart=0, A=1"));
    assert!(host.saw_alert("AnalogX=1,"));
    assert!(host.saw_alert("AnalogX=85,"));
    assert_eq!(player.input_stream()[12], 85);
    assert_eq!(player.play_mode(), PlayMode::Playing);
    assert!(!host.saw_message("Switched to"));
    assert_eq!(read_header(&path).num_rerecords, 0);
}

#[test]
fn read_write_load_counts_a_rerecord() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rerecord.dtm");
    let mut host = FakeHost::new(dir.path());
    let checkpoint = recording_with_checkpoint(&mut host, &path);

    let mut movie = Movie::new();
    movie.set_read_only(&mut host, false);
    host.ticks = 0;
    movie.play_input(&mut host, &path).unwrap();

    movie.restore_state_chunk(&checkpoint);
    movie.load_input(&mut host, &path);

    assert_eq!(movie.play_mode(), PlayMode::Recording);
    assert!(host.saw_message("Switched to recording"));
    assert_eq!(movie.rerecord_count(), 1);
    assert_eq!(read_header(&path).num_rerecords, 1);
    assert_eq!(movie.input_stream().len(), 32);
    assert_eq!(movie.current_byte(), 16);
    assert_eq!(movie.total_frames(), 4);

    // Recording from the checkpoint drops everything after it.
    movie.record_input(&pad_frame(99), 0);
    assert_eq!(movie.input_stream().len(), 24);
    assert_eq!(movie.input_stream()[20], 99);
}

#[test]
fn loading_a_state_past_the_movie_ends_it() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("past.dtm");
    let mut host = FakeHost::new(dir.path());
    recording_with_checkpoint(&mut host, &path);

    let mut movie = Movie::new();
    movie.play_input(&mut host, &path).unwrap();
    movie.restore_state_chunk(&MovieStateChunk {
        current_byte: 1_000,
        current_frame: 125,
        ..Default::default()
    });
    movie.load_input(&mut host, &path);

    assert!(host.saw_alert("ends before the current frame"));
    assert_eq!(movie.play_mode(), PlayMode::None);
}

#[test]
fn corrupt_state_cursor_ends_playback_without_overflow() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wild.dtm");
    let mut host = FakeHost::new(dir.path());
    recording_with_checkpoint(&mut host, &path);

    let bytes = MovieStateChunk {
        current_byte: u64::MAX,
        ..Default::default()
    }
    .to_postcard_bytes()
    .unwrap();
    let chunk = MovieStateChunk::from_postcard_bytes(&bytes).unwrap();

    let mut movie = Movie::new();
    movie.play_input(&mut host, &path).unwrap();
    movie.restore_state_chunk(&chunk);
    movie.load_input(&mut host, &path);
    assert!(host.saw_alert("ends before the current frame"));
    assert_eq!(movie.play_mode(), PlayMode::None);

    // Same cursor reaching playback directly.
    let mut player = Movie::new();
    player.play_input(&mut host, &path).unwrap();
    player.restore_state_chunk(&chunk);
    let mut pad = GcPadStatus::default();
    player.play_controller(&mut host, &mut pad, 0);
    assert!(host.saw_alert("Premature movie end in PlayController."));
    assert_eq!(player.play_mode(), PlayMode::None);
}

#[test]
fn missing_movie_file_stops_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gone.dtm");
    let mut host = FakeHost::new(dir.path());
    recording_with_checkpoint(&mut host, &path);

    let mut movie = Movie::new();
    movie.play_input(&mut host, &path).unwrap();
    fs::remove_file(&path).unwrap();
    movie.load_input(&mut host, &path);

    assert!(host.saw_alert("Failed to read"));
    assert_eq!(movie.play_mode(), PlayMode::None);
}

#[test]
fn recording_from_save_state_ships_the_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mid.dtm");
    let mut host = FakeHost::new(dir.path());
    host.running = true;
    host.started = true;
    host.settings = RecordingSettings {
        memcards: 0b01,
        revision: "abcd".into(),
        dsp: DspRoms::Lle {
            irom: vec![1, 2, 3, 4],
            coef: vec![5, 6],
        },
        ..Default::default()
    };

    let mut recorder = Movie::new();
    recorder
        .begin_recording_input(&mut host, ONE_PAD, [false; 4])
        .unwrap();
    assert!(dir.path().join("dtm.sav").exists());
    assert!(recorder.is_recording_input_from_save_state());
    assert!(recorder.is_just_starting_recording_input_from_save_state());
    assert!(recorder.is_using_memcard(0));
    assert!(!recorder.is_using_memcard(1));

    record_frames(&mut recorder, &mut host, &[1]);
    assert!(!recorder.is_just_starting_recording_input_from_save_state());
    recorder.save_recording(&mut host, &path).unwrap();

    let state = sibling_state_path(&path);
    assert_eq!(fs::read(&state).unwrap(), b"state");
    let header = read_header(&path);
    assert!(header.from_save_state);
    assert_eq!(header.memcards, 0b01);
    assert_eq!(&header.revision[..3], &[0xAB, 0xCD, 0x00]);
    assert_eq!(header.dsp_irom_hash, dsp_rom_hash(&[1, 2, 3, 4], DSP_IROM_BYTE_SIZE));
    assert_eq!(header.dsp_coef_hash, dsp_rom_hash(&[5, 6], DSP_COEF_BYTE_SIZE));

    let mut player = Movie::new();
    assert_eq!(player.play_input(&mut host, &path).unwrap(), Some(state));
    assert!(player.is_playing_input());
    assert!(player.is_recording_input_from_save_state());
    player.frame_update();
    assert!(player.is_just_starting_playing_input_from_save_state());
}

#[test]
fn saving_to_an_unwritable_path_reports_failure() {
    let dir = tempfile::tempdir().unwrap();
    let mut host = FakeHost::new(dir.path());
    let mut movie = Movie::new();
    movie
        .begin_recording_input(&mut host, ONE_PAD, [false; 4])
        .unwrap();

    let path = dir.path().join("missing-dir").join("run.dtm");
    assert!(movie.save_recording(&mut host, &path).is_err());
    assert!(host.saw_message("Failed to save"));
}

#[test]
fn mismatched_game_id_ends_playback_on_boot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("other.dtm");
    write_movie(&path, &gc_header(), &[0u8; 8]);

    let mut host = FakeHost::new(dir.path());
    let mut movie = Movie::new();
    movie.play_input(&mut host, &path).unwrap();

    host.game_id = "GZLE01".into();
    movie.init(&mut host, &BootInfo::default());
    assert!(host.saw_alert(
        "The recorded game (GALE01) is not the same as the selected game (GZLE01)"
    ));
    assert_eq!(movie.play_mode(), PlayMode::None);
}

#[test]
fn boot_checksums_are_recorded_and_verified() {
    let dir = tempfile::tempdir().unwrap();
    let disc = dir.path().join("game.iso");
    fs::write(&disc, vec![0x5Au8; 4096]).unwrap();
    let digest = md5_file(&disc).unwrap();
    let boot = BootInfo {
        disc_path: Some(disc.clone()),
    };
    let mut host = FakeHost::new(dir.path());

    let mut recorder = Movie::new();
    recorder
        .begin_recording_input(&mut host, ONE_PAD, [false; 4])
        .unwrap();
    recorder.init(&mut host, &boot);
    assert!(recorder.checksum_pending());
    recorder.wait_checksum(&mut host);
    assert!(!recorder.checksum_pending());
    assert_eq!(recorder.md5(), digest);
    assert!(host.saw_message("Finished calculating checksum."));

    for (md5, expected) in [
        (digest, "Checksum of current game matches the recorded game."),
        ([0xEE; 16], "Checksum of current game does not match the recorded game!"),
    ] {
        let path = dir.path().join("verify.dtm");
        write_movie(&path, &DtmHeader { md5, ..gc_header() }, &[0u8; 8]);
        let mut player = Movie::new();
        player.play_input(&mut host, &path).unwrap();
        player.init(&mut host, &boot);
        player.wait_checksum(&mut host);
        assert!(host.saw_message(expected));
    }

    // An all-zero digest means nothing to verify.
    let path = dir.path().join("unchecked.dtm");
    write_movie(&path, &gc_header(), &[0u8; 8]);
    let mut player = Movie::new();
    player.play_input(&mut host, &path).unwrap();
    player.init(&mut host, &boot);
    assert!(!player.checksum_pending());
}

#[test]
fn saving_waits_for_the_recording_checksum() {
    let dir = tempfile::tempdir().unwrap();
    let disc = dir.path().join("game.iso");
    fs::write(&disc, vec![0xC3u8; 8192]).unwrap();
    let path = dir.path().join("hashed.dtm");
    let mut host = FakeHost::new(dir.path());

    let mut recorder = Movie::new();
    recorder
        .begin_recording_input(&mut host, ONE_PAD, [false; 4])
        .unwrap();
    recorder.init(
        &mut host,
        &BootInfo {
            disc_path: Some(disc.clone()),
        },
    );
    record_frames(&mut recorder, &mut host, &[5, 6]);
    recorder.save_recording(&mut host, &path).unwrap();

    assert!(!recorder.checksum_pending());
    assert_eq!(read_header(&path).md5, md5_file(&disc).unwrap());
}

#[test]
fn movie_devices_are_pushed_to_the_host() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("devices.dtm");
    let header = DtmHeader {
        controllers: 0b0011 | (1 << 4),
        gba_controllers: 0b0010,
        bongos: 0b0001,
        save_config: true,
        is_wii: true,
        ..gc_header()
    };
    write_movie(&path, &header, &[0u8; 8]);

    let mut host = FakeHost::new(dir.path());
    host.si = [SiDevice::Keyboard, SiDevice::None, SiDevice::None, SiDevice::None];
    let mut movie = Movie::new();
    movie.play_input(&mut host, &path).unwrap();
    assert!(movie.is_using_bongo(0));
    assert!(movie.is_using_gba(1));

    // Nothing happens until the core runs.
    movie.change_pads(&mut host);
    assert_eq!(host.si[0], SiDevice::Keyboard);

    host.running = true;
    movie.change_pads(&mut host);
    assert_eq!(
        host.si,
        [SiDevice::TaruKonga, SiDevice::GbaEmulated, SiDevice::None, SiDevice::None]
    );

    movie.change_wii_pads(&mut host, true);
    assert_eq!(host.wiimotes, [true, false, false, false]);
}

#[test]
fn input_display_follows_configuration_when_idle() {
    let dir = tempfile::tempdir().unwrap();
    let mut host = FakeHost::new(dir.path());
    host.si[2] = SiDevice::GbaEmulated;
    let mut movie = Movie::new();

    assert_eq!(movie.get_input_display(&host), "\n\n");
    assert!(movie.is_using_gba(2));

    let handle = movie.input_display();
    movie.check_pad_status(&pad_frame(0), 0);
    let text = movie.get_input_display(&host);
    assert!(text.starts_with("P1: A ANA:LEFT"));
    assert_eq!(
        handle.render([true, false, false, false], [false; 4]),
        text.lines().next().map(|l| format!("{l}\n")).unwrap()
    );
}

#[test]
fn shutdown_clears_the_stream() {
    let dir = tempfile::tempdir().unwrap();
    let mut host = FakeHost::new(dir.path());
    let mut movie = Movie::new();
    movie
        .begin_recording_input(&mut host, ONE_PAD, [false; 4])
        .unwrap();
    record_frames(&mut movie, &mut host, &[1, 2]);

    movie.shutdown();
    assert!(movie.input_stream().is_empty());
    assert_eq!(movie.total_frames(), 0);
    assert_eq!(movie.total_input_count(), 0);
}

fn arb_header() -> impl Strategy<Value = DtmHeader> {
    (
        "[A-Z0-9]{6}",
        "[a-zA-Z0-9 ]{0,32}",
        any::<(bool, u8, bool, u64, u64, u64)>(),
        any::<(u32, [u8; 16], u64, u8, u8, u64)>(),
        "[a-z0-9.]{0,40}",
        any::<([u8; 20], u32, u32)>(),
    )
        .prop_map(
            |(
                game_id,
                author,
                (is_wii, controllers, from_save_state, frame_count, input_count, lag_count),
                (num_rerecords, md5, recording_start_time, memcards, bongos, tick_count),
                disc_change,
                (revision, dsp_irom_hash, dsp_coef_hash),
            )| DtmHeader {
                game_id,
                is_wii,
                controllers,
                from_save_state,
                frame_count,
                input_count,
                lag_count,
                unique_id: 0,
                num_rerecords,
                author,
                md5,
                recording_start_time,
                save_config: true,
                config: MovieConfig {
                    video_backend: "OGL".into(),
                    dual_core: true,
                    language: 2,
                    ..Default::default()
                },
                memcards: memcards & 0b11,
                clear_save: false,
                bongos: bongos & 0x0F,
                netplay: false,
                gba_controllers: 0,
                disc_change,
                revision,
                dsp_irom_hash,
                dsp_coef_hash,
                tick_count,
            },
        )
}

proptest! {
    #[test]
    fn saved_movies_reload_identically(
        header in arb_header(),
        stream in prop::collection::vec(any::<u8>(), 0..128),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prop.dtm");
        write_movie(&path, &header, &stream);

        prop_assert_eq!(&read_header(&path), &header);
        let bytes = fs::read(&path).unwrap();
        prop_assert_eq!(&bytes[HEADER_SIZE..], &stream[..]);
    }
}
