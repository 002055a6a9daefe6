use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use cubium_core::{
    machine::Console,
    memory::{AddressSpace, EmulatedMemory, layout},
};
use cubium_support::{
    cheats::{CompareType, DataType, FilterType, MemoryRange, make_session},
    movie::{CONTROLLER_STATE_SIZE, ChecksumJob, ControllerState, DtmHeader, HEADER_SIZE},
};

/// Offline tools for DTM movies and RAM dumps
#[derive(Parser, Debug)]
#[command(name = "cubium")]
#[command(about = "Inspect input movies and search memory dumps", long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a movie's header and stream summary
    DtmInfo {
        movie: PathBuf,

        /// Also decode the first N pad snapshots (GameCube-only movies)
        #[arg(long, default_value_t = 0)]
        frames: usize,
    },

    /// Check a disc image against the checksum recorded in a movie
    Verify {
        movie: PathBuf,
        disc: PathBuf,
    },

    /// MD5 of a file, computed the way recordings store it
    Md5 { file: PathBuf },

    /// Scan a MEM1 dump for values
    Search {
        /// Raw MEM1 image
        dump: PathBuf,

        /// Scalar kind (u8, u16, u32, u64, s8, s16, s32, s64, f32, f64)
        #[arg(short = 't', long = "type", default_value = "u32")]
        data_type: DataType,

        /// Literal to compare against; omit to list every value
        #[arg(short, long)]
        value: Option<String>,

        #[arg(short, long, value_enum, default_value_t = CompareArg::Eq)]
        compare: CompareArg,

        /// First virtual address to scan
        #[arg(long, default_value = "0x80000000", value_parser = parse_address)]
        start: u32,

        /// Bytes to scan (defaults to all of MEM1)
        #[arg(long)]
        length: Option<u64>,

        /// Visit every byte offset instead of natural alignment
        #[arg(long)]
        unaligned: bool,

        /// Print values as hex
        #[arg(long)]
        hex: bool,

        /// Maximum results to print
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CompareArg {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl From<CompareArg> for CompareType {
    fn from(arg: CompareArg) -> Self {
        match arg {
            CompareArg::Eq => CompareType::Equal,
            CompareArg::Ne => CompareType::NotEqual,
            CompareArg::Lt => CompareType::Less,
            CompareArg::Le => CompareType::LessOrEqual,
            CompareArg::Gt => CompareType::Greater,
            CompareArg::Ge => CompareType::GreaterOrEqual,
        }
    }
}

fn parse_address(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid address {s}: {e}"))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::DtmInfo { movie, frames } => dtm_info(&movie, frames),
        Command::Verify { movie, disc } => verify(&movie, &disc),
        Command::Md5 { file } => {
            let digest = ChecksumJob::spawn(&file)
                .wait()
                .with_context(|| format!("hashing {}", file.display()))?;
            println!("{}  {}", hex::encode(digest), file.display());
            Ok(())
        }
        Command::Search {
            dump,
            data_type,
            value,
            compare,
            start,
            length,
            unaligned,
            hex,
            limit,
        } => {
            let image = fs::read(&dump).with_context(|| format!("reading {}", dump.display()))?;
            let length = length.unwrap_or(u64::from(layout::MEM1_SIZE));
            let console = Console::new(EmulatedMemory::from_mem1_image(&image));

            let mut session = make_session(
                vec![MemoryRange::new(start, length)],
                AddressSpace::Virtual,
                !unaligned,
                data_type,
            );
            if let Some(literal) = value.as_deref() {
                if !session.set_value_from_string(literal) {
                    bail!("{literal} is not a valid {data_type} value");
                }
                session.set_filter_type(FilterType::CompareAgainstSpecificValue);
                session.set_compare_type(compare.into());
            }
            session.run_search(&console)?;

            info!(
                "{} {data_type} results in {length:#x} bytes from {start:#010x}",
                session.result_count()
            );
            for index in 0..session.result_count().min(limit) {
                if let (Some(addr), Some(text)) = (
                    session.result_address(index),
                    session.result_value_as_string(index, hex),
                ) {
                    println!("{addr:#010x}  {text}");
                }
            }
            if session.result_count() > limit {
                println!("... {} more", session.result_count() - limit);
            }
            Ok(())
        }
    }
}

fn read_movie(path: &Path) -> anyhow::Result<(DtmHeader, Vec<u8>)> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let header = DtmHeader::decode(&bytes)?;
    Ok((header, bytes[HEADER_SIZE..].to_vec()))
}

fn dtm_info(path: &Path, frames: usize) -> anyhow::Result<()> {
    let (header, stream) = read_movie(path)?;

    let pads: Vec<_> = (0..4)
        .filter(|i| header.controllers & (1 << i) != 0)
        .map(|i| {
            if header.gba_controllers & (1 << i) != 0 {
                format!("{}:GBA", i + 1)
            } else {
                format!("{}:GC", i + 1)
            }
        })
        .collect();
    let wiimotes: Vec<_> = (0..4)
        .filter(|i| header.controllers & (1 << (i + 4)) != 0)
        .map(|i| (i + 1).to_string())
        .collect();

    println!("game id      {}", header.game_id);
    println!("platform     {}", if header.is_wii { "Wii" } else { "GameCube" });
    println!("author       {}", header.author);
    println!("pads         {}", pads.join(" "));
    println!("wii remotes  {}", wiimotes.join(" "));
    println!("frames       {} ({} lag)", header.frame_count, header.lag_count);
    println!("inputs       {}", header.input_count);
    println!("ticks        {}", header.tick_count);
    println!("rerecords    {}", header.num_rerecords);
    println!("start time   {}", header.recording_start_time);
    println!("save state   {}", header.from_save_state);
    println!("md5          {}", hex::encode(header.md5));
    println!("revision     {}", hex::encode(header.revision));
    println!("stream bytes {}", stream.len());
    if header.save_config {
        println!(
            "config       video={} audio={} cpu_core={} dual_core={}",
            header.config.video_backend,
            header.config.audio_emulator,
            header.config.cpu_core,
            header.config.dual_core
        );
    }
    if !header.disc_change.is_empty() {
        println!("disc change  {}", header.disc_change);
    }

    if frames > 0 {
        if header.controllers & 0xF0 != 0 {
            warn!("movie contains Wii Remote reports; pad snapshots cannot be decoded in order");
        } else {
            for (index, chunk) in stream
                .chunks_exact(CONTROLLER_STATE_SIZE)
                .take(frames)
                .enumerate()
            {
                if let Some(state) = ControllerState::from_bytes(chunk) {
                    println!("{index:>6}  {}", state.describe());
                }
            }
        }
    }
    Ok(())
}

fn verify(movie: &Path, disc: &Path) -> anyhow::Result<()> {
    let (header, _) = read_movie(movie)?;
    if !header.has_md5() {
        bail!("{} carries no disc checksum", movie.display());
    }

    info!("Verifying checksum...");
    let digest = ChecksumJob::spawn(disc)
        .wait()
        .with_context(|| format!("hashing {}", disc.display()))?;
    if digest == header.md5 {
        println!("Checksum of current game matches the recorded game.");
        Ok(())
    } else {
        bail!(
            "checksum mismatch: movie {} vs disc {}",
            hex::encode(header.md5),
            hex::encode(digest)
        )
    }
}
