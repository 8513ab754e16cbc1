use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mtlog::codec::hex_dump;
use mtlog::{
    DecodeCache, DecoderConfig, PayloadDecoder, Record, RecordDocument, RecordStream, StreamStop, TrailerProfile,
};

#[derive(Parser)]
#[command(name = "mtlog")]
#[command(about = "Inspect and decode Map Together session logs")]
struct Cli {
    /// JSON file with decoder settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides the profile from --config
    #[arg(long, global = true, value_enum)]
    profile: Option<TrailerProfile>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// One line per record header
    List { file: PathBuf },
    /// Decoded records as a JSON array
    Decode {
        file: PathBuf,
        #[arg(long = "type")]
        type_id: Option<u32>,
        #[arg(long)]
        pretty: bool,
    },
    /// Hex view of one whole frame
    Hex {
        file: PathBuf,
        index: u64,
        #[arg(long)]
        ascii: bool,
    },
    /// Print headers, then keep polling for appended records
    Follow {
        file: PathBuf,
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::List { file } => list(&file),
        Commands::Decode { file, type_id, pretty } => {
            let config = load_config(cli.config.as_deref(), cli.profile)?;
            decode(&file, config, type_id, pretty)
        }
        Commands::Hex { file, index, ascii } => hex(&file, index, ascii),
        Commands::Follow { file, interval_ms } => follow(&file, Duration::from_millis(interval_ms)),
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>, profile: Option<TrailerProfile>) -> mtlog::Result<DecoderConfig> {
    let config = match path {
        Some(path) => DecoderConfig::from_json_file(path)?,
        None => DecoderConfig::default(),
    };
    Ok(match profile {
        Some(profile) => config.with_profile(profile),
        None => config,
    })
}

fn header_line(r: &Record) -> String {
    format!(
        "{:>6}  @{:<10}  {:<26} payload={:<7} {:<16} {}",
        r.index,
        r.file_offset,
        r.type_name(),
        r.payload_len,
        r.player_id,
        r.time_string()
    )
}

fn report_stop(stream: &RecordStream<BufReader<File>>) {
    if let Some(stop @ (StreamStop::Truncated { .. } | StreamStop::Corrupt { .. })) = stream.last_stop() {
        eprintln!("stopped after {} records: {:?}", stream.records_read(), stop);
    }
}

fn list(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut stream = RecordStream::open(file)?;
    for record in stream.records() {
        println!("{}", header_line(&record?));
    }
    report_stop(&stream);
    Ok(())
}

fn decode(
    file: &Path,
    config: DecoderConfig,
    type_id: Option<u32>,
    pretty: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut stream = RecordStream::open(file)?;
    let records: Vec<Record> = stream
        .poll_new()?
        .into_iter()
        .filter(|r| type_id.map_or(true, |t| r.type_id == t))
        .collect();
    report_stop(&stream);

    let decoder = PayloadDecoder::new(config);
    let mut cache = DecodeCache::new();
    for record in &records {
        cache.get_or_decode(&mut stream, &decoder, record)?;
    }

    let docs: Vec<RecordDocument> = records
        .iter()
        .map(|r| RecordDocument::new(r, cache.get(r.index)))
        .collect();
    let out = if pretty {
        serde_json::to_string_pretty(&docs)?
    } else {
        serde_json::to_string(&docs)?
    };
    println!("{out}");
    Ok(())
}

fn hex(file: &Path, index: u64, ascii: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut stream = RecordStream::open(file)?;
    let mut found = None;
    for record in stream.records() {
        let record = record?;
        if record.index == index {
            found = Some(record);
            break;
        }
    }
    let Some(record) = found else {
        return Err(format!("record {index} not found ({} records)", stream.records_read()).into());
    };

    println!("{}", header_line(&record));
    let bytes = stream.read_frame_bytes(&record)?;
    println!("{}", hex_dump(&bytes, record.file_offset, ascii));
    Ok(())
}

fn follow(file: &Path, interval: Duration) -> Result<(), Box<dyn std::error::Error>> {
    let mut stream = RecordStream::open(file)?;
    loop {
        for record in stream.poll_new()? {
            println!("{}", header_line(&record));
        }
        if let Some(StreamStop::Corrupt { offset, reason }) = stream.last_stop() {
            return Err(format!("corrupt frame at {offset}: {reason}").into());
        }
        thread::sleep(interval);
    }
}
