//! aai-inspect - list, decode and render AAI stem containers
//!
//! ```text
//! aai-inspect <file.aai> [--meta track.json] [--export-dir DIR]
//! ```
//!
//! - Prints the file header and every chunk
//! - Decodes each stem and prints its layout
//! - With `--meta`, prints the arrangements of the track
//! - With `--export-dir`, reconstructs every arrangement and writes one
//!   16-bit WAV per layer

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use plusmusic_core::arrangement::ArrangementAudio;
use plusmusic_core::config::EngineConfig;
use plusmusic_core::container::{AaiReader, Chunk};
use plusmusic_core::loader::LoadedTrack;
use plusmusic_core::metadata::TrackInfo;
use plusmusic_core::{AudioBuffer, Layer};

struct Args {
    input: PathBuf,
    meta: Option<PathBuf>,
    export_dir: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut input = None;
    let mut meta = None;
    let mut export_dir = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--meta" => meta = Some(PathBuf::from(args.next().context("--meta needs a path")?)),
            "--export-dir" => {
                export_dir = Some(PathBuf::from(args.next().context("--export-dir needs a path")?))
            }
            "-h" | "--help" => {
                println!("usage: aai-inspect <file.aai> [--meta track.json] [--export-dir DIR]");
                std::process::exit(0);
            }
            other if other.starts_with("--") => bail!("unknown flag {}", other),
            other => input = Some(PathBuf::from(other)),
        }
    }

    Ok(Args {
        input: input.context("missing input file (see --help)")?,
        meta,
        export_dir,
    })
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args()?;
    let bytes = std::fs::read(&args.input).with_context(|| format!("Failed to read {:?}", args.input))?;

    list_chunks(&bytes)?;

    let info = match &args.meta {
        Some(path) => {
            let json = std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
            TrackInfo::from_json(&json).with_context(|| format!("Invalid track metadata in {:?}", path))?
        }
        None => {
            let id = args
                .input
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("track")
                .to_string();
            TrackInfo::from_json(&serde_json::json!({ "id": id }).to_string())?
        }
    };

    let track = LoadedTrack::from_container(info, &bytes)?;
    print_stems(&track);
    print_arrangements(&track);

    if let Some(dir) = &args.export_dir {
        export(&track, dir)?;
    }
    Ok(())
}

fn list_chunks(bytes: &[u8]) -> Result<()> {
    let mut reader = AaiReader::from_bytes(bytes)?;
    let header = reader.header().clone();
    println!(
        "AAI v{}  header {} bytes  {} chunks  {} data bytes",
        header.version, header.size, header.chunk_count, header.data_size
    );

    for chunk in reader.by_ref() {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                println!("  stopped: {}", e);
                break;
            }
        };
        match &chunk {
            Chunk::Audio(audio) => println!(
                "  audio #{:<4} layer {:<8} format {}  {} ch @ {} Hz  {} bytes",
                audio.header.id,
                audio.layer().map_or("?", Layer::name),
                audio.header.format,
                audio.header.channels,
                audio.header.frequency,
                chunk.payload_len()
            ),
            Chunk::Raw(raw) => println!(
                "  raw   #{:<4} kind {:?}  format {}  {} bytes",
                raw.header.id,
                raw.raw_kind(),
                raw.header.format,
                chunk.payload_len()
            ),
        }
    }
    Ok(())
}

fn print_stems(track: &LoadedTrack) {
    println!();
    for layer in Layer::ALL {
        if let Some(buffer) = track.stems.get(layer) {
            println!(
                "  {:<8} {} ch @ {} Hz  {:.2}s  peak {:.3}",
                layer.name(),
                buffer.channels,
                buffer.sample_rate,
                buffer.duration_seconds(),
                buffer.peak()
            );
        }
    }
    if track.filter.is_some() {
        println!("  filter impulse present");
    }
}

fn print_arrangements(track: &LoadedTrack) {
    if track.info.arrangements.is_empty() {
        return;
    }
    println!();
    for info in &track.info.arrangements {
        let arrangement = track.info.resolve_arrangement(info);
        println!(
            "  {:<14} {:<16} {} segments  {:.2}s  {} beats  {} bars",
            info.tag,
            info.name,
            arrangement.segments.len(),
            arrangement.length(),
            arrangement.beats.len(),
            arrangement.bars.len()
        );
    }
}

fn export(track: &LoadedTrack, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;

    let mut reconstructor = EngineConfig::default().reconstructor();
    reconstructor.set_filter(track.filter.clone().map(Arc::new));

    for info in &track.info.arrangements {
        let arrangement = track.info.resolve_arrangement(info);
        let audio: ArrangementAudio =
            reconstructor.reconstruct_all(&arrangement, &track.stems, track.info.has_filter);
        for layer in Layer::ALL {
            if let Some(buffer) = audio.layer(layer) {
                let path = dir.join(format!("{}_{}_{}.wav", track.id(), info.tag, layer.name()));
                write_wav(buffer, &path)?;
                log::info!("Wrote {:?}", path);
            }
        }
    }
    Ok(())
}

fn write_wav(buffer: &AudioBuffer, path: &Path) -> Result<()> {
    let spec = hound::WavSpec {
        channels: buffer.channels,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).with_context(|| format!("Failed to create {:?}", path))?;
    for &sample in &buffer.samples {
        writer.write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
    }
    writer.finalize()?;
    Ok(())
}
