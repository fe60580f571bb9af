//! Shared test data: a small project, one track and its AAI container

use std::io::Cursor;

use crate::container::{AaiWriter, AudioChunkHeader, AAI_VERSION};
use crate::loader::{LoadedTrack, MemoryFetcher};
use crate::metadata::TrackInfo;

pub const PROJECT_URL: &str = "mem://p1/project.json";
pub const TRACK_URL: &str = "mem://t1/track.json";
pub const IMAGE_URL: &str = "mem://t1/art.png";
pub const AUDIO_URL: &str = "mem://t1/audio.aai";

pub const PROJECT_JSON: &str = r#"{"id":"p1","name":"Demo","tracks":["t1"],"default_track":"t1"}"#;

/// Backing plays both segments, victory only the second
pub const TRACK_JSON: &str = r#"{
    "id": "t1",
    "title": "Fixture",
    "image_url": "mem://t1/art.png",
    "audio_url": "mem://t1/audio.aai",
    "bpm": 120.0,
    "segments": [
        {"id": "intro", "start_time": 0.0, "end_time": 1.0, "beats": [0.0, 0.5], "bars": [0.0]},
        {"id": "loop", "start_time": 1.0, "end_time": 2.0, "beats": [1.0, 1.5], "bars": [1.0]}
    ],
    "arrangements": [
        {"name": "Backing", "type_id": 3, "parts": ["intro", "loop"]},
        {"name": "Victory", "type_id": 5, "parts": ["loop"]}
    ]
}"#;

/// Stereo f32 PCM container with one chunk per listed layer, built from
/// `sample` called as `(layer index, frame)`
pub fn container_with(
    layers: &[u16],
    seconds: f64,
    rate: u32,
    sample: impl Fn(u16, usize) -> f32,
) -> Vec<u8> {
    let frames = (seconds * rate as f64).round() as usize;
    let mut writer = AaiWriter::new(AAI_VERSION);
    for &kind in layers {
        let data: Vec<u8> = (0..frames)
            .flat_map(|frame| {
                let value = sample(kind, frame);
                [value, value]
            })
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let header = AudioChunkHeader {
            kind,
            format: 0,
            block_size: 8,
            channels: 2,
            frequency: rate,
            id: kind as u64,
            data_size: 0,
        };
        writer.write_audio(header, &data);
    }
    writer.finish()
}

/// Four constant stems, 0.1 × layer index
pub fn stem_container(seconds: f64, rate: u32) -> Vec<u8> {
    container_with(&[1, 2, 3, 4], seconds, rate, |kind, _| 0.1 * kind as f32)
}

/// Mono 16-bit WAV of a constant quarter-scale signal
pub fn wav_bytes(seconds: f64, rate: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for _ in 0..(seconds * rate as f64) as usize {
            writer.write_sample(8192i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Fetcher serving the whole fixture set
pub fn fetcher(rate: u32) -> MemoryFetcher {
    let fetcher = MemoryFetcher::new();
    fetcher.insert(PROJECT_URL, PROJECT_JSON);
    fetcher.insert(TRACK_URL, TRACK_JSON);
    fetcher.insert(IMAGE_URL, vec![0x89u8, b'P', b'N', b'G']);
    fetcher.insert(AUDIO_URL, stem_container(2.0, rate));
    fetcher
}

pub fn loaded_track(rate: u32) -> LoadedTrack {
    let info = TrackInfo::from_json(TRACK_JSON).unwrap();
    LoadedTrack::from_container(info, &stem_container(2.0, rate)).unwrap()
}
