//! Band-energy reference pipeline.
//!
//! A self-contained pipeline that decodes WAV files with `hound`, windows
//! them into fixed-duration chunks, and scores each chunk by the spectral
//! energy inside per-label frequency bands (Goertzel), mapped through a
//! sigmoid. Its model directory holds a `model` file (one `label low_hz
//! high_hz` line per band), a `labels` file (one label per line), and an
//! optional `species_presence_model` range table.

use crate::config::{ModelConfig, PipelineBuildConfig, PreprocessorConfig};
use crate::error::PipelineError;
use crate::pipeline::{Model, Pipeline, Preprocessor, SpeciesPredictor};
use crate::plugins::range_table::RangeTableSpeciesPredictor;
use crate::registry::PipelineFactory;
use crate::types::{Chunk, RawAudio};
use nightjar_foundation::AudioError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const PIPELINE_NAME: &str = "energy";

const MODEL_FILE: &str = "model";
const LABELS_FILE: &str = "labels";
const SPECIES_FILE: &str = "species_presence_model";

pub struct EnergyPreprocessor {
    config: PreprocessorConfig,
}

impl EnergyPreprocessor {
    pub fn new(config: PreprocessorConfig) -> Self {
        Self { config }
    }
}

impl Preprocessor for EnergyPreprocessor {
    fn name(&self) -> &str {
        PIPELINE_NAME
    }

    fn read(&self, path: &Path) -> Result<RawAudio, AudioError> {
        let reader = hound::WavReader::open(path).map_err(|e| map_hound(path, e))?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(|e| map_hound(path, e))?,
            hound::SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()
                    .map_err(|e| map_hound(path, e))?
            }
        };

        let mono = mixdown(&interleaved, channels);
        let samples = resample(&mono, spec.sample_rate, self.config.sample_rate_hz);
        Ok(RawAudio {
            samples,
            sample_rate: self.config.sample_rate_hz,
        })
    }

    fn chunk(&self, raw: &RawAudio) -> Vec<Chunk> {
        let rate = raw.sample_rate as f32;
        let chunk_len = (self.config.chunk_seconds * rate) as usize;
        let step = chunk_len
            .saturating_sub((self.config.overlap_seconds * rate) as usize)
            .max(1);
        if chunk_len == 0 {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut offset = 0usize;
        while offset < raw.samples.len() {
            let end = (offset + chunk_len).min(raw.samples.len());
            let tail = end - offset;
            // Tail windows under half a chunk carry too little signal; drop them.
            if tail * 2 >= chunk_len {
                let mut samples = raw.samples[offset..end].to_vec();
                samples.resize(chunk_len, 0.0);
                chunks.push(Chunk {
                    start_s: offset as f32 / rate,
                    end_s: (offset + chunk_len) as f32 / rate,
                    samples,
                });
            }
            if end == raw.samples.len() {
                break;
            }
            offset += step;
        }
        chunks
    }
}

fn map_hound(path: &Path, err: hound::Error) -> AudioError {
    match err {
        hound::Error::IoError(e) => AudioError::from_io(path.to_path_buf(), e),
        hound::Error::FormatError(detail) => AudioError::UnsupportedFormat {
            path: path.to_path_buf(),
            detail: detail.to_string(),
        },
        other => AudioError::CorruptData {
            path: path.to_path_buf(),
            detail: other.to_string(),
        },
    }
}

fn mixdown(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

fn resample(samples: &[f32], from_hz: u32, to_hz: u32) -> Vec<f32> {
    if from_hz == to_hz || samples.is_empty() {
        return samples.to_vec();
    }
    let ratio = from_hz as f64 / to_hz as f64;
    let out_len = ((samples.len() as f64) / ratio).floor() as usize;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let left = pos.floor() as usize;
            let right = (left + 1).min(samples.len() - 1);
            let frac = (pos - left as f64) as f32;
            samples[left] * (1.0 - frac) + samples[right] * frac
        })
        .collect()
}

struct Band {
    label: String,
    low_hz: f32,
    high_hz: f32,
}

pub struct EnergyModel {
    labels: Vec<String>,
    bands: Vec<Band>,
    sigmoid_sensitivity: f32,
}

impl EnergyModel {
    pub fn load(model_dir: &Path, config: &ModelConfig) -> Result<Self, PipelineError> {
        let labels = read_labels(&model_dir.join(LABELS_FILE))?;
        let bands = read_bands(&model_dir.join(MODEL_FILE))?;
        for band in &bands {
            if !labels.contains(&band.label) {
                return Err(PipelineError::Config(format!(
                    "model band references label {:?} absent from the labels file",
                    band.label
                )));
            }
        }
        Ok(Self {
            labels,
            bands,
            sigmoid_sensitivity: config.sigmoid_sensitivity,
        })
    }
}

impl Model for EnergyModel {
    fn name(&self) -> &str {
        PIPELINE_NAME
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn predict(&mut self, chunk: &Chunk) -> Result<HashMap<String, f32>, PipelineError> {
        let mean_square = chunk.samples.iter().map(|s| s * s).sum::<f32>()
            / chunk.samples.len().max(1) as f32
            + f32::EPSILON;
        let rate = sample_rate_of(chunk);
        let mut scores = HashMap::with_capacity(self.bands.len());
        for band in &self.bands {
            let center = (band.low_hz + band.high_hz) / 2.0;
            let power = goertzel_power(&chunk.samples, rate, center);
            // A pure in-band tone yields power == 2x mean square.
            let ratio = (power / (2.0 * mean_square)).clamp(0.0, 1.0);
            scores.insert(
                band.label.clone(),
                sigmoid(self.sigmoid_sensitivity * (4.0 * ratio - 2.0)),
            );
        }
        Ok(scores)
    }
}

fn sample_rate_of(chunk: &Chunk) -> f32 {
    let span = chunk.end_s - chunk.start_s;
    if span > 0.0 {
        chunk.samples.len() as f32 / span
    } else {
        1.0
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Normalized Goertzel power of `samples` at `freq`.
fn goertzel_power(samples: &[f32], sample_rate: f32, freq: f32) -> f32 {
    if samples.is_empty() || sample_rate <= 0.0 {
        return 0.0;
    }
    let n = samples.len() as f32;
    let k = (0.5 + n * freq / sample_rate).floor();
    let w = 2.0 * std::f32::consts::PI * k / n;
    let coeff = 2.0 * w.cos();
    let (mut s1, mut s2) = (0.0f32, 0.0f32);
    for &x in samples {
        let s0 = x + coeff * s1 - s2;
        s2 = s1;
        s1 = s0;
    }
    (s1 * s1 + s2 * s2 - coeff * s1 * s2) / (n * n / 4.0)
}

fn read_labels(path: &Path) -> Result<Vec<String>, PipelineError> {
    let text = std::fs::read_to_string(path).map_err(|_| PipelineError::LabelsMissing {
        path: path.to_path_buf(),
    })?;
    let labels: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    if labels.is_empty() {
        return Err(PipelineError::Config(format!(
            "labels file {} is empty",
            path.display()
        )));
    }
    Ok(labels)
}

fn read_bands(path: &Path) -> Result<Vec<Band>, PipelineError> {
    let text = std::fs::read_to_string(path).map_err(|_| PipelineError::ModelArtifactMissing {
        path: path.to_path_buf(),
    })?;
    let mut bands = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let mut fields = line.split_whitespace();
        let (Some(label), Some(low), Some(high)) =
            (fields.next(), fields.next(), fields.next())
        else {
            return Err(PipelineError::Config(format!(
                "bad model band line {line:?} in {}",
                path.display()
            )));
        };
        let (Ok(low_hz), Ok(high_hz)) = (low.parse::<f32>(), high.parse::<f32>()) else {
            return Err(PipelineError::Config(format!(
                "bad model band line {line:?} in {}",
                path.display()
            )));
        };
        bands.push(Band {
            label: label.to_string(),
            low_hz,
            high_hz,
        });
    }
    if bands.is_empty() {
        return Err(PipelineError::Config(format!(
            "model file {} defines no bands",
            path.display()
        )));
    }
    Ok(bands)
}

pub struct EnergyPipelineFactory;

impl PipelineFactory for EnergyPipelineFactory {
    fn name(&self) -> &str {
        PIPELINE_NAME
    }

    fn check_requirements(&self, model_dir: &Path) -> Result<(), PipelineError> {
        let model = model_dir.join(MODEL_FILE);
        if !model.is_file() {
            return Err(PipelineError::ModelArtifactMissing { path: model });
        }
        let labels = model_dir.join(LABELS_FILE);
        if !labels.is_file() {
            return Err(PipelineError::LabelsMissing { path: labels });
        }
        Ok(())
    }

    fn create(
        &self,
        model_dir: &Path,
        build: &PipelineBuildConfig,
    ) -> Result<Pipeline, PipelineError> {
        self.check_requirements(model_dir)?;
        let model = EnergyModel::load(model_dir, &build.model)?;
        let species = match build.recording.location()? {
            Some(_) => {
                let path: PathBuf = model_dir.join(SPECIES_FILE);
                let predictor = RangeTableSpeciesPredictor::load(PIPELINE_NAME, &path)?;
                Some(Box::new(predictor) as Box<dyn SpeciesPredictor>)
            }
            None => None,
        };
        Pipeline::new(
            Box::new(EnergyPreprocessor::new(build.preprocessor.clone())),
            Box::new(model),
            species,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_wav(path: &Path, freq: f32, seconds: f32, sample_rate: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let n = (seconds * sample_rate as f32) as usize;
        for i in 0..n {
            let t = i as f32 / sample_rate as f32;
            let sample = (t * freq * 2.0 * std::f32::consts::PI).sin();
            writer.write_sample((sample * i16::MAX as f32 * 0.8) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn model_dir(root: &Path) -> PathBuf {
        let dir = root.join("energy");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("labels"), "robin\nowl\n").unwrap();
        std::fs::write(dir.join("model"), "robin 1800 2200\nowl 300 500\n").unwrap();
        dir
    }

    #[test]
    fn chunking_windows_the_recording() {
        let pre = EnergyPreprocessor::new(PreprocessorConfig {
            sample_rate_hz: 1000,
            chunk_seconds: 1.0,
            overlap_seconds: 0.0,
        });
        let raw = RawAudio {
            samples: vec![0.0; 2500],
            sample_rate: 1000,
        };
        let chunks = pre.chunk(&raw);
        // 2.5 s at 1 s windows: two full chunks plus a padded half-second tail.
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].samples.len(), 1000);
        assert_eq!(chunks[2].samples.len(), 1000);
        assert!((chunks[2].start_s - 2.0).abs() < 1e-6);
    }

    #[test]
    fn short_tail_is_dropped() {
        let pre = EnergyPreprocessor::new(PreprocessorConfig {
            sample_rate_hz: 1000,
            chunk_seconds: 1.0,
            overlap_seconds: 0.0,
        });
        let raw = RawAudio {
            samples: vec![0.0; 2100],
            sample_rate: 1000,
        };
        assert_eq!(pre.chunk(&raw).len(), 2);
    }

    #[test]
    fn tone_in_band_scores_above_out_of_band() {
        let root = TempDir::new().unwrap();
        let dir = model_dir(root.path());
        let wav = root.path().join("tone.wav");
        write_wav(&wav, 2000.0, 3.0, 16_000);

        let build = PipelineBuildConfig::default();
        let mut model = EnergyModel::load(&dir, &build.model).unwrap();
        let pre = EnergyPreprocessor::new(build.preprocessor.clone());
        let raw = pre.read(&wav).unwrap();
        let chunks = pre.chunk(&raw);
        assert!(!chunks.is_empty());

        let scores = model.predict(&chunks[0]).unwrap();
        assert!(scores["robin"] > 0.5, "in-band tone: {scores:?}");
        assert!(scores["owl"] < 0.5, "out-of-band label: {scores:?}");
    }

    #[test]
    fn unreadable_wav_is_an_audio_error() {
        let root = TempDir::new().unwrap();
        let bogus = root.path().join("bogus.wav");
        std::fs::write(&bogus, b"definitely not a wav").unwrap();
        let pre = EnergyPreprocessor::new(PreprocessorConfig::default());
        assert!(pre.read(&bogus).is_err());
    }

    #[test]
    fn factory_demands_model_and_labels() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("energy");
        std::fs::create_dir(&dir).unwrap();
        let factory = EnergyPipelineFactory;

        assert!(matches!(
            factory.check_requirements(&dir),
            Err(PipelineError::ModelArtifactMissing { .. })
        ));

        std::fs::write(dir.join("model"), "robin 1800 2200\n").unwrap();
        assert!(matches!(
            factory.check_requirements(&dir),
            Err(PipelineError::LabelsMissing { .. })
        ));

        std::fs::write(dir.join("labels"), "robin\n").unwrap();
        factory.check_requirements(&dir).unwrap();
    }

    #[test]
    fn missing_species_model_fails_at_build_time() {
        let root = TempDir::new().unwrap();
        let dir = model_dir(root.path());
        let factory = EnergyPipelineFactory;

        let mut build = PipelineBuildConfig::default();
        build.recording.latitude = Some(52.5);
        build.recording.longitude = Some(13.4);
        build.recording.date = chrono::NaiveDate::from_ymd_opt(2026, 5, 14);

        let err = factory.create(&dir, &build).unwrap_err();
        assert!(matches!(err, PipelineError::SpeciesModelMissing { .. }));
    }
}
