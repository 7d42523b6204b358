use serde::{Deserialize, Serialize};
use std::fmt;

// ─── Decoded audio ──────────────────────────────────────────────────────────

/// An immutable decoded clip: interleaved 16-bit signed PCM.
///
/// The stereo-field analyzer assumes 16-bit signed encoding throughout
/// (`raw / 32768.0` normalization); the decoder upholds that by always
/// producing i16 regardless of the source codec's native format.
#[derive(Debug, Clone)]
pub struct ClipPcm {
    /// Interleaved samples: frame = one sample per channel.
    pub samples: Vec<i16>,
    /// Channel count. The analyzer only produces output for >= 2.
    pub channels: usize,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl ClipPcm {
    /// Number of whole interleaved frames in the buffer.
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f64 / self.sample_rate as f64
        }
    }
}

impl fmt::Display for ClipPcm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz  {} ch  {} frames  {:.2}s",
            self.sample_rate,
            self.channels,
            self.frames(),
            self.duration_secs(),
        )
    }
}

// ─── Quiz identities ────────────────────────────────────────────────────────

/// Which of the two clips in a question. Serializes as "A"/"B" to match the
/// quiz manifest and the results CSV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => write!(f, "A"),
            Side::B => write!(f, "B"),
        }
    }
}

/// One entry of the quiz manifest (`quiz.json`): prompt text, which clip of
/// the pair is actually wider, and the 1-based clip-pair file number
/// (`sound{clip}_A.flac` / `sound{clip}_B.flac`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionSpec {
    pub prompt: String,
    pub correct: Side,
    pub clip: usize,
}

impl QuestionSpec {
    /// The built-in question list: `n` identical prompts, clip pairs
    /// numbered 1..=n, A always the wider rendition.
    pub fn builtin(n: usize) -> Vec<Self> {
        (1..=n)
            .map(|i| Self {
                prompt: "Which sound is wider?".to_string(),
                correct: Side::A,
                clip: i,
            })
            .collect()
    }
}

// ─── Playback status ────────────────────────────────────────────────────────

/// Transport state as seen by the analyzer and the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Stopped,
    Playing,
    Paused,
}
