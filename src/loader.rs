use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::decode::decode_clip;
use crate::types::{ClipPcm, Side};

/// Extensions tried, in order, when resolving `sound{n}_{side}`.
const CLIP_EXTENSIONS: &[&str] = &["flac", "wav"];

/// One decoded (or failed) clip pair, delivered to the UI thread.
pub enum LoadEvent {
    Pair {
        slot: usize,
        clip_a: Arc<ClipPcm>,
        clip_b: Arc<ClipPcm>,
    },
    Failed {
        slot: usize,
        error: String,
    },
}

/// A pair to load: which session slot it fills and the 1-based clip-pair
/// file number it decodes from.
pub struct PairRequest {
    pub slot: usize,
    pub clip: usize,
}

/// Decodes quiz clip pairs on a worker thread and streams them to the UI.
///
/// Decoding a FLAC pair takes long enough to stutter an immediate-mode UI,
/// so the loading screen just drains this loader's channel and draws a
/// progress bar. Failures are reported per-pair rather than aborting the
/// run — a session with a missing file still loads the rest.
pub struct ClipLoader {
    clip_dir: PathBuf,
    requests: Vec<PairRequest>,
    tx: Sender<LoadEvent>,
}

/// Resolve `sound{number}_{side}` in `dir`, trying each known extension.
pub fn find_clip_file(dir: &Path, number: usize, side: Side) -> Option<PathBuf> {
    for ext in CLIP_EXTENSIONS {
        let path = dir.join(format!("sound{number}_{side}.{ext}"));
        if path.is_file() {
            return Some(path);
        }
    }
    None
}

impl ClipLoader {
    pub fn new(clip_dir: PathBuf, requests: Vec<PairRequest>, tx: Sender<LoadEvent>) -> Self {
        Self {
            clip_dir,
            requests,
            tx,
        }
    }

    /// Decode all requested pairs in order. Blocks the calling thread.
    pub fn run(&self) {
        info!(
            "Loading {} clip pairs from {:?}",
            self.requests.len(),
            self.clip_dir
        );

        for req in &self.requests {
            let event = match self.load_pair(req) {
                Ok((clip_a, clip_b)) => LoadEvent::Pair {
                    slot: req.slot,
                    clip_a,
                    clip_b,
                },
                Err(e) => {
                    error!("Failed to load clip pair {}: {e:#}", req.clip);
                    LoadEvent::Failed {
                        slot: req.slot,
                        error: format!("{e:#}"),
                    }
                }
            };
            if self.tx.send(event).is_err() {
                // UI shut down — stop decoding
                return;
            }
        }

        info!("Clip loading complete.");
    }

    fn load_pair(&self, req: &PairRequest) -> Result<(Arc<ClipPcm>, Arc<ClipPcm>)> {
        let path_a = find_clip_file(&self.clip_dir, req.clip, Side::A)
            .with_context(|| format!("No sound{}_A clip in {:?}", req.clip, self.clip_dir))?;
        let path_b = find_clip_file(&self.clip_dir, req.clip, Side::B)
            .with_context(|| format!("No sound{}_B clip in {:?}", req.clip, self.clip_dir))?;

        let clip_a = decode_clip(&path_a)?;
        let clip_b = decode_clip(&path_b)?;

        for (clip, path) in [(&clip_a, &path_a), (&clip_b, &path_b)] {
            if clip.channels < 2 {
                warn!(
                    "{} has {} channel(s); the stereo-field meter will stay empty for it",
                    path.display(),
                    clip.channels
                );
            }
        }

        Ok((Arc::new(clip_a), Arc::new(clip_b)))
    }
}
