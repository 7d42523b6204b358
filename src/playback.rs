use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use log::{error, info};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::types::{ClipPcm, PlaybackStatus};

/// State shared with the audio callback. The render thread only ever reads
/// these; the callback owns the real (fractional) position locally and
/// publishes a whole-frame snapshot after each buffer.
struct Shared {
    /// Current playback position in clip frames.
    frame_pos: AtomicU64,
    /// Cleared by the callback at end-of-buffer, or by `stop()`.
    playing: AtomicBool,
}

/// Single-slot playback transport: plays one clip at a time through the
/// default output device.
///
/// Holds the cpal `Stream` alive; dropping the transport stops playback.
/// `play()` stops whatever was playing first; the quiz only ever auditions
/// one side of a pair at a time, always from the top of the clip.
///
/// The clip's own sample rate rarely matches the device's, so the callback
/// advances through the buffer with a fractional step (nearest-frame
/// resampling). Good enough for audition playback; this is not a mastering
/// path.
pub struct Transport {
    stream: Option<Stream>,
    shared: Arc<Shared>,
    active: Option<Arc<ClipPcm>>,
}

impl Transport {
    pub fn new() -> Self {
        Self {
            stream: None,
            shared: Arc::new(Shared {
                frame_pos: AtomicU64::new(0),
                playing: AtomicBool::new(false),
            }),
            active: None,
        }
    }

    /// Start (or restart) playback of `clip` from the beginning.
    pub fn play(&mut self, clip: &Arc<ClipPcm>) -> Result<()> {
        self.stop();

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .context("No default audio output device found")?;
        let supported = device
            .default_output_config()
            .context("No supported output config")?;
        let config: StreamConfig = supported.config();

        info!(
            "Playback: {}  via {} ({} Hz, {} ch, {:?})",
            clip,
            device.name().unwrap_or_else(|_| "unknown".into()),
            config.sample_rate.0,
            config.channels,
            supported.sample_format(),
        );

        let shared = Arc::new(Shared {
            frame_pos: AtomicU64::new(0),
            playing: AtomicBool::new(true),
        });

        let stream = match supported.sample_format() {
            SampleFormat::F32 => {
                build_stream::<f32>(&device, &config, clip.clone(), shared.clone())
            }
            SampleFormat::I16 => {
                build_stream::<i16>(&device, &config, clip.clone(), shared.clone())
            }
            SampleFormat::U16 => {
                build_stream::<u16>(&device, &config, clip.clone(), shared.clone())
            }
            fmt => anyhow::bail!("Unsupported output sample format {fmt:?}"),
        }
        .context("Failed to build output stream")?;

        stream.play().context("Failed to start playback")?;

        self.stream = Some(stream);
        self.shared = shared;
        self.active = Some(clip.clone());
        Ok(())
    }

    /// Stop playback and rewind to the start.
    pub fn stop(&mut self) {
        self.shared.playing.store(false, Ordering::Relaxed);
        self.stream = None;
        self.active = None;
    }

    /// Transport status for whatever clip is loaded in the slot.
    pub fn status(&self) -> PlaybackStatus {
        if self.stream.is_some() && self.shared.playing.load(Ordering::Relaxed) {
            PlaybackStatus::Playing
        } else {
            PlaybackStatus::Stopped
        }
    }

    /// Status as seen by one particular clip: anything other than the active
    /// clip is simply stopped.
    pub fn status_of(&self, clip: &Arc<ClipPcm>) -> PlaybackStatus {
        if self.active.as_ref().map_or(false, |c| Arc::ptr_eq(c, clip)) {
            self.status()
        } else {
            PlaybackStatus::Stopped
        }
    }

    /// Current playback offset of the active clip, in seconds.
    pub fn offset_secs(&self) -> f64 {
        match &self.active {
            Some(clip) if clip.sample_rate > 0 => {
                self.shared.frame_pos.load(Ordering::Relaxed) as f64 / clip.sample_rate as f64
            }
            _ => 0.0,
        }
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    clip: Arc<ClipPcm>,
    shared: Arc<Shared>,
) -> Result<Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<f32>,
{
    let device_channels = config.channels as usize;
    let step = clip.sample_rate as f64 / config.sample_rate.0 as f64;
    let total = clip.frames() as f64;
    let mut pos = 0.0f64;

    let err_fn = |e: cpal::StreamError| error!("Audio output stream error: {e}");

    device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            for frame in data.chunks_mut(device_channels) {
                if !shared.playing.load(Ordering::Relaxed) || pos >= total {
                    shared.playing.store(false, Ordering::Relaxed);
                    for s in frame.iter_mut() {
                        *s = T::from_sample(0.0f32);
                    }
                    continue;
                }
                let base = pos as usize * clip.channels;
                let l = clip.samples[base] as f32 / 32768.0;
                let r = if clip.channels >= 2 {
                    clip.samples[base + 1] as f32 / 32768.0
                } else {
                    l
                };
                // Stereo clip onto N device channels: alternate L/R.
                for (ci, s) in frame.iter_mut().enumerate() {
                    *s = T::from_sample(if ci % 2 == 0 { l } else { r });
                }
                pos += step;
            }
            shared.frame_pos.store(pos as u64, Ordering::Relaxed);
        },
        err_fn,
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip() -> Arc<ClipPcm> {
        Arc::new(ClipPcm {
            samples: vec![0; 96],
            channels: 2,
            sample_rate: 48000,
        })
    }

    #[test]
    fn test_fresh_transport_is_stopped() {
        let t = Transport::new();
        assert_eq!(t.status(), PlaybackStatus::Stopped);
        assert_eq!(t.status_of(&clip()), PlaybackStatus::Stopped);
        assert_eq!(t.offset_secs(), 0.0);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut t = Transport::new();
        t.stop();
        t.stop();
        assert_eq!(t.status(), PlaybackStatus::Stopped);
    }
}
