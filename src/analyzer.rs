use crate::types::ClipPcm;
use log::trace;

/// Raw samples examined per analysis window (400 stereo pairs).
pub const WINDOW_LEN: usize = 800;

/// Keep every Nth stereo pair for display. The width score sums over the
/// same retained set, so the held overlay is always exactly the frame that
/// maximized the visible spread — keep display and scoring on one constant.
pub const DECIMATE: usize = 2;

/// One-pole low-pass coefficient for the side signal.
pub const SMOOTH_ALPHA: f32 = 0.25;

/// Lower bound on the per-window peak, so near-silent windows normalize to
/// the viewport center instead of dividing by ~zero.
pub const PEAK_FLOOR: f32 = 0.001;

/// Edge length of the square field viewport, in display units.
pub const VISUAL_SIZE: f32 = 60.0;

/// A single visualization sample: viewport-relative offset from center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldPoint {
    pub x: f32,
    pub y: f32,
}

/// Per-clip analyzer state: the widest frame ever observed for this clip,
/// plus the side smoother's causal filter memory.
///
/// Each clip of a question pair gets its own instance — the smoother carries
/// over between analysis ticks for the *same* clip only, so two clips
/// rendered in the same frame can never contaminate each other's filtering.
#[derive(Debug, Clone, Default)]
pub struct WidthState {
    /// Point set of the highest-scoring window seen so far. Replaced
    /// wholesale when a new maximum lands; never a blend of two windows.
    pub held_points: Vec<FieldPoint>,
    /// Running maximum width score. Monotonically non-decreasing until reset.
    pub held_score: f32,
    /// One-pole low-pass memory for the side signal.
    pub last_side: f32,
}

impl WidthState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Peak-hold update: adopt this window's point set iff it out-scores the
    /// held one. Returns true when the hold was replaced.
    pub fn observe(&mut self, analysis: &WindowAnalysis) -> bool {
        if analysis.width_score > self.held_score {
            trace!(
                "peak hold: {:.4} -> {:.4} ({} points)",
                self.held_score,
                analysis.width_score,
                analysis.points.len(),
            );
            self.held_score = analysis.width_score;
            self.held_points = analysis.points.clone();
            true
        } else {
            false
        }
    }

    /// Clear everything back to the freshly-loaded state (session restart).
    pub fn reset(&mut self) {
        self.held_points.clear();
        self.held_score = 0.0;
        self.last_side = 0.0;
    }
}

/// Result of analyzing one window: the decimated point set, its width score,
/// and the window peak used for normalization.
#[derive(Debug, Clone, Default)]
pub struct WindowAnalysis {
    pub points: Vec<FieldPoint>,
    pub width_score: f32,
    pub peak: f32,
}

/// Analyze one window of `clip` starting at the current playback offset.
///
/// # How it works
///
/// Walks up to [`WINDOW_LEN`] raw samples (400 stereo pairs) from the frame
/// the offset lands on, one pair at a time:
///   - normalize the i16 pair to floats, decompose into mid = L + R and
///     side = L - R,
///   - run the side through the clip's persistent one-pole low-pass
///     (`state.last_side`, updated on *every* pair — the filter is causal
///     and order-dependent),
///   - track the running peak `max(|L|, |R|)` floored at [`PEAK_FLOOR`],
///   - every [`DECIMATE`]th pair, emit a display point
///     `(side * norm, -mid * norm)` with `norm = (VISUAL_SIZE / 2.3) / peak`
///     and add `|side|` to the width score.
///
/// Degrades rather than fails: fewer than 2 channels yields an empty result,
/// and a window that runs past the end of the buffer is truncated (indices
/// beyond the buffer are skipped, never wrapped or zero-filled).
///
/// Precondition: the buffer is 16-bit signed PCM. Other encodings are a
/// caller contract violation and produce meaningless geometry, not errors.
pub fn analyze_window(clip: &ClipPcm, offset_secs: f64, state: &mut WidthState) -> WindowAnalysis {
    let mut out = WindowAnalysis {
        points: Vec::new(),
        width_score: 0.0,
        peak: PEAK_FLOOR,
    };
    if clip.channels < 2 {
        return out;
    }

    // Start sample index, snapped down to an interleaved frame boundary.
    let mut start = (offset_secs * clip.sample_rate as f64 * clip.channels as f64) as usize;
    start -= start % clip.channels;

    let mut peak = PEAK_FLOOR;
    let mut pair = 0usize;
    let mut i = 0usize;
    while i < WINDOW_LEN {
        let idx = start + i;
        if idx + 1 >= clip.samples.len() {
            // Window exhausted — a short (possibly empty) result is valid.
            break;
        }
        let l = clip.samples[idx] as f32 / 32768.0;
        let r = clip.samples[idx + 1] as f32 / 32768.0;
        let mid = l + r;
        let side_raw = l - r;
        state.last_side += SMOOTH_ALPHA * (side_raw - state.last_side);

        if l.abs() > peak {
            peak = l.abs();
        }
        if r.abs() > peak {
            peak = r.abs();
        }

        if pair % DECIMATE == 0 {
            let norm = (VISUAL_SIZE / 2.3) / peak;
            out.points.push(FieldPoint {
                x: state.last_side * norm,
                y: -mid * norm,
            });
            out.width_score += state.last_side.abs();
        }

        pair += 1;
        i += 2;
    }

    out.peak = peak;
    out
}

#[cfg(test)]
pub mod test_helpers {
    use crate::types::ClipPcm;

    /// Build a stereo clip from per-pair (L, R) i16 values.
    pub fn stereo_clip(pairs: &[(i16, i16)], sample_rate: u32) -> ClipPcm {
        let mut samples = Vec::with_capacity(pairs.len() * 2);
        for &(l, r) in pairs {
            samples.push(l);
            samples.push(r);
        }
        ClipPcm {
            samples,
            channels: 2,
            sample_rate,
        }
    }

    /// A clip with constant (L, R) for `n` pairs.
    pub fn constant_clip(l: i16, r: i16, n: usize, sample_rate: u32) -> ClipPcm {
        stereo_clip(&vec![(l, r); n], sample_rate)
    }

    /// Out-of-phase full-ish-scale stereo: maximally wide material.
    pub fn wide_clip(n: usize, sample_rate: u32) -> ClipPcm {
        constant_clip(16384, -16384, n, sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::test_helpers::*;
    use super::*;
    use crate::types::ClipPcm;

    #[test]
    fn test_full_window_point_count() {
        let clip = wide_clip(1000, 48000);
        let mut state = WidthState::new();
        let analysis = analyze_window(&clip, 0.0, &mut state);
        // 400 pairs examined, every 2nd retained.
        assert_eq!(analysis.points.len(), 200);
        assert!(analysis.width_score > 0.0);
    }

    #[test]
    fn test_truncated_window_matches_available_pairs() {
        // Only 100 pairs in the buffer: 100 examined, 50 retained.
        let clip = wide_clip(100, 48000);
        let mut state = WidthState::new();
        let analysis = analyze_window(&clip, 0.0, &mut state);
        assert_eq!(analysis.points.len(), 50);
    }

    #[test]
    fn test_offset_past_end_is_empty() {
        let clip = wide_clip(100, 48000);
        let mut state = WidthState::new();
        let analysis = analyze_window(&clip, 10.0, &mut state);
        assert!(analysis.points.is_empty());
        assert_eq!(analysis.width_score, 0.0);
        assert_eq!(analysis.peak, PEAK_FLOOR);
    }

    #[test]
    fn test_mono_clip_yields_empty_window() {
        let clip = ClipPcm {
            samples: vec![1000; 4800],
            channels: 1,
            sample_rate: 48000,
        };
        let mut state = WidthState::new();
        let analysis = analyze_window(&clip, 0.0, &mut state);
        assert!(analysis.points.is_empty());
        assert!(!state.observe(&analysis), "empty window must not take hold");
        assert_eq!(state.held_score, 0.0);
    }

    #[test]
    fn test_zero_channel_clip_yields_empty_window() {
        let clip = ClipPcm {
            samples: Vec::new(),
            channels: 0,
            sample_rate: 48000,
        };
        let mut state = WidthState::new();
        assert!(analyze_window(&clip, 0.0, &mut state).points.is_empty());
    }

    #[test]
    fn test_silence_collapses_to_center() {
        let clip = constant_clip(0, 0, 1000, 48000);
        let mut state = WidthState::new();
        let analysis = analyze_window(&clip, 0.0, &mut state);
        assert_eq!(analysis.peak, PEAK_FLOOR, "peak floored on silence");
        assert_eq!(analysis.width_score, 0.0);
        assert_eq!(analysis.points.len(), 200);
        for pt in &analysis.points {
            assert_eq!(pt.x, 0.0);
            assert_eq!(pt.y, 0.0);
        }
    }

    #[test]
    fn test_smoother_step_response() {
        // L - R steps from 0 to 1.0 and stays: last_side_n = 1 - 0.75^n.
        let clip = wide_clip(8, 48000);
        let mut state = WidthState::new();
        analyze_window(&clip, 0.0, &mut state);
        let expected = 1.0 - 0.75f32.powi(8);
        assert!(
            (state.last_side - expected).abs() < 1e-4,
            "after 8 pairs expected {expected}, got {}",
            state.last_side
        );
    }

    #[test]
    fn test_smoother_persists_across_ticks() {
        let clip = wide_clip(32, 48000);
        let mut state = WidthState::new();
        analyze_window(&clip, 0.0, &mut state);
        let after_first = state.last_side;
        analyze_window(&clip, 0.0, &mut state);
        assert!(
            state.last_side > after_first,
            "second tick must continue converging from the first tick's memory"
        );
    }

    #[test]
    fn test_per_clip_smoother_isolation() {
        let wide = wide_clip(400, 48000);
        let silent = constant_clip(0, 0, 400, 48000);
        let mut state_a = WidthState::new();
        let mut state_b = WidthState::new();
        analyze_window(&wide, 0.0, &mut state_a);
        analyze_window(&silent, 0.0, &mut state_b);
        assert!(state_a.last_side > 0.9);
        assert_eq!(state_b.last_side, 0.0, "silent clip's smoother untouched");
    }

    #[test]
    fn test_deterministic_given_identical_state() {
        let clip = wide_clip(1000, 48000);
        let mut s1 = WidthState::new();
        let mut s2 = WidthState::new();
        let a1 = analyze_window(&clip, 0.004, &mut s1);
        let a2 = analyze_window(&clip, 0.004, &mut s2);
        assert_eq!(a1.points, a2.points);
        assert_eq!(a1.width_score, a2.width_score);
        assert_eq!(s1.last_side, s2.last_side);
    }

    #[test]
    fn test_start_index_snaps_to_frame_boundary() {
        // An offset landing mid-frame must snap down so L/R never swap:
        // raw index 21 and raw index 20 are the same window.
        let mut pairs = vec![(0i16, 0i16); 10];
        pairs.extend(vec![(16384, -16384); 400]);
        let clip = stereo_clip(&pairs, 48000);
        let mut s_odd = WidthState::new();
        let mut s_even = WidthState::new();
        let odd = analyze_window(&clip, 10.5 / 48000.0, &mut s_odd);
        let even = analyze_window(&clip, 10.0 / 48000.0, &mut s_even);
        assert_eq!(odd.points, even.points);
        assert_eq!(odd.width_score, even.width_score);
    }

    #[test]
    fn test_hold_is_monotone_and_exact() {
        let loud = wide_clip(1000, 48000);
        let quiet = constant_clip(800, -800, 1000, 48000);
        let mut state = WidthState::new();

        let a_loud = analyze_window(&loud, 0.0, &mut state);
        assert!(state.observe(&a_loud));
        let held = state.held_score;
        let held_points = state.held_points.clone();

        // A narrower window must not disturb the hold.
        let a_quiet = analyze_window(&quiet, 0.0, &mut state);
        assert!(a_quiet.width_score < held);
        assert!(!state.observe(&a_quiet));
        assert_eq!(state.held_score, held);
        assert_eq!(state.held_points, held_points, "point set replaced only with a new max");
    }

    #[test]
    fn test_reset_clears_everything() {
        let clip = wide_clip(1000, 48000);
        let mut state = WidthState::new();
        let analysis = analyze_window(&clip, 0.0, &mut state);
        state.observe(&analysis);
        assert!(state.held_score > 0.0);

        state.reset();
        assert_eq!(state.held_score, 0.0);
        assert!(state.held_points.is_empty());
        assert_eq!(state.last_side, 0.0);
    }

    #[test]
    fn test_points_bounded_by_viewport_scale() {
        // Peak normalization keeps |x| and |y| within VISUAL_SIZE/2.3 * 2
        // (mid can reach twice the per-channel peak).
        let clip = wide_clip(1000, 48000);
        let mut state = WidthState::new();
        let analysis = analyze_window(&clip, 0.0, &mut state);
        let limit = VISUAL_SIZE / 2.3 * 2.0 + 1e-3;
        for pt in &analysis.points {
            assert!(pt.x.abs() <= limit && pt.y.abs() <= limit);
        }
    }
}
