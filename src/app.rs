use crossbeam_channel::{unbounded, Receiver};
use eframe::egui::{self, Color32};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::analyzer::analyze_window;
use crate::field;
use crate::loader::{ClipLoader, LoadEvent, PairRequest};
use crate::playback::Transport;
use crate::quiz::{Question, Screen, Session};
use crate::results::{ResultsFile, SessionOutcome};
use crate::types::{ClipPcm, PlaybackStatus, QuestionSpec, Side};

/// Debug mode unlock phrase. Reveals correct answers — for authoring quiz
/// material, not for taking the test.
const DEBUG_PASSWORD: &str = "debug";

/// The trainer's eframe application: Loading → Quiz → Results, with the
/// stereo-field meters running off the live playback transport on the
/// results review screen.
pub struct TrainerApp {
    session: Session,
    transport: Transport,
    results: ResultsFile,
    clip_dir: PathBuf,

    loader_rx: Receiver<LoadEvent>,
    load_errors: Vec<String>,
    failed_slots: usize,

    debug_mode: bool,
    show_debug_entry: bool,
    debug_password: String,

    /// Attempt number of the last CSV export this session, if any.
    exported: Option<u32>,
    /// Cached per-question fail counts for the results screen. Recomputed
    /// after export and after restart rather than re-reading the CSV every
    /// repaint.
    fail_stats: Option<Vec<u32>>,
}

impl TrainerApp {
    pub fn new(clip_dir: PathBuf, specs: Vec<QuestionSpec>, results: ResultsFile) -> Self {
        let mut rng = rand::thread_rng();
        let session = Session::new(specs, &mut rng);
        let mut app = Self {
            session,
            transport: Transport::new(),
            results,
            clip_dir,
            loader_rx: unbounded().1,
            load_errors: Vec::new(),
            failed_slots: 0,
            debug_mode: false,
            show_debug_entry: false,
            debug_password: String::new(),
            exported: None,
            fail_stats: None,
        };
        app.spawn_loader();
        app
    }

    /// Kick off a background decode of every question's clip pair.
    fn spawn_loader(&mut self) {
        let (tx, rx) = unbounded::<LoadEvent>();
        self.loader_rx = rx;
        self.load_errors.clear();
        self.failed_slots = 0;

        let requests: Vec<PairRequest> = self
            .session
            .questions
            .iter()
            .enumerate()
            .map(|(slot, q)| PairRequest {
                slot,
                clip: q.spec.clip,
            })
            .collect();
        let clip_dir = self.clip_dir.clone();

        thread::Builder::new()
            .name("clip-loader".into())
            .spawn(move || {
                ClipLoader::new(clip_dir, requests, tx).run();
            })
            .expect("spawn clip-loader thread");
    }

    fn drain_loader(&mut self) {
        let mut rng = rand::thread_rng();
        for event in self.loader_rx.try_iter().collect::<Vec<_>>() {
            match event {
                LoadEvent::Pair {
                    slot,
                    clip_a,
                    clip_b,
                } => self.session.attach_pair(slot, clip_a, clip_b, &mut rng),
                LoadEvent::Failed { slot, error } => {
                    self.failed_slots += 1;
                    self.load_errors.push(format!("Question {}: {error}", slot + 1));
                }
            }
        }
    }

    fn loading_done(&self) -> bool {
        self.session.loaded_count() + self.failed_slots >= self.session.total()
    }

    fn play(transport: &mut Transport, clip: &Option<Arc<ClipPcm>>) {
        if let Some(clip) = clip {
            if let Err(e) = transport.play(clip) {
                error!("Playback failed: {e:#}");
            }
        } else {
            warn!("Clip not loaded; nothing to play");
        }
    }

    // ─── Screens ────────────────────────────────────────────────────────

    fn show_loading(&mut self, ui: &mut egui::Ui) {
        ui.heading("Loading clips...");
        let frac = if self.session.total() == 0 {
            1.0
        } else {
            (self.session.loaded_count() + self.failed_slots) as f32 / self.session.total() as f32
        };
        ui.add(egui::ProgressBar::new(frac).show_percentage());
        for err in &self.load_errors {
            ui.colored_label(Color32::RED, err);
        }
        if self.loading_done() {
            if !self.load_errors.is_empty() {
                warn!(
                    "{} clip pair(s) failed to load; their questions will have no audio",
                    self.failed_slots
                );
            }
            self.session.screen = Screen::Quiz;
            info!("All clips ready; quiz starting");
        }
    }

    fn show_quiz(&mut self, ui: &mut egui::Ui) {
        let current = self.session.current;
        if current >= self.session.total() {
            return;
        }
        ui.label(format!(
            "Question {} of {}",
            current + 1,
            self.session.total()
        ));

        self.debug_section(ui);

        ui.separator();
        ui.horizontal(|ui| {
            let (clip_a, clip_b) = {
                let q = &self.session.questions[current];
                (q.clip_a.clone(), q.clip_b.clone())
            };
            if ui
                .add_sized([200.0, 60.0], egui::Button::new("Play A"))
                .clicked()
            {
                Self::play(&mut self.transport, &clip_a);
            }
            if ui
                .add_sized([200.0, 60.0], egui::Button::new("Play B"))
                .clicked()
            {
                Self::play(&mut self.transport, &clip_b);
            }
        });

        ui.separator();
        ui.horizontal(|ui| {
            if ui
                .add_sized([300.0, 80.0], egui::Button::new("Answer A"))
                .clicked()
            {
                self.session.choose(Side::A);
            }
            if ui
                .add_sized([300.0, 80.0], egui::Button::new("Answer B"))
                .clicked()
            {
                self.session.choose(Side::B);
            }
        });
    }

    fn debug_section(&mut self, ui: &mut egui::Ui) {
        if self.debug_mode {
            let answer = self.session.questions[self.session.current].answer;
            ui.colored_label(
                Color32::from_rgb(0, 255, 255),
                format!("DEBUG MODE ON | Correct Answer: {answer}"),
            );
            return;
        }
        ui.horizontal(|ui| {
            ui.checkbox(&mut self.show_debug_entry, "Enable Debug");
            if self.show_debug_entry {
                ui.add(
                    egui::TextEdit::singleline(&mut self.debug_password)
                        .password(true)
                        .hint_text("Password"),
                );
                if self.debug_password == DEBUG_PASSWORD {
                    self.debug_mode = true;
                    self.debug_password.clear();
                    info!("Debug mode enabled");
                }
            }
        });
    }

    fn show_results(&mut self, ui: &mut egui::Ui) {
        let score = self.session.score();
        let total = self.session.total();
        let outcome = SessionOutcome {
            score,
            total,
            missed: self.session.missed(),
        };
        ui.label(format!(
            "Final Accuracy: {:.1}% ({score}/{total})",
            outcome.accuracy()
        ));

        ui.horizontal(|ui| {
            if ui.button("Export CSV").clicked() {
                match self.results.append(&outcome) {
                    Ok(attempt) => {
                        self.exported = Some(attempt);
                        self.fail_stats = None;
                    }
                    Err(e) => error!("CSV export failed: {e:#}"),
                }
            }
            if let Some(attempt) = self.exported {
                ui.label(format!("Saved as attempt {attempt}"));
            }
            if ui.button("Open Folder").clicked() {
                open_folder(self.results.path());
            }
        });

        ui.separator();
        ui.label("Review (Purple = Widest Recorded Peak):");
        egui::ScrollArea::vertical()
            .id_source("review")
            .max_height(300.0)
            .show(ui, |ui| {
                for i in 0..total {
                    self.review_row(ui, i);
                    ui.separator();
                }
            });

        ui.separator();
        ui.label("Global Fail Frequency:");
        let stats = self
            .fail_stats
            .get_or_insert_with(|| self.results.error_stats(total))
            .clone();
        let max_fails = stats.iter().copied().max().unwrap_or(0);
        egui::ScrollArea::vertical()
            .id_source("fail-stats")
            .max_height(150.0)
            .show(ui, |ui| {
                for (i, &count) in stats.iter().enumerate() {
                    ui.horizontal(|ui| {
                        ui.label(format!("Q{}", i + 1));
                        let r = if max_fails > 0 {
                            count as f32 / max_fails as f32
                        } else {
                            0.0
                        };
                        ui.add(
                            egui::ProgressBar::new(r)
                                .fill(Color32::from_rgb(204, 51, 51))
                                .text(format!("{count} errors")),
                        );
                    });
                }
            });

        if ui
            .add_sized([180.0, 50.0], egui::Button::new("Restart"))
            .clicked()
        {
            self.restart();
        }
    }

    fn review_row(&mut self, ui: &mut egui::Ui, i: usize) {
        let choice = self.session.choices[i];
        let transport = &mut self.transport;
        let q = &mut self.session.questions[i];
        let correct = choice == Some(q.answer);

        ui.horizontal(|ui| {
            ui.colored_label(
                if correct { Color32::GREEN } else { Color32::RED },
                format!("Q{}", i + 1),
            );
            if ui.button("Play A").clicked() {
                let clip = q.clip_a.clone();
                Self::play(transport, &clip);
            }
            render_field(transport, q, Side::A, ui);
            if ui.button("Play B").clicked() {
                let clip = q.clip_b.clone();
                Self::play(transport, &clip);
            }
            render_field(transport, q, Side::B, ui);
            let choice_str = choice.map_or("-".to_string(), |c| c.to_string());
            ui.label(format!("| Choice: {choice_str} | Correct: {}", q.answer));
        });
    }

    fn restart(&mut self) {
        self.transport.stop();
        let mut rng = rand::thread_rng();
        self.session.restart(&mut rng);
        self.exported = None;
        self.fail_stats = None;
        self.spawn_loader();
    }
}

impl eframe::App for TrainerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_loader();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Wider Sound Quiz");
            ui.separator();
            match self.session.screen {
                Screen::Loading => self.show_loading(ui),
                Screen::Quiz => self.show_quiz(ui),
                Screen::Results => self.show_results(ui),
            }
        });

        // Keep the analyzer ticking at display rate while audio plays.
        ctx.request_repaint_after(Duration::from_millis(16));
    }
}

/// One analyzer tick + draw for a single clip's meter: the entry point the
/// quiz screens call per visible clip, per repaint.
///
/// Runs the live window analysis only while this clip is actually playing;
/// otherwise only the held overlay is drawn. The hold update happens here
/// too, so whatever maximized the visible spread is exactly what gets kept.
fn render_field(transport: &Transport, q: &mut Question, side: Side, ui: &mut egui::Ui) {
    let (clip, state) = match side {
        Side::A => (&q.clip_a, &mut q.width_a),
        Side::B => (&q.clip_b, &mut q.width_b),
    };
    let live = match clip {
        Some(clip) if transport.status_of(clip) == PlaybackStatus::Playing => {
            let analysis = analyze_window(clip, transport.offset_secs(), state);
            state.observe(&analysis);
            Some(analysis)
        }
        _ => None,
    };
    field::draw_field(ui, state, live.as_ref());
}

/// Reveal the directory holding the results CSV in the platform file
/// manager. Best-effort: failures only log.
fn open_folder(path: &Path) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    #[cfg(target_os = "macos")]
    let cmd = "open";
    #[cfg(target_os = "linux")]
    let cmd = "xdg-open";
    #[cfg(target_os = "windows")]
    let cmd = "explorer";
    if let Err(e) = std::process::Command::new(cmd).arg(dir).spawn() {
        error!("Failed to open {dir:?}: {e}");
    }
}
