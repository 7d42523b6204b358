use eframe::egui::{self, Color32, Sense, Stroke, Vec2};

use crate::analyzer::{WidthState, WindowAnalysis, VISUAL_SIZE};

const FIELD_BG: Color32 = Color32::from_rgb(15, 15, 15);
const FIELD_BORDER: Color32 = Color32::from_rgb(80, 80, 80);

/// Draw one stereo-field meter into a fixed `VISUAL_SIZE` square, advancing
/// the layout cursor by exactly that square.
///
/// Draw order: background fill, border, the held widest-frame overlay in a
/// muted translucent purple, then — only while the clip is actually playing —
/// this tick's live points in bright teal on top. Both point sets may be
/// empty (freshly loaded, never-played clip); that renders as just the box.
pub fn draw_field(ui: &mut egui::Ui, held: &WidthState, live: Option<&WindowAnalysis>) {
    let (response, painter) = ui.allocate_painter(Vec2::splat(VISUAL_SIZE), Sense::hover());
    let rect = response.rect;
    let center = rect.center();
    // Loud windows can normalize past the box edges; clip like any meter.
    let painter = painter.with_clip_rect(rect);

    painter.rect_filled(rect, 0.0, FIELD_BG);
    painter.rect_stroke(rect, 0.0, Stroke::new(1.0, FIELD_BORDER));

    for pt in &held.held_points {
        painter.circle_filled(
            center + egui::vec2(pt.x, pt.y),
            1.0,
            Color32::from_rgba_unmultiplied(180, 100, 255, 60),
        );
    }

    if let Some(analysis) = live {
        for pt in &analysis.points {
            painter.circle_filled(
                center + egui::vec2(pt.x, pt.y),
                1.2,
                Color32::from_rgba_unmultiplied(0, 255, 230, 180),
            );
        }
    }
}
