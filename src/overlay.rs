use eframe::egui;

// ── Styling ─────────────────────────────────────────────────────────────────

const DOT_RADIUS: f32 = 3.0;
const CROSS_HALF: f32 = 5.0;
const LABEL_SIZE: f32 = 11.0;
const PENDING_LABEL: &str = "?";

/// Label offsets in image pixels, relative to the marked point.
const COMMITTED_LABEL_OFFSET: (f32, f32) = (5.0, 5.0);
const PENDING_LABEL_OFFSET: (f32, f32) = (5.0, -5.0);

fn committed_color() -> egui::Color32 {
    egui::Color32::from_rgb(31, 119, 180)
}

fn pending_color() -> egui::Color32 {
    egui::Color32::from_rgb(255, 127, 14)
}

// ── Marks ───────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Glyph {
    /// Provisional marker for the pending click.
    Cross,
    /// Permanent marker for a committed point.
    Dot,
}

/// Marker glyph plus text label drawn over the image for one location.
#[derive(Clone, Debug, PartialEq)]
pub struct Mark {
    pub x: f64,
    pub y: f64,
    pub glyph: Glyph,
    pub label: String,
    label_offset: (f32, f32),
}

impl Mark {
    pub fn pending(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            glyph: Glyph::Cross,
            label: PENDING_LABEL.to_string(),
            label_offset: PENDING_LABEL_OFFSET,
        }
    }

    pub fn committed(id: &str, x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            glyph: Glyph::Dot,
            label: id.to_string(),
            label_offset: COMMITTED_LABEL_OFFSET,
        }
    }

    pub fn image_pos(&self) -> egui::Pos2 {
        egui::pos2(self.x as f32, self.y as f32)
    }

    /// Paint at `at` (screen space). Glyphs keep a fixed screen size, the
    /// label offset follows the zoom.
    pub fn paint(&self, painter: &egui::Painter, at: egui::Pos2, zoom: f32) {
        let color = match self.glyph {
            Glyph::Cross => {
                let c = pending_color();
                let stroke = egui::Stroke::new(1.5, c);
                let d = CROSS_HALF;
                painter.line_segment([at + egui::vec2(-d, -d), at + egui::vec2(d, d)], stroke);
                painter.line_segment([at + egui::vec2(-d, d), at + egui::vec2(d, -d)], stroke);
                c
            }
            Glyph::Dot => {
                let c = committed_color();
                painter.circle_filled(at, DOT_RADIUS, c);
                c
            }
        };

        let label_at = at + egui::vec2(self.label_offset.0, self.label_offset.1) * zoom;
        let font = egui::FontId::proportional(LABEL_SIZE);
        // shadow
        painter.text(
            label_at + egui::vec2(1.0, 1.0),
            egui::Align2::LEFT_CENTER,
            &self.label,
            font.clone(),
            egui::Color32::from_black_alpha(160),
        );
        painter.text(label_at, egui::Align2::LEFT_CENTER, &self.label, font, color);
    }
}
