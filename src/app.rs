use anyhow::{Context, Result};
use eframe::egui;
use egui_extras::{Column, TableBuilder};
use image::DynamicImage;
use log::{debug, info, warn};
use std::path::PathBuf;

use crate::config::SessionSpec;
use crate::session::Session;

const INSTRUCTIONS: &str =
    "1) Click the desk center  2) Set the ID  3) Add  |  Export CSV to save";

const PIXEL_CENTER: f32 = 0.5;

const UNDO_SHORTCUT: egui::KeyboardShortcut =
    egui::KeyboardShortcut::new(egui::Modifiers::COMMAND, egui::Key::Z);
const EXPORT_SHORTCUT: egui::KeyboardShortcut =
    egui::KeyboardShortcut::new(egui::Modifiers::COMMAND, egui::Key::S);

// ── Shortcuts ───────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Shortcuts {
    undo: bool,
    export: bool,
}

/// Consume this frame's global shortcuts. Ctrl+Z is left to a focused text
/// field, so undoing typed ID text never drops a committed point.
fn read_shortcuts(ctx: &egui::Context) -> Shortcuts {
    let typing = ctx.wants_keyboard_input();
    ctx.input_mut(|i| Shortcuts {
        undo: !typing && i.consume_shortcut(&UNDO_SHORTCUT),
        export: i.consume_shortcut(&EXPORT_SHORTCUT),
    })
}

// ── Status line ─────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
struct Status {
    text: String,
    is_error: bool,
}

impl Status {
    fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

// ── App ─────────────────────────────────────────────────────────────────────

pub struct AnnotatorApp {
    image_path: PathBuf,
    texture: Option<egui::TextureHandle>,
    image_size: (f32, f32),
    raw_image: Option<DynamicImage>,

    session: Session,
    status: Option<Status>,

    // pan & zoom
    pan: egui::Vec2,
    zoom: f32,
    panning: bool,
    fitted: bool,
}

impl AnnotatorApp {
    pub fn open(spec: &SessionSpec) -> Result<Self> {
        let raw_image = image::open(&spec.image)
            .with_context(|| format!("Failed to load image {}", spec.image.display()))?;
        let image_size = (raw_image.width() as f32, raw_image.height() as f32);
        let session = Session::new(
            (image_size.0 as f64, image_size.1 as f64),
            spec.output_path(),
            spec.start_id,
        );
        info!(
            "Annotating {} ({}x{}), exporting to {}",
            spec.image.display(),
            raw_image.width(),
            raw_image.height(),
            session.output().display()
        );

        Ok(Self {
            image_path: spec.image.clone(),
            texture: None,
            image_size,
            raw_image: Some(raw_image),
            session,
            status: None,
            pan: egui::Vec2::ZERO,
            zoom: 1.0,
            panning: false,
            fitted: false,
        })
    }

    pub fn title(&self) -> String {
        format!(
            "Annotate: {}",
            self.image_path
                .file_name()
                .unwrap_or_default()
                .to_str()
                .unwrap_or("")
        )
    }

    // ── Actions ─────────────────────────────────────────────────────────────

    fn commit(&mut self) {
        match self.session.commit() {
            Ok(p) => {
                info!("Added {} at ({:.1}, {:.1})", p.id, p.x, p.y);
                self.status = Some(Status::info(format!("Added {}", p.id)));
            }
            Err(e) => {
                warn!("{e}");
                self.status = Some(Status::error(e.to_string()));
            }
        }
    }

    fn undo(&mut self) {
        if let Some(p) = self.session.undo() {
            info!("Removed {}", p.id);
            self.status = Some(Status::info(format!("Removed {}", p.id)));
        }
    }

    fn export(&mut self) {
        match self.session.export() {
            Ok(path) => {
                info!("Saved: {}", path.display());
                self.status = Some(Status::info(format!("Saved: {}", path.display())));
            }
            Err(e) => {
                warn!("{e}");
                self.status = Some(Status::error(e.to_string()));
            }
        }
    }

    // ── Geometry ────────────────────────────────────────────────────────────

    // Image coords put pixel centres on whole numbers: pixel (0, 0) spans
    // [-0.5, 0.5) and the whole image spans [-0.5, size - 0.5).

    /// Convert image-space coords to screen-space
    fn image_to_screen(&self, canvas_rect: egui::Rect, img_pos: egui::Pos2) -> egui::Pos2 {
        let center = canvas_rect.center();
        center
            + self.pan
            + (img_pos.to_vec2() + egui::Vec2::splat(PIXEL_CENTER)
                - egui::vec2(self.image_size.0, self.image_size.1) * 0.5)
                * self.zoom
    }

    /// Convert screen-space coords to image-space
    fn screen_to_image(&self, canvas_rect: egui::Rect, screen_pos: egui::Pos2) -> egui::Pos2 {
        let center = canvas_rect.center();
        let rel = screen_pos - center - self.pan;
        egui::pos2(
            rel.x / self.zoom + self.image_size.0 * 0.5 - PIXEL_CENTER,
            rel.y / self.zoom + self.image_size.1 * 0.5 - PIXEL_CENTER,
        )
    }

    fn image_rect_on_screen(&self, canvas_rect: egui::Rect) -> egui::Rect {
        let top_left = self.image_to_screen(canvas_rect, egui::pos2(-PIXEL_CENTER, -PIXEL_CENTER));
        let bot_right = self.image_to_screen(
            canvas_rect,
            egui::pos2(
                self.image_size.0 - PIXEL_CENTER,
                self.image_size.1 - PIXEL_CENTER,
            ),
        );
        egui::Rect::from_min_max(top_left, bot_right)
    }

    fn fit_to(&mut self, canvas_rect: egui::Rect) {
        if self.fitted || self.image_size.0 <= 0.0 || self.image_size.1 <= 0.0 {
            return;
        }
        let sx = canvas_rect.width() / self.image_size.0;
        let sy = canvas_rect.height() / self.image_size.1;
        self.zoom = sx.min(sy).clamp(0.1, 1.0);
        self.pan = egui::Vec2::ZERO;
        self.fitted = true;
    }

    fn ensure_texture(&mut self, ctx: &egui::Context) {
        if self.texture.is_some() {
            return;
        }
        if let Some(img) = self.raw_image.take() {
            let rgba = img.to_rgba8();
            let size = [rgba.width() as usize, rgba.height() as usize];
            let pixels = rgba.as_flat_samples();
            let color_image =
                egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice());
            self.texture = Some(ctx.load_texture(
                "image",
                color_image,
                egui::TextureOptions::LINEAR,
            ));
        }
    }

    // ── Panels ──────────────────────────────────────────────────────────────

    fn points_table(&self, ui: &mut egui::Ui) {
        let points = self.session.points();
        ui.heading(format!("Points ({})", points.len()));
        ui.separator();
        TableBuilder::new(ui)
            .striped(true)
            .stick_to_bottom(true)
            .column(Column::auto().at_least(40.0))
            .column(Column::auto().at_least(60.0))
            .column(Column::remainder().at_least(60.0))
            .header(18.0, |mut header| {
                for title in crate::export::HEADER {
                    header.col(|ui| {
                        ui.strong(title);
                    });
                }
            })
            .body(|body| {
                body.rows(18.0, points.len(), |mut row| {
                    let p = &points[row.index()];
                    row.col(|ui| {
                        ui.label(&p.id);
                    });
                    row.col(|ui| {
                        ui.label(format!("{:.1}", p.x));
                    });
                    row.col(|ui| {
                        ui.label(format!("{:.1}", p.y));
                    });
                });
            });
    }

    fn status_bar(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label(format!("{} points", self.session.points().len()));
            ui.separator();
            match self.session.pending() {
                Some((x, y)) => ui.label(format!("Pending: ({x:.1}, {y:.1})")),
                None => ui.weak("No pending point"),
            };
            ui.separator();
            ui.label(format!("Output: {}", self.session.output().display()));
            if let Some(ref status) = self.status {
                ui.separator();
                if status.is_error {
                    ui.colored_label(ui.visuals().error_fg_color, &status.text);
                } else {
                    ui.label(&status.text);
                }
            }
        });
    }
}

// ── eframe App impl ────────────────────────────────────────────────────────

impl eframe::App for AnnotatorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.ensure_texture(ctx);

        let shortcuts = read_shortcuts(ctx);
        if shortcuts.undo {
            self.undo();
        }
        if shortcuts.export {
            self.export();
        }

        // Top toolbar
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.label(INSTRUCTIONS);
            ui.horizontal(|ui| {
                ui.label("ID:");
                let id_edit = ui.add(
                    egui::TextEdit::singleline(self.session.id_input_mut()).desired_width(80.0),
                );
                let submitted =
                    id_edit.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                if ui.button("Add").clicked() || submitted {
                    self.commit();
                }
                if ui.button("Undo").clicked() {
                    self.undo();
                }
                if ui.button("Export CSV").clicked() {
                    self.export();
                }
                ui.separator();
                ui.label(format!("Zoom: {:.0}%", self.zoom * 100.0));
            });
        });

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| self.status_bar(ui));

        egui::SidePanel::right("points")
            .resizable(true)
            .default_width(200.0)
            .show(ctx, |ui| self.points_table(ui));

        // Canvas
        egui::CentralPanel::default().show(ctx, |ui| {
            let (response, painter) =
                ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
            let canvas_rect = response.rect;
            self.fit_to(canvas_rect);

            painter.rect_filled(canvas_rect, 0.0, egui::Color32::from_gray(40));

            if let Some(ref tex) = self.texture {
                let img_rect = self.image_rect_on_screen(canvas_rect);
                painter.image(
                    tex.id(),
                    img_rect,
                    egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                    egui::Color32::WHITE,
                );
            }

            for mark in self.session.marks() {
                let at = self.image_to_screen(canvas_rect, mark.image_pos());
                mark.paint(&painter, at, self.zoom);
            }

            // Handle pan (middle mouse button)
            let middle_down = ctx.input(|i| i.pointer.middle_down());
            if middle_down {
                let delta = ctx.input(|i| i.pointer.delta());
                self.pan += delta;
                self.panning = true;
            } else {
                self.panning = false;
            }

            // Handle zoom (scroll wheel)
            let scroll_delta = ctx.input(|i| i.smooth_scroll_delta.y);
            if scroll_delta != 0.0 && response.hovered() {
                let zoom_factor = 1.0 + scroll_delta * 0.002;
                let new_zoom = (self.zoom * zoom_factor).clamp(0.1, 10.0);
                if let Some(cursor) = response.hover_pos() {
                    let center = canvas_rect.center();
                    let cursor_rel = cursor - center - self.pan;
                    self.pan -= cursor_rel * (new_zoom / self.zoom - 1.0);
                }
                self.zoom = new_zoom;
            }

            if !self.panning && response.clicked_by(egui::PointerButton::Primary) {
                if let Some(pos) = response.interact_pointer_pos() {
                    let img = self.screen_to_image(canvas_rect, pos);
                    let (x, y) = (img.x as f64, img.y as f64);
                    if self.session.register_click(x, y) {
                        debug!("Pending click at ({x:.1}, {y:.1})");
                    } else {
                        debug!("Ignored click outside image at ({x:.1}, {y:.1})");
                    }
                }
            }
        });
    }
}

/// Open the annotation window for one session and block until it closes.
pub fn run(spec: &SessionSpec) -> Result<()> {
    let app = AnnotatorApp::open(spec)?;
    let title = app.title();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title(&title),
        ..Default::default()
    };

    eframe::run_native(&title, options, Box::new(move |_cc| Ok(Box::new(app))))
        .map_err(|e| anyhow::anyhow!("Annotation window for {} failed: {e}", spec.image.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_press(key: egui::Key, modifiers: egui::Modifiers) -> egui::RawInput {
        egui::RawInput {
            modifiers,
            events: vec![egui::Event::Key {
                key,
                physical_key: None,
                pressed: true,
                repeat: false,
                modifiers,
            }],
            ..Default::default()
        }
    }

    /// Run one frame with an ID field, optionally focusing it, and return
    /// the shortcuts read at the start of the frame.
    fn frame(ctx: &egui::Context, input: egui::RawInput, focus_field: bool) -> Shortcuts {
        let mut text = String::from("12");
        let mut seen = Shortcuts::default();
        let _ = ctx.run(input, |ctx| {
            seen = read_shortcuts(ctx);
            egui::CentralPanel::default().show(ctx, |ui| {
                let field = ui.add(egui::TextEdit::singleline(&mut text).id(egui::Id::new("id_field")));
                if focus_field {
                    field.request_focus();
                }
            });
        });
        seen
    }

    #[test]
    fn test_undo_shortcut_without_focus() {
        let ctx = egui::Context::default();
        frame(&ctx, egui::RawInput::default(), false);
        let seen = frame(&ctx, key_press(egui::Key::Z, egui::Modifiers::COMMAND), false);
        assert!(seen.undo);
        assert!(!seen.export);
    }

    #[test]
    fn test_undo_shortcut_ignored_while_typing_id() {
        let ctx = egui::Context::default();
        frame(&ctx, egui::RawInput::default(), true);
        assert!(ctx.wants_keyboard_input());
        let seen = frame(&ctx, key_press(egui::Key::Z, egui::Modifiers::COMMAND), true);
        assert_eq!(seen, Shortcuts::default());
    }

    #[test]
    fn test_export_shortcut_while_typing_id() {
        let ctx = egui::Context::default();
        frame(&ctx, egui::RawInput::default(), true);
        let seen = frame(&ctx, key_press(egui::Key::S, egui::Modifiers::COMMAND), true);
        assert!(seen.export);
        assert!(!seen.undo);
    }

    fn app_for(width: u32, height: u32) -> (tempfile::TempDir, AnnotatorApp) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.png");
        image::RgbaImage::new(width, height).save(&path).unwrap();
        let app = AnnotatorApp::open(&SessionSpec::new(&path)).unwrap();
        (dir, app)
    }

    #[test]
    fn test_pixel_centres_are_whole_numbers() {
        let (_dir, app) = app_for(4, 2);
        let canvas = egui::Rect::from_min_size(egui::Pos2::ZERO, egui::vec2(400.0, 200.0));

        let on_screen = app.image_rect_on_screen(canvas);
        // top-left corner of pixel (0, 0)
        assert_eq!(app.screen_to_image(canvas, on_screen.min), egui::pos2(-0.5, -0.5));
        // centre of pixel (0, 0)
        let centre = on_screen.min + egui::vec2(0.5, 0.5);
        assert_eq!(app.screen_to_image(canvas, centre), egui::pos2(0.0, 0.0));
        assert_eq!(app.image_to_screen(canvas, egui::pos2(3.0, 1.0)), on_screen.max - egui::vec2(0.5, 0.5));
    }

    #[test]
    fn test_title_names_image() {
        let (_dir, app) = app_for(1, 1);
        assert_eq!(app.title(), "Annotate: plan.png");
    }
}
