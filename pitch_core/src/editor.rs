//! Interactive pitch editor.
//!
//! An [`EditorSession`] owns the loaded document and the view state. Input
//! arrives as [`EditorEvent`]s and [`EditorSession::handle`] answers with the
//! [`RenderCommand`]s needed to bring the display up to date. Drawing itself
//! happens elsewhere (see [`crate::render::Compositor`]), so every transition
//! can be exercised without a display.
//!
//! Pointer coordinates are canvas pixels: `x` grows with time, `y` grows
//! downwards from the highest band.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::document::{LoadedDocument, FINAL_CONTOUR};
use crate::error::{PitchError, Result};
use crate::scale::MelScale;

pub const DEFAULT_CANVAS_HEIGHT: u32 = 256;
pub const MIN_SCALE: f64 = 1.0 / 16.0;
pub const MAX_SCALE: f64 = 64.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Draw,
    Select,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditorEvent {
    PointerDown { x: f64, y: f64 },
    PointerMove { x: f64, y: f64 },
    PointerUp { x: f64, y: f64 },
    SetMode { mode: Mode },
    /// Choose the contour `Apply` copies from. `None` clears the choice.
    SelectSource { name: Option<String> },
    Apply,
    ZoomIn,
    ZoomOut,
}

/// What the display has to redo after an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderCommand {
    /// Rebuild the cached heatmap at this size.
    RenderHeatmap { width: u32, height: u32 },
    /// Composite the editor canvas: heatmap, final contour, selection.
    RenderEditor,
    /// Composite the thumbnail of one candidate contour.
    RenderThumbnail { contour: String },
}

/// Horizontal pixel span of a selection, in the order the pointer made it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub start: f64,
    pub end: f64,
}

impl Selection {
    /// `(min, max)` of the two anchors.
    pub fn span(&self) -> (f64, f64) {
        (self.start.min(self.end), self.start.max(self.end))
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Time indices covered at `scale`, end exclusive, clamped to `len`.
    pub fn index_range(&self, scale: f64, len: usize) -> std::ops::Range<usize> {
        let (lo, hi) = self.span();
        let a = pixel_to_index(lo, scale, len + 1);
        let b = pixel_to_index(hi, scale, len + 1);
        a..b.max(a)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    /// Pixels per time step.
    pub scale: f64,
    pub mode: Mode,
    pub pointer_held: bool,
    /// Time index of the last draw-mode write (or of the stroke's start).
    pub prev_index: Option<usize>,
    pub selection: Option<Selection>,
    pub source: Option<String>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            scale: 1.0,
            mode: Mode::default(),
            pointer_held: false,
            prev_index: None,
            selection: None,
            source: None,
        }
    }
}

/// Handed out by [`EditorSession::begin_load`]; only the newest ticket may
/// complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
}

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone)]
pub struct EditorSession {
    mel: MelScale,
    canvas_height: u32,
    view: ViewState,
    document: Option<LoadedDocument>,
    generation: u64,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new(DEFAULT_CANVAS_HEIGHT)
    }
}

/// `floor(x / scale)` clamped to `[0, len - 1]`.
fn pixel_to_index(x: f64, scale: f64, len: usize) -> usize {
    let idx = (x / scale).floor();
    if !(idx > 0.0) {
        0
    } else {
        (idx as usize).min(len.saturating_sub(1))
    }
}

impl EditorSession {
    pub fn new(canvas_height: u32) -> Self {
        Self::with_scale(canvas_height, MelScale::default())
    }

    pub fn with_scale(canvas_height: u32, mel: MelScale) -> Self {
        Self {
            mel,
            canvas_height: canvas_height.max(1),
            view: ViewState::default(),
            document: None,
            generation: 0,
        }
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn document(&self) -> Option<&LoadedDocument> {
        self.document.as_ref()
    }

    pub fn mel_scale(&self) -> &MelScale {
        &self.mel
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn canvas_height(&self) -> u32 {
        self.canvas_height
    }

    /// `columns * scale`, at least one pixel.
    pub fn canvas_width(&self) -> u32 {
        let cols = self.document.as_ref().map(|d| d.matrix.cols()).unwrap_or(0);
        ((cols as f64 * self.view.scale).floor() as u32).max(1)
    }

    pub fn final_contour(&self) -> Result<&[f64]> {
        self.document
            .as_ref()
            .map(|d| d.contours.final_contour())
            .ok_or(PitchError::NoDocument)
    }

    /// Start a load. Any ticket issued earlier becomes stale.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.generation += 1;
        LoadTicket {
            generation: self.generation,
        }
    }

    /// Install a document for `ticket`, unless a newer load has started since.
    pub fn complete_load(&mut self, ticket: LoadTicket, document: LoadedDocument) -> Result<Vec<RenderCommand>> {
        if ticket.generation != self.generation {
            return Err(PitchError::StaleLoad {
                ticket: ticket.generation,
                current: self.generation,
            });
        }
        info!(
            "Loaded document generation {}: {} bands x {} steps, {} candidate contour(s)",
            ticket.generation,
            document.matrix.rows(),
            document.matrix.cols(),
            document.contours.candidates().count()
        );
        self.document = Some(document);
        self.view = ViewState::default();
        Ok(self.full_redraw())
    }

    /// Begin and complete a load in one step.
    pub fn load(&mut self, document: LoadedDocument) -> Vec<RenderCommand> {
        let ticket = self.begin_load();
        self.complete_load(ticket, document).unwrap_or_default()
    }

    /// Every command needed to redraw from scratch.
    pub fn full_redraw(&self) -> Vec<RenderCommand> {
        let Some(doc) = self.document.as_ref() else {
            return Vec::new();
        };
        let mut commands = vec![
            RenderCommand::RenderHeatmap {
                width: self.canvas_width(),
                height: self.canvas_height,
            },
            RenderCommand::RenderEditor,
        ];
        commands.extend(doc.contours.candidates().map(|(name, _)| RenderCommand::RenderThumbnail {
            contour: name.to_string(),
        }));
        commands
    }

    /// Apply one event. Without a document every event is ignored.
    pub fn handle(&mut self, event: EditorEvent) -> Result<Vec<RenderCommand>> {
        if self.document.is_none() {
            return Ok(Vec::new());
        }

        let commands = match event {
            EditorEvent::PointerDown { x, .. } => self.pointer_down(x),
            EditorEvent::PointerMove { x, y } => self.pointer_move(x, y),
            EditorEvent::PointerUp { .. } => self.pointer_up(),
            EditorEvent::SetMode { mode } => self.set_mode(mode),
            EditorEvent::SelectSource { name } => self.select_source(name)?,
            EditorEvent::Apply => self.apply()?,
            EditorEvent::ZoomIn => self.zoom(2.0),
            EditorEvent::ZoomOut => self.zoom(0.5),
        };
        Ok(commands)
    }

    fn final_len(&self) -> usize {
        self.document
            .as_ref()
            .map(|d| d.contours.final_contour().len())
            .unwrap_or(0)
    }

    fn pointer_down(&mut self, x: f64) -> Vec<RenderCommand> {
        self.view.pointer_held = true;
        match self.view.mode {
            Mode::Draw => {
                // Recorded only; nothing is written until the pointer moves.
                self.view.prev_index = Some(pixel_to_index(x, self.view.scale, self.final_len()));
                Vec::new()
            }
            Mode::Select => {
                self.view.selection = Some(Selection { start: x, end: x });
                vec![RenderCommand::RenderEditor]
            }
        }
    }

    fn pointer_move(&mut self, x: f64, y: f64) -> Vec<RenderCommand> {
        if !self.view.pointer_held {
            return Vec::new();
        }
        match self.view.mode {
            Mode::Draw => self.draw_to(x, y),
            Mode::Select => match self.view.selection.as_mut() {
                Some(sel) => {
                    sel.end = x;
                    vec![RenderCommand::RenderEditor]
                }
                None => Vec::new(),
            },
        }
    }

    fn draw_to(&mut self, x: f64, y: f64) -> Vec<RenderCommand> {
        let len = self.final_len();
        if len == 0 {
            return Vec::new();
        }
        let current = pixel_to_index(x, self.view.scale, len);
        let Some(prev) = self.view.prev_index else {
            self.view.prev_index = Some(current);
            return Vec::new();
        };
        if prev == current {
            return Vec::new();
        }

        let height = self.canvas_height as f64;
        let y = if y.is_nan() { height } else { y.clamp(0.0, height) };
        let band = (height - y) / (height / self.mel.bands as f64);
        let pitch_hz = self.mel.frequency(band);

        let (lo, hi) = (prev.min(current), prev.max(current));
        debug!("Updating pitch over [{}, {}] to {:.2} Hz", lo, hi, pitch_hz);

        if let Some(contour) = self.document.as_mut().and_then(|d| d.contours.final_contour_mut()) {
            contour[lo..=hi].iter_mut().for_each(|v| *v = pitch_hz);
        }
        self.view.prev_index = Some(current);
        vec![RenderCommand::RenderEditor]
    }

    fn pointer_up(&mut self) -> Vec<RenderCommand> {
        self.view.pointer_held = false;
        match self.view.mode {
            Mode::Draw => {
                self.view.prev_index = None;
                Vec::new()
            }
            Mode::Select => {
                if self.view.selection.map(|s| s.is_empty()).unwrap_or(false) {
                    self.view.selection = None;
                    vec![RenderCommand::RenderEditor]
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn set_mode(&mut self, mode: Mode) -> Vec<RenderCommand> {
        if self.view.mode == mode {
            return Vec::new();
        }
        let had_selection = self.view.selection.is_some();
        self.view.mode = mode;
        self.view.pointer_held = false;
        self.view.prev_index = None;
        self.view.selection = None;
        if had_selection {
            vec![RenderCommand::RenderEditor]
        } else {
            Vec::new()
        }
    }

    fn select_source(&mut self, name: Option<String>) -> Result<Vec<RenderCommand>> {
        if let Some(ref n) = name {
            if n == FINAL_CONTOUR {
                return Err(PitchError::InvalidSource(format!("'{FINAL_CONTOUR}' cannot be copied onto itself")));
            }
            let known = self.document.as_ref().map(|d| d.contours.contains(n)).unwrap_or(false);
            if !known {
                return Err(PitchError::UnknownContour(n.clone()));
            }
        }
        self.view.source = name;
        Ok(Vec::new())
    }

    fn apply(&mut self) -> Result<Vec<RenderCommand>> {
        if self.view.mode != Mode::Select {
            return Ok(Vec::new());
        }
        let Some(selection) = self.view.selection.filter(|s| !s.is_empty()) else {
            return Ok(Vec::new());
        };
        let Some(source) = self.view.source.clone() else {
            return Ok(Vec::new());
        };
        let Some(doc) = self.document.as_mut() else {
            return Ok(Vec::new());
        };

        let range = selection.index_range(self.view.scale, doc.contours.final_contour().len());
        info!("Applying '{}' over steps {:?}", source, range);
        doc.contours.splice_into_final(&source, range)?;

        self.view.selection = None;
        Ok(vec![RenderCommand::RenderEditor])
    }

    fn zoom(&mut self, factor: f64) -> Vec<RenderCommand> {
        let next = self.view.scale * factor;
        if !(MIN_SCALE..=MAX_SCALE).contains(&next) {
            return Vec::new();
        }
        // Anchors are pixel positions at the old scale and no longer line up.
        self.view.scale = next;
        self.view.selection = None;
        self.view.prev_index = None;
        self.view.pointer_held = false;
        debug!("Zoom to {}x", next);
        self.full_redraw()
    }
}
