//! Abstract 2D drawing target, in world coordinates

use std::fmt;

/// Display color, 0-255 per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// CSS form, as taken by canvas `fillStyle`/`strokeStyle`
impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({},{},{})", self.r, self.g, self.b)
    }
}

/// Path-based drawing operations the render pipeline needs.
///
/// Coordinates are world units; implementations own the mapping to pixels
/// (see `projection::Viewport`).
pub trait DrawingSurface {
    fn clear(&mut self);
    fn begin_path(&mut self);
    fn move_to(&mut self, x: f32, y: f32);
    fn line_to(&mut self, x: f32, y: f32);
    fn close_path(&mut self);
    /// Full circle of radius `r` centered at (cx, cy)
    fn arc(&mut self, cx: f32, cy: f32, r: f32);
    fn set_fill_color(&mut self, color: Rgb);
    fn set_stroke_color(&mut self, color: Rgb);
    fn fill(&mut self);
    fn stroke(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawCommand {
    Clear,
    BeginPath,
    MoveTo(f32, f32),
    LineTo(f32, f32),
    ClosePath,
    Arc { cx: f32, cy: f32, r: f32 },
    FillColor(Rgb),
    StrokeColor(Rgb),
    Fill,
    Stroke,
}

/// Closed polygon as drawn, with the colors active when it was painted
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPolygon {
    pub points: Vec<(f32, f32)>,
    pub fill: Option<Rgb>,
    pub stroke: Option<Rgb>,
}

/// Surface that only records commands, for headless rendering and tests
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    pub commands: Vec<DrawCommand>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Polygons (paths started with `move_to`) that were filled or stroked,
    /// in draw order.
    pub fn polygons(&self) -> Vec<RecordedPolygon> {
        let mut polygons = Vec::new();
        let mut fill_color = None;
        let mut stroke_color = None;
        let mut current: Option<RecordedPolygon> = None;

        for command in &self.commands {
            match *command {
                DrawCommand::FillColor(c) => fill_color = Some(c),
                DrawCommand::StrokeColor(c) => stroke_color = Some(c),
                DrawCommand::BeginPath | DrawCommand::Clear => {
                    polygons.extend(current.take().filter(is_painted));
                }
                DrawCommand::MoveTo(x, y) => {
                    polygons.extend(current.take().filter(is_painted));
                    current = Some(RecordedPolygon {
                        points: vec![(x, y)],
                        fill: None,
                        stroke: None,
                    });
                }
                DrawCommand::LineTo(x, y) => {
                    if let Some(polygon) = current.as_mut() {
                        polygon.points.push((x, y));
                    }
                }
                DrawCommand::Fill => {
                    if let Some(polygon) = current.as_mut() {
                        polygon.fill = fill_color;
                    }
                }
                DrawCommand::Stroke => {
                    if let Some(polygon) = current.as_mut() {
                        polygon.stroke = stroke_color;
                    }
                }
                DrawCommand::ClosePath | DrawCommand::Arc { .. } => {}
            }
        }
        polygons.extend(current.filter(is_painted));
        polygons
    }
}

fn is_painted(polygon: &RecordedPolygon) -> bool {
    polygon.fill.is_some() || polygon.stroke.is_some()
}

impl DrawingSurface for RecordingSurface {
    fn clear(&mut self) {
        self.commands.push(DrawCommand::Clear);
    }

    fn begin_path(&mut self) {
        self.commands.push(DrawCommand::BeginPath);
    }

    fn move_to(&mut self, x: f32, y: f32) {
        self.commands.push(DrawCommand::MoveTo(x, y));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.commands.push(DrawCommand::LineTo(x, y));
    }

    fn close_path(&mut self) {
        self.commands.push(DrawCommand::ClosePath);
    }

    fn arc(&mut self, cx: f32, cy: f32, r: f32) {
        self.commands.push(DrawCommand::Arc { cx, cy, r });
    }

    fn set_fill_color(&mut self, color: Rgb) {
        self.commands.push(DrawCommand::FillColor(color));
    }

    fn set_stroke_color(&mut self, color: Rgb) {
        self.commands.push(DrawCommand::StrokeColor(color));
    }

    fn fill(&mut self) {
        self.commands.push(DrawCommand::Fill);
    }

    fn stroke(&mut self) {
        self.commands.push(DrawCommand::Stroke);
    }
}
