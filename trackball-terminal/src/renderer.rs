//! Cell rasterizer: a `DrawingSurface` backed by a grid of colored terminal cells

use crossterm::{
    cursor,
    style::{Color, Print, ResetColor, SetForegroundColor},
    QueueableCommand,
};
use std::io::Write;
use trackball_core::{DrawingSurface, Rgb, Viewport};

/// Glyph used for painted cells
const BLOCK: char = '█';

/// Segments used to approximate a circle
const ARC_SEGMENTS: usize = 64;

#[derive(Debug, Clone, Default)]
struct SubPath {
    points: Vec<(f32, f32)>,
    closed: bool,
}

/// Paths are kept in cell coordinates (x right, y down, cell centers at
/// `n + 0.5`); world coordinates are mapped through the viewport on entry.
pub struct CellSurface {
    width: usize,
    height: usize,
    viewport: Viewport,
    cells: Vec<Option<Rgb>>,
    path: Vec<SubPath>,
    fill_color: Rgb,
    stroke_color: Rgb,
}

impl CellSurface {
    pub fn new(viewport: Viewport) -> Self {
        let width = viewport.width.max(0.0) as usize;
        let height = viewport.height.max(0.0) as usize;
        Self {
            width,
            height,
            viewport,
            cells: vec![None; width * height],
            path: Vec::new(),
            fill_color: Rgb::new(220, 220, 220),
            stroke_color: Rgb::new(150, 60, 30),
        }
    }

    pub fn resize(&mut self, viewport: Viewport) {
        *self = Self::new(viewport);
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cell(&self, x: usize, y: usize) -> Option<Rgb> {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            None
        }
    }

    pub fn painted_cells(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    fn plot(&mut self, x: i64, y: i64, color: Rgb) {
        if x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height {
            self.cells[y as usize * self.width + x as usize] = Some(color);
        }
    }

    fn current_subpath(&mut self) -> &mut SubPath {
        if self.path.is_empty() {
            self.path.push(SubPath::default());
        }
        let last = self.path.len() - 1;
        &mut self.path[last]
    }

    /// Even-odd scanline fill of every subpath, sampled at cell centers.
    fn fill_path(&mut self) {
        let edges: Vec<((f32, f32), (f32, f32))> = self
            .path
            .iter()
            .filter(|sub| sub.points.len() >= 3)
            .flat_map(|sub| {
                let n = sub.points.len();
                (0..n).map(move |i| (sub.points[i], sub.points[(i + 1) % n]))
            })
            .collect();
        if edges.is_empty() {
            return;
        }

        let color = self.fill_color;
        let mut crossings = Vec::new();
        for row in 0..self.height {
            let y = row as f32 + 0.5;
            crossings.clear();
            for &((x0, y0), (x1, y1)) in &edges {
                // Half-open so shared vertices are counted once
                if (y0 <= y && y < y1) || (y1 <= y && y < y0) {
                    crossings.push(x0 + (y - y0) / (y1 - y0) * (x1 - x0));
                }
            }
            crossings.sort_by(f32::total_cmp);
            // Clip spans to the grid; far-off vertices give huge crossings
            let last = self.width as i64 - 1;
            for span in crossings.chunks_exact(2) {
                let start = ((span[0] - 0.5).ceil() as i64).max(0);
                let end = ((span[1] - 0.5).floor() as i64).min(last);
                for x in start..=end {
                    self.plot(x, row as i64, color);
                }
            }
        }
    }

    fn stroke_path(&mut self) {
        let color = self.stroke_color;
        let segments: Vec<((f32, f32), (f32, f32))> = self
            .path
            .iter()
            .flat_map(|sub| {
                let n = sub.points.len();
                let count = if sub.closed && n > 1 { n } else { n.saturating_sub(1) };
                (0..count).map(move |i| (sub.points[i], sub.points[(i + 1) % n]))
            })
            .collect();
        for (from, to) in segments {
            self.draw_line(from, to, color);
        }
    }

    /// DDA line between cell-space points, clipped to the grid first
    fn draw_line(&mut self, from: (f32, f32), to: (f32, f32), color: Rgb) {
        let bounds = (self.width as f32, self.height as f32);
        let Some(((x0, y0), (x1, y1))) = clip_segment(from, to, bounds) else {
            return;
        };
        let steps = (x1 - x0).abs().max((y1 - y0).abs()).ceil().max(1.0) as usize;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let x = x0 + (x1 - x0) * t;
            let y = y0 + (y1 - y0) * t;
            self.plot(x.floor() as i64, y.floor() as i64, color);
        }
    }

    /// Write the grid starting at the given terminal row
    pub fn draw<W: Write>(&self, writer: &mut W, top: u16) -> std::io::Result<()> {
        let mut active: Option<Rgb> = None;
        for y in 0..self.height {
            writer.queue(cursor::MoveTo(0, top + y as u16))?;
            for x in 0..self.width {
                match self.cells[y * self.width + x] {
                    Some(color) => {
                        if active != Some(color) {
                            writer.queue(SetForegroundColor(Color::Rgb {
                                r: color.r,
                                g: color.g,
                                b: color.b,
                            }))?;
                            active = Some(color);
                        }
                        writer.queue(Print(BLOCK))?;
                    }
                    None => {
                        writer.queue(Print(' '))?;
                    }
                }
            }
        }
        writer.queue(ResetColor)?;
        Ok(())
    }
}

/// Liang-Barsky clip of a segment to `[0, w] x [0, h]`
fn clip_segment(
    (x0, y0): (f32, f32),
    (x1, y1): (f32, f32),
    (w, h): (f32, f32),
) -> Option<((f32, f32), (f32, f32))> {
    if ![x0, y0, x1, y1].iter().all(|c| c.is_finite()) {
        return None;
    }
    let (dx, dy) = (x1 - x0, y1 - y0);
    let (mut t0, mut t1) = (0.0f32, 1.0f32);
    for (p, q) in [(-dx, x0), (dx, w - x0), (-dy, y0), (dy, h - y0)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return None;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return None;
                }
                t1 = t1.min(r);
            }
        }
    }
    Some(((x0 + t0 * dx, y0 + t0 * dy), (x0 + t1 * dx, y0 + t1 * dy)))
}

impl DrawingSurface for CellSurface {
    fn clear(&mut self) {
        self.cells.fill(None);
        self.path.clear();
    }

    fn begin_path(&mut self) {
        self.path.clear();
    }

    fn move_to(&mut self, x: f32, y: f32) {
        let point = self.viewport.to_screen(x, y);
        self.path.push(SubPath {
            points: vec![point],
            closed: false,
        });
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let point = self.viewport.to_screen(x, y);
        self.current_subpath().points.push(point);
    }

    fn close_path(&mut self) {
        self.current_subpath().closed = true;
    }

    fn arc(&mut self, cx: f32, cy: f32, r: f32) {
        let points = (0..ARC_SEGMENTS)
            .map(|i| {
                let t = i as f32 / ARC_SEGMENTS as f32 * std::f32::consts::TAU;
                self.viewport.to_screen(cx + r * t.cos(), cy + r * t.sin())
            })
            .collect();
        self.path.push(SubPath {
            points,
            closed: true,
        });
    }

    fn set_fill_color(&mut self, color: Rgb) {
        self.fill_color = color;
    }

    fn set_stroke_color(&mut self, color: Rgb) {
        self.stroke_color = color;
    }

    fn fill(&mut self) {
        self.fill_path();
    }

    fn stroke(&mut self) {
        self.stroke_path();
    }
}
