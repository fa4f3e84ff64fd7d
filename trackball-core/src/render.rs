//! Per-frame pipeline: transform, divide, sort, cull, shade, draw

use crate::geometry::{Face, Mesh, Reflectivity};
use crate::math::{Mat4, Vec3, Vec4};
use crate::surface::{DrawingSurface, Rgb};
use crate::transform::TransformStack;

/// Flat-shading ambient term
pub const AMBIENT: f32 = 0.4;

/// Reflectivity 1.0 maps to this channel value before lighting
pub const BASE_INTENSITY: f32 = 200.0;

/// Stroke color of the trackball boundary circle
pub const CIRCLE_COLOR: Rgb = Rgb::new(150, 60, 30);

/// Vertices with |w| below this are treated as points at infinity
const W_EPSILON: f32 = 1e-9;

/// Fixed view direction used for culling
pub fn eye_vector() -> Vec3 {
    Vec3::new(0.0, 0.0, 1.0)
}

/// Fixed light direction used for diffuse shading
pub fn light_vector() -> Vec3 {
    Vec3::new(0.0, 0.0, -1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub depth_sort: bool,
    pub cull_back: bool,
    pub cull_front: bool,
    pub lighting: bool,
    pub fill: bool,
    pub stroke: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            depth_sort: true,
            cull_back: false,
            cull_front: false,
            lighting: true,
            fill: true,
            stroke: true,
        }
    }
}

/// What happened to the faces of one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub drawn: usize,
    pub culled: usize,
    /// Faces touching a vertex that could not be projected
    pub skipped: usize,
}

/// Transform every vertex by `m` and divide by w.
///
/// A vertex whose w is (near) zero, or whose result is not finite, maps to
/// `None` instead of poisoning the frame.
pub fn project_vertices(vertices: &[Vec4], m: &Mat4) -> Vec<Option<Vec3>> {
    let mut projected = Vec::with_capacity(vertices.len());
    project_into(vertices, m, &mut projected);
    projected
}

fn project_into(vertices: &[Vec4], m: &Mat4, out: &mut Vec<Option<Vec3>>) {
    out.clear();
    out.extend(vertices.iter().enumerate().map(|(i, v)| {
        let p = m * v;
        if p.w.abs() < W_EPSILON {
            tracing::trace!("Vertex {i} projects to infinity");
            return None;
        }
        let q = p.xyz() / p.w;
        q.iter().all(|c| c.is_finite()).then_some(q)
    }));
}

/// Projected positions of a face's vertices, `None` if any is missing.
fn face_points(face: &Face, projected: &[Option<Vec3>]) -> Option<Vec<Vec3>> {
    face.indices
        .iter()
        .map(|&i| projected.get(i).copied().flatten())
        .collect()
}

/// Mean projected z over a face's vertices
pub fn average_depth(face: &Face, projected: &[Option<Vec3>]) -> Option<f32> {
    let points = face_points(face, projected)?;
    if points.is_empty() {
        return None;
    }
    Some(points.iter().map(|p| p.z).sum::<f32>() / points.len() as f32)
}

/// Indices ordered by ascending depth, ties kept in input order.
pub fn sort_by_depth(depths: &[f32]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..depths.len()).collect();
    order.sort_by(|&a, &b| depths[a].total_cmp(&depths[b]));
    order
}

/// Face draw order: as listed, or farthest (lowest z) first when sorting.
pub fn draw_order(faces: &[Face], projected: &[Option<Vec3>], depth_sort: bool) -> Vec<usize> {
    if !depth_sort {
        return (0..faces.len()).collect();
    }
    // Unprojectable faces get skipped later; their position does not matter
    let depths: Vec<f32> = faces
        .iter()
        .map(|face| average_depth(face, projected).unwrap_or(f32::NEG_INFINITY))
        .collect();
    sort_by_depth(&depths)
}

/// `(v2 - v1) x (v3 - v2)` over a face's first three vertices
pub fn face_normal(v1: &Vec3, v2: &Vec3, v3: &Vec3) -> Vec3 {
    (v2 - v1).cross(&(v3 - v2))
}

/// Dot product of the eye vector with a face normal
pub fn facing(normal: &Vec3) -> f32 {
    eye_vector().dot(normal)
}

/// Whether the enabled culling modes drop a face with this facing value.
pub fn is_culled(facing: f32, options: &RenderOptions) -> bool {
    (options.cull_back && facing > 0.0) || (options.cull_front && facing < 0.0)
}

/// Flat shade one face.
///
/// Base channels are `floor(Kd * 200)`. With lighting each becomes
/// `c * diffuse + AMBIENT * c` for `diffuse = unit(normal) . light`, and the
/// result is clamped to 0..=255.
pub fn shade(kd: &Reflectivity, normal: &Vec3, lighting: bool) -> Rgb {
    let base = [kd.r, kd.g, kd.b].map(|k| (k * BASE_INTENSITY).floor());
    let shaded = if lighting {
        let diffuse = normal
            .try_normalize(f32::EPSILON)
            .map_or(0.0, |n| n.dot(&light_vector()));
        base.map(|c| c * diffuse + AMBIENT * c)
    } else {
        base
    };
    let [r, g, b] = shaded.map(to_channel);
    Rgb::new(r, g, b)
}

fn to_channel(c: f32) -> u8 {
    // NaN casts to 0
    c.clamp(0.0, 255.0).round() as u8
}

/// Renders meshes onto a `DrawingSurface`, reusing its projection buffer
/// between frames.
#[derive(Debug, Default)]
pub struct Renderer {
    projected: Vec<Option<Vec3>>,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Projected vertices of the last rendered frame
    pub fn projected(&self) -> &[Option<Vec3>] {
        &self.projected
    }

    pub fn render<S: DrawingSurface + ?Sized>(
        &mut self,
        mesh: &Mesh,
        transform: &TransformStack,
        options: &RenderOptions,
        surface: &mut S,
    ) -> FrameStats {
        surface.clear();
        surface.begin_path();
        surface.set_stroke_color(CIRCLE_COLOR);
        surface.arc(0.0, 0.0, 1.0);
        surface.stroke();

        project_into(&mesh.vertices, &transform.combined(), &mut self.projected);
        let order = draw_order(&mesh.faces, &self.projected, options.depth_sort);

        let mut stats = FrameStats::default();
        for index in order {
            let face = &mesh.faces[index];
            let points = match face_points(face, &self.projected) {
                Some(points) if points.len() >= 3 => points,
                _ => {
                    stats.skipped += 1;
                    continue;
                }
            };

            let normal = face_normal(&points[0], &points[1], &points[2]);
            if is_culled(facing(&normal), options) {
                stats.culled += 1;
                continue;
            }

            let color = shade(&face.kd, &normal, options.lighting);
            surface.set_fill_color(color);
            surface.set_stroke_color(color);
            draw_polygon(surface, &points);
            if options.stroke {
                surface.stroke();
            }
            if options.fill {
                surface.fill();
            }
            stats.drawn += 1;
        }
        stats
    }
}

/// Closed path through the (x, y) of each point; z is dropped here.
fn draw_polygon<S: DrawingSurface + ?Sized>(surface: &mut S, points: &[Vec3]) {
    surface.begin_path();
    if let Some((first, rest)) = points.split_first() {
        surface.move_to(first.x, first.y);
        for p in rest {
            surface.line_to(p.x, p.y);
        }
    }
    surface.close_path();
}
