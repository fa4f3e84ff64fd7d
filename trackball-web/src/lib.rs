//! Trackball Web - canvas 2D host for the viewer pipeline
//!
//! JavaScript owns the page: it forwards pointer events in canvas pixels,
//! wires form controls to the setters and calls `start` to begin the 100 Hz
//! frame timer. Everything runs on the browser's main thread.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use trackball_core::driver::DEFAULT_TICK_RATE;
use trackball_core::geometry::cube_document;
use trackball_core::loader::decode_document;
use trackball_core::{
    Controls, DrawingSurface, LoadError, LoadOutcome, MeshFormat, Rgb, Viewer, Viewport,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::js_sys::Uint8Array;
use wasm_bindgen_futures::JsFuture;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, Response};

/// Trackball radius in canvas pixels
pub const CANVAS_RADIUS: f32 = 150.0;

/// Canvas transform taking world units to pixels: x scaled by R, y flipped,
/// origin at the canvas center. Arguments for `setTransform(a, b, c, d, e, f)`.
pub fn canvas_transform(viewport: &Viewport) -> [f64; 6] {
    let (cx, cy) = viewport.center();
    let r = viewport.radius as f64;
    [
        r * viewport.aspect as f64,
        0.0,
        0.0,
        -r,
        cx as f64,
        cy as f64,
    ]
}

/// Whole canvas in world units, as (x, y, w, h) for `clearRect`
pub fn world_bounds(viewport: &Viewport) -> [f64; 4] {
    let (cx, cy) = viewport.center();
    let sx = (viewport.radius * viewport.aspect) as f64;
    let sy = viewport.radius as f64;
    [
        -(cx as f64) / sx,
        -(cy as f64) / sy,
        viewport.width as f64 / sx,
        viewport.height as f64 / sy,
    ]
}

/// Mesh format from a URL's path, ignoring any query or fragment
pub fn url_format(url: &str) -> MeshFormat {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    MeshFormat::from_path(Path::new(path))
}

/// `DrawingSurface` over a 2D canvas context. The world transform is set on
/// every clear so paths are issued in world units.
pub struct CanvasSurface {
    ctx: CanvasRenderingContext2d,
    viewport: Viewport,
}

impl CanvasSurface {
    pub fn new(ctx: CanvasRenderingContext2d, viewport: Viewport) -> Self {
        Self { ctx, viewport }
    }
}

fn warn(message: &str) {
    web_sys::console::warn_1(&JsValue::from_str(message));
}

impl DrawingSurface for CanvasSurface {
    fn clear(&mut self) {
        let [a, b, c, d, e, f] = canvas_transform(&self.viewport);
        if let Err(err) = self.ctx.set_transform(a, b, c, d, e, f) {
            web_sys::console::warn_1(&err);
        }
        let [x, y, w, h] = world_bounds(&self.viewport);
        self.ctx.clear_rect(x, y, w, h);
        // One pixel in world units
        self.ctx.set_line_width(1.0 / self.viewport.radius as f64);
    }

    fn begin_path(&mut self) {
        self.ctx.begin_path();
    }

    fn move_to(&mut self, x: f32, y: f32) {
        self.ctx.move_to(x as f64, y as f64);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.ctx.line_to(x as f64, y as f64);
    }

    fn close_path(&mut self) {
        self.ctx.close_path();
    }

    fn arc(&mut self, cx: f32, cy: f32, r: f32) {
        if let Err(err) = self
            .ctx
            .arc(cx as f64, cy as f64, r as f64, 0.0, std::f64::consts::TAU)
        {
            web_sys::console::warn_1(&err);
        }
    }

    fn set_fill_color(&mut self, color: Rgb) {
        self.ctx.set_fill_style_str(&color.to_string());
    }

    fn set_stroke_color(&mut self, color: Rgb) {
        self.ctx.set_stroke_style_str(&color.to_string());
    }

    fn fill(&mut self) {
        self.ctx.fill();
    }

    fn stroke(&mut self) {
        self.ctx.stroke();
    }
}

struct Inner {
    viewer: Viewer,
    surface: CanvasSurface,
}

impl Inner {
    fn tick(&mut self) {
        self.viewer.tick(&mut self.surface);
    }
}

/// Viewer bound to one canvas element
#[wasm_bindgen]
pub struct WebViewer {
    inner: Rc<RefCell<Inner>>,
    timer: Option<(i32, Closure<dyn FnMut()>)>,
}

#[wasm_bindgen]
impl WebViewer {
    /// Attach to the canvas with the given id and show the built-in cube.
    #[wasm_bindgen(constructor)]
    pub fn new(canvas_id: &str) -> Result<WebViewer, JsValue> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| JsValue::from_str("No document"))?;
        let canvas = document
            .get_element_by_id(canvas_id)
            .ok_or_else(|| JsValue::from_str(&format!("No element with id {canvas_id}")))?
            .dyn_into::<HtmlCanvasElement>()?;
        let ctx = canvas
            .get_context("2d")?
            .ok_or_else(|| JsValue::from_str("2d context unavailable"))?
            .dyn_into::<CanvasRenderingContext2d>()?;

        let viewport = Viewport::new(canvas.width() as f32, canvas.height() as f32, CANVAS_RADIUS);
        let mut viewer = Viewer::new(viewport, Controls::default());
        viewer.load("cube", cube_document());

        Ok(WebViewer {
            inner: Rc::new(RefCell::new(Inner {
                viewer,
                surface: CanvasSurface::new(ctx, viewport),
            })),
            timer: None,
        })
    }

    /// Replace the mesh from JSON text already in hand.
    pub fn load_json(&mut self, source: &str, text: &str) -> Result<(), JsValue> {
        let mut inner = self.inner.borrow_mut();
        let ticket = inner.viewer.begin_load(source);
        match inner.viewer.complete_load(ticket, decode_document(MeshFormat::Json, text.as_bytes())) {
            LoadOutcome::Failed(e) => Err(JsValue::from_str(&e.to_string())),
            _ => Ok(()),
        }
    }

    /// Fetch a `.json` or `.stl` mesh. Only the most recently requested URL
    /// is applied; a failure keeps the current mesh and is reported in
    /// `status` and on the console.
    pub fn load_url(&mut self, url: String) {
        let ticket = self.inner.borrow_mut().viewer.begin_load(&url);
        let inner = Rc::clone(&self.inner);
        wasm_bindgen_futures::spawn_local(async move {
            let result = match url_format(&url) {
                MeshFormat::Unknown => Err(LoadError::UnsupportedFormat(url.clone())),
                format => fetch_bytes(&url)
                    .await
                    .map_err(|e| LoadError::Io(format!("{e:?}")))
                    .and_then(|data| decode_document(format, &data)),
            };
            if let LoadOutcome::Failed(e) = inner.borrow_mut().viewer.complete_load(ticket, result) {
                warn(&format!("Failed to load {url}: {e}"));
            }
        });
    }

    /// Begin the fixed-rate frame timer. Calling it twice is a no-op.
    pub fn start(&mut self) -> Result<(), JsValue> {
        if self.timer.is_some() {
            return Ok(());
        }
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
        let inner = Rc::clone(&self.inner);
        let closure = Closure::<dyn FnMut()>::new(move || inner.borrow_mut().tick());
        let handle = window.set_interval_with_callback_and_timeout_and_arguments_0(
            closure.as_ref().unchecked_ref(),
            (1000 / DEFAULT_TICK_RATE) as i32,
        )?;
        self.timer = Some((handle, closure));
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some((handle, _closure)) = self.timer.take() {
            if let Some(window) = web_sys::window() {
                window.clear_interval_with_handle(handle);
            }
        }
    }

    /// Render a single frame outside the timer.
    pub fn tick(&mut self) {
        self.inner.borrow_mut().tick();
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        self.inner.borrow_mut().viewer.pointer_down(x, y);
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        self.inner.borrow_mut().viewer.pointer_move(x, y);
    }

    pub fn pointer_up(&mut self) {
        self.inner.borrow_mut().viewer.pointer_up();
    }

    pub fn reset(&mut self) {
        self.inner.borrow_mut().viewer.reset();
    }

    /// Replace all controls from a JSON object; missing fields take defaults.
    pub fn set_controls_json(&mut self, text: &str) -> Result<(), JsValue> {
        let controls = Controls::from_json(text).map_err(|e| JsValue::from_str(&e.to_string()))?;
        self.inner
            .borrow_mut()
            .viewer
            .set_controls(controls)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    pub fn set_zoom(&mut self, zoom: f32) -> Result<(), JsValue> {
        self.update(|c| c.zoom = zoom)
    }

    pub fn set_perspective(&mut self, on: bool) -> Result<(), JsValue> {
        self.update(|c| c.perspective = on)
    }

    pub fn set_perspective_distance(&mut self, distance: f32) -> Result<(), JsValue> {
        self.update(|c| c.perspective_distance = distance)
    }

    pub fn set_depth_sort(&mut self, on: bool) -> Result<(), JsValue> {
        self.update(|c| c.depth_sort = on)
    }

    pub fn set_cull_back(&mut self, on: bool) -> Result<(), JsValue> {
        self.update(|c| c.cull_back = on)
    }

    pub fn set_cull_front(&mut self, on: bool) -> Result<(), JsValue> {
        self.update(|c| c.cull_front = on)
    }

    pub fn set_lighting(&mut self, on: bool) -> Result<(), JsValue> {
        self.update(|c| c.lighting = on)
    }

    pub fn set_fill(&mut self, on: bool) -> Result<(), JsValue> {
        self.update(|c| c.fill = on)
    }

    pub fn set_stroke(&mut self, on: bool) -> Result<(), JsValue> {
        self.update(|c| c.stroke = on)
    }

    pub fn set_debug_log(&mut self, on: bool) -> Result<(), JsValue> {
        self.update(|c| c.debug_log = on)
    }

    /// Last load or projection error, if any
    pub fn status(&self) -> Option<String> {
        self.inner.borrow().viewer.status().map(str::to_string)
    }

    /// Debug log lines, newline separated
    pub fn debug_log(&self) -> String {
        self.inner
            .borrow()
            .viewer
            .debug_messages()
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl WebViewer {
    fn update(&mut self, change: impl FnOnce(&mut Controls)) -> Result<(), JsValue> {
        self.inner
            .borrow_mut()
            .viewer
            .update_controls(change)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }
}

impl Drop for WebViewer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn fetch_bytes(url: &str) -> Result<Vec<u8>, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
    let response: Response = JsFuture::from(window.fetch_with_str(url))
        .await?
        .dyn_into()?;
    if !response.ok() {
        return Err(JsValue::from_str(&format!("HTTP {}", response.status())));
    }
    let buffer = JsFuture::from(response.array_buffer()?).await?;
    Ok(Uint8Array::new(&buffer).to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canvas_transform_centers_and_flips() {
        let viewport = Viewport::new(450.0, 342.0, CANVAS_RADIUS);
        assert_eq!(canvas_transform(&viewport), [150.0, 0.0, 0.0, -150.0, 225.0, 171.0]);
    }

    #[test]
    fn test_world_bounds_cover_canvas() {
        let viewport = Viewport::new(450.0, 342.0, CANVAS_RADIUS);
        let [x, y, w, h] = world_bounds(&viewport);
        assert!((x + 1.5).abs() < 1e-9);
        assert!((y + 1.14).abs() < 1e-6);
        assert!((w - 3.0).abs() < 1e-9);
        assert!((h - 2.28).abs() < 1e-6);

        // Maps back to the canvas corners
        let [a, _, _, d, e, f] = canvas_transform(&viewport);
        assert!((a * x + e).abs() < 1e-6);
        assert!((d * y + f - 342.0).abs() < 1e-6);
    }

    #[test]
    fn test_url_format_ignores_query() {
        assert_eq!(url_format("meshes/bunny.json?v=2"), MeshFormat::Json);
        assert_eq!(url_format("/teapot.STL#top"), MeshFormat::Stl);
        assert_eq!(url_format("cube.json"), MeshFormat::Json);
        assert_eq!(url_format("mesh.obj?x=.json"), MeshFormat::Unknown);
    }
}
