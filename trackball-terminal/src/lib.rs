//! Terminal host for the trackball viewer: crossterm input, cell rasterizer output

use crossterm::{
    cursor,
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        MouseButton, MouseEvent, MouseEventKind,
    },
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self, ClearType},
};
use std::io::{self, stdout, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};
use trackball_core::geometry::cube_document;
use trackball_core::loader::load_document;
use trackball_core::{
    Controls, FrameDriver, LoadError, LoadOutcome, LoadTicket, MeshDocument, Viewer, Viewport,
};

pub mod renderer;

pub use renderer::CellSurface;

/// Rows above the view used for the status overlay
pub const STATUS_ROWS: u16 = 2;

/// Terminal cells are roughly twice as tall as they are wide
pub const CELL_ASPECT: f32 = 2.0;

/// Fraction of the smaller view dimension used as the trackball radius
const RADIUS_FILL: f32 = 0.45;

const ZOOM_STEP: f32 = 0.05;
const DISTANCE_STEP: f32 = 0.5;

type LoadResult = (LoadTicket, Result<MeshDocument, LoadError>);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Quit,
    ToggleDepthSort,
    ToggleCullBack,
    ToggleCullFront,
    ToggleLighting,
    ToggleFill,
    ToggleStroke,
    TogglePerspective,
    ToggleDebugLog,
    Distance(f32),
    Zoom(f32),
    NextMesh,
    Reset,
}

pub fn key_action(code: KeyCode) -> Option<Action> {
    let action = match code {
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char('s') => Action::ToggleDepthSort,
        KeyCode::Char('b') => Action::ToggleCullBack,
        KeyCode::Char('f') => Action::ToggleCullFront,
        KeyCode::Char('l') => Action::ToggleLighting,
        KeyCode::Char('i') => Action::ToggleFill,
        KeyCode::Char('k') => Action::ToggleStroke,
        KeyCode::Char('p') => Action::TogglePerspective,
        KeyCode::Char('d') => Action::ToggleDebugLog,
        KeyCode::Char('[') => Action::Distance(-DISTANCE_STEP),
        KeyCode::Char(']') => Action::Distance(DISTANCE_STEP),
        KeyCode::Char('+') | KeyCode::Char('=') => Action::Zoom(ZOOM_STEP),
        KeyCode::Char('-') => Action::Zoom(-ZOOM_STEP),
        KeyCode::Tab => Action::NextMesh,
        KeyCode::Char('r') => Action::Reset,
        _ => return None,
    };
    Some(action)
}

/// View area for a terminal of `cols` x `rows`, below the status rows.
pub fn viewport_for(cols: u16, rows: u16, radius: Option<f32>) -> Viewport {
    let width = cols as f32;
    let height = rows.saturating_sub(STATUS_ROWS) as f32;
    let radius = radius.unwrap_or_else(|| (height.min(width / CELL_ASPECT) * RADIUS_FILL).max(1.0));
    Viewport::new(width, height, radius).with_aspect(CELL_ASPECT)
}

/// Main application struct for the terminal viewer
pub struct TerminalApp {
    viewer: Viewer,
    surface: CellSurface,
    sources: Vec<PathBuf>,
    selected: usize,
    radius: Option<f32>,
    tick_rate: u32,
    loads_tx: Sender<LoadResult>,
    loads_rx: Receiver<LoadResult>,
    last_fps_sample: Instant,
    frame_count: u32,
    fps: f32,
}

impl TerminalApp {
    /// Size the view from the current terminal.
    pub fn new(
        sources: Vec<PathBuf>,
        controls: Controls,
        tick_rate: u32,
        radius: Option<f32>,
    ) -> io::Result<Self> {
        let (cols, rows) = terminal::size()?;
        Ok(Self::with_viewport(
            sources,
            controls,
            tick_rate,
            radius,
            viewport_for(cols, rows, radius),
        ))
    }

    /// Without any sources the built-in cube is shown.
    pub fn with_viewport(
        sources: Vec<PathBuf>,
        controls: Controls,
        tick_rate: u32,
        radius: Option<f32>,
        viewport: Viewport,
    ) -> Self {
        let (loads_tx, loads_rx) = mpsc::channel();
        let mut app = Self {
            viewer: Viewer::new(viewport, controls),
            surface: CellSurface::new(viewport),
            sources,
            selected: 0,
            radius,
            tick_rate,
            loads_tx,
            loads_rx,
            last_fps_sample: Instant::now(),
            frame_count: 0,
            fps: 0.0,
        };
        if app.sources.is_empty() {
            app.viewer.load("cube", cube_document());
        } else {
            app.request_load(0);
        }
        app
    }

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    pub fn surface(&self) -> &CellSurface {
        &self.surface
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn run(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            stdout(),
            terminal::EnterAlternateScreen,
            cursor::Hide,
            EnableMouseCapture
        )?;

        let mut driver = FrameDriver::new(self.tick_rate);
        let result = driver.run(|driver| self.frame(driver));

        // Cleanup
        execute!(
            stdout(),
            DisableMouseCapture,
            terminal::LeaveAlternateScreen,
            cursor::Show
        )?;
        terminal::disable_raw_mode()?;

        result
    }

    fn frame(&mut self, driver: &mut FrameDriver) -> io::Result<()> {
        while event::poll(Duration::ZERO)? {
            if !self.handle_event(event::read()?) {
                driver.stop();
                return Ok(());
            }
        }
        self.poll_loads();

        self.viewer.tick(&mut self.surface);
        self.render()?;

        self.frame_count += 1;
        let now = Instant::now();
        let elapsed = now - self.last_fps_sample;
        if elapsed >= Duration::from_secs(1) {
            self.fps = self.frame_count as f32 / elapsed.as_secs_f32();
            self.frame_count = 0;
            self.last_fps_sample = now;
        }
        Ok(())
    }

    /// Apply finished background loads. Returns how many arrived.
    pub fn poll_loads(&mut self) -> usize {
        let mut count = 0;
        while let Ok((ticket, result)) = self.loads_rx.try_recv() {
            if let LoadOutcome::Failed(e) = self.viewer.complete_load(ticket, result) {
                tracing::warn!("Keeping previous mesh: {}", e);
            }
            count += 1;
        }
        count
    }

    /// Load `sources[index]` on a worker thread; the result is applied by
    /// the next `poll_loads`.
    fn request_load(&mut self, index: usize) {
        let Some(path) = self.sources.get(index).cloned() else {
            return;
        };
        self.selected = index;
        let ticket = self.viewer.begin_load(&path.display().to_string());
        let tx = self.loads_tx.clone();
        std::thread::spawn(move || {
            let result = load_document(&path);
            // Receiver gone means the app already exited
            let _ = tx.send((ticket, result));
        });
    }

    /// Returns false when the app should quit.
    pub fn handle_event(&mut self, event: Event) -> bool {
        match event {
            Event::Key(KeyEvent {
                code,
                kind: KeyEventKind::Press,
                ..
            }) => match key_action(code) {
                Some(Action::Quit) => return false,
                Some(action) => self.apply(action),
                None => {}
            },
            Event::Mouse(mouse) => self.handle_mouse(mouse),
            Event::Resize(cols, rows) => {
                let viewport = viewport_for(cols, rows, self.radius);
                self.surface.resize(viewport);
                self.viewer.set_viewport(viewport);
            }
            _ => {}
        }
        true
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        // Cell centers, in view coordinates
        let sx = mouse.column as f32 + 0.5;
        let sy = mouse.row as f32 - STATUS_ROWS as f32 + 0.5;
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => self.viewer.pointer_down(sx, sy),
            MouseEventKind::Drag(MouseButton::Left) => {
                self.viewer.pointer_move(sx, sy);
            }
            MouseEventKind::Up(MouseButton::Left) => self.viewer.pointer_up(),
            _ => {}
        }
    }

    pub fn apply(&mut self, action: Action) {
        let result = match action {
            Action::Quit => Ok(()),
            Action::ToggleDepthSort => self.viewer.update_controls(|c| c.depth_sort = !c.depth_sort),
            Action::ToggleCullBack => self.viewer.update_controls(|c| c.cull_back = !c.cull_back),
            Action::ToggleCullFront => self.viewer.update_controls(|c| c.cull_front = !c.cull_front),
            Action::ToggleLighting => self.viewer.update_controls(|c| c.lighting = !c.lighting),
            Action::ToggleFill => self.viewer.update_controls(|c| c.fill = !c.fill),
            Action::ToggleStroke => self.viewer.update_controls(|c| c.stroke = !c.stroke),
            Action::TogglePerspective => {
                self.viewer.update_controls(|c| c.perspective = !c.perspective)
            }
            Action::ToggleDebugLog => self.viewer.update_controls(|c| c.debug_log = !c.debug_log),
            Action::Distance(step) => self
                .viewer
                .update_controls(|c| c.perspective_distance += step),
            Action::Zoom(step) => self.viewer.update_controls(|c| c.nudge_zoom(step)),
            Action::NextMesh => {
                if !self.sources.is_empty() {
                    self.request_load((self.selected + 1) % self.sources.len());
                }
                Ok(())
            }
            Action::Reset => {
                self.viewer.reset();
                Ok(())
            }
        };
        // The viewer keeps the old projection and reports through its status
        if let Err(e) = result {
            tracing::debug!("Control change rejected: {}", e);
        }
    }

    fn status_line(&self) -> String {
        let controls = self.viewer.controls();
        let flag = |on: bool| if on { "on" } else { "off" };
        let source = self
            .sources
            .get(self.selected)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "cube".to_string());
        let projection = if controls.perspective {
            format!("persp d={:.1}", controls.perspective_distance)
        } else {
            "ortho".to_string()
        };
        format!(
            "Trackball | FPS: {:.1} | {} | zoom {:.2} {} | sort {} back {} front {} light {} fill {} stroke {}",
            self.fps,
            source,
            controls.zoom,
            projection,
            flag(controls.depth_sort),
            flag(controls.cull_back),
            flag(controls.cull_front),
            flag(controls.lighting),
            flag(controls.fill),
            flag(controls.stroke),
        )
    }

    fn message_line(&self) -> String {
        if let Some(status) = self.viewer.status() {
            return status.to_string();
        }
        match self.viewer.debug_messages().last() {
            Some(message) => format!("debug: {message}"),
            None => "drag=rotate s/b/f/l/i/k/p toggle [/] distance +/- zoom tab=next r=reset d=log q=quit"
                .to_string(),
        }
    }

    fn render(&self) -> io::Result<()> {
        let mut stdout = stdout();
        self.surface.draw(&mut stdout, STATUS_ROWS)?;

        // Status overlay
        queue!(
            stdout,
            cursor::MoveTo(0, 0),
            terminal::Clear(ClearType::CurrentLine),
            SetForegroundColor(Color::Yellow),
            Print(self.status_line()),
            cursor::MoveTo(0, 1),
            terminal::Clear(ClearType::CurrentLine),
            SetForegroundColor(Color::Grey),
            Print(self.message_line()),
            ResetColor
        )?;

        stdout.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;
    use trackball_core::Projection;

    fn app() -> TerminalApp {
        TerminalApp::with_viewport(
            Vec::new(),
            Controls::default(),
            100,
            None,
            viewport_for(80, 42, None),
        )
    }

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> Event {
        Event::Mouse(MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        })
    }

    #[test]
    fn test_key_mapping() {
        assert_eq!(key_action(KeyCode::Char('q')), Some(Action::Quit));
        assert_eq!(key_action(KeyCode::Esc), Some(Action::Quit));
        assert_eq!(key_action(KeyCode::Char('b')), Some(Action::ToggleCullBack));
        assert_eq!(key_action(KeyCode::Char(']')), Some(Action::Distance(0.5)));
        assert_eq!(key_action(KeyCode::Char('-')), Some(Action::Zoom(-0.05)));
        assert_eq!(key_action(KeyCode::Tab), Some(Action::NextMesh));
        assert_eq!(key_action(KeyCode::Char('x')), None);
    }

    #[test]
    fn test_viewport_leaves_status_rows() {
        let viewport = viewport_for(80, 42, None);
        assert_eq!(viewport.width, 80.0);
        assert_eq!(viewport.height, 40.0);
        assert!((viewport.radius - 18.0).abs() < 1e-5);
        assert_eq!(viewport.aspect, CELL_ASPECT);

        assert_eq!(viewport_for(80, 42, Some(5.0)).radius, 5.0);
    }

    #[test]
    fn test_starts_with_cube() {
        let app = app();
        assert_eq!(app.viewer().mesh().faces.len(), 6);
    }

    #[test]
    fn test_toggles_update_controls() {
        let mut app = app();
        app.apply(Action::ToggleCullBack);
        app.apply(Action::TogglePerspective);
        app.apply(Action::Distance(-1.0));

        let controls = app.viewer().controls();
        assert!(controls.cull_back);
        assert_eq!(
            app.viewer().transform().projection(),
            Projection::Perspective { distance: 4.0 }
        );
    }

    #[test]
    fn test_distance_key_never_goes_non_positive() {
        let mut app = app();
        app.apply(Action::TogglePerspective);
        for _ in 0..20 {
            app.apply(Action::Distance(-DISTANCE_STEP));
        }
        assert_eq!(app.viewer().controls().perspective_distance, 0.5);
        assert_eq!(
            app.viewer().transform().projection(),
            Projection::Perspective { distance: 0.5 }
        );
    }

    #[test]
    fn test_quit_key_stops() {
        let mut app = app();
        let key = Event::Key(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE));
        assert!(!app.handle_event(key));
    }

    #[test]
    fn test_mouse_drag_rotates() {
        let mut app = app();
        assert!(app.handle_event(mouse(MouseEventKind::Down(MouseButton::Left), 40, 22)));
        assert!(app.viewer().is_dragging());
        app.handle_event(mouse(MouseEventKind::Drag(MouseButton::Left), 50, 22));
        app.handle_event(mouse(MouseEventKind::Up(MouseButton::Left), 50, 22));

        assert!(!app.viewer().is_dragging());
        assert_ne!(*app.viewer().transform().rotation(), trackball_core::math::Mat4::identity());
    }

    #[test]
    fn test_resize_rebuilds_surface() {
        let mut app = app();
        app.handle_event(Event::Resize(100, 30));
        assert_eq!(app.surface().width(), 100);
        assert_eq!(app.surface().height(), 28);
        assert_eq!(app.viewer().viewport().width, 100.0);
    }

    #[test]
    fn test_background_load_applies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("triangle.json");
        std::fs::write(
            &path,
            r#"{"vertexPositions": [0,0,0, 1,0,0, 0,1,0], "groups": [{"faces": [[0,1,2]], "Kd": [1,1,1]}]}"#,
        )
        .unwrap();

        let mut app = TerminalApp::with_viewport(
            vec![path],
            Controls::default(),
            100,
            None,
            viewport_for(80, 42, None),
        );
        let deadline = Instant::now() + Duration::from_secs(5);
        while app.poll_loads() == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(app.viewer().mesh().faces.len(), 1);
    }
}
