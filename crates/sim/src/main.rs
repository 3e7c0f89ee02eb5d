//! robovis: articulation debug viewer.
//!
//! Main binary: one demo frame (several physics steps) per redraw + wgpu rendering.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use robovis_render::{RenderContext, Viewer};
use robovis_sim::{AppConfig, Demo};

struct App {
    config: AppConfig,
    demo: Demo,
    window: Option<Arc<Window>>,
    viewer: Option<Viewer>,
    /// First fatal error; the event loop exits when it is set.
    error: Option<anyhow::Error>,
}

impl App {
    fn new(config: AppConfig, demo: Demo) -> Self {
        Self {
            config,
            demo,
            window: None,
            viewer: None,
            error: None,
        }
    }

    fn init_viewer(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let wc = &self.config.window;
        let window = Arc::new(
            event_loop
                .create_window(
                    Window::default_attributes()
                        .with_title(wc.title.clone())
                        .with_inner_size(winit::dpi::LogicalSize::new(wc.width, wc.height)),
                )
                .context("failed to create window")?,
        );

        let ctx = RenderContext::new_blocking(window.clone())?;
        let mut viewer = Viewer::new(ctx);
        let snapshot = self.demo.scene().update_render();
        viewer.set_scene(self.demo.scene(), &snapshot);

        let [x, y, z] = self.config.camera.xyz;
        let [roll, pitch, yaw] = self.config.camera.rpy;
        viewer.set_camera_xyz(x, y, z);
        viewer.set_camera_rpy(roll, pitch, yaw);
        viewer.set_show_collisions(self.config.debug.show_collisions);

        log::info!("Controls: LMB=rotate, MMB/RMB=pan, wheel=zoom, C=collisions, F=frame robot, ESC=quit");

        window.request_redraw();
        self.viewer = Some(viewer);
        self.window = Some(window);
        Ok(())
    }

    fn frame(&mut self) -> Result<()> {
        let Some(viewer) = self.viewer.as_mut() else {
            return Ok(());
        };
        let stdout = io::stdout();
        let mut out = stdout.lock();
        let snapshot = self.demo.step_frame(&mut out)?;
        out.flush()?;

        viewer.render(&snapshot)?;
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        self.error = Some(err);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init_viewer(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(viewer) = self.viewer.as_mut() else {
            return;
        };
        let needs_redraw = viewer.handle_window_event(&event);
        if viewer.closed() {
            event_loop.exit();
            return;
        }

        if let WindowEvent::RedrawRequested = event {
            if let Err(e) = self.frame() {
                self.fail(event_loop, e);
                return;
            }
            if let Some(window) = &self.window {
                window.request_redraw();
            }
        } else if needs_redraw {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
        }
    }
}

fn main() -> Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.debug.log_level.as_str()),
    )
    .init();

    log::info!("loading {}", config.robot.urdf_path.display());
    let demo = {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        Demo::new(&config, &mut out)
            .with_context(|| format!("failed to set up {}", config.robot.urdf_path.display()))?
    };

    let event_loop = EventLoop::new().context("failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config, demo);
    event_loop.run_app(&mut app).context("event loop error")?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
