//! Window handling and the per-frame work of the viewer.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use ash::vk;
use quill_gpu::{DeviceBuilder, Event, OwnerId, Renderer, RendererConfig};
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

const SAMPLE_COUNTS: [u8; 4] = [1, 2, 4, 8];

/// Next entry of [`SAMPLE_COUNTS`] after `current`, wrapping.
fn next_sample_count(current: u8) -> u8 {
    let index = SAMPLE_COUNTS
        .iter()
        .position(|&count| count == current)
        .map_or(0, |i| (i + 1) % SAMPLE_COUNTS.len());
    SAMPLE_COUNTS[index]
}

/// A slowly cycling color for time `t` in seconds.
fn clear_color_at(t: f32) -> [f32; 4] {
    let channel = |phase: f32| 0.5 + 0.5 * (t * 0.5 + phase).sin();
    [channel(0.0) * 0.4, channel(2.1) * 0.4, channel(4.2) * 0.4, 1.0]
}

pub struct Viewer {
    config: RendererConfig,
    width: u32,
    height: u32,
    state: Option<ViewerState>,
}

/// Everything that exists while the window is open.
struct ViewerState {
    // Dropped before the window it presents to
    renderer: Renderer,
    window: Arc<Window>,
    owner: OwnerId,
    frames: Rc<Cell<u64>>,
    started: Instant,
    minimized: bool,
}

impl Viewer {
    pub fn new(config: RendererConfig, width: u32, height: u32) -> Self {
        Self {
            config,
            width,
            height,
            state: None,
        }
    }

    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<ViewerState> {
        let window_attrs = Window::default_attributes()
            .with_title(&self.config.app_name)
            .with_inner_size(PhysicalSize::new(self.width, self.height));
        let window = Arc::new(event_loop.create_window(window_attrs)?);

        let device = DeviceBuilder::from_config(&self.config).build(window.as_ref())?;
        let size = window.inner_size();
        let mut renderer = Renderer::new(
            device,
            &self.config,
            vk::Extent2D {
                width: size.width,
                height: size.height,
            },
        )?;

        // Count finished frames through the frame callbacks
        let owner = OwnerId::new();
        let frames = Rc::new(Cell::new(0_u64));
        let counter = Rc::clone(&frames);
        renderer
            .command_buffers_mut()
            .add_callback(Event::Finish, owner, move |_, _| {
                counter.set(counter.get() + 1);
            });

        Ok(ViewerState {
            renderer,
            window,
            owner,
            frames,
            started: Instant::now(),
            minimized: false,
        })
    }
}

impl ViewerState {
    fn render_frame(&mut self) -> anyhow::Result<()> {
        if self.minimized {
            return Ok(());
        }

        let t = self.started.elapsed().as_secs_f32();
        self.renderer.set_clear_color(clear_color_at(t));

        let Some(frame) = self.renderer.begin_frame()? else {
            return Ok(());
        };
        self.renderer.end_frame(frame)?;
        Ok(())
    }

    fn handle_key(&mut self, key: KeyCode, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        match key {
            KeyCode::KeyP => {
                let mode = self.renderer.present_mode().next();
                self.renderer.set_present_mode(mode)?;
            }
            KeyCode::KeyM => {
                let requested = next_sample_count(self.renderer.sample_count());
                let samples = self.renderer.set_sample_count(requested)?;
                if samples != requested {
                    // Not supported; wrap back to no MSAA
                    self.renderer.set_sample_count(1)?;
                }
            }
            KeyCode::Escape => event_loop.exit(),
            _ => {}
        }
        Ok(())
    }

    fn cleanup(&mut self) {
        self.renderer.command_buffers_mut().remove_callbacks(self.owner);
        let elapsed = self.started.elapsed().as_secs_f64();
        let frames = self.frames.get();
        info!(
            frames,
            average_fps = frames as f64 / elapsed.max(f64::EPSILON),
            "Viewer finished"
        );
    }
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        match self.create_state(event_loop) {
            Ok(state) => {
                info!(
                    device = %state.renderer.device().capabilities().summary(),
                    "Viewer ready"
                );
                self.state = Some(state);
            }
            Err(e) => {
                error!("Failed to initialize viewer: {e}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(state) = &mut self.state else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                if let Some(mut state) = self.state.take() {
                    state.cleanup();
                }
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = state.render_frame() {
                    error!("Render error: {e}");
                    event_loop.exit();
                }
            }
            WindowEvent::Resized(size) => {
                state.minimized = size.width == 0 || size.height == 0;
                if !state.minimized {
                    state.renderer.resize(vk::Extent2D {
                        width: size.width,
                        height: size.height,
                    });
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                if let Err(e) = state.handle_key(key, event_loop) {
                    error!("Key handling error: {e}");
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }
}
