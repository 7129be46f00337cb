//! Event loop of the viewer.
//!
//! Everything that waits on I/O runs as a task: on the tokio runtime natively,
//! via `spawn_local` in the browser. Tasks never touch the [`Viewer`]; they
//! send a [`ViewerEvent`] through the event loop proxy and the loop applies
//! it. This keeps every mutation of the scene on the event loop.
//!
//! # Lifecycle
//!
//! 1. `resumed` creates the window, the GPU context and starts the environment load
//! 2. `EnvironmentLoaded` installs the environment and starts the model load
//! 3. `ModelProgress`/`ModelLoaded` report and attach the mannequin
//! 4. A fabric picked by the user (`FabricPicked` or a dropped file) is
//!    guarded and numbered right away, read and decoded in a task and
//!    applied on `FabricDecoded`
//! 5. Every `RedrawRequested` applies orbit input, syncs the GPU mirror and
//!    renders a frame, then requests the next one

use std::{fmt::Debug, future::Future, sync::Arc};

use futures::{StreamExt, channel::mpsc};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::Window,
};

use crate::{
    config::ViewerConfig,
    context::Context,
    data_structures::scene_graph::Node,
    error::{LoadError, TextureError},
    fabric::{FabricSource, load_fabric},
    render::SceneRenderer,
    resources::{
        environment::{EnvironmentMap, load_environment},
        load_model,
        texture::SurfaceTexture,
    },
    viewer::Viewer,
};

pub enum ViewerEvent {
    /// The GPU context finished initialising in the browser.
    #[cfg(target_arch = "wasm32")]
    Initialized(Box<AppState>),
    EnvironmentLoaded(Result<EnvironmentMap, LoadError>),
    ModelProgress {
        invocation: u64,
        fraction: f32,
    },
    ModelLoaded {
        invocation: u64,
        result: Result<Node, LoadError>,
    },
    FabricPicked(FabricSource),
    FabricDecoded {
        generation: u64,
        result: Result<Arc<SurfaceTexture>, TextureError>,
    },
}

impl Debug for ViewerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(target_arch = "wasm32")]
            Self::Initialized(_) => f.write_str("Initialized"),
            Self::EnvironmentLoaded(result) => f
                .debug_tuple("EnvironmentLoaded")
                .field(&result.as_ref().map(|env| env.dimensions()))
                .finish(),
            Self::ModelProgress {
                invocation,
                fraction,
            } => f
                .debug_struct("ModelProgress")
                .field("invocation", invocation)
                .field("fraction", fraction)
                .finish(),
            Self::ModelLoaded { invocation, result } => f
                .debug_struct("ModelLoaded")
                .field("invocation", invocation)
                .field("ok", &result.is_ok())
                .finish(),
            Self::FabricPicked(source) => f.debug_tuple("FabricPicked").field(&source.name()).finish(),
            Self::FabricDecoded { generation, result } => f
                .debug_struct("FabricDecoded")
                .field("generation", generation)
                .field("ok", &result.is_ok())
                .finish(),
        }
    }
}

/// Hand an event to the loop. Fails only once the loop has shut down.
pub(crate) fn send(proxy: &EventLoopProxy<ViewerEvent>, event: ViewerEvent) {
    if let Err(e) = proxy.send_event(event) {
        log::warn!("Event loop closed, dropping {:?}", e.0);
    }
}

/// Spawns tasks whose result is fed back into the event loop.
struct Tasks {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: EventLoopProxy<ViewerEvent>,
}

impl Tasks {
    #[cfg(not(target_arch = "wasm32"))]
    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ViewerEvent> + Send + 'static,
    {
        let proxy = self.proxy.clone();
        self.async_runtime.spawn(async move { send(&proxy, task.await) });
    }

    #[cfg(target_arch = "wasm32")]
    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ViewerEvent> + 'static,
    {
        let proxy = self.proxy.clone();
        wasm_bindgen_futures::spawn_local(async move { send(&proxy, task.await) });
    }

    fn load_environment(&self, config: &ViewerConfig) {
        let path = config.hdr_path.clone();
        let root = config.asset_root.clone();
        log::info!("Loading environment {path}");
        self.spawn(async move { ViewerEvent::EnvironmentLoaded(load_environment(&path, &root).await) });
    }

    fn load_model(&self, config: &ViewerConfig, invocation: u64) {
        let path = config.model_path.clone();
        let root = config.asset_root.clone();
        let proxy = self.proxy.clone();
        self.spawn(async move {
            let (progress, fractions) = mpsc::unbounded();
            // Forwarding ends once the loader drops its sender, so all progress is sent before completion
            let forward = fractions.for_each(move |fraction| {
                send(
                    &proxy,
                    ViewerEvent::ModelProgress {
                        invocation,
                        fraction,
                    },
                );
                futures::future::ready(())
            });
            let (result, ()) = futures::join!(load_model(&path, &root, progress), forward);
            ViewerEvent::ModelLoaded { invocation, result }
        });
    }

    fn load_fabric(&self, generation: u64, source: FabricSource, max_dimension: u32) {
        self.spawn(async move {
            ViewerEvent::FabricDecoded {
                generation,
                result: load_fabric(source, max_dimension).await,
            }
        });
    }

    /// Number the pick now so the order of picks decides which fabric wins.
    fn pick_fabric(&self, state: &mut AppState, source: FabricSource) {
        if let Ok(generation) = state.viewer.request_fabric() {
            log::info!("Loading fabric {}", source.name());
            let max_dimension = state.ctx.device.limits().max_texture_dimension_2d;
            self.load_fabric(generation, source, max_dimension);
        }
    }
}

/// Everything that exists once a window and a GPU are available.
#[derive(Debug)]
pub struct AppState {
    ctx: Context,
    viewer: Viewer,
    renderer: SceneRenderer,
}

impl AppState {
    async fn new(window: Arc<Window>, config: ViewerConfig) -> anyhow::Result<Self> {
        let size = window.inner_size();
        let viewer = Viewer::new(config, size.width, size.height);
        let ctx = Context::new(
            window,
            viewer.camera(),
            viewer.viewport().projection(),
            viewer.config().environment_intensity,
        )
        .await?;
        let renderer = SceneRenderer::new(&ctx);
        Ok(Self {
            ctx,
            viewer,
            renderer,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if self.viewer.resize(width, height) {
            self.ctx.resize(width, height);
        }
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        self.viewer.update();
        self.ctx.camera.write(
            &self.ctx.queue,
            self.viewer.camera(),
            self.viewer.viewport().projection(),
        );
        let intensity = self.viewer.config().environment_intensity;
        self.renderer
            .sync(&mut self.ctx, self.viewer.scene_mut(), intensity);
        self.renderer.render(&self.ctx, self.viewer.scene())
    }
}

pub struct App {
    tasks: Tasks,
    // Taken when the window is created
    config: Option<ViewerConfig>,
    state: Option<AppState>,
}

impl App {
    fn new(event_loop: &EventLoop<ViewerEvent>, config: ViewerConfig) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        #[cfg(not(target_arch = "wasm32"))]
        let async_runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            tasks: Tasks {
                #[cfg(not(target_arch = "wasm32"))]
                async_runtime,
                proxy,
            },
            config: Some(config),
            state: None,
        })
    }

    fn start(&mut self, state: AppState) {
        self.tasks.load_environment(state.viewer.config());
        state.ctx.window.request_redraw();
        self.state = Some(state);
    }
}

impl ApplicationHandler<ViewerEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(config) = self.config.take() else {
            // Already initialised, e.g. resumed again on mobile
            return;
        };

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title("Mannequin Viewer");

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let canvas = web_sys::window()
                .and_then(|window| window.document())
                .and_then(|document| document.get_element_by_id(CANVAS_ID));
            let Some(canvas) = canvas else {
                log::error!("No element with id {CANVAS_ID} to render into");
                event_loop.exit();
                return;
            };
            window_attributes = window_attributes.with_canvas(Some(canvas.unchecked_into()));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Could not create a window: {e}");
                event_loop.exit();
                return;
            }
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            match self.tasks.async_runtime.block_on(AppState::new(window, config)) {
                Ok(state) => self.start(state),
                Err(e) => {
                    log::error!("App initialization failed. Cannot create the main context: {e:#}");
                    event_loop.exit();
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            if let Err(e) = crate::web::listen_for_fabric(self.tasks.proxy.clone()) {
                log::error!("Fabric upload is unavailable: {e:#}");
            }
            let proxy = self.tasks.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                match AppState::new(window, config).await {
                    Ok(state) => send(&proxy, ViewerEvent::Initialized(Box::new(state))),
                    Err(e) => log::error!("App initialization failed. Cannot create the main context: {e:#}"),
                }
            });
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: ViewerEvent) {
        #[cfg(target_arch = "wasm32")]
        let event = match event {
            ViewerEvent::Initialized(state) => {
                let mut state = *state;
                // The canvas may have been resized while the GPU was set up
                let size = state.ctx.window.inner_size();
                state.resize(size.width, size.height);
                self.start(state);
                return;
            }
            other => other,
        };

        let Some(state) = &mut self.state else {
            log::warn!("Dropping {event:?}, the viewer is not initialised");
            return;
        };

        match event {
            #[cfg(target_arch = "wasm32")]
            ViewerEvent::Initialized(_) => (),
            ViewerEvent::EnvironmentLoaded(result) => {
                if state.viewer.install_environment(result) {
                    let invocation = state.viewer.begin_model_load();
                    self.tasks.load_model(state.viewer.config(), invocation);
                }
            }
            ViewerEvent::ModelProgress {
                invocation,
                fraction,
            } => state.viewer.on_model_progress(invocation, fraction),
            ViewerEvent::ModelLoaded { invocation, result } => {
                state.viewer.on_model_loaded(invocation, result);
            }
            ViewerEvent::FabricPicked(source) => self.tasks.pick_fabric(state, source),
            ViewerEvent::FabricDecoded { generation, result } => {
                // Outcome is logged by the viewer
                let _ = state.viewer.on_fabric_decoded(generation, result);
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };

        state.viewer.controller_mut().handle_window_events(&event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            #[cfg(not(target_arch = "wasm32"))]
            WindowEvent::DroppedFile(path) => self.tasks.pick_fabric(state, FabricSource::Path(path)),
            WindowEvent::RedrawRequested => {
                match state.render() {
                    Ok(()) => (),
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.ctx.window.inner_size();
                        state.ctx.resize(size.width, size.height);
                    }
                    Err(e) => {
                        log::error!("Unable to render {}", e);
                    }
                }
                state.ctx.window.request_redraw();
            }
            _ => {}
        }
    }
}

pub fn run(config: ViewerConfig) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info)
            .map_err(|e| anyhow::anyhow!("could not initialize logger: {e}"))?;
    }

    let event_loop: EventLoop<ViewerEvent> = EventLoop::with_user_event().build()?;

    let mut app = App::new(&event_loop, config)?;

    event_loop.run_app(&mut app)?;

    Ok(())
}
