//! Luma entrypoint: configuration, wiring, and the startup/shutdown
//! choreography.
//!
//! Startup order matters and is fixed: GPIO registry → config → state →
//! zone service → frame manager → transitions → animation engine →
//! controllers → input adapters → API. Shutdown walks the same list in
//! reverse, flushing saves and driving the chains to black before pins
//! are released. Only a configuration error (or a GPIO conflict)
//! aborts startup; everything later degrades per subsystem.

use anyhow::{Context, Result};
use clap::Parser;
use core_anim::AnimationEngine;
use core_api::{ApiState, LogHistory, LogHistoryLayer};
use core_control::{wire_controllers, Services};
use core_events::{Event, EventBus, EventKind, LoggingMiddleware, TaskRegistry};
use core_hw::{Chain, GpioRegistry, PinMode};
use core_model::ZoneMapper;
use core_render::{ChainBinding, FrameManager, FrameManagerConfig, FrameSink, SubmitFrames};
use core_state::{StateRepository, ZoneService};
use core_transition::{TransitionConfig, TransitionService};
use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Chain id reserved for the 8-pixel preview surface.
const PREVIEW_CHAIN_ID: &str = "preview";

/// CLI arguments. Nothing is required; the config directory may also
/// come from `LUMA_CONFIG_DIR`.
#[derive(Parser, Debug)]
#[command(name = "luma", version, about = "LED installation controller")]
struct Args {
    /// Configuration directory (hardware.yaml, zones.yaml, ...).
    #[arg(long = "config-dir")]
    config_dir: Option<PathBuf>,
    /// Persisted state file.
    #[arg(long = "state-file", default_value = "state.json")]
    state_file: PathBuf,
    /// HTTP/WebSocket listen address.
    #[arg(long = "http-addr", default_value = "0.0.0.0:8080")]
    http_addr: SocketAddr,
    /// Disable the terminal keyboard adapter (for non-tty deployments).
    #[arg(long = "no-keyboard")]
    no_keyboard: bool,
    /// Render cadence.
    #[arg(long = "fps", default_value_t = 60)]
    fps: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShutdownReason {
    Interrupt,
    Terminate,
    BusRequest,
}

impl ShutdownReason {
    fn as_str(self) -> &'static str {
        match self {
            ShutdownReason::Interrupt => "interrupt",
            ShutdownReason::Terminate => "terminate",
            ShutdownReason::BusRequest => "bus_request",
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn log_shutdown_stage(reason: ShutdownReason, stage: &'static str) {
    info!(
        target: "runtime.shutdown",
        reason = reason.as_str(),
        stage = stage,
        "shutdown_stage"
    );
}

fn configure_logging() -> (Option<WorkerGuard>, Arc<LogHistory>) {
    let file_appender = tracing_appender::rolling::never(".", "luma.log");
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    let history = LogHistory::new();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let result = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(nb_writer),
        )
        .with(LogHistoryLayer::new(history.clone()))
        .try_init();
    match result {
        Ok(()) => (Some(guard), history),
        Err(_) => {
            // a subscriber is already installed (tests); drop the guard
            (None, history)
        }
    }
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |panic_info| {
            tracing::error!(target: "runtime.panic", ?panic_info, "panic");
            default_panic(panic_info);
        }));
    });
}

fn main() -> ExitCode {
    // current-thread runtime: one cooperative scheduler hosting the
    // frame loop, animations, transitions, inputs and the API; only the
    // chain DMA workers live on their own threads
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("luma: failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };
    match runtime.block_on(run()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(target: "runtime", error = %e, "startup_failed");
            eprintln!("luma: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();
    let (_log_guard, log_history) = configure_logging();
    install_panic_hook();
    info!(target: "runtime", "startup");

    // GPIO ownership comes first so a conflict aborts before anything
    // touches the pins
    let gpio = Arc::new(GpioRegistry::new());

    let config_dir = core_config::discover(args.config_dir.clone());
    let config = core_config::load(&config_dir)
        .with_context(|| format!("loading configuration from {}", config_dir.display()))?;

    for chain in config.chains.iter().filter(|c| c.enabled) {
        gpio.register(chain.gpio, format!("chain:{}", chain.id), PinMode::Pwm)
            .context("chain pin registration")?;
    }

    // state load falls back to factory defaults; never fatal
    let persisted = core_state::load_state(&args.state_file);

    let tasks = Arc::new(TaskRegistry::new());
    let bus = Arc::new(EventBus::new());
    bus.add_middleware(LoggingMiddleware);

    let registry = ZoneService::registry_handle(config.zones_in_order(), &persisted);
    let provider = ZoneService::provider_for(&registry);
    let (repo, repo_task) = StateRepository::spawn(args.state_file.clone(), provider);
    tasks.register("state_repository", repo_task);

    let presets = Arc::new(config.presets.clone());
    let params = Arc::new(config.parameters.clone());
    let animations = Arc::new(config.animations.clone());
    let zones = Arc::new(ZoneService::new(
        registry,
        bus.clone(),
        repo.clone(),
        presets,
        params,
        animations,
    ));

    let (bindings, preview) = build_chains(&config)?;
    let min_frame_time = bindings
        .iter()
        .map(|b| b.chain.min_frame_interval())
        .max()
        .unwrap_or(Duration::from_millis(3));

    let statics_zones = zones.clone();
    let (manager, sink) = FrameManager::new(
        bindings,
        preview,
        Arc::new(move || statics_zones.static_zone_rgbs()),
        FrameManagerConfig { fps: args.fps },
    );
    let composite = manager.composite();
    tasks.register("frame_loop", manager.spawn());

    let transitions = Arc::new(TransitionService::new(
        Arc::new(sink.clone()) as Arc<dyn SubmitFrames>,
        composite,
        min_frame_time,
    ));
    let engine = Arc::new(AnimationEngine::new(
        zones.clone(),
        Arc::new(sink.clone()) as Arc<dyn SubmitFrames>,
        transitions.clone(),
        bus.clone(),
    ));

    let services = Services {
        zones: zones.clone(),
        engine: engine.clone(),
        transitions: transitions.clone(),
        sink: sink.clone(),
        bus: bus.clone(),
        tasks: tasks.clone(),
    };
    let lighting = wire_controllers(&services);

    // fade the restored state in, then reconcile persisted animations
    startup_fade(&services).await;
    lighting.sync_engine(None).await;

    let keyboard = if args.no_keyboard {
        None
    } else {
        let (handle, shutdown) = core_input::spawn_keyboard_task(bus.clone());
        tasks.register("keyboard", handle);
        Some(shutdown)
    };

    #[cfg(feature = "hardware")]
    let poller_handles = core_input::spawn_gpio_pollers(
        &config.encoders,
        &config.buttons,
        &gpio,
        bus.clone(),
    )
    .context("gpio input registration")?;
    #[cfg(not(feature = "hardware"))]
    let poller_handles: Vec<tokio::task::JoinHandle<()>> = Vec::new();

    let api_shutdown = Arc::new(Notify::new());
    let api_state = ApiState::new(services.clone(), lighting.clone(), log_history);
    let api_task = {
        let shutdown = api_shutdown.clone();
        let addr = args.http_addr;
        tokio::spawn(async move {
            if let Err(e) = core_api::serve(api_state, addr, async move {
                shutdown.notified().await;
            })
            .await
            {
                error!(target: "api.http", error = %e, "api_server_error");
            }
        })
    };
    tasks.register("api_server", api_task);

    info!(
        target: "runtime.startup",
        config_dir = %config_dir.display(),
        state_file = %args.state_file.display(),
        http = %args.http_addr,
        zones = zones.zone_ids().len(),
        "bootstrap_complete"
    );

    let reason = wait_for_shutdown(&bus).await;
    shutdown(
        reason,
        keyboard,
        poller_handles,
        &services,
        &repo,
        &sink,
        api_shutdown,
        &gpio,
    )
    .await;
    info!(target: "runtime", reason = reason.as_str(), "exit");
    Ok(())
}

/// Build one driver per enabled chain plus the optional preview chain.
/// Without the `hardware` feature every chain is a mock, which keeps
/// the full stack runnable on a development host.
fn build_chains(
    config: &core_config::Config,
) -> Result<(Vec<ChainBinding>, Option<Arc<dyn Chain>>)> {
    let mut bindings = Vec::new();
    let mut preview: Option<Arc<dyn Chain>> = None;
    for chain_config in config.chains.iter().filter(|c| c.enabled) {
        let chain = make_chain(chain_config)?;
        if chain_config.id == PREVIEW_CHAIN_ID {
            preview = Some(chain);
            continue;
        }
        let zones = config
            .zones_by_chain
            .get(&chain_config.id)
            .cloned()
            .unwrap_or_default();
        let mapper = ZoneMapper::new(&zones, chain_config.count)
            .with_context(|| format!("zone mapping for chain `{}`", chain_config.id))?;
        bindings.push(ChainBinding { chain, mapper });
    }
    Ok((bindings, preview))
}

#[cfg(feature = "hardware")]
fn make_chain(config: &core_config::ChainConfig) -> Result<Arc<dyn Chain>> {
    let chain = core_hw::Ws281xChain::new(
        config.id.clone(),
        config.gpio,
        config.count,
        config.color_order,
        config.frequency_hz,
        config.dma,
    )
    .with_context(|| format!("starting chain `{}`", config.id))?;
    Ok(Arc::new(chain))
}

#[cfg(not(feature = "hardware"))]
fn make_chain(config: &core_config::ChainConfig) -> Result<Arc<dyn Chain>> {
    tracing::warn!(
        target: "hw.chain",
        chain = config.id.as_str(),
        "hardware feature disabled, using mock chain"
    );
    Ok(Arc::new(core_hw::MockChain::new(
        config.id.clone(),
        config.count,
    )))
}

/// Fade from black up to the restored zone states.
async fn startup_fade(services: &Services) {
    let zones = &services.zones;
    let presets = zones.presets();
    let configs = zones.zone_configs();
    let mut target = BTreeMap::new();
    for snapshot in zones.snapshots() {
        let len = configs
            .iter()
            .find(|c| c.id == snapshot.id)
            .map(|c| c.pixel_count)
            .unwrap_or_default();
        let rgb = if snapshot.is_on {
            snapshot.color.to_rgb(&presets).scale(snapshot.brightness)
        } else {
            core_color::Rgb::BLACK
        };
        target.insert(snapshot.id.clone(), vec![rgb; len]);
    }
    services
        .transitions
        .fade_in(target, TransitionConfig::startup().duration)
        .await;
}

async fn wait_for_shutdown(bus: &Arc<EventBus>) -> ShutdownReason {
    let notify = Arc::new(Notify::new());
    {
        let notify = notify.clone();
        bus.subscribe(
            "shutdown_listener",
            EventKind::ShutdownRequested,
            100,
            move |event| {
                if let Event::ShutdownRequested { reason } = event {
                    info!(target: "runtime", reason = reason.as_str(), "shutdown_requested");
                    notify.notify_one();
                }
                Ok(())
            },
        );
    }

    #[cfg(unix)]
    let mut sigterm =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
    #[cfg(unix)]
    let terminate = async move {
        match sigterm.as_mut() {
            Some(signal) => {
                signal.recv().await;
            }
            None => std::future::pending().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => ShutdownReason::Interrupt,
        _ = terminate => ShutdownReason::Terminate,
        _ = notify.notified() => ShutdownReason::BusRequest,
    }
}

#[allow(clippy::too_many_arguments)]
async fn shutdown(
    reason: ShutdownReason,
    keyboard: Option<core_input::KeyboardShutdown>,
    poller_handles: Vec<tokio::task::JoinHandle<()>>,
    services: &Services,
    repo: &StateRepository,
    sink: &FrameSink,
    api_shutdown: Arc<Notify>,
    gpio: &Arc<GpioRegistry>,
) {
    log_shutdown_stage(reason, "begin");

    // stop accepting inputs
    if let Some(keyboard) = keyboard {
        keyboard.signal();
    }
    for handle in poller_handles {
        handle.abort();
    }
    api_shutdown.notify_waiters();
    log_shutdown_stage(reason, "inputs_stopped");

    // cancel animations and wait out any in-flight transition
    services.engine.stop().await;
    services.transitions.cancel_active();
    services.transitions.wait_for_idle().await;
    log_shutdown_stage(reason, "animations_stopped");

    // flush debounced saves before the lights go out
    repo.flush().await;
    log_shutdown_stage(reason, "state_flushed");

    // transition to black, then let the loop render it
    services
        .transitions
        .fade_out(TransitionConfig::shutdown().duration)
        .await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    sink.clear();
    tokio::time::sleep(Duration::from_millis(100)).await;
    log_shutdown_stage(reason, "faded_to_black");

    sink.shutdown();
    log_shutdown_stage(reason, "frame_loop_stopped");

    // last: give the pins back
    gpio.release_all();
    log_shutdown_stage(reason, "gpio_released");
}
