use std::sync::{Arc, PoisonError, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use notify::{Event as NotifyEvent, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::{Config, get_config_path, load_and_validate_config};
use crate::dispatch::Dispatcher;
use crate::model::AliasEvent;
use crate::platform::current_backend;
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
use crate::rpc::server::ServerHandle;
use crate::rpc::{RpcContext, SharedConfig};
use crate::service::{AliasService, ServiceOptions};
use crate::store::AliasStore;

const CONFIG_DEBOUNCE_DURATION: Duration = Duration::from_millis(500);

/// Open the alias database and build the service around the host backend.
pub fn build_service(config: &Config) -> Result<Arc<AliasService>> {
    let db_path = config.database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create data directory")?;
    }
    let store = AliasStore::open(&db_path, config.storage.seed_sample)
        .with_context(|| format!("failed to open alias database {}", db_path.display()))?;

    let backend = current_backend(&config.dispatch);
    log::info!("Using {} backend", backend.name());
    let dispatcher = Dispatcher::new(backend);

    Ok(Arc::new(AliasService::new(
        store,
        dispatcher,
        ServiceOptions::from_config(config),
    )))
}

pub fn run(config: Config) -> Result<()> {
    let shared_config: SharedConfig = Arc::new(RwLock::new(config.clone()));
    let service = build_service(&config)?;

    let server = if config.rpc.enabled {
        let ctx = Arc::new(RpcContext {
            service: service.clone(),
            config: shared_config.clone(),
            config_path: get_config_path(),
        });
        Some(crate::rpc::server::spawn(ctx, &config.rpc.address)?)
    } else {
        log::info!("RPC disabled in config");
        None
    };

    run_host(service, shared_config, server)
}

/// No tray on Linux: serve RPC in the foreground. Hotkeys are bound in the
/// window manager to `spaceboot trigger <key>`.
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn run_host(
    service: Arc<AliasService>,
    shared_config: SharedConfig,
    server: Option<ServerHandle>,
) -> Result<()> {
    let server = server.context("rpc.enabled is false and this platform has no tray to run")?;

    let _config_watcher = spawn_config_watcher(service.clone(), shared_config.clone(), |_| {});
    let _event_listener = spawn_event_listener(&service, shared_config, |_| {});

    log::info!("Running headless; press Ctrl+C to stop");
    server.join();
    Ok(())
}

/// Keep the service in sync with config file edits. `on_reload` runs on the
/// watcher thread after the shared config has been replaced.
fn spawn_config_watcher<F>(
    service: Arc<AliasService>,
    shared_config: SharedConfig,
    on_reload: F,
) -> thread::JoinHandle<()>
where
    F: Fn(std::result::Result<Config, String>) + Send + 'static,
{
    thread::spawn(move || {
        let config_path = get_config_path();
        let (tx, rx) = std::sync::mpsc::channel();

        let mut watcher: RecommendedWatcher = match Watcher::new(
            move |res: std::result::Result<NotifyEvent, notify::Error>| {
                let _ = tx.send(res);
            },
            notify::Config::default(),
        ) {
            Ok(w) => w,
            Err(e) => {
                log::error!("Failed to create config watcher: {}", e);
                return;
            }
        };

        if let Err(e) = watcher.watch(&config_path, RecursiveMode::NonRecursive) {
            log::error!("Failed to watch config file: {}", e);
            return;
        }

        log::debug!("Config watcher started for {:?}", config_path);

        let mut last_reload = Instant::now() - CONFIG_DEBOUNCE_DURATION;

        for result in rx {
            match result {
                Ok(event) => {
                    if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                        continue;
                    }
                    // Editors may write in several operations
                    if last_reload.elapsed() < CONFIG_DEBOUNCE_DURATION {
                        continue;
                    }
                    last_reload = Instant::now();

                    log::debug!("Config file changed, attempting reload");
                    match load_and_validate_config() {
                        Ok(new_config) => {
                            service.set_options(ServiceOptions::from_config(&new_config));
                            *shared_config.write().unwrap_or_else(PoisonError::into_inner) =
                                new_config.clone();
                            log::info!("Configuration reloaded");
                            on_reload(Ok(new_config));
                        }
                        Err(e) => {
                            let msg = format!("Config reload failed: {:#}", e);
                            log::warn!("{}", msg);
                            on_reload(Err(msg));
                        }
                    }
                }
                Err(e) => {
                    log::error!("Config watch error: {}", e);
                }
            }
        }
    })
}

/// Raise desktop notifications for failed dispatches and hand every event
/// to `forward`.
fn spawn_event_listener<F>(
    service: &AliasService,
    shared_config: SharedConfig,
    forward: F,
) -> thread::JoinHandle<()>
where
    F: Fn(AliasEvent) + Send + 'static,
{
    let events = service.subscribe();
    thread::spawn(move || {
        for event in events.iter() {
            if let AliasEvent::DispatchFailed { key, detail, .. } = &event {
                let enabled = shared_config
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .notifications
                    .enabled;
                if enabled {
                    crate::platform::current::notify::notify_dispatch_failure(key, detail);
                }
            }
            forward(event);
        }
    })
}

#[cfg(any(target_os = "macos", target_os = "windows"))]
use tray::run_host;

#[cfg(any(target_os = "macos", target_os = "windows"))]
mod tray {
    use std::sync::{Arc, PoisonError};
    use std::thread;
    use std::time::{Duration, Instant};

    use anyhow::{Context, Result};
    use crossbeam_channel::{Receiver, Sender};
    use log::error;
    use tray_icon::menu::MenuEvent;
    use tray_icon::{TrayIcon, TrayIconBuilder};
    use winit::event::{Event, StartCause};
    use winit::event_loop::{ControlFlow, EventLoop, EventLoopProxy};

    use super::{spawn_config_watcher, spawn_event_listener};
    use crate::config::{get_config_path, update_shared_config_at};
    use crate::model::*;
    use crate::platform::current::login::{
        disable_launch_at_login, enable_launch_at_login, is_launch_at_login_enabled,
    };
    use crate::rpc::SharedConfig;
    use crate::rpc::server::ServerHandle;
    use crate::service::AliasService;
    use crate::ui::icon::{IconVariant, create_template_icon};
    use crate::ui::menu::{build_menu_with_context, build_tooltip, parse_menu_action};
    use crate::utils::open_in_editor;

    const MENU_POLL_INTERVAL: Duration = Duration::from_millis(100);

    pub(super) fn run_host(
        service: Arc<AliasService>,
        shared_config: SharedConfig,
        _server: Option<ServerHandle>,
    ) -> Result<()> {
        let config = shared_config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let mut state = AppState {
            aliases: service.get_aliases().context("failed to load aliases")?,
            last_feedback: None,
            config,
        };

        let event_loop = EventLoop::<UserEvent>::with_user_event()
            .build()
            .context("failed to create event loop")?;
        let proxy = event_loop.create_proxy();
        let (worker_tx, worker_rx) = crossbeam_channel::unbounded();

        let reload_proxy = proxy.clone();
        let _config_watcher =
            spawn_config_watcher(service.clone(), shared_config.clone(), move |result| {
                let event = match result {
                    Ok(config) => UserEvent::ConfigReloaded(config),
                    Err(message) => UserEvent::ConfigReloadFailed(message),
                };
                let _ = reload_proxy.send_event(event);
            });
        let event_proxy = proxy.clone();
        let _event_listener = spawn_event_listener(&service, shared_config.clone(), move |event| {
            let _ = event_proxy.send_event(match event {
                AliasEvent::AliasesChanged(aliases) => UserEvent::AliasesChanged(aliases),
                AliasEvent::DispatchFailed { key, detail, .. } => UserEvent::DispatchFeedback(
                    DispatchFeedback::error(format!("{}: {}", key, detail)),
                ),
            });
        });
        let _worker = spawn_worker(worker_rx, proxy.clone(), service.clone());
        let menu_receiver = MenuEvent::receiver().clone();

        let icon =
            create_template_icon(IconVariant::Idle).context("failed to create tray icon image")?;
        let initial_menu =
            build_menu_with_context(&state).context("failed to build initial menu")?;
        let tray_icon = TrayIconBuilder::new()
            .with_icon(icon)
            .with_icon_as_template(true)
            .with_menu(Box::new(initial_menu))
            .with_tooltip("Spaceboot")
            .build()
            .context("failed to create tray icon")?;
        tray_icon
            .set_visible(true)
            .context("failed to show tray icon")?;

        update_tray_display(&tray_icon, &state);

        let mut worker_sender: Option<Sender<WorkerCommand>> = Some(worker_tx);

        #[allow(deprecated)]
        let run_result = event_loop.run(move |event, event_loop| match event {
            Event::NewEvents(StartCause::Init) => {
                event_loop
                    .set_control_flow(ControlFlow::WaitUntil(Instant::now() + MENU_POLL_INTERVAL));
            }
            Event::NewEvents(StartCause::ResumeTimeReached { .. }) => {
                while let Ok(event) = menu_receiver.try_recv() {
                    if let Some(action) = parse_menu_action(event.id()) {
                        let _ = proxy.send_event(UserEvent::MenuAction(action));
                    }
                }
                event_loop
                    .set_control_flow(ControlFlow::WaitUntil(Instant::now() + MENU_POLL_INTERVAL));
            }
            Event::UserEvent(user_event) => match user_event {
                UserEvent::AliasesChanged(aliases) => {
                    state.aliases = aliases;
                    sync_menu_with_context(&tray_icon, &state);
                    update_tray_display(&tray_icon, &state);
                }
                UserEvent::MenuAction(action) => match action {
                    MenuAction::Dispatch { id } => {
                        let sent = worker_sender
                            .as_ref()
                            .map(|sender| sender.send(WorkerCommand::Dispatch { id }));
                        match sent {
                            Some(Ok(())) => {}
                            Some(Err(err)) => {
                                worker_sender = None;
                                state.last_feedback = Some(DispatchFeedback::error(format!(
                                    "Unable to dispatch alias {}: {}",
                                    id, err
                                )));
                                update_tray_display(&tray_icon, &state);
                            }
                            None => {
                                state.last_feedback = Some(DispatchFeedback::error(format!(
                                    "Worker unavailable for alias {}.",
                                    id
                                )));
                                update_tray_display(&tray_icon, &state);
                            }
                        }
                    }
                    MenuAction::EditConfig => {
                        let config_path = get_config_path();
                        state.last_feedback = Some(match open_in_editor(&config_path) {
                            Ok(()) => DispatchFeedback::info(format!(
                                "Opened config file: {}",
                                config_path.display()
                            )),
                            Err(e) => {
                                DispatchFeedback::error(format!("Failed to open config: {}", e))
                            }
                        });
                        update_tray_display(&tray_icon, &state);
                    }
                    MenuAction::LaunchAtLogin => {
                        toggle_launch_at_login(&mut state, &shared_config);
                        sync_menu_with_context(&tray_icon, &state);
                        update_tray_display(&tray_icon, &state);
                    }
                    MenuAction::Quit => {
                        event_loop.exit();
                    }
                },
                UserEvent::DispatchFeedback(feedback) => {
                    state.last_feedback = Some(feedback);
                    update_tray_display(&tray_icon, &state);
                }
                UserEvent::ConfigReloaded(new_config) => {
                    state.config = new_config;
                    state.last_feedback =
                        Some(DispatchFeedback::info("Configuration reloaded".to_string()));
                    sync_menu_with_context(&tray_icon, &state);
                    update_tray_display(&tray_icon, &state);
                }
                UserEvent::ConfigReloadFailed(message) => {
                    state.last_feedback = Some(DispatchFeedback::error(message));
                    update_tray_display(&tray_icon, &state);
                }
            },
            Event::LoopExiting => {
                worker_sender.take();
            }
            _ => {}
        });

        run_result.context("event loop terminated with error")?;
        Ok(())
    }

    fn toggle_launch_at_login(state: &mut AppState, shared_config: &SharedConfig) {
        let currently_enabled = state.config.system.launch_at_login;
        let result = if currently_enabled {
            disable_launch_at_login()
        } else {
            enable_launch_at_login()
        };

        let feedback = match result {
            Ok(()) => match is_launch_at_login_enabled() {
                // Trust the system over what we asked for
                Ok(actual_state) => match record_launch_at_login(state, shared_config, actual_state) {
                    Ok(()) => DispatchFeedback::info(if actual_state {
                        "Launch at login enabled".to_string()
                    } else {
                        "Launch at login disabled".to_string()
                    }),
                    Err(e) => DispatchFeedback::error(format!("Failed to save config: {:#}", e)),
                },
                Err(e) => DispatchFeedback::error(format!(
                    "Failed to verify launch-at-login state: {}",
                    e
                )),
            },
            Err(e) if e.to_string().contains("Login Items") => {
                if let Ok(actual_state) = is_launch_at_login_enabled() {
                    let _ = record_launch_at_login(state, shared_config, actual_state);
                }
                DispatchFeedback::warning(
                    "Please approve in System Settings > Login Items".to_string(),
                )
            }
            Err(e) => DispatchFeedback::error(format!("Failed to toggle launch-at-login: {}", e)),
        };
        state.last_feedback = Some(feedback);
    }

    /// Persist from the shared config, not the tray's copy, which may predate
    /// an RPC write the watcher hasn't delivered yet.
    fn record_launch_at_login(
        state: &mut AppState,
        shared_config: &SharedConfig,
        enabled: bool,
    ) -> Result<()> {
        state.config.system.launch_at_login = enabled;
        state.config = update_shared_config_at(shared_config, &get_config_path(), |config| {
            config.system.launch_at_login = enabled
        })?;
        Ok(())
    }

    fn spawn_worker(
        rx: Receiver<WorkerCommand>,
        proxy: EventLoopProxy<UserEvent>,
        service: Arc<AliasService>,
    ) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            for command in rx.iter() {
                let feedback = match command {
                    WorkerCommand::Dispatch { id } => dispatch_feedback(&service, id),
                };
                // Failures already reach the tray through the event listener
                let Some(feedback) = feedback else { continue };
                if proxy
                    .send_event(UserEvent::DispatchFeedback(feedback))
                    .is_err()
                {
                    break;
                }
            }
        })
    }

    fn dispatch_feedback(service: &AliasService, id: i64) -> Option<DispatchFeedback> {
        match service.dispatch(id) {
            Ok(outcome) => match outcome.outcome {
                Outcome::Launched => Some(DispatchFeedback::info(format!("Launched alias {}.", id))),
                Outcome::ActivatedExisting => Some(DispatchFeedback::info(format!(
                    "Brought alias {} to the front.",
                    id
                ))),
                Outcome::Debounced => None,
                Outcome::Failed => None,
            },
            Err(e) => Some(DispatchFeedback::error(format!(
                "Alias {} unavailable: {}",
                id, e
            ))),
        }
    }

    fn sync_menu_with_context(tray_icon: &TrayIcon, state: &AppState) {
        match build_menu_with_context(state) {
            Ok(menu) => tray_icon.set_menu(Some(Box::new(menu))),
            Err(err) => error!("Failed to rebuild menu: {}", err),
        }
    }

    fn update_tray_display(tray_icon: &TrayIcon, state: &AppState) {
        let failed = state
            .last_feedback
            .as_ref()
            .is_some_and(|f| f.severity == FeedbackSeverity::Error);
        let variant = if failed {
            IconVariant::Alert
        } else {
            IconVariant::Idle
        };

        if let Ok(icon) = create_template_icon(variant) {
            let _ = tray_icon.set_icon(Some(icon));
            tray_icon.set_icon_as_template(true);
        }

        let tooltip = build_tooltip(&state.aliases, state.last_feedback.as_ref());
        if let Err(err) = tray_icon.set_tooltip(Some(tooltip.as_str())) {
            error!("Failed to update tooltip: {}", err);
        }
    }
}
