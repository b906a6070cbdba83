//! Per-window presenter: owns the repaint timer and is the only writer of
//! this window's display state.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::time::Instant;
use termbg_common::display::{fade_in_update, fade_out_update, hidden_update, image_update};
use termbg_common::{
    BackendMessage, DisplaySurface, ErrorReporting, FrontendMessage, ImageResolver,
    SelectedImages, StyleUpdate,
};
use termbg_config::{Config, ConfigStore, Profile, DEFAULT_INTERVAL_SECS};
use crate::timer::RepaintTimer;

const SET_IMAGE_DELAY: Duration = Duration::from_millis(300);
const FADE_IN_DELAY: Duration = Duration::from_millis(600);

/// Timing derived from the active profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenterSettings {
    pub interval: Duration,
    pub effect_enabled: bool,
    pub set_image_delay: Duration,
    pub fade_in_delay: Duration,
}

impl PresenterSettings {
    pub fn from_profile(profile: &Profile) -> Self {
        let effect_enabled = profile.fade_enabled();
        let (set_image_delay, fade_in_delay) = if effect_enabled {
            (SET_IMAGE_DELAY, FADE_IN_DELAY)
        } else {
            (Duration::ZERO, Duration::ZERO)
        };

        Self {
            interval: profile.effective_interval(),
            effect_enabled,
            set_image_delay,
            fade_in_delay,
        }
    }
}

impl Default for PresenterSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            effect_enabled: true,
            set_image_delay: SET_IMAGE_DELAY,
            fade_in_delay: FADE_IN_DELAY,
        }
    }
}

pub struct Presenter {
    store: ConfigStore,
    profile: Option<Profile>,
    settings: PresenterSettings,
    timer: Option<RepaintTimer>,
    last_selected: SelectedImages,
    hidden: bool,
    generation: Arc<AtomicU64>,
    surface: Arc<dyn DisplaySurface>,
    resolver: ImageResolver,
    outbox: mpsc::UnboundedSender<FrontendMessage>,
}

impl Presenter {
    pub fn new(
        config: Config,
        surface: Arc<dyn DisplaySurface>,
        resolver: ImageResolver,
        outbox: mpsc::UnboundedSender<FrontendMessage>,
    ) -> Self {
        // Any background write made in this window asks every window to
        // rotate.
        let hook_outbox = outbox.clone();
        let store = ConfigStore::load(config).observe(move |_| {
            if hook_outbox.send(FrontendMessage::ChangeBackground).is_err() {
                log::debug!("Backend connection closed, rotation request dropped");
            }
        });

        let mut presenter = Self {
            store,
            profile: None,
            settings: PresenterSettings::default(),
            timer: None,
            last_selected: SelectedImages::empty(),
            hidden: false,
            generation: Arc::new(AtomicU64::new(0)),
            surface,
            resolver,
            outbox,
        };
        presenter.init_from_active_profile();
        presenter
    }

    pub fn settings(&self) -> PresenterSettings {
        self.settings
    }

    pub fn config(&self) -> &Config {
        self.store.get()
    }

    pub fn last_selected(&self) -> &SelectedImages {
        &self.last_selected
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    pub fn next_rotation_at(&self) -> Option<Instant> {
        self.timer.as_ref().map(RepaintTimer::deadline)
    }

    pub fn init_from_profile(&mut self, profile: &Profile) {
        self.settings = PresenterSettings::from_profile(profile);
        self.profile = Some(profile.clone());
        log::debug!("Presenter settings: {:?}", self.settings);
    }

    fn init_from_active_profile(&mut self) {
        match self.store.active_profile() {
            Ok(profile) => {
                let profile = profile.clone();
                self.init_from_profile(&profile);
            }
            Err(e) => {
                e.log_error("No active background profile");
                self.profile = None;
                self.settings = PresenterSettings::default();
            }
        }
    }

    /// Rotates once and arms the timer. No-op while already armed.
    pub fn start(&mut self) {
        if self.timer.is_some() {
            return;
        }
        self.rotate();
        self.timer = Some(RepaintTimer::start(self.settings.interval));
    }

    /// Disarms the timer. Delayed writes already scheduled still land.
    pub fn stop(&mut self) {
        self.timer = None;
    }

    /// The backend relayed a rotation, with fresh configuration if it changed.
    pub fn on_external_rotate_signal(&mut self, config: Option<Config>) {
        if let Some(config) = config {
            self.store.replace(config);
            self.init_from_active_profile();
        }
        self.rotate();
        self.timer = Some(RepaintTimer::start(self.settings.interval));
    }

    /// CONFIG_RELOAD in this window only. The store's hook asks the backend
    /// for a global rotation, which arrives back here as a relay. The
    /// daemon keeps its own copy, so its next relay with configuration
    /// replaces this one; `termbg-cli reload` reloads every process.
    pub fn on_config_reload(&mut self, config: Config) {
        self.store.reload(config);
        self.init_from_active_profile();
        log::info!("Reloaded configuration for this window; run `termbg-cli reload` to update the daemon");
    }

    /// The "Next Image" shortcut pressed in this window.
    pub fn request_global_rotate(&self) {
        self.send(FrontendMessage::ChangeBackground);
    }

    pub fn rotate(&mut self) {
        let Some(profile) = self.profile.clone() else {
            self.clear();
            return;
        };
        let Some(source) = profile.source() else {
            self.clear();
            return;
        };

        let images = self.resolver.resolve(source);
        self.report(&images);

        if images.is_empty() || images == self.last_selected {
            log::debug!("Selection unchanged, keeping current background");
            return;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        log::info!("Rotating to {:?}", images.paths());

        self.surface.apply(&fade_out_update(
            profile.overlay_color(),
            profile.opacity_delay(),
            profile.blur(),
        ));
        self.schedule(generation, self.settings.set_image_delay, image_update(&images));
        self.schedule(generation, self.settings.fade_in_delay, fade_in_update());

        self.last_selected = images;
        self.hidden = false;
    }

    fn clear(&mut self) {
        if !self.hidden {
            self.generation.fetch_add(1, Ordering::SeqCst);
            self.surface.apply(&hidden_update());
            self.hidden = true;
        }
        self.last_selected = SelectedImages::empty();
        self.report(&self.last_selected);
    }

    /// Applies `update` after `delay` unless a newer rotation started first.
    fn schedule(&self, generation: u64, delay: Duration, update: StyleUpdate) {
        let current = Arc::clone(&self.generation);
        let surface = Arc::clone(&self.surface);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if current.load(Ordering::SeqCst) == generation {
                surface.apply(&update);
            } else {
                log::debug!("Dropping stale write from rotation {}", generation);
            }
        });
    }

    fn report(&self, images: &SelectedImages) {
        self.send(FrontendMessage::SetImagePath {
            images: images.paths().to_vec(),
        });
    }

    fn send(&self, message: FrontendMessage) {
        if self.outbox.send(message).is_err() {
            log::debug!("Backend connection closed, message dropped");
        }
    }

    pub fn handle_backend(&mut self, message: BackendMessage<Config>) {
        match message {
            BackendMessage::Welcome { config } => {
                log::warn!("Unexpected welcome, taking its configuration");
                self.store.replace(config);
                self.init_from_active_profile();
            }
            BackendMessage::ChangeBackground { config } => self.on_external_rotate_signal(config),
        }
    }

    /// Runs until the backend goes away. SIGHUP reloads `config_path`,
    /// SIGUSR1 requests a global rotation.
    pub async fn run(
        mut self,
        mut inbound: mpsc::UnboundedReceiver<BackendMessage<Config>>,
        config_path: PathBuf,
    ) -> anyhow::Result<()> {
        let mut hangup = signal(SignalKind::hangup())?;
        let mut user1 = signal(SignalKind::user_defined1())?;

        self.start();

        loop {
            tokio::select! {
                message = inbound.recv() => match message {
                    Some(message) => self.handle_backend(message),
                    None => {
                        log::info!("Backend connection closed, stopping");
                        break;
                    }
                },
                _ = next_tick(&mut self.timer) => self.rotate(),
                _ = hangup.recv() => match Config::load_from_path(&config_path) {
                    Ok(config) => self.on_config_reload(config),
                    Err(e) => log::warn!("Keeping current configuration: {}", e.user_friendly_message()),
                },
                _ = user1.recv() => self.request_global_rotate(),
            }
        }

        self.stop();
        Ok(())
    }
}

async fn next_tick(timer: &mut Option<RepaintTimer>) {
    match timer {
        Some(timer) => timer.tick().await,
        None => std::future::pending().await,
    }
}
