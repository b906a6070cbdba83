//! Backend coordinator actor.
//!
//! Owns the canonical configuration and the list of open windows, and is the
//! only place that relays "change-background" to windows. Connection tasks
//! talk to it through [`CoordinatorEvent`]s and it handles them one at a time.

use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};
use termbg_common::{
    BackendMessage, DaemonStatus, ErrorReporting, FrontendMessage, IpcCommand, IpcResponse,
    SelectedImages, TermbgError,
};
use termbg_config::{Config, ConfigStore};
use crate::menu;
use crate::viewer::ImageOpener;

/// Channel buffer size for coordinator events.
pub const CHANNEL_BUFFER_SIZE: usize = 256;

pub type WindowSender = mpsc::UnboundedSender<BackendMessage<Config>>;

#[derive(Debug)]
pub enum CoordinatorEvent {
    Register { sender: WindowSender },
    Frontend(FrontendMessage),
    Command {
        command: IpcCommand,
        reply: oneshot::Sender<IpcResponse>,
    },
}

struct WindowHandle {
    id: u64,
    sender: WindowSender,
}

pub struct Coordinator {
    store: ConfigStore,
    config_path: Option<PathBuf>,
    windows: Vec<WindowHandle>,
    next_window_id: u64,
    last_relayed: Option<Config>,
    current_images: SelectedImages,
    opener: Box<dyn ImageOpener>,
}

impl Coordinator {
    pub fn new(store: ConfigStore, config_path: Option<PathBuf>, opener: Box<dyn ImageOpener>) -> Self {
        Self {
            store,
            config_path,
            windows: Vec::new(),
            next_window_id: 1,
            last_relayed: None,
            current_images: SelectedImages::empty(),
            opener,
        }
    }

    pub async fn run(mut self, mut events: mpsc::Receiver<CoordinatorEvent>) {
        log::debug!("coordinator: event loop starting");
        while let Some(event) = events.recv().await {
            self.handle(event);
        }
        log::debug!("coordinator: all senders dropped, stopping");
    }

    pub fn handle(&mut self, event: CoordinatorEvent) {
        match event {
            CoordinatorEvent::Register { sender } => {
                self.register_window(sender);
            }
            CoordinatorEvent::Frontend(FrontendMessage::Register) => {
                log::warn!("Ignoring duplicate window registration");
            }
            CoordinatorEvent::Frontend(FrontendMessage::ChangeBackground) => {
                self.on_frontend_requested_rotate();
            }
            CoordinatorEvent::Frontend(FrontendMessage::SetImagePath { images }) => {
                self.set_current_images(SelectedImages::from_reported(images));
            }
            CoordinatorEvent::Command { command, reply } => {
                let response = self.handle_command(command);
                if reply.send(response).is_err() {
                    log::debug!("Command client went away before the reply");
                }
            }
        }
    }

    /// Adds a window and hands it the current configuration.
    pub fn register_window(&mut self, sender: WindowSender) -> u64 {
        let id = self.next_window_id;
        self.next_window_id += 1;

        let config = self.store.get().clone();
        if sender.send(BackendMessage::Welcome { config: config.clone() }).is_err() {
            log::warn!("Window {} closed before registration completed", id);
        }
        if self.last_relayed.is_none() {
            self.last_relayed = Some(config);
        }

        self.windows.push(WindowHandle { id, sender });
        log::info!("Registered window {} ({} open)", id, self.windows.len());
        id
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    /// Rotate every window and hand each the latest configuration.
    pub fn relay_change_background(&mut self) {
        let config = self.store.get().clone();
        self.last_relayed = Some(config.clone());
        self.broadcast(Some(config));
    }

    /// A window asked for a global rotation. Configuration rides along only
    /// when it changed since the last relay.
    pub fn on_frontend_requested_rotate(&mut self) {
        let current = self.store.get();
        let payload = if self.last_relayed.as_ref() == Some(current) {
            None
        } else {
            log::debug!("Configuration diverged since last relay, attaching it");
            Some(current.clone())
        };
        if let Some(config) = &payload {
            self.last_relayed = Some(config.clone());
        }
        self.broadcast(payload);
    }

    pub fn select_profile(&mut self, name: &str) -> termbg_common::Result<()> {
        self.store.set_default_profile(name)?;
        log::info!("Switched background profile to '{}'", name);
        self.relay_change_background();
        Ok(())
    }

    /// Menu "Next Image".
    pub fn next_image(&mut self) {
        self.on_frontend_requested_rotate();
    }

    /// CONFIG_RELOAD from the settings file. A broken file keeps the old
    /// configuration.
    pub fn reload(&mut self) -> termbg_common::Result<()> {
        let config = match &self.config_path {
            Some(path) => Config::load_from_path(path)?,
            None => Config::load()?,
        };
        self.store.reload(config);
        self.relay_change_background();
        Ok(())
    }

    pub fn set_current_images(&mut self, images: SelectedImages) {
        log::debug!("Window reports {:?}", images.paths());
        self.current_images = images;
    }

    pub fn current_images(&self) -> &SelectedImages {
        &self.current_images
    }

    pub fn view_current_image(&self) -> termbg_common::Result<()> {
        if self.current_images.is_empty() {
            return Err(TermbgError::Process(termbg_common::error::ProcessError::NothingDisplayed));
        }
        self.opener.open(self.current_images.paths())
    }

    pub fn status(&self) -> DaemonStatus {
        let background = self.store.background();
        DaemonStatus {
            default_profile: background.default.clone(),
            windows: self.windows.len(),
            current_images: self.current_images.paths().to_vec(),
            interval_secs: background
                .active_profile()
                .ok()
                .map(|p| p.effective_interval().as_secs()),
        }
    }

    pub fn handle_command(&mut self, command: IpcCommand) -> IpcResponse {
        log::debug!("Handling command {:?}", command);
        let result = match command {
            IpcCommand::Menu => {
                return IpcResponse::Menu(menu::build_menu(self.store.background(), &self.current_images));
            }
            IpcCommand::Status => return IpcResponse::Status(self.status()),
            IpcCommand::SelectProfile { name } => self
                .select_profile(&name)
                .map(|_| format!("Switched to profile '{}'", name)),
            IpcCommand::NextImage => {
                self.next_image();
                Ok(format!("Rotating {} window(s)", self.windows.len()))
            }
            IpcCommand::ViewCurrentImage => self
                .view_current_image()
                .map(|_| "Opened current image".to_string()),
            IpcCommand::Reload => self.reload().map(|_| "Configuration reloaded".to_string()),
        };

        match result {
            Ok(message) => IpcResponse::Success { message },
            Err(e) => {
                e.log_error("Command failed");
                IpcResponse::Error { message: e.user_friendly_message() }
            }
        }
    }

    fn broadcast(&mut self, config: Option<Config>) {
        let message = BackendMessage::ChangeBackground { config };
        self.windows.retain(|window| {
            if window.sender.send(message.clone()).is_ok() {
                true
            } else {
                log::info!("Window {} is gone, dropping it", window.id);
                false
            }
        });
        log::debug!("Relayed change-background to {} window(s)", self.windows.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;
    use termbg_config::Profile;

    #[derive(Clone, Default)]
    struct RecordingOpener(Arc<Mutex<Vec<PathBuf>>>);

    impl ImageOpener for RecordingOpener {
        fn open(&self, paths: &[PathBuf]) -> termbg_common::Result<()> {
            self.0.lock().unwrap().extend(paths.iter().cloned());
            Ok(())
        }
    }

    fn config(default: &str) -> Config {
        let mut config = Config::default();
        config.background_image.default = default.to_string();
        for (name, interval) in [("A", 10), ("B", 20)] {
            config.background_image.profiles.insert(
                name.to_string(),
                Profile {
                    path: Some(format!("/walls/{}", name)),
                    interval: Some(json!(interval)),
                    ..Profile::default()
                },
            );
        }
        config
    }

    fn coordinator(default: &str) -> (Coordinator, RecordingOpener) {
        let opener = RecordingOpener::default();
        let coordinator = Coordinator::new(
            ConfigStore::load(config(default)),
            None,
            Box::new(opener.clone()),
        );
        (coordinator, opener)
    }

    fn window(coordinator: &mut Coordinator) -> mpsc::UnboundedReceiver<BackendMessage<Config>> {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        coordinator.register_window(sender);
        match receiver.try_recv() {
            Ok(BackendMessage::Welcome { .. }) => {}
            other => panic!("Expected welcome, got {:?}", other),
        }
        receiver
    }

    fn next_relay(receiver: &mut mpsc::UnboundedReceiver<BackendMessage<Config>>) -> Option<Config> {
        match receiver.try_recv() {
            Ok(BackendMessage::ChangeBackground { config }) => config,
            other => panic!("Expected change-background, got {:?}", other),
        }
    }

    #[test]
    fn test_register_event_welcomes_window() {
        let (mut coordinator, _) = coordinator("A");
        let (sender, mut receiver) = mpsc::unbounded_channel();

        coordinator.handle(CoordinatorEvent::Register { sender });

        assert_eq!(coordinator.window_count(), 1);
        assert_eq!(receiver.try_recv().unwrap(), BackendMessage::Welcome { config: config("A") });
    }

    #[test]
    fn test_relay_reaches_every_window_with_config() {
        let (mut coordinator, _) = coordinator("A");
        let mut first = window(&mut coordinator);
        let mut second = window(&mut coordinator);

        coordinator.relay_change_background();

        assert_eq!(next_relay(&mut first), Some(config("A")));
        assert_eq!(next_relay(&mut second), Some(config("A")));
    }

    #[test]
    fn test_frontend_rotate_omits_unchanged_config() {
        let (mut coordinator, _) = coordinator("A");
        let mut receiver = window(&mut coordinator);

        coordinator.handle(CoordinatorEvent::Frontend(FrontendMessage::ChangeBackground));
        assert_eq!(next_relay(&mut receiver), None);
    }

    #[test]
    fn test_frontend_rotate_attaches_diverged_config() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
            [backgroundImage]
            default = "only"
            [backgroundImage.profiles.only]
            path = "/walls/only"
            "#,
        )
        .unwrap();

        let mut coordinator = Coordinator::new(
            ConfigStore::load(config("A")),
            Some(path),
            Box::new(RecordingOpener::default()),
        );
        let mut receiver = window(&mut coordinator);

        // Diverge without relaying, as a host-side write would.
        coordinator.store.apply_patch(config("B").background_image);
        coordinator.on_frontend_requested_rotate();
        assert_eq!(next_relay(&mut receiver), Some(config("B")));

        coordinator.on_frontend_requested_rotate();
        assert_eq!(next_relay(&mut receiver), None);

        coordinator.reload().unwrap();
        let relayed = next_relay(&mut receiver).unwrap();
        assert_eq!(relayed.background_image.default, "only");
    }

    #[test]
    fn test_failed_reload_keeps_config() {
        let temp_dir = tempdir().unwrap();
        let mut coordinator = Coordinator::new(
            ConfigStore::load(config("A")),
            Some(temp_dir.path().join("missing.toml")),
            Box::new(RecordingOpener::default()),
        );
        let mut receiver = window(&mut coordinator);

        match coordinator.handle_command(IpcCommand::Reload) {
            IpcResponse::Error { message } => assert!(message.contains("missing.toml")),
            other => panic!("Expected error, got {:?}", other),
        }
        assert!(receiver.try_recv().is_err());
        assert_eq!(coordinator.status().default_profile, "A");
    }

    #[test]
    fn test_select_profile_checks_exactly_one_entry() {
        let (mut coordinator, _) = coordinator("A");
        let mut receiver = window(&mut coordinator);

        let response = coordinator.handle_command(IpcCommand::SelectProfile { name: "B".to_string() });
        assert!(matches!(response, IpcResponse::Success { .. }));
        assert_eq!(next_relay(&mut receiver), Some(config("B")));

        match coordinator.handle_command(IpcCommand::Menu) {
            IpcResponse::Menu(menu) => {
                let checked: Vec<_> = menu.profiles.iter().filter(|e| e.checked).map(|e| e.name.as_str()).collect();
                assert_eq!(checked, vec!["B"]);
                assert_eq!(menu.profiles.len(), 2);
            }
            other => panic!("Expected menu, got {:?}", other),
        }
    }

    #[test]
    fn test_select_unknown_profile_is_rejected() {
        let (mut coordinator, _) = coordinator("A");
        let mut receiver = window(&mut coordinator);

        let response = coordinator.handle_command(IpcCommand::SelectProfile { name: "Z".to_string() });
        assert!(matches!(response, IpcResponse::Error { .. }));
        assert!(receiver.try_recv().is_err());
        assert_eq!(coordinator.status().default_profile, "A");
    }

    #[test]
    fn test_closed_windows_are_pruned() {
        let (mut coordinator, _) = coordinator("A");
        let mut open = window(&mut coordinator);
        let closed = window(&mut coordinator);
        drop(closed);

        coordinator.next_image();

        assert_eq!(coordinator.window_count(), 1);
        assert_eq!(next_relay(&mut open), None);
    }

    #[test]
    fn test_view_current_image() {
        let (mut coordinator, opener) = coordinator("A");

        assert!(matches!(
            coordinator.handle_command(IpcCommand::ViewCurrentImage),
            IpcResponse::Error { .. }
        ));

        coordinator.handle(CoordinatorEvent::Frontend(FrontendMessage::SetImagePath {
            images: vec![PathBuf::from("/walls/l.jpg"), PathBuf::from("/walls/r.jpg")],
        }));
        assert!(matches!(
            coordinator.handle_command(IpcCommand::ViewCurrentImage),
            IpcResponse::Success { .. }
        ));
        assert_eq!(
            *opener.0.lock().unwrap(),
            vec![PathBuf::from("/walls/l.jpg"), PathBuf::from("/walls/r.jpg")]
        );

        coordinator.handle(CoordinatorEvent::Frontend(FrontendMessage::SetImagePath { images: vec![] }));
        assert!(coordinator.current_images().is_empty());
    }

    #[test]
    fn test_status() {
        let (mut coordinator, _) = coordinator("B");
        let _receiver = window(&mut coordinator);
        coordinator.set_current_images(SelectedImages::single(PathBuf::from("/walls/B/x.jpg")));

        let status = coordinator.status();
        assert_eq!(status.default_profile, "B");
        assert_eq!(status.windows, 1);
        assert_eq!(status.interval_secs, Some(20));
        assert_eq!(status.current_images, vec![Path::new("/walls/B/x.jpg").to_path_buf()]);
    }

    #[tokio::test]
    async fn test_actor_answers_commands() {
        let (coordinator, _) = coordinator("A");
        let (events, receiver) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let actor = tokio::spawn(coordinator.run(receiver));

        let (reply, response) = oneshot::channel();
        events
            .send(CoordinatorEvent::Command { command: IpcCommand::Status, reply })
            .await
            .unwrap();
        match response.await.unwrap() {
            IpcResponse::Status(status) => assert_eq!(status.windows, 0),
            other => panic!("Expected status, got {:?}", other),
        }

        drop(events);
        actor.await.unwrap();
    }
}
