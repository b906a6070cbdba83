//! The per-process canonical configuration.
//!
//! Writes to the `backgroundImage` subtree go through the setters here, and
//! an observable store runs its hook once for each of them. Nothing else
//! notifies: host settings and wholesale replacements relayed from the
//! other process stay silent.

use serde_json::Value;
use termbg_common::{Result, TermbgError, error::ConfigError};
use crate::{BackgroundImageConfig, Config, Profile};

type ChangeHook = Box<dyn FnMut(&Config) + Send>;

pub struct ConfigStore {
    config: Config,
    on_background_change: Option<ChangeHook>,
}

impl ConfigStore {
    /// CONFIG_LOAD.
    pub fn load(config: Config) -> Self {
        Self {
            config,
            on_background_change: None,
        }
    }

    /// Runs `hook` after every `backgroundImage` write made through this store.
    pub fn observe<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&Config) + Send + 'static,
    {
        self.on_background_change = Some(Box::new(hook));
        self
    }

    pub fn is_observed(&self) -> bool {
        self.on_background_change.is_some()
    }

    pub fn get(&self) -> &Config {
        &self.config
    }

    pub fn background(&self) -> &BackgroundImageConfig {
        &self.config.background_image
    }

    pub fn active_profile(&self) -> Result<&Profile> {
        self.config.background_image.active_profile()
    }

    /// CONFIG_RELOAD: host settings are taken as-is, the background subtree
    /// is applied as one observed write.
    pub fn reload(&mut self, config: Config) {
        let Config { background_image, host } = config;
        self.config.host = host;
        self.apply_patch(background_image);
    }

    pub fn apply_patch(&mut self, background: BackgroundImageConfig) {
        self.config.background_image = background;
        self.notify();
    }

    pub fn set_default_profile(&mut self, name: &str) -> Result<()> {
        if !self.config.background_image.profiles.contains_key(name) {
            return Err(TermbgError::Config(ConfigError::UnknownProfile {
                name: name.to_string(),
            }));
        }
        let mut background = self.config.background_image.clone();
        background.default = name.to_string();
        self.apply_patch(background);
        Ok(())
    }

    /// Takes a snapshot relayed from the other process. Never notifies.
    pub fn replace(&mut self, config: Config) {
        self.config = config;
    }

    pub fn set_host_setting(&mut self, key: &str, value: Value) {
        self.config.host.insert(key.to_string(), value);
    }

    fn notify(&mut self) {
        if let Some(hook) = self.on_background_change.as_mut() {
            hook(&self.config);
        }
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("config", &self.config)
            .field("observed", &self.is_observed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn two_profiles(default: &str) -> Config {
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

    fn observed(config: Config) -> (ConfigStore, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let store = ConfigStore::load(config).observe(move |c| {
            sink.lock().unwrap().push(c.background_image.default.clone());
        });
        (store, seen)
    }

    #[test]
    fn test_load_does_not_notify() {
        let (store, seen) = observed(two_profiles("A"));
        assert!(store.is_observed());
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(store.active_profile().unwrap().path.as_deref(), Some("/walls/A"));
    }

    #[test]
    fn test_reload_notifies_exactly_once() {
        let (mut store, seen) = observed(two_profiles("A"));

        let mut reloaded = two_profiles("B");
        reloaded.host.insert("fontSize".to_string(), json!(14));
        store.reload(reloaded);

        assert_eq!(*seen.lock().unwrap(), vec!["B".to_string()]);
        assert_eq!(store.active_profile().unwrap().path.as_deref(), Some("/walls/B"));
        assert_eq!(store.get().host.get("fontSize"), Some(&json!(14)));
    }

    #[test]
    fn test_host_writes_and_replace_are_silent() {
        let (mut store, seen) = observed(two_profiles("A"));

        store.set_host_setting("cursorColor", json!("red"));
        store.replace(two_profiles("B"));

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(store.background().default, "B");
    }

    #[test]
    fn test_set_default_profile() {
        let (mut store, seen) = observed(two_profiles("A"));

        store.set_default_profile("B").unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["B".to_string()]);

        let err = store.set_default_profile("C").unwrap_err();
        assert!(matches!(err, TermbgError::Config(ConfigError::UnknownProfile { .. })));
        assert_eq!(store.background().default, "B");
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_unobserved_store_accepts_writes() {
        let mut store = ConfigStore::load(two_profiles("A"));
        store.set_default_profile("B").unwrap();
        assert!(!store.is_observed());
        assert_eq!(store.background().default, "B");
    }
}
