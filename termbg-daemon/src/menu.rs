use termbg_common::{MenuEntry, MenuView, SelectedImages};
use termbg_config::{BackgroundImageConfig, DEFAULT_SWITCH_KEY};

/// Builds the "Background Image" menu from the current configuration. Rebuilt
/// on every request so it always reflects the latest profile list.
pub fn build_menu(background: &BackgroundImageConfig, current: &SelectedImages) -> MenuView {
    let profiles = background
        .profile_names()
        .into_iter()
        .map(|name| MenuEntry {
            name: name.to_string(),
            checked: name == background.default,
        })
        .collect();

    let next_image_accelerator = background
        .active_profile()
        .map(|profile| profile.switch_background_key().to_string())
        .unwrap_or_else(|_| DEFAULT_SWITCH_KEY.to_string());

    MenuView {
        profiles,
        next_image_accelerator,
        can_view_current: !current.is_empty(),
    }
}
