//! Character pack resolution
//!
//! `default` is the bundled character. `custom` takes per-slot PNG files from
//! the custom sprite directory. Any other id names a directory under the packs
//! directory containing a `pack.json` manifest.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

use super::sprite::SpriteSheet;
use super::{builtin, Animation, AnimationSet};
use crate::config::settings::{CustomPackSlots, Settings};
use crate::constants::{animation, limits, paths};

pub const DEFAULT_PACK: &str = "default";
pub const CUSTOM_PACK: &str = "custom";

/// Custom slot names and the state each one feeds
pub const CUSTOM_SLOTS: [(&str, &str); 4] = [
    ("idle", animation::IDLE),
    ("hitLeft", animation::LEFT),
    ("hitRight", animation::RIGHT),
    ("hitBoth", animation::BOTH),
];

const STATES: [&str; 5] = [
    animation::IDLE,
    animation::LEFT,
    animation::RIGHT,
    animation::BOTH,
    animation::HIT,
];

/// Where custom sprites and installed packs live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackPaths {
    pub custom: PathBuf,
    pub packs: PathBuf,
}

impl PackPaths {
    pub fn under(root: &Path) -> Self {
        Self {
            custom: root.join(paths::CUSTOM_DIR),
            packs: root.join(paths::PACKS_DIR),
        }
    }

    /// `<data_dir>/keypet`
    pub fn from_data_dir() -> Self {
        let root = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(paths::APP_DIR);
        Self::under(&root)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PackManifest {
    #[serde(default)]
    pub name: Option<String>,
    pub animations: BTreeMap<String, ManifestAnimation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestAnimation {
    pub file: String,
    #[serde(default)]
    pub frames: Option<u32>,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default, rename = "loop")]
    pub looping: Option<bool>,
}

/// Slice of settings that decides which sprites are loaded
#[derive(Debug, Clone, PartialEq)]
pub struct PackSelection {
    pub id: String,
    pub custom: CustomPackSlots,
}

impl PackSelection {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            id: settings.active_character_pack_id.clone(),
            custom: settings.character_packs.custom.clone(),
        }
    }
}

fn bundled(set: &mut AnimationSet, state: &str, settings: &Settings) {
    if let Some(Ok(sheet)) = builtin::sprite(state) {
        set.insert(state, Animation::for_state(state, sheet, &settings.animation));
    }
}

/// Load a slot, falling back to the bundled sprite when it fails
fn load_or_bundled(set: &mut AnimationSet, state: &str, settings: &Settings, loaded: Result<Animation>) {
    match loaded {
        Ok(animation) => set.insert(state, animation),
        Err(e) => {
            warn!(state, error = ?e, "Sprite unavailable, using bundled fallback");
            set.mark_unavailable(state);
            bundled(set, state, settings);
        }
    }
}

fn load_custom(settings: &Settings, paths: &PackPaths) -> AnimationSet {
    let mut set = AnimationSet::new();
    let slots = &settings.character_packs.custom;

    for (slot, state) in CUSTOM_SLOTS {
        let file = match slot {
            "idle" => &slots.idle,
            "hitLeft" => &slots.hit_left,
            "hitRight" => &slots.hit_right,
            _ => &slots.hit_both,
        };
        match file {
            Some(file) => {
                let loaded = SpriteSheet::load(&paths.custom.join(file), None)
                    .map(|sheet| Animation::for_state(state, sheet, &settings.animation));
                load_or_bundled(&mut set, state, settings, loaded);
            }
            None => bundled(&mut set, state, settings),
        }
    }
    bundled(&mut set, animation::HIT, settings);
    set
}

fn read_manifest(dir: &Path) -> Result<PackManifest> {
    let path = dir.join(paths::PACK_MANIFEST);
    let contents = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

fn load_manifest_pack(id: &str, settings: &Settings, paths: &PackPaths) -> Result<AnimationSet> {
    let dir = paths.packs.join(id);
    let manifest = read_manifest(&dir)?;
    info!(pack = id, name = ?manifest.name, "Loading character pack");

    let mut set = AnimationSet::new();
    for (state, entry) in &manifest.animations {
        let loaded = SpriteSheet::load(&dir.join(&entry.file), entry.frames).map(|sheet| {
            let mut animation = Animation::for_state(state, sheet, &settings.animation);
            if let Some(fps) = entry.fps {
                let clamped = fps.clamp(limits::FPS_MIN, limits::FPS_MAX);
                if clamped != fps {
                    warn!(state = %state, fps, clamped, "Pack fps out of range");
                }
                animation.fps = clamped;
                animation.fixed_fps = true;
            }
            if let Some(looping) = entry.looping {
                animation.looping = looping;
            }
            animation
        });
        load_or_bundled(&mut set, state, settings, loaded);
    }

    // Directional states a pack leaves out fall back to its `hit`
    for state in [animation::IDLE, animation::HIT] {
        if !set.contains(state) {
            bundled(&mut set, state, settings);
        }
    }
    if !set.unavailable().is_empty() {
        warn!(pack = id, fallbacks = ?set.unavailable(), "Character pack loaded with bundled fallbacks");
    }
    Ok(set)
}

/// Animations for the active character pack.
///
/// Fails only when a named pack's manifest cannot be read; the display then
/// shows an error placeholder.
pub fn load_pack(settings: &Settings, paths: &PackPaths) -> Result<AnimationSet> {
    match settings.active_character_pack_id.as_str() {
        DEFAULT_PACK => {
            let mut set = AnimationSet::new();
            for state in STATES {
                bundled(&mut set, state, settings);
            }
            Ok(set)
        }
        CUSTOM_PACK => Ok(load_custom(settings, paths)),
        id => load_manifest_pack(id, settings, paths).with_context(|| format!("Character pack '{}' unavailable", id)),
    }
}

/// Ids of installed packs, including the built-in ones
pub fn list_packs(paths: &PackPaths) -> Vec<String> {
    let mut packs = vec![DEFAULT_PACK.to_string(), CUSTOM_PACK.to_string()];
    if let Ok(entries) = fs::read_dir(&paths.packs) {
        let mut installed: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().join(paths::PACK_MANIFEST).is_file())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .collect();
        installed.sort();
        packs.extend(installed);
    }
    packs
}

/// Copy a PNG into the custom sprite directory.
///
/// Returns the stored file name, to be saved as `characterPacks.custom.<slot>`.
pub fn import_custom_sprite(slot: &str, source: &Path, paths: &PackPaths) -> Result<String> {
    if !CUSTOM_SLOTS.iter().any(|(name, _)| *name == slot) {
        anyhow::bail!("Unknown custom sprite slot '{}'", slot);
    }
    // Reject files the display would not be able to decode
    SpriteSheet::load(source, None)?;

    fs::create_dir_all(&paths.custom)
        .with_context(|| format!("Failed to create custom sprite directory: {}", paths.custom.display()))?;

    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let file_name = format!("{}-{}.png", slot, stamp);
    let target = paths.custom.join(&file_name);
    fs::copy(source, &target)
        .with_context(|| format!("Failed to copy {} to {}", source.display(), target.display()))?;

    info!(slot, file = %file_name, "Imported custom sprite");
    Ok(file_name)
}
