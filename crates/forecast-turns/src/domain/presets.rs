//! Game presets.
//!
//! A preset fixes the hidden world parameters the generator plays against.
//! Only the public face of each preset lives here.

use forecast_core::rng::DeterministicRng;

/// A selectable scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preset {
    /// Stable identifier stored on every snapshot.
    pub id: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Player-facing description.
    pub description: &'static str,
}

/// All known presets.
pub const PRESETS: &[Preset] = &[
    Preset {
        id: "slowTakeoff",
        name: "Slow Takeoff",
        description: "A gradual capability curve with multiple intervention windows. \
                      More forgiving for policy mistakes.",
    },
    Preset {
        id: "fastTakeoff",
        name: "Fast Takeoff",
        description: "Rapid capability gains with narrow intervention windows. \
                      Requires quick, decisive action.",
    },
];

/// Looks up a preset by id.
#[must_use]
pub fn find_preset(id: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|preset| preset.id == id)
}

/// Picks a preset uniformly at random.
#[allow(clippy::cast_possible_truncation)]
pub fn random_preset(rng: &mut dyn DeterministicRng) -> &'static Preset {
    let max = (PRESETS.len() - 1) as u32;
    let index = rng.next_u32_range(0, max) as usize;
    &PRESETS[index.min(PRESETS.len() - 1)]
}
