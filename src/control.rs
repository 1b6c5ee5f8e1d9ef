//! Effect toggles for gesture and UI collaborators.

use crate::Error;
use cantus_core::{EffectSettings, SharedSettings};
use std::convert::Infallible;
use std::str::FromStr;
use std::sync::Arc;

/// Hand gesture reported by an external classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    OpenPalm,
    Fist,
    Other,
}

impl Gesture {
    /// Map a classifier label ("open palm", "fist", ...). Unknown labels are `Other`.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim().to_ascii_lowercase().replace(['_', '-'], " ");
        match label.as_str() {
            "open palm" | "palm" => Self::OpenPalm,
            "fist" | "closed fist" => Self::Fist,
            _ => Self::Other,
        }
    }

    /// The control event this gesture triggers, if any.
    pub fn event(self) -> Option<ControlEvent> {
        match self {
            Self::OpenPalm => Some(ControlEvent::AutotuneOn),
            Self::Fist => Some(ControlEvent::AutotuneOff),
            Self::Other => None,
        }
    }
}

impl FromStr for Gesture {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_label(s))
    }
}

/// Discrete control request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlEvent {
    AutotuneOn,
    AutotuneOff,
    ToggleAutotune,
    LayeringOn,
    LayeringOff,
    Strength(f32),
    Layers(usize),
}

impl FromStr for ControlEvent {
    type Err = Error;

    /// Parses commands like `autotune on`, `toggle`, `layering off`,
    /// `strength 0.5`, `layers 3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || Error::UnknownCommand(s.trim().to_string());
        let mut words = s.split_whitespace();
        let command = words.next().ok_or_else(unknown)?.to_ascii_lowercase();
        let arg = words.next();
        if words.next().is_some() {
            return Err(unknown());
        }

        match (command.as_str(), arg) {
            ("autotune", Some("on")) => Ok(Self::AutotuneOn),
            ("autotune", Some("off")) => Ok(Self::AutotuneOff),
            ("toggle", None) => Ok(Self::ToggleAutotune),
            ("layering", Some("on")) => Ok(Self::LayeringOn),
            ("layering", Some("off")) => Ok(Self::LayeringOff),
            ("strength", Some(v)) => v.parse().map(Self::Strength).map_err(|_| unknown()),
            ("layers", Some(v)) => v.parse().map(Self::Layers).map_err(|_| unknown()),
            _ => Err(unknown()),
        }
    }
}

/// Cloneable handle over the process-wide effect settings.
///
/// Every method is safe to call from any thread while a stream is running;
/// the processing worker picks changes up at the next block.
#[derive(Clone)]
pub struct ControlSurface {
    settings: Arc<SharedSettings>,
}

impl ControlSurface {
    pub fn new(settings: Arc<SharedSettings>) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> EffectSettings {
        self.settings.snapshot()
    }

    pub fn shared(&self) -> &Arc<SharedSettings> {
        &self.settings
    }

    pub fn set_autotune(&self, enabled: bool) {
        self.update("autotune", |s| s.autotune = enabled);
    }

    pub fn autotune_on(&self) {
        self.set_autotune(true);
    }

    pub fn autotune_off(&self) {
        self.set_autotune(false);
    }

    /// Flip autotune and return the new state.
    pub fn toggle_autotune(&self) -> bool {
        self.update("autotune", |s| s.autotune = !s.autotune).autotune
    }

    pub fn set_layering(&self, enabled: bool) {
        self.update("layering", |s| s.layering = enabled);
    }

    /// Clamped into [0, 1].
    pub fn set_strength(&self, strength: f32) {
        self.update("strength", |s| s.strength = strength);
    }

    pub fn set_layers(&self, layers: usize) {
        self.update("layers", |s| s.layers = layers);
    }

    pub fn apply(&self, event: ControlEvent) {
        match event {
            ControlEvent::AutotuneOn => self.autotune_on(),
            ControlEvent::AutotuneOff => self.autotune_off(),
            ControlEvent::ToggleAutotune => {
                self.toggle_autotune();
            }
            ControlEvent::LayeringOn => self.set_layering(true),
            ControlEvent::LayeringOff => self.set_layering(false),
            ControlEvent::Strength(strength) => self.set_strength(strength),
            ControlEvent::Layers(layers) => self.set_layers(layers),
        }
    }

    /// Open palm turns autotune on, fist turns it off, anything else is ignored.
    pub fn on_gesture(&self, gesture: Gesture) {
        match gesture.event() {
            Some(event) => self.apply(event),
            None => tracing::trace!("Ignoring gesture {:?}", gesture),
        }
    }

    fn update(&self, field: &str, f: impl Fn(&mut EffectSettings)) -> EffectSettings {
        let (previous, current) = self.settings.update(f);
        if previous != current {
            tracing::info!("Effect {} changed: {:?}", field, current);
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface() -> ControlSurface {
        ControlSurface::new(Arc::new(SharedSettings::default()))
    }

    #[test]
    fn test_gesture_labels() {
        assert_eq!(Gesture::from_label("open palm"), Gesture::OpenPalm);
        assert_eq!(Gesture::from_label("  Open_Palm "), Gesture::OpenPalm);
        assert_eq!(Gesture::from_label("fist"), Gesture::Fist);
        assert_eq!(Gesture::from_label("thumbs up"), Gesture::Other);
        assert_eq!("FIST".parse::<Gesture>(), Ok(Gesture::Fist));
    }

    #[test]
    fn test_gestures_drive_autotune() {
        let control = surface();
        control.on_gesture(Gesture::OpenPalm);
        assert!(control.settings().autotune);

        control.on_gesture(Gesture::Other);
        assert!(control.settings().autotune);

        control.on_gesture(Gesture::Fist);
        assert!(!control.settings().autotune);
    }

    #[test]
    fn test_strength_is_clamped() {
        let control = surface();
        control.set_strength(1.7);
        assert_eq!(control.settings().strength, 1.0);
        control.set_strength(-0.2);
        assert_eq!(control.settings().strength, 0.0);
    }

    #[test]
    fn test_toggle() {
        let control = surface();
        assert!(control.toggle_autotune());
        assert!(!control.toggle_autotune());
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!("autotune on".parse::<ControlEvent>().unwrap(), ControlEvent::AutotuneOn);
        assert_eq!("toggle".parse::<ControlEvent>().unwrap(), ControlEvent::ToggleAutotune);
        assert_eq!(
            "strength 0.25".parse::<ControlEvent>().unwrap(),
            ControlEvent::Strength(0.25)
        );
        assert_eq!("layers 3".parse::<ControlEvent>().unwrap(), ControlEvent::Layers(3));
        assert!("layers many".parse::<ControlEvent>().is_err());
        assert!("".parse::<ControlEvent>().is_err());
        assert!("autotune on now".parse::<ControlEvent>().is_err());
    }
}
