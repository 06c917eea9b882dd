//! Player control surfaces.
//!
//! The agent never discovers or mounts a player itself; the embedder
//! resolves the surfaces once and injects them. Corrections prefer the
//! alternate control surface when it advertises the capability, falling
//! back to the raw media surface on absence or failure. Control failures
//! are logged and swallowed: a partial failure must not leave the agent's
//! state machine stuck.

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
#[error("player control failed: {0}")]
pub struct PlayerError(pub String);

/// The raw media element: readable/drivable position, rate and pause state.
pub trait MediaSurface: Send + Sync {
    fn current_time(&self) -> f64;
    fn set_current_time(&mut self, seconds: f64) -> Result<(), PlayerError>;
    fn paused(&self) -> bool;
    fn play(&mut self) -> Result<(), PlayerError>;
    fn pause(&mut self) -> Result<(), PlayerError>;
    fn playback_rate(&self) -> f64;
    fn set_playback_rate(&mut self, rate: f64) -> Result<(), PlayerError>;
    fn duration(&self) -> f64;
}

/// Optional alternate control surface (e.g. a page-level player API),
/// preferred over the raw surface when it has the capability.
pub trait PlayerControls: Send + Sync {
    fn has_play(&self) -> bool;
    fn has_pause(&self) -> bool;
    fn has_seek(&self) -> bool;
    fn play(&mut self) -> Result<(), PlayerError>;
    fn pause(&mut self) -> Result<(), PlayerError>;
    fn seek(&mut self, seconds: f64) -> Result<(), PlayerError>;
}

/// What the attached player is showing; used to build outbound snapshots
/// and to filter remote events for other media.
#[derive(Debug, Clone, Default)]
pub struct MediaDescriptor {
    pub media_id: String,
    pub locator_url: String,
    pub title: String,
}

/// One attached player: the raw surface, an optional alternate control
/// surface, and the media identity.
pub struct PlayerHandle {
    surface: Box<dyn MediaSurface>,
    controls: Option<Box<dyn PlayerControls>>,
    descriptor: MediaDescriptor,
}

impl PlayerHandle {
    pub fn new(surface: Box<dyn MediaSurface>, descriptor: MediaDescriptor) -> Self {
        Self {
            surface,
            controls: None,
            descriptor,
        }
    }

    pub fn with_controls(mut self, controls: Box<dyn PlayerControls>) -> Self {
        self.controls = Some(controls);
        self
    }

    pub fn descriptor(&self) -> &MediaDescriptor {
        &self.descriptor
    }

    pub fn current_time(&self) -> f64 {
        self.surface.current_time()
    }

    pub fn paused(&self) -> bool {
        self.surface.paused()
    }

    pub fn playback_rate(&self) -> f64 {
        self.surface.playback_rate()
    }

    pub fn duration(&self) -> f64 {
        self.surface.duration()
    }

    pub fn play(&mut self) {
        if let Some(controls) = &mut self.controls
            && controls.has_play()
            && let Err(err) = controls.play()
        {
            warn!(%err, "alternate surface play failed");
        }
        if let Err(err) = self.surface.play() {
            warn!(%err, "player play failed");
        }
    }

    pub fn pause(&mut self) {
        if let Some(controls) = &mut self.controls
            && controls.has_pause()
            && let Err(err) = controls.pause()
        {
            warn!(%err, "alternate surface pause failed");
        }
        if !self.surface.paused()
            && let Err(err) = self.surface.pause()
        {
            warn!(%err, "player pause failed");
        }
    }

    pub fn seek(&mut self, seconds: f64) {
        if !seconds.is_finite() {
            return;
        }
        if let Some(controls) = &mut self.controls
            && controls.has_seek()
        {
            match controls.seek(seconds) {
                Ok(()) => return,
                Err(err) => warn!(%err, "alternate surface seek failed, using raw surface"),
            }
        }
        if let Err(err) = self.surface.set_current_time(seconds) {
            warn!(%err, "player seek failed");
        }
    }

    pub fn set_rate(&mut self, rate: f64) {
        if !rate.is_finite() || rate <= 0.0 {
            return;
        }
        if let Err(err) = self.surface.set_playback_rate(rate) {
            warn!(%err, "player rate change failed");
        }
    }
}

impl std::fmt::Debug for PlayerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerHandle")
            .field("descriptor", &self.descriptor)
            .field("has_controls", &self.controls.is_some())
            .finish()
    }
}
