use std::time::{Duration, Instant};

use rand::Rng;

use tag_core::player::SessionId;
use tag_core::powerup::{Buff, BuffId, BuffKind, SpawnLocation};

use crate::registry::ConnectionRegistry;

/// Why spawn-location registration was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterRejection {
    AlreadyRegistered,
    Empty,
    TooMany { count: usize, max: usize },
}

/// Why a collect claim was ignored. Never sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectRejection {
    /// No buff is active (already collected, or none spawned yet).
    NoActiveBuff,
    /// The claim names a buff that is no longer the active one.
    StaleBuff { active: BuffId },
    UnknownSession,
}

impl std::fmt::Display for CollectRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoActiveBuff => write!(f, "no active buff"),
            Self::StaleBuff { active } => write!(f, "stale buff id (active is {active})"),
            Self::UnknownSession => write!(f, "session is not connected"),
        }
    }
}

/// Result of one spawn timer tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnCycle {
    /// An uncollected buff was discarded to make room.
    pub cleared: bool,
    pub buff: Buff,
}

/// Owns spawn locations and the single active buff.
#[derive(Debug)]
pub struct BuffSpawner {
    locations: Vec<SpawnLocation>,
    max_locations: usize,
    active: Option<Buff>,
    next_buff_id: BuffId,
    buff_duration: Duration,
}

impl BuffSpawner {
    pub fn new(buff_duration: Duration, max_locations: usize) -> Self {
        Self {
            locations: Vec::new(),
            max_locations,
            active: None,
            next_buff_id: 1,
            buff_duration,
        }
    }

    /// Accept the first non-empty location list. Later registrations are
    /// ignored so every client sees buffs at the same places.
    pub fn register_locations(
        &mut self,
        locations: Vec<SpawnLocation>,
    ) -> Result<usize, RegisterRejection> {
        if !self.locations.is_empty() {
            return Err(RegisterRejection::AlreadyRegistered);
        }
        if locations.is_empty() {
            return Err(RegisterRejection::Empty);
        }
        if locations.len() > self.max_locations {
            return Err(RegisterRejection::TooMany {
                count: locations.len(),
                max: self.max_locations,
            });
        }
        self.locations = locations;
        Ok(self.locations.len())
    }

    pub fn active(&self) -> Option<&Buff> {
        self.active.as_ref()
    }

    /// Replace any active buff with a new one at a random location.
    /// Returns `None` while no locations are registered.
    pub fn spawn<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<SpawnCycle> {
        if self.locations.is_empty() {
            return None;
        }

        let cleared = self.active.take().is_some();
        let location = self.locations[rng.random_range(0..self.locations.len())];
        let buff = Buff {
            buff_id: self.next_buff_id,
            kind: BuffKind::random(rng),
            location,
        };
        self.next_buff_id += 1;
        self.active = Some(buff);

        Some(SpawnCycle { cleared, buff })
    }

    /// Award the active buff to `session` if `buff_id` still names it.
    /// The granted kind is the server's, whatever the client claimed.
    pub fn try_collect(
        &mut self,
        registry: &mut ConnectionRegistry,
        session: SessionId,
        buff_id: BuffId,
        now: Instant,
    ) -> Result<Buff, CollectRejection> {
        let Some(active) = self.active else {
            return Err(CollectRejection::NoActiveBuff);
        };
        if active.buff_id != buff_id {
            return Err(CollectRejection::StaleBuff {
                active: active.buff_id,
            });
        }
        let Some(player) = registry.get_mut(session) else {
            return Err(CollectRejection::UnknownSession);
        };

        player.grant_buff(active.kind, now + self.buff_duration);
        self.active = None;
        Ok(active)
    }
}
