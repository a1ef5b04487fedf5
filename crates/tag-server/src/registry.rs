use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use rand::Rng;

use tag_core::player::{AnimState, PlayerColor, PlayerSnapshot, SessionId};
use tag_core::powerup::{BuffFlags, BuffKind};

pub const DEFAULT_DISPLAY_NAME: &str = "Player";

/// Server-side record for one connected client.
#[derive(Debug, Clone)]
pub struct PlayerSession {
    pub id: SessionId,
    pub display_name: String,
    pub color: PlayerColor,
    pub x: f32,
    pub y: f32,
    pub anim: AnimState,
    /// Only the tag state machine writes this.
    pub(crate) is_tagged: bool,
    /// Buff kind -> expiry. One entry per kind; re-collecting refreshes it.
    active_buffs: HashMap<BuffKind, Instant>,
}

impl PlayerSession {
    fn new(id: SessionId, color: PlayerColor) -> Self {
        Self {
            id,
            display_name: DEFAULT_DISPLAY_NAME.to_string(),
            color,
            x: 0.0,
            y: 0.0,
            anim: AnimState::default(),
            is_tagged: false,
            active_buffs: HashMap::new(),
        }
    }

    pub fn is_tagged(&self) -> bool {
        self.is_tagged
    }

    /// Grant `kind` until `expires_at`, replacing any earlier expiry.
    pub fn grant_buff(&mut self, kind: BuffKind, expires_at: Instant) {
        self.active_buffs.insert(kind, expires_at);
    }

    /// Expiry is checked lazily: a buff counts until `now` passes it.
    pub fn has_buff(&self, kind: BuffKind, now: Instant) -> bool {
        self.active_buffs
            .get(&kind)
            .is_some_and(|&expires_at| now <= expires_at)
    }

    pub fn buff_expiry(&self, kind: BuffKind) -> Option<Instant> {
        self.active_buffs.get(&kind).copied()
    }

    pub fn active_buffs(&self, now: Instant) -> BuffFlags {
        let mut flags = BuffFlags::default();
        for kind in BuffKind::ALL {
            if self.has_buff(kind, now) {
                flags.set(kind);
            }
        }
        flags
    }

    pub fn snapshot(&self, now: Instant) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id,
            name: self.display_name.clone(),
            color: self.color,
            x: self.x,
            y: self.y,
            is_tagged: self.is_tagged,
            anim: self.anim,
            buffs: self.active_buffs(now),
        }
    }
}

/// Authoritative map of live sessions. Pure in-memory state, no I/O.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: BTreeMap<SessionId, PlayerSession>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the record for a new connection with a palette color and the
    /// default position.
    pub fn register<R: Rng + ?Sized>(&mut self, id: SessionId, rng: &mut R) -> &PlayerSession {
        let palette = PlayerColor::PALETTE;
        let color = palette[rng.random_range(0..palette.len())];
        self.sessions
            .entry(id)
            .or_insert_with(|| PlayerSession::new(id, color))
    }

    pub fn get(&self, id: SessionId) -> Option<&PlayerSession> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut PlayerSession> {
        self.sessions.get_mut(&id)
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Record the latest reported position. Late updates for a session that
    /// already left are ignored.
    pub fn update_position(&mut self, id: SessionId, x: f32, y: f32, anim: AnimState) -> bool {
        let Some(session) = self.sessions.get_mut(&id) else {
            return false;
        };
        session.x = x;
        session.y = y;
        session.anim = anim;
        true
    }

    pub fn set_display_name(&mut self, id: SessionId, name: String) -> bool {
        let Some(session) = self.sessions.get_mut(&id) else {
            return false;
        };
        session.display_name = name;
        true
    }

    pub fn remove(&mut self, id: SessionId) -> Option<PlayerSession> {
        self.sessions.remove(&id)
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.keys().copied().collect()
    }

    pub fn snapshot(&self, now: Instant) -> Vec<PlayerSnapshot> {
        self.sessions.values().map(|s| s.snapshot(now)).collect()
    }

    pub fn tagged_count(&self) -> usize {
        self.sessions.values().filter(|s| s.is_tagged).count()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
