use std::time::Instant;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::watch;

use tag_core::net::messages::{
    BuffCollectedMsg, ClientMessage, NameChangedMsg, PositionUpdateMsg, ServerMessage,
    TagAssignedMsg,
};
use tag_core::player::SessionId;
use tag_core::powerup::{Buff, BuffId, BuffKind, SpawnLocation};

use crate::buffs::{BuffSpawner, RegisterRejection};
use crate::config::GameConfig;
use crate::registry::ConnectionRegistry;
use crate::roster::{PlayerSender, RosterBroadcaster};
use crate::tag::{Reassignment, TagNotice, TagStateMachine};

/// Longest display name accepted from `SetName`, in characters.
pub const MAX_DISPLAY_NAME_LEN: usize = 32;

/// Trim a requested display name and check it is fit to show other players.
pub fn normalize_display_name(raw: &str) -> Option<String> {
    let name = raw.trim();
    if name.is_empty()
        || name.chars().count() > MAX_DISPLAY_NAME_LEN
        || name.chars().any(char::is_control)
    {
        return None;
    }
    Some(name.to_string())
}

/// The one authoritative game session. Every connect, disconnect, inbound
/// message and spawn tick goes through here under a single write lock, so
/// each runs to completion before the next starts.
pub struct SessionRelay {
    registry: ConnectionRegistry,
    roster: RosterBroadcaster,
    tag: TagStateMachine,
    buffs: BuffSpawner,
    rng: StdRng,
    /// Flips to `true` once spawn locations are known.
    spawn_ready: watch::Sender<bool>,
}

impl SessionRelay {
    pub fn new(config: &GameConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Build with a caller-supplied RNG, for deterministic tests.
    pub fn with_rng(config: &GameConfig, rng: StdRng) -> Self {
        let (spawn_ready, _rx) = watch::channel(false);
        let mut relay = Self {
            registry: ConnectionRegistry::new(),
            roster: RosterBroadcaster::new(),
            tag: TagStateMachine::new(),
            buffs: BuffSpawner::new(config.buff_duration(), config.max_spawn_locations),
            rng,
            spawn_ready,
        };
        if !config.spawn_locations.is_empty() {
            relay.register_spawn_locations(config.spawn_locations.clone());
        }
        relay
    }

    /// Watch that turns `true` when spawn locations become available.
    pub fn spawn_ready(&self) -> watch::Receiver<bool> {
        self.spawn_ready.subscribe()
    }

    pub fn player_count(&self) -> usize {
        self.registry.len()
    }

    pub fn tag_holder(&self) -> Option<SessionId> {
        self.tag.holder()
    }

    pub fn active_buff(&self) -> Option<&Buff> {
        self.buffs.active()
    }

    /// Admit a new connection and return its session id.
    pub fn connect(&mut self, sender: PlayerSender, now: Instant) -> SessionId {
        let id = SessionId::new();
        self.registry.register(id, &mut self.rng);
        let notice = self.tag.player_connected(&mut self.registry, id);

        self.roster.add(id, sender);
        if let Some(session) = self.registry.get(id) {
            self.roster
                .on_join(&session.snapshot(now), self.registry.snapshot(now));
        }

        match notice {
            TagNotice::Broadcast(holder) => {
                self.roster
                    .broadcast(&ServerMessage::TagAssigned(TagAssignedMsg { session_id: holder }));
            },
            TagNotice::Unicast { to, holder } => {
                self.roster.send_to(
                    to,
                    &ServerMessage::TagAssigned(TagAssignedMsg { session_id: holder }),
                );
            },
        }

        if let Some(buff) = self.buffs.active() {
            self.roster.send_to(id, &ServerMessage::BuffSpawned(*buff));
        }

        tracing::info!(
            session = %id,
            players = self.registry.len(),
            "Player connected"
        );
        id
    }

    /// Tear down a session. Safe to call for an id that is already gone.
    pub fn disconnect(&mut self, id: SessionId) {
        if self.registry.remove(id).is_none() {
            return;
        }
        self.roster.remove(id);

        match self
            .tag
            .player_disconnected(&mut self.registry, id, &mut self.rng)
        {
            Some(Reassignment::Reassigned(next)) => {
                tracing::info!(from = %id, to = %next, "Tag holder left, reassigned");
                self.roster
                    .broadcast(&ServerMessage::TagAssigned(TagAssignedMsg { session_id: next }));
            },
            Some(Reassignment::Unassigned) => {
                tracing::info!(session = %id, "Last player left, tag unassigned");
            },
            None => {},
        }

        self.roster.on_leave(id);
        tracing::info!(
            session = %id,
            players = self.registry.len(),
            "Player disconnected"
        );
    }

    /// Apply one decoded client message from `id`.
    pub fn handle_message(&mut self, id: SessionId, msg: ClientMessage, now: Instant) {
        if !self.registry.contains(id) {
            tracing::debug!(session = %id, "Ignoring message from unknown session");
            return;
        }

        match msg {
            ClientMessage::PositionUpdate(update) => self.handle_position(id, update),
            ClientMessage::TagAttempt(m) => self.handle_tag_attempt(id, m.target, now),
            ClientMessage::BuffCollect(m) => self.handle_buff_collect(id, m.buff_id, m.kind, now),
            ClientMessage::SpawnLocations(m) => {
                self.register_spawn_locations(m.locations);
            },
            ClientMessage::SetName(m) => self.handle_set_name(id, &m.name),
            ClientMessage::Ping(ping) => {
                self.roster.send_to(id, &ServerMessage::Pong(ping));
            },
        }
    }

    /// Run one spawn cycle. Does nothing until locations are registered.
    pub fn spawn_tick(&mut self) {
        let Some(cycle) = self.buffs.spawn(&mut self.rng) else {
            tracing::debug!("Spawn tick skipped, no spawn locations");
            return;
        };
        if cycle.cleared {
            self.roster.broadcast(&ServerMessage::BuffsCleared);
        }
        tracing::debug!(
            buff_id = cycle.buff.buff_id,
            kind = cycle.buff.kind.label(),
            cleared = cycle.cleared,
            "Buff spawned"
        );
        self.roster
            .broadcast(&ServerMessage::BuffSpawned(cycle.buff));
    }

    fn handle_position(&mut self, id: SessionId, update: PositionUpdateMsg) {
        if !self
            .registry
            .update_position(id, update.x, update.y, update.anim)
        {
            return;
        }
        if let Some(session) = self.registry.get(id) {
            self.roster.relay_position(id, session.color, update);
        }
    }

    fn handle_tag_attempt(&mut self, from: SessionId, target: SessionId, now: Instant) {
        match self.tag.try_transfer(&mut self.registry, from, target, now) {
            Ok(holder) => {
                tracing::debug!(from = %from, to = %holder, "Tag transferred");
                self.roster
                    .broadcast(&ServerMessage::TagAssigned(TagAssignedMsg { session_id: holder }));
            },
            Err(reason) => {
                tracing::debug!(from = %from, to = %target, %reason, "Tag attempt rejected");
            },
        }
    }

    fn handle_buff_collect(
        &mut self,
        id: SessionId,
        buff_id: BuffId,
        claimed: BuffKind,
        now: Instant,
    ) {
        match self.buffs.try_collect(&mut self.registry, id, buff_id, now) {
            Ok(buff) => {
                if buff.kind != claimed {
                    tracing::debug!(
                        session = %id,
                        buff_id,
                        claimed = claimed.label(),
                        actual = buff.kind.label(),
                        "Collect claimed wrong kind, granting actual kind"
                    );
                }
                tracing::debug!(session = %id, buff_id, kind = buff.kind.label(), "Buff collected");
                self.roster
                    .broadcast(&ServerMessage::BuffCollected(BuffCollectedMsg {
                        session_id: id,
                        buff_id: buff.buff_id,
                        kind: buff.kind,
                    }));
            },
            Err(reason) => {
                tracing::debug!(session = %id, buff_id, %reason, "Buff collect rejected");
            },
        }
    }

    fn handle_set_name(&mut self, id: SessionId, raw: &str) {
        let Some(name) = normalize_display_name(raw) else {
            tracing::debug!(session = %id, "Rejected invalid display name");
            return;
        };
        if self.registry.set_display_name(id, name.clone()) {
            self.roster
                .broadcast(&ServerMessage::NameChanged(NameChangedMsg {
                    session_id: id,
                    name,
                }));
        }
    }

    fn register_spawn_locations(&mut self, locations: Vec<SpawnLocation>) {
        match self.buffs.register_locations(locations) {
            Ok(count) => {
                tracing::info!(count, "Spawn locations registered, starting buff spawns");
                self.spawn_ready.send_replace(true);
            },
            Err(RegisterRejection::TooMany { count, max }) => {
                tracing::warn!(count, max, "Rejected oversized spawn location list");
            },
            Err(reason) => {
                tracing::debug!(?reason, "Ignoring spawn location registration");
            },
        }
    }
}
