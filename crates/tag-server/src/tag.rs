use std::time::Instant;

use rand::Rng;

use tag_core::player::SessionId;
use tag_core::powerup::BuffKind;

use crate::registry::ConnectionRegistry;

/// Who is "it".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TagState {
    #[default]
    Unassigned,
    Assigned(SessionId),
}

/// What the relay must tell clients after a player connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagNotice {
    /// The new player became "it"; tell everyone.
    Broadcast(SessionId),
    /// Someone else is already "it"; tell only the new player.
    Unicast { to: SessionId, holder: SessionId },
}

/// Outcome of the tag holder disconnecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reassignment {
    Reassigned(SessionId),
    Unassigned,
}

/// Why a tag attempt was ignored. Never sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagRejection {
    /// The sender is not the current holder (stale or duplicate claim).
    NotHolder,
    UnknownTarget,
    SelfTarget,
    Shielded,
}

impl std::fmt::Display for TagRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotHolder => write!(f, "sender is not tagged"),
            Self::UnknownTarget => write!(f, "target is not connected"),
            Self::SelfTarget => write!(f, "sender targeted itself"),
            Self::Shielded => write!(f, "target has an active shield"),
        }
    }
}

/// Owns the single-holder invariant: whenever the registry is non-empty,
/// exactly one session has `is_tagged` set and it matches `state`.
#[derive(Debug, Default)]
pub struct TagStateMachine {
    state: TagState,
}

impl TagStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TagState {
        self.state
    }

    pub fn holder(&self) -> Option<SessionId> {
        match self.state {
            TagState::Assigned(id) => Some(id),
            TagState::Unassigned => None,
        }
    }

    /// Call after `id` is registered.
    pub fn player_connected(&mut self, registry: &mut ConnectionRegistry, id: SessionId) -> TagNotice {
        match self.state {
            TagState::Assigned(holder) if registry.contains(holder) => TagNotice::Unicast {
                to: id,
                holder,
            },
            _ => {
                self.assign(registry, id);
                TagNotice::Broadcast(id)
            },
        }
    }

    /// Transfer the tag from `from` to `to` if `from` holds it and `to` is a
    /// live, unshielded session.
    pub fn try_transfer(
        &mut self,
        registry: &mut ConnectionRegistry,
        from: SessionId,
        to: SessionId,
        now: Instant,
    ) -> Result<SessionId, TagRejection> {
        if self.state != TagState::Assigned(from) {
            return Err(TagRejection::NotHolder);
        }
        if from == to {
            return Err(TagRejection::SelfTarget);
        }
        let Some(target) = registry.get(to) else {
            return Err(TagRejection::UnknownTarget);
        };
        if target.has_buff(BuffKind::Shield, now) {
            return Err(TagRejection::Shielded);
        }

        self.assign(registry, to);
        Ok(to)
    }

    /// Call after `id` has been removed from the registry. Returns `None`
    /// when the departing player was not "it".
    pub fn player_disconnected<R: Rng + ?Sized>(
        &mut self,
        registry: &mut ConnectionRegistry,
        id: SessionId,
        rng: &mut R,
    ) -> Option<Reassignment> {
        if self.state != TagState::Assigned(id) {
            return None;
        }

        let remaining = registry.ids();
        if remaining.is_empty() {
            self.state = TagState::Unassigned;
            return Some(Reassignment::Unassigned);
        }

        let next = remaining[rng.random_range(0..remaining.len())];
        self.assign(registry, next);
        Some(Reassignment::Reassigned(next))
    }

    fn assign(&mut self, registry: &mut ConnectionRegistry, id: SessionId) {
        if let TagState::Assigned(prev) = self.state
            && let Some(session) = registry.get_mut(prev)
        {
            session.is_tagged = false;
        }
        if let Some(session) = registry.get_mut(id) {
            session.is_tagged = true;
        }
        self.state = TagState::Assigned(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::time::Duration;

    struct Fixture {
        registry: ConnectionRegistry,
        tag: TagStateMachine,
        rng: StdRng,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                registry: ConnectionRegistry::new(),
                tag: TagStateMachine::new(),
                rng: StdRng::seed_from_u64(1),
            }
        }

        fn connect(&mut self) -> (SessionId, TagNotice) {
            let id = SessionId::new();
            self.registry.register(id, &mut self.rng);
            let notice = self.tag.player_connected(&mut self.registry, id);
            (id, notice)
        }

        fn disconnect(&mut self, id: SessionId) -> Option<Reassignment> {
            self.registry.remove(id);
            self.tag
                .player_disconnected(&mut self.registry, id, &mut self.rng)
        }

        fn assert_invariant(&self) {
            let tagged = self.registry.tagged_count();
            if self.registry.is_empty() {
                assert_eq!(tagged, 0);
                assert_eq!(self.tag.state(), TagState::Unassigned);
            } else {
                assert_eq!(tagged, 1, "exactly one tagged session");
                let holder = self.tag.holder().unwrap();
                assert!(self.registry.get(holder).unwrap().is_tagged());
            }
        }
    }

    #[test]
    fn first_player_becomes_it() {
        let mut f = Fixture::new();
        let (a, notice) = f.connect();
        assert_eq!(notice, TagNotice::Broadcast(a));
        assert_eq!(f.tag.state(), TagState::Assigned(a));
        f.assert_invariant();
    }

    #[test]
    fn later_player_learns_holder_by_unicast() {
        let mut f = Fixture::new();
        let (a, _) = f.connect();
        let (b, notice) = f.connect();
        assert_eq!(notice, TagNotice::Unicast { to: b, holder: a });
        assert_eq!(f.tag.holder(), Some(a));
        assert!(!f.registry.get(b).unwrap().is_tagged());
        f.assert_invariant();
    }

    #[test]
    fn holder_can_transfer() {
        let mut f = Fixture::new();
        let (a, _) = f.connect();
        let (b, _) = f.connect();
        let now = Instant::now();

        assert_eq!(f.tag.try_transfer(&mut f.registry, a, b, now), Ok(b));
        assert_eq!(f.tag.holder(), Some(b));
        assert!(!f.registry.get(a).unwrap().is_tagged());
        f.assert_invariant();
    }

    #[test]
    fn non_holder_cannot_transfer() {
        let mut f = Fixture::new();
        let (a, _) = f.connect();
        let (b, _) = f.connect();
        let (c, _) = f.connect();

        let result = f.tag.try_transfer(&mut f.registry, b, c, Instant::now());
        assert_eq!(result, Err(TagRejection::NotHolder));
        assert_eq!(f.tag.holder(), Some(a));
        f.assert_invariant();
    }

    #[test]
    fn simultaneous_claims_only_first_wins() {
        let mut f = Fixture::new();
        let (a, _) = f.connect();
        let (b, _) = f.connect();
        let (c, _) = f.connect();
        let now = Instant::now();

        assert_eq!(f.tag.try_transfer(&mut f.registry, a, b, now), Ok(b));
        // Second claim from A arrives after the state moved on
        assert_eq!(
            f.tag.try_transfer(&mut f.registry, a, c, now),
            Err(TagRejection::NotHolder)
        );
        assert_eq!(f.tag.holder(), Some(b));
        f.assert_invariant();
    }

    #[test]
    fn duplicate_claim_is_noop() {
        let mut f = Fixture::new();
        let (a, _) = f.connect();
        let (b, _) = f.connect();
        let now = Instant::now();

        assert!(f.tag.try_transfer(&mut f.registry, a, b, now).is_ok());
        assert!(f.tag.try_transfer(&mut f.registry, a, b, now).is_err());
        assert_eq!(f.tag.holder(), Some(b));
    }

    #[test]
    fn unknown_and_self_targets_rejected() {
        let mut f = Fixture::new();
        let (a, _) = f.connect();
        let now = Instant::now();

        assert_eq!(
            f.tag.try_transfer(&mut f.registry, a, SessionId::new(), now),
            Err(TagRejection::UnknownTarget)
        );
        assert_eq!(
            f.tag.try_transfer(&mut f.registry, a, a, now),
            Err(TagRejection::SelfTarget)
        );
        assert_eq!(f.tag.holder(), Some(a));
        f.assert_invariant();
    }

    #[test]
    fn shield_blocks_until_expiry() {
        let mut f = Fixture::new();
        let (a, _) = f.connect();
        let (b, _) = f.connect();
        let now = Instant::now();
        let expires = now + Duration::from_millis(5000);
        f.registry
            .get_mut(b)
            .unwrap()
            .grant_buff(BuffKind::Shield, expires);

        assert_eq!(
            f.tag.try_transfer(&mut f.registry, a, b, now),
            Err(TagRejection::Shielded)
        );
        assert_eq!(
            f.tag.try_transfer(&mut f.registry, a, b, expires),
            Err(TagRejection::Shielded)
        );
        assert_eq!(f.tag.holder(), Some(a));

        let later = expires + Duration::from_millis(1);
        assert_eq!(f.tag.try_transfer(&mut f.registry, a, b, later), Ok(b));
        f.assert_invariant();
    }

    #[test]
    fn other_buffs_do_not_block_tag() {
        let mut f = Fixture::new();
        let (a, _) = f.connect();
        let (b, _) = f.connect();
        let now = Instant::now();
        let s = f.registry.get_mut(b).unwrap();
        s.grant_buff(BuffKind::Speed, now + Duration::from_secs(5));
        s.grant_buff(BuffKind::Jump, now + Duration::from_secs(5));

        assert_eq!(f.tag.try_transfer(&mut f.registry, a, b, now), Ok(b));
    }

    #[test]
    fn holder_disconnect_reassigns_to_remaining_player() {
        let mut f = Fixture::new();
        let (a, _) = f.connect();
        let (b, _) = f.connect();
        let (c, _) = f.connect();

        let result = f.disconnect(a);
        match result {
            Some(Reassignment::Reassigned(next)) => assert!(next == b || next == c),
            other => panic!("Expected reassignment, got: {other:?}"),
        }
        f.assert_invariant();
    }

    #[test]
    fn last_player_disconnect_unassigns() {
        let mut f = Fixture::new();
        let (a, _) = f.connect();
        assert_eq!(f.disconnect(a), Some(Reassignment::Unassigned));
        assert_eq!(f.tag.state(), TagState::Unassigned);
        f.assert_invariant();

        // Next connection starts a fresh game
        let (b, notice) = f.connect();
        assert_eq!(notice, TagNotice::Broadcast(b));
        f.assert_invariant();
    }

    #[test]
    fn non_holder_disconnect_keeps_state() {
        let mut f = Fixture::new();
        let (a, _) = f.connect();
        let (b, _) = f.connect();
        assert_eq!(f.disconnect(b), None);
        assert_eq!(f.tag.holder(), Some(a));
        f.assert_invariant();
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Connect,
            Disconnect(usize),
            Tag(usize, usize),
            Shield(usize),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                Just(Op::Connect),
                any::<usize>().prop_map(Op::Disconnect),
                (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Tag(a, b)),
                any::<usize>().prop_map(Op::Shield),
            ]
        }

        proptest! {
            #[test]
            fn exactly_one_holder_while_anyone_is_connected(
                ops in proptest::collection::vec(op(), 1..200),
            ) {
                let mut f = Fixture::new();
                let mut live: Vec<SessionId> = Vec::new();
                let now = Instant::now();

                for op in ops {
                    match op {
                        Op::Connect => live.push(f.connect().0),
                        Op::Disconnect(i) if !live.is_empty() => {
                            let id = live.swap_remove(i % live.len());
                            f.disconnect(id);
                        },
                        Op::Tag(a, b) if !live.is_empty() => {
                            let from = live[a % live.len()];
                            let to = live[b % live.len()];
                            let _ = f.tag.try_transfer(&mut f.registry, from, to, now);
                        },
                        Op::Shield(i) if !live.is_empty() => {
                            let id = live[i % live.len()];
                            if let Some(s) = f.registry.get_mut(id) {
                                s.grant_buff(BuffKind::Shield, now + Duration::from_secs(5));
                            }
                        },
                        _ => {},
                    }
                    f.assert_invariant();
                }
            }
        }
    }
}
