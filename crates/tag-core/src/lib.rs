//! Shared types for the tag session server: session identity, the buff
//! model, and the binary wire protocol spoken with browser clients.

pub mod net;
pub mod player;
pub mod powerup;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::net::messages::PositionUpdateMsg;
    use crate::player::AnimState;
    use crate::powerup::{BuffFlags, SpawnLocation};

    /// A position update at `(x, y)` with no buffs and idle animation.
    pub fn position_update(x: f32, y: f32) -> PositionUpdateMsg {
        PositionUpdateMsg {
            x,
            y,
            is_tagged: false,
            buffs: BuffFlags::default(),
            anim: AnimState::default(),
        }
    }

    /// `n` distinct spawn locations laid out along the x axis.
    pub fn spawn_locations(n: usize) -> Vec<SpawnLocation> {
        (0..n)
            .map(|i| SpawnLocation {
                x: i as f32 * 4.0,
                y: 2.0,
                z: 0.0,
            })
            .collect()
    }
}
