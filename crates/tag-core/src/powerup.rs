use rand::Rng;
use serde::{Deserialize, Serialize};

/// Server-assigned buff identifier. Monotonic for the process lifetime.
pub type BuffId = u64;

/// Buff kinds that can spawn on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BuffKind {
    Speed,
    Jump,
    Shield,
}

impl BuffKind {
    pub const ALL: [BuffKind; 3] = [BuffKind::Speed, BuffKind::Jump, BuffKind::Shield];

    /// Pick a kind uniformly at random.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }

    pub fn label(self) -> &'static str {
        match self {
            BuffKind::Speed => "speed",
            BuffKind::Jump => "jump",
            BuffKind::Shield => "shield",
        }
    }
}

/// Map coordinate where a buff may appear.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnLocation {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

/// A live buff waiting to be collected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Buff {
    pub buff_id: BuffId,
    pub kind: BuffKind,
    pub location: SpawnLocation,
}

/// Which buff kinds a player currently holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuffFlags {
    pub speed: bool,
    pub jump: bool,
    pub shield: bool,
}

impl BuffFlags {
    pub fn set(&mut self, kind: BuffKind) {
        match kind {
            BuffKind::Speed => self.speed = true,
            BuffKind::Jump => self.jump = true,
            BuffKind::Shield => self.shield = true,
        }
    }

    pub fn has(&self, kind: BuffKind) -> bool {
        match kind {
            BuffKind::Speed => self.speed,
            BuffKind::Jump => self.jump,
            BuffKind::Shield => self.shield,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn random_kind_covers_all_variants() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = BuffFlags::default();
        for _ in 0..200 {
            seen.set(BuffKind::random(&mut rng));
        }
        assert_eq!(
            seen,
            BuffFlags {
                speed: true,
                jump: true,
                shield: true
            }
        );
    }

    #[test]
    fn flags_track_kinds_independently() {
        let mut flags = BuffFlags::default();
        flags.set(BuffKind::Shield);
        assert!(flags.has(BuffKind::Shield));
        assert!(!flags.has(BuffKind::Speed));
        assert!(!flags.has(BuffKind::Jump));
    }
}
