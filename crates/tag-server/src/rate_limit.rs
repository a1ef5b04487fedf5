use tokio::time::Instant;

use tag_core::net::messages::MessageType;

use crate::config::LimitsConfig;

/// How an inbound frame is metered, decided from its type byte alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameClass {
    /// Position stream, sent once per client animation frame.
    Movement,
    /// Tag and buff claims plus the spawn location list. Clients send these
    /// once and never retry, so they are never throttled.
    Claim,
    /// Names, pings, and frames whose type byte is unknown or server-only.
    Control,
}

impl FrameClass {
    pub fn of(frame: &[u8]) -> Self {
        match frame.first().copied().and_then(MessageType::from_byte) {
            Some(MessageType::PositionUpdate) => Self::Movement,
            Some(MessageType::TagAttempt | MessageType::BuffCollect | MessageType::SpawnLocations) => {
                Self::Claim
            },
            _ => Self::Control,
        }
    }
}

/// Token bucket: one token per frame, refilled continuously up to `capacity`.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, refill_per_sec: f64) -> Self {
        Self {
            tokens: capacity,
            capacity,
            refill_per_sec,
            last_refill: Instant::now(),
        }
    }

    fn take(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Per-connection inbound limiter. Movement and control frames draw from
/// separate buckets so a saturated position stream cannot starve pings or
/// name changes; claims bypass metering.
#[derive(Debug)]
pub struct InboundLimiter {
    movement: TokenBucket,
    control: TokenBucket,
}

impl InboundLimiter {
    pub fn new(limits: &LimitsConfig) -> Self {
        let movement = limits.ws_position_rate_per_sec;
        let control = limits.ws_control_rate_per_sec;
        Self {
            movement: TokenBucket::new(movement, movement),
            control: TokenBucket::new(control, control),
        }
    }

    /// `Ok` with the frame's class if it may proceed, `Err` if it is dropped.
    pub fn admit(&mut self, frame: &[u8]) -> Result<FrameClass, FrameClass> {
        self.admit_at(frame, Instant::now())
    }

    fn admit_at(&mut self, frame: &[u8], now: Instant) -> Result<FrameClass, FrameClass> {
        let class = FrameClass::of(frame);
        let allowed = match class {
            FrameClass::Claim => true,
            FrameClass::Movement => self.movement.take(now),
            FrameClass::Control => self.control.take(now),
        };
        if allowed { Ok(class) } else { Err(class) }
    }
}
