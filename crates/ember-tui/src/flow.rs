//! Time-driven flash and particle animation.
//!
//! Every visual action on the stage is a [`Sequence`] sampled against the
//! clock: an emit is a 400ms flash at the source followed by a 600ms
//! particle flight when a destination is known, and an accept is a 400ms
//! flash on its own. Nothing is animated with callbacks or timers; the app
//! asks for [`FlowAnimator::frames`] each render and the animator answers
//! from elapsed time, which keeps the whole pipeline deterministic under
//! test.
//!
//! Retiring is centralized: [`FlowAnimator::clear`] bumps an epoch and drops
//! every sequence at once, so a topology teardown cancels in-flight flights
//! and queued emits alike and nothing from the old stage can flash later.

use std::time::{Duration, Instant};

use ember_core::config::EmitOverlap;
use ember_core::topology::{ActorId, Point};

/// Duration of the emit flash at a sequence's source.
pub const EMIT_FLASH: Duration = Duration::from_millis(400);

/// Duration of the particle flight between actors.
pub const TRAVEL: Duration = Duration::from_millis(600);

/// Duration of the accept flash at a destination.
pub const ACCEPT_FLASH: Duration = Duration::from_millis(400);

/// What an actor is asking the animator to play.
#[derive(Debug, Clone, Copy)]
pub enum FlowAction {
    /// Flash in emit color, then fly a particle when a destination is known.
    ///
    /// With no destination only the flash plays; the flight and the far-end
    /// accept are skipped without complaint.
    Emit { dest: Option<(ActorId, Point)> },

    /// Flash in accept color
    Accept,
}

/// A request to animate one actor action.
#[derive(Debug, Clone, Copy)]
pub struct FlowRequest {
    pub actor: ActorId,
    pub origin: Point,
    pub action: FlowAction,
}

/// One drawable element sampled from the active sequences.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlowFrame {
    /// An actor flashing in its emit color
    EmitFlash {
        actor: ActorId,
        at: Point,
        progress: f64,
    },
    /// A particle in flight, colored after its emitting actor
    Particle { source: ActorId, at: Point },
    /// An actor flashing in its accept color
    AcceptFlash {
        actor: ActorId,
        at: Point,
        progress: f64,
    },
}

/// Result of advancing the animation clock.
#[derive(Debug, Default)]
pub struct AdvanceOutcome {
    /// Whether any sequence is still pending or playing
    pub animating: bool,

    /// Actors whose inbound particle just arrived, in retirement order.
    /// The caller chains the accept flash from these.
    pub arrivals: Vec<ActorId>,
}

#[derive(Debug, Clone, Copy)]
enum SequenceKind {
    Emit { dest: Option<(ActorId, Point)> },
    Accept,
}

#[derive(Debug, Clone, Copy)]
struct Sequence {
    actor: ActorId,
    origin: Point,
    kind: SequenceKind,
    start: Instant,
}

impl Sequence {
    fn duration(&self) -> Duration {
        match self.kind {
            SequenceKind::Emit { dest: Some(_) } => EMIT_FLASH + TRAVEL,
            SequenceKind::Emit { dest: None } => EMIT_FLASH,
            SequenceKind::Accept => ACCEPT_FLASH,
        }
    }

    fn end(&self) -> Instant {
        self.start + self.duration()
    }
}

/// Schedules and samples the stage's animation sequences.
pub struct FlowAnimator {
    overlap: EmitOverlap,
    epoch: u64,
    sequences: Vec<Sequence>,
}

impl FlowAnimator {
    pub fn new(overlap: EmitOverlap) -> Self {
        Self {
            overlap,
            epoch: 0,
            sequences: Vec::new(),
        }
    }

    /// Whether nothing is scheduled at all.
    pub fn is_idle(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Number of pending or playing sequences.
    pub fn active_count(&self) -> usize {
        self.sequences.len()
    }

    /// Schedule a request.
    ///
    /// Under [`EmitOverlap::Queued`], an actor's emit starts only after its
    /// latest scheduled emit sequence has fully finished (flash and travel);
    /// everything else starts immediately and plays on top of whatever is
    /// already running.
    pub fn spawn(&mut self, request: FlowRequest, now: Instant) {
        let start = match (self.overlap, request.action) {
            (EmitOverlap::Queued, FlowAction::Emit { .. }) => self
                .sequences
                .iter()
                .filter(|seq| {
                    seq.actor == request.actor && matches!(seq.kind, SequenceKind::Emit { .. })
                })
                .map(Sequence::end)
                .max()
                .map_or(now, |end| end.max(now)),
            _ => now,
        };

        let kind = match request.action {
            FlowAction::Emit { dest } => SequenceKind::Emit { dest },
            FlowAction::Accept => SequenceKind::Accept,
        };

        self.sequences.push(Sequence {
            actor: request.actor,
            origin: request.origin,
            kind,
            start,
        });
    }

    /// Drop finished sequences and report particle arrivals.
    ///
    /// An arrival is reported exactly once, when its sequence retires.
    pub fn advance(&mut self, now: Instant) -> AdvanceOutcome {
        let mut outcome = AdvanceOutcome::default();

        self.sequences.retain(|seq| {
            if now < seq.end() {
                return true;
            }
            if let SequenceKind::Emit {
                dest: Some((dest_actor, _)),
            } = seq.kind
            {
                outcome.arrivals.push(dest_actor);
            }
            false
        });

        outcome.animating = !self.sequences.is_empty();
        outcome
    }

    /// Sample every sequence at `now`.
    ///
    /// A queued sequence whose start lies in the future contributes nothing
    /// yet; a retired phase contributes nothing anymore.
    pub fn frames(&self, now: Instant) -> Vec<FlowFrame> {
        self.sequences
            .iter()
            .filter_map(|seq| {
                let elapsed = now.checked_duration_since(seq.start)?;
                match seq.kind {
                    SequenceKind::Accept => (elapsed < ACCEPT_FLASH).then(|| {
                        FlowFrame::AcceptFlash {
                            actor: seq.actor,
                            at: seq.origin,
                            progress: fraction(elapsed, ACCEPT_FLASH),
                        }
                    }),
                    SequenceKind::Emit { dest } => {
                        if elapsed < EMIT_FLASH {
                            return Some(FlowFrame::EmitFlash {
                                actor: seq.actor,
                                at: seq.origin,
                                progress: fraction(elapsed, EMIT_FLASH),
                            });
                        }
                        let (_, dest_pos) = dest?;
                        let flight = elapsed - EMIT_FLASH;
                        (flight < TRAVEL).then(|| FlowFrame::Particle {
                            source: seq.actor,
                            at: seq.origin.lerp(dest_pos, fraction(flight, TRAVEL)),
                        })
                    }
                }
            })
            .collect()
    }

    /// Retire every sequence, playing or pending.
    ///
    /// Bumps the epoch: nothing scheduled before this call can render,
    /// arrive, or gate a queued emit afterwards.
    pub fn clear(&mut self) {
        self.epoch += 1;
        self.sequences.clear();
    }

    /// Current teardown epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

fn fraction(elapsed: Duration, total: Duration) -> f64 {
    (elapsed.as_secs_f64() / total.as_secs_f64()).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NODE: Point = Point { x: 0.0, y: 150.0 };
    const HUB: Point = Point { x: 0.0, y: 0.0 };

    fn at(t0: Instant, ms: u64) -> Instant {
        t0 + Duration::from_millis(ms)
    }

    fn query_emit() -> FlowRequest {
        FlowRequest {
            actor: ActorId::Node(0),
            origin: NODE,
            action: FlowAction::Emit {
                dest: Some((ActorId::Hub, HUB)),
            },
        }
    }

    fn bare_emit() -> FlowRequest {
        FlowRequest {
            actor: ActorId::Node(0),
            origin: NODE,
            action: FlowAction::Emit { dest: None },
        }
    }

    fn hub_accept() -> FlowRequest {
        FlowRequest {
            actor: ActorId::Hub,
            origin: HUB,
            action: FlowAction::Accept,
        }
    }

    #[test]
    fn test_emit_phase_windows() {
        let t0 = Instant::now();
        let mut animator = FlowAnimator::new(EmitOverlap::Concurrent);
        animator.spawn(query_emit(), t0);

        // Flash from 0 to just under 400ms
        assert!(matches!(
            animator.frames(t0)[..],
            [FlowFrame::EmitFlash { actor: ActorId::Node(0), progress, .. }] if progress == 0.0
        ));
        assert!(matches!(
            animator.frames(at(t0, 399))[..],
            [FlowFrame::EmitFlash { .. }]
        ));

        // Particle from 400ms, starting at the origin
        assert!(matches!(
            animator.frames(at(t0, 400))[..],
            [FlowFrame::Particle { source: ActorId::Node(0), at }] if at == NODE
        ));
        assert!(matches!(
            animator.frames(at(t0, 999))[..],
            [FlowFrame::Particle { .. }]
        ));

        // Done at 1000ms
        assert!(animator.frames(at(t0, 1000)).is_empty());
    }

    #[test]
    fn test_particle_travels_toward_destination() {
        let t0 = Instant::now();
        let mut animator = FlowAnimator::new(EmitOverlap::Concurrent);
        animator.spawn(query_emit(), t0);

        // Halfway through the flight: halfway between node and hub
        let frames = animator.frames(at(t0, 700));
        match frames[..] {
            [FlowFrame::Particle { at, .. }] => {
                assert!((at.x - 0.0).abs() < 1e-9);
                assert!((at.y - 75.0).abs() < 1e-9);
            }
            _ => panic!("expected a particle, got {:?}", frames),
        }
    }

    #[test]
    fn test_emit_without_destination_is_flash_only() {
        let t0 = Instant::now();
        let mut animator = FlowAnimator::new(EmitOverlap::Concurrent);
        animator.spawn(bare_emit(), t0);

        assert!(matches!(
            animator.frames(at(t0, 200))[..],
            [FlowFrame::EmitFlash { .. }]
        ));
        assert!(animator.frames(at(t0, 400)).is_empty());

        // No flight means no arrival to chain an accept from
        let outcome = animator.advance(at(t0, 500));
        assert!(outcome.arrivals.is_empty());
        assert!(!outcome.animating);
        assert!(animator.is_idle());
    }

    #[test]
    fn test_arrival_reported_exactly_once() {
        let t0 = Instant::now();
        let mut animator = FlowAnimator::new(EmitOverlap::Concurrent);
        animator.spawn(query_emit(), t0);

        let before = animator.advance(at(t0, 999));
        assert!(before.arrivals.is_empty());
        assert!(before.animating);

        let arrived = animator.advance(at(t0, 1000));
        assert_eq!(arrived.arrivals, vec![ActorId::Hub]);
        assert!(!arrived.animating);

        let after = animator.advance(at(t0, 1001));
        assert!(after.arrivals.is_empty());
    }

    #[test]
    fn test_accept_flash_window() {
        let t0 = Instant::now();
        let mut animator = FlowAnimator::new(EmitOverlap::Concurrent);
        animator.spawn(hub_accept(), t0);

        assert!(matches!(
            animator.frames(at(t0, 350))[..],
            [FlowFrame::AcceptFlash { actor: ActorId::Hub, .. }]
        ));
        assert!(animator.frames(at(t0, 400)).is_empty());
    }

    #[test]
    fn test_concurrent_emits_overlap() {
        let t0 = Instant::now();
        let mut animator = FlowAnimator::new(EmitOverlap::Concurrent);
        animator.spawn(query_emit(), t0);
        animator.spawn(query_emit(), t0);

        // Both flashes play at once
        let frames = animator.frames(at(t0, 200));
        assert_eq!(frames.len(), 2);
        assert!(
            frames
                .iter()
                .all(|f| matches!(f, FlowFrame::EmitFlash { .. }))
        );
    }

    #[test]
    fn test_queued_emits_serialize_per_actor() {
        let t0 = Instant::now();
        let mut animator = FlowAnimator::new(EmitOverlap::Queued);
        animator.spawn(query_emit(), t0);
        animator.spawn(query_emit(), t0);

        // Second emit waits for the first sequence to finish entirely
        let frames = animator.frames(at(t0, 200));
        assert_eq!(frames.len(), 1);

        // The second flash starts at 1000ms, once the flight has landed
        assert!(matches!(
            animator.frames(at(t0, 1100))[..],
            [FlowFrame::EmitFlash { .. }]
        ));
        assert!(matches!(
            animator.frames(at(t0, 1700))[..],
            [FlowFrame::Particle { .. }]
        ));
    }

    #[test]
    fn test_queued_emit_never_overlaps_predecessor_flight() {
        let t0 = Instant::now();
        let mut animator = FlowAnimator::new(EmitOverlap::Queued);
        animator.spawn(query_emit(), t0);
        animator.spawn(query_emit(), t0);

        // While the first particle is in flight, the queued emit stays
        // silent; only the particle is drawable
        for ms in [400, 600, 999] {
            let frames = animator.frames(at(t0, ms));
            let flashes = frames
                .iter()
                .filter(|f| matches!(f, FlowFrame::EmitFlash { .. }))
                .count();
            assert_eq!(flashes, 0, "at {}ms", ms);
            assert!(
                frames
                    .iter()
                    .any(|f| matches!(f, FlowFrame::Particle { .. })),
                "at {}ms",
                ms
            );
        }
    }

    #[test]
    fn test_queued_chain_of_three() {
        let t0 = Instant::now();
        let mut animator = FlowAnimator::new(EmitOverlap::Queued);
        animator.spawn(query_emit(), t0);
        animator.spawn(query_emit(), t0);
        animator.spawn(query_emit(), t0);

        // Sequence slots at 0, 1000, 2000: one flash at a time
        for ms in [200, 1200, 2200] {
            let flashes = animator
                .frames(at(t0, ms))
                .iter()
                .filter(|f| matches!(f, FlowFrame::EmitFlash { .. }))
                .count();
            assert_eq!(flashes, 1, "at {}ms", ms);
        }
    }

    #[test]
    fn test_queued_does_not_gate_other_actors() {
        let t0 = Instant::now();
        let mut animator = FlowAnimator::new(EmitOverlap::Queued);
        animator.spawn(query_emit(), t0);
        animator.spawn(
            FlowRequest {
                actor: ActorId::Node(1),
                origin: Point::new(150.0, 0.0),
                action: FlowAction::Emit {
                    dest: Some((ActorId::Hub, HUB)),
                },
            },
            t0,
        );

        // Different actors flash together even under the queued policy
        assert_eq!(animator.frames(at(t0, 200)).len(), 2);
    }

    #[test]
    fn test_pending_sequence_keeps_animating() {
        let t0 = Instant::now();
        let mut animator = FlowAnimator::new(EmitOverlap::Queued);
        animator.spawn(bare_emit(), t0);
        animator.spawn(bare_emit(), t0);

        // First flash retired at 400; the queued one is already in its slot
        let outcome = animator.advance(at(t0, 420));
        assert!(outcome.animating);
        assert_eq!(animator.frames(at(t0, 420)).len(), 1);

        // Queued flash plays in its own slot
        assert!(matches!(
            animator.frames(at(t0, 600))[..],
            [FlowFrame::EmitFlash { .. }]
        ));
    }

    #[test]
    fn test_clear_cancels_everything() {
        let t0 = Instant::now();
        let mut animator = FlowAnimator::new(EmitOverlap::Queued);
        animator.spawn(query_emit(), t0);
        animator.spawn(query_emit(), t0);
        let epoch_before = animator.epoch();

        animator.clear();

        assert!(animator.is_idle());
        assert_eq!(animator.epoch(), epoch_before + 1);
        assert!(animator.frames(at(t0, 200)).is_empty());

        // Nothing arrives after a teardown
        let outcome = animator.advance(at(t0, 2000));
        assert!(outcome.arrivals.is_empty());
        assert!(!outcome.animating);
    }

    #[test]
    fn test_spawn_after_clear_starts_fresh() {
        let t0 = Instant::now();
        let mut animator = FlowAnimator::new(EmitOverlap::Queued);
        animator.spawn(query_emit(), t0);
        animator.clear();

        // The retired emit no longer gates the new one
        animator.spawn(query_emit(), at(t0, 100));
        assert!(matches!(
            animator.frames(at(t0, 150))[..],
            [FlowFrame::EmitFlash { .. }]
        ));
    }
}
