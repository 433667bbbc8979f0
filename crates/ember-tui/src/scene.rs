//! The stage model: actor registry, event dispatch, and animation chaining.
//!
//! A [`Scene`] owns the current topology, a registry resolving agent ids to
//! drawable [`ActorHandle`]s, and the animator. Decoded log records come in
//! through [`Scene::dispatch`]; records that cannot be resolved to a known
//! agent and event kind are dropped without fuss, because the tailed log
//! carries plenty of entries the stage has no business animating.
//!
//! Accept flashes are chained from particle arrivals in [`Scene::tick`], so
//! a teardown between launch and landing cancels the whole flight including
//! the far end's flash.

use std::collections::HashMap;
use std::time::Instant;

use rand::Rng;
use tracing::{debug, trace};

use ember_core::config::EmitOverlap;
use ember_core::topology::{ActorId, Point, Topology};
use ember_core::types::{EventKind, LogRecord};

use crate::flow::{FlowAction, FlowAnimator, FlowFrame, FlowRequest};

/// A drawable actor resolved from the registry.
#[derive(Debug, Clone, Copy)]
pub struct ActorHandle {
    id: ActorId,
    position: Point,
}

impl ActorHandle {
    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn position(&self) -> Point {
        self.position
    }

    /// Request an emit flash here, flying a particle toward `dest` when the
    /// counterpart's position is known.
    pub fn emit(&self, dest: Option<(ActorId, Point)>) -> FlowRequest {
        FlowRequest {
            actor: self.id,
            origin: self.position,
            action: FlowAction::Emit { dest },
        }
    }

    /// Request an accept flash here.
    pub fn accept(&self) -> FlowRequest {
        FlowRequest {
            actor: self.id,
            origin: self.position,
            action: FlowAction::Accept,
        }
    }
}

/// Where a dispatched record ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// An animation was scheduled
    Dispatched,
    /// The record carried no agent id
    NoAgent,
    /// The event type is not one the stage animates
    UnknownKind,
    /// The agent id is not in the current topology
    UnknownAgent,
}

impl DispatchOutcome {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, DispatchOutcome::Dispatched)
    }
}

/// The live stage for one run.
pub struct Scene {
    topology: Topology,
    hub: ActorHandle,
    registry: HashMap<String, ActorHandle>,
    animator: FlowAnimator,
}

impl Scene {
    /// Create an empty scene. Nothing renders until a topology is installed.
    pub fn new(overlap: EmitOverlap) -> Self {
        Self {
            topology: Topology::default(),
            hub: ActorHandle {
                id: ActorId::Hub,
                position: Point::ORIGIN,
            },
            registry: HashMap::new(),
            animator: FlowAnimator::new(overlap),
        }
    }

    /// Install a freshly built topology, replacing whatever was on stage.
    ///
    /// In-flight and queued animations from the previous topology are
    /// retired before the new registry is built.
    pub fn install(&mut self, topology: Topology) {
        self.animator.clear();

        self.registry = topology
            .slots()
            .iter()
            .enumerate()
            .map(|(i, slot)| {
                (
                    slot.agent_id.clone(),
                    ActorHandle {
                        id: ActorId::Node(i),
                        position: slot.position,
                    },
                )
            })
            .collect();
        self.topology = topology;

        debug!(
            nodes = self.topology.node_count(),
            epoch = self.animator.epoch(),
            "stage topology installed"
        );
    }

    /// Clear the stage entirely.
    pub fn teardown(&mut self) {
        self.animator.clear();
        self.registry.clear();
        self.topology = Topology::default();
    }

    pub fn has_topology(&self) -> bool {
        !self.topology.is_empty()
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Resolve an agent id to its handle.
    pub fn actor(&self, agent_id: &str) -> Option<&ActorHandle> {
        self.registry.get(agent_id)
    }

    pub fn hub(&self) -> &ActorHandle {
        &self.hub
    }

    /// Route one decoded record onto the stage.
    ///
    /// A query leaves its node toward the hub; a response leaves the hub
    /// toward its node. Anything unresolvable is discarded quietly.
    pub fn dispatch(&mut self, record: &LogRecord, now: Instant) -> DispatchOutcome {
        let Some(agent_id) = record.agent_id() else {
            trace!("record without agent id, not animating");
            return DispatchOutcome::NoAgent;
        };
        let Some(kind) = record.kind() else {
            trace!(agent_id, "record without a known event type, not animating");
            return DispatchOutcome::UnknownKind;
        };
        let Some(node) = self.registry.get(agent_id).copied() else {
            debug!(agent_id, "event for agent outside the topology, ignoring");
            return DispatchOutcome::UnknownAgent;
        };

        let request = match kind {
            EventKind::QuerySent => node.emit(self.hub_target()),
            EventKind::ResponseReceived => self.hub.emit(Some((node.id(), node.position()))),
        };
        self.animator.spawn(request, now);

        DispatchOutcome::Dispatched
    }

    /// Fire a demonstration query from a random node.
    ///
    /// Returns the chosen agent id, or `None` when the stage is empty.
    pub fn demo_pulse(&mut self, now: Instant) -> Option<String> {
        let count = self.topology.node_count();
        if count == 0 {
            return None;
        }

        let index = rand::rng().random_range(0..count);
        let agent_id = self.topology.agent_id(index)?.to_string();
        let node = self.registry.get(&agent_id).copied()?;

        let request = node.emit(self.hub_target());
        self.animator.spawn(request, now);

        Some(agent_id)
    }

    /// Advance the animation clock and chain accept flashes from arrivals.
    ///
    /// Returns whether anything is still animating.
    pub fn tick(&mut self, now: Instant) -> bool {
        let outcome = self.animator.advance(now);
        let mut animating = outcome.animating;

        for dest in outcome.arrivals {
            // A destination that left the stage mid-flight just misses
            // its flash
            if let Some(handle) = self.handle_for(dest) {
                self.animator.spawn(handle.accept(), now);
                animating = true;
            }
        }

        animating
    }

    /// Sample the drawable animation state at `now`.
    pub fn frames(&self, now: Instant) -> Vec<FlowFrame> {
        self.animator.frames(now)
    }

    pub fn is_animating(&self) -> bool {
        !self.animator.is_idle()
    }

    fn hub_target(&self) -> Option<(ActorId, Point)> {
        self.topology
            .position(ActorId::Hub)
            .map(|p| (ActorId::Hub, p))
    }

    fn handle_for(&self, id: ActorId) -> Option<ActorHandle> {
        match id {
            ActorId::Hub => Some(self.hub),
            ActorId::Node(index) => {
                let agent_id = self.topology.agent_id(index)?;
                self.registry.get(agent_id).copied()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use ember_core::types::AgentDescriptor;

    fn agents(ids: &[&str]) -> Vec<AgentDescriptor> {
        ids.iter()
            .map(|id| AgentDescriptor {
                agent_id: id.to_string(),
                persona: String::new(),
                query_count: 0,
            })
            .collect()
    }

    fn scene_with(ids: &[&str]) -> Scene {
        let mut scene = Scene::new(EmitOverlap::Concurrent);
        scene.install(Topology::build(&agents(ids), 150.0));
        scene
    }

    fn at(t0: Instant, ms: u64) -> Instant {
        t0 + Duration::from_millis(ms)
    }

    fn record(json: &str) -> LogRecord {
        LogRecord::decode(json)
    }

    #[test]
    fn test_query_flows_from_node_to_hub() {
        let t0 = Instant::now();
        let mut scene = scene_with(&["agent_1", "agent_2"]);

        let outcome = scene.dispatch(
            &record(r#"{"agent_id":"agent_2","event_type":"query_sent"}"#),
            t0,
        );
        assert!(outcome.is_dispatched());

        // Flash at the node first
        let node_pos = scene.actor("agent_2").unwrap().position();
        assert!(matches!(
            scene.frames(t0)[..],
            [FlowFrame::EmitFlash { actor: ActorId::Node(1), at, .. }] if at == node_pos
        ));

        // Then a particle bound for the hub
        match scene.frames(at(t0, 700))[..] {
            [FlowFrame::Particle { source, at }] => {
                assert_eq!(source, ActorId::Node(1));
                assert!((at.x - node_pos.x / 2.0).abs() < 1e-9);
                assert!((at.y - node_pos.y / 2.0).abs() < 1e-9);
            }
            ref frames => panic!("expected a particle, got {:?}", frames),
        }
    }

    #[test]
    fn test_response_flows_from_hub_to_node() {
        let t0 = Instant::now();
        let mut scene = scene_with(&["agent_1"]);

        let outcome = scene.dispatch(
            &record(r#"{"agent_id":"agent_1","event_type":"response_received"}"#),
            t0,
        );
        assert!(outcome.is_dispatched());

        assert!(matches!(
            scene.frames(t0)[..],
            [FlowFrame::EmitFlash { actor: ActorId::Hub, .. }]
        ));
    }

    #[test]
    fn test_raw_record_is_discarded() {
        let t0 = Instant::now();
        let mut scene = scene_with(&["agent_1"]);

        let outcome = scene.dispatch(&record("not json at all"), t0);

        assert_eq!(outcome, DispatchOutcome::NoAgent);
        assert!(!scene.is_animating());
    }

    #[test]
    fn test_unknown_event_type_is_discarded() {
        let t0 = Instant::now();
        let mut scene = scene_with(&["agent_1"]);

        let outcome = scene.dispatch(
            &record(r#"{"agent_id":"agent_1","event_type":"heartbeat"}"#),
            t0,
        );

        assert_eq!(outcome, DispatchOutcome::UnknownKind);
        assert!(!scene.is_animating());
    }

    #[test]
    fn test_unknown_agent_is_discarded() {
        let t0 = Instant::now();
        let mut scene = scene_with(&["agent_1"]);

        let outcome = scene.dispatch(
            &record(r#"{"agent_id":"agent_99","event_type":"query_sent"}"#),
            t0,
        );

        assert_eq!(outcome, DispatchOutcome::UnknownAgent);
        assert!(!scene.is_animating());
    }

    #[test]
    fn test_arrival_chains_accept_flash_at_hub() {
        let t0 = Instant::now();
        let mut scene = scene_with(&["agent_1"]);
        scene.dispatch(
            &record(r#"{"agent_id":"agent_1","event_type":"query_sent"}"#),
            t0,
        );

        // Flight lands at 1000ms; the hub flash starts there
        assert!(scene.tick(at(t0, 1000)));
        assert!(matches!(
            scene.frames(at(t0, 1100))[..],
            [FlowFrame::AcceptFlash { actor: ActorId::Hub, .. }]
        ));

        // And retires after its own 400ms
        assert!(!scene.tick(at(t0, 1400)));
        assert!(scene.frames(at(t0, 1400)).is_empty());
    }

    #[test]
    fn test_arrival_chains_accept_flash_at_node() {
        let t0 = Instant::now();
        let mut scene = scene_with(&["agent_1"]);
        scene.dispatch(
            &record(r#"{"agent_id":"agent_1","event_type":"response_received"}"#),
            t0,
        );

        scene.tick(at(t0, 1000));
        assert!(matches!(
            scene.frames(at(t0, 1100))[..],
            [FlowFrame::AcceptFlash { actor: ActorId::Node(0), .. }]
        ));
    }

    #[test]
    fn test_teardown_cancels_everything_in_flight() {
        let t0 = Instant::now();
        let mut scene = scene_with(&["agent_1"]);
        scene.dispatch(
            &record(r#"{"agent_id":"agent_1","event_type":"query_sent"}"#),
            t0,
        );

        scene.teardown();

        assert!(!scene.has_topology());
        assert!(scene.frames(at(t0, 200)).is_empty());
        // No arrival, no chained accept
        assert!(!scene.tick(at(t0, 1000)));
        assert!(scene.frames(at(t0, 1100)).is_empty());
    }

    #[test]
    fn test_install_replaces_registry() {
        let t0 = Instant::now();
        let mut scene = scene_with(&["agent_1"]);
        scene.dispatch(
            &record(r#"{"agent_id":"agent_1","event_type":"query_sent"}"#),
            t0,
        );

        scene.install(Topology::build(&agents(&["agent_7"]), 150.0));

        // Old animations are gone and old ids no longer resolve
        assert!(!scene.is_animating());
        let outcome = scene.dispatch(
            &record(r#"{"agent_id":"agent_1","event_type":"query_sent"}"#),
            t0,
        );
        assert_eq!(outcome, DispatchOutcome::UnknownAgent);
        assert!(scene.actor("agent_7").is_some());
    }

    #[test]
    fn test_demo_pulse_needs_a_topology() {
        let t0 = Instant::now();
        let mut scene = Scene::new(EmitOverlap::Concurrent);

        assert_eq!(scene.demo_pulse(t0), None);

        scene.install(Topology::build(&agents(&["agent_1", "agent_2"]), 150.0));
        let pulsed = scene.demo_pulse(t0).expect("pulse should fire");
        assert!(pulsed == "agent_1" || pulsed == "agent_2");
        assert!(scene.is_animating());
    }
}
