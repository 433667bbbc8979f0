//! Ring topology for a run's agents.
//!
//! Agents are laid out in manifest order on a circle around a central hub:
//! slot 0 sits at the top and successive slots proceed clockwise. Geometry
//! lives in an abstract y-up coordinate space centered on the hub; the stage
//! renderer maps it onto the terminal canvas.

use std::collections::HashMap;
use std::f64::consts::PI;
use std::fmt;

use crate::types::{AgentDescriptor, AgentId};

/// Distance from the hub center at which connection lines begin.
pub const HUB_CLEARANCE: f64 = 40.0;

/// Gap between a connection line's end and the node center.
pub const NODE_CLEARANCE: f64 = 30.0;

/// A point in topology space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Linear interpolation from `self` to `other`, `t` in `[0, 1]`.
    pub fn lerp(self, other: Point, t: f64) -> Point {
        Point {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }
}

/// Identity of a drawable actor on the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorId {
    /// The central hub
    Hub,
    /// An agent node, by slot index
    Node(usize),
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorId::Hub => write!(f, "hub"),
            ActorId::Node(index) => write!(f, "node {}", index),
        }
    }
}

/// Angle of slot `index` out of `count`, in radians.
///
/// Slot 0 is at `-pi/2` so it lands at the top of the ring.
pub fn slot_angle(index: usize, count: usize) -> f64 {
    index as f64 * 2.0 * PI / count as f64 - PI / 2.0
}

/// Position of slot `index` out of `count` on a ring of the given radius.
///
/// The y axis points up, so the `-pi/2` slot maps to `(0, radius)` and
/// increasing indices proceed clockwise.
pub fn slot_position(index: usize, count: usize, radius: f64) -> Point {
    let angle = slot_angle(index, count);
    Point {
        x: radius * angle.cos(),
        y: -radius * angle.sin(),
    }
}

/// One agent's place on the ring.
#[derive(Debug, Clone)]
pub struct AgentSlot {
    pub agent_id: AgentId,
    pub position: Point,
}

/// The laid-out ring for one run.
///
/// Holds the node positions in manifest order plus the registry mapping
/// agent ids to actors. Built once per successful run start and replaced
/// wholesale on the next.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    radius: f64,
    slots: Vec<AgentSlot>,
    index: HashMap<AgentId, usize>,
}

impl Topology {
    /// Lay out the given agents on a ring of the given radius.
    ///
    /// An empty agent list produces an empty topology: no slots, nothing to
    /// draw, every node lookup misses.
    pub fn build(agents: &[AgentDescriptor], radius: f64) -> Self {
        let count = agents.len();
        let mut slots = Vec::with_capacity(count);
        let mut index = HashMap::with_capacity(count);

        for (i, agent) in agents.iter().enumerate() {
            slots.push(AgentSlot {
                agent_id: agent.agent_id.clone(),
                position: slot_position(i, count, radius),
            });
            index.insert(agent.agent_id.clone(), i);
        }

        Self {
            radius,
            slots,
            index,
        }
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn node_count(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Node slots in manifest order.
    pub fn slots(&self) -> &[AgentSlot] {
        &self.slots
    }

    /// Resolve an agent id to its actor. Unknown ids miss.
    pub fn actor(&self, agent_id: &str) -> Option<ActorId> {
        self.index.get(agent_id).map(|&i| ActorId::Node(i))
    }

    /// Position of an actor, if it exists in this topology.
    pub fn position(&self, actor: ActorId) -> Option<Point> {
        match actor {
            ActorId::Hub => Some(Point::ORIGIN),
            ActorId::Node(index) => self.slots.get(index).map(|slot| slot.position),
        }
    }

    /// Agent id at a slot index.
    pub fn agent_id(&self, index: usize) -> Option<&str> {
        self.slots.get(index).map(|slot| slot.agent_id.as_str())
    }

    /// Spoke segments from the hub's edge to just short of each node.
    pub fn connection_lines(&self) -> Vec<(Point, Point)> {
        self.slots
            .iter()
            .map(|slot| spoke(slot.position))
            .collect()
    }
}

/// Segment from the hub clearance radius toward `node`, stopping
/// `NODE_CLEARANCE` short of the node center.
fn spoke(node: Point) -> (Point, Point) {
    let length = (node.x * node.x + node.y * node.y).sqrt();
    if length == 0.0 {
        return (Point::ORIGIN, Point::ORIGIN);
    }
    let ux = node.x / length;
    let uy = node.y / length;

    (
        Point::new(ux * HUB_CLEARANCE, uy * HUB_CLEARANCE),
        Point::new(node.x - ux * NODE_CLEARANCE, node.y - uy * NODE_CLEARANCE),
    )
}
