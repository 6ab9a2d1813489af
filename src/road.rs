use crate::lane::{Lane, LaneDir};
use crate::math::Point2d;
use crate::{JunctionId, JunctionSet, RoadId};
use cgmath::prelude::*;

/// Margin added to a junction's radius when resolving road endpoints, in m.
const CONNECT_MARGIN: f64 = 15.0;

/// The rendered width of a road, in m.
const ROAD_WIDTH: f64 = 30.0;

/// An undirected road segment between two points, carrying one lane
/// of traffic in each direction.
///
/// Roads are identified by their [RoadId] only; two roads with identical
/// geometry are distinct. The junction references are resolved in a second
/// pass over the network, once all junctions exist.
#[derive(Clone, Debug)]
pub struct Road {
    id: RoadId,
    start: Point2d,
    end: Point2d,
    lanes: [Lane; 2],
    start_junction: Option<JunctionId>,
    end_junction: Option<JunctionId>,
}

impl Road {
    /// Creates a new road and derives its two lanes.
    pub(crate) fn new(id: RoadId, start: Point2d, end: Point2d) -> Self {
        Self {
            id,
            start,
            end,
            lanes: [
                Lane::new(id, LaneDir::Forward, start, end),
                Lane::new(id, LaneDir::Backward, start, end),
            ],
            start_junction: None,
            end_junction: None,
        }
    }

    /// The road's ID.
    pub fn id(&self) -> RoadId {
        self.id
    }

    /// The road's raw start point.
    pub fn start(&self) -> Point2d {
        self.start
    }

    /// The road's raw end point.
    pub fn end(&self) -> Point2d {
        self.end
    }

    /// The length of the road's centre line in m.
    pub fn length(&self) -> f64 {
        (self.end - self.start).magnitude()
    }

    /// The rendered width of the road in m.
    pub fn width(&self) -> f64 {
        ROAD_WIDTH
    }

    /// The road's two lanes, forward first.
    pub fn lanes(&self) -> &[Lane; 2] {
        &self.lanes
    }

    /// The lane travelling in the given direction.
    pub fn lane(&self, dir: LaneDir) -> &Lane {
        match dir {
            LaneDir::Forward => &self.lanes[0],
            LaneDir::Backward => &self.lanes[1],
        }
    }

    /// The lane travelling from the road's start point to its end point.
    pub fn forward_lane(&self) -> &Lane {
        &self.lanes[0]
    }

    /// The lane travelling from the road's end point to its start point.
    pub fn backward_lane(&self) -> &Lane {
        &self.lanes[1]
    }

    /// The junction at the road's start point, if one was resolved.
    pub fn start_junction(&self) -> Option<JunctionId> {
        self.start_junction
    }

    /// The junction at the road's end point, if one was resolved.
    pub fn end_junction(&self) -> Option<JunctionId> {
        self.end_junction
    }

    /// The junction at the origin of travel in the given direction.
    pub fn starting_junction(&self, dir: LaneDir) -> Option<JunctionId> {
        match dir {
            LaneDir::Forward => self.start_junction,
            LaneDir::Backward => self.end_junction,
        }
    }

    /// The junction at the destination of travel in the given direction.
    pub fn ending_junction(&self, dir: LaneDir) -> Option<JunctionId> {
        match dir {
            LaneDir::Forward => self.end_junction,
            LaneDir::Backward => self.start_junction,
        }
    }

    /// Resolves each endpoint to the nearest junction within its catch
    /// radius and registers the road with the junctions it touches.
    /// An endpoint beyond every junction's reach stays unconnected and
    /// acts as a network boundary.
    ///
    /// Must run after all junctions have been created.
    pub(crate) fn connect_to_junctions(&mut self, junctions: &mut JunctionSet) {
        self.start_junction = nearest_junction(self.start, junctions);
        self.end_junction = nearest_junction(self.end, junctions);
        for id in [self.start_junction, self.end_junction].into_iter().flatten() {
            junctions[id].connect_road(self.id);
        }
    }
}

/// Finds the junction closest to `point` among those whose catch radius
/// (radius plus [CONNECT_MARGIN]) covers it. Ties resolve to the first
/// junction in iteration order.
fn nearest_junction(point: Point2d, junctions: &JunctionSet) -> Option<JunctionId> {
    junctions
        .iter()
        .map(|(id, junction)| (id, (junction.centre() - point).magnitude(), junction.radius()))
        .filter(|(_, dist, radius)| *dist < radius + CONNECT_MARGIN)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(id, _, _)| id)
}
