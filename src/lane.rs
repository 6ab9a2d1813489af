use crate::math::{point_lerp, rot90, Point2d};
use crate::RoadId;
use cgmath::prelude::*;

/// Lateral distance from a road's centre line to each of its lane centre lines, in m.
pub(crate) const LANE_OFFSET: f64 = 7.5;

/// Roads shorter than this collapse to a point and get degenerate lanes.
const MIN_ROAD_LENGTH: f64 = 0.01;

/// The direction of travel along a road.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LaneDir {
    /// Travel from the road's start point to its end point.
    Forward,
    /// Travel from the road's end point to its start point.
    Backward,
}

impl LaneDir {
    /// The opposing direction of travel.
    pub fn opposite(self) -> Self {
        match self {
            LaneDir::Forward => LaneDir::Backward,
            LaneDir::Backward => LaneDir::Forward,
        }
    }
}

/// The value identity of a lane, used wherever lanes key a map.
///
/// Two lane references denote the same lane exactly when their road ID
/// and direction agree, regardless of which `Lane` instance they came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LaneKey {
    /// The parent road.
    pub road: RoadId,
    /// The direction of travel along the road.
    pub dir: LaneDir,
}

impl LaneKey {
    /// Creates a new lane key.
    pub const fn new(road: RoadId, dir: LaneDir) -> Self {
        Self { road, dir }
    }
}

/// A single directed lane of a [Road](crate::Road).
///
/// The lane's centre line is the road's centre line shifted [LANE_OFFSET]
/// to the right of the direction of travel, so the two lanes of a road
/// never overlap and both follow the right-hand traffic convention.
/// Immutable after construction.
#[derive(Clone, Debug)]
pub struct Lane {
    key: LaneKey,
    /// Start of travel in world space.
    start: Point2d,
    /// End of travel in world space.
    end: Point2d,
    length: f64,
    heading: f64,
}

impl Lane {
    /// Derives a lane from its parent road's raw endpoints.
    pub(crate) fn new(road: RoadId, dir: LaneDir, road_start: Point2d, road_end: Point2d) -> Self {
        let key = LaneKey::new(road, dir);
        let vec = road_end - road_start;
        let length = vec.magnitude();

        if length < MIN_ROAD_LENGTH {
            // Degenerate road; collapse to the start point with a zero heading.
            return Self {
                key,
                start: road_start,
                end: road_start,
                length: 0.0,
                heading: 0.0,
            };
        }

        let perp = rot90(vec / length);
        let offset = match dir {
            LaneDir::Forward => LANE_OFFSET,
            LaneDir::Backward => -LANE_OFFSET,
        };
        let a = road_start + perp * offset;
        let b = road_end + perp * offset;

        // Travel runs start -> end on the forward lane and end -> start on the backward lane.
        let (start, end) = match dir {
            LaneDir::Forward => (a, b),
            LaneDir::Backward => (b, a),
        };
        let travel = end - start;

        Self {
            key,
            start,
            end,
            length,
            heading: travel.y.atan2(travel.x),
        }
    }

    /// The lane's value identity.
    pub fn key(&self) -> LaneKey {
        self.key
    }

    /// The parent road's ID.
    pub fn road(&self) -> RoadId {
        self.key.road
    }

    /// The direction of travel along the parent road.
    pub fn dir(&self) -> LaneDir {
        self.key.dir
    }

    /// The length of the lane's centre line in m.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// The heading of the direction of travel in radians.
    pub fn heading(&self) -> f64 {
        self.heading
    }

    /// The world space point where travel along this lane begins.
    pub fn start(&self) -> Point2d {
        self.start
    }

    /// The world space point where travel along this lane ends.
    pub fn end(&self) -> Point2d {
        self.end
    }

    /// The world space point at the given fraction of the way along the lane.
    /// The fraction is clamped to `[0, 1]`.
    pub fn point_at(&self, fraction: f64) -> Point2d {
        let f = fraction.clamp(0.0, 1.0);
        if self.length < MIN_ROAD_LENGTH {
            return self.start;
        }
        point_lerp(self.start, self.end, f)
    }

    /// Converts a distance from the lane start into a position fraction.
    pub fn fraction_at(&self, distance: f64) -> f64 {
        if self.length < MIN_ROAD_LENGTH {
            0.0
        } else {
            distance / self.length
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use slotmap::Key;

    fn road_id() -> RoadId {
        RoadId::null()
    }

    #[test]
    fn lanes_offset_symmetrically() {
        let start = Point2d::new(0.0, 0.0);
        let end = Point2d::new(100.0, 0.0);
        let fwd = Lane::new(road_id(), LaneDir::Forward, start, end);
        let bwd = Lane::new(road_id(), LaneDir::Backward, start, end);

        // Equal magnitude, opposite sides of the centre line.
        assert_approx_eq!(fwd.start().y, LANE_OFFSET);
        assert_approx_eq!(bwd.end().y, -LANE_OFFSET);
        assert_approx_eq!(fwd.start().y + bwd.start().y, 0.0);

        // Travel begins at the road start for the forward lane and at the
        // road end for the backward lane, within the lateral offset.
        assert_approx_eq!(fwd.point_at(0.0).x, 0.0);
        assert_approx_eq!(bwd.point_at(0.0).x, 100.0);
    }

    #[test]
    fn headings_oppose() {
        let start = Point2d::new(0.0, 0.0);
        let end = Point2d::new(0.0, 50.0);
        let fwd = Lane::new(road_id(), LaneDir::Forward, start, end);
        let bwd = Lane::new(road_id(), LaneDir::Backward, start, end);
        assert_approx_eq!(fwd.heading(), std::f64::consts::FRAC_PI_2);
        assert_approx_eq!(bwd.heading(), -std::f64::consts::FRAC_PI_2);
    }

    #[test]
    fn point_at_clamps() {
        let lane = Lane::new(
            road_id(),
            LaneDir::Forward,
            Point2d::new(0.0, 0.0),
            Point2d::new(10.0, 0.0),
        );
        assert_approx_eq!(lane.point_at(-1.0).x, lane.point_at(0.0).x);
        assert_approx_eq!(lane.point_at(2.0).x, lane.point_at(1.0).x);
    }

    #[test]
    fn degenerate_road_collapses() {
        let p = Point2d::new(5.0, 5.0);
        let lane = Lane::new(road_id(), LaneDir::Forward, p, p);
        assert_approx_eq!(lane.length(), 0.0);
        assert_approx_eq!(lane.heading(), 0.0);
        assert_approx_eq!(lane.point_at(0.7).x, 5.0);
    }
}
