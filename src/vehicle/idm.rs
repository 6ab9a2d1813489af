/// The gentlest braking applied when stopping for a light, in m/s^2.
const MIN_BRAKE: f64 = 0.5;

/// The harshest braking applied when stopping for a light, in m/s^2.
const MAX_BRAKE: f64 = 6.0;

/// The driving parameters of a simulated driver.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DriverParams {
    /// The desired speed in m/s.
    pub desired_speed: f64,
    /// The desired time gap to the leader in s.
    pub time_headway: f64,
    /// The maximum acceleration in m/s^2.
    pub max_acc: f64,
    /// The minimum bumper-to-bumper gap in m.
    pub min_gap: f64,
}

impl DriverParams {
    /// The comfortable deceleration, derived from the maximum acceleration.
    pub fn comf_dec(&self) -> f64 {
        1.2 * self.max_acc
    }
}

impl Default for DriverParams {
    /// A typical passenger car driver.
    fn default() -> Self {
        Self {
            desired_speed: 15.0,
            time_headway: 1.4,
            max_acc: 2.0,
            min_gap: 2.0,
        }
    }
}

/// The intelligent driver model of a single vehicle.
#[derive(Clone, Debug)]
pub(crate) struct Idm {
    params: DriverParams,
    /// Scalar applied to the desired speed, sampled once per driver.
    vel_adjust: f64,
}

impl Idm {
    /// Creates a new model.
    pub fn new(params: DriverParams, vel_adjust: f64) -> Self {
        Self { params, vel_adjust }
    }

    /// The driver's adjusted desired speed in m/s.
    pub fn desired_speed(&self) -> f64 {
        self.vel_adjust * self.params.desired_speed
    }


    /// Computes the IDM acceleration.
    ///
    /// # Arguments
    /// * `vel` - The vehicle's velocity (m/s).
    /// * `leader` - The net gap to the vehicle ahead (m) and its velocity
    ///   (m/s), or `None` on a free road.
    pub fn acceleration(&self, vel: f64, leader: Option<(f64, f64)>) -> f64 {
        let p = &self.params;
        let free_road = p.max_acc * (1.0 - (vel / self.desired_speed()).powi(4));
        let interaction = match leader {
            Some((net_dist, their_vel)) => {
                let appr = vel - their_vel;
                let factor = 1.0 / (2.0 * (p.max_acc * self.comf_dec()).sqrt());
                let ss = p.min_gap + f64::max(0.0, vel * p.time_headway + vel * appr * factor);
                let term = ss / f64::max(net_dist, 0.5 * p.min_gap);
                -p.max_acc * (term * term)
            }
            None => 0.0,
        };
        free_road + interaction
    }

    /// Computes the braking needed to come to rest `net_dist` metres ahead,
    /// bounded so it is neither imperceptibly soft nor unrealistically harsh.
    pub fn brake_to_stop(&self, vel: f64, net_dist: f64) -> f64 {
        let decel = vel.powi(2) / (2.0 * f64::max(net_dist, f64::EPSILON));
        -decel.clamp(MIN_BRAKE, MAX_BRAKE)
    }

    /// The comfortable deceleration in m/s^2.
    pub fn comf_dec(&self) -> f64 {
        self.params.comf_dec()
    }

    /// Clamps an acceleration to the vehicle's comfortable range.
    pub fn clamp(&self, acc: f64) -> f64 {
        acc.clamp(-self.comf_dec(), self.params.max_acc)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn model() -> Idm {
        Idm::new(
            DriverParams {
                desired_speed: 15.0,
                time_headway: 1.4,
                max_acc: 2.0,
                min_gap: 2.0,
            },
            1.0,
        )
    }

    #[test]
    fn free_road_converges_to_desired_speed() {
        let idm = model();
        let dt = 0.1;
        let mut vel: f64 = 0.0;
        for _ in 0..2000 {
            let acc = idm.clamp(idm.acceleration(vel, None));
            let next = f64::max(vel + acc * dt, 0.0);
            assert!(next >= vel, "velocity must rise monotonically");
            assert!(next <= 15.0 + 1e-9, "velocity must not overshoot");
            vel = next;
        }
        assert_approx_eq!(vel, 15.0, 0.1);
    }

    #[test]
    fn at_desired_speed_acceleration_vanishes() {
        let idm = model();
        assert_approx_eq!(idm.acceleration(15.0, None), 0.0);
    }

    #[test]
    fn closing_on_leader_brakes() {
        let idm = model();
        // Fast approach on a slow leader a short gap ahead.
        let acc = idm.acceleration(14.0, Some((6.0, 2.0)));
        assert!(acc < -idm.comf_dec());
    }

    #[test]
    fn ample_gap_barely_perturbs() {
        let idm = model();
        let free = idm.acceleration(10.0, None);
        let following = idm.acceleration(10.0, Some((200.0, 10.0)));
        assert!((free - following).abs() < 0.1);
    }

    #[test]
    fn brake_to_stop_is_bounded() {
        let idm = model();
        assert_approx_eq!(idm.brake_to_stop(1.0, 500.0), -0.5);
        assert_approx_eq!(idm.brake_to_stop(50.0, 1.0), -6.0);
        assert_approx_eq!(idm.brake_to_stop(10.0, 25.0), -2.0);
    }
}
