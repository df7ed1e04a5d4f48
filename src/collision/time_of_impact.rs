//! Time of impact between two moving shapes, via conservative advancement.
//! The shapes are swept with linear center motion and linear angle motion;
//! rotation makes the problem non-convex, so the advancement loop brackets
//! the impact with a separation function and a mixed bisection/secant root
//! finder.

use glam::Vec2;
use log::warn;

use crate::collision::distance::{
    DistanceInput, DistanceProxy, SimplexCache, compute_distance,
};
use crate::math::{Sweep, Transform2, cross_vs};
use crate::settings::{
    LINEAR_SLOP, MAX_POLYGON_VERTICES, MAX_TOI_ITERATIONS, MAX_TOI_ROOT_ITERATIONS,
};

#[derive(Debug, Clone)]
pub struct ToiInput {
    pub proxy_a: DistanceProxy,
    pub proxy_b: DistanceProxy,
    pub sweep_a: Sweep,
    pub sweep_b: Sweep,
    /// Largest sweep fraction to consider, usually 1.
    pub t_max: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToiState {
    #[default]
    Unknown,
    /// The root finder did not converge; `t` is a safe lower bound.
    Failed,
    /// Deeply overlapped already at t = 0.
    Overlapped,
    /// Touching within the target tolerance at `t`.
    Touching,
    /// No impact within [0, t_max].
    Separated,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ToiOutput {
    pub state: ToiState,
    pub t: f32,
}

/// Counters accumulated across TOI queries, surfaced through the step
/// profile for tuning.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToiStats {
    pub calls: u32,
    pub iterations: u32,
    pub max_iterations: u32,
    pub root_iterations: u32,
    pub max_root_iterations: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SeparationType {
    Points,
    FaceA,
    FaceB,
}

/// A linear separation axis extracted from the GJK simplex of the current
/// configuration. Evaluating it at a later sweep time gives a conservative
/// separation bound for the root finder.
struct SeparationFunction<'a> {
    proxy_a: &'a DistanceProxy,
    proxy_b: &'a DistanceProxy,
    sweep_a: Sweep,
    sweep_b: Sweep,
    kind: SeparationType,
    local_point: Vec2,
    axis: Vec2,
}

impl<'a> SeparationFunction<'a> {
    fn new(
        cache: &SimplexCache,
        proxy_a: &'a DistanceProxy,
        sweep_a: Sweep,
        proxy_b: &'a DistanceProxy,
        sweep_b: Sweep,
        t1: f32,
    ) -> Self {
        debug_assert!(cache.count > 0 && cache.count < 3);

        let xf_a = sweep_a.transform(t1);
        let xf_b = sweep_b.transform(t1);

        if cache.count == 1 {
            let local_point_a = proxy_a.vertex(cache.index_a[0]);
            let local_point_b = proxy_b.vertex(cache.index_b[0]);
            let point_a = xf_a.apply(local_point_a);
            let point_b = xf_b.apply(local_point_b);
            let axis = (point_b - point_a).normalize_or_zero();
            SeparationFunction {
                proxy_a,
                proxy_b,
                sweep_a,
                sweep_b,
                kind: SeparationType::Points,
                local_point: Vec2::ZERO,
                axis,
            }
        } else if cache.index_a[0] == cache.index_a[1] {
            // Two support points on B: the witness edge lives on B.
            let local_point_b1 = proxy_b.vertex(cache.index_b[0]);
            let local_point_b2 = proxy_b.vertex(cache.index_b[1]);

            let mut axis = cross_vs(local_point_b2 - local_point_b1, 1.0).normalize();
            let normal = xf_b.q.rotate(axis);

            let local_point = 0.5 * (local_point_b1 + local_point_b2);
            let point_b = xf_b.apply(local_point);
            let point_a = xf_a.apply(proxy_a.vertex(cache.index_a[0]));

            if (point_a - point_b).dot(normal) < 0.0 {
                axis = -axis;
            }
            SeparationFunction {
                proxy_a,
                proxy_b,
                sweep_a,
                sweep_b,
                kind: SeparationType::FaceB,
                local_point,
                axis,
            }
        } else {
            // Two support points on A.
            let local_point_a1 = proxy_a.vertex(cache.index_a[0]);
            let local_point_a2 = proxy_a.vertex(cache.index_a[1]);

            let mut axis = cross_vs(local_point_a2 - local_point_a1, 1.0).normalize();
            let normal = xf_a.q.rotate(axis);

            let local_point = 0.5 * (local_point_a1 + local_point_a2);
            let point_a = xf_a.apply(local_point);
            let point_b = xf_b.apply(proxy_b.vertex(cache.index_b[0]));

            if (point_b - point_a).dot(normal) < 0.0 {
                axis = -axis;
            }
            SeparationFunction {
                proxy_a,
                proxy_b,
                sweep_a,
                sweep_b,
                kind: SeparationType::FaceA,
                local_point,
                axis,
            }
        }
    }

    /// Minimum separation over all vertex pairs at sweep time `t`, plus the
    /// supporting vertex indices for later re-evaluation.
    fn find_min_separation(&self, t: f32) -> (f32, usize, usize) {
        let xf_a = self.sweep_a.transform(t);
        let xf_b = self.sweep_b.transform(t);

        match self.kind {
            SeparationType::Points => {
                let axis_a = xf_a.q.inv_rotate(self.axis);
                let axis_b = xf_b.q.inv_rotate(-self.axis);

                let index_a = self.proxy_a.support(axis_a);
                let index_b = self.proxy_b.support(axis_b);

                let point_a = xf_a.apply(self.proxy_a.vertex(index_a));
                let point_b = xf_b.apply(self.proxy_b.vertex(index_b));

                ((point_b - point_a).dot(self.axis), index_a, index_b)
            }
            SeparationType::FaceA => {
                let normal = xf_a.q.rotate(self.axis);
                let point_a = xf_a.apply(self.local_point);

                let axis_b = xf_b.q.inv_rotate(-normal);
                let index_b = self.proxy_b.support(axis_b);
                let point_b = xf_b.apply(self.proxy_b.vertex(index_b));

                ((point_b - point_a).dot(normal), 0, index_b)
            }
            SeparationType::FaceB => {
                let normal = xf_b.q.rotate(self.axis);
                let point_b = xf_b.apply(self.local_point);

                let axis_a = xf_a.q.inv_rotate(-normal);
                let index_a = self.proxy_a.support(axis_a);
                let point_a = xf_a.apply(self.proxy_a.vertex(index_a));

                ((point_a - point_b).dot(normal), index_a, 0)
            }
        }
    }

    /// Separation of a fixed vertex pair at sweep time `t`.
    fn evaluate(&self, index_a: usize, index_b: usize, t: f32) -> f32 {
        let xf_a = self.sweep_a.transform(t);
        let xf_b = self.sweep_b.transform(t);

        match self.kind {
            SeparationType::Points => {
                let point_a = xf_a.apply(self.proxy_a.vertex(index_a));
                let point_b = xf_b.apply(self.proxy_b.vertex(index_b));
                (point_b - point_a).dot(self.axis)
            }
            SeparationType::FaceA => {
                let normal = xf_a.q.rotate(self.axis);
                let point_a = xf_a.apply(self.local_point);
                let point_b = xf_b.apply(self.proxy_b.vertex(index_b));
                (point_b - point_a).dot(normal)
            }
            SeparationType::FaceB => {
                let normal = xf_b.q.rotate(self.axis);
                let point_b = xf_b.apply(self.local_point);
                let point_a = xf_a.apply(self.proxy_a.vertex(index_a));
                (point_a - point_b).dot(normal)
            }
        }
    }
}

/// Compute the first time on [0, t_max] at which the two swept shapes reach
/// the touching target separation. Non-tunneling depends on the caller
/// keeping the sweep displacement within the core-shape bound.
pub fn time_of_impact(input: &ToiInput, stats: &mut ToiStats) -> ToiOutput {
    stats.calls += 1;

    let mut output = ToiOutput {
        state: ToiState::Unknown,
        t: input.t_max,
    };

    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;

    let mut sweep_a = input.sweep_a;
    let mut sweep_b = input.sweep_b;

    // Large rotations ruin the root finder, so both sweeps are normalized.
    sweep_a.normalize();
    sweep_b.normalize();

    let t_max = input.t_max;

    let total_radius = proxy_a.radius + proxy_b.radius;
    // Aim just inside the skin so the subsequent contact solver has
    // something to work with without pushing the bodies apart again.
    let target = LINEAR_SLOP.max(total_radius - 3.0 * LINEAR_SLOP);
    let tolerance = 0.25 * LINEAR_SLOP;
    debug_assert!(target > tolerance);

    let mut t1 = 0.0_f32;
    let mut iter = 0u32;

    let mut cache = SimplexCache::default();
    let mut dist_input = DistanceInput {
        proxy_a: proxy_a.clone(),
        proxy_b: proxy_b.clone(),
        transform_a: Transform2::IDENTITY,
        transform_b: Transform2::IDENTITY,
        use_radii: false,
    };

    // Outer loop: advance t1 until touching, separation, or failure.
    loop {
        dist_input.transform_a = sweep_a.transform(t1);
        dist_input.transform_b = sweep_b.transform(t1);

        let dist = compute_distance(&dist_input, &mut cache);

        if dist.distance <= 0.0 {
            // Deep overlap; the caller has to resolve this positionally.
            output.state = ToiState::Overlapped;
            output.t = 0.0;
            break;
        }

        if dist.distance < target + tolerance {
            output.state = ToiState::Touching;
            output.t = t1;
            break;
        }

        let fcn = SeparationFunction::new(&cache, proxy_a, sweep_a, proxy_b, sweep_b, t1);

        // Inner loop: resolve deepest vertex pairs one at a time until t2
        // carries a safe advance for all of them.
        let mut done = false;
        let mut t2 = t_max;
        let mut push_back_iter = 0;
        loop {
            let (mut s2, index_a, index_b) = fcn.find_min_separation(t2);

            // Final configuration already separated?
            if s2 > target + tolerance {
                output.state = ToiState::Separated;
                output.t = t_max;
                done = true;
                break;
            }

            // Separation reaches the target exactly at t2: advance.
            if s2 > target - tolerance {
                t1 = t2;
                break;
            }

            let mut s1 = fcn.evaluate(index_a, index_b, t1);

            // The interval start is already too deep; t1 is the best safe
            // answer we have.
            if s1 < target - tolerance {
                output.state = ToiState::Failed;
                output.t = t1;
                done = true;
                break;
            }

            if s1 <= target + tolerance {
                output.state = ToiState::Touching;
                output.t = t1;
                done = true;
                break;
            }

            // Root find on [t1, t2], alternating secant and bisection.
            let mut root_iters = 0u32;
            let mut a1 = t1;
            let mut a2 = t2;
            loop {
                let t = if root_iters & 1 == 1 {
                    a1 + (target - s1) * (a2 - a1) / (s2 - s1)
                } else {
                    0.5 * (a1 + a2)
                };

                root_iters += 1;
                stats.root_iterations += 1;

                let s = fcn.evaluate(index_a, index_b, t);

                if (s - target).abs() < tolerance {
                    t2 = t;
                    break;
                }

                if s > target {
                    a1 = t;
                    s1 = s;
                } else {
                    a2 = t;
                    s2 = s;
                }

                if root_iters == MAX_TOI_ROOT_ITERATIONS {
                    break;
                }
            }
            stats.max_root_iterations = stats.max_root_iterations.max(root_iters);

            push_back_iter += 1;
            if push_back_iter == MAX_POLYGON_VERTICES {
                break;
            }
        }

        iter += 1;
        stats.iterations += 1;

        if done {
            break;
        }

        if iter == MAX_TOI_ITERATIONS {
            // Root finder got stuck; report the safe lower bound.
            warn!("time of impact hit the iteration cap at t = {t1}");
            output.state = ToiState::Failed;
            output.t = t1;
            break;
        }
    }

    stats.max_iterations = stats.max_iterations.max(iter);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::shapes::{CircleShape, PolygonShape, Shape};
    use approx::assert_relative_eq;

    fn stationary_sweep(center: Vec2) -> Sweep {
        Sweep {
            local_center: Vec2::ZERO,
            c0: center,
            c: center,
            a0: 0.0,
            a: 0.0,
            alpha0: 0.0,
        }
    }

    fn linear_sweep(from: Vec2, to: Vec2) -> Sweep {
        Sweep {
            local_center: Vec2::ZERO,
            c0: from,
            c: to,
            a0: 0.0,
            a: 0.0,
            alpha0: 0.0,
        }
    }

    fn proxy(shape: &Shape) -> DistanceProxy {
        DistanceProxy::from_shape(shape, 0)
    }

    #[test]
    fn head_on_circles_touch_at_predicted_time() {
        let a: Shape = CircleShape::new(0.5).unwrap().into();
        let b: Shape = CircleShape::new(0.5).unwrap().into();

        let input = ToiInput {
            proxy_a: proxy(&a),
            proxy_b: proxy(&b),
            sweep_a: stationary_sweep(Vec2::ZERO),
            sweep_b: linear_sweep(Vec2::new(10.0, 0.0), Vec2::ZERO),
            t_max: 1.0,
        };
        let mut stats = ToiStats::default();
        let out = time_of_impact(&input, &mut stats);

        assert_eq!(out.state, ToiState::Touching);
        // Centers close at 10 m per unit time; touching when the center
        // distance reaches the target separation just under the summed radii.
        let target = 1.0 - 3.0 * LINEAR_SLOP;
        assert_relative_eq!(out.t, (10.0 - target) / 10.0, epsilon = 1e-3);
        assert_eq!(stats.calls, 1);
    }

    #[test]
    fn fast_thin_wall_is_not_tunneled() {
        // A small bullet crossing a thin wall entirely within one step.
        let bullet: Shape = CircleShape::new(0.1).unwrap().into();
        let wall: Shape = PolygonShape::rect(0.05, 2.0).into();

        let input = ToiInput {
            proxy_a: proxy(&wall),
            proxy_b: proxy(&bullet),
            sweep_a: stationary_sweep(Vec2::ZERO),
            sweep_b: linear_sweep(Vec2::new(-0.42, 0.0), Vec2::new(0.42, 0.0)),
            t_max: 1.0,
        };
        let mut stats = ToiStats::default();
        let out = time_of_impact(&input, &mut stats);

        assert_eq!(out.state, ToiState::Touching);
        assert!(out.t > 0.0 && out.t < 0.5);
    }

    #[test]
    fn initially_overlapped_reports_overlap_at_zero() {
        let a: Shape = CircleShape::new(1.0).unwrap().into();
        let b: Shape = CircleShape::new(1.0).unwrap().into();

        let input = ToiInput {
            proxy_a: proxy(&a),
            proxy_b: proxy(&b),
            sweep_a: stationary_sweep(Vec2::ZERO),
            sweep_b: linear_sweep(Vec2::new(0.5, 0.0), Vec2::new(0.6, 0.0)),
            t_max: 1.0,
        };
        let mut stats = ToiStats::default();
        let out = time_of_impact(&input, &mut stats);

        assert_eq!(out.state, ToiState::Overlapped);
        assert_eq!(out.t, 0.0);
    }

    #[test]
    fn parallel_paths_stay_separated() {
        let a: Shape = CircleShape::new(0.5).unwrap().into();
        let b: Shape = CircleShape::new(0.5).unwrap().into();

        let input = ToiInput {
            proxy_a: proxy(&a),
            proxy_b: proxy(&b),
            sweep_a: linear_sweep(Vec2::ZERO, Vec2::new(5.0, 0.0)),
            sweep_b: linear_sweep(Vec2::new(0.0, 4.0), Vec2::new(5.0, 4.0)),
            t_max: 1.0,
        };
        let mut stats = ToiStats::default();
        let out = time_of_impact(&input, &mut stats);

        assert_eq!(out.state, ToiState::Separated);
        assert_eq!(out.t, 1.0);
    }

    #[test]
    fn rotating_box_tip_strike() {
        // A long box spinning up toward a circle overhead. Separation is
        // non-convex in t, which exercises the push-back loop.
        let a: Shape = PolygonShape::rect(1.0, 0.1).into();
        let b: Shape = CircleShape::new(0.25).unwrap().into();

        let mut sweep_a = stationary_sweep(Vec2::ZERO);
        sweep_a.a = std::f32::consts::FRAC_PI_2;

        let input = ToiInput {
            proxy_a: proxy(&a),
            proxy_b: proxy(&b),
            sweep_a,
            sweep_b: stationary_sweep(Vec2::new(0.0, 1.0)),
            t_max: 1.0,
        };
        let mut stats = ToiStats::default();
        let out = time_of_impact(&input, &mut stats);

        // The tip reaches the circle partway through the quarter turn.
        assert_eq!(out.state, ToiState::Touching);
        assert!(out.t > 0.2 && out.t < 0.9, "t = {}", out.t);
    }
}
