//! Keyframe animation over node local transforms.
//!
//! A [`Sampler`] holds keyframe times and values for one property; a
//! [`Channel`] points a sampler at a node. Sampling loops: times outside the
//! keyframe range wrap back into `[min, max]`, and `max` itself yields the
//! final keyframe.

use std::ops::{Add, Mul};

use cgmath::{InnerSpace, Quaternion, Vector3};

use crate::{
    data_structures::scene_graph::Node,
    error::{AssetError, Result},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    #[default]
    Linear,
    Step,
    CubicSpline,
}

impl Interpolation {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "LINEAR" => Ok(Interpolation::Linear),
            "STEP" => Ok(Interpolation::Step),
            "CUBICSPLINE" => Ok(Interpolation::CubicSpline),
            other => Err(AssetError::invalid(format!("unknown interpolation {other:?}"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Property {
    Translation,
    Rotation,
    Scale,
}

/// Keyframe values, one variant per animated property.
///
/// For cubic-spline samplers every keyframe is stored as an
/// `(in-tangent, value, out-tangent)` triplet.
#[derive(Clone, Debug, PartialEq)]
pub enum Keyframes {
    Translation(Vec<Vector3<f64>>),
    Rotation(Vec<Quaternion<f64>>),
    Scale(Vec<Vector3<f64>>),
}

impl Keyframes {
    pub fn property(&self) -> Property {
        match self {
            Keyframes::Translation(_) => Property::Translation,
            Keyframes::Rotation(_) => Property::Rotation,
            Keyframes::Scale(_) => Property::Scale,
        }
    }

    fn len(&self) -> usize {
        match self {
            Keyframes::Translation(v) | Keyframes::Scale(v) => v.len(),
            Keyframes::Rotation(q) => q.len(),
        }
    }
}

/// A sampled property value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Sample {
    Translation(Vector3<f64>),
    Rotation(Quaternion<f64>),
    Scale(Vector3<f64>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Sampler {
    times: Vec<f64>,
    keyframes: Keyframes,
    interpolation: Interpolation,
}

impl Sampler {
    /// Checks that times are non-empty and ascending and that the number of
    /// values matches (three per time for cubic splines).
    pub fn new(times: Vec<f64>, keyframes: Keyframes, interpolation: Interpolation) -> Result<Self> {
        if times.is_empty() {
            return Err(AssetError::invalid("animation sampler without keyframes"));
        }
        if times.windows(2).any(|w| w[1] < w[0]) {
            return Err(AssetError::invalid("animation keyframe times are not ascending"));
        }
        let per_key = match interpolation {
            Interpolation::CubicSpline => 3,
            _ => 1,
        };
        if keyframes.len() != times.len() * per_key {
            return Err(AssetError::invalid(format!(
                "animation sampler has {} times but {} values",
                times.len(),
                keyframes.len()
            )));
        }
        Ok(Self {
            times,
            keyframes,
            interpolation,
        })
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn keyframes(&self) -> &Keyframes {
        &self.keyframes
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    pub fn property(&self) -> Property {
        self.keyframes.property()
    }

    /// Last keyframe time.
    pub fn end(&self) -> f64 {
        self.times.last().copied().unwrap_or(0.0)
    }

    pub fn sample(&self, t: f64) -> Sample {
        let cursor = self.locate(t);
        match &self.keyframes {
            Keyframes::Translation(values) => {
                Sample::Translation(self.interpolate(values, cursor, lerp))
            }
            Keyframes::Scale(values) => Sample::Scale(self.interpolate(values, cursor, lerp)),
            Keyframes::Rotation(values) => {
                let q = self.interpolate(values, cursor, slerp_shortest);
                match cursor {
                    Cursor::Exact(_) => Sample::Rotation(q),
                    Cursor::Between { .. } => Sample::Rotation(q.normalize()),
                }
            }
        }
    }

    fn locate(&self, t: f64) -> Cursor {
        let last = self.times.len() - 1;
        let (min, max) = (self.times[0], self.times[last]);
        let span = max - min;
        if last == 0 || span <= 0.0 {
            return Cursor::Exact(if t >= max { last } else { 0 });
        }
        let t = if t < min || t > max {
            min + (t - min).rem_euclid(span)
        } else {
            t
        };
        // index of the last keyframe at or before t
        let i = self.times.partition_point(|&k| k <= t).saturating_sub(1);
        if self.times[i] == t || i == last {
            return Cursor::Exact(i);
        }
        let (t0, t1) = (self.times[i], self.times[i + 1]);
        Cursor::Between {
            index: i,
            u: (t - t0) / (t1 - t0),
            dt: t1 - t0,
        }
    }

    fn interpolate<T>(&self, values: &[T], cursor: Cursor, linear: impl Fn(T, T, f64) -> T) -> T
    where
        T: Copy + Add<Output = T> + Mul<f64, Output = T>,
    {
        let cubic = self.interpolation == Interpolation::CubicSpline;
        let value = |k: usize| if cubic { values[3 * k + 1] } else { values[k] };
        match cursor {
            Cursor::Exact(k) => value(k),
            Cursor::Between { index, u, dt } => match self.interpolation {
                Interpolation::Step => value(index),
                Interpolation::Linear => linear(value(index), value(index + 1), u),
                Interpolation::CubicSpline => {
                    let v0 = values[3 * index + 1];
                    let out0 = values[3 * index + 2];
                    let in1 = values[3 * (index + 1)];
                    let v1 = values[3 * (index + 1) + 1];
                    hermite(v0, out0 * dt, v1, in1 * dt, u)
                }
            },
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Cursor {
    Exact(usize),
    Between { index: usize, u: f64, dt: f64 },
}

fn hermite<T>(p0: T, m0: T, p1: T, m1: T, s: f64) -> T
where
    T: Copy + Add<Output = T> + Mul<f64, Output = T>,
{
    let s2 = s * s;
    let s3 = s2 * s;
    p0 * (2.0 * s3 - 3.0 * s2 + 1.0)
        + m0 * (s3 - 2.0 * s2 + s)
        + p1 * (-2.0 * s3 + 3.0 * s2)
        + m1 * (s3 - s2)
}

fn lerp(a: Vector3<f64>, b: Vector3<f64>, u: f64) -> Vector3<f64> {
    a + (b - a) * u
}

fn slerp_shortest(a: Quaternion<f64>, b: Quaternion<f64>, u: f64) -> Quaternion<f64> {
    let b = if a.dot(b) < 0.0 { -b } else { b };
    a.slerp(b, u)
}

#[derive(Clone, Debug, PartialEq)]
pub struct Channel {
    pub target: usize,
    pub sampler: Sampler,
}

impl Channel {
    pub fn apply(&self, nodes: &mut [Node], t: f64) {
        let Some(node) = nodes.get_mut(self.target) else {
            return;
        };
        match self.sampler.sample(t) {
            Sample::Translation(v) => node.set_translation(v),
            Sample::Rotation(q) => node.set_rotation(q),
            Sample::Scale(v) => node.set_scale(v),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Animation {
    pub name: Option<String>,
    pub channels: Vec<Channel>,
}

impl Animation {
    /// Write every channel's value at `t` into its target node.
    pub fn apply(&self, nodes: &mut [Node], t: f64) {
        for channel in &self.channels {
            channel.apply(nodes, t);
        }
    }

    pub fn duration(&self) -> f64 {
        self.channels
            .iter()
            .map(|c| c.sampler.end())
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Deg, Rotation3};

    fn translations(values: &[[f64; 3]]) -> Keyframes {
        Keyframes::Translation(values.iter().map(|v| Vector3::from(*v)).collect())
    }

    fn sample_translation(sampler: &Sampler, t: f64) -> Vector3<f64> {
        match sampler.sample(t) {
            Sample::Translation(v) => v,
            other => panic!("unexpected sample {other:?}"),
        }
    }

    #[test]
    fn keyframe_times_return_stored_values() {
        let rotations = vec![
            Quaternion::from_angle_y(Deg(10.0)),
            Quaternion::from_angle_y(Deg(73.0)),
            Quaternion::from_angle_x(Deg(-40.0)),
        ];
        let sampler = Sampler::new(
            vec![0.0, 0.4, 1.3],
            Keyframes::Rotation(rotations.clone()),
            Interpolation::Linear,
        )
        .unwrap();
        for (t, q) in sampler.times().to_vec().into_iter().zip(rotations) {
            assert_eq!(sampler.sample(t), Sample::Rotation(q));
        }
    }

    #[test]
    fn linear_midpoint() {
        let sampler = Sampler::new(
            vec![0.0, 2.0],
            translations(&[[0.0, 0.0, 0.0], [4.0, -2.0, 8.0]]),
            Interpolation::Linear,
        )
        .unwrap();
        assert_eq!(sample_translation(&sampler, 1.0), Vector3::new(2.0, -1.0, 4.0));
    }

    #[test]
    fn times_wrap_into_range_and_max_is_final() {
        let sampler = Sampler::new(
            vec![1.0, 3.0],
            translations(&[[0.0, 0.0, 0.0], [2.0, 0.0, 0.0]]),
            Interpolation::Linear,
        )
        .unwrap();
        assert_eq!(sample_translation(&sampler, 3.0).x, 2.0);
        // 4.0 wraps to 2.0, halfway
        assert!((sample_translation(&sampler, 4.0).x - 1.0).abs() < 1e-12);
        // before the first key wraps from the end
        assert!((sample_translation(&sampler, 0.5).x - 1.5).abs() < 1e-12);
    }

    #[test]
    fn single_keyframe_is_constant() {
        let sampler = Sampler::new(
            vec![0.5],
            Keyframes::Scale(vec![Vector3::new(2.0, 2.0, 2.0)]),
            Interpolation::Linear,
        )
        .unwrap();
        for t in [0.0, 0.5, 10.0, -3.0] {
            assert_eq!(sampler.sample(t), Sample::Scale(Vector3::new(2.0, 2.0, 2.0)));
        }
    }

    #[test]
    fn step_holds_previous_value() {
        let sampler = Sampler::new(
            vec![0.0, 1.0],
            translations(&[[1.0, 1.0, 1.0], [5.0, 5.0, 5.0]]),
            Interpolation::Step,
        )
        .unwrap();
        assert_eq!(sample_translation(&sampler, 0.99), Vector3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn cubic_spline_with_zero_tangents_eases() {
        let zero = [0.0, 0.0, 0.0];
        let sampler = Sampler::new(
            vec![0.0, 1.0],
            translations(&[zero, [0.0, 0.0, 0.0], zero, zero, [10.0, 0.0, 0.0], zero]),
            Interpolation::CubicSpline,
        )
        .unwrap();
        assert_eq!(sample_translation(&sampler, 1.0).x, 10.0);
        assert!((sample_translation(&sampler, 0.5).x - 5.0).abs() < 1e-12);
        assert!(sample_translation(&sampler, 0.25).x < 2.5);
    }

    #[test]
    fn slerp_takes_shortest_path() {
        let a = Quaternion::from_angle_z(Deg(10.0));
        let b = -Quaternion::from_angle_z(Deg(30.0));
        let sampler = Sampler::new(
            vec![0.0, 1.0],
            Keyframes::Rotation(vec![a, b]),
            Interpolation::Linear,
        )
        .unwrap();
        let Sample::Rotation(q) = sampler.sample(0.5) else {
            panic!("expected rotation");
        };
        let expected = Quaternion::from_angle_z(Deg(20.0));
        assert!(q.dot(expected).abs() > 1.0 - 1e-9);
    }

    #[test]
    fn rejects_mismatched_counts() {
        let err = Sampler::new(
            vec![0.0, 1.0],
            translations(&[[0.0, 0.0, 0.0]]),
            Interpolation::Linear,
        );
        assert!(err.is_err());
        let cubic = Sampler::new(
            vec![0.0, 1.0],
            translations(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]),
            Interpolation::CubicSpline,
        );
        assert!(cubic.is_err());
    }

    #[test]
    fn animation_writes_target_nodes() {
        let mut nodes = vec![Node::default(), Node::default()];
        let animation = Animation {
            name: Some("move".into()),
            channels: vec![Channel {
                target: 1,
                sampler: Sampler::new(
                    vec![0.0, 1.0],
                    translations(&[[0.0, 0.0, 0.0], [0.0, 6.0, 0.0]]),
                    Interpolation::Linear,
                )
                .unwrap(),
            }],
        };
        animation.apply(&mut nodes, 0.5);
        assert_eq!(nodes[1].local_transform().translation, Vector3::new(0.0, 3.0, 0.0));
        assert_eq!(nodes[1].model_matrix().w.y, 3.0);
        assert_eq!(nodes[0].model_matrix().w.y, 0.0);
        assert_eq!(animation.duration(), 1.0);
    }
}
