use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::scene::Aabb;

pub const DEFAULT_TIMESCALE: f32 = 0.1;
pub const DEFAULT_LIGHT_DISTANCE: f32 = 50.0;

/// Slowly orbiting overhead light direction at `elapsed_seconds`.
///
/// Unit length for every input; depends on nothing but its arguments.
pub fn light_direction(elapsed_seconds: f32, timescale: f32) -> Vec3 {
    let t = elapsed_seconds * timescale;
    Vec3::new(
        2.0 * (1.5 * t).sin(),
        5.0,
        2.0 * (2.0 + 1.9 * t).cos(),
    )
    .normalize()
}

/// Up vector for a view looking along `direction`: the world axis least
/// aligned with it, made orthogonal to it.
pub fn stable_up(direction: Vec3) -> Vec3 {
    let dir = direction.normalize_or_zero();
    let abs = dir.abs();
    let axis = if abs.x <= abs.y && abs.x <= abs.z {
        Vec3::X
    } else if abs.y <= abs.z {
        Vec3::Y
    } else {
        Vec3::Z
    };
    (axis - dir * axis.dot(dir)).normalize()
}

/// How the light's orthographic window is chosen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightProjection {
    /// Tight bound around the scene's bounding box.
    #[default]
    Fit,
    /// Hand-tuned square window centered on the origin.
    Fixed {
        half_extent: f32,
        near: f32,
        far: f32,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightMatrices {
    pub view: Mat4,
    pub proj: Mat4,
}

impl LightMatrices {
    pub fn view_proj(&self) -> Mat4 {
        self.proj * self.view
    }
}

#[derive(Clone, Copy, Debug)]
pub struct LightModel {
    pub timescale: f32,
    pub distance: f32,
    pub projection: LightProjection,
}

impl Default for LightModel {
    fn default() -> Self {
        Self {
            timescale: DEFAULT_TIMESCALE,
            distance: DEFAULT_LIGHT_DISTANCE,
            projection: LightProjection::Fit,
        }
    }
}

impl LightModel {
    pub fn direction(&self, elapsed_seconds: f32) -> Vec3 {
        light_direction(elapsed_seconds, self.timescale)
    }

    pub fn matrices(&self, direction: Vec3, bounds: &Aabb) -> LightMatrices {
        match self.projection {
            LightProjection::Fit => {
                let focus = bounds.center();
                let view = light_view(direction, focus, self.distance.max(bounds.radius()));
                LightMatrices {
                    view,
                    proj: fit_orthographic(view, bounds),
                }
            }
            LightProjection::Fixed {
                half_extent,
                near,
                far,
            } => LightMatrices {
                view: light_view(direction, Vec3::ZERO, self.distance),
                proj: Mat4::orthographic_rh(
                    -half_extent,
                    half_extent,
                    -half_extent,
                    half_extent,
                    near,
                    far,
                ),
            },
        }
    }
}

pub fn light_view(direction: Vec3, focus: Vec3, distance: f32) -> Mat4 {
    let dir = direction.normalize_or_zero();
    let eye = focus + dir * distance;
    Mat4::look_at_rh(eye, focus, stable_up(dir))
}

/// Orthographic projection whose window and depth range enclose every
/// corner of `bounds` as seen through `view`.
pub fn fit_orthographic(view: Mat4, bounds: &Aabb) -> Mat4 {
    let corners = bounds.corners().map(|corner| view.transform_point3(corner));
    let (min, max) = corners.iter().fold(
        (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
        |(min, max), c| (min.min(*c), max.max(*c)),
    );

    let margin = bounds.radius() * 0.01 + 1e-3;
    // View space looks down -Z, so the nearest corner has the largest z.
    Mat4::orthographic_rh(
        min.x - margin,
        max.x + margin,
        min.y - margin,
        max.y + margin,
        -max.z - margin,
        -min.z + margin,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn direction_at_zero_matches_closed_form() {
        let expected = Vec3::new(0.0, 5.0, 2.0 * 2.0f32.cos()).normalize();
        assert!(light_direction(0.0, DEFAULT_TIMESCALE).abs_diff_eq(expected, EPS));
    }

    #[test]
    fn direction_is_deterministic() {
        let model = LightModel::default();
        assert_eq!(model.direction(88.88), model.direction(88.88));
    }

    #[test]
    fn stable_up_is_orthogonal_for_straight_down() {
        let up = stable_up(Vec3::Y);
        assert!((up.length() - 1.0).abs() < EPS);
        assert!(up.dot(Vec3::Y).abs() < EPS);
    }

    #[test]
    fn fixed_projection_uses_configured_window() {
        let model = LightModel {
            projection: LightProjection::Fixed {
                half_extent: 32.0,
                near: 1.0,
                far: 100.0,
            },
            ..LightModel::default()
        };
        let bounds = Aabb {
            min: Vec3::splat(-1.0),
            max: Vec3::splat(1.0),
        };
        let m = model.matrices(Vec3::Y, &bounds);
        let expected = Mat4::orthographic_rh(-32.0, 32.0, -32.0, 32.0, 1.0, 100.0);
        assert!(m.proj.abs_diff_eq(expected, EPS));
    }

    #[test]
    fn projection_setting_parses_from_json() {
        let fit: LightProjection = serde_json::from_str("\"fit\"").unwrap();
        assert_eq!(fit, LightProjection::Fit);
        let fixed: LightProjection =
            serde_json::from_str(r#"{"fixed":{"half_extent":32.0,"near":1.0,"far":90.0}}"#)
                .unwrap();
        assert!(matches!(fixed, LightProjection::Fixed { far, .. } if far == 90.0));
    }

    #[test]
    fn projection_defaults_to_fit() {
        assert_eq!(LightProjection::default(), LightProjection::Fit);
    }
}
