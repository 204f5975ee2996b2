use glam::{Mat4, Vec2, Vec3};
use winit::event::{ElementState, MouseButton};

use crate::renderer::CameraMatrices;

const ROTATE_SPEED: f32 = 0.01;
const ZOOM_SPEED: f32 = 0.01;
const PAN_SPEED: f32 = 0.0015;
const MIN_DISTANCE: f32 = 0.1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DragMode {
    Rotate,
    Zoom,
    Pan,
}

/// Camera orbiting `center` at `distance`, oriented by `rotation`.
///
/// Left drag rotates, right drag zooms, middle drag pans.
#[derive(Clone, Debug)]
pub struct OrbitCamera {
    pub center: Vec3,
    pub distance: f32,
    pub rotation: Mat4,
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    cursor: Vec2,
    drag: Option<DragMode>,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            center: Vec3::new(0.0, 1.0, 0.0),
            distance: 10.0,
            rotation: Mat4::from_rotation_y(1.6) * Mat4::from_rotation_z(0.4),
            fov_y_degrees: 50.0,
            near: 1.0,
            far: 100.0,
            cursor: Vec2::ZERO,
            drag: None,
        }
    }
}

impl OrbitCamera {
    pub fn view(&self) -> Mat4 {
        Mat4::from_translation(Vec3::new(0.0, 0.0, -self.distance))
            * self.rotation
            * Mat4::from_translation(-self.center)
    }

    pub fn proj(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_degrees.to_radians(),
            aspect.max(f32::EPSILON),
            self.near,
            self.far,
        )
    }

    pub fn matrices(&self, width: u32, height: u32) -> CameraMatrices {
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        CameraMatrices {
            view: self.view(),
            proj: self.proj(aspect),
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn mouse_button(&mut self, button: MouseButton, state: ElementState) {
        let mode = match button {
            MouseButton::Left => DragMode::Rotate,
            MouseButton::Right => DragMode::Zoom,
            MouseButton::Middle => DragMode::Pan,
            _ => return,
        };
        match state {
            ElementState::Pressed => self.drag = Some(mode),
            ElementState::Released if self.drag == Some(mode) => self.drag = None,
            ElementState::Released => {}
        }
    }

    pub fn cursor_moved(&mut self, position: Vec2) {
        let delta = position - self.cursor;
        self.cursor = position;

        match self.drag {
            Some(DragMode::Rotate) => {
                self.rotation = Mat4::from_rotation_x(delta.y * ROTATE_SPEED)
                    * Mat4::from_rotation_y(delta.x * ROTATE_SPEED)
                    * self.rotation;
            }
            Some(DragMode::Zoom) => {
                self.distance = (self.distance * (delta.y * ZOOM_SPEED).exp()).max(MIN_DISTANCE);
            }
            Some(DragMode::Pan) => {
                // Camera axes in world space are the rows of the rotation.
                let inverse = self.rotation.transpose();
                let right = inverse.x_axis.truncate();
                let up = inverse.y_axis.truncate();
                let scale = self.distance * PAN_SPEED;
                self.center += (-right * delta.x + up * delta.y) * scale;
            }
            None => {}
        }
    }
}
