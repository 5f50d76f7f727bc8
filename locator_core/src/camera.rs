//! Follow camera.
//!
//! The camera orbits the tracked object rather than the world origin. Each
//! render tick applies two independent smoothing passes:
//!
//! 1. rotation eases toward the drag target: `current += (target - current) * 0.08`
//! 2. position eases toward the orbit point: `pos = lerp(pos, desired, 0.12)`
//!
//! The look-at point is never smoothed, so the subject stays centred while
//! the camera catches up.

use nalgebra::{Isometry3, Matrix4, Perspective3, Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;

/// Rotation easing factor per tick.
pub const ROTATION_SMOOTHING: f64 = 0.08;
/// Position easing factor per tick.
pub const POSITION_SMOOTHING: f64 = 0.12;
/// Radians of rotation per pixel of drag.
pub const DRAG_SENSITIVITY: f64 = 0.005;
pub const ZOOM_IN_FACTOR: f64 = 0.78;
pub const ZOOM_OUT_FACTOR: f64 = 1.25;
pub const MIN_ORBIT_DISTANCE: f64 = 1.0;

// Keeps the Y-up look-at basis well-defined
const MAX_PITCH: f64 = std::f64::consts::FRAC_PI_2 - 0.01;

/// Pixel size of the rendering surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Whether the surface has a usable, non-zero area.
    pub fn is_available(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    pub fn aspect(&self) -> Option<f64> {
        self.is_available().then(|| self.width / self.height)
    }
}

/// Perspective lens parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lens {
    /// Vertical field of view in radians
    pub fov_y: f64,
    pub near: f64,
    pub far: f64,
}

impl Lens {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            fov_y: config.fov_y_degrees.to_radians(),
            near: config.near,
            far: config.far,
        }
    }
}

impl Default for Lens {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

/// Pitch/yaw pair in radians.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    /// Pitch (elevation above the horizontal plane)
    pub x: f64,
    /// Yaw (around the vertical axis)
    pub y: f64,
}

/// Camera output for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub position: Point3<f64>,
    pub look_at: Point3<f64>,
}

impl CameraPose {
    /// Combined view-projection for this pose, or `None` when the viewport
    /// is unusable or the pose is degenerate (eye on top of target).
    pub fn view_projection(&self, lens: &Lens, viewport: &Viewport) -> Option<ViewProjection> {
        let aspect = viewport.aspect()?;
        if (self.position - self.look_at).norm() <= f64::EPSILON {
            return None;
        }
        let view = Isometry3::look_at_rh(&self.position, &self.look_at, &Vector3::y());
        let projection = Perspective3::new(aspect, lens.fov_y, lens.near, lens.far);
        Some(ViewProjection::from_matrix(projection.as_matrix() * view.to_homogeneous()))
    }
}

/// World-to-clip transform used by the picker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewProjection {
    matrix: Matrix4<f64>,
}

impl ViewProjection {
    pub fn from_matrix(matrix: Matrix4<f64>) -> Self {
        Self { matrix }
    }

    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    /// Projects a world point to normalized device coordinates.
    ///
    /// Returns `None` for points at or behind the camera plane.
    pub fn project_ndc(&self, point: &Point3<f64>) -> Option<Point2<f64>> {
        let clip = self.matrix * point.to_homogeneous();
        if clip.w <= 0.0 || !clip.w.is_finite() {
            return None;
        }
        Some(Point2::new(clip.x / clip.w, clip.y / clip.w))
    }

    /// Projects a world point to viewport pixels (origin top-left, y down).
    pub fn project_to_pixels(&self, point: &Point3<f64>, viewport: &Viewport) -> Option<Point2<f64>> {
        let ndc = self.project_ndc(point)?;
        Some(Point2::new(
            (ndc.x * 0.5 + 0.5) * viewport.width,
            (-ndc.y * 0.5 + 0.5) * viewport.height,
        ))
    }
}

/// Ground-reference grid that follows the target beneath it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FollowGrid {
    pub position: Point3<f64>,
    pub visible: bool,
}

/// Smoothed orbit camera tracking a moving target.
#[derive(Debug, Clone)]
pub struct CameraController {
    box_size: f64,
    lens: Lens,
    orbit_distance: f64,
    rotation: Rotation,
    target_rotation: Rotation,
    position: Point3<f64>,
    drag_anchor: Option<(f64, f64)>,
    follow_grid: FollowGrid,
}

impl CameraController {
    pub fn new(config: &SessionConfig) -> Self {
        let box_size = config.box_size;
        let start = box_size * 1.2;
        Self {
            box_size,
            lens: Lens::from_config(config),
            orbit_distance: Self::default_distance(box_size),
            rotation: Rotation { x: 0.7, y: -0.6 },
            target_rotation: Rotation::default(),
            position: Point3::new(start, start, start),
            drag_anchor: None,
            follow_grid: FollowGrid {
                position: Point3::new(0.0, -box_size * 0.5, 0.0),
                visible: true,
            },
        }
    }

    /// Orbit distance proportional to the nominal scene size.
    pub fn default_distance(box_size: f64) -> f64 {
        (box_size * 1.2).max(10.0)
    }

    pub fn lens(&self) -> &Lens {
        &self.lens
    }

    pub fn orbit_distance(&self) -> f64 {
        self.orbit_distance
    }

    /// Smoothed rotation currently rendered.
    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Rotation the drag input is steering toward.
    pub fn target_rotation(&self) -> Rotation {
        self.target_rotation
    }

    /// Rendered (smoothed) camera position.
    pub fn position(&self) -> Point3<f64> {
        self.position
    }

    pub fn follow_grid(&self) -> FollowGrid {
        self.follow_grid
    }

    pub fn zoom_in(&mut self) {
        self.orbit_distance = (self.orbit_distance * ZOOM_IN_FACTOR).max(MIN_ORBIT_DISTANCE);
    }

    pub fn zoom_out(&mut self) {
        self.orbit_distance *= ZOOM_OUT_FACTOR;
    }

    pub fn reset_zoom(&mut self) {
        self.orbit_distance = Self::default_distance(self.box_size);
    }

    pub fn set_follow_grid_visible(&mut self, visible: bool) {
        self.follow_grid.visible = visible;
    }

    pub fn toggle_follow_grid(&mut self) -> bool {
        self.follow_grid.visible = !self.follow_grid.visible;
        self.follow_grid.visible
    }

    pub fn begin_drag(&mut self, x: f64, y: f64) {
        self.drag_anchor = Some((x, y));
    }

    /// Applies pointer movement while dragging; ignored otherwise.
    pub fn drag_to(&mut self, x: f64, y: f64) {
        let Some((px, py)) = self.drag_anchor else {
            return;
        };
        self.drag_anchor = Some((x, y));
        self.rotate_by(x - px, y - py);
    }

    pub fn end_drag(&mut self) {
        self.drag_anchor = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_anchor.is_some()
    }

    /// Shifts the target rotation by a pixel delta.
    pub fn rotate_by(&mut self, dx: f64, dy: f64) {
        self.target_rotation.x = (self.target_rotation.x + dy * DRAG_SENSITIVITY).clamp(-MAX_PITCH, MAX_PITCH);
        self.target_rotation.y += dx * DRAG_SENSITIVITY;
    }

    /// Orbit offset for the current smoothed rotation.
    fn orbit_offset(&self) -> Vector3<f64> {
        let d = self.orbit_distance;
        let Rotation { x: rx, y: ry } = self.rotation;
        Vector3::new(d * ry.cos() * rx.cos(), d * rx.sin(), d * ry.sin() * rx.cos())
    }

    /// Advances one render tick toward `target` and returns the pose to draw.
    pub fn tick(&mut self, target: Point3<f64>) -> CameraPose {
        self.rotation.x += (self.target_rotation.x - self.rotation.x) * ROTATION_SMOOTHING;
        self.rotation.y += (self.target_rotation.y - self.rotation.y) * ROTATION_SMOOTHING;

        let desired = target + self.orbit_offset();
        self.position = self.position.lerp(&desired, POSITION_SMOOTHING);

        self.follow_grid.position = Point3::new(target.x, target.y - self.box_size * 0.5, target.z);

        CameraPose {
            position: self.position,
            look_at: target,
        }
    }
}
