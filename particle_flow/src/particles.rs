//! Particle field state.
//!
//! A fixed cloud of points arranged in one of the selectable shapes.  Hand
//! openness drives the cloud's expansion; a finger-heart swaps the shape for
//! a heart until it is released.  [`ParticleField::project`] turns the cloud
//! into screen-space sprites for the software renderer, as seen from an
//! orbiting [`Camera`] the user can drag and zoom.

use std::f32::consts::{FRAC_PI_2, TAU};

use hand_signals::{AppState, ParticlePattern};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

pub const PARTICLE_COUNT: usize = 15_000;

/// Initial camera distance; the camera starts on the +z axis looking at the origin.
pub const CAMERA_Z:      f32 = 10.0;
pub const MIN_DISTANCE:  f32 = 2.0;
pub const MAX_DISTANCE:  f32 = 40.0;
/// Distance factor per scroll-wheel step.
const ZOOM_STEP:         f32 = 0.95;
const PITCH_LIMIT:       f32 = FRAC_PI_2 - 0.01;
pub const FOV_DEGREES:   f32 = 60.0;
/// Point size before depth attenuation (`size · 30 / depth`).
pub const POINT_SIZE:    f32 = 4.0;
const EXPANSION_EASE:    f32 = 0.1;
const ROTATION_Y_STEP:   f32 = 0.001;
const ROTATION_Z_STEP:   f32 = 0.0005;
const NEAR_PLANE:        f32 = 0.1;

// ════════════════════════════════════════════════════════════════════════════
// Shape
// ════════════════════════════════════════════════════════════════════════════

/// What the cloud is currently arranged as.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    Heart,
    Pattern(ParticlePattern),
}

impl Shape {
    /// The heart overrides the selected pattern while it is held.
    pub fn effective(pattern: ParticlePattern, finger_heart: bool) -> Shape {
        if finger_heart { Shape::Heart } else { Shape::Pattern(pattern) }
    }

    pub fn of(state: &AppState) -> Shape {
        Shape::effective(state.particle_pattern(), state.is_finger_heart())
    }

    pub fn name(self) -> &'static str {
        match self {
            Shape::Heart      => "heart",
            Shape::Pattern(p) => p.name(),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Generation
// ════════════════════════════════════════════════════════════════════════════

/// Uniform in `-half..half`.
fn centered<R: Rng>(rng: &mut R, half: f32) -> f32 {
    (rng.gen::<f32>() - 0.5) * 2.0 * half
}

/// Cubic falloff scatter used by the galaxy arms: mostly near zero, up to ±0.5.
fn scatter<R: Rng>(rng: &mut R) -> f32 {
    let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
    rng.gen::<f32>().powi(3) * sign * 0.5
}

fn point<R: Rng>(shape: Shape, index: usize, rng: &mut R) -> [f32; 3] {
    match shape {
        Shape::Heart => {
            let t  = rng.gen::<f32>() * TAU;
            let hx = 16.0 * t.sin().powi(3);
            let hy = 13.0 * t.cos() - 5.0 * (2.0 * t).cos() - 2.0 * (3.0 * t).cos() - (4.0 * t).cos();
            [
                hx / 16.0 * 4.0 + centered(rng, 0.075),
                hy / 17.0 * 4.0 + centered(rng, 0.075),
                centered(rng, 0.6),
            ]
        }
        Shape::Pattern(ParticlePattern::Sphere) => {
            let theta = rng.gen::<f32>() * TAU;
            let phi   = (2.0 * rng.gen::<f32>() - 1.0).acos();
            let r     = 4.0 * rng.gen::<f32>().cbrt();
            [r * phi.sin() * theta.cos(), r * phi.sin() * theta.sin(), r * phi.cos()]
        }
        Shape::Pattern(ParticlePattern::Cube) => {
            [centered(rng, 3.0), centered(rng, 3.0), centered(rng, 3.0)]
        }
        Shape::Pattern(ParticlePattern::Torus) => {
            let (major, minor) = (3.0, 1.0);
            let u = rng.gen::<f32>() * TAU;
            let v = rng.gen::<f32>() * TAU;
            [
                (major + minor * v.cos()) * u.cos() + centered(rng, 0.25),
                (major + minor * v.cos()) * u.sin() + centered(rng, 0.25),
                minor * v.sin() + centered(rng, 0.25),
            ]
        }
        Shape::Pattern(ParticlePattern::Galaxy) => {
            const ARMS: usize = 3;
            let radius = rng.gen::<f32>() * 5.0;
            let spin   = radius * 2.0;
            let arm    = (index % ARMS) as f32 * (TAU / ARMS as f32);
            let (sx, sy, sz) = (scatter(rng), scatter(rng), scatter(rng));
            [
                (arm + spin).cos() * radius + sx,
                sy * 2.0,
                (arm + spin).sin() * radius + sz,
            ]
        }
    }
}

/// Lay out `count` particles in `shape`.
pub fn generate<R: Rng>(shape: Shape, count: usize, rng: &mut R) -> Vec<[f32; 3]> {
    (0..count).map(|i| point(shape, i, rng)).collect()
}

// ════════════════════════════════════════════════════════════════════════════
// Sprite / projection
// ════════════════════════════════════════════════════════════════════════════

/// One projected particle, ready to rasterise.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sprite {
    pub x:     f32,
    pub y:     f32,
    /// Diameter in pixels.
    pub size:  f32,
    /// Linear RGB, may exceed 1.0 before additive blending saturates it.
    pub color: [f32; 3],
}

/// Orbit camera: always looks at the origin from `distance` away.
/// `yaw` swings it around the y axis, `pitch` raises it above the xz plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    yaw:      f32,
    pitch:    f32,
    distance: f32,
}

impl Default for Camera {
    fn default() -> Self { Camera { yaw: 0.0, pitch: 0.0, distance: CAMERA_Z } }
}

impl Camera {
    pub fn orbit(&mut self, d_yaw: f32, d_pitch: f32) {
        if d_yaw.is_finite()   { self.yaw = (self.yaw + d_yaw) % TAU; }
        if d_pitch.is_finite() { self.pitch = (self.pitch + d_pitch).clamp(-PITCH_LIMIT, PITCH_LIMIT); }
    }

    /// Positive `steps` move closer.
    pub fn zoom(&mut self, steps: f32) {
        if !steps.is_finite() { return; }
        self.distance = (self.distance * ZOOM_STEP.powf(steps)).clamp(MIN_DISTANCE, MAX_DISTANCE);
    }

    /// World point → camera space, camera on +z at `distance`.
    fn view(&self, p: [f32; 3]) -> [f32; 3] {
        let (sy, cy) = self.yaw.sin_cos();
        let (x, z) = (p[0] * cy - p[2] * sy, p[0] * sy + p[2] * cy);
        let (sp, cp) = self.pitch.sin_cos();
        [x, p[1] * cp - z * sp, p[1] * sp + z * cp]
    }

    pub fn yaw(&self)      -> f32 { self.yaw }
    pub fn pitch(&self)    -> f32 { self.pitch }
    pub fn distance(&self) -> f32 { self.distance }
}

/// Perspective-project a world point for a `width`×`height` viewport.
/// `None` when the point is at or behind the near plane.
pub fn project_point(p: [f32; 3], camera: &Camera, width: usize, height: usize) -> Option<(f32, f32, f32)> {
    let v = camera.view(p);
    let depth = camera.distance - v[2];
    if depth < NEAR_PLANE || width == 0 || height == 0 { return None; }

    let focal  = 1.0 / half_fov().tan();
    let aspect = width as f32 / height as f32;
    let ndc_x  = focal * v[0] / depth / aspect;
    let ndc_y  = focal * v[1] / depth;

    let sx = (ndc_x + 1.0) * 0.5 * width as f32;
    let sy = (1.0 - ndc_y) * 0.5 * height as f32;
    Some((sx, sy, POINT_SIZE * 30.0 / depth))
}

fn rotate(p: [f32; 3], rot_y: f32, rot_z: f32) -> [f32; 3] {
    let (sz, cz) = rot_z.sin_cos();
    let (x, y, z) = (p[0] * cz - p[1] * sz, p[0] * sz + p[1] * cz, p[2]);
    let (sy, cy) = rot_y.sin_cos();
    [x * cy + z * sy, y, -x * sy + z * cy]
}

// ════════════════════════════════════════════════════════════════════════════
// ParticleField
// ════════════════════════════════════════════════════════════════════════════

pub struct ParticleField {
    rng:        SmallRng,
    count:      usize,
    shape:      Shape,
    positions:  Vec<[f32; 3]>,
    /// Bumped each time the cloud is regenerated.
    generation: u64,
    expansion:  f32,
    rotation_y: f32,
    rotation_z: f32,
    time:       f32,
    color:      [f32; 3],
    camera:     Camera,
}

impl ParticleField {
    /// `seed` fixes the layout (tests); `None` seeds from entropy.
    pub fn new(count: usize, seed: Option<u64>, state: &AppState) -> Self {
        let mut rng = match seed {
            Some(s) => SmallRng::seed_from_u64(s),
            None    => SmallRng::from_entropy(),
        };
        let shape = Shape::of(state);
        let positions = generate(shape, count, &mut rng);
        ParticleField {
            rng,
            count,
            shape,
            positions,
            generation: 0,
            expansion:  1.0,
            rotation_y: 0.0,
            rotation_z: 0.0,
            time:       0.0,
            color:      state.particle_color().to_f32(),
            camera:     Camera::default(),
        }
    }

    /// Follow the store: pick up the colour and regenerate if the effective
    /// shape changed.  Returns true when the cloud was regenerated.
    pub fn sync(&mut self, state: &AppState) -> bool {
        self.color = state.particle_color().to_f32();
        let shape = Shape::of(state);
        if shape == self.shape { return false; }

        self.shape      = shape;
        self.positions  = generate(shape, self.count, &mut self.rng);
        self.generation += 1;
        debug!(shape = shape.name(), generation = self.generation, "particles regenerated");
        true
    }

    /// Advance one frame of `dt` seconds.
    pub fn tick(&mut self, openness: f32, dt: f32) {
        let openness = if openness.is_finite() { openness.clamp(0.0, 1.0) } else { 0.0 };
        let target = 0.2 + 1.8 * openness;
        self.expansion  += (target - self.expansion) * EXPANSION_EASE;
        self.rotation_y += ROTATION_Y_STEP;
        self.rotation_z += ROTATION_Z_STEP;
        self.time       += dt.max(0.0);
    }

    pub fn orbit(&mut self, d_yaw: f32, d_pitch: f32) { self.camera.orbit(d_yaw, d_pitch); }
    pub fn zoom(&mut self, steps: f32)                 { self.camera.zoom(steps); }

    /// Project every particle into `out` (cleared first).
    pub fn project(&self, width: usize, height: usize, out: &mut Vec<Sprite>) {
        out.clear();
        let t = self.time;
        for &p in &self.positions {
            let len    = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
            let breath = (t * 2.0 + len).sin() * 0.1;
            let k      = self.expansion + breath;
            let mut q  = [p[0] * k, p[1] * k, p[2] * k];
            q[0] += (t * 0.5 + q[1]).sin() * 0.1;
            q[1] += (t * 0.3 + q[0]).cos() * 0.1;
            q[2] += (t * 0.4 + q[2]).sin() * 0.1;

            let dist = (q[0] * q[0] + q[1] * q[1] + q[2] * q[2]).sqrt();
            let world = rotate(q, self.rotation_y, self.rotation_z);
            if let Some((x, y, size)) = project_point(world, &self.camera, width, height) {
                let tint = dist * 0.05;
                out.push(Sprite {
                    x,
                    y,
                    size,
                    color: [self.color[0] + tint, self.color[1] + tint, self.color[2] + tint],
                });
            }
        }
    }

    pub fn shape(&self)      -> Shape        { self.shape }
    pub fn positions(&self)  -> &[[f32; 3]]  { &self.positions }
    pub fn generation(&self) -> u64          { self.generation }
    pub fn expansion(&self)  -> f32          { self.expansion }
    pub fn rotation(&self)   -> (f32, f32)   { (self.rotation_y, self.rotation_z) }
    pub fn time(&self)       -> f32          { self.time }
    pub fn camera(&self)     -> &Camera      { &self.camera }
}

/// Half the vertical field of view in radians.
pub fn half_fov() -> f32 { FOV_DEGREES.to_radians() * 0.5 }

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use hand_signals::{FrameUpdate, HexColor};

    fn cloud(shape: Shape) -> Vec<[f32; 3]> {
        generate(shape, 4000, &mut SmallRng::seed_from_u64(7))
    }

    fn norm(p: [f32; 3]) -> f32 { (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt() }

    #[test]
    fn sphere_within_radius() {
        assert!(cloud(Shape::Pattern(ParticlePattern::Sphere)).iter().all(|&p| norm(p) <= 4.0 + 1e-4));
    }

    #[test]
    fn cube_within_bounds() {
        let pts = cloud(Shape::Pattern(ParticlePattern::Cube));
        assert!(pts.iter().all(|p| p.iter().all(|c| c.abs() <= 3.0)));
    }

    #[test]
    fn torus_hugs_ring() {
        for p in cloud(Shape::Pattern(ParticlePattern::Torus)) {
            let q = (p[0] * p[0] + p[1] * p[1]).sqrt() - 3.0;
            // tube radius 1 plus up to ±0.25 jitter per axis
            assert!((q * q + p[2] * p[2]).sqrt() <= 1.0 + 0.44, "{p:?}");
        }
    }

    #[test]
    fn galaxy_is_flat_disc() {
        for p in cloud(Shape::Pattern(ParticlePattern::Galaxy)) {
            assert!((p[0] * p[0] + p[2] * p[2]).sqrt() <= 5.0 + 0.71);
            assert!(p[1].abs() <= 1.0);
        }
    }

    #[test]
    fn heart_bounds() {
        for p in cloud(Shape::Heart) {
            assert!(p[0].abs() <= 4.1);
            assert!(p[1] > -4.1 && p[1] < 2.9, "{p:?}");
            assert!(p[2].abs() <= 0.6);
        }
    }

    #[test]
    fn finger_heart_overrides_pattern() {
        assert_eq!(Shape::effective(ParticlePattern::Cube, true), Shape::Heart);
        assert_eq!(
            Shape::effective(ParticlePattern::Cube, false),
            Shape::Pattern(ParticlePattern::Cube)
        );
    }

    #[test]
    fn expansion_eases_to_target() {
        let state = AppState::default();
        let mut f = ParticleField::new(10, Some(1), &state);
        assert_eq!(f.expansion(), 1.0);
        for _ in 0..200 { f.tick(1.0, 0.016); }
        assert!((f.expansion() - 2.0).abs() < 1e-3);
        for _ in 0..200 { f.tick(0.0, 0.016); }
        assert!((f.expansion() - 0.2).abs() < 1e-3);
    }

    #[test]
    fn one_tick_moves_a_tenth_of_the_way() {
        let mut f = ParticleField::new(10, Some(1), &AppState::default());
        f.tick(0.0, 0.016);
        // 1.0 + (0.2 - 1.0) · 0.1
        assert!((f.expansion() - 0.92).abs() < 1e-6);
        let (ry, rz) = f.rotation();
        assert!((ry - 0.001).abs() < 1e-7);
        assert!((rz - 0.0005).abs() < 1e-7);
    }

    #[test]
    fn regenerates_only_on_shape_change() {
        let mut state = AppState::default();
        let mut f = ParticleField::new(100, Some(3), &state);
        let first = f.positions().to_vec();

        state.set_particle_color(HexColor::new(255, 0, 0));
        assert!(!f.sync(&state));
        assert_eq!(f.generation(), 0);
        assert_eq!(f.positions(), &first[..]);

        state.apply_gestures(&FrameUpdate { finger_heart: Some(true), ..FrameUpdate::default() });
        assert!(f.sync(&state));
        assert_eq!(f.shape(), Shape::Heart);

        // Changing the selection under the heart does not regenerate.
        state.set_particle_pattern(ParticlePattern::Torus);
        assert!(!f.sync(&state));
        assert_eq!(f.generation(), 1);

        state.apply_gestures(&FrameUpdate { finger_heart: Some(false), ..FrameUpdate::default() });
        assert!(f.sync(&state));
        assert_eq!(f.shape(), Shape::Pattern(ParticlePattern::Torus));
        assert_eq!(f.generation(), 2);
        assert_eq!(f.positions().len(), 100);
    }

    #[test]
    fn origin_projects_to_centre() {
        let (x, y, size) = project_point([0.0, 0.0, 0.0], &Camera::default(), 800, 600).unwrap();
        assert!((x - 400.0).abs() < 1e-3);
        assert!((y - 300.0).abs() < 1e-3);
        assert!((size - 12.0).abs() < 1e-4);
    }

    #[test]
    fn top_of_frustum_is_top_of_screen() {
        let edge = CAMERA_Z * half_fov().tan();
        let (_, y, _) = project_point([0.0, edge, 0.0], &Camera::default(), 800, 600).unwrap();
        assert!(y.abs() < 1e-2);
    }

    #[test]
    fn behind_camera_is_culled() {
        assert!(project_point([0.0, 0.0, CAMERA_Z + 1.0], &Camera::default(), 800, 600).is_none());
    }

    #[test]
    fn quarter_orbit_looks_down_the_x_axis() {
        let mut cam = Camera::default();
        cam.orbit(FRAC_PI_2, 0.0);
        // The camera now sits on +x, so a point on +x is straight ahead and 3 closer.
        let (x, y, size) = project_point([3.0, 0.0, 0.0], &cam, 800, 600).unwrap();
        assert!((x - 400.0).abs() < 1e-2);
        assert!((y - 300.0).abs() < 1e-2);
        assert!((size - 120.0 / 7.0).abs() < 1e-3);
        // and the original line of sight now runs across the screen
        let (x, _, _) = project_point([0.0, 0.0, 3.0], &cam, 800, 600).unwrap();
        assert!(x < 400.0);
    }

    #[test]
    fn pitch_up_moves_origin_plane_down() {
        let mut cam = Camera::default();
        cam.orbit(0.0, 0.5);
        let (_, y, _) = project_point([0.0, 0.0, 3.0], &cam, 800, 600).unwrap();
        assert!(y > 300.0);
    }

    #[test]
    fn pitch_stops_short_of_the_poles() {
        let mut cam = Camera::default();
        cam.orbit(0.0, 10.0);
        assert!(cam.pitch() < FRAC_PI_2);
        cam.orbit(0.0, -20.0);
        assert!(cam.pitch() > -FRAC_PI_2);
        cam.orbit(f32::NAN, f32::NAN);
        assert!(cam.pitch().is_finite() && cam.yaw().is_finite());
    }

    #[test]
    fn zoom_scales_distance_within_limits() {
        let mut cam = Camera::default();
        cam.zoom(1.0);
        assert!((cam.distance() - CAMERA_Z * 0.95).abs() < 1e-5);
        cam.zoom(-1.0);
        assert!((cam.distance() - CAMERA_Z).abs() < 1e-4);
        cam.zoom(1000.0);
        assert_eq!(cam.distance(), MIN_DISTANCE);
        cam.zoom(-1000.0);
        assert_eq!(cam.distance(), MAX_DISTANCE);
    }

    #[test]
    fn zooming_in_enlarges_sprites() {
        let mut f = ParticleField::new(50, Some(4), &AppState::default());
        let mut far = Vec::new();
        f.project(640, 480, &mut far);
        f.zoom(5.0);
        let mut near = Vec::new();
        f.project(640, 480, &mut near);
        let mean = |v: &[Sprite]| v.iter().map(|s| s.size).sum::<f32>() / v.len() as f32;
        assert!(mean(&near) > mean(&far));
        assert!(f.camera().distance() < CAMERA_Z);
    }

    #[test]
    fn projection_tints_by_distance() {
        let state = AppState::new(HexColor::new(0, 0, 0), ParticlePattern::Sphere);
        let f = ParticleField::new(500, Some(9), &state);
        let mut sprites = Vec::new();
        f.project(640, 480, &mut sprites);
        assert_eq!(sprites.len(), 500);
        assert!(sprites.iter().all(|s| s.color[0] >= 0.0 && s.color[0] == s.color[2]));
        assert!(sprites.iter().any(|s| s.color[0] > 0.1));
    }
}
