//! Calibrated projection between image pixels, the camera frame and the
//! world plane `z = 0` of the extrinsic pose.
//!
//! Pixel points use `x = column`, `y = row`.

use nalgebra::{Point2, Point3, Vector3};

use crate::calibration::{CalibrationStore, CameraIntrinsics};

impl CameraIntrinsics {
    /// Undistorted sensor-plane coordinates (meters) of a pixel.
    pub fn pixel_to_sensor(&self, pixel: Point2<f64>) -> Point2<f64> {
        let (sx, sy) = self.pixel_pitch();
        let (cx, cy) = self.principal_point();
        let ud = (pixel.x - cx) * sx;
        let vd = (pixel.y - cy) * sy;
        let denom = 1.0 + self.kappa() * (ud * ud + vd * vd);
        Point2::new(ud / denom, vd / denom)
    }

    /// Pixel of an undistorted sensor-plane point, `None` outside the
    /// invertible domain of the distortion.
    pub fn sensor_to_pixel(&self, sensor: Point2<f64>) -> Option<Point2<f64>> {
        let r2 = sensor.x * sensor.x + sensor.y * sensor.y;
        let disc = 1.0 - 4.0 * self.kappa() * r2;
        if disc < 0.0 {
            return None;
        }
        let f = 2.0 / (1.0 + disc.sqrt());
        let (sx, sy) = self.pixel_pitch();
        let (cx, cy) = self.principal_point();
        let out = Point2::new(sensor.x * f / sx + cx, sensor.y * f / sy + cy);
        (out.x.is_finite() && out.y.is_finite()).then_some(out)
    }

    /// Viewing ray through a pixel in camera coordinates (not normalized).
    pub fn pixel_ray(&self, pixel: Point2<f64>) -> Vector3<f64> {
        let s = self.pixel_to_sensor(pixel);
        Vector3::new(s.x, s.y, self.focus())
    }

    /// Project a camera-frame point. Points at or behind the camera center
    /// are rejected.
    pub fn project(&self, p_cam: &Point3<f64>) -> Option<Point2<f64>> {
        if p_cam.z <= f64::EPSILON {
            return None;
        }
        let f = self.focus();
        self.sensor_to_pixel(Point2::new(f * p_cam.x / p_cam.z, f * p_cam.y / p_cam.z))
    }
}

impl CalibrationStore {
    /// Intersect the viewing ray of `pixel` with the world plane.
    ///
    /// Returns the world point (`z = 0`) in meters, or `None` when the ray is
    /// parallel to the plane or hits it behind the camera.
    pub fn pixel_to_world_plane(&self, pixel: Point2<f64>) -> Option<Point2<f64>> {
        let iso = self.pose().to_isometry();
        let ray = self.intrinsics().pixel_ray(pixel);
        let normal = iso.rotation * Vector3::z();
        let t = iso.translation.vector;
        let denom = normal.dot(&ray);
        if denom.abs() < 1e-15 {
            return None;
        }
        let lambda = normal.dot(&t) / denom;
        if lambda <= 0.0 {
            return None;
        }
        let p_cam = Point3::from(ray * lambda);
        let p_world = iso.inverse_transform_point(&p_cam);
        Some(Point2::new(p_world.x, p_world.y))
    }

    /// Back-project pixels onto the world plane, dividing plane coordinates
    /// by `scale` (1.0 yields meters).
    pub fn image_points_to_world_plane(
        &self,
        pixels: &[Point2<f64>],
        scale: f64,
    ) -> Vec<Option<Point2<f64>>> {
        pixels
            .iter()
            .map(|&p| self.pixel_to_world_plane(p).map(|w| Point2::new(w.x / scale, w.y / scale)))
            .collect()
    }

    /// Camera-frame position of a world-plane point.
    pub fn world_plane_to_camera(&self, world: Point2<f64>) -> Point3<f64> {
        self.pose()
            .to_isometry()
            .transform_point(&Point3::new(world.x, world.y, 0.0))
    }

    /// Pixel of a world-plane point.
    pub fn world_plane_to_pixel(&self, world: Point2<f64>) -> Option<Point2<f64>> {
        self.intrinsics().project(&self.world_plane_to_camera(world))
    }

    /// Camera-frame position of the world-plane point seen at `pixel`.
    pub fn pixel_to_camera_on_plane(&self, pixel: Point2<f64>) -> Option<Point3<f64>> {
        self.pixel_to_world_plane(pixel)
            .map(|w| self.world_plane_to_camera(w))
    }
}
