//! Reference ellipsoid and geodetic placement.
//!
//! Converts geographic coordinates (longitude, latitude in degrees, height in
//! meters) into an earth-centered Cartesian position and builds the placement
//! matrix that stands an asset upright on the ellipsoid surface.

use cgmath::{Deg, InnerSpace, Matrix4, Rad, Vector3};

/// An ellipsoid of revolution described by its semi-major (equatorial) and
/// semi-minor (polar) axes in meters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ellipsoid {
    pub semi_major: f64,
    pub semi_minor: f64,
}

/// WGS84 reference ellipsoid.
pub const WGS84: Ellipsoid = Ellipsoid {
    semi_major: 6_378_137.0,
    semi_minor: 6_356_752.314_245_179_3,
};

/// Unit sphere, handy for debugging placements without earth-sized numbers.
pub const UNIT_SPHERE: Ellipsoid = Ellipsoid {
    semi_major: 1.0,
    semi_minor: 1.0,
};

/// Longitude/latitude in radians plus height in meters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Geographic {
    pub longitude: f64,
    pub latitude: f64,
    pub height: f64,
}

impl Geographic {
    pub fn from_degrees(lng: f64, lat: f64, height: f64) -> Self {
        Self {
            longitude: Rad::from(Deg(lng)).0,
            latitude: Rad::from(Deg(lat)).0,
            height,
        }
    }
}

impl Ellipsoid {
    pub fn maximum_radius(&self) -> f64 {
        self.semi_major.max(self.semi_minor)
    }

    /// Unit normal of the ellipsoid surface at the given geodetic position.
    pub fn geodetic_surface_normal(&self, geographic: &Geographic) -> Vector3<f64> {
        let (sin_lat, cos_lat) = geographic.latitude.sin_cos();
        let (sin_lng, cos_lng) = geographic.longitude.sin_cos();
        Vector3::new(cos_lat * cos_lng, cos_lat * sin_lng, sin_lat).normalize()
    }

    /// Geodetic to geocentric conversion.
    ///
    /// `N = a² / sqrt(a² cos²φ + b² sin²φ)` is the prime vertical radius of
    /// curvature; the point is `((N + h) cosφ cosλ, (N + h) cosφ sinλ,
    /// (b²/a² N + h) sinφ)`.
    pub fn geographic_to_space(&self, geographic: &Geographic) -> Vector3<f64> {
        let a2 = self.semi_major * self.semi_major;
        let b2 = self.semi_minor * self.semi_minor;
        let (sin_lat, cos_lat) = geographic.latitude.sin_cos();
        let (sin_lng, cos_lng) = geographic.longitude.sin_cos();
        let n = a2 / (a2 * cos_lat * cos_lat + b2 * sin_lat * sin_lat).sqrt();
        let h = geographic.height;
        Vector3::new(
            (n + h) * cos_lat * cos_lng,
            (n + h) * cos_lat * sin_lng,
            (b2 / a2 * n + h) * sin_lat,
        )
    }

    /// Placement matrix for an asset at `lng`/`lat` (degrees) and `height`
    /// (meters).
    ///
    /// With `vertical` set the result is
    /// `translate(surface) * rotate_z(lng - 90°) * rotate_x(lat) * scale`,
    /// which maps the asset's local y (up) axis onto the surface normal. The order
    /// must not change. Without `vertical` only the scale is applied and the
    /// asset sits at the ellipsoid center.
    pub fn placement(
        &self,
        lng: f64,
        lat: f64,
        height: f64,
        vertical: bool,
        scale: Vector3<f64>,
    ) -> Matrix4<f64> {
        let scale = Matrix4::from_nonuniform_scale(scale.x, scale.y, scale.z);
        if !vertical {
            return scale;
        }
        let surface = self.geographic_to_space(&Geographic::from_degrees(lng, lat, height));
        Matrix4::from_translation(surface)
            * Matrix4::from_angle_z(Deg(lng - 90.0))
            * Matrix4::from_angle_x(Deg(lat))
            * scale
    }
}

/// Placement on [`WGS84`].
pub fn placement(
    lng: f64,
    lat: f64,
    height: f64,
    vertical: bool,
    scale: Vector3<f64>,
) -> Matrix4<f64> {
    WGS84.placement(lng, lat, height, vertical, scale)
}
