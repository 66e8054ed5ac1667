use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CheckInSettings {
    /// Geofence radius around each tenant's office
    #[serde(default)]
    pub office_radius_meters: f64,

    /// Minimum oracle similarity (0-100) accepted for PAID tenants
    #[serde(default)]
    pub face_similarity_threshold: f64,
}

impl Default for CheckInSettings {
    fn default() -> Self {
        Self {
            office_radius_meters: 100.0,
            face_similarity_threshold: 90.0,
        }
    }
}
