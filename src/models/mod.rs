use serde::{Deserialize, Serialize};

pub mod crew;
pub mod progress_report;
pub mod report;
pub mod task;
pub mod user;

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}
