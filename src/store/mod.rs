//! HUD state store
//!
//! Flat reactive container for everything the HUD surfaces: connection
//! status, vehicle telemetry, detections plus the derived collision-risk
//! flag, GPS map state with a bounded path history, and solar irradiance.
//! The session core and the REST pollers write through the `HudSinks`
//! implementation and a few extra setters; view code reads snapshots.

use log::debug;
use parking_lot::{Mutex, RwLock};
use std::time::SystemTime;
use tokio::sync::watch;

use crate::session::messages::{Detection, DetectionClass, ModelSelection, TelemetryUpdate};
use crate::session::{ConnectionStatus, HudSinks};

/// Full telemetry state, merged from partial updates.
#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    /// km/h
    pub speed: f64,
    /// 0-100
    pub battery_percent: f64,
    /// kW
    pub consumption: f64,
    /// km
    pub range: f64,
    /// Celsius
    pub battery1_temp: f64,
    pub battery2_temp: f64,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self {
            speed: 0.0,
            battery_percent: 100.0,
            consumption: 0.0,
            range: 0.0,
            battery1_temp: 0.0,
            battery2_temp: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// GPS map state with a polyline history of recent positions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapState {
    pub latitude: f64,
    pub longitude: f64,
    /// Degrees, 0 = north
    pub heading: f64,
    pub path_history: Vec<GeoPoint>,
}

/// Partial map update; absent fields keep their previous value.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapUpdate {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub heading: Option<f64>,
}

/// Solar irradiance readings in W/m².
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SolarIrradiance {
    /// Global horizontal irradiance
    pub ghi: f64,
    /// Direct normal irradiance
    pub dni: f64,
    /// Diffuse horizontal irradiance
    pub dhi: f64,
}

// Collision ROI: the patch of normalized image space directly ahead of the
// vehicle. A cone overlapping it for 3 consecutive frames raises the risk
// flag.
const DANGER_ROI_X_MIN: f64 = 0.35;
const DANGER_ROI_X_MAX: f64 = 0.65;
const DANGER_ROI_Y_MIN: f64 = 0.55;
const DANGER_ROI_Y_MAX: f64 = 1.0;
const HAZARD_CONFIDENCE_MIN: f64 = 0.6;
const HAZARD_AREA_MIN: f64 = 0.02;
const RISK_FRAME_THRESHOLD: u32 = 3;

/// Maximum retained path points (~2 minutes at 1 Hz with margin).
const PATH_HISTORY_LIMIT: usize = 200;
/// Minimum per-axis movement in degrees before a new path point is added.
const PATH_MIN_DELTA_DEG: f64 = 1e-4;

fn is_hazard(detection: &Detection) -> bool {
    detection.class == DetectionClass::Cone
        && detection.confidence > HAZARD_CONFIDENCE_MIN
        && detection.w * detection.h > HAZARD_AREA_MIN
        && !(detection.x + detection.w < DANGER_ROI_X_MIN
            || detection.x > DANGER_ROI_X_MAX
            || detection.y + detection.h < DANGER_ROI_Y_MIN
            || detection.y > DANGER_ROI_Y_MAX)
}

/// Shared HUD state. One instance per process, `Arc`-shared between the
/// session core, the pollers and view code.
pub struct HudStore {
    connection: watch::Sender<ConnectionStatus>,
    telemetry: RwLock<Telemetry>,
    detections: RwLock<Vec<Detection>>,
    consecutive_risk_frames: Mutex<u32>,
    cone_collision_risk: RwLock<bool>,
    map: RwLock<MapState>,
    solar: RwLock<SolarIrradiance>,
    solar_updated: RwLock<Option<SystemTime>>,
    active_model: RwLock<ModelSelection>,
    inference_enabled: RwLock<bool>,
}

impl HudStore {
    pub fn new() -> Self {
        let (connection, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            connection,
            telemetry: RwLock::new(Telemetry::default()),
            detections: RwLock::new(Vec::new()),
            consecutive_risk_frames: Mutex::new(0),
            cone_collision_risk: RwLock::new(false),
            map: RwLock::new(MapState::default()),
            solar: RwLock::new(SolarIrradiance::default()),
            solar_updated: RwLock::new(None),
            active_model: RwLock::new(ModelSelection::Cone),
            inference_enabled: RwLock::new(true),
        }
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        *self.connection.borrow()
    }

    /// Watch connection status changes (for status indicators).
    pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionStatus> {
        self.connection.subscribe()
    }

    pub fn telemetry(&self) -> Telemetry {
        self.telemetry.read().clone()
    }

    pub fn detections(&self) -> Vec<Detection> {
        self.detections.read().clone()
    }

    pub fn cone_collision_risk(&self) -> bool {
        *self.cone_collision_risk.read()
    }

    pub fn map(&self) -> MapState {
        self.map.read().clone()
    }

    pub fn solar(&self) -> SolarIrradiance {
        *self.solar.read()
    }

    pub fn solar_updated(&self) -> Option<SystemTime> {
        *self.solar_updated.read()
    }

    pub fn active_model(&self) -> ModelSelection {
        *self.active_model.read()
    }

    pub fn set_active_model(&self, model: ModelSelection) {
        *self.active_model.write() = model;
    }

    pub fn inference_enabled(&self) -> bool {
        *self.inference_enabled.read()
    }

    pub fn set_inference_enabled(&self, enabled: bool) {
        *self.inference_enabled.write() = enabled;
    }

    pub fn update_solar(&self, solar: SolarIrradiance) {
        *self.solar.write() = solar;
        *self.solar_updated.write() = Some(SystemTime::now());
    }

    /// Apply a GPS fix. The path history grows only when the position moved
    /// more than `PATH_MIN_DELTA_DEG` on either axis, and is capped at
    /// `PATH_HISTORY_LIMIT` points (oldest dropped).
    pub fn update_map(&self, update: MapUpdate) {
        let mut map = self.map.write();
        if let Some(latitude) = update.latitude {
            map.latitude = latitude;
        }
        if let Some(longitude) = update.longitude {
            map.longitude = longitude;
        }
        if let Some(heading) = update.heading {
            map.heading = heading;
        }

        if let (Some(latitude), Some(longitude)) = (update.latitude, update.longitude) {
            let moved = match map.path_history.last() {
                None => true,
                Some(last) => {
                    (last.latitude - latitude).abs() > PATH_MIN_DELTA_DEG
                        || (last.longitude - longitude).abs() > PATH_MIN_DELTA_DEG
                }
            };
            if moved {
                map.path_history.push(GeoPoint {
                    latitude,
                    longitude,
                });
                if map.path_history.len() > PATH_HISTORY_LIMIT {
                    map.path_history.remove(0);
                }
            }
        }
    }
}

impl Default for HudStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HudSinks for HudStore {
    fn set_connection_status(&self, status: ConnectionStatus) {
        self.connection.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            debug!("Connection status: {} -> {}", current.as_str(), status.as_str());
            *current = status;
            true
        });
    }

    fn update_telemetry(&self, update: TelemetryUpdate) {
        let mut telemetry = self.telemetry.write();
        if let Some(speed) = update.speed {
            telemetry.speed = speed;
        }
        if let Some(battery_percent) = update.battery_percent {
            telemetry.battery_percent = battery_percent;
        }
        if let Some(consumption) = update.consumption {
            telemetry.consumption = consumption;
        }
        if let Some(range) = update.range {
            telemetry.range = range;
        }
        if let Some(battery1_temp) = update.battery1_temp {
            telemetry.battery1_temp = battery1_temp;
        }
        if let Some(battery2_temp) = update.battery2_temp {
            telemetry.battery2_temp = battery2_temp;
        }
    }

    fn update_detections(&self, detections: Vec<Detection>) {
        let hazard = detections.iter().any(is_hazard);

        let mut frames = self.consecutive_risk_frames.lock();
        *frames = if hazard { *frames + 1 } else { 0 };
        let risk = *frames >= RISK_FRAME_THRESHOLD;
        drop(frames);

        *self.cone_collision_risk.write() = risk;
        *self.detections.write() = detections;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cone(x: f64, y: f64, w: f64, h: f64, confidence: f64) -> Detection {
        Detection {
            class: DetectionClass::Cone,
            confidence,
            x,
            y,
            w,
            h,
        }
    }

    fn danger_cone() -> Detection {
        cone(0.45, 0.7, 0.2, 0.2, 0.9)
    }

    #[test]
    fn test_telemetry_partial_merge() {
        let store = HudStore::new();
        store.update_telemetry(TelemetryUpdate {
            speed: Some(18.0),
            battery_percent: Some(72.0),
            ..Default::default()
        });
        store.update_telemetry(TelemetryUpdate {
            speed: Some(19.5),
            ..Default::default()
        });

        let telemetry = store.telemetry();
        assert_eq!(telemetry.speed, 19.5);
        assert_eq!(telemetry.battery_percent, 72.0);
        assert_eq!(telemetry.consumption, 0.0);
    }

    #[test]
    fn test_collision_risk_needs_three_consecutive_frames() {
        let store = HudStore::new();

        store.update_detections(vec![danger_cone()]);
        assert!(!store.cone_collision_risk());
        store.update_detections(vec![danger_cone()]);
        assert!(!store.cone_collision_risk());
        store.update_detections(vec![danger_cone()]);
        assert!(store.cone_collision_risk());

        // One clean frame resets the counter and clears the flag.
        store.update_detections(vec![]);
        assert!(!store.cone_collision_risk());
        store.update_detections(vec![danger_cone()]);
        assert!(!store.cone_collision_risk());
    }

    #[test]
    fn test_low_confidence_cone_is_not_a_hazard() {
        let store = HudStore::new();
        for _ in 0..5 {
            store.update_detections(vec![cone(0.45, 0.7, 0.2, 0.2, 0.5)]);
        }
        assert!(!store.cone_collision_risk());
    }

    #[test]
    fn test_small_cone_is_not_a_hazard() {
        // Confident cone in the ROI but under the 2% area floor.
        let store = HudStore::new();
        for _ in 0..5 {
            store.update_detections(vec![cone(0.45, 0.7, 0.1, 0.1, 0.9)]);
        }
        assert!(!store.cone_collision_risk());
    }

    #[test]
    fn test_cone_outside_roi_is_not_a_hazard() {
        // Big confident cone far left of the vehicle's path.
        let store = HudStore::new();
        for _ in 0..5 {
            store.update_detections(vec![cone(0.0, 0.7, 0.2, 0.2, 0.9)]);
        }
        assert!(!store.cone_collision_risk());
    }

    #[test]
    fn test_pothole_never_raises_cone_risk() {
        let store = HudStore::new();
        let pothole = Detection {
            class: DetectionClass::Pothole,
            ..danger_cone()
        };
        for _ in 0..5 {
            store.update_detections(vec![pothole.clone()]);
        }
        assert!(!store.cone_collision_risk());
    }

    #[test]
    fn test_path_history_skips_jitter() {
        let store = HudStore::new();
        store.update_map(MapUpdate {
            latitude: Some(60.0),
            longitude: Some(24.0),
            heading: Some(90.0),
        });
        // Sub-threshold wobble on both axes: no new point.
        store.update_map(MapUpdate {
            latitude: Some(60.00005),
            longitude: Some(24.00005),
            heading: None,
        });
        store.update_map(MapUpdate {
            latitude: Some(60.001),
            longitude: Some(24.0),
            heading: None,
        });

        let map = store.map();
        assert_eq!(map.path_history.len(), 2);
        assert_eq!(map.heading, 90.0);
        assert_eq!(map.latitude, 60.001);
    }

    #[test]
    fn test_path_history_is_bounded() {
        let store = HudStore::new();
        for i in 0..250 {
            store.update_map(MapUpdate {
                latitude: Some(60.0 + i as f64 * 0.001),
                longitude: Some(24.0),
                heading: None,
            });
        }
        let map = store.map();
        assert_eq!(map.path_history.len(), 200);
        // Oldest points were dropped.
        assert!(map.path_history[0].latitude > 60.0);
    }

    #[test]
    fn test_status_watch_notifies_on_change_only() {
        let store = HudStore::new();
        let rx = store.subscribe_connection();

        store.set_connection_status(ConnectionStatus::Disconnected);
        assert!(!rx.has_changed().unwrap());

        store.set_connection_status(ConnectionStatus::Connecting);
        assert!(rx.has_changed().unwrap());
        assert_eq!(store.connection_status(), ConnectionStatus::Connecting);
    }
}
