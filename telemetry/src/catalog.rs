/// Static description of a deployed sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorDescriptor {
    pub id: &'static str,
    pub zone: &'static str,
    pub latitude: f64,
    pub longitude: f64,
}

/// Every sensor the pipeline knows about. Readings from any other id are rejected.
pub const SENSOR_CATALOG: &[SensorDescriptor] = &[
    SensorDescriptor {
        id: "sensor-001",
        zone: "downtown",
        latitude: 40.7128,
        longitude: -74.0060,
    },
    SensorDescriptor {
        id: "sensor-002",
        zone: "downtown",
        latitude: 40.7142,
        longitude: -74.0087,
    },
    SensorDescriptor {
        id: "sensor-003",
        zone: "industrial",
        latitude: 40.6782,
        longitude: -73.9442,
    },
    SensorDescriptor {
        id: "sensor-004",
        zone: "residential",
        latitude: 40.7831,
        longitude: -73.9712,
    },
    SensorDescriptor {
        id: "sensor-005",
        zone: "harbor",
        latitude: 40.6892,
        longitude: -74.0445,
    },
];

pub fn find(sensor_id: &str) -> Option<&'static SensorDescriptor> {
    SENSOR_CATALOG.iter().find(|sensor| sensor.id == sensor_id)
}

pub fn is_known(sensor_id: &str) -> bool {
    find(sensor_id).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_unique() {
        let ids: HashSet<_> = SENSOR_CATALOG.iter().map(|s| s.id).collect();
        assert_eq!(ids.len(), SENSOR_CATALOG.len());
    }

    #[test]
    fn test_lookup() {
        assert_eq!(find("sensor-003").map(|s| s.zone), Some("industrial"));
        assert!(is_known("sensor-005"));
        assert!(!is_known("sensor-999"));
        assert!(!is_known(""));
    }
}
