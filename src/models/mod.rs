use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Route {
    pub id: String,
    pub name: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Stop {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

/// Scheduled arrival/departure at one stop along a trip. Either time can
/// be absent; `time()` is what ordering and display use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ScheduleTime {
    /// Seconds into the service day. Can exceed 24h for trips that run
    /// past midnight.
    pub arrival_secs: Option<i32>,
    pub departure_secs: Option<i32>,
}

impl ScheduleTime {
    /// The single representative time for this stop: departure when
    /// defined, otherwise arrival.
    pub fn time(&self) -> Option<i32> {
        self.departure_secs.or(self.arrival_secs)
    }
}

/// One stop along a trip's path, with its schedule time when one is
/// defined. Timepoint stops carry times; intermediate stops often do not.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TripStop {
    pub stop_id: String,
    pub schedule_time: Option<ScheduleTime>,
}

/// One scheduled run of a vehicle along a route.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Trip {
    pub id: String,
    pub route_id: String,
    pub service_id: String,
    pub direction_id: String,
    pub headsign: String,
    pub block_id: String,
    /// Ordered stop path for the trip.
    pub stops: Vec<TripStop>,
}

/// An ordered sequence of trips worked by one vehicle. Interlined blocks
/// can contain trips from several routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    pub service_id: String,
    pub trips: Vec<Trip>,
}

impl Block {
    /// Whether any trip of this block belongs to the given route.
    pub fn serves_route(&self, route_id: &str) -> bool {
        self.trips.iter().any(|t| t.route_id == route_id)
    }
}

/// A single vehicle position report from the AVL feed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AvlReport {
    pub vehicle_id: String,
    pub route_id: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    /// Epoch milliseconds of the report.
    pub time_ms: i64,
}

/// An arrival or departure event generated by the core.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ArrivalDeparture {
    pub vehicle_id: String,
    pub trip_id: String,
    pub route_id: String,
    pub stop_id: String,
    pub is_arrival: bool,
    /// Epoch milliseconds of the event.
    pub time_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_time_prefers_departure() {
        let st = ScheduleTime {
            arrival_secs: Some(100),
            departure_secs: Some(120),
        };
        assert_eq!(st.time(), Some(120));

        let st = ScheduleTime {
            arrival_secs: Some(100),
            departure_secs: None,
        };
        assert_eq!(st.time(), Some(100));

        let st = ScheduleTime {
            arrival_secs: None,
            departure_secs: None,
        };
        assert_eq!(st.time(), None);
    }

    #[test]
    fn block_serves_route_checks_all_trips() {
        let block = Block {
            id: "b1".to_string(),
            service_id: "weekday".to_string(),
            trips: vec![
                Trip {
                    id: "t1".to_string(),
                    route_id: "12".to_string(),
                    service_id: "weekday".to_string(),
                    direction_id: "0".to_string(),
                    headsign: "Downtown".to_string(),
                    block_id: "b1".to_string(),
                    stops: vec![],
                },
                Trip {
                    id: "t2".to_string(),
                    route_id: "14".to_string(),
                    service_id: "weekday".to_string(),
                    direction_id: "1".to_string(),
                    headsign: "Mission".to_string(),
                    block_id: "b1".to_string(),
                    stops: vec![],
                },
            ],
        };
        assert!(block.serves_route("12"));
        assert!(block.serves_route("14"));
        assert!(!block.serves_route("38"));
    }
}
