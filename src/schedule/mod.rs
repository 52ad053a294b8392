//! Construction of externally-transferable schedule views.
//!
//! Pure and stateless: given a route and the blocks serving it, produce
//! one immutable [`IpcSchedule`] per (service, direction) combination.
//! Independent of the core context; invoked per request by the
//! configuration-readback endpoint.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Block, Route, Trip};

/// Groups trips only; equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ServiceDirectionKey {
    service_id: String,
    direction_id: String,
}

/// Schedule time at one stop of a transferable trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct IpcStopTime {
    pub stop_id: String,
    /// Seconds into the service day; absent for stops without timepoints.
    pub time_secs: Option<i32>,
}

/// Immutable projection of a trip for external transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct IpcScheduleTrip {
    pub trip_id: String,
    pub block_id: String,
    pub headsign: String,
    pub stop_times: Vec<IpcStopTime>,
}

impl IpcScheduleTrip {
    fn from_trip(trip: &Trip) -> Self {
        Self {
            trip_id: trip.id.clone(),
            block_id: trip.block_id.clone(),
            headsign: trip.headsign.clone(),
            stop_times: trip
                .stops
                .iter()
                .map(|s| IpcStopTime {
                    stop_id: s.stop_id.clone(),
                    time_secs: s.schedule_time.and_then(|st| st.time()),
                })
                .collect(),
        }
    }
}

/// The schedule for one route/service/direction, fully populated before it
/// is returned and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct IpcSchedule {
    pub route_id: String,
    pub route_name: String,
    pub direction_id: String,
    pub direction_name: String,
    pub service_id: String,
    pub service_name: String,
    pub trips: Vec<IpcScheduleTrip>,
}

/// Mutable working state for one (service, direction) group. Exists only
/// during [`build_schedules`] and is discarded once the immutable
/// [`IpcSchedule`] has been produced; it is never serialized.
struct ScheduleAccumulator<'a> {
    route: &'a Route,
    direction_id: String,
    direction_name: String,
    service_id: String,
    service_name: String,
    trips: Vec<&'a Trip>,
}

impl<'a> ScheduleAccumulator<'a> {
    fn finish(mut self) -> IpcSchedule {
        // Stable sort: pairs the comparator cannot order keep their
        // relative input order.
        self.trips.sort_by(|a, b| compare_trips(a, b));
        IpcSchedule {
            route_id: self.route.id.clone(),
            route_name: self.route.name.clone(),
            direction_id: self.direction_id,
            direction_name: self.direction_name,
            service_id: self.service_id,
            service_name: self.service_name,
            trips: self
                .trips
                .iter()
                .map(|t| IpcScheduleTrip::from_trip(t))
                .collect(),
        }
    }
}

/// Order two trips by the first stop they are both scheduled at.
///
/// Trips of the same route/direction do not necessarily share every stop
/// (short-turns, branches), so the comparator scans `a`'s stop path for
/// the first stop with a defined time, then looks for that same stop with
/// a defined time anywhere in `b` and compares the two times of day.
///
/// Trips with no common timed stop compare as `Equal`. That conflates
/// "equal" with "incomparable" and makes the relation a partial order: it
/// can be non-transitive across three trips with pairwise-disjoint timed
/// stops. Kept for compatibility with the schedules this was built
/// against; callers rely on stable sorting for a deterministic result.
pub fn compare_trips(a: &Trip, b: &Trip) -> Ordering {
    for stop_a in &a.stops {
        let Some(time_a) = stop_a.schedule_time.and_then(|st| st.time()) else {
            continue;
        };
        for stop_b in &b.stops {
            if stop_b.stop_id != stop_a.stop_id {
                continue;
            }
            if let Some(time_b) = stop_b.schedule_time.and_then(|st| st.time()) {
                return time_a.cmp(&time_b);
            }
        }
    }
    Ordering::Equal
}

/// Build one schedule per (service, direction) combination found in the
/// blocks. Interlined trips belonging to other routes are dropped. Output
/// is ordered by (service_id, direction_id).
pub fn build_schedules(route: &Route, blocks: &[&Block]) -> Vec<IpcSchedule> {
    let mut groups: HashMap<ServiceDirectionKey, ScheduleAccumulator> = HashMap::new();

    for block in blocks {
        // The original data uses the service id as its display name.
        let service_id = &block.service_id;
        let service_name = service_id.clone();

        for trip in &block.trips {
            // Interlined blocks carry trips of other routes; a per-route
            // view must not include them.
            if trip.route_id != route.id {
                continue;
            }

            let key = ServiceDirectionKey {
                service_id: service_id.clone(),
                direction_id: trip.direction_id.clone(),
            };
            groups
                .entry(key)
                .or_insert_with(|| ScheduleAccumulator {
                    route,
                    direction_id: trip.direction_id.clone(),
                    direction_name: trip.headsign.clone(),
                    service_id: service_id.clone(),
                    service_name: service_name.clone(),
                    trips: Vec::new(),
                })
                .trips
                .push(trip);
        }
    }

    let mut schedules: Vec<IpcSchedule> =
        groups.into_values().map(ScheduleAccumulator::finish).collect();
    schedules.sort_by(|a, b| {
        (a.service_id.as_str(), a.direction_id.as_str())
            .cmp(&(b.service_id.as_str(), b.direction_id.as_str()))
    });
    schedules
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ScheduleTime, TripStop};

    fn timed_stop(stop_id: &str, secs: i32) -> TripStop {
        TripStop {
            stop_id: stop_id.to_string(),
            schedule_time: Some(ScheduleTime {
                arrival_secs: None,
                departure_secs: Some(secs),
            }),
        }
    }

    fn untimed_stop(stop_id: &str) -> TripStop {
        TripStop {
            stop_id: stop_id.to_string(),
            schedule_time: None,
        }
    }

    fn trip(id: &str, route_id: &str, direction_id: &str, stops: Vec<TripStop>) -> Trip {
        Trip {
            id: id.to_string(),
            route_id: route_id.to_string(),
            service_id: "weekday".to_string(),
            direction_id: direction_id.to_string(),
            headsign: "Downtown".to_string(),
            block_id: "b1".to_string(),
            stops,
        }
    }

    fn route() -> Route {
        Route {
            id: "12".to_string(),
            name: "12 Folsom".to_string(),
            color: None,
        }
    }

    fn block(trips: Vec<Trip>) -> Block {
        Block {
            id: "b1".to_string(),
            service_id: "weekday".to_string(),
            trips,
        }
    }

    #[test]
    fn orders_by_first_common_timed_stop() {
        // 08:00 and 08:15 at the shared stop S5, no other stop in common.
        let early = trip(
            "early",
            "12",
            "0",
            vec![untimed_stop("s1"), timed_stop("s5", 8 * 3600)],
        );
        let late = trip(
            "late",
            "12",
            "0",
            vec![timed_stop("s5", 8 * 3600 + 900), untimed_stop("s9")],
        );

        assert_eq!(compare_trips(&early, &late), Ordering::Less);
        assert_eq!(compare_trips(&late, &early), Ordering::Greater);

        // Regardless of input order the earlier trip comes out first.
        let b = block(vec![late.clone(), early.clone()]);
        let schedules = build_schedules(&route(), &[&b]);
        assert_eq!(schedules.len(), 1);
        let ids: Vec<&str> = schedules[0].trips.iter().map(|t| t.trip_id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn skips_untimed_occurrences_of_the_common_stop() {
        // s5 appears in both trips but only carries a time in one of them;
        // the comparator must keep scanning until a timed pair exists.
        let a = trip(
            "a",
            "12",
            "0",
            vec![timed_stop("s5", 100), timed_stop("s7", 200)],
        );
        let b = trip(
            "b",
            "12",
            "0",
            vec![untimed_stop("s5"), timed_stop("s7", 150)],
        );
        assert_eq!(compare_trips(&a, &b), Ordering::Greater);
    }

    #[test]
    fn interlined_trips_of_other_routes_are_excluded() {
        let ours = trip("t12", "12", "0", vec![timed_stop("s1", 100)]);
        let interlined = trip("t14", "14", "0", vec![timed_stop("s1", 50)]);
        let b = block(vec![interlined, ours]);

        let schedules = build_schedules(&route(), &[&b]);
        assert_eq!(schedules.len(), 1);
        assert_eq!(schedules[0].trips.len(), 1);
        assert_eq!(schedules[0].trips[0].trip_id, "t12");
    }

    #[test]
    fn no_common_stop_keeps_stable_order_without_error() {
        let a = trip("a", "12", "0", vec![timed_stop("s1", 300)]);
        let b = trip("b", "12", "0", vec![timed_stop("s2", 100)]);
        assert_eq!(compare_trips(&a, &b), Ordering::Equal);

        let blk = block(vec![a, b]);
        let first = build_schedules(&route(), &[&blk]);
        let ids: Vec<&str> = first[0].trips.iter().map(|t| t.trip_id.as_str()).collect();
        // Incomparable pair: input order preserved, deterministic across
        // repeated runs of the same input.
        assert_eq!(ids, vec!["a", "b"]);
        for _ in 0..10 {
            assert_eq!(build_schedules(&route(), &[&blk]), first);
        }
    }

    #[test]
    fn one_schedule_per_service_direction_combination() {
        let inbound = trip("t1", "12", "0", vec![timed_stop("s1", 100)]);
        let outbound = trip("t2", "12", "1", vec![timed_stop("s1", 200)]);
        let saturday = Block {
            id: "b2".to_string(),
            service_id: "saturday".to_string(),
            trips: vec![trip("t3", "12", "0", vec![timed_stop("s1", 300)])],
        };
        let weekday = block(vec![inbound, outbound]);

        let schedules = build_schedules(&route(), &[&weekday, &saturday]);
        let keys: Vec<(&str, &str)> = schedules
            .iter()
            .map(|s| (s.service_id.as_str(), s.direction_id.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![("saturday", "0"), ("weekday", "0"), ("weekday", "1")]
        );
        for schedule in &schedules {
            assert_eq!(schedule.route_id, "12");
            assert_eq!(schedule.route_name, "12 Folsom");
            assert_eq!(schedule.service_name, schedule.service_id);
        }
    }

    #[test]
    fn wire_form_round_trips_and_carries_no_working_state() {
        let t = trip(
            "t1",
            "12",
            "0",
            vec![timed_stop("s1", 28_800), untimed_stop("s2")],
        );
        let b = block(vec![t]);
        let schedules = build_schedules(&route(), &[&b]);

        let json = serde_json::to_value(&schedules[0]).unwrap();
        let mut keys: Vec<&str> =
            json.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        // The six scalar fields plus the ordered trips, and nothing else:
        // the working accumulator never reaches the wire form.
        assert_eq!(
            keys,
            vec![
                "direction_id",
                "direction_name",
                "route_id",
                "route_name",
                "service_id",
                "service_name",
                "trips"
            ]
        );

        let decoded: IpcSchedule = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, schedules[0]);
        assert_eq!(decoded.trips[0].stop_times[0].time_secs, Some(28_800));
        assert_eq!(decoded.trips[0].stop_times[1].time_secs, None);
    }
}
