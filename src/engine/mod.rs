use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::geo;
use crate::models::alert::Alert;
use crate::models::event::{AlertCreatedEvent, ResponderPositionEvent};
use crate::models::responder::{Responder, ResponderStatus};

pub mod policy;

pub use policy::DispatchPolicy;

/// One engine instance per monitoring session, shared between the consumer
/// loop and query-side callers. All mutation serializes on this lock.
pub type SharedEngine = Arc<tokio::sync::Mutex<DispatchEngine>>;

/// Result of applying one inbound event to the canonical collections.
#[derive(Debug, PartialEq, Eq)]
pub enum EventOutcome {
    AlertAdded(String),
    ResponderUpserted(String),
    /// Event was structurally parseable but unusable (missing coordinates).
    Rejected,
}

/// A responder annotated with its distance to one specific alert. Valid only
/// for the query that produced it; always recomputed, never cached.
#[derive(Debug, Clone, Serialize)]
pub struct RankedResponder {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub status: ResponderStatus,
    pub assigned_operations: Vec<String>,
    pub distance_km: f64,
}

/// Canonical owner of the session's Alert and Responder collections, plus the
/// nearest-responder assignment policy that works over them.
pub struct DispatchEngine {
    alerts: Vec<Alert>,
    responders: HashMap<String, Responder>,
    policy: DispatchPolicy,
    rejected_events: u64,
}

impl DispatchEngine {
    pub fn new(policy: DispatchPolicy) -> Self {
        Self {
            alerts: Vec::new(),
            responders: HashMap::new(),
            policy,
            rejected_events: 0,
        }
    }

    /// Appends a new alert. An id missing from the event is assigned here;
    /// events without numeric coordinates are rejected, counted, and otherwise
    /// ignored (best-effort stream, one bad message must never be fatal).
    pub fn add_alert(&mut self, event: AlertCreatedEvent, location_name: Option<String>) -> EventOutcome {
        let (lat, lon) = match (event.lat, event.lon) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => {
                self.rejected_events += 1;
                return EventOutcome::Rejected;
            }
        };

        let id = event
            .id
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let alert = Alert {
            id: id.clone(),
            name: event.name.unwrap_or_else(|| "Unknown".to_string()),
            phone: event.phone.unwrap_or_default(),
            lat,
            lon,
            location_name: location_name.unwrap_or_else(|| "Unknown".to_string()),
            ticket_status: "inlist".to_string(),
            created_at: Utc::now(),
        };

        info!("New alert {} from '{}' at ({}, {})", alert.id, alert.name, lat, lon);
        self.alerts.push(alert);
        EventOutcome::AlertAdded(id)
    }

    /// Upserts a responder from a position event, latest position wins.
    ///
    /// Status/assignment authority: an event that carries its own
    /// `assigned_operations` is a full snapshot and overwrites local
    /// assignment state; an event without it leaves a locally committed
    /// assignment intact so the next position ping cannot silently undo a
    /// dispatch decision.
    pub fn upsert_responder(&mut self, event: ResponderPositionEvent) -> EventOutcome {
        let (lat, lon) = match (event.lat, event.lon) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => {
                self.rejected_events += 1;
                return EventOutcome::Rejected;
            }
        };

        match self.responders.get_mut(&event.id) {
            Some(r) => {
                r.lat = lat;
                r.lon = lon;
                if let Some(name) = event.name {
                    r.name = name;
                }
                if let Some(ops) = event.assigned_operations {
                    r.assigned_operations = ops;
                    r.status = event.status;
                    r.locally_assigned = false;
                } else if !r.locally_assigned {
                    r.status = event.status;
                }
            }
            None => {
                let responder = Responder {
                    id: event.id.clone(),
                    name: event.name.unwrap_or_else(|| "Unknown".to_string()),
                    lat,
                    lon,
                    status: event.status,
                    assigned_operations: event.assigned_operations.unwrap_or_default(),
                    locally_assigned: false,
                };
                debug!("Tracking new responder {}", responder.id);
                self.responders.insert(event.id.clone(), responder);
            }
        }

        EventOutcome::ResponderUpserted(event.id)
    }

    /// Ranks every tracked responder by distance to the alert, nearest first.
    ///
    /// Offline and saturated units are ranked too; eligibility only matters to
    /// the assignment step. The sort is stable, so equal distances keep a
    /// consistent relative order across repeated queries on unchanged input.
    /// Returns a fresh snapshot list; canonical state is untouched.
    pub fn rank(&self, alert: &Alert) -> Vec<RankedResponder> {
        let mut list: Vec<RankedResponder> = self
            .responders
            .values()
            .map(|r| RankedResponder {
                id: r.id.clone(),
                name: r.name.clone(),
                lat: r.lat,
                lon: r.lon,
                status: r.status,
                assigned_operations: r.assigned_operations.clone(),
                distance_km: geo::distance_km(alert.lat, alert.lon, r.lat, r.lon),
            })
            .collect();

        list.sort_by(|a, b| {
            a.distance_km
                .partial_cmp(&b.distance_km)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        list
    }

    /// Records a dispatch decision on the canonical responder: flips it to
    /// `in-op` and appends the alert id if not already present. Idempotent per
    /// alert/responder pair and refuses to push a responder past the
    /// concurrent-operations cap. Returns false when nothing was committed.
    pub fn commit_assignment(&mut self, alert_id: &str, responder_id: &str) -> bool {
        let Some(r) = self.responders.get_mut(responder_id) else {
            return false;
        };

        let already_assigned = r.assigned_operations.iter().any(|op| op == alert_id);
        if !already_assigned && r.assigned_operations.len() >= self.policy.max_concurrent_ops {
            return false;
        }

        r.status = ResponderStatus::InOp;
        if !already_assigned {
            r.assigned_operations.push(alert_id.to_string());
            info!("Assigned alert {} to responder {}", alert_id, responder_id);
        }
        r.locally_assigned = true;
        true
    }

    /// The presentation query: rank all responders against the selected alert,
    /// apply the assignment policy once, and return the ranked view reflecting
    /// any commit. At most one responder is mutated per call, and re-querying
    /// the same alert is idempotent. `None` when the alert id is unknown.
    pub fn ranked_and_assigned(&mut self, alert_id: &str) -> Option<Vec<RankedResponder>> {
        let alert = self.alerts.iter().find(|a| a.id == alert_id)?.clone();
        let mut ranked = self.rank(&alert);

        if let Some(responder_id) = self.policy.recommend(&ranked) {
            if self.commit_assignment(&alert.id, &responder_id) {
                // Patch the affected entry so the returned view matches the
                // canonical state post-commit.
                if let (Some(entry), Some(r)) = (
                    ranked.iter_mut().find(|e| e.id == responder_id),
                    self.responders.get(&responder_id),
                ) {
                    entry.status = r.status;
                    entry.assigned_operations = r.assigned_operations.clone();
                }
            }
        }

        Some(ranked)
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn responder(&self, id: &str) -> Option<&Responder> {
        self.responders.get(id)
    }

    pub fn responder_count(&self) -> usize {
        self.responders.len()
    }

    pub fn rejected_events(&self) -> u64 {
        self.rejected_events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> DispatchEngine {
        DispatchEngine::new(DispatchPolicy::default())
    }

    fn sos(lat: f64, lon: f64) -> AlertCreatedEvent {
        AlertCreatedEvent {
            id: None,
            name: Some("caller".to_string()),
            phone: Some("100".to_string()),
            lat: Some(lat),
            lon: Some(lon),
        }
    }

    fn position(id: &str, lat: f64, lon: f64, status: ResponderStatus) -> ResponderPositionEvent {
        ResponderPositionEvent {
            id: id.to_string(),
            name: Some(format!("unit {id}")),
            lat: Some(lat),
            lon: Some(lon),
            status,
            assigned_operations: None,
        }
    }

    fn add_alert(e: &mut DispatchEngine, lat: f64, lon: f64) -> String {
        match e.add_alert(sos(lat, lon), None) {
            EventOutcome::AlertAdded(id) => id,
            other => panic!("alert not added: {other:?}"),
        }
    }

    #[test]
    fn sos_without_coordinates_is_dropped_and_counted() {
        let mut e = engine();
        let event = AlertCreatedEvent {
            id: None,
            name: Some("caller".to_string()),
            phone: None,
            lat: None,
            lon: Some(78.0),
        };
        assert_eq!(e.add_alert(event, None), EventOutcome::Rejected);
        assert_eq!(e.alerts().len(), 0);
        assert_eq!(e.rejected_events(), 1);
    }

    #[test]
    fn alert_gets_an_id_and_creation_stamp() {
        let mut e = engine();
        let id = add_alert(&mut e, 17.3616, 78.4747);
        assert!(!id.is_empty());
        let alert = &e.alerts()[0];
        assert_eq!(alert.id, id);
        assert_eq!(alert.ticket_status, "inlist");
        assert_eq!(alert.location_name, "Unknown");
    }

    #[test]
    fn inbound_alert_id_is_preserved() {
        let mut e = engine();
        let mut event = sos(10.0, 20.0);
        event.id = Some("ticket-42".to_string());
        assert_eq!(
            e.add_alert(event, None),
            EventOutcome::AlertAdded("ticket-42".to_string())
        );
    }

    #[test]
    fn ranking_is_nearest_first_and_includes_every_status() {
        let mut e = engine();
        let alert_id = add_alert(&mut e, 0.0, 0.0);
        e.upsert_responder(position("far", 0.0, 0.5, ResponderStatus::Available));
        e.upsert_responder(position("near", 0.0, 0.01, ResponderStatus::Offline));
        e.upsert_responder(position("mid", 0.0, 0.1, ResponderStatus::InOp));

        let alert = e.alerts().iter().find(|a| a.id == alert_id).unwrap().clone();
        let ranked = e.rank(&alert);

        assert_eq!(ranked.len(), 3);
        let ids: Vec<&str> = ranked.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["near", "mid", "far"]);
        for pair in ranked.windows(2) {
            assert!(pair[0].distance_km <= pair[1].distance_km);
        }
    }

    #[test]
    fn ranking_does_not_mutate_canonical_state() {
        let mut e = engine();
        let alert_id = add_alert(&mut e, 0.0, 0.0);
        e.upsert_responder(position("r1", 0.0, 0.1, ResponderStatus::Available));

        let alert = e.alerts().iter().find(|a| a.id == alert_id).unwrap().clone();
        let _ = e.rank(&alert);

        let r = e.responder("r1").unwrap();
        assert_eq!(r.status, ResponderStatus::Available);
        assert!(r.assigned_operations.is_empty());
    }

    #[test]
    fn tie_order_is_stable_across_repeated_queries() {
        let mut e = engine();
        let alert_id = add_alert(&mut e, 0.0, 0.0);
        // Same distance from the alert, opposite sides.
        e.upsert_responder(position("east", 0.0, 0.2, ResponderStatus::Offline));
        e.upsert_responder(position("west", 0.0, -0.2, ResponderStatus::Offline));

        let alert = e.alerts().iter().find(|a| a.id == alert_id).unwrap().clone();
        let first: Vec<String> = e.rank(&alert).into_iter().map(|r| r.id).collect();
        let second: Vec<String> = e.rank(&alert).into_iter().map(|r| r.id).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn single_available_responder_is_assigned() {
        let mut e = engine();
        let alert_id = add_alert(&mut e, 17.3616, 78.4747);
        e.upsert_responder(position("r1", 17.37, 78.48, ResponderStatus::Available));

        let ranked = e.ranked_and_assigned(&alert_id).unwrap();
        assert_eq!(ranked[0].status, ResponderStatus::InOp);
        assert_eq!(ranked[0].assigned_operations, vec![alert_id.clone()]);

        let r = e.responder("r1").unwrap();
        assert_eq!(r.status, ResponderStatus::InOp);
        assert_eq!(r.assigned_operations, vec![alert_id]);
    }

    #[test]
    fn assignment_is_idempotent_across_queries() {
        let mut e = engine();
        let alert_id = add_alert(&mut e, 0.0, 0.0);
        e.upsert_responder(position("r1", 0.0, 0.05, ResponderStatus::Available));

        let _ = e.ranked_and_assigned(&alert_id).unwrap();
        let after_first = e.responder("r1").unwrap().clone();

        let _ = e.ranked_and_assigned(&alert_id).unwrap();
        let after_second = e.responder("r1").unwrap();

        assert_eq!(after_second.status, after_first.status);
        assert_eq!(after_second.assigned_operations, after_first.assigned_operations);
        assert_eq!(after_second.assigned_operations, vec![alert_id]);
    }

    #[test]
    fn force_assign_dispatches_a_busy_but_much_closer_unit() {
        let mut e = engine();
        let alert_id = add_alert(&mut e, 0.0, 0.0);

        // r1 ~1.0 km out and mid-operation, r2 ~2.5 km out and free.
        // 1.0 < 2.5 * 0.5, so proximity wins.
        let mut busy = position("r1", 0.009, 0.0, ResponderStatus::InOp);
        busy.assigned_operations = Some(vec!["x".to_string()]);
        e.upsert_responder(busy);
        e.upsert_responder(position("r2", 0.0225, 0.0, ResponderStatus::Available));

        let ranked = e.ranked_and_assigned(&alert_id).unwrap();
        assert_eq!(ranked[0].id, "r1");

        let r1 = e.responder("r1").unwrap();
        assert_eq!(r1.status, ResponderStatus::InOp);
        assert_eq!(r1.assigned_operations, vec!["x".to_string(), alert_id]);

        let r2 = e.responder("r2").unwrap();
        assert_eq!(r2.status, ResponderStatus::Available);
        assert!(r2.assigned_operations.is_empty());
    }

    #[test]
    fn no_mutation_when_every_unit_is_offline_or_saturated() {
        let mut e = engine();
        let alert_id = add_alert(&mut e, 0.0, 0.0);

        e.upsert_responder(position("off", 0.0, 0.05, ResponderStatus::Offline));
        let mut full = position("full", 0.0, 0.06, ResponderStatus::Available);
        full.assigned_operations = Some(vec!["a".into(), "b".into(), "c".into()]);
        e.upsert_responder(full);

        let ranked = e.ranked_and_assigned(&alert_id).unwrap();
        assert_eq!(ranked.len(), 2);

        let off = e.responder("off").unwrap();
        assert_eq!(off.status, ResponderStatus::Offline);
        assert!(off.assigned_operations.is_empty());

        let full = e.responder("full").unwrap();
        assert_eq!(full.status, ResponderStatus::Available);
        assert_eq!(full.assigned_operations.len(), 3);
    }

    #[test]
    fn cap_is_never_exceeded() {
        let mut e = engine();
        e.upsert_responder(position("r1", 0.0, 0.001, ResponderStatus::Available));

        // Far runner-up keeps force-assign firing for every new alert.
        e.upsert_responder(position("r2", 0.0, 5.0, ResponderStatus::Available));

        for _ in 0..6 {
            let alert_id = add_alert(&mut e, 0.0, 0.0);
            let _ = e.ranked_and_assigned(&alert_id);
            assert!(e.responder("r1").unwrap().assigned_operations.len() <= 3);
        }
        assert_eq!(e.responder("r1").unwrap().assigned_operations.len(), 3);
    }

    #[test]
    fn query_for_unknown_alert_returns_none_without_mutation() {
        let mut e = engine();
        e.upsert_responder(position("r1", 0.0, 0.1, ResponderStatus::Available));
        assert!(e.ranked_and_assigned("nope").is_none());
        assert_eq!(e.responder("r1").unwrap().status, ResponderStatus::Available);
    }

    #[test]
    fn query_with_zero_responders_is_an_empty_list() {
        let mut e = engine();
        let alert_id = add_alert(&mut e, 0.0, 0.0);
        assert!(e.ranked_and_assigned(&alert_id).unwrap().is_empty());
    }

    #[test]
    fn position_update_overwrites_coordinates() {
        let mut e = engine();
        e.upsert_responder(position("r1", 1.0, 1.0, ResponderStatus::Available));
        e.upsert_responder(position("r1", 2.0, 3.0, ResponderStatus::Available));

        assert_eq!(e.responder_count(), 1);
        let r = e.responder("r1").unwrap();
        assert_eq!((r.lat, r.lon), (2.0, 3.0));
    }

    #[test]
    fn position_ping_without_operations_preserves_local_assignment() {
        let mut e = engine();
        let alert_id = add_alert(&mut e, 0.0, 0.0);
        e.upsert_responder(position("r1", 0.0, 0.05, ResponderStatus::Available));
        let _ = e.ranked_and_assigned(&alert_id);

        // Next ping still claims "available" but carries no snapshot.
        e.upsert_responder(position("r1", 0.0, 0.06, ResponderStatus::Available));

        let r = e.responder("r1").unwrap();
        assert_eq!(r.status, ResponderStatus::InOp);
        assert_eq!(r.assigned_operations, vec![alert_id]);
    }

    #[test]
    fn inbound_operations_snapshot_overrides_local_assignment() {
        let mut e = engine();
        let alert_id = add_alert(&mut e, 0.0, 0.0);
        e.upsert_responder(position("r1", 0.0, 0.05, ResponderStatus::Available));
        let _ = e.ranked_and_assigned(&alert_id);

        let mut snapshot = position("r1", 0.0, 0.06, ResponderStatus::Available);
        snapshot.assigned_operations = Some(vec![]);
        e.upsert_responder(snapshot);

        let r = e.responder("r1").unwrap();
        assert_eq!(r.status, ResponderStatus::Available);
        assert!(r.assigned_operations.is_empty());
    }

    #[test]
    fn responder_position_without_coordinates_is_rejected() {
        let mut e = engine();
        let mut event = position("r1", 0.0, 0.0, ResponderStatus::Available);
        event.lat = None;
        assert_eq!(e.upsert_responder(event), EventOutcome::Rejected);
        assert_eq!(e.responder_count(), 0);
        assert_eq!(e.rejected_events(), 1);
    }
}
