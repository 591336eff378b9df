use tracing::{info, warn};

use crate::engine::{EventOutcome, SharedEngine};
use crate::location::Geocoder;
use crate::models::event::InboundEvent;

/// Applies one raw stream payload to the engine.
///
/// Malformed or unrecognized messages are logged and skipped; a single bad
/// message among many must never take the consumer down, so this only returns
/// an error for conditions the caller could meaningfully retry (currently
/// none).
pub async fn process_event(
    engine: &SharedEngine,
    geocoder: &Geocoder,
    payload: &[u8],
) -> anyhow::Result<()> {
    let event: InboundEvent = match serde_json::from_slice(payload) {
        Ok(e) => e,
        Err(e) => {
            warn!("Ignoring unparseable event: {}", e);
            return Ok(());
        }
    };

    match event {
        InboundEvent::AlertCreated(alert) => {
            // Resolve the display name before taking the engine lock; the
            // lookup can stall for seconds and position events must not queue
            // behind it.
            let location_name = match (alert.lat, alert.lon) {
                (Some(lat), Some(lon)) => geocoder.reverse(lat, lon).await,
                _ => None,
            };

            let mut engine = engine.lock().await;
            match engine.add_alert(alert, location_name) {
                EventOutcome::AlertAdded(id) => {
                    info!("Alert {} added ({} total)", id, engine.alerts().len());
                }
                EventOutcome::Rejected => {
                    warn!(
                        "Dropped SOS without coordinates ({} rejected so far)",
                        engine.rejected_events()
                    );
                }
                EventOutcome::ResponderUpserted(_) => unreachable!(),
            }
        }
        InboundEvent::ResponderPosition(position) => {
            let mut engine = engine.lock().await;
            if engine.upsert_responder(position) == EventOutcome::Rejected {
                warn!(
                    "Dropped responder position without coordinates ({} rejected so far)",
                    engine.rejected_events()
                );
            }
        }
    }

    Ok(())
}
