//! Room-scoped fan-out.
//!
//! Frames are pushed onto each member's bounded outbound queue with
//! `try_send`, so fan-out never awaits and can run inside the room's critical
//! section. The socket write happens later in the connection's writer task.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::presence::{ConnectionId, PlayerId, PresenceRecord, RoomId};

/// An encoded outbound text frame, shared across every recipient.
pub type Frame = Arc<str>;

/// Sending half of a connection's outbound queue.
pub type Outbox = mpsc::Sender<Frame>;

/// Receiving half, drained by the transport's writer task.
pub type FrameReceiver = mpsc::Receiver<Frame>;

/// What happened to one frame for one recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The writer side is gone (transport already closing).
    Closed,
    /// The peer is not draining its queue fast enough.
    Saturated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub connection: ConnectionId,
    pub identity: PlayerId,
    pub delivery: Delivery,
}

/// Per-member results of one broadcast, in member iteration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub outcomes: Vec<DeliveryOutcome>,
}

impl BroadcastReport {
    pub fn recipients(&self) -> usize {
        self.outcomes.len()
    }

    pub fn delivered(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.delivery == Delivery::Delivered)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.recipients() - self.delivered()
    }
}

/// Push `frame` to every recipient. Failures are logged and reported, never
/// returned as errors.
pub(crate) fn fan_out<'a>(
    room: &RoomId,
    recipients: impl Iterator<Item = (&'a PresenceRecord, &'a Outbox)>,
    frame: &Frame,
) -> BroadcastReport {
    let mut outcomes = Vec::new();
    for (presence, outbox) in recipients {
        let delivery = match outbox.try_send(frame.clone()) {
            Ok(()) => Delivery::Delivered,
            Err(TrySendError::Closed(_)) => {
                debug!(
                    room = %room,
                    conn = %presence.connection,
                    "Skipping delivery - outbound queue closed"
                );
                Delivery::Closed
            }
            Err(TrySendError::Full(_)) => {
                warn!(
                    room = %room,
                    conn = %presence.connection,
                    player = %presence.identity,
                    "Dropping frame - outbound queue full"
                );
                Delivery::Saturated
            }
        };
        outcomes.push(DeliveryOutcome {
            connection: presence.connection,
            identity: presence.identity.clone(),
            delivery,
        });
    }
    BroadcastReport { outcomes }
}
