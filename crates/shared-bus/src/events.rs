//! # Intake Events
//!
//! Raw inbound payloads as they travel through the intake queue. The payload
//! stays as bytes; parsing happens once per dispatch.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which routes an event is offered to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntakeTarget {
    /// Every configured route evaluates the event.
    AllRoutes,
    /// Only the named route, with per-output retry semantics.
    Route(String),
}

/// An inbound scan event waiting for dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeEvent {
    /// Correlation id used in dispatch logs.
    pub id: Uuid,
    pub target: IntakeTarget,
    pub payload: Vec<u8>,
}

impl IntakeEvent {
    /// Event offered to every route.
    #[must_use]
    pub fn broadcast(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            target: IntakeTarget::AllRoutes,
            payload: payload.into(),
        }
    }

    /// Event addressed to a single route.
    #[must_use]
    pub fn for_route(route: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            target: IntakeTarget::Route(route.into()),
            payload: payload.into(),
        }
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
