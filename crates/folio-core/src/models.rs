//! Data models for folio
//!
//! Defines the application state snapshot, the actions pushed by the event
//! source, and the pure transition that folds one event into a snapshot.
//!
//! Payloads are stored exactly as received. Typed views (`visitor_count`,
//! `poll_results`, `donation_details`) decode on read.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque payload carried by an action
pub type Payload = Value;

/// Action type names understood by the transition
pub const DONATION: &str = "donation";
pub const DONATION_ENDS: &str = "donationEnds";
pub const USER_COUNT: &str = "userCount";
pub const POLL_UPDATE: &str = "pollUpdate";

/// Snapshot of the live state shared with every subscriber
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    /// True while a donation is being shown
    #[serde(default)]
    pub donation_active: bool,
    /// Payload of the most recent donation, absent once it ends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub donation: Option<Payload>,
    /// Payload of the last `userCount`; a number when the server behaves
    #[serde(default = "initial_count")]
    pub count: Payload,
    /// Payload of the last `pollUpdate`; an array of records when the server behaves
    #[serde(default = "initial_polls")]
    pub polls: Payload,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            donation_active: false,
            donation: None,
            count: initial_count(),
            polls: initial_polls(),
        }
    }
}

fn initial_count() -> Payload {
    Value::from(0u64)
}

fn initial_polls() -> Payload {
    Value::Array(Vec::new())
}

impl AppState {
    /// Create the initial state
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into this snapshot, producing the next one
    pub fn apply(&self, event: &Event) -> Self {
        apply(self, event)
    }

    /// Visitor count, if the last payload was an unsigned integer
    pub fn visitor_count(&self) -> Option<u64> {
        self.count.as_u64()
    }

    /// Poll records, empty if the last payload was not an array
    pub fn poll_records(&self) -> &[Payload] {
        self.polls.as_array().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Decode the current donation payload, if it has the expected shape
    pub fn donation_details(&self) -> Option<Donation> {
        self.donation
            .as_ref()
            .and_then(|d| serde_json::from_value(d.clone()).ok())
    }

    /// Decode the poll records that have the expected shape, skipping the rest
    pub fn poll_results(&self) -> Vec<PollResult> {
        self.poll_records()
            .iter()
            .filter_map(|p| serde_json::from_value(p.clone()).ok())
            .collect()
    }
}

/// Message on the wire: a type discriminator plus an optional payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Payload>,
}

impl Action {
    /// Create an action without data
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            data: None,
        }
    }

    /// Create an action with a payload
    pub fn with_data(kind: impl Into<String>, data: Payload) -> Self {
        Self {
            kind: kind.into(),
            data: Some(data),
        }
    }
}

/// Inbound event understood by the transition
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A donation started
    Donation(Payload),
    /// The active donation ended
    DonationEnds,
    /// New visitor count
    UserCount(Payload),
    /// Full replacement of the poll results
    PollUpdate(Payload),
    /// Anything else; leaves state unchanged
    Unknown { kind: String },
}

impl Event {
    /// Decode an action into an event
    ///
    /// Only the type is inspected. Data is carried as-is, and missing data
    /// becomes JSON `null`.
    pub fn from_action(action: &Action) -> Self {
        let data = || action.data.clone().unwrap_or(Value::Null);
        match action.kind.as_str() {
            DONATION => Event::Donation(data()),
            DONATION_ENDS => Event::DonationEnds,
            USER_COUNT => Event::UserCount(data()),
            POLL_UPDATE => Event::PollUpdate(data()),
            other => Event::unknown(other),
        }
    }

    /// A `userCount` event with a well-formed count
    pub fn user_count(count: u64) -> Self {
        Event::UserCount(Value::from(count))
    }

    /// A `pollUpdate` event with a list of records
    pub fn poll_update(polls: Vec<Payload>) -> Self {
        Event::PollUpdate(Value::Array(polls))
    }

    fn unknown(kind: &str) -> Self {
        Event::Unknown {
            kind: kind.to_string(),
        }
    }

    /// The wire type name of this event
    pub fn kind(&self) -> &str {
        match self {
            Event::Donation(_) => DONATION,
            Event::DonationEnds => DONATION_ENDS,
            Event::UserCount(_) => USER_COUNT,
            Event::PollUpdate(_) => POLL_UPDATE,
            Event::Unknown { kind } => kind,
        }
    }
}

impl From<&Action> for Event {
    fn from(action: &Action) -> Self {
        Event::from_action(action)
    }
}

/// Compute the state that follows `state` once `event` is applied
///
/// Pure: the input snapshot is left untouched, so earlier snapshots held by
/// subscribers stay valid.
pub fn apply(state: &AppState, event: &Event) -> AppState {
    match event {
        Event::Donation(data) => AppState {
            donation_active: true,
            donation: Some(data.clone()),
            ..state.clone()
        },
        Event::DonationEnds => AppState {
            donation_active: false,
            donation: None,
            ..state.clone()
        },
        Event::UserCount(count) => AppState {
            count: count.clone(),
            ..state.clone()
        },
        Event::PollUpdate(polls) => AppState {
            polls: polls.clone(),
            ..state.clone()
        },
        Event::Unknown { .. } => state.clone(),
    }
}

/// Expected shape of a donation payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Donation {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
    /// Fields the schema doesn't name
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Expected shape of one poll record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollResult {
    pub option: String,
    pub votes: u64,
}
