//! # telemetry-core
//!
//! Client-side telemetry for a search UI: records navigation, search and
//! record-interaction events, stamps them with timing and session context,
//! drops duplicates and ships them to a collector.
//!
//! ## Design Principles
//!
//! - **Never breaks the host**: entry points log failures and return.
//! - **Synchronous core**: the only background work is the detached send.
//! - **Per-tab state**: one `Recorder` and one session storage per tab/window.
//! - **Graceful degradation**: missing collaborators fall back to null
//!   implementations; malformed input decodes to defaults.
//!
//! ## Module Structure
//!
//! - [`query`]: decoder for the `field,precision,term,OP;...` query strings
//! - [`record`]: bibliographic record normalization
//! - [`trail`]: navigation history with transition timings
//! - [`session`]: session lifecycle and duplicate suppression
//! - [`tracker`]: payload assembly and dispatch
//! - [`recorder`]: host-facing entry points

pub mod clock;
pub mod config;
pub mod error;
pub mod query;
pub mod record;
pub mod recorder;
pub mod search;
pub mod session;
pub mod sources;
pub mod storage;
pub mod tracker;
pub mod trail;
pub mod transport;

// Re-export commonly used items at crate root
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{load_config, save_config, StoragePaths, TelemetryConfig};
pub use error::{Result, TelemetryError, TransportError};
pub use query::{decode_query, BoolOp, DecodedQuery, FacetClause, QueryClause};
pub use record::{normalize_record, NormalizedRecord};
pub use recorder::Recorder;
pub use search::{build_search_data, classify_search_action, Action, InputState};
pub use session::{Admission, Session, SessionManager};
pub use sources::{
    AppliedFacet, FacetKind, IdentitySource, NullIdentity, NullSearchState, ResultObject,
    SearchObject, SearchSnapshot, SearchStateSource, StaticIdentity,
};
pub use storage::{FileStorage, MemoryStorage, SessionStorage};
pub use tracker::{DispatchHandle, DispatchStatus, EventTracker, TrackOutcome};
pub use trail::{NavigationTrail, TrailStep};
pub use transport::{HttpTransport, MemoryTransport, NullTransport, OutboundRequest, Transport};

pub use telemetry_protocol::{EventMeta, EventPayload, ServerAck};
