//! Table module providing the async actor that runs a single table.
//!
//! This module implements:
//! - `Table`: public handle with start/stop lifecycle, requests and snapshot reads
//! - `TableActor`: serialized actor owning one table's game state
//! - `TableManager`: registry of independently running tables
//! - Snapshots, hand results and outbound collaborator traits
//!
//! ## Architecture
//!
//! Each table runs in its own Tokio task. Requests arrive on a bounded mpsc
//! inbox and are applied strictly in submission order, interleaved with a
//! periodic timer tick that drives action timeouts and hand transitions.
//! After every committed transition the actor publishes an immutable
//! [`TableSnapshot`] on a `watch` channel, so reads never wait on the actor.
//!
//! ## Example
//!
//! ```no_run
//! use poker_table::table::{Table, TableConfig};
//! use poker_table::game::entities::ActionRequest;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), poker_table::TableError> {
//!     let table = Table::new(TableConfig::default())?;
//!     table.start().await?;
//!
//!     table.player_joins(1, "alice", 1000).await?;
//!     table.player_joins(2, "bob", 1000).await?;
//!
//!     // Heads-up, the button posts the small blind and acts first.
//!     table.submit_action(ActionRequest::call(1)).await?;
//!
//!     let state = table.get_state();
//!     println!("{} at hand #{}", state.phase, state.hand_number);
//!
//!     table.stop().await;
//!     Ok(())
//! }
//! ```

pub mod actor;
pub mod config;
pub mod handle;
pub mod manager;
pub mod messages;
pub mod outbound;
pub mod snapshot;

pub use actor::TableActor;
pub use config::{TableConfig, TableId};
pub use handle::{Table, TableServices};
pub use manager::{TableManager, TableMetadata};
pub use messages::TableMessage;
pub use outbound::{
    HandHistorySink, LogHandHistory, LogShuffleAudit, OutboundRecord, ShuffleAuditLog, SinkError,
    SinkResult,
};
pub use snapshot::{
    ActionRejection, HandResult, Payout, PotAward, RevealedHand, SeatContribution, SeatSnapshot,
    TableSnapshot,
};
