//! # Hermes Chat
//!
//! Room-based realtime message bus. Clients hold a long-lived WebSocket
//! session; inbound frames are routed to room broadcasts, targeted users,
//! or control actions, and every outbound path is bounded with drop-oldest
//! overflow so one slow consumer never backs up the rest.
//!
//! ## Components
//!
//! - [`session`]: per-client session with a bounded outbound FIFO, and the
//!   registry keyed by user id.
//! - [`room`]: room membership plus a broadcast fan-out channel per room.
//! - [`router`]: interprets inbound frames by type.
//! - [`gateway`]: the per-connection WebSocket driver and axum surface.

pub mod gateway;
pub mod room;
pub mod router;
pub mod session;

pub use gateway::ChatState;
pub use room::RoomRegistry;
pub use router::{MessageRouter, RouteOutcome};
pub use session::{Session, SessionRegistry};
