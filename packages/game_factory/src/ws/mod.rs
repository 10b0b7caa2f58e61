//! Room WebSocket transport
//!
//! One socket per room membership. Inbound text frames go to the hub;
//! frames the hub fans out are drained from the connection's queue and
//! written to the socket by a dedicated sender task.

mod handler;


pub use handler::handle_room_ws;
