//! Chat transport abstraction and adapters.

pub mod stdout;
pub mod transport;

pub use stdout::{StdoutTransport, TransportAction};
pub use transport::{AdminRole, ChatTransport, Participant};
