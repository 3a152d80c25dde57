//! Component proxies: handshake tracking, typed command surfaces, and the
//! accept-handler that registers inbound connections.

pub mod error;
pub mod handshake;
pub mod kinds;
pub mod manager;
pub mod proxy;

pub use error::{ComponentError, Severity};
pub use handshake::HandshakeState;
pub use kinds::{Archiver, Channelizer, ComponentControl, Dx, Ifc, TestSig, Tscope};
pub use manager::{accept_loop, ComponentManager};
pub use proxy::{BoxFuture, ComponentLink, ComponentStatus, Proxy};
