//! Serial endpoint layer.
//!
//! One trait over the three endpoint kinds the toolkit touches: the real
//! panel port, the pseudo-terminal a client application attaches to, and a
//! scripted mock for tests.

pub mod mock;
#[cfg(unix)]
pub mod pty;
pub mod serial;
pub mod traits;

pub use mock::{MockEndpoint, MockHandle};
#[cfg(unix)]
pub use pty::VirtualEndpoint;
pub use serial::{SerialPortEndpoint, find_device_port, list_ports};
pub use traits::{EndpointError, SerialEndpoint};
