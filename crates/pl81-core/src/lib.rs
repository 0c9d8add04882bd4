//! PL81-Core: serial protocol toolkit for the Neewer PL81-Pro LED panel.
//!
//! The panel speaks a small framed command/status protocol over a CH340
//! USB-serial bridge, reverse-engineered from the vendor application. This
//! crate carries the two engineered pieces of that effort: the frame codec
//! and a transparent relay that sits between an unmodified client
//! application and the real device, logging everything that crosses.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Protocol**: wire constants, the frame codec, CCT temperature mapping
//! - **Endpoint**: serial communication abstraction (real port, pseudo-terminal, mock)
//! - **Capture**: append-only session logs with hex dumps and frame annotations
//! - **Events**: observer pattern for UI decoupling
//! - **Relay**: the transparent sniffing session between app and panel
//! - **Device**: direct control over the stable command subset
//!
//! # Example
//!
//! ```no_run
//! use pl81_core::relay::{RelayConfig, RelaySession};
//!
//! let config = RelayConfig::default();
//! let mut session = RelaySession::open(&config).expect("open endpoints");
//! println!("point the vendor app at {}", session.client_path());
//! session.run().expect("relay failed");
//! ```

pub mod capture;
pub mod device;
pub mod endpoint;
pub mod events;
pub mod protocol;
pub mod relay;

// Re-exports for convenience
pub use capture::{CaptureLog, CaptureRecord, Direction, annotate_frame, hex_dump};
pub use device::{CctSetting, Panel};
pub use endpoint::{EndpointError, MockEndpoint, SerialEndpoint, SerialPortEndpoint};
pub use events::{NullObserver, RelayEvent, RelayObserver, TracingObserver};
pub use protocol::cct::{StatusReport, byte_to_kelvin, kelvin_to_byte};
pub use protocol::frame::{ChecksumWidth, Frame, FrameError};
pub use relay::{RelayConfig, RelayError, RelaySession, SessionState, StopHandle};
