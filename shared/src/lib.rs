//! Length-prefixed array transfer over TCP, with the timing harness used to
//! benchmark it between two machines.

pub mod cancel;
pub mod clock;
pub mod config;
pub mod connection;
pub mod error;
pub mod frame;
pub mod logging;
pub mod mode;
pub mod payload;
pub mod receiver;
pub mod sender;
pub mod stats;
pub mod stream_io;

pub use cancel::CancelToken;
pub use error::TransferError;
pub use frame::FrameCodec;
pub use mode::ExchangeMode;
pub use stats::{Samples, Summary};
