pub mod client;
pub mod response;
pub mod transport;

pub use client::{HttpTransport, HttpTransportBuilder};
pub use response::{TransportResponse, RATE_LIMITED_STATUS};
pub use transport::{Transport, TransportError};
