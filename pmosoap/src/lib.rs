//! # pmosoap - SOAP client for Rust
//!
//! `pmosoap` calls document/literal SOAP 1.1 services described by a WSDL
//! document. The WSDL is loaded lazily on the first call, optionally reloaded
//! in the background, and cached behind a reader/writer discipline so no call
//! ever observes a half-replaced description.
//!
//! ## Features
//!
//! - **Lazy description loading**: exactly one load under concurrent first calls
//! - **Background refresh**: reload every `refresh_interval` (15 minutes minimum),
//!   waiting for in-flight calls to drain
//! - **Opaque envelopes**: Header and Body are returned as raw markup
//! - **Charset-aware decoding**: ISO-8859-1 and other declared encodings
//! - **Diagnostics**: transport and decode failures carry the exact payload sent
//!
//! ## Quick Start
//!
//! ```no_run
//! use pmosoap::{Params, SoapClient};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SoapClient::builder("http://example.com/stock?wsdl")
//!         .credentials("alice", "secret")
//!         .refresh_interval(Duration::from_secs(30 * 60))
//!         .build()?;
//!
//!     match client.call("GetPrice", Params::new().with("Item", "Apple")).await {
//!         Ok(response) => println!("{}", response.body_text()),
//!         Err(err) => {
//!             if let Some(payload) = err.payload() {
//!                 eprintln!("sent: {}", String::from_utf8_lossy(payload));
//!             }
//!             return Err(err.into());
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod charset;

pub mod client;
pub mod config;
pub mod description;
pub mod envelope;
pub mod error;
pub mod fault;
pub mod params;
pub mod transport;
pub mod wsdl;

pub use client::{ClientBuilder, DEFAULT_TIMEOUT_SECS, MIN_REFRESH_INTERVAL, SoapClient};
pub use config::SoapClientConfig;
pub use description::{Description, DescriptionLoader, Port, Service, WsdlLoader};
pub use envelope::Response;
pub use error::{
    CallError, DecodeError, DescriptionError, Error, ErrorWithPayload, Result, TransportError,
    payload_from_error,
};
pub use fault::Fault;
pub use params::{HeaderParams, ParamValue, Params, Request, ToParams};
pub use transport::{Credentials, HttpRequest, HttpResponse, Transport};
