//! brewbridge-hub: Homebridge HAP client and actuator
//!
//! Talks to a Homebridge instance running in insecure mode and exposes one
//! named switch as a `brewbridge_core::Actuator`.
//!
//! # Example
//!
//! ```no_run
//! use brewbridge_hub::{HubActuator, HubClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HubClient::from_host("localhost", 51826, "031-45-154")?;
//! let pump = HubActuator::new(client, "Pump");
//!
//! if !pump.get_value(true).await? {
//!     pump.set_value(true).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod actuator;
pub mod error;
pub mod http;
pub mod types;

pub use actuator::HubActuator;
pub use error::{HubError, Result};
pub use http::HubClient;
pub use types::{Accessory, SwitchHandle, find_switch};
