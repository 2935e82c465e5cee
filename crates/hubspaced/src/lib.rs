pub mod api;
pub mod bridge;
pub mod command;
pub mod config;
pub mod device;
pub mod encoding;
pub mod entity;
pub mod instantiate;
pub mod poller;
pub mod resolver;
pub mod router;
pub mod vendor;

pub use bridge::Bridge;
pub use bridge::BridgeError;
pub use command::DispatchReport;
pub use command::SendCommand;
pub use config::Config;
pub use config::LogLevel;
pub use device::DeviceIdentity;
pub use device::EntityRole;
pub use entity::Entity;
pub use entity::EntitySnapshot;
pub use entity::Service;
pub use instantiate::SetupError;
pub use vendor::FixtureClient;
pub use vendor::VendorClient;
pub use vendor::VendorError;
