// Appliance REST client
//
// One authenticated session per managed appliance. The appliance reports
// many semantic failures inside an HTTP 200 response envelope, so every
// call is routed through a uniform status check before any field is read.

pub mod error;
pub mod network;
pub mod session;
pub mod slb;
pub mod system;
pub mod types;

pub use error::ApplianceError;
pub use session::Session;
pub use slb::SlbApi;
