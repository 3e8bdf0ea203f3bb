//! HTTP surface and process lifecycle: the document/SAML/health routes,
//! the IP allow-list gate, the shared `AppState`, and the `Controller`
//! that binds the listener and owns the background push/poll/sweep
//! tasks.

pub mod api;
pub mod client_cert_mw;
pub mod controller;
pub mod ip_allowlist;
pub mod state;
pub mod tls;

pub use controller::Controller;
pub use ip_allowlist::IpAllowList;
pub use state::AppState;
