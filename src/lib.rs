//! wsmanager suite
//!
//! Workspace root: re-exports the connection manager library and hosts the
//! utilities shared by the binaries.
//!
//! ## Architecture
//!
//! - **wsmanager**: managed WebSocket client (re-exported from workspace)
//! - **bin_common**: logging, config path resolution and settings loading
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use wsmanager_suite::bin_common::{init_tracing, load_config_from_env, ConfigType};
//! use wsmanager_suite::wsmanager::WsManager;
//! ```

// Re-export workspace libraries for convenience
pub use wsmanager;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod logging;
    pub mod settings;

    pub use cli::{load_config_from_env, parse_args, ConfigType};
    pub use logging::init_tracing;
    pub use settings::{SettingsError, WsEchoSettings};
}
