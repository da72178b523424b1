// HTTP routes and handlers
pub mod api;

// TOML configuration with environment overrides
pub mod config;

// Error taxonomy and HTTP mapping
pub mod error;

// OAuth client, account linking and Classroom access
pub mod oauth;

// Secret store backends and process-lifetime cache
pub mod secrets;

// Ephemeral JWT minting
pub mod token;

// User records and encrypted refresh tokens
pub mod users;
