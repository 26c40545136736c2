mod client;

pub use client::config::{Config, ConfigBuilder};
pub use client::stats::Stats;
pub use client::{Client, ServerRx, TransportEvent, connect, connect_with_config};
