pub mod anomaly;
#[cfg(feature = "packetcapture")]
pub mod capture;
pub mod client;
pub mod config;
pub mod db;
pub mod device;
pub mod events;
pub mod export;
pub mod logger;
pub mod oui;
pub mod packet;
pub mod pipeline;
pub mod resolver;
pub mod score;
pub mod server;
