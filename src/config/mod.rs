pub mod relay;

pub use relay::RelayConfig;
