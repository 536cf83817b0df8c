use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid mask: {0}")]
    InvalidMask(String),

    #[error("device {name} not found")]
    DeviceNotFound { name: String },

    #[error("interface {name} not found on device {device}")]
    InterfaceNotFound { device: String, name: String },

    #[error("device {name} is offline")]
    DeviceOffline { name: String },

    #[error("device {name} is not a router")]
    NotARouter { name: String },
}

pub type Result<T> = std::result::Result<T, Error>;
