use thiserror::Error;

use crate::bridge::BridgeError;
use crate::event::EventError;
use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
    #[error("Event error: {0}")]
    Event(#[from] EventError),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Config error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type InternalResult<T> = Result<T, Error>;

// エラー作成用のヘルパー関数
impl Error {
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Error::Internal(message.into())
    }
}
