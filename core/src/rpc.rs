//! Remote call channel
//!
//! Turns one-shot messages across the worker boundary into awaitable
//! results. Each call carries its own reply port, so concurrent calls can
//! never receive each other's replies.
//!
//! There is no timeout: a worker that never answers leaves that call pending
//! forever while everything else keeps running. Calls are never retried.

use framepace_shared::{RpcCall, RpcReply, RpcValue};
use tokio::sync::oneshot;
use tracing::trace;

use crate::worker::{WorkerCommand, WorkerPort};

/// Remote call failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcError {
    /// The worker answered with an error payload
    #[error("remote call {func}() failed: {message}")]
    Remote { func: String, message: String },

    /// The worker is gone, or dropped the reply port without answering
    #[error("remote call {func}() lost: worker disconnected")]
    Disconnected { func: String },

    /// The worker answered with a payload of the wrong shape
    #[error("remote call {func}() returned unexpected value {value:?}")]
    UnexpectedReply { func: String, value: RpcValue },
}

/// Request/response channel to the worker
#[derive(Debug, Clone)]
pub struct RpcChannel {
    port: WorkerPort,
}

impl RpcChannel {
    pub fn new(port: WorkerPort) -> Self {
        Self { port }
    }

    /// Invoke `func` on the worker and wait for its single reply
    pub async fn call(&self, func: &str, args: Vec<RpcValue>) -> Result<RpcValue, RpcError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let call = RpcCall {
            func: func.to_string(),
            args,
        };
        trace!(func, "rpc call");

        self.port
            .send(WorkerCommand::Rpc {
                call,
                reply: reply_tx,
            })
            .map_err(|_| RpcError::Disconnected {
                func: func.to_string(),
            })?;

        match reply_rx.await {
            Ok(RpcReply::Result(value)) => Ok(value),
            Ok(RpcReply::Error(message)) => Err(RpcError::Remote {
                func: func.to_string(),
                message,
            }),
            Err(_) => Err(RpcError::Disconnected {
                func: func.to_string(),
            }),
        }
    }

    /// Whether the loaded cartridge has battery-backed save-RAM
    pub async fn has_sram(&self) -> Result<bool, RpcError> {
        match self.call("has_sram", Vec::new()).await? {
            RpcValue::Bool(has) => Ok(has),
            value => Err(unexpected("has_sram", value)),
        }
    }

    /// Current save-RAM contents
    pub async fn get_sram(&self) -> Result<Vec<u8>, RpcError> {
        match self.call("get_sram", Vec::new()).await? {
            RpcValue::Bytes(bytes) => Ok(bytes),
            value => Err(unexpected("get_sram", value)),
        }
    }

    pub async fn set_sram(&self, sram: Vec<u8>) -> Result<(), RpcError> {
        self.call("set_sram", vec![RpcValue::Bytes(sram)]).await?;
        Ok(())
    }

    pub async fn load_cartridge(&self, cart_data: Vec<u8>) -> Result<(), RpcError> {
        self.call("load_cartridge", vec![RpcValue::Bytes(cart_data)])
            .await?;
        Ok(())
    }
}

fn unexpected(func: &str, value: RpcValue) -> RpcError {
    RpcError::UnexpectedReply {
        func: func.to_string(),
        value,
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::worker::worker_channel;

    /// Answer `count` calls in reverse order of arrival
    fn reply_in_reverse(endpoint: crate::worker::WorkerEndpoint, count: usize) {
        thread::spawn(move || {
            let mut pending = Vec::new();
            for _ in 0..count {
                if let Ok(WorkerCommand::Rpc { call, reply }) = endpoint.commands.recv() {
                    pending.push((call, reply));
                }
            }
            while let Some((call, reply)) = pending.pop() {
                let _ = reply.send(RpcReply::Result(RpcValue::Bytes(call.func.into_bytes())));
            }
        });
    }

    #[tokio::test]
    async fn concurrent_calls_get_their_own_replies() {
        let (port, _inbox, endpoint) = worker_channel();
        reply_in_reverse(endpoint, 2);
        let rpc = RpcChannel::new(port);

        let (a, b) = tokio::join!(rpc.call("first", Vec::new()), rpc.call("second", Vec::new()));
        assert_eq!(a.unwrap(), RpcValue::Bytes(b"first".to_vec()));
        assert_eq!(b.unwrap(), RpcValue::Bytes(b"second".to_vec()));
    }

    #[tokio::test]
    async fn error_payload_rejects() {
        let (port, _inbox, endpoint) = worker_channel();
        thread::spawn(move || {
            if let Ok(WorkerCommand::Rpc { reply, .. }) = endpoint.commands.recv() {
                let _ = reply.send(RpcReply::Error("no cartridge".into()));
            }
        });

        let err = RpcChannel::new(port).get_sram().await.unwrap_err();
        assert_eq!(
            err,
            RpcError::Remote {
                func: "get_sram".into(),
                message: "no cartridge".into()
            }
        );
    }

    #[tokio::test]
    async fn dropped_reply_port_is_disconnect() {
        let (port, _inbox, endpoint) = worker_channel();
        thread::spawn(move || {
            let _ = endpoint.commands.recv();
        });

        let err = RpcChannel::new(port).has_sram().await.unwrap_err();
        assert!(matches!(err, RpcError::Disconnected { .. }));
    }

    #[tokio::test]
    async fn wrong_shape_is_unexpected_reply() {
        let (port, _inbox, endpoint) = worker_channel();
        thread::spawn(move || {
            if let Ok(WorkerCommand::Rpc { reply, .. }) = endpoint.commands.recv() {
                let _ = reply.send(RpcReply::Result(RpcValue::Unit));
            }
        });

        let err = RpcChannel::new(port).has_sram().await.unwrap_err();
        assert!(matches!(err, RpcError::UnexpectedReply { .. }));
    }

    #[tokio::test]
    async fn call_fails_when_worker_already_gone() {
        let (port, _inbox, endpoint) = worker_channel();
        drop(endpoint);
        let err = RpcChannel::new(port).load_cartridge(vec![1, 2, 3]).await;
        assert!(matches!(err, Err(RpcError::Disconnected { .. })));
    }
}
