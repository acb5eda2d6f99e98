//! Worker boundary
//!
//! The emulation worker runs on its own thread and is reached only through
//! message passing. Commands flow out on one channel, deliveries flow back on
//! another; buffers travel by value.
//!
//! ```text
//! Pacing side                                   Worker thread
//!     │                                              │
//! [tick]──RequestFrame(buffers)──(commands)────────►[emulate + render]
//! [rpc ]──Rpc{call, reply port}──(commands)────────►[handle call]──►reply port
//!     │                                              │
//! [dispatch]◄──────────(events)──DeliverFrame / ReportPerformance
//! ```

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use framepace_shared::{FrameDelivery, FrameRequest, PerformanceReport, RpcCall, RpcReply};
use tokio::sync::oneshot;

/// Message sent to the worker
#[derive(Debug)]
pub enum WorkerCommand {
    /// Advance emulation by one frame
    RequestFrame(FrameRequest),
    /// Remote call with a private reply port
    Rpc {
        call: RpcCall,
        reply: oneshot::Sender<RpcReply>,
    },
}

/// Message received from the worker
#[derive(Debug)]
pub enum WorkerEvent {
    DeliverFrame(FrameDelivery),
    ReportPerformance(PerformanceReport),
}

/// The worker thread hung up
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("worker disconnected")]
pub struct WorkerGone;

/// Host-side sending half of the worker boundary
#[derive(Debug, Clone)]
pub struct WorkerPort {
    commands: Sender<WorkerCommand>,
}

impl WorkerPort {
    pub fn new(commands: Sender<WorkerCommand>) -> Self {
        Self { commands }
    }

    pub fn send(&self, command: WorkerCommand) -> Result<(), WorkerGone> {
        self.commands.send(command).map_err(|_| WorkerGone)
    }

    pub fn request_frame(&self, request: FrameRequest) -> Result<(), WorkerGone> {
        self.send(WorkerCommand::RequestFrame(request))
    }
}

/// Host-side receiving half: the inbound delivery queue.
///
/// Drained exclusively by the delivery dispatcher.
#[derive(Debug)]
pub struct WorkerInbox {
    events: Receiver<WorkerEvent>,
}

impl WorkerInbox {
    /// Next pending event without blocking.
    ///
    /// `Err(WorkerGone)` once the worker has dropped its sender and the
    /// queue is empty.
    pub fn try_next(&self) -> Result<Option<WorkerEvent>, WorkerGone> {
        match self.events.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(WorkerGone),
        }
    }
}

/// Worker-side ends of the boundary
#[derive(Debug)]
pub struct WorkerEndpoint {
    pub commands: Receiver<WorkerCommand>,
    pub events: Sender<WorkerEvent>,
}

/// Create both halves of a worker boundary
pub fn worker_channel() -> (WorkerPort, WorkerInbox, WorkerEndpoint) {
    let (command_tx, command_rx) = mpsc::channel();
    let (event_tx, event_rx) = mpsc::channel();
    (
        WorkerPort::new(command_tx),
        WorkerInbox { events: event_rx },
        WorkerEndpoint {
            commands: command_rx,
            events: event_tx,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_preserve_send_order() {
        let (port, _inbox, endpoint) = worker_channel();
        for p1 in 0..3u8 {
            port.request_frame(FrameRequest {
                p1,
                ..Default::default()
            })
            .unwrap();
        }
        for expected in 0..3u8 {
            match endpoint.commands.recv().unwrap() {
                WorkerCommand::RequestFrame(request) => assert_eq!(request.p1, expected),
                other => panic!("unexpected command {other:?}"),
            }
        }
    }

    #[test]
    fn inbox_reports_empty_then_gone() {
        let (_port, inbox, endpoint) = worker_channel();
        assert!(matches!(inbox.try_next(), Ok(None)));

        endpoint
            .events
            .send(WorkerEvent::DeliverFrame(FrameDelivery::default()))
            .unwrap();
        drop(endpoint);

        assert!(matches!(
            inbox.try_next(),
            Ok(Some(WorkerEvent::DeliverFrame(_)))
        ));
        assert_eq!(inbox.try_next().unwrap_err(), WorkerGone);
    }

    #[test]
    fn send_fails_after_worker_exits() {
        let (port, _inbox, endpoint) = worker_channel();
        drop(endpoint);
        assert_eq!(
            port.request_frame(FrameRequest::default()),
            Err(WorkerGone)
        );
    }
}
