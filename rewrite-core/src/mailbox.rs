//! Typed message channel in front of a [`Dispatcher`].
//!
//! One task drains the queue, so commands are handled strictly one after
//! another in arrival order. Every request carries a oneshot sender and
//! receives exactly one reply: the resulting state or the error that
//! rejected the command.

use crate::{dispatcher::Dispatcher, error::RewriteError, Result};
use rewrite_common::{Command, State};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

struct Envelope {
    message: Value,
    reply: oneshot::Sender<Result<State>>,
}

/// Sending half of the dispatcher mailbox. Cheap to clone.
#[derive(Clone)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<Envelope>,
}

/// Start the mailbox task. It stops once every handle has been dropped.
pub fn spawn_dispatcher(dispatcher: Arc<Dispatcher>, capacity: usize) -> DispatcherHandle {
    let (tx, mut rx) = mpsc::channel::<Envelope>(capacity.max(1));

    tokio::spawn(async move {
        while let Some(Envelope { message, reply }) = rx.recv().await {
            let outcome = dispatcher.process(message).await;
            if reply.send(outcome).is_err() {
                debug!("Command sender went away before the response was ready");
            }
        }
        info!("Dispatcher mailbox closed");
    });

    DispatcherHandle { tx }
}

impl DispatcherHandle {
    /// Send a raw protocol message and wait for the resulting state
    pub async fn send(&self, message: Value) -> Result<State> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { message, reply })
            .await
            .map_err(|_| RewriteError::ChannelClosed)?;
        rx.await.map_err(|_| RewriteError::ChannelClosed)?
    }

    /// Send a typed command
    pub async fn command(&self, command: Command) -> Result<State> {
        self.send(serde_json::to_value(&command)?).await
    }
}
