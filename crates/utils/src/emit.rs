// This file is part of Settler.
//
// Settler is free software: you can redistribute it and/or modify it under the
// terms of the GNU Lesser General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version.
//
// Settler is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with Settler.
// If not, see https://www.gnu.org/licenses/.


//! Utilities for emitting/collecting events from the coordinator

use std::fmt::Display;

use alloy_primitives::Address;
use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};
use tracing::{info, warn};

/// Capacity of the event channels. A batch emits a handful of small events per
/// operation, so a thousand slots absorbs several batches for a slow subscriber.
pub const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// A wrapper for an event that also contains the entry point that it
/// is associated with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WithEntryPoint<T> {
    /// Entry point address associated with the event
    pub entry_point: Address,
    /// The event itself
    pub event: T,
}

impl<T: Display> Display for WithEntryPoint<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}    Entrypoint: {}", self.event, self.entry_point)
    }
}

/// Fan-out of one entry point's events to any number of subscribers.
///
/// Emitting never blocks and never fails: with no subscribers the event is dropped.
#[derive(Debug, Clone)]
pub struct EventEmitter<T> {
    entry_point: Address,
    tx: broadcast::Sender<WithEntryPoint<T>>,
}

impl<T: Clone> EventEmitter<T> {
    /// Create an emitter tagging every event with `entry_point`
    pub fn new(entry_point: Address) -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { entry_point, tx }
    }

    /// Send an event to the current subscribers
    pub fn emit(&self, event: T) {
        let _ = self.tx.send(WithEntryPoint {
            entry_point: self.entry_point,
            event,
        });
    }

    /// Subscribe to events emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<WithEntryPoint<T>> {
        self.tx.subscribe()
    }
}

/// Receive events from a event broadcast channel and call
/// the given handler function for each event.
pub fn receive_events<T>(
    description: &'static str,
    mut rx: broadcast::Receiver<T>,
    handler: impl Fn(T) + Send + 'static,
) -> JoinHandle<()>
where
    T: Clone + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => handler(event),
                Err(RecvError::Closed) => {
                    info!("Event stream for {description} closed. Logging complete");
                    break;
                }
                Err(RecvError::Lagged(count)) => {
                    warn!("Event stream for {description} lagged. Missed {count} messages.")
                }
            }
        }
    })
}

/// An event handler that logs every event passing `filter` at INFO level.
pub fn receive_and_log_events_with_filter<T>(
    rx: broadcast::Receiver<T>,
    filter: impl (Fn(&T) -> bool) + Send + 'static,
) -> JoinHandle<()>
where
    T: Clone + Display + Send + 'static,
{
    receive_events("logging", rx, move |event| {
        if filter(&event) {
            info!("{}", event);
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[tokio::test]
    async fn subscribers_receive_tagged_events() {
        let entry_point = Address::repeat_byte(0xee);
        let emitter = EventEmitter::new(entry_point);
        let mut rx = emitter.subscribe();
        emitter.emit(7u32);
        let received = rx.recv().await.unwrap();
        assert_eq!(
            received,
            WithEntryPoint {
                entry_point,
                event: 7
            }
        );
    }

    #[tokio::test]
    async fn emitting_without_subscribers_is_silent() {
        let emitter = EventEmitter::<u32>::new(Address::ZERO);
        emitter.emit(1);
    }

    #[tokio::test]
    async fn receive_events_runs_until_closed() {
        let (tx, rx) = broadcast::channel(4);
        let seen = Arc::new(Mutex::new(vec![]));
        let sink = Arc::clone(&seen);
        let handle = receive_events("test", rx, move |e: u32| sink.lock().unwrap().push(e));
        tx.send(1).unwrap();
        tx.send(2).unwrap();
        drop(tx);
        handle.await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }
}
