//! Event broker
//!
//! A single coordinator task owns three channels (register, unregister,
//! publish) and a set of subscriber sinks, processing exactly one
//! message per step. Delivery is best-effort and blocking per
//! subscriber: a slow subscriber slows the coordinator. A sink whose
//! receiver is gone is dropped from the set on the next delivery.

use racs_core::event::Event;
use tokio::sync::mpsc;
use tracing::debug;

use crate::state::{snapshot_projects, CredentialMap, ProjectMap};

/// Per-subscriber channel capacity
const SINK_CAPACITY: usize = 16;

pub type Sink = mpsc::Sender<Event>;

/// Cloneable handle to the broker coordinator
#[derive(Clone)]
pub struct BrokerHandle {
    register: mpsc::Sender<Sink>,
    unregister: mpsc::Sender<Sink>,
    publish: mpsc::Sender<Event>,
}

impl BrokerHandle {
    /// Registers a new subscriber, returning its sink (for later
    /// unsubscription) and the receiving end. The coordinator feeds the
    /// sink a `project/list` bootstrap event before any live events.
    pub async fn subscribe(&self) -> (Sink, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(SINK_CAPACITY);
        let _ = self.register.send(tx.clone()).await;
        (tx, rx)
    }

    pub async fn unsubscribe(&self, sink: Sink) {
        let _ = self.unregister.send(sink).await;
    }

    pub async fn publish(&self, event: Event) {
        let _ = self.publish.send(event).await;
    }
}

/// Spawns the coordinator task and returns its handle
pub fn spawn(projects: ProjectMap, credentials: CredentialMap) -> BrokerHandle {
    let (register_tx, register_rx) = mpsc::channel(SINK_CAPACITY);
    let (unregister_tx, unregister_rx) = mpsc::channel(SINK_CAPACITY);
    let (publish_tx, publish_rx) = mpsc::channel(SINK_CAPACITY);

    tokio::spawn(run(
        register_rx,
        unregister_rx,
        publish_rx,
        projects,
        credentials,
    ));

    BrokerHandle {
        register: register_tx,
        unregister: unregister_tx,
        publish: publish_tx,
    }
}

async fn run(
    mut register: mpsc::Receiver<Sink>,
    mut unregister: mpsc::Receiver<Sink>,
    mut publish: mpsc::Receiver<Event>,
    projects: ProjectMap,
    credentials: CredentialMap,
) {
    let mut sinks: Vec<Sink> = Vec::new();
    loop {
        tokio::select! {
            Some(sink) = register.recv() => {
                let bootstrap = Event::ProjectList {
                    projects: snapshot_projects(&projects, &credentials).await,
                };
                if sink.send(bootstrap).await.is_ok() {
                    sinks.push(sink);
                    debug!("Subscriber registered ({} active)", sinks.len());
                }
            }
            Some(sink) = unregister.recv() => {
                sinks.retain(|s| !s.same_channel(&sink));
                debug!("Subscriber unregistered ({} active)", sinks.len());
            }
            Some(event) = publish.recv() => {
                let mut dropped = false;
                for sink in &sinks {
                    if sink.send(event.clone()).await.is_err() {
                        dropped = true;
                    }
                }
                if dropped {
                    sinks.retain(|s| !s.is_closed());
                }
            }
            else => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    fn empty_maps() -> (ProjectMap, CredentialMap) {
        (
            Arc::new(RwLock::new(HashMap::new())),
            Arc::new(RwLock::new(HashMap::new())),
        )
    }

    #[tokio::test]
    async fn test_subscriber_receives_bootstrap_then_live_events() {
        let (projects, credentials) = empty_maps();
        let broker = spawn(projects, credentials);

        let (_sink, mut rx) = broker.subscribe().await;
        match rx.recv().await.unwrap() {
            Event::ProjectList { projects } => assert!(projects.is_empty()),
            other => panic!("expected bootstrap, got {:?}", other),
        }

        broker
            .publish(Event::ProjectVersion { id: 1, version: 2 })
            .await;
        match rx.recv().await.unwrap() {
            Event::ProjectVersion { id, version } => {
                assert_eq!(id, 1);
                assert_eq!(version, 2);
            }
            other => panic!("expected version event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unregistered_subscriber_stops_receiving() {
        let (projects, credentials) = empty_maps();
        let broker = spawn(projects, credentials);

        let (sink, mut rx) = broker.subscribe().await;
        rx.recv().await.unwrap(); // bootstrap

        // once the coordinator drops the last sender clone the receiver
        // closes, proving the sink left the set
        broker.unsubscribe(sink).await;
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dead_sink_is_pruned() {
        let (projects, credentials) = empty_maps();
        let broker = spawn(projects, credentials);

        let (_sink, rx) = broker.subscribe().await;
        drop(rx);

        // deliveries to the dead sink are skipped without stalling
        for version in 0..3 {
            broker.publish(Event::ProjectVersion { id: 1, version }).await;
        }
        let (_sink2, mut rx2) = broker.subscribe().await;
        rx2.recv().await.unwrap();
    }
}
