//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Name to connection registry
//!
//! The registry never owns connections. Each entry keeps a weak reference,
//! and the connection owns the [`Registration`] guard that removes the entry
//! again, so a closed connection is unreachable by name as soon as
//! [`LineConnection::close`] returns.
//!
//! Lock order: a connection's internal lock may be taken while a registry
//! shard lock is held (to queue a greeting), never the other way round.
//! Guards are dropped only after the shard lock is released.

use crate::connection::ConnectionInner;
use crate::{BroadcastResult, ConnectionId, LineConnection, Result, ServiceError};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::{Arc, Weak};
use tracing::{debug, instrument};

struct RegistryEntry {
    id: ConnectionId,
    connection: Weak<ConnectionInner>,
}

/// Shared mapping from display name to live connection
///
/// Cloning is cheap; all clones see the same entries.
#[derive(Clone, Default)]
pub struct Registry {
    entries: Arc<DashMap<String, RegistryEntry>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `connection` under `name`
    ///
    /// The check and the insert are one atomic step, so two connections
    /// racing for the same name cannot both succeed. The entry lives until
    /// the connection closes.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NameAlreadyTaken`] if another connection holds the
    /// name, [`ServiceError::ConnectionClosed`] if `connection` is already
    /// closed.
    #[instrument(skip(self, connection), fields(connection_id = %connection.id()))]
    pub fn register(&self, name: &str, connection: &LineConnection) -> Result<()> {
        self.insert(name, connection, None)
    }

    /// Register `connection` under `name` and queue `greeting` to it
    ///
    /// The greeting is queued before the entry becomes visible, so it reaches
    /// the connection ahead of any broadcast that includes it. Nothing is
    /// sent if the name is taken.
    #[instrument(skip(self, connection, greeting), fields(connection_id = %connection.id()))]
    pub fn register_with_greeting(
        &self,
        name: &str,
        connection: &LineConnection,
        greeting: &str,
    ) -> Result<()> {
        self.insert(name, connection, Some(greeting))
    }

    fn insert(
        &self,
        name: &str,
        connection: &LineConnection,
        greeting: Option<&str>,
    ) -> Result<()> {
        let registration = match self.entries.entry(name.to_string()) {
            Entry::Occupied(_) => return Err(ServiceError::NameAlreadyTaken(name.to_string())),
            Entry::Vacant(vacant) => {
                if let Some(greeting) = greeting {
                    connection.send_line(greeting)?;
                }
                vacant.insert(RegistryEntry {
                    id: connection.id(),
                    connection: connection.downgrade(),
                });
                Registration {
                    name: name.to_string(),
                    id: connection.id(),
                    entries: self.entries.clone(),
                }
            }
        };
        connection.attach_registration(registration)?;
        debug!("registered");
        Ok(())
    }

    /// Number of registered names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no name is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Connection registered under `name`
    pub fn get(&self, name: &str) -> Option<LineConnection> {
        let connection = self.entries.get(name)?.connection.upgrade()?;
        Some(LineConnection::from_inner(connection))
    }

    /// Registered names, in no particular order
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Send `line` to every registered connection
    pub fn broadcast(&self, line: &str) -> BroadcastResult {
        self.send_to(self.snapshot(None), line)
    }

    /// Send `line` to every registered connection except `sender`
    ///
    /// The recipients are fixed before the first send. Connections that
    /// register while the broadcast runs do not receive the line; connections
    /// that close while it runs are counted as failed.
    pub fn broadcast_except(&self, sender: ConnectionId, line: &str) -> BroadcastResult {
        self.send_to(self.snapshot(Some(sender)), line)
    }

    fn snapshot(&self, skip: Option<ConnectionId>) -> Vec<(ConnectionId, LineConnection)> {
        self.entries
            .iter()
            .filter(|entry| Some(entry.id) != skip)
            .filter_map(|entry| {
                let connection = entry.connection.upgrade()?;
                Some((entry.id, LineConnection::from_inner(connection)))
            })
            .collect()
    }

    fn send_to(&self, targets: Vec<(ConnectionId, LineConnection)>, line: &str) -> BroadcastResult {
        let mut result = BroadcastResult::default();
        for (id, connection) in targets {
            result.record(id, connection.send_line(line));
        }
        result
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("len", &self.entries.len())
            .finish()
    }
}

/// Ownership of one registry entry
///
/// Held by the registered connection. Dropping it removes the entry, but only
/// if the entry still belongs to the same connection.
pub struct Registration {
    name: String,
    id: ConnectionId,
    entries: Arc<DashMap<String, RegistryEntry>>,
}

impl Registration {
    /// The registered name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The connection this entry points at
    pub fn connection_id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let id = self.id;
        self.entries.remove_if(&self.name, |_, entry| entry.id == id);
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::sync::mpsc;

    fn detached(id: u64) -> (LineConnection, mpsc::Receiver<String>) {
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        LineConnection::new(ConnectionId::new(id), addr, addr, 16)
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = Registry::new();
        let (alice, _rx) = detached(1);

        registry.register("alice", &alice).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("alice"));
        assert_eq!(registry.get("alice").map(|c| c.id()), Some(alice.id()));
        assert_eq!(alice.display_name().as_deref(), Some("alice"));
        assert_eq!(registry.names(), vec!["alice".to_string()]);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let registry = Registry::new();
        let (first, _rx1) = detached(1);
        let (second, _rx2) = detached(2);

        registry.register("bob", &first).unwrap();
        let err = registry.register("bob", &second).unwrap_err();
        assert!(matches!(err, ServiceError::NameAlreadyTaken(ref n) if n == "bob"));
        assert_eq!(registry.get("bob").map(|c| c.id()), Some(first.id()));
        assert_eq!(second.display_name(), None);
    }

    #[test]
    fn test_close_deregisters_synchronously() {
        let registry = Registry::new();
        let (conn, _rx) = detached(1);
        registry.register("carol", &conn).unwrap();

        assert!(conn.close());
        assert!(!registry.contains("carol"));
        assert!(registry.is_empty());

        // a second close does not touch the registry again
        let (other, _rx2) = detached(2);
        registry.register("carol", &other).unwrap();
        assert!(!conn.close());
        assert_eq!(registry.get("carol").map(|c| c.id()), Some(other.id()));
    }

    #[test]
    fn test_register_closed_connection() {
        let registry = Registry::new();
        let (conn, _rx) = detached(1);
        conn.close();

        assert!(matches!(
            registry.register("dave", &conn),
            Err(ServiceError::ConnectionClosed)
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_dropping_connection_deregisters() {
        let registry = Registry::new();
        let (conn, rx) = detached(1);
        registry.register("erin", &conn).unwrap();

        drop(conn);
        drop(rx);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reregister_replaces_previous_name() {
        let registry = Registry::new();
        let (conn, _rx) = detached(1);
        registry.register("old", &conn).unwrap();
        registry.register("new", &conn).unwrap();

        assert!(!registry.contains("old"));
        assert!(registry.contains("new"));
        assert_eq!(conn.display_name().as_deref(), Some("new"));
    }

    #[test]
    fn test_broadcast_except_skips_sender() {
        let registry = Registry::new();
        let (a, mut rx_a) = detached(1);
        let (b, mut rx_b) = detached(2);
        let (c, mut rx_c) = detached(3);
        registry.register("a", &a).unwrap();
        registry.register("b", &b).unwrap();
        registry.register("c", &c).unwrap();

        let result = registry.broadcast_except(a.id(), "<a> hi");
        assert_eq!(result.total, 2);
        assert!(result.all_succeeded());
        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap(), "<a> hi");
        assert_eq!(rx_c.try_recv().unwrap(), "<a> hi");

        let result = registry.broadcast("notice");
        assert_eq!(result.succeeded, 3);
        assert_eq!(rx_a.try_recv().unwrap(), "notice");
    }

    #[test]
    fn test_greeting_precedes_broadcasts() {
        let registry = Registry::new();
        let (a, _rx_a) = detached(1);
        let (b, mut rx_b) = detached(2);
        registry.register("a", &a).unwrap();

        registry
            .register_with_greeting("b", &b, "Welcome, b!")
            .unwrap();
        registry.broadcast_except(a.id(), "<a> hi");
        assert_eq!(rx_b.try_recv().unwrap(), "Welcome, b!");
        assert_eq!(rx_b.try_recv().unwrap(), "<a> hi");

        // no greeting for a taken name
        let (c, mut rx_c) = detached(3);
        assert!(registry.register_with_greeting("b", &c, "Welcome, b!").is_err());
        assert!(rx_c.try_recv().is_err());
    }

    #[test]
    fn test_greeting_wins_race_with_broadcast() {
        for round in 0..50 {
            let registry = Registry::new();
            let (sender, _rx) = detached(1);
            registry.register("sender", &sender).unwrap();
            let (joiner, mut rx) = LineConnection::new(
                ConnectionId::new(2),
                "127.0.0.1:4000".parse().unwrap(),
                "127.0.0.1:4000".parse().unwrap(),
                256,
            );

            std::thread::scope(|scope| {
                scope.spawn(|| {
                    for _ in 0..100 {
                        registry.broadcast_except(sender.id(), "<sender> hi");
                    }
                });
                scope.spawn(|| {
                    registry
                        .register_with_greeting("joiner", &joiner, "Welcome, joiner!")
                        .unwrap();
                });
            });

            assert_eq!(
                rx.try_recv().unwrap(),
                "Welcome, joiner!",
                "round {round}"
            );
        }
    }

    #[test]
    fn test_broadcast_counts_full_queues() {
        let registry = Registry::new();
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let (slow, _rx) = LineConnection::new(ConnectionId::new(7), addr, addr, 1);
        registry.register("slow", &slow).unwrap();

        assert!(registry.broadcast("first").all_succeeded());
        let result = registry.broadcast("second");
        assert_eq!(result.failed, 1);
        assert_eq!(result.errors[0].0, slow.id());
    }

    #[test]
    fn test_concurrent_register_same_name() {
        let registry = Registry::new();
        let connections: Vec<_> = (0..16).map(detached).collect();

        let winners = std::thread::scope(|scope| {
            let handles: Vec<_> = connections
                .iter()
                .map(|(conn, _)| {
                    let registry = registry.clone();
                    scope.spawn(move || registry.register("frank", conn).is_ok())
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|won| *won)
                .count()
        });
        assert_eq!(winners, 1);
        assert_eq!(registry.len(), 1);
    }
}
