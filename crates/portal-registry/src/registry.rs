//! Server registry: tracks which backend servers are reachable.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use portal_transport::ConnectionId;

/// One registered backend server.
///
/// The entry refers to its control-plane connection by id only. It never
/// keeps the connection alive; the socket server removes the entry when
/// that connection closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEntry {
    /// Logical server name, unique within the registry.
    pub name: String,
    /// Address players are transferred to.
    pub address: String,
    /// The control-plane connection that registered this server.
    pub owner: ConnectionId,
}

/// Concurrent map from server name to [`ServerEntry`].
///
/// Every read and write goes through one `RwLock` that is held only for the
/// map operation itself. Nothing here awaits or performs I/O, so callers
/// can use it from async tasks and from `Drop` alike.
///
/// ## Invariants
///
/// - At most one entry per name. Registering an existing name replaces the
///   entry in a single write, so readers see either the old or the new
///   entry, never neither.
/// - Entries are removed only by explicit removal or connection cleanup.
#[derive(Debug, Default)]
pub struct ServerRegistry {
    servers: RwLock<HashMap<String, ServerEntry>>,
}

impl ServerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            servers: RwLock::new(HashMap::new()),
        }
    }

    // A panic while holding the lock cannot leave the map half-updated
    // (every mutation is a single HashMap call), so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ServerEntry>> {
        self.servers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ServerEntry>> {
        self.servers.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts a server, replacing any entry with the same name.
    ///
    /// Last write wins: a previous owner under the same name is not
    /// disconnected, which lets a restarted backend re-register before
    /// the proxy notices its old connection died. Returns the replaced
    /// entry, if any.
    pub fn add(
        &self,
        name: &str,
        address: &str,
        owner: ConnectionId,
    ) -> Option<ServerEntry> {
        let entry = ServerEntry {
            name: name.to_string(),
            address: address.to_string(),
            owner,
        };
        let previous = self.write().insert(entry.name.clone(), entry);

        match &previous {
            Some(old) if old.owner != owner => tracing::info!(
                server = name,
                old_owner = %old.owner,
                new_owner = %owner,
                "server registration replaced by a new connection"
            ),
            _ => tracing::debug!(server = name, %owner, address, "server added"),
        }
        previous
    }

    /// Removes the entry for `name`. No-op if it does not exist.
    pub fn remove(&self, name: &str) -> Option<ServerEntry> {
        let removed = self.write().remove(name);
        if removed.is_some() {
            tracing::debug!(server = name, "server removed");
        }
        removed
    }

    /// Removes the entry for `name` only if `owner` registered it.
    ///
    /// A connection withdrawing its own registration must not remove an
    /// entry a newer connection has since taken over.
    pub fn remove_if_owned(&self, name: &str, owner: ConnectionId) -> bool {
        let mut servers = self.write();
        match servers.get(name) {
            Some(entry) if entry.owner == owner => {
                servers.remove(name);
                true
            }
            _ => false,
        }
    }

    /// Removes every entry registered by `owner` and returns them.
    ///
    /// Called when a control-plane connection closes. Linear in the number
    /// of entries.
    pub fn remove_by_connection(&self, owner: ConnectionId) -> Vec<ServerEntry> {
        let mut removed = Vec::new();
        self.write().retain(|_, entry| {
            if entry.owner == owner {
                removed.push(entry.clone());
                false
            } else {
                true
            }
        });
        for entry in &removed {
            tracing::debug!(server = %entry.name, %owner, "server removed with its connection");
        }
        removed
    }

    /// Looks up a server by name.
    pub fn lookup(&self, name: &str) -> Option<ServerEntry> {
        self.read().get(name).cloned()
    }

    /// Returns an arbitrary registered server, if any.
    ///
    /// No ordering is promised beyond "some currently registered entry".
    pub fn any(&self) -> Option<ServerEntry> {
        self.read().values().next().cloned()
    }

    /// Returns a snapshot of all entries.
    pub fn entries(&self) -> Vec<ServerEntry> {
        self.read().values().cloned().collect()
    }

    /// Names of the servers registered by `owner`.
    pub fn names_owned_by(&self, owner: ConnectionId) -> Vec<String> {
        self.read()
            .values()
            .filter(|entry| entry.owner == owner)
            .map(|entry| entry.name.clone())
            .collect()
    }

    /// Returns the number of registered servers.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` if no server is registered.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
