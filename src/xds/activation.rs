//! Listener activation
//!
//! Decides listener enablement from route-table content and keeps the
//! assignment bookkeeping on route tables in step. The pass is pull-style and
//! idempotent: running [`resolve`] twice with no store change in between
//! flips nothing the second time.
//!
//! There is no reverse rule. A listener that was enabled stays enabled even if
//! its route table later loses its content.

use tracing::{debug, info};

use crate::domain::EntityState;
use crate::storage::EntityStore;

/// A listener flipped to `enabled` by a resolver pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    pub listener: String,
    pub route_table: String,
}

/// True when `route_table` exists and has at least one content element.
pub fn route_table_ready(store: &EntityStore, route_table: &str) -> bool {
    store.route_table(route_table).map(|table| table.has_content()).unwrap_or(false)
}

/// Initial state for a listener about to be created against `route_table`.
pub fn listener_initial_state(store: &EntityStore, route_table: &str) -> EntityState {
    if route_table_ready(store, route_table) {
        EntityState::Enabled
    } else {
        EntityState::Disabled
    }
}

/// Enable every disabled listener whose route table now has content and record
/// it in that table's assignment set.
pub fn resolve(store: &mut EntityStore) -> Vec<Activation> {
    let view: &EntityStore = store;
    let mut pending: Vec<Activation> = view
        .listeners()
        .filter(|listener| !listener.state.is_enabled())
        .filter(|listener| route_table_ready(view, &listener.route_table))
        .map(|listener| Activation {
            listener: listener.name.clone(),
            route_table: listener.route_table.clone(),
        })
        .collect();
    pending.sort_by(|a, b| a.listener.cmp(&b.listener));

    for activation in &pending {
        if let Err(e) = store.set_listener_state(&activation.listener, EntityState::Enabled) {
            debug!(listener = %activation.listener, error = %e, "Listener vanished before activation");
            continue;
        }
        store.assign_listener(&activation.route_table, &activation.listener);
        info!(
            listener = %activation.listener,
            route_table = %activation.route_table,
            "Listener activated by route table content"
        );
    }

    pending
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Listener, VirtualHost};

    fn disabled_listener(name: &str, route_table: &str) -> Listener {
        Listener::new(name, "0.0.0.0", 10000, route_table, EntityState::Disabled)
    }

    #[test]
    fn initial_state_follows_content() {
        let mut store = EntityStore::new();
        assert_eq!(listener_initial_state(&store, "r1"), EntityState::Disabled);

        store.add_route_table("r1", None).unwrap();
        assert_eq!(listener_initial_state(&store, "r1"), EntityState::Disabled);

        store.add_virtual_host("r1", VirtualHost::new("vh", vec!["*".into()])).unwrap();
        assert_eq!(listener_initial_state(&store, "r1"), EntityState::Enabled);
    }

    #[test]
    fn resolve_enables_waiting_listeners_and_assigns() {
        let mut store = EntityStore::new();
        store.add_listener(disabled_listener("l1", "r1")).unwrap();
        store.add_listener(disabled_listener("l2", "other")).unwrap();
        assert!(resolve(&mut store).is_empty());

        store.add_route_table("r1", Some("c1".into())).unwrap();
        let activated = resolve(&mut store);
        assert_eq!(
            activated,
            vec![Activation { listener: "l1".into(), route_table: "r1".into() }]
        );

        assert_eq!(store.listener("l1").unwrap().state, EntityState::Enabled);
        assert_eq!(store.listener("l2").unwrap().state, EntityState::Disabled);
        assert!(store.route_table("r1").unwrap().assignments.contains("l1"));
    }

    #[test]
    fn resolve_is_idempotent() {
        let mut store = EntityStore::new();
        store.add_route_table("r1", Some("c1".into())).unwrap();
        store.add_listener(disabled_listener("l1", "r1")).unwrap();

        assert_eq!(resolve(&mut store).len(), 1);
        let before = store.route_table("r1").unwrap().clone();
        assert!(resolve(&mut store).is_empty());
        assert_eq!(store.route_table("r1").unwrap(), &before);
    }

    #[test]
    fn empty_table_does_not_activate() {
        let mut store = EntityStore::new();
        store.add_route_table("r1", None).unwrap();
        store.add_listener(disabled_listener("l1", "r1")).unwrap();
        assert!(resolve(&mut store).is_empty());
        assert!(store.route_table("r1").unwrap().assignments.is_empty());
    }
}
