use crate::epoch::Epoch;

/// What happened to the engine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// The active watershed selection changed. `selected` is `None` when the
    /// selection is unfiltered, else the number of selected codes.
    SelectionChanged { selected: Option<usize> },
    /// A layer finished its first (and only) load.
    LayerLoaded {
        layer: String,
        features: usize,
        failed_files: usize,
    },
    /// A layer was switched on and its view is current.
    LayerActivated { layer: String },
    /// A layer was switched off.
    LayerDeactivated { layer: String },
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::SelectionChanged { .. } => "selection_changed",
            EventKind::LayerLoaded { .. } => "layer_loaded",
            EventKind::LayerActivated { .. } => "layer_activated",
            EventKind::LayerDeactivated { .. } => "layer_deactivated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Selection epoch the state was in right after the mutation.
    pub epoch: Epoch,
    pub kind: EventKind,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type Listener = Box<dyn FnMut(&Event) + Send>;

/// Synchronous event dispatch plus a bounded record of past events.
///
/// Listeners run in subscription order, on the caller's thread, before
/// `emit` returns.
pub struct EventBus {
    events: Vec<Event>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
    max_recorded: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("events", &self.events)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl EventBus {
    pub const DEFAULT_MAX_RECORDED: usize = 1024;

    pub fn new() -> Self {
        Self::with_max_recorded(Self::DEFAULT_MAX_RECORDED)
    }

    pub fn with_max_recorded(max_recorded: usize) -> Self {
        Self {
            events: Vec::new(),
            listeners: Vec::new(),
            next_listener: 1,
            max_recorded,
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&Event) + Send + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns `true` if the listener was registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    pub fn emit(&mut self, epoch: Epoch, kind: EventKind) {
        let event = Event { epoch, kind };
        for (_, listener) in &mut self.listeners {
            listener(&event);
        }

        if self.max_recorded == 0 {
            return;
        }
        if self.events.len() == self.max_recorded {
            self.events.remove(0);
        }
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::{EventBus, EventKind};
    use crate::epoch::Epoch;
    use std::sync::{Arc, Mutex};

    fn activated(layer: &str) -> EventKind {
        EventKind::LayerActivated {
            layer: layer.to_string(),
        }
    }

    #[test]
    fn records_events_with_epoch() {
        let mut bus = EventBus::new();
        bus.emit(Epoch(2), EventKind::SelectionChanged { selected: Some(1) });
        assert_eq!(bus.events().len(), 1);
        assert_eq!(bus.events()[0].epoch, Epoch(2));
        assert_eq!(bus.events()[0].kind.name(), "selection_changed");
    }

    #[test]
    fn drain_clears_events() {
        let mut bus = EventBus::new();
        bus.emit(Epoch(0), activated("solos"));
        let drained = bus.drain();
        assert_eq!(drained.len(), 1);
        assert!(bus.events().is_empty());
    }

    #[test]
    fn listeners_run_synchronously_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();

        let a = Arc::clone(&seen);
        bus.subscribe(move |e| a.lock().unwrap().push(format!("a:{}", e.kind.name())));
        let b = Arc::clone(&seen);
        let id_b = bus.subscribe(move |e| b.lock().unwrap().push(format!("b:{}", e.kind.name())));

        bus.emit(Epoch(1), activated("solos"));
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["a:layer_activated", "b:layer_activated"]
        );

        assert!(bus.unsubscribe(id_b));
        assert!(!bus.unsubscribe(id_b));
        bus.emit(Epoch(1), activated("solos"));
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[test]
    fn record_is_bounded() {
        let mut bus = EventBus::with_max_recorded(2);
        for i in 0..5 {
            bus.emit(Epoch(i), activated("x"));
        }
        let epochs: Vec<u64> = bus.events().iter().map(|e| e.epoch.0).collect();
        assert_eq!(epochs, vec![3, 4]);
    }
}
