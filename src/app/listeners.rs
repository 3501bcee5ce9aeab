/// Window signals the viewer subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowSignal {
    Resize,
    Pointer,
    Wheel,
}

/// Subscriptions to window signals. The host only forwards a signal while
/// someone listens for it.
#[derive(Debug, Default)]
pub struct EventListeners {
    active: Vec<WindowSignal>,
}

impl EventListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, signal: WindowSignal) {
        if !self.listens(signal) {
            self.active.push(signal);
        }
    }

    pub fn listens(&self, signal: WindowSignal) -> bool {
        self.active.contains(&signal)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Detaches everything. Returns how many listeners were removed.
    pub fn clear(&mut self) -> usize {
        let count = self.active.len();
        self.active.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::{EventListeners, WindowSignal};

    #[test]
    fn add_and_clear() {
        let mut listeners = EventListeners::new();
        listeners.add(WindowSignal::Resize);
        listeners.add(WindowSignal::Resize);
        listeners.add(WindowSignal::Wheel);
        assert!(listeners.listens(WindowSignal::Resize));
        assert!(!listeners.listens(WindowSignal::Pointer));
        assert_eq!(listeners.len(), 2);

        assert_eq!(listeners.clear(), 2);
        assert_eq!(listeners.len(), 0);
        assert!(!listeners.listens(WindowSignal::Wheel));
    }
}
