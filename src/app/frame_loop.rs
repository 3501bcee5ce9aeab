use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    pub dt: Duration,
}

/// Decides whether a frame runs. Once stopped, no further tick is handed out
/// and the host must not schedule another redraw.
#[derive(Debug)]
pub struct FrameLoop {
    state: LoopState,
    last: Option<Instant>,
    ticks: u64,
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameLoop {
    pub fn new() -> Self {
        Self {
            state: LoopState::Stopped,
            last: None,
            ticks: 0,
        }
    }

    pub fn start(&mut self) {
        self.state = LoopState::Running;
        self.last = None;
    }

    pub fn stop(&mut self) {
        if self.state == LoopState::Running {
            log::debug!("Frame loop stopped after {} ticks", self.ticks);
        }
        self.state = LoopState::Stopped;
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    pub fn tick(&mut self, now: Instant) -> Option<FrameTick> {
        if self.state != LoopState::Running {
            return None;
        }
        let dt = self
            .last
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or(Duration::from_millis(16));
        self.last = Some(now);
        self.ticks += 1;
        Some(FrameTick { dt })
    }
}

#[cfg(test)]
mod tests {
    use super::FrameLoop;
    use std::time::{Duration, Instant};

    #[test]
    fn ticks_only_while_running() {
        let mut frame_loop = FrameLoop::new();
        let start = Instant::now();
        assert!(frame_loop.tick(start).is_none());

        frame_loop.start();
        let first = frame_loop.tick(start).unwrap();
        assert_eq!(first.dt, Duration::from_millis(16));
        let second = frame_loop.tick(start + Duration::from_millis(20)).unwrap();
        assert_eq!(second.dt, Duration::from_millis(20));

        frame_loop.stop();
        assert!(!frame_loop.is_running());
        assert!(frame_loop.tick(start + Duration::from_millis(40)).is_none());
        assert_eq!(frame_loop.ticks, 2);
    }
}
