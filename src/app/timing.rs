use std::time::Instant;
use winit::window::Window;

/// Tracks frame cadence and shows it in the window title.
pub struct FrameTiming {
    last_fps_time: Instant,
    frame_count: u32,
    frame_dt: f32,
    render_ms: f32,
    base_title: String,
}

impl FrameTiming {
    pub fn new(base_title: impl Into<String>) -> Self {
        Self {
            last_fps_time: Instant::now(),
            frame_count: 0,
            frame_dt: 1.0 / 60.0,
            render_ms: 0.0,
            base_title: base_title.into(),
        }
    }

    pub fn frame_dt(&self) -> f32 {
        self.frame_dt
    }

    pub fn set_render_ms(&mut self, render_ms: f32) {
        self.render_ms = render_ms;
    }

    pub fn update(&mut self, window: &Window, now: Instant, dt: std::time::Duration) {
        self.frame_dt = dt.as_secs_f32().max(0.0);
        self.frame_count = self.frame_count.saturating_add(1);
        let elapsed = now.saturating_duration_since(self.last_fps_time);
        if elapsed.as_secs_f32() >= 0.5 {
            let fps = self.frame_count as f32 / elapsed.as_secs_f32();
            window.set_title(&format!(
                "{} - {:.1} fps (render {:.2} ms)",
                self.base_title, fps, self.render_ms
            ));
            self.frame_count = 0;
            self.last_fps_time = now;
        }
    }
}
