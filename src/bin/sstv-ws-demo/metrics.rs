use std::sync::OnceLock;

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

pub struct Metrics {
    pub registry: Registry,
    pub sessions_attached_total: IntCounter,
    pub sessions_active: IntGauge,
    pub frames_sent_total: IntCounter,
    pub pcm_samples_dropped_total: IntCounter,
}

impl Metrics {
    fn build() -> Self {
        let registry = Registry::new();

        let sessions_attached_total =
            IntCounter::new("sstv_sessions_attached_total", "extension sessions attached").unwrap();
        let sessions_active =
            IntGauge::new("sstv_sessions_active", "currently attached extension sessions").unwrap();
        let frames_sent_total =
            IntCounter::new("sstv_frames_sent_total", "wire frames sent to clients").unwrap();
        let pcm_samples_dropped_total = IntCounter::new(
            "sstv_pcm_samples_dropped_total",
            "PCM samples dropped due to feed backpressure",
        )
        .unwrap();

        registry.register(Box::new(sessions_attached_total.clone())).unwrap();
        registry.register(Box::new(sessions_active.clone())).unwrap();
        registry.register(Box::new(frames_sent_total.clone())).unwrap();
        registry.register(Box::new(pcm_samples_dropped_total.clone())).unwrap();

        Self {
            registry,
            sessions_attached_total,
            sessions_active,
            frames_sent_total,
            pcm_samples_dropped_total,
        }
    }

    pub fn global() -> &'static Metrics {
        static METRICS: OnceLock<Metrics> = OnceLock::new();
        METRICS.get_or_init(Metrics::build)
    }

    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        encoder.encode(&self.registry.gather(), &mut buf).unwrap();
        String::from_utf8(buf).unwrap_or_default()
    }
}
