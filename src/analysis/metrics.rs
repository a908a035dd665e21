use indexmap::IndexMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisPhase {
    Decode,
    StageOne,
    StageTwo,
    ColorHarmony,
    Aggregation,
    Classification,
}

impl AnalysisPhase {
    pub fn name(&self) -> &'static str {
        match self {
            AnalysisPhase::Decode => "decode",
            AnalysisPhase::StageOne => "stage_one",
            AnalysisPhase::StageTwo => "stage_two",
            AnalysisPhase::ColorHarmony => "color_harmony",
            AnalysisPhase::Aggregation => "aggregation",
            AnalysisPhase::Classification => "classification",
        }
    }
}

/// Metrics collected while analyzing one asset
#[derive(Debug, Clone, Default)]
pub struct AnalysisMetrics {
    phases: IndexMap<AnalysisPhase, Duration>,
    total: Option<Duration>,
    capability_fallbacks: usize,
    fallback_used: bool,
}

impl AnalysisMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, phase: AnalysisPhase, duration: Duration) {
        self.phases.insert(phase, duration);
    }

    /// Runs `f` and records how long it took.
    pub fn time<T>(&mut self, phase: AnalysisPhase, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let value = f();
        self.record(phase, start.elapsed());
        value
    }

    pub fn add_capability_fallbacks(&mut self, count: usize) {
        self.capability_fallbacks += count;
    }

    pub fn capability_fallbacks(&self) -> usize {
        self.capability_fallbacks
    }

    /// The whole record was replaced by the default record.
    pub fn mark_fallback(&mut self) {
        self.fallback_used = true;
    }

    pub fn fallback_used(&self) -> bool {
        self.fallback_used
    }

    pub fn finalize(&mut self, start_time: Instant) {
        self.total = Some(start_time.elapsed());
    }

    pub fn duration(&self, phase: AnalysisPhase) -> Option<Duration> {
        self.phases.get(&phase).copied()
    }

    /// Phase name to microseconds, in the order phases ran, plus the total.
    pub fn to_micros(&self) -> IndexMap<String, u64> {
        let mut micros: IndexMap<String, u64> = self
            .phases
            .iter()
            .map(|(phase, duration)| (phase.name().to_string(), duration.as_micros() as u64))
            .collect();
        if let Some(total) = self.total {
            micros.insert("total".to_string(), total.as_micros() as u64);
        }
        micros
    }
}
