
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfilerError {
    #[error("profiler section identifier is empty or nil")]
    EmptySection,
}

/// Accumulated time for one section, as reported to the host
#[derive(Debug, Clone, Serialize)]
pub struct SectionTiming {
    pub id: String,
    pub seconds: f64,
}

#[derive(Debug)]
struct ActiveSection {
    id: String,
    started: Instant,
}

/// Named duration counters with a single running timer.
///
/// Starting a section stops whichever one is running; sections never nest.
#[derive(Debug, Default)]
pub struct Profiler {
    sections: BTreeMap<String, f64>,
    active: Option<ActiveSection>,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch timing to `id`, folding the running section into its total first
    pub fn start(&mut self, id: &str) -> Result<(), ProfilerError> {
        if id.is_empty() {
            return Err(ProfilerError::EmptySection);
        }

        self.stop();
        self.sections.entry(id.to_string()).or_insert(0.0);
        self.active = Some(ActiveSection {
            id: id.to_string(),
            started: Instant::now(),
        });
        Ok(())
    }

    /// Stop the running section, if any
    pub fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            let elapsed = active.started.elapsed().as_secs_f64();
            *self.sections.entry(active.id).or_insert(0.0) += elapsed;
        }
    }

    /// Accumulated seconds for `id`, including in-flight time when it is running
    pub fn get(&self, id: &str) -> f64 {
        let Some(&accumulated) = self.sections.get(id) else {
            return 0.0;
        };

        match &self.active {
            Some(active) if active.id == id => accumulated + active.started.elapsed().as_secs_f64(),
            _ => accumulated,
        }
    }

    /// Section identifiers in sorted order
    pub fn list(&self) -> Vec<String> {
        self.sections.keys().cloned().collect()
    }

    /// Zero every total and restart the running section's clock
    pub fn reset(&mut self) {
        for total in self.sections.values_mut() {
            *total = 0.0;
        }
        if let Some(active) = self.active.as_mut() {
            active.started = Instant::now();
        }
    }

    /// Drop all sections and the running timer
    pub fn clear(&mut self) {
        self.sections.clear();
        self.active = None;
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.id.as_str())
    }

    pub fn report(&self) -> Vec<SectionTiming> {
        self.sections
            .keys()
            .map(|id| SectionTiming {
                id: id.clone(),
                seconds: self.get(id),
            })
            .collect()
    }
}
