//! Output pins and the host graph connection
//!
//! Nodes signal the surrounding script graph through named output pins. The
//! runtime forwards every firing to a [`GraphSink`]; what a pin connects to
//! is entirely the host's business.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::dialogue::NodeId;
use crate::fragment::FragmentId;

/// A named output pin on a dialogue node
///
/// `Display` renders the wire names the host graph sees: `Out`, `Bypass`,
/// `Start_<guid>`, `End_<guid>`, `Prompt_<guid>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputPin {
    /// Normal completion
    Out,
    /// The node declined to run (conditions, limits, empty prompt set)
    Bypass,
    /// A fragment's optional start pin
    Start(FragmentId),
    /// A fragment's optional end pin
    End(FragmentId),
    /// The per-fragment continuation of a selected prompt
    Prompt(FragmentId),
}

impl fmt::Display for OutputPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputPin::Out => write!(f, "Out"),
            OutputPin::Bypass => write!(f, "Bypass"),
            OutputPin::Start(guid) => write!(f, "Start_{guid}"),
            OutputPin::End(guid) => write!(f, "End_{guid}"),
            OutputPin::Prompt(guid) => write!(f, "Prompt_{guid}"),
        }
    }
}

/// Where pin firings go
pub trait GraphSink: Send + Sync {
    /// A node fired one of its output pins
    fn trigger(&mut self, node: NodeId, pin: OutputPin);
}

/// Discards every firing; the default sink
#[derive(Debug, Clone, Copy, Default)]
pub struct NullGraph;

impl GraphSink for NullGraph {
    fn trigger(&mut self, _node: NodeId, _pin: OutputPin) {}
}

/// Records firings in order; clones share the same log
///
/// Hand one clone to the runtime and keep another to inspect what fired.
#[derive(Debug, Clone, Default)]
pub struct RecordingGraph {
    log: Arc<Mutex<Vec<(NodeId, OutputPin)>>>,
}

impl RecordingGraph {
    /// An empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self) -> std::sync::MutexGuard<'_, Vec<(NodeId, OutputPin)>> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Everything fired so far, in order
    pub fn fired(&self) -> Vec<(NodeId, OutputPin)> {
        self.log().clone()
    }

    /// Pins fired by one node, in order
    pub fn fired_by(&self, node: NodeId) -> Vec<OutputPin> {
        self.log()
            .iter()
            .filter(|(n, _)| *n == node)
            .map(|(_, pin)| *pin)
            .collect()
    }

    /// Drop everything recorded so far
    pub fn clear(&self) {
        self.log().clear();
    }
}

impl GraphSink for RecordingGraph {
    fn trigger(&mut self, node: NodeId, pin: OutputPin) {
        self.log().push((node, pin));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_names_match_the_wire_format() {
        let guid = FragmentId::new();
        assert_eq!(OutputPin::Out.to_string(), "Out");
        assert_eq!(OutputPin::Bypass.to_string(), "Bypass");
        assert_eq!(
            OutputPin::Start(guid).to_string(),
            format!("Start_{}", guid.0)
        );
        assert_eq!(OutputPin::End(guid).to_string(), format!("End_{}", guid.0));
        assert_eq!(
            OutputPin::Prompt(guid).to_string(),
            format!("Prompt_{}", guid.0)
        );
    }

    #[test]
    fn test_recording_graph_clones_share_a_log() {
        let recorder = RecordingGraph::new();
        let mut sink = recorder.clone();
        let node = NodeId::new();

        sink.trigger(node, OutputPin::Bypass);
        sink.trigger(node, OutputPin::Out);

        assert_eq!(recorder.fired_by(node), vec![OutputPin::Bypass, OutputPin::Out]);
        recorder.clear();
        assert!(recorder.fired().is_empty());
    }
}
