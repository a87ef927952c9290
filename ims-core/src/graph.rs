//! Cooperative stream-graph scheduler: one worker runs every node's
//! `process_data` to completion in turn, per §5's "single worker thread
//! owned by a scheduler; nodes execute ProcessData in a run-to-completion
//! manner".

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ims_shared::Result;
use tracing::{debug, warn};

/// One stage of a stream graph: source, packetizer, RTP encoder,
/// socket-writer on TX; socket-reader, RTP decoder, depacketizer,
/// jitter buffer, sink on RX.
pub trait Node: Send {
    fn name(&self) -> &str;
    fn process_data(&mut self) -> Result<()>;
}

/// Shared stop flag a scheduler and any platform I/O threads feeding it
/// poll at every loop iteration, per §5's cancellation model.
#[derive(Clone)]
pub struct StopToken {
    flag: Arc<AtomicBool>,
}

impl StopToken {
    pub fn new() -> Self {
        StopToken {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl Default for StopToken {
    fn default() -> Self {
        Self::new()
    }
}

pub struct StreamGraph {
    nodes: Vec<Box<dyn Node>>,
    stop_token: StopToken,
}

impl StreamGraph {
    pub fn new() -> Self {
        StreamGraph {
            nodes: Vec::new(),
            stop_token: StopToken::new(),
        }
    }

    pub fn add_node(&mut self, node: Box<dyn Node>) {
        self.nodes.push(node);
    }

    pub fn stop_token(&self) -> StopToken {
        self.stop_token.clone()
    }

    /// Runs every node once, in pipeline order. The caller drives the
    /// cadence (a scheduler loop, or a test harness calling this
    /// directly); this never blocks on its own.
    pub fn run_once(&mut self) {
        for node in &mut self.nodes {
            if let Err(err) = node.process_data() {
                warn!(node = node.name(), ?err, "stream graph node failed");
            } else {
                debug!(node = node.name(), "stream graph node processed");
            }
        }
    }

    /// Runs `run_once` in a loop until `stop()` is called on the
    /// returned [`StopToken`].
    pub fn run_until_stopped(&mut self) {
        while !self.stop_token.is_stopped() {
            self.run_once();
        }
    }
}

impl Default for StreamGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    struct CountingNode {
        count: Arc<AtomicUsize>,
    }

    impl Node for CountingNode {
        fn name(&self) -> &str {
            "counting"
        }

        fn process_data(&mut self) -> Result<()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn run_once_advances_every_node() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut graph = StreamGraph::new();
        graph.add_node(Box::new(CountingNode { count: count.clone() }));
        graph.run_once();
        graph.run_once();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    struct SelfStoppingNode {
        count: Arc<AtomicUsize>,
        token: StopToken,
    }

    impl Node for SelfStoppingNode {
        fn name(&self) -> &str {
            "self-stopping"
        }

        fn process_data(&mut self) -> Result<()> {
            let n = self.count.fetch_add(1, Ordering::SeqCst);
            if n >= 4 {
                self.token.stop();
            }
            Ok(())
        }
    }

    #[test]
    fn stop_token_halts_run_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut graph = StreamGraph::new();
        let token = graph.stop_token();
        graph.add_node(Box::new(SelfStoppingNode {
            count: count.clone(),
            token,
        }));
        graph.run_until_stopped();
        assert!(count.load(Ordering::SeqCst) >= 5);
    }
}
