//! In-memory port implementations for unit tests

use crate::domain::ports::{
    ClusterApi, CommandOutput, CommandRunner, CommandSpec, NodeInfo, WorkloadRef,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Scripted ready-count observation
#[derive(Debug, Clone, Copy)]
pub enum Observation {
    Count(i32),
    /// The status read fails with a transient error
    Unavailable,
    /// The status read fails with a non-transient error
    Rejected,
}

/// Fake cluster with a fixed node list and scripted workload readiness
///
/// Each workload replays its observations in order; the last one repeats.
#[derive(Default)]
pub struct FakeCluster {
    nodes: Option<Vec<NodeInfo>>,
    readiness: Mutex<HashMap<String, VecDeque<Observation>>>,
    list_calls: AtomicUsize,
    status_calls: AtomicUsize,
}

impl FakeCluster {
    pub fn with_nodes(nodes: Vec<NodeInfo>) -> Self {
        Self {
            nodes: Some(nodes),
            ..Default::default()
        }
    }

    /// A cluster whose node list call fails
    pub fn unreachable() -> Self {
        Self::default()
    }

    pub fn script(self, workload: &str, observations: &[Observation]) -> Self {
        self.readiness
            .lock()
            .insert(workload.to_string(), observations.iter().copied().collect());
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn list_nodes(&self) -> Result<Vec<NodeInfo>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.nodes.clone().ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))
        })
    }

    async fn ready_count(&self, workload: &WorkloadRef) -> Result<i32> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let mut readiness = self.readiness.lock();
        let observation = match readiness.get_mut(&workload.name) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().copied(),
            None => None,
        };
        match observation {
            Some(Observation::Count(count)) => Ok(count),
            Some(Observation::Unavailable) | None => Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", workload),
            ))),
            Some(Observation::Rejected) => {
                Err(Error::Internal(format!("{} status is malformed", workload)))
            }
        }
    }
}

type Responder = Box<dyn Fn(&CommandSpec) -> CommandOutput + Send + Sync>;

/// Fake process runner that records every command
pub struct FakeRunner {
    responder: Responder,
    calls: Mutex<Vec<CommandSpec>>,
}

impl FakeRunner {
    /// Every command succeeds
    pub fn succeeding() -> Self {
        Self::with(|_| CommandOutput::success(""))
    }

    pub fn with<F>(responder: F) -> Self
    where
        F: Fn(&CommandSpec) -> CommandOutput + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.calls.lock().push(spec.clone());
        Ok((self.responder)(spec))
    }
}
