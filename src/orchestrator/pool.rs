//! Fixed-size worker pool over a static host split.
//!
//! Each worker owns one graph client and runs its hosts one after another on a
//! blocking thread of a tokio runtime. Hosts are split round-robin once, before
//! dispatch; workers share nothing but the job function.

use crate::error::{PipelineError, PipelineResult};
use crate::graph::GraphClient;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{error, info};

/// Host outcomes of one pool run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolReport {
    pub succeeded: usize,
    pub failed: usize,
}

impl PoolReport {
    fn merge(&mut self, other: PoolReport) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
    }
}

pub struct WorkerPool {
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        Self { size: size.max(1) }
    }

    /// Number of workers (and clients) a run over `hosts` hosts needs.
    pub fn workers_for(&self, hosts: usize) -> usize {
        self.size.min(hosts)
    }

    /// Round-robin share of worker `index` out of `workers`.
    pub fn split(hosts: &[String], index: usize, workers: usize) -> Vec<String> {
        hosts.iter().skip(index).step_by(workers.max(1)).cloned().collect()
    }

    /// Run `job` once per host. A failed or panicking job is logged and
    /// counted; it does not stop the other hosts. Uses at most `clients.len()` workers.
    pub fn run<C, F>(&self, hosts: Vec<String>, mut clients: Vec<C>, job: F) -> PipelineResult<PoolReport>
    where
        C: GraphClient + 'static,
        F: Fn(&C, &str) -> PipelineResult<usize> + Send + Sync + 'static,
    {
        let workers = self.workers_for(hosts.len()).min(clients.len());
        if workers == 0 {
            if !hosts.is_empty() {
                return Err(PipelineError::Runtime("no graph client for the worker pool".into()));
            }
            return Ok(PoolReport::default());
        }
        // Unused clients are released here, outside the runtime.
        clients.truncate(workers);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(workers)
            .thread_name("flowgraph-worker")
            .build()
            .map_err(|e| PipelineError::Runtime(e.to_string()))?;

        let total = hosts.len();
        let job = Arc::new(job);
        let started = Instant::now();
        info!(hosts = total, workers, "dispatching host jobs");

        let mut report = runtime.block_on(async move {
            let mut set = JoinSet::new();
            for (index, client) in clients.into_iter().enumerate() {
                let share = Self::split(&hosts, index, workers);
                let job = Arc::clone(&job);
                set.spawn_blocking(move || run_worker(index, &client, &share, job.as_ref()));
            }
            let mut report = PoolReport::default();
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok(worker_report) => report.merge(worker_report),
                    Err(e) => error!(error = %e, "worker aborted"),
                }
            }
            report
        });

        // Hosts of an aborted worker never reported.
        report.failed += total.saturating_sub(report.succeeded + report.failed);
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "host jobs finished"
        );
        Ok(report)
    }
}

fn run_worker<C, F>(index: usize, client: &C, hosts: &[String], job: &F) -> PoolReport
where
    C: GraphClient,
    F: Fn(&C, &str) -> PipelineResult<usize>,
{
    let mut report = PoolReport::default();
    for host in hosts {
        let started = Instant::now();
        info!(worker = index, host = %host, "host job started");
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| job(client, host)))
            .unwrap_or_else(|_| Err(PipelineError::Runtime("host job panicked".into())));
        match outcome {
            Ok(rows) => {
                report.succeeded += 1;
                info!(
                    worker = index,
                    host = %host,
                    rows,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "host job done"
                );
            }
            Err(e) => {
                report.failed += 1;
                error!(worker = index, host = %host, error = %e, "host job failed");
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::graph::Variables;
    use serde_json::Value;
    use std::sync::Mutex;

    struct NullClient;

    impl GraphClient for NullClient {
        fn query(&self, _: &str, _: &Variables) -> Result<Value, StoreError> {
            Ok(Value::Null)
        }
    }

    fn hosts(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("10.0.0.{}", i)).collect()
    }

    #[test]
    fn split_covers_every_host_once() {
        let all = hosts(10);
        let mut seen: Vec<String> = (0..3).flat_map(|w| WorkerPool::split(&all, w, 3)).collect();
        seen.sort();
        let mut expected = all.clone();
        expected.sort();
        assert_eq!(seen, expected);
        assert_eq!(WorkerPool::split(&all, 0, 3).len(), 4);
    }

    #[test]
    fn every_host_runs_once_and_failures_are_isolated() {
        let done = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&done);
        let report = WorkerPool::new(4)
            .run(hosts(9), (0..4).map(|_| NullClient).collect(), move |_, host| {
                seen.lock().unwrap().push(host.to_string());
                if host.ends_with(".3") {
                    Err(PipelineError::Store(StoreError::Server("down".into())))
                } else {
                    Ok(1)
                }
            })
            .unwrap();
        assert_eq!(report, PoolReport { succeeded: 8, failed: 1 });
        let mut ran = done.lock().unwrap().clone();
        ran.sort();
        let mut expected = hosts(9);
        expected.sort();
        assert_eq!(ran, expected);
    }

    #[test]
    fn panicking_job_does_not_stop_its_worker() {
        let done = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&done);
        let report = WorkerPool::new(1)
            .run(hosts(3), vec![NullClient], move |_, host| {
                if host.ends_with(".1") {
                    panic!("window overflow");
                }
                seen.lock().unwrap().push(host.to_string());
                Ok(1)
            })
            .unwrap();
        assert_eq!(report, PoolReport { succeeded: 2, failed: 1 });
        assert_eq!(*done.lock().unwrap(), vec!["10.0.0.2", "10.0.0.3"]);
    }

    #[test]
    fn empty_host_list() {
        let report = WorkerPool::new(2)
            .run(Vec::new(), vec![NullClient], |_, _| Ok(0))
            .unwrap();
        assert_eq!(report, PoolReport::default());
    }

    #[test]
    fn hosts_without_clients_is_an_error() {
        let err = WorkerPool::new(2)
            .run(hosts(1), Vec::<NullClient>::new(), |_, _| Ok(0))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Runtime(_)));
    }
}
