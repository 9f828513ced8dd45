//! Runs requests on a background runtime for callers that cannot await,
//! such as a UI event loop. Each request gets a generation number and its
//! result is handed to a callback on the runtime thread.

use crate::protocol::http::{AuthClient, OutgoingRequest, RequestError, Response};
use anyhow::anyhow;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

pub struct WithGeneration<T> {
    pub generation: u64,
    pub result: T,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("cancelled by caller")]
    UsrCancelled,
    #[error("cancelled by shutdown")]
    SysCancelled,
}

pub type DispatchResult = Result<Response, DispatchError>;
pub type DispatchCallback = Box<dyn FnOnce(WithGeneration<DispatchResult>) + Send + Sync>;

struct TaskRecord {
    abort_handle: Option<AbortHandle>,
    callback: DispatchCallback,
}

pub struct Dispatcher {
    client: AuthClient,
    generation: AtomicU64,
    task_records: Arc<DashMap<u64, TaskRecord>>,
    cancellation_token: CancellationToken,
    runtime_handle: tokio::runtime::Handle,
    result_tx: UnboundedSender<WithGeneration<DispatchResult>>,
    runtime_thread_handle: Option<std::thread::JoinHandle<()>>,
}

impl Dispatcher {
    pub fn try_new(client: AuthClient) -> anyhow::Result<Self> {
        let task_records = Arc::new(DashMap::new());
        let cancellation_token = CancellationToken::new();

        let (result_tx, result_rx) = unbounded_channel::<WithGeneration<DispatchResult>>();
        let tokio_runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let runtime_handle = tokio_runtime.handle().clone();

        let records_clone = task_records.clone();
        let cancellation_token_clone = cancellation_token.clone();
        let runtime_thread_handle = std::thread::Builder::new()
            .name("course-client-dispatch".to_string())
            .spawn(move || {
                tokio_runtime.block_on(Self::send_result_back(
                    records_clone,
                    cancellation_token_clone,
                    result_rx,
                ))
            })?;

        Ok(Self {
            client,
            generation: AtomicU64::new(0),
            task_records,
            cancellation_token,
            runtime_handle,
            result_tx,
            runtime_thread_handle: Some(runtime_thread_handle),
        })
    }

    async fn send_result_back(
        task_records: Arc<DashMap<u64, TaskRecord>>,
        cancellation_token: CancellationToken,
        mut result_rx: UnboundedReceiver<WithGeneration<DispatchResult>>,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = cancellation_token.cancelled() => {
                    let undone = task_records.len();
                    if undone > 0 {
                        warn!("Pending requests when shutting down: {}", undone);
                    }
                    break;
                }
                result = result_rx.recv() => match result {
                    None => break,
                    Some(with_generation) => {
                        let generation = with_generation.generation;
                        if let Some((_, TaskRecord { callback, .. })) = task_records.remove(&generation) {
                            run_callback(generation, callback, with_generation);
                        }
                    }
                }
            }
        }

        let pending: Vec<u64> = task_records.iter().map(|entry| *entry.key()).collect();
        for generation in pending {
            if let Some((_, record)) = task_records.remove(&generation) {
                if let Some(abort_handle) = record.abort_handle {
                    abort_handle.abort();
                }
                let message = WithGeneration {
                    generation,
                    result: Err(DispatchError::SysCancelled),
                };
                run_callback(generation, record.callback, message);
            }
        }
    }

    /// Queues `request` and returns its generation.
    pub fn dispatch(
        &self,
        request: OutgoingRequest,
        callback: impl FnOnce(WithGeneration<DispatchResult>) + Send + Sync + 'static,
    ) -> anyhow::Result<u64> {
        if self.cancellation_token.is_cancelled() {
            return Err(anyhow!("dispatcher is shut down"));
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let cancellation_token = self.cancellation_token.clone();
        let result_tx = self.result_tx.clone();
        let client = self.client.clone();

        // the record must exist before the task can finish
        self.task_records.insert(
            generation,
            TaskRecord {
                abort_handle: None,
                callback: Box::new(callback),
            },
        );

        let task = async move {
            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    debug!("Request {} was cancelled by global shutdown", generation);
                }
                result = client.execute(request) => {
                    debug!("Request finished: {}", generation);
                    let message = WithGeneration {
                        generation,
                        result: result.map_err(DispatchError::from),
                    };
                    let _ = result_tx.send(message);
                }
            }
        };

        let abort_handle = self.runtime_handle.spawn(task).abort_handle();
        if let Some(mut record) = self.task_records.get_mut(&generation) {
            record.abort_handle = Some(abort_handle);
        }

        Ok(generation)
    }

    /// Aborts a pending request; its callback receives `UsrCancelled`.
    pub fn cancel(&self, generation: u64) -> anyhow::Result<()> {
        let (_, record) = self
            .task_records
            .remove(&generation)
            .ok_or_else(|| anyhow!("no pending request with generation {}", generation))?;

        if let Some(abort_handle) = record.abort_handle {
            abort_handle.abort();
        }
        debug!("Request {} was cancelled by caller", generation);

        let message = WithGeneration {
            generation,
            result: Err(DispatchError::UsrCancelled),
        };
        run_callback(generation, record.callback, message);
        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.task_records.len()
    }

    /// Cancels everything still pending and stops the runtime thread.
    pub fn shutdown(&mut self) {
        self.cancellation_token.cancel();
        if let Some(handle) = self.runtime_thread_handle.take() {
            if handle.join().is_err() {
                error!("Dispatcher runtime thread panicked");
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_callback(generation: u64, callback: DispatchCallback, message: WithGeneration<DispatchResult>) {
    let callback = std::panic::AssertUnwindSafe(move || callback(message));
    if let Err(e) = std::panic::catch_unwind(callback) {
        error!("Callback for {} panicked: {:?}", generation, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MemoryCredentialStore, Session};
    use crate::protocol::http::{AuthClient, ClientConfig};
    use crate::test_support::{Recorder, ScriptedTransport};
    use reqwest::{Method, StatusCode};
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    fn dispatcher(transport: ScriptedTransport) -> Dispatcher {
        let config = ClientConfig::builder().base_url("http://api.test").build().unwrap();
        let recorder = Arc::new(Recorder::default());
        let client = AuthClient::new(
            config,
            Session::new(Arc::new(MemoryCredentialStore::new())),
            Arc::new(transport),
            recorder.clone(),
            recorder,
        )
        .unwrap();
        Dispatcher::try_new(client).unwrap()
    }

    fn forward(
        tx: crossbeam_channel::Sender<(u64, DispatchResult)>,
    ) -> impl FnOnce(WithGeneration<DispatchResult>) + Send + Sync + 'static {
        move |message| {
            let _ = tx.send((message.generation, message.result));
        }
    }

    fn assert_send<T: Send>() {}

    #[test]
    fn task_records_can_move_to_the_runtime_thread() {
        assert_send::<Arc<DashMap<u64, TaskRecord>>>();
        assert_send::<Dispatcher>();
    }

    #[test]
    fn delivers_result_with_its_generation() {
        let transport = ScriptedTransport::new();
        transport.respond("/api/modules/", StatusCode::OK, r#"[{"id":1}]"#);
        let dispatcher = dispatcher(transport);
        let (tx, rx) = crossbeam_channel::unbounded();

        let first = dispatcher
            .dispatch(OutgoingRequest::new(Method::GET, "api/modules/"), forward(tx.clone()))
            .unwrap();
        let second = dispatcher
            .dispatch(OutgoingRequest::new(Method::GET, "api/missing/"), forward(tx))
            .unwrap();
        assert_ne!(first, second);

        let mut results: Vec<_> = (0..2).map(|_| rx.recv_timeout(WAIT).unwrap()).collect();
        results.sort_by_key(|(generation, _)| *generation);

        assert_eq!(results[0].0, first);
        assert_eq!(results[0].1.as_ref().unwrap().text(), r#"[{"id":1}]"#);
        assert!(matches!(results[1].1, Err(DispatchError::Request(RequestError::Transport(_)))));
        assert_eq!(dispatcher.pending(), 0);
    }

    #[test]
    fn cancel_reports_user_cancellation() {
        let dispatcher = dispatcher(ScriptedTransport::with_delay(Duration::from_secs(60)));
        let (tx, rx) = crossbeam_channel::unbounded();

        let generation = dispatcher
            .dispatch(OutgoingRequest::new(Method::GET, "api/lessons/"), forward(tx))
            .unwrap();
        dispatcher.cancel(generation).unwrap();

        let (delivered, result) = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(delivered, generation);
        assert!(matches!(result, Err(DispatchError::UsrCancelled)));
        assert!(dispatcher.cancel(generation).is_err());
    }

    #[test]
    fn shutdown_cancels_pending_requests() {
        let mut dispatcher = dispatcher(ScriptedTransport::with_delay(Duration::from_secs(60)));
        let (tx, rx) = crossbeam_channel::unbounded();

        dispatcher
            .dispatch(OutgoingRequest::new(Method::GET, "api/resources/"), forward(tx.clone()))
            .unwrap();
        dispatcher.shutdown();

        let (_, result) = rx.recv_timeout(WAIT).unwrap();
        assert!(matches!(result, Err(DispatchError::SysCancelled)));
        assert!(dispatcher
            .dispatch(OutgoingRequest::new(Method::GET, "api/resources/"), forward(tx))
            .is_err());
    }
}
