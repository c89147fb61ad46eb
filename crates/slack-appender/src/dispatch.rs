// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Moves payloads from the flushing path to the network.
//!
//! In background mode a bounded lane feeds exactly one worker task, so at
//! most one request is in flight and messages leave in the order they were
//! queued. A full lane drops the payload and reports it; the caller is never
//! blocked. In inline mode the flushing path performs the request itself.
//! On a current-thread runtime inline sends run as tasks chained one after
//! the other, and `drained`/`close` wait for the last one.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::client::Deliver;
use crate::error::DispatchError;
use crate::payload::Payload;
use crate::sink::{ErrorReport, ErrorSink};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Queue payloads for the dispatch worker.
    #[default]
    Background,
    /// Deliver on the flushing path.
    Inline,
}

impl FromStr for DeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "background" | "async" => Ok(DeliveryMode::Background),
            "inline" | "sync" => Ok(DeliveryMode::Inline),
            other => Err(format!("unknown delivery mode '{other}'")),
        }
    }
}

/// Delivers payloads and reports failures.
#[derive(Clone)]
pub struct Courier {
    deliver: Arc<dyn Deliver>,
    sink: Arc<dyn ErrorSink>,
}

impl Courier {
    pub fn new(deliver: Arc<dyn Deliver>, sink: Arc<dyn ErrorSink>) -> Self {
        Self { deliver, sink }
    }

    /// Makes one attempt. Returns `false` when the payload was dropped.
    pub async fn send(&self, payload: Payload) -> bool {
        match self.deliver.deliver(&payload).await {
            Ok(()) => true,
            Err(e) => {
                self.sink
                    .report(ErrorReport::new("Failed to post to webhook", e, &payload));
                false
            }
        }
    }

    pub fn reject(&self, payload: &Payload, error: DispatchError) {
        self.sink
            .report(ErrorReport::new("Failed to queue message", error, payload));
    }
}

enum Job {
    Send(Payload),
    /// Answered once every job queued before it has been handled.
    Barrier(oneshot::Sender<()>),
}

pub struct Dispatcher {
    courier: Courier,
    mode: DeliveryMode,
    runtime: Handle,
    lane: Mutex<Option<mpsc::Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    /// Last spawned inline send; each new one awaits it first.
    inline_tail: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl Dispatcher {
    /// Starts the dispatcher on `runtime`. The worker task is only spawned in
    /// background mode.
    pub fn start(
        courier: Courier,
        mode: DeliveryMode,
        lane_capacity: usize,
        runtime: Handle,
    ) -> Self {
        let (lane, worker) = match mode {
            DeliveryMode::Background => {
                let (tx, rx) = mpsc::channel(lane_capacity.max(1));
                let worker = runtime.spawn(run_worker(courier.clone(), rx));
                (Some(tx), Some(worker))
            }
            DeliveryMode::Inline => (None, None),
        };
        Self {
            courier,
            mode,
            runtime,
            lane: Mutex::new(lane),
            worker: Mutex::new(worker),
            inline_tail: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    /// Hands `payload` over from synchronous code.
    ///
    /// Background mode never blocks. Inline mode blocks the calling thread
    /// until the request finished, except on a current-thread runtime where
    /// blocking would stall the request itself; there the send is spawned
    /// behind the previous one.
    pub fn submit(&self, payload: Payload) {
        match self.mode {
            DeliveryMode::Background => self.enqueue(payload),
            DeliveryMode::Inline if self.is_closed() => {
                self.courier.reject(&payload, DispatchError::LaneClosed);
            }
            DeliveryMode::Inline => self.deliver_blocking(payload),
        }
    }

    /// Hands `payload` over from async code.
    pub async fn dispatch(&self, payload: Payload) {
        match self.mode {
            DeliveryMode::Background => self.enqueue(payload),
            DeliveryMode::Inline if self.is_closed() => {
                self.courier.reject(&payload, DispatchError::LaneClosed);
            }
            DeliveryMode::Inline => {
                self.inline_sent().await;
                self.courier.send(payload).await;
            }
        }
    }

    /// Delivers right away, bypassing the lane.
    pub async fn deliver_now(&self, payload: Payload) -> bool {
        self.courier.send(payload).await
    }

    /// Waits until every payload queued so far has been attempted.
    pub async fn drained(&self) {
        self.inline_sent().await;
        let Some(lane) = self.lane().clone() else {
            return;
        };
        let (tx, rx) = oneshot::channel();
        if lane.send(Job::Barrier(tx)).await.is_ok() {
            let _ = rx.await;
        }
    }

    /// Closes the lane and waits for the worker to finish queued payloads.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.inline_sent().await;
        drop(self.lane().take());
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                debug!("Dispatch worker ended abnormally: {e}");
            }
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn enqueue(&self, payload: Payload) {
        let Some(lane) = self.lane().clone() else {
            self.courier.reject(&payload, DispatchError::LaneClosed);
            return;
        };
        match lane.try_send(Job::Send(payload)) {
            Ok(()) => {}
            Err(TrySendError::Full(Job::Send(payload))) => {
                self.courier.reject(&payload, DispatchError::LaneFull);
            }
            Err(TrySendError::Closed(Job::Send(payload))) => {
                self.courier.reject(&payload, DispatchError::LaneClosed);
            }
            Err(_) => {}
        }
    }

    fn deliver_blocking(&self, payload: Payload) {
        let courier = self.courier.clone();
        match Handle::try_current() {
            Ok(handle) => match handle.runtime_flavor() {
                RuntimeFlavor::MultiThread => {
                    tokio::task::block_in_place(|| handle.block_on(courier.send(payload)));
                }
                _ => {
                    debug!("Current-thread runtime, sending inline payload from a task");
                    let mut tail = self.inline_tail();
                    let previous = tail.take();
                    *tail = Some(handle.spawn(async move {
                        await_send(previous).await;
                        courier.send(payload).await;
                    }));
                }
            },
            Err(_) => {
                self.runtime.block_on(courier.send(payload));
            }
        }
    }

    /// Waits for spawned inline sends. A barrier task takes the place of the
    /// tail so sends spawned meanwhile still queue behind the awaited ones.
    async fn inline_sent(&self) {
        let (tx, rx) = oneshot::channel();
        {
            let mut tail = self.inline_tail();
            let Some(previous) = tail.take() else {
                return;
            };
            *tail = Some(self.runtime.spawn(async move {
                await_send(Some(previous)).await;
                let _ = tx.send(());
            }));
        }
        let _ = rx.await;
    }

    fn lane(&self) -> MutexGuard<'_, Option<mpsc::Sender<Job>>> {
        self.lane.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn inline_tail(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.inline_tail
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

async fn await_send(send: Option<JoinHandle<()>>) {
    if let Some(send) = send {
        if let Err(e) = send.await {
            debug!("Inline send ended abnormally: {e}");
        }
    }
}

async fn run_worker(courier: Courier, mut rx: mpsc::Receiver<Job>) {
    while let Some(job) = rx.recv().await {
        match job {
            Job::Send(payload) => {
                courier.send(payload).await;
            }
            Job::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Dispatch lane closed, worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DeliveryError, NotifyError};
    use crate::payload::PayloadBuilder;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<String>>,
        fail: bool,
        gate: Option<Arc<Semaphore>>,
        slow: Option<&'static str>,
    }

    #[async_trait]
    impl Deliver for Recorder {
        async fn deliver(&self, payload: &Payload) -> Result<(), DeliveryError> {
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            if self.slow.is_some() && payload.body() == self.slow {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            if self.fail {
                return Err(DeliveryError::Rejected {
                    status: 500,
                    body: String::new(),
                });
            }
            self.sent
                .lock()
                .unwrap()
                .push(payload.body().unwrap_or_default().to_string());
            Ok(())
        }
    }

    type Reports = Arc<Mutex<Vec<NotifyError>>>;

    fn courier(recorder: Arc<Recorder>) -> (Courier, Reports) {
        let reports: Reports = Arc::default();
        let sink = {
            let reports = Arc::clone(&reports);
            move |report: ErrorReport| reports.lock().unwrap().push(report.cause)
        };
        (Courier::new(recorder, Arc::new(sink)), reports)
    }

    fn text(body: &str) -> Payload {
        PayloadBuilder::default().text(body)
    }

    #[test]
    fn test_delivery_mode_from_str() {
        assert_eq!("inline".parse::<DeliveryMode>(), Ok(DeliveryMode::Inline));
        assert_eq!(
            "Background".parse::<DeliveryMode>(),
            Ok(DeliveryMode::Background)
        );
        assert!("later".parse::<DeliveryMode>().is_err());
    }

    #[tokio::test]
    async fn test_background_preserves_order() {
        let recorder = Arc::new(Recorder::default());
        let (courier, reports) = courier(Arc::clone(&recorder));
        let dispatcher =
            Dispatcher::start(courier, DeliveryMode::Background, 16, Handle::current());

        for body in ["one", "two", "three"] {
            dispatcher.submit(text(body));
        }
        dispatcher.drained().await;

        assert_eq!(*recorder.sent.lock().unwrap(), vec!["one", "two", "three"]);
        assert!(reports.lock().unwrap().is_empty());
        dispatcher.close().await;
    }

    #[tokio::test]
    async fn test_full_lane_drops_and_reports() {
        let gate = Arc::new(Semaphore::new(0));
        let recorder = Arc::new(Recorder {
            gate: Some(Arc::clone(&gate)),
            ..Recorder::default()
        });
        let (courier, reports) = courier(Arc::clone(&recorder));
        let dispatcher =
            Dispatcher::start(courier, DeliveryMode::Background, 1, Handle::current());

        dispatcher.submit(text("in flight"));
        // let the worker pick up the first payload and block on the gate
        tokio::time::sleep(Duration::from_millis(20)).await;
        dispatcher.submit(text("queued"));
        dispatcher.submit(text("dropped"));

        {
            let reports = reports.lock().unwrap();
            assert_eq!(reports.len(), 1);
            assert!(matches!(
                reports[0],
                NotifyError::Dispatch(DispatchError::LaneFull)
            ));
        }

        gate.add_permits(2);
        dispatcher.close().await;
        assert_eq!(*recorder.sent.lock().unwrap(), vec!["in flight", "queued"]);
    }

    #[tokio::test]
    async fn test_closed_lane_reports() {
        let recorder = Arc::new(Recorder::default());
        let (courier, reports) = courier(recorder);
        let dispatcher =
            Dispatcher::start(courier, DeliveryMode::Background, 4, Handle::current());
        dispatcher.close().await;

        dispatcher.submit(text("late"));
        assert!(matches!(
            reports.lock().unwrap()[0],
            NotifyError::Dispatch(DispatchError::LaneClosed)
        ));
    }

    #[tokio::test]
    async fn test_failures_reach_sink_and_do_not_stop_worker() {
        let recorder = Arc::new(Recorder {
            fail: true,
            ..Recorder::default()
        });
        let (courier, reports) = courier(recorder);
        let dispatcher =
            Dispatcher::start(courier, DeliveryMode::Background, 4, Handle::current());

        dispatcher.submit(text("one"));
        dispatcher.submit(text("two"));
        dispatcher.drained().await;

        let reports = reports.lock().unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.status() == Some(500)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_inline_submit_blocks_until_sent() {
        let recorder = Arc::new(Recorder::default());
        let (courier, _) = courier(Arc::clone(&recorder));
        let dispatcher = Dispatcher::start(courier, DeliveryMode::Inline, 4, Handle::current());

        dispatcher.submit(text("now"));
        assert_eq!(*recorder.sent.lock().unwrap(), vec!["now"]);
    }

    #[tokio::test]
    async fn test_inline_after_close_reports() {
        let recorder = Arc::new(Recorder::default());
        let (courier, reports) = courier(Arc::clone(&recorder));
        let dispatcher = Dispatcher::start(courier, DeliveryMode::Inline, 4, Handle::current());
        dispatcher.close().await;

        dispatcher.dispatch(text("late")).await;
        assert!(recorder.sent.lock().unwrap().is_empty());
        assert!(matches!(
            reports.lock().unwrap()[0],
            NotifyError::Dispatch(DispatchError::LaneClosed)
        ));
    }

    #[tokio::test]
    async fn test_inline_current_thread_keeps_order_and_drains() {
        let recorder = Arc::new(Recorder {
            slow: Some("one"),
            ..Recorder::default()
        });
        let (courier, _) = courier(Arc::clone(&recorder));
        let dispatcher = Dispatcher::start(courier, DeliveryMode::Inline, 4, Handle::current());

        dispatcher.submit(text("one"));
        dispatcher.submit(text("two"));
        assert!(recorder.sent.lock().unwrap().is_empty());

        dispatcher.drained().await;
        assert_eq!(*recorder.sent.lock().unwrap(), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_inline_current_thread_close_waits_for_sends() {
        let recorder = Arc::new(Recorder {
            slow: Some("one"),
            ..Recorder::default()
        });
        let (courier, _) = courier(Arc::clone(&recorder));
        let dispatcher = Dispatcher::start(courier, DeliveryMode::Inline, 4, Handle::current());

        dispatcher.submit(text("one"));
        // the async path queues behind the spawned send
        dispatcher.dispatch(text("two")).await;
        assert_eq!(*recorder.sent.lock().unwrap(), vec!["one", "two"]);

        dispatcher.submit(text("three"));
        dispatcher.close().await;
        assert_eq!(
            *recorder.sent.lock().unwrap(),
            vec!["one", "two", "three"]
        );
    }

    #[test]
    fn test_inline_submit_outside_runtime() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let recorder = Arc::new(Recorder::default());
        let (courier, _) = courier(Arc::clone(&recorder));
        let dispatcher = Dispatcher::start(
            courier,
            DeliveryMode::Inline,
            4,
            runtime.handle().clone(),
        );

        dispatcher.submit(text("from a plain thread"));
        assert_eq!(
            *recorder.sent.lock().unwrap(),
            vec!["from a plain thread"]
        );
    }
}
