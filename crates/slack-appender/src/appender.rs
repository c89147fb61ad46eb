// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The appender: accepts events from any thread and turns them into
//! chat messages according to its [`BatchingPolicy`].
//!
//! ```text
//!  append ──> Scheduler ──(closed window)──> Renderer ──> PayloadBuilder ──> Dispatcher
//!                 ^
//!   timer task ───┘ (window deadline / interval tick)
//! ```
//!
//! Producers only take the scheduler lock; network I/O happens on the
//! dispatch worker (or on the flushing path in inline mode). One timer task
//! per appender drives deadline flushes. It listens for policy changes on a
//! `watch` channel and for newly opened windows on a [`Notify`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::buffer::Batch;
use crate::client::{Deliver, WebhookClient};
use crate::config::AppenderConfig;
use crate::dispatch::{Courier, Dispatcher};
use crate::error::{AppenderError, ConfigError};
use crate::event::LogEvent;
use crate::layout::{Layout, PatternLayout};
use crate::payload::{MessageStyle, Payload, PayloadBuilder};
use crate::poster::Poster;
use crate::render::Renderer;
use crate::scheduler::{BatchingPolicy, Scheduler};
use crate::sink::{ErrorSink, TracingErrorSink};

/// Text of the one-time notice sent when a window starts coalescing.
pub const BATCHING_NOTICE: &str = "Log events are arriving quickly, batching them";

/// State shared between the appender handles and the timer task.
pub(crate) struct Core {
    pub(crate) scheduler: Scheduler,
    pub(crate) renderer: Renderer,
    pub(crate) payloads: PayloadBuilder,
    pub(crate) style: MessageStyle,
    pub(crate) dispatcher: Dispatcher,
}

impl Core {
    fn payload_for(&self, batch: &Batch) -> Option<Payload> {
        if batch.is_empty() {
            return None;
        }
        let text = self.renderer.render(batch);
        Some(self.payloads.batch(text, self.style, batch.max_severity()))
    }

    fn submit_batch(&self, batch: &Batch) {
        if let Some(payload) = self.payload_for(batch) {
            debug!("Sending batch of {} events", batch.len());
            self.dispatcher.submit(payload);
        }
    }

    async fn dispatch_batch(&self, batch: &Batch) {
        if let Some(payload) = self.payload_for(batch) {
            debug!("Sending batch of {} events", batch.len());
            self.dispatcher.dispatch(payload).await;
        }
    }

    async fn on_deadline(&self) {
        if let Some(batch) = self.scheduler.on_deadline(Instant::now()) {
            self.dispatch_batch(&batch).await;
        }
    }
}

struct Inner {
    core: Arc<Core>,
    cancel: CancellationToken,
    wake: Arc<Notify>,
    policy_tx: watch::Sender<BatchingPolicy>,
    timer: Mutex<Option<JoinHandle<()>>>,
    shut_down: AtomicBool,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Handle to a running appender. Cheap to clone; every clone feeds the same
/// buffer.
#[derive(Clone)]
pub struct Appender {
    inner: Arc<Inner>,
}

/// Builds an [`Appender`] with non-default collaborators.
pub struct AppenderBuilder {
    config: AppenderConfig,
    layout: Option<Arc<dyn Layout>>,
    deliver: Option<Arc<dyn Deliver>>,
    sink: Option<Arc<dyn ErrorSink>>,
    runtime: Option<Handle>,
}

impl AppenderBuilder {
    #[must_use]
    pub fn new(config: AppenderConfig) -> Self {
        Self {
            config,
            layout: None,
            deliver: None,
            sink: None,
            runtime: None,
        }
    }

    #[must_use]
    pub fn with_layout(mut self, layout: impl Layout + 'static) -> Self {
        self.layout = Some(Arc::new(layout));
        self
    }

    /// Replaces the webhook client, e.g. with a test double.
    #[must_use]
    pub fn with_deliver(mut self, deliver: Arc<dyn Deliver>) -> Self {
        self.deliver = Some(deliver);
        self
    }

    #[must_use]
    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Runtime the timer and dispatch worker are spawned on. Defaults to the
    /// runtime `start` is called from.
    #[must_use]
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn start(self) -> Result<Appender, AppenderError> {
        let config = self.config;
        config.validate()?;

        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|e| AppenderError::NoRuntime(e.to_string()))?,
        };
        let deliver: Arc<dyn Deliver> = match self.deliver {
            Some(deliver) => deliver,
            None => Arc::new(WebhookClient::new(&config.webhook_url, config.timeout)?),
        };
        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingErrorSink));
        let layout = self
            .layout
            .unwrap_or_else(|| Arc::new(PatternLayout::default()));

        let dispatcher = Dispatcher::start(
            Courier::new(deliver, sink),
            config.delivery_mode,
            config.lane_capacity,
            runtime.clone(),
        );
        let core = Arc::new(Core {
            scheduler: Scheduler::new(
                config.batching,
                config.buffer_capacity,
                config.announce_batching,
            ),
            renderer: Renderer::new(layout, config.max_event_length, config.max_text_length),
            payloads: PayloadBuilder::new(
                config.username.clone(),
                config.icon_emoji.clone(),
                config.channel.clone(),
            ),
            style: config.message_style,
            dispatcher,
        });

        let cancel = CancellationToken::new();
        let wake = Arc::new(Notify::new());
        let (policy_tx, policy_rx) = watch::channel(config.batching);
        let timer = runtime.spawn(run_timer(
            Arc::clone(&core),
            policy_rx,
            Arc::clone(&wake),
            cancel.clone(),
        ));

        debug!(
            "Started appender for {} with {:?} batching",
            config.channel.as_deref().unwrap_or("default channel"),
            config.batching
        );

        Ok(Appender {
            inner: Arc::new(Inner {
                core,
                cancel,
                wake,
                policy_tx,
                timer: Mutex::new(Some(timer)),
                shut_down: AtomicBool::new(false),
            }),
        })
    }
}

impl Appender {
    /// Starts an appender with the default layout, webhook client and error
    /// sink on the current tokio runtime.
    pub fn start(config: AppenderConfig) -> Result<Self, AppenderError> {
        AppenderBuilder::new(config).start()
    }

    #[must_use]
    pub fn builder(config: AppenderConfig) -> AppenderBuilder {
        AppenderBuilder::new(config)
    }

    /// Offers one event. Never fails; an event is silently dropped when the
    /// buffer is full or the appender is shut down.
    ///
    /// In background mode this never waits on the network. In inline mode a
    /// flush triggered by this event is delivered before returning.
    pub fn append(&self, event: LogEvent) {
        let core = &self.inner.core;
        let outcome = core.scheduler.on_event(event, Instant::now());

        if let Some(batch) = outcome.flush {
            core.submit_batch(&batch);
        }
        if outcome.announce {
            core.dispatcher.submit(core.payloads.text(BATCHING_NOTICE));
        }
        if outcome.window_opened {
            self.inner.wake.notify_one();
        }
    }

    /// Replaces the batching policy. Buffered events are kept; switching to
    /// [`BatchingPolicy::Immediate`] sends them right away.
    pub fn set_batching(&self, policy: BatchingPolicy) -> Result<(), ConfigError> {
        policy.validate()?;
        let core = &self.inner.core;
        if let Some(batch) = core.scheduler.set_policy(policy, Instant::now()) {
            core.submit_batch(&batch);
        }
        self.inner.policy_tx.send_replace(policy);
        debug!("Batching policy set to {:?}", policy);
        Ok(())
    }

    #[must_use]
    pub fn batching(&self) -> BatchingPolicy {
        self.inner.core.scheduler.policy()
    }

    /// Number of buffered events.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.core.scheduler.pending()
    }

    /// Sends whatever is buffered now and waits until every queued message
    /// has been attempted.
    pub async fn flush(&self) {
        let core = &self.inner.core;
        if let Some(batch) = core.scheduler.flush_pending() {
            core.dispatch_batch(&batch).await;
        }
        core.dispatcher.drained().await;
    }

    /// Stops the appender.
    ///
    /// Later events are dropped. The trailing window is rendered and sent
    /// after every message already queued, so messages keep their order.
    /// Calling this more than once is a no-op.
    pub async fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.cancel.cancel();
        let timer = self
            .inner
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(timer) = timer {
            if let Err(e) = timer.await {
                debug!("Batch timer ended abnormally: {e}");
            }
        }

        let core = &self.inner.core;
        let batch = core.scheduler.close();
        core.dispatcher.close().await;
        if let Some(payload) = core.payload_for(&batch) {
            debug!("Sending trailing batch of {} events", batch.len());
            core.dispatcher.deliver_now(payload).await;
        }
        debug!("Appender shut down");
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }

    /// Unbatched posting through this appender's dispatch lane.
    #[must_use]
    pub fn poster(&self) -> Poster {
        Poster::from_appender(self.clone())
    }

    pub(crate) fn core(&self) -> &Core {
        &self.inner.core
    }
}

async fn run_timer(
    core: Arc<Core>,
    mut policy_rx: watch::Receiver<BatchingPolicy>,
    wake: Arc<Notify>,
    cancel: CancellationToken,
) {
    loop {
        let policy = *policy_rx.borrow_and_update();
        match policy {
            BatchingPolicy::Interval { every } => {
                let mut ticker = interval_at(Instant::now() + every, every);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        () = cancel.cancelled() => return,
                        changed = policy_rx.changed() => {
                            if changed.is_err() {
                                return;
                            }
                            break;
                        }
                        _ = ticker.tick() => core.on_deadline().await,
                    }
                }
            }
            BatchingPolicy::Window { .. } | BatchingPolicy::Immediate => loop {
                let deadline = core.scheduler.next_deadline();
                tokio::select! {
                    () = cancel.cancelled() => return,
                    changed = policy_rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        break;
                    }
                    () = wake.notified() => {}
                    () = sleep_until_deadline(deadline) => core.on_deadline().await,
                }
            },
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
