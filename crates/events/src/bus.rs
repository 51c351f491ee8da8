//! Event bus with consumer groups, delayed redelivery and a dead-letter path

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{EventError, HandlerError, HandlerResult, Result};
use crate::retry::{RetryPolicy, RetryScheduler};
use crate::transport::{InMemoryTransport, Transport};
use crate::types::{DeadLetter, Event, DEFAULT_MAX_RETRIES};

pub const DEFAULT_CHANNEL_PREFIX: &str = "campaign.events";
pub const DEFAULT_DEAD_LETTER_CHANNEL: &str = "campaign.dead_letter";

/// Capacity of the queue feeding dead letters to an inspector
const DEAD_LETTER_QUEUE: usize = 256;

/// Capacity of each consumer group's redelivery queue
const REDELIVERY_QUEUE: usize = 256;

#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Channels are named `<prefix>.<event type>`
    pub channel_prefix: String,
    pub dead_letter_channel: String,
    /// Retry budget stamped on events built through [`EventBus::event`]
    pub default_max_retries: u32,
    pub retry: RetryPolicy,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            channel_prefix: DEFAULT_CHANNEL_PREFIX.to_string(),
            dead_letter_channel: DEFAULT_DEAD_LETTER_CHANNEL.to_string(),
            default_max_retries: DEFAULT_MAX_RETRIES,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionOptions {
    /// Events of one consumer group processed at the same time
    pub concurrency: usize,
    pub auto_ack: bool,
    /// Route exhausted events to the dead-letter channel instead of dropping them
    pub dead_letter_queue: bool,
}

impl Default for SubscriptionOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            auto_ack: true,
            dead_letter_queue: true,
        }
    }
}

impl SubscriptionOptions {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn without_dead_letter(mut self) -> Self {
        self.dead_letter_queue = false;
        self
    }
}

/// Callback invoked for every event delivered to a subscription.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &Event) -> HandlerResult;
}

/// Consumer of the dead-letter channel.
#[async_trait]
pub trait DeadLetterHandler: Send + Sync {
    async fn handle(&self, letter: DeadLetter) -> HandlerResult;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(Event) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    async fn handle(&self, event: &Event) -> HandlerResult {
        (self.0)(event.clone()).await
    }
}

/// Wrap an async closure as an [`EventHandler`]
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn EventHandler>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// All handlers registered under one pattern, sharing a listener and a
/// concurrency budget.
struct ConsumerGroup {
    pattern: String,
    options: SubscriptionOptions,
    handlers: RwLock<Vec<(Uuid, Arc<dyn EventHandler>)>>,
    permits: Arc<Semaphore>,
    /// Retries come back through here, never through the shared channel
    redeliveries: mpsc::Sender<Event>,
}

impl ConsumerGroup {
    fn handlers(&self) -> Vec<Arc<dyn EventHandler>> {
        match self.handlers.read() {
            Ok(guard) => guard.iter().map(|(_, h)| h.clone()).collect(),
            Err(poisoned) => poisoned.into_inner().iter().map(|(_, h)| h.clone()).collect(),
        }
    }

    fn handler_count(&self) -> usize {
        match self.handlers.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    fn add(&self, id: Uuid, handler: Arc<dyn EventHandler>) {
        match self.handlers.write() {
            Ok(mut guard) => guard.push((id, handler)),
            Err(poisoned) => poisoned.into_inner().push((id, handler)),
        }
    }
}

#[derive(Default)]
struct Counters {
    published: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
    dead_lettered: AtomicU64,
    dead_letter_failures: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time view of the bus.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct EventBusStats {
    /// Handler count per subscription pattern
    pub active_subscriptions: BTreeMap<String, usize>,
    pub total_handlers: usize,
    pub published: u64,
    pub processed: u64,
    pub failed: u64,
    pub retried: u64,
    pub dead_lettered: u64,
    pub dead_letter_failures: u64,
    /// Exhausted events dropped because their group opted out of dead-lettering
    pub dropped: u64,
    pub pending_retries: usize,
}

struct Inner {
    transport: Arc<dyn Transport>,
    config: EventBusConfig,
    groups: Mutex<HashMap<String, Arc<ConsumerGroup>>>,
    counters: Counters,
    scheduler: RetryScheduler,
    shutdown: CancellationToken,
}

/// Publish/subscribe hub for orchestration events.
///
/// Cheap to clone; clones share subscriptions, counters and the retry
/// scheduler.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl EventBus {
    pub fn new(transport: Arc<dyn Transport>, config: EventBusConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                config,
                groups: Mutex::new(HashMap::new()),
                counters: Counters::default(),
                scheduler: RetryScheduler::new(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Bus over a fresh in-memory transport with default settings
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryTransport::new()), EventBusConfig::default())
    }

    pub fn config(&self) -> &EventBusConfig {
        &self.inner.config
    }

    /// Channel name for an event type or event-type pattern
    pub fn channel_for(&self, event_type: &str) -> String {
        format!("{}.{}", self.inner.config.channel_prefix, event_type)
    }

    /// New event carrying this bus's default retry budget
    pub fn event(&self, event_type: &str, tenant_id: impl Into<String>) -> Event {
        Event::new(event_type, tenant_id).with_max_retries(self.inner.config.default_max_retries)
    }

    /// Stamp and publish an event.
    ///
    /// Fire-and-forget: success means the transport accepted the payload.
    pub async fn publish(&self, mut event: Event) -> Result<Uuid> {
        if self.inner.shutdown.is_cancelled() {
            return Err(EventError::ShutDown);
        }

        event.id = Uuid::new_v4();
        event.timestamp = Utc::now();
        event.retry_count = 0;

        self.send(&event).await?;
        self.inner.counters.published.fetch_add(1, Ordering::Relaxed);
        debug!(event_id = %event.id, event_type = %event.event_type, "Event published");
        Ok(event.id)
    }

    async fn send(&self, event: &Event) -> Result<()> {
        let channel = self.channel_for(&event.event_type);
        let payload = serde_json::to_string(event)?;
        self.inner.transport.publish(&channel, payload).await
    }

    /// Register `handler` for events whose type matches `pattern`.
    ///
    /// The first subscription for a pattern creates its consumer group and
    /// fixes the group's options; later subscriptions join that group.
    pub async fn subscribe(
        &self,
        pattern: &str,
        handler: Arc<dyn EventHandler>,
        options: SubscriptionOptions,
    ) -> Result<Uuid> {
        if self.inner.shutdown.is_cancelled() {
            return Err(EventError::ShutDown);
        }

        let id = Uuid::new_v4();
        let mut groups = self.inner.groups.lock().await;

        if let Some(group) = groups.get(pattern) {
            if group.options != options {
                warn!(
                    pattern = %pattern,
                    "Subscription options differ from the existing consumer group; group options kept"
                );
            }
            group.add(id, handler);
            debug!(pattern = %pattern, subscription_id = %id, "Handler joined consumer group");
            return Ok(id);
        }

        let receiver = self
            .inner
            .transport
            .subscribe(&self.channel_for(pattern))
            .await?;

        let concurrency = options.concurrency.max(1);
        let (redeliveries, retry_receiver) = mpsc::channel(REDELIVERY_QUEUE);
        let group = Arc::new(ConsumerGroup {
            pattern: pattern.to_string(),
            options,
            handlers: RwLock::new(vec![(id, handler)]),
            permits: Arc::new(Semaphore::new(concurrency)),
            redeliveries,
        });
        groups.insert(pattern.to_string(), group.clone());
        drop(groups);

        tokio::spawn(self.clone().listen(group, receiver, retry_receiver));

        info!(pattern = %pattern, concurrency, subscription_id = %id, "Consumer group started");
        Ok(id)
    }

    async fn listen(
        self,
        group: Arc<ConsumerGroup>,
        mut receiver: mpsc::Receiver<crate::transport::TransportMessage>,
        mut redeliveries: mpsc::Receiver<Event>,
    ) {
        loop {
            let event = tokio::select! {
                _ = self.inner.shutdown.cancelled() => break,
                message = receiver.recv() => match message {
                    Some(message) => decode(&message),
                    None => break,
                },
                Some(event) = redeliveries.recv() => Some(event),
            };
            let Some(event) = event else {
                continue;
            };

            let permit = match group.permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            let bus = self.clone();
            let group = group.clone();
            tokio::spawn(async move {
                let _permit = permit;
                bus.process_in_group(&group, event).await;
            });
        }
        debug!(pattern = %group.pattern, "Consumer group listener stopped");
    }

    /// Dispatch `event` to every consumer group whose pattern matches its type.
    pub async fn process_event(&self, event: Event) {
        let groups: Vec<Arc<ConsumerGroup>> = {
            let groups = self.inner.groups.lock().await;
            groups
                .values()
                .filter(|g| crate::transport::channel_matches(&g.pattern, &event.event_type))
                .cloned()
                .collect()
        };

        for group in groups {
            self.process_in_group(&group, event.clone()).await;
        }
    }

    /// Run the group's handlers in registration order; the first failure
    /// stops the chain and hands the event to failure handling.
    async fn process_in_group(&self, group: &Arc<ConsumerGroup>, event: Event) {
        for handler in group.handlers() {
            if let Err(e) = handler.handle(&event).await {
                self.inner.counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    pattern = %group.pattern,
                    retry_count = event.retry_count,
                    error = %e,
                    "Event handler failed"
                );
                self.retry_in_group(group, event, &e).await;
                return;
            }
        }
        self.inner.counters.processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Retry with backoff, or dead-letter once the budget is spent.
    ///
    /// The retry goes back to the consumer group registered under `pattern`
    /// only; other groups that matched the event are not affected. Without
    /// such a group there is nobody to retry for and the event is
    /// dead-lettered straight away.
    pub async fn handle_failed_event(&self, pattern: &str, event: Event, error: &HandlerError) {
        let group = self.inner.groups.lock().await.get(pattern).cloned();
        match group {
            Some(group) => self.retry_in_group(&group, event, error).await,
            None => {
                warn!(
                    event_id = %event.id,
                    pattern = %pattern,
                    "No consumer group for failed event"
                );
                self.send_to_dlq(event, &error.0).await;
            }
        }
    }

    async fn retry_in_group(&self, group: &Arc<ConsumerGroup>, mut event: Event, error: &HandlerError) {
        if !event.can_retry() {
            if group.options.dead_letter_queue {
                self.send_to_dlq(event, &error.0).await;
            } else {
                self.inner.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    pattern = %group.pattern,
                    "Retries exhausted and dead-lettering disabled, event dropped"
                );
            }
            return;
        }

        event.retry_count += 1;
        let delay = self.inner.config.retry.delay_for(event.retry_count);
        self.inner.counters.retried.fetch_add(1, Ordering::Relaxed);
        info!(
            event_id = %event.id,
            event_type = %event.event_type,
            pattern = %group.pattern,
            retry_count = event.retry_count,
            delay_ms = delay.as_millis() as u64,
            "Scheduling event redelivery"
        );

        let redeliveries = group.redeliveries.clone();
        self.inner.scheduler.schedule(delay, async move {
            let event_id = event.id;
            if redeliveries.send(event).await.is_err() {
                debug!(event_id = %event_id, "Consumer group stopped, redelivery discarded");
            }
        });
    }

    /// Publish the event wrapped in a [`DeadLetter`] to the dead-letter channel.
    ///
    /// If that publish fails the event is lost; the loss is logged and counted.
    pub async fn send_to_dlq(&self, event: Event, reason: &str) {
        let event_id = event.id;
        let letter = DeadLetter::new(event, reason);
        let channel = &self.inner.config.dead_letter_channel;

        let result = match serde_json::to_string(&letter) {
            Ok(payload) => self.inner.transport.publish(channel, payload).await,
            Err(e) => Err(EventError::from(e)),
        };

        match result {
            Ok(()) => {
                self.inner.counters.dead_lettered.fetch_add(1, Ordering::Relaxed);
                warn!(event_id = %event_id, reason = %reason, "Event sent to dead-letter channel");
            }
            Err(e) => {
                self.inner
                    .counters
                    .dead_letter_failures
                    .fetch_add(1, Ordering::Relaxed);
                error!(
                    event_id = %event_id,
                    reason = %reason,
                    error = %e,
                    "Dead-letter publish failed, event lost"
                );
            }
        }
    }

    /// Stream of decoded dead letters, for inspection or replay
    pub async fn dead_letters(&self) -> Result<mpsc::Receiver<DeadLetter>> {
        let mut raw = self
            .inner
            .transport
            .subscribe(&self.inner.config.dead_letter_channel)
            .await?;
        let (tx, rx) = mpsc::channel(DEAD_LETTER_QUEUE);
        let shutdown = self.inner.shutdown.clone();

        tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    message = raw.recv() => message,
                };
                let Some(message) = message else {
                    break;
                };
                match serde_json::from_str::<DeadLetter>(&message.payload) {
                    Ok(letter) => {
                        if tx.send(letter).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "Undecodable dead letter"),
                }
            }
        });

        Ok(rx)
    }

    /// Feed every dead letter to `handler` until the bus shuts down.
    ///
    /// Handler errors are logged; dead letters are never retried.
    pub async fn subscribe_dead_letters(&self, handler: Arc<dyn DeadLetterHandler>) -> Result<()> {
        let mut letters = self.dead_letters().await?;
        tokio::spawn(async move {
            while let Some(letter) = letters.recv().await {
                let event_id = letter.original_event.id;
                if let Err(e) = handler.handle(letter).await {
                    warn!(event_id = %event_id, error = %e, "Dead-letter handler failed");
                }
            }
        });
        Ok(())
    }

    pub async fn stats(&self) -> EventBusStats {
        let groups = self.inner.groups.lock().await;
        let active_subscriptions: BTreeMap<String, usize> = groups
            .iter()
            .map(|(pattern, group)| (pattern.clone(), group.handler_count()))
            .collect();
        let total_handlers = active_subscriptions.values().sum();
        let c = &self.inner.counters;

        EventBusStats {
            active_subscriptions,
            total_handlers,
            published: c.published.load(Ordering::Relaxed),
            processed: c.processed.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            retried: c.retried.load(Ordering::Relaxed),
            dead_lettered: c.dead_lettered.load(Ordering::Relaxed),
            dead_letter_failures: c.dead_letter_failures.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
            pending_retries: self.inner.scheduler.pending(),
        }
    }

    /// Stop listeners and cancel pending redeliveries.
    ///
    /// Returns the number of redeliveries abandoned.
    pub async fn shutdown(&self) -> usize {
        self.inner.shutdown.cancel();
        let dropped = self.inner.scheduler.shutdown().await;
        if dropped > 0 {
            warn!(dropped, "Event bus shut down with pending redeliveries");
        } else {
            info!("Event bus shut down");
        }
        dropped
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("transport", &self.inner.transport.name())
            .field("channel_prefix", &self.inner.config.channel_prefix)
            .field("pending_retries", &self.inner.scheduler.pending())
            .finish()
    }
}

fn decode(message: &crate::transport::TransportMessage) -> Option<Event> {
    match serde_json::from_str(&message.payload) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(channel = %message.channel, error = %e, "Discarding undecodable payload");
            None
        }
    }
}
