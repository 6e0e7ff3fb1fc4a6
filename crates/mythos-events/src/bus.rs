//! The in-process event bus.
//!
//! Each topic owns a bounded queue and a dedicated dispatcher task, so
//! handlers for one topic run serially and in publish order, while topics
//! are dispatched concurrently with respect to each other. A small set of
//! topics that form one causal sequence (see `dispatch_group`) share a
//! queue and task instead, so their dispatch order matches their publish
//! order too. `publish` never blocks except for the brief, bounded wait
//! afforded to high-priority events when their topic's queue is full.

use crate::event::Event;
use async_trait::async_trait;
use mythos_common::metrics::names;
use mythos_common::topic::{EventPriority, Topic};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// Topics whose dispatch order must observably match their publish order
/// share a single queue and dispatcher task instead of each topic getting
/// its own: a room move publishes `PlayerLeftRoom` before
/// `PlayerEnteredRoom`, and independent per-topic dispatcher tasks would
/// only guarantee enqueue order, not the dispatch order subscribers
/// actually see.
fn dispatch_group(topic: Topic) -> Topic {
    match topic {
        Topic::PlayerLeftRoom | Topic::PlayerEnteredRoom => Topic::PlayerEnteredRoom,
        other => other,
    }
}

/// A subscriber to one topic. Handlers must be idempotent:
/// delivery to other handlers continues even if one errors, and a handler
/// may in principle be re-invoked after a crash-restart of the process.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &Event) -> Result<(), String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// The bounded queue and wakeups shared by every topic in a dispatch
/// group. Grouped topics point at the same `DispatchQueue`; ungrouped
/// topics get one each.
struct DispatchQueue {
    queue: Mutex<VecDeque<Event>>,
    capacity: usize,
    data_ready: Notify,
    space_freed: Notify,
}

struct TopicState {
    dispatch: Arc<DispatchQueue>,
    handlers: RwLock<Vec<(SubscriptionId, Arc<dyn EventHandler>)>>,
}

pub struct EventBus {
    topics: HashMap<Topic, Arc<TopicState>>,
    next_sub_id: AtomicU64,
    handler_timeout: Duration,
    high_priority_publish_timeout: Duration,
    cancel: CancellationToken,
}

impl EventBus {
    /// Spawns one dispatcher task per dispatch group (almost always one per
    /// topic, except topics grouped by `dispatch_group`). `queue_size` is
    /// the bus-wide per-group bound.
    pub fn new(queue_size: usize, high_priority_publish_timeout: Duration) -> Arc<Self> {
        let mut topics = HashMap::new();
        let mut dispatch_queues: HashMap<Topic, Arc<DispatchQueue>> = HashMap::new();
        let cancel = CancellationToken::new();

        for topic in Topic::ALL {
            let group = dispatch_group(*topic);
            let dispatch = dispatch_queues
                .entry(group)
                .or_insert_with(|| {
                    Arc::new(DispatchQueue {
                        queue: Mutex::new(VecDeque::with_capacity(queue_size.min(1024))),
                        capacity: queue_size,
                        data_ready: Notify::new(),
                        space_freed: Notify::new(),
                    })
                })
                .clone();
            topics.insert(
                *topic,
                Arc::new(TopicState {
                    dispatch,
                    handlers: RwLock::new(Vec::new()),
                }),
            );
        }

        let bus = Arc::new(Self {
            topics,
            next_sub_id: AtomicU64::new(1),
            handler_timeout: Duration::from_secs(5),
            high_priority_publish_timeout,
            cancel,
        });

        let mut spawned_groups: HashSet<Topic> = HashSet::new();
        for topic in Topic::ALL {
            let group = dispatch_group(*topic);
            if !spawned_groups.insert(group) {
                continue;
            }
            let members: HashMap<Topic, Arc<TopicState>> = Topic::ALL
                .iter()
                .copied()
                .filter(|t| dispatch_group(*t) == group)
                .map(|t| (t, bus.topics[&t].clone()))
                .collect();
            let dispatch = members[&group].dispatch.clone();
            let cancel = bus.cancel.clone();
            let handler_timeout = bus.handler_timeout;
            tokio::spawn(async move {
                dispatch_loop(dispatch, members, cancel, handler_timeout).await;
            });
        }

        bus
    }

    pub async fn subscribe(&self, topic: Topic, handler: Arc<dyn EventHandler>) -> SubscriptionId {
        let id = SubscriptionId(self.next_sub_id.fetch_add(1, Ordering::Relaxed));
        let state = &self.topics[&topic];
        state.handlers.write().await.push((id, handler));
        id
    }

    pub async fn unsubscribe(&self, topic: Topic, id: SubscriptionId) {
        let state = &self.topics[&topic];
        state.handlers.write().await.retain(|(sid, _)| *sid != id);
    }

    /// Non-blocking except for the bounded wait afforded to high-priority
    /// events when their topic's queue is full.
    pub async fn publish(&self, event: Event) {
        let dispatch = self.topics[&event.topic].dispatch.clone();
        let priority = event.priority;

        {
            let mut queue = dispatch.queue.lock().await;
            if queue.len() < dispatch.capacity {
                queue.push_back(event);
                drop(queue);
                dispatch.data_ready.notify_one();
                return;
            }

            if priority == EventPriority::Normal {
                // Only a Normal-priority event already queued is a valid
                // eviction victim; if the queue is full of High-priority
                // events, the incoming Normal event is dropped instead of
                // growing the queue past capacity.
                if let Some(pos) = queue.iter().position(|e| e.priority == EventPriority::Normal) {
                    queue.remove(pos);
                    queue.push_back(event);
                    drop(queue);
                    dispatch.data_ready.notify_one();
                }
                metrics::counter!(names::BUS_DROPPED_TOTAL).increment(1);
                return;
            }
        }

        // High-priority event and the queue was full: wait briefly for
        // space before giving up.
        let waited = timeout(
            self.high_priority_publish_timeout,
            dispatch.space_freed.notified(),
        )
        .await;

        let mut queue = dispatch.queue.lock().await;
        if waited.is_ok() && queue.len() < dispatch.capacity {
            queue.push_back(event);
            drop(queue);
            dispatch.data_ready.notify_one();
        } else {
            warn!(topic = %event.topic, "dropping high-priority event: bus queue full");
            metrics::counter!(names::BUS_DROPPED_TOTAL).increment(1);
        }
    }

    /// Used only at shutdown: drains every dispatch group's queue with a
    /// bounded overall timeout.
    pub async fn publish_sync(&self, overall_timeout: Duration) {
        let _ = timeout(overall_timeout, async {
            let mut drained: HashSet<Topic> = HashSet::new();
            for topic in Topic::ALL {
                let group = dispatch_group(*topic);
                if !drained.insert(group) {
                    continue;
                }
                let dispatch = self.topics[&group].dispatch.clone();
                loop {
                    let event = {
                        let mut q = dispatch.queue.lock().await;
                        q.pop_front()
                    };
                    let Some(event) = event else { break };
                    let event_topic = event.topic;
                    let state = &self.topics[&event_topic];
                    run_handlers(event_topic, &state.handlers, &event, self.handler_timeout).await;
                }
            }
        })
        .await;
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Drains one dispatch group's shared queue in strict FIFO order, routing
/// each event to the handlers registered for its own `Topic` within the
/// group. One task per group (not per topic) is what makes publish order
/// and dispatch order coincide for grouped topics.
async fn dispatch_loop(
    dispatch: Arc<DispatchQueue>,
    members: HashMap<Topic, Arc<TopicState>>,
    cancel: CancellationToken,
    handler_timeout: Duration,
) {
    loop {
        let event = {
            let mut q = dispatch.queue.lock().await;
            q.pop_front()
        };

        let Some(event) = event else {
            tokio::select! {
                _ = dispatch.data_ready.notified() => continue,
                _ = cancel.cancelled() => return,
            }
        };

        dispatch.space_freed.notify_one();
        let topic = event.topic;
        if let Some(state) = members.get(&topic) {
            run_handlers(topic, &state.handlers, &event, handler_timeout).await;
        }
    }
}

async fn run_handlers(
    topic: Topic,
    handlers: &RwLock<Vec<(SubscriptionId, Arc<dyn EventHandler>)>>,
    event: &Event,
    handler_timeout: Duration,
) {
    let snapshot: Vec<Arc<dyn EventHandler>> = handlers
        .read()
        .await
        .iter()
        .map(|(_, h)| h.clone())
        .collect();

    for handler in snapshot {
        match timeout(handler_timeout, handler.handle(event)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                error!(
                    %topic,
                    correlation_id = ?event.correlation_id,
                    error = %err,
                    "event handler failed"
                );
                metrics::counter!(names::BUS_HANDLER_ERROR_TOTAL).increment(1);
            }
            Err(_) => {
                warn!(%topic, correlation_id = ?event.correlation_id, "event handler timed out");
                metrics::counter!(names::BUS_HANDLER_TIMEOUT_TOTAL).increment(1);
            }
        }
    }

    metrics::counter!(names::BUS_PUBLISHED_TOTAL).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::Mutex as TokioMutex;

    struct Recorder {
        seen: Arc<TokioMutex<Vec<String>>>,
    }

    #[async_trait]
    impl EventHandler for Recorder {
        async fn handle(&self, event: &Event) -> Result<(), String> {
            self.seen
                .lock()
                .await
                .push(event.data["marker"].as_str().unwrap_or_default().to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn delivers_same_topic_events_in_publish_order() {
        let bus = EventBus::new(16, Duration::from_millis(100));
        let seen = Arc::new(TokioMutex::new(Vec::new()));
        bus.subscribe(
            Topic::ChatMessage,
            Arc::new(Recorder { seen: seen.clone() }),
        )
        .await;

        for i in 0..5 {
            bus.publish(Event::new(Topic::ChatMessage, json!({"marker": i.to_string()})))
                .await;
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        let seen = seen.lock().await;
        assert_eq!(*seen, vec!["0", "1", "2", "3", "4"]);
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let bus = EventBus::new(16, Duration::from_millis(100));
        let seen = Arc::new(TokioMutex::new(Vec::new()));
        let id = bus
            .subscribe(Topic::System, Arc::new(Recorder { seen: seen.clone() }))
            .await;
        bus.unsubscribe(Topic::System, id).await;

        bus.publish(Event::new(Topic::System, json!({"marker": "x"})))
            .await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(seen.lock().await.is_empty());
    }

    #[tokio::test]
    async fn full_queue_drops_oldest_normal_priority_event() {
        let bus = EventBus::new(2, Duration::from_millis(20));
        let seen = Arc::new(TokioMutex::new(Vec::<String>::new()));
        // No subscriber: queue will never drain, forcing overflow handling.
        let _ = seen;

        for i in 0..5 {
            bus.publish(Event::new(Topic::XpChanged, json!({"marker": i.to_string()})))
                .await;
        }
        // Should not hang or panic; queue bound enforced.
        let queue = bus.topics[&Topic::XpChanged].dispatch.queue.lock().await;
        assert!(queue.len() <= 2);
    }

    #[tokio::test]
    async fn a_normal_event_arriving_to_an_all_high_priority_full_queue_is_dropped_not_grown() {
        let bus = EventBus::new(2, Duration::from_millis(20));

        bus.publish(Event::new(Topic::PlayerEnteredRoom, json!({"marker": "0"})))
            .await;
        bus.publish(Event::new(Topic::PlayerEnteredRoom, json!({"marker": "1"})))
            .await;

        let mut late_normal = Event::new(Topic::PlayerEnteredRoom, json!({"marker": "2"}));
        late_normal.priority = EventPriority::Normal;
        bus.publish(late_normal).await;

        let queue = bus.topics[&Topic::PlayerEnteredRoom].dispatch.queue.lock().await;
        assert_eq!(queue.len(), 2);
        assert!(queue.iter().all(|e| e.data["marker"] != json!("2")));
    }

    #[tokio::test]
    async fn player_left_room_dispatches_before_player_entered_room_for_the_same_move() {
        let bus = EventBus::new(16, Duration::from_millis(100));
        let seen: Arc<TokioMutex<Vec<&'static str>>> = Arc::new(TokioMutex::new(Vec::new()));

        struct TopicRecorder {
            seen: Arc<TokioMutex<Vec<&'static str>>>,
        }

        #[async_trait]
        impl EventHandler for TopicRecorder {
            async fn handle(&self, event: &Event) -> Result<(), String> {
                self.seen.lock().await.push(event.topic.as_str());
                Ok(())
            }
        }

        let handler = Arc::new(TopicRecorder { seen: seen.clone() });
        bus.subscribe(Topic::PlayerLeftRoom, handler.clone()).await;
        bus.subscribe(Topic::PlayerEnteredRoom, handler).await;

        // Mirrors the publish order a room move produces: the departure
        // from the old room is enqueued before the arrival in the new one.
        bus.publish(Event::new(Topic::PlayerLeftRoom, json!({"room": "old"})))
            .await;
        bus.publish(Event::new(Topic::PlayerEnteredRoom, json!({"room": "new"})))
            .await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        let seen = seen.lock().await;
        assert_eq!(*seen, vec!["player_left_room", "player_entered_room"]);
    }
}
