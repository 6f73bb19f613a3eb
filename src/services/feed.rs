//! In-process change notifications for live views.
//!
//! Writers publish a [`ChangeEvent`] after a successful write. Readers call
//! [`ChangeFeed::subscribe`] with a filter and get a [`Subscription`] that
//! yields matching events. Dropping the subscription unsubscribes it.

use futures::Stream;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Employees,
    LeaveRequests,
    Attendance,
    Payroll,
    Jobs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub kind: ChangeKind,
    pub id: u64,
    /// Owner of the changed record, when it has one.
    pub employee_id: Option<u64>,
}

/// Which events a subscriber wants. `employee_id = None` means everyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionFilter {
    pub collection: Collection,
    pub employee_id: Option<u64>,
}

impl SubscriptionFilter {
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        event.collection == self.collection
            && match self.employee_id {
                None => true,
                Some(id) => event.employee_id == Some(id),
            }
    }
}

/// What a subscriber receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedItem {
    Change(ChangeEvent),
    /// The subscriber fell behind and `n` events were dropped; re-read state.
    Lagged(u64),
}

#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    /// `capacity` bounds how far a slow subscriber may fall behind.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: ChangeEvent) {
        // no subscribers is fine
        let delivered = self.sender.send(event).unwrap_or(0);
        debug!(delivered, "Change published");
    }

    pub fn subscribe(&self, filter: SubscriptionFilter) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            filter,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

pub struct Subscription {
    receiver: broadcast::Receiver<ChangeEvent>,
    filter: SubscriptionFilter,
}

impl Subscription {
    /// Next matching item, or `None` once the feed is gone.
    pub async fn next(&mut self) -> Option<FeedItem> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(FeedItem::Change(event)),
                Ok(_) => continue,
                Err(RecvError::Lagged(n)) => return Some(FeedItem::Lagged(n)),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = FeedItem> {
        futures::stream::unfold(self, |mut sub| async move {
            let item = sub.next().await?;
            Some((item, sub))
        })
    }

    /// Same as dropping it.
    pub fn unsubscribe(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn leave_event(id: u64, employee_id: u64) -> ChangeEvent {
        ChangeEvent {
            collection: Collection::LeaveRequests,
            kind: ChangeKind::Updated,
            id,
            employee_id: Some(employee_id),
        }
    }

    #[actix_web::test]
    async fn subscribers_only_see_matching_events() {
        let feed = ChangeFeed::new(16);
        let mut mine = feed.subscribe(SubscriptionFilter {
            collection: Collection::LeaveRequests,
            employee_id: Some(7),
        });

        feed.publish(leave_event(1, 8));
        feed.publish(ChangeEvent {
            collection: Collection::Payroll,
            kind: ChangeKind::Created,
            id: 2,
            employee_id: Some(7),
        });
        feed.publish(leave_event(3, 7));

        assert_eq!(mine.next().await, Some(FeedItem::Change(leave_event(3, 7))));
    }

    #[actix_web::test]
    async fn dropping_unsubscribes() {
        let feed = ChangeFeed::new(4);
        let filter = SubscriptionFilter {
            collection: Collection::LeaveRequests,
            employee_id: None,
        };

        let a = feed.subscribe(filter);
        let b = feed.subscribe(filter);
        assert_eq!(feed.subscriber_count(), 2);

        a.unsubscribe();
        drop(b);
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[actix_web::test]
    async fn slow_subscriber_is_told_it_lagged() {
        let feed = ChangeFeed::new(2);
        let mut sub = feed.subscribe(SubscriptionFilter {
            collection: Collection::LeaveRequests,
            employee_id: None,
        });

        for id in 0..5 {
            feed.publish(leave_event(id, 1));
        }

        assert_eq!(sub.next().await, Some(FeedItem::Lagged(3)));
        assert_eq!(sub.next().await, Some(FeedItem::Change(leave_event(3, 1))));
    }

    #[actix_web::test]
    async fn stream_ends_when_feed_is_dropped() {
        let feed = ChangeFeed::new(4);
        let sub = feed.subscribe(SubscriptionFilter {
            collection: Collection::Jobs,
            employee_id: None,
        });
        feed.publish(ChangeEvent {
            collection: Collection::Jobs,
            kind: ChangeKind::Deleted,
            id: 9,
            employee_id: None,
        });
        drop(feed);

        let items: Vec<FeedItem> = sub.into_stream().collect().await;
        assert_eq!(items.len(), 1);
    }
}
