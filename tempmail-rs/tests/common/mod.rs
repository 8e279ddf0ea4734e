//! Behaviour every mailbox backend must share, run by each backend's test file

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tempmail_rs::storage::{MailStore, MessageRecord};

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs)
}

pub fn record(to: &str, subject: &str, received_at: DateTime<Utc>) -> MessageRecord {
    MessageRecord::new(
        "sender@example.com",
        to,
        subject,
        format!("text of {}", subject),
        format!("<p>{}</p>", subject),
        received_at,
    )
}

/// Unique inbox name so backends with shared state do not collide between runs
pub fn inbox(name: &str) -> String {
    format!("{}-{}@tmp.test", name, uuid::Uuid::new_v4().simple())
}

/// Storing A then B yields B, then A, then nothing
pub async fn latest_first(store: &dyn MailStore) {
    let alice = inbox("alice");
    store.store(&alice, record(&alice, "hi", at(1))).await.unwrap();
    store.store(&alice, record(&alice, "bye", at(2))).await.unwrap();

    let first = store.consume_latest(&alice).await.unwrap().unwrap();
    assert_eq!(first.subject, "bye");
    assert_eq!(first.text_body, "text of bye");
    assert_eq!(first.html_body, "<p>bye</p>");

    let second = store.consume_latest(&alice).await.unwrap().unwrap();
    assert_eq!(second.subject, "hi");

    assert!(store.consume_latest(&alice).await.unwrap().is_none());
}

/// A fully consumed mailbox reports no mail
pub async fn exhaustion(store: &dyn MailStore) {
    let to = inbox("drain");
    assert!(!store.has_mail(&to).await.unwrap());

    for i in 0..3 {
        store.store(&to, record(&to, &format!("m{}", i), at(i))).await.unwrap();
    }
    assert!(store.has_mail(&to).await.unwrap());

    for _ in 0..3 {
        assert!(store.consume_latest(&to).await.unwrap().is_some());
    }
    assert!(store.consume_latest(&to).await.unwrap().is_none());
    assert!(!store.has_mail(&to).await.unwrap());
}

/// Activity on one inbox never shows up in another
pub async fn isolation(store: &dyn MailStore) {
    let x = inbox("x");
    let y = inbox("y");

    store.store(&y, record(&y, "for-y", at(1))).await.unwrap();
    let baseline = store.count().await.unwrap();

    store.store(&x, record(&x, "for-x-1", at(2))).await.unwrap();
    store.store(&x, record(&x, "for-x-2", at(3))).await.unwrap();
    assert_eq!(store.count().await.unwrap(), baseline + 2);
    assert!(store.has_mail(&y).await.unwrap());

    let from_y = store.consume_latest(&y).await.unwrap().unwrap();
    assert_eq!(from_y.subject, "for-y");
    assert!(store.consume_latest(&y).await.unwrap().is_none());

    assert!(store.has_mail(&x).await.unwrap());
    assert_eq!(store.consume_latest(&x).await.unwrap().unwrap().subject, "for-x-2");
}

/// Count tracks only records that have not been consumed
pub async fn count_tracks_pending(store: &dyn MailStore) {
    let to = inbox("count");
    let baseline = store.count().await.unwrap();

    for i in 0..4 {
        store.store(&to, record(&to, &format!("m{}", i), at(i))).await.unwrap();
    }
    assert_eq!(store.count().await.unwrap(), baseline + 4);

    store.consume_latest(&to).await.unwrap();
    assert_eq!(store.count().await.unwrap(), baseline + 3);
}

/// N concurrent consumers against K < N records: K distinct hits, N - K misses
pub async fn no_double_delivery(store: Arc<dyn MailStore>) {
    const RECORDS: usize = 20;
    const CONSUMERS: usize = 50;

    let to = inbox("race");
    for i in 0..RECORDS {
        store
            .store(&to, record(&to, &format!("m{}", i), at(i as i64)))
            .await
            .unwrap();
    }

    let mut handles = Vec::with_capacity(CONSUMERS);
    for _ in 0..CONSUMERS {
        let store = Arc::clone(&store);
        let to = to.clone();
        handles.push(tokio::spawn(async move { store.consume_latest(&to).await }));
    }

    let mut seen = HashSet::new();
    let mut misses = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            Some(mail) => assert!(seen.insert(mail.subject), "record delivered twice"),
            None => misses += 1,
        }
    }

    assert_eq!(seen.len(), RECORDS);
    assert_eq!(misses, CONSUMERS - RECORDS);
    assert!(!store.has_mail(&to).await.unwrap());
}

/// After clear_all nothing is pending anywhere
pub async fn clear_all(store: &dyn MailStore) {
    let inboxes: Vec<String> = (0..3).map(|i| inbox(&format!("clear{}", i))).collect();
    for (i, to) in inboxes.iter().enumerate() {
        store.store(to, record(to, "m", at(i as i64))).await.unwrap();
        store.store(to, record(to, "n", at(10 + i as i64))).await.unwrap();
    }

    store.clear_all().await.unwrap();

    assert_eq!(store.count().await.unwrap(), 0);
    for to in &inboxes {
        assert!(!store.has_mail(to).await.unwrap());
        assert!(store.consume_latest(to).await.unwrap().is_none());
    }

    // The store stays usable
    store.store(&inboxes[0], record(&inboxes[0], "after", at(99))).await.unwrap();
    assert_eq!(store.count().await.unwrap(), 1);
}

/// Empty subject and bodies are stored as empty strings, not dropped
pub async fn empty_fields(store: &dyn MailStore) {
    let to = inbox("empty");
    let blank = MessageRecord::new("", &to, "", "", "", at(5));
    store.store(&to, blank.clone()).await.unwrap();

    let back = store.consume_latest(&to).await.unwrap().unwrap();
    assert_eq!(back.subject, "");
    assert_eq!(back.text_body, "");
    assert_eq!(back.html_body, "");
    assert_eq!(back.received_at, blank.received_at);
}
