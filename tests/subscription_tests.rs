//! Subscription delivery tests against the blog schema

mod blog_harness;

use blog_harness::*;
use futures::StreamExt;
use serde_json::json;
use std::time::Duration;
use this_graphql::execution::{OperationDocument, Variables};
use this_graphql::subscription::SubscriptionState;

const POST_ADDED: &str = "subscription { postAdded { id title author { name } } }";

#[tokio::test]
async fn test_publish_delivers_once_and_skips_unsubscribed() {
    let blog = blog();
    let (_active, mut active_rx) = blog
        .broker
        .subscribe(OperationDocument::parse(POST_ADDED).unwrap(), &Variables::new())
        .await
        .unwrap();
    let (gone, mut gone_rx) = blog
        .broker
        .subscribe(OperationDocument::parse(POST_ADDED).unwrap(), &Variables::new())
        .await
        .unwrap();
    assert_eq!(blog.broker.subscriber_count("postAdded").await, 2);

    assert!(blog.broker.unsubscribe(&gone).await);
    assert_eq!(gone.state(), SubscriptionState::Terminated);

    let delivered = blog
        .broker
        .publish(
            "postAdded",
            json!({"id": "104", "title": "Latest Post", "author": {"name": "Bob"}}),
        )
        .await;
    assert_eq!(delivered, 1);

    let result = active_rx.recv().await.unwrap();
    assert!(result.is_ok());
    assert_eq!(
        result.to_json(),
        json!({
            "data": {
                "postAdded": {"id": "104", "title": "Latest Post", "author": {"name": "Bob"}}
            }
        })
    );
    assert!(active_rx.try_recv().is_none());
    assert!(gone_rx.recv().await.is_none());
}

#[tokio::test]
async fn test_mutation_publishes_through_event_bus() {
    let blog = blog();
    spawn_dispatch(&blog.broker);

    let (_handle, rx) = blog
        .broker
        .subscribe(OperationDocument::parse(POST_ADDED).unwrap(), &Variables::new())
        .await
        .unwrap();
    let mut stream = rx.into_stream();

    let result = blog
        .executor
        .execute_request(
            r#"mutation { createPost(title: "Latest Post", authorId: "2") { id } }"#,
            None,
            None,
        )
        .await;
    assert_eq!(result.data, Some(json!({"createPost": {"id": "104"}})));

    let delivered = tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("delivery within timeout")
        .expect("stream open");
    assert_eq!(
        delivered.data,
        Some(json!({
            "postAdded": {"id": "104", "title": "Latest Post", "author": {"name": "Bob"}}
        }))
    );
}

#[tokio::test]
async fn test_subscription_variables_and_aliases() {
    let blog = blog();
    let document = OperationDocument::parse(
        "subscription ($withAuthor: Boolean!) { added: postAdded { title author @include(if: $withAuthor) { name } } }",
    )
    .unwrap();
    let (handle, mut rx) = blog
        .broker
        .subscribe(document, &vars(json!({"withAuthor": false})))
        .await
        .unwrap();
    assert_eq!(handle.field(), "postAdded");

    blog.broker
        .publish("postAdded", json!({"id": "7", "title": "Hello", "author_id": "1"}))
        .await;
    assert_eq!(
        rx.recv().await.unwrap().data,
        Some(json!({"added": {"title": "Hello"}}))
    );
}

#[tokio::test]
async fn test_invalid_subscription_is_rejected_at_subscribe() {
    let blog = blog();
    let err = blog
        .broker
        .subscribe(
            OperationDocument::parse("subscription { postAdded { missing } }").unwrap(),
            &Variables::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_UNKNOWN_FIELD");
    assert_eq!(blog.broker.subscriber_count("postAdded").await, 0);
}

#[tokio::test]
async fn test_field_errors_do_not_end_subscription() {
    let blog = blog();
    let (handle, mut rx) = blog
        .broker
        .subscribe(OperationDocument::parse(POST_ADDED).unwrap(), &Variables::new())
        .await
        .unwrap();

    // Unknown author: author is User! so postAdded, then data, become null
    blog.broker
        .publish("postAdded", json!({"id": "1", "title": "x", "author_id": "404"}))
        .await;
    let first = rx.recv().await.unwrap();
    assert_eq!(first.data, Some(serde_json::Value::Null));
    assert_eq!(first.errors[0].path_string(), "postAdded.author");

    blog.broker
        .publish("postAdded", json!({"id": "2", "title": "y", "author_id": "1"}))
        .await;
    let second = rx.recv().await.unwrap();
    assert!(second.is_ok());
    assert_eq!(handle.state(), SubscriptionState::Active);
}
