//! Blog Example
//!
//! This example demonstrates the execution engine end to end:
//! - A schema loaded from SDL
//! - Resolvers backed by an in-memory store
//! - A query with nested lists
//! - A mutation that publishes `postAdded` on the event bus
//! - A live subscription receiving the new post
//!
//! Run with `RUST_LOG=this_graphql=debug cargo run --example blog` to see
//! the engine's tracing output.

use anyhow::Result;
use std::sync::RwLock;
use std::time::Duration;
use this_graphql::prelude::*;
use tracing_subscriber::EnvFilter;

const SCHEMA: &str = r#"
type User { id: ID! name: String posts: [Post!]! }
type Post { id: ID! title: String author: User! }
type Query { user(id: ID!): User posts: [Post!]! }
type Mutation { createPost(title: String!, authorId: ID!): Post! }
type Subscription { postAdded: Post! }
"#;

const CONFIG: &str = r#"
execution:
  timeout_ms: 2000
subscriptions:
  event_bus_capacity: 64
"#;

/// Users and posts kept in memory
struct Store {
    users: Vec<Value>,
    posts: RwLock<Vec<Value>>,
    events: EventBus,
}

impl Store {
    fn new(events: EventBus) -> Self {
        Self {
            users: vec![
                json!({"id": "1", "name": "Alice"}),
                json!({"id": "2", "name": "Bob"}),
            ],
            posts: RwLock::new(vec![
                json!({"id": "101", "title": "First", "author_id": "1"}),
                json!({"id": "102", "title": "Second", "author_id": "1"}),
                json!({"id": "103", "title": "Hello from Bob", "author_id": "2"}),
            ]),
            events,
        }
    }

    fn user(&self, id: &str) -> Value {
        self.users
            .iter()
            .find(|u| u["id"] == id)
            .cloned()
            .unwrap_or(Value::Null)
    }

    fn posts_by(&self, author_id: &str) -> Result<Vec<Value>, ResolverError> {
        let posts = self
            .posts
            .read()
            .map_err(|_| ResolverError::new("post store poisoned"))?;
        Ok(posts
            .iter()
            .filter(|p| p["author_id"] == author_id)
            .cloned()
            .collect())
    }

    fn create_post(&self, title: &str, author_id: &str) -> Result<Value, ResolverError> {
        let mut posts = self
            .posts
            .write()
            .map_err(|_| ResolverError::new("post store poisoned"))?;
        let post = json!({
            "id": (101 + posts.len()).to_string(),
            "title": title,
            "author_id": author_id,
        });
        posts.push(post.clone());
        self.events
            .publish(SubscriptionEvent::new("postAdded", post.clone()));
        Ok(post)
    }
}

fn str_arg<'a>(args: &'a Arguments, name: &str) -> &'a str {
    args.get(name).and_then(Value::as_str).unwrap_or_default()
}

fn resolvers() -> ResolverTable {
    let mut resolvers = ResolverTable::new();
    resolvers
        .register_fn("Query", "user", |_, args, ctx| async move {
            let store = ctx.data::<Store>().ok_or("store missing")?;
            Ok::<_, ResolverError>(store.user(str_arg(&args, "id")))
        })
        .register_fn("Query", "posts", |_, _, ctx| async move {
            let store = ctx.data::<Store>().ok_or("store missing")?;
            let posts = store.posts.read().map_err(|_| "post store poisoned")?.clone();
            Ok::<_, ResolverError>(Value::Array(posts))
        })
        .register_fn("User", "posts", |user, _, ctx| async move {
            let store = ctx.data::<Store>().ok_or("store missing")?;
            let posts = store.posts_by(user["id"].as_str().unwrap_or_default())?;
            Ok::<_, ResolverError>(Value::Array(posts))
        })
        .register_fn("Post", "author", |post, _, ctx| async move {
            let store = ctx.data::<Store>().ok_or("store missing")?;
            Ok::<_, ResolverError>(store.user(post["author_id"].as_str().unwrap_or_default()))
        })
        .register_fn("Mutation", "createPost", |_, args, ctx| async move {
            let store = ctx.data::<Store>().ok_or("store missing")?;
            store.create_post(str_arg(&args, "title"), str_arg(&args, "authorId"))
        });
    resolvers
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = EngineConfig::from_yaml_str(CONFIG)?;
    let events = EventBus::new(config.subscriptions.event_bus_capacity);

    let schema = Arc::new(SchemaRegistry::from_sdl(SCHEMA)?);
    let executor = Executor::new(schema, Arc::new(resolvers()))?
        .with_options(ExecutionOptions::from(&config.execution))
        .with_data(Store::new(events.clone()));

    // Subscriptions: forward bus events to the broker
    let broker = Arc::new(SubscriptionBroker::with_event_bus(executor.clone(), events));
    let dispatch_rx = broker.event_bus().subscribe();
    let dispatcher = broker.clone();
    tokio::spawn(async move { dispatcher.run_dispatch_loop(dispatch_rx).await });

    let (handle, mut deliveries) = broker
        .subscribe(
            OperationDocument::parse("subscription { postAdded { id title author { name } } }")?,
            &Variables::new(),
        )
        .await?;
    println!("📡 Subscribed to {} ({})", handle.field(), handle.id());

    // Query
    let result = executor
        .execute_request(r#"{ user(id: "1") { name posts { title } } }"#, None, None)
        .await;
    println!("\n🔎 Query result:\n{}", serde_json::to_string_pretty(&result)?);

    // Mutation, which publishes postAdded
    let mut variables = Variables::new();
    variables.insert("title".to_string(), json!("Latest Post"));
    variables.insert("author".to_string(), json!("2"));
    let result = executor
        .execute_request(
            "mutation Publish($title: String!, $author: ID!) { createPost(title: $title, authorId: $author) { id } }",
            Some("Publish"),
            Some(variables),
        )
        .await;
    println!("\n✏️  Mutation result:\n{}", serde_json::to_string_pretty(&result)?);

    // Subscription delivery
    match tokio::time::timeout(Duration::from_secs(1), deliveries.recv()).await {
        Ok(Some(delivery)) => {
            println!("\n📬 Subscription delivery:\n{}", serde_json::to_string_pretty(&delivery)?)
        }
        Ok(None) => println!("\n📭 Subscription closed"),
        Err(_) => println!("\n⏱️  No delivery within 1s"),
    }

    broker.unsubscribe(&handle).await;
    Ok(())
}
