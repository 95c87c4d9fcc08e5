//! Shared test harness: a small blog schema backed by an in-memory store
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! mod blog_harness;
//! use blog_harness::*;
//! ```

#![allow(dead_code)]

use serde_json::{Value, json};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use this_graphql::core::error::ResolverError;
use this_graphql::core::events::{EventBus, SubscriptionEvent};
use this_graphql::execution::{Executor, Variables};
use this_graphql::resolver::ResolverTable;
use this_graphql::schema::SchemaRegistry;
use this_graphql::subscription::SubscriptionBroker;

pub const BLOG_SDL: &str = r#"
type User {
    id: ID!
    name: String
    posts: [Post!]!
}

type Post {
    id: ID!
    title: String
    author: User!
}

type Query {
    user(id: ID!): User
    post(id: ID!): Post
    posts: [Post!]!
    slow: String
}

type Mutation {
    createPost(title: String!, authorId: ID!): Post!
}

type Subscription {
    postAdded: Post!
}
"#;

// ---------------------------------------------------------------------------
// BlogStore
// ---------------------------------------------------------------------------

/// In-memory users and posts, in insertion order
pub struct BlogStore {
    users: RwLock<Vec<Value>>,
    posts: RwLock<Vec<Value>>,
    /// Posts whose title resolver fails
    broken: RwLock<Vec<String>>,
    /// Start/end markers written by the createPost resolver
    log: Mutex<Vec<String>>,
    events: EventBus,
}

impl BlogStore {
    /// Alice ("1") with posts First/Second, Bob ("2") with Third/Fourth
    pub fn seeded(events: EventBus) -> Arc<Self> {
        let store = Self {
            users: RwLock::new(Vec::new()),
            posts: RwLock::new(Vec::new()),
            broken: RwLock::new(Vec::new()),
            log: Mutex::new(Vec::new()),
            events,
        };
        store.add_user("1", "Alice");
        store.add_user("2", "Bob");
        store.add_post("1", "First");
        store.add_post("1", "Second");
        store.add_post("2", "Third");
        store.add_post("2", "Fourth");
        Arc::new(store)
    }

    pub fn add_user(&self, id: &str, name: &str) {
        self.users
            .write()
            .unwrap()
            .push(json!({"id": id, "name": name}));
    }

    /// Insert a post; ids are assigned from 100 upwards
    pub fn add_post(&self, author_id: &str, title: &str) -> Value {
        let mut posts = self.posts.write().unwrap();
        let post = json!({
            "id": (100 + posts.len()).to_string(),
            "title": title,
            "author_id": author_id,
        });
        posts.push(post.clone());
        post
    }

    pub fn break_post(&self, post_id: &str) {
        self.broken.write().unwrap().push(post_id.to_string());
    }

    pub fn is_broken(&self, post_id: &str) -> bool {
        self.broken.read().unwrap().iter().any(|id| id == post_id)
    }

    pub fn user(&self, id: &str) -> Option<Value> {
        self.users
            .read()
            .unwrap()
            .iter()
            .find(|u| u["id"] == id)
            .cloned()
    }

    /// User with its posts embedded, the way a document store would return it
    pub fn user_with_posts(&self, id: &str) -> Option<Value> {
        let mut user = self.user(id)?;
        let posts: Vec<Value> = self
            .posts
            .read()
            .unwrap()
            .iter()
            .filter(|p| p["author_id"] == id)
            .cloned()
            .collect();
        user["posts"] = Value::Array(posts);
        Some(user)
    }

    pub fn post(&self, id: &str) -> Option<Value> {
        self.posts
            .read()
            .unwrap()
            .iter()
            .find(|p| p["id"] == id)
            .cloned()
    }

    pub fn posts(&self) -> Vec<Value> {
        self.posts.read().unwrap().clone()
    }

    pub fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

// ---------------------------------------------------------------------------
// Schema and resolvers
// ---------------------------------------------------------------------------

pub fn blog_schema() -> Arc<SchemaRegistry> {
    Arc::new(SchemaRegistry::from_sdl(BLOG_SDL).expect("blog schema builds"))
}

fn str_arg(args: &this_graphql::resolver::Arguments, name: &str) -> String {
    args.get(name)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

pub fn blog_resolvers(store: Arc<BlogStore>) -> ResolverTable {
    let mut resolvers = ResolverTable::new();

    let s = store.clone();
    resolvers.register_fn("Query", "user", move |_, args, _| {
        let s = s.clone();
        async move { Ok(s.user_with_posts(&str_arg(&args, "id")).unwrap_or(Value::Null)) }
    });

    let s = store.clone();
    resolvers.register_fn("Query", "post", move |_, args, _| {
        let s = s.clone();
        async move { Ok(s.post(&str_arg(&args, "id")).unwrap_or(Value::Null)) }
    });

    let s = store.clone();
    resolvers.register_fn("Query", "posts", move |_, _, _| {
        let s = s.clone();
        async move { Ok(Value::Array(s.posts())) }
    });

    resolvers.register_fn("Query", "slow", |_, _, _| async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(json!("finally"))
    });

    let s = store.clone();
    resolvers.register_fn("Post", "title", move |post, _, _| {
        let s = s.clone();
        async move {
            let id = post["id"].as_str().unwrap_or_default().to_string();
            if s.is_broken(&id) {
                return Err(ResolverError::new(format!("title of post {} is unavailable", id)));
            }
            Ok(post["title"].clone())
        }
    });

    let s = store.clone();
    resolvers.register_fn("Post", "author", move |post, _, _| {
        let s = s.clone();
        async move {
            if post["author"].is_object() {
                return Ok(post["author"].clone());
            }
            let author_id = post["author_id"].as_str().unwrap_or_default();
            Ok(s.user(author_id).unwrap_or(Value::Null))
        }
    });

    let s = store;
    resolvers.register_fn("Mutation", "createPost", move |_, args, _| {
        let s = s.clone();
        async move {
            let title = str_arg(&args, "title");
            s.record(format!("start {}", title));
            if title == "A" {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            let post = s.add_post(&str_arg(&args, "authorId"), &title);
            s.events
                .publish(SubscriptionEvent::new("postAdded", post.clone()));
            s.record(format!("end {}", title));
            Ok(post)
        }
    });

    resolvers
}

// ---------------------------------------------------------------------------
// Assembled engine
// ---------------------------------------------------------------------------

pub struct Blog {
    pub store: Arc<BlogStore>,
    pub executor: Executor,
    pub broker: Arc<SubscriptionBroker>,
}

/// Fresh seeded blog with its executor and subscription broker
pub fn blog() -> Blog {
    let events = EventBus::new(64);
    let store = BlogStore::seeded(events.clone());
    let executor = Executor::new(blog_schema(), Arc::new(blog_resolvers(store.clone())))
        .expect("resolvers bind to the blog schema");
    let broker = Arc::new(SubscriptionBroker::with_event_bus(executor.clone(), events));
    Blog {
        store,
        executor,
        broker,
    }
}

/// Start forwarding bus events to the broker; must run inside a runtime
pub fn spawn_dispatch(broker: &Arc<SubscriptionBroker>) {
    let rx = broker.event_bus().subscribe();
    let broker = broker.clone();
    tokio::spawn(async move { broker.run_dispatch_loop(rx).await });
}

pub fn vars(value: Value) -> Variables {
    value.as_object().cloned().unwrap_or_default()
}
