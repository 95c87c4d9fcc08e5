//! Operation executor
//!
//! Walks the selection tree of a validated operation, invokes resolvers
//! and completes their values against the declared field types:
//!
//! - sibling fields resolve concurrently; root fields of a mutation run
//!   one after another in document order
//! - a resolver failure becomes a field error and `null` at that field
//! - `null` in a Non-Null position propagates to the nearest nullable
//!   ancestor; if that is the root, `data` becomes `null`
//! - once the deadline elapses or the caller cancels, unresolved fields
//!   are finalized with a timeout or cancellation error; resolvers already
//!   running finish in the background and their results are discarded

use super::Variables;
use super::coercion::{coerce_input, coerce_output_leaf};
use super::collect::{GroupedFields, collect_fields};
use super::document::{OperationDocument, OperationKind, SelectionNode};
use super::result::{ErrorCollector, ExecutionResult, FieldError, PathSegment, ResponsePath};
use super::validation::validate;
use crate::config::ExecutionConfig;
use crate::core::error::{FieldErrorKind, ResolverError, SchemaError, ValidationError};
use crate::resolver::{
    AppData, Arguments, DefaultPropertyResolver, ResolverContext, ResolverTable,
};
use crate::schema::{FieldDef, ObjectType, SchemaRegistry, TypeDef, TypeRef};
use futures::future::{BoxFuture, FutureExt, join_all};
use serde_json::{Map, Value};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Per-executor execution settings
#[derive(Clone, Default)]
pub struct ExecutionOptions {
    /// Deadline for a whole operation, measured from its start
    pub timeout: Option<Duration>,

    /// Application data exposed to resolvers through [`ResolverContext::data`]
    pub app_data: Option<AppData>,
}

impl From<&ExecutionConfig> for ExecutionOptions {
    fn from(config: &ExecutionConfig) -> Self {
        Self {
            timeout: config.timeout(),
            app_data: None,
        }
    }
}

impl std::fmt::Debug for ExecutionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionOptions")
            .field("timeout", &self.timeout)
            .field("app_data", &self.app_data.is_some())
            .finish()
    }
}

/// A validated operation with its coerced variables
///
/// Produced once and executed any number of times; subscriptions execute
/// theirs for every matching event.
#[derive(Debug, Clone)]
pub struct PreparedOperation {
    document: Arc<OperationDocument>,
    variables: Arc<Variables>,
    root_field: Option<String>,
}

impl PreparedOperation {
    pub fn document(&self) -> &OperationDocument {
        &self.document
    }

    pub fn kind(&self) -> OperationKind {
        self.document.kind
    }

    /// Coerced variable values, defaults applied
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Schema field name of the first root field that survives `@skip` / `@include`
    pub fn root_field(&self) -> Option<&str> {
        self.root_field.as_deref()
    }
}

/// Executes operations against a schema and resolver table
///
/// Cheap to clone and safe to share: every execution builds its own
/// result tree and error list.
#[derive(Clone)]
pub struct Executor {
    schema: Arc<SchemaRegistry>,
    resolvers: Arc<ResolverTable>,
    options: ExecutionOptions,
}

impl Executor {
    /// Create an executor, checking resolver bindings against the schema
    pub fn new(
        schema: Arc<SchemaRegistry>,
        resolvers: Arc<ResolverTable>,
    ) -> Result<Self, SchemaError> {
        resolvers.bind(&schema)?;
        Ok(Self {
            schema,
            resolvers,
            options: ExecutionOptions::default(),
        })
    }

    pub fn with_options(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Attach application data retrievable by resolvers
    pub fn with_data<T: Any + Send + Sync>(mut self, data: T) -> Self {
        self.options.app_data = Some(Arc::new(data));
        self
    }

    pub fn schema(&self) -> &Arc<SchemaRegistry> {
        &self.schema
    }

    pub fn resolvers(&self) -> &Arc<ResolverTable> {
        &self.resolvers
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.options
    }

    /// Validate a document and coerce its variables without executing it
    pub fn prepare(
        &self,
        document: OperationDocument,
        variables: &Variables,
    ) -> Result<PreparedOperation, ValidationError> {
        let coerced = validate(&self.schema, &document, variables)?;
        let root_type = self
            .schema
            .root_type_name(document.kind)
            .map_err(|_| ValidationError::OperationNotSupported {
                operation: document.kind,
            })?;
        let root_field = collect_fields(
            &self.schema,
            &document,
            root_type,
            &document.selections,
            &coerced,
        )
        .values()
        .next()
        .and_then(|nodes| nodes.first())
        .map(|node| node.name.clone());

        Ok(PreparedOperation {
            document: Arc::new(document),
            variables: Arc::new(coerced),
            root_field,
        })
    }

    /// Execute one operation
    pub async fn execute(&self, document: &OperationDocument, variables: &Variables) -> ExecutionResult {
        self.execute_with_cancellation(document, variables, CancellationToken::new())
            .await
    }

    /// Execute one operation, finalizing early once `cancellation` fires
    pub async fn execute_with_cancellation(
        &self,
        document: &OperationDocument,
        variables: &Variables,
        cancellation: CancellationToken,
    ) -> ExecutionResult {
        run(
            &self.schema,
            &self.resolvers,
            &self.options,
            document,
            variables,
            cancellation,
        )
        .await
    }

    /// Parse and execute a request in its textual form
    ///
    /// Parse failures are reported like validation failures: no `data`,
    /// a single request error.
    pub async fn execute_request(
        &self,
        query: &str,
        operation_name: Option<&str>,
        variables: Option<Variables>,
    ) -> ExecutionResult {
        match OperationDocument::parse_operation(query, operation_name) {
            Ok(document) => self.execute(&document, &variables.unwrap_or_default()).await,
            Err(err) => {
                tracing::debug!(code = err.error_code(), error = %err, "Request rejected");
                ExecutionResult::from_validation_error(&err)
            }
        }
    }

    /// Execute a prepared operation with an explicit root value
    pub(crate) async fn execute_prepared(
        &self,
        prepared: &PreparedOperation,
        root_value: Value,
        cancellation: CancellationToken,
    ) -> ExecutionResult {
        execute_validated(
            &self.schema,
            &self.resolvers,
            &self.options,
            &prepared.document,
            prepared.variables.clone(),
            root_value,
            cancellation,
        )
        .await
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("resolvers", &self.resolvers)
            .field("options", &self.options)
            .finish()
    }
}

/// Execute an operation with default options
///
/// Resolver bindings are not checked here; use [`Executor::new`] for that.
pub async fn execute(
    document: &OperationDocument,
    schema: &SchemaRegistry,
    resolvers: &ResolverTable,
    variables: &Variables,
) -> ExecutionResult {
    run(
        schema,
        resolvers,
        &ExecutionOptions::default(),
        document,
        variables,
        CancellationToken::new(),
    )
    .await
}

async fn run(
    schema: &SchemaRegistry,
    resolvers: &ResolverTable,
    options: &ExecutionOptions,
    document: &OperationDocument,
    variables: &Variables,
    cancellation: CancellationToken,
) -> ExecutionResult {
    match validate(schema, document, variables) {
        Ok(coerced) => {
            execute_validated(
                schema,
                resolvers,
                options,
                document,
                Arc::new(coerced),
                Value::Null,
                cancellation,
            )
            .await
        }
        Err(err) => {
            tracing::debug!(
                operation = %document.kind,
                code = err.error_code(),
                error = %err,
                "Operation rejected"
            );
            ExecutionResult::from_validation_error(&err)
        }
    }
}

async fn execute_validated(
    schema: &SchemaRegistry,
    resolvers: &ResolverTable,
    options: &ExecutionOptions,
    document: &OperationDocument,
    variables: Arc<Variables>,
    root_value: Value,
    cancellation: CancellationToken,
) -> ExecutionResult {
    let Ok(root_type) = schema.root_operation_type(document.kind) else {
        return ExecutionResult::from_validation_error(&ValidationError::OperationNotSupported {
            operation: document.kind,
        });
    };

    tracing::debug!(
        operation = %document.kind,
        name = document.name.as_deref().unwrap_or("anonymous"),
        timeout_ms = options.timeout.map(|t| t.as_millis() as u64),
        "Executing operation"
    );

    let ctx = ExecutionContext {
        schema,
        resolvers,
        document,
        variables,
        app_data: options.app_data.clone(),
        resolver_token: cancellation.child_token(),
        cancellation,
        deadline: options.timeout.map(|timeout| Instant::now() + timeout),
        errors: ErrorCollector::default(),
    };

    let fields = collect_fields(
        schema,
        document,
        &root_type.name,
        &document.selections,
        &ctx.variables,
    );
    let serial = document.kind == OperationKind::Mutation;
    let data = execute_fields(&ctx, root_type, root_value, fields, Vec::new(), serial)
        .await
        .unwrap_or(Value::Null);

    let errors = ctx.errors.into_errors();
    tracing::debug!(
        operation = %document.kind,
        errors = errors.len(),
        "Operation executed"
    );
    ExecutionResult::new(data, errors)
}

/// Marker for a `null` that must propagate to the nearest nullable ancestor
///
/// The error explaining it has already been recorded.
struct NullBubble;

type Completion = Result<Value, NullBubble>;

type ResolverResult = Result<Value, ResolverError>;

/// Owned resolver invocation, detachable from the execution that started it
type Resolution = BoxFuture<'static, ResolverResult>;

/// Field currently being completed, for error messages
#[derive(Clone, Copy)]
struct FieldOrigin<'a> {
    parent_type: &'a str,
    field_name: &'a str,
}

struct ExecutionContext<'a> {
    schema: &'a SchemaRegistry,
    resolvers: &'a ResolverTable,
    document: &'a OperationDocument,
    variables: Arc<Variables>,
    app_data: Option<AppData>,
    /// Caller's token
    cancellation: CancellationToken,
    /// Token handed to resolvers; also cancelled when the deadline elapses
    resolver_token: CancellationToken,
    deadline: Option<Instant>,
    errors: ErrorCollector,
}

impl ExecutionContext<'_> {
    fn record(&self, kind: FieldErrorKind, message: impl Into<String>, path: &ResponsePath) {
        self.errors.push(FieldError::new(kind, message, path.clone()));
    }

    /// Why no new field may start, if any
    fn interruption(&self) -> Option<FieldErrorKind> {
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            Some(FieldErrorKind::Timeout)
        } else if self.cancellation.is_cancelled() {
            Some(FieldErrorKind::Cancelled)
        } else {
            None
        }
    }

    /// Race a resolution against cancellation and the deadline
    ///
    /// An interrupted resolution is not dropped: it keeps running on its own
    /// task until the resolver returns, and its output is discarded.
    async fn guard(&self, mut resolution: Resolution) -> Result<ResolverResult, FieldErrorKind> {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        let kind = tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => FieldErrorKind::Cancelled,
            output = &mut resolution => return Ok(output),
            _ = deadline => FieldErrorKind::Timeout,
        };

        self.resolver_token.cancel();
        tokio::spawn(async move {
            if let Err(err) = resolution.await {
                tracing::debug!(error = %err.message, "Interrupted resolver failed after its result was discarded");
            }
        });
        Err(kind)
    }
}

fn interruption_message(kind: FieldErrorKind, origin: FieldOrigin<'_>) -> String {
    match kind {
        FieldErrorKind::Timeout => format!(
            "Execution deadline exceeded before {}.{} resolved",
            origin.parent_type, origin.field_name
        ),
        _ => format!(
            "Execution cancelled before {}.{} resolved",
            origin.parent_type, origin.field_name
        ),
    }
}

fn child_path(path: &ResponsePath, segment: impl Into<PathSegment>) -> ResponsePath {
    let mut child = Vec::with_capacity(path.len() + 1);
    child.extend_from_slice(path);
    child.push(segment.into());
    child
}

/// `null` for a nullable field, a bubble for a Non-Null one
fn null_or_bubble(ty: &TypeRef) -> Completion {
    if ty.is_non_null() {
        Err(NullBubble)
    } else {
        Ok(Value::Null)
    }
}

fn execute_fields<'a>(
    ctx: &'a ExecutionContext<'a>,
    object_type: &'a ObjectType,
    parent: Value,
    fields: GroupedFields<'a>,
    path: ResponsePath,
    serial: bool,
) -> BoxFuture<'a, Completion> {
    async move {
        let mut data = Map::with_capacity(fields.len());

        if serial {
            for (key, nodes) in &fields {
                let value =
                    execute_field(ctx, object_type, &parent, nodes, child_path(&path, *key)).await?;
                data.insert(key.to_string(), value);
            }
        } else {
            let results = join_all(fields.iter().map(|(key, nodes)| {
                execute_field(ctx, object_type, &parent, nodes, child_path(&path, *key))
            }))
            .await;
            for (key, result) in fields.keys().zip(results) {
                data.insert(key.to_string(), result?);
            }
        }

        Ok(Value::Object(data))
    }
    .boxed()
}

fn execute_field<'a>(
    ctx: &'a ExecutionContext<'a>,
    object_type: &'a ObjectType,
    parent: &'a Value,
    nodes: &'a [&'a SelectionNode],
    path: ResponsePath,
) -> BoxFuture<'a, Completion> {
    async move {
        let Some(node) = nodes.first().copied() else {
            return Ok(Value::Null);
        };
        if node.name == "__typename" {
            return Ok(Value::String(object_type.name.clone()));
        }
        let Some(field_def) = object_type.fields.get(&node.name) else {
            ctx.record(
                FieldErrorKind::Resolver,
                format!("Cannot query field '{}' on type '{}'", node.name, object_type.name),
                &path,
            );
            return Ok(Value::Null);
        };
        let origin = FieldOrigin {
            parent_type: &object_type.name,
            field_name: &field_def.name,
        };

        if let Some(kind) = ctx.interruption() {
            ctx.record(kind, interruption_message(kind, origin), &path);
            return null_or_bubble(&field_def.ty);
        }

        let args = match coerce_arguments(ctx, field_def, node) {
            Ok(args) => args,
            Err(message) => {
                ctx.record(FieldErrorKind::Coercion, message, &path);
                return null_or_bubble(&field_def.ty);
            }
        };

        let is_event_root = ctx.document.kind == OperationKind::Subscription
            && path.len() == 1
            && ctx.resolvers.find(&object_type.name, &field_def.name).is_none();

        let resolved = if is_event_root {
            Ok(Ok(parent.clone()))
        } else {
            let resolver_ctx = ResolverContext::new(
                &object_type.name,
                &field_def.name,
                path.clone(),
                ctx.document.kind,
                ctx.variables.clone(),
                ctx.resolver_token.clone(),
                ctx.app_data.clone(),
            );
            tracing::trace!(
                parent_type = %object_type.name,
                field = %field_def.name,
                "Resolving field"
            );
            let resolution: Resolution = match ctx.resolvers.find(&object_type.name, &field_def.name) {
                Some(resolver) => {
                    let resolver = resolver.clone();
                    let parent = parent.clone();
                    async move { resolver.resolve(&parent, &args, &resolver_ctx).await }.boxed()
                }
                None => futures::future::ready(Ok(DefaultPropertyResolver::lookup(
                    parent,
                    &field_def.name,
                )))
                .boxed(),
            };
            ctx.guard(resolution).await
        };

        match resolved {
            Ok(Ok(value)) => complete_value(ctx, origin, &field_def.ty, nodes, path, value).await,
            Ok(Err(err)) => {
                ctx.record(FieldErrorKind::Resolver, err.message, &path);
                null_or_bubble(&field_def.ty)
            }
            Err(kind) => {
                ctx.record(kind, interruption_message(kind, origin), &path);
                null_or_bubble(&field_def.ty)
            }
        }
    }
    .boxed()
}

/// Coerce a field's arguments, substituting variables and applying defaults
fn coerce_arguments(
    ctx: &ExecutionContext<'_>,
    field: &FieldDef,
    node: &SelectionNode,
) -> Result<Arguments, String> {
    let mut args = Arguments::new();
    for definition in &field.arguments {
        let provided = node
            .arguments
            .get(&definition.name)
            .and_then(|value| value.resolve(&ctx.variables));

        match provided.or_else(|| definition.default.clone()) {
            Some(value) => {
                let coerced = coerce_input(ctx.schema, &definition.ty, &value).map_err(|message| {
                    format!(
                        "Invalid value for argument '{}' of field '{}': {}",
                        definition.name, field.name, message
                    )
                })?;
                args.insert(definition.name.clone(), coerced);
            }
            None if definition.ty.is_non_null() => {
                return Err(format!(
                    "Argument '{}' of type '{}' is required but not provided",
                    definition.name, definition.ty
                ));
            }
            None => {}
        }
    }
    Ok(args)
}

/// Complete a resolved value against its declared type
///
/// Nullable positions absorb a bubbling `null`; Non-Null positions record
/// a null they receive and bubble it further.
fn complete_value<'a>(
    ctx: &'a ExecutionContext<'a>,
    origin: FieldOrigin<'a>,
    ty: &'a TypeRef,
    nodes: &'a [&'a SelectionNode],
    path: ResponsePath,
    value: Value,
) -> BoxFuture<'a, Completion> {
    async move {
        match ty {
            TypeRef::NonNull(inner) => {
                if value.is_null() {
                    ctx.record(
                        FieldErrorKind::NonNull,
                        format!(
                            "Cannot return null for non-nullable field {}.{}",
                            origin.parent_type, origin.field_name
                        ),
                        &path,
                    );
                    return Err(NullBubble);
                }
                complete_inner(ctx, origin, inner, nodes, path, value).await
            }
            _ if value.is_null() => Ok(Value::Null),
            _ => Ok(complete_inner(ctx, origin, ty, nodes, path, value)
                .await
                .unwrap_or(Value::Null)),
        }
    }
    .boxed()
}

/// Complete a non-null value of a list or named type
fn complete_inner<'a>(
    ctx: &'a ExecutionContext<'a>,
    origin: FieldOrigin<'a>,
    ty: &'a TypeRef,
    nodes: &'a [&'a SelectionNode],
    path: ResponsePath,
    value: Value,
) -> BoxFuture<'a, Completion> {
    async move {
        match ty {
            TypeRef::NonNull(_) => complete_value(ctx, origin, ty, nodes, path, value).await,
            TypeRef::List(item) => {
                let Value::Array(items) = value else {
                    ctx.record(
                        FieldErrorKind::Coercion,
                        format!(
                            "Expected a list for field {}.{}",
                            origin.parent_type, origin.field_name
                        ),
                        &path,
                    );
                    return Err(NullBubble);
                };
                let completed = join_all(items.into_iter().enumerate().map(|(index, item_value)| {
                    complete_value(ctx, origin, item, nodes, child_path(&path, index), item_value)
                }))
                .await;
                completed
                    .into_iter()
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            TypeRef::Named(name) => match ctx.schema.get_type(name) {
                Some(TypeDef::Object(object)) => {
                    complete_object(ctx, object, nodes, path, value).await
                }
                Some(TypeDef::Interface(_)) => {
                    let runtime = ctx.resolvers.resolve_abstract_type(name, &value);
                    match runtime.as_deref().and_then(|n| ctx.schema.get_type(n)) {
                        Some(TypeDef::Object(object))
                            if ctx.schema.is_possible_type(name, &object.name) =>
                        {
                            complete_object(ctx, object, nodes, path, value).await
                        }
                        _ => {
                            ctx.record(
                                FieldErrorKind::Coercion,
                                format!(
                                    "Could not determine the object type of interface '{}' for field {}.{}",
                                    name, origin.parent_type, origin.field_name
                                ),
                                &path,
                            );
                            Err(NullBubble)
                        }
                    }
                }
                Some(leaf) => coerce_output_leaf(leaf, &value).map_err(|message| {
                    ctx.record(FieldErrorKind::Coercion, message, &path);
                    NullBubble
                }),
                None => {
                    ctx.record(
                        FieldErrorKind::Coercion,
                        format!("Unknown type '{}'", name),
                        &path,
                    );
                    Err(NullBubble)
                }
            },
        }
    }
    .boxed()
}

fn complete_object<'a>(
    ctx: &'a ExecutionContext<'a>,
    object: &'a ObjectType,
    nodes: &'a [&'a SelectionNode],
    path: ResponsePath,
    value: Value,
) -> BoxFuture<'a, Completion> {
    let fields = collect_fields(
        ctx.schema,
        ctx.document,
        &object.name,
        nodes.iter().copied().flat_map(|node| node.selections.iter()),
        &ctx.variables,
    );
    execute_fields(ctx, object, value, fields, path, false)
}
