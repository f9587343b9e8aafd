use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use graphql_executor::Configuration;
use graphql_executor::Context;
use graphql_executor::Document;
use graphql_executor::Executor;
use graphql_executor::ExecutorBuilder;
use graphql_executor::OperationKind;
use graphql_executor::Request;
use graphql_executor::Schema;
use graphql_executor::FieldResult;
use graphql_executor::ResolverInfo;
use graphql_executor::SerialStrategy;
use graphql_executor::json_ext::Object;
use graphql_executor::json_ext::Path;
use graphql_executor::json_ext::Value;
use graphql_executor::json_ext::ValueExt;
use graphql_executor::resolver::blocking;
use parking_lot::Mutex;
use serde_json_bytes::json;

const SCHEMA: &str = r#"
    type Query {
        fast: String
        slow: String
        items(count: Int!): [Item]
        race(label: String!, delay: Int!): String
        computed(input: Int!): Int
        stalled(label: String!): String
        exploding: String
        failing(label: String!, delay: Int!): String
    }

    type Mutation {
        step(label: String!, delay: Int!): String
    }

    type Item {
        index: Int
        detail: String
    }
"#;

/// Tracks how many resolvers run at the same time.
#[derive(Default)]
struct Gauge {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(current, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct Probes {
    gauge: Gauge,
    completed: Mutex<Vec<String>>,
}

async fn explode(_: ResolverInfo) -> FieldResult {
    panic!("resolver exploded")
}

fn schema(probes: Arc<Probes>) -> Schema {
    let mut schema = Schema::parse(SCHEMA).unwrap();

    let step = {
        let probes = probes.clone();
        move |info: graphql_executor::ResolverInfo| {
            let probes = probes.clone();
            async move {
                let label: String = info.argument("label")?.unwrap_or_default();
                let delay: u64 = info.argument("delay")?.unwrap_or_default();
                tokio::time::sleep(Duration::from_millis(delay)).await;
                probes.completed.lock().push(label.clone());
                Ok(Value::String(label.into()))
            }
        }
    };

    schema
        .register_resolver("Query", "fast", |_| async { Ok(json!("fast")) })
        .unwrap()
        .register_resolver("Query", "slow", |_| async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(json!("slow"))
        })
        .unwrap()
        .register_resolver("Query", "items", |info| async move {
            let count: usize = info.argument("count")?.unwrap_or_default();
            Ok(Value::Array(
                (0..count).map(|index| json!({ "index": index })).collect(),
            ))
        })
        .unwrap()
        .register_resolver("Item", "detail", move |info| {
            let probes = probes.clone();
            async move {
                let index = info
                    .parent
                    .as_object()
                    .and_then(|item| item.get("index"))
                    .and_then(Value::as_u64)
                    .unwrap_or_default();
                probes.gauge.enter();
                tokio::time::sleep(Duration::from_millis(10 + (8 - index.min(8)) * 2)).await;
                probes.gauge.exit();
                Ok(Value::String(format!("detail-{index}").into()))
            }
        })
        .unwrap()
        .register_resolver("Query", "race", step.clone())
        .unwrap()
        .register_resolver("Mutation", "step", step)
        .unwrap()
        .register_resolver(
            "Query",
            "computed",
            blocking(|info| {
                let input: i64 = info.argument("input")?.unwrap_or_default();
                std::thread::sleep(Duration::from_millis(5));
                Ok(json!(input * 2))
            }),
        )
        .unwrap()
        // blocks its worker thread without going through `blocking`
        .register_resolver("Query", "stalled", |info| async move {
            let label: String = info.argument("label")?.unwrap_or_default();
            std::thread::sleep(Duration::from_millis(150));
            Ok(Value::String(label.into()))
        })
        .unwrap()
        .register_resolver("Query", "exploding", explode)
        .unwrap()
        .register_resolver("Query", "failing", |info| async move {
            let label: String = info.argument("label")?.unwrap_or_default();
            let delay: u64 = info.argument("delay")?.unwrap_or_default();
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Err(format!("{label} failed").into())
        })
        .unwrap();
    schema
}

fn key<'a>(value: &'a Value, name: &str) -> &'a Value {
    value.as_object().and_then(|object| object.get(name)).unwrap()
}

fn builder(probes: Arc<Probes>) -> ExecutorBuilder {
    Executor::builder().schema(schema(probes))
}

async fn run(executor: &Executor, query: &str, context: Context) -> graphql_executor::Response {
    executor
        .execute_request(Request::from_query(query), context)
        .await
        .unwrap()
}

const NESTED_QUERY: &str = "{ slow fast items(count: 6) { index detail } computed(input: 21) }";

#[tokio::test]
async fn serial_and_concurrent_strategies_produce_identical_data() {
    let concurrent = builder(Arc::default()).build().unwrap();
    let serial = builder(Arc::default())
        .strategy(OperationKind::Query, SerialStrategy)
        .nested_strategy(SerialStrategy)
        .build()
        .unwrap();

    let concurrent = run(&concurrent, NESTED_QUERY, Context::new()).await;
    let serial = run(&serial, NESTED_QUERY, Context::new()).await;

    assert!(concurrent.errors.is_empty(), "{:?}", concurrent.errors);
    assert_eq!(concurrent.to_json().unwrap(), serial.to_json().unwrap());
    let concurrent = concurrent.data.unwrap();
    assert!(concurrent.eq_and_ordered(&serial.data.unwrap()));
    assert_eq!(key(&concurrent, "computed"), &json!(42));
}

#[tokio::test]
async fn mutation_root_fields_run_in_selection_order() {
    let probes = Arc::new(Probes::default());
    let executor = builder(probes.clone()).build().unwrap();

    let response = run(
        &executor,
        r#"mutation {
            a: step(label: "a", delay: 60)
            b: step(label: "b", delay: 30)
            c: step(label: "c", delay: 0)
        }"#,
        Context::new(),
    )
    .await;

    assert_eq!(response.data, Some(json!({"a": "a", "b": "b", "c": "c"})));
    assert_eq!(*probes.completed.lock(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn query_root_fields_complete_concurrently_but_keep_selection_order() {
    let probes = Arc::new(Probes::default());
    let executor = builder(probes.clone()).build().unwrap();

    let response = run(
        &executor,
        r#"{
            a: race(label: "a", delay: 60)
            b: race(label: "b", delay: 30)
            c: race(label: "c", delay: 0)
        }"#,
        Context::new(),
    )
    .await;

    assert_eq!(
        response.to_json().unwrap(),
        r#"{"data":{"a":"a","b":"b","c":"c"}}"#
    );
    assert_eq!(*probes.completed.lock(), vec!["c", "b", "a"]);
}

#[tokio::test]
async fn in_flight_resolvers_are_capped() {
    let probes = Arc::new(Probes::default());
    let executor = builder(probes.clone())
        .configuration(
            Configuration::builder()
                .max_in_flight_resolvers(2usize)
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();

    let response = run(&executor, "{ items(count: 8) { detail } }", Context::new()).await;

    let data = response.data.unwrap();
    assert_eq!(key(&data, "items").as_array().unwrap().len(), 8);
    let max = probes.gauge.max.load(Ordering::SeqCst);
    assert!((1..=2).contains(&max), "max in flight was {max}");
}

#[tokio::test]
async fn sibling_fan_out_is_bounded_by_max_concurrency() {
    let probes = Arc::new(Probes::default());
    let executor = builder(probes.clone())
        .configuration(Configuration::builder().max_concurrency(3usize).build().unwrap())
        .build()
        .unwrap();

    run(&executor, "{ items(count: 8) { detail } }", Context::new()).await;

    let max = probes.gauge.max.load(Ordering::SeqCst);
    assert!((2..=3).contains(&max), "max in flight was {max}");
}

#[tokio::test]
async fn fields_scheduled_after_the_deadline_time_out() {
    let executor = builder(Arc::default())
        .strategy(OperationKind::Query, SerialStrategy)
        .build()
        .unwrap();

    let context = Context::new().with_timeout(Duration::from_millis(50));
    let response = run(&executor, "{ slow fast }", context).await;

    assert_eq!(response.data, Some(json!({"slow": "slow", "fast": null})));
    assert_eq!(response.errors.len(), 1);
    assert_eq!(
        response.errors[0].extension_code().as_deref(),
        Some("TIMEOUT")
    );
    assert_eq!(response.errors[0].path, Some(Path::from(vec!["fast"])));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn prepared_query_is_shared_across_tasks() {
    let executor = builder(Arc::default()).build().unwrap();
    let prepared = executor.prepare(
        Document::parse("query Q($n: Int!) { computed(input: $n) items(count: $n) { index } }")
            .unwrap(),
    );

    let handles = (0..8)
        .map(|n| {
            let prepared = prepared.clone();
            tokio::spawn(async move {
                let mut variables = Object::new();
                variables.insert("n", json!(n));
                prepared.execute(variables, Context::new(), None).await
            })
        })
        .collect::<Vec<_>>();

    for (n, handle) in handles.into_iter().enumerate() {
        let response = handle.await.unwrap().unwrap();
        let data = response.data.unwrap();
        assert_eq!(key(&data, "computed"), &json!(n * 2));
        assert_eq!(key(&data, "items").as_array().unwrap().len(), n);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn blocking_siblings_run_in_parallel() {
    let executor = builder(Arc::default()).build().unwrap();

    let started = std::time::Instant::now();
    let response = run(
        &executor,
        r#"{ a: stalled(label: "a") b: stalled(label: "b") c: stalled(label: "c") }"#,
        Context::new(),
    )
    .await;
    let elapsed = started.elapsed();

    assert_eq!(
        response.to_json().unwrap(),
        r#"{"data":{"a":"a","b":"b","c":"c"}}"#
    );
    assert!(
        elapsed < Duration::from_millis(400),
        "siblings ran one after another: {elapsed:?}"
    );
}

#[tokio::test]
async fn panicking_resolver_only_nulls_its_field() {
    let executor = builder(Arc::default()).build().unwrap();

    let response = run(&executor, "{ fast exploding }", Context::new()).await;

    assert_eq!(
        response.data,
        Some(json!({"fast": "fast", "exploding": null}))
    );
    assert_eq!(response.errors.len(), 1);
    assert_eq!(
        response.errors[0].path,
        Some(Path::from(vec!["exploding"]))
    );
    assert!(
        response.errors[0]
            .message
            .starts_with("Resolver for field \"Query.exploding\" failed"),
        "{}",
        response.errors[0].message
    );
}

#[tokio::test]
async fn errors_follow_selection_order_whatever_the_completion_order() {
    let query = r#"{
        a: failing(label: "a", delay: 60)
        fast
        b: failing(label: "b", delay: 30)
        c: failing(label: "c", delay: 0)
    }"#;
    let concurrent = builder(Arc::default()).build().unwrap();
    let serial = builder(Arc::default())
        .strategy(OperationKind::Query, SerialStrategy)
        .build()
        .unwrap();

    let concurrent = run(&concurrent, query, Context::new()).await;
    let serial = run(&serial, query, Context::new()).await;

    let messages = concurrent
        .errors
        .iter()
        .map(|error| error.message.as_str())
        .collect::<Vec<_>>();
    assert_eq!(messages, vec!["a failed", "b failed", "c failed"]);
    assert_eq!(concurrent.to_json().unwrap(), serial.to_json().unwrap());
}
