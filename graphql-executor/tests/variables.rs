use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use graphql_executor::Context;
use graphql_executor::Document;
use graphql_executor::Executor;
use graphql_executor::Schema;
use graphql_executor::error::ExecutionError;
use graphql_executor::error::VariableError;
use graphql_executor::json_ext::Object;
use graphql_executor::json_ext::Value;
use serde_json_bytes::json;

const SCHEMA: &str = r#"
    type Query {
        item(id: Int): Item
        search(filter: Filter): String
        visits: Int
    }

    type Item {
        id: Int
        name: String
    }

    enum Order {
        ASC
        DESC
    }

    input Filter {
        term: String!
        limit: Int = 10
        order: Order
    }
"#;

struct Fixture {
    executor: Executor,
    resolved: Arc<AtomicUsize>,
}

fn fixture() -> Fixture {
    let resolved = Arc::new(AtomicUsize::new(0));
    let mut schema = Schema::parse(SCHEMA).unwrap();
    let counter = resolved.clone();
    schema
        .register_resolver("Query", "item", move |info| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                let id: Option<i64> = info.argument("id")?;
                let name = match id {
                    Some(id) => format!("item-{id}"),
                    None => "item-none".to_string(),
                };
                Ok(json!({"id": id, "name": name}))
            }
        })
        .unwrap()
        .register_resolver("Query", "search", |info| async move {
            let filter = info
                .arguments
                .get("filter")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            let term = filter.get("term").and_then(Value::as_str).unwrap_or_default();
            let limit = filter.get("limit").and_then(Value::as_i64).unwrap_or_default();
            let order = filter.get("order").and_then(Value::as_str).unwrap_or("none");
            Ok(Value::String(format!("{term}:{limit}:{order}").into()))
        })
        .unwrap()
        .register_resolver("Query", "visits", |info| async move {
            info.context
                .upsert("visits", |visits: i64| visits + 1, || 0)?;
            let visits: Option<i64> = info.context.get("visits")?;
            Ok(json!(visits))
        })
        .unwrap();

    Fixture {
        executor: Executor::builder().schema(schema).build().unwrap(),
        resolved,
    }
}

fn variables(value: Value) -> Object {
    value.as_object().cloned().unwrap_or_default()
}

#[tokio::test]
async fn default_value_applies_when_variable_is_absent() {
    let fixture = fixture();
    let prepared = fixture
        .executor
        .prepare(Document::parse("query Q($id: Int = 1){ item(id: $id){ name } }").unwrap());

    let response = prepared
        .execute(Object::new(), Context::new(), None)
        .await
        .unwrap();
    assert_eq!(response.data, Some(json!({"item": {"name": "item-1"}})));

    let response = prepared
        .execute(variables(json!({"id": 5})), Context::new(), None)
        .await
        .unwrap();
    assert_eq!(response.data, Some(json!({"item": {"name": "item-5"}})));

    // an explicit null overrides the default of a nullable variable
    let response = prepared
        .execute(variables(json!({"id": null})), Context::new(), None)
        .await
        .unwrap();
    assert_eq!(response.data, Some(json!({"item": {"name": "item-none"}})));
}

#[tokio::test]
async fn absent_nullable_variable_is_not_bound() {
    let fixture = fixture();
    let response = fixture
        .executor
        .prepare(
            Document::parse("query Q($id: Int){ item(id: $id){ name } }").unwrap(),
        )
        .execute(Object::new(), Context::new(), None)
        .await
        .unwrap();
    assert_eq!(response.data, Some(json!({"item": {"name": "item-none"}})));
}

#[tokio::test]
async fn missing_required_variable_fails_before_any_resolver() {
    let fixture = fixture();
    let prepared = fixture
        .executor
        .prepare(Document::parse("query Q($id: Int!){ item(id: $id){ name } }").unwrap());

    for provided in [json!({}), json!({"id": null})] {
        let err = prepared
            .execute(variables(provided), Context::new(), None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ExecutionError::Variables(vec![VariableError::Missing {
                name: "id".to_string(),
                ty: "Int!".to_string(),
            }])
        );
        let response = err.to_response();
        assert!(response.data.is_none());
        assert_eq!(
            response.errors[0].message,
            "Variable \"$id\" of required type \"Int!\" was not provided or can't be null"
        );
    }
    assert_eq!(fixture.resolved.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn every_variable_error_is_reported() {
    let fixture = fixture();
    let prepared = fixture.executor.prepare(
        Document::parse(
            "query Q($id: Int!, $filter: Filter!, $other: Int) { item(id: $id) { name } search(filter: $filter) }",
        )
        .unwrap(),
    );

    let err = prepared
        .execute(
            variables(json!({"filter": {"limit": 2}, "other": "three"})),
            Context::new(),
            None,
        )
        .await
        .unwrap_err();
    let errors = match err {
        ExecutionError::Variables(errors) => errors,
        other => panic!("expected variable errors, got {other:?}"),
    };
    assert_eq!(
        errors.iter().map(VariableError::name).collect::<Vec<_>>(),
        vec!["id", "filter", "other"]
    );
    assert!(errors[0].is_missing());
    assert_eq!(errors[1].ty(), "Filter!");
    assert!(!errors[1].is_missing());
    assert_eq!(errors[2].reason(), "is not a valid Int");
    assert_eq!(fixture.resolved.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn input_objects_are_coerced_with_defaults() {
    let fixture = fixture();
    let prepared = fixture
        .executor
        .prepare(Document::parse("query Q($filter: Filter!) { search(filter: $filter) }").unwrap());

    let response = prepared
        .execute(variables(json!({"filter": {"term": "x"}})), Context::new(), None)
        .await
        .unwrap();
    assert_eq!(response.data, Some(json!({"search": "x:10:none"})));

    let response = prepared
        .execute(
            variables(json!({"filter": {"term": "y", "limit": 3, "order": "DESC"}})),
            Context::new(),
            None,
        )
        .await
        .unwrap();
    assert_eq!(response.data, Some(json!({"search": "y:3:DESC"})));

    let err = prepared
        .execute(
            variables(json!({"filter": {"term": "y", "order": "SIDEWAYS"}})),
            Context::new(),
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutionError::Variables(ref errors) if errors.len() == 1));
}

#[tokio::test]
async fn literal_arguments_reference_variables() {
    let fixture = fixture();
    let response = fixture
        .executor
        .prepare(
            Document::parse(
                r#"query Q($term: String!) { search(filter: {term: $term, order: ASC}) }"#,
            )
            .unwrap(),
        )
        .execute(variables(json!({"term": "lit"})), Context::new(), None)
        .await
        .unwrap();
    assert_eq!(response.data, Some(json!({"search": "lit:10:ASC"})));
}

#[tokio::test]
async fn executions_do_not_share_state() {
    let fixture = fixture();
    let prepared = fixture.executor.prepare(
        Document::parse("query Q($id: Int) { visits item(id: $id) { name } }").unwrap(),
    );

    let first_context = Context::new();
    let second_context = Context::new();
    second_context.insert("visits", 41).unwrap();

    let (first, second) = futures::join!(
        prepared.execute(variables(json!({"id": 1})), first_context.clone(), None),
        prepared.execute(variables(json!({"id": 2})), second_context.clone(), None),
    );
    assert_eq!(
        first.unwrap().data,
        Some(json!({"visits": 1, "item": {"name": "item-1"}}))
    );
    assert_eq!(
        second.unwrap().data,
        Some(json!({"visits": 42, "item": {"name": "item-2"}}))
    );

    let again = prepared
        .execute(Object::new(), Context::new(), None)
        .await
        .unwrap();
    assert_eq!(
        again.data,
        Some(json!({"visits": 1, "item": {"name": "item-none"}}))
    );
    assert_eq!(first_context.get::<_, i64>("visits").unwrap(), Some(1));
}
