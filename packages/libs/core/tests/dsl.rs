//! 규칙 DSL 전체 흐름

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use stk_guard_core::{
    insecurely, insecurely_async, Action, Association, Constraint, Entity, FieldSpec, FieldValues,
    MemoryQuery, MemoryStore, Model, Restrictable, Row, Table,
};

type Dummies = Model<Option<String>, Row, MemoryStore>;

fn values(value: Value) -> FieldValues {
    value.as_object().cloned().unwrap()
}

fn dummies(store: Arc<MemoryStore>) -> Arc<Dummies> {
    let model = Model::new(
        Table::with_fields(
            "dummies",
            ["field1", "field2", "field3", "field4", "field5"],
        ),
        store,
    )
    .with_paranoid(false);

    model.protect_subject(|meta, user: &Option<String>| {
        let Some(user) = user else {
            return;
        };

        meta.scope(|q: MemoryQuery| q.limit(5));

        meta.can_all("view");
        meta.cannot("view", vec![FieldSpec::from(vec!["field5"]), FieldSpec::from("field4")]);

        meta.can(Action::Create, ["field1"]);
        meta.can(
            Action::Create,
            [
                ("field4", Constraint::from(0i64..5)),
                (
                    "field5",
                    Constraint::predicate(|x| x.as_i64() == Some(5)),
                ),
            ],
        );

        meta.can(Action::Update, "field1");
        if user == "root" {
            meta.can(Action::Destroy, ());
        }
    });

    Arc::new(model)
}

fn store() -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    for id in 1..=7 {
        store.insert_json(
            "dummies",
            json!({ "id": id, "field1": "one", "field2": 2, "field4": 1, "field5": 5 }),
        );
    }
    Arc::new(store)
}

#[test]
fn test_access_table() {
    let model = dummies(store());
    let meta = model.evaluate(&Some("user".to_string()), None);

    let read: Vec<_> = meta.granted(&Action::Read).unwrap().keys().cloned().collect();
    assert_eq!(read, vec!["field1", "field2", "field3", "id"]);

    let create = meta.granted(&Action::Create).unwrap();
    assert_eq!(create.len(), 3);
    assert_eq!(create["field1"], Constraint::Unconstrained);
    assert!(matches!(create["field5"], Constraint::Predicate(_)));

    assert!(meta.is_creatable(Some(&values(json!({ "field1": "x", "field4": 4, "field5": 5 })))));
    assert!(!meta.is_creatable(Some(&values(json!({ "field4": 5 })))));
    assert!(!meta.is_creatable(Some(&values(json!({ "field5": 4 })))));
    assert!(!meta.is_creatable(Some(&values(json!({ "field2": 1 })))));

    assert!(meta.is_updatable(None));
    assert!(!meta.is_destroyable());
    assert!(meta.is_scoped());
}

#[test]
fn test_nil_subject_gets_nothing() {
    let model = dummies(store());
    let meta = model.evaluate(&None, None);

    assert!(meta.access().is_empty());
    assert!(!meta.is_scoped());
    assert!(!meta.is_creatable(None));
    assert!(!meta.is_updatable(None));
    assert!(!meta.is_destroyable());
}

#[test]
fn test_relation_flow() {
    let model = dummies(store());
    let relation = model.restrict(Some("user".to_string()));

    assert_eq!(relation.count().unwrap(), 5);
    let rows = relation.fetch().unwrap();
    assert_eq!(rows.len(), 5);

    let row = &rows[0];
    assert!(row.is_bound());
    assert_eq!(row.read("field1"), Some(&json!("one")));
    assert_eq!(row.read("field4"), None);
    assert_eq!(row.read("field5"), None);
    assert!(!row.allows_destroy());

    let mut row = rows.into_iter().next().unwrap();
    row.entity_mut().assign("field2", json!(3));
    assert_eq!(row.validate().unwrap_err().field, "field2");

    let mut row = model.wrap(row.into_inner()).restrict(Some("root".to_string()));
    assert!(row.allows_destroy());
    row.entity_mut().mark_persisted();
    row.entity_mut().assign("field1", json!("changed"));
    assert_eq!(row.validate(), Ok(()));

    let created = relation.build(values(json!({ "field1": "new", "field4": 9 })));
    assert_eq!(created.validate().unwrap_err().field, "field4");
}

#[test]
fn test_rules_querying_other_models_do_not_recurse() {
    let store = store();
    let others = dummies(store.clone());
    let evaluations = Arc::new(AtomicUsize::new(0));

    let model: Dummies = Model::new(Table::with_fields("dummies", ["field1"]), store)
        .with_paranoid(false);
    let counter = evaluations.clone();
    model.protect_subject(move |meta, user: &Option<String>| {
        counter.fetch_add(1, Ordering::SeqCst);

        // 규칙 본문 안에서는 바인딩된 쿼리도 검사 없이 실행됨
        let visible = others.restrict(user.clone()).count().unwrap();
        if visible == 7 {
            meta.can_all(Action::Read);
        }
    });

    let meta = model.evaluate(&Some("user".to_string()), None);
    assert!(meta.is_readable("field1"));
    assert_eq!(evaluations.load(Ordering::SeqCst), 1);
}

#[test]
fn test_insecurely_nesting() {
    assert!(!stk_guard_core::insecure::is_active());

    insecurely(|| {
        insecurely(|| assert_eq!(stk_guard_core::insecure::depth(), 2));
        assert!(stk_guard_core::insecure::is_active());
    });

    assert!(!stk_guard_core::insecure::is_active());
}

#[test]
fn test_association_keeps_subject() {
    let store = store();
    store.insert_json("fluffies", json!({ "id": 1, "dummy_id": 1, "secret": "x" }));
    store.insert_json("fluffies", json!({ "id": 2, "dummy_id": 1, "secret": "y" }));

    let owners = dummies(store.clone());
    let fluffies: Arc<Dummies> = Arc::new(
        Model::new(Table::with_fields("fluffies", ["dummy_id", "secret"]), store)
            .with_paranoid(false),
    );
    fluffies.protect(|meta| meta.can(Action::Read, "dummy_id"));

    let assoc = Association::has_many("fluffies", fluffies, "dummy_id");
    let owner = owners
        .restrict(Some("user".to_string()))
        .filter_eq("id", &json!(1))
        .fetch()
        .unwrap()
        .remove(0);

    let children = assoc.for_owner(&owner).fetch().unwrap();
    assert_eq!(children.len(), 2);
    assert!(children.iter().all(|c| c.is_bound() && c.read("secret").is_none()));
}

#[tokio::test]
async fn test_async_trusted_mode() {
    let model = dummies(store());
    let relation = model.restrict(Some("user".to_string()));

    let count = insecurely_async(async { relation.count().unwrap() }).await;
    assert_eq!(count, 7);
    assert_eq!(relation.count().unwrap(), 5);
}
