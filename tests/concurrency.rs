//! Racing writers: the version a writer observed decides who wins.

mod common;

use common::{add_asset, registry, TABLE, USER};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use vellum::config::{CommitMode, ConnectorConfig};
use vellum::graph::{now_micros, Classification, PropertyValue};
use vellum::repository::{ErrorKind, RepositoryError};
use vellum::storage::{DocumentStore, OpenStore, SqliteStore};
use vellum::txn::{Expect, Mutation, TransactionEngine, TxError};
use vellum::RepositoryConnector;

fn shared() -> (RepositoryConnector, TransactionEngine) {
    let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    let connector = RepositoryConnector::with_store(
        ConnectorConfig::in_memory("race"),
        registry(),
        Arc::clone(&store),
    )
    .unwrap();
    let engine = TransactionEngine::new(store, CommitMode::Synchronous, Duration::from_secs(5));
    (connector, engine)
}

#[tokio::test]
async fn writers_with_the_same_version_yield_one_conflict() {
    let (connector, engine) = shared();
    let table = add_asset(&connector, TABLE, "db.t").await;
    let classified = connector
        .classify_entity(USER, table.guid(), "Confidential", HashMap::new())
        .await
        .unwrap()
        .unwrap();
    let expect = || Expect::new(classified.guid().clone(), classified.version(), "bob");

    let (a, b) = tokio::join!(
        engine.transact(Mutation::UpdateEntityClassification {
            expect: expect(),
            name: "Confidential".into(),
            properties: HashMap::from([("level".to_string(), PropertyValue::from(2i64))]),
        }),
        engine.transact(Mutation::DeclassifyEntity {
            expect: expect(),
            name: "Confidential".into(),
        }),
    );

    let outcomes = [a, b];
    let conflicts: Vec<RepositoryError> = outcomes
        .into_iter()
        .filter_map(Result::err)
        .map(|e| RepositoryError::from_tx("race", Some(classified.guid()), e))
        .collect();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].kind(), ErrorKind::InstanceConflict);
    assert!(conflicts[0].is_retryable());

    let current = connector
        .get_entity_detail(USER, table.guid(), None)
        .unwrap();
    assert_eq!(current.version(), classified.version() + 1);
}

#[tokio::test]
async fn stale_expected_version_is_rejected() {
    let (connector, engine) = shared();
    let table = add_asset(&connector, TABLE, "db.t").await;
    connector
        .classify_entity(USER, table.guid(), "Confidential", HashMap::new())
        .await
        .unwrap();

    let stale = Expect::new(table.guid().clone(), table.version(), "bob");
    let err = engine
        .transact(Mutation::ClassifyEntity {
            expect: stale,
            classification: Classification::new("Other", "t-other", "bob", now_micros()),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, TxError::Aborted(_)));
    assert_eq!(
        RepositoryError::from_tx("classify_entity", Some(table.guid()), err).kind(),
        ErrorKind::InstanceConflict
    );
}

#[tokio::test]
async fn concurrent_connector_writes_never_lose_updates() {
    let (connector, _engine) = shared();
    let table = add_asset(&connector, TABLE, "db.t").await;

    let (a, b) = tokio::join!(
        connector.classify_entity(USER, table.guid(), "Confidential", HashMap::new()),
        connector.update_entity_status(USER, table.guid(), vellum::InstanceStatus::Draft),
    );
    let succeeded = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count() as u64;
    for err in [a.err(), b.err()].into_iter().flatten() {
        assert_eq!(err.kind(), ErrorKind::InstanceConflict);
    }
    assert!(succeeded >= 1);

    let current = connector
        .get_entity_detail(USER, table.guid(), None)
        .unwrap();
    assert_eq!(current.version(), 1 + succeeded);
}

#[tokio::test]
async fn async_commit_writes_show_up_once_indexed() {
    let connector = RepositoryConnector::open(
        ConnectorConfig::in_memory("async").with_commit_mode(CommitMode::Asynchronous),
        registry(),
    )
    .unwrap();
    let added = connector
        .add_entity(
            USER,
            vellum::NewEntity::of_type(TABLE).with_property("qualifiedName", "db.async"),
        )
        .await
        .unwrap();
    assert!(added.is_none());

    connector.await_indexed().await.unwrap();
    let found = connector
        .find_entities(USER, &vellum::FindRequest::new().of_type(TABLE))
        .unwrap();
    assert_eq!(found.len(), 1);
}

#[test]
fn writers_on_separate_threads_keep_every_committed_update() {
    const THREADS: usize = 6;
    const ATTEMPTS: usize = 20;

    let (connector, _engine) = shared();
    let runtime = || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    };
    let table = runtime().block_on(add_asset(&connector, TABLE, "db.shared"));

    let committed: usize = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..THREADS)
            .map(|t| {
                let connector = &connector;
                let guid = table.guid().clone();
                scope.spawn(move || {
                    let rt = runtime();
                    let mut ok = 0;
                    for i in 0..ATTEMPTS {
                        let props = HashMap::from([
                            ("qualifiedName".to_string(), PropertyValue::from("db.shared")),
                            (
                                "description".to_string(),
                                PropertyValue::from(format!("thread {} write {}", t, i)),
                            ),
                        ]);
                        match rt.block_on(connector.update_entity_properties(USER, &guid, props)) {
                            Ok(_) => ok += 1,
                            Err(e) => assert_eq!(e.kind(), ErrorKind::InstanceConflict),
                        }
                    }
                    ok
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).sum()
    });

    assert!(committed >= 1);
    let current = connector
        .get_entity_detail(USER, table.guid(), None)
        .unwrap();
    assert_eq!(current.version(), 1 + committed as u64);
    let history = connector
        .get_entity_detail_history(
            USER,
            table.guid(),
            None,
            None,
            vellum::HistoryOrder::Forward,
        )
        .unwrap();
    assert_eq!(history.len(), 1 + committed);
}
