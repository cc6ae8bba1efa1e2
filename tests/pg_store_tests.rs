use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use sqlx::PgPool;
use testcontainers_modules::{postgres, testcontainers};
use todo_api::routes::times::TimeEntryDraft;
use todo_api::routes::todos::TodoDraft;
use todo_api::store::{PgStore, Store, StoreError};

mod common;

pub struct TestContext {
    #[allow(dead_code)] // container is kept to ensure it's not dropped
    pub container: testcontainers::ContainerAsync<postgres::Postgres>,
    pub store: PgStore,
    pub pool: PgPool,
}

async fn setup() -> anyhow::Result<TestContext> {
    // Allow multiple calls to init for tests.
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let container = common::setup_container().await?;
    let url = common::database_url(&container).await?;
    let store = PgStore::connect(&url, 5).await?;
    let pool = PgPool::connect(&url).await?;
    Ok(TestContext {
        container,
        store,
        pool,
    })
}

fn may_first() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
}

fn entry_for(todo: i64, minutes_spent: i32) -> TimeEntryDraft {
    TimeEntryDraft {
        todo,
        week_start_date: may_first(),
        minutes_spent,
    }
}

#[tokio::test]
async fn todos_are_stored_in_id_order_and_replaced_on_update() {
    let ctx = setup().await.expect("Failed to setup test context");
    let store = &ctx.store;

    let mut draft = TodoDraft::new("first", may_first());
    draft.completed = true;
    draft.description = "notes".to_string();
    let first = store.insert_todo(draft).await.unwrap();
    let second = store.insert_todo(TodoDraft::new("second", may_first())).await.unwrap();
    assert_eq!((first.id, second.id), (1, 2));

    let listed = store.list_todos().await.unwrap();
    assert_eq!(listed, vec![first.clone(), second]);

    let updated = store
        .update_todo(first.id, TodoDraft::new("first again", may_first()))
        .await
        .unwrap();
    assert_eq!(updated.title, "first again");
    assert!(!updated.completed);
    assert_eq!(updated.description, "");
    assert_eq!(updated.created_at, first.created_at);
    assert_eq!(store.get_todo(first.id).await.unwrap(), updated);

    assert!(matches!(
        store.get_todo(999).await,
        Err(StoreError::NotFound { entity: "Todo", id: 999 })
    ));
    assert!(matches!(
        store.update_todo(999, TodoDraft::new("x", may_first())).await,
        Err(StoreError::NotFound { .. })
    ));
    assert!(matches!(
        store.delete_todo(999).await,
        Err(StoreError::NotFound { .. })
    ));
}

#[tokio::test]
async fn time_entry_for_unknown_todo_is_missing_todo() {
    let ctx = setup().await.expect("Failed to setup test context");
    let store = &ctx.store;

    assert!(matches!(
        store.insert_time_entry(entry_for(999, 30)).await,
        Err(StoreError::MissingTodo(999))
    ));

    let todo = store.insert_todo(TodoDraft::new("a", may_first())).await.unwrap();
    let entry = store.insert_time_entry(entry_for(todo.id, 30)).await.unwrap();
    assert!(matches!(
        store.update_time_entry(entry.id, entry_for(999, 45)).await,
        Err(StoreError::MissingTodo(999))
    ));
    assert_eq!(store.get_time_entry(entry.id).await.unwrap(), entry);

    assert!(matches!(
        store.update_time_entry(999, entry_for(todo.id, 45)).await,
        Err(StoreError::NotFound { entity: "TimeEntry", id: 999 })
    ));
}

#[tokio::test]
async fn deleting_a_todo_cascades_to_its_time_entries() {
    let ctx = setup().await.expect("Failed to setup test context");
    let store = &ctx.store;

    let keep = store.insert_todo(TodoDraft::new("keep", may_first())).await.unwrap();
    let gone = store.insert_todo(TodoDraft::new("gone", may_first())).await.unwrap();
    store.insert_time_entry(entry_for(gone.id, 10)).await.unwrap();
    store.insert_time_entry(entry_for(gone.id, 20)).await.unwrap();
    let kept_entry = store.insert_time_entry(entry_for(keep.id, 30)).await.unwrap();

    store.delete_todo(gone.id).await.unwrap();

    assert_eq!(store.list_time_entries().await.unwrap(), vec![kept_entry]);
    assert!(matches!(
        store.time_entries_for_todo(gone.id).await,
        Err(StoreError::NotFound { entity: "Todo", .. })
    ));
}

#[tokio::test]
async fn delete_time_entries_for_todo_reports_count() {
    let ctx = setup().await.expect("Failed to setup test context");
    let store = &ctx.store;

    let a = store.insert_todo(TodoDraft::new("a", may_first())).await.unwrap();
    let b = store.insert_todo(TodoDraft::new("b", may_first())).await.unwrap();
    store.insert_time_entry(entry_for(a.id, 10)).await.unwrap();
    store.insert_time_entry(entry_for(a.id, 20)).await.unwrap();
    store.insert_time_entry(entry_for(b.id, 30)).await.unwrap();

    assert_eq!(store.delete_time_entries_for_todo(a.id).await.unwrap(), 2);
    assert!(store.time_entries_for_todo(a.id).await.unwrap().is_empty());
    assert_eq!(store.time_entries_for_todo(b.id).await.unwrap().len(), 1);
    assert_eq!(store.delete_time_entries_for_todo(a.id).await.unwrap(), 0);
    assert!(matches!(
        store.delete_time_entries_for_todo(999).await,
        Err(StoreError::NotFound { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_never_share_a_todo() {
    let ctx = setup().await.expect("Failed to setup test context");
    let store = Arc::new(ctx.store.clone());
    let now = Utc::now();

    for i in 0..50 {
        let mut draft = TodoDraft::new(format!("due {i}"), may_first());
        draft.notify_time = Some(now - Duration::minutes(i));
        store.insert_todo(draft).await.unwrap();
    }
    let mut later = TodoDraft::new("later", may_first());
    later.notify_time = Some(now + Duration::hours(1));
    let later = store.insert_todo(later).await.unwrap();

    let (first, second) = tokio::join!(
        tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.claim_due_notifications(now).await.unwrap() }
        }),
        tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.claim_due_notifications(now).await.unwrap() }
        }),
    );
    let (first, second) = (first.unwrap(), second.unwrap());

    let ids: BTreeSet<i64> = first.iter().chain(&second).map(|todo| todo.id).collect();
    assert_eq!(first.len() + second.len(), 50);
    assert_eq!(ids.len(), 50);
    assert!(!ids.contains(&later.id));
    assert!(first.iter().chain(&second).all(|todo| todo.delivered));
    assert!(first.windows(2).all(|pair| pair[0].id < pair[1].id));

    assert!(store.claim_due_notifications(now).await.unwrap().is_empty());
    assert!(!store.get_todo(later.id).await.unwrap().delivered);
}

#[tokio::test]
async fn corrupt_rows_surface_as_invalid_row() {
    let ctx = setup().await.expect("Failed to setup test context");
    let store = &ctx.store;
    let todo = store.insert_todo(TodoDraft::new("a", may_first())).await.unwrap();

    sqlx::query("ALTER TABLE todos DROP CONSTRAINT todos_todo_type_check")
        .execute(&ctx.pool)
        .await
        .unwrap();
    sqlx::query("UPDATE todos SET todo_type = 'CHORE' WHERE id = $1")
        .bind(todo.id)
        .execute(&ctx.pool)
        .await
        .unwrap();

    assert!(matches!(
        store.get_todo(todo.id).await,
        Err(StoreError::InvalidRow(_))
    ));
    assert!(matches!(
        store.list_todos().await,
        Err(StoreError::InvalidRow(_))
    ));
}
