//! Fixtures and backend-independent repository checks.
//!
//! Each check takes a unit-of-work factory over an empty store, so the same
//! assertions run against the SQL and the document backend.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use common::AppError;
use domain::{
    Entity, Identity, Label, Operator, Pagination, Query, SortDirection, Task, TaskField,
    TaskStatus,
};
use persistence::{Repository, TaskFinder, UnitOfWork, UnitOfWorkFactory};

pub const OWNER: &str = "0b6d3c4e-5f7a-4b8c-9d0e-1f2a3b4c5d6e";

// =============================================================================
// Fixtures
// =============================================================================

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

fn task(title: &str, priority: i32, status: TaskStatus, labels: &[&str], minute: i64) -> Task {
    let mut task = Task::new(title, "", status, priority, OWNER).unwrap();
    task.label_ids = labels.iter().map(|label| label.to_string()).collect();
    task.created_at = base_time() + Duration::minutes(minute);
    task
}

/// Five tasks with distinct creation times and a repeated priority.
pub fn task_fixtures() -> Vec<Task> {
    vec![
        task("Buy milk", 1, TaskStatus::Draft, &["home"], 0),
        task("Write report", 3, TaskStatus::ToDo, &["work"], 1),
        task("Milk the cows", 5, TaskStatus::InProgress, &["home", "farm"], 2),
        task("Call plumber", 3, TaskStatus::ToDo, &[], 3),
        task("File taxes", 2, TaskStatus::Done, &["home"], 4),
    ]
}

pub async fn seed_tasks<F: UnitOfWorkFactory>(factory: &F) -> Vec<Task> {
    let uow = factory.create();
    let tasks = uow.tasks().add_many(task_fixtures()).await.unwrap();
    assert_eq!(uow.save_changes().await.unwrap(), 5);
    tasks
}

fn titles(tasks: &[Task]) -> Vec<String> {
    let mut titles: Vec<String> = tasks.iter().map(|task| task.title.clone()).collect();
    titles.sort();
    titles
}

fn expected(titles: &[&str]) -> Vec<String> {
    let mut titles: Vec<String> = titles.iter().map(|title| title.to_string()).collect();
    titles.sort();
    titles
}

async fn matching<F: UnitOfWorkFactory>(factory: &F, query: Query<TaskField>) -> Vec<String> {
    let page = factory.create().tasks().query(&query).await.unwrap();
    assert_eq!(page.total_count as usize, page.items.len());
    titles(&page.items)
}

// =============================================================================
// Checks
// =============================================================================

pub async fn add_assigns_identity_and_get_reads_back<F: UnitOfWorkFactory>(factory: &F) {
    let uow = factory.create();
    let added = uow
        .tasks()
        .add(task("Plan sprint", 2, TaskStatus::ToDo, &["work", "team"], 0))
        .await
        .unwrap();
    assert!(!added.identity().is_transient());
    assert_eq!(uow.pending_operations(), 1);
    assert_eq!(uow.save_changes().await.unwrap(), 1);
    assert_eq!(uow.pending_operations(), 0);

    let stored = factory.create().tasks().get(added.id()).await.unwrap().unwrap();
    assert_eq!(stored.id, added.id);
    assert_eq!(stored.title, "Plan sprint");
    assert_eq!(stored.status, TaskStatus::ToDo);
    assert_eq!(stored.priority, 2);
    assert_eq!(stored.label_ids, vec!["work".to_string(), "team".to_string()]);
    assert_eq!(stored.created_by, OWNER);
    assert!(stored.is_active);
    assert_eq!(stored.created_at, added.created_at);
}

pub async fn get_misses_return_none<F: UnitOfWorkFactory>(factory: &F) {
    let uow = factory.create();
    let missing = uuid::Uuid::new_v4().to_string();
    assert!(uow.tasks().get(&missing).await.unwrap().is_none());
    assert!(matches!(
        uow.tasks().get("not-an-id").await,
        Err(AppError::InvalidArgument(_))
    ));
}

pub async fn adding_persisted_entity_is_rejected<F: UnitOfWorkFactory>(factory: &F) {
    let uow = factory.create();
    let mut existing = task("Already stored", 1, TaskStatus::Draft, &[], 0);
    existing.id = Identity::persisted(uuid::Uuid::new_v4().to_string());
    assert!(matches!(
        uow.tasks().add(existing).await,
        Err(AppError::InvalidArgument(_))
    ));
}

pub async fn every_operator_selects_expected_rows<F: UnitOfWorkFactory>(factory: &F) {
    seed_tasks(factory).await;
    let q = Query::<TaskField>::new;

    assert_eq!(
        matching(factory, q().filter(TaskField::Priority, Operator::Eq, 3).unwrap()).await,
        expected(&["Write report", "Call plumber"])
    );
    assert_eq!(
        matching(factory, q().filter(TaskField::Priority, Operator::Ne, 3).unwrap()).await,
        expected(&["Buy milk", "Milk the cows", "File taxes"])
    );
    assert_eq!(
        matching(factory, q().filter(TaskField::Priority, Operator::Lt, 3).unwrap()).await,
        expected(&["Buy milk", "File taxes"])
    );
    assert_eq!(
        matching(factory, q().filter(TaskField::Priority, Operator::Lte, 2).unwrap()).await,
        expected(&["Buy milk", "File taxes"])
    );
    assert_eq!(
        matching(factory, q().filter(TaskField::Priority, Operator::Gt, 3).unwrap()).await,
        expected(&["Milk the cows"])
    );
    assert_eq!(
        matching(factory, q().filter(TaskField::Priority, Operator::Gte, 3).unwrap()).await,
        expected(&["Write report", "Milk the cows", "Call plumber"])
    );
    assert_eq!(
        matching(
            factory,
            q().filter(TaskField::Status, Operator::In, vec!["Draft", "Done"]).unwrap()
        )
        .await,
        expected(&["Buy milk", "File taxes"])
    );
    assert_eq!(
        matching(
            factory,
            q().filter(TaskField::Status, Operator::Nin, vec!["ToDo"]).unwrap()
        )
        .await,
        expected(&["Buy milk", "Milk the cows", "File taxes"])
    );
    assert_eq!(
        matching(factory, q().filter(TaskField::Title, Operator::Contains, "MILK").unwrap()).await,
        expected(&["Buy milk", "Milk the cows"])
    );
    assert_eq!(
        matching(factory, q().filter(TaskField::LabelIds, Operator::Contains, "home").unwrap())
            .await,
        expected(&["Buy milk", "Milk the cows", "File taxes"])
    );
    assert_eq!(
        matching(
            factory,
            q().filter(TaskField::CreatedAt, Operator::Gte, base_time() + Duration::minutes(3))
                .unwrap()
        )
        .await,
        expected(&["Call plumber", "File taxes"])
    );
}

pub async fn filters_are_conjunctive<F: UnitOfWorkFactory>(factory: &F) {
    seed_tasks(factory).await;
    let query = Query::new()
        .filter(TaskField::LabelIds, Operator::Contains, "home")
        .unwrap()
        .filter(TaskField::Priority, Operator::Gte, 2)
        .unwrap();
    assert_eq!(
        matching(factory, query).await,
        expected(&["Milk the cows", "File taxes"])
    );
}

pub async fn pages_are_disjoint_and_stable<F: UnitOfWorkFactory>(factory: &F) {
    seed_tasks(factory).await;
    let sorted = || {
        Query::new()
            .sort(TaskField::Priority, SortDirection::Asc)
            .unwrap()
    };

    let full = factory.create().tasks().query(&sorted()).await.unwrap();
    assert_eq!(full.items.len(), 5);
    let full_ids: Vec<String> = full.items.iter().map(|t| t.id().to_string()).collect();

    let mut paged_ids = Vec::new();
    for skip in [0, 2, 4] {
        let page = factory
            .create()
            .tasks()
            .query(&sorted().paginate(Some(skip), Some(2)))
            .await
            .unwrap();
        assert_eq!(page.skip, skip);
        assert_eq!(page.take, 2);
        assert_eq!(page.total_count, 5);
        paged_ids.extend(page.items.iter().map(|t| t.id().to_string()));
    }
    assert_eq!(paged_ids, full_ids);

    // Same query again, same order
    let again = factory.create().tasks().query(&sorted()).await.unwrap();
    let again_ids: Vec<String> = again.items.iter().map(|t| t.id().to_string()).collect();
    assert_eq!(again_ids, full_ids);

    let priorities: Vec<i32> = full.items.iter().map(|t| t.priority).collect();
    assert_eq!(priorities, vec![1, 2, 3, 3, 5]);
}

pub async fn total_count_ignores_window<F: UnitOfWorkFactory>(factory: &F) {
    seed_tasks(factory).await;
    let filtered = || {
        Query::new()
            .filter(TaskField::Priority, Operator::Gte, 2)
            .unwrap()
    };
    for (skip, take, items) in [(0, 1, 1), (1, 2, 2), (3, 10, 1), (10, 5, 0)] {
        let page = factory
            .create()
            .tasks()
            .query(&filtered().paginate(Some(skip), Some(take)))
            .await
            .unwrap();
        assert_eq!(page.total_count, 4);
        assert_eq!(page.items.len(), items);
    }
}

pub async fn id_filter_converts_identity<F: UnitOfWorkFactory>(factory: &F) {
    let tasks = seed_tasks(factory).await;
    let target = &tasks[2];

    let query = Query::new()
        .filter(TaskField::Id, Operator::Eq, target.id().to_string())
        .unwrap();
    let page = factory.create().tasks().query(&query).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].title, target.title);

    let unknown = Query::new()
        .filter(TaskField::Id, Operator::Eq, uuid::Uuid::new_v4().to_string())
        .unwrap();
    let page = factory.create().tasks().query(&unknown).await.unwrap();
    assert!(page.items.is_empty());

    let malformed = Query::new()
        .filter(TaskField::Id, Operator::Eq, "not-an-id")
        .unwrap();
    assert!(matches!(
        factory.create().tasks().query(&malformed).await,
        Err(AppError::InvalidArgument(_))
    ));

    let listed = Query::new()
        .filter(
            TaskField::Id,
            Operator::In,
            vec![tasks[0].id().to_string(), tasks[4].id().to_string()],
        )
        .unwrap();
    assert_eq!(
        matching(factory, listed).await,
        expected(&["Buy milk", "File taxes"])
    );
}

pub async fn reset_is_idempotent<F: UnitOfWorkFactory>(factory: &F) {
    let uow = factory.create();
    uow.reset().await;
    uow.reset().await;
    assert!(!uow.has_open_session().await);
    assert_eq!(uow.pending_operations(), 0);

    uow.tasks()
        .add(task("Discard me", 1, TaskStatus::Draft, &[], 0))
        .await
        .unwrap();
    assert!(uow.has_open_session().await);
    uow.reset().await;
    uow.reset().await;
    assert!(!uow.has_open_session().await);
    assert_eq!(uow.pending_operations(), 0);
    assert_eq!(uow.save_changes().await.unwrap(), 0);
}

pub async fn dispose_discards_staged_writes<F: UnitOfWorkFactory>(factory: &F) {
    let uow = factory.create();
    uow.dispose().await.unwrap();

    let added = uow
        .tasks()
        .add(task("Never stored", 1, TaskStatus::Draft, &[], 0))
        .await
        .unwrap();
    uow.dispose().await.unwrap();
    uow.dispose().await.unwrap();
    assert!(!uow.has_open_session().await);

    assert!(factory.create().tasks().get(added.id()).await.unwrap().is_none());
}

pub async fn save_without_session_is_noop<F: UnitOfWorkFactory>(factory: &F) {
    let uow = factory.create();
    assert_eq!(uow.save_changes().await.unwrap(), 0);
    assert_eq!(uow.save_changes().await.unwrap(), 0);
}

pub async fn partial_update_keeps_untouched_fields<F: UnitOfWorkFactory>(factory: &F) {
    let uow = factory.create();
    let label = uow
        .labels()
        .add(Label::new("Errands", OWNER).unwrap())
        .await
        .unwrap();
    uow.save_changes().await.unwrap();

    let before = factory.create().labels().get(label.id()).await.unwrap().unwrap();
    let mut renamed = before.clone();
    renamed.rename("Chores").unwrap();
    // Neither identity nor creation data is part of the update projection
    renamed.created_at = base_time();
    renamed.created_by = "someone-else".to_string();

    let uow = factory.create();
    uow.labels().update(&renamed).await.unwrap();
    assert_eq!(uow.save_changes().await.unwrap(), 1);

    let after = factory.create().labels().get(label.id()).await.unwrap().unwrap();
    assert_eq!(after.name, "Chores");
    assert_eq!(after.normalized_name, "chores");
    assert_eq!(after.color, before.color);
    assert_eq!(after.is_active, before.is_active);
    assert_eq!(after.created_at, before.created_at);
    assert_eq!(after.created_by, OWNER);
    assert!(after.updated_at.is_some());
}

pub async fn soft_delete_and_hard_delete<F: UnitOfWorkFactory>(factory: &F) {
    let tasks = seed_tasks(factory).await;

    let uow = factory.create();
    let mut archived = tasks[0].clone();
    archived.soft_delete();
    uow.tasks().update(&archived).await.unwrap();
    uow.tasks().delete(&tasks[1]).await.unwrap();
    assert_eq!(uow.save_changes().await.unwrap(), 2);

    let reader = factory.create();
    let archived = reader.tasks().get(tasks[0].id()).await.unwrap().unwrap();
    assert!(!archived.is_active);
    assert!(reader.tasks().get(tasks[1].id()).await.unwrap().is_none());
    assert_eq!(reader.tasks().get_all().await.unwrap().len(), 4);

    let active = reader
        .tasks()
        .find_active_by_user(OWNER, Pagination::default())
        .await
        .unwrap();
    assert_eq!(active.total_count, 3);
}

pub async fn update_rewrites_label_links<F: UnitOfWorkFactory>(factory: &F) {
    let tasks = seed_tasks(factory).await;
    let mut relabeled = tasks[2].clone();
    relabeled.remove_label("home").unwrap();
    relabeled.add_label("barn").unwrap();

    let uow = factory.create();
    uow.tasks().update(&relabeled).await.unwrap();
    uow.save_changes().await.unwrap();

    let stored = factory.create().tasks().get(relabeled.id()).await.unwrap().unwrap();
    assert_eq!(stored.label_ids, vec!["farm".to_string(), "barn".to_string()]);
    assert_eq!(
        matching(
            factory,
            Query::new()
                .filter(TaskField::LabelIds, Operator::Contains, "home")
                .unwrap()
        )
        .await,
        expected(&["Buy milk", "File taxes"])
    );
}

pub async fn with_transaction_commits_on_success<F: UnitOfWorkFactory>(factory: &F) {
    let uow = factory.create();
    let added = persistence::with_transaction!(uow, |tx| {
        let first = tx
            .tasks()
            .add(task("First", 1, TaskStatus::Draft, &[], 0))
            .await?;
        tx.tasks()
            .add(task("Second", 2, TaskStatus::Draft, &[], 1))
            .await?;
        Ok::<_, AppError>(first)
    })
    .unwrap();

    assert!(!uow.has_open_session().await);
    let reader = factory.create();
    assert!(reader.tasks().get(added.id()).await.unwrap().is_some());
    assert_eq!(reader.tasks().get_all().await.unwrap().len(), 2);
}

pub async fn with_transaction_discards_on_failure<F: UnitOfWorkFactory>(factory: &F) {
    let uow = factory.create();
    let result: Result<Task, AppError> = persistence::with_transaction!(uow, |tx| {
        tx.tasks()
            .add(task("Doomed", 1, TaskStatus::Draft, &[], 0))
            .await?;
        Err::<Task, _>(AppError::conflict("Task already exists"))
    });
    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert!(factory.create().tasks().get_all().await.unwrap().is_empty());
}

pub async fn active_tasks_sorted_newest_first<F: UnitOfWorkFactory>(factory: &F) {
    let uow = factory.create();
    let draft = uow
        .tasks()
        .add(Task::new("Sketch roadmap", "", TaskStatus::Draft, 0, OWNER).unwrap())
        .await
        .unwrap();
    uow.save_changes().await.unwrap();

    let query = Query::new()
        .filter(TaskField::IsActive, Operator::Eq, true)
        .unwrap()
        .sort(TaskField::CreatedAt, SortDirection::Desc)
        .unwrap();
    let page = factory.create().tasks().query(&query).await.unwrap();
    assert!(page.total_count >= 1);
    let found = page
        .items
        .iter()
        .find(|task| task.id == draft.id)
        .expect("new task is listed");
    assert_eq!(found.priority, 0);
    assert_eq!(found.status, TaskStatus::Draft);
}
