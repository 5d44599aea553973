//! Integration tests for users, projects and onboarding answers.
//!
//! Each test runs against its own freshly migrated database provided by
//! `bizplan-test-utils`.

use bizplan_db::models::{ONBOARDING_QUESTIONS, ProjectStatus};
use bizplan_db::queries::projects::{NewProject, ProjectChanges};
use bizplan_db::queries::{is_unique_violation, onboarding, projects, users};
use bizplan_test_utils::{create_test_db, drop_test_db, insert_test_user};

fn acme() -> NewProject<'static> {
    NewProject {
        name: "Acme",
        description: "Rockets for coyotes",
        main_sector: "aerospace",
        business_model: "b2c",
    }
}

// -----------------------------------------------------------------------
// Users
// -----------------------------------------------------------------------

#[tokio::test]
async fn insert_and_fetch_user() {
    let (pool, db_name) = create_test_db().await;

    let user = users::insert_user(&pool, "Ada", "ada@example.com", "hash")
        .await
        .expect("insert_user should succeed");
    assert!(user.is_active);
    assert_eq!(user.access_level.to_string(), "free");

    let by_email = users::get_user_by_email(&pool, "ada@example.com")
        .await
        .unwrap()
        .expect("user should exist");
    assert_eq!(by_email.id, user.id);

    let renamed = users::update_user_name(&pool, user.id, "Ada L.")
        .await
        .unwrap()
        .expect("user should exist");
    assert_eq!(renamed.name, "Ada L.");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn password_hash_can_be_replaced() {
    let (pool, db_name) = create_test_db().await;
    let user_id = insert_test_user(&pool, "ada@example.com").await;

    let old = users::get_user(&pool, user_id).await.unwrap().unwrap().password_hash;

    assert!(users::update_password_hash(&pool, user_id, &old, "new-hash").await.unwrap());
    let user = users::get_user(&pool, user_id).await.unwrap().unwrap();
    assert_eq!(user.password_hash, "new-hash");

    // A second writer holding the stale hash loses.
    assert!(!users::update_password_hash(&pool, user_id, &old, "other").await.unwrap());
    let user = users::get_user(&pool, user_id).await.unwrap().unwrap();
    assert_eq!(user.password_hash, "new-hash");

    assert!(
        !users::update_password_hash(&pool, uuid::Uuid::new_v4(), "x", "y")
            .await
            .unwrap()
    );

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn duplicate_email_is_unique_violation() {
    let (pool, db_name) = create_test_db().await;

    users::insert_user(&pool, "Ada", "ada@example.com", "hash")
        .await
        .unwrap();
    let err = users::insert_user(&pool, "Other", "ada@example.com", "hash")
        .await
        .expect_err("duplicate email must fail");
    assert!(is_unique_violation(&err), "unexpected error: {err:#}");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn deleting_user_cascades_to_projects() {
    let (pool, db_name) = create_test_db().await;

    let user_id = insert_test_user(&pool, "owner@example.com").await;
    let project = projects::insert_project_with_answers(&pool, user_id, &acme())
        .await
        .unwrap();

    assert!(users::delete_user(&pool, user_id).await.unwrap());
    assert!(projects::get_project(&pool, project.id).await.unwrap().is_none());
    assert!(onboarding::list_answers(&pool, project.id).await.unwrap().is_empty());

    pool.close().await;
    drop_test_db(&db_name).await;
}

// -----------------------------------------------------------------------
// Projects
// -----------------------------------------------------------------------

#[tokio::test]
async fn new_project_starts_onboarding_with_ten_empty_answers() {
    let (pool, db_name) = create_test_db().await;
    let user_id = insert_test_user(&pool, "owner@example.com").await;

    let project = projects::insert_project_with_answers(&pool, user_id, &acme())
        .await
        .expect("insert should succeed");
    assert_eq!(project.status, ProjectStatus::Onboarding);
    assert_eq!(project.generation_attempt, 0);

    let answers = onboarding::list_answers(&pool, project.id).await.unwrap();
    let labels: Vec<&str> = answers.iter().map(|a| a.question.as_str()).collect();
    assert_eq!(labels, ONBOARDING_QUESTIONS);
    assert!(answers.iter().all(|a| a.answer.is_empty()));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn project_names_are_unique_per_user_only() {
    let (pool, db_name) = create_test_db().await;
    let alice = insert_test_user(&pool, "alice@example.com").await;
    let bob = insert_test_user(&pool, "bob@example.com").await;

    projects::insert_project_with_answers(&pool, alice, &acme())
        .await
        .unwrap();
    let err = projects::insert_project_with_answers(&pool, alice, &acme())
        .await
        .expect_err("same name for same user must fail");
    assert!(is_unique_violation(&err));

    projects::insert_project_with_answers(&pool, bob, &acme())
        .await
        .expect("same name for another user succeeds");

    // The failed insert rolled back its seeded answers too.
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM onboarding_answers")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 20);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn owned_lookups_hide_other_users_projects() {
    let (pool, db_name) = create_test_db().await;
    let alice = insert_test_user(&pool, "alice@example.com").await;
    let mallory = insert_test_user(&pool, "mallory@example.com").await;

    let project = projects::insert_project_with_answers(&pool, alice, &acme())
        .await
        .unwrap();

    assert!(
        projects::get_owned_project(&pool, project.id, mallory)
            .await
            .unwrap()
            .is_none()
    );
    assert!(!projects::delete_project(&pool, project.id, mallory).await.unwrap());
    let changes = ProjectChanges {
        name: Some("Stolen"),
        ..Default::default()
    };
    assert!(
        projects::update_project_details(&pool, project.id, mallory, &changes)
            .await
            .unwrap()
            .is_none()
    );

    let updated = projects::update_project_details(&pool, project.id, alice, &changes)
        .await
        .unwrap()
        .expect("owner can update");
    assert_eq!(updated.name, "Stolen");
    assert_eq!(updated.description, "Rockets for coyotes");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn begin_generation_bumps_attempt_and_respects_source_statuses() {
    let (pool, db_name) = create_test_db().await;
    let user_id = insert_test_user(&pool, "owner@example.com").await;
    let project = projects::insert_project_with_answers(&pool, user_id, &acme())
        .await
        .unwrap();

    let started = projects::begin_generation(&pool, project.id, user_id, &[ProjectStatus::Onboarding])
        .await
        .unwrap()
        .expect("transition should apply");
    assert_eq!(started.status, ProjectStatus::Generating);
    assert_eq!(started.generation_attempt, 1);

    // Status is now generating, which is not in the allowed source set.
    let none = projects::begin_generation(&pool, project.id, user_id, &[ProjectStatus::Onboarding])
        .await
        .unwrap();
    assert!(none.is_none());

    // A stale attempt cannot finish the run.
    let mut conn = pool.acquire().await.unwrap();
    let rows = projects::finish_generation(&mut conn, project.id, 0, ProjectStatus::Ready)
        .await
        .unwrap();
    assert_eq!(rows, 0);

    let rows = projects::finish_generation(&mut conn, project.id, 1, ProjectStatus::Ready)
        .await
        .unwrap();
    assert_eq!(rows, 1);
    drop(conn);

    let reloaded = projects::get_project(&pool, project.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, ProjectStatus::Ready);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn orphaned_generations_are_reset_with_new_attempt() {
    let (pool, db_name) = create_test_db().await;
    let user_id = insert_test_user(&pool, "owner@example.com").await;
    let stuck = projects::insert_project_with_answers(&pool, user_id, &acme())
        .await
        .unwrap();
    let idle = projects::insert_project_with_answers(
        &pool,
        user_id,
        &NewProject {
            name: "Idle",
            ..acme()
        },
    )
    .await
    .unwrap();

    projects::begin_generation(&pool, stuck.id, user_id, &[ProjectStatus::Onboarding])
        .await
        .unwrap()
        .unwrap();

    let reset = projects::reset_orphaned_generations(&pool).await.unwrap();
    assert_eq!(reset, vec![stuck.id]);

    let reloaded = projects::get_project(&pool, stuck.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, ProjectStatus::Onboarding);
    assert_eq!(reloaded.generation_attempt, 2);

    let untouched = projects::get_project(&pool, idle.id).await.unwrap().unwrap();
    assert_eq!(untouched.generation_attempt, 0);

    pool.close().await;
    drop_test_db(&db_name).await;
}

// -----------------------------------------------------------------------
// Onboarding answers
// -----------------------------------------------------------------------

#[tokio::test]
async fn update_answer_is_strict() {
    let (pool, db_name) = create_test_db().await;
    let user_id = insert_test_user(&pool, "owner@example.com").await;
    let project = projects::insert_project_with_answers(&pool, user_id, &acme())
        .await
        .unwrap();

    let updated = onboarding::update_answer(&pool, project.id, "problem", "Coyotes lack rockets")
        .await
        .unwrap()
        .expect("pre-populated label updates");
    assert_eq!(updated.answer, "Coyotes lack rockets");

    let missing = onboarding::update_answer(&pool, project.id, "nonexistent_label", "x")
        .await
        .unwrap();
    assert!(missing.is_none());

    let answers = onboarding::list_answers(&pool, project.id).await.unwrap();
    assert_eq!(answers.len(), 10);
    let changed: Vec<_> = answers.iter().filter(|a| !a.answer.is_empty()).collect();
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].question, "problem");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn upsert_and_reset_answers_keep_one_row_per_label() {
    let (pool, db_name) = create_test_db().await;
    let user_id = insert_test_user(&pool, "owner@example.com").await;
    let project = projects::insert_project_with_answers(&pool, user_id, &acme())
        .await
        .unwrap();

    let mut tx = pool.begin().await.unwrap();
    onboarding::upsert_answer(&mut tx, project.id, "location", "Lisbon", 7)
        .await
        .unwrap();
    onboarding::upsert_answer(&mut tx, project.id, "location", "Porto", 7)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let answers = onboarding::list_answers(&pool, project.id).await.unwrap();
    assert_eq!(answers.len(), 10);
    let location = answers.iter().find(|a| a.question == "location").unwrap();
    assert_eq!(location.answer, "Porto");

    let mut conn = pool.acquire().await.unwrap();
    let reset = onboarding::reset_answers(&mut conn, project.id).await.unwrap();
    assert_eq!(reset, 10);
    drop(conn);

    let answers = onboarding::list_answers(&pool, project.id).await.unwrap();
    assert!(answers.iter().all(|a| a.answer.is_empty()));

    pool.close().await;
    drop_test_db(&db_name).await;
}
