//! Database-backed repository tests. Each test runs against a fresh
//! database provisioned by `sqlx::test`, with the crate migrations applied.
use sqlx::PgPool;

use bookworm::db::{contact_repo, image_repo, profile_repo, user_repo};
use bookworm::models::User;
use bookworm::security::password;

const TEST_PASSWORD: &str = "letmein-please";

async fn create_user(pool: &PgPool, username: &str) -> User {
    let hash = password::hash_password(TEST_PASSWORD).unwrap();
    user_repo::create_with_profile(
        pool,
        username,
        &format!("{username}@example.com"),
        "",
        &hash,
    )
    .await
    .unwrap()
}

async fn create_image(pool: &PgPool, owner: &User) -> bookworm::models::Image {
    image_repo::insert(
        pool,
        image_repo::NewImage {
            user_id: owner.id,
            title: "Sunset at the beach",
            slug: "sunset-at-the-beach",
            url: "https://example.com/sunset.jpg",
            image_path: "images/2026/08/27/sunset-at-the-beach.jpg",
            description: "",
        },
    )
    .await
    .unwrap()
}

#[sqlx::test(migrations = "./migrations")]
async fn registration_creates_user_and_profile(pool: PgPool) {
    let user = create_user(&pool, "alice").await;

    assert_ne!(user.password_hash, TEST_PASSWORD);
    assert!(password::verify_password(TEST_PASSWORD, &user.password_hash));

    let profile = profile_repo::find_by_user(&pool, user.id)
        .await
        .unwrap()
        .expect("profile created together with the account");
    assert_eq!(profile.date_of_birth, None);
    assert_eq!(profile.photo_path, None);
}

#[sqlx::test(migrations = "./migrations")]
async fn duplicate_username_and_email_are_detected(pool: PgPool) {
    let user = create_user(&pool, "alice").await;

    assert!(user_repo::username_taken(&pool, "alice").await.unwrap());
    assert!(!user_repo::username_taken(&pool, "bob").await.unwrap());

    assert!(user_repo::email_taken(&pool, "alice@example.com", None)
        .await
        .unwrap());
    // The account's own address is free when editing that account.
    assert!(
        !user_repo::email_taken(&pool, "alice@example.com", Some(user.id))
            .await
            .unwrap()
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn follow_twice_leaves_one_edge(pool: PgPool) {
    let alice = create_user(&pool, "alice").await;
    let bob = create_user(&pool, "bob").await;

    assert!(contact_repo::follow(&pool, alice.id, bob.id).await.unwrap());
    assert!(!contact_repo::follow(&pool, alice.id, bob.id).await.unwrap());
    assert_eq!(contact_repo::follower_count(&pool, bob.id).await.unwrap(), 1);
    assert_eq!(
        contact_repo::following_count(&pool, alice.id).await.unwrap(),
        1
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn unfollow_is_idempotent(pool: PgPool) {
    let alice = create_user(&pool, "alice").await;
    let bob = create_user(&pool, "bob").await;

    contact_repo::follow(&pool, alice.id, bob.id).await.unwrap();
    assert!(contact_repo::unfollow(&pool, alice.id, bob.id).await.unwrap());
    assert!(!contact_repo::unfollow(&pool, alice.id, bob.id).await.unwrap());
    assert_eq!(contact_repo::follower_count(&pool, bob.id).await.unwrap(), 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn like_is_set_membership(pool: PgPool) {
    let alice = create_user(&pool, "alice").await;
    let bob = create_user(&pool, "bob").await;
    let image = create_image(&pool, &bob).await;

    assert!(image_repo::like(&pool, alice.id, image.id).await.unwrap());
    assert!(!image_repo::like(&pool, alice.id, image.id).await.unwrap());
    assert_eq!(image_repo::like_count(&pool, image.id).await.unwrap(), 1);
    assert!(image_repo::user_likes(&pool, alice.id, image.id).await.unwrap());

    assert!(image_repo::unlike(&pool, alice.id, image.id).await.unwrap());
    assert!(!image_repo::unlike(&pool, alice.id, image.id).await.unwrap());
    assert_eq!(image_repo::like_count(&pool, image.id).await.unwrap(), 0);
    assert!(!image_repo::user_likes(&pool, alice.id, image.id).await.unwrap());
}

#[sqlx::test(migrations = "./migrations")]
async fn listing_pages_are_newest_first(pool: PgPool) {
    let alice = create_user(&pool, "alice").await;
    for _ in 0..3 {
        create_image(&pool, &alice).await;
    }

    assert_eq!(image_repo::count(&pool).await.unwrap(), 3);

    let first_two = image_repo::page(&pool, 2, 0).await.unwrap();
    assert_eq!(first_two.len(), 2);
    assert!(first_two[0].created_at >= first_two[1].created_at);

    let rest = image_repo::page(&pool, 2, 2).await.unwrap();
    assert_eq!(rest.len(), 1);
}
