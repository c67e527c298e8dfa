//! `PgUserRepository` against a live PostgreSQL, ignored by default
//!
//! Run with `DATABASE_URL` pointing at a disposable database; the storefront
//! migrations are applied on connect.

use std::error::Error;

use common::{
    database::{DatabaseConfig, init_pool},
    error::DatabaseError,
};
use sqlx::{PgPool, types::Json};
use uuid::Uuid;

use storefront::{
    models::{CartLine, ProductSnapshot, UserDocument},
    repositories::{PgUserRepository, UserDocumentRepository},
};

type TestResult = Result<(), Box<dyn Error>>;

async fn connect() -> Result<(PgPool, PgUserRepository), Box<dyn Error>> {
    let pool = init_pool(&DatabaseConfig::from_env()?).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok((pool.clone(), PgUserRepository::new(pool)))
}

fn line(name: &str, price: u64) -> CartLine {
    CartLine::from(ProductSnapshot {
        product_id: Uuid::new_v4(),
        product_name: name.to_string(),
        price,
        rating: 4,
        image: format!("/img/{}.png", name),
    })
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn second_insert_of_the_same_user_is_a_no_op() -> TestResult {
    let (_, repo) = connect().await?;
    let mut doc = UserDocument::new(Uuid::new_v4());

    assert!(repo.insert_user(&doc).await?);

    doc.cart.push(line("ignored", 1));
    assert!(!repo.insert_user(&doc).await?);

    let stored = repo.find_user(doc.id).await?.ok_or("user missing")?;
    assert_eq!(stored.version, 0);
    assert!(stored.cart.is_empty());

    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn update_at_the_current_version_bumps_it() -> TestResult {
    let (_, repo) = connect().await?;
    let id = Uuid::new_v4();
    repo.insert_user(&UserDocument::new(id)).await?;

    let mut doc = repo.find_user(id).await?.ok_or("user missing")?;
    doc.cart.push(line("lamp", 40));
    doc.cart_total = 40;
    assert!(repo.update_user(&doc, doc.version).await?);

    let stored = repo.find_user(id).await?.ok_or("user missing")?;
    assert_eq!(stored.version, 1);
    assert_eq!(stored.cart, doc.cart);
    assert_eq!(stored.cart_total, 40);

    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn stale_version_update_is_refused() -> TestResult {
    let (_, repo) = connect().await?;
    let id = Uuid::new_v4();
    repo.insert_user(&UserDocument::new(id)).await?;

    let mut first = repo.find_user(id).await?.ok_or("user missing")?;
    let mut second = first.clone();

    first.cart.push(line("first", 10));
    first.cart_total = 10;
    assert!(repo.update_user(&first, 0).await?);

    second.cart.push(line("second", 20));
    second.cart_total = 20;
    assert!(!repo.update_user(&second, 0).await?);

    let stored = repo.find_user(id).await?.ok_or("user missing")?;
    assert_eq!(stored.version, 1);
    assert_eq!(stored.cart, first.cart);

    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn racing_updates_at_one_version_have_a_single_winner() -> TestResult {
    let (_, repo) = connect().await?;
    let id = Uuid::new_v4();
    repo.insert_user(&UserDocument::new(id)).await?;
    let base = repo.find_user(id).await?.ok_or("user missing")?;

    let mut a = base.clone();
    a.cart.push(line("a", 1));
    let mut b = base.clone();
    b.cart.push(line("b", 2));

    let (won_a, won_b) = tokio::join!(repo.update_user(&a, 0), repo.update_user(&b, 0));
    assert!(won_a? ^ won_b?);

    let stored = repo.find_user(id).await?.ok_or("user missing")?;
    assert_eq!(stored.version, 1);
    assert_eq!(stored.cart.len(), 1);

    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn missing_user_is_none_and_update_touches_nothing() -> TestResult {
    let (_, repo) = connect().await?;
    let ghost = UserDocument::new(Uuid::new_v4());

    assert!(repo.find_user(ghost.id).await?.is_none());
    assert!(!repo.update_user(&ghost, 0).await?);
    assert!(repo.find_user(ghost.id).await?.is_none());

    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn document_filed_under_another_id_fails_to_decode() -> TestResult {
    let (pool, repo) = connect().await?;
    let row_id = Uuid::new_v4();
    let stray = UserDocument::new(Uuid::new_v4());

    sqlx::query(
        "INSERT INTO users (id, version, document, created_at, updated_at) \
         VALUES ($1, 0, $2, $3, $3)",
    )
    .bind(row_id)
    .bind(Json(&stray))
    .bind(stray.created_at)
    .execute(&pool)
    .await?;

    let err = repo.find_user(row_id).await.unwrap_err();
    assert!(matches!(err, DatabaseError::Decode(_)));

    Ok(())
}
