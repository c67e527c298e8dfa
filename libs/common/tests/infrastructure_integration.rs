//! Checks against live PostgreSQL and Redis, ignored by default
//!
//! Run with `DATABASE_URL` and `REDIS_URL` pointing at disposable instances.

use common::{
    cache::{RedisConfig, RedisPool},
    database::{DatabaseConfig, health_check, init_pool},
};
use sqlx::Row;

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn postgres_accepts_jsonb_documents() -> Result<(), Box<dyn std::error::Error>> {
    let pool = init_pool(&DatabaseConfig::from_env()?).await?;
    assert!(health_check(&pool).await?, "Database health check failed");

    let row = sqlx::query(r#"SELECT ('{"cart_total": 350}'::jsonb ->> 'cart_total')::bigint AS total"#)
        .fetch_one(&pool)
        .await?;
    let total: i64 = row.get("total");
    assert_eq!(total, 350);

    Ok(())
}

#[tokio::test]
#[ignore = "requires Redis (REDIS_URL)"]
async fn redis_caches_json_with_expiry() -> Result<(), Box<dyn std::error::Error>> {
    let config = RedisConfig::from_env().ok_or("REDIS_URL is not set")?;
    let redis = RedisPool::new(&config)?;
    assert!(redis.health_check().await?, "Redis health check failed");

    let key = "integration:catalog:lamp";
    redis.set_json(key, &("lamp", 40u64), 10).await?;
    assert_eq!(
        redis.get_json::<(String, u64)>(key).await?,
        Some(("lamp".to_string(), 40))
    );

    redis.delete(key).await?;
    assert_eq!(redis.get(key).await?, None);

    Ok(())
}
