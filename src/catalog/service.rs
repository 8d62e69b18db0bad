use std::collections::HashSet;

use sqlx::PgPool;

use super::CatalogError;

/// Point-update prices of one service. All-or-nothing: the first missing
/// (service, header) cell aborts and nothing is committed.
pub async fn update_service_prices(
    db: &PgPool,
    service_id: i32,
    prices: &[(i32, f64)],
) -> Result<u64, CatalogError> {
    let mut tx = db.begin().await?;

    let mut updated = 0;
    for &(header_id, price) in prices {
        let res = sqlx::query(
            r#"
            UPDATE service_attributes
            SET price = $1
            WHERE service_id = $2 AND header_id = $3
            "#,
        )
        .bind(price)
        .bind(service_id)
        .bind(header_id)
        .execute(&mut *tx)
        .await?;

        if res.rows_affected() == 0 {
            return Err(CatalogError::CellNotFound {
                service_id,
                header_id,
            });
        }
        updated += res.rows_affected();
    }

    tx.commit().await?;
    Ok(updated)
}

#[derive(Debug)]
pub struct DeletedService {
    pub category_id: i32,
    pub category_deleted: bool,
}

/// Delete a service and its price cells; the category goes too when this was its last service.
pub async fn delete_service(db: &PgPool, service_id: i32) -> Result<DeletedService, CatalogError> {
    let mut tx = db.begin().await?;

    let category_id: i32 = sqlx::query_scalar(
        r#"
        SELECT category_id
        FROM services
        WHERE id = $1
        "#,
    )
    .bind(service_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(CatalogError::ServiceNotFound(service_id))?;

    sqlx::query("DELETE FROM service_attributes WHERE service_id = $1")
        .bind(service_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM services WHERE id = $1")
        .bind(service_id)
        .execute(&mut *tx)
        .await?;

    let remaining: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM services
        WHERE category_id = $1
        "#,
    )
    .bind(category_id)
    .fetch_one(&mut *tx)
    .await?;

    let category_deleted = remaining == 0;
    if category_deleted {
        // headers go with it via ON DELETE CASCADE
        sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(category_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok(DeletedService {
        category_id,
        category_deleted,
    })
}

/// Add a service to an existing category together with its price cells, atomically.
/// `prices` are (header id, price) pairs; every header must belong to the category.
pub async fn add_service(
    db: &PgPool,
    category_id: i32,
    name: &str,
    prices: &[(i32, f64)],
) -> Result<i32, CatalogError> {
    let mut tx = db.begin().await?;

    let exists: Option<i32> = sqlx::query_scalar("SELECT id FROM categories WHERE id = $1")
        .bind(category_id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(CatalogError::CategoryNotFound(category_id));
    }

    let headers: HashSet<i32> = sqlx::query_scalar::<_, i32>(
        "SELECT id FROM table_headers WHERE category_id = $1",
    )
    .bind(category_id)
    .fetch_all(&mut *tx)
    .await?
    .into_iter()
    .collect();

    if let Some(&(header_id, _)) = prices.iter().find(|(h, _)| !headers.contains(h)) {
        return Err(CatalogError::HeaderNotInCategory {
            header_id,
            category_id,
        });
    }

    let service_id: i32 = sqlx::query_scalar(
        r#"
        INSERT INTO services (name, category_id)
        VALUES ($1, $2)
        RETURNING id
        "#,
    )
    .bind(name)
    .bind(category_id)
    .fetch_one(&mut *tx)
    .await?;

    for &(header_id, price) in prices {
        sqlx::query(
            r#"
            INSERT INTO service_attributes (price, service_id, header_id)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(price)
        .bind(service_id)
        .bind(header_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(service_id)
}
