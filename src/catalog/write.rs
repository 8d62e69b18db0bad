use serde::Deserialize;
use sqlx::PgPool;

use super::CatalogError;

#[derive(Debug, Deserialize)]
pub struct NewTableService {
    pub service_name: String,
}

/// One price cell. Both indices are 1-based positions into the request's
/// `services` and `price_ranges` lists.
#[derive(Debug, Deserialize)]
pub struct NewTablePrice {
    pub service_id: usize,
    pub range_id: usize,
    pub price: f64,
}

#[derive(Debug, Deserialize)]
pub struct NewTable {
    pub category_name: String,
    pub services: Vec<NewTableService>,
    pub price_ranges: Vec<String>,
    pub prices: Vec<NewTablePrice>,
}

#[derive(Debug)]
pub struct CreatedTable {
    pub category_id: i32,
    pub header_ids: Vec<i32>,
    pub service_ids: Vec<i32>,
}

fn resolve(ids: &[i32], index: usize, field: &'static str) -> Result<i32, CatalogError> {
    index
        .checked_sub(1)
        .and_then(|i| ids.get(i))
        .copied()
        .ok_or(CatalogError::InvalidIndex {
            field,
            index,
            len: ids.len(),
        })
}

/// Create a category with its headers, services and price cells in one transaction.
/// Any failure (including an index that resolves to nothing) leaves no rows behind.
pub async fn add_table(db: &PgPool, table: &NewTable) -> Result<CreatedTable, CatalogError> {
    let mut tx = db.begin().await?;

    let category_id: i32 = sqlx::query_scalar(
        r#"
        INSERT INTO categories (name)
        VALUES ($1)
        RETURNING id
        "#,
    )
    .bind(&table.category_name)
    .fetch_one(&mut *tx)
    .await?;

    // insertion order of headers is the column order of the table
    let mut header_ids = Vec::with_capacity(table.price_ranges.len());
    for header in &table.price_ranges {
        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO table_headers (header_name, category_id)
            VALUES ($1, $2)
            RETURNING id
            "#,
        )
        .bind(header)
        .bind(category_id)
        .fetch_one(&mut *tx)
        .await?;
        header_ids.push(id);
    }

    let mut service_ids = Vec::with_capacity(table.services.len());
    for service in &table.services {
        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO services (name, category_id)
            VALUES ($1, $2)
            RETURNING id
            "#,
        )
        .bind(&service.service_name)
        .bind(category_id)
        .fetch_one(&mut *tx)
        .await?;
        service_ids.push(id);
    }

    for cell in &table.prices {
        let service_id = resolve(&service_ids, cell.service_id, "service_id")?;
        let header_id = resolve(&header_ids, cell.range_id, "range_id")?;

        sqlx::query(
            r#"
            INSERT INTO service_attributes (price, service_id, header_id)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(cell.price)
        .bind(service_id)
        .bind(header_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(CreatedTable {
        category_id,
        header_ids,
        service_ids,
    })
}

/// `(service index, range index, price)` triples use the request's 1-based indices.
#[cfg(test)]
pub(super) fn sample_table(
    name: &str,
    ranges: &[&str],
    services: &[&str],
    prices: &[(usize, usize, f64)],
) -> NewTable {
    NewTable {
        category_name: name.to_string(),
        price_ranges: ranges.iter().map(|r| r.to_string()).collect(),
        services: services
            .iter()
            .map(|s| NewTableService { service_name: s.to_string() })
            .collect(),
        prices: prices
            .iter()
            .map(|&(service_id, range_id, price)| NewTablePrice { service_id, range_id, price })
            .collect(),
    }
}
