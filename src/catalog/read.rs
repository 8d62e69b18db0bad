use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use sqlx::PgPool;

use super::CatalogError;

/// One row of the flattened category x header x service x price join.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PriceRow {
    pub category_id: i32,
    pub category_name: String,
    pub header_id: Option<i32>,
    pub header_name: Option<String>,
    pub service_id: Option<i32>,
    pub service_name: Option<String>,
    pub price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderEntry {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceEntry {
    pub service_id: i32,
    pub name: String,
    /// header id -> price; `None` where the (service, header) cell is missing.
    pub prices: BTreeMap<i32, Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTable {
    #[serde(rename = "categoryID")]
    pub category_id: i32,
    pub category_name: String,
    pub headers: Vec<HeaderEntry>,
    pub services: Vec<ServiceEntry>,
}

struct CategoryAcc {
    table: CategoryTable,
    seen_headers: HashSet<i32>,
    service_index: HashMap<i32, usize>,
}

/// Regroup ordered join rows into one table per category.
///
/// Headers keep first-seen order, services keep first-appearance order. With
/// `drop_last_price` set, every service loses its price entry for the highest
/// header id it has, whether or not that cell held a value.
pub fn reassemble<I>(rows: I, drop_last_price: bool) -> Vec<CategoryTable>
where
    I: IntoIterator<Item = PriceRow>,
{
    let mut order: Vec<i32> = Vec::new();
    let mut categories: HashMap<i32, CategoryAcc> = HashMap::new();

    for row in rows {
        let acc = categories.entry(row.category_id).or_insert_with(|| {
            order.push(row.category_id);
            CategoryAcc {
                table: CategoryTable {
                    category_id: row.category_id,
                    category_name: row.category_name.clone(),
                    headers: Vec::new(),
                    services: Vec::new(),
                },
                seen_headers: HashSet::new(),
                service_index: HashMap::new(),
            }
        });

        if let (Some(id), Some(name)) = (row.header_id, row.header_name.as_ref()) {
            if acc.seen_headers.insert(id) {
                acc.table.headers.push(HeaderEntry {
                    id,
                    name: name.clone(),
                });
            }
        }

        // a category without services still yields rows from the left join
        let (Some(service_id), Some(service_name)) = (row.service_id, row.service_name) else {
            continue;
        };

        let idx = *acc.service_index.entry(service_id).or_insert_with(|| {
            acc.table.services.push(ServiceEntry {
                service_id,
                name: service_name,
                prices: BTreeMap::new(),
            });
            acc.table.services.len() - 1
        });

        if let Some(header_id) = row.header_id {
            acc.table.services[idx].prices.insert(header_id, row.price);
        }
    }

    order.sort_unstable();

    order
        .into_iter()
        .filter_map(|id| categories.remove(&id))
        .map(|acc| {
            let mut table = acc.table;
            if drop_last_price {
                for service in &mut table.services {
                    service.prices.pop_last();
                }
            }
            table
        })
        .collect()
}

pub async fn fetch_tables(db: &PgPool, drop_last_price: bool) -> Result<Vec<CategoryTable>, CatalogError> {
    let rows: Vec<PriceRow> = sqlx::query_as::<_, PriceRow>(
        r#"
        SELECT c.id AS category_id, c.name AS category_name,
               h.id AS header_id, h.header_name,
               s.id AS service_id, s.name AS service_name,
               a.price
        FROM categories c
        LEFT JOIN table_headers h ON c.id = h.category_id
        LEFT JOIN services s ON c.id = s.category_id
        LEFT JOIN service_attributes a ON s.id = a.service_id AND h.id = a.header_id
        ORDER BY c.id, s.id, h.id
        "#,
    )
    .fetch_all(db)
    .await?;

    Ok(reassemble(rows, drop_last_price))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(
        category: (i32, &str),
        header: Option<(i32, &str)>,
        service: Option<(i32, &str)>,
        price: Option<f64>,
    ) -> PriceRow {
        PriceRow {
            category_id: category.0,
            category_name: category.1.to_string(),
            header_id: header.map(|h| h.0),
            header_name: header.map(|h| h.1.to_string()),
            service_id: service.map(|s| s.0),
            service_name: service.map(|s| s.1.to_string()),
            price,
        }
    }

    /// Rows as the join returns them for "Cleaning" with Basic/Premium and one
    /// service priced 10 / 20.
    fn cleaning_rows() -> Vec<PriceRow> {
        let c = (1, "Cleaning");
        let s = Some((10, "Window Wash"));
        vec![
            row(c, Some((100, "Basic")), s, Some(10.0)),
            row(c, Some((101, "Premium")), s, Some(20.0)),
        ]
    }

    #[test]
    fn last_header_price_is_dropped() {
        let tables = reassemble(cleaning_rows(), true);
        assert_eq!(tables.len(), 1);

        let t = &tables[0];
        assert_eq!(t.category_name, "Cleaning");
        let names: Vec<_> = t.headers.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, ["Basic", "Premium"]);

        assert_eq!(t.services.len(), 1);
        let prices = &t.services[0].prices;
        assert_eq!(prices.len(), 1);
        assert_eq!(prices.get(&100), Some(&Some(10.0)));
        assert!(!prices.contains_key(&101));
    }

    #[test]
    fn drop_rule_can_be_disabled() {
        let tables = reassemble(cleaning_rows(), false);
        let prices = &tables[0].services[0].prices;
        assert_eq!(prices.get(&100), Some(&Some(10.0)));
        assert_eq!(prices.get(&101), Some(&Some(20.0)));
    }

    #[test]
    fn missing_cells_are_null_and_the_last_one_still_drops() {
        let c = (3, "Moving");
        let s1 = Some((30, "Boxes"));
        let s2 = Some((31, "Piano"));
        let rows = vec![
            row(c, Some((300, "Small")), s1, Some(5.0)),
            row(c, Some((301, "Medium")), s1, None),
            row(c, Some((302, "Large")), s1, Some(15.0)),
            row(c, Some((300, "Small")), s2, None),
            row(c, Some((301, "Medium")), s2, Some(80.0)),
            row(c, Some((302, "Large")), s2, None),
        ];
        let tables = reassemble(rows, true);
        let t = &tables[0];

        // headers are not repeated per service
        assert_eq!(t.headers.len(), 3);
        assert_eq!(t.services[0].service_id, 30);
        assert_eq!(t.services[1].service_id, 31);

        let boxes = &t.services[0].prices;
        assert_eq!(boxes.get(&300), Some(&Some(5.0)));
        assert_eq!(boxes.get(&301), Some(&None));
        assert!(!boxes.contains_key(&302));

        let piano = &t.services[1].prices;
        assert_eq!(piano.get(&300), Some(&None));
        assert_eq!(piano.get(&301), Some(&Some(80.0)));
        assert!(!piano.contains_key(&302));
    }

    #[test]
    fn categories_come_out_in_id_order() {
        let rows = vec![
            row((2, "Second"), Some((20, "Only")), Some((200, "B")), Some(1.0)),
            row((1, "First"), Some((10, "Only")), Some((100, "A")), Some(1.0)),
        ];
        let ids: Vec<_> = reassemble(rows, true).iter().map(|t| t.category_id).collect();
        assert_eq!(ids, [1, 2]);
    }

    #[test]
    fn empty_joins_do_not_invent_headers_or_services() {
        let rows = vec![
            row((1, "No services"), Some((10, "Basic")), None, None),
            row((2, "Bare"), None, None, None),
        ];
        let tables = reassemble(rows, true);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].headers.len(), 1);
        assert!(tables[0].services.is_empty());
        assert!(tables[1].headers.is_empty());
        assert!(tables[1].services.is_empty());
    }

    #[test]
    fn serializes_in_front_end_shape() {
        let v = serde_json::to_value(reassemble(cleaning_rows(), true)).unwrap();
        assert_eq!(
            v,
            json!([{
                "categoryID": 1,
                "category_name": "Cleaning",
                "headers": [
                    { "id": 100, "name": "Basic" },
                    { "id": 101, "name": "Premium" }
                ],
                "services": [{
                    "service_id": 10,
                    "name": "Window Wash",
                    "prices": { "100": 10.0 }
                }]
            }])
        );
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn written_table_reads_back(db: PgPool) {
        use crate::catalog::{add_table, write::sample_table};

        let table = sample_table(
            "Cleaning",
            &["Basic", "Premium"],
            &["Window Wash"],
            &[(1, 1, 10.0), (1, 2, 20.0)],
        );
        let created = add_table(&db, &table).await.unwrap();
        let (basic, premium) = (created.header_ids[0], created.header_ids[1]);

        let tables = fetch_tables(&db, true).await.unwrap();
        assert_eq!(tables.len(), 1);
        let t = &tables[0];
        assert_eq!(t.category_id, created.category_id);
        assert_eq!(t.category_name, "Cleaning");
        let names: Vec<_> = t.headers.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, ["Basic", "Premium"]);
        assert_eq!(t.services.len(), 1);
        assert_eq!(t.services[0].name, "Window Wash");
        assert_eq!(t.services[0].prices, BTreeMap::from([(basic, Some(10.0))]));

        let full = fetch_tables(&db, false).await.unwrap();
        assert_eq!(
            full[0].services[0].prices,
            BTreeMap::from([(basic, Some(10.0)), (premium, Some(20.0))])
        );
    }
}
