use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use crate::models::product::{ConfirmStatus, NewProduct, ProductQuery, ProductRecord};

const PRODUCT_COLUMNS: &str = "id, product_id, title, shop_name, sale_region, is_valid, \
     confirm_status, commission_rate, commission_amount, commission_currency, \
     last_check_time, created_at, updated_at";

fn row_to_record(r: &PgRow) -> Result<ProductRecord, sqlx::Error> {
    let status_str: String = r.try_get("confirm_status")?;
    let confirm_status = status_str.parse().unwrap_or(ConfirmStatus::Pending);

    Ok(ProductRecord {
        id: r.try_get("id")?,
        product_id: r.try_get("product_id")?,
        title: r.try_get("title")?,
        shop_name: r.try_get("shop_name")?,
        sale_region: r.try_get("sale_region")?,
        is_valid: r.try_get("is_valid")?,
        confirm_status,
        commission_rate: r.try_get("commission_rate")?,
        commission_amount: r.try_get("commission_amount")?,
        commission_currency: r.try_get("commission_currency")?,
        last_check_time: r.try_get("last_check_time")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

/// Count every monitored product
pub async fn count_total_products(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT COUNT(*) AS total FROM tts_product_monitor")
        .fetch_one(pool)
        .await?;
    row.try_get("total")
}

/// One page of product IDs, ordered by primary key for stable offsets
pub async fn select_product_ids_page(
    pool: &PgPool,
    offset: i64,
    limit: i64,
) -> Result<Vec<String>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT product_id
        FROM tts_product_monitor
        ORDER BY id ASC
        OFFSET $1
        LIMIT $2
        "#,
    )
    .bind(offset)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(|r| r.try_get("product_id")).collect()
}

/// Set validity and last-check time for a group of products in one statement
pub async fn batch_update_valid_status(
    pool: &PgPool,
    product_ids: &[String],
    is_valid: bool,
    checked_at: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE tts_product_monitor
        SET is_valid = $1,
            last_check_time = $2,
            updated_at = NOW()
        WHERE product_id = ANY($3)
        "#,
    )
    .bind(is_valid)
    .bind(checked_at)
    .bind(product_ids)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Invalid products nobody has acknowledged yet (alert candidates)
pub async fn select_invalid_unconfirmed(pool: &PgPool) -> Result<Vec<ProductRecord>, sqlx::Error> {
    let sql = format!(
        "SELECT {PRODUCT_COLUMNS} FROM tts_product_monitor \
         WHERE is_valid = FALSE AND confirm_status = 'pending' \
         ORDER BY id ASC"
    );
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    rows.iter().map(row_to_record).collect()
}

/// Get a product by its upstream ID
pub async fn find_by_product_id(
    pool: &PgPool,
    product_id: &str,
) -> Result<Option<ProductRecord>, sqlx::Error> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM tts_product_monitor WHERE product_id = $1");
    let row = sqlx::query(&sql)
        .bind(product_id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(row_to_record).transpose()
}

/// Get every stored product among `product_ids`
pub async fn find_by_product_ids(
    pool: &PgPool,
    product_ids: &[String],
) -> Result<Vec<ProductRecord>, sqlx::Error> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM tts_product_monitor WHERE product_id = ANY($1)");
    let rows = sqlx::query(&sql).bind(product_ids).fetch_all(pool).await?;
    rows.iter().map(row_to_record).collect()
}

/// Insert products, silently skipping IDs that already exist
pub async fn batch_insert_ignore(pool: &PgPool, products: &[NewProduct]) -> Result<u64, sqlx::Error> {
    if products.is_empty() {
        return Ok(0);
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "INSERT INTO tts_product_monitor (product_id, title, shop_name, sale_region, is_valid, \
         confirm_status, commission_rate, commission_amount, commission_currency, last_check_time) ",
    );
    builder.push_values(products, |mut b, p| {
        b.push_bind(&p.product_id)
            .push_bind(&p.title)
            .push_bind(&p.shop_name)
            .push_bind(&p.sale_region)
            .push_bind(p.is_valid)
            .push_bind(ConfirmStatus::Pending.as_str())
            .push_bind(p.commission_rate)
            .push_bind(&p.commission_amount)
            .push_bind(&p.commission_currency)
            .push_bind(p.last_check_time);
    });
    builder.push(" ON CONFLICT (product_id) DO NOTHING");

    let result = builder.build().execute(pool).await?;
    Ok(result.rows_affected())
}

/// Acknowledge an invalid product. Only pending, invalid rows are touched.
pub async fn mark_confirmed(pool: &PgPool, product_id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE tts_product_monitor
        SET confirm_status = 'confirmed',
            updated_at = NOW()
        WHERE product_id = $1
          AND is_valid = FALSE
          AND confirm_status = 'pending'
        "#,
    )
    .bind(product_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Delete a product unless it is invalid and still unacknowledged
pub async fn delete_by_product_id(pool: &PgPool, product_id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM tts_product_monitor
        WHERE product_id = $1
          AND NOT (is_valid = FALSE AND confirm_status = 'pending')
        "#,
    )
    .bind(product_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

fn push_filters<'a>(builder: &mut QueryBuilder<'a, Postgres>, query: &'a ProductQuery) {
    builder.push(" WHERE TRUE");
    if let Some(is_valid) = query.is_valid {
        builder.push(" AND is_valid = ").push_bind(is_valid);
    }
    if let Some(region) = query.sale_region.as_deref().filter(|r| !r.trim().is_empty()) {
        builder.push(" AND sale_region = ").push_bind(region);
    }
    if let Some(status) = query.confirm_status {
        builder.push(" AND confirm_status = ").push_bind(status.as_str());
    }
    if let Some(keyword) = query.keyword.as_deref().filter(|k| !k.trim().is_empty()) {
        builder
            .push(" AND product_id LIKE ")
            .push_bind(format!("%{}%", keyword.trim()));
    }
}

/// Filtered, paginated product list plus the unpaginated match count
pub async fn list_products(
    pool: &PgPool,
    query: &ProductQuery,
) -> Result<(Vec<ProductRecord>, i64), sqlx::Error> {
    let mut count: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT COUNT(*) AS total FROM tts_product_monitor");
    push_filters(&mut count, query);
    let total: i64 = count.build().fetch_one(pool).await?.try_get("total")?;

    let mut select: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM tts_product_monitor"));
    push_filters(&mut select, query);
    select
        .push(" ORDER BY updated_at DESC, id DESC LIMIT ")
        .push_bind(i64::from(query.size))
        .push(" OFFSET ")
        .push_bind(query.offset() as i64);

    let rows = select.build().fetch_all(pool).await?;
    let records = rows.iter().map(row_to_record).collect::<Result<Vec<_>, _>>()?;
    Ok((records, total))
}
