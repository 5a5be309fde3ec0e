//! Read-side command handlers.

/// Print the top `limit` active products, highest score first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub(crate) async fn print_trends(pool: &sqlx::PgPool, limit: i64) -> anyhow::Result<()> {
    let rows = trendwatch_db::list_top_products(pool, limit.clamp(1, 100)).await?;

    if rows.is_empty() {
        println!("no trending products yet; run `trendwatch-cli scan` first");
        return Ok(());
    }

    println!(
        "{:>4}  {:>6}  {:<12}  {:>8}  {:>9}  name",
        "id", "score", "category", "volume", "price"
    );
    for row in &rows {
        let price = row
            .price_estimate
            .map_or_else(|| "N/A".to_string(), |p| format!("{p:.2}"));
        println!(
            "{:>4}  {:>6.2}  {:<12}  {:>8}  {:>9}  {}",
            row.id, row.trend_score, row.category, row.search_volume, price, row.name
        );
    }
    Ok(())
}

/// Archive products not updated for `days` days that score below 50.
///
/// # Errors
///
/// Returns an error if the update fails.
pub(crate) async fn archive(pool: &sqlx::PgPool, days: u32) -> anyhow::Result<()> {
    let days = i32::try_from(days).unwrap_or(i32::MAX);
    let archived = trendwatch_db::archive_stale_products(pool, days, 50.0).await?;
    println!("archived {archived} products not updated in {days} days");
    Ok(())
}
