//! `mqk db migrate` / `mqk db status`.

use anyhow::Result;

use super::connect;

pub async fn migrate(db_path: Option<&str>) -> Result<()> {
    let pool = connect(db_path).await?;
    mqk_db::migrate(&pool).await?;
    println!("migrations_applied=true");
    Ok(())
}

pub async fn status(db_path: Option<&str>) -> Result<()> {
    let pool = connect(db_path).await?;
    let holdings = mqk_db::holdings_count(&pool).await?;
    println!("db_ok=true open_positions={holdings}");
    Ok(())
}
