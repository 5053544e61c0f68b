//! Configuración de conexión a PostgreSQL
//!
//! Este módulo abre el pool y aplica las migraciones de `migrations/`.

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;

use crate::config::DatabaseConfig;

/// Crear un pool de conexiones y dejar el esquema al día
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    info!("🗄️ Conectando a {}", mask_database_url(&config.url));

    let pool = config
        .create_pool()
        .await
        .context("could not connect to PostgreSQL")?;
    run_migrations(&pool).await?;

    Ok(pool)
}

/// Ejecutar migraciones de la base de datos
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("failed to apply database migrations")?;
    info!("✅ Migraciones aplicadas");
    Ok(())
}

/// Función helper para enmascarar la URL de la base de datos en logs
pub fn mask_database_url(url: &str) -> String {
    let Some(at_pos) = url.find('@') else {
        return url.to_string();
    };
    let scheme_end = url.find("://").map(|i| i + 3).unwrap_or(0);
    if scheme_end > at_pos || !url[scheme_end..at_pos].contains(':') {
        return url.to_string();
    }
    format!("{}***:***@{}", &url[..scheme_end], &url[at_pos + 1..])
}
