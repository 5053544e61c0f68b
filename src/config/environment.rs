//! Configuración de variables de entorno
//!
//! Todas las variables son opcionales y tienen un valor por defecto; un valor
//! presente pero mal formado es un error de arranque, nunca un panic.

use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};
use rust_decimal::Decimal;

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub port: u16,
    pub host: String,
    /// Sin URL el servicio arranca con el store en memoria
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub redis_url: Option<String>,
    pub cors_origins: Vec<String>,
    pub log_level: String,
    pub tracking_poll_interval_secs: u64,
    pub charge_per_km: Decimal,
    pub charge_emergency_surcharge: Decimal,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            port: 3000,
            host: "0.0.0.0".to_string(),
            database_url: None,
            database_max_connections: 10,
            redis_url: None,
            cors_origins: Vec::new(),
            log_level: "info".to_string(),
            tracking_poll_interval_secs: 5,
            charge_per_km: Decimal::new(2500, 2),
            charge_emergency_surcharge: Decimal::new(50000, 2),
        }
    }
}

impl EnvironmentConfig {
    /// Leer la configuración del proceso (tras `dotenvy::dotenv()`)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Construir la configuración a partir de una fuente de variables arbitraria
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Ok(Self {
            environment: get("ENVIRONMENT").unwrap_or(defaults.environment),
            port: parse_or(get("PORT"), "PORT", defaults.port)?,
            host: get("HOST").unwrap_or(defaults.host),
            database_url: get("DATABASE_URL"),
            database_max_connections: parse_or(
                get("DATABASE_MAX_CONNECTIONS"),
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )?,
            redis_url: get("REDIS_URL"),
            cors_origins: get("CORS_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            log_level: get("LOG_LEVEL").unwrap_or(defaults.log_level),
            tracking_poll_interval_secs: parse_or(
                get("TRACKING_POLL_INTERVAL_SECS"),
                "TRACKING_POLL_INTERVAL_SECS",
                defaults.tracking_poll_interval_secs,
            )?,
            charge_per_km: parse_or(get("CHARGE_PER_KM"), "CHARGE_PER_KM", defaults.charge_per_km)?,
            charge_emergency_surcharge: parse_or(
                get("CHARGE_EMERGENCY_SURCHARGE"),
                "CHARGE_EMERGENCY_SURCHARGE",
                defaults.charge_emergency_surcharge,
            )?,
        })
    }

    /// Verificar si estamos en modo desarrollo
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Obtener la dirección de escucha del servidor
    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(value: Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", name, raw)),
        None => Ok(default),
    }
}
