use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use tokio::signal;
use tracing::{error, info, warn};

use ambulance_dispatch::config::{DatabaseConfig, EnvironmentConfig};
use ambulance_dispatch::repositories::{DispatchStore, MemoryDispatchStore, PgDispatchStore};
use ambulance_dispatch::services::{EventBus, RedisEventPublisher};
use ambulance_dispatch::utils::metrics::DispatchMetrics;
use ambulance_dispatch::{build_app, database, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();
    let config = EnvironmentConfig::from_env()?;

    // Configurar logging
    let level = tracing::Level::from_str(&config.log_level).unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();

    info!("🚑 Ambulance Dispatch - Backend");
    info!("================================================");
    info!("🌍 Entorno: {}", config.environment);

    // Store: PostgreSQL si hay DATABASE_URL, memoria en otro caso
    let store: Arc<dyn DispatchStore> = match DatabaseConfig::from_environment(&config) {
        Some(db_config) => {
            let pool = match database::connect(&db_config).await {
                Ok(pool) => pool,
                Err(e) => {
                    error!("❌ Error conectando a la base de datos: {:#}", e);
                    return Err(e);
                }
            };
            info!("✅ Base de datos conectada");
            Arc::new(PgDispatchStore::new(pool))
        }
        None => {
            warn!("⚠️ DATABASE_URL no configurada: usando store en memoria");
            Arc::new(MemoryDispatchStore::new())
        }
    };

    // Notificaciones: Redis es opcional y nunca bloquea el arranque
    let mut events = EventBus::default();
    if let Some(redis_url) = &config.redis_url {
        match RedisEventPublisher::connect(redis_url).await {
            Ok(publisher) => events = events.with_publisher(Arc::new(publisher)),
            Err(e) => warn!("⚠️ Redis no disponible, solo notificaciones locales: {}", e),
        }
    }

    let metrics = DispatchMetrics::new().context("could not register metrics")?;
    let addr: SocketAddr = config
        .server_url()
        .parse()
        .with_context(|| format!("invalid HOST/PORT: {}", config.server_url()))?;

    let app = build_app(AppState::new(config, store, events, metrics));

    info!("🌐 Servidor iniciando en http://{}", addr);
    info!("🔍 Endpoints disponibles:");
    info!("   GET  /health - Estado del servicio");
    info!("   GET  /metrics - Métricas Prometheus");
    info!("🚑 Flota:");
    info!("   POST /api/ambulances - Registrar ambulancia");
    info!("   GET  /api/ambulances - Listar ambulancias");
    info!("   PUT  /api/ambulances/:id/status - Cambiar estado");
    info!("   POST /api/drivers - Registrar conductor");
    info!("   GET  /api/drivers - Listar conductores");
    info!("   PUT  /api/drivers/:id/location - Reportar ubicación");
    info!("   GET  /api/fleet/ambulances - Ambulancias disponibles");
    info!("   GET  /api/fleet/drivers - Conductores disponibles");
    info!("📋 Reservas:");
    info!("   POST /api/bookings - Crear reserva");
    info!("   PUT  /api/bookings/:id/assign - Asignar recursos");
    info!("   PUT  /api/bookings/:id/status - Avanzar estado");
    info!("   PUT  /api/bookings/:id/cancel - Cancelar");
    info!("   GET  /api/bookings/:id/tracking - Seguimiento");
    info!("   GET  /api/bookings/:id/events - Eventos en vivo (SSE)");
    info!("🗺️ Viajes:");
    info!("   GET  /api/trips/active - Viajes activos");
    info!("   GET  /api/trips/completed - Viajes completados");
    info!("   GET  /api/trips/patient/:patient_id - Historial del paciente");
    info!("   GET  /api/trips/mine - Viajes del actor");
    info!("📡 Despacho:");
    info!("   GET  /api/dispatch/queue - Cola de prioridad");
    info!("   GET  /api/dispatch/summary - Resumen de la flota");
    info!("   POST /api/dispatch/auto/:booking_id - Asignación automática");
    info!("   POST /api/dispatch/next - Despachar la siguiente");

    // Iniciar servidor en background
    let server_handle = tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| {
                error!("❌ Error del servidor: {}", e);
                e
            })
    });

    // Esperar a que el servidor termine
    if let Err(e) = server_handle.await? {
        error!("❌ Servidor terminó con error: {}", e);
    }

    info!("👋 Servidor terminado");
    Ok(())
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ No se pudo escuchar Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("❌ No se pudo instalar el manejador de SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }
}
