//! Bus de eventos de despacho
//!
//! Difusión en proceso (`tokio::sync::broadcast`) más publicadores externos
//! opcionales, como Redis pub/sub. La publicación es best-effort: un fallo
//! se registra y nunca deshace la mutación que lo originó.

use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use redis::{aio::ConnectionManager, AsyncCommands};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::models::{DispatchEvent, DispatchEventKind};

/// Canal Redis con todos los eventos
pub const EVENTS_CHANNEL: &str = "ambulance_dispatch:events";

pub fn booking_channel(booking_id: i64) -> String {
    format!("ambulance_dispatch:booking:{}", booking_id)
}

/// Destino externo de las notificaciones
#[async_trait]
pub trait EventPublisher: Send + Sync {
    fn name(&self) -> &'static str;
    async fn publish(&self, event: &DispatchEvent) -> anyhow::Result<()>;
}

/// Publicador Redis pub/sub
#[derive(Clone)]
pub struct RedisEventPublisher {
    manager: ConnectionManager,
}

impl RedisEventPublisher {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        info!("🔗 Conectando a Redis para notificaciones");

        let client = redis::Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;

        let mut conn = manager.clone();
        let _: () = redis::cmd("PING").query_async(&mut conn).await?;

        info!("✅ Redis conectado exitosamente");
        Ok(Self { manager })
    }
}

#[async_trait]
impl EventPublisher for RedisEventPublisher {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn publish(&self, event: &DispatchEvent) -> anyhow::Result<()> {
        let payload = serde_json::to_string(event)?;
        let mut conn = self.manager.clone();
        let _: i64 = conn.publish(EVENTS_CHANNEL, &payload).await?;
        let _: i64 = conn
            .publish(booking_channel(event.booking_id), &payload)
            .await?;
        Ok(())
    }
}

/// Eventos en cola por publicador externo antes de empezar a descartar
const PUBLISHER_QUEUE: usize = 1024;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DispatchEvent>,
    publishers: Vec<mpsc::Sender<DispatchEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            publishers: Vec::new(),
        }
    }

    /// Registra un publicador externo. Cada publicador tiene una única tarea
    /// que consume su cola en orden, así los eventos de una reserva llegan
    /// en el mismo orden en que se produjeron. Requiere un runtime de tokio.
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        let (tx, mut rx) = mpsc::channel::<DispatchEvent>(PUBLISHER_QUEUE);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = publisher.publish(&event).await {
                    warn!(
                        "⚠️ No se pudo publicar el evento {} en {}: {}",
                        event.id,
                        publisher.name(),
                        e
                    );
                }
            }
            debug!("📪 Publicador {} detenido", publisher.name());
        });
        self.publishers.push(tx);
        self
    }

    /// Entrega el evento a los suscriptores locales y lo encola para los
    /// publicadores externos
    pub fn publish(&self, event: DispatchEvent) {
        debug!(
            "📣 {:?} reserva {} ({})",
            event.kind, event.booking_id, event.status
        );

        for publisher in &self.publishers {
            if let Err(e) = publisher.try_send(event.clone()) {
                warn!(
                    "⚠️ Cola de publicación llena o cerrada, evento {} descartado: {}",
                    event.id, e
                );
            }
        }

        // Sin suscriptores el envío falla; no es un error
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.sender.subscribe()
    }

    /// Eventos de una sola reserva. El stream termina tras el evento que la
    /// lleva a un estado terminal.
    pub fn booking_stream(&self, booking_id: i64) -> impl Stream<Item = DispatchEvent> + Send {
        let receiver = self.sender.subscribe();
        futures::stream::unfold(Some(receiver), move |state| async move {
            let mut receiver = state?;
            loop {
                match receiver.recv().await {
                    Ok(event) if event.booking_id == booking_id => {
                        let finished = event.status.is_terminal()
                            && event.kind != DispatchEventKind::LocationUpdated;
                        let next = if finished { None } else { Some(receiver) };
                        return Some((event, next));
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(
                            "⚠️ Suscriptor de la reserva {} perdió {} eventos",
                            booking_id, skipped
                        );
                        continue;
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        })
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
