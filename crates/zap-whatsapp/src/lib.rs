//! WhatsApp session client built on `whatsapp-rust`.
//!
//! The library owns the multi-device protocol and persists credentials in a
//! SQLite store under the session directory, so a paired device reconnects
//! without a new QR code.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};
use wacore_binary::jid::Jid as WaJid;
use waproto::whatsapp as wa;
use whatsapp_rust::{bot::Bot, client::Client, store::SqliteStore, types::events::Event};
use whatsapp_rust_tokio_transport::TokioWebSocketTransportFactory;
use whatsapp_rust_ureq_http_client::UreqHttpClient;

use zap_core::{
    domain::Jid,
    errors::Error,
    messaging::{bus::EventBus, port::SessionClient, types::InboundEvent},
    Result,
};

pub mod events;
pub mod pairing;

use events::Link;

const SESSION_DB: &str = "whatsapp.db";
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct WhatsAppConfig {
    pub session_dir: PathBuf,
    /// How long to wait for the first `Connected`, QR scanning included.
    pub pairing_timeout: Duration,
}

struct Running {
    client: Arc<Client>,
    handle: JoinHandle<()>,
}

pub struct WhatsAppClient {
    db_path: String,
    pairing_timeout: Duration,
    running: Mutex<Option<Running>>,
}

impl WhatsAppClient {
    pub fn new(cfg: WhatsAppConfig) -> Result<Self> {
        let db = cfg.session_dir.join(SESSION_DB);
        let db_path = db
            .to_str()
            .ok_or_else(|| {
                Error::ClientInit(format!("session path is not valid UTF-8: {}", db.display()))
            })?
            .to_string();

        Ok(Self {
            db_path,
            pairing_timeout: cfg.pairing_timeout,
            running: Mutex::new(None),
        })
    }

    fn client(&self) -> Option<Arc<Client>> {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|r| r.client.clone())
    }
}

fn handle_event(event: Event, bus: &EventBus, link: &watch::Sender<Link>) {
    match event {
        Event::PairingQrCode { code, .. } => pairing::show_pairing_code(&code),
        Event::PairSuccess(_) => info!("pairing succeeded"),
        Event::PairError(e) => {
            warn!("pairing failed: {e:?}");
            link.send_replace(Link::PairFailed);
        }
        Event::Connected(_) => {
            link.send_replace(Link::Connected);
            bus.publish(&InboundEvent::Connected);
        }
        Event::Disconnected(_) => {
            bus.publish(&InboundEvent::Disconnected);
        }
        Event::LoggedOut(_) => {
            link.send_replace(Link::LoggedOut);
            bus.publish(&InboundEvent::LoggedOut);
        }
        Event::Message(msg, info) => {
            let src = &info.source;
            match events::text_message(
                &msg,
                &src.chat.to_string(),
                &src.sender.to_string(),
                src.is_group,
            ) {
                Some(ev) => {
                    bus.publish(&ev);
                }
                None => debug!(chat = %src.chat, "skipping message with unusable addresses"),
            }
        }
        _ => {}
    }
}

#[async_trait]
impl SessionClient for WhatsAppClient {
    async fn connect(&self, events: Arc<EventBus>) -> Result<()> {
        let backend = Arc::new(
            SqliteStore::new(&self.db_path)
                .await
                .map_err(|e| Error::ClientInit(format!("opening {}: {e}", self.db_path)))?,
        );

        let (link_tx, mut link_rx) = watch::channel(Link::Starting);
        let link_tx = Arc::new(link_tx);
        let mut bot = Bot::builder()
            .with_backend(backend)
            .with_transport_factory(TokioWebSocketTransportFactory::new())
            .with_http_client(UreqHttpClient::new())
            .on_event(move |event, _client| {
                handle_event(event, &events, &link_tx);
                async {}
            })
            .build()
            .await
            .map_err(|e| Error::ClientInit(format!("building client: {e}")))?;

        let client = bot.client();
        let handle = bot
            .run()
            .await
            .map_err(|e| Error::Connect(format!("starting client: {e}")))?;

        if let Err(e) = events::wait_until_connected(&mut link_rx, self.pairing_timeout).await {
            client.disconnect().await;
            handle.abort();
            return Err(e);
        }

        let previous = self
            .running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(Running { client, handle });
        if let Some(old) = previous {
            old.handle.abort();
        }
        info!(store = %self.db_path, "whatsapp session ready");
        Ok(())
    }

    async fn send_text(&self, to: &Jid, text: &str) -> Result<()> {
        let client = self
            .client()
            .ok_or_else(|| Error::Send("client is not connected".to_string()))?;
        let jid: WaJid = to
            .to_string()
            .parse()
            .map_err(|e| Error::InvalidJid(format!("{to}: {e:?}")))?;
        let message = wa::Message {
            conversation: Some(text.to_string()),
            ..Default::default()
        };

        client
            .send_message(jid, message)
            .await
            .map_err(|e| Error::Send(e.to_string()))?;
        debug!(to = %to, "message sent");
        Ok(())
    }

    async fn close(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(Running { client, mut handle }) = running else {
            return;
        };

        client.disconnect().await;
        if tokio::time::timeout(STOP_TIMEOUT, &mut handle).await.is_err() {
            warn!("client did not stop within {}s, aborting", STOP_TIMEOUT.as_secs());
            handle.abort();
        }
    }
}
