//! Transport over Zenoh pub/sub

use std::sync::Mutex;

use futures::future::BoxFuture;
use zenoh::key_expr::KeyExpr;
use zenoh::sample::Sample;

use crate::error::{DuelError, Result};
use crate::network::keyexpr::KeyexprRoomState;
use crate::network::transport::{Delivery, Transport};
use crate::types::{PlayerId, RoomId};

/// Publishes snapshots on `<prefix>/room/<room_id>/state/<player_id>` and
/// subscribes to `<prefix>/room/<room_id>/state/*`
///
/// The sender is recovered from the last chunk of the sample keyexpr.
pub struct ZenohTransport {
    session: zenoh::Session,
    prefix: KeyExpr<'static>,
    subscribers: Mutex<Vec<zenoh::pubsub::Subscriber<()>>>,
}

impl std::fmt::Debug for ZenohTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZenohTransport")
            .field("prefix", &self.prefix)
            .field(
                "subscribers",
                &self.subscribers.lock().map(|s| s.len()).unwrap_or_default(),
            )
            .finish()
    }
}

impl ZenohTransport {
    pub fn new(session: zenoh::Session, prefix: impl Into<KeyExpr<'static>>) -> Self {
        Self {
            session,
            prefix: prefix.into(),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn session(&self) -> &zenoh::Session {
        &self.session
    }

    fn delivery_from_sample(sample: &Sample) -> Result<Delivery> {
        let keyexpr = KeyexprRoomState::try_from(sample.key_expr().clone())?;
        let sender = keyexpr.player().clone().ok_or_else(|| {
            DuelError::InvalidKeyexpr(format!(
                "Received sample with wildcard sender in keyexpr '{}'",
                sample.key_expr()
            ))
        })?;
        Ok(Delivery {
            sender,
            payload: sample.payload().to_bytes().into_owned(),
        })
    }
}

impl Transport for ZenohTransport {
    fn publish<'a>(
        &'a self,
        room: &'a RoomId,
        sender: &'a PlayerId,
        payload: Vec<u8>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let keyexpr: KeyExpr =
                KeyexprRoomState::new(self.prefix.clone(), Some(room.clone()), Some(sender.clone())).into();
            self.session
                .put(keyexpr, payload)
                .await
                .map_err(DuelError::Zenoh)?;
            Ok(())
        })
    }

    fn subscribe<'a>(&'a self, room: &'a RoomId) -> BoxFuture<'a, Result<flume::Receiver<Delivery>>> {
        Box::pin(async move {
            let keyexpr: KeyExpr = KeyexprRoomState::new(self.prefix.clone(), Some(room.clone()), None).into();
            let (tx, rx) = flume::unbounded();

            let subscriber = self
                .session
                .declare_subscriber(keyexpr)
                .callback(move |sample| match Self::delivery_from_sample(&sample) {
                    Ok(delivery) => {
                        let _ = tx.send(delivery);
                    }
                    Err(e) => {
                        tracing::debug!("Ignoring sample on '{}': {}", sample.key_expr(), e);
                    }
                })
                .await
                .map_err(DuelError::Zenoh)?;

            self.subscribers
                .lock()
                .map_err(|_| DuelError::Internal("subscriber list lock poisoned".to_string()))?
                .push(subscriber);
            Ok(rx)
        })
    }
}
