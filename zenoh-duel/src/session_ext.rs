use std::time::Duration;

use zenoh::{key_expr::KeyExpr, Resolvable};

use crate::config::SyncConfig;
use crate::error::Result;
use crate::network::ZenohTransport;
use crate::room::ZenohRoomStore;

/// Extension trait for zenoh::Session to declare duel collaborators
pub trait SessionExt {
    /// Declare the snapshot transport of this session
    ///
    /// # Example
    /// ```no_run
    /// use zenoh_duel::SessionExt;
    ///
    /// # async fn example() {
    /// let session = zenoh::open(zenoh::Config::default()).await.unwrap();
    /// let transport = session.declare_duel_transport().await.unwrap();
    /// let rooms = session.declare_room_store().await.unwrap();
    /// # }
    /// ```
    fn declare_duel_transport(&self) -> TransportBuilder<'_>;

    /// Declare a room store serving the rooms created through it
    fn declare_room_store(&self) -> RoomStoreBuilder<'_>;
}

impl SessionExt for zenoh::Session {
    fn declare_duel_transport(&self) -> TransportBuilder<'_> {
        TransportBuilder {
            session: self,
            prefix: SyncConfig::default().keyexpr_prefix,
        }
    }

    fn declare_room_store(&self) -> RoomStoreBuilder<'_> {
        let config = SyncConfig::default();
        let query_timeout = config.step_timeout();
        RoomStoreBuilder {
            session: self,
            prefix: config.keyexpr_prefix,
            query_timeout,
        }
    }
}

/// Builder for [`ZenohTransport`]
#[must_use = "Resolvables do nothing unless you resolve them using `.await` or `zenoh::Wait::wait`"]
pub struct TransportBuilder<'a> {
    session: &'a zenoh::Session,
    prefix: KeyExpr<'static>,
}

impl TransportBuilder<'_> {
    /// Set the key expression prefix
    pub fn prefix(mut self, prefix: KeyExpr<'static>) -> Self {
        self.prefix = prefix;
        self
    }
}

impl Resolvable for TransportBuilder<'_> {
    type To = Result<ZenohTransport>;
}

impl<'a> std::future::IntoFuture for TransportBuilder<'a> {
    type Output = <Self as Resolvable>::To;
    type IntoFuture = std::pin::Pin<Box<dyn std::future::Future<Output = Self::Output> + Send + 'a>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { Ok(ZenohTransport::new(self.session.clone(), self.prefix)) })
    }
}

/// Builder for [`ZenohRoomStore`]
#[must_use = "Resolvables do nothing unless you resolve them using `.await` or `zenoh::Wait::wait`"]
pub struct RoomStoreBuilder<'a> {
    session: &'a zenoh::Session,
    prefix: KeyExpr<'static>,
    query_timeout: Duration,
}

impl RoomStoreBuilder<'_> {
    /// Set the key expression prefix
    pub fn prefix(mut self, prefix: KeyExpr<'static>) -> Self {
        self.prefix = prefix;
        self
    }

    /// Set how long a query waits for the owner of a room, in milliseconds
    pub fn query_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.query_timeout = Duration::from_millis(timeout_ms);
        self
    }
}

impl Resolvable for RoomStoreBuilder<'_> {
    type To = Result<ZenohRoomStore>;
}

impl<'a> std::future::IntoFuture for RoomStoreBuilder<'a> {
    type Output = <Self as Resolvable>::To;
    type IntoFuture = std::pin::Pin<Box<dyn std::future::Future<Output = Self::Output> + Send + 'a>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { ZenohRoomStore::declare(self.session, self.prefix, self.query_timeout).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::RoomStore;
    use crate::types::PlayerId;

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_builders_resolve() {
        let session = zenoh::open(zenoh::Config::default()).await.unwrap();
        let prefix = KeyExpr::try_from("test/duel/session_ext").unwrap();
        let _transport = session
            .declare_duel_transport()
            .prefix(prefix.clone())
            .await
            .unwrap();
        let rooms = session
            .declare_room_store()
            .prefix(prefix)
            .query_timeout_ms(200)
            .await
            .unwrap();
        let host = PlayerId::from_name("host".to_string()).unwrap();
        let room = rooms.create_room(&host).await.unwrap();
        assert_eq!(rooms.get_room(&room.id).await.unwrap().host, host);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_room_store_builder_defaults() {
        let session = zenoh::open(zenoh::Config::default()).await.unwrap();
        let config = SyncConfig::default();
        let builder = session.declare_room_store();
        assert_eq!(builder.prefix, config.keyexpr_prefix);
        assert_eq!(builder.query_timeout, config.step_timeout());
    }
}
