use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{CatalogCache, Collector, CollectorResult};
use crate::constants::{MAX_STREAMS, SOURCE_TWITCH};
use crate::helix::types::{HelixGame, HelixStream};
use crate::helix::{HelixClient, HelixConfig, HelixErr, HelixResult};
use crate::storage::{JsonFileStore, RawSink};
use crate::summary::{GameSummary, RawSnapshot, summarize};
use crate::util::env::Env;

/// Entry in the trending games list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendingGame {
    pub name: String,
    pub id: String,
}

impl From<HelixGame> for TrendingGame {
    fn from(game: HelixGame) -> Self {
        Self {
            name: game.name,
            id: game.id,
        }
    }
}

/// Collects live viewership for games from twitch.
///
/// The helix client (credential + request pacing) and the catalog cache are shared handles;
/// build several collectors from the same pair to have them behave as one source.
pub struct TwitchCollector {
    helix: HelixClient,
    catalog: Arc<CatalogCache>,
    sink: Option<Arc<dyn RawSink>>,
    max_streams: usize,
}

impl TwitchCollector {
    pub fn new(helix: HelixClient, catalog: Arc<CatalogCache>, sink: Arc<dyn RawSink>) -> Self {
        Self {
            helix,
            catalog,
            sink: Some(sink),
            max_streams: MAX_STREAMS,
        }
    }

    /// Builds a collector with fresh shared state, persisting to the configured data directories.
    pub fn from_env(env: &Env) -> CollectorResult<Self> {
        let helix = HelixClient::new(HelixConfig::from(env))?;
        let store = JsonFileStore::new(&env.raw_data_dir, &env.processed_data_dir);

        Ok(Self::new(helix, Arc::new(CatalogCache::new()), Arc::new(store))
            .with_max_streams(env.max_streams))
    }

    pub fn with_max_streams(mut self, max_streams: usize) -> Self {
        self.max_streams = max_streams;
        self
    }

    /// Disables raw snapshot writes.
    pub fn without_persistence(mut self) -> Self {
        self.sink = None;
        self
    }

    pub fn helix(&self) -> &HelixClient {
        &self.helix
    }

    pub fn catalog(&self) -> &Arc<CatalogCache> {
        &self.catalog
    }

    /// Runs [`super::collect_batch`] over this collector.
    pub async fn collect_batch(
        self: &Arc<Self>,
        game_names: &[String],
        max_workers: usize,
    ) -> Vec<GameSummary> {
        super::collect_batch(Arc::clone(self), game_names, max_workers).await
    }

    #[instrument(skip(self), fields(source = SOURCE_TWITCH))]
    /// Maps a game title to its helix id.
    ///
    /// Hits are cached for the lifetime of the catalog cache. A title helix doesn't know is not
    /// cached, so a later call looks it up again. Lookup failures are logged and read as a miss,
    /// except for authentication failures, which are returned.
    pub async fn resolve_game_id(&self, game_name: &str) -> HelixResult<Option<String>> {
        if let Some(id) = self.catalog.get(game_name) {
            return Ok(Some(id));
        }

        match self.helix.games_by_name(game_name).await {
            Ok(games) => {
                let Some(game) = games.into_iter().next() else {
                    return Ok(None);
                };
                self.catalog.insert(game_name, &game.id);
                tracing::debug!(game_name, game_id = game.id, "cached game id");

                Ok(Some(game.id))
            }
            Err(e @ HelixErr::Authentication { .. }) => Err(e),
            Err(e) => {
                tracing::error!(game_name, error = %e, "error getting game id");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self), fields(source = SOURCE_TWITCH))]
    /// Fetches up to `max_records` live streams for a game, following pagination cursors.
    ///
    /// A failed page ends pagination early and whatever was gathered so far is returned, so a
    /// short result may be incomplete. Authentication failures are returned instead.
    pub async fn fetch_streams(
        &self,
        game_id: &str,
        max_records: usize,
    ) -> HelixResult<Vec<HelixStream>> {
        let mut streams: Vec<HelixStream> = Vec::new();
        let mut cursor: Option<String> = None;

        while streams.len() < max_records {
            let page = match self.helix.streams_page(game_id, cursor.as_deref()).await {
                Ok(page) => page,
                Err(e @ HelixErr::Authentication { .. }) => return Err(e),
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        fetched = streams.len(),
                        "error fetching streams, keeping partial result"
                    );
                    break;
                }
            };

            if page.data.is_empty() {
                break;
            }

            let next = page.cursor().map(str::to_string);
            streams.extend(page.data);

            match next {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }

        streams.truncate(max_records);
        tracing::debug!(fetched = streams.len(), "stream fetch complete");

        Ok(streams)
    }

    #[instrument(skip(self), fields(source = SOURCE_TWITCH))]
    /// The platform's current top games in ranked order.
    ///
    /// Returns an empty list on any failure, including authentication.
    pub async fn get_trending_games(&self, limit: usize) -> Vec<TrendingGame> {
        if limit == 0 {
            return Vec::new();
        }

        if let Err(e) = self.helix.ensure_session().await {
            tracing::error!(error = %e, "unable to authenticate for trending games");
            return Vec::new();
        }

        match self.helix.top_games(limit).await {
            Ok(games) => games
                .into_iter()
                .take(limit)
                .map(TrendingGame::from)
                .collect(),
            Err(e) => {
                tracing::error!(error = %e, "error fetching trending games");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl Collector for TwitchCollector {
    fn source(&self) -> &str {
        SOURCE_TWITCH
    }

    #[instrument(skip(self), fields(source = SOURCE_TWITCH))]
    async fn collect_game_data(&self, game_name: &str) -> CollectorResult<GameSummary> {
        self.helix.ensure_session().await?;

        let Some(game_id) = self.resolve_game_id(game_name).await? else {
            tracing::warn!(game_name, "game not found on twitch");
            return Ok(GameSummary::empty(game_name, SOURCE_TWITCH, Utc::now()));
        };

        let streams = self.fetch_streams(&game_id, self.max_streams).await?;
        let timestamp = Utc::now();

        if streams.is_empty() {
            tracing::info!(game_name, game_id, "no live streams");
            return Ok(GameSummary::empty(game_name, SOURCE_TWITCH, timestamp));
        }

        let summary = summarize(game_name, SOURCE_TWITCH, &streams, timestamp);

        if let Some(sink) = &self.sink {
            let snapshot = RawSnapshot::new(&streams, &summary);
            sink.save_raw(SOURCE_TWITCH, game_name, &snapshot).await?;
        }

        tracing::info!(
            game_name,
            total_viewers = summary.total_viewers,
            stream_count = summary.stream_count,
            "collected game data"
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod test {
    use std::io;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::collector::CollectorErr;
    use crate::collector::tests::MemorySink;
    use crate::helix::tests::{client_for, mount_game, mount_token, stream_page, test_config};

    fn collector(server: &MockServer, sink: Arc<MemorySink>) -> TwitchCollector {
        TwitchCollector::new(client_for(server), Arc::new(CatalogCache::new()), sink)
    }

    async fn mount_page(server: &MockServer, after: Option<&str>, body: serde_json::Value) {
        let mock = Mock::given(method("GET"))
            .and(path("/streams"))
            .and(query_param("game_id", "1"))
            .and(query_param("first", "100"));

        let mock = match after {
            Some(cursor) => mock.and(query_param("after", cursor)),
            None => mock.and(query_param_is_missing("after")),
        };

        mock.respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(server)
            .await;
    }

    /// The first token handed out is already expired and every renewal fails.
    async fn mount_expiring_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "short-lived",
                "expires_in": 0
            })))
            .up_to_n_times(1)
            .expect(1)
            .mount(server)
            .await;

        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(server)
            .await;
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_resolve_is_cached() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 3600).await;

        Mock::given(method("GET"))
            .and(path("/games"))
            .and(query_param("name", "Helldivers 2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{ "id": "515025", "name": "Helldivers 2" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let collector = collector(&server, MemorySink::new());
        assert_eq!(
            collector.resolve_game_id("Helldivers 2").await.unwrap().as_deref(),
            Some("515025")
        );
        assert_eq!(
            collector.resolve_game_id("Helldivers 2").await.unwrap().as_deref(),
            Some("515025")
        );
        assert_eq!(collector.catalog().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_game_not_cached() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 3600).await;

        Mock::given(method("GET"))
            .and(path("/games"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": [] })),
            )
            .expect(2)
            .mount(&server)
            .await;

        let collector = collector(&server, MemorySink::new());
        assert!(collector.resolve_game_id("Not A Real Game").await.unwrap().is_none());
        assert!(collector.resolve_game_id("Not A Real Game").await.unwrap().is_none());
        assert!(collector.catalog().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_failure_is_soft() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 3600).await;

        Mock::given(method("GET"))
            .and(path("/games"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let collector = collector(&server, MemorySink::new());
        assert!(collector.resolve_game_id("Palworld").await.unwrap().is_none());
        assert!(collector.catalog().is_empty());
    }

    #[tokio::test]
    async fn test_pagination_until_cursor_ends() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 3600).await;
        mount_page(&server, None, stream_page("p1", 100, Some("c1"))).await;
        mount_page(&server, Some("c1"), stream_page("p2", 100, Some("c2"))).await;
        mount_page(&server, Some("c2"), stream_page("p3", 50, None)).await;

        let streams = collector(&server, MemorySink::new())
            .fetch_streams("1", 500)
            .await
            .unwrap();

        assert_eq!(streams.len(), 250);
        assert_eq!(streams[0].user_name, "p1_0");
        assert_eq!(streams[249].user_name, "p3_49");
    }

    #[tokio::test]
    async fn test_pagination_truncates_to_cap() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 3600).await;
        mount_page(&server, None, stream_page("p1", 100, Some("c1"))).await;
        mount_page(&server, Some("c1"), stream_page("p2", 100, Some("c2"))).await;

        Mock::given(method("GET"))
            .and(path("/streams"))
            .and(query_param("after", "c2"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let streams = collector(&server, MemorySink::new())
            .fetch_streams("1", 120)
            .await
            .unwrap();

        assert_eq!(streams.len(), 120);
        assert_eq!(streams[119].user_name, "p2_19");
    }

    #[tokio::test]
    async fn test_pagination_stops_on_empty_page() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 3600).await;
        mount_page(&server, None, stream_page("p1", 100, Some("c1"))).await;
        mount_page(&server, Some("c1"), stream_page("p2", 0, Some("c2"))).await;

        let streams = collector(&server, MemorySink::new())
            .fetch_streams("1", 500)
            .await
            .unwrap();
        assert_eq!(streams.len(), 100);
    }

    #[tokio::test]
    async fn test_pagination_failure_keeps_partial() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 3600).await;
        mount_page(&server, None, stream_page("p1", 100, Some("c1"))).await;

        Mock::given(method("GET"))
            .and(path("/streams"))
            .and(query_param("after", "c1"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let streams = collector(&server, MemorySink::new())
            .fetch_streams("1", 500)
            .await
            .unwrap();
        assert_eq!(streams.len(), 100);
    }

    #[tokio::test]
    async fn test_collect_game_data() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 3600).await;
        mount_game(&server, "Balatro", "1").await;
        mount_page(&server, None, stream_page("p1", 100, Some("c1"))).await;
        mount_page(&server, Some("c1"), stream_page("p2", 30, None)).await;

        let sink = MemorySink::new();
        let summary = collector(&server, Arc::clone(&sink))
            .collect_game_data("Balatro")
            .await
            .unwrap();

        // page 1 counts run 100..=1, page 2 counts run 30..=1
        assert_eq!(summary.stream_count, 130);
        assert_eq!(summary.total_viewers, 5050 + 465);
        assert_eq!(summary.average_viewers_per_stream, 42.42);
        assert_eq!(summary.top_streamer, "p1_0");
        assert_eq!(summary.top_stream_viewers, 100);
        assert_eq!(summary.top_5_viewers, vec![100, 99, 98, 97, 96]);
        assert!(summary.error.is_none());

        let saved = sink.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0, "twitch");
        assert_eq!(saved[0].1, "Balatro");
        assert_eq!(saved[0].2.streams.len(), 20);
        assert_eq!(saved[0].2.metadata, summary);
    }

    #[tokio::test]
    async fn test_unknown_game_yields_empty_summary() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 3600).await;

        Mock::given(method("GET"))
            .and(path("/games"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": [] })),
            )
            .mount(&server)
            .await;

        let sink = MemorySink::new();
        let summary = collector(&server, Arc::clone(&sink))
            .collect_game_data("Animal Well")
            .await
            .unwrap();

        assert!(summary.is_empty());
        assert!(!summary.is_error());
        assert_eq!(summary.top_streamer, "Not Found");
        assert!(sink.saved().is_empty());
    }

    #[tokio::test]
    async fn test_no_live_streams_not_persisted() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 3600).await;
        mount_game(&server, "Pizza Tower", "1").await;
        mount_page(&server, None, stream_page("p1", 0, None)).await;

        let sink = MemorySink::new();
        let summary = collector(&server, Arc::clone(&sink))
            .collect_game_data("Pizza Tower")
            .await
            .unwrap();

        assert_eq!(summary.stream_count, 0);
        assert_eq!(summary.game_name, "Pizza Tower");
        assert!(sink.saved().is_empty());
    }

    #[tokio::test]
    async fn test_auth_failure_propagates() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(400))
            .expect(3)
            .mount(&server)
            .await;

        let err = collector(&server, MemorySink::new())
            .collect_game_data("Minecraft")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CollectorErr::Helix(HelixErr::Authentication { attempts: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_trending_games_in_rank_order() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 3600).await;

        Mock::given(method("GET"))
            .and(path("/games/top"))
            .and(query_param("first", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    { "id": "509658", "name": "Just Chatting", "box_art_url": "" },
                    { "id": "32982", "name": "Grand Theft Auto V", "box_art_url": "" },
                    { "id": "21779", "name": "League of Legends", "box_art_url": "" }
                ],
                "pagination": { "cursor": "abc" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let trending = collector(&server, MemorySink::new())
            .get_trending_games(3)
            .await;

        let names: Vec<_> = trending.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Just Chatting", "Grand Theft Auto V", "League of Legends"]
        );
        assert_eq!(trending[2].id, "21779");
    }

    #[tokio::test]
    async fn test_trending_failure_is_empty() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let trending = collector(&server, MemorySink::new())
            .get_trending_games(10)
            .await;
        assert!(trending.is_empty());

        let server = MockServer::start().await;
        mount_token(&server, "tok", 3600).await;
        Mock::given(method("GET"))
            .and(path("/games/top"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let trending = collector(&server, MemorySink::new())
            .get_trending_games(10)
            .await;
        assert!(trending.is_empty());
    }

    #[tokio::test]
    async fn test_reauth_failure_during_lookup_is_an_error() {
        let server = MockServer::start().await;
        mount_expiring_token(&server).await;

        Mock::given(method("GET"))
            .and(path("/games"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let sink = MemorySink::new();
        let collector = collector(&server, Arc::clone(&sink));
        let err = collector.collect_game_data("Balatro").await.unwrap_err();

        assert!(matches!(
            err,
            CollectorErr::Helix(HelixErr::Authentication { attempts: 3, .. })
        ));
        assert!(collector.catalog().is_empty());
        assert!(sink.saved().is_empty());
    }

    #[tokio::test]
    async fn test_reauth_failure_during_pagination_is_an_error() {
        let server = MockServer::start().await;
        mount_expiring_token(&server).await;
        mount_page(&server, None, stream_page("p1", 100, Some("c1"))).await;

        Mock::given(method("GET"))
            .and(path("/streams"))
            .and(query_param("after", "c1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = collector(&server, MemorySink::new())
            .fetch_streams("1", 500)
            .await
            .unwrap_err();
        assert!(matches!(err, HelixErr::Authentication { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn test_pages_are_paced() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 3600).await;
        mount_page(&server, None, stream_page("p1", 100, Some("c1"))).await;
        mount_page(&server, Some("c1"), stream_page("p2", 100, Some("c2"))).await;
        mount_page(&server, Some("c2"), stream_page("p3", 50, None)).await;

        let interval = Duration::from_millis(200);
        let started = Instant::now();
        let helix = HelixClient::new(HelixConfig {
            min_request_interval: interval,
            ..test_config(&server)
        })
        .unwrap();
        let collector = TwitchCollector::new(helix, Arc::new(CatalogCache::new()), MemorySink::new());

        let streams = collector.fetch_streams("1", 500).await.unwrap();

        assert_eq!(streams.len(), 250);
        assert!(
            started.elapsed() >= interval * 2,
            "three pages took {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn test_successful_collection_is_logged() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 3600).await;
        mount_game(&server, "Balatro", "1").await;
        mount_page(&server, None, stream_page("p1", 3, None)).await;

        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        collector(&server, MemorySink::new())
            .collect_game_data("Balatro")
            .await
            .unwrap();

        let out = logs.contents();
        assert!(out.contains("collected game data"), "logs: {out}");
        assert!(out.contains("stream_count=3"), "logs: {out}");
    }
}
