//! Risk feeds - escalating risk levels published into the RiskExchange
//!
//! A feed is a spawned task owned by the broker. It publishes levels
//! 1, 2, ... at a cadence derived from the job's risk factor and ends on its
//! own after `max_levels` or as soon as the consumer goes away.

use std::collections::HashMap;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::actors::risk_channel::RiskExchange;

#[derive(Debug, Clone)]
pub struct RiskFeedSettings {
    /// Highest level a feed publishes
    pub max_levels: u32,
    /// Duration of one period step
    pub period_unit: Duration,
    /// Lower bound on the period multiplier
    pub min_period_factor: u32,
}

impl Default for RiskFeedSettings {
    fn default() -> Self {
        Self {
            max_levels: 7,
            period_unit: Duration::from_millis(100),
            min_period_factor: 10,
        }
    }
}

/// Time between two published levels: riskier jobs escalate faster
pub fn publish_period(risk_factor: u8, settings: &RiskFeedSettings) -> Duration {
    let factor = 100u32
        .saturating_sub(u32::from(risk_factor))
        .max(settings.min_period_factor);
    settings.period_unit * factor
}

struct RunningFeed {
    risk_factor: u8,
    handle: JoinHandle<()>,
}

/// Registry of running feeds, at most one per character
pub struct RiskFeeds {
    exchange: RiskExchange,
    settings: RiskFeedSettings,
    feeds: HashMap<String, RunningFeed>,
}

impl RiskFeeds {
    pub fn new(exchange: RiskExchange, settings: RiskFeedSettings) -> Self {
        Self {
            exchange,
            settings,
            feeds: HashMap::new(),
        }
    }

    /// Start (or restart) the feed for `character`; returns the period used.
    ///
    /// Returns `None` when nobody is attached to the character's channel.
    pub async fn start(&mut self, character: &str, risk_factor: u8) -> Option<Duration> {
        if !self.exchange.has_consumer(character).await {
            return None;
        }

        if let Some(previous) = self.feeds.remove(character) {
            previous.handle.abort();
            tracing::debug!(
                character = %character,
                previous_risk = previous.risk_factor,
                "Replacing running risk feed"
            );
        }

        let period = publish_period(risk_factor, &self.settings);
        let handle = tokio::spawn(publish_levels(
            self.exchange.clone(),
            character.to_string(),
            period,
            self.settings.max_levels,
        ));
        self.feeds.insert(
            character.to_string(),
            RunningFeed {
                risk_factor,
                handle,
            },
        );
        Some(period)
    }

    /// Stop the feed for `character`; returns whether one was still running
    pub fn stop(&mut self, character: &str) -> bool {
        match self.feeds.remove(character) {
            Some(feed) => {
                let running = !feed.handle.is_finished();
                feed.handle.abort();
                running
            }
            None => false,
        }
    }

    pub fn is_running(&self, character: &str) -> bool {
        self.feeds
            .get(character)
            .is_some_and(|feed| !feed.handle.is_finished())
    }

    pub fn stop_all(&mut self) {
        for (_, feed) in self.feeds.drain() {
            feed.handle.abort();
        }
    }
}

async fn publish_levels(
    exchange: RiskExchange,
    character: String,
    period: Duration,
    max_levels: u32,
) {
    let start = tokio::time::Instant::now() + period;
    let mut ticker = tokio::time::interval_at(start, period);

    for level in 1..=max_levels {
        ticker.tick().await;
        match exchange.publish(&character, level).await {
            Ok(seq) => {
                tracing::info!(character = %character, level, seq, "Risk level published");
            }
            Err(err) => {
                tracing::info!(character = %character, level, error = %err, "Risk feed stopped");
                return;
            }
        }
    }

    tracing::debug!(character = %character, max_levels, "Risk feed finished");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_settings() -> RiskFeedSettings {
        RiskFeedSettings {
            max_levels: 3,
            period_unit: Duration::from_millis(1),
            min_period_factor: 10,
        }
    }

    #[test]
    fn test_publish_period_scales_with_risk() {
        let settings = RiskFeedSettings::default();
        assert_eq!(publish_period(0, &settings), Duration::from_secs(10));
        assert_eq!(publish_period(40, &settings), Duration::from_secs(6));
        assert_eq!(publish_period(90, &settings), Duration::from_secs(1));
    }

    #[test]
    fn test_publish_period_has_a_floor() {
        let settings = RiskFeedSettings::default();
        assert_eq!(publish_period(95, &settings), Duration::from_secs(1));
        assert_eq!(publish_period(100, &settings), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_start_requires_consumer() {
        let exchange = RiskExchange::new();
        let mut feeds = RiskFeeds::new(exchange, fast_settings());
        assert!(feeds.start("Trevor", 50).await.is_none());
        assert!(!feeds.is_running("Trevor"));
    }

    #[tokio::test]
    async fn test_feed_publishes_escalating_levels_up_to_max() {
        let exchange = RiskExchange::new();
        let mut inbox = exchange.attach("Trevor", "run-1").await;
        let mut feeds = RiskFeeds::new(exchange.clone(), fast_settings());

        feeds.start("Trevor", 95).await.unwrap();

        let mut levels = Vec::new();
        for _ in 0..3 {
            levels.push(inbox.recv().await.unwrap().level);
        }
        assert_eq!(levels, vec![1, 2, 3]);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!feeds.is_running("Trevor"));
    }

    #[tokio::test]
    async fn test_feed_stops_when_consumer_detaches() {
        let exchange = RiskExchange::new();
        let inbox = exchange.attach("Franklin", "run-1").await;
        let mut feeds = RiskFeeds::new(exchange.clone(), fast_settings());

        feeds.start("Franklin", 95).await.unwrap();
        drop(inbox);
        exchange.detach("Franklin", "run-1").await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!feeds.is_running("Franklin"));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let exchange = RiskExchange::new();
        let _inbox = exchange.attach("Trevor", "run-1").await;
        let mut feeds = RiskFeeds::new(exchange, RiskFeedSettings::default());

        feeds.start("Trevor", 0).await.unwrap();
        assert!(feeds.is_running("Trevor"));
        assert!(feeds.stop("Trevor"));
        assert!(!feeds.stop("Trevor"));
        assert!(!feeds.is_running("Trevor"));
    }
}
