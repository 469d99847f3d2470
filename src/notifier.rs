//! Decides which listings get announced each cycle and keeps the history in step.
//!
//! Per listing name the derived states are: never seen, seen and cooling
//! down, seen and due for a repost, last chance pending, last chance done.
use anyhow::{anyhow, Context, Result};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::discord::{ChatService, ListingEmbed, LAST_CHANCE_BANNER, NEW_ITEMS_BANNER};
use crate::history::{NotificationHistory, NotificationRecord};
use crate::model::Listing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    /// Repost a listing once this many seconds passed since its last post.
    pub repost_after_secs: i64,
    /// `time_left` at or below this is last chance.
    pub last_chance_hours: i64,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            repost_after_secs: 86_400,
            last_chance_hours: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Name never posted before.
    New,
    /// Cooldown elapsed; periodic re-announcement.
    Bump,
    /// Still cooling down but the listing is about to expire.
    LastChance,
    Suppress,
}

impl Decision {
    pub fn is_post(self) -> bool {
        !matches!(self, Decision::Suppress)
    }
}

pub fn decide(
    listing: &Listing,
    record: Option<&NotificationRecord>,
    now: i64,
    policy: &Policy,
) -> Decision {
    let Some(record) = record else {
        return Decision::New;
    };
    if now.saturating_sub(record.last_posted) > policy.repost_after_secs {
        return Decision::Bump;
    }
    if listing.time_left <= policy.last_chance_hours && !record.last_chance_posted {
        return Decision::LastChance;
    }
    Decision::Suppress
}

pub fn should_post(
    listing: &Listing,
    history: &NotificationHistory,
    now: i64,
    policy: &Policy,
) -> bool {
    decide(listing, history.get(&listing.name), now, policy).is_post()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub posted: usize,
    pub suppressed: usize,
    pub failed: usize,
    pub banners: Vec<&'static str>,
}

pub struct Notifier {
    chat: Arc<dyn ChatService>,
    clock: Arc<dyn Clock>,
    policy: Policy,
    image_base_url: String,
    send_timeout: Duration,
}

impl Notifier {
    pub fn new(
        chat: Arc<dyn ChatService>,
        clock: Arc<dyn Clock>,
        policy: Policy,
        image_base_url: impl Into<String>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            chat,
            clock,
            policy,
            image_base_url: image_base_url.into(),
            send_timeout,
        }
    }

    pub fn from_config(cfg: &Config, chat: Arc<dyn ChatService>, clock: Arc<dyn Clock>) -> Self {
        let policy = Policy {
            repost_after_secs: cfg.schedule.repost_after_secs,
            last_chance_hours: cfg.schedule.last_chance_hours,
        };
        Self::new(
            chat,
            clock,
            policy,
            cfg.chat.image_base_url.clone(),
            cfg.send_timeout(),
        )
    }

    /// Process listings in order, posting banners and details and writing
    /// history through after each successful post.
    ///
    /// A delivered last-chance banner is recorded before the detail is sent,
    /// so it never repeats. Otherwise a failed or timed-out send skips that
    /// listing without touching its history. Failing to persist history
    /// aborts the cycle.
    #[instrument(skip_all, fields(listings = listings.len()))]
    pub async fn run_cycle(
        &self,
        listings: &[Listing],
        history: &mut NotificationHistory,
    ) -> Result<CycleReport> {
        let mut report = CycleReport::default();
        let mut new_banner_sent = false;
        let mut seen = HashSet::new();

        for listing in listings {
            if !seen.insert(listing.name.as_str()) {
                warn!(listing = %listing.name, "duplicate listing name in this cycle; history is shared");
            }

            let now = self.clock.now();
            let existing = history.get(&listing.name).copied();
            let decision = decide(listing, existing.as_ref(), now, &self.policy);
            if !decision.is_post() {
                report.suppressed += 1;
                continue;
            }

            let mut record = existing.unwrap_or_default();
            let last_chance = listing.time_left <= self.policy.last_chance_hours
                && !record.last_chance_posted;

            if last_chance {
                if self.banner(LAST_CHANCE_BANNER, &mut report).await {
                    record.last_chance_posted = true;
                    history.insert(listing.name.clone(), record);
                    save(history)?;
                }
            } else if !new_banner_sent {
                new_banner_sent = true;
                self.banner(NEW_ITEMS_BANNER, &mut report).await;
            }

            let embed = ListingEmbed::from_listing(listing, &self.image_base_url);
            if let Err(err) = self.send(self.chat.send_listing(&embed)).await {
                warn!(?err, listing = %listing.name, "failed to post listing; will retry next cycle");
                report.failed += 1;
                continue;
            }

            if last_chance {
                record.last_chance_posted = true;
            }
            record.last_posted = now;
            history.insert(listing.name.clone(), record);
            save(history)?;
            info!(listing = %listing.name, ?decision, last_chance, "posted listing");
            report.posted += 1;
        }

        Ok(report)
    }

    async fn banner(&self, text: &'static str, report: &mut CycleReport) -> bool {
        match self.send(self.chat.send_banner(text)).await {
            Ok(()) => {
                report.banners.push(text);
                true
            }
            Err(err) => {
                warn!(?err, banner = text, "failed to post banner");
                false
            }
        }
    }

    async fn send<F>(&self, fut: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        match tokio::time::timeout(self.send_timeout, fut).await {
            Ok(res) => res,
            Err(_) => Err(anyhow!(
                "chat send timed out after {}s",
                self.send_timeout.as_secs_f32()
            )),
        }
    }
}

fn save(history: &NotificationHistory) -> Result<()> {
    history
        .save()
        .with_context(|| format!("failed to save history to {}", history.path().display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(time_left: i64) -> Listing {
        Listing {
            name: "Tractor X".into(),
            price: 1.0,
            age: 0,
            damage: 0.0,
            wear: 0.0,
            operating_time_minutes: 0.0,
            time_left,
            brand: "B".into(),
            category: "C".into(),
            specs: String::new(),
            image: None,
            reference: "data/x.xml".into(),
        }
    }

    fn rec(last_posted: i64, last_chance_posted: bool) -> NotificationRecord {
        NotificationRecord {
            last_posted,
            last_chance_posted,
        }
    }

    #[test]
    fn unseen_is_new() {
        let p = Policy::default();
        assert_eq!(decide(&listing(5), None, 1000, &p), Decision::New);
        assert_eq!(decide(&listing(1), None, 1000, &p), Decision::New);
    }

    #[test]
    fn bump_only_after_cooldown() {
        let p = Policy::default();
        let r = rec(1000, true);
        assert_eq!(decide(&listing(5), Some(&r), 1000 + 86_400, &p), Decision::Suppress);
        assert_eq!(decide(&listing(5), Some(&r), 1000 + 86_401, &p), Decision::Bump);
    }

    #[test]
    fn last_chance_once() {
        let p = Policy::default();
        assert_eq!(
            decide(&listing(1), Some(&rec(1000, false)), 2000, &p),
            Decision::LastChance
        );
        assert_eq!(
            decide(&listing(0), Some(&rec(1000, false)), 2000, &p),
            Decision::LastChance
        );
        assert_eq!(
            decide(&listing(1), Some(&rec(1000, true)), 2000, &p),
            Decision::Suppress
        );
        assert_eq!(
            decide(&listing(2), Some(&rec(1000, false)), 2000, &p),
            Decision::Suppress
        );
    }

    #[test]
    fn never_posted_sentinel_is_due() {
        let p = Policy::default();
        assert_eq!(
            decide(&listing(9), Some(&rec(0, false)), 1_700_000_000, &p),
            Decision::Bump
        );
    }

    #[test]
    fn extreme_timestamps_do_not_overflow() {
        let p = Policy::default();
        assert_eq!(
            decide(&listing(9), Some(&rec(i64::MIN, false)), 1_700_000_000, &p),
            Decision::Bump
        );
        assert_eq!(
            decide(&listing(9), Some(&rec(i64::MAX, true)), i64::MIN, &p),
            Decision::Suppress
        );
    }

    #[test]
    fn should_post_reads_history() {
        let p = Policy::default();
        let mut h = NotificationHistory::empty("unused.json");
        assert!(should_post(&listing(3), &h, 500, &p));
        h.insert("Tractor X", rec(500, true));
        assert!(!should_post(&listing(3), &h, 600, &p));
    }
}
