//! in-memory token budget tracker with daily/monthly roll-over and
//! optional write-behind persistence
//!
//! a `parking_lot`-guarded counter pair with reset-on-boundary-crossing
//! logic, a daily/monthly quota, a warn/reject policy, and a background
//! write-behind to an optional persistence store.

use crate::error::{Error, Result};
use crate::key_layout::KeyLayout;
use crate::repository::KvRepository;
use chrono::{Datelike, NaiveDate, Utc};
use parking_lot::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetAction {
    Warn,
    Reject,
}

#[derive(Debug, Clone, Copy)]
struct BudgetState {
    daily_used: i64,
    monthly_used: i64,
    last_reset_day: NaiveDate,
    last_reset_month: (i32, u32),
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn this_month(day: NaiveDate) -> (i32, u32) {
    (day.year(), day.month())
}

fn day_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

fn month_key(month: (i32, u32)) -> String {
    format!("{:04}-{:02}", month.0, month.1)
}

/// process-wide, per-provider token budget. must be constructed once per
/// provider and shared (e.g. via `Arc<BudgetTracker<S>>`) — two independent
/// trackers for the same provider would double-count against the same
/// backing store.
pub struct BudgetTracker<S> {
    provider: String,
    prefix: String,
    daily_limit: i64,
    monthly_limit: i64,
    action: BudgetAction,
    state: Mutex<BudgetState>,
    store: Option<S>,
}

impl<S: KvRepository + Clone + Send + Sync + 'static> BudgetTracker<S> {
    /// construct the tracker, loading counters from `store` if attached.
    /// missing keys become zero.
    pub async fn new(
        provider: impl Into<String>,
        prefix: impl Into<String>,
        daily_limit: i64,
        monthly_limit: i64,
        action: BudgetAction,
        store: Option<S>,
    ) -> Result<Self> {
        let provider = provider.into();
        let prefix = prefix.into();
        let day = today();
        let month = this_month(day);

        let (daily_used, monthly_used) = if let Some(store) = &store {
            let daily_key = KeyLayout::budget_daily(&prefix, &provider, &day_key(day));
            let monthly_key = KeyLayout::budget_monthly(&prefix, &provider, &month_key(month));
            let daily = store.get(&daily_key).await?.unwrap_or(0);
            let monthly = store.get(&monthly_key).await?.unwrap_or(0);
            (daily, monthly)
        } else {
            (0, 0)
        };

        Ok(Self {
            provider,
            prefix,
            daily_limit,
            monthly_limit,
            action,
            state: Mutex::new(BudgetState {
                daily_used,
                monthly_used,
                last_reset_day: day,
                last_reset_month: month,
            }),
            store,
        })
    }

    fn reset_if_crossed(state: &mut BudgetState) {
        let day = today();
        if day != state.last_reset_day {
            state.daily_used = 0;
            state.last_reset_day = day;
        }
        let month = this_month(day);
        if month != state.last_reset_month {
            state.monthly_used = 0;
            state.last_reset_month = month;
        }
    }

    /// hot path: memory only, no I/O. resets counters if a day/month
    /// boundary has been crossed, then returns `QuotaExceeded` iff
    /// `action == Reject` and any non-zero limit has been reached.
    pub fn check(&self) -> Result<()> {
        let mut state = self.state.lock();
        Self::reset_if_crossed(&mut state);

        let exceeded = (self.daily_limit > 0 && state.daily_used >= self.daily_limit)
            || (self.monthly_limit > 0 && state.monthly_used >= self.monthly_limit);

        if exceeded {
            if self.action == BudgetAction::Reject {
                return Err(Error::QuotaExceeded {
                    provider: self.provider.clone(),
                });
            }
            tracing::warn!(
                provider = %self.provider,
                daily_used = state.daily_used,
                monthly_used = state.monthly_used,
                "budget exceeded, proceeding under warn policy"
            );
        }
        Ok(())
    }

    /// atomically increments both counters, then issues a best-effort
    /// write-behind to the persistence store on a detached task with a
    /// 2-second bound. `record(0)` is a no-op.
    pub fn record(&self, tokens: u32) {
        if tokens == 0 {
            return;
        }

        let (day, month, daily_used, monthly_used) = {
            let mut state = self.state.lock();
            Self::reset_if_crossed(&mut state);
            state.daily_used += tokens as i64;
            state.monthly_used += tokens as i64;
            (
                state.last_reset_day,
                state.last_reset_month,
                state.daily_used,
                state.monthly_used,
            )
        };

        let Some(store) = self.store.clone() else {
            return;
        };

        let daily_key = KeyLayout::budget_daily(&self.prefix, &self.provider, &day_key(day));
        let monthly_key = KeyLayout::budget_monthly(&self.prefix, &self.provider, &month_key(month));
        let provider = self.provider.clone();

        // a fresh, detached background context: this must survive caller
        // cancellation, since tokens already consumed must be accounted for
        // even if the request itself was cancelled.
        tokio::spawn(async move {
            let write = async {
                store.set(&daily_key, daily_used).await?;
                store.set(&monthly_key, monthly_used).await
            };
            match tokio::time::timeout(Duration::from_secs(2), write).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(%provider, error = %e, "budget write-behind failed");
                }
                Err(_) => {
                    tracing::warn!(%provider, "budget write-behind timed out after 2s");
                }
            }
        });
    }

    pub fn daily_used(&self) -> i64 {
        self.state.lock().daily_used
    }

    pub fn monthly_used(&self) -> i64 {
        self.state.lock().monthly_used
    }
}
