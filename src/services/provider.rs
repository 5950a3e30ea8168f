use crate::error::{AppError, Result};
use crate::models::{CalendarDay, InstrumentRow};
use async_trait::async_trait;
use isahc::{config::Configurable, AsyncReadResponseExt, HttpClient};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration as StdDuration, SystemTime};
use tokio::sync::Mutex as TokioMutex;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Daily market data source. Implementations may fail transiently; callers
/// decide per contract whether to propagate, skip or retry.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// All instruments' bars for one trading date (may be empty).
    async fn fetch_daily(&self, trade_date: &str) -> Result<Vec<InstrumentRow>>;

    /// One instrument's bars over `[start, end]`, routed by market suffix.
    async fn fetch_daily_range(
        &self,
        code: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<InstrumentRow>>;

    /// Trading calendar over `[start, end]`.
    async fn fetch_trading_calendar(&self, start: &str, end: &str) -> Result<Vec<CalendarDay>>;
}

/// Instrument reference data (names etc.), separate from the bar feed.
#[async_trait]
pub trait ReferenceData: Send + Sync {
    /// `Ok(None)` when the code has no entry; `Err` on transport failure.
    async fn lookup_name(&self, code: &str) -> Result<Option<String>>;
}

/// Market derived from an instrument code's suffix. Anything without a
/// recognized suffix is rejected at the boundary as a structured error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Market {
    AShare,
    HongKong,
    Us,
}

impl Market {
    pub fn from_code(code: &str) -> Result<Market> {
        if code.ends_with(".SZ") || code.ends_with(".SH") || code.ends_with(".BJ") {
            Ok(Market::AShare)
        } else if code.ends_with(".HK") {
            Ok(Market::HongKong)
        } else if code.ends_with(".US") {
            Ok(Market::Us)
        } else {
            Err(AppError::UnrecognizedCode(format!(
                "{} (expected a suffix like .SZ, .SH, .BJ, .HK or .US)",
                code
            )))
        }
    }

    fn daily_api(&self) -> &'static str {
        match self {
            Market::AShare => "daily",
            Market::HongKong => "hk_daily",
            Market::Us => "us_daily",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Market::AShare => "a-share",
            Market::HongKong => "hk",
            Market::Us => "us",
        }
    }
}

/// Shared rate limiter for provider requests across all concurrent tasks
/// (sliding one-minute window).
#[derive(Debug)]
pub struct SharedRateLimiter {
    request_timestamps: TokioMutex<Vec<SystemTime>>,
    rate_limit_per_minute: u32,
}

impl SharedRateLimiter {
    pub fn new(rate_limit_per_minute: u32) -> Self {
        Self {
            request_timestamps: TokioMutex::new(Vec::new()),
            rate_limit_per_minute,
        }
    }

    pub async fn enforce_rate_limit(&self) {
        let current_time = SystemTime::now();
        let mut timestamps = self.request_timestamps.lock().await;

        timestamps.retain(|&timestamp| {
            current_time
                .duration_since(timestamp)
                .unwrap_or(StdDuration::from_secs(0))
                < StdDuration::from_secs(60)
        });

        if timestamps.len() >= self.rate_limit_per_minute as usize {
            if let Some(&oldest_request) = timestamps.first() {
                let wait_time = StdDuration::from_secs(60)
                    - current_time
                        .duration_since(oldest_request)
                        .unwrap_or(StdDuration::from_secs(0));

                if !wait_time.is_zero() {
                    // Drop lock before sleeping so other tasks can check
                    drop(timestamps);
                    sleep(wait_time + StdDuration::from_millis(100)).await;
                    let mut timestamps = self.request_timestamps.lock().await;
                    timestamps.push(current_time);
                    return;
                }
            }
        }
        timestamps.push(current_time);
    }
}

/// HTTP client for the provider's pro API: a single POST endpoint taking
/// `{api_name, token, params, fields}` and answering
/// `{code, msg, data: {fields, items}}`.
pub struct ProApiClient {
    client: HttpClient,
    base_url: String,
    token: String,
    user_agents: Vec<String>,
    rate_limiter: Arc<SharedRateLimiter>,
}

const MAX_RETRIES: u32 = 5;

impl ProApiClient {
    pub fn new(base_url: String, token: String, rate_limit_per_minute: u32) -> Result<Self> {
        let client = HttpClient::builder()
            .timeout(StdDuration::from_secs(30))
            .build()
            .map_err(|e| AppError::Config(format!("HTTP client build failed: {}", e)))?;

        let user_agents = vec![
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0".to_string(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.3 Safari/605.1.15".to_string(),
        ];

        Ok(Self {
            client,
            base_url,
            token,
            user_agents,
            rate_limiter: Arc::new(SharedRateLimiter::new(rate_limit_per_minute)),
        })
    }

    fn get_user_agent(&self) -> &str {
        use rand::seq::SliceRandom;
        self.user_agents
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or("marketbreadth")
    }

    /// Issue one API call with retry and jittered exponential backoff.
    /// Returns the response's `fields` and `items` tables.
    async fn call(
        &self,
        api_name: &str,
        params: Value,
        fields: &str,
    ) -> Result<(Vec<String>, Vec<Vec<Value>>)> {
        let payload = json!({
            "api_name": api_name,
            "token": self.token,
            "params": params,
            "fields": fields,
        });
        let body = serde_json::to_string(&payload)?;

        let mut last_error: Option<String> = None;

        for attempt in 0..MAX_RETRIES {
            self.rate_limiter.enforce_rate_limit().await;

            if attempt > 0 {
                let delay =
                    StdDuration::from_secs_f64(2.0_f64.powi(attempt as i32 - 1) + rand::random::<f64>());
                let delay = delay.min(StdDuration::from_secs(60));
                let reason = last_error.as_deref().unwrap_or("unknown error");
                debug!(
                    api_name,
                    attempt = attempt + 1,
                    reason,
                    wait_secs = delay.as_secs_f64(),
                    "provider retry backoff"
                );
                sleep(delay).await;
            }

            let request = isahc::Request::builder()
                .uri(&self.base_url)
                .method("POST")
                .header("Content-Type", "application/json")
                .header("Accept", "application/json")
                .header("User-Agent", self.get_user_agent())
                .body(body.clone())
                .map_err(|e| AppError::Provider(format!("request build error: {}", e)))?;

            match self.client.send_async(request).await {
                Ok(mut resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let text = match resp.text().await {
                            Ok(t) => t,
                            Err(e) => {
                                last_error = Some(format!("response body error: {}", e));
                                continue;
                            }
                        };
                        match serde_json::from_str::<Value>(&text) {
                            Ok(data) => return Self::unpack_envelope(api_name, data),
                            Err(e) => {
                                last_error = Some(format!("JSON parse error: {}", e));
                                continue;
                            }
                        }
                    } else if status.is_server_error() || status.as_u16() == 429 {
                        last_error = Some(format!("HTTP {} from provider", status.as_u16()));
                        continue;
                    } else {
                        // Client errors are request problems, not transient
                        return Err(AppError::Provider(format!(
                            "HTTP {} from provider for {} (not retryable)",
                            status.as_u16(),
                            api_name
                        )));
                    }
                }
                Err(e) => {
                    last_error = Some(format!("network error: {}", e));
                    continue;
                }
            }
        }

        Err(AppError::Provider(format!(
            "{}: max retries exceeded ({})",
            api_name,
            last_error.unwrap_or_else(|| "unknown error".to_string())
        )))
    }

    fn unpack_envelope(api_name: &str, data: Value) -> Result<(Vec<String>, Vec<Vec<Value>>)> {
        let code = data.get("code").and_then(Value::as_i64).unwrap_or(-1);
        if code != 0 {
            let msg = data
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or("unknown provider error");
            return Err(AppError::Provider(format!("{}: {}", api_name, msg)));
        }

        let table = data
            .get("data")
            .ok_or_else(|| AppError::Provider(format!("{}: missing data table", api_name)))?;

        let fields: Vec<String> = table
            .get("fields")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let items: Vec<Vec<Value>> = table
            .get("items")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_array().cloned())
                    .collect()
            })
            .unwrap_or_default();

        Ok((fields, items))
    }

    fn field_index(fields: &[String]) -> HashMap<String, usize> {
        fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.clone(), i))
            .collect()
    }

    /// Convert raw items into validated rows, dropping malformed ones.
    fn rows_from_items(api_name: &str, fields: Vec<String>, items: Vec<Vec<Value>>) -> Vec<InstrumentRow> {
        let index = Self::field_index(&fields);
        let total = items.len();
        let rows: Vec<InstrumentRow> = items
            .iter()
            .filter_map(|item| InstrumentRow::from_item(&index, item))
            .collect();
        if rows.len() < total {
            warn!(
                api_name,
                dropped = total - rows.len(),
                kept = rows.len(),
                "dropped malformed provider rows at fetch boundary"
            );
        }
        rows
    }
}

const DAILY_FIELDS: &str = "ts_code,trade_date,close,pct_chg,vol,amount";

#[async_trait]
impl DataProvider for ProApiClient {
    async fn fetch_daily(&self, trade_date: &str) -> Result<Vec<InstrumentRow>> {
        let (fields, items) = self
            .call("daily", json!({ "trade_date": trade_date }), DAILY_FIELDS)
            .await?;
        Ok(Self::rows_from_items("daily", fields, items))
    }

    async fn fetch_daily_range(
        &self,
        code: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<InstrumentRow>> {
        let api_name = Market::from_code(code)?.daily_api();
        let (fields, items) = self
            .call(
                api_name,
                json!({ "ts_code": code, "start_date": start, "end_date": end }),
                DAILY_FIELDS,
            )
            .await?;
        Ok(Self::rows_from_items(api_name, fields, items))
    }

    async fn fetch_trading_calendar(&self, start: &str, end: &str) -> Result<Vec<CalendarDay>> {
        let (fields, items) = self
            .call(
                "trade_cal",
                json!({ "start_date": start, "end_date": end }),
                "cal_date,is_open",
            )
            .await?;
        let index = Self::field_index(&fields);
        Ok(items
            .iter()
            .filter_map(|item| {
                let date = index
                    .get("cal_date")
                    .and_then(|&i| item.get(i))
                    .and_then(Value::as_str)?
                    .to_string();
                let is_open = index
                    .get("is_open")
                    .and_then(|&i| item.get(i))
                    .and_then(Value::as_i64)
                    .unwrap_or(0)
                    == 1;
                Some(CalendarDay { date, is_open })
            })
            .collect())
    }
}

#[async_trait]
impl ReferenceData for ProApiClient {
    async fn lookup_name(&self, code: &str) -> Result<Option<String>> {
        let (fields, items) = self
            .call("stock_basic", json!({ "ts_code": code }), "ts_code,name")
            .await?;
        let index = Self::field_index(&fields);
        Ok(items.first().and_then(|item| {
            index
                .get("name")
                .and_then(|&i| item.get(i))
                .and_then(Value::as_str)
                .map(str::to_string)
        }))
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;

    /// In-memory provider for unit tests. Dates/codes listed in the failing
    /// sets return transport errors; everything else answers from the maps.
    #[derive(Default)]
    pub struct MockProvider {
        pub calendar: Vec<CalendarDay>,
        pub daily_by_date: HashMap<String, Vec<InstrumentRow>>,
        pub history_by_code: HashMap<String, Vec<InstrumentRow>>,
        pub failing_dates: std::collections::HashSet<String>,
        pub failing_codes: std::collections::HashSet<String>,
        pub names: HashMap<String, String>,
    }

    impl MockProvider {
        pub fn row(code: &str, date: &str, close: f64, pct_chg: f64) -> InstrumentRow {
            InstrumentRow {
                code: code.to_string(),
                close,
                pct_chg,
                volume: 1000.0,
                amount: close * 1000.0,
                trade_date: date.to_string(),
            }
        }

        pub fn open_day(date: &str) -> CalendarDay {
            CalendarDay {
                date: date.to_string(),
                is_open: true,
            }
        }

        pub fn closed_day(date: &str) -> CalendarDay {
            CalendarDay {
                date: date.to_string(),
                is_open: false,
            }
        }
    }

    #[async_trait]
    impl DataProvider for MockProvider {
        async fn fetch_daily(&self, trade_date: &str) -> Result<Vec<InstrumentRow>> {
            if self.failing_dates.contains(trade_date) {
                return Err(AppError::Provider(format!("mock failure for {}", trade_date)));
            }
            Ok(self.daily_by_date.get(trade_date).cloned().unwrap_or_default())
        }

        async fn fetch_daily_range(
            &self,
            code: &str,
            start: &str,
            end: &str,
        ) -> Result<Vec<InstrumentRow>> {
            if self.failing_codes.contains(code) {
                return Err(AppError::Provider(format!("mock failure for {}", code)));
            }
            Market::from_code(code)?;
            Ok(self
                .history_by_code
                .get(code)
                .map(|rows| {
                    rows.iter()
                        .filter(|r| r.trade_date.as_str() >= start && r.trade_date.as_str() <= end)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default())
        }

        async fn fetch_trading_calendar(&self, start: &str, end: &str) -> Result<Vec<CalendarDay>> {
            Ok(self
                .calendar
                .iter()
                .filter(|d| d.date.as_str() >= start && d.date.as_str() <= end)
                .cloned()
                .collect())
        }
    }

    #[async_trait]
    impl ReferenceData for MockProvider {
        async fn lookup_name(&self, code: &str) -> Result<Option<String>> {
            if self.failing_codes.contains(code) {
                return Err(AppError::Provider(format!("mock failure for {}", code)));
            }
            Ok(self.names.get(code).cloned())
        }
    }
}
