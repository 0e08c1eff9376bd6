use super::{parse_date, required_query, NewsService};
use crate::cache::CacheKey;
use crate::error::{NewsError, NewsResult};
use crate::normalize::parse_total;
use crate::types::{NewsTrend, TrendPoint};
use chrono::{Datelike, NaiveDate};
use std::sync::Arc;

/// A calendar month clipped to the requested range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthBucket {
    /// `YYYY-MM`
    pub period: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// Split the inclusive range `[start, end]` into calendar months, oldest first.
/// Partial first and last months are included, clipped to the range.
pub fn month_buckets(start: NaiveDate, end: NaiveDate) -> NewsResult<Vec<MonthBucket>> {
    if start > end {
        return Err(NewsError::validation(format!(
            "start_date {} is after end_date {}",
            start, end
        )));
    }

    let mut buckets = Vec::new();
    let mut month_start = first_of_month(start)?;

    while month_start <= end {
        let next_month = first_of_next_month(month_start)?;
        let month_end = next_month.pred_opt().ok_or_else(out_of_range)?;

        buckets.push(MonthBucket {
            period: month_start.format("%Y-%m").to_string(),
            from: month_start.max(start),
            to: month_end.min(end),
        });
        month_start = next_month;
    }

    Ok(buckets)
}

/// Number of calendar months touched by `[start, end]`.
fn months_spanned(start: NaiveDate, end: NaiveDate) -> i64 {
    let months = |d: NaiveDate| i64::from(d.year()) * 12 + i64::from(d.month0());
    months(end) - months(start) + 1
}

fn first_of_month(date: NaiveDate) -> NewsResult<NaiveDate> {
    date.with_day(1).ok_or_else(out_of_range)
}

fn first_of_next_month(date: NaiveDate) -> NewsResult<NaiveDate> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(out_of_range)
}

fn out_of_range() -> NewsError {
    NewsError::validation("date is outside the supported calendar range")
}

impl NewsService {
    /// Monthly article counts for `query` between two `YYYY-MM-DD` dates.
    ///
    /// One count query per month bucket; any failure aborts the whole
    /// computation and nothing is cached.
    pub async fn compute_trend(
        &self,
        query: &str,
        start_date: &str,
        end_date: &str,
    ) -> NewsResult<Arc<NewsTrend>> {
        let query = required_query(query)?;
        let start = parse_date("start_date", start_date)?;
        let end = parse_date("end_date", end_date)?;
        if start > end {
            return Err(NewsError::validation(format!(
                "start_date {} is after end_date {}",
                start, end
            )));
        }

        let max_months = self.limits.trend_max_months;
        if months_spanned(start, end) > max_months as i64 {
            return Err(NewsError::validation(format!(
                "date range spans more than {} months",
                max_months
            )));
        }

        let key = CacheKey::builder("trend")
            .text("q", &query.normalized)
            .value("start_date", start)
            .value("end_date", end)
            .build();

        if let Some(hit) = self.caches.trend.get(&key) {
            tracing::debug!(query = %query.normalized, "Trend served from cache");
            return Ok(hit);
        }

        let buckets = month_buckets(start, end)?;
        let mut points = Vec::with_capacity(buckets.len());

        for bucket in buckets {
            let params = vec![
                ("q", query.upstream.clone()),
                ("from-date", bucket.from.to_string()),
                ("to-date", bucket.to.to_string()),
                ("page-size", "1".to_string()),
            ];
            let payload = self.upstream.get("search", &params).await?;

            points.push(TrendPoint {
                period: bucket.period,
                article_count: parse_total(payload)?,
            });
        }

        let trend = Arc::new(NewsTrend {
            query: query.normalized,
            start_date: start,
            end_date: end,
            points,
        });

        self.caches.trend.put(key, Arc::clone(&trend));
        tracing::debug!(query = %trend.query, months = trend.points.len(), "Trend computed");
        Ok(trend)
    }
}
