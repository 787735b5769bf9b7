//! Dependency health checks
//!
//! PostgreSQL and Redis are required. The similarity service is optional:
//! it is skipped when not configured, and when it is down the API keeps
//! serving with queue continuation stopped, so it never fails readiness.

use std::future::Future;
use std::time::{Duration, Instant};

use serde::Serialize;
use sqlx::PgPool;

/// Upper bound on a single dependency check
const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Healthy,
    Unhealthy,
    /// Not configured, so not checked
    Skipped,
}

/// Outcome of checking one dependency
#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    pub name: &'static str,
    pub status: ServiceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Whether an unhealthy result fails readiness
    pub required: bool,
}

impl ServiceHealth {
    /// Result of a probe that ran for `elapsed`
    pub fn probed(
        name: &'static str,
        elapsed: Duration,
        outcome: Result<Option<serde_json::Value>, String>,
    ) -> Self {
        let (status, details, error) = match outcome {
            Ok(details) => (ServiceStatus::Healthy, details, None),
            Err(error) => (ServiceStatus::Unhealthy, None, Some(error)),
        };
        Self {
            name,
            status,
            response_time_ms: Some(elapsed.as_millis() as u64),
            error,
            details,
            required: true,
        }
    }

    pub fn skipped(name: &'static str, reason: impl Into<String>) -> Self {
        Self {
            name,
            status: ServiceStatus::Skipped,
            response_time_ms: None,
            error: None,
            details: Some(serde_json::json!({ "reason": reason.into() })),
            required: false,
        }
    }

    /// Mark this result as not affecting overall health
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    fn fails_readiness(&self) -> bool {
        self.required && self.status == ServiceStatus::Unhealthy
    }
}

/// Aggregated readiness report
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResponse {
    pub status: ServiceStatus,
    pub services: Vec<ServiceHealth>,
    pub total_time_ms: u64,
    pub version: &'static str,
}

impl HealthCheckResponse {
    pub fn new(services: Vec<ServiceHealth>, total_time: Duration) -> Self {
        let status = if services.iter().any(ServiceHealth::fails_readiness) {
            ServiceStatus::Unhealthy
        } else {
            ServiceStatus::Healthy
        };

        Self {
            status,
            services,
            total_time_ms: total_time.as_millis() as u64,
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == ServiceStatus::Healthy
    }
}

/// Time `probe`, bounded by [`CHECK_TIMEOUT`]
async fn timed<F>(name: &'static str, probe: F) -> ServiceHealth
where
    F: Future<Output = Result<Option<serde_json::Value>, String>>,
{
    let start = Instant::now();
    let outcome = tokio::time::timeout(CHECK_TIMEOUT, probe)
        .await
        .unwrap_or_else(|_| Err(format!("no answer within {}s", CHECK_TIMEOUT.as_secs())));
    ServiceHealth::probed(name, start.elapsed(), outcome)
}

/// Checks the API's runtime dependencies
#[derive(Clone)]
pub struct HealthService {
    pool: PgPool,
    redis: Option<redis::Client>,
    recommender_url: Option<String>,
    http_client: reqwest::Client,
}

impl HealthService {
    /// `redis` is `None` when events are delivered in memory;
    /// `recommender_url` is `None` when continuation is disabled.
    pub fn new(
        pool: PgPool,
        redis: Option<redis::Client>,
        recommender_url: Option<String>,
    ) -> Self {
        Self {
            pool,
            redis,
            recommender_url,
            http_client: reqwest::Client::builder()
                .timeout(CHECK_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    /// Ping PostgreSQL through the shared pool
    pub async fn check_database(&self) -> ServiceHealth {
        timed("database", async {
            sqlx::query_scalar::<_, i32>("SELECT 1")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| format!("query failed: {}", e))?;
            Ok(Some(serde_json::json!({
                "pool_size": self.pool.size(),
                "idle_connections": self.pool.num_idle(),
            })))
        })
        .await
    }

    /// PING the Redis server the event broker publishes through
    pub async fn check_redis(&self) -> ServiceHealth {
        let Some(client) = &self.redis else {
            return ServiceHealth::skipped("redis", "events are delivered in memory");
        };

        timed("redis", async {
            let mut conn = client
                .get_multiplexed_async_connection()
                .await
                .map_err(|e| format!("connection failed: {}", e))?;
            let reply: String = redis::cmd("PING")
                .query_async(&mut conn)
                .await
                .map_err(|e| format!("PING failed: {}", e))?;
            if reply != "PONG" {
                return Err(format!("unexpected PING reply: {}", reply));
            }
            Ok(None)
        })
        .await
    }

    /// Check that the similarity service answers HTTP at all
    ///
    /// Any response counts as reachable; the service has no health endpoint
    /// of its own.
    pub async fn check_recommender(&self) -> ServiceHealth {
        let Some(url) = &self.recommender_url else {
            return ServiceHealth::skipped("recommender", "RECOMMENDER_URL not set");
        };

        timed("recommender", async {
            let response = self
                .http_client
                .get(url)
                .send()
                .await
                .map_err(|e| format!("request failed: {}", e))?;
            Ok(Some(serde_json::json!({ "status": response.status().as_u16() })))
        })
        .await
        .optional()
    }

    /// Run every check concurrently
    pub async fn check_all(&self) -> HealthCheckResponse {
        let start = Instant::now();

        let (database, redis, recommender) = tokio::join!(
            self.check_database(),
            self.check_redis(),
            self.check_recommender(),
        );

        HealthCheckResponse::new(vec![database, redis, recommender], start.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy(name: &'static str) -> ServiceHealth {
        ServiceHealth::probed(name, Duration::from_millis(5), Ok(None))
    }

    fn unhealthy(name: &'static str) -> ServiceHealth {
        ServiceHealth::probed(name, Duration::from_millis(5), Err("refused".to_string()))
    }

    #[test]
    fn test_probed_result_fields() {
        let health = unhealthy("redis");
        assert_eq!(health.status, ServiceStatus::Unhealthy);
        assert_eq!(health.response_time_ms, Some(5));
        assert_eq!(health.error.as_deref(), Some("refused"));
        assert!(health.required);
    }

    #[test]
    fn test_required_failure_fails_readiness() {
        let response =
            HealthCheckResponse::new(vec![healthy("database"), unhealthy("redis")], Duration::ZERO);
        assert!(!response.is_healthy());
    }

    #[test]
    fn test_optional_failure_and_skips_do_not() {
        let response = HealthCheckResponse::new(
            vec![
                healthy("database"),
                ServiceHealth::skipped("redis", "in memory"),
                unhealthy("recommender").optional(),
            ],
            Duration::ZERO,
        );
        assert!(response.is_healthy());
    }

    #[tokio::test]
    async fn test_recommender_reachability() {
        let server = encore_test_utils::MockRecommenderServer::start().await;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://unused@localhost/unused")
            .unwrap();
        let service = HealthService::new(pool, None, Some(server.url()));

        let health = service.check_recommender().await;

        assert_eq!(health.status, ServiceStatus::Healthy);
        assert!(!health.required);
    }

    #[tokio::test]
    async fn test_unconfigured_dependencies_are_skipped() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://unused@localhost/unused")
            .unwrap();
        let service = HealthService::new(pool, None, None);

        assert_eq!(service.check_redis().await.status, ServiceStatus::Skipped);
        assert_eq!(
            service.check_recommender().await.status,
            ServiceStatus::Skipped
        );
    }
}
