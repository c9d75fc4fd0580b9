use crate::config::Environment;
use opentelemetry::global::{self, BoxedTracer};
use tracing::Subscriber;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt};

/// Initialize tracing subscriber with pretty formatting for development
/// and JSON formatting for production.
///
/// Uses RUST_LOG environment variable for filtering (defaults to "info" if not set).
///
/// Spans are also bridged to the global OpenTelemetry tracer provider. Install the
/// provider before calling this; until then the global provider is a no-op.
///
/// Returns an error instead of panicking when a global subscriber is already set.
pub fn setup_logging(service_name: &str, environment: Environment) -> anyhow::Result<()> {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_layer(service_name));

    match environment {
        Environment::Production => registry
            .with(tracing_subscriber::fmt::layer().json().with_level(true))
            .try_init()?,
        Environment::Development => registry
            .with(tracing_subscriber::fmt::layer().pretty().with_ansi(true))
            .try_init()?,
    }

    Ok(())
}

/// Layer forwarding `tracing` spans to the global tracer named `service_name`.
pub fn otel_layer<S>(service_name: &str) -> OpenTelemetryLayer<S, BoxedTracer>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    tracing_opentelemetry::layer().with_tracer(global::tracer(service_name.to_string()))
}
