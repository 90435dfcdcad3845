use std::sync::OnceLock;

use sentry_tracing::{EventFilter, SentryLayer};
use tracing::Level;

static INIT_GUARD: OnceLock<Option<sentry::ClientInitGuard>> = OnceLock::new();

/// Initialise the Sentry client once per process. Without a DSN this is a no-op
/// and the tracing layer below forwards nothing.
pub fn init_once(dsn: Option<&str>, environment: &str) {
    INIT_GUARD.get_or_init(|| {
        let dsn = dsn?;
        let guard = sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                environment: Some(environment.to_string().into()),
                ..Default::default()
            },
        ));
        sentry::configure_scope(|scope| {
            scope.set_tag("service", "salon-insights");
        });
        Some(guard)
    });
}

/// Tracing layer that turns `error!` events into Sentry events and keeps
/// `warn!`/`info!` as breadcrumbs.
pub fn sentry_layer<S>() -> SentryLayer<S>
where
    S: tracing::Subscriber,
    S: for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    sentry_tracing::layer()
        .span_filter(|meta| {
            matches!(
                *meta.level(),
                Level::DEBUG | Level::INFO | Level::WARN | Level::ERROR
            )
        })
        .event_filter(|meta| match *meta.level() {
            Level::ERROR => EventFilter::Event,
            Level::DEBUG | Level::INFO | Level::WARN => EventFilter::Breadcrumb,
            Level::TRACE => EventFilter::Ignore,
        })
}
