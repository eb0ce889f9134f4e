use std::io;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::{
    fmt::{format::FmtSpan, time::UtcTime},
    prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::settings::{LogFormat, Settings};

const DEFAULT_DIRECTIVES: &str = "info";

pub(crate) fn init(settings: &Settings) -> Result<()> {
    let env_filter = env_filter_merge_directives(DEFAULT_DIRECTIVES, &settings.log_level)?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_timer(UtcTime::rfc_3339())
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    let registry = tracing_subscriber::registry();
    let initialized = match settings.log_format {
        LogFormat::Text => registry.with(fmt_layer.with_filter(env_filter)).try_init(),
        LogFormat::Json => registry
            .with(fmt_layer.json().with_filter(env_filter))
            .try_init(),
    };
    initialized.context("Failed to set global default tracing subscriber")?;

    Ok(())
}

fn env_filter_merge_directives(
    default_directives: &'static str,
    extra_directives: &str,
) -> Result<EnvFilter> {
    let mut filter = EnvFilter::builder()
        .parse(default_directives)
        .with_context(|| anyhow!("Default directives were invalid: {default_directives}"))?;

    for directive in extra_directives.split(',').filter(|d| !d.trim().is_empty()) {
        match directive.trim().parse() {
            Ok(parsed) => filter = filter.add_directive(parsed),
            Err(err) => eprintln!("WARN ignoring log directive: {directive:?}: {err}"),
        }
    }

    Ok(filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_directives_are_skipped() {
        let filter =
            env_filter_merge_directives("info", "galleria_sync=debug,galleria_sync::store=loud")
                .unwrap();
        assert!(filter.to_string().contains("galleria_sync=debug"));
    }
}
