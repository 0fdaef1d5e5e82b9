use glob::Pattern;
use newspool_broker::Broker;
use tracing::debug;

use crate::error::Error;

/// Expands topic name patterns into the concrete set of topics a binding
/// covers.
///
/// Glob patterns are matched against the live catalog; exclude patterns
/// filter those matches. Literal names pass through untouched, whether or
/// not they exist yet, so a consumer can bind a topic its producer has not
/// created. The result is fixed for the lifetime of the binding; picking up
/// catalog changes means resolving again.
///
/// # Errors
///
/// Returns [`Error::Setup`] on a malformed pattern and [`Error::Broker`]
/// when the catalog cannot be listed.
pub async fn resolve_binding<B: Broker>(
    broker: &B,
    patterns: &[String],
    excludes: &[String],
) -> Result<Vec<String>, Error> {
    let excludes = excludes
        .iter()
        .map(|spec| {
            Pattern::new(spec).map_err(|e| Error::Setup(format!("bad exclude pattern {spec:?}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut catalog: Option<Vec<String>> = None;
    let mut topics: Vec<String> = Vec::new();

    for spec in patterns {
        if !spec.contains(['*', '?', '[']) {
            if !topics.contains(spec) {
                topics.push(spec.clone());
            }
            continue;
        }

        let pattern = Pattern::new(spec)
            .map_err(|e| Error::Setup(format!("bad topic pattern {spec:?}: {e}")))?;

        if catalog.is_none() {
            let names = broker
                .list_topics()
                .await
                .map_err(Error::broker)?
                .into_iter()
                .map(|info| info.name)
                .collect();
            catalog = Some(names);
        }

        for name in catalog.as_deref().unwrap_or_default() {
            if pattern.matches(name)
                && !excludes.iter().any(|exclude| exclude.matches(name))
                && !topics.contains(name)
            {
                topics.push(name.clone());
            }
        }
    }

    debug!(topics = ?topics, "resolved binding");

    Ok(topics)
}
