//! Effective lifecycle of a data stream

use crate::assets::EffectiveLifecycle;
use som_client::DataStream;

/// Lifecycle in effect for `data_stream`
///
/// ILM wins when a policy is set and the stream either has no lifecycle
/// block or does not opt out through `prefer_ilm`. DSL applies only when the
/// lifecycle is explicitly enabled. An absent stream yields the `error` variant.
#[must_use]
pub fn get_data_stream_lifecycle(data_stream: Option<&DataStream>) -> EffectiveLifecycle {
    let Some(stream) = data_stream else {
        return EffectiveLifecycle::Error {
            message: "Data stream not found".to_string(),
        };
    };

    if let Some(policy) = &stream.ilm_policy {
        if stream.lifecycle.is_none() || stream.prefer_ilm.unwrap_or(true) {
            return EffectiveLifecycle::Ilm { policy: policy.clone() };
        }
    }

    match &stream.lifecycle {
        Some(lifecycle) if lifecycle.enabled == Some(true) => EffectiveLifecycle::Dsl {
            data_retention: lifecycle.data_retention.clone(),
        },
        _ => EffectiveLifecycle::Disabled {},
    }
}
