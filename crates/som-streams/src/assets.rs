//! Stream definitions and asset descriptions

use serde::{Deserialize, Serialize};
use serde_json::Value;
use som_client::{DataStream, DataStreamLifecycle, IndexTemplate, IngestPipeline, Processor};

/// Routing rule of a wired stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingRule {
    /// Child stream receiving matching documents
    pub destination: String,
    /// Painless condition; `None` routes everything
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl RoutingRule {
    /// Rule routing to `destination` when `condition` holds
    pub fn new(destination: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            condition: Some(condition.into()),
        }
    }

    /// `reroute` processor for this rule
    #[must_use]
    pub fn to_processor(&self) -> Processor {
        let mut body = serde_json::json!({ "destination": self.destination });
        if let Some(condition) = &self.condition {
            body["if"] = Value::String(condition.clone());
        }
        Processor::new("reroute", body)
    }
}

/// Desired state of a managed stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDefinition {
    /// Stream name; also the data stream name
    pub name: String,
    /// Field mappings (`properties` body)
    #[serde(default)]
    pub fields: serde_json::Map<String, Value>,
    /// Processing steps
    #[serde(default)]
    pub processors: Vec<Processor>,
    /// Child routing
    #[serde(default)]
    pub routing: Vec<RoutingRule>,
    /// Data stream lifecycle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle: Option<DataStreamLifecycle>,
}

impl StreamDefinition {
    /// Empty definition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: serde_json::Map::new(),
            processors: Vec::new(),
            routing: Vec::new(),
            lifecycle: None,
        }
    }

    /// Add a field mapping
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, mapping: Value) -> Self {
        self.fields.insert(name.into(), mapping);
        self
    }

    /// Add a processor
    #[must_use]
    pub fn with_processor(mut self, processor: Processor) -> Self {
        self.processors.push(processor);
        self
    }

    /// Add a routing rule
    #[must_use]
    pub fn with_route(mut self, rule: RoutingRule) -> Self {
        self.routing.push(rule);
        self
    }

    /// Set retention
    #[must_use]
    pub fn with_retention(mut self, retention: impl Into<String>) -> Self {
        self.lifecycle = Some(DataStreamLifecycle {
            enabled: Some(true),
            data_retention: Some(retention.into()),
        });
        self
    }
}

/// Assets behind an unmanaged (classic) data stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmanagedElasticsearchAssets {
    /// Index template name
    pub index_template: String,
    /// Component templates, in composition order
    pub component_templates: Vec<String>,
    /// Write index default pipeline
    pub ingest_pipeline: Option<String>,
    /// Data stream name
    pub data_stream: String,
}

/// Pipeline body with its id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedPipeline {
    /// Pipeline id
    pub name: String,
    /// Pipeline body
    #[serde(flatten)]
    pub pipeline: IngestPipeline,
}

/// Component template with the index templates composing it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentTemplateDetails {
    /// Template name
    pub name: String,
    /// Template body, `None` when the template no longer exists
    pub component_template: Option<Value>,
    /// Index templates listing this one in `composed_of`
    pub used_by: Vec<String>,
}

/// Index template with its name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedIndexTemplate {
    /// Template name
    pub name: String,
    /// Template body
    #[serde(flatten)]
    pub index_template: IndexTemplate,
}

/// Full bodies of unmanaged assets
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnmanagedElasticsearchAssetDetails {
    /// Ingest pipeline, when one is set
    pub ingest_pipeline: Option<NamedPipeline>,
    /// Component templates that still exist
    pub component_templates: Vec<ComponentTemplateDetails>,
    /// Index template
    pub index_template: NamedIndexTemplate,
    /// Data stream
    pub data_stream: DataStream,
}

/// Result of walking a pipeline chain
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReference {
    /// Last pipeline visited
    pub target_pipeline_name: String,
    /// Its body (empty when it does not exist)
    pub target_pipeline: IngestPipeline,
    /// Whether it invokes the stream's processing pipeline
    pub references_stream_managed_pipeline: bool,
}

/// Read/write access to a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessPrivileges {
    /// Can read
    pub read: bool,
    /// Can write
    pub write: bool,
}

/// Lifecycle in effect for a data stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectiveLifecycle {
    /// Managed by an ILM policy
    Ilm {
        /// Policy name
        policy: String,
    },
    /// Managed by data stream lifecycle
    Dsl {
        /// Retention; `None` keeps data forever
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data_retention: Option<String>,
    },
    /// No lifecycle
    Disabled {},
    /// Lifecycle could not be determined
    Error {
        /// Reason
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn lifecycle_wire_shape() {
        let cases = [
            (EffectiveLifecycle::Ilm { policy: "hot".into() }, json!({"ilm": {"policy": "hot"}})),
            (
                EffectiveLifecycle::Dsl {
                    data_retention: Some("7d".into()),
                },
                json!({"dsl": {"data_retention": "7d"}}),
            ),
            (EffectiveLifecycle::Dsl { data_retention: None }, json!({"dsl": {}})),
            (EffectiveLifecycle::Disabled {}, json!({"disabled": {}})),
        ];
        for (lifecycle, expected) in cases {
            assert_eq!(serde_json::to_value(&lifecycle).unwrap(), expected);
        }
    }

    #[test]
    fn reroute_processor() {
        let rule = RoutingRule::new("logs.nginx", "ctx.service == 'nginx'");
        assert_eq!(
            serde_json::to_value(rule.to_processor()).unwrap(),
            json!({"reroute": {"destination": "logs.nginx", "if": "ctx.service == 'nginx'"}})
        );

        let catch_all = RoutingRule {
            destination: "logs.other".into(),
            condition: None,
        };
        assert_eq!(
            serde_json::to_value(catch_all.to_processor()).unwrap(),
            json!({"reroute": {"destination": "logs.other"}})
        );
    }
}
