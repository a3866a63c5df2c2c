//! Managed asset names derived from a stream name

/// Suffix of user-customizable pipelines
pub const CUSTOM_SUFFIX: &str = "@custom";

/// `<name>@stream`
#[inline]
#[must_use]
pub fn index_template_name(stream: &str) -> String {
    format!("{stream}@stream")
}

/// `<name>@stream.layer`
#[inline]
#[must_use]
pub fn component_template_name(stream: &str) -> String {
    format!("{stream}@stream.layer")
}

/// `<name>@stream.processing`
#[inline]
#[must_use]
pub fn processing_pipeline_name(stream: &str) -> String {
    format!("{stream}@stream.processing")
}

/// `<name>@stream.reroutes`
#[inline]
#[must_use]
pub fn reroute_pipeline_name(stream: &str) -> String {
    format!("{stream}@stream.reroutes")
}

/// Index patterns of the managed index template
#[must_use]
pub fn index_patterns(stream: &str) -> Vec<String> {
    vec![stream.to_string(), format!("{stream}.*")]
}

/// Check if a pipeline name is a custom leaf
#[inline]
#[must_use]
pub fn is_custom_pipeline(name: &str) -> bool {
    name.ends_with(CUSTOM_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_names() {
        assert_eq!(index_template_name("logs-test"), "logs-test@stream");
        assert_eq!(component_template_name("logs-test"), "logs-test@stream.layer");
        assert_eq!(processing_pipeline_name("logs-test"), "logs-test@stream.processing");
        assert_eq!(reroute_pipeline_name("logs-test"), "logs-test@stream.reroutes");
        assert_eq!(index_patterns("logs"), vec!["logs", "logs.*"]);
        assert!(is_custom_pipeline("logs@custom"));
        assert!(!is_custom_pipeline("logs@stream.processing"));
    }
}
