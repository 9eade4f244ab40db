//! Common tags derived from the invocation context.
//!
//! Every span and every reported datapoint carries the same set of identity
//! tags: where the function runs, which function it is, and which wrapper
//! build produced the telemetry. The set is derived once per invocation from
//! the invoked-function ARN and the runtime-provided function metadata.
//!
//! ARN handling follows the shapes Lambda actually produces:
//!
//! - `arn:aws:lambda:{region}:{account}:function:{name}` (unqualified)
//! - `arn:aws:lambda:{region}:{account}:function:{name}:{qualifier}`
//! - `arn:aws:lambda:{region}:{account}:event-source-mappings:{id}`
//!
//! Function ARNs are normalized so the `lambda_arn` tag always ends in the
//! version being executed, regardless of which alias or qualifier the caller
//! used. Event source mapping ARNs are reported verbatim. Anything that does
//! not look like a Lambda ARN contributes no ARN-derived tags at all.

use crate::constants::{dimensions, env_vars};
use crate::proto::{DataPoint, Dimension};
use lambda_runtime::Context;
use std::env;

/// Ordered set of invocation-identity tags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommonTags {
    entries: Vec<(String, String)>,
}

impl CommonTags {
    /// Derives the tag set from a Lambda invocation context.
    pub fn derive(context: &Context) -> Self {
        let execution_env = env::var(env_vars::AWS_EXECUTION_ENV).ok();
        Self::from_parts(
            &context.invoked_function_arn,
            &context.env_config.function_name,
            &context.env_config.version,
            execution_env.as_deref(),
        )
    }

    pub(crate) fn from_parts(
        arn: &str,
        function_name: &str,
        function_version: &str,
        execution_env: Option<&str>,
    ) -> Self {
        let mut entries = Vec::new();

        if let Some(env_name) = execution_env.filter(|value| !value.is_empty()) {
            entries.push((dimensions::EXECUTION_ENV.to_string(), env_name.to_string()));
        }
        entries.push((
            dimensions::WRAPPER_VERSION.to_string(),
            dimensions::WRAPPER_VERSION_VALUE.to_string(),
        ));

        let parts: Vec<&str> = arn.split(':').collect();
        if parts.len() > 2 && parts[2] == "lambda" {
            entries.push((
                dimensions::FUNCTION_NAME.to_string(),
                function_name.to_string(),
            ));
            entries.push((
                dimensions::FUNCTION_VERSION.to_string(),
                function_version.to_string(),
            ));
            if let Some(region) = parts.get(3) {
                entries.push((dimensions::REGION.to_string(), region.to_string()));
            }
            if let Some(account) = parts.get(4) {
                entries.push((dimensions::ACCOUNT_ID.to_string(), account.to_string()));
            }

            match parts.get(5).copied() {
                Some("function") => {
                    if parts.len() == 8 {
                        entries.push((
                            dimensions::FUNCTION_QUALIFIER.to_string(),
                            parts[7].to_string(),
                        ));
                    }
                    entries.push((
                        dimensions::LAMBDA_ARN.to_string(),
                        normalize_function_arn(&parts, function_version),
                    ));
                }
                Some("event-source-mappings") if parts.len() > 6 => {
                    entries.push((
                        dimensions::EVENT_SOURCE_MAPPINGS.to_string(),
                        parts[6].to_string(),
                    ));
                    entries.push((dimensions::LAMBDA_ARN.to_string(), arn.to_string()));
                }
                _ => {}
            }
        }

        entries.push((
            dimensions::METRIC_SOURCE.to_string(),
            dimensions::METRIC_SOURCE_VALUE.to_string(),
        ));

        Self { entries }
    }

    /// Looks up a tag value by name.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends the tag set to a datapoint as dimensions.
    ///
    /// Dimensions the producer already set keep their values; only missing
    /// keys are filled in.
    pub fn apply_to(&self, point: &mut DataPoint) {
        for (key, value) in &self.entries {
            if point.dimension(key).is_none() {
                point
                    .dimensions
                    .push(Dimension::new(key.clone(), value.clone()));
            }
        }
    }
}

/// Pads a function ARN to its qualified eight-segment form with the executing
/// version in the final slot.
fn normalize_function_arn(parts: &[&str], function_version: &str) -> String {
    let mut segments = [""; 8];
    for (slot, part) in segments.iter_mut().zip(parts) {
        *slot = part;
    }
    segments[7] = function_version;
    segments.join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNQUALIFIED_ARN: &str =
        "arn:aws:lambda:us-west-2:123456789012:function:sample-lambda-function";

    #[test]
    fn test_unqualified_function_arn() {
        let tags =
            CommonTags::from_parts(UNQUALIFIED_ARN, "sample-lambda-function", "$LATEST", None);

        assert_eq!(tags.get("aws_function_name"), Some("sample-lambda-function"));
        assert_eq!(tags.get("aws_function_version"), Some("$LATEST"));
        assert_eq!(tags.get("aws_region"), Some("us-west-2"));
        assert_eq!(tags.get("aws_account_id"), Some("123456789012"));
        assert_eq!(
            tags.get("lambda_arn"),
            Some("arn:aws:lambda:us-west-2:123456789012:function:sample-lambda-function:$LATEST")
        );
        assert_eq!(tags.get("aws_function_qualifier"), None);
        assert_eq!(tags.get("metric_source"), Some("lambda_wrapper"));
        assert_eq!(
            tags.get("function_wrapper_version"),
            Some(dimensions::WRAPPER_VERSION_VALUE)
        );
    }

    #[test]
    fn test_qualified_function_arn() {
        let arn = "arn:aws:lambda:us-east-1:123456789012:function:checkout:prod";
        let tags = CommonTags::from_parts(arn, "checkout", "17", None);

        assert_eq!(tags.get("aws_function_qualifier"), Some("prod"));
        // The normalized ARN reports the executing version, not the alias.
        assert_eq!(
            tags.get("lambda_arn"),
            Some("arn:aws:lambda:us-east-1:123456789012:function:checkout:17")
        );
    }

    #[test]
    fn test_event_source_mapping_arn() {
        let arn = "arn:aws:lambda:eu-west-1:123456789012:event-source-mappings:mapping-id-1234";
        let tags = CommonTags::from_parts(arn, "consumer", "$LATEST", None);

        assert_eq!(tags.get("event_source_mappings"), Some("mapping-id-1234"));
        assert_eq!(tags.get("lambda_arn"), Some(arn));
        assert_eq!(tags.get("aws_function_qualifier"), None);
    }

    #[test]
    fn test_short_arn_yields_no_arn_tags() {
        let tags = CommonTags::from_parts("arn:aws", "fn", "$LATEST", None);

        assert_eq!(tags.get("aws_function_name"), None);
        assert_eq!(tags.get("aws_region"), None);
        assert_eq!(tags.get("lambda_arn"), None);
        // Identity tags are still present.
        assert_eq!(tags.get("metric_source"), Some("lambda_wrapper"));
        assert!(tags.get("function_wrapper_version").is_some());
    }

    #[test]
    fn test_non_lambda_arn_yields_no_arn_tags() {
        let tags = CommonTags::from_parts(
            "arn:aws:sns:us-east-1:123456789012:some-topic",
            "fn",
            "$LATEST",
            None,
        );

        assert_eq!(tags.get("aws_function_name"), None);
        assert_eq!(tags.get("lambda_arn"), None);
    }

    #[test]
    fn test_execution_env_tag() {
        let with_env =
            CommonTags::from_parts(UNQUALIFIED_ARN, "fn", "$LATEST", Some("AWS_Lambda_rust"));
        assert_eq!(with_env.get("aws_execution_env"), Some("AWS_Lambda_rust"));

        let empty_env = CommonTags::from_parts(UNQUALIFIED_ARN, "fn", "$LATEST", Some(""));
        assert_eq!(empty_env.get("aws_execution_env"), None);

        let no_env = CommonTags::from_parts(UNQUALIFIED_ARN, "fn", "$LATEST", None);
        assert_eq!(no_env.get("aws_execution_env"), None);
    }

    #[test]
    fn test_apply_to_keeps_producer_dimensions() {
        let tags = CommonTags::from_parts(UNQUALIFIED_ARN, "fn", "$LATEST", None);
        let mut point = DataPoint {
            metric: Some("queue.depth".to_string()),
            dimensions: vec![Dimension::new("aws_region", "overridden")],
            ..DataPoint::default()
        };

        tags.apply_to(&mut point);

        assert_eq!(point.dimension("aws_region"), Some("overridden"));
        assert_eq!(point.dimension("metric_source"), Some("lambda_wrapper"));
        assert_eq!(point.dimension("aws_account_id"), Some("123456789012"));
    }
}
