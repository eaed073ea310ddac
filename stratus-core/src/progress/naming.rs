//! Display names for engine resource types.
//!
//! Purely cosmetic: nothing here affects counts.

/// Known `module/resource` tokens and their short labels.
const FRIENDLY_NAMES: &[(&str, &str)] = &[
    ("s3/bucket", "storage"),
    ("s3/bucketv2", "storage"),
    ("s3/bucketpolicy", "storage policy"),
    ("s3/bucketobject", "file"),
    ("s3/bucketobjectv2", "file"),
    ("cloudfront/distribution", "CDN"),
    ("cloudfront/cachepolicy", "CDN cache policy"),
    ("cloudfront/originaccesscontrol", "CDN access"),
    ("cloudfront/function", "edge function"),
    ("lambda/function", "function"),
    ("lambda/functionurl", "function URL"),
    ("lambda/permission", "function permission"),
    ("dynamodb/table", "table"),
    ("sqs/queue", "queue"),
    ("lambda/eventsourcemapping", "queue trigger"),
    ("iam/role", "role"),
    ("iam/policy", "policy"),
    ("iam/rolepolicy", "policy"),
    ("iam/rolepolicyattachment", "policy"),
    ("cloudwatch/loggroup", "logs"),
    ("acm/certificate", "certificate"),
    ("route53/record", "DNS record"),
];

/// Final nouns of a resource kind that mark an uploaded file rather than
/// infrastructure (`BucketObjectv2`, `S3BucketFolder`).
const FILE_NOUNS: &[&str] = &["object", "file", "asset", "folder"];

/// Short, human-readable label for a fully qualified type token.
///
/// `aws:s3/bucket:Bucket` becomes `storage`; unknown types fall back to
/// their spaced-out kind (`BucketPublicAccessBlock` → `bucket public access block`).
pub fn friendly_name(resource_type: &str) -> String {
    let mut parts = resource_type.split(':');
    let _package = parts.next();
    let module = parts.next().unwrap_or_default().to_lowercase();
    let kind = parts.next().unwrap_or(resource_type);

    if let Some((_, label)) = FRIENDLY_NAMES.iter().find(|(token, _)| *token == module) {
        return label.to_string();
    }

    split_camel_case(kind)
}

/// Whether events for this type count as file uploads.
///
/// Only the last word of the kind is considered, so `InstanceProfile` or
/// `BucketObjectLockConfiguration` stay infrastructure.
pub fn is_file_resource(resource_type: &str) -> bool {
    let kind = resource_type.rsplit(':').next().unwrap_or(resource_type);
    let words = split_camel_case(kind);
    let noun = words
        .split(' ')
        .rev()
        .find(|word| strip_version(word).is_some_and(|w| !w.is_empty()))
        .and_then(strip_version);

    noun.is_some_and(|noun| FILE_NOUNS.contains(&noun))
}

/// Drop a trailing version marker (`objectv2` → `object`).
fn strip_version(word: &str) -> Option<&str> {
    let digits = word.trim_end_matches(|c: char| c.is_ascii_digit());
    if digits.len() == word.len() {
        return Some(word);
    }
    digits.strip_suffix('v').or(Some(digits))
}

fn split_camel_case(kind: &str) -> String {
    let mut out = String::with_capacity(kind.len() + 4);
    for (i, c) in kind.chars().enumerate() {
        if c.is_uppercase() && i > 0 {
            out.push(' ');
        }
        out.extend(c.to_lowercase());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_types() {
        assert_eq!(friendly_name("aws:s3/bucket:Bucket"), "storage");
        assert_eq!(friendly_name("aws:s3/bucketV2:BucketV2"), "storage");
        assert_eq!(friendly_name("aws:cloudfront/distribution:Distribution"), "CDN");
        assert_eq!(friendly_name("aws:lambda/function:Function"), "function");
        assert_eq!(friendly_name("aws:dynamodb/table:Table"), "table");
        assert_eq!(friendly_name("aws:sqs/queue:Queue"), "queue");
    }

    #[test]
    fn test_unknown_types_fall_back() {
        assert_eq!(
            friendly_name("aws:s3/bucketPublicAccessBlock:BucketPublicAccessBlock"),
            "bucket public access block"
        );
        assert_eq!(friendly_name("random:index/randomId:RandomId"), "random id");
        assert_eq!(friendly_name("Custom"), "custom");
    }

    #[test]
    fn test_file_resources() {
        assert!(is_file_resource("aws:s3/bucketObjectv2:BucketObjectv2"));
        assert!(is_file_resource("aws:s3/bucketObject:BucketObject"));
        assert!(is_file_resource("aws:s3/bucketObjectV2:BucketObjectV2"));
        assert!(is_file_resource("synced-folder:index:S3BucketFolder"));
        assert!(!is_file_resource("aws:s3/bucket:Bucket"));
        assert!(!is_file_resource("aws:s3/bucketV2:BucketV2"));
        assert!(!is_file_resource("aws:cloudfront/distribution:Distribution"));
    }

    #[test]
    fn test_infrastructure_named_like_files() {
        assert!(!is_file_resource("aws:iam/instanceProfile:InstanceProfile"));
        assert!(!is_file_resource(
            "aws:s3/bucketObjectLockConfigurationV2:BucketObjectLockConfigurationV2"
        ));
        assert!(!is_file_resource(
            "aws:s3/bucketObjectLockConfiguration:BucketObjectLockConfiguration"
        ));
        assert!(!is_file_resource("aws:lambda/layerVersion:LayerVersion"));
    }
}
