//! Utility functions for CLI operations

pub mod messages;

use petra::{DownloadDescriptor, ObjectAttributes};

/// One-line summary of a published module
pub fn describe_publish(descriptor: &DownloadDescriptor) -> String {
    format!(
        "Published {} ({} bytes, sha256 {})\n  key:     {}\n  locator: {}",
        descriptor.coordinate, descriptor.size, descriptor.sha256, descriptor.key, descriptor.locator
    )
}

/// Summary of stored object attributes
pub fn describe_attributes(attributes: &ObjectAttributes) -> String {
    let mut out = format!(
        "{}\n  owner: {}\n  team:  {}",
        attributes.key,
        display_or_dash(&attributes.metadata.owner),
        display_or_dash(&attributes.metadata.team)
    );
    if let Some(updated_at) = &attributes.updated_at {
        out.push_str(&format!("\n  updated: {}", updated_at));
    }
    out
}

fn display_or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petra::ModuleMetadata;

    #[test]
    fn test_describe_attributes_marks_empty_fields() {
        let attributes = ObjectAttributes {
            key: "a/b/c/a-b-c-1.0.0.tar.gz".to_string(),
            size: 10,
            metadata: ModuleMetadata {
                owner: "alice".to_string(),
                team: String::new(),
            },
            updated_at: None,
        };
        let text = describe_attributes(&attributes);
        assert!(text.contains("owner: alice"));
        assert!(text.contains("team:  -"));
        assert!(!text.contains("updated"));
    }
}
