use serde::{Deserialize, Serialize};

/// A message sent to the extension. Serializes externally tagged, e.g.
/// `{"created": {"name": "site/dark", "content": "..."}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Message {
    Created { name: String, content: String },
    Deleted { name: String },
    Modified { name: String, content: String },
    Renamed { old_name: String, new_name: String },
}

impl Message {
    /// The name the extension will know the style by after this message.
    pub fn name(&self) -> &str {
        match self {
            Self::Created { name, .. } | Self::Deleted { name } | Self::Modified { name, .. } => {
                name
            }
            Self::Renamed { new_name, .. } => new_name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Deleted { .. } => "deleted",
            Self::Modified { .. } => "modified",
            Self::Renamed { .. } => "renamed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_wire_shapes() {
        let cases = [
            (
                Message::Created {
                    name: "a".into(),
                    content: "body {}".into(),
                },
                json!({"created": {"name": "a", "content": "body {}"}}),
            ),
            (
                Message::Deleted { name: "a/b".into() },
                json!({"deleted": {"name": "a/b"}}),
            ),
            (
                Message::Modified {
                    name: "a".into(),
                    content: "".into(),
                },
                json!({"modified": {"name": "a", "content": ""}}),
            ),
            (
                Message::Renamed {
                    old_name: "a".into(),
                    new_name: "b".into(),
                },
                json!({"renamed": {"old_name": "a", "new_name": "b"}}),
            ),
        ];
        for (message, expected) in cases {
            assert_eq!(serde_json::to_value(&message).unwrap(), expected);
        }
    }

    #[test]
    fn test_name_follows_renames() {
        let renamed = Message::Renamed {
            old_name: "old".into(),
            new_name: "new".into(),
        };
        assert_eq!(renamed.name(), "new");
        assert_eq!(renamed.kind(), "renamed");
    }
}
