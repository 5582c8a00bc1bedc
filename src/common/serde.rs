/// Custom serialization/deserialization for whole-second durations written as `"<N>s"`.
pub(crate) mod duration_as_seconds {
    use serde::{self, de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serializes a `Duration` as e.g. `"8s"`. Sub-second precision is dropped.
    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}s", value.as_secs()))
    }

    /// Deserializes a string such as `"8s"` into a `Duration`.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let secs = s
            .strip_suffix('s')
            .ok_or_else(|| de::Error::custom(format!("duration '{s}' lacks the 's' suffix")))?;
        secs.parse::<u64>()
            .map(Duration::from_secs)
            .map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::time::Duration;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "super::duration_as_seconds")]
        duration: Duration,
    }

    #[test]
    fn writes_seconds_suffix() {
        let value = serde_json::to_value(Wrapper {
            duration: Duration::from_secs(8),
        })
        .unwrap();
        assert_eq!(value, json!({ "duration": "8s" }));
    }

    #[test]
    fn rejects_missing_suffix() {
        let result = serde_json::from_value::<Wrapper>(json!({ "duration": "8" }));
        assert!(result.is_err());
    }
}
