use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wraps rider-identifying data (passenger names, relations) so that it never
/// shows up in `tracing` output through `{:?}` or `{}`.
///
/// Serialization passes the inner value through, since API responses and
/// notification events need the real value.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Masked<T>(pub T);

impl<T> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[redacted]")
    }
}

impl<T> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[redacted]")
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn new(value: T) -> Self {
        Masked(value)
    }

    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl From<String> for Masked<String> {
    fn from(value: String) -> Self {
        Masked(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_hides_value_in_formatting() {
        let name = Masked::new("Jane Rider".to_string());
        assert_eq!(format!("{:?}", name), "[redacted]");
        assert_eq!(format!("{}", name), "[redacted]");
        assert_eq!(name.expose(), "Jane Rider");
    }

    #[test]
    fn test_masked_serializes_inner_value() {
        let name = Masked::new("Jane Rider".to_string());
        assert_eq!(serde_json::to_string(&name).unwrap(), "\"Jane Rider\"");
        let back: Masked<String> = serde_json::from_str("\"Sam\"").unwrap();
        assert_eq!(back.into_inner(), "Sam");
    }
}
