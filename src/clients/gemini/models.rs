#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GeminiModel {
    #[default]
    Flash20,     // "gemini-2.0-flash"
    Flash25,     // "gemini-2.5-flash"
    Pro25,       // "gemini-2.5-pro"
    Override(String),
}

impl GeminiModel {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Flash20 => "gemini-2.0-flash",
            Self::Flash25 => "gemini-2.5-flash",
            Self::Pro25 => "gemini-2.5-pro",
            Self::Override(s) => s.as_str(),
        }
    }

    /// Map a model id to a known variant, falling back to `Override`.
    #[must_use]
    pub fn from_id(id: &str) -> Self {
        let id = id.trim().trim_start_matches("models/");
        match id {
            "gemini-2.0-flash" => Self::Flash20,
            "gemini-2.5-flash" => Self::Flash25,
            "gemini-2.5-pro" => Self::Pro25,
            other => Self::Override(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip() {
        assert_eq!(GeminiModel::default().id(), "gemini-2.0-flash");
        assert_eq!(GeminiModel::from_id("models/gemini-2.5-pro"), GeminiModel::Pro25);
        assert_eq!(GeminiModel::from_id("gemini-exp").id(), "gemini-exp");
    }
}
