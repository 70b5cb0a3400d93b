use crate::{
    error::{ChatError, ChatResult},
    model::Metadata,
};

/// Parses the `{ "teams": {..}, "emotes": {..} }` metadata document.
pub fn parse_metadata(input: &str, source_name: &str) -> ChatResult<Metadata> {
    serde_json::from_str(input).map_err(|e| ChatError::Load {
        source_name: source_name.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_teams_and_emotes() {
        let raw = r#"{
            "teams": { "NULL": "/static/null.png", "red": "/static/red.png" },
            "emotes": { "wave": "/static/wave.png" },
            "league": "ignored"
        }"#;
        let meta = parse_metadata(raw, "meta.json").unwrap();
        assert_eq!(meta.team_icon("red"), Some("/static/red.png"));
        assert_eq!(meta.emote("wave"), Some("/static/wave.png"));
    }

    #[test]
    fn missing_sections_are_empty() {
        let meta = parse_metadata("{}", "meta.json").unwrap();
        assert!(meta.is_empty());
    }

    #[test]
    fn invalid_document_is_a_load_error() {
        let err = parse_metadata("<html>404</html>", "meta.json").unwrap_err();
        assert!(matches!(err, ChatError::Load { ref source_name, .. } if source_name == "meta.json"));
    }
}
