use std::collections::BTreeMap;

/// Reserved tag holding transaction and posting identity.
pub const ID_TAG: &str = "id";

pub type Tags = BTreeMap<String, String>;

/// Split a trailing comment into free text and `key: value` tags.
///
/// The free text ends at the last space before the first `:`. Everything after it must be a
/// comma separated list of `key: value` pairs, otherwise the whole input is kept as plain text.
pub fn parse_tags(comment: &str) -> (String, Tags) {
    let Some(first_colon) = comment.find(':') else {
        return (comment.to_string(), Tags::new());
    };
    let comment_end = comment[..first_colon].rfind(' ');
    let (text, tag_text) = match comment_end {
        Some(end) => (comment[..end].trim(), &comment[end + 1..]),
        None => ("", comment),
    };

    let mut tags = Tags::new();
    for pair in tag_text.split(',') {
        let Some((key, value)) = pair.split_once(':') else {
            return (comment.to_string(), Tags::new());
        };
        tags.insert(key.trim().to_string(), value.trim().to_string());
    }
    (text.to_string(), tags)
}

/// Render a comment and its tags as the ` ; comment key: value, ...` suffix of a line.
pub fn serialize_comment(comment: &str, tags: &Tags) -> String {
    let mut rendered = comment.to_string();
    if !tags.is_empty() {
        let pairs: Vec<String> = tags
            .iter()
            .map(|(key, value)| format!("{key}: {value}"))
            .collect();
        if !rendered.is_empty() {
            rendered.push(' ');
        }
        rendered.push_str(&pairs.join(", "));
    }
    if rendered.is_empty() {
        rendered
    } else {
        format!(" ; {rendered}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn plain_comments_have_no_tags() {
        assert_eq!(parse_tags(""), (String::new(), Tags::new()));
        assert_eq!(parse_tags("hey there"), ("hey there".to_string(), Tags::new()));
    }

    #[test]
    fn parses_tags_after_comment() {
        assert_eq!(
            parse_tags("key: value"),
            (String::new(), tags(&[("key", "value")]))
        );
        assert_eq!(
            parse_tags("key1: value, key2: value"),
            (String::new(), tags(&[("key1", "value"), ("key2", "value")]))
        );
        assert_eq!(
            parse_tags("hey there key1: value, key2: value"),
            (
                "hey there".to_string(),
                tags(&[("key1", "value"), ("key2", "value")])
            )
        );
        assert_eq!(
            parse_tags("hey there what's: up?"),
            ("hey there".to_string(), tags(&[("what's", "up?")]))
        );
    }

    #[test]
    fn malformed_tags_stay_in_comment() {
        assert_eq!(
            parse_tags("key1: value, key2"),
            ("key1: value, key2".to_string(), Tags::new())
        );
    }

    #[test]
    fn serializes_sorted_tags() {
        assert_eq!(serialize_comment("", &Tags::new()), "");
        assert_eq!(serialize_comment("note", &Tags::new()), " ; note");
        assert_eq!(
            serialize_comment("hey", &tags(&[("b", "2"), ("a", "1")])),
            " ; hey a: 1, b: 2"
        );
        assert_eq!(serialize_comment("", &tags(&[("id", "A")])), " ; id: A");
    }
}
