use serde_json::Value;
use tracing::{debug, instrument};

/// Type of a JSON node found by the structure scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Object,
    Array,
}

/// Coordinates of a JSON structure within a larger text, including nested children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjCoords {
    pub start: usize,
    pub end: usize, // inclusive index of the closing bracket/brace
    pub kind: NodeType,
    pub children: Vec<ObjCoords>,
}

impl ObjCoords {
    pub fn new(start: usize, end: usize, kind: NodeType, children: Vec<ObjCoords>) -> Self {
        Self { start, end, kind, children }
    }

    /// The slice of `text` this node spans.
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..=self.end]
    }
}

#[derive(Debug)]
struct Frame {
    start: usize,
    kind: NodeType,
    children: Vec<ObjCoords>,
}

/// Find all balanced JSON object/array structures in the given text. Coordinates are byte indices.
#[instrument(target = "pdf_quiz::json", skip(text), fields(text_len = text.len()))]
pub fn find_json_structures(text: &str) -> Vec<ObjCoords> {
    let bytes = text.as_bytes();
    let mut results: Vec<ObjCoords> = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();

    let mut in_string = false;
    let mut escape = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escape {
                escape = false;
                continue;
            }
            match b {
                b'\\' => escape = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        let closing = match b {
            b'"' => {
                in_string = true;
                continue;
            }
            b'{' => {
                stack.push(Frame { start: i, kind: NodeType::Object, children: Vec::new() });
                continue;
            }
            b'[' => {
                stack.push(Frame { start: i, kind: NodeType::Array, children: Vec::new() });
                continue;
            }
            b'}' => NodeType::Object,
            b']' => NodeType::Array,
            _ => continue,
        };

        // Unbalanced closers are dropped along with the frame they mismatch.
        if let Some(frame) = stack.pop() {
            if frame.kind == closing {
                let node = ObjCoords::new(frame.start, i, closing, frame.children);
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => results.push(node),
                }
            }
        }
    }

    debug!(target: "pdf_quiz::json", count = results.len(), "found root structures");
    results
}

/// Parse a model response into a JSON object.
///
/// The whole (trimmed) text is tried first. Models occasionally wrap the
/// payload in a markdown fence or prepend a sentence even when asked for
/// JSON only, so on failure the first root-level object that parses is used.
/// A stray quote in the surrounding prose (`a 5" screen`) throws off the
/// scanner's string tracking, so as a last resort every `{` is tried as the
/// start of an object. If nothing parses, the error from the whole-text
/// attempt is returned.
#[instrument(target = "pdf_quiz::json", skip(text), fields(text_len = text.len()))]
pub fn extract_json_object(text: &str) -> Result<Value, serde_json::Error> {
    let direct_err = match serde_json::from_str::<Value>(text.trim()) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    for node in find_json_structures(text) {
        if node.kind != NodeType::Object {
            continue;
        }
        if let Ok(value) = serde_json::from_str::<Value>(node.slice(text)) {
            debug!(target: "pdf_quiz::json", start = node.start, end = node.end, "recovered embedded JSON object");
            return Ok(value);
        }
    }

    for (start, _) in text.match_indices('{') {
        let mut values = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        if let Some(Ok(value @ Value::Object(_))) = values.next() {
            debug!(target: "pdf_quiz::json", start, "recovered JSON object by leading-brace scan");
            return Ok(value);
        }
    }

    Err(direct_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_nested_structures() {
        let text = r#"noise {"a":[1,2,{"b":3}]} tail [4]"#;
        let roots = find_json_structures(text);
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].kind, NodeType::Object);
        assert_eq!(roots[0].slice(text), r#"{"a":[1,2,{"b":3}]}"#);
        assert_eq!(roots[0].children.len(), 1);
        assert_eq!(roots[0].children[0].children.len(), 1);
        assert_eq!(roots[1].kind, NodeType::Array);
    }

    #[test]
    fn brackets_inside_strings_are_ignored() {
        let text = r#"{"text":"a } tricky ] \" string {"}"#;
        let roots = find_json_structures(text);
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].end, text.len() - 1);
    }

    #[test]
    fn unbalanced_input_yields_nothing() {
        assert!(find_json_structures(r#"{"a": [1, 2}"#).is_empty());
    }
}
