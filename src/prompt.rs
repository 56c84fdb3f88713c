//! The instructional prompt sent alongside every document.

use schemars::{schema_for, JsonSchema};

use crate::quiz::QuizBlueprint;

/// Render the quiz-generation instructions for the given blueprint.
pub fn quiz_instructions(blueprint: &QuizBlueprint) -> String {
    let QuizBlueprint { easy, medium, hard, options_per_question } = *blueprint;
    let total = blueprint.total();

    format!(
        r#"## Core Objective
Generate high-quality, document-based multiple-choice questions that thoroughly assess comprehension and critical thinking for substantive, information-rich documents.

## Document Eligibility Criteria
### Acceptable Document Types
* Academic textbooks and course materials
* Research papers and scholarly publications
* Technical documentation and manuals
* Professional training materials
* Comprehensive instructional guides
* Detailed research reports
* Historical manuscripts and archives

### Excluded Document Types
* Social media posts
* Short-form content
* Incomplete or fragmentary documents
* Highly informal or conversational texts
* Documents with insufficient depth or complexity
* Marketing materials
* Raw data files without substantial contextual information

## Question Generation Guidelines

### Document Preprocessing
1. **Initial Document Assessment**
   * Verify the document meets the eligibility criteria
   * Confirm minimum required length and information density
   * Assess overall structural coherence and depth of content
2. **Content Suitability Evaluation**
   * Clear narrative or informational structure
   * Sufficient complex ideas and concepts
   * Potential for multi-level comprehension questions
   * Absence of jargon that would limit accessibility

### Difficulty Levels
* **Easy-Level Questions ({easy} questions)**
  - Focus on fundamental facts and directly stated information
  - Require basic recall and surface-level understanding
  - Answers are explicitly present in the text
* **Medium-Level Questions ({medium} questions)**
  - Require deeper comprehension and basic inference
  - Synthesize information from multiple sections
  - Answers are derivable through careful text analysis
* **Hard-Level Questions ({hard} questions)**
  - Challenge advanced comprehension and analytical skills
  - Involve subtle inferences and contextual interpretation
  - May connect different parts of the document in nuanced ways

### Question Construction Standards
* **Accuracy**: 100% grounded in document content; no external knowledge or fabricated information.
* **Formatting**: each question has a clear, concise stem, exactly {options_per_question} plausible answer options and exactly one correct answer. Distractors are plausible but incorrect, derived from document context, and similar in structure to the correct answer.
* **Cognitive Engagement**: promote active reading and critical analysis; avoid trivial recall.

### Structured Output Format
Respond with a single JSON object and nothing else:
```json
{{
  "questions": [
    {{
      "id": "Q1",
      "level": "easy",
      "text": "Question stem here?",
      "options": [
        {{"text": "Option A", "isCorrect": false}},
        {{"text": "Option B", "isCorrect": true}},
        {{"text": "Option C", "isCorrect": false}},
        {{"text": "Option D", "isCorrect": false}}
      ],
      "explanation": "Brief rationale for the correct answer, referencing the document"
    }}
  ]
}}
```
`level` is one of "easy", "medium" or "hard". Question ids are unique ("Q1" to "Q{total}").

### Additional Considerations
* Ensure balanced coverage of document content
* Avoid repeating similar question types
* Include explanations to support learning

## Final Verification Checklist
- {total} total questions generated
- {easy} easy-level questions
- {medium} medium-level questions
- {hard} hard-level questions
- Every question has {options_per_question} options with exactly one correct
- All questions strictly based on the document
- Informative explanations provided

**Note:** Adapt the approach to the document's complexity, structure and subject matter."#
    )
}

/// Append JSON Schema guidance for `T` to a prompt.
pub fn add_schema_guidance<T: JsonSchema>(prompt: String) -> String {
    let schema = schema_for!(T);
    let schema_json = serde_json::to_string_pretty(&schema)
        .unwrap_or_else(|_| "Schema serialization failed".to_string());

    format!(
        "{}\n\n## Response Schema\nThe JSON object must match this schema:\n```json\n{}\n```",
        prompt, schema_json
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::Quiz;

    #[test]
    fn instructions_reflect_blueprint_counts() {
        let blueprint = QuizBlueprint { easy: 6, medium: 3, hard: 1, options_per_question: 5 };
        let prompt = quiz_instructions(&blueprint);
        assert!(prompt.contains("Easy-Level Questions (6 questions)"));
        assert!(prompt.contains("Hard-Level Questions (1 questions)"));
        assert!(prompt.contains("- 10 total questions generated"));
        assert!(prompt.contains("exactly 5 plausible answer options"));
        assert!(prompt.contains(r#""isCorrect": true"#));
    }

    #[test]
    fn schema_guidance_names_wire_fields() {
        let prompt = add_schema_guidance::<Quiz>("base".to_string());
        assert!(prompt.starts_with("base\n\n## Response Schema"));
        assert!(prompt.contains("isCorrect"));
        assert!(prompt.contains("questions"));
    }
}
